//! Client configuration.
//!
//! Values come from code through the `with_*` setters or from the
//! environment through [`ClientConfig::from_env`]:
//!
//! - `CATALOG_API_URL` (optional) - base URL, defaults to `http://localhost:3000`
//! - `CATALOG_API_KEY` (optional) - static credential sent as a bearer token
//! - `CATALOG_TIMEOUT_SECS` (optional) - per-request timeout in seconds

use std::fmt;
use std::time::Duration;

use url::Url;

use crate::error::{ApiError, ErrorKind};
use crate::transport::RetryPolicy;

pub const DEFAULT_BASE_URL: &str = "http://localhost:3000";
pub const DEFAULT_API_VERSION: &str = "v1";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Clone, PartialEq, Eq)]
pub struct ClientConfig {
    pub base_url: String,
    pub api_version: String,
    pub api_key: Option<String>,
    pub timeout: Duration,
    pub user_agent: String,
    pub retry: Option<RetryPolicy>,
}

impl ClientConfig {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_version: DEFAULT_API_VERSION.to_string(),
            api_key: None,
            timeout: DEFAULT_TIMEOUT,
            user_agent: format!("catalog-core/{}", env!("CARGO_PKG_VERSION")),
            retry: None,
        }
    }

    pub fn from_env() -> Result<Self, ApiError> {
        let base_url = std::env::var("CATALOG_API_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());
        let mut config = Self::new(&base_url);
        config.validate()?;

        if let Ok(key) = std::env::var("CATALOG_API_KEY") {
            if !key.trim().is_empty() {
                config.api_key = Some(key.trim().to_string());
            }
        }
        if let Ok(raw) = std::env::var("CATALOG_TIMEOUT_SECS") {
            let seconds: u64 = raw.trim().parse().map_err(|_| {
                ApiError::invalid_argument(format!("CATALOG_TIMEOUT_SECS must be an integer, got {raw:?}"))
            })?;
            config.timeout = Duration::from_secs(seconds);
        }
        Ok(config)
    }

    pub fn with_api_version(mut self, version: &str) -> Self {
        self.api_version = version.trim_matches('/').to_string();
        self
    }

    pub fn with_api_key(mut self, key: &str) -> Self {
        self.api_key = Some(key.to_string());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_user_agent(mut self, user_agent: &str) -> Self {
        self.user_agent = user_agent.to_string();
        self
    }

    pub fn with_retry(mut self, policy: RetryPolicy) -> Self {
        self.retry = Some(policy);
        self
    }

    /// Reject base URLs that are not absolute http(s) URLs with a host.
    /// Query strings and fragments are rejected too, since endpoints are
    /// appended to the base as path segments.
    pub fn validate(&self) -> Result<(), ApiError> {
        let invalid = |reason: &str| {
            ApiError::new(
                ErrorKind::InvalidUrl,
                format!("invalid base URL {:?}: {reason}", self.base_url),
            )
        };
        let parsed = Url::parse(&self.base_url).map_err(|e| invalid(&e.to_string()).with_cause(e))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(invalid("scheme must be http or https"));
        }
        if parsed.host_str().map_or(true, str::is_empty) {
            return Err(invalid("missing host"));
        }
        if parsed.query().is_some() || parsed.fragment().is_some() {
            return Err(invalid("query and fragment are not allowed"));
        }
        Ok(())
    }

    /// `<base>/<version>/<path>`.
    pub fn endpoint(&self, path: &str) -> String {
        format!(
            "{}/{}/{}",
            self.base_url,
            self.api_version,
            path.trim_start_matches('/')
        )
    }
}

impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConfig")
            .field("base_url", &self.base_url)
            .field("api_version", &self.api_version)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("timeout", &self.timeout)
            .field("user_agent", &self.user_agent)
            .field("retry", &self.retry)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trailing_slash_is_stripped() {
        let config = ClientConfig::new("http://localhost:3000/");
        assert_eq!(config.endpoint("models"), "http://localhost:3000/v1/models");
        assert_eq!(config.endpoint("/models/7"), "http://localhost:3000/v1/models/7");
    }

    #[test]
    fn api_version_is_configurable() {
        let config = ClientConfig::new("https://api.example.com").with_api_version("/v2/");
        assert_eq!(config.endpoint("images"), "https://api.example.com/v2/images");
    }

    #[test]
    fn rejects_non_http_urls() {
        for bad in [
            "",
            "localhost:3000",
            "ftp://host",
            "http://",
            "http://exa mple.com",
            "http://host:notaport",
            "http://[::1",
            "http://?x=1",
            "https://api.example.com?key=1",
            "https://api.example.com#top",
        ] {
            let err = ClientConfig::new(bad).validate().unwrap_err();
            assert_eq!(err.kind(), ErrorKind::InvalidUrl, "{bad:?}");
        }
    }

    #[test]
    fn accepts_http_and_https_bases() {
        for good in [
            "https://api.example.com",
            "http://localhost:3000",
            "http://127.0.0.1:8080/api",
            "http://[::1]:3000",
        ] {
            assert!(ClientConfig::new(good).validate().is_ok(), "{good:?}");
        }
    }

    #[test]
    fn url_parse_failure_keeps_cause() {
        let err = ClientConfig::new("http://host:notaport").validate().unwrap_err();
        assert!(std::error::Error::source(&err).is_some());
        assert!(err.message().contains("http://host:notaport"));
    }

    mod env {
        use std::sync::{Mutex, MutexGuard};

        use super::*;

        const VARS: [&str; 3] = ["CATALOG_API_URL", "CATALOG_API_KEY", "CATALOG_TIMEOUT_SECS"];

        /// Environment variables are process-global; every test in this
        /// module holds the lock while it touches them.
        static ENV_LOCK: Mutex<()> = Mutex::new(());

        fn set_env(vars: &[(&str, &str)]) -> MutexGuard<'static, ()> {
            let guard = ENV_LOCK.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
            for name in VARS {
                std::env::remove_var(name);
            }
            for (name, value) in vars {
                std::env::set_var(name, value);
            }
            guard
        }

        #[test]
        fn defaults_when_unset() {
            let _guard = set_env(&[]);
            let config = ClientConfig::from_env().unwrap();
            assert_eq!(config.base_url, DEFAULT_BASE_URL);
            assert_eq!(config.api_key, None);
            assert_eq!(config.timeout, DEFAULT_TIMEOUT);
        }

        #[test]
        fn reads_and_trims_values() {
            let _guard = set_env(&[
                ("CATALOG_API_URL", "https://api.example.com/"),
                ("CATALOG_API_KEY", "  k3y \n"),
                ("CATALOG_TIMEOUT_SECS", " 5 "),
            ]);
            let config = ClientConfig::from_env().unwrap();
            assert_eq!(config.base_url, "https://api.example.com");
            assert_eq!(config.api_key.as_deref(), Some("k3y"));
            assert_eq!(config.timeout, Duration::from_secs(5));
        }

        #[test]
        fn blank_key_is_ignored() {
            let _guard = set_env(&[("CATALOG_API_KEY", "   ")]);
            assert_eq!(ClientConfig::from_env().unwrap().api_key, None);
        }

        #[test]
        fn non_numeric_timeout_is_invalid_argument() {
            let _guard = set_env(&[("CATALOG_TIMEOUT_SECS", "soon")]);
            let err = ClientConfig::from_env().unwrap_err();
            assert_eq!(err.kind(), ErrorKind::InvalidArgument);
            assert!(err.message().contains("CATALOG_TIMEOUT_SECS"));
        }

        #[test]
        fn bad_url_is_invalid_url() {
            let _guard = set_env(&[("CATALOG_API_URL", "not a url")]);
            assert_eq!(ClientConfig::from_env().unwrap_err().kind(), ErrorKind::InvalidUrl);
        }
    }

    #[test]
    fn debug_redacts_api_key() {
        let config = ClientConfig::new("http://localhost").with_api_key("secret-token");
        let rendered = format!("{config:?}");
        assert!(!rendered.contains("secret-token"));
        assert!(rendered.contains("<redacted>"));
    }
}
