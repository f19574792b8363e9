//! Two-variant success/failure container returned by every client call.
//!
//! # Design
//! `ApiResult` differs from `std::result::Result` in one respect: reading the
//! wrong variant through [`ApiResult::value`] or [`ApiResult::error`] panics
//! with a message naming the misuse. The combinators never panic. Use
//! [`ApiResult::fold`] or a `match` to consume a result without touching an
//! unchecked variant, or [`ApiResult::into_result`] to get back to `?`.

use std::future::Future;

use crate::error::ApiError;

#[must_use]
#[derive(Debug, Clone, PartialEq)]
pub enum ApiResult<T> {
    Success(T),
    Failure(ApiError),
}

impl<T> ApiResult<T> {
    pub fn is_success(&self) -> bool {
        matches!(self, ApiResult::Success(_))
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, ApiResult::Failure(_))
    }

    /// Borrow the success value.
    ///
    /// # Panics
    /// On `Failure`. Check `is_success` first, or use `fold`/`value_or`.
    #[track_caller]
    pub fn value(&self) -> &T {
        match self {
            ApiResult::Success(value) => value,
            ApiResult::Failure(err) => panic!(
                "ApiResult::value called on Failure ({err}); check is_success() or use fold/value_or"
            ),
        }
    }

    /// Take the success value.
    ///
    /// # Panics
    /// On `Failure`.
    #[track_caller]
    pub fn into_value(self) -> T {
        match self {
            ApiResult::Success(value) => value,
            ApiResult::Failure(err) => panic!(
                "ApiResult::into_value called on Failure ({err}); check is_success() or use fold/value_or"
            ),
        }
    }

    /// Borrow the error.
    ///
    /// # Panics
    /// On `Success`. Check `is_failure` first.
    #[track_caller]
    pub fn error(&self) -> &ApiError {
        match self {
            ApiResult::Failure(err) => err,
            ApiResult::Success(_) => {
                panic!("ApiResult::error called on Success; check is_failure() or use fold")
            }
        }
    }

    /// # Panics
    /// On `Success`.
    #[track_caller]
    pub fn into_error(self) -> ApiError {
        match self {
            ApiResult::Failure(err) => err,
            ApiResult::Success(_) => {
                panic!("ApiResult::into_error called on Success; check is_failure() or use fold")
            }
        }
    }

    pub fn value_or(self, default: T) -> T {
        match self {
            ApiResult::Success(value) => value,
            ApiResult::Failure(_) => default,
        }
    }

    pub fn value_or_else<F>(self, factory: F) -> T
    where
        F: FnOnce(&ApiError) -> T,
    {
        match self {
            ApiResult::Success(value) => value,
            ApiResult::Failure(err) => factory(&err),
        }
    }

    pub fn map<U, F>(self, f: F) -> ApiResult<U>
    where
        F: FnOnce(T) -> U,
    {
        match self {
            ApiResult::Success(value) => ApiResult::Success(f(value)),
            ApiResult::Failure(err) => ApiResult::Failure(err),
        }
    }

    pub fn map_error<F>(self, f: F) -> ApiResult<T>
    where
        F: FnOnce(ApiError) -> ApiError,
    {
        match self {
            ApiResult::Success(value) => ApiResult::Success(value),
            ApiResult::Failure(err) => ApiResult::Failure(f(err)),
        }
    }

    /// Chain a fallible step; the first `Failure` short-circuits.
    pub fn and_then<U, F>(self, f: F) -> ApiResult<U>
    where
        F: FnOnce(T) -> ApiResult<U>,
    {
        match self {
            ApiResult::Success(value) => f(value),
            ApiResult::Failure(err) => ApiResult::Failure(err),
        }
    }

    /// Async form of [`and_then`](Self::and_then). `f` is not polled on
    /// `Failure`.
    pub async fn and_then_async<U, F, Fut>(self, f: F) -> ApiResult<U>
    where
        F: FnOnce(T) -> Fut,
        Fut: Future<Output = ApiResult<U>>,
    {
        match self {
            ApiResult::Success(value) => f(value).await,
            ApiResult::Failure(err) => ApiResult::Failure(err),
        }
    }

    /// Run `f` on the success value and return `self` unchanged.
    pub fn on_success<F>(self, f: F) -> Self
    where
        F: FnOnce(&T),
    {
        if let ApiResult::Success(value) = &self {
            f(value);
        }
        self
    }

    /// Run `f` on the error and return `self` unchanged.
    pub fn on_failure<F>(self, f: F) -> Self
    where
        F: FnOnce(&ApiError),
    {
        if let ApiResult::Failure(err) = &self {
            f(err);
        }
        self
    }

    /// Reduce both variants to one value.
    pub fn fold<R, S, E>(self, on_success: S, on_failure: E) -> R
    where
        S: FnOnce(T) -> R,
        E: FnOnce(ApiError) -> R,
    {
        match self {
            ApiResult::Success(value) => on_success(value),
            ApiResult::Failure(err) => on_failure(err),
        }
    }

    pub fn as_ref(&self) -> ApiResult<&T> {
        match self {
            ApiResult::Success(value) => ApiResult::Success(value),
            ApiResult::Failure(err) => ApiResult::Failure(err.clone()),
        }
    }

    pub fn ok(self) -> Option<T> {
        match self {
            ApiResult::Success(value) => Some(value),
            ApiResult::Failure(_) => None,
        }
    }

    pub fn into_result(self) -> Result<T, ApiError> {
        self.into()
    }
}

impl<T> From<Result<T, ApiError>> for ApiResult<T> {
    fn from(result: Result<T, ApiError>) -> Self {
        match result {
            Ok(value) => ApiResult::Success(value),
            Err(err) => ApiResult::Failure(err),
        }
    }
}

impl<T> From<ApiResult<T>> for Result<T, ApiError> {
    fn from(result: ApiResult<T>) -> Self {
        match result {
            ApiResult::Success(value) => Ok(value),
            ApiResult::Failure(err) => Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use super::*;
    use crate::error::ErrorKind;

    fn failure() -> ApiResult<u32> {
        ApiResult::Failure(ApiError::new(ErrorKind::NotFound, "missing").with_http_status(404))
    }

    #[test]
    fn exactly_one_variant() {
        let ok: ApiResult<u32> = ApiResult::Success(1);
        assert!(ok.is_success() && !ok.is_failure());
        assert!(failure().is_failure() && !failure().is_success());
    }

    #[test]
    fn value_on_success() {
        assert_eq!(*ApiResult::Success(3).value(), 3);
    }

    #[test]
    #[should_panic(expected = "ApiResult::value called on Failure")]
    fn value_on_failure_fails_fast() {
        let _ = failure().value();
    }

    #[test]
    #[should_panic(expected = "ApiResult::error called on Success")]
    fn error_on_success_fails_fast() {
        let ok: ApiResult<u32> = ApiResult::Success(1);
        let _ = ok.error();
    }

    #[test]
    fn defaults_only_apply_to_failure() {
        assert_eq!(ApiResult::Success(5).value_or(9), 5);
        assert_eq!(failure().value_or(9), 9);
        assert_eq!(failure().value_or_else(|err| err.http_status().unwrap_or(0) as u32), 404);
    }

    #[test]
    fn map_passes_failure_through() {
        assert_eq!(ApiResult::Success(2).map(|v| v * 10), ApiResult::Success(20));
        assert_eq!(failure().map(|v| v * 10), failure());
    }

    #[test]
    fn and_then_short_circuits() {
        let called = Cell::new(false);
        let out = failure().and_then(|v| {
            called.set(true);
            ApiResult::Success(v + 1)
        });
        assert!(!called.get());
        assert_eq!(out.error().kind(), ErrorKind::NotFound);

        let chained = ApiResult::Success(1)
            .and_then(|v| ApiResult::Success(v + 1))
            .and_then(|_| ApiResult::<u32>::Failure(ApiError::out_of_range("too big")));
        assert_eq!(chained.error().kind(), ErrorKind::OutOfRange);
    }

    #[tokio::test]
    async fn and_then_async_chains() {
        let out = ApiResult::Success(2)
            .and_then_async(|v| async move { ApiResult::Success(v * 2) })
            .await;
        assert_eq!(out, ApiResult::Success(4));

        let out = failure()
            .and_then_async(|v| async move { ApiResult::Success(v * 2) })
            .await;
        assert_eq!(out, failure());
    }

    #[test]
    fn taps_do_not_change_variant() {
        let seen = Cell::new(0);
        let ok = ApiResult::Success(7)
            .on_success(|v| seen.set(*v))
            .on_failure(|_| seen.set(99));
        assert_eq!(ok, ApiResult::Success(7));
        assert_eq!(seen.get(), 7);

        let err = failure().on_success(|_| seen.set(1)).on_failure(|_| seen.set(2));
        assert_eq!(err, failure());
        assert_eq!(seen.get(), 2);
    }

    #[test]
    fn fold_reduces_both_variants() {
        let describe = |r: ApiResult<u32>| r.fold(|v| format!("ok {v}"), |e| format!("err {}", e.kind()));
        assert_eq!(describe(ApiResult::Success(1)), "ok 1");
        assert_eq!(describe(failure()), "err not_found");
    }

    #[test]
    fn converts_to_std_result() {
        fn lookup(r: ApiResult<u32>) -> Result<u32, ApiError> {
            let v = r.into_result()?;
            Ok(v + 1)
        }
        assert_eq!(lookup(ApiResult::Success(1)).unwrap(), 2);
        assert!(lookup(failure()).is_err());
        assert_eq!(ApiResult::from(Ok::<u32, ApiError>(3)), ApiResult::Success(3));
    }
}
