//! Paged payloads and their metadata.

use serde::{Deserialize, Serialize};

/// Paging information reported by the server, in the body or via the
/// `X-Next-Cursor` header.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaginationMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_items: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_page: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_size: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_pages: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_cursor: Option<String>,
}

impl PaginationMetadata {
    pub fn from_cursor(cursor: impl Into<String>) -> Self {
        Self {
            next_cursor: Some(cursor.into()),
            ..Self::default()
        }
    }

    /// Page number following `current_page`, if the server says one exists.
    /// Without `total_pages` the next page is assumed to exist, unless
    /// `current_page` is already the largest representable page.
    pub fn next_page(&self) -> Option<u32> {
        let current = self.current_page?;
        match self.total_pages {
            Some(total) if current >= total => None,
            _ => current.checked_add(1),
        }
    }
}

/// One page of results.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PagedResult<T> {
    pub items: Vec<T>,
    pub metadata: Option<PaginationMetadata>,
}

impl<T> PagedResult<T> {
    pub fn next_cursor(&self) -> Option<&str> {
        self.metadata.as_ref()?.next_cursor.as_deref()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Wire shape of a list response.
#[derive(Debug, Deserialize)]
pub(crate) struct Envelope<T> {
    pub items: Vec<T>,
    #[serde(default)]
    pub metadata: Option<PaginationMetadata>,
}
