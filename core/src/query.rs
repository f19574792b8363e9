//! Immutable query state and its wire-level rendering.
//!
//! # Design
//! `QueryState` is a plain value. Nothing in this module mutates a state that
//! has already been handed out: every `with_*` method clones the receiver,
//! applies one change to the clone and returns it. Builders keep their state
//! behind an `Arc`, so sharing one base builder across tasks needs no locking.
//!
//! Enum-like filter values never go through `Debug` or a numeric tag. Each
//! closed set implements [`WireEnum`], usually through [`wire_enum!`], and the
//! wire string is captured when the [`FilterValue`] is built.

/// A closed set of values with an explicit wire-string table.
pub trait WireEnum: Copy + Sized + 'static {
    /// Every variant, in declaration order.
    const VARIANTS: &'static [Self];

    /// The exact string the API expects for this value.
    fn wire_str(self) -> &'static str;

    /// Reverse lookup. Matching is exact; the API is case-sensitive.
    fn from_wire(value: &str) -> Option<Self> {
        Self::VARIANTS
            .iter()
            .copied()
            .find(|variant| variant.wire_str() == value)
    }
}

/// Declare a closed enum together with its wire-string table.
///
/// ```
/// catalog_core::wire_enum! {
///     pub enum ModelType {
///         Checkpoint => "Checkpoint",
///         Lora => "LORA",
///     }
/// }
///
/// use catalog_core::WireEnum;
/// assert_eq!(ModelType::Lora.wire_str(), "LORA");
/// assert_eq!(ModelType::from_wire("Checkpoint"), Some(ModelType::Checkpoint));
/// ```
#[macro_export]
macro_rules! wire_enum {
    (
        $(#[$attr:meta])*
        $vis:vis enum $name:ident {
            $(
                $(#[$vattr:meta])*
                $variant:ident => $wire:literal
            ),+ $(,)?
        }
    ) => {
        $(#[$attr])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        $vis enum $name {
            $(
                $(#[$vattr])*
                $variant
            ),+
        }

        impl $crate::WireEnum for $name {
            const VARIANTS: &'static [Self] = &[$(Self::$variant),+];

            fn wire_str(self) -> &'static str {
                match self {
                    $(Self::$variant => $wire),+
                }
            }
        }

        impl ::core::convert::From<$name> for $crate::FilterValue {
            fn from(value: $name) -> Self {
                $crate::FilterValue::wire(value)
            }
        }
    };
}

/// A single filter value as it will be rendered into the query string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterValue {
    Text(String),
    Bool(bool),
    /// Wire string resolved from a [`WireEnum`] at construction time.
    Enum(&'static str),
    /// Rendered as repeated `key=value` pairs, one per element.
    List(Vec<FilterValue>),
}

impl FilterValue {
    pub fn wire<E: WireEnum>(value: E) -> Self {
        FilterValue::Enum(value.wire_str())
    }

    /// True when rendering this value would emit nothing.
    pub fn is_empty(&self) -> bool {
        match self {
            FilterValue::List(items) => items.iter().all(FilterValue::is_empty),
            _ => false,
        }
    }

    fn push_scalars<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            FilterValue::Text(value) => out.push(value),
            FilterValue::Bool(true) => out.push("true"),
            FilterValue::Bool(false) => out.push("false"),
            FilterValue::Enum(wire) => out.push(wire),
            FilterValue::List(items) => {
                for item in items {
                    item.push_scalars(out);
                }
            }
        }
    }
}

impl From<&str> for FilterValue {
    fn from(value: &str) -> Self {
        FilterValue::Text(value.to_string())
    }
}

impl From<String> for FilterValue {
    fn from(value: String) -> Self {
        FilterValue::Text(value)
    }
}

impl From<bool> for FilterValue {
    fn from(value: bool) -> Self {
        FilterValue::Bool(value)
    }
}

impl From<i64> for FilterValue {
    fn from(value: i64) -> Self {
        FilterValue::Text(value.to_string())
    }
}

impl From<u32> for FilterValue {
    fn from(value: u32) -> Self {
        FilterValue::Text(value.to_string())
    }
}

impl<T: Into<FilterValue>> From<Vec<T>> for FilterValue {
    fn from(values: Vec<T>) -> Self {
        FilterValue::List(values.into_iter().map(Into::into).collect())
    }
}

/// Where the next page starts: an opaque cursor or a 1-based page number.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PagePosition {
    Cursor(String),
    Page(u32),
}

/// Snapshot of filters, sort key and paging for one query.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryState {
    filters: Vec<(String, FilterValue)>,
    sort: Option<String>,
    page_size: Option<u32>,
    position: Option<PagePosition>,
}

impl QueryState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Filters in insertion order.
    pub fn filters(&self) -> impl Iterator<Item = (&str, &FilterValue)> {
        self.filters.iter().map(|(key, value)| (key.as_str(), value))
    }

    /// Case-insensitive lookup.
    pub fn filter(&self, key: &str) -> Option<&FilterValue> {
        self.filters
            .iter()
            .find(|(existing, _)| existing.eq_ignore_ascii_case(key))
            .map(|(_, value)| value)
    }

    pub fn sort(&self) -> Option<&str> {
        self.sort.as_deref()
    }

    pub fn page_size(&self) -> Option<u32> {
        self.page_size
    }

    pub fn position(&self) -> Option<&PagePosition> {
        self.position.as_ref()
    }

    /// Set a filter. Keys compare case-insensitively; a repeated key keeps its
    /// original slot and takes the new spelling and value.
    #[must_use]
    pub fn with_filter(&self, key: &str, value: FilterValue) -> Self {
        let mut next = self.clone();
        let slot = next
            .filters
            .iter()
            .position(|(existing, _)| existing.eq_ignore_ascii_case(key));
        match slot {
            Some(index) => next.filters[index] = (key.to_string(), value),
            None => next.filters.push((key.to_string(), value)),
        }
        next
    }

    #[must_use]
    pub fn without_filter(&self, key: &str) -> Self {
        let mut next = self.clone();
        next.filters
            .retain(|(existing, _)| !existing.eq_ignore_ascii_case(key));
        next
    }

    #[must_use]
    pub fn with_sort(&self, sort: &str) -> Self {
        let mut next = self.clone();
        next.sort = Some(sort.to_string());
        next
    }

    #[must_use]
    pub fn with_page_size(&self, page_size: u32) -> Self {
        let mut next = self.clone();
        next.page_size = Some(page_size);
        next
    }

    #[must_use]
    pub fn with_position(&self, position: PagePosition) -> Self {
        let mut next = self.clone();
        next.position = Some(position);
        next
    }

    /// Render to `?k=v&...`, or an empty string when nothing is set.
    ///
    /// Order: `limit`, then the page position (`cursor` or `page`), then
    /// `sort` when `include_sort` is set, then filters in insertion order.
    /// List filters expand to repeated pairs and every key and value is
    /// percent-encoded.
    pub fn render(&self, include_sort: bool) -> String {
        let mut pairs: Vec<(&str, String)> = Vec::new();

        if let Some(limit) = self.page_size {
            pairs.push(("limit", limit.to_string()));
        }
        match &self.position {
            Some(PagePosition::Cursor(cursor)) => pairs.push(("cursor", cursor.clone())),
            Some(PagePosition::Page(page)) => pairs.push(("page", page.to_string())),
            None => {}
        }
        if include_sort {
            if let Some(sort) = &self.sort {
                pairs.push(("sort", sort.clone()));
            }
        }
        for (key, value) in &self.filters {
            let mut scalars = Vec::new();
            value.push_scalars(&mut scalars);
            for scalar in scalars {
                pairs.push((key.as_str(), scalar.to_string()));
            }
        }

        if pairs.is_empty() {
            return String::new();
        }
        let joined = pairs
            .iter()
            .map(|(key, value)| format!("{}={}", urlencoding::encode(key), urlencoding::encode(value)))
            .collect::<Vec<_>>()
            .join("&");
        format!("?{joined}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    crate::wire_enum! {
        enum Kind {
            Checkpoint => "Checkpoint",
            Lora => "LORA",
            TextualInversion => "TextualInversion",
        }
    }

    #[test]
    fn empty_state_renders_nothing() {
        assert_eq!(QueryState::new().render(true), "");
    }

    #[test]
    fn limit_then_cursor_then_sort_then_filters() {
        let state = QueryState::new()
            .with_filter("query", "cat".into())
            .with_sort("Newest")
            .with_position(PagePosition::Cursor("abc".to_string()))
            .with_page_size(20);
        assert_eq!(state.render(true), "?limit=20&cursor=abc&sort=Newest&query=cat");
    }

    #[test]
    fn sort_is_dropped_when_not_supported() {
        let state = QueryState::new().with_sort("Newest").with_page_size(5);
        assert_eq!(state.render(false), "?limit=5");
    }

    #[test]
    fn page_index_renders_as_page() {
        let state = QueryState::new()
            .with_page_size(10)
            .with_position(PagePosition::Page(3));
        assert_eq!(state.render(true), "?limit=10&page=3");
    }

    #[test]
    fn list_filters_repeat_the_key() {
        let state = QueryState::new().with_filter("ids", vec![1i64, 2, 3].into());
        assert_eq!(state.render(true), "?ids=1&ids=2&ids=3");
    }

    #[test]
    fn empty_list_renders_nothing() {
        let state = QueryState::new().with_filter("ids", Vec::<i64>::new().into());
        assert_eq!(state.render(true), "");
        assert!(state.filter("ids").is_some_and(FilterValue::is_empty));
    }

    #[test]
    fn enum_and_bool_values() {
        let state = QueryState::new()
            .with_filter("types", vec![Kind::Lora, Kind::Checkpoint].into())
            .with_filter("nsfw", false.into());
        assert_eq!(state.render(true), "?types=LORA&types=Checkpoint&nsfw=false");
    }

    #[test]
    fn values_are_percent_encoded() {
        let state = QueryState::new().with_filter("query", "a b&c=d/é".into());
        assert_eq!(state.render(true), "?query=a%20b%26c%3Dd%2F%C3%A9");
    }

    #[test]
    fn filter_keys_are_case_insensitive_last_write_wins() {
        let state = QueryState::new()
            .with_filter("Username", "alice".into())
            .with_filter("tag", "x".into())
            .with_filter("username", "bob".into());
        assert_eq!(state.render(true), "?username=bob&tag=x");
        assert_eq!(state.filter("USERNAME"), Some(&FilterValue::from("bob")));
    }

    #[test]
    fn with_methods_leave_receiver_untouched() {
        let base = QueryState::new().with_filter("tag", "x".into());
        let snapshot = base.clone();
        let _ = base.with_filter("tag", "y".into());
        let _ = base.with_sort("Oldest");
        let _ = base.with_page_size(3);
        let _ = base.without_filter("tag");
        assert_eq!(base, snapshot);
    }

    #[test]
    fn wire_table_round_trips() {
        for kind in Kind::VARIANTS {
            assert_eq!(Kind::from_wire(kind.wire_str()), Some(*kind));
        }
        assert_eq!(Kind::from_wire("lora"), None);
    }
}
