//! Explicit browse state for note queries.
//!
//! Search text, category/tag selections, and sort order are carried in a
//! plain value that callers construct per request, instead of ambient
//! mutable state. The CLI and the HTTP server both build one of these and
//! hand it to the store.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SortBy {
    CreatedAt,
    Title,
}

impl SortBy {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortBy::CreatedAt => "createdAt",
            SortBy::Title => "title",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "createdAt" | "created" | "date" => Some(SortBy::CreatedAt),
            "title" => Some(SortBy::Title),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SortOrder {
    Asc,
    Desc,
}

impl SortOrder {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortOrder::Asc => "asc",
            SortOrder::Desc => "desc",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "asc" => Some(SortOrder::Asc),
            "desc" => Some(SortOrder::Desc),
            _ => None,
        }
    }
}

/// Filter and sort state for listing notes. Defaults to no filters,
/// newest first.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryState {
    search_query: String,
    selected_categories: Vec<String>,
    selected_tags: Vec<String>,
    sort_by: SortBy,
    sort_order: SortOrder,
}

impl Default for QueryState {
    fn default() -> Self {
        QueryState {
            search_query: String::new(),
            selected_categories: Vec::new(),
            selected_tags: Vec::new(),
            sort_by: SortBy::CreatedAt,
            sort_order: SortOrder::Desc,
        }
    }
}

impl QueryState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn search_query(&self) -> &str {
        &self.search_query
    }

    pub fn set_search_query(&mut self, query: impl Into<String>) {
        self.search_query = query.into();
    }

    pub fn selected_categories(&self) -> &[String] {
        &self.selected_categories
    }

    pub fn set_selected_categories(&mut self, categories: Vec<String>) {
        self.selected_categories = categories;
    }

    pub fn selected_tags(&self) -> &[String] {
        &self.selected_tags
    }

    pub fn set_selected_tags(&mut self, tags: Vec<String>) {
        self.selected_tags = tags;
    }

    pub fn sort_by(&self) -> SortBy {
        self.sort_by
    }

    pub fn sort_order(&self) -> SortOrder {
        self.sort_order
    }

    pub fn set_sort(&mut self, by: SortBy, order: SortOrder) {
        self.sort_by = by;
        self.sort_order = order;
    }

    /// Drop every filter but keep the sort.
    pub fn clear_filters(&mut self) {
        self.search_query.clear();
        self.selected_categories.clear();
        self.selected_tags.clear();
    }

    pub fn is_filtered(&self) -> bool {
        !self.search_query.trim().is_empty()
            || !self.selected_categories.is_empty()
            || !self.selected_tags.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_newest_first_unfiltered() {
        let state = QueryState::new();
        assert_eq!(state.sort_by(), SortBy::CreatedAt);
        assert_eq!(state.sort_order(), SortOrder::Desc);
        assert!(!state.is_filtered());
    }

    #[test]
    fn test_clear_filters_keeps_sort() {
        let mut state = QueryState::new();
        state.set_search_query("rust");
        state.set_selected_tags(vec!["async".to_string()]);
        state.set_sort(SortBy::Title, SortOrder::Asc);
        assert!(state.is_filtered());

        state.clear_filters();
        assert!(!state.is_filtered());
        assert_eq!(state.sort_by(), SortBy::Title);
        assert_eq!(state.sort_order(), SortOrder::Asc);
    }

    #[test]
    fn test_sort_parsing() {
        assert_eq!(SortBy::from_str("createdAt"), Some(SortBy::CreatedAt));
        assert_eq!(SortBy::from_str("created"), Some(SortBy::CreatedAt));
        assert_eq!(SortBy::from_str("title"), Some(SortBy::Title));
        assert_eq!(SortBy::from_str("bogus"), None);
        assert_eq!(SortOrder::from_str("asc"), Some(SortOrder::Asc));
        assert_eq!(SortOrder::from_str("bogus"), None);
    }

    #[test]
    fn test_whitespace_search_is_not_a_filter() {
        let mut state = QueryState::new();
        state.set_search_query("   ");
        assert!(!state.is_filtered());
    }
}
