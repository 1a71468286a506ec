//! Query string decoding for the faceted search endpoints.
//!
//! The filter parameter repeats (`?filters[]=3&filters[]=7`), which rules
//! out a plain derived struct: serde's urlencoded deserializer keeps only
//! the last occurrence of a repeated key. Handlers therefore extract the
//! raw pair list (`Query<Vec<(String, String)>>`) and feed it through
//! [`SearchQuery::from_pairs`].

use crate::facet::{resolve_sort, FacetSelection, PageWindow, SortSpec};

/// The decoded query string of a search or facet request. All fields are
/// optional; anything unparseable degrades to its default instead of
/// erroring, matching the tolerant filter handling in
/// [`FacetSelection::from_raw`].
#[derive(Debug, Clone, Default)]
pub struct SearchQuery {
    /// Raw `filters[]` values in request order.
    pub filters: Vec<String>,
    /// Raw keyword, normalized later by the selection.
    pub keyword: Option<String>,
    pub page: Option<i64>,
    pub page_size: Option<i64>,
    pub sort: Option<String>,
}

impl SearchQuery {
    /// Decode the raw query pairs. Both `filters[]` and bare `filters` are
    /// accepted for the repeated tag parameter; unknown keys are ignored.
    pub fn from_pairs(pairs: &[(String, String)]) -> Self {
        let mut query = Self::default();
        for (key, value) in pairs {
            match key.as_str() {
                "filters[]" | "filters" => query.filters.push(value.clone()),
                "keyword" => {
                    if !value.trim().is_empty() {
                        query.keyword = Some(value.clone());
                    }
                }
                "page" => query.page = value.trim().parse().ok(),
                "pageSize" => query.page_size = value.trim().parse().ok(),
                "sort" => {
                    if !value.trim().is_empty() {
                        query.sort = Some(value.clone());
                    }
                }
                _ => {}
            }
        }
        query
    }

    /// The facet selection described by `filters[]` + `keyword`.
    pub fn selection(&self) -> FacetSelection {
        FacetSelection::from_raw(&self.filters, self.keyword.as_deref())
    }

    /// The validated pagination window.
    pub fn window(&self) -> PageWindow {
        PageWindow::new(self.page, self.page_size)
    }

    /// The resolved sort. Unknown names fall back to the default ordering.
    pub fn sort_spec(&self) -> &'static SortSpec {
        resolve_sort(self.sort.as_deref())
    }
}
