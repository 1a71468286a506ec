//! Sort table and pagination window for the search service.
//!
//! The sort table is a static, immutable configuration loaded once at
//! compile time; handlers resolve a user-supplied sort name against it and
//! unknown names silently fall back to the default ordering.

pub const DEFAULT_PAGE_SIZE: i64 = 20;
pub const MAX_PAGE_SIZE: i64 = 100;

/// Column a sort key orders by. The store maps each variant to its SQL
/// rendering; the in-memory store compares struct fields directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortColumn {
    Title,
    Cells,
    Vertices,
    Created,
}

/// One entry of the supported-sorts table.
#[derive(Debug, Clone, Copy)]
pub struct SortSpec {
    /// Stable machine name accepted as the `sort` query parameter.
    pub name: &'static str,
    /// User-facing label.
    pub label: &'static str,
    pub column: SortColumn,
    pub reverse: bool,
    pub default: bool,
}

/// Every sort the search endpoint supports. Exactly one entry is flagged as
/// the default. The secondary order is always mesh id ascending, applied by
/// the store, so pagination is deterministic under ties.
pub const SORTS: &[SortSpec] = &[
    SortSpec {
        name: "title",
        label: "Ordre alphabétique",
        column: SortColumn::Title,
        reverse: false,
        default: true,
    },
    SortSpec {
        name: "title-reverse",
        label: "Ordre alphabétique inverse",
        column: SortColumn::Title,
        reverse: true,
        default: false,
    },
    SortSpec {
        name: "cells",
        label: "Nombre de cellules : croissant",
        column: SortColumn::Cells,
        reverse: false,
        default: false,
    },
    SortSpec {
        name: "cells-reverse",
        label: "Nombre de cellules : décroissant",
        column: SortColumn::Cells,
        reverse: true,
        default: false,
    },
    SortSpec {
        name: "vertices",
        label: "Nombre de sommets : croissant",
        column: SortColumn::Vertices,
        reverse: false,
        default: false,
    },
    SortSpec {
        name: "vertices-reverse",
        label: "Nombre de sommets : décroissant",
        column: SortColumn::Vertices,
        reverse: true,
        default: false,
    },
    SortSpec {
        name: "created",
        label: "Du plus ancien au plus récent",
        column: SortColumn::Created,
        reverse: false,
        default: false,
    },
    SortSpec {
        name: "created-reverse",
        label: "Du plus récent au plus ancien",
        column: SortColumn::Created,
        reverse: true,
        default: false,
    },
];

/// The entry flagged `default` in [`SORTS`].
pub fn default_sort() -> &'static SortSpec {
    SORTS.iter().find(|s| s.default).unwrap_or(&SORTS[0])
}

/// Resolves a user-supplied sort name. Unknown or absent names fall back to
/// the default ordering without error.
pub fn resolve_sort(name: Option<&str>) -> &'static SortSpec {
    name.and_then(|n| SORTS.iter().find(|s| s.name == n))
        .unwrap_or_else(default_sort)
}

/// A validated pagination window. Invalid inputs fall back to defaults
/// rather than erroring.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageWindow {
    page: i64,
    page_size: i64,
}

impl PageWindow {
    /// Page numbers start at 1; anything below that (or absent) becomes
    /// page 1. Page size defaults to [`DEFAULT_PAGE_SIZE`] and is clamped
    /// to `1..=MAX_PAGE_SIZE`.
    pub fn new(page: Option<i64>, page_size: Option<i64>) -> Self {
        let page = page.filter(|p| *p >= 1).unwrap_or(1);
        let page_size = page_size
            .filter(|s| *s >= 1)
            .unwrap_or(DEFAULT_PAGE_SIZE)
            .min(MAX_PAGE_SIZE);
        Self { page, page_size }
    }

    pub fn page(&self) -> i64 {
        self.page
    }

    pub fn limit(&self) -> i64 {
        self.page_size
    }

    pub fn offset(&self) -> i64 {
        (self.page - 1) * self.page_size
    }
}

impl Default for PageWindow {
    fn default() -> Self {
        Self::new(None, None)
    }
}

// ============================================================================
// Tests
// ============================================================================
