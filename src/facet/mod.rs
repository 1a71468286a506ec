//! Faceted search core: keyword normalization, the combined tag/keyword
//! selection, the occurrence aggregation engine, and the sort/pagination
//! tables.
//!
//! Every count, listing, and aggregation in the service is derived from a
//! single [`FacetSelection`], so the numbers shown next to a tag and the
//! results returned by a search can never drift apart.

pub mod aggregate;
pub mod keyword;
pub mod search;
pub mod selection;

pub use aggregate::aggregate_facets;
pub use search::{resolve_sort, PageWindow, SortColumn, SortSpec, SORTS};
pub use selection::FacetSelection;
