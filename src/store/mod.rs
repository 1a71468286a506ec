//! SQLite store and models for the mesh catalog

mod impl_catalog_store;
pub mod models;
pub mod sqlite;
pub mod traits;

pub use models::*;
pub use sqlite::SqliteStore;
pub use traits::CatalogStore;

#[cfg(test)]
pub(crate) mod mock;
