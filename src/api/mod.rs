//! HTTP API for the mesh catalog

pub mod category_handlers;
pub mod handlers;
pub mod mesh_handlers;
pub mod query;
pub mod routes;
pub mod user_handlers;

pub use query::*;
pub use routes::create_router;
