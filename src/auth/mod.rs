//! Authentication module — token auth with role-derived capabilities
//!
//! Provides:
//! - JWT token encoding/decoding (`jwt` submodule)
//! - Role inheritance expansion into capability sets (`capability` submodule)
//! - Per-request identity resolution middleware (`middleware` submodule)
//! - The `AuthUser` / `Identity` handler extractors (`extractor` submodule)

pub mod capability;
pub mod extractor;
pub mod jwt;
pub mod middleware;

pub use capability::{Capability, CapabilitySet};
pub use extractor::{AuthUser, Identity};
pub use jwt::{decode_token, encode_token};
pub use middleware::resolve_identity;

/// User id reserved for the configured root account. Never stored in the
/// users table, so catalog rows it creates carry an owner that resolves to
/// no user.
pub const ROOT_USER_ID: i64 = 0;
