//! CatalogStore trait definition
//!
//! Defines the abstract interface for all catalog persistence operations.
//! This trait mirrors the public async methods of `SqliteStore`, enabling
//! testing with mock implementations and future backend swaps.

use crate::facet::{FacetSelection, PageWindow, SortSpec};
use crate::store::models::*;
use anyhow::Result;
use async_trait::async_trait;

/// Abstract interface for all catalog persistence operations.
///
/// Facet-aware queries (`facet_tags`, `count_meshes`, `search_meshes`) all
/// evaluate the exact predicate described by the given [`FacetSelection`];
/// any narrowing (e.g. ignoring selected tags for facet inclusion) is
/// decided by the caller, not the store.
#[async_trait]
pub trait CatalogStore: Send + Sync {
    // ========================================================================
    // Health
    // ========================================================================

    /// Verify store connectivity
    async fn health_check(&self) -> Result<()>;

    // ========================================================================
    // Category operations
    // ========================================================================

    /// List every category with all of its tags (empty categories included)
    async fn list_categories_with_tags(&self) -> Result<Vec<CategoryWithTags>>;

    /// Get a category by id
    async fn get_category(&self, id: i64) -> Result<Option<Category>>;

    /// Create a category
    async fn create_category(&self, title: &str, color: &str, protected: bool) -> Result<Category>;

    /// Update category fields, returning the updated row
    async fn update_category(
        &self,
        id: i64,
        title: Option<String>,
        color: Option<String>,
    ) -> Result<Option<Category>>;

    /// Delete a category. Returns false when the row did not exist
    async fn delete_category(&self, id: i64) -> Result<bool>;

    /// Number of tags owned by a category
    async fn count_category_tags(&self, id: i64) -> Result<i64>;

    // ========================================================================
    // Tag operations
    // ========================================================================

    /// Get a tag by id
    async fn get_tag(&self, id: i64) -> Result<Option<Tag>>;

    /// Create a tag under a category
    async fn create_tag(&self, categories_id: i64, title: &str, protected: bool) -> Result<Tag>;

    /// Update tag fields (including explicit category reassignment),
    /// returning the updated row
    async fn update_tag(
        &self,
        id: i64,
        title: Option<String>,
        categories_id: Option<i64>,
    ) -> Result<Option<Tag>>;

    /// Delete a tag and its mesh associations. Returns false when the row
    /// did not exist
    async fn delete_tag(&self, id: i64) -> Result<bool>;

    // ========================================================================
    // Facet queries
    // ========================================================================

    /// The category→tags tree restricted to tags attached to at least one
    /// mesh matching the selection. Categories left without any tag are
    /// omitted. Ordered title then id at both levels.
    async fn facet_tags(&self, selection: &FacetSelection) -> Result<Vec<CategoryWithTags>>;

    /// Number of meshes matching the selection
    async fn count_meshes(&self, selection: &FacetSelection) -> Result<i64>;

    /// One page of matching meshes plus the total count, both computed in a
    /// single read transaction so they always agree
    async fn search_meshes(
        &self,
        selection: &FacetSelection,
        sort: &SortSpec,
        window: PageWindow,
    ) -> Result<SearchPage>;

    // ========================================================================
    // Mesh operations
    // ========================================================================

    /// Get a mesh row by id
    async fn get_mesh(&self, id: i64) -> Result<Option<Mesh>>;

    /// Get a mesh with tags, images, owner and tag categories
    async fn get_mesh_detail(&self, id: i64) -> Result<Option<MeshDetail>>;

    /// Create a mesh with its tag associations and images in one
    /// transaction. Returns the new mesh id
    async fn create_mesh(&self, mesh: &NewMesh) -> Result<i64>;

    /// Apply a partial update, re-deriving normalized text columns.
    /// Returns the updated row
    async fn update_mesh(&self, id: i64, changes: &MeshChanges) -> Result<Option<Mesh>>;

    /// Delete a mesh and its associations (rows only, files are the
    /// caller's concern). Returns false when the row did not exist
    async fn delete_mesh(&self, id: i64) -> Result<bool>;

    // ========================================================================
    // User / role operations
    // ========================================================================

    /// Create an account (unconfirmed, no roles)
    async fn create_user(&self, user: &NewUser) -> Result<User>;

    /// Look up a user by email, case-insensitively
    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>>;

    /// Get a user by id
    async fn get_user(&self, id: i64) -> Result<Option<User>>;

    /// List every user with its roles
    async fn list_users(&self) -> Result<Vec<UserWithRoles>>;

    /// List every declared role
    async fn list_roles(&self) -> Result<Vec<Role>>;

    /// Roles directly assigned to a user (inheritance not expanded)
    async fn user_roles(&self, user_id: i64) -> Result<Vec<Role>>;

    /// Assign a role to a user by role name. Re-assigning is a no-op
    async fn assign_role(&self, user_id: i64, role_name: &str) -> Result<()>;

    /// Mark a user as confirmed (idempotent), returning the updated row
    async fn confirm_user(&self, id: i64) -> Result<Option<User>>;

    /// Physically delete a user and its role assignments. Returns false
    /// when the row did not exist
    async fn delete_user(&self, id: i64) -> Result<bool>;

    // ========================================================================
    // Audit events
    // ========================================================================

    /// Record an audit event against a mesh, attributed to a user id or an
    /// anonymous visitor cookie when available
    async fn record_event(
        &self,
        mesh_id: i64,
        kind: ActionKind,
        user_id: Option<i64>,
        anonymous_cookie: Option<&str>,
    ) -> Result<()>;
}
