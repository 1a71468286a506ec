//! `CatalogStore` implementation for `SqliteStore`.
//!
//! Every method simply delegates to the corresponding inherent method on `SqliteStore`.

use async_trait::async_trait;

use super::models::*;
use super::sqlite::SqliteStore;
use super::traits::CatalogStore;
use crate::facet::{FacetSelection, PageWindow, SortSpec};

#[async_trait]
impl CatalogStore for SqliteStore {
    // ========================================================================
    // Health
    // ========================================================================

    async fn health_check(&self) -> anyhow::Result<()> {
        self.health_check().await
    }

    // ========================================================================
    // Category operations
    // ========================================================================

    async fn list_categories_with_tags(&self) -> anyhow::Result<Vec<CategoryWithTags>> {
        self.list_categories_with_tags().await
    }

    async fn get_category(&self, id: i64) -> anyhow::Result<Option<Category>> {
        self.get_category(id).await
    }

    async fn create_category(
        &self,
        title: &str,
        color: &str,
        protected: bool,
    ) -> anyhow::Result<Category> {
        self.create_category(title, color, protected).await
    }

    async fn update_category(
        &self,
        id: i64,
        title: Option<String>,
        color: Option<String>,
    ) -> anyhow::Result<Option<Category>> {
        self.update_category(id, title, color).await
    }

    async fn delete_category(&self, id: i64) -> anyhow::Result<bool> {
        self.delete_category(id).await
    }

    async fn count_category_tags(&self, id: i64) -> anyhow::Result<i64> {
        self.count_category_tags(id).await
    }

    // ========================================================================
    // Tag operations
    // ========================================================================

    async fn get_tag(&self, id: i64) -> anyhow::Result<Option<Tag>> {
        self.get_tag(id).await
    }

    async fn create_tag(
        &self,
        categories_id: i64,
        title: &str,
        protected: bool,
    ) -> anyhow::Result<Tag> {
        self.create_tag(categories_id, title, protected).await
    }

    async fn update_tag(
        &self,
        id: i64,
        title: Option<String>,
        categories_id: Option<i64>,
    ) -> anyhow::Result<Option<Tag>> {
        self.update_tag(id, title, categories_id).await
    }

    async fn delete_tag(&self, id: i64) -> anyhow::Result<bool> {
        self.delete_tag(id).await
    }

    // ========================================================================
    // Facet queries
    // ========================================================================

    async fn facet_tags(&self, selection: &FacetSelection) -> anyhow::Result<Vec<CategoryWithTags>> {
        self.facet_tags(selection).await
    }

    async fn count_meshes(&self, selection: &FacetSelection) -> anyhow::Result<i64> {
        self.count_meshes(selection).await
    }

    async fn search_meshes(
        &self,
        selection: &FacetSelection,
        sort: &SortSpec,
        window: PageWindow,
    ) -> anyhow::Result<SearchPage> {
        self.search_meshes(selection, sort, window).await
    }

    // ========================================================================
    // Mesh operations
    // ========================================================================

    async fn get_mesh(&self, id: i64) -> anyhow::Result<Option<Mesh>> {
        self.get_mesh(id).await
    }

    async fn get_mesh_detail(&self, id: i64) -> anyhow::Result<Option<MeshDetail>> {
        self.get_mesh_detail(id).await
    }

    async fn create_mesh(&self, mesh: &NewMesh) -> anyhow::Result<i64> {
        self.create_mesh(mesh).await
    }

    async fn update_mesh(&self, id: i64, changes: &MeshChanges) -> anyhow::Result<Option<Mesh>> {
        self.update_mesh(id, changes).await
    }

    async fn delete_mesh(&self, id: i64) -> anyhow::Result<bool> {
        self.delete_mesh(id).await
    }

    // ========================================================================
    // User / role operations
    // ========================================================================

    async fn create_user(&self, user: &NewUser) -> anyhow::Result<User> {
        self.create_user(user).await
    }

    async fn find_user_by_email(&self, email: &str) -> anyhow::Result<Option<User>> {
        self.find_user_by_email(email).await
    }

    async fn get_user(&self, id: i64) -> anyhow::Result<Option<User>> {
        self.get_user(id).await
    }

    async fn list_users(&self) -> anyhow::Result<Vec<UserWithRoles>> {
        self.list_users().await
    }

    async fn list_roles(&self) -> anyhow::Result<Vec<Role>> {
        self.list_roles().await
    }

    async fn user_roles(&self, user_id: i64) -> anyhow::Result<Vec<Role>> {
        self.user_roles(user_id).await
    }

    async fn assign_role(&self, user_id: i64, role_name: &str) -> anyhow::Result<()> {
        self.assign_role(user_id, role_name).await
    }

    async fn confirm_user(&self, id: i64) -> anyhow::Result<Option<User>> {
        self.confirm_user(id).await
    }

    async fn delete_user(&self, id: i64) -> anyhow::Result<bool> {
        self.delete_user(id).await
    }

    // ========================================================================
    // Audit events
    // ========================================================================

    async fn record_event(
        &self,
        mesh_id: i64,
        kind: ActionKind,
        user_id: Option<i64>,
        anonymous_cookie: Option<&str>,
    ) -> anyhow::Result<()> {
        self.record_event(mesh_id, kind, user_id, anonymous_cookie)
            .await
    }
}
