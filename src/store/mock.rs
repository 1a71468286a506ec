//! In-memory mock implementation of CatalogStore for testing.
//!
//! Provides a complete mock of all catalog operations using
//! `tokio::sync::RwLock<HashMap<K, V>>` collections. Facet queries reuse
//! `FacetSelection::matches` so the mock and the SQL renderer agree on
//! selection semantics. Conditionally compiled with `#[cfg(test)]`.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering as AtomicOrdering};

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use crate::facet::{keyword, FacetSelection, PageWindow, SortColumn, SortSpec};
use crate::store::models::*;
use crate::store::traits::CatalogStore;

/// In-memory mock implementation of CatalogStore for testing.
pub struct MockCatalogStore {
    pub categories: RwLock<HashMap<i64, Category>>,
    pub tags: RwLock<HashMap<i64, Tag>>,
    pub meshes: RwLock<HashMap<i64, Mesh>>,
    pub users: RwLock<HashMap<i64, User>>,
    pub roles: RwLock<HashMap<i64, Role>>,

    /// mesh id -> tag ids
    pub mesh_tags: RwLock<HashMap<i64, Vec<i64>>>,
    /// mesh id -> images
    pub images: RwLock<HashMap<i64, Vec<MeshImage>>>,
    /// user id -> role ids
    pub user_roles: RwLock<HashMap<i64, Vec<i64>>>,
    pub events: RwLock<Vec<(i64, ActionKind, Option<i64>, Option<String>)>>,

    next_id: AtomicI64,
    /// When set, every facet query fails. Exercises fail-closed paths.
    fail: AtomicBool,
}

impl MockCatalogStore {
    /// Create a new MockCatalogStore with the two reference roles seeded.
    pub fn new() -> Self {
        let mut roles = HashMap::new();
        roles.insert(
            1,
            Role {
                id: 1,
                name: "administrator".to_string(),
                title: "Administrateur".to_string(),
                inherits: Some(vec!["contributor".to_string()]),
            },
        );
        roles.insert(
            2,
            Role {
                id: 2,
                name: "contributor".to_string(),
                title: "Contributeur".to_string(),
                inherits: None,
            },
        );
        Self {
            categories: RwLock::new(HashMap::new()),
            tags: RwLock::new(HashMap::new()),
            meshes: RwLock::new(HashMap::new()),
            users: RwLock::new(HashMap::new()),
            roles: RwLock::new(roles),
            mesh_tags: RwLock::new(HashMap::new()),
            images: RwLock::new(HashMap::new()),
            user_roles: RwLock::new(HashMap::new()),
            events: RwLock::new(Vec::new()),
            next_id: AtomicI64::new(100),
            fail: AtomicBool::new(false),
        }
    }

    fn alloc_id(&self) -> i64 {
        self.next_id.fetch_add(1, AtomicOrdering::SeqCst)
    }

    fn check_failure(&self) -> Result<()> {
        if self.fail.load(AtomicOrdering::SeqCst) {
            bail!("mock store failure injected");
        }
        Ok(())
    }

    // ========================================================================
    // Builder / seeding methods for tests
    // ========================================================================

    /// Make every facet query fail from now on.
    pub fn with_failing_queries(self) -> Self {
        self.fail.store(true, AtomicOrdering::SeqCst);
        self
    }

    /// Seed a category.
    pub async fn with_category(self, category: Category) -> Self {
        self.categories.write().await.insert(category.id, category);
        self
    }

    /// Seed a tag.
    pub async fn with_tag(self, tag: Tag) -> Self {
        self.tags.write().await.insert(tag.id, tag);
        self
    }

    /// Seed a mesh with its tag associations. Normalized text columns are
    /// derived here, as the real store does on insert.
    pub async fn with_mesh(self, mut mesh: Mesh, tags: Vec<i64>) -> Self {
        mesh.title_norm = keyword::normalize(&mesh.title);
        mesh.description_norm = mesh.description.as_deref().map(keyword::normalize);
        self.mesh_tags.write().await.insert(mesh.id, tags);
        self.meshes.write().await.insert(mesh.id, mesh);
        self
    }

    /// Seed a user.
    pub async fn with_user(self, user: User) -> Self {
        self.users.write().await.insert(user.id, user);
        self
    }

    /// Seed a role assignment by role name.
    pub async fn with_user_role(self, user_id: i64, role_name: &str) -> Self {
        let role_id = self
            .roles
            .read()
            .await
            .values()
            .find(|r| r.name == role_name)
            .map(|r| r.id);
        if let Some(role_id) = role_id {
            self.user_roles
                .write()
                .await
                .entry(user_id)
                .or_default()
                .push(role_id);
        }
        self
    }

    // ========================================================================
    // Shared lookup helpers
    // ========================================================================

    async fn tags_of_mesh(&self, mesh_id: i64) -> Vec<i64> {
        self.mesh_tags
            .read()
            .await
            .get(&mesh_id)
            .cloned()
            .unwrap_or_default()
    }

    async fn resolved_tags(&self, ids: &[i64]) -> Vec<Tag> {
        let tags = self.tags.read().await;
        let mut resolved: Vec<Tag> = ids.iter().filter_map(|id| tags.get(id).cloned()).collect();
        sort_by_title(&mut resolved, |t| (&t.title, t.id));
        resolved
    }

    async fn matching_meshes(&self, selection: &FacetSelection) -> Vec<Mesh> {
        let meshes = self.meshes.read().await;
        let mesh_tags = self.mesh_tags.read().await;
        let mut matched: Vec<Mesh> = meshes
            .values()
            .filter(|mesh| {
                let tags = mesh_tags.get(&mesh.id).map(Vec::as_slice).unwrap_or(&[]);
                selection.matches(
                    tags,
                    &mesh.title_norm,
                    mesh.description_norm.as_deref().unwrap_or(""),
                )
            })
            .cloned()
            .collect();
        matched.sort_by_key(|m| m.id);
        matched
    }
}

fn sort_by_title<T, F>(items: &mut [T], key: F)
where
    F: Fn(&T) -> (&String, i64),
{
    items.sort_by(|a, b| {
        let (title_a, id_a) = key(a);
        let (title_b, id_b) = key(b);
        title_a
            .to_lowercase()
            .cmp(&title_b.to_lowercase())
            .then(id_a.cmp(&id_b))
    });
}

fn compare_meshes(sort: &SortSpec, a: &Mesh, b: &Mesh) -> Ordering {
    let ordering = match sort.column {
        SortColumn::Title => a.title.to_lowercase().cmp(&b.title.to_lowercase()),
        SortColumn::Cells => a.cells.cmp(&b.cells),
        SortColumn::Vertices => a.vertices.cmp(&b.vertices),
        SortColumn::Created => a.created.cmp(&b.created),
    };
    let ordering = if sort.reverse {
        ordering.reverse()
    } else {
        ordering
    };
    ordering.then(a.id.cmp(&b.id))
}

#[async_trait]
impl CatalogStore for MockCatalogStore {
    async fn health_check(&self) -> Result<()> {
        self.check_failure()
    }

    // ========================================================================
    // Category operations
    // ========================================================================

    async fn list_categories_with_tags(&self) -> Result<Vec<CategoryWithTags>> {
        let mut categories: Vec<Category> = self.categories.read().await.values().cloned().collect();
        sort_by_title(&mut categories, |c| (&c.title, c.id));

        let all_tags = self.tags.read().await;
        Ok(categories
            .into_iter()
            .map(|category| {
                let mut tags: Vec<Tag> = all_tags
                    .values()
                    .filter(|t| t.categories_id == category.id)
                    .cloned()
                    .collect();
                sort_by_title(&mut tags, |t| (&t.title, t.id));
                CategoryWithTags { category, tags }
            })
            .collect())
    }

    async fn get_category(&self, id: i64) -> Result<Option<Category>> {
        Ok(self.categories.read().await.get(&id).cloned())
    }

    async fn create_category(&self, title: &str, color: &str, protected: bool) -> Result<Category> {
        let now = Utc::now();
        let category = Category {
            id: self.alloc_id(),
            title: title.to_string(),
            color: color.to_string(),
            protected,
            created: now,
            updated: now,
        };
        self.categories
            .write()
            .await
            .insert(category.id, category.clone());
        Ok(category)
    }

    async fn update_category(
        &self,
        id: i64,
        title: Option<String>,
        color: Option<String>,
    ) -> Result<Option<Category>> {
        let mut categories = self.categories.write().await;
        let Some(category) = categories.get_mut(&id) else {
            return Ok(None);
        };
        if let Some(title) = title {
            category.title = title;
        }
        if let Some(color) = color {
            category.color = color;
        }
        category.updated = Utc::now();
        Ok(Some(category.clone()))
    }

    async fn delete_category(&self, id: i64) -> Result<bool> {
        Ok(self.categories.write().await.remove(&id).is_some())
    }

    async fn count_category_tags(&self, id: i64) -> Result<i64> {
        Ok(self
            .tags
            .read()
            .await
            .values()
            .filter(|t| t.categories_id == id)
            .count() as i64)
    }

    // ========================================================================
    // Tag operations
    // ========================================================================

    async fn get_tag(&self, id: i64) -> Result<Option<Tag>> {
        Ok(self.tags.read().await.get(&id).cloned())
    }

    async fn create_tag(&self, categories_id: i64, title: &str, protected: bool) -> Result<Tag> {
        let now = Utc::now();
        let tag = Tag {
            id: self.alloc_id(),
            categories_id,
            title: title.to_string(),
            protected,
            created: now,
            updated: now,
        };
        self.tags.write().await.insert(tag.id, tag.clone());
        Ok(tag)
    }

    async fn update_tag(
        &self,
        id: i64,
        title: Option<String>,
        categories_id: Option<i64>,
    ) -> Result<Option<Tag>> {
        let mut tags = self.tags.write().await;
        let Some(tag) = tags.get_mut(&id) else {
            return Ok(None);
        };
        if let Some(title) = title {
            tag.title = title;
        }
        if let Some(categories_id) = categories_id {
            tag.categories_id = categories_id;
        }
        tag.updated = Utc::now();
        Ok(Some(tag.clone()))
    }

    async fn delete_tag(&self, id: i64) -> Result<bool> {
        let removed = self.tags.write().await.remove(&id).is_some();
        if removed {
            for tags in self.mesh_tags.write().await.values_mut() {
                tags.retain(|t| *t != id);
            }
        }
        Ok(removed)
    }

    // ========================================================================
    // Facet queries
    // ========================================================================

    async fn facet_tags(&self, selection: &FacetSelection) -> Result<Vec<CategoryWithTags>> {
        self.check_failure()?;

        let mut categories: Vec<Category> = self.categories.read().await.values().cloned().collect();
        sort_by_title(&mut categories, |c| (&c.title, c.id));

        let mut surviving: Vec<Tag> = Vec::new();
        {
            let all_tags = self.tags.read().await;
            let meshes = self.meshes.read().await;
            let mesh_tags = self.mesh_tags.read().await;
            for tag in all_tags.values() {
                let narrowed = selection.with_tag(tag.id);
                let survives = meshes.values().any(|mesh| {
                    let tags = mesh_tags.get(&mesh.id).map(Vec::as_slice).unwrap_or(&[]);
                    narrowed.matches(
                        tags,
                        &mesh.title_norm,
                        mesh.description_norm.as_deref().unwrap_or(""),
                    )
                });
                if survives {
                    surviving.push(tag.clone());
                }
            }
        }
        sort_by_title(&mut surviving, |t| (&t.title, t.id));

        Ok(categories
            .into_iter()
            .filter_map(|category| {
                let tags: Vec<Tag> = surviving
                    .iter()
                    .filter(|t| t.categories_id == category.id)
                    .cloned()
                    .collect();
                if tags.is_empty() {
                    None
                } else {
                    Some(CategoryWithTags { category, tags })
                }
            })
            .collect())
    }

    async fn count_meshes(&self, selection: &FacetSelection) -> Result<i64> {
        self.check_failure()?;
        Ok(self.matching_meshes(selection).await.len() as i64)
    }

    async fn search_meshes(
        &self,
        selection: &FacetSelection,
        sort: &SortSpec,
        window: PageWindow,
    ) -> Result<SearchPage> {
        self.check_failure()?;

        let mut matched = self.matching_meshes(selection).await;
        matched.sort_by(|a, b| compare_meshes(sort, a, b));
        let count = matched.len() as i64;

        let mut results = Vec::new();
        for mesh in matched
            .into_iter()
            .skip(window.offset() as usize)
            .take(window.limit() as usize)
        {
            let tag_ids = self.tags_of_mesh(mesh.id).await;
            let tags = self.resolved_tags(&tag_ids).await;
            let images: Vec<MeshImage> = self
                .images
                .read()
                .await
                .get(&mesh.id)
                .map(|images| images.iter().filter(|i| i.is_default).cloned().collect())
                .unwrap_or_default();
            results.push(MeshSummary { mesh, tags, images });
        }
        Ok(SearchPage { count, results })
    }

    // ========================================================================
    // Mesh operations
    // ========================================================================

    async fn get_mesh(&self, id: i64) -> Result<Option<Mesh>> {
        Ok(self.meshes.read().await.get(&id).cloned())
    }

    async fn get_mesh_detail(&self, id: i64) -> Result<Option<MeshDetail>> {
        let Some(mesh) = self.meshes.read().await.get(&id).cloned() else {
            return Ok(None);
        };
        let tag_ids = self.tags_of_mesh(id).await;
        let tags = self.resolved_tags(&tag_ids).await;
        let mut images = self
            .images
            .read()
            .await
            .get(&id)
            .cloned()
            .unwrap_or_default();
        images.sort_by(|a, b| b.is_default.cmp(&a.is_default).then(a.id.cmp(&b.id)));
        let user = self.users.read().await.get(&mesh.users_id).map(|u| PublicUser {
            id: u.id,
            firstname: u.firstname.clone(),
            lastname: u.lastname.clone(),
        });

        let mut tags_categories = Vec::new();
        {
            let categories = self.categories.read().await;
            let mut seen: Vec<Category> = tags
                .iter()
                .filter_map(|t| categories.get(&t.categories_id).cloned())
                .collect();
            seen.sort_by_key(|c| c.id);
            seen.dedup_by_key(|c| c.id);
            sort_by_title(&mut seen, |c| (&c.title, c.id));
            for category in seen {
                let grouped: Vec<Tag> = tags
                    .iter()
                    .filter(|t| t.categories_id == category.id)
                    .cloned()
                    .collect();
                tags_categories.push(CategoryWithTags {
                    category,
                    tags: grouped,
                });
            }
        }

        Ok(Some(MeshDetail {
            mesh,
            tags,
            images,
            user,
            tags_categories,
        }))
    }

    async fn create_mesh(&self, mesh: &NewMesh) -> Result<i64> {
        let now = Utc::now();
        let id = self.alloc_id();
        let row = Mesh {
            id,
            users_id: mesh.users_id,
            title: mesh.title.clone(),
            title_norm: keyword::normalize(&mesh.title),
            description: mesh.description.clone(),
            description_norm: mesh.description.as_deref().map(keyword::normalize),
            vertices: mesh.vertices,
            cells: mesh.cells,
            filename: mesh.filename.clone(),
            filepath: mesh.filepath.clone(),
            filesize: mesh.filesize,
            filetype: mesh.filetype.clone(),
            created: now,
            updated: now,
        };
        let mut tag_ids = mesh.tags.clone();
        tag_ids.sort_unstable();
        tag_ids.dedup();
        self.mesh_tags.write().await.insert(id, tag_ids);
        let images: Vec<MeshImage> = mesh
            .images
            .iter()
            .map(|image| MeshImage {
                id: self.alloc_id(),
                meshes_id: id,
                filepath: image.filepath.clone(),
                thumbpath: image.thumbpath.clone(),
                is_default: image.is_default,
            })
            .collect();
        self.images.write().await.insert(id, images);
        self.meshes.write().await.insert(id, row);
        Ok(id)
    }

    async fn update_mesh(&self, id: i64, changes: &MeshChanges) -> Result<Option<Mesh>> {
        let mut meshes = self.meshes.write().await;
        let Some(mesh) = meshes.get_mut(&id) else {
            return Ok(None);
        };
        if let Some(title) = &changes.title {
            mesh.title = title.clone();
            mesh.title_norm = keyword::normalize(title);
        }
        if let Some(description) = &changes.description {
            let trimmed = description.trim();
            if trimmed.is_empty() {
                mesh.description = None;
                mesh.description_norm = None;
            } else {
                mesh.description = Some(trimmed.to_string());
                mesh.description_norm = Some(keyword::normalize(trimmed));
            }
        }
        if let Some(vertices) = changes.vertices {
            mesh.vertices = vertices;
        }
        if let Some(cells) = changes.cells {
            mesh.cells = cells;
        }
        mesh.updated = Utc::now();
        if let Some(tags) = &changes.tags {
            self.mesh_tags.write().await.insert(id, tags.clone());
        }
        Ok(Some(mesh.clone()))
    }

    async fn delete_mesh(&self, id: i64) -> Result<bool> {
        let removed = self.meshes.write().await.remove(&id).is_some();
        if removed {
            self.mesh_tags.write().await.remove(&id);
            self.images.write().await.remove(&id);
        }
        Ok(removed)
    }

    // ========================================================================
    // User / role operations
    // ========================================================================

    async fn create_user(&self, user: &NewUser) -> Result<User> {
        let mut users = self.users.write().await;
        if users
            .values()
            .any(|u| u.email.eq_ignore_ascii_case(&user.email))
        {
            bail!("email already registered");
        }
        let now = Utc::now();
        let row = User {
            id: self.alloc_id(),
            email: user.email.clone(),
            password: user.password_hash.clone(),
            firstname: user.firstname.clone(),
            lastname: user.lastname.clone(),
            confirmed: None,
            created: now,
            updated: now,
            deleted: None,
        };
        users.insert(row.id, row.clone());
        Ok(row)
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>> {
        Ok(self
            .users
            .read()
            .await
            .values()
            .find(|u| u.email.eq_ignore_ascii_case(email))
            .cloned())
    }

    async fn get_user(&self, id: i64) -> Result<Option<User>> {
        Ok(self.users.read().await.get(&id).cloned())
    }

    async fn list_users(&self) -> Result<Vec<UserWithRoles>> {
        let mut users: Vec<User> = self.users.read().await.values().cloned().collect();
        users.sort_by_key(|u| u.id);
        let mut result = Vec::new();
        for user in users {
            let roles = self.user_roles(user.id).await?;
            result.push(UserWithRoles { user, roles });
        }
        Ok(result)
    }

    async fn list_roles(&self) -> Result<Vec<Role>> {
        let mut roles: Vec<Role> = self.roles.read().await.values().cloned().collect();
        roles.sort_by_key(|r| r.id);
        Ok(roles)
    }

    async fn user_roles(&self, user_id: i64) -> Result<Vec<Role>> {
        let assigned = self
            .user_roles
            .read()
            .await
            .get(&user_id)
            .cloned()
            .unwrap_or_default();
        let roles = self.roles.read().await;
        let mut resolved: Vec<Role> = assigned
            .iter()
            .filter_map(|id| roles.get(id).cloned())
            .collect();
        resolved.sort_by_key(|r| r.id);
        resolved.dedup_by_key(|r| r.id);
        Ok(resolved)
    }

    async fn assign_role(&self, user_id: i64, role_name: &str) -> Result<()> {
        let role_id = self
            .roles
            .read()
            .await
            .values()
            .find(|r| r.name == role_name)
            .map(|r| r.id)
            .with_context(|| format!("unknown role: {role_name}"))?;
        let mut assignments = self.user_roles.write().await;
        let entry = assignments.entry(user_id).or_default();
        if !entry.contains(&role_id) {
            entry.push(role_id);
        }
        Ok(())
    }

    async fn confirm_user(&self, id: i64) -> Result<Option<User>> {
        let mut users = self.users.write().await;
        let Some(user) = users.get_mut(&id) else {
            return Ok(None);
        };
        if user.confirmed.is_none() {
            user.confirmed = Some(Utc::now());
            user.updated = Utc::now();
        }
        Ok(Some(user.clone()))
    }

    async fn delete_user(&self, id: i64) -> Result<bool> {
        let removed = self.users.write().await.remove(&id).is_some();
        if removed {
            self.user_roles.write().await.remove(&id);
        }
        Ok(removed)
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
    ) -> Result<()> {
        self.events.write().await.push((
            mesh_id,
            kind,
            user_id,
            anonymous_cookie.map(str::to_string),
        ));
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::facet::resolve_sort;
    use crate::store::sqlite::SqliteStore;

    /// Replay the same scenario into the mock and the real store through the
    /// trait. Each backend allocates its own ids, so the seeded tag ids are
    /// returned per store.
    async fn seed(store: &dyn CatalogStore) -> [i64; 2] {
        let shape = store.create_category("Forme", "#ff8800", false).await.unwrap();
        let sphere = store.create_tag(shape.id, "Sphère", false).await.unwrap();
        let cube = store.create_tag(shape.id, "Cube", false).await.unwrap();

        let meshes = [
            ("Boule lisse", Some("Une sphère parfaite"), vec![sphere.id]),
            ("Brique", None, vec![cube.id]),
            ("Dé arrondi", Some("Un cube aux coins doux"), vec![sphere.id, cube.id]),
            ("Plan nu", None, vec![]),
        ];
        for (title, description, tags) in meshes {
            store
                .create_mesh(&NewMesh {
                    users_id: 1,
                    title: title.to_string(),
                    description: description.map(str::to_string),
                    vertices: 8,
                    cells: 6,
                    filename: format!("{title}.vtu"),
                    filepath: format!("meshes/{title}.vtu"),
                    filesize: 64,
                    filetype: "vtu".to_string(),
                    tags,
                    images: vec![],
                })
                .await
                .unwrap();
        }
        [sphere.id, cube.id]
    }

    async fn seeded_pair() -> (tempfile::TempDir, SqliteStore, MockCatalogStore, [[i64; 2]; 2]) {
        let dir = tempfile::tempdir().unwrap();
        let sqlite = SqliteStore::connect(dir.path().join("parity.db"), 2)
            .await
            .unwrap();
        sqlite.migrate().await.unwrap();
        let mock = MockCatalogStore::new();

        let sqlite_tags = seed(&sqlite).await;
        let mock_tags = seed(&mock).await;
        (dir, sqlite, mock, [sqlite_tags, mock_tags])
    }

    fn selections(tags: [i64; 2]) -> Vec<FacetSelection> {
        let [sphere, cube] = tags;
        vec![
            FacetSelection::from_raw(Vec::<String>::new(), None),
            FacetSelection::from_raw([sphere.to_string()], None),
            FacetSelection::from_raw([cube.to_string()], None),
            FacetSelection::from_raw([sphere.to_string(), cube.to_string()], None),
            FacetSelection::from_raw(Vec::<String>::new(), Some("boule")),
            FacetSelection::from_raw(Vec::<String>::new(), Some("CUBE")),
            FacetSelection::from_raw([sphere.to_string()], Some("cube")),
            FacetSelection::from_raw(Vec::<String>::new(), Some("introuvable")),
        ]
    }

    #[tokio::test]
    async fn test_counts_agree_with_sqlite() {
        let (_dir, sqlite, mock, [sqlite_tags, mock_tags]) = seeded_pair().await;
        for (real_sel, mock_sel) in selections(sqlite_tags).iter().zip(selections(mock_tags).iter())
        {
            let real = sqlite.count_meshes(real_sel).await.unwrap();
            let mocked = CatalogStore::count_meshes(&mock, mock_sel).await.unwrap();
            assert_eq!(real, mocked, "count diverged for {:?}", real_sel);
        }
    }

    #[tokio::test]
    async fn test_search_pages_agree_with_sqlite() {
        let (_dir, sqlite, mock, [sqlite_tags, mock_tags]) = seeded_pair().await;
        let sort = resolve_sort(Some("title"));
        for (real_sel, mock_sel) in selections(sqlite_tags).iter().zip(selections(mock_tags).iter())
        {
            for window in [PageWindow::new(None, None), PageWindow::new(Some(2), Some(2))] {
                let real = sqlite.search_meshes(real_sel, sort, window).await.unwrap();
                let mocked = CatalogStore::search_meshes(&mock, mock_sel, sort, window)
                    .await
                    .unwrap();
                assert_eq!(real.count, mocked.count, "count diverged for {:?}", real_sel);
                let real_titles: Vec<&str> =
                    real.results.iter().map(|m| m.mesh.title.as_str()).collect();
                let mocked_titles: Vec<&str> =
                    mocked.results.iter().map(|m| m.mesh.title.as_str()).collect();
                assert_eq!(real_titles, mocked_titles, "page diverged for {:?}", real_sel);
            }
        }
    }

    #[tokio::test]
    async fn test_facet_universe_agrees_with_sqlite() {
        let (_dir, sqlite, mock, [sqlite_tags, mock_tags]) = seeded_pair().await;
        let flatten = |tree: &[CategoryWithTags]| -> Vec<(String, Vec<String>)> {
            tree.iter()
                .map(|c| {
                    (
                        c.category.title.clone(),
                        c.tags.iter().map(|t| t.title.clone()).collect(),
                    )
                })
                .collect()
        };
        for (real_sel, mock_sel) in selections(sqlite_tags).iter().zip(selections(mock_tags).iter())
        {
            let real = sqlite.facet_tags(&real_sel.keyword_only()).await.unwrap();
            let mocked = CatalogStore::facet_tags(&mock, &mock_sel.keyword_only())
                .await
                .unwrap();
            assert_eq!(
                flatten(&real),
                flatten(&mocked),
                "facet universe diverged for {:?}",
                real_sel
            );
        }
    }
}
