//! SQLite-backed catalog store.
//!
//! All SQL lives here as inherent methods on `SqliteStore`; the
//! `CatalogStore` trait impl delegates to these. Facet predicates are
//! rendered by [`push_selection`], the single parameterized counterpart of
//! `FacetSelection::matches`, shared by every facet-aware query.

use std::collections::HashMap;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::Utc;
use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous,
};
use sqlx::{QueryBuilder, Sqlite, SqlitePool};

use crate::facet::keyword;
use crate::facet::{FacetSelection, PageWindow, SortColumn, SortSpec};
use crate::store::models::*;

/// Embedded schema, executed at startup. Every statement is idempotent.
///
/// `meshes.users_id` and `events.meshes_id` deliberately carry no foreign
/// key: audit rows and uploads must survive the physical deletion of the
/// user or mesh they point at. Primary keys are AUTOINCREMENT so deleted
/// ids are never reused under surviving event rows.
const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS categories (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    title TEXT NOT NULL,
    color TEXT NOT NULL,
    protected INTEGER NOT NULL DEFAULT 0,
    created TEXT NOT NULL,
    updated TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS tags (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    categories_id INTEGER NOT NULL REFERENCES categories(id),
    title TEXT NOT NULL,
    protected INTEGER NOT NULL DEFAULT 0,
    created TEXT NOT NULL,
    updated TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS meshes (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    users_id INTEGER NOT NULL,
    title TEXT NOT NULL,
    title_norm TEXT NOT NULL,
    description TEXT,
    description_norm TEXT,
    vertices INTEGER NOT NULL,
    cells INTEGER NOT NULL,
    filename TEXT NOT NULL,
    filepath TEXT NOT NULL,
    filesize INTEGER NOT NULL,
    filetype TEXT NOT NULL,
    created TEXT NOT NULL,
    updated TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS meshes_tags (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    meshes_id INTEGER NOT NULL REFERENCES meshes(id) ON DELETE CASCADE,
    tags_id INTEGER NOT NULL REFERENCES tags(id) ON DELETE CASCADE,
    UNIQUE (meshes_id, tags_id)
);

CREATE INDEX IF NOT EXISTS idx_meshes_tags_tags_id ON meshes_tags (tags_id);

CREATE TABLE IF NOT EXISTS images (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    meshes_id INTEGER NOT NULL REFERENCES meshes(id) ON DELETE CASCADE,
    filepath TEXT NOT NULL,
    thumbpath TEXT NOT NULL,
    is_default INTEGER NOT NULL DEFAULT 0
);

CREATE INDEX IF NOT EXISTS idx_images_meshes_id ON images (meshes_id);

CREATE TABLE IF NOT EXISTS users (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    email TEXT NOT NULL,
    password TEXT NOT NULL,
    firstname TEXT NOT NULL,
    lastname TEXT NOT NULL,
    confirmed TEXT,
    created TEXT NOT NULL,
    updated TEXT NOT NULL,
    deleted TEXT
);

CREATE UNIQUE INDEX IF NOT EXISTS idx_users_email ON users (lower(email));

CREATE TABLE IF NOT EXISTS roles (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL UNIQUE,
    title TEXT NOT NULL,
    inherits TEXT
);

CREATE TABLE IF NOT EXISTS users_roles (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    users_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    roles_id INTEGER NOT NULL REFERENCES roles(id) ON DELETE CASCADE,
    UNIQUE (users_id, roles_id)
);

CREATE TABLE IF NOT EXISTS action_types (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    title TEXT NOT NULL UNIQUE,
    sentence_title TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS events (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    users_id INTEGER,
    anonymous_user_cookie TEXT,
    meshes_id INTEGER NOT NULL,
    action_types_id INTEGER NOT NULL REFERENCES action_types(id),
    created TEXT NOT NULL
);
"#;

/// Reference rows. `INSERT OR IGNORE` keyed on the unique name/title makes
/// re-seeding a no-op.
const SEEDS: &str = r#"
INSERT OR IGNORE INTO roles (name, title, inherits) VALUES
    ('administrator', 'Administrateur', '["contributor"]'),
    ('contributor', 'Contributeur', NULL);

INSERT OR IGNORE INTO action_types (title, sentence_title) VALUES
    ('view', 'a consulté le fichier'),
    ('download', 'a téléchargé le fichier'),
    ('upload', 'a ajouté le fichier'),
    ('edit', 'a modifié le fichier'),
    ('delete', 'a supprimé le fichier');
"#;

/// SQLite-backed catalog store.
pub struct SqliteStore {
    pool: SqlitePool,
}

/// Appends the WHERE fragment for a selection: the tag intersection and the
/// keyword OR-group, every value bound, starting from a neutral `1 = 1` so
/// callers can always write `WHERE ` before it. Tokens are alphanumeric by
/// construction, so no LIKE metacharacter ever reaches the pattern.
fn push_selection(qb: &mut QueryBuilder<'_, Sqlite>, selection: &FacetSelection) {
    qb.push("1 = 1");
    if selection.has_tags() {
        qb.push(" AND meshes.id IN (");
        let mut first = true;
        for tag in selection.tags() {
            if !first {
                qb.push(" INTERSECT ");
            }
            first = false;
            qb.push("SELECT meshes_id FROM meshes_tags WHERE tags_id = ");
            qb.push_bind(tag);
        }
        qb.push(")");
    }
    if selection.has_keyword() {
        qb.push(" AND (");
        let mut first = true;
        for token in selection.tokens() {
            if !first {
                qb.push(" OR ");
            }
            first = false;
            let pattern = format!("%{token}%");
            qb.push("meshes.title_norm LIKE ");
            qb.push_bind(pattern.clone());
            qb.push(" OR meshes.description_norm LIKE ");
            qb.push_bind(pattern);
        }
        qb.push(")");
    }
}

/// ORDER BY clause for a sort entry. Input comes from the static sort
/// table, never from the request.
fn order_clause(sort: &SortSpec) -> String {
    let column = match sort.column {
        SortColumn::Title => "meshes.title COLLATE NOCASE",
        SortColumn::Cells => "meshes.cells",
        SortColumn::Vertices => "meshes.vertices",
        SortColumn::Created => "meshes.created",
    };
    let direction = if sort.reverse { "DESC" } else { "ASC" };
    format!("{column} {direction}, meshes.id ASC")
}

#[derive(sqlx::FromRow)]
struct MeshTagRow {
    meshes_id: i64,
    #[sqlx(flatten)]
    tag: Tag,
}

#[derive(sqlx::FromRow)]
struct UserRoleRow {
    users_id: i64,
    #[sqlx(flatten)]
    role: Role,
}

impl SqliteStore {
    /// Open (creating if needed) the database at `path`. WAL journaling and
    /// a busy timeout keep concurrent request handling off the
    /// "database is locked" path. Call [`migrate`](Self::migrate) before
    /// serving.
    pub async fn connect(path: impl AsRef<Path>, max_connections: u32) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("failed to create {}", parent.display()))?;
            }
        }

        let options =
            SqliteConnectOptions::from_str(&format!("sqlite:{}?mode=rwc", path.display()))?
                .create_if_missing(true)
                .journal_mode(SqliteJournalMode::Wal)
                .synchronous(SqliteSynchronous::Normal)
                .foreign_keys(true)
                .busy_timeout(Duration::from_secs(5));

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await
            .with_context(|| format!("failed to open catalog database at {}", path.display()))?;

        Ok(Self { pool })
    }

    /// Apply the embedded schema and seed rows. Idempotent.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::raw_sql(SCHEMA)
            .execute(&self.pool)
            .await
            .context("schema migration failed")?;
        sqlx::raw_sql(SEEDS)
            .execute(&self.pool)
            .await
            .context("seeding reference rows failed")?;
        Ok(())
    }

    pub async fn health_check(&self) -> Result<()> {
        let _: i64 = sqlx::query_scalar("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .context("database health check failed")?;
        Ok(())
    }

    // ========================================================================
    // Categories
    // ========================================================================

    pub async fn list_categories_with_tags(&self) -> Result<Vec<CategoryWithTags>> {
        let categories: Vec<Category> =
            sqlx::query_as("SELECT * FROM categories ORDER BY title COLLATE NOCASE ASC, id ASC")
                .fetch_all(&self.pool)
                .await?;
        let tags: Vec<Tag> =
            sqlx::query_as("SELECT * FROM tags ORDER BY title COLLATE NOCASE ASC, id ASC")
                .fetch_all(&self.pool)
                .await?;

        let mut grouped: HashMap<i64, Vec<Tag>> = HashMap::new();
        for tag in tags {
            grouped.entry(tag.categories_id).or_default().push(tag);
        }
        Ok(categories
            .into_iter()
            .map(|category| {
                let tags = grouped.remove(&category.id).unwrap_or_default();
                CategoryWithTags { category, tags }
            })
            .collect())
    }

    pub async fn get_category(&self, id: i64) -> Result<Option<Category>> {
        let category = sqlx::query_as("SELECT * FROM categories WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(category)
    }

    pub async fn create_category(
        &self,
        title: &str,
        color: &str,
        protected: bool,
    ) -> Result<Category> {
        let now = Utc::now();
        let id = sqlx::query(
            "INSERT INTO categories (title, color, protected, created, updated) \
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(title)
        .bind(color)
        .bind(protected)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await?
        .last_insert_rowid();

        let category = sqlx::query_as("SELECT * FROM categories WHERE id = ?")
            .bind(id)
            .fetch_one(&self.pool)
            .await?;
        Ok(category)
    }

    pub async fn update_category(
        &self,
        id: i64,
        title: Option<String>,
        color: Option<String>,
    ) -> Result<Option<Category>> {
        let mut qb = QueryBuilder::<Sqlite>::new("UPDATE categories SET updated = ");
        qb.push_bind(Utc::now());
        if let Some(title) = title {
            qb.push(", title = ");
            qb.push_bind(title);
        }
        if let Some(color) = color {
            qb.push(", color = ");
            qb.push_bind(color);
        }
        qb.push(" WHERE id = ");
        qb.push_bind(id);
        if qb.build().execute(&self.pool).await?.rows_affected() == 0 {
            return Ok(None);
        }
        self.get_category(id).await
    }

    pub async fn delete_category(&self, id: i64) -> Result<bool> {
        let result = sqlx::query("DELETE FROM categories WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn count_category_tags(&self, id: i64) -> Result<i64> {
        let count = sqlx::query_scalar("SELECT COUNT(*) FROM tags WHERE categories_id = ?")
            .bind(id)
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    // ========================================================================
    // Tags
    // ========================================================================

    pub async fn get_tag(&self, id: i64) -> Result<Option<Tag>> {
        let tag = sqlx::query_as("SELECT * FROM tags WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(tag)
    }

    pub async fn create_tag(
        &self,
        categories_id: i64,
        title: &str,
        protected: bool,
    ) -> Result<Tag> {
        let now = Utc::now();
        let id = sqlx::query(
            "INSERT INTO tags (categories_id, title, protected, created, updated) \
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(categories_id)
        .bind(title)
        .bind(protected)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await?
        .last_insert_rowid();

        let tag = sqlx::query_as("SELECT * FROM tags WHERE id = ?")
            .bind(id)
            .fetch_one(&self.pool)
            .await?;
        Ok(tag)
    }

    pub async fn update_tag(
        &self,
        id: i64,
        title: Option<String>,
        categories_id: Option<i64>,
    ) -> Result<Option<Tag>> {
        let mut qb = QueryBuilder::<Sqlite>::new("UPDATE tags SET updated = ");
        qb.push_bind(Utc::now());
        if let Some(title) = title {
            qb.push(", title = ");
            qb.push_bind(title);
        }
        if let Some(categories_id) = categories_id {
            qb.push(", categories_id = ");
            qb.push_bind(categories_id);
        }
        qb.push(" WHERE id = ");
        qb.push_bind(id);
        if qb.build().execute(&self.pool).await?.rows_affected() == 0 {
            return Ok(None);
        }
        self.get_tag(id).await
    }

    pub async fn delete_tag(&self, id: i64) -> Result<bool> {
        let result = sqlx::query("DELETE FROM tags WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    // ========================================================================
    // Facet queries
    // ========================================================================

    pub async fn facet_tags(&self, selection: &FacetSelection) -> Result<Vec<CategoryWithTags>> {
        let categories: Vec<Category> =
            sqlx::query_as("SELECT * FROM categories ORDER BY title COLLATE NOCASE ASC, id ASC")
                .fetch_all(&self.pool)
                .await?;

        let mut qb = QueryBuilder::<Sqlite>::new(
            "SELECT tags.* FROM tags WHERE EXISTS (\
             SELECT 1 FROM meshes \
             INNER JOIN meshes_tags ON meshes.id = meshes_tags.meshes_id \
             WHERE meshes_tags.tags_id = tags.id AND ",
        );
        push_selection(&mut qb, selection);
        qb.push(") ORDER BY tags.title COLLATE NOCASE ASC, tags.id ASC");
        let tags: Vec<Tag> = qb.build_query_as().fetch_all(&self.pool).await?;

        let mut grouped: HashMap<i64, Vec<Tag>> = HashMap::new();
        for tag in tags {
            grouped.entry(tag.categories_id).or_default().push(tag);
        }
        // Categories whose every tag was pruned disappear from the tree.
        Ok(categories
            .into_iter()
            .filter_map(|category| {
                grouped
                    .remove(&category.id)
                    .map(|tags| CategoryWithTags { category, tags })
            })
            .collect())
    }

    pub async fn count_meshes(&self, selection: &FacetSelection) -> Result<i64> {
        let mut qb = QueryBuilder::<Sqlite>::new("SELECT COUNT(*) FROM meshes WHERE ");
        push_selection(&mut qb, selection);
        let count: i64 = qb.build_query_scalar().fetch_one(&self.pool).await?;
        Ok(count)
    }

    pub async fn search_meshes(
        &self,
        selection: &FacetSelection,
        sort: &SortSpec,
        window: PageWindow,
    ) -> Result<SearchPage> {
        // Count and page run in one transaction so they see the same rows.
        let mut tx = self.pool.begin().await?;

        let mut count_qb = QueryBuilder::<Sqlite>::new("SELECT COUNT(*) FROM meshes WHERE ");
        push_selection(&mut count_qb, selection);
        let count: i64 = count_qb.build_query_scalar().fetch_one(&mut *tx).await?;

        let mut page_qb = QueryBuilder::<Sqlite>::new("SELECT meshes.* FROM meshes WHERE ");
        push_selection(&mut page_qb, selection);
        page_qb.push(" ORDER BY ");
        page_qb.push(order_clause(sort));
        page_qb.push(" LIMIT ");
        page_qb.push_bind(window.limit());
        page_qb.push(" OFFSET ");
        page_qb.push_bind(window.offset());
        let meshes: Vec<Mesh> = page_qb.build_query_as().fetch_all(&mut *tx).await?;

        let ids: Vec<i64> = meshes.iter().map(|m| m.id).collect();
        let mut tags_by_mesh: HashMap<i64, Vec<Tag>> = HashMap::new();
        let mut images_by_mesh: HashMap<i64, Vec<MeshImage>> = HashMap::new();
        if !ids.is_empty() {
            let mut tags_qb = QueryBuilder::<Sqlite>::new(
                "SELECT meshes_tags.meshes_id AS meshes_id, tags.* FROM tags \
                 INNER JOIN meshes_tags ON tags.id = meshes_tags.tags_id \
                 WHERE meshes_tags.meshes_id IN (",
            );
            let mut separated = tags_qb.separated(", ");
            for id in &ids {
                separated.push_bind(*id);
            }
            tags_qb.push(") ORDER BY tags.title COLLATE NOCASE ASC, tags.id ASC");
            let rows: Vec<MeshTagRow> = tags_qb.build_query_as().fetch_all(&mut *tx).await?;
            for row in rows {
                tags_by_mesh.entry(row.meshes_id).or_default().push(row.tag);
            }

            let mut images_qb = QueryBuilder::<Sqlite>::new(
                "SELECT * FROM images WHERE is_default = 1 AND meshes_id IN (",
            );
            let mut separated = images_qb.separated(", ");
            for id in &ids {
                separated.push_bind(*id);
            }
            images_qb.push(") ORDER BY id ASC");
            let images: Vec<MeshImage> = images_qb.build_query_as().fetch_all(&mut *tx).await?;
            for image in images {
                images_by_mesh.entry(image.meshes_id).or_default().push(image);
            }
        }
        tx.commit().await?;

        let results = meshes
            .into_iter()
            .map(|mesh| {
                let tags = tags_by_mesh.remove(&mesh.id).unwrap_or_default();
                let images = images_by_mesh.remove(&mesh.id).unwrap_or_default();
                MeshSummary { mesh, tags, images }
            })
            .collect();
        Ok(SearchPage { count, results })
    }

    // ========================================================================
    // Meshes
    // ========================================================================

    pub async fn get_mesh(&self, id: i64) -> Result<Option<Mesh>> {
        let mesh = sqlx::query_as("SELECT * FROM meshes WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(mesh)
    }

    pub async fn get_mesh_detail(&self, id: i64) -> Result<Option<MeshDetail>> {
        let Some(mesh) = self.get_mesh(id).await? else {
            return Ok(None);
        };

        let tags: Vec<Tag> = sqlx::query_as(
            "SELECT tags.* FROM tags \
             INNER JOIN meshes_tags ON tags.id = meshes_tags.tags_id \
             WHERE meshes_tags.meshes_id = ? \
             ORDER BY tags.title COLLATE NOCASE ASC, tags.id ASC",
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await?;

        let images: Vec<MeshImage> =
            sqlx::query_as("SELECT * FROM images WHERE meshes_id = ? ORDER BY is_default DESC, id ASC")
                .bind(id)
                .fetch_all(&self.pool)
                .await?;

        let user: Option<PublicUser> =
            sqlx::query_as("SELECT id, firstname, lastname FROM users WHERE id = ?")
                .bind(mesh.users_id)
                .fetch_optional(&self.pool)
                .await?;

        let tags_categories = if tags.is_empty() {
            Vec::new()
        } else {
            let mut grouped: HashMap<i64, Vec<Tag>> = HashMap::new();
            for tag in &tags {
                grouped.entry(tag.categories_id).or_default().push(tag.clone());
            }
            let mut qb = QueryBuilder::<Sqlite>::new("SELECT * FROM categories WHERE id IN (");
            let mut separated = qb.separated(", ");
            for categories_id in grouped.keys() {
                separated.push_bind(*categories_id);
            }
            qb.push(") ORDER BY title COLLATE NOCASE ASC, id ASC");
            let categories: Vec<Category> = qb.build_query_as().fetch_all(&self.pool).await?;
            categories
                .into_iter()
                .map(|category| {
                    let tags = grouped.remove(&category.id).unwrap_or_default();
                    CategoryWithTags { category, tags }
                })
                .collect()
        };

        Ok(Some(MeshDetail {
            mesh,
            tags,
            images,
            user,
            tags_categories,
        }))
    }

    pub async fn create_mesh(&self, mesh: &NewMesh) -> Result<i64> {
        let now = Utc::now();
        let title_norm = keyword::normalize(&mesh.title);
        let description_norm = mesh.description.as_deref().map(keyword::normalize);

        let mut tx = self.pool.begin().await?;
        let id = sqlx::query(
            "INSERT INTO meshes (users_id, title, title_norm, description, description_norm, \
             vertices, cells, filename, filepath, filesize, filetype, created, updated) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(mesh.users_id)
        .bind(&mesh.title)
        .bind(&title_norm)
        .bind(&mesh.description)
        .bind(&description_norm)
        .bind(mesh.vertices)
        .bind(mesh.cells)
        .bind(&mesh.filename)
        .bind(&mesh.filepath)
        .bind(mesh.filesize)
        .bind(&mesh.filetype)
        .bind(now)
        .bind(now)
        .execute(&mut *tx)
        .await?
        .last_insert_rowid();

        for tag in &mesh.tags {
            sqlx::query("INSERT OR IGNORE INTO meshes_tags (meshes_id, tags_id) VALUES (?, ?)")
                .bind(id)
                .bind(tag)
                .execute(&mut *tx)
                .await?;
        }
        for image in &mesh.images {
            sqlx::query(
                "INSERT INTO images (meshes_id, filepath, thumbpath, is_default) \
                 VALUES (?, ?, ?, ?)",
            )
            .bind(id)
            .bind(&image.filepath)
            .bind(&image.thumbpath)
            .bind(image.is_default)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(id)
    }

    pub async fn update_mesh(&self, id: i64, changes: &MeshChanges) -> Result<Option<Mesh>> {
        let mut tx = self.pool.begin().await?;

        let mut qb = QueryBuilder::<Sqlite>::new("UPDATE meshes SET updated = ");
        qb.push_bind(Utc::now());
        if let Some(title) = &changes.title {
            qb.push(", title = ");
            qb.push_bind(title.clone());
            qb.push(", title_norm = ");
            qb.push_bind(keyword::normalize(title));
        }
        if let Some(description) = &changes.description {
            let trimmed = description.trim();
            if trimmed.is_empty() {
                qb.push(", description = NULL, description_norm = NULL");
            } else {
                qb.push(", description = ");
                qb.push_bind(trimmed.to_owned());
                qb.push(", description_norm = ");
                qb.push_bind(keyword::normalize(trimmed));
            }
        }
        if let Some(vertices) = changes.vertices {
            qb.push(", vertices = ");
            qb.push_bind(vertices);
        }
        if let Some(cells) = changes.cells {
            qb.push(", cells = ");
            qb.push_bind(cells);
        }
        qb.push(" WHERE id = ");
        qb.push_bind(id);
        if qb.build().execute(&mut *tx).await?.rows_affected() == 0 {
            return Ok(None);
        }

        if let Some(tags) = &changes.tags {
            sqlx::query("DELETE FROM meshes_tags WHERE meshes_id = ?")
                .bind(id)
                .execute(&mut *tx)
                .await?;
            for tag in tags {
                sqlx::query("INSERT OR IGNORE INTO meshes_tags (meshes_id, tags_id) VALUES (?, ?)")
                    .bind(id)
                    .bind(tag)
                    .execute(&mut *tx)
                    .await?;
            }
        }

        let mesh: Mesh = sqlx::query_as("SELECT * FROM meshes WHERE id = ?")
            .bind(id)
            .fetch_one(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(Some(mesh))
    }

    pub async fn delete_mesh(&self, id: i64) -> Result<bool> {
        let result = sqlx::query("DELETE FROM meshes WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    // ========================================================================
    // Users and roles
    // ========================================================================

    pub async fn create_user(&self, user: &NewUser) -> Result<User> {
        let now = Utc::now();
        let id = sqlx::query(
            "INSERT INTO users (email, password, firstname, lastname, created, updated) \
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(&user.firstname)
        .bind(&user.lastname)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await
        .context("failed to create user")?
        .last_insert_rowid();

        let user = sqlx::query_as("SELECT * FROM users WHERE id = ?")
            .bind(id)
            .fetch_one(&self.pool)
            .await?;
        Ok(user)
    }

    pub async fn find_user_by_email(&self, email: &str) -> Result<Option<User>> {
        let user = sqlx::query_as("SELECT * FROM users WHERE lower(email) = lower(?)")
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    pub async fn get_user(&self, id: i64) -> Result<Option<User>> {
        let user = sqlx::query_as("SELECT * FROM users WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    pub async fn list_users(&self) -> Result<Vec<UserWithRoles>> {
        let users: Vec<User> = sqlx::query_as("SELECT * FROM users ORDER BY id ASC")
            .fetch_all(&self.pool)
            .await?;
        let rows: Vec<UserRoleRow> = sqlx::query_as(
            "SELECT users_roles.users_id AS users_id, roles.* FROM roles \
             INNER JOIN users_roles ON roles.id = users_roles.roles_id \
             ORDER BY roles.id ASC",
        )
        .fetch_all(&self.pool)
        .await?;

        let mut grouped: HashMap<i64, Vec<Role>> = HashMap::new();
        for row in rows {
            grouped.entry(row.users_id).or_default().push(row.role);
        }
        Ok(users
            .into_iter()
            .map(|user| {
                let roles = grouped.remove(&user.id).unwrap_or_default();
                UserWithRoles { user, roles }
            })
            .collect())
    }

    pub async fn list_roles(&self) -> Result<Vec<Role>> {
        let roles = sqlx::query_as("SELECT * FROM roles ORDER BY id ASC")
            .fetch_all(&self.pool)
            .await?;
        Ok(roles)
    }

    pub async fn user_roles(&self, user_id: i64) -> Result<Vec<Role>> {
        let roles = sqlx::query_as(
            "SELECT roles.* FROM roles \
             INNER JOIN users_roles ON roles.id = users_roles.roles_id \
             WHERE users_roles.users_id = ? ORDER BY roles.id ASC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(roles)
    }

    pub async fn assign_role(&self, user_id: i64, role_name: &str) -> Result<()> {
        let role_id: Option<i64> = sqlx::query_scalar("SELECT id FROM roles WHERE name = ?")
            .bind(role_name)
            .fetch_optional(&self.pool)
            .await?;
        let role_id = role_id.with_context(|| format!("unknown role: {role_name}"))?;
        sqlx::query("INSERT OR IGNORE INTO users_roles (users_id, roles_id) VALUES (?, ?)")
            .bind(user_id)
            .bind(role_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn confirm_user(&self, id: i64) -> Result<Option<User>> {
        let now = Utc::now();
        sqlx::query("UPDATE users SET confirmed = ?, updated = ? WHERE id = ? AND confirmed IS NULL")
            .bind(now)
            .bind(now)
            .bind(id)
            .execute(&self.pool)
            .await?;
        self.get_user(id).await
    }

    pub async fn delete_user(&self, id: i64) -> Result<bool> {
        let result = sqlx::query("DELETE FROM users WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    // ========================================================================
    // Audit events
    // ========================================================================

    pub async fn record_event(
        &self,
        mesh_id: i64,
        kind: ActionKind,
        user_id: Option<i64>,
        anonymous_cookie: Option<&str>,
    ) -> Result<()> {
        let result = sqlx::query(
            "INSERT INTO events (users_id, anonymous_user_cookie, meshes_id, action_types_id, created) \
             SELECT ?, ?, ?, id, ? FROM action_types WHERE title = ?",
        )
        .bind(user_id)
        .bind(anonymous_cookie)
        .bind(mesh_id)
        .bind(Utc::now())
        .bind(kind.as_str())
        .execute(&self.pool)
        .await?;
        anyhow::ensure!(
            result.rows_affected() == 1,
            "unknown action type: {}",
            kind.as_str()
        );
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================
