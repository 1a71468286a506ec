//! Catalog entities and the composite shapes returned to API clients.
//!
//! Row structs map 1:1 onto table columns (sqlx `FromRow` by name); the
//! wire format is camelCase with internal columns (normalized text, storage
//! paths, password hashes) never serialized.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ============================================================================
// Taxonomy rows
// ============================================================================

/// A facet category grouping tags (e.g. "Forme", "Taille").
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Category {
    pub id: i64,
    pub title: String,
    /// Display color, `#rrggbb`.
    pub color: String,
    /// Protected rows are seeded by operators and refuse edit/delete.
    pub protected: bool,
    pub created: DateTime<Utc>,
    pub updated: DateTime<Utc>,
}

/// A tag, always owned by exactly one category.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Tag {
    pub id: i64,
    pub categories_id: i64,
    pub title: String,
    pub protected: bool,
    pub created: DateTime<Utc>,
    pub updated: DateTime<Utc>,
}

// ============================================================================
// Mesh rows
// ============================================================================

/// A mesh file record. `title_norm`/`description_norm` hold the normalized
/// text the keyword search runs against and never leave the server;
/// `filepath` is the private storage location of the mesh file itself.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Mesh {
    pub id: i64,
    pub users_id: i64,
    pub title: String,
    #[serde(skip)]
    pub title_norm: String,
    pub description: Option<String>,
    #[serde(skip)]
    pub description_norm: Option<String>,
    pub vertices: i64,
    pub cells: i64,
    pub filename: String,
    #[serde(skip)]
    pub filepath: String,
    pub filesize: i64,
    pub filetype: String,
    pub created: DateTime<Utc>,
    pub updated: DateTime<Utc>,
}

/// An illustration attached to a mesh. Paths are relative to the public
/// file root and double as the URL paths under `/files/`.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct MeshImage {
    pub id: i64,
    pub meshes_id: i64,
    pub filepath: String,
    pub thumbpath: String,
    pub is_default: bool,
}

// ============================================================================
// Users and roles
// ============================================================================

/// A registered account. The bcrypt hash (salt embedded) is never
/// serialized. `confirmed` gates login; `deleted` is checked on every auth
/// path even though deletion is physical.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: i64,
    pub email: String,
    #[serde(skip)]
    pub password: String,
    pub firstname: String,
    pub lastname: String,
    pub confirmed: Option<DateTime<Utc>>,
    pub created: DateTime<Utc>,
    pub updated: DateTime<Utc>,
    pub deleted: Option<DateTime<Utc>>,
}

/// The owner fields exposed on a mesh detail.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct PublicUser {
    pub id: i64,
    pub firstname: String,
    pub lastname: String,
}

/// A role. `inherits` lists role names whose grants this role also
/// carries; stored as a JSON array, hence the manual row mapping.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Role {
    pub id: i64,
    pub name: String,
    pub title: String,
    pub inherits: Option<Vec<String>>,
}

impl<'r> sqlx::FromRow<'r, sqlx::sqlite::SqliteRow> for Role {
    fn from_row(row: &'r sqlx::sqlite::SqliteRow) -> Result<Self, sqlx::Error> {
        use sqlx::Row;

        let inherits = match row.try_get::<Option<String>, _>("inherits")? {
            Some(raw) => {
                Some(
                    serde_json::from_str(&raw).map_err(|e| sqlx::Error::ColumnDecode {
                        index: "inherits".into(),
                        source: Box::new(e),
                    })?,
                )
            }
            None => None,
        };
        Ok(Self {
            id: row.try_get("id")?,
            name: row.try_get("name")?,
            title: row.try_get("title")?,
            inherits,
        })
    }
}

// ============================================================================
// Composite shapes (API responses)
// ============================================================================

/// A category carrying its tags, as listed by the taxonomy endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoryWithTags {
    #[serde(flatten)]
    pub category: Category,
    pub tags: Vec<Tag>,
}

/// A tag decorated with its next-click occurrence count.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TagFacet {
    #[serde(flatten)]
    pub tag: Tag,
    pub occurrences: i64,
}

/// One category of the aggregated facet tree.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoryFacets {
    #[serde(flatten)]
    pub category: Category,
    pub tags: Vec<TagFacet>,
}

/// A search result row: the mesh plus its tags and its default image.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MeshSummary {
    #[serde(flatten)]
    pub mesh: Mesh,
    pub tags: Vec<Tag>,
    pub images: Vec<MeshImage>,
}

/// The full mesh view: tags, every image, the owner, and the categories the
/// mesh's tags belong to (restricted to those tags).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MeshDetail {
    #[serde(flatten)]
    pub mesh: Mesh,
    pub tags: Vec<Tag>,
    pub images: Vec<MeshImage>,
    pub user: Option<PublicUser>,
    pub tags_categories: Vec<CategoryWithTags>,
}

/// One page of search results together with the total match count computed
/// in the same snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchPage {
    pub count: i64,
    pub results: Vec<MeshSummary>,
}

/// A user together with the roles assigned to it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserWithRoles {
    #[serde(flatten)]
    pub user: User,
    pub roles: Vec<Role>,
}

// ============================================================================
// Write shapes
// ============================================================================

/// Everything needed to create a mesh record in one transaction. Normalized
/// text columns are derived inside the store from `title`/`description`.
#[derive(Debug, Clone)]
pub struct NewMesh {
    pub users_id: i64,
    pub title: String,
    pub description: Option<String>,
    pub vertices: i64,
    pub cells: i64,
    pub filename: String,
    pub filepath: String,
    pub filesize: i64,
    pub filetype: String,
    pub tags: Vec<i64>,
    pub images: Vec<NewImage>,
}

/// An image row staged alongside a new mesh.
#[derive(Debug, Clone)]
pub struct NewImage {
    pub filepath: String,
    pub thumbpath: String,
    pub is_default: bool,
}

/// Partial mesh update. Absent fields are left untouched; an empty
/// `description` clears the column. When `tags` is present the whole tag
/// set is replaced.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MeshChanges {
    pub title: Option<String>,
    pub description: Option<String>,
    pub vertices: Option<i64>,
    pub cells: Option<i64>,
    pub tags: Option<Vec<i64>>,
}

/// A new account. `password_hash` is already bcrypt-hashed by the caller.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub password_hash: String,
    pub firstname: String,
    pub lastname: String,
}

/// The audited actions. Maps onto the seeded `action_types` rows by name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionKind {
    View,
    Download,
    Upload,
    Edit,
    Delete,
}

impl ActionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionKind::View => "view",
            ActionKind::Download => "download",
            ActionKind::Upload => "upload",
            ActionKind::Edit => "edit",
            ActionKind::Delete => "delete",
        }
    }
}
