//! Taxonomy endpoints: the aggregated category tree, the plain tree, and
//! the administrator CRUD for categories and tags.
//!
//! Protected rows are seeded by operators and refuse edit and delete. A
//! category that still owns tags refuses deletion outright; there is no
//! cascade and no orphaning.

use axum::{
    extract::{Path, Query, State},
    response::Response,
    Json,
};
use serde::Deserialize;

use crate::api::handlers::{created, message, ok, AppError};
use crate::api::query::SearchQuery;
use crate::auth::{AuthUser, Capability};
use crate::facet::aggregate_facets;
use crate::AppState;

// ============================================================================
// Request bodies
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateCategoryBody {
    pub title: String,
    pub color: String,
    #[serde(default)]
    pub protected: bool,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EditCategoryBody {
    pub title: Option<String>,
    pub color: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTagBody {
    pub category_id: i64,
    pub title: String,
    #[serde(default)]
    pub protected: bool,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EditTagBody {
    pub title: Option<String>,
    pub category_id: Option<i64>,
}

// ============================================================================
// Validation helpers
// ============================================================================

fn require_title(title: &str) -> Result<&str, AppError> {
    let trimmed = title.trim();
    if trimmed.is_empty() {
        return Err(AppError::BadRequest("Le titre est requis.".into()));
    }
    Ok(trimmed)
}

fn require_color(color: &str) -> Result<&str, AppError> {
    let trimmed = color.trim();
    let valid = trimmed.len() == 7
        && trimmed.starts_with('#')
        && trimmed[1..].chars().all(|c| c.is_ascii_hexdigit());
    if !valid {
        return Err(AppError::BadRequest(
            "La couleur doit être au format #rrggbb.".into(),
        ));
    }
    Ok(trimmed)
}

fn protected_error() -> AppError {
    AppError::Forbidden("Cette entrée est protégée et ne peut pas être modifiée.".into())
}

// ============================================================================
// Public tree endpoints
// ============================================================================

/// The aggregated facet tree for the current selection: every surviving
/// tag decorated with the match count its selection would produce.
/// Aggregation failures degrade to an empty tree rather than an error.
pub async fn list_categories(
    State(state): State<AppState>,
    Query(pairs): Query<Vec<(String, String)>>,
) -> Response {
    let query = SearchQuery::from_pairs(&pairs);
    let tree = aggregate_facets(state.store.as_ref(), &query.selection()).await;
    ok(tree)
}

/// The plain category→tags tree, no counts.
pub async fn all_tags(State(state): State<AppState>) -> Result<Response, AppError> {
    let tree = state.store.list_categories_with_tags().await?;
    Ok(ok(tree))
}

// ============================================================================
// Category administration
// ============================================================================

/// Create a category
pub async fn create_category(
    State(state): State<AppState>,
    user: AuthUser,
    Json(body): Json<CreateCategoryBody>,
) -> Result<Response, AppError> {
    user.require(Capability::Administrator)?;
    let title = require_title(&body.title)?;
    let color = require_color(&body.color)?;

    let category = state.store.create_category(title, color, body.protected).await?;
    Ok(created(category))
}

/// Update a category's title and/or color. Protected rows refuse the edit.
pub async fn edit_category(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<i64>,
    Json(body): Json<EditCategoryBody>,
) -> Result<Response, AppError> {
    user.require(Capability::Administrator)?;

    let existing = state
        .store
        .get_category(id)
        .await?
        .ok_or_else(|| AppError::NotFound("Catégorie introuvable.".into()))?;
    if existing.protected {
        return Err(protected_error());
    }

    let title = body.title.as_deref().map(require_title).transpose()?;
    let color = body.color.as_deref().map(require_color).transpose()?;

    let updated = state
        .store
        .update_category(id, title.map(String::from), color.map(String::from))
        .await?
        .ok_or_else(|| AppError::NotFound("Catégorie introuvable.".into()))?;
    Ok(ok(updated))
}

/// Delete a category. Refused while the category still owns tags.
pub async fn delete_category(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<i64>,
) -> Result<Response, AppError> {
    user.require(Capability::Administrator)?;

    let existing = state
        .store
        .get_category(id)
        .await?
        .ok_or_else(|| AppError::NotFound("Catégorie introuvable.".into()))?;
    if existing.protected {
        return Err(AppError::Forbidden(
            "Cette entrée est protégée et ne peut pas être supprimée.".into(),
        ));
    }
    if state.store.count_category_tags(id).await? > 0 {
        return Err(AppError::BadRequest(
            "Impossible de supprimer une catégorie qui possède encore des tags.".into(),
        ));
    }

    state.store.delete_category(id).await?;
    Ok(message("Catégorie supprimée."))
}

// ============================================================================
// Tag administration
// ============================================================================

/// Create a tag under an existing category
pub async fn create_tag(
    State(state): State<AppState>,
    user: AuthUser,
    Json(body): Json<CreateTagBody>,
) -> Result<Response, AppError> {
    user.require(Capability::Administrator)?;
    let title = require_title(&body.title)?;

    if state.store.get_category(body.category_id).await?.is_none() {
        return Err(AppError::BadRequest(
            "La catégorie demandée n'existe pas.".into(),
        ));
    }

    let tag = state
        .store
        .create_tag(body.category_id, title, body.protected)
        .await?;
    Ok(created(tag))
}

/// Update a tag's title and/or move it to another category.
pub async fn edit_tag(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<i64>,
    Json(body): Json<EditTagBody>,
) -> Result<Response, AppError> {
    user.require(Capability::Administrator)?;

    let existing = state
        .store
        .get_tag(id)
        .await?
        .ok_or_else(|| AppError::NotFound("Tag introuvable.".into()))?;
    if existing.protected {
        return Err(protected_error());
    }

    let title = body.title.as_deref().map(require_title).transpose()?;
    if let Some(category_id) = body.category_id {
        if state.store.get_category(category_id).await?.is_none() {
            return Err(AppError::BadRequest(
                "La catégorie demandée n'existe pas.".into(),
            ));
        }
    }

    let updated = state
        .store
        .update_tag(id, title.map(String::from), body.category_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Tag introuvable.".into()))?;
    Ok(ok(updated))
}

/// Delete a tag. Mesh associations cascade; the meshes themselves stay.
pub async fn delete_tag(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<i64>,
) -> Result<Response, AppError> {
    user.require(Capability::Administrator)?;

    let existing = state
        .store
        .get_tag(id)
        .await?
        .ok_or_else(|| AppError::NotFound("Tag introuvable.".into()))?;
    if existing.protected {
        return Err(AppError::Forbidden(
            "Cette entrée est protégée et ne peut pas être supprimée.".into(),
        ));
    }

    state.store.delete_tag(id).await?;
    Ok(message("Tag supprimé."))
}

// ============================================================================
// Tests
// ============================================================================
