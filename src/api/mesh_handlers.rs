//! Mesh endpoints: search, the sort table, the detail view, downloads, and
//! the contributor upload/edit/delete flows.
//!
//! Uploads are transactional end to end: every field is parsed and
//! validated before anything touches disk, staged files are tracked by a
//! [`CleanupList`] that removes them again unless the database insert
//! commits, and only then is the upload event recorded.

use axum::{
    body::Body,
    extract::{Multipart, Path, Query, State},
    http::{header, HeaderMap, HeaderValue},
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;
use tokio_util::io::ReaderStream;

use crate::api::handlers::{created, message, ok, AppError};
use crate::api::query::SearchQuery;
use crate::auth::{AuthUser, Capability, Identity};
use crate::facet::SORTS;
use crate::files::{thumbs::render_thumbnail, CleanupList};
use crate::store::{ActionKind, MeshChanges, NewImage, NewMesh};
use crate::AppState;

// ============================================================================
// Search and sorts
// ============================================================================

/// `{count, results}` for the current selection, sort, and page. Count and
/// page come from the same store snapshot.
pub async fn search_meshes(
    State(state): State<AppState>,
    Query(pairs): Query<Vec<(String, String)>>,
) -> Result<Response, AppError> {
    let query = SearchQuery::from_pairs(&pairs);
    let page = state
        .store
        .search_meshes(&query.selection(), query.sort_spec(), query.window())
        .await?;
    Ok(ok(page))
}

/// The supported sort orders, in table order.
pub async fn list_sorts() -> Response {
    let sorts: Vec<serde_json::Value> = SORTS
        .iter()
        .map(|s| {
            serde_json::json!({
                "name": s.name,
                "label": s.label,
                "default": s.default,
            })
        })
        .collect();
    ok(sorts)
}

// ============================================================================
// View and download
// ============================================================================

/// The full mesh view. Records a `view` event attributed to the caller's
/// user id when a valid token accompanied the request, else to the
/// `visitor_id` cookie when one is present.
pub async fn view_mesh(
    State(state): State<AppState>,
    identity: Identity,
    headers: HeaderMap,
    Path(id): Path<i64>,
) -> Result<Response, AppError> {
    let detail = state
        .store
        .get_mesh_detail(id)
        .await?
        .ok_or_else(|| AppError::NotFound("Fichier introuvable.".into()))?;

    record_viewer_event(&state, id, ActionKind::View, &identity, &headers).await;
    Ok(ok(detail))
}

#[derive(Debug, Default, Deserialize)]
pub struct DownloadQuery {
    pub check: Option<String>,
}

/// Download the stored mesh file as an attachment. With `?check=1` the
/// handler only probes that the file is still present on disk. Actual
/// downloads record a `download` event.
pub async fn download_mesh(
    State(state): State<AppState>,
    identity: Identity,
    headers: HeaderMap,
    Path(id): Path<i64>,
    Query(query): Query<DownloadQuery>,
) -> Result<Response, AppError> {
    let mesh = state
        .store
        .get_mesh(id)
        .await?
        .ok_or_else(|| AppError::NotFound("Fichier introuvable.".into()))?;
    let path = state.files.mesh_path(&mesh.filepath);

    if query.check.as_deref().is_some_and(|v| !v.is_empty()) {
        return match tokio::fs::metadata(&path).await {
            Ok(_) => Ok(message("Le fichier est disponible.")),
            Err(_) => Err(AppError::NotFound(
                "Le fichier n'est plus disponible.".into(),
            )),
        };
    }

    let file = match tokio::fs::File::open(&path).await {
        Ok(f) => f,
        Err(e) => {
            tracing::error!("mesh {} missing from storage ({}): {}", id, mesh.filepath, e);
            return Err(AppError::NotFound(
                "Le fichier n'est plus disponible.".into(),
            ));
        }
    };

    record_viewer_event(&state, id, ActionKind::Download, &identity, &headers).await;

    let response_headers = [
        (
            header::CONTENT_TYPE,
            mesh.filetype
                .parse::<HeaderValue>()
                .unwrap_or_else(|_| HeaderValue::from_static("application/octet-stream")),
        ),
        (
            header::CONTENT_DISPOSITION,
            attachment_disposition(&mesh.filename)
                .parse::<HeaderValue>()
                .unwrap_or_else(|_| HeaderValue::from_static("attachment")),
        ),
    ];
    let body = Body::from_stream(ReaderStream::new(file));
    Ok((response_headers, body).into_response())
}

fn attachment_disposition(filename: &str) -> String {
    format!("attachment; filename=\"{}\"", filename.replace('"', "\\\""))
}

// ============================================================================
// Upload
// ============================================================================

/// Everything parsed out of the upload form before validation starts.
#[derive(Default)]
struct UploadForm {
    title: Option<String>,
    description: Option<String>,
    vertices: Option<String>,
    cells: Option<String>,
    tags: Option<String>,
    mesh: Option<UploadedFile>,
    images: Vec<UploadedFile>,
}

struct UploadedFile {
    filename: String,
    content_type: Option<String>,
    bytes: Vec<u8>,
}

async fn read_form(multipart: &mut Multipart) -> Result<UploadForm, AppError> {
    let mut form = UploadForm::default();
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|_| AppError::BadRequest("Le formulaire d'envoi est invalide.".into()))?
    {
        let name = field.name().map(|n| n.to_string());
        match name.as_deref() {
            Some("title") => form.title = Some(read_text(field).await?),
            Some("description") => form.description = Some(read_text(field).await?),
            Some("vertices") => form.vertices = Some(read_text(field).await?),
            Some("cells") => form.cells = Some(read_text(field).await?),
            Some("tags") => form.tags = Some(read_text(field).await?),
            Some("mesh") => form.mesh = Some(read_file(field).await?),
            Some("images") => form.images.push(read_file(field).await?),
            _ => {} // ignore unknown fields
        }
    }
    Ok(form)
}

async fn read_text(field: axum::extract::multipart::Field<'_>) -> Result<String, AppError> {
    field
        .text()
        .await
        .map_err(|_| AppError::BadRequest("Le formulaire d'envoi est invalide.".into()))
}

async fn read_file(field: axum::extract::multipart::Field<'_>) -> Result<UploadedFile, AppError> {
    let filename = field.file_name().unwrap_or_default().to_string();
    let content_type = field.content_type().map(|c| c.to_string());
    let bytes = field
        .bytes()
        .await
        .map_err(|_| AppError::BadRequest("Le formulaire d'envoi est invalide.".into()))?
        .to_vec();
    Ok(UploadedFile {
        filename,
        content_type,
        bytes,
    })
}

fn parse_count(raw: Option<&str>, error: &str) -> Result<i64, AppError> {
    raw.map(str::trim)
        .and_then(|v| v.parse::<i64>().ok())
        .filter(|v| *v >= 0)
        .ok_or_else(|| AppError::BadRequest(error.into()))
}

fn parse_tag_list(raw: &str) -> Result<Vec<i64>, AppError> {
    let mut tags = Vec::new();
    for part in raw.split(',') {
        let trimmed = part.trim();
        if trimmed.is_empty() {
            continue;
        }
        let id = trimmed
            .parse::<i64>()
            .map_err(|_| AppError::BadRequest("La liste de tags est invalide.".into()))?;
        tags.push(id);
    }
    Ok(tags)
}

async fn ensure_tags_exist(state: &AppState, tags: &[i64]) -> Result<(), AppError> {
    for &tag_id in tags {
        if state.store.get_tag(tag_id).await?.is_none() {
            return Err(AppError::BadRequest(
                "Un des tags demandés n'existe pas.".into(),
            ));
        }
    }
    Ok(())
}

/// Create a mesh from a multipart form: `title`, `vertices`, `cells`,
/// optional `description` and comma-separated `tags`, one `mesh` file, any
/// number of `images` (the first becomes the default, each gets a derived
/// thumbnail).
pub async fn upload_mesh(
    State(state): State<AppState>,
    user: AuthUser,
    mut multipart: Multipart,
) -> Result<Response, AppError> {
    user.require(Capability::Contributor)?;

    let form = read_form(&mut multipart).await?;

    // Validate everything before the first disk write.
    let title = form
        .title
        .as_deref()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| AppError::BadRequest("Le titre est requis.".into()))?
        .to_string();
    let vertices = parse_count(
        form.vertices.as_deref(),
        "Le nombre de sommets est invalide.",
    )?;
    let cells = parse_count(form.cells.as_deref(), "Le nombre de cellules est invalide.")?;
    let description = form
        .description
        .as_deref()
        .map(str::trim)
        .filter(|d| !d.is_empty())
        .map(String::from);
    let tags = match form.tags.as_deref() {
        Some(raw) => parse_tag_list(raw)?,
        None => Vec::new(),
    };
    ensure_tags_exist(&state, &tags).await?;

    let mesh_file = form
        .mesh
        .ok_or_else(|| AppError::BadRequest("Le fichier de maillage est requis.".into()))?;

    // Thumbnail derivation doubles as image validation.
    let mut thumbnails = Vec::with_capacity(form.images.len());
    for image in &form.images {
        let thumb = render_thumbnail(image.bytes.clone())
            .await
            .map_err(|_| AppError::BadRequest("Une des images n'est pas lisible.".into()))?;
        thumbnails.push(thumb);
    }

    // Stage files. The cleanup list removes everything staged so far on any
    // failure before commit.
    let mut cleanup = CleanupList::new();

    let mesh_name = state.files.stage_mesh_name(&mesh_file.filename);
    state
        .files
        .write_mesh(&mesh_name, &mesh_file.bytes)
        .await?;
    cleanup.track(state.files.mesh_path(&mesh_name));

    let mut images = Vec::with_capacity(form.images.len());
    for (index, (image, thumb)) in form.images.iter().zip(thumbnails).enumerate() {
        let (image_name, thumb_name) = state.files.stage_image_names(&image.filename);
        state.files.write_public(&image_name, &image.bytes).await?;
        cleanup.track(state.files.public_path(&image_name));
        state.files.write_public(&thumb_name, &thumb).await?;
        cleanup.track(state.files.public_path(&thumb_name));
        images.push(NewImage {
            filepath: image_name,
            thumbpath: thumb_name,
            is_default: index == 0,
        });
    }

    let new_mesh = NewMesh {
        users_id: user.id,
        title,
        description,
        vertices,
        cells,
        filename: mesh_file.filename.clone(),
        filepath: mesh_name,
        filesize: mesh_file.bytes.len() as i64,
        filetype: mesh_file
            .content_type
            .unwrap_or_else(|| "application/octet-stream".to_string()),
        tags,
        images,
    };
    let id = state.store.create_mesh(&new_mesh).await?;
    cleanup.commit();

    record_event_logged(&state, id, ActionKind::Upload, Some(user.id), None).await;

    let detail = state
        .store
        .get_mesh_detail(id)
        .await?
        .ok_or_else(|| AppError::Internal(anyhow::anyhow!("mesh {} vanished after create", id)))?;
    Ok(created(detail))
}

// ============================================================================
// Edit and delete
// ============================================================================

/// Partial update. Text columns are re-normalized by the store; when `tags`
/// is present the whole tag set is replaced.
pub async fn edit_mesh(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<i64>,
    Json(changes): Json<MeshChanges>,
) -> Result<Response, AppError> {
    user.require(Capability::Contributor)?;

    if changes.title.as_deref().is_some_and(|t| t.trim().is_empty()) {
        return Err(AppError::BadRequest("Le titre est requis.".into()));
    }
    if changes.vertices.is_some_and(|v| v < 0) {
        return Err(AppError::BadRequest(
            "Le nombre de sommets est invalide.".into(),
        ));
    }
    if changes.cells.is_some_and(|c| c < 0) {
        return Err(AppError::BadRequest(
            "Le nombre de cellules est invalide.".into(),
        ));
    }
    if let Some(tags) = &changes.tags {
        ensure_tags_exist(&state, tags).await?;
    }

    let updated = state
        .store
        .update_mesh(id, &changes)
        .await?
        .ok_or_else(|| AppError::NotFound("Fichier introuvable.".into()))?;

    record_event_logged(&state, id, ActionKind::Edit, Some(user.id), None).await;
    Ok(ok(updated))
}

/// Remove the mesh record, then best-effort remove the stored mesh file and
/// every image/thumbnail. Each removal is attempted independently; failures
/// are logged, never surfaced. The audit trail keeps its rows.
pub async fn delete_mesh(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<i64>,
) -> Result<Response, AppError> {
    user.require(Capability::Contributor)?;

    let detail = state
        .store
        .get_mesh_detail(id)
        .await?
        .ok_or_else(|| AppError::NotFound("Fichier introuvable.".into()))?;

    state.store.delete_mesh(id).await?;

    state
        .files
        .remove_quiet(&state.files.mesh_path(&detail.mesh.filepath));
    for image in &detail.images {
        state
            .files
            .remove_quiet(&state.files.public_path(&image.filepath));
        state
            .files
            .remove_quiet(&state.files.public_path(&image.thumbpath));
    }

    record_event_logged(&state, id, ActionKind::Delete, Some(user.id), None).await;
    Ok(message("Fichier supprimé."))
}

// ============================================================================
// Event recording
// ============================================================================

/// Attribute a view/download to the authenticated user when there is one,
/// else to the `visitor_id` cookie when present.
async fn record_viewer_event(
    state: &AppState,
    mesh_id: i64,
    kind: ActionKind,
    identity: &Identity,
    headers: &HeaderMap,
) {
    let user_id = identity.user().map(|u| u.id);
    let visitor = match user_id {
        Some(_) => None,
        None => visitor_cookie(headers),
    };
    record_event_logged(state, mesh_id, kind, user_id, visitor.as_deref()).await;
}

/// Audit recording never fails a request.
async fn record_event_logged(
    state: &AppState,
    mesh_id: i64,
    kind: ActionKind,
    user_id: Option<i64>,
    visitor: Option<&str>,
) {
    if let Err(e) = state
        .store
        .record_event(mesh_id, kind, user_id, visitor)
        .await
    {
        tracing::warn!(
            "failed to record {} event for mesh {}: {}",
            kind.as_str(),
            mesh_id,
            e
        );
    }
}

fn visitor_cookie(headers: &HeaderMap) -> Option<String> {
    let raw = headers.get(header::COOKIE)?.to_str().ok()?;
    for part in raw.split(';') {
        let trimmed = part.trim();
        if let Some(value) = trimmed.strip_prefix("visitor_id=") {
            let value = value.trim();
            if !value.is_empty() {
                return Some(value.to_string());
            }
        }
    }
    None
}

// ============================================================================
// Tests
// ============================================================================
