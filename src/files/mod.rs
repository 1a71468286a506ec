//! On-disk layout and staging for mesh files and their preview images.
//!
//! Mesh files live in a private `meshes/` directory and are only served
//! through the download endpoint, which records an audit event. Images and
//! thumbnails live under `public/`, which the router mounts at `/files/`,
//! so the relative paths stored in the database double as URL paths.

pub mod thumbs;

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use uuid::Uuid;

const MESHES_DIR: &str = "meshes";
const PUBLIC_DIR: &str = "public";
const IMAGES_DIR: &str = "images";
const THUMBS_DIR: &str = "thumbs";

/// Directory layout rooted at the configured data dir.
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    /// Create the store, ensuring the directory layout exists.
    pub fn new(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        for dir in [
            root.join(MESHES_DIR),
            root.join(PUBLIC_DIR).join(IMAGES_DIR),
            root.join(PUBLIC_DIR).join(THUMBS_DIR),
        ] {
            fs::create_dir_all(&dir)
                .with_context(|| format!("failed to create {}", dir.display()))?;
        }
        Ok(Self { root })
    }

    /// Absolute path of a stored mesh file from its stored relative path.
    pub fn mesh_path(&self, filepath: &str) -> PathBuf {
        self.root.join(filepath)
    }

    /// Absolute path of a stored image or thumbnail from its stored
    /// relative path.
    pub fn public_path(&self, filepath: &str) -> PathBuf {
        self.root.join(PUBLIC_DIR).join(filepath)
    }

    /// The public root mounted at `/files/`.
    pub fn public_root(&self) -> PathBuf {
        self.root.join(PUBLIC_DIR)
    }

    /// Fresh relative storage path for a mesh file, keeping a sanitized
    /// form of the client's extension.
    pub fn stage_mesh_name(&self, original: &str) -> String {
        format!("{MESHES_DIR}/{}", unique_name(original))
    }

    /// Fresh relative storage paths for an image and its thumbnail,
    /// sharing one stem. Thumbnails are always PNG.
    pub fn stage_image_names(&self, original: &str) -> (String, String) {
        let stem = Uuid::new_v4();
        let image = match sanitized_extension(original) {
            Some(ext) => format!("{IMAGES_DIR}/{stem}.{ext}"),
            None => format!("{IMAGES_DIR}/{stem}"),
        };
        (image, format!("{THUMBS_DIR}/{stem}.png"))
    }

    pub async fn write_mesh(&self, filepath: &str, bytes: &[u8]) -> Result<()> {
        let path = self.mesh_path(filepath);
        tokio::fs::write(&path, bytes)
            .await
            .with_context(|| format!("failed to write {}", path.display()))
    }

    pub async fn write_public(&self, filepath: &str, bytes: &[u8]) -> Result<()> {
        let path = self.public_path(filepath);
        tokio::fs::write(&path, bytes)
            .await
            .with_context(|| format!("failed to write {}", path.display()))
    }

    /// Best-effort removal. Missing files are fine; other failures are
    /// logged and swallowed so a half-failed disk never blocks row
    /// deletion.
    pub fn remove_quiet(&self, path: &Path) {
        if let Err(e) = fs::remove_file(path) {
            if e.kind() != std::io::ErrorKind::NotFound {
                tracing::warn!("Failed to remove {}: {}", path.display(), e);
            }
        }
    }
}

fn unique_name(original: &str) -> String {
    let stem = Uuid::new_v4();
    match sanitized_extension(original) {
        Some(ext) => format!("{stem}.{ext}"),
        None => stem.to_string(),
    }
}

/// Lowercased, alphanumeric-only extension of the client-supplied name,
/// capped at 10 characters. Anything else is dropped; stored names never
/// contain client-controlled bytes.
fn sanitized_extension(original: &str) -> Option<String> {
    let ext = Path::new(original).extension()?.to_str()?;
    let clean: String = ext
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .map(|c| c.to_ascii_lowercase())
        .take(10)
        .collect();
    (!clean.is_empty()).then_some(clean)
}

/// Compensation guard for staged uploads.
///
/// Every file written before the database transaction commits is tracked
/// here; unless [`commit`](Self::commit) is called, dropping the list
/// removes the tracked paths. Each removal is attempted independently and
/// failures are logged, never raised.
pub struct CleanupList {
    paths: Vec<PathBuf>,
    committed: bool,
}

impl CleanupList {
    pub fn new() -> Self {
        Self {
            paths: Vec::new(),
            committed: false,
        }
    }

    pub fn track(&mut self, path: PathBuf) {
        self.paths.push(path);
    }

    /// The rows are in; staged files are now permanent.
    pub fn commit(&mut self) {
        self.committed = true;
    }
}

impl Default for CleanupList {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for CleanupList {
    fn drop(&mut self) {
        if self.committed {
            return;
        }
        for path in &self.paths {
            if let Err(e) = fs::remove_file(path) {
                if e.kind() != std::io::ErrorKind::NotFound {
                    tracing::warn!("Failed to clean up staged file {}: {}", path.display(), e);
                }
            }
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
