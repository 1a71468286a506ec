//! Mesh Catalog
//!
//! A catalog service for shareable mesh files with:
//! - SQLite storage for meshes, taxonomy, accounts, and audit events
//! - Faceted search where every tag carries its next-click match count
//! - Token-authenticated uploads with derived thumbnails

pub mod api;
pub mod auth;
pub mod facet;
pub mod files;
pub mod store;

use anyhow::Result;
use serde::Deserialize;
use std::path::Path;
use std::sync::Arc;

// ============================================================================
// YAML config structs (deserialization targets)
// ============================================================================

/// Top-level YAML configuration file structure
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct YamlConfig {
    pub server: ServerYamlConfig,
    pub database: DatabaseYamlConfig,
    pub files: FilesYamlConfig,
    pub auth: AuthConfig,
}

/// Server configuration section
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerYamlConfig {
    pub port: u16,
}

impl Default for ServerYamlConfig {
    fn default() -> Self {
        Self { port: 8080 }
    }
}

/// Database configuration section
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DatabaseYamlConfig {
    pub path: String,
    pub max_connections: u32,
}

impl Default for DatabaseYamlConfig {
    fn default() -> Self {
        Self {
            path: "data/catalog.db".into(),
            max_connections: 8,
        }
    }
}

/// File storage configuration section
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FilesYamlConfig {
    pub data_dir: String,
    pub max_upload_bytes: usize,
}

impl Default for FilesYamlConfig {
    fn default() -> Self {
        Self {
            data_dir: "data/files".into(),
            max_upload_bytes: 256 * 1024 * 1024,
        }
    }
}

/// Authentication configuration. Deserialized straight from YAML and used
/// as-is at runtime.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// JWT signing secret (HS256). Empty means every token is rejected in
    /// practice; set it.
    pub jwt_secret: String,
    /// JWT token lifetime in seconds (default: 14 days)
    pub jwt_expiry_secs: u64,
    /// Operator account checked before the users table; absent means no
    /// root login.
    pub root_account: Option<RootAccountConfig>,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: String::new(),
            jwt_expiry_secs: auth::jwt::DEFAULT_EXPIRY_SECS,
            root_account: None,
        }
    }
}

/// Root account configuration
///
/// The `password_hash` field can contain either:
/// - A bcrypt hash (starts with `$2`) → used as-is
/// - A plaintext password → hashed with bcrypt at startup (with a warning log)
#[derive(Debug, Clone, Deserialize)]
pub struct RootAccountConfig {
    /// Root account email (used as login identifier)
    pub email: String,
    /// Bcrypt hash or plaintext password (hashed at startup if plaintext)
    pub password_hash: String,
}

// ============================================================================
// Runtime config (what the application actually uses)
// ============================================================================

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub server_port: u16,
    pub database_path: String,
    pub max_connections: u32,
    /// Root directory for stored mesh files and public images.
    pub data_dir: String,
    /// Request body cap on the upload endpoint.
    pub max_upload_bytes: usize,
    pub auth: AuthConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server_port: 8080,
            database_path: "data/catalog.db".into(),
            max_connections: 8,
            data_dir: "data/files".into(),
            max_upload_bytes: 256 * 1024 * 1024,
            auth: AuthConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from environment variables only.
    /// Equivalent to from_yaml_and_env(None).
    pub fn from_env() -> Result<Self> {
        Self::from_yaml_and_env(None)
    }

    /// Load configuration from an optional YAML file, then override with env vars.
    ///
    /// Priority: env var > YAML > default
    ///
    /// If `yaml_path` is None, tries "config.yaml" in CWD. If the file doesn't
    /// exist, falls back to pure env var / defaults.
    pub fn from_yaml_and_env(yaml_path: Option<&Path>) -> Result<Self> {
        // 1. Load YAML config (or defaults if file not found)
        let yaml = Self::load_yaml(yaml_path);

        // 2. Apply auth env overrides
        let mut auth = yaml.auth;
        if let Ok(secret) = std::env::var("JWT_SECRET") {
            auth.jwt_secret = secret;
        }
        if let Some(expiry) = std::env::var("JWT_EXPIRY_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
        {
            auth.jwt_expiry_secs = expiry;
        }
        if let (Ok(email), Ok(password_hash)) = (
            std::env::var("ROOT_EMAIL"),
            std::env::var("ROOT_PASSWORD_HASH"),
        ) {
            auth.root_account = Some(RootAccountConfig {
                email,
                password_hash,
            });
        }

        // 3. Build Config with env var overrides
        Ok(Self {
            server_port: std::env::var("SERVER_PORT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(yaml.server.port),
            database_path: std::env::var("DATABASE_PATH").unwrap_or(yaml.database.path),
            max_connections: std::env::var("DATABASE_MAX_CONNECTIONS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(yaml.database.max_connections),
            data_dir: std::env::var("DATA_DIR").unwrap_or(yaml.files.data_dir),
            max_upload_bytes: std::env::var("MAX_UPLOAD_BYTES")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(yaml.files.max_upload_bytes),
            auth,
        })
    }

    /// Try to load and parse a YAML config file. Returns defaults on any failure.
    fn load_yaml(yaml_path: Option<&Path>) -> YamlConfig {
        let default_path = Path::new("config.yaml");
        let path = yaml_path.unwrap_or(default_path);

        match std::fs::read_to_string(path) {
            Ok(contents) => match serde_yaml::from_str(&contents) {
                Ok(config) => {
                    tracing::info!("Loaded config from {}", path.display());
                    config
                }
                Err(e) => {
                    tracing::warn!("Failed to parse {}: {}. Using defaults.", path.display(), e);
                    YamlConfig::default()
                }
            },
            Err(_) => {
                tracing::debug!(
                    "No config file at {}, using env vars / defaults",
                    path.display()
                );
                YamlConfig::default()
            }
        }
    }
}

// ============================================================================
// Application state and server entry point
// ============================================================================

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn store::CatalogStore>,
    pub files: Arc<files::FileStore>,
    pub config: Arc<Config>,
}

impl AppState {
    /// Create new application state: open the database, run migrations, and
    /// set up the file storage directories.
    pub async fn new(mut config: Config) -> Result<Self> {
        if config.auth.jwt_secret.is_empty() {
            tracing::warn!("auth.jwt_secret is empty; no issued token will validate");
        }
        // A plaintext root password in the config is hashed once at startup
        if let Some(root) = &mut config.auth.root_account {
            if !root.password_hash.starts_with("$2") {
                tracing::warn!(
                    "root_account.password_hash is not a bcrypt hash; hashing the provided value"
                );
                root.password_hash = bcrypt::hash(&root.password_hash, 12)?;
            }
        }

        let store =
            store::SqliteStore::connect(&config.database_path, config.max_connections).await?;
        store.migrate().await?;

        let files = files::FileStore::new(&config.data_dir)?;

        Ok(Self {
            store: Arc::new(store),
            files: Arc::new(files),
            config: Arc::new(config),
        })
    }
}

/// Initialize state, bind the configured port, and serve the API until a
/// shutdown signal arrives.
pub async fn start_server(config: Config) -> Result<()> {
    let port = config.server_port;
    let state = AppState::new(config).await?;
    let app = api::create_router(state);

    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("Listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Shutdown signal received");
    Ok(())
}

/// Handle graceful shutdown
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

// ============================================================================
// Tests
// ============================================================================
