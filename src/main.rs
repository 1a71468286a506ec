//! Mesh Catalog - Main Server
//!
//! A catalog service for shareable mesh files, backed by SQLite.

use anyhow::Result;
use clap::{Parser, Subcommand};
use mesh_catalog::{store::SqliteStore, Config};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "catalogd")]
#[command(about = "Mesh Catalog Server")]
struct Cli {
    /// Path to the YAML config file (default: config.yaml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the catalog server
    Serve {
        /// Port to listen on (overrides config)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Create or update the database schema, then exit
    Migrate,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,mesh_catalog=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    // Load configuration
    let mut config = Config::from_yaml_and_env(cli.config.as_deref())?;

    match cli.command {
        Commands::Serve { port } => {
            if let Some(port) = port {
                config.server_port = port;
            }
            mesh_catalog::start_server(config).await
        }
        Commands::Migrate => run_migrate(config).await,
    }
}

async fn run_migrate(config: Config) -> Result<()> {
    let store = SqliteStore::connect(&config.database_path, config.max_connections).await?;
    store.migrate().await?;
    tracing::info!("Database schema is up to date at {}", config.database_path);
    Ok(())
}
