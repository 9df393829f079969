//! Cartwise application binary - composition root.
//!
//! 1. Parse CLI arguments and load configuration from TOML
//! 2. Initialize tracing and open the SQLite database
//! 3. Either import a catalog file or start the axum API server

mod cli;

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;

use cartwise_api::{start_server, AppState};
use cartwise_chat::OllamaEngine;
use cartwise_core::config::CartwiseConfig;
use cartwise_storage::{import_catalog_file, Database, ProductRepository};

use cli::{CliArgs, Command};

/// Expand a leading `~` to the user's home directory.
fn resolve_data_dir(data_dir: &str) -> PathBuf {
    if data_dir.starts_with("~/") || data_dir.starts_with("~\\") {
        #[cfg(target_os = "windows")]
        let home = std::env::var("USERPROFILE").unwrap_or_else(|_| ".".to_string());
        #[cfg(not(target_os = "windows"))]
        let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
        PathBuf::from(home).join(&data_dir[2..])
    } else {
        PathBuf::from(data_dir)
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = CliArgs::parse();

    let config_file = args.resolve_config_path();
    let mut config = CartwiseConfig::load_or_default(&config_file);
    args.apply_overrides(&mut config);

    // Tracing: RUST_LOG wins over the configured level.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.general.log_level)),
        )
        .init();

    tracing::info!("Starting Cartwise v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!(path = %config_file.display(), "Configuration loaded");

    // Storage.
    let data_dir = resolve_data_dir(&config.general.data_dir);
    if let Err(e) = std::fs::create_dir_all(&data_dir) {
        tracing::error!(path = %data_dir.display(), error = %e, "Failed to create data directory");
        return Err(e.into());
    }
    let db_path = data_dir.join("cartwise.db");
    let db = Database::new(&db_path)?;
    tracing::info!(path = %db_path.display(), "SQLite database opened");

    match args.command() {
        Command::Import { file } => {
            let repo = ProductRepository::new(Arc::new(db));
            let summary = import_catalog_file(&repo, &file)?;
            tracing::info!(
                file = %file.display(),
                imported = summary.imported,
                skipped = summary.skipped,
                total = repo.count()?,
                "Catalog imported"
            );
        }
        Command::Serve => {
            let engine = OllamaEngine::from_config(&config.generation);
            tracing::info!(
                endpoint = %engine.endpoint(),
                model = %config.generation.model,
                "Generation engine configured"
            );

            let state = AppState::new(config.clone(), db, Arc::new(engine));
            start_server(&config, state).await?;
        }
    }

    Ok(())
}
