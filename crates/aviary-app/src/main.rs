//! Aviary application binary - composition root.
//!
//! 1. Resolve configuration (CLI > env > TOML > defaults)
//! 2. Initialise logging
//! 3. Open the SQLite document store
//! 4. Pick the completion provider
//! 5. Serve the axum API

mod cli;

use std::sync::Arc;

use clap::Parser;

use aviary_core::config::{AssistantConfig, AviaryConfig};
use aviary_server::{AppState, CannedProvider, CompletionProvider, OpenAiProvider};
use aviary_storage::{Database, DocumentStore, SqliteDocumentStore};

use cli::CliArgs;

fn select_provider(config: &AssistantConfig) -> Arc<dyn CompletionProvider> {
    match config.provider.as_str() {
        "openai" => match OpenAiProvider::from_config(config) {
            Ok(provider) => {
                tracing::info!(model = %config.model, api_base = %config.api_base, "Using OpenAI-compatible provider");
                Arc::new(provider)
            }
            Err(e) => {
                tracing::warn!(error = %e, "OpenAI provider unavailable, answering with canned replies");
                Arc::new(CannedProvider::default())
            }
        },
        "canned" => {
            tracing::info!("Using canned provider");
            Arc::new(CannedProvider::default())
        }
        other => {
            tracing::warn!(provider = %other, "Unknown provider, answering with canned replies");
            Arc::new(CannedProvider::default())
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = CliArgs::parse();

    // Config is read before logging starts, so a load failure is reported
    // once the subscriber is up.
    let config_file = args.resolve_config_path();
    let loaded = AviaryConfig::load(&config_file);
    let mut config = match &loaded {
        Ok(config) => config.clone(),
        Err(_) => AviaryConfig::default(),
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_new(args.resolve_log_filter(&config.general.log_level))
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    tracing::info!("Starting Aviary v{}", env!("CARGO_PKG_VERSION"));
    match loaded {
        Ok(_) => tracing::info!(path = %config_file.display(), "Configuration loaded"),
        Err(e) => tracing::warn!(path = %config_file.display(), error = %e, "Using default configuration"),
    }

    config.general.port = args.resolve_port(config.general.port);
    let data_dir = args.resolve_data_dir(&config.general.data_dir);
    config.general.data_dir = data_dir.to_string_lossy().to_string();

    // Storage.
    let db_path = data_dir.join("aviary.db");
    let db = match Database::new(&db_path) {
        Ok(db) => db,
        Err(e) => {
            tracing::error!(path = %db_path.display(), error = %e, "Failed to open database");
            return Err(e.into());
        }
    };
    tracing::info!(path = %db_path.display(), "SQLite database opened");
    let store: Arc<dyn DocumentStore> = Arc::new(SqliteDocumentStore::new(Arc::new(db)));

    // Assistant.
    let provider = select_provider(&config.assistant);

    // API server.
    let addr = format!("127.0.0.1:{}", config.general.port);
    let state = AppState::new(config, store, provider)?;
    if let Err(e) = aviary_server::start_server(&addr, state).await {
        tracing::error!(addr = %addr, error = %e, "API server stopped");
        return Err(e.into());
    }

    Ok(())
}
