//! INGRES application binary - composition root.
//!
//! Ties together all INGRES crates into a single executable:
//! 1. Load `.env` and configuration from TOML
//! 2. Open the SQLite document store
//! 3. Build the chat pipeline (schema inference, model client)
//! 4. Start the axum REST API server, or run a one-off CSV ingest

mod cli;

use std::path::Path;
use std::sync::Arc;

use clap::Parser;

use ingres_api::routes;
use ingres_api::state::AppState;
use ingres_chat::{ChatCompletionClient, ChatOrchestrator};
use ingres_core::config::IngresConfig;
use ingres_core::error::IngresError;
use ingres_storage::{ingest_csv, Database, DocumentCollection};

use cli::{CliArgs, Command};

/// Open the configured collection.
fn open_collection(config: &IngresConfig, name: &str) -> Result<DocumentCollection, IngresError> {
    let db_path = config.store.resolved_database_path()?;
    let db = Database::new(&db_path)?;
    tracing::info!(path = %db_path.display(), collection = %name, "Document store opened");
    Ok(DocumentCollection::new(Arc::new(db), name))
}

/// Build the server state. A missing store or model key leaves the
/// pipeline uninitialized instead of aborting startup.
fn build_state(config: &IngresConfig) -> AppState {
    let collection = match open_collection(config, &config.store.collection) {
        Ok(c) => c,
        Err(e) => {
            tracing::error!(error = %e, "Failed to open document store; /chat will be unavailable");
            return AppState::uninitialized();
        }
    };

    let client = match ChatCompletionClient::from_config(&config.llm) {
        Ok(c) => c,
        Err(e) => {
            tracing::error!(error = %e, "Language model not configured; /chat will be unavailable");
            return AppState::uninitialized();
        }
    };
    tracing::info!(endpoint = %client.endpoint(), model = %client.model(), "Language model client ready");

    AppState::new(ChatOrchestrator::new(
        Arc::new(client),
        Arc::new(collection),
        config,
    ))
}

fn run_ingest(
    config: &IngresConfig,
    csv: &Path,
    collection: Option<String>,
) -> Result<(), IngresError> {
    let name = collection.unwrap_or_else(|| config.store.collection.clone());
    let collection = open_collection(config, &name)?;

    tracing::info!(path = %csv.display(), "Ingesting CSV");
    let report = ingest_csv(csv, &collection)?;

    tracing::info!(
        collection = %report.collection,
        records = report.records,
        replaced = report.replaced,
        columns = report.columns.len(),
        "Successfully ingested {} records",
        report.records
    );
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Environment from .env, if present.
    let dotenv = dotenvy::dotenv();

    let args = CliArgs::parse();

    // Config.
    let config_file = args.resolve_config_path();
    let mut config = IngresConfig::load_or_default(&config_file);
    if let Some(level) = args.resolve_log_level() {
        config.general.log_level = level;
    }
    if let Some(db) = args.resolve_database() {
        config.store.database_path = db;
    }

    // Tracing.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.general.log_level)),
        )
        .init();

    tracing::info!("Starting INGRES v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!(path = %config_file.display(), "Configuration loaded");
    if let Ok(path) = dotenv {
        tracing::debug!(path = %path.display(), "Loaded .env");
    }

    match args.command() {
        Command::Ingest { csv, collection } => {
            run_ingest(&config, &csv, collection)?;
        }
        Command::Serve { .. } => {
            config.server.port = args.resolve_port(config.server.port);
            let state = build_state(&config);
            if let Err(e) = routes::start_server(&config.server, state).await {
                tracing::error!(error = %e, "API server stopped");
                tracing::error!("Try: INGRES_PORT={} ingres serve", config.server.port.saturating_add(1));
                return Err(e.into());
            }
        }
    }

    Ok(())
}
