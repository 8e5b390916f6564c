pub mod aggregation;
pub mod api;
pub mod audit;
pub mod authorization;
pub mod catalog;
pub mod config;
pub mod core_state;
pub mod db;
pub mod dispatch;
pub mod error;
pub mod inference;
pub mod ledger;
pub mod models;
pub mod recommendation;
pub mod reports;

#[cfg(test)]
pub(crate) mod testing;

use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use crate::core_state::{CoreError, CoreState};

/// Server entry point: load settings, prepare the database, serve the API
/// until Ctrl-C.
pub fn run() -> Result<(), CoreError> {
    // A missing .env file is normal.
    let _ = dotenvy::dotenv();
    let settings = config::Settings::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config::default_log_filter())),
        )
        .init();

    tracing::info!("Phytoscan starting v{}", config::APP_VERSION);

    let bind = settings.bind;
    let core = Arc::new(CoreState::new(settings)?);
    core.initialize()?;
    if let Some(summary) = core.seed_catalog()? {
        tracing::info!(
            diseases = summary.diseases_added,
            treatments = summary.treatments_added,
            users = summary.users_added,
            "Catalog seed applied"
        );
    }

    // The blocking inference client must be dropped outside the runtime.
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;

    runtime.block_on(async {
        let server = api::start_api_server(Arc::clone(&core), bind)
            .await
            .map_err(CoreError::Server)?;
        tracing::info!(addr = %server.session.server_addr, "Phytoscan API listening");

        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Cannot listen for shutdown signal: {e}");
        }
        server.stop().await;
        Ok::<(), CoreError>(())
    })?;

    drop(runtime);
    drop(core);
    tracing::info!("Phytoscan stopped");
    Ok(())
}
