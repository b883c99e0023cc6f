//! Service entry point.
//!
//! # Responsibility
//! - Resolve configuration, start logging, open the selected store.
//! - Serve the catalog router until Ctrl-C.

mod config;

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use config::{Args, ServerConfig, StoreKind};
use disciplinas_core::db::open_db;
use disciplinas_core::{
    core_version, demo_catalog, init_logging, CatalogService, DisciplineRepository,
    MemoryDisciplineRepository, SqliteDisciplineRepository,
};
use log::{info, warn};
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<()> {
    let config = ServerConfig::from(Args::parse());
    init_logging(&config.log_level, config.log_dir.as_deref())
        .map_err(|err| anyhow!("logging init failed: {err}"))?;

    match config.store {
        StoreKind::Sqlite => {
            let conn = open_db(&config.db_path)
                .with_context(|| format!("opening {}", config.db_path.display()))?;
            let repo = SqliteDisciplineRepository::try_new(conn)?;
            serve(&config, repo).await
        }
        StoreKind::Memory => serve(&config, MemoryDisciplineRepository::new()).await,
    }
}

async fn serve<R: DisciplineRepository + 'static>(config: &ServerConfig, repo: R) -> Result<()> {
    let service = CatalogService::with_note_id_rule(repo, config.note_id_rule);
    if config.seed {
        let added = service.seed_if_empty(demo_catalog())?;
        info!("event=server_seed module=cli status=ok added={added}");
    }

    let listener = tokio::net::TcpListener::bind(config.bind)
        .await
        .with_context(|| format!("binding {}", config.bind))?;
    info!(
        "event=server_start module=cli status=ok bind={} store={:?} note_ids={:?} version={}",
        config.bind,
        config.store,
        config.note_id_rule,
        core_version()
    );

    axum::serve(listener, disciplinas_api::app(Arc::new(service)))
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    info!("event=server_stop module=cli status=ok");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!("event=server_signal module=cli status=error error_code=signal_failed error={err}");
        // Without a signal handler the server runs until killed.
        std::future::pending::<()>().await;
    }
}
