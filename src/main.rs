//! Clawcade server binary.

use std::sync::Arc;
use std::time::Duration;

use actix_cors::Cors;
use actix_web::{web, App, HttpServer};
use anyhow::Context;
use tracing::info;

use clawcade::api::{self, AppState};
use clawcade::cabinet::config::{CabinetConfig, PrizeCatalog};
use clawcade::chain::{IpfsMockStorage, MockSettlement};
use clawcade::session::{InMemorySessionStore, SessionStore, SWEEP_INTERVAL_SECS};
use clawcade::voucher::OracleSigner;

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let cabinet_path =
        std::env::var("CABINET_CONFIG").unwrap_or_else(|_| "config/cabinet.json".to_string());
    let catalog_path =
        std::env::var("PRIZE_CATALOG").unwrap_or_else(|_| "config/prizes.json".to_string());
    let config = CabinetConfig::load_or_default(&cabinet_path)?;
    let catalog = PrizeCatalog::load_or_default(&catalog_path)?;

    let signer = OracleSigner::from_env().context("loading oracle key")?;
    info!(oracle = %signer.address(), "oracle identity loaded");

    let sessions: Arc<InMemorySessionStore> = Arc::new(InMemorySessionStore::new());
    let settlement = Arc::new(MockSettlement::new(signer.address()));
    let storage = Arc::new(IpfsMockStorage::new());

    // In-memory sessions do not survive a restart; the periodic sweep
    // keeps the live set from accumulating abandoned entries
    let sweep_store = sessions.clone();
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(Duration::from_secs(SWEEP_INTERVAL_SECS));
        ticker.tick().await;
        loop {
            ticker.tick().await;
            sweep_store.sweep_expired().await;
        }
    });

    let state = web::Data::new(AppState::new(
        config,
        catalog,
        sessions,
        settlement,
        storage,
        signer,
    ));

    let port: u16 = std::env::var("PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(8080);
    info!(port, "clawcade server listening");

    HttpServer::new(move || {
        App::new()
            .wrap(Cors::default().allow_any_origin().allow_any_method().allow_any_header())
            .app_data(state.clone())
            .configure(api::configure)
    })
    .bind(("0.0.0.0", port))?
    .run()
    .await?;

    Ok(())
}
