use actix_web::{web, App, HttpServer};
use std::io;
use std::sync::Arc;
use tokio::signal;

use dao_pending_overlay::cache::PendingStore;
use dao_pending_overlay::config::Config;
use dao_pending_overlay::http::{configure, AppState};
use dao_pending_overlay::middleware::cors_middleware;
use dao_pending_overlay::query::QueryHooks;
use dao_pending_overlay::service::{GovernanceService, GraphQlIndexer, JsonRpcSubmitter};
use dao_pending_overlay::telemetry::init_telemetry;

#[tokio::main]
async fn main() -> io::Result<()> {
    // Load configuration
    let config = Config::from_env().map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e.to_string()))?;

    // Initialize telemetry
    init_telemetry(&config.server.rust_log);

    // Seed the pending store from the persistent mirror
    let storage = config
        .cache
        .open_storage()
        .map_err(|e| io::Error::new(io::ErrorKind::Other, e.to_string()))?;
    let store = Arc::new(PendingStore::load(&config.network.name, storage).await);

    let indexer = GraphQlIndexer::new(&config.indexer.url, config.indexer.timeout())
        .map_err(|e| io::Error::new(io::ErrorKind::Other, e.to_string()))?;
    let submitter =
        JsonRpcSubmitter::with_retry_config(&config.sdk.rpc_url, config.sdk.retry_config());

    let hooks = Arc::new(QueryHooks::new(Arc::new(indexer), store.clone()));

    // Watched DAOs stay polled for the lifetime of the server
    let interval = config.poll.interval();
    let _pollers: Vec<_> = config
        .poll
        .watch_daos
        .iter()
        .map(|dao| {
            tracing::info!(dao = %dao, interval_ms = config.poll.interval_ms, "Watching DAO");
            (
                hooks.poll_proposal_list(dao, interval),
                hooks.poll_transfer_list(dao, interval),
            )
        })
        .collect();

    let governance = GovernanceService::new(Arc::new(submitter), store);
    let state = web::Data::new(AppState { hooks, governance });

    tracing::info!(
        network = %config.network.name,
        backend = ?config.cache.backend,
        "Starting DAO overlay server on {}:{}",
        config.server.host,
        config.server.port
    );

    let cors_origin = config.server.cors_allowed_origin.clone();
    let server = HttpServer::new(move || {
        App::new()
            .app_data(state.clone())
            .wrap(cors_middleware(cors_origin.as_deref()))
            .wrap(actix_web::middleware::Logger::default())
            .configure(configure)
    })
    .bind((config.server.host.clone(), config.server.port))?
    .run();

    // Graceful shutdown
    let server_handle = server.handle();
    tokio::spawn(async move {
        if signal::ctrl_c().await.is_ok() {
            tracing::info!("Shutdown signal received, stopping server...");
            server_handle.stop(true).await;
        }
    });

    server.await
}
