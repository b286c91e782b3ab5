use std::{net::SocketAddr, sync::Arc};

use tokio::{signal, sync::watch};
use tracing::{error, info, warn};

use promo_service as api;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cfg = api::config::load_config()?;
    api::config::init_tracing(cfg.log_level(), cfg.log_json);
    api::handlers::health::init_start_time();

    // Init DB
    let db_pool = api::db::establish_connection_from_app_config(&cfg).await?;
    if cfg.auto_migrate {
        api::db::run_migrations(&db_pool).await.map_err(|e| {
            error!("Failed running migrations: {}", e);
            e
        })?;
    }
    let db_arc = Arc::new(db_pool);

    let message_queue: Arc<dyn api::message_queue::MessageQueue> =
        Arc::new(api::message_queue::InMemoryMessageQueue::new());

    let state = api::AppState::new(db_arc.clone(), cfg.clone(), message_queue.clone());

    // Transaction point consumer
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let consumer_handle = if cfg.consumer_enabled {
        let consumer = api::consumers::TransactionPointConsumer::new(
            message_queue.clone(),
            (*state.services.engine).clone(),
            cfg.queue_poll_interval(),
        )
        .with_namespace(&cfg.message_queue_namespace);
        info!(
            request_topic = consumer.request_topic(),
            reply_topic = consumer.reply_topic(),
            "Starting transaction point consumer"
        );
        Some(consumer.spawn(shutdown_rx))
    } else {
        info!("Transaction point consumer disabled");
        None
    };

    let app = api::app_router(state)?;

    let addr: SocketAddr = format!("{}:{}", cfg.host, cfg.port).parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("promo-service listening on {}", addr);

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("HTTP server stopped, draining background workers");
    let _ = shutdown_tx.send(true);
    if let Some(handle) = consumer_handle {
        if let Err(e) = handle.await {
            warn!("Transaction point consumer ended abnormally: {}", e);
        }
    }

    match Arc::try_unwrap(db_arc) {
        Ok(pool) => {
            if let Err(e) = api::db::close_pool(pool).await {
                warn!("Failed to close database pool cleanly: {}", e);
            }
        }
        Err(_) => warn!("Database pool still shared at shutdown; leaving it to drop"),
    }

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("Shutdown signal received");
}
