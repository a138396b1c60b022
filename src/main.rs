use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{error, info};

use gas_procurement_api::{
    config, db,
    events::{self, EventSender},
    handlers::{app_router, AppState},
    services::notifications::LogNotifier,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let app_config = config::load_config()?;
    config::init_tracing(app_config.log_level(), app_config.log_json);

    info!(
        environment = %app_config.environment,
        "Starting gas procurement API"
    );

    let db_pool = Arc::new(db::establish_connection_from_app_config(&app_config).await?);

    if app_config.auto_migrate {
        db::run_migrations(db_pool.as_ref()).await?;
    }

    let (event_tx, event_rx) = mpsc::channel(1024);
    let event_sender = Arc::new(EventSender::new(event_tx));
    tokio::spawn(events::process_events(event_rx));

    let state = Arc::new(AppState::new(
        db_pool,
        event_sender,
        Arc::new(LogNotifier),
        &app_config,
    ));

    let app = app_router(state);

    let addr = app_config.server_addr();
    info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => error!("Failed to install SIGTERM handler: {}", e),
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, shutting down"),
        _ = terminate => info!("Received SIGTERM, shutting down"),
    }
}
