use recordstore::ClientFactory;
use server_http::{AppState, build_router};
use shared::Error;
use shared::config::Config;
use storage_engine::RecordStoreConnector;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    // Load environment variables from .env file (if exists)
    let dotenv = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    match dotenv {
        Ok(path) => info!("Loaded environment variables from {}", path.display()),
        Err(_) => info!("No .env file found, using system environment variables"),
    }

    if let Err(e) = run(Config::from_env()).await {
        error!("Record peer stopped: {}", e);
        std::process::exit(1);
    }
}

async fn run(config: Config) -> shared::Result<()> {
    info!("Starting record peer (backend: {})...", config.records.name());

    let factory = ClientFactory::new(RecordStoreConnector::from_config(&config));
    let records = factory.get_client().await?;
    let router = build_router(AppState::new(records));

    let addr = config.bind_addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| Error::Connection(format!("Failed to bind {}: {}", addr, e)))?;

    info!("Record peer listening on http://{}", addr);
    info!("Try: curl http://{}/health", addr);

    let served = axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| Error::Internal(format!("Server error: {}", e)));

    info!("Server stopped, closing record store...");
    factory.close().await?;
    info!("Shutdown complete");

    served
}

async fn shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C signal");
        },
        _ = terminate => {
            info!("Received terminate signal");
        },
    }

    info!("Shutting down gracefully...");
}
