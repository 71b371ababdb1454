use secure_file_sync::config::load_config;
use secure_file_sync::logging::setup_logging;
use secure_file_sync::shutdown::Shutdown;
use secure_file_sync::{AppState, api};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

const DEFAULT_CONFIG_PATH: &str = "sync_config.toml";
const DISPATCH_DRAIN_TIMEOUT: Duration = Duration::from_secs(10);

#[tokio::main]
async fn main() {
    dotenv::dotenv().ok();

    let config_path =
        std::env::var("SYNC_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());

    let config = match load_config(&config_path) {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            std::process::exit(1);
        }
    };

    let _log_guard = match setup_logging(&config.logging) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Logging setup failed: {}", e);
            std::process::exit(1);
        }
    };

    let (shutdown_tx, shutdown) = Shutdown::channel();
    let state = match AppState::from_config(&config, shutdown) {
        Ok(state) => Arc::new(state),
        Err(e) => {
            error!("{}", e);
            std::process::exit(1);
        }
    };
    if state.webhook_secret.is_none() {
        error!("GITHUB_WEBHOOK_SECRET is not set; every webhook will be rejected");
    }

    let app = api::router(state.clone());

    let bind_address = config.server.bind_address.clone();
    let listener = match tokio::net::TcpListener::bind(&bind_address).await {
        Ok(listener) => listener,
        Err(e) => {
            error!("Failed to bind {}: {}", bind_address, e);
            std::process::exit(1);
        }
    };
    info!("Listening on {}", bind_address);
    info!("Using config at {:?}", config_path);

    let served = axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!("ctrl-c handler failed: {}", e);
                std::future::pending::<()>().await;
            }
            info!("Received ctrl-c, cancelling in-flight dispatches");
            let _ = shutdown_tx.send(true);
        })
        .await;

    if let Err(e) = served {
        error!("Server error: {}", e);
        std::process::exit(1);
    }

    let reports = state.drain_dispatches(DISPATCH_DRAIN_TIMEOUT).await;
    info!("Shut down after draining {} dispatch(es)", reports.len());
}
