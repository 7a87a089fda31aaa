use std::sync::Arc;
use tokio::signal;
use tracing::info;

use cortisol_tracker::http::{router, AppState};
use cortisol_tracker::{Config, PredictionService};

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    // Log filter from `CORTISOL_LOG_LEVEL`, then `RUST_LOG`, default `info`.
    let log_env = std::env::var("CORTISOL_LOG_LEVEL")
        .or_else(|_| std::env::var("RUST_LOG"))
        .unwrap_or_else(|_| "info".to_string());
    let env_filter = tracing_subscriber::EnvFilter::try_new(log_env.clone())
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .compact()
        .with_ansi(false)
        .with_target(false)
        .with_writer(std::io::stderr)
        .with_env_filter(env_filter)
        .init();
    tracing::info!(%log_env, "cortisol-server: log filter");

    let config = Config::from_env()?;
    let store = Arc::new(config.store());
    let predictions = PredictionService::new(
        store.clone(),
        config.predictor.build()?,
        config.curve_projector()?,
    );
    let state = Arc::new(AppState::new(store, predictions));
    let app = router(state);

    let addr = config.address;
    info!(
        %addr,
        root = %config.data_root.display(),
        predictor = ?config.predictor,
        "starting HTTP server"
    );
    if !config.data_root.is_dir() {
        tracing::warn!(root = %config.data_root.display(), "export folder does not exist yet");
    }

    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(l) => l,
        Err(e) => {
            tracing::error!("Failed to bind to address {addr}: {e}");
            std::process::exit(1);
        }
    };

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(async {
            if let Err(e) = signal::ctrl_c().await {
                tracing::error!("failed to install ctrl+c handler: {e}");
            }
        })
        .await?;

    info!("server stopped");
    Ok(())
}
