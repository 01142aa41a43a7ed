//! Metering reverse proxy — binary entry point.

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use meter_service::{create_router, AppState, Config};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info,meter_service=debug".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env().unwrap_or_else(|err| {
        tracing::error!(error = %err, "failed to load configuration");
        std::process::exit(1);
    });

    tracing::info!(listen_addr = %config.listen_addr(), domestic_api_url = %config.domestic_api_url, "starting meter-proxy");

    let state = AppState::new(config);
    state.spawn_background_tasks();

    let listener = tokio::net::TcpListener::bind(state.config.listen_addr()).await?;
    let app = create_router(state);

    axum::serve(listener, app).with_graceful_shutdown(shutdown_signal()).await?;

    Ok(())
}

/// Waits for Ctrl+C (or, on Unix, SIGTERM) so in-flight requests get a chance
/// to finish before the process exits. The background janitor and retry
/// scanner hold no state worth flushing — the cache and queue are
/// process-lifetime and best-effort by design: no persistence across
/// restarts.
async fn shutdown_signal() {
    let ctrl_c = async { tokio::signal::ctrl_c().await.expect("failed to install Ctrl+C handler") };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    tracing::info!("shutdown signal received");
}

