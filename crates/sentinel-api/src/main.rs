//! Sentinel relay server binary.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use tokio::sync::watch;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use sentinel_api::{create_router, metrics, ApiConfig, AppState, Notifier, SmtpConfig, SmtpNotifier};
use sentinel_inference::{Backend, InferenceBackend};
use sentinel_watch::{SessionSweeper, WatchConfig};

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!("{:#}", e);
        std::process::exit(1);
    }
}

async fn run() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Install rustls crypto provider (required for rustls 0.23+)
    rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|_| anyhow::anyhow!("Failed to install rustls crypto provider"))?;

    init_tracing()?;

    info!("Starting sentinel-api");

    let config = ApiConfig::from_env();
    let watch_config = WatchConfig::from_env();
    watch_config
        .validate()
        .context("Invalid watch configuration")?;
    info!(
        host = %config.host,
        port = config.port,
        buffer_capacity = watch_config.buffer_capacity,
        window_size = watch_config.window_size,
        tick_ms = watch_config.tick_interval.as_millis() as u64,
        "Configuration loaded"
    );

    if config.guest_password.is_none() {
        warn!("GUEST_PASSWORD is not set; the UI will refuse all logins");
    }

    // Missing credentials or an unreachable local model are fatal
    let backend = Backend::from_env()
        .await
        .context("Failed to initialize inference backend")?;
    info!(engine = %backend.name(), "Using inference engine");

    let notifier: Option<Arc<dyn Notifier>> = match SmtpConfig::from_env() {
        Some(smtp) => match SmtpNotifier::new(&smtp) {
            Ok(notifier) => {
                info!(host = %smtp.host, port = smtp.port, "Email notifications enabled");
                Some(Arc::new(notifier))
            }
            Err(e) => {
                warn!(error = %e, "Email notifications disabled");
                None
            }
        },
        None => None,
    };

    let state = AppState::new(config.clone(), watch_config.clone(), backend, notifier);

    // Initialize metrics
    let metrics_enabled = std::env::var("METRICS_ENABLED")
        .map(|v| v == "true" || v == "1")
        .unwrap_or(true);

    let metrics_handle = if metrics_enabled {
        info!("Prometheus metrics enabled at /metrics");
        Some(metrics::init_metrics().context("Failed to install Prometheus recorder")?)
    } else {
        None
    };

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let sweeper = watch_config.session_idle_timeout.map(|idle_timeout| {
        SessionSweeper::spawn(Arc::clone(&state.sessions), idle_timeout, shutdown_rx)
    });

    let app = create_router(state, metrics_handle);

    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .context("Invalid bind address")?;

    info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .context("Server error")?;

    let _ = shutdown_tx.send(true);
    if let Some(sweeper) = sweeper {
        let _ = sweeper.await;
    }

    info!("Server shutdown complete");
    Ok(())
}

/// Colored output for dev, JSON when `LOG_FORMAT=json`.
fn init_tracing() -> anyhow::Result<()> {
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let mut env_filter = EnvFilter::from_default_env();
    for directive in [
        "sentinel_api=info",
        "sentinel_watch=info",
        "sentinel_inference=info",
        "tower_http=info",
    ] {
        env_filter = env_filter.add_directive(directive.parse()?);
    }

    if use_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(env_filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_ansi(true)
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_file(false)
                    .with_line_number(false),
            )
            .with(env_filter)
            .init();
    }
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Received shutdown signal");
}
