//! rema-ui - Review Emotion Multi-Analysis browser service
//!
//! Collects movie reviews from the browser, sends them to the classification
//! service, accumulates the results for the session and serves the derived
//! emotion views plus CSV downloads.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use rema_common::config::{
    default_config_path, load_toml_config, CliOverrides, ResolvedConfig, TomlConfig,
};
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, reload, util::SubscriberInitExt, EnvFilter};

use rema_ui::client::HttpAnalysisClient;
use rema_ui::controller::{ApplyOutcome, SessionController};
use rema_ui::AppState;

/// Command-line arguments for rema-ui
#[derive(Parser, Debug)]
#[command(name = "rema-ui")]
#[command(about = "Review Emotion Multi-Analysis browser service")]
#[command(version)]
struct Args {
    /// Port to listen on
    #[arg(short, long)]
    port: Option<u16>,

    /// Classification service base URL
    #[arg(short, long)]
    service_url: Option<String>,

    /// Config file (defaults to <config dir>/rema/config.toml)
    #[arg(short, long, env = "REMA_CONFIG")]
    config: Option<PathBuf>,

    /// Directory with the browser bundle to serve at /
    #[arg(long)]
    static_assets: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error); RUST_LOG takes precedence
    #[arg(long)]
    log_level: Option<String>,

    /// Skip loading the service's history at startup
    #[arg(long)]
    no_rehydrate: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Logging comes up before config so config-file warnings are visible;
    // the configured level is applied once the config is resolved.
    let env_filter = EnvFilter::try_from_default_env().ok();
    let has_env_filter = env_filter.is_some();
    let (filter, filter_handle) = reload::Layer::new(
        env_filter.unwrap_or_else(|| default_filter(args.log_level.as_deref().unwrap_or("info"))),
    );
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    let toml_config = match args.config.clone().or_else(default_config_path) {
        Some(path) => load_toml_config(&path)?,
        None => TomlConfig::default(),
    };
    let config = ResolvedConfig::resolve(
        &CliOverrides {
            service_url: args.service_url.clone(),
            port: args.port,
            static_assets: args.static_assets.clone(),
            log_level: args.log_level.clone(),
        },
        &toml_config,
    )?;

    if !has_env_filter {
        filter_handle
            .reload(default_filter(&config.log_level))
            .context("Failed to apply configured log level")?;
    }

    info!(
        version = env!("CARGO_PKG_VERSION"),
        git_hash = env!("REMA_GIT_HASH"),
        built = env!("REMA_BUILD_TIMESTAMP"),
        profile = env!("REMA_BUILD_PROFILE"),
        "Starting rema-ui"
    );
    info!(
        service_url = %config.service_url,
        timeout_secs = config.request_timeout.as_secs(),
        export_mode = %config.export_mode,
        "Classification service configured"
    );

    let client = HttpAnalysisClient::new(config.service_url.clone(), config.request_timeout)?;
    let controller = Arc::new(SessionController::new(Arc::new(client), config.export_mode));
    let state = AppState::new(controller.clone());

    // A failed rehydration is not fatal: the session simply starts empty
    if !args.no_rehydrate {
        match controller.rehydrate().await {
            Ok(ApplyOutcome::Applied { records, .. }) => {
                info!(records, "Session rehydrated from service history")
            }
            Ok(_) => info!("No prior history to rehydrate"),
            Err(e) => {
                warn!(error = %e, "Rehydration failed, starting with an empty session");
                state.record_error(e.to_string()).await;
            }
        }
    }

    if let Some(dir) = &config.static_assets {
        info!(path = %dir.display(), "Serving browser bundle");
    }
    let app = rema_ui::build_router(state, config.static_assets.as_deref());

    let addr = SocketAddr::from(([127, 0, 0, 1], config.port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;
    info!("Listening on http://{}", addr);
    info!("Health check: http://{}/health", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutdown complete");
    Ok(())
}

fn default_filter(level: &str) -> EnvFilter {
    EnvFilter::new(format!(
        "rema_ui={0},rema_common={0},tower_http=info",
        level
    ))
}

/// Resolve on Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
