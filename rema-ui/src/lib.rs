//! rema-ui library interface
//!
//! Browser-facing service: holds the session's analysis results, talks to the
//! classification service and serves JSON views plus CSV downloads.

pub mod api;
pub mod client;
pub mod controller;
pub mod error;
pub mod session;

pub use crate::error::{ApiError, ApiResult};

use std::path::Path;
use std::sync::Arc;

use axum::Router;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use tower_http::cors::CorsLayer;
use tower_http::services::{ServeDir, ServeFile};
use tower_http::trace::TraceLayer;

use crate::controller::SessionController;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Sole access path to Session State
    pub controller: Arc<SessionController>,
    /// Service startup timestamp for uptime tracking
    pub startup_time: DateTime<Utc>,
    /// Last service-facing error for diagnostics
    pub last_error: Arc<RwLock<Option<String>>>,
}

impl AppState {
    pub fn new(controller: Arc<SessionController>) -> Self {
        Self {
            controller,
            startup_time: Utc::now(),
            last_error: Arc::new(RwLock::new(None)),
        }
    }

    pub async fn record_error(&self, message: impl Into<String>) {
        *self.last_error.write().await = Some(message.into());
    }

    pub async fn clear_error(&self) {
        *self.last_error.write().await = None;
    }
}

/// Build application router
///
/// With `static_assets` set, the browser bundle in that directory is served at
/// `/` (falling back to its `index.html`).
pub fn build_router(state: AppState, static_assets: Option<&Path>) -> Router {
    let router = Router::new()
        .merge(api::session_routes())
        .merge(api::health_routes())
        .with_state(state);

    let router = match static_assets {
        Some(dir) => router.fallback_service(
            ServeDir::new(dir).not_found_service(ServeFile::new(dir.join("index.html"))),
        ),
        None => router,
    };

    router
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}
