//! HTTP API handlers for rema-ui

pub mod health;
pub mod session;

pub use health::health_routes;
pub use session::session_routes;
