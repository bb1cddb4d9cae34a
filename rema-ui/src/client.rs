//! Classification service client
//!
//! The service owns the sentiment/emotion models and a server-side history of
//! everything it has classified. This client only moves JSON across the wire;
//! interpreting the payload is the normalizer's job. No retries: a failed
//! round-trip is reported to the caller, which leaves Session State untouched.

use std::time::Duration;

use async_trait::async_trait;
use rema_common::{Error, Result};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

const PREDICT_PATH: &str = "/predict";
const HISTORY_PATH: &str = "/history";
const RESET_PATH: &str = "/reset";

/// Operations consumed from the classification service
#[async_trait]
pub trait AnalysisService: Send + Sync {
    /// Classify one batch of reviews tagged with the chosen genres
    async fn submit_for_analysis(&self, reviews: &[String], genres: &[String]) -> Result<Value>;

    /// Everything the service has classified so far
    async fn fetch_history(&self) -> Result<Value>;

    /// Drop the server-side history
    async fn reset_history(&self) -> Result<()>;
}

#[derive(Debug, Serialize)]
struct PredictRequest<'a> {
    reviews: &'a [String],
    genres: &'a [String],
}

/// reqwest-backed [`AnalysisService`]
#[derive(Debug, Clone)]
pub struct HttpAnalysisClient {
    http: reqwest::Client,
    base_url: String,
}

impl HttpAnalysisClient {
    /// `base_url` without trailing slash, e.g. `http://127.0.0.1:5000`
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("rema-ui/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| Error::Config(format!("HTTP client setup failed: {}", e)))?;

        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Check the status, then read the body as JSON
    async fn read_json(path: &str, response: reqwest::Response) -> Result<Value> {
        let response = check_status(path, response).await?;
        let body = response
            .bytes()
            .await
            .map_err(|e| transport(path, e))?;

        serde_json::from_slice(&body).map_err(|e| {
            warn!(path, error = %e, "Service returned a non-JSON body");
            Error::MalformedPayload(format!("{} returned invalid JSON: {}", path, e))
        })
    }
}

#[async_trait]
impl AnalysisService for HttpAnalysisClient {
    async fn submit_for_analysis(&self, reviews: &[String], genres: &[String]) -> Result<Value> {
        debug!(
            reviews = reviews.len(),
            genres = genres.len(),
            "Submitting batch for analysis"
        );

        let response = self
            .http
            .post(self.url(PREDICT_PATH))
            .json(&PredictRequest { reviews, genres })
            .send()
            .await
            .map_err(|e| transport(PREDICT_PATH, e))?;

        Self::read_json(PREDICT_PATH, response).await
    }

    async fn fetch_history(&self) -> Result<Value> {
        debug!("Fetching analysis history");

        let response = self
            .http
            .get(self.url(HISTORY_PATH))
            .send()
            .await
            .map_err(|e| transport(HISTORY_PATH, e))?;

        Self::read_json(HISTORY_PATH, response).await
    }

    async fn reset_history(&self) -> Result<()> {
        debug!("Resetting server-side history");

        let response = self
            .http
            .post(self.url(RESET_PATH))
            .send()
            .await
            .map_err(|e| transport(RESET_PATH, e))?;

        check_status(RESET_PATH, response).await?;
        Ok(())
    }
}

fn transport(path: &str, err: reqwest::Error) -> Error {
    let kind = if err.is_timeout() {
        "timed out"
    } else if err.is_connect() {
        "connection failed"
    } else {
        "request failed"
    };
    warn!(path, error = %err, "Classification service {}", kind);
    Error::TransportFailure(format!("{} {}: {}", path, kind, err))
}

async fn check_status(path: &str, response: reqwest::Response) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    // Body is diagnostic only; an unreadable one is not worth a second error
    let detail = response.text().await.unwrap_or_default();
    warn!(
        path,
        status_code = status.as_u16(),
        "Classification service returned an error status"
    );
    Err(Error::TransportFailure(format!(
        "{} returned HTTP {}: {}",
        path,
        status.as_u16(),
        detail.trim()
    )))
}
