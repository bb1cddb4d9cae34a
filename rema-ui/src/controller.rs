//! Session controller
//!
//! The single write path into [`SessionState`]. Every user action (submit,
//! rehydrate, clear, export) goes through here and either applies completely or
//! leaves the state exactly as it was.
//!
//! Each state-changing action takes a dispatch sequence number before its
//! network round-trip. A result is applied only if no action with a higher
//! number has been applied meanwhile, so a slow request can never overwrite
//! newer data.

use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use rema_common::export::{render_genre_rows, render_global_rows, render_records};
use rema_common::{normalize_payload, Error, ExportMode, Result};
use tokio::sync::RwLock;
use tracing::{info, warn};

use crate::client::AnalysisService;
use crate::session::{SessionSnapshot, SessionState};

/// Genre vocabulary offered to the user
pub const KNOWN_GENRES: &[&str] = &[
    "Drama",
    "Romance",
    "Comedy",
    "Thriller",
    "Action",
    "Fantasy",
    "Horror",
    "Family",
    "Adventure",
    "Crime",
    "Science Fiction",
    "Mystery",
    "Music",
    "Animation",
    "Foreign",
    "History",
    "Documentary",
    "War",
    "TV Movie",
    "Western",
];

/// Split a multi-line text box into one review per non-blank line
pub fn split_reviews(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

/// What happened to a completed round-trip
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// Result applied to Session State
    Applied { records: usize, revision: u64 },
    /// A newer action was applied first; this result was dropped
    Discarded { sequence: u64 },
    /// Nothing to apply (empty history)
    Unchanged,
}

/// Which table to export
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExportView {
    /// One row per review
    #[default]
    Records,
    /// Global emotion averages
    Global,
    /// Per-genre emotion averages
    Genre,
}

impl FromStr for ExportView {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "records" => Ok(ExportView::Records),
            "global" => Ok(ExportView::Global),
            "genre" => Ok(ExportView::Genre),
            other => Err(Error::InvalidInput(format!(
                "unknown export view '{}' (expected 'records', 'global' or 'genre')",
                other
            ))),
        }
    }
}

struct Inner {
    state: SessionState,
    /// Highest dispatch sequence applied so far
    last_applied: u64,
}

impl Inner {
    fn is_stale(&self, sequence: u64) -> bool {
        sequence < self.last_applied
    }
}

/// Serializes all access to Session State
pub struct SessionController {
    service: Arc<dyn AnalysisService>,
    inner: RwLock<Inner>,
    dispatch_seq: AtomicU64,
    default_export_mode: ExportMode,
}

impl SessionController {
    pub fn new(service: Arc<dyn AnalysisService>, default_export_mode: ExportMode) -> Self {
        Self {
            service,
            inner: RwLock::new(Inner {
                state: SessionState::new(),
                last_applied: 0,
            }),
            dispatch_seq: AtomicU64::new(0),
            default_export_mode,
        }
    }

    pub fn default_export_mode(&self) -> ExportMode {
        self.default_export_mode
    }

    fn next_sequence(&self) -> u64 {
        self.dispatch_seq.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub async fn snapshot(&self) -> SessionSnapshot {
        self.inner.read().await.state.snapshot()
    }

    pub async fn record_count(&self) -> usize {
        self.inner.read().await.state.records().len()
    }

    /// Classify a batch and append it
    ///
    /// Reviews are trimmed and blank ones dropped; genres likewise, with
    /// duplicates removed. At least one of each is required.
    pub async fn submit(&self, reviews: &[String], genres: &[String]) -> Result<ApplyOutcome> {
        let reviews: Vec<String> = reviews
            .iter()
            .map(|r| r.trim())
            .filter(|r| !r.is_empty())
            .map(str::to_string)
            .collect();
        if reviews.is_empty() {
            return Err(Error::InvalidInput(
                "at least one non-blank review is required".to_string(),
            ));
        }

        let mut unique_genres: Vec<String> = Vec::new();
        for genre in genres.iter().map(|g| g.trim()).filter(|g| !g.is_empty()) {
            if !unique_genres.iter().any(|g| g == genre) {
                unique_genres.push(genre.to_string());
            }
        }
        if unique_genres.is_empty() {
            return Err(Error::InvalidInput(
                "at least one genre must be selected".to_string(),
            ));
        }

        let sequence = self.next_sequence();
        info!(
            sequence,
            reviews = reviews.len(),
            genres = unique_genres.len(),
            "Dispatching analysis batch"
        );

        let payload = self
            .service
            .submit_for_analysis(&reviews, &unique_genres)
            .await?;
        let batch = normalize_payload(&payload)?;

        let mut inner = self.inner.write().await;
        if inner.is_stale(sequence) {
            warn!(
                sequence,
                last_applied = inner.last_applied,
                "Discarding stale analysis result"
            );
            return Ok(ApplyOutcome::Discarded { sequence });
        }

        let records = batch.records.len();
        inner.state.append(batch);
        inner.last_applied = sequence;

        let revision = inner.state.revision();
        info!(sequence, records, revision, "Analysis batch applied");
        Ok(ApplyOutcome::Applied { records, revision })
    }

    /// Load the service's history into an empty or stale session
    pub async fn rehydrate(&self) -> Result<ApplyOutcome> {
        let sequence = self.next_sequence();
        info!(sequence, "Rehydrating session from service history");

        let payload = self.service.fetch_history().await?;
        let batch = normalize_payload(&payload)?;

        if batch.records.is_empty() {
            info!("Service history is empty, session left as is");
            return Ok(ApplyOutcome::Unchanged);
        }

        let mut inner = self.inner.write().await;
        if inner.is_stale(sequence) {
            warn!(
                sequence,
                last_applied = inner.last_applied,
                "Discarding stale history"
            );
            return Ok(ApplyOutcome::Discarded { sequence });
        }

        let records = batch.records.len();
        inner.state.replace_all(batch);
        inner.last_applied = sequence;

        let revision = inner.state.revision();
        info!(sequence, records, revision, "Session rehydrated");
        Ok(ApplyOutcome::Applied { records, revision })
    }

    /// Clear locally and on the service; a failed reset restores the prior state
    ///
    /// Also invalidates every round-trip dispatched before the clear.
    pub async fn clear(&self) -> Result<()> {
        let sequence = self.next_sequence();
        let mut inner = self.inner.write().await;

        let prior = inner.state.clear();
        let prior_applied = inner.last_applied;
        inner.last_applied = sequence;

        if let Err(e) = self.service.reset_history().await {
            warn!(error = %e, "History reset failed, restoring session");
            inner.state.restore(prior);
            inner.last_applied = prior_applied;
            return Err(e);
        }

        info!(
            sequence,
            cleared = prior.records().len(),
            "Session cleared"
        );
        Ok(())
    }

    /// Render the held session as CSV; `EmptyInput` when there is nothing yet
    pub async fn export(&self, mode: ExportMode, view: ExportView) -> Result<String> {
        let inner = self.inner.read().await;
        let state = &inner.state;

        match view {
            ExportView::Records => render_records(state.records(), mode),
            ExportView::Global => render_global_rows(&state.views().global_emotion_chart),
            ExportView::Genre => render_genre_rows(&state.views().genre_emotion_summary),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::{json, Value};
    use std::sync::atomic::AtomicBool;
    use std::sync::Mutex;
    use tokio::sync::Notify;

    /// In-memory service: echoes reviews with fixed emotions
    #[derive(Default)]
    struct FakeService {
        history: Mutex<Value>,
        fail_reset: AtomicBool,
        resets: AtomicU64,
    }

    fn echo(reviews: &[String], genres: &[String]) -> Value {
        let results: Vec<Value> = reviews
            .iter()
            .map(|r| {
                json!({
                    "Review": r,
                    "Genre": genres,
                    "Sentiment": "Positive",
                    "Emotions": [{"Emotion": "Joy", "Score": 0.8}, {"Emotion": "Love", "Score": 0.4}]
                })
            })
            .collect();
        json!({ "results": results })
    }

    #[async_trait]
    impl AnalysisService for FakeService {
        async fn submit_for_analysis(&self, reviews: &[String], genres: &[String]) -> Result<Value> {
            Ok(echo(reviews, genres))
        }

        async fn fetch_history(&self) -> Result<Value> {
            Ok(self.history.lock().unwrap().clone())
        }

        async fn reset_history(&self) -> Result<()> {
            self.resets.fetch_add(1, Ordering::SeqCst);
            if self.fail_reset.load(Ordering::SeqCst) {
                return Err(Error::TransportFailure("reset refused".to_string()));
            }
            Ok(())
        }
    }

    /// Holds the first submission until released, answers later ones at once
    struct GatedService {
        gate: Notify,
        calls: AtomicU64,
    }

    #[async_trait]
    impl AnalysisService for GatedService {
        async fn submit_for_analysis(&self, reviews: &[String], genres: &[String]) -> Result<Value> {
            if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
                self.gate.notified().await;
            }
            Ok(echo(reviews, genres))
        }

        async fn fetch_history(&self) -> Result<Value> {
            Ok(json!({"results": []}))
        }

        async fn reset_history(&self) -> Result<()> {
            Ok(())
        }
    }

    /// Always answers with something the normalizer rejects
    struct BrokenService;

    #[async_trait]
    impl AnalysisService for BrokenService {
        async fn submit_for_analysis(&self, _: &[String], _: &[String]) -> Result<Value> {
            Ok(json!("not a payload"))
        }

        async fn fetch_history(&self) -> Result<Value> {
            Err(Error::TransportFailure("connection refused".to_string()))
        }

        async fn reset_history(&self) -> Result<()> {
            Ok(())
        }
    }

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    fn controller(service: Arc<dyn AnalysisService>) -> SessionController {
        SessionController::new(service, ExportMode::TopEmotions)
    }

    #[test]
    fn test_split_reviews() {
        let reviews = split_reviews("  Great film!\n\n\tToo slow and boring  \r\n   \n");
        assert_eq!(reviews, strings(&["Great film!", "Too slow and boring"]));
        assert!(split_reviews(" \n ").is_empty());
    }

    #[test]
    fn test_export_view_parse() {
        assert_eq!("Genre".parse::<ExportView>().unwrap(), ExportView::Genre);
        assert!(matches!("chart".parse::<ExportView>(), Err(Error::InvalidInput(_))));
    }

    #[test]
    fn test_known_genres() {
        assert_eq!(KNOWN_GENRES.len(), 20);
        assert!(KNOWN_GENRES.contains(&"Science Fiction"));
    }

    #[tokio::test]
    async fn test_submit_validates_input() {
        let ctl = controller(Arc::new(FakeService::default()));

        let err = ctl.submit(&strings(&["  ", ""]), &strings(&["Drama"])).await.unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));

        let err = ctl.submit(&strings(&["ok"]), &strings(&[" "])).await.unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));

        assert_eq!(ctl.snapshot().await.record_count, 0);
    }

    #[tokio::test]
    async fn test_submit_appends_batches() {
        let ctl = controller(Arc::new(FakeService::default()));

        let first = ctl
            .submit(&strings(&["Great film!", "Too slow and boring"]), &strings(&["Drama", "Drama"]))
            .await
            .unwrap();
        assert!(matches!(first, ApplyOutcome::Applied { records: 2, .. }));

        ctl.submit(&strings(&["Loved it"]), &strings(&["Comedy"])).await.unwrap();

        let snapshot = ctl.snapshot().await;
        assert_eq!(snapshot.record_count, 3);
        assert_eq!(snapshot.records[0].genres, strings(&["Drama"]));
        assert_eq!(snapshot.views.genre_emotion_summary.len(), 2);
    }

    #[tokio::test]
    async fn test_malformed_response_leaves_state_unchanged() {
        let ctl = controller(Arc::new(BrokenService));

        let err = ctl.submit(&strings(&["text"]), &strings(&["Drama"])).await.unwrap_err();
        assert!(matches!(err, Error::MalformedPayload(_)));

        let err = ctl.rehydrate().await.unwrap_err();
        assert!(matches!(err, Error::TransportFailure(_)));

        let snapshot = ctl.snapshot().await;
        assert_eq!(snapshot.revision, 0);
        assert!(snapshot.records.is_empty());
    }

    #[tokio::test]
    async fn test_slow_first_submission_is_discarded() {
        let service = Arc::new(GatedService {
            gate: Notify::new(),
            calls: AtomicU64::new(0),
        });
        let ctl = Arc::new(controller(service.clone()));

        let slow = {
            let ctl = ctl.clone();
            tokio::spawn(async move { ctl.submit(&strings(&["old"]), &strings(&["Drama"])).await })
        };
        while service.calls.load(Ordering::SeqCst) == 0 {
            tokio::task::yield_now().await;
        }

        let fast = ctl.submit(&strings(&["new"]), &strings(&["Drama"])).await.unwrap();
        assert!(matches!(fast, ApplyOutcome::Applied { records: 1, .. }));

        service.gate.notify_one();
        let slow = slow.await.unwrap().unwrap();
        assert_eq!(slow, ApplyOutcome::Discarded { sequence: 1 });

        let snapshot = ctl.snapshot().await;
        assert_eq!(snapshot.records.len(), 1);
        assert_eq!(snapshot.records[0].text, "new");
    }

    #[tokio::test]
    async fn test_rehydrate_replaces_state() {
        let service = Arc::new(FakeService::default());
        *service.history.lock().unwrap() = echo(&strings(&["h1", "h2"]), &strings(&["War"]));
        let ctl = controller(service);

        ctl.submit(&strings(&["local"]), &strings(&["Drama"])).await.unwrap();
        let outcome = ctl.rehydrate().await.unwrap();
        assert!(matches!(outcome, ApplyOutcome::Applied { records: 2, .. }));

        let snapshot = ctl.snapshot().await;
        let texts: Vec<&str> = snapshot.records.iter().map(|r| r.text.as_str()).collect();
        assert_eq!(texts, vec!["h1", "h2"]);
    }

    #[tokio::test]
    async fn test_empty_history_leaves_state_untouched() {
        let service = Arc::new(FakeService::default());
        *service.history.lock().unwrap() = json!({"results": []});
        let ctl = controller(service);

        ctl.submit(&strings(&["kept"]), &strings(&["Drama"])).await.unwrap();
        let before = ctl.snapshot().await;

        assert_eq!(ctl.rehydrate().await.unwrap(), ApplyOutcome::Unchanged);
        let after = ctl.snapshot().await;
        assert_eq!(after.revision, before.revision);
        assert_eq!(after.records, before.records);
    }

    #[tokio::test]
    async fn test_clear_resets_service() {
        let service = Arc::new(FakeService::default());
        let ctl = controller(service.clone());

        ctl.submit(&strings(&["gone"]), &strings(&["Drama"])).await.unwrap();
        let before = ctl.snapshot().await;
        ctl.clear().await.unwrap();

        let after = ctl.snapshot().await;
        assert_eq!(service.resets.load(Ordering::SeqCst), 1);
        assert!(after.records.is_empty());
        assert!(after.views.is_empty());
        assert_ne!(after.session_id, before.session_id);
    }

    #[tokio::test]
    async fn test_failed_reset_restores_prior_state() {
        let service = Arc::new(FakeService::default());
        service.fail_reset.store(true, Ordering::SeqCst);
        let ctl = controller(service);

        ctl.submit(&strings(&["kept"]), &strings(&["Drama"])).await.unwrap();
        let before = ctl.snapshot().await;

        let err = ctl.clear().await.unwrap_err();
        assert!(matches!(err, Error::TransportFailure(_)));

        let after = ctl.snapshot().await;
        assert_eq!(after.session_id, before.session_id);
        assert_eq!(after.records, before.records);
        assert_eq!(after.views, before.views);
    }

    #[tokio::test]
    async fn test_clear_then_submit_has_only_new_batch() {
        let ctl = controller(Arc::new(FakeService::default()));

        ctl.submit(&strings(&["first"]), &strings(&["Horror"])).await.unwrap();
        ctl.clear().await.unwrap();
        ctl.submit(&strings(&["second"]), &strings(&["Comedy"])).await.unwrap();

        let snapshot = ctl.snapshot().await;
        assert_eq!(snapshot.records.len(), 1);
        assert_eq!(snapshot.views.genre_emotion_summary.len(), 1);
        assert_eq!(snapshot.views.genre_emotion_summary[0].genre, "Comedy");
    }

    #[tokio::test]
    async fn test_export_views() {
        let ctl = controller(Arc::new(FakeService::default()));

        let err = ctl
            .export(ExportMode::TopEmotions, ExportView::Records)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::EmptyInput(_)));

        ctl.submit(&strings(&["Great film!", "Too slow and boring"]), &strings(&["Drama"]))
            .await
            .unwrap();

        let records = ctl.export(ExportMode::TopEmotions, ExportView::Records).await.unwrap();
        assert_eq!(records.lines().count(), 3);
        assert!(records.contains("\"Joy (0.800)\",\"Love (0.400)\""));

        let global = ctl.export(ExportMode::AllEmotions, ExportView::Global).await.unwrap();
        assert_eq!(global.lines().next(), Some("\"Emotion\",\"Score\""));

        let genre = ctl.export(ExportMode::AllEmotions, ExportView::Genre).await.unwrap();
        assert_eq!(genre.lines().nth(1), Some("\"Drama\",\"0.800\",\"0.400\""));
    }
}
