//! Session State
//!
//! Holds the accumulated review records of one browser session together with
//! the derived views computed from exactly that record set. `append`,
//! `replace_all` and `clear` are the only mutation entry points; each one
//! leaves records and views paired.

use chrono::{DateTime, Utc};
use rema_common::aggregate::{derive_aggregate, overall_average, resolve_views};
use rema_common::{AggregateRecord, DerivedViews, NormalizedBatch, ReviewRecord};
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::debug;
use uuid::Uuid;

/// Accumulated analysis results plus their derived views
#[derive(Debug, Clone)]
pub struct SessionState {
    session_id: Uuid,
    revision: u64,
    updated_at: DateTime<Utc>,
    records: Vec<ReviewRecord>,
    /// Aggregate of the most recently applied batch
    aggregate: Option<AggregateRecord>,
    views: DerivedViews,
}

impl Default for SessionState {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionState {
    pub fn new() -> Self {
        Self {
            session_id: Uuid::new_v4(),
            revision: 0,
            updated_at: Utc::now(),
            records: Vec::new(),
            aggregate: None,
            views: DerivedViews::default(),
        }
    }

    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn records(&self) -> &[ReviewRecord] {
        &self.records
    }

    pub fn views(&self) -> &DerivedViews {
        &self.views
    }

    pub fn aggregate(&self) -> Option<&AggregateRecord> {
        self.aggregate.as_ref()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Add a batch and recompute the views over the full held record set
    ///
    /// Views the service sent are taken verbatim, the rest are computed locally.
    /// A batch without records leaves the state untouched.
    pub fn append(&mut self, batch: NormalizedBatch) {
        let NormalizedBatch {
            records,
            aggregate,
            views,
        } = batch;

        if records.is_empty() {
            debug!(revision = self.revision, "Empty batch ignored");
            return;
        }

        let aggregate = aggregate.or_else(|| derive_aggregate(&records));
        self.records.extend(records);
        self.views = resolve_views(&self.records, &views);
        self.aggregate = aggregate;
        self.touch();

        debug!(
            records = self.records.len(),
            revision = self.revision,
            "Session state appended"
        );
    }

    /// Replace everything held with a rehydrated snapshot
    pub fn replace_all(&mut self, batch: NormalizedBatch) {
        let NormalizedBatch {
            records,
            aggregate,
            views,
        } = batch;

        self.views = resolve_views(&records, &views);
        self.aggregate = aggregate.or_else(|| derive_aggregate(&records));
        self.records = records;
        self.touch();

        debug!(
            records = self.records.len(),
            revision = self.revision,
            "Session state replaced"
        );
    }

    /// Reset to empty under a fresh session id, returning the prior state
    pub fn clear(&mut self) -> SessionState {
        let mut fresh = SessionState::new();
        fresh.revision = self.revision + 1;
        std::mem::replace(self, fresh)
    }

    /// Put back a state previously returned by [`SessionState::clear`]
    pub fn restore(&mut self, prior: SessionState) {
        *self = prior;
    }

    /// Serializable copy for the browser
    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            session_id: self.session_id,
            revision: self.revision,
            updated_at: self.updated_at,
            record_count: self.records.len(),
            records: self.records.clone(),
            aggregate: self.aggregate.clone(),
            overall_average: overall_average(&self.views.global_emotion_chart),
            trend_rows: self.views.emotion_trend.to_rows(),
            views: self.views.clone(),
        }
    }

    fn touch(&mut self) {
        self.revision += 1;
        self.updated_at = Utc::now();
    }
}

/// Point-in-time copy of Session State
#[derive(Debug, Clone, Serialize)]
pub struct SessionSnapshot {
    pub session_id: Uuid,
    pub revision: u64,
    pub updated_at: DateTime<Utc>,
    pub record_count: usize,
    pub records: Vec<ReviewRecord>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub aggregate: Option<AggregateRecord>,
    pub views: DerivedViews,
    /// Benchmark line of the global chart
    pub overall_average: Option<f64>,
    /// Trend series pivoted for line charts
    pub trend_rows: Vec<Map<String, Value>>,
}
