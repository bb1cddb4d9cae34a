//! # REMA Common Library
//!
//! Shared code for the REMA review-analysis services:
//! - Canonical review/emotion data model
//! - Normalization of classification-service payloads
//! - Aggregated emotion views (global, per-genre, trend)
//! - CSV export
//! - Configuration loading

pub mod aggregate;
pub mod config;
pub mod error;
pub mod export;
pub mod model;
pub mod normalize;

pub use error::{Error, Result};
pub use export::ExportMode;
pub use model::{
    AggregateRecord, DerivedViews, EmotionScore, GenreEmotionRow, GlobalEmotionRow, ReviewRecord,
    Sentiment, TrendLine, TrendPoint, TrendSeries,
};
pub use normalize::{normalize_payload, NormalizedBatch, ServerViews};
