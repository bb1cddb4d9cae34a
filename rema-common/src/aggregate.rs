//! Aggregation engine
//!
//! Three independent pure views over a sequence of review records:
//! - global emotion averages
//! - per-genre emotion averages
//! - per-review emotion trend
//!
//! All means are unweighted over present observations. Rounding to 3 decimals
//! happens once, when a view is emitted; accumulators keep full precision.
//! Output order is always first-seen order, never sorted by value.

use std::collections::HashMap;

use crate::model::{
    AggregateRecord, DerivedViews, EmotionScore, GenreEmotionRow, GlobalEmotionRow, ReviewRecord,
    Sentiment, TrendLine, TrendPoint, TrendSeries,
};
use crate::normalize::ServerViews;

/// Round half away from zero to 3 decimal places
pub fn round3(value: f64) -> f64 {
    (value * 1000.0).round() / 1000.0
}

#[derive(Debug, Default, Clone, Copy)]
struct MeanAccumulator {
    sum: f64,
    count: usize,
}

impl MeanAccumulator {
    fn add(&mut self, value: f64) {
        self.sum += value;
        self.count += 1;
    }

    fn mean(&self) -> f64 {
        self.sum / self.count as f64
    }
}

/// Per-label means, remembering first-seen label order
#[derive(Debug, Default)]
struct OrderedMeans {
    labels: Vec<String>,
    buckets: HashMap<String, MeanAccumulator>,
}

impl OrderedMeans {
    fn add(&mut self, label: &str, value: f64) {
        if !self.buckets.contains_key(label) {
            self.labels.push(label.to_string());
        }
        self.buckets.entry(label.to_string()).or_default().add(value);
    }

    fn into_rounded(self) -> Vec<EmotionScore> {
        let OrderedMeans { labels, buckets } = self;
        labels
            .into_iter()
            .map(|label| {
                let score = round3(buckets[&label].mean());
                EmotionScore { label, score }
            })
            .collect()
    }
}

/// Emotions of one record, first occurrence of each label only
///
/// Trend points are one per record, so repeated labels collapse there.
/// Averages use every observed score.
fn distinct_emotions(record: &ReviewRecord) -> impl Iterator<Item = &EmotionScore> {
    record
        .emotions
        .iter()
        .enumerate()
        .filter(|(i, e)| !record.emotions[..*i].iter().any(|prev| prev.label == e.label))
        .map(|(_, e)| e)
}

/// Genres of one record, each counted once
fn distinct_genres(record: &ReviewRecord) -> impl Iterator<Item = &String> {
    record
        .genres
        .iter()
        .enumerate()
        .filter(|(i, g)| !record.genres[..*i].contains(g))
        .map(|(_, g)| g)
}

/// Mean score per emotion label across all records reporting it
pub fn global_emotion_averages(records: &[ReviewRecord]) -> Vec<GlobalEmotionRow> {
    let mut means = OrderedMeans::default();
    for record in records {
        for emotion in &record.emotions {
            means.add(&emotion.label, emotion.score);
        }
    }

    means
        .into_rounded()
        .into_iter()
        .map(|e| GlobalEmotionRow {
            emotion: e.label,
            score: e.score,
        })
        .collect()
}

/// Mean score per (genre, emotion)
///
/// A record with several genres contributes its full score to each of them.
/// Combinations never observed are omitted from the row.
pub fn genre_emotion_averages(records: &[ReviewRecord]) -> Vec<GenreEmotionRow> {
    let mut genres: Vec<(String, OrderedMeans)> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();

    for record in records {
        for genre in distinct_genres(record) {
            let slot = *index.entry(genre.clone()).or_insert_with(|| {
                genres.push((genre.clone(), OrderedMeans::default()));
                genres.len() - 1
            });
            for emotion in &record.emotions {
                genres[slot].1.add(&emotion.label, emotion.score);
            }
        }
    }

    genres
        .into_iter()
        .map(|(genre, means)| GenreEmotionRow {
            genre,
            scores: means.into_rounded(),
        })
        .collect()
}

/// Sparse per-emotion series over 1-based record positions
///
/// `records` must be the full accumulated history so positions are cumulative
/// across batches. Records not reporting an emotion add no point for it.
pub fn emotion_trend(records: &[ReviewRecord]) -> TrendSeries {
    let mut lines: Vec<TrendLine> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();

    for (position, record) in records.iter().enumerate() {
        for emotion in distinct_emotions(record) {
            let slot = *index.entry(emotion.label.clone()).or_insert_with(|| {
                lines.push(TrendLine {
                    emotion: emotion.label.clone(),
                    points: Vec::new(),
                });
                lines.len() - 1
            });
            lines[slot].points.push(TrendPoint {
                x: position + 1,
                y: round3(emotion.score),
            });
        }
    }

    TrendSeries(lines)
}

/// All three views computed locally
pub fn compute_views(records: &[ReviewRecord]) -> DerivedViews {
    DerivedViews {
        global_emotion_chart: global_emotion_averages(records),
        genre_emotion_summary: genre_emotion_averages(records),
        emotion_trend: emotion_trend(records),
    }
}

/// Server-computed views win; any view the server did not send is computed locally
pub fn resolve_views(records: &[ReviewRecord], server: &ServerViews) -> DerivedViews {
    let global_emotion_chart = match &server.global_emotion_chart {
        Some(rows) => rows.clone(),
        None => global_emotion_averages(records),
    };
    let genre_emotion_summary = match &server.genre_emotion_summary {
        Some(rows) => rows.clone(),
        None => genre_emotion_averages(records),
    };
    let emotion_trend = match &server.emotion_trend {
        Some(series) => series.clone(),
        None => emotion_trend(records),
    };

    tracing::debug!(
        records = records.len(),
        server_global = server.global_emotion_chart.is_some(),
        server_genre = server.genre_emotion_summary.is_some(),
        server_trend = server.emotion_trend.is_some(),
        "Resolved derived views"
    );

    DerivedViews {
        global_emotion_chart,
        genre_emotion_summary,
        emotion_trend,
    }
}

/// Locally derived aggregate record
///
/// Genres are the union in first-seen order, emotions are the global averages,
/// sentiment is the strict majority label (absent on a tie or when none reported).
pub fn derive_aggregate(records: &[ReviewRecord]) -> Option<AggregateRecord> {
    if records.is_empty() {
        return None;
    }

    let mut genres: Vec<String> = Vec::new();
    for genre in records.iter().flat_map(|r| r.genres.iter()) {
        if !genres.contains(genre) {
            genres.push(genre.clone());
        }
    }

    let emotions = global_emotion_averages(records)
        .into_iter()
        .map(|row| EmotionScore::new(row.emotion, row.score))
        .collect();

    Some(AggregateRecord {
        genres,
        sentiment: majority_sentiment(records),
        emotions,
        summary: None,
        extra: Default::default(),
    })
}

fn majority_sentiment(records: &[ReviewRecord]) -> Option<Sentiment> {
    let mut counts: Vec<(Sentiment, usize)> = Vec::new();
    for sentiment in records.iter().filter_map(|r| r.sentiment) {
        match counts.iter_mut().find(|(s, _)| *s == sentiment) {
            Some((_, count)) => *count += 1,
            None => counts.push((sentiment, 1)),
        }
    }

    let best = counts.iter().map(|(_, c)| *c).max()?;
    let mut leaders = counts.iter().filter(|(_, c)| *c == best);
    match (leaders.next(), leaders.next()) {
        (Some((sentiment, _)), None) => Some(*sentiment),
        _ => None,
    }
}

/// Mean of the global rows, used as the benchmark line of the global chart
pub fn overall_average(rows: &[GlobalEmotionRow]) -> Option<f64> {
    if rows.is_empty() {
        return None;
    }
    let sum: f64 = rows.iter().map(|r| r.score).sum();
    Some(round3(sum / rows.len() as f64))
}
