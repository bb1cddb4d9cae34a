//! Canonical review/emotion data model
//!
//! Every downstream component (aggregation, export, session state) works only on
//! these types. Wire field names follow the classification service (`Review`,
//! `Genre`, `Emotions`, ...) so the browser receives the same shape the service emits.

use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

/// One `(emotion label, score)` pair, score in [0, 1]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmotionScore {
    #[serde(rename = "Emotion")]
    pub label: String,
    #[serde(rename = "Score")]
    pub score: f64,
}

impl EmotionScore {
    pub fn new(label: impl Into<String>, score: f64) -> Self {
        Self {
            label: label.into(),
            score,
        }
    }
}

/// Sentiment label (closed set)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Sentiment {
    Positive,
    Negative,
    Neutral,
}

impl Sentiment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Sentiment::Positive => "Positive",
            Sentiment::Negative => "Negative",
            Sentiment::Neutral => "Neutral",
        }
    }
}

impl fmt::Display for Sentiment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Sentiment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "positive" => Ok(Sentiment::Positive),
            "negative" => Ok(Sentiment::Negative),
            "neutral" => Ok(Sentiment::Neutral),
            other => Err(format!("unknown sentiment label '{}'", other)),
        }
    }
}

/// One analyzed review
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReviewRecord {
    /// Original review text
    #[serde(rename = "Review", default)]
    pub text: String,
    /// Genre labels, empty when the service reported none
    #[serde(rename = "Genre", default)]
    pub genres: Vec<String>,
    #[serde(rename = "Sentiment", default, skip_serializing_if = "Option::is_none")]
    pub sentiment: Option<Sentiment>,
    /// Emotions in service order (most salient first), empty when absent
    #[serde(rename = "Emotions", default)]
    pub emotions: Vec<EmotionScore>,
    #[serde(rename = "Summary", default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    /// Fields the service sent that this model does not know about
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ReviewRecord {
    /// Record with text and genres only; emotions/sentiment are filled by the service
    pub fn new(text: impl Into<String>, genres: Vec<String>) -> Self {
        Self {
            text: text.into(),
            genres,
            ..Default::default()
        }
    }

    pub fn with_sentiment(mut self, sentiment: Sentiment) -> Self {
        self.sentiment = Some(sentiment);
        self
    }

    pub fn with_emotion(mut self, label: impl Into<String>, score: f64) -> Self {
        self.emotions.push(EmotionScore::new(label, score));
        self
    }

    /// The first `n` emotions in service order
    ///
    /// The service ranks emotions by relevance before sending them, so no re-sort here.
    pub fn dominant_emotions(&self, n: usize) -> &[EmotionScore] {
        &self.emotions[..n.min(self.emotions.len())]
    }

    /// Score reported for `label`, if any
    pub fn emotion_score(&self, label: &str) -> Option<f64> {
        self.emotions
            .iter()
            .find(|e| e.label == label)
            .map(|e| e.score)
    }
}

/// Combination of many reviews (server-provided or locally derived)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AggregateRecord {
    #[serde(rename = "Genre", default)]
    pub genres: Vec<String>,
    #[serde(rename = "Sentiment", default, skip_serializing_if = "Option::is_none")]
    pub sentiment: Option<Sentiment>,
    #[serde(rename = "Emotions", default)]
    pub emotions: Vec<EmotionScore>,
    #[serde(rename = "Summary", default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Mean score of one emotion across all reviews reporting it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GlobalEmotionRow {
    #[serde(rename = "Emotion")]
    pub emotion: String,
    #[serde(rename = "Score")]
    pub score: f64,
}

/// Mean emotion scores of all reviews tagged with one genre
///
/// Emotions never observed for the genre are omitted, not zero.
#[derive(Debug, Clone, PartialEq)]
pub struct GenreEmotionRow {
    pub genre: String,
    pub scores: Vec<EmotionScore>,
}

impl GenreEmotionRow {
    pub fn score(&self, emotion: &str) -> Option<f64> {
        self.scores
            .iter()
            .find(|e| e.label == emotion)
            .map(|e| e.score)
    }
}

/// Serialized flat, e.g. `{"genre": "Drama", "Joy": 0.5, "Fear": 0.2}`
impl Serialize for GenreEmotionRow {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.scores.len() + 1))?;
        map.serialize_entry("genre", &self.genre)?;
        for entry in &self.scores {
            map.serialize_entry(&entry.label, &entry.score)?;
        }
        map.end()
    }
}

/// One trend point: 1-based review position and its score
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrendPoint {
    pub x: usize,
    pub y: f64,
}

/// Sparse per-emotion series
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendLine {
    #[serde(rename = "Emotion")]
    pub emotion: String,
    #[serde(rename = "Points")]
    pub points: Vec<TrendPoint>,
}

/// Emotion trend series in first-seen emotion order
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TrendSeries(pub Vec<TrendLine>);

impl TrendSeries {
    pub fn lines(&self) -> &[TrendLine] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn line(&self, emotion: &str) -> Option<&TrendLine> {
        self.0.iter().find(|l| l.emotion == emotion)
    }

    /// Pivot into per-review rows for line charts
    ///
    /// One row per review position that has at least one point, ascending.
    /// Emotions without a point at that position are left out of the row.
    pub fn to_rows(&self) -> Vec<Map<String, Value>> {
        let mut positions: Vec<usize> = self
            .0
            .iter()
            .flat_map(|line| line.points.iter().map(|p| p.x))
            .collect();
        positions.sort_unstable();
        positions.dedup();

        positions
            .into_iter()
            .map(|x| {
                let mut row = Map::new();
                row.insert("Review".to_string(), Value::from(x));
                for line in &self.0 {
                    if let Some(point) = line.points.iter().find(|p| p.x == x) {
                        row.insert(line.emotion.clone(), Value::from(point.y));
                    }
                }
                row
            })
            .collect()
    }
}

/// The three derived views, always computed from one record set
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DerivedViews {
    pub global_emotion_chart: Vec<GlobalEmotionRow>,
    pub genre_emotion_summary: Vec<GenreEmotionRow>,
    pub emotion_trend: TrendSeries,
}

impl DerivedViews {
    pub fn is_empty(&self) -> bool {
        self.global_emotion_chart.is_empty()
            && self.genre_emotion_summary.is_empty()
            && self.emotion_trend.is_empty()
    }
}
