//! Classification-service payload normalization
//!
//! The service (and its history endpoint) answers in several shapes:
//! - `{ "results": [ {...}, ... ], "aggregate": {...}, "global_emotion_chart": [...] }`
//! - a bare array of records
//! - a single record object
//!
//! [`normalize_payload`] inspects the shape once and produces the canonical
//! [`NormalizedBatch`]. Nothing downstream looks at raw JSON again.
//!
//! Decoding is all-or-nothing: one bad item fails the whole batch with
//! [`Error::MalformedPayload`].

use serde_json::{Map, Value};

use crate::model::{
    AggregateRecord, EmotionScore, GenreEmotionRow, GlobalEmotionRow, ReviewRecord, Sentiment,
    TrendLine, TrendPoint, TrendSeries,
};
use crate::{Error, Result};

const TEXT_KEYS: &[&str] = &["text", "Review", "review"];
const GENRE_KEYS: &[&str] = &["genres", "Genre", "genre"];
const SENTIMENT_KEYS: &[&str] = &["sentiment", "Sentiment"];
const EMOTION_KEYS: &[&str] = &["emotions", "Emotions"];
const SUMMARY_KEYS: &[&str] = &["summary", "Summary"];

const EMOTION_LABEL_KEYS: &[&str] = &["Emotion", "emotion", "label"];
const EMOTION_SCORE_KEYS: &[&str] = &["Score", "score"];

const RESULTS_KEY: &str = "results";
const AGGREGATE_KEY: &str = "aggregate";
const GLOBAL_KEYS: &[&str] = &["globalEmotionChart", "global_emotion_chart"];
const GENRE_SUMMARY_KEYS: &[&str] = &["genreEmotionSummary", "genre_emotion_summary"];
const TREND_KEYS: &[&str] = &["emotionTrend", "emotion_trend"];
const TREND_POINT_KEYS: &[&str] = &["Points", "points"];

/// Views the service already computed (over its full history)
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ServerViews {
    pub global_emotion_chart: Option<Vec<GlobalEmotionRow>>,
    pub genre_emotion_summary: Option<Vec<GenreEmotionRow>>,
    pub emotion_trend: Option<TrendSeries>,
}

impl ServerViews {
    pub fn is_empty(&self) -> bool {
        self.global_emotion_chart.is_none()
            && self.genre_emotion_summary.is_none()
            && self.emotion_trend.is_none()
    }
}

/// Canonical result of one service response
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NormalizedBatch {
    pub records: Vec<ReviewRecord>,
    pub aggregate: Option<AggregateRecord>,
    pub views: ServerViews,
}

/// Payload shape, decided once at the boundary
enum PayloadShape<'a> {
    /// `{ "results": [...] , ...envelope }`
    Wrapped(&'a Map<String, Value>, &'a [Value]),
    /// `[ {...}, {...} ]`
    Array(&'a [Value]),
    /// `{ "Review": ..., "Emotions": ... , ...envelope }`
    Single(&'a Map<String, Value>),
    /// Object with envelope keys only (no records)
    Envelope(&'a Map<String, Value>),
}

impl<'a> PayloadShape<'a> {
    fn classify(payload: &'a Value) -> Result<Self> {
        match payload {
            Value::Array(items) => Ok(PayloadShape::Array(items)),
            Value::Object(obj) => match obj.get(RESULTS_KEY) {
                Some(Value::Array(items)) => Ok(PayloadShape::Wrapped(obj, items)),
                Some(Value::Null) if has_record_fields(obj) => Ok(PayloadShape::Single(obj)),
            Some(Value::Null) => Ok(PayloadShape::Envelope(obj)),
                Some(other) => Err(Error::malformed(format!(
                    "'results' must be an array, got {}",
                    type_name(other)
                ))),
                None if has_record_fields(obj) => Ok(PayloadShape::Single(obj)),
                None => Ok(PayloadShape::Envelope(obj)),
            },
            other => Err(Error::malformed(format!(
                "payload must be an object or array, got {}",
                type_name(other)
            ))),
        }
    }
}

/// Normalize a raw service payload into canonical records plus optional aggregate/views
pub fn normalize_payload(payload: &Value) -> Result<NormalizedBatch> {
    let shape = PayloadShape::classify(payload)?;

    let (records, envelope) = match shape {
        PayloadShape::Wrapped(obj, items) => (decode_items(items)?, Some(obj)),
        PayloadShape::Array(items) => (decode_items(items)?, None),
        PayloadShape::Single(obj) => (vec![decode_record(obj, true)?], Some(obj)),
        PayloadShape::Envelope(obj) => (Vec::new(), Some(obj)),
    };

    let (aggregate, views) = match envelope {
        Some(obj) => (decode_aggregate(obj)?, decode_views(obj)?),
        None => (None, ServerViews::default()),
    };

    tracing::debug!(
        records = records.len(),
        has_aggregate = aggregate.is_some(),
        server_views = !views.is_empty(),
        "Normalized service payload"
    );

    Ok(NormalizedBatch {
        records,
        aggregate,
        views,
    })
}

fn decode_items(items: &[Value]) -> Result<Vec<ReviewRecord>> {
    items
        .iter()
        .enumerate()
        .map(|(index, item)| match item {
            Value::Object(obj) => decode_record(obj, false),
            other => Err(Error::malformed(format!(
                "result item {} must be an object, got {}",
                index,
                type_name(other)
            ))),
        })
        .collect()
}

fn decode_record(obj: &Map<String, Value>, skip_envelope: bool) -> Result<ReviewRecord> {
    let text = match field(obj, TEXT_KEYS) {
        Some(Value::String(s)) => s.clone(),
        Some(other) => {
            return Err(Error::malformed(format!(
                "review text must be a string, got {}",
                type_name(other)
            )))
        }
        None => String::new(),
    };

    let genres = match field(obj, GENRE_KEYS) {
        Some(value) => decode_genres(value)?,
        None => Vec::new(),
    };

    let sentiment = match field(obj, SENTIMENT_KEYS) {
        Some(Value::String(s)) => Some(s.parse::<Sentiment>().map_err(Error::MalformedPayload)?),
        Some(other) => {
            return Err(Error::malformed(format!(
                "sentiment must be a string, got {}",
                type_name(other)
            )))
        }
        None => None,
    };

    let emotions = match field(obj, EMOTION_KEYS) {
        Some(value) => decode_emotions(value)?,
        None => Vec::new(),
    };

    let summary = match field(obj, SUMMARY_KEYS) {
        Some(Value::String(s)) if !s.trim().is_empty() => Some(s.clone()),
        Some(Value::String(_)) => None,
        Some(other) => {
            return Err(Error::malformed(format!(
                "summary must be a string, got {}",
                type_name(other)
            )))
        }
        None => None,
    };

    let extra = obj
        .iter()
        .filter(|(key, _)| !is_record_key(key))
        .filter(|(key, _)| !(skip_envelope && is_envelope_key(key)))
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect();

    Ok(ReviewRecord {
        text,
        genres,
        sentiment,
        emotions,
        summary,
        extra,
    })
}

/// Genre field: a single string or an array of strings
fn decode_genres(value: &Value) -> Result<Vec<String>> {
    let raw: Vec<&str> = match value {
        Value::String(s) => vec![s.as_str()],
        Value::Array(items) => items
            .iter()
            .map(|item| {
                item.as_str().ok_or_else(|| {
                    Error::malformed(format!("genre must be a string, got {}", type_name(item)))
                })
            })
            .collect::<Result<_>>()?,
        other => {
            return Err(Error::malformed(format!(
                "genres must be a string or array, got {}",
                type_name(other)
            )))
        }
    };

    Ok(raw
        .into_iter()
        .map(str::trim)
        .filter(|g| !g.is_empty())
        .map(str::to_string)
        .collect())
}

/// Emotion field: `[{"Emotion": "Joy", "Score": 0.8}, ...]` or `{"Joy": 0.8, ...}`
fn decode_emotions(value: &Value) -> Result<Vec<EmotionScore>> {
    match value {
        Value::Array(items) => items
            .iter()
            .map(|item| {
                let obj = item.as_object().ok_or_else(|| {
                    Error::malformed(format!(
                        "emotion entry must be an object, got {}",
                        type_name(item)
                    ))
                })?;
                let label = match field(obj, EMOTION_LABEL_KEYS) {
                    Some(Value::String(s)) if !s.trim().is_empty() => s.trim().to_string(),
                    _ => return Err(Error::malformed("emotion entry without a label")),
                };
                let score = decode_score(&label, field(obj, EMOTION_SCORE_KEYS))?;
                Ok(EmotionScore { label, score })
            })
            .collect(),
        Value::Object(map) => map
            .iter()
            .map(|(label, score)| {
                Ok(EmotionScore {
                    label: label.clone(),
                    score: decode_score(label, Some(score))?,
                })
            })
            .collect(),
        other => Err(Error::malformed(format!(
            "emotions must be an array or object, got {}",
            type_name(other)
        ))),
    }
}

fn decode_score(label: &str, value: Option<&Value>) -> Result<f64> {
    let score = value
        .and_then(Value::as_f64)
        .ok_or_else(|| Error::malformed(format!("emotion '{}' has no numeric score", label)))?;
    if !score.is_finite() || !(0.0..=1.0).contains(&score) {
        return Err(Error::malformed(format!(
            "emotion '{}' score {} outside [0, 1]",
            label, score
        )));
    }
    Ok(score)
}

fn decode_aggregate(envelope: &Map<String, Value>) -> Result<Option<AggregateRecord>> {
    match envelope.get(AGGREGATE_KEY) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Object(obj)) => {
            let record = decode_record(obj, false)?;
            let mut extra = record.extra;
            if !record.text.is_empty() {
                extra.insert("Review".to_string(), Value::String(record.text));
            }
            Ok(Some(AggregateRecord {
                genres: record.genres,
                sentiment: record.sentiment,
                emotions: record.emotions,
                summary: record.summary,
                extra,
            }))
        }
        Some(other) => Err(Error::malformed(format!(
            "'aggregate' must be an object, got {}",
            type_name(other)
        ))),
    }
}

fn decode_views(envelope: &Map<String, Value>) -> Result<ServerViews> {
    let global_emotion_chart = match non_empty_view(envelope, GLOBAL_KEYS) {
        Some(value) => Some(decode_global_rows(value)?),
        None => None,
    };
    let genre_emotion_summary = match non_empty_view(envelope, GENRE_SUMMARY_KEYS) {
        Some(value) => Some(decode_genre_rows(value)?),
        None => None,
    };
    let emotion_trend = match non_empty_view(envelope, TREND_KEYS) {
        Some(value) => Some(decode_trend(value)?),
        None => None,
    };

    Ok(ServerViews {
        global_emotion_chart,
        genre_emotion_summary,
        emotion_trend,
    })
}

/// Present, non-null and non-empty; an empty view counts as not supplied
fn non_empty_view<'a>(envelope: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a Value> {
    field(envelope, keys).filter(|value| match value {
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
        _ => true,
    })
}

fn decode_global_rows(value: &Value) -> Result<Vec<GlobalEmotionRow>> {
    let items = value
        .as_array()
        .ok_or_else(|| Error::malformed("global emotion chart must be an array"))?;

    items
        .iter()
        .map(|item| {
            let obj = item
                .as_object()
                .ok_or_else(|| Error::malformed("global emotion row must be an object"))?;
            let emotion = field(obj, EMOTION_LABEL_KEYS)
                .and_then(Value::as_str)
                .ok_or_else(|| Error::malformed("global emotion row without an emotion"))?
                .to_string();
            let score = decode_score(&emotion, field(obj, EMOTION_SCORE_KEYS))?;
            Ok(GlobalEmotionRow { emotion, score })
        })
        .collect()
}

fn decode_genre_rows(value: &Value) -> Result<Vec<GenreEmotionRow>> {
    let items = value
        .as_array()
        .ok_or_else(|| Error::malformed("genre emotion summary must be an array"))?;

    items
        .iter()
        .map(|item| {
            let obj = item
                .as_object()
                .ok_or_else(|| Error::malformed("genre emotion row must be an object"))?;
            let genre = field(obj, &["genre", "Genre"])
                .and_then(Value::as_str)
                .ok_or_else(|| Error::malformed("genre emotion row without a genre"))?
                .to_string();
            let scores = obj
                .iter()
                .filter(|(key, _)| key.as_str() != "genre" && key.as_str() != "Genre")
                .map(|(label, score)| {
                    Ok(EmotionScore {
                        label: label.clone(),
                        score: decode_score(label, Some(score))?,
                    })
                })
                .collect::<Result<Vec<_>>>()?;
            Ok(GenreEmotionRow { genre, scores })
        })
        .collect()
}

/// `[{"Emotion": "Joy", "Points": [{"x": 1, "y": 0.8}]}]` or `{"Joy": [{"x": 1, "y": 0.8}]}`
fn decode_trend(value: &Value) -> Result<TrendSeries> {
    let lines = match value {
        Value::Array(items) => items
            .iter()
            .map(|item| {
                let obj = item
                    .as_object()
                    .ok_or_else(|| Error::malformed("trend entry must be an object"))?;
                let emotion = field(obj, EMOTION_LABEL_KEYS)
                    .and_then(Value::as_str)
                    .ok_or_else(|| Error::malformed("trend entry without an emotion"))?
                    .to_string();
                let points = decode_points(&emotion, field(obj, TREND_POINT_KEYS))?;
                Ok(TrendLine { emotion, points })
            })
            .collect::<Result<Vec<_>>>()?,
        Value::Object(map) => map
            .iter()
            .map(|(emotion, points)| {
                Ok(TrendLine {
                    emotion: emotion.clone(),
                    points: decode_points(emotion, Some(points))?,
                })
            })
            .collect::<Result<Vec<_>>>()?,
        _ => return Err(Error::malformed("emotion trend must be an array or object")),
    };

    Ok(TrendSeries(lines))
}

fn decode_points(emotion: &str, value: Option<&Value>) -> Result<Vec<TrendPoint>> {
    let items = value
        .and_then(Value::as_array)
        .ok_or_else(|| Error::malformed(format!("trend '{}' has no point array", emotion)))?;

    items
        .iter()
        .map(|item| {
            let x = item
                .get("x")
                .and_then(Value::as_u64)
                .filter(|x| *x >= 1)
                .ok_or_else(|| {
                    Error::malformed(format!("trend '{}' point needs a 1-based x", emotion))
                })?;
            let y = decode_score(emotion, item.get("y"))?;
            Ok(TrendPoint { x: x as usize, y })
        })
        .collect()
}

/// First alias present with a non-null value
fn field<'a>(obj: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a Value> {
    keys.iter()
        .filter_map(|key| obj.get(*key))
        .find(|value| !value.is_null())
}

fn has_record_fields(obj: &Map<String, Value>) -> bool {
    obj.keys().any(|key| is_record_key(key))
}

fn is_record_key(key: &str) -> bool {
    TEXT_KEYS.contains(&key)
        || GENRE_KEYS.contains(&key)
        || SENTIMENT_KEYS.contains(&key)
        || EMOTION_KEYS.contains(&key)
        || SUMMARY_KEYS.contains(&key)
}

fn is_envelope_key(key: &str) -> bool {
    key == RESULTS_KEY
        || key == AGGREGATE_KEY
        || GLOBAL_KEYS.contains(&key)
        || GENRE_SUMMARY_KEYS.contains(&key)
        || TREND_KEYS.contains(&key)
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
