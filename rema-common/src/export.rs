//! CSV export of analysis results
//!
//! Output is UTF-8, comma-delimited, one header row plus one physical line per
//! logical row. Every field is quoted, embedded quotes are doubled, and line
//! breaks inside a field become a single space.
//!
//! Exporting zero records is a guarded no-op: `EmptyInput` is returned, nothing
//! is rendered and no file is written.

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::model::{EmotionScore, GenreEmotionRow, GlobalEmotionRow, ReviewRecord};
use crate::{Error, Result};

/// Default download/file name
pub const DEFAULT_FILE_NAME: &str = "analysis_results.csv";

/// Emotion column density
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExportMode {
    /// Two most salient emotions as separate columns (spreadsheet quick-view)
    #[default]
    TopEmotions,
    /// Every emotion as `label:score` pairs in one column (full audit)
    AllEmotions,
}

impl ExportMode {
    fn header(&self) -> &'static [&'static str] {
        match self {
            ExportMode::TopEmotions => &[
                "No",
                "Review",
                "Genres",
                "Sentiment",
                "Top Emotion 1",
                "Top Emotion 2",
            ],
            ExportMode::AllEmotions => &["No", "Review", "Genres", "Sentiment", "Emotions"],
        }
    }
}

impl fmt::Display for ExportMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExportMode::TopEmotions => f.write_str("top"),
            ExportMode::AllEmotions => f.write_str("all"),
        }
    }
}

impl FromStr for ExportMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "top" | "top_emotions" => Ok(ExportMode::TopEmotions),
            "all" | "all_emotions" => Ok(ExportMode::AllEmotions),
            other => Err(Error::InvalidInput(format!(
                "unknown export mode '{}' (expected 'top' or 'all')",
                other
            ))),
        }
    }
}

fn is_line_break(c: char) -> bool {
    matches!(
        c,
        '\n' | '\r' | '\u{0B}' | '\u{0C}' | '\u{85}' | '\u{2028}' | '\u{2029}'
    )
}

/// Replace every line break (`\r\n` counts as one) with a single space
pub fn flatten_line_breaks(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut chars = value.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '\r' && chars.peek() == Some(&'\n') {
            chars.next();
            out.push(' ');
        } else if is_line_break(c) {
            out.push(' ');
        } else {
            out.push(c);
        }
    }
    out
}

/// In-memory CSV document: every field quoted, `\n` row terminator
struct CsvDocument {
    writer: csv::Writer<Vec<u8>>,
}

impl CsvDocument {
    fn new() -> Self {
        let writer = csv::WriterBuilder::new()
            .quote_style(csv::QuoteStyle::Always)
            .terminator(csv::Terminator::Any(b'\n'))
            .from_writer(Vec::new());
        Self { writer }
    }

    fn push_row<S: AsRef<str>>(&mut self, fields: &[S]) -> Result<()> {
        self.writer
            .write_record(fields.iter().map(|f| flatten_line_breaks(f.as_ref())))?;
        Ok(())
    }

    fn finish(self) -> Result<String> {
        let bytes = self
            .writer
            .into_inner()
            .map_err(|e| Error::Io(e.into_error()))?;
        String::from_utf8(bytes)
            .map_err(|e| Error::Io(std::io::Error::new(std::io::ErrorKind::InvalidData, e)))
    }
}

fn format_score(score: f64) -> String {
    format!("{:.3}", score)
}

fn top_emotion_cell(emotion: Option<&EmotionScore>) -> String {
    emotion
        .map(|e| format!("{} ({})", e.label, format_score(e.score)))
        .unwrap_or_default()
}

fn nothing_to_export(what: &str) -> Error {
    warn!("CSV export of {} requested with nothing to export", what);
    Error::EmptyInput(format!("no {} to export", what))
}

/// Render review records; `EmptyInput` when there are none
pub fn render_records(records: &[ReviewRecord], mode: ExportMode) -> Result<String> {
    if records.is_empty() {
        return Err(nothing_to_export("analysis results"));
    }

    let mut doc = CsvDocument::new();
    doc.push_row(mode.header())?;

    for (index, record) in records.iter().enumerate() {
        let mut fields = vec![
            (index + 1).to_string(),
            record.text.clone(),
            record.genres.join(";"),
            record
                .sentiment
                .map(|s| s.to_string())
                .unwrap_or_default(),
        ];

        match mode {
            ExportMode::TopEmotions => {
                let top = record.dominant_emotions(2);
                fields.push(top_emotion_cell(top.first()));
                fields.push(top_emotion_cell(top.get(1)));
            }
            ExportMode::AllEmotions => {
                let all: Vec<String> = record
                    .emotions
                    .iter()
                    .map(|e| format!("{}:{}", e.label, format_score(e.score)))
                    .collect();
                fields.push(all.join("; "));
            }
        }

        doc.push_row(&fields)?;
    }

    doc.finish()
}

/// Render the global emotion view; `EmptyInput` when empty
pub fn render_global_rows(rows: &[GlobalEmotionRow]) -> Result<String> {
    if rows.is_empty() {
        return Err(nothing_to_export("global emotion rows"));
    }

    let mut doc = CsvDocument::new();
    doc.push_row(&["Emotion", "Score"])?;
    for row in rows {
        doc.push_row(&[row.emotion.clone(), format_score(row.score)])?;
    }
    doc.finish()
}

/// Render the per-genre view; emotion columns are the union in first-seen order
///
/// Cells for combinations a genre never observed stay empty, not zero.
pub fn render_genre_rows(rows: &[GenreEmotionRow]) -> Result<String> {
    if rows.is_empty() {
        return Err(nothing_to_export("genre emotion rows"));
    }

    let mut columns: Vec<&str> = Vec::new();
    for entry in rows.iter().flat_map(|r| r.scores.iter()) {
        if !columns.contains(&entry.label.as_str()) {
            columns.push(&entry.label);
        }
    }

    let mut doc = CsvDocument::new();
    let mut header = vec!["Genre"];
    header.extend(columns.iter().copied());
    doc.push_row(&header)?;

    for row in rows {
        let mut fields = vec![row.genre.clone()];
        fields.extend(
            columns
                .iter()
                .map(|label| row.score(label).map(format_score).unwrap_or_default()),
        );
        doc.push_row(&fields)?;
    }
    doc.finish()
}

/// Write a rendered document to `path`
pub fn write_csv(path: &Path, document: &str) -> Result<()> {
    std::fs::write(path, document.as_bytes())?;
    info!(path = %path.display(), bytes = document.len(), "CSV export written");
    Ok(())
}

/// Render and write records; `EmptyInput` (and no file) when there are none
pub fn export_records(path: &Path, records: &[ReviewRecord], mode: ExportMode) -> Result<usize> {
    let document = render_records(records, mode)?;
    write_csv(path, &document)?;
    Ok(records.len())
}
