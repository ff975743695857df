//! Transcript parsing: raw rows → ordered [`Timeline`].
//!
//! This crate provides:
//! - [`build_timeline`] — row validation, time normalization, stable ordering
//! - [`parse_timestamp`] — seconds / `HH:MM:SS` / fractional-seconds normalizer
//! - [`reader`] — delimited transcript files and directory discovery
//!
//! Defective rows never fail the meeting: they are dropped or corrected and a
//! [`RowDiagnostic`] is recorded.

pub mod reader;
mod timestamp;

use tracing::{debug, instrument};

use recap_shared::{DiagnosticKind, MeetingId, RowDiagnostic, Timeline, Utterance};

pub use reader::{TranscriptFile, discover_transcripts, parse_table, read_rows, read_transcript};
pub use timestamp::parse_timestamp;

/// Prefix for labels given to speakers whose field was blank.
pub const PLACEHOLDER_PREFIX: &str = "UNKNOWN";

/// One unvalidated transcript row.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawRow {
    /// 1-based source line.
    pub line: usize,
    /// `None` when the speaker field is absent altogether.
    pub speaker: Option<String>,
    pub start: String,
    pub end: String,
    pub text: String,
}

/// Parser output for one meeting.
#[derive(Debug, Clone)]
pub struct ParsedMeeting {
    pub timeline: Timeline,
    pub diagnostics: Vec<RowDiagnostic>,
}

impl ParsedMeeting {
    /// Number of rows dropped.
    pub fn dropped(&self) -> usize {
        self.diagnostics.iter().filter(|d| d.is_dropped()).count()
    }
}

/// Build the timeline for one meeting.
///
/// 1. Drops rows with an absent speaker, empty text, or unparsable timestamp
/// 2. Swaps start/end when end precedes start
/// 3. Normalizes speaker labels, substituting `UNKNOWN-<n>` for blank ones
/// 4. Stable-sorts by start time and assigns sequence indices
#[instrument(skip_all, fields(meeting = %meeting_id, rows = rows.len()))]
pub fn build_timeline(meeting_id: MeetingId, rows: Vec<RawRow>) -> ParsedMeeting {
    let mut diagnostics: Vec<RowDiagnostic> = Vec::new();
    let mut utterances: Vec<Utterance> = Vec::with_capacity(rows.len());
    let mut placeholders = 0usize;

    for row in rows {
        let line = row.line;
        let mut record = |kind: DiagnosticKind| {
            debug!(line, ?kind, "row diagnostic");
            diagnostics.push(RowDiagnostic { line, kind });
        };

        let Some(raw_speaker) = row.speaker else {
            record(DiagnosticKind::MissingSpeaker);
            continue;
        };

        let text = normalize_text(&row.text);
        if text.is_empty() {
            record(DiagnosticKind::EmptyText);
            continue;
        }

        let Some(mut start) = parse_timestamp(&row.start) else {
            record(DiagnosticKind::BadTimestamp {
                field: "start".into(),
                value: row.start,
            });
            continue;
        };
        let Some(mut end) = parse_timestamp(&row.end) else {
            record(DiagnosticKind::BadTimestamp {
                field: "end".into(),
                value: row.end,
            });
            continue;
        };

        if end < start {
            std::mem::swap(&mut start, &mut end);
            record(DiagnosticKind::SwappedTimes { start, end });
        }

        let speaker = match normalize_speaker(&raw_speaker) {
            Some(label) => label,
            None => {
                placeholders += 1;
                let label = format!("{PLACEHOLDER_PREFIX}-{placeholders}");
                record(DiagnosticKind::PlaceholderSpeaker {
                    label: label.clone(),
                });
                label
            }
        };

        utterances.push(Utterance {
            sequence: 0,
            speaker,
            start,
            end,
            text,
            line,
        });
    }

    // `sort_by` is stable, so equal start times keep input order.
    utterances.sort_by(|a, b| a.start.total_cmp(&b.start));
    for (i, utt) in utterances.iter_mut().enumerate() {
        utt.sequence = i;
    }

    debug!(
        utterances = utterances.len(),
        diagnostics = diagnostics.len(),
        "timeline built"
    );

    ParsedMeeting {
        timeline: Timeline {
            meeting_id,
            utterances,
        },
        diagnostics,
    }
}

/// Trim, collapse whitespace, and title-case each word. `None` for blank labels.
pub fn normalize_speaker(raw: &str) -> Option<String> {
    let words: Vec<String> = raw
        .split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(c) => {
                    let upper: String = c.to_uppercase().collect();
                    format!("{upper}{}", chars.as_str().to_lowercase())
                }
                None => String::new(),
            }
        })
        .collect();

    if words.is_empty() {
        None
    } else {
        Some(words.join(" "))
    }
}

/// Trim and collapse runs of whitespace to single spaces.
pub fn normalize_text(raw: &str) -> String {
    raw.split_whitespace().collect::<Vec<_>>().join(" ")
}
