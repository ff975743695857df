//! Core domain types: timelines, action items, catalog entries, recommendations.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Current schema version for the run manifest format.
pub const CURRENT_SCHEMA_VERSION: u32 = 1;

// ---------------------------------------------------------------------------
// Identifiers
// ---------------------------------------------------------------------------

/// Identifies one meeting; every stage is keyed by it.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MeetingId(pub String);

impl MeetingId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for MeetingId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A UUID v7 wrapper for run identifiers (time-sortable).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(pub Uuid);

impl RunId {
    /// Generate a new time-sortable run identifier.
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RunId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for RunId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

// ---------------------------------------------------------------------------
// Timeline
// ---------------------------------------------------------------------------

/// One spoken turn. `end >= start` always holds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Utterance {
    /// Position within the timeline, strictly increasing.
    pub sequence: usize,
    /// Normalized speaker display label.
    pub speaker: String,
    /// Start time in seconds.
    pub start: f64,
    /// End time in seconds.
    pub end: f64,
    /// Whitespace-normalized text.
    pub text: String,
    /// 1-based source line (header is line 1 for file input).
    pub line: usize,
}

impl Utterance {
    /// Duration in seconds.
    pub fn duration(&self) -> f64 {
        (self.end - self.start).max(0.0)
    }
}

/// The ordered utterances of one meeting, sorted by start time (stable).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Timeline {
    pub meeting_id: MeetingId,
    pub utterances: Vec<Utterance>,
}

impl Timeline {
    pub fn empty(meeting_id: MeetingId) -> Self {
        Self {
            meeting_id,
            utterances: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.utterances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.utterances.is_empty()
    }

    /// Unique speakers in order of first appearance.
    pub fn speakers(&self) -> Vec<&str> {
        let mut seen: Vec<&str> = Vec::new();
        for utt in &self.utterances {
            if !seen.contains(&utt.speaker.as_str()) {
                seen.push(&utt.speaker);
            }
        }
        seen
    }

    /// Start of the earliest utterance, if any.
    pub fn first_start(&self) -> Option<f64> {
        self.utterances.first().map(|u| u.start)
    }
}

/// What happened to a defective row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DiagnosticKind {
    /// Speaker field absent. Row dropped.
    MissingSpeaker,
    /// Text empty after normalization. Row dropped.
    EmptyText,
    /// Timestamp could not be parsed. Row dropped.
    BadTimestamp { field: String, value: String },
    /// End preceded start; the two were swapped.
    SwappedTimes { start: f64, end: f64 },
    /// Blank speaker replaced by a placeholder label.
    PlaceholderSpeaker { label: String },
}

/// A recorded row-level defect.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RowDiagnostic {
    pub line: usize,
    #[serde(flatten)]
    pub kind: DiagnosticKind,
}

impl RowDiagnostic {
    /// Whether the row was dropped rather than corrected.
    pub fn is_dropped(&self) -> bool {
        matches!(
            self.kind,
            DiagnosticKind::MissingSpeaker
                | DiagnosticKind::EmptyText
                | DiagnosticKind::BadTimestamp { .. }
        )
    }
}

// ---------------------------------------------------------------------------
// Action items
// ---------------------------------------------------------------------------

/// Byte span of the deciding trigger match within the source text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhraseSpan {
    pub start: usize,
    pub end: usize,
    pub text: String,
}

/// A task detected in one utterance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionItem {
    pub meeting_id: MeetingId,
    /// Sequence index of the source utterance.
    pub source_sequence: usize,
    /// Speaker of the source utterance.
    pub speaker: String,
    /// Full text of the source utterance.
    pub source_text: String,
    pub span: PhraseSpan,
    /// Cleaned-up task description.
    pub description: String,
    pub owner: String,
    /// Week offset from the meeting start, week 1 being the meeting's own week.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_week: Option<u32>,
    /// In (0, 1].
    pub confidence: f64,
    pub tags: BTreeSet<String>,
    /// Number of utterances merged into this item.
    pub occurrences: usize,
}

// ---------------------------------------------------------------------------
// Knowledge base & recommendations
// ---------------------------------------------------------------------------

/// One recommendable resource.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KnowledgeBaseEntry {
    pub title: String,
    /// Link or free-text pointer to the resource.
    pub resource: String,
    pub tags: BTreeSet<String>,
    /// Tie-break weight, higher ranks first.
    pub priority: f64,
}

/// A catalog entry paired with its computed match.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedResource {
    /// 1-based position in the recommendation.
    pub rank: usize,
    pub entry: KnowledgeBaseEntry,
    /// Number of shared tags.
    pub overlap: usize,
    /// `overlap × priority`.
    pub score: f64,
    /// Set when this is the fallback entry rather than a tag match.
    pub fallback: bool,
}

/// Resources suggested for one action item. Holds 1–5 resources.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub meeting_id: MeetingId,
    /// Index of the action item in its meeting's action list.
    pub action_index: usize,
    /// Sequence index of the action item's source utterance.
    pub source_sequence: usize,
    pub resources: Vec<RankedResource>,
}

impl Recommendation {
    /// True when no catalog entry shared a tag with the action item.
    pub fn is_fallback(&self) -> bool {
        self.resources.first().is_some_and(|r| r.fallback)
    }
}

// ---------------------------------------------------------------------------
// RunManifest
// ---------------------------------------------------------------------------

/// The `manifest.json` written at the root of each output directory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunManifest {
    /// Schema version for forward compatibility.
    pub schema_version: u32,
    pub run_id: RunId,
    /// Tool version that produced the run.
    pub tool_version: String,
    pub created_at: DateTime<Utc>,
    /// Meetings successfully processed.
    pub meeting_count: usize,
    /// Total action items across all meetings.
    pub action_item_count: usize,
    /// Written files with checksums.
    #[serde(default)]
    pub files: Vec<serde_json::Value>,
    /// Transcript files that could not be processed.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub failures: Vec<serde_json::Value>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn utt(sequence: usize, speaker: &str, start: f64) -> Utterance {
        Utterance {
            sequence,
            speaker: speaker.into(),
            start,
            end: start + 2.0,
            text: "hello".into(),
            line: sequence + 2,
        }
    }

    #[test]
    fn run_id_roundtrip() {
        let id = RunId::new();
        let parsed: RunId = id.to_string().parse().expect("parse RunId");
        assert_eq!(id, parsed);
    }

    #[test]
    fn speakers_in_first_appearance_order() {
        let timeline = Timeline {
            meeting_id: MeetingId::new("m1"),
            utterances: vec![utt(0, "Bob", 0.0), utt(1, "Alice", 1.0), utt(2, "Bob", 2.0)],
        };
        assert_eq!(timeline.speakers(), vec!["Bob", "Alice"]);
        assert_eq!(timeline.first_start(), Some(0.0));
    }

    #[test]
    fn empty_timeline() {
        let timeline = Timeline::empty(MeetingId::new("m0"));
        assert!(timeline.is_empty());
        assert!(timeline.speakers().is_empty());
        assert_eq!(timeline.first_start(), None);
    }

    #[test]
    fn diagnostic_serializes_flat() {
        let diag = RowDiagnostic {
            line: 4,
            kind: DiagnosticKind::BadTimestamp {
                field: "start".into(),
                value: "soon".into(),
            },
        };
        let json = serde_json::to_value(&diag).expect("serialize");
        assert_eq!(json["line"], 4);
        assert_eq!(json["kind"], "bad_timestamp");
        assert_eq!(json["value"], "soon");
        assert!(diag.is_dropped());

        let swapped = RowDiagnostic {
            line: 5,
            kind: DiagnosticKind::SwappedTimes { start: 1.0, end: 3.0 },
        };
        assert!(!swapped.is_dropped());
    }

    #[test]
    fn manifest_serialization() {
        let manifest = RunManifest {
            schema_version: CURRENT_SCHEMA_VERSION,
            run_id: RunId::new(),
            tool_version: "0.1.0".into(),
            created_at: Utc::now(),
            meeting_count: 2,
            action_item_count: 5,
            files: vec![],
            failures: vec![],
        };

        let json = serde_json::to_string_pretty(&manifest).expect("serialize");
        assert!(!json.contains("failures"));
        let parsed: RunManifest = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(parsed.schema_version, CURRENT_SCHEMA_VERSION);
        assert_eq!(parsed.meeting_count, 2);
    }
}
