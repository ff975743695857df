//! Run output assembler.
//!
//! Takes the processed meetings and writes the output directory:
//! per-meeting JSON files, the Markdown report, and the run manifest.

use std::path::{Path, PathBuf};

use chrono::Utc;
use serde::Serialize;
use sha2::{Digest, Sha256};
use tracing::{debug, info, instrument};

use recap_extract::extract_key_terms;
use recap_shared::{
    ActionItem, CURRENT_SCHEMA_VERSION, MeetingId, RecapError, Recommendation, Result,
    RowDiagnostic, RunId, RunManifest, Utterance,
};

use crate::pipeline::{MeetingArtifacts, MeetingFailure};
use crate::report::{self, Briefing};

pub const CONVERSATIONS_DIR: &str = "conversations";
pub const ACTION_ITEMS_DIR: &str = "action_items";
pub const RECOMMENDATIONS_DIR: &str = "recommendations";
pub const DIAGNOSTICS_DIR: &str = "diagnostics";
pub const REPORT_FILE: &str = "report.md";
pub const MANIFEST_FILE: &str = "manifest.json";

/// Configuration for output assembly.
#[derive(Debug, Clone)]
pub struct AssembleConfig {
    pub run_id: RunId,
    /// Directory receiving all artifacts.
    pub output_dir: PathBuf,
    /// Tool version string.
    pub tool_version: String,
}

/// Output from a successful assembly.
#[derive(Debug, Clone)]
pub struct AssembleResult {
    pub output_dir: PathBuf,
    /// Every file written except the manifest itself.
    pub files: Vec<ArtifactMeta>,
    /// The manifest that was written.
    pub manifest: RunManifest,
}

/// Metadata for a single written file.
#[derive(Debug, Clone, PartialEq, Serialize, serde::Deserialize)]
pub struct ArtifactMeta {
    /// Path relative to the output directory, `/`-separated.
    pub filename: String,
    pub sha256: String,
    pub size_bytes: usize,
}

// ---------------------------------------------------------------------------
// Serialized views
// ---------------------------------------------------------------------------

#[derive(Serialize)]
struct ConversationFile<'a> {
    meeting_id: &'a MeetingId,
    speakers: Vec<&'a str>,
    utterance_count: usize,
    /// Seconds from first start to last end.
    span_seconds: f64,
    utterances: Vec<UtteranceView<'a>>,
}

#[derive(Serialize)]
struct UtteranceView<'a> {
    #[serde(flatten)]
    utterance: &'a Utterance,
    duration: f64,
}

#[derive(Serialize)]
struct ActionItemsFile<'a> {
    meeting_id: &'a MeetingId,
    action_items: &'a [ActionItem],
}

#[derive(Serialize)]
struct RecommendationsFile<'a> {
    meeting_id: &'a MeetingId,
    recommendations: Vec<RecommendationView<'a>>,
}

#[derive(Serialize)]
struct RecommendationView<'a> {
    #[serde(flatten)]
    recommendation: &'a Recommendation,
    #[serde(flatten)]
    briefing: Briefing,
}

#[derive(Serialize)]
struct DiagnosticsFile<'a> {
    meeting_id: &'a MeetingId,
    dropped: usize,
    diagnostics: &'a [RowDiagnostic],
}

// ---------------------------------------------------------------------------
// Assembly
// ---------------------------------------------------------------------------

/// Write the complete output directory.
///
/// Creates the following layout:
/// ```text
/// <output_dir>/
/// ├── manifest.json
/// ├── report.md
/// ├── conversations/<meeting>.json
/// ├── action_items/<meeting>.json
/// ├── recommendations/<meeting>.json
/// └── diagnostics/<meeting>.json   (only meetings with row diagnostics)
/// ```
///
/// The manifest is written last, so its presence marks a complete run.
#[instrument(skip_all, fields(output = %config.output_dir.display(), meetings = meetings.len()))]
pub fn assemble(
    config: &AssembleConfig,
    meetings: &[MeetingArtifacts],
    failures: &[MeetingFailure],
) -> Result<AssembleResult> {
    let out = &config.output_dir;
    info!(path = %out.display(), "assembling output directory");

    create_dirs(out)?;

    let mut files = Vec::with_capacity(meetings.len() * 3 + 1);
    for meeting in meetings {
        write_meeting(out, meeting, &mut files)?;
    }

    let report = report::render_report(meetings, failures);
    files.push(write_atomic(out, REPORT_FILE, report.as_bytes())?);

    let manifest = build_manifest(config, meetings, failures, &files)?;
    let manifest_json = to_json(&manifest)?;
    write_atomic(out, MANIFEST_FILE, manifest_json.as_bytes())?;

    info!(
        files = files.len(),
        path = %out.display(),
        "output assembly complete"
    );

    Ok(AssembleResult {
        output_dir: out.clone(),
        files,
        manifest,
    })
}

fn write_meeting(
    out: &Path,
    meeting: &MeetingArtifacts,
    files: &mut Vec<ArtifactMeta>,
) -> Result<()> {
    let id = &meeting.meeting_id;
    let timeline = &meeting.timeline;

    let conversation = ConversationFile {
        meeting_id: id,
        speakers: timeline.speakers(),
        utterance_count: timeline.len(),
        span_seconds: span_seconds(&timeline.utterances),
        utterances: timeline
            .utterances
            .iter()
            .map(|u| UtteranceView {
                utterance: u,
                duration: u.duration(),
            })
            .collect(),
    };
    files.push(write_json(out, CONVERSATIONS_DIR, id, &conversation)?);

    let action_items = ActionItemsFile {
        meeting_id: id,
        action_items: &meeting.action_items,
    };
    files.push(write_json(out, ACTION_ITEMS_DIR, id, &action_items)?);

    let key_terms = extract_key_terms(timeline);
    let recommendations = RecommendationsFile {
        meeting_id: id,
        recommendations: meeting
            .recommendations
            .iter()
            .filter_map(|rec| {
                let item = meeting.action_items.get(rec.action_index)?;
                Some(RecommendationView {
                    recommendation: rec,
                    briefing: report::brief(item, &key_terms),
                })
            })
            .collect(),
    };
    files.push(write_json(out, RECOMMENDATIONS_DIR, id, &recommendations)?);

    if !meeting.diagnostics.is_empty() {
        let dir = out.join(DIAGNOSTICS_DIR);
        std::fs::create_dir_all(&dir).map_err(|e| RecapError::io(&dir, e))?;
        let diagnostics = DiagnosticsFile {
            meeting_id: id,
            dropped: meeting.diagnostics.iter().filter(|d| d.is_dropped()).count(),
            diagnostics: &meeting.diagnostics,
        };
        files.push(write_json(out, DIAGNOSTICS_DIR, id, &diagnostics)?);
    }

    debug!(meeting = %id, "meeting artifacts written");
    Ok(())
}

/// Verify that an output directory is complete and untampered.
///
/// Checks the manifest schema version and that every listed file exists
/// with a matching size and checksum.
pub fn validate_output(output_dir: &Path) -> Result<RunManifest> {
    let manifest_path = output_dir.join(MANIFEST_FILE);
    if !manifest_path.exists() {
        return Err(RecapError::validation("missing manifest.json"));
    }

    let content = std::fs::read_to_string(&manifest_path)
        .map_err(|e| RecapError::io(&manifest_path, e))?;
    let manifest: RunManifest = serde_json::from_str(&content)
        .map_err(|e| RecapError::validation(format!("invalid manifest.json: {e}")))?;

    if manifest.schema_version != CURRENT_SCHEMA_VERSION {
        return Err(RecapError::validation(format!(
            "unsupported schema_version: {} (expected {})",
            manifest.schema_version, CURRENT_SCHEMA_VERSION
        )));
    }

    for value in &manifest.files {
        let meta: ArtifactMeta = serde_json::from_value(value.clone())
            .map_err(|e| RecapError::validation(format!("invalid file entry: {e}")))?;
        let path = output_dir.join(&meta.filename);
        let bytes = std::fs::read(&path).map_err(|e| RecapError::io(&path, e))?;
        if bytes.len() != meta.size_bytes || sha256_hex(&bytes) != meta.sha256 {
            return Err(RecapError::validation(format!(
                "{} does not match its manifest checksum",
                meta.filename
            )));
        }
    }

    Ok(manifest)
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn create_dirs(out: &Path) -> Result<()> {
    let dirs = [
        out.to_path_buf(),
        out.join(CONVERSATIONS_DIR),
        out.join(ACTION_ITEMS_DIR),
        out.join(RECOMMENDATIONS_DIR),
    ];

    for dir in &dirs {
        std::fs::create_dir_all(dir).map_err(|e| RecapError::io(dir, e))?;
    }

    debug!(path = %out.display(), "directory structure created");
    Ok(())
}

fn build_manifest(
    config: &AssembleConfig,
    meetings: &[MeetingArtifacts],
    failures: &[MeetingFailure],
    files: &[ArtifactMeta],
) -> Result<RunManifest> {
    let to_value = |e: serde_json::Error| {
        RecapError::validation(format!("JSON serialization failed: {e}"))
    };
    Ok(RunManifest {
        schema_version: CURRENT_SCHEMA_VERSION,
        run_id: config.run_id.clone(),
        tool_version: config.tool_version.clone(),
        created_at: Utc::now(),
        meeting_count: meetings.len(),
        action_item_count: meetings.iter().map(|m| m.action_items.len()).sum(),
        files: files
            .iter()
            .map(serde_json::to_value)
            .collect::<std::result::Result<_, _>>()
            .map_err(to_value)?,
        failures: failures
            .iter()
            .map(serde_json::to_value)
            .collect::<std::result::Result<_, _>>()
            .map_err(to_value)?,
    })
}

fn span_seconds(utterances: &[Utterance]) -> f64 {
    let Some(first) = utterances.first() else {
        return 0.0;
    };
    let last_end = utterances
        .iter()
        .map(|u| u.end)
        .fold(first.end, f64::max);
    (last_end - first.start).max(0.0)
}

fn to_json<T: Serialize>(data: &T) -> Result<String> {
    serde_json::to_string_pretty(data)
        .map_err(|e| RecapError::validation(format!("JSON serialization failed: {e}")))
}

/// Write `<dir>/<meeting>.json` (pretty-printed).
fn write_json<T: Serialize>(
    out: &Path,
    dir: &str,
    meeting: &MeetingId,
    data: &T,
) -> Result<ArtifactMeta> {
    let json = to_json(data)?;
    write_atomic(out, &format!("{dir}/{meeting}.json"), json.as_bytes())
}

/// Write to a temp file next to the target, then rename over it.
fn write_atomic(out: &Path, relative: &str, content: &[u8]) -> Result<ArtifactMeta> {
    let target = out.join(relative);
    let file_name = target
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let temp = target.with_file_name(format!(".{file_name}.tmp"));

    std::fs::write(&temp, content).map_err(|e| RecapError::io(&temp, e))?;
    std::fs::rename(&temp, &target).map_err(|e| RecapError::io(&target, e))?;

    debug!(file = %relative, size = content.len(), "wrote artifact");

    Ok(ArtifactMeta {
        filename: relative.to_string(),
        sha256: sha256_hex(content),
        size_bytes: content.len(),
    })
}

fn sha256_hex(content: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content);
    format!("{:x}", hasher.finalize())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
