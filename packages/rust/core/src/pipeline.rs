//! End-to-end run: transcripts → timelines → action items → recommendations → artifacts.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info, instrument, warn};

use recap_extract::{ExtractOptions, RuleTable, extract_action_items};
use recap_recommend::{KnowledgeBase, recommend_all};
use recap_shared::{
    ActionItem, AppConfig, MeetingId, RecapError, Recommendation, Result, RowDiagnostic, RunId,
    Timeline,
};
use recap_transcript::{ParsedMeeting, RawRow, TranscriptFile, build_timeline, read_transcript};

use crate::assembler::{self, AssembleConfig};

/// Rule table and knowledge base, loaded once and shared read-only by all workers.
#[derive(Debug, Clone)]
pub struct Tables {
    pub rules: Arc<RuleTable>,
    pub knowledge_base: Arc<KnowledgeBase>,
}

impl Tables {
    pub fn new(rules: RuleTable, knowledge_base: KnowledgeBase) -> Self {
        Self {
            rules: Arc::new(rules),
            knowledge_base: Arc::new(knowledge_base),
        }
    }

    /// Load both tables, falling back to the built-ins for unset paths.
    /// Any defect is a config error raised before a meeting is touched.
    pub fn load(rules_path: Option<&Path>, knowledge_base_path: Option<&Path>) -> Result<Self> {
        let rules = RuleTable::load_or_builtin(rules_path)?;
        let knowledge_base = KnowledgeBase::load_or_builtin(knowledge_base_path)?;
        info!(
            action_rules = rules.action_rules().len(),
            temporal_rules = rules.temporal_rules().len(),
            catalog_entries = knowledge_base.len(),
            "tables loaded"
        );
        Ok(Self::new(rules, knowledge_base))
    }

    /// Load the tables named by an app config.
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        Self::load(
            config.extraction.rules_path.as_deref().map(Path::new),
            config
                .recommendation
                .knowledge_base_path
                .as_deref()
                .map(Path::new),
        )
    }
}

/// Configuration for a pipeline run.
#[derive(Debug, Clone)]
pub struct RunConfig {
    /// Directory searched recursively for transcripts.
    pub input_dir: PathBuf,
    /// Directory receiving all artifacts.
    pub output_dir: PathBuf,
    /// Meetings processed concurrently.
    pub concurrency: usize,
    pub extract: ExtractOptions,
    /// Tool version string.
    pub tool_version: String,
}

/// Everything the chain produced for one meeting.
#[derive(Debug, Clone, PartialEq)]
pub struct MeetingArtifacts {
    pub meeting_id: MeetingId,
    pub timeline: Timeline,
    pub diagnostics: Vec<RowDiagnostic>,
    pub action_items: Vec<ActionItem>,
    pub recommendations: Vec<Recommendation>,
}

/// A transcript that could not be processed.
#[derive(Debug, Clone, Serialize)]
pub struct MeetingFailure {
    pub meeting_id: MeetingId,
    pub path: PathBuf,
    pub error: String,
}

/// Result of a pipeline run.
#[derive(Debug)]
pub struct RunResult {
    pub run_id: RunId,
    pub output_dir: PathBuf,
    pub meeting_count: usize,
    pub action_item_count: usize,
    pub fallback_count: usize,
    pub failures: Vec<MeetingFailure>,
    pub elapsed: std::time::Duration,
}

/// Progress callback for reporting pipeline status.
pub trait ProgressReporter: Send + Sync {
    /// Called when entering a new phase.
    fn phase(&self, name: &str);
    /// Called as each meeting finishes processing.
    fn meeting_done(&self, meeting: &str, current: usize, total: usize);
    /// Called when the pipeline completes.
    fn done(&self, result: &RunResult);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn phase(&self, _name: &str) {}
    fn meeting_done(&self, _meeting: &str, _current: usize, _total: usize) {}
    fn done(&self, _result: &RunResult) {}
}

// ---------------------------------------------------------------------------
// Per-meeting chain (pure)
// ---------------------------------------------------------------------------

/// Run parser → extractor → recommender over one meeting's rows.
pub fn process_meeting(
    meeting_id: MeetingId,
    rows: Vec<RawRow>,
    rules: &RuleTable,
    opts: &ExtractOptions,
    knowledge_base: &KnowledgeBase,
) -> MeetingArtifacts {
    let parsed = build_timeline(meeting_id, rows);
    analyze(parsed, rules, opts, knowledge_base)
}

/// Run extractor → recommender over an already-built timeline.
pub fn analyze(
    parsed: ParsedMeeting,
    rules: &RuleTable,
    opts: &ExtractOptions,
    knowledge_base: &KnowledgeBase,
) -> MeetingArtifacts {
    let action_items = extract_action_items(&parsed.timeline, rules, opts);
    let recommendations = recommend_all(&action_items, knowledge_base);

    MeetingArtifacts {
        meeting_id: parsed.timeline.meeting_id.clone(),
        timeline: parsed.timeline,
        diagnostics: parsed.diagnostics,
        action_items,
        recommendations,
    }
}

fn process_file(
    file: &TranscriptFile,
    rules: &RuleTable,
    opts: &ExtractOptions,
    knowledge_base: &KnowledgeBase,
) -> Result<MeetingArtifacts> {
    let parsed = read_transcript(file)?;
    if parsed.dropped() > 0 {
        debug!(
            meeting = %file.meeting_id,
            dropped = parsed.dropped(),
            "rows dropped while parsing"
        );
    }
    Ok(analyze(parsed, rules, opts, knowledge_base))
}

// ---------------------------------------------------------------------------
// Run
// ---------------------------------------------------------------------------

/// Run the full pipeline.
///
/// 1. Discover transcripts under the input directory
/// 2. Process meetings in parallel (bounded by `concurrency`)
/// 3. Write per-meeting JSON, the Markdown report, and the run manifest
#[instrument(skip_all, fields(input = %config.input_dir.display(), output = %config.output_dir.display()))]
pub async fn run(
    config: &RunConfig,
    tables: &Tables,
    progress: &dyn ProgressReporter,
) -> Result<RunResult> {
    let start = Instant::now();
    let run_id = RunId::new();

    info!(%run_id, "starting run");

    // --- Phase 1: Discovery ---
    progress.phase("Discovering transcripts");
    let files = recap_transcript::discover_transcripts(&config.input_dir)?;
    let total = files.len();

    // --- Phase 2: Per-meeting fan-out ---
    progress.phase("Processing meetings");
    let semaphore = Arc::new(Semaphore::new(config.concurrency.max(1)));
    let mut tasks: JoinSet<(TranscriptFile, Result<MeetingArtifacts>)> = JoinSet::new();

    for file in files {
        let permit = Arc::clone(&semaphore)
            .acquire_owned()
            .await
            .map_err(|e| RecapError::Task(e.to_string()))?;
        let rules = Arc::clone(&tables.rules);
        let knowledge_base = Arc::clone(&tables.knowledge_base);
        let opts = config.extract.clone();

        tasks.spawn_blocking(move || {
            let _permit = permit;
            let result = process_file(&file, &rules, &opts, &knowledge_base);
            (file, result)
        });
    }

    let mut meetings: Vec<MeetingArtifacts> = Vec::with_capacity(total);
    let mut failures: Vec<MeetingFailure> = Vec::new();
    let mut finished = 0usize;

    while let Some(joined) = tasks.join_next().await {
        let (file, result) = joined.map_err(|e| RecapError::Task(e.to_string()))?;
        finished += 1;

        match result {
            Ok(meeting) => {
                debug!(
                    meeting = %meeting.meeting_id,
                    utterances = meeting.timeline.len(),
                    action_items = meeting.action_items.len(),
                    "meeting processed"
                );
                meetings.push(meeting);
            }
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => {
                warn!(meeting = %file.meeting_id, error = %e, "skipping transcript");
                failures.push(MeetingFailure {
                    meeting_id: file.meeting_id.clone(),
                    path: file.path.clone(),
                    error: e.to_string(),
                });
            }
        }

        progress.meeting_done(file.meeting_id.as_str(), finished, total);
    }

    // Completion order is arbitrary; output order is not.
    meetings.sort_by(|a, b| a.meeting_id.cmp(&b.meeting_id));
    failures.sort_by(|a, b| a.meeting_id.cmp(&b.meeting_id));

    // --- Phase 3: Artifacts ---
    progress.phase("Writing artifacts");
    let assemble_config = AssembleConfig {
        run_id: run_id.clone(),
        output_dir: config.output_dir.clone(),
        tool_version: config.tool_version.clone(),
    };
    assembler::assemble(&assemble_config, &meetings, &failures)?;

    let result = RunResult {
        run_id,
        output_dir: config.output_dir.clone(),
        meeting_count: meetings.len(),
        action_item_count: meetings.iter().map(|m| m.action_items.len()).sum(),
        fallback_count: meetings
            .iter()
            .flat_map(|m| &m.recommendations)
            .filter(|r| r.is_fallback())
            .count(),
        failures,
        elapsed: start.elapsed(),
    };

    progress.done(&result);

    info!(
        run_id = %result.run_id,
        meetings = result.meeting_count,
        action_items = result.action_item_count,
        failures = result.failures.len(),
        elapsed_ms = result.elapsed.as_millis(),
        "run complete"
    );

    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rows(data: &[(&str, &str, &str, &str)]) -> Vec<RawRow> {
        data.iter()
            .enumerate()
            .map(|(i, (speaker, start, end, text))| RawRow {
                line: i + 2,
                speaker: Some((*speaker).into()),
                start: (*start).into(),
                end: (*end).into(),
                text: (*text).into(),
            })
            .collect()
    }

    fn tables() -> Tables {
        Tables::load(None, None).unwrap()
    }

    fn temp_dir() -> PathBuf {
        let dir = std::env::temp_dir().join(format!("recap-pipeline-test-{}", uuid::Uuid::now_v7()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn empty_meeting_produces_empty_outputs() {
        let t = tables();
        let out = process_meeting(
            MeetingId::new("empty"),
            Vec::new(),
            &t.rules,
            &ExtractOptions::default(),
            &t.knowledge_base,
        );
        assert!(out.timeline.is_empty());
        assert!(out.action_items.is_empty());
        assert!(out.recommendations.is_empty());
    }

    #[test]
    fn chain_is_deterministic() {
        let t = tables();
        let data = rows(&[
            ("alice", "00:00:01", "00:00:04", "Can you send the design doc by next week?"),
            ("bob", "5", "7", "We need to schedule a review"),
            ("carol", "9", "8", "Sounds good."),
        ]);
        let run = || {
            process_meeting(
                MeetingId::new("m"),
                data.clone(),
                &t.rules,
                &ExtractOptions::default(),
                &t.knowledge_base,
            )
        };
        let first = run();
        let second = run();
        assert_eq!(first, second);
        assert_eq!(first.action_items.len(), 2);
        assert_eq!(first.recommendations.len(), 2);
        assert_eq!(first.diagnostics.len(), 1);
        for (i, rec) in first.recommendations.iter().enumerate() {
            assert_eq!(rec.action_index, i);
            assert_eq!(rec.source_sequence, first.action_items[i].source_sequence);
        }
    }

    #[tokio::test]
    async fn bad_file_is_recorded_not_fatal() {
        let input = temp_dir();
        let output = temp_dir().join("out");
        std::fs::write(
            input.join("good.tsv"),
            "speaker\tstart\tend\ttext\nAlice\t0\t3\tWe need to update the slides\n",
        )
        .unwrap();
        std::fs::write(input.join("broken.csv"), "who,when,what\nAlice,0,hi\n").unwrap();

        let config = RunConfig {
            input_dir: input.clone(),
            output_dir: output.clone(),
            concurrency: 2,
            extract: ExtractOptions::default(),
            tool_version: "0.1.0-test".into(),
        };
        let result = run(&config, &tables(), &SilentProgress).await.unwrap();

        assert_eq!(result.meeting_count, 1);
        assert_eq!(result.action_item_count, 1);
        assert_eq!(result.failures.len(), 1);
        assert_eq!(result.failures[0].meeting_id.as_str(), "broken");
        assert!(output.join("action_items/good.json").exists());
        assert!(!output.join("action_items/broken.json").exists());

        let _ = std::fs::remove_dir_all(&input);
        let _ = std::fs::remove_dir_all(output.parent().unwrap());
    }

    #[tokio::test]
    async fn missing_input_fails_before_writing() {
        let root = temp_dir();
        let config = RunConfig {
            input_dir: root.join("does-not-exist"),
            output_dir: root.join("out"),
            concurrency: 1,
            extract: ExtractOptions::default(),
            tool_version: "0.1.0-test".into(),
        };
        assert!(run(&config, &tables(), &SilentProgress).await.is_err());
        assert!(!root.join("out").exists());
        let _ = std::fs::remove_dir_all(&root);
    }
}
