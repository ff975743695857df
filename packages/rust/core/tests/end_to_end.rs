//! Drives a full run from transcript files on disk to the output directory.

use std::path::{Path, PathBuf};

use recap_core::{RunConfig, SilentProgress, Tables, run, validate_output};
use recap_extract::ExtractOptions;

fn temp_dir() -> PathBuf {
    let dir = std::env::temp_dir().join(format!("recap-e2e-test-{}", uuid::Uuid::now_v7()));
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

fn write(path: &Path, content: &str) {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(path, content).unwrap();
}

fn read_json(path: &Path) -> serde_json::Value {
    let content = std::fs::read_to_string(path).unwrap();
    serde_json::from_str(&content).unwrap()
}

fn config(input: &Path, output: &Path) -> RunConfig {
    RunConfig {
        input_dir: input.into(),
        output_dir: output.into(),
        concurrency: 3,
        extract: ExtractOptions::default(),
        tool_version: "0.1.0-test".into(),
    }
}

fn seed_inputs(input: &Path) {
    write(
        &input.join("planning.tsv"),
        "speaker\tstart_time\tend_time\ttext\n\
         alice\t00:00:05\t00:00:09\tCan you send the design doc by next week?\n\
         bob\t00:00:10\t00:00:14\tWe need to schedule a review\n\
         \t00:00:15\t00:00:16\tOkay.\n\
         carol\tlater\t00:00:20\tThis row has a broken timestamp\n",
    );
    write(
        &input.join("standup/daily.csv"),
        "Participant,Start,End,Transcript\n\
         Eli,0,4,\"Morning, all\"\n\
         Dana,5,9,\"Could you, Eli, run the testing suite?\"\n",
    );
    write(&input.join("silent.tsv"), "speaker\tstart\tend\ttext\n");
}

#[tokio::test]
async fn full_run_writes_expected_artifacts() {
    let input = temp_dir();
    let output = temp_dir().join("out");
    seed_inputs(&input);

    let tables = Tables::load(None, None).unwrap();
    let result = run(&config(&input, &output), &tables, &SilentProgress)
        .await
        .unwrap();

    assert_eq!(result.meeting_count, 3);
    assert!(result.failures.is_empty());

    // Scenario: request with a temporal hint.
    let planning = read_json(&output.join("action_items/planning.json"));
    let items = planning["action_items"].as_array().unwrap();
    assert_eq!(items.len(), 2);
    let send = items
        .iter()
        .find(|i| i["source_text"] == "Can you send the design doc by next week?")
        .unwrap();
    assert_eq!(send["owner"], "Alice");
    assert_eq!(send["due_week"], 2);
    assert!(send["confidence"].as_f64().unwrap() > 0.2);
    let tags: Vec<&str> = send["tags"]
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|t| t.as_str())
        .collect();
    assert!(tags.contains(&"send"));
    assert!(tags.contains(&"design"));

    // Scenario: no temporal phrase leaves due week absent.
    let review = items
        .iter()
        .find(|i| i["source_text"] == "We need to schedule a review")
        .unwrap();
    assert!(review.get("due_week").is_none());

    // Row defects are recorded, not fatal.
    let diagnostics = read_json(&output.join("diagnostics/planning.json"));
    assert_eq!(diagnostics["dropped"], 1);
    let conversation = read_json(&output.join("conversations/planning.json"));
    assert_eq!(
        conversation["speakers"],
        serde_json::json!(["Alice", "Bob", "UNKNOWN-1"])
    );

    // Addressee resolution across the CSV transcript in a subdirectory.
    let daily = read_json(&output.join("action_items/daily.json"));
    assert_eq!(daily["action_items"][0]["owner"], "Eli");
    assert_eq!(daily["action_items"][0]["speaker"], "Dana");
    assert!(!output.join("diagnostics/daily.json").exists());

    // Scenario: empty transcript yields empty outputs without error.
    let silent = read_json(&output.join("action_items/silent.json"));
    assert_eq!(silent["action_items"], serde_json::json!([]));
    let silent_recs = read_json(&output.join("recommendations/silent.json"));
    assert_eq!(silent_recs["recommendations"], serde_json::json!([]));

    // One recommendation per item, each carrying resources and a rationale.
    let recs = read_json(&output.join("recommendations/planning.json"));
    let recs = recs["recommendations"].as_array().unwrap();
    assert_eq!(recs.len(), 2);
    for rec in recs {
        let resources = rec["resources"].as_array().unwrap();
        assert!((1..=5).contains(&resources.len()));
        assert!(rec["rationale"].as_str().unwrap().starts_with("Task led by"));
    }

    let report = std::fs::read_to_string(output.join("report.md")).unwrap();
    assert!(report.contains("## Meeting planning"));
    assert!(report.contains("## Meeting silent"));
    assert!(report.contains("Owner: Alice; Due week: 2"));

    let manifest = validate_output(&output).unwrap();
    assert_eq!(manifest.meeting_count, 3);
    assert_eq!(manifest.run_id, result.run_id);

    let _ = std::fs::remove_dir_all(&input);
    let _ = std::fs::remove_dir_all(output.parent().unwrap());
}

#[tokio::test]
async fn repeated_runs_produce_identical_meeting_files() {
    let input = temp_dir();
    let root = temp_dir();
    seed_inputs(&input);
    let tables = Tables::load(None, None).unwrap();

    let first = root.join("first");
    let second = root.join("second");
    run(&config(&input, &first), &tables, &SilentProgress)
        .await
        .unwrap();
    run(&config(&input, &second), &tables, &SilentProgress)
        .await
        .unwrap();

    for rel in [
        "conversations/planning.json",
        "action_items/planning.json",
        "recommendations/planning.json",
        "action_items/daily.json",
        "recommendations/daily.json",
        "report.md",
    ] {
        let a = std::fs::read(first.join(rel)).unwrap();
        let b = std::fs::read(second.join(rel)).unwrap();
        assert_eq!(a, b, "{rel} differs between runs");
    }

    let _ = std::fs::remove_dir_all(&input);
    let _ = std::fs::remove_dir_all(&root);
}

#[tokio::test]
async fn empty_input_directory_is_an_error() {
    let input = temp_dir();
    let output = temp_dir().join("out");
    let tables = Tables::load(None, None).unwrap();

    assert!(run(&config(&input, &output), &tables, &SilentProgress)
        .await
        .is_err());
    assert!(!output.exists());

    let _ = std::fs::remove_dir_all(&input);
    let _ = std::fs::remove_dir_all(output.parent().unwrap());
}

#[tokio::test]
async fn same_stem_transcripts_keep_separate_outputs() {
    let input = temp_dir();
    let output = temp_dir().join("out");
    write(
        &input.join("m.csv"),
        "speaker,start,end,text\nAlice,0,3,We need to update the slides\n",
    );
    write(
        &input.join("m.tsv"),
        "speaker\tstart\tend\ttext\nBob\t0\t3\tCan you send the budget numbers?\n",
    );

    let tables = Tables::load(None, None).unwrap();
    let result = run(&config(&input, &output), &tables, &SilentProgress)
        .await
        .unwrap();
    assert_eq!(result.meeting_count, 2);

    let first = read_json(&output.join("action_items/m.json"));
    let second = read_json(&output.join("action_items/m.tsv.json"));
    assert_eq!(first["action_items"][0]["speaker"], "Alice");
    assert_eq!(second["action_items"][0]["speaker"], "Bob");

    validate_output(&output).unwrap();

    let _ = std::fs::remove_dir_all(&input);
    let _ = std::fs::remove_dir_all(output.parent().unwrap());
}
