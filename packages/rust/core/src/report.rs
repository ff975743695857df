//! Markdown run report and per-recommendation briefing text.

use std::fmt::Write;

use recap_extract::extract_key_terms;
use recap_shared::{ActionItem, RankedResource, Recommendation};

use crate::pipeline::{MeetingArtifacts, MeetingFailure};

/// Key terms quoted in a rationale.
const RATIONALE_TERMS: usize = 5;

/// Week plan used for near-term due weeks.
const WEEK_PLAN: [&str; 4] = [
    "Week 1: Immediate transcript preprocessing and extraction",
    "Week 2: Prototype recommender evaluation",
    "Week 3: Integrate LLM reasoning loop",
    "Week 4: Demo and retrospective",
];

const SPRINT_CADENCE: &str = "Align with sprint cadence and stakeholder checkpoints.";

/// Human-readable text attached to one recommendation.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct Briefing {
    pub summary: String,
    pub rationale: String,
}

/// Build the summary and rationale for one action item.
pub fn brief(item: &ActionItem, key_terms: &[String]) -> Briefing {
    Briefing {
        summary: summarise(item),
        rationale: rationale(item, key_terms),
    }
}

/// `Assign to <owner> | Due: <week> | Confidence: <c>`.
pub fn summarise(item: &ActionItem) -> String {
    format!(
        "Assign to {} | Due: {} | Confidence: {:.2}",
        owner_label(item),
        due_label(item.due_week),
        item.confidence
    )
}

/// Why these resources fit: owner, meeting themes, and where the task lands in the plan.
pub fn rationale(item: &ActionItem, key_terms: &[String]) -> String {
    let highlights = if key_terms.is_empty() {
        "core meeting themes".to_string()
    } else {
        key_terms
            .iter()
            .take(RATIONALE_TERMS)
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join(", ")
    };
    format!(
        "Task led by {} benefits from resources aligned to {highlights}. {}",
        owner_label(item),
        week_plan(item.due_week)
    )
}

/// Plan line for a due week; weeks outside 1..=4 (or unknown) get the sprint cadence line.
pub fn week_plan(due_week: Option<u32>) -> &'static str {
    due_week
        .and_then(|w| w.checked_sub(1))
        .and_then(|i| WEEK_PLAN.get(i as usize))
        .copied()
        .unwrap_or(SPRINT_CADENCE)
}

fn owner_label(item: &ActionItem) -> &str {
    if item.owner.is_empty() {
        "TBD"
    } else {
        &item.owner
    }
}

fn due_label(due_week: Option<u32>) -> String {
    due_week.map_or_else(|| "TBD".to_string(), |w| w.to_string())
}

fn resource_label(resource: &RankedResource) -> String {
    if resource.entry.resource.is_empty() {
        resource.entry.title.clone()
    } else {
        format!("{} ({})", resource.entry.title, resource.entry.resource)
    }
}

// ---------------------------------------------------------------------------
// Report
// ---------------------------------------------------------------------------

/// Render the Markdown report for a run. Meetings appear in the given order.
pub fn render_report(meetings: &[MeetingArtifacts], failures: &[MeetingFailure]) -> String {
    let mut out = String::new();
    out.push_str("# Meeting Action-Item Report\n\n");
    out.push_str(
        "Extracted action items and recommended resources for each processed meeting transcript.\n\n",
    );

    for meeting in meetings {
        render_meeting(&mut out, meeting);
    }

    if !failures.is_empty() {
        out.push_str("## Skipped transcripts\n\n");
        for failure in failures {
            let _ = writeln!(
                out,
                "- {} (`{}`): {}",
                failure.meeting_id,
                failure.path.display(),
                failure.error
            );
        }
        out.push('\n');
    }

    out
}

fn render_meeting(out: &mut String, meeting: &MeetingArtifacts) {
    let _ = writeln!(out, "## Meeting {}\n", meeting.meeting_id);

    let speakers = meeting.timeline.speakers();
    if speakers.is_empty() {
        out.push_str("**Speakers:** none\n\n");
    } else {
        let _ = writeln!(out, "**Speakers:** {}\n", speakers.join(", "));
    }

    out.push_str("### Action Items\n\n");
    if meeting.action_items.is_empty() {
        out.push_str("- No confident action items detected.\n");
    }
    for item in &meeting.action_items {
        let _ = writeln!(
            out,
            "- ({:.2}) {} — Owner: {}; Due week: {}",
            item.confidence,
            item.description,
            owner_label(item),
            due_label(item.due_week)
        );
    }
    out.push('\n');

    out.push_str("### Recommendations\n\n");
    if meeting.recommendations.is_empty() {
        out.push_str("- No recommendations generated.\n");
    } else {
        let key_terms = extract_key_terms(&meeting.timeline);
        for rec in &meeting.recommendations {
            render_recommendation(out, rec, &meeting.action_items, &key_terms);
        }
    }
    out.push('\n');
}

fn render_recommendation(
    out: &mut String,
    rec: &Recommendation,
    items: &[ActionItem],
    key_terms: &[String],
) {
    let Some(item) = items.get(rec.action_index) else {
        return;
    };
    let briefing = brief(item, key_terms);
    let resources = rec
        .resources
        .iter()
        .map(resource_label)
        .collect::<Vec<_>>()
        .join("; ");
    let _ = writeln!(
        out,
        "- {}. Resources: {resources}. Rationale: {}",
        briefing.summary, briefing.rationale
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use recap_shared::{KnowledgeBaseEntry, MeetingId, PhraseSpan, Timeline, Utterance};

    fn item(owner: &str, due_week: Option<u32>) -> ActionItem {
        ActionItem {
            meeting_id: MeetingId::new("m1"),
            source_sequence: 0,
            speaker: "Alice".into(),
            source_text: "Can you send the deck?".into(),
            span: PhraseSpan {
                start: 0,
                end: 7,
                text: "Can you".into(),
            },
            description: "Can you send the deck?".into(),
            owner: owner.into(),
            due_week,
            confidence: 0.85,
            tags: ["request".to_string(), "send".to_string()].into(),
            occurrences: 1,
        }
    }

    fn meeting() -> MeetingArtifacts {
        let it = item("Bob", Some(2));
        MeetingArtifacts {
            meeting_id: MeetingId::new("m1"),
            timeline: Timeline {
                meeting_id: MeetingId::new("m1"),
                utterances: vec![Utterance {
                    sequence: 0,
                    speaker: "Alice".into(),
                    start: 0.0,
                    end: 3.0,
                    text: "Can you send the deck?".into(),
                    line: 2,
                }],
            },
            diagnostics: Vec::new(),
            recommendations: vec![Recommendation {
                meeting_id: MeetingId::new("m1"),
                action_index: 0,
                source_sequence: 0,
                resources: vec![RankedResource {
                    rank: 1,
                    entry: KnowledgeBaseEntry {
                        title: "Email template".into(),
                        resource: "kb://email".into(),
                        tags: ["send".to_string()].into(),
                        priority: 0.8,
                    },
                    overlap: 1,
                    score: 0.8,
                    fallback: false,
                }],
            }],
            action_items: vec![it],
        }
    }

    #[test]
    fn week_plan_covers_first_four_weeks() {
        assert!(week_plan(Some(1)).starts_with("Week 1"));
        assert!(week_plan(Some(4)).starts_with("Week 4"));
        assert_eq!(week_plan(Some(5)), SPRINT_CADENCE);
        assert_eq!(week_plan(Some(0)), SPRINT_CADENCE);
        assert_eq!(week_plan(None), SPRINT_CADENCE);
    }

    #[test]
    fn summary_uses_tbd_for_unknowns() {
        let s = summarise(&item("", None));
        assert_eq!(s, "Assign to TBD | Due: TBD | Confidence: 0.85");
    }

    #[test]
    fn rationale_quotes_top_terms() {
        let terms: Vec<String> = ["deck", "send", "slides", "budget", "review", "extra"]
            .iter()
            .map(|s| (*s).to_string())
            .collect();
        let r = rationale(&item("Bob", Some(2)), &terms);
        assert!(r.starts_with("Task led by Bob"));
        assert!(r.contains("deck, send, slides, budget, review."));
        assert!(!r.contains("extra"));
        assert!(r.ends_with("Week 2: Prototype recommender evaluation"));

        let fallback = rationale(&item("Bob", None), &[]);
        assert!(fallback.contains("core meeting themes"));
    }

    #[test]
    fn report_lists_items_and_resources() {
        let report = render_report(&[meeting()], &[]);
        assert!(report.starts_with("# Meeting Action-Item Report"));
        assert!(report.contains("## Meeting m1"));
        assert!(report.contains("**Speakers:** Alice"));
        assert!(report.contains("- (0.85) Can you send the deck? — Owner: Bob; Due week: 2"));
        assert!(report.contains("Resources: Email template (kb://email)."));
        assert!(!report.contains("Skipped transcripts"));
    }

    #[test]
    fn empty_meeting_has_placeholder_lines() {
        let empty = MeetingArtifacts {
            meeting_id: MeetingId::new("quiet"),
            timeline: Timeline::empty(MeetingId::new("quiet")),
            diagnostics: Vec::new(),
            action_items: Vec::new(),
            recommendations: Vec::new(),
        };
        let failure = MeetingFailure {
            meeting_id: MeetingId::new("bad"),
            path: "in/bad.csv".into(),
            error: "parse error: missing column".into(),
        };
        let report = render_report(&[empty], &[failure]);
        assert!(report.contains("No confident action items detected."));
        assert!(report.contains("No recommendations generated."));
        assert!(report.contains("## Skipped transcripts"));
        assert!(report.contains("- bad (`in/bad.csv`)"));
    }
}
