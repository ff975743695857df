//! Rule-driven action-item extraction.
//!
//! Each utterance is scanned against the action rule table in order. Every
//! matching rule adds its tag and weight; the bounded sum (plus modal and
//! addressee bonuses) is the item's confidence. Owner and due week are
//! single-valued and decided by the first rule, in table order, that yields one.

pub mod rules;
mod temporal;
mod terms;

use std::collections::{BTreeSet, HashMap};
use std::sync::LazyLock;

use regex::Regex;
use tracing::{debug, instrument, trace};

use recap_shared::{ActionItem, ExtractionConfig, PhraseSpan, Timeline, Utterance};

pub use rules::{
    ActionRule, RuleTable, RuleTableSpec, TemporalRule, WeekOffset, builtin_rules_toml,
};
pub use temporal::infer_due_week;
pub use terms::{KEY_TERM_LIMIT, extract_key_terms};

/// Absorbs float noise from summing weights (0.1 + 0.1 + ...) at the threshold.
const SCORE_EPSILON: f64 = 1e-9;

/// Confidence added per extra occurrence when duplicates are merged.
const DUPLICATE_BOOST: f64 = 0.1;

/// Scoring knobs for extraction.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractOptions {
    /// Items at or below this confidence are dropped.
    pub min_confidence: f64,
    pub modal_bonus: f64,
    pub addressee_bonus: f64,
    pub merge_duplicates: bool,
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self::from(&ExtractionConfig::default())
    }
}

impl From<&ExtractionConfig> for ExtractOptions {
    fn from(config: &ExtractionConfig) -> Self {
        Self {
            min_confidence: config.min_confidence,
            modal_bonus: config.modal_bonus,
            addressee_bonus: config.addressee_bonus,
            merge_duplicates: config.merge_duplicates,
        }
    }
}

/// Extract action items from a timeline.
///
/// Output is ordered by confidence (descending), then source sequence.
#[instrument(skip_all, fields(meeting = %timeline.meeting_id, utterances = timeline.len()))]
pub fn extract_action_items(
    timeline: &Timeline,
    rules: &RuleTable,
    opts: &ExtractOptions,
) -> Vec<ActionItem> {
    let participants = timeline.speakers();
    let first_start = timeline.first_start().unwrap_or(0.0);

    let mut items: Vec<ActionItem> = timeline
        .utterances
        .iter()
        .filter_map(|utt| match_utterance(timeline, utt, &participants, first_start, rules, opts))
        .collect();

    if opts.merge_duplicates {
        items = merge_duplicates(items);
    }

    items.sort_by(|a, b| {
        b.confidence
            .total_cmp(&a.confidence)
            .then(a.source_sequence.cmp(&b.source_sequence))
    });

    debug!(items = items.len(), "action items extracted");
    items
}

fn match_utterance(
    timeline: &Timeline,
    utt: &Utterance,
    participants: &[&str],
    first_start: f64,
    rules: &RuleTable,
    opts: &ExtractOptions,
) -> Option<ActionItem> {
    let mut tags: BTreeSet<String> = BTreeSet::new();
    let mut score = 0.0;
    let mut modal = false;
    let mut span: Option<PhraseSpan> = None;
    let mut addressee: Option<String> = None;

    for rule in rules.action_rules() {
        let Some(m) = rule.regex.find(&utt.text) else {
            continue;
        };

        tags.insert(rule.tag.clone());
        score += rule.weight;
        modal |= rule.modal;

        if span.is_none() {
            span = Some(PhraseSpan {
                start: m.start(),
                end: m.end(),
                text: m.as_str().to_string(),
            });
        }
        if rule.address && addressee.is_none() {
            addressee = resolve_addressee(&utt.text[m.end()..], participants, &utt.speaker);
        }
    }

    let span = span?;

    if modal {
        score += opts.modal_bonus;
    }
    if addressee.is_some() {
        score += opts.addressee_bonus;
    }
    let score = score.clamp(0.0, 1.0);

    // Threshold applies to the raw score; rounding is for storage only.
    if score <= opts.min_confidence + SCORE_EPSILON {
        trace!(sequence = utt.sequence, score, "below threshold");
        return None;
    }
    let confidence = round_confidence(score);

    let due_week = infer_due_week(
        &utt.text,
        rules.temporal_rules(),
        utt.start - first_start,
    );

    Some(ActionItem {
        meeting_id: timeline.meeting_id.clone(),
        source_sequence: utt.sequence,
        speaker: utt.speaker.clone(),
        source_text: utt.text.clone(),
        span,
        description: describe(&utt.text),
        owner: addressee.unwrap_or_else(|| utt.speaker.clone()),
        due_week,
        confidence,
        tags,
        occurrences: 1,
    })
}

/// Find a participant named right after a second-person trigger.
///
/// Compares the next word against each participant's full label and first
/// name. Naming the speaker themself does not count.
fn resolve_addressee(rest: &str, participants: &[&str], speaker: &str) -> Option<String> {
    let rest = rest.trim_start_matches(|c: char| c == ',' || c.is_whitespace());
    let word: String = rest
        .chars()
        .take_while(|c| c.is_alphanumeric() || *c == '-' || *c == '\'')
        .collect::<String>()
        .to_lowercase();
    if word.is_empty() {
        return None;
    }

    participants
        .iter()
        .find(|p| {
            let label = p.to_lowercase();
            **p != speaker
                && (label == word || label.split_whitespace().next() == Some(word.as_str()))
        })
        .map(|p| (*p).to_string())
}

/// Utterance text with a leading "let's/we/I" dropped and the first letter capitalized.
fn describe(text: &str) -> String {
    static LEAD_RE: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(r"(?i)^(?:let's|lets|we|i)\s+").expect("valid regex")
    });

    let stripped = LEAD_RE.replace(text.trim(), "");
    let mut chars = stripped.chars();
    match chars.next() {
        Some(c) => format!("{}{}", c.to_uppercase(), chars.as_str()),
        None => String::new(),
    }
}

/// Collapse items whose descriptions normalize to the same key.
///
/// The highest-confidence item (earliest on ties) survives, boosted per extra
/// occurrence, carrying the union of all tags.
fn merge_duplicates(items: Vec<ActionItem>) -> Vec<ActionItem> {
    let mut index: HashMap<String, usize> = HashMap::new();
    let mut groups: Vec<Vec<ActionItem>> = Vec::new();

    for item in items {
        let key = duplicate_key(&item.description);
        match index.get(&key) {
            Some(&i) => groups[i].push(item),
            None => {
                index.insert(key, groups.len());
                groups.push(vec![item]);
            }
        }
    }

    groups
        .into_iter()
        .filter_map(|group| {
            let count = group.len();
            let tags: BTreeSet<String> = group.iter().flat_map(|i| i.tags.iter().cloned()).collect();
            let best = group
                .into_iter()
                .reduce(|best, next| if next.confidence > best.confidence { next } else { best })?;

            if count == 1 {
                return Some(best);
            }

            debug!(
                sequence = best.source_sequence,
                occurrences = count,
                "merged duplicate action items"
            );
            let boosted = best.confidence + DUPLICATE_BOOST * (count - 1) as f64;
            Some(ActionItem {
                confidence: round_confidence(boosted.min(1.0)),
                tags,
                occurrences: count,
                ..best
            })
        })
        .collect()
}

fn duplicate_key(description: &str) -> String {
    static NON_ALNUM_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"[^a-z0-9]+").expect("valid regex"));

    NON_ALNUM_RE
        .replace_all(&description.to_lowercase(), " ")
        .trim()
        .to_string()
}

/// Keep four decimals so sums like 0.1 + 0.2 serialize cleanly.
fn round_confidence(value: f64) -> f64 {
    (value * 10_000.0).round() / 10_000.0
}
