//! Frequent content words of a meeting.

use std::collections::HashMap;
use std::sync::LazyLock;

use regex::Regex;

use recap_shared::Timeline;

/// How many key terms are kept.
pub const KEY_TERM_LIMIT: usize = 15;

static TOKEN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[A-Za-z0-9']+").expect("token regex"));

/// The most frequent lowercase tokens longer than three characters.
///
/// Ties are broken by first appearance so the result is deterministic.
pub fn extract_key_terms(timeline: &Timeline) -> Vec<String> {
    let mut counts: HashMap<String, (usize, usize)> = HashMap::new();
    let mut order = 0usize;

    for utt in &timeline.utterances {
        for token in TOKEN_RE.find_iter(&utt.text) {
            let word = token.as_str().to_lowercase();
            if word.chars().count() <= 3 {
                continue;
            }
            let entry = counts.entry(word).or_insert_with(|| {
                order += 1;
                (0, order)
            });
            entry.0 += 1;
        }
    }

    let mut ranked: Vec<(String, usize, usize)> = counts
        .into_iter()
        .map(|(word, (count, first))| (word, count, first))
        .collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then(a.2.cmp(&b.2)));

    ranked
        .into_iter()
        .take(KEY_TERM_LIMIT)
        .map(|(word, _, _)| word)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use recap_shared::{MeetingId, Utterance};

    #[test]
    fn ranks_by_frequency_then_first_appearance() {
        let utterances = ["The remote design matters", "Design the remote control", "Budget is fine"]
            .iter()
            .enumerate()
            .map(|(i, text)| Utterance {
                sequence: i,
                speaker: "A".into(),
                start: i as f64,
                end: i as f64 + 1.0,
                text: (*text).into(),
                line: i + 2,
            })
            .collect();
        let timeline = Timeline {
            meeting_id: MeetingId::new("m"),
            utterances,
        };

        let terms = extract_key_terms(&timeline);
        assert_eq!(&terms[..4], ["remote", "design", "matters", "control"]);
        assert!(!terms.contains(&"the".to_string()));
    }
}
