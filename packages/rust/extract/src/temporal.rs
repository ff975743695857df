//! Due-week inference from temporal phrases.

use crate::rules::{TemporalRule, WeekOffset};

const SECONDS_PER_WEEK: f64 = 7.0 * 24.0 * 3600.0;

/// Infer the due week for an utterance.
///
/// The first rule (table order) yielding a usable offset wins. `elapsed` is
/// the time in seconds since the meeting's first utterance; whole weeks of it
/// are added to the offset. Returns `None` when no phrase matches; a guessed
/// default is never substituted.
pub fn infer_due_week(text: &str, rules: &[TemporalRule], elapsed: f64) -> Option<u32> {
    let elapsed_weeks = if elapsed.is_finite() && elapsed > 0.0 {
        (elapsed / SECONDS_PER_WEEK).floor() as u32
    } else {
        0
    };

    rules.iter().find_map(|rule| {
        let caps = rule.regex.captures(text)?;
        let offset = match rule.offset {
            WeekOffset::Fixed(week) => week,
            WeekOffset::Counted { base } => {
                let count = parse_count(caps.get(1)?.as_str())?;
                base.checked_add(count)?
            }
        };
        offset.checked_add(elapsed_weeks).filter(|week| *week >= 1)
    })
}

/// Digits or a small English number word.
fn parse_count(raw: &str) -> Option<u32> {
    let word = raw.trim().to_lowercase();
    if let Ok(n) = word.parse::<u32>() {
        return Some(n);
    }
    let n = match word.as_str() {
        "a" | "an" | "one" => 1,
        "two" => 2,
        "three" => 3,
        "four" => 4,
        "five" => 5,
        "six" => 6,
        "seven" => 7,
        "eight" => 8,
        "nine" => 9,
        "ten" => 10,
        "eleven" => 11,
        "twelve" => 12,
        _ => return None,
    };
    Some(n)
}
