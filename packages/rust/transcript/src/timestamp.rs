//! Timestamp normalization to seconds.
//!
//! Accepted forms: `75`, `75.25`, `1:15`, `00:01:15`, `00:01:15.250`.

use std::sync::LazyLock;

use regex::Regex;

/// Matches `[H:]M:S[.fff]`.
static CLOCK_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:(\d+):)?(\d+):(\d+(?:\.\d+)?)$").expect("clock regex")
});

/// Parse a timestamp into seconds. Returns `None` for anything unparsable,
/// negative, or non-finite.
pub fn parse_timestamp(raw: &str) -> Option<f64> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }

    if let Some(caps) = CLOCK_RE.captures(s) {
        let hours = match caps.get(1) {
            Some(h) => h.as_str().parse::<u64>().ok()?,
            None => 0,
        };
        let minutes = caps[2].parse::<u64>().ok()?;
        let seconds = caps[3].parse::<f64>().ok()?;

        if seconds >= 60.0 || (caps.get(1).is_some() && minutes >= 60) {
            return None;
        }

        return Some(hours as f64 * 3600.0 + minutes as f64 * 60.0 + seconds);
    }

    // `f64::from_str` also accepts "inf"/"nan"; only plain decimals pass.
    if !s.chars().all(|c| c.is_ascii_digit() || c == '.') {
        return None;
    }
    let value = s.parse::<f64>().ok()?;
    (value.is_finite() && value >= 0.0).then_some(value)
}
