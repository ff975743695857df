//! Declarative rule tables: action triggers and temporal hints.
//!
//! Tables are TOML documents with `[[action]]` and `[[temporal]]` arrays.
//! They are validated and compiled once; a malformed rule is a config error
//! raised here, never at match time.

use std::path::Path;

use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use recap_shared::{RecapError, Result};

/// The built-in rule table shipped with the binary.
const BUILTIN_RULES: &str = include_str!("default_rules.toml");

// ---------------------------------------------------------------------------
// Specs (as written in TOML)
// ---------------------------------------------------------------------------

/// `[[action]]` entry.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ActionRuleSpec {
    /// Regex (case-insensitive), or a plain phrase when `literal` is set.
    pub pattern: String,
    /// Intent tag contributed on match.
    #[serde(default)]
    pub tag: String,
    /// Contribution to confidence, in (0, 1].
    pub weight: f64,
    /// Marks an explicit modal/imperative marker.
    #[serde(default)]
    pub modal: bool,
    /// Marks a second-person trigger that may be followed by an addressee name.
    #[serde(default)]
    pub address: bool,
    /// Treat `pattern` as a word-bounded phrase instead of a regex.
    #[serde(default)]
    pub literal: bool,
}

/// `[[temporal]]` entry. Exactly one of `week` / `count_base` must be set.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TemporalRuleSpec {
    pub pattern: String,
    /// Fixed week offset (≥ 1).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub week: Option<u32>,
    /// Offset = base + the number captured by group 1.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub count_base: Option<u32>,
}

/// A whole rule table document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RuleTableSpec {
    #[serde(default)]
    pub action: Vec<ActionRuleSpec>,
    #[serde(default)]
    pub temporal: Vec<TemporalRuleSpec>,
}

// ---------------------------------------------------------------------------
// Compiled rules
// ---------------------------------------------------------------------------

/// A compiled action trigger.
#[derive(Debug, Clone)]
pub struct ActionRule {
    pub regex: Regex,
    pub tag: String,
    pub weight: f64,
    pub modal: bool,
    pub address: bool,
}

/// How a temporal rule turns a match into a week offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WeekOffset {
    Fixed(u32),
    Counted { base: u32 },
}

/// A compiled temporal hint.
#[derive(Debug, Clone)]
pub struct TemporalRule {
    pub regex: Regex,
    pub offset: WeekOffset,
}

/// Validated, immutable rule tables. Iteration order is table order.
#[derive(Debug, Clone)]
pub struct RuleTable {
    action: Vec<ActionRule>,
    temporal: Vec<TemporalRule>,
}

impl RuleTable {
    /// Compile and validate a rule table spec.
    pub fn from_spec(spec: RuleTableSpec) -> Result<Self> {
        if spec.action.is_empty() {
            return Err(RecapError::config("rule table defines no action rules"));
        }

        let action = spec
            .action
            .iter()
            .enumerate()
            .map(|(i, rule)| compile_action(i + 1, rule))
            .collect::<Result<Vec<_>>>()?;

        let temporal = spec
            .temporal
            .iter()
            .enumerate()
            .map(|(i, rule)| compile_temporal(i + 1, rule))
            .collect::<Result<Vec<_>>>()?;

        debug!(
            action_rules = action.len(),
            temporal_rules = temporal.len(),
            "rule table compiled"
        );

        Ok(Self { action, temporal })
    }

    /// Parse a TOML rule table.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let spec: RuleTableSpec = toml::from_str(content)
            .map_err(|e| RecapError::config(format!("invalid rule table: {e}")))?;
        Self::from_spec(spec)
    }

    /// Load a TOML rule table from disk.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| RecapError::io(path, e))?;
        let table = Self::from_toml_str(&content).map_err(|e| match e {
            RecapError::Config { message } => {
                RecapError::config(format!("{}: {message}", path.display()))
            }
            other => other,
        })?;
        info!(path = %path.display(), rules = table.action.len(), "loaded rule table");
        Ok(table)
    }

    /// The built-in rule table.
    pub fn builtin() -> Result<Self> {
        Self::from_toml_str(BUILTIN_RULES)
    }

    /// Load from `path` when given, else the built-in table.
    pub fn load_or_builtin(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(p) => Self::load(p),
            None => Self::builtin(),
        }
    }

    pub fn action_rules(&self) -> &[ActionRule] {
        &self.action
    }

    pub fn temporal_rules(&self) -> &[TemporalRule] {
        &self.temporal
    }
}

/// Source text of the built-in table, for `recap check` and docs.
pub fn builtin_rules_toml() -> &'static str {
    BUILTIN_RULES
}

fn compile_action(index: usize, rule: &ActionRuleSpec) -> Result<ActionRule> {
    let pattern = rule.pattern.trim();
    if pattern.is_empty() {
        return Err(RecapError::config(format!("action rule #{index} has an empty pattern")));
    }

    let tag = rule.tag.trim().to_lowercase();
    if tag.is_empty() {
        return Err(RecapError::config(format!(
            "action rule #{index} ({pattern:?}) has no tag"
        )));
    }

    if !rule.weight.is_finite() || rule.weight <= 0.0 || rule.weight > 1.0 {
        return Err(RecapError::config(format!(
            "action rule #{index} ({pattern:?}) weight must be in (0, 1], got {}",
            rule.weight
        )));
    }

    let source = if rule.literal {
        format!(r"\b{}\b", regex::escape(pattern))
    } else {
        pattern.to_string()
    };

    Ok(ActionRule {
        regex: build_regex(&source, "action", index)?,
        tag,
        weight: rule.weight,
        modal: rule.modal,
        address: rule.address,
    })
}

fn compile_temporal(index: usize, rule: &TemporalRuleSpec) -> Result<TemporalRule> {
    let pattern = rule.pattern.trim();
    if pattern.is_empty() {
        return Err(RecapError::config(format!(
            "temporal rule #{index} has an empty pattern"
        )));
    }

    let regex = build_regex(pattern, "temporal", index)?;

    let offset = match (rule.week, rule.count_base) {
        (Some(0), None) => {
            return Err(RecapError::config(format!(
                "temporal rule #{index} ({pattern:?}) week must be at least 1"
            )));
        }
        (Some(week), None) => WeekOffset::Fixed(week),
        (None, Some(base)) => {
            // captures_len counts the implicit whole-match group.
            if regex.captures_len() < 2 {
                return Err(RecapError::config(format!(
                    "temporal rule #{index} ({pattern:?}) uses count_base but has no capture group"
                )));
            }
            WeekOffset::Counted { base }
        }
        (None, None) => {
            return Err(RecapError::config(format!(
                "temporal rule #{index} ({pattern:?}) has no week offset"
            )));
        }
        (Some(_), Some(_)) => {
            return Err(RecapError::config(format!(
                "temporal rule #{index} ({pattern:?}) sets both week and count_base"
            )));
        }
    };

    Ok(TemporalRule { regex, offset })
}

fn build_regex(source: &str, kind: &str, index: usize) -> Result<Regex> {
    RegexBuilder::new(source)
        .case_insensitive(true)
        .build()
        .map_err(|e| RecapError::config(format!("{kind} rule #{index} has an invalid pattern: {e}")))
}
