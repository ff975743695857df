//! The knowledge base: a fixed, validated resource catalog.
//!
//! Catalogs are TOML documents with `[[entries]]` and a single `[fallback]`.
//! Loaded once per process and never mutated.

use std::collections::{BTreeSet, HashSet};
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::info;

use recap_shared::{KnowledgeBaseEntry, RecapError, Result};

/// The built-in catalog shipped with the binary.
const BUILTIN_CATALOG: &str = include_str!("default_catalog.toml");

/// A catalog entry as written in TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EntrySpec {
    pub title: String,
    #[serde(default)]
    pub resource: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default = "default_priority")]
    pub priority: f64,
}

fn default_priority() -> f64 {
    1.0
}

/// A whole catalog document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CatalogSpec {
    #[serde(default)]
    pub entries: Vec<EntrySpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fallback: Option<EntrySpec>,
}

/// Validated, immutable catalog plus its designated fallback entry.
#[derive(Debug, Clone)]
pub struct KnowledgeBase {
    entries: Vec<KnowledgeBaseEntry>,
    fallback: KnowledgeBaseEntry,
}

impl KnowledgeBase {
    /// Validate a catalog spec.
    ///
    /// Rejects: no entries, missing fallback, blank titles, entries without
    /// tags, non-finite or negative priorities, duplicate titles.
    pub fn from_spec(spec: CatalogSpec) -> Result<Self> {
        if spec.entries.is_empty() {
            return Err(RecapError::config("knowledge base has no entries"));
        }
        let Some(fallback_spec) = spec.fallback else {
            return Err(RecapError::config("knowledge base has no [fallback] entry"));
        };

        let mut titles: HashSet<String> = HashSet::new();
        let mut entries = Vec::with_capacity(spec.entries.len());

        for (i, entry) in spec.entries.into_iter().enumerate() {
            let entry = to_entry(i + 1, entry)?;
            if entry.tags.is_empty() {
                return Err(RecapError::config(format!(
                    "knowledge base entry #{} ({:?}) has no tags",
                    i + 1,
                    entry.title
                )));
            }
            if !titles.insert(entry.title.to_lowercase()) {
                return Err(RecapError::config(format!(
                    "knowledge base entry #{} duplicates title {:?}",
                    i + 1,
                    entry.title
                )));
            }
            entries.push(entry);
        }

        let fallback = to_entry(0, fallback_spec)?;
        if titles.contains(&fallback.title.to_lowercase()) {
            return Err(RecapError::config(format!(
                "fallback entry {:?} duplicates a catalog entry",
                fallback.title
            )));
        }

        Ok(Self { entries, fallback })
    }

    /// Parse a TOML catalog.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let spec: CatalogSpec = toml::from_str(content)
            .map_err(|e| RecapError::config(format!("invalid knowledge base: {e}")))?;
        Self::from_spec(spec)
    }

    /// Load a TOML catalog from disk.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| RecapError::io(path, e))?;
        let kb = Self::from_toml_str(&content).map_err(|e| match e {
            RecapError::Config { message } => {
                RecapError::config(format!("{}: {message}", path.display()))
            }
            other => other,
        })?;
        info!(path = %path.display(), entries = kb.len(), "loaded knowledge base");
        Ok(kb)
    }

    /// The built-in catalog.
    pub fn builtin() -> Result<Self> {
        Self::from_toml_str(BUILTIN_CATALOG)
    }

    /// Load from `path` when given, else the built-in catalog.
    pub fn load_or_builtin(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(p) => Self::load(p),
            None => Self::builtin(),
        }
    }

    /// Catalog entries in insertion order (fallback excluded).
    pub fn entries(&self) -> &[KnowledgeBaseEntry] {
        &self.entries
    }

    pub fn fallback(&self) -> &KnowledgeBaseEntry {
        &self.fallback
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Source text of the built-in catalog.
pub fn builtin_catalog_toml() -> &'static str {
    BUILTIN_CATALOG
}

/// `index` 0 denotes the fallback.
fn to_entry(index: usize, spec: EntrySpec) -> Result<KnowledgeBaseEntry> {
    let label = if index == 0 {
        "fallback entry".to_string()
    } else {
        format!("knowledge base entry #{index}")
    };

    let title = spec.title.trim().to_string();
    if title.is_empty() {
        return Err(RecapError::config(format!("{label} has no title")));
    }
    if !spec.priority.is_finite() || spec.priority < 0.0 {
        return Err(RecapError::config(format!(
            "{label} ({title:?}) priority must be a non-negative number, got {}",
            spec.priority
        )));
    }

    let tags: BTreeSet<String> = spec
        .tags
        .iter()
        .map(|t| t.trim().to_lowercase())
        .filter(|t| !t.is_empty())
        .collect();

    Ok(KnowledgeBaseEntry {
        title,
        resource: spec.resource.trim().to_string(),
        tags,
        priority: spec.priority,
    })
}
