//! Shared types, error model, and configuration for recap.
//!
//! This crate is the foundation depended on by all other recap crates.
//! It provides:
//! - [`RecapError`] — the unified error type
//! - Domain types ([`Timeline`], [`ActionItem`], [`KnowledgeBaseEntry`], [`Recommendation`])
//! - Configuration ([`AppConfig`], config loading)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, DefaultsConfig, ExtractionConfig, RecommendationConfig, config_dir,
    config_file_path, init_config, load_config, load_config_from,
};
pub use error::{RecapError, Result};
pub use types::{
    ActionItem, CURRENT_SCHEMA_VERSION, DiagnosticKind, KnowledgeBaseEntry, MeetingId,
    PhraseSpan, RankedResource, Recommendation, RowDiagnostic, RunId, RunManifest, Timeline,
    Utterance,
};
