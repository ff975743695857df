//! Core pipeline orchestration for recap.
//!
//! This crate ties together transcript parsing, action-item extraction, and
//! resource recommendation into an end-to-end run, then writes the output
//! directory (per-meeting JSON, Markdown report, manifest).

pub mod assembler;
pub mod pipeline;
pub mod report;

pub use assembler::{ArtifactMeta, validate_output};
pub use pipeline::{
    MeetingArtifacts, MeetingFailure, ProgressReporter, RunConfig, RunResult, SilentProgress,
    Tables, analyze, process_meeting, run,
};
