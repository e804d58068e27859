//! Engine errors and use-case outcome types.
//!
//! Failures cross to callers as values. The taxonomy separates "no new
//! data" (a successful no-op, modeled in [`PassOutcome`]) from collaborator
//! failures, and keeps a distinct variant for a persistence failure after a
//! computed merge, since that loses otherwise-valid in-memory work.

use insight_storage::StorageError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Message fetch failed: {0}")]
    Fetch(String),

    #[error("LLM analysis failed: {0}")]
    Llm(String),

    /// Store failure on the read path or during maintenance; no merge had
    /// been computed yet.
    #[error("State store error: {0}")]
    Store(StorageError),

    /// Save-side store failure after a successful merge. The computed merge
    /// is lost; the caller must retry the whole pass from a fresh read.
    #[error("State save failed after merge: {0}")]
    Persist(StorageError),

    #[error("Report dispatch failed: {0}")]
    Dispatch(String),

    #[error("History persistence failed: {0}")]
    History(String),
}

pub type Result<T> = std::result::Result<T, EngineError>;

/// Why an incremental pass stopped without mutating state. Both cases are
/// successful no-ops, not failures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// The source returned nothing, or cleaning removed everything.
    NoMessages,
    /// Fewer new messages than the configured minimum.
    BelowThreshold { seen: usize, required: usize },
}

/// Summary of one merged incremental pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PassReport {
    pub messages_count: u64,
    pub new_topics: usize,
    pub new_quotes: usize,
    pub total_batch_count: u64,
    pub watermark: i64,
}

/// Outcome of `run_incremental_pass`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PassOutcome {
    Merged(PassReport),
    Skipped(SkipReason),
}

/// Outcome of `finalize_day`.
#[derive(Debug, Clone, PartialEq)]
pub enum FinalizeOutcome {
    Completed(insight_core::AnalysisResult),
    /// No batch was ever merged for this (group, day); distinct from an
    /// empty-but-present day.
    NoData,
}
