//! insight-engine: orchestration of incremental group-chat analysis.
//!
//! ## Modules
//!
//! - [`config`] – AnalysisConfig (defaults + env overrides)
//! - [`collaborators`] – traits for the message source, LLM analyzer and
//!   report/history sinks
//! - [`error`] – EngineError and the pass/finalize outcome types
//! - [`locks`] – per-(group, day) serialization of load-merge-save
//! - [`service`] – AnalysisEngine: `run_incremental_pass` / `finalize_day`
//!
//! The engine runs each use case to completion when triggered by an
//! external caller (command or timer); it owns no scheduler of its own.

mod collaborators;
mod config;
mod error;
mod locks;
mod service;

pub use collaborators::{
    HistorySink, LlmAnalyzer, MessageSource, ReportSink, TitleExtraction, TopicExtraction,
};
pub use config::AnalysisConfig;
pub use error::{EngineError, FinalizeOutcome, PassOutcome, PassReport, SkipReason};
pub use locks::StateLocks;
pub use service::AnalysisEngine;
