//! insight-core: domain types and pure computation for incremental
//! group-chat analysis.
//!
//! ## Modules
//!
//! - [`types`] – TokenUsage, TopicRecord, QuoteRecord, UserTitle, RankedUser
//! - [`message`] – RawMessage, CleanMessage, emoji classification
//! - [`cleaner`] – MessageCleaner (bot/command/noise filtering)
//! - [`state`] – AggregateState, the per-(group, day) accumulator
//! - [`batch`] – Batch computation and watermark filtering
//! - [`merge`] – the batch merge fold and capped-list eviction
//! - [`statistics`] – one-shot statistics over a message set
//! - [`materialize`] – AggregateState → canonical AnalysisResult
//! - [`logger`] – tracing initialization
//!
//! Everything here is synchronous pure computation; I/O lives in
//! insight-storage and insight-engine.

mod batch;
mod cleaner;
mod logger;
mod materialize;
mod merge;
mod message;
mod state;
mod statistics;
mod types;


pub use batch::{retain_unseen, Batch, UserDelta};
pub use cleaner::MessageCleaner;
pub use logger::init_tracing;
pub use materialize::{build_analysis_result, build_final_statistics, MaterializeOptions};
pub use merge::{merge_batch, push_capped, MergeLimits};
pub use message::{CleanMessage, EmojiEvent, EmojiKind, RawMessage};
pub use state::{AggregateState, EmojiCounts, StateKey, UserAggregate};
pub use statistics::{
    calculate_group_statistics, ActivityVisualization, AnalysisResult, GroupStatistics,
};
pub use types::{QuoteRecord, RankedUser, TokenUsage, TopicRecord, UserTitle};
