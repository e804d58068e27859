//! Contracts with the excluded collaborators: message source, LLM analyzer
//! and the reporting/history sinks.
//!
//! The engine never talks to a chat platform or an LLM API directly; hosts
//! wire concrete adapters behind these traits. Timeouts and retries on
//! those calls belong to the implementations — the engine treats any error
//! as "pass failed, state unchanged".

use anyhow::Result;
use async_trait::async_trait;

use insight_core::{
    AnalysisResult, CleanMessage, QuoteRecord, RankedUser, RawMessage, TokenUsage, TopicRecord,
    UserTitle,
};

/// Output of the incremental LLM pass: topics and quotes only. Titles are
/// deliberately absent; they are produced once, at finalization.
#[derive(Debug, Clone, Default)]
pub struct TopicExtraction {
    pub topics: Vec<TopicRecord>,
    pub quotes: Vec<QuoteRecord>,
    pub token_usage: TokenUsage,
}

/// Output of the finalization-time title pass.
#[derive(Debug, Clone, Default)]
pub struct TitleExtraction {
    pub titles: Vec<UserTitle>,
    pub token_usage: TokenUsage,
}

/// Fetches raw message slices from whatever chat platform hosts the group.
#[async_trait]
pub trait MessageSource: Send + Sync {
    async fn fetch_messages(
        &self,
        group_id: &str,
        days: u32,
        max_count: usize,
    ) -> Result<Vec<RawMessage>>;
}

/// The two LLM entry points the engine consumes.
#[async_trait]
pub trait LlmAnalyzer: Send + Sync {
    /// Extracts up to `max_topics` topics and `max_quotes` quotes from one
    /// batch of messages.
    async fn extract_topics_and_quotes(
        &self,
        messages: &[CleanMessage],
        max_topics: usize,
        max_quotes: usize,
    ) -> Result<TopicExtraction>;

    /// Assigns titles to the top-ranked users of the day.
    async fn extract_user_titles(&self, top_users: &[RankedUser]) -> Result<TitleExtraction>;
}

/// Receives the materialized result for rendering/sending.
#[async_trait]
pub trait ReportSink: Send + Sync {
    async fn dispatch(&self, group_id: &str, result: &AnalysisResult) -> Result<()>;
}

/// Archives the materialized result.
#[async_trait]
pub trait HistorySink: Send + Sync {
    async fn save_analysis(&self, group_id: &str, result: &AnalysisResult) -> Result<()>;
}
