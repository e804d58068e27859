//! The two use cases: one incremental pass, and end-of-day finalization.

use std::sync::Arc;

use chrono::{Duration, Local};
use tracing::{error, info, instrument, warn};

use insight_core::{
    build_analysis_result, merge_batch, retain_unseen, Batch, MessageCleaner, StateKey,
};
use insight_storage::StateStore;

use crate::collaborators::{HistorySink, LlmAnalyzer, MessageSource, ReportSink};
use crate::config::AnalysisConfig;
use crate::error::{EngineError, FinalizeOutcome, PassOutcome, PassReport, Result, SkipReason};
use crate::locks::StateLocks;

/// Orchestrates incremental analysis for any number of groups.
///
/// Each public method runs to completion as one logical task when triggered
/// by a caller (command handler or timer). Merges for the same (group, day)
/// are serialized by [`StateLocks`]; the store's version check backstops
/// any writer that bypasses the lock.
pub struct AnalysisEngine {
    config: AnalysisConfig,
    cleaner: MessageCleaner,
    source: Arc<dyn MessageSource>,
    analyzer: Arc<dyn LlmAnalyzer>,
    reports: Arc<dyn ReportSink>,
    history: Arc<dyn HistorySink>,
    store: Arc<dyn StateStore>,
    locks: StateLocks,
}

impl AnalysisEngine {
    pub fn new(
        config: AnalysisConfig,
        source: Arc<dyn MessageSource>,
        analyzer: Arc<dyn LlmAnalyzer>,
        reports: Arc<dyn ReportSink>,
        history: Arc<dyn HistorySink>,
        store: Arc<dyn StateStore>,
    ) -> Self {
        let cleaner = MessageCleaner::new(config.bot_ids.clone(), config.filter_commands);
        Self {
            config,
            cleaner,
            source,
            analyzer,
            reports,
            history,
            store,
            locks: StateLocks::new(),
        }
    }

    /// Runs one incremental pass for today's state of `group_id`.
    ///
    /// fetch → clean → watermark-filter → threshold check → LLM topics+quotes
    /// → compute batch → load → merge → save. A pass that observes no new
    /// qualifying messages completes as a successful no-op without touching
    /// state.
    #[instrument(skip(self))]
    pub async fn run_incremental_pass(&self, group_id: &str) -> Result<PassOutcome> {
        info!(group_id, "starting incremental pass");

        let raw = self
            .source
            .fetch_messages(group_id, self.config.fetch_days, self.config.max_messages)
            .await
            .map_err(|e| EngineError::Fetch(e.to_string()))?;

        if raw.is_empty() {
            info!(group_id, "no messages fetched, skipping pass");
            return Ok(PassOutcome::Skipped(SkipReason::NoMessages));
        }

        let cleaned = self.cleaner.clean(&raw);
        if cleaned.is_empty() {
            info!(group_id, fetched = raw.len(), "nothing left after cleaning");
            return Ok(PassOutcome::Skipped(SkipReason::NoMessages));
        }

        let key = StateKey::today(group_id);
        let lock = self.locks.for_key(&key);
        let _guard = lock.lock().await;

        let versioned = self
            .store
            .get_or_create(&key)
            .await
            .map_err(EngineError::Store)?;
        let mut state = versioned.state;

        let fresh = retain_unseen(cleaned, state.last_analyzed_message_timestamp);
        if fresh.len() < self.config.min_messages {
            info!(
                group_id,
                new_messages = fresh.len(),
                required = self.config.min_messages,
                "below incremental threshold, skipping pass"
            );
            return Ok(PassOutcome::Skipped(SkipReason::BelowThreshold {
                seen: fresh.len(),
                required: self.config.min_messages,
            }));
        }

        let extraction = self
            .analyzer
            .extract_topics_and_quotes(
                &fresh,
                self.config.topics_per_pass,
                self.config.quotes_per_pass,
            )
            .await
            .map_err(|e| EngineError::Llm(e.to_string()))?;

        let batch = Batch::from_messages(&fresh).with_extraction(
            extraction.topics,
            extraction.quotes,
            extraction.token_usage,
        );

        merge_batch(&mut state, &batch, &self.config.merge_limits());

        let report = PassReport {
            messages_count: batch.messages_count,
            new_topics: batch.new_topics.len(),
            new_quotes: batch.new_quotes.len(),
            total_batch_count: state.total_batch_count,
            watermark: state.last_analyzed_message_timestamp,
        };

        if let Err(e) = self.store.save(&state, versioned.version).await {
            // The merge was computed but could not be persisted; this pass's
            // work is lost until the caller retries from a fresh read.
            error!(key = %key, error = %e, "state save failed after merge, merged batch lost");
            return Err(EngineError::Persist(e));
        }

        info!(
            group_id,
            messages = report.messages_count,
            new_topics = report.new_topics,
            new_quotes = report.new_quotes,
            batches = report.total_batch_count,
            watermark = report.watermark,
            "incremental pass merged and persisted"
        );
        Ok(PassOutcome::Merged(report))
    }

    /// Produces the canonical full-day result from today's accumulated
    /// state: title LLM pass over the top-K users, token-cost update, then
    /// materialize, dispatch and archive.
    #[instrument(skip(self))]
    pub async fn finalize_day(&self, group_id: &str) -> Result<FinalizeOutcome> {
        info!(group_id, "starting day finalization");

        let key = StateKey::today(group_id);
        let lock = self.locks.for_key(&key);
        let _guard = lock.lock().await;

        let Some(versioned) = self.store.get(&key).await.map_err(EngineError::Store)? else {
            warn!(key = %key, "no incremental state for today");
            return Ok(FinalizeOutcome::NoData);
        };
        let mut state = versioned.state;
        if state.total_batch_count == 0 {
            warn!(key = %key, "state exists but no batch was ever merged");
            return Ok(FinalizeOutcome::NoData);
        }

        let top_users = state.user_activity_ranking(
            self.config.max_user_titles,
            self.config.min_ranked_messages,
        );

        let mut user_titles = Vec::new();
        if !top_users.is_empty() {
            match self.analyzer.extract_user_titles(&top_users).await {
                Ok(extraction) => {
                    state.token_usage += extraction.token_usage;
                    self.store
                        .save(&state, versioned.version)
                        .await
                        .map_err(EngineError::Persist)?;
                    user_titles = extraction.titles;
                }
                Err(e) => {
                    // The day's report still goes out, just without titles.
                    warn!(group_id, error = %e, "title extraction failed, finalizing without titles");
                }
            }
        }

        let result = build_analysis_result(&state, user_titles, &self.config.materialize_options());

        self.reports
            .dispatch(group_id, &result)
            .await
            .map_err(|e| EngineError::Dispatch(e.to_string()))?;
        self.history
            .save_analysis(group_id, &result)
            .await
            .map_err(|e| EngineError::History(e.to_string()))?;

        info!(
            group_id,
            messages = state.total_message_count,
            topics = result.topics.len(),
            quotes = result.statistics.golden_quotes.len(),
            titles = result.user_titles.len(),
            batches = state.total_batch_count,
            "day finalized and dispatched"
        );
        Ok(FinalizeOutcome::Completed(result))
    }

    /// Reclaims state older than the configured retention window, along
    /// with the per-key locks that guarded it.
    pub async fn sweep_expired(&self) -> Result<u64> {
        let removed = self
            .store
            .sweep_older_than(self.config.retention_days)
            .await
            .map_err(EngineError::Store)?;

        // Same cutoff rule as the store sweep.
        let cutoff = (Local::now() - Duration::days(self.config.retention_days))
            .format("%Y-%m-%d")
            .to_string();
        self.locks.prune_older_than(&cutoff);

        if removed > 0 {
            info!(removed, "retention sweep removed expired state");
        }
        Ok(removed)
    }
}
