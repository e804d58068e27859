//! Result materialization: converts a day's accumulated state into the
//! same [`AnalysisResult`] shape a one-shot full-day analysis produces.

use std::collections::BTreeMap;

use tracing::debug;

use crate::state::AggregateState;
use crate::statistics::{ActivityVisualization, AnalysisResult, GroupStatistics};
use crate::types::UserTitle;

/// Knobs for materialization, sourced from engine configuration.
#[derive(Debug, Clone, Copy)]
pub struct MaterializeOptions {
    /// Maximum entries in the user-activity ranking.
    pub ranking_limit: usize,
    /// Peak hours to report.
    pub peak_hour_count: usize,
}

impl Default for MaterializeOptions {
    fn default() -> Self {
        Self {
            ranking_limit: 10,
            peak_hour_count: 3,
        }
    }
}

/// Builds the statistics object from accumulated state. Golden quotes are
/// spliced in by [`build_analysis_result`], mirroring the one-shot flow
/// where the LLM pass backfills them.
pub fn build_final_statistics(
    state: &AggregateState,
    options: &MaterializeOptions,
) -> GroupStatistics {
    let mut daily_activity = BTreeMap::new();
    daily_activity.insert(state.date_key.clone(), state.total_message_count);

    GroupStatistics {
        message_count: state.total_message_count,
        total_characters: state.total_character_count,
        participant_count: state.all_participant_ids.len() as u64,
        most_active_period: state.most_active_period().to_string(),
        emoji_statistics: state.emoji_counts.clone(),
        activity: ActivityVisualization {
            hourly_activity: state.hourly_message_counts,
            daily_activity,
            user_activity_ranking: state.user_activity_ranking(options.ranking_limit, 0),
            peak_hours: state.peak_hours(options.peak_hour_count),
        },
        token_usage: state.token_usage,
        golden_quotes: Vec::new(),
    }
}

/// Builds the complete analysis result from accumulated state. `user_titles`
/// comes from the finalization-time LLM pass and is spliced in unchanged.
pub fn build_analysis_result(
    state: &AggregateState,
    user_titles: Vec<UserTitle>,
    options: &MaterializeOptions,
) -> AnalysisResult {
    let mut statistics = build_final_statistics(state, options);
    statistics.golden_quotes = state.golden_quotes.clone();

    debug!(
        group_id = %state.group_id,
        date_key = %state.date_key,
        messages = state.total_message_count,
        topics = state.topics.len(),
        quotes = state.golden_quotes.len(),
        titles = user_titles.len(),
        batches = state.total_batch_count,
        "materialized analysis result from aggregate state"
    );

    AnalysisResult {
        statistics,
        topics: state.topics.clone(),
        user_titles,
        user_analysis: state.user_activity.clone(),
    }
}
