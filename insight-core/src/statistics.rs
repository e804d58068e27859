//! The canonical statistics shapes handed to reporting, plus a one-shot
//! calculator over a full message set.
//!
//! The materializer in [`crate::materialize`] produces exactly these shapes
//! from accumulated state, so reporting code cannot tell the two analysis
//! modes apart.

use chrono::{Local, TimeZone};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::batch::Batch;
use crate::message::CleanMessage;
use crate::state::{AggregateState, EmojiCounts, StateKey, UserAggregate};
use crate::types::{QuoteRecord, RankedUser, TokenUsage, TopicRecord, UserTitle};

/// Activity patterns for visualization: hourly histogram, per-day counts,
/// ranked users, peak hours.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ActivityVisualization {
    pub hourly_activity: [u64; 24],
    pub daily_activity: BTreeMap<String, u64>,
    pub user_activity_ranking: Vec<RankedUser>,
    pub peak_hours: Vec<u8>,
}

/// Comprehensive group-level statistics for one analyzed day.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GroupStatistics {
    pub message_count: u64,
    pub total_characters: u64,
    pub participant_count: u64,
    pub most_active_period: String,
    pub emoji_statistics: EmojiCounts,
    pub activity: ActivityVisualization,
    pub token_usage: TokenUsage,
    pub golden_quotes: Vec<QuoteRecord>,
}

/// The full analysis result handed to the reporting and history sinks.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub statistics: GroupStatistics,
    pub topics: Vec<TopicRecord>,
    pub user_titles: Vec<UserTitle>,
    pub user_analysis: BTreeMap<String, UserAggregate>,
}

/// One-shot statistics over a complete message set, as a single end-of-day
/// batch analysis would compute them.
///
/// Implemented as a fold of one all-encompassing batch into a fresh state,
/// so incremental and one-shot results come from the same arithmetic.
pub fn calculate_group_statistics(
    messages: &[CleanMessage],
    token_usage: TokenUsage,
    ranking_limit: usize,
) -> GroupStatistics {
    let key = StateKey::new("", "");
    let mut state = AggregateState::new(&key);
    let batch = Batch::from_messages(messages).with_extraction(vec![], vec![], token_usage);
    crate::merge::merge_batch(&mut state, &batch, &crate::merge::MergeLimits::default());

    // Per-day counts keyed by each message's local calendar date; for a
    // single-day set this is one entry matching the state's date key.
    let mut daily_activity: BTreeMap<String, u64> = BTreeMap::new();
    for message in messages {
        if let Some(moment) = Local.timestamp_opt(message.timestamp, 0).single() {
            *daily_activity
                .entry(moment.format("%Y-%m-%d").to_string())
                .or_insert(0) += 1;
        }
    }

    GroupStatistics {
        message_count: state.total_message_count,
        total_characters: state.total_character_count,
        participant_count: state.all_participant_ids.len() as u64,
        most_active_period: state.most_active_period().to_string(),
        emoji_statistics: state.emoji_counts.clone(),
        activity: ActivityVisualization {
            hourly_activity: state.hourly_message_counts,
            daily_activity,
            user_activity_ranking: state.user_activity_ranking(ranking_limit, 0),
            peak_hours: state.peak_hours(3),
        },
        token_usage: state.token_usage,
        golden_quotes: Vec::new(),
    }
}
