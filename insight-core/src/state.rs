//! The per-(group, day) aggregate state that incremental batches fold into.

use chrono::Local;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::types::{QuoteRecord, RankedUser, TokenUsage, TopicRecord};

/// Persistence key: one state row per group per calendar day.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StateKey {
    pub group_id: String,
    /// Calendar day in the consuming timezone, `%Y-%m-%d`.
    pub date_key: String,
}

impl StateKey {
    pub fn new(group_id: impl Into<String>, date_key: impl Into<String>) -> Self {
        Self {
            group_id: group_id.into(),
            date_key: date_key.into(),
        }
    }

    /// Key for today's state in the local timezone.
    pub fn today(group_id: impl Into<String>) -> Self {
        Self::new(group_id, Local::now().format("%Y-%m-%d").to_string())
    }
}

impl std::fmt::Display for StateKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}@{}", self.group_id, self.date_key)
    }
}

/// Running per-user activity inside an [`AggregateState`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserAggregate {
    pub name: String,
    pub message_count: u64,
    pub char_count: u64,
    pub emoji_count: u64,
    /// Hours-of-day (0-23) in which the user posted at least once.
    pub active_hours: BTreeSet<u8>,
    /// Unix epoch seconds of the user's most recent message.
    pub last_message_time: i64,
}

/// Emoji counters by category plus a per-id breakdown.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmojiCounts {
    pub standard: u64,
    pub custom: u64,
    pub animated: u64,
    pub sticker: u64,
    pub other: u64,
    pub details: BTreeMap<String, u64>,
}

impl EmojiCounts {
    pub fn total(&self) -> u64 {
        self.standard + self.custom + self.animated + self.sticker + self.other
    }
}

/// The accumulator for one group and one calendar day.
///
/// Mutated only by [`crate::merge_batch`]; read by the materializer at
/// finalization. `last_analyzed_message_timestamp` is the dedup watermark:
/// the highest message timestamp already folded in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregateState {
    pub group_id: String,
    pub date_key: String,
    pub total_message_count: u64,
    pub total_character_count: u64,
    pub hourly_message_counts: [u64; 24],
    pub hourly_character_counts: [u64; 24],
    pub user_activity: BTreeMap<String, UserAggregate>,
    pub emoji_counts: EmojiCounts,
    pub topics: Vec<TopicRecord>,
    pub golden_quotes: Vec<QuoteRecord>,
    pub token_usage: TokenUsage,
    pub all_participant_ids: BTreeSet<String>,
    /// Monotonically non-decreasing across merges.
    pub last_analyzed_message_timestamp: i64,
    /// Number of merge operations applied so far.
    pub total_batch_count: u64,
}

impl AggregateState {
    /// A freshly zeroed state; watermark starts at 0.
    pub fn new(key: &StateKey) -> Self {
        Self {
            group_id: key.group_id.clone(),
            date_key: key.date_key.clone(),
            total_message_count: 0,
            total_character_count: 0,
            hourly_message_counts: [0; 24],
            hourly_character_counts: [0; 24],
            user_activity: BTreeMap::new(),
            emoji_counts: EmojiCounts::default(),
            topics: Vec::new(),
            golden_quotes: Vec::new(),
            token_usage: TokenUsage::default(),
            all_participant_ids: BTreeSet::new(),
            last_analyzed_message_timestamp: 0,
            total_batch_count: 0,
        }
    }

    pub fn key(&self) -> StateKey {
        StateKey::new(self.group_id.clone(), self.date_key.clone())
    }

    /// The `n` busiest hours by message count, busiest first. Hours with no
    /// traffic are excluded.
    pub fn peak_hours(&self, n: usize) -> Vec<u8> {
        let mut hours: Vec<(u8, u64)> = self
            .hourly_message_counts
            .iter()
            .enumerate()
            .filter(|(_, &count)| count > 0)
            .map(|(hour, &count)| (hour as u8, count))
            .collect();
        hours.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
        hours.into_iter().take(n).map(|(hour, _)| hour).collect()
    }

    /// Human-readable label for the period containing the single peak hour.
    pub fn most_active_period(&self) -> &'static str {
        let Some(peak) = self.peak_hours(1).first().copied() else {
            return "unknown";
        };
        match peak {
            6..=11 => "morning (6:00-12:00)",
            12..=17 => "afternoon (12:00-18:00)",
            18..=23 => "evening (18:00-24:00)",
            _ => "night (0:00-6:00)",
        }
    }

    /// Users ranked by message count descending, at most `limit` entries,
    /// excluding users with fewer than `min_messages` messages. Ties break
    /// on user id for a stable order.
    pub fn user_activity_ranking(&self, limit: usize, min_messages: u64) -> Vec<RankedUser> {
        let mut ranked: Vec<RankedUser> = self
            .user_activity
            .iter()
            .filter(|(_, u)| u.message_count >= min_messages)
            .map(|(id, u)| RankedUser {
                user_id: id.clone(),
                name: u.name.clone(),
                message_count: u.message_count,
                char_count: u.char_count,
                emoji_count: u.emoji_count,
            })
            .collect();
        ranked.sort_by(|a, b| {
            b.message_count
                .cmp(&a.message_count)
                .then_with(|| a.user_id.cmp(&b.user_id))
        });
        ranked.truncate(limit);
        ranked
    }
}
