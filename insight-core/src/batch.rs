//! Batch computation: turning one slice of clean messages into the delta
//! that gets folded into the day's aggregate state.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::message::{CleanMessage, EmojiKind};
use crate::state::EmojiCounts;
use crate::types::{QuoteRecord, TokenUsage, TopicRecord};

/// Per-user delta observed in one batch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserDelta {
    pub name: String,
    pub message_count: u64,
    pub char_count: u64,
    pub emoji_count: u64,
    pub active_hours: BTreeSet<u8>,
    pub last_message_time: i64,
}

/// The computed delta of one incremental analysis pass.
///
/// Pure data: counts and distributions from the message slice, plus the
/// topics/quotes and token cost returned by the LLM pass. An empty batch is
/// valid and merges as a no-op.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Batch {
    pub messages_count: u64,
    pub characters_count: u64,
    pub hourly_message_delta: [u64; 24],
    pub hourly_character_delta: [u64; 24],
    pub user_deltas: BTreeMap<String, UserDelta>,
    pub emoji_delta: EmojiCounts,
    pub new_topics: Vec<TopicRecord>,
    pub new_quotes: Vec<QuoteRecord>,
    pub token_usage: TokenUsage,
    /// Highest message timestamp in this batch; 0 for an empty batch.
    pub last_message_timestamp: i64,
    pub participant_ids: BTreeSet<String>,
}

impl Batch {
    /// Computes the statistical part of a batch from a clean message slice.
    /// Topics, quotes and token cost are attached afterwards via
    /// [`Batch::with_extraction`].
    pub fn from_messages(messages: &[CleanMessage]) -> Self {
        let mut batch = Batch::default();

        for msg in messages {
            let chars = msg.text_len();
            let hour = usize::from(msg.hour.min(23));

            batch.messages_count += 1;
            batch.characters_count += chars;
            batch.hourly_message_delta[hour] += 1;
            batch.hourly_character_delta[hour] += chars;

            let user = batch.user_deltas.entry(msg.sender_id.clone()).or_default();
            if !msg.sender_name.is_empty() {
                user.name = msg.sender_name.clone();
            }
            user.message_count += 1;
            user.char_count += chars;
            user.emoji_count += msg.emojis.len() as u64;
            user.active_hours.insert(msg.hour);
            user.last_message_time = user.last_message_time.max(msg.timestamp);

            for emoji in &msg.emojis {
                match emoji.kind {
                    EmojiKind::Standard => batch.emoji_delta.standard += 1,
                    EmojiKind::Custom => batch.emoji_delta.custom += 1,
                    EmojiKind::Animated => batch.emoji_delta.animated += 1,
                    EmojiKind::Sticker => batch.emoji_delta.sticker += 1,
                    EmojiKind::Other => batch.emoji_delta.other += 1,
                }
                *batch.emoji_delta.details.entry(emoji.id.clone()).or_insert(0) += 1;
            }

            batch.participant_ids.insert(msg.sender_id.clone());
            batch.last_message_timestamp = batch.last_message_timestamp.max(msg.timestamp);
        }

        batch
    }

    /// Attaches the LLM extraction output to the batch.
    pub fn with_extraction(
        mut self,
        topics: Vec<TopicRecord>,
        quotes: Vec<QuoteRecord>,
        token_usage: TokenUsage,
    ) -> Self {
        self.new_topics = topics;
        self.new_quotes = quotes;
        self.token_usage = token_usage;
        self
    }
}

/// Drops messages already covered by the watermark, keeping only those with
/// a timestamp strictly greater than `watermark`.
///
/// Known limitation: two distinct messages sharing the exact same timestamp
/// are included or excluded together. When a batch boundary falls on such a
/// pair, one of them can be counted twice or missed. This imprecision is
/// inherent to timestamp watermarking and is accepted.
pub fn retain_unseen(messages: Vec<CleanMessage>, watermark: i64) -> Vec<CleanMessage> {
    if watermark <= 0 {
        return messages;
    }
    messages
        .into_iter()
        .filter(|msg| msg.timestamp > watermark)
        .collect()
}
