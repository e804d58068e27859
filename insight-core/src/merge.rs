//! The batch merge fold: one pure function that accumulates a [`Batch`]
//! into an [`AggregateState`].

use tracing::debug;

use crate::batch::Batch;
use crate::state::AggregateState;

/// Caps on the accumulated topic and quote lists. Once a list is at cap,
/// further appends evict the oldest entries first, so later passes are
/// preferentially retained.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MergeLimits {
    pub max_topics: usize,
    pub max_quotes: usize,
}

impl Default for MergeLimits {
    fn default() -> Self {
        Self {
            max_topics: 50,
            max_quotes: 50,
        }
    }
}

/// Appends `incoming` to `list`, then evicts from the front until `list` is
/// within `cap`. FIFO: the oldest entries go first.
pub fn push_capped<T>(list: &mut Vec<T>, incoming: Vec<T>, cap: usize) {
    list.extend(incoming);
    if list.len() > cap {
        let excess = list.len() - cap;
        list.drain(..excess);
    }
}

/// Folds one batch into the running state.
///
/// Total and deterministic: no I/O, no failure path, and an empty batch is a
/// no-op apart from incrementing `total_batch_count`. A batch whose
/// `last_message_timestamp` is older than the current watermark still merges
/// its content, but the watermark never moves backward.
pub fn merge_batch(state: &mut AggregateState, batch: &Batch, limits: &MergeLimits) {
    state.total_message_count += batch.messages_count;
    state.total_character_count += batch.characters_count;
    for hour in 0..24 {
        state.hourly_message_counts[hour] += batch.hourly_message_delta[hour];
        state.hourly_character_counts[hour] += batch.hourly_character_delta[hour];
    }

    for (user_id, delta) in &batch.user_deltas {
        let user = state.user_activity.entry(user_id.clone()).or_default();
        if !delta.name.is_empty() {
            user.name = delta.name.clone();
        }
        user.message_count += delta.message_count;
        user.char_count += delta.char_count;
        user.emoji_count += delta.emoji_count;
        user.active_hours.extend(delta.active_hours.iter().copied());
        user.last_message_time = user.last_message_time.max(delta.last_message_time);
    }

    state.emoji_counts.standard += batch.emoji_delta.standard;
    state.emoji_counts.custom += batch.emoji_delta.custom;
    state.emoji_counts.animated += batch.emoji_delta.animated;
    state.emoji_counts.sticker += batch.emoji_delta.sticker;
    state.emoji_counts.other += batch.emoji_delta.other;
    for (id, count) in &batch.emoji_delta.details {
        *state.emoji_counts.details.entry(id.clone()).or_insert(0) += count;
    }

    push_capped(&mut state.topics, batch.new_topics.clone(), limits.max_topics);
    push_capped(
        &mut state.golden_quotes,
        batch.new_quotes.clone(),
        limits.max_quotes,
    );

    state.token_usage += batch.token_usage;

    state
        .all_participant_ids
        .extend(batch.participant_ids.iter().cloned());

    state.last_analyzed_message_timestamp = state
        .last_analyzed_message_timestamp
        .max(batch.last_message_timestamp);

    state.total_batch_count += 1;

    debug!(
        group_id = %state.group_id,
        date_key = %state.date_key,
        batch_messages = batch.messages_count,
        total_messages = state.total_message_count,
        watermark = state.last_analyzed_message_timestamp,
        batches = state.total_batch_count,
        "merged batch into aggregate state"
    );
}
