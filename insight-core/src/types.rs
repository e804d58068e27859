//! Shared value types used across the analysis crates.

use serde::{Deserialize, Serialize};
use std::ops::{Add, AddAssign};

/// Token consumption of one or more LLM calls.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub total_tokens: u64,
}

impl Add for TokenUsage {
    type Output = TokenUsage;

    fn add(self, other: TokenUsage) -> TokenUsage {
        TokenUsage {
            prompt_tokens: self.prompt_tokens + other.prompt_tokens,
            completion_tokens: self.completion_tokens + other.completion_tokens,
            total_tokens: self.total_tokens + other.total_tokens,
        }
    }
}

impl AddAssign for TokenUsage {
    fn add_assign(&mut self, other: TokenUsage) {
        *self = *self + other;
    }
}

/// One discussion topic extracted by an LLM pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopicRecord {
    pub topic: String,
    pub contributors: Vec<String>,
    pub detail: String,
}

/// One notable quote extracted by an LLM pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuoteRecord {
    pub content: String,
    pub sender: String,
    pub reason: String,
    pub user_id: String,
}

/// A title/badge assigned to a user at finalization time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserTitle {
    pub user_id: String,
    pub name: String,
    pub title: String,
    pub reason: String,
}

/// One row of the user-activity ranking, sorted by message count descending.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RankedUser {
    pub user_id: String,
    pub name: String,
    pub message_count: u64,
    pub char_count: u64,
    pub emoji_count: u64,
}
