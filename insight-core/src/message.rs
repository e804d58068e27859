//! Message types exchanged with the message-source collaborator.
//!
//! `RawMessage` is what an adapter hands over after fetching; `CleanMessage`
//! is what the cleaner produces and every downstream computation consumes.

use serde::{Deserialize, Serialize};

/// Emoji category, platform-agnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EmojiKind {
    Standard,
    Custom,
    Animated,
    Sticker,
    Other,
}

/// One emoji occurrence inside a message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmojiEvent {
    pub kind: EmojiKind,
    /// Platform emoji id or the unicode character itself.
    pub id: String,
}

/// A message as fetched from a chat platform, before cleaning.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawMessage {
    pub sender_id: String,
    pub sender_name: String,
    /// Unix epoch seconds.
    pub timestamp: i64,
    pub text: String,
    pub emojis: Vec<EmojiEvent>,
}

/// A message that survived cleaning. Hour-of-day is precomputed so the
/// merge pipeline never touches the clock again.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CleanMessage {
    pub sender_id: String,
    pub sender_name: String,
    /// Unix epoch seconds.
    pub timestamp: i64,
    pub text: String,
    /// Hour-of-day 0-23, in the consuming timezone.
    pub hour: u8,
    pub emojis: Vec<EmojiEvent>,
}

impl CleanMessage {
    /// Character count of the text body.
    pub fn text_len(&self) -> u64 {
        self.text.chars().count() as u64
    }

    pub fn has_emoji(&self) -> bool {
        !self.emojis.is_empty()
    }
}
