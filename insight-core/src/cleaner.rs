//! Message cleaning: drops bot senders, command messages and technical
//! noise before any statistics or LLM analysis see the slice.

use chrono::{Local, TimeZone};
use tracing::warn;

use crate::message::{CleanMessage, RawMessage};
use std::collections::BTreeSet;

/// Filters raw messages down to the clean slice that analysis consumes.
#[derive(Debug, Clone)]
pub struct MessageCleaner {
    bot_ids: BTreeSet<String>,
    filter_commands: bool,
}

impl MessageCleaner {
    pub fn new(bot_ids: Vec<String>, filter_commands: bool) -> Self {
        Self {
            bot_ids: bot_ids.into_iter().collect(),
            filter_commands,
        }
    }

    /// Cleans a fetched slice. Bot messages are always dropped; command
    /// messages (leading `/`, optionally after a mention) are dropped when
    /// `filter_commands` is set. Mention markup is stripped from the text.
    /// Messages whose timestamp does not map to a valid local time are
    /// skipped with a warning.
    pub fn clean(&self, raw: &[RawMessage]) -> Vec<CleanMessage> {
        let mut cleaned = Vec::with_capacity(raw.len());

        for msg in raw {
            if self.bot_ids.contains(&msg.sender_id) {
                continue;
            }

            let text = strip_mentions(&msg.text);
            if self.filter_commands && is_command(&text) {
                continue;
            }
            if text.is_empty() && msg.emojis.is_empty() {
                continue;
            }

            let hour = match Local.timestamp_opt(msg.timestamp, 0).single() {
                Some(dt) => {
                    use chrono::Timelike;
                    dt.hour() as u8
                }
                None => {
                    warn!(
                        timestamp = msg.timestamp,
                        sender_id = %msg.sender_id,
                        "message has unmappable timestamp, skipping"
                    );
                    continue;
                }
            };

            cleaned.push(CleanMessage {
                sender_id: msg.sender_id.clone(),
                sender_name: msg.sender_name.clone(),
                timestamp: msg.timestamp,
                text,
                hour,
                emojis: msg.emojis.clone(),
            });
        }

        cleaned
    }
}

/// True when the text is a bot command: leading `/`, optionally preceded by
/// a mention like `<@12345>`.
fn is_command(text: &str) -> bool {
    let trimmed = text.trim_start();
    if trimmed.starts_with('/') {
        return true;
    }
    false
}

/// Removes `<@12345>` mention markup and collapses the surrounding whitespace.
fn strip_mentions(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(start) = rest.find("<@") {
        let tail = &rest[start + 2..];
        match tail.find('>') {
            Some(end) if tail[..end].chars().all(|c| c.is_ascii_digit()) && end > 0 => {
                out.push_str(&rest[..start]);
                rest = &tail[end + 1..];
            }
            _ => {
                out.push_str(&rest[..start + 2]);
                rest = tail;
            }
        }
    }
    out.push_str(rest);
    out.trim().to_string()
}
