//! Engine configuration: defaults + environment overrides.

use std::env;

use insight_core::{MaterializeOptions, MergeLimits};

/// Tunables for the incremental analysis engine.
#[derive(Debug, Clone)]
pub struct AnalysisConfig {
    /// Fetch window handed to the message source, in days.
    pub fetch_days: u32,
    /// Maximum messages fetched per incremental pass.
    pub max_messages: usize,
    /// Minimum new (post-watermark) messages for a pass to proceed.
    pub min_messages: usize,
    /// Topics requested from the LLM per pass.
    pub topics_per_pass: usize,
    /// Quotes requested from the LLM per pass.
    pub quotes_per_pass: usize,
    /// Cap on accumulated topics; oldest evicted beyond this.
    pub max_topics: usize,
    /// Cap on accumulated golden quotes.
    pub max_quotes: usize,
    /// Top-K ranked users handed to the title pass at finalization.
    pub max_user_titles: usize,
    /// Minimum messages for a user to appear in the title ranking.
    pub min_ranked_messages: u64,
    /// Entries in the materialized user-activity ranking.
    pub ranking_limit: usize,
    /// State rows older than this many days are swept.
    pub retention_days: i64,
    /// Bot sender ids excluded by the cleaner.
    pub bot_ids: Vec<String>,
    /// Drop command-prefixed messages before analysis.
    pub filter_commands: bool,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            fetch_days: 1,
            max_messages: 300,
            min_messages: 10,
            topics_per_pass: 3,
            quotes_per_pass: 2,
            max_topics: 50,
            max_quotes: 50,
            max_user_titles: 10,
            min_ranked_messages: 5,
            ranking_limit: 10,
            retention_days: 7,
            bot_ids: Vec::new(),
            filter_commands: true,
        }
    }
}

impl AnalysisConfig {
    /// Loads overrides from environment variables; anything unset keeps its
    /// default. `INSIGHT_BOT_IDS` is a comma-separated list.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            fetch_days: env_parse("INSIGHT_FETCH_DAYS", defaults.fetch_days),
            max_messages: env_parse("INSIGHT_MAX_MESSAGES", defaults.max_messages),
            min_messages: env_parse("INSIGHT_MIN_MESSAGES", defaults.min_messages),
            topics_per_pass: env_parse("INSIGHT_TOPICS_PER_PASS", defaults.topics_per_pass),
            quotes_per_pass: env_parse("INSIGHT_QUOTES_PER_PASS", defaults.quotes_per_pass),
            max_topics: env_parse("INSIGHT_MAX_TOPICS", defaults.max_topics),
            max_quotes: env_parse("INSIGHT_MAX_QUOTES", defaults.max_quotes),
            max_user_titles: env_parse("INSIGHT_MAX_USER_TITLES", defaults.max_user_titles),
            min_ranked_messages: env_parse(
                "INSIGHT_MIN_RANKED_MESSAGES",
                defaults.min_ranked_messages,
            ),
            ranking_limit: env_parse("INSIGHT_RANKING_LIMIT", defaults.ranking_limit),
            retention_days: env_parse("INSIGHT_RETENTION_DAYS", defaults.retention_days),
            bot_ids: env::var("INSIGHT_BOT_IDS")
                .map(|s| {
                    s.split(',')
                        .map(str::trim)
                        .filter(|s| !s.is_empty())
                        .map(str::to_string)
                        .collect()
                })
                .unwrap_or(defaults.bot_ids),
            filter_commands: env_parse("INSIGHT_FILTER_COMMANDS", defaults.filter_commands),
        }
    }

    pub fn merge_limits(&self) -> MergeLimits {
        MergeLimits {
            max_topics: self.max_topics,
            max_quotes: self.max_quotes,
        }
    }

    pub fn materialize_options(&self) -> MaterializeOptions {
        MaterializeOptions {
            ranking_limit: self.ranking_limit,
            ..MaterializeOptions::default()
        }
    }
}

fn env_parse<T: std::str::FromStr>(name: &str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}
