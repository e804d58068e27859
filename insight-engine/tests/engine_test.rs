//! Integration tests for [`insight_engine::AnalysisEngine`].
//!
//! Collaborators are hand-rolled fakes; the state store is the real SQLite
//! repository on a tempdir file, so the full load-merge-save path runs.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use tempfile::TempDir;

use insight_core::{
    merge_batch, AggregateState, AnalysisResult, Batch, CleanMessage, MergeLimits, QuoteRecord,
    RankedUser, RawMessage, StateKey, TokenUsage, TopicRecord, UserTitle,
};
use insight_engine::{
    AnalysisConfig, AnalysisEngine, EngineError, FinalizeOutcome, HistorySink, LlmAnalyzer,
    MessageSource, PassOutcome, ReportSink, SkipReason, TitleExtraction, TopicExtraction,
};
use insight_storage::{
    StateRepository, StateStore, StorageError, VersionedState, NEW_STATE_VERSION,
};

fn raw(sender: &str, name: &str, ts: i64, text: &str) -> RawMessage {
    RawMessage {
        sender_id: sender.to_string(),
        sender_name: name.to_string(),
        timestamp: ts,
        text: text.to_string(),
        emojis: vec![],
    }
}

fn window_a() -> Vec<RawMessage> {
    vec![
        raw("u1", "Alice", 1000, "morning everyone"),
        raw("u2", "Bob", 1100, "hello hello"),
        raw("u1", "Alice", 1200, "anyone up for lunch"),
        raw("u3", "Cara", 1300, "count me in"),
    ]
}

/// Overlaps window A at timestamps 1200/1300 and adds two new messages.
fn window_b() -> Vec<RawMessage> {
    vec![
        raw("u1", "Alice", 1200, "anyone up for lunch"),
        raw("u3", "Cara", 1300, "count me in"),
        raw("u2", "Bob", 1400, "same"),
        raw("u1", "Alice", 1500, "great, noon it is"),
    ]
}

fn clean(sender: &str, name: &str, ts: i64, hour: u8, text: &str) -> CleanMessage {
    CleanMessage {
        sender_id: sender.to_string(),
        sender_name: name.to_string(),
        timestamp: ts,
        text: text.to_string(),
        hour,
        emojis: vec![],
    }
}

/// Today's state for `group_id` with one batch already merged in.
fn merged_today_state(group_id: &str) -> AggregateState {
    let mut state = AggregateState::new(&StateKey::today(group_id));
    let messages = vec![
        clean("u1", "Alice", 1000, 9, "morning everyone"),
        clean("u1", "Alice", 1100, 9, "anyone up for lunch"),
        clean("u2", "Bob", 1200, 10, "count me in"),
    ];
    merge_batch(
        &mut state,
        &Batch::from_messages(&messages),
        &MergeLimits::default(),
    );
    state
}

/// Serves queued fetch windows; empty once the queue is drained.
struct FakeSource {
    windows: Mutex<VecDeque<Vec<RawMessage>>>,
    fail: bool,
}

impl FakeSource {
    fn with_windows(windows: Vec<Vec<RawMessage>>) -> Self {
        Self {
            windows: Mutex::new(windows.into()),
            fail: false,
        }
    }

    fn failing() -> Self {
        Self {
            windows: Mutex::new(VecDeque::new()),
            fail: true,
        }
    }
}

#[async_trait]
impl MessageSource for FakeSource {
    async fn fetch_messages(
        &self,
        _group_id: &str,
        _days: u32,
        _max_count: usize,
    ) -> Result<Vec<RawMessage>> {
        if self.fail {
            return Err(anyhow!("platform unreachable"));
        }
        Ok(self
            .windows
            .lock()
            .expect("source lock")
            .pop_front()
            .unwrap_or_default())
    }
}

/// Returns one canned topic and quote per pass; titles for every top user.
struct FakeAnalyzer {
    topic_calls: AtomicUsize,
    title_calls: AtomicUsize,
    fail_topics: bool,
    fail_titles: bool,
}

impl FakeAnalyzer {
    fn new() -> Self {
        Self {
            topic_calls: AtomicUsize::new(0),
            title_calls: AtomicUsize::new(0),
            fail_topics: false,
            fail_titles: false,
        }
    }

    fn failing_topics() -> Self {
        Self {
            fail_topics: true,
            ..Self::new()
        }
    }

    fn failing_titles() -> Self {
        Self {
            fail_titles: true,
            ..Self::new()
        }
    }
}

#[async_trait]
impl LlmAnalyzer for FakeAnalyzer {
    async fn extract_topics_and_quotes(
        &self,
        messages: &[CleanMessage],
        _max_topics: usize,
        _max_quotes: usize,
    ) -> Result<TopicExtraction> {
        if self.fail_topics {
            return Err(anyhow!("llm unavailable"));
        }
        let call = self.topic_calls.fetch_add(1, Ordering::SeqCst);
        Ok(TopicExtraction {
            topics: vec![TopicRecord {
                topic: format!("topic-{}", call),
                contributors: vec![messages[0].sender_name.clone()],
                detail: String::new(),
            }],
            quotes: vec![QuoteRecord {
                content: messages[0].text.clone(),
                sender: messages[0].sender_name.clone(),
                reason: String::new(),
                user_id: messages[0].sender_id.clone(),
            }],
            token_usage: TokenUsage {
                prompt_tokens: 10,
                completion_tokens: 5,
                total_tokens: 15,
            },
        })
    }

    async fn extract_user_titles(&self, top_users: &[RankedUser]) -> Result<TitleExtraction> {
        if self.fail_titles {
            return Err(anyhow!("llm unavailable"));
        }
        self.title_calls.fetch_add(1, Ordering::SeqCst);
        Ok(TitleExtraction {
            titles: top_users
                .iter()
                .map(|u| UserTitle {
                    user_id: u.user_id.clone(),
                    name: u.name.clone(),
                    title: "Chatterbox".to_string(),
                    reason: format!("{} messages", u.message_count),
                })
                .collect(),
            token_usage: TokenUsage {
                prompt_tokens: 20,
                completion_tokens: 10,
                total_tokens: 30,
            },
        })
    }
}

/// Records everything dispatched and archived.
#[derive(Default)]
struct CollectSink {
    dispatched: Mutex<Vec<AnalysisResult>>,
    archived: Mutex<Vec<AnalysisResult>>,
}

#[async_trait]
impl ReportSink for CollectSink {
    async fn dispatch(&self, _group_id: &str, result: &AnalysisResult) -> Result<()> {
        self.dispatched.lock().expect("sink lock").push(result.clone());
        Ok(())
    }
}

#[async_trait]
impl HistorySink for CollectSink {
    async fn save_analysis(&self, _group_id: &str, result: &AnalysisResult) -> Result<()> {
        self.archived.lock().expect("sink lock").push(result.clone());
        Ok(())
    }
}

/// Store stub that serves one fixed state and rejects every save as stale,
/// as if another writer always got there first.
struct RejectingStore {
    state: Option<AggregateState>,
}

#[async_trait]
impl StateStore for RejectingStore {
    async fn get(&self, _key: &StateKey) -> Result<Option<VersionedState>, StorageError> {
        Ok(self
            .state
            .clone()
            .map(|state| VersionedState { state, version: 1 }))
    }

    async fn get_or_create(&self, key: &StateKey) -> Result<VersionedState, StorageError> {
        Ok(self.get(key).await?.unwrap_or_else(|| VersionedState {
            state: AggregateState::new(key),
            version: NEW_STATE_VERSION,
        }))
    }

    async fn save(&self, state: &AggregateState, version: i64) -> Result<i64, StorageError> {
        Err(StorageError::StaleState {
            key: state.key().to_string(),
            expected: version,
        })
    }

    async fn sweep_older_than(&self, _keep_days: i64) -> Result<u64, StorageError> {
        Ok(0)
    }
}

fn test_config() -> AnalysisConfig {
    AnalysisConfig {
        min_messages: 2,
        min_ranked_messages: 0,
        ..AnalysisConfig::default()
    }
}

struct Harness {
    engine: AnalysisEngine,
    store: Arc<StateRepository>,
    analyzer: Arc<FakeAnalyzer>,
    sink: Arc<CollectSink>,
    _dir: TempDir,
}

async fn harness(source: FakeSource, analyzer: FakeAnalyzer) -> Harness {
    let dir = TempDir::new().expect("tempdir");
    let path = dir.path().join("insight.db");
    let store = Arc::new(
        StateRepository::new(path.to_str().expect("utf-8 path"))
            .await
            .expect("repository"),
    );
    let analyzer = Arc::new(analyzer);
    let sink = Arc::new(CollectSink::default());
    let engine = AnalysisEngine::new(
        test_config(),
        Arc::new(source),
        analyzer.clone(),
        sink.clone(),
        sink.clone(),
        store.clone(),
    );
    Harness {
        engine,
        store,
        analyzer,
        sink,
        _dir: dir,
    }
}

/// **Test: a pass merges, persists and reports its batch.**
#[tokio::test]
async fn test_incremental_pass_merges_and_persists() {
    let h = harness(
        FakeSource::with_windows(vec![window_a()]),
        FakeAnalyzer::new(),
    )
    .await;

    let outcome = h.engine.run_incremental_pass("g1").await.expect("pass");
    let PassOutcome::Merged(report) = outcome else {
        panic!("expected merged outcome, got {:?}", outcome);
    };
    assert_eq!(report.messages_count, 4);
    assert_eq!(report.new_topics, 1);
    assert_eq!(report.total_batch_count, 1);
    assert_eq!(report.watermark, 1300);

    let stored = h
        .store
        .get(&StateKey::today("g1"))
        .await
        .expect("get")
        .expect("persisted");
    assert_eq!(stored.version, 1);
    assert_eq!(stored.state.total_message_count, 4);
    assert_eq!(stored.state.all_participant_ids.len(), 3);
    assert_eq!(stored.state.last_analyzed_message_timestamp, 1300);
    assert_eq!(stored.state.token_usage.total_tokens, 15);
}

/// **Test: re-fetching an already-analyzed window is a successful no-op.**
#[tokio::test]
async fn test_repeat_window_skips_below_threshold() {
    let h = harness(
        FakeSource::with_windows(vec![window_a(), window_a()]),
        FakeAnalyzer::new(),
    )
    .await;

    h.engine.run_incremental_pass("g1").await.expect("first");
    let outcome = h.engine.run_incremental_pass("g1").await.expect("second");

    assert_eq!(
        outcome,
        PassOutcome::Skipped(SkipReason::BelowThreshold {
            seen: 0,
            required: 2
        })
    );

    // State untouched by the skipped pass.
    let stored = h
        .store
        .get(&StateKey::today("g1"))
        .await
        .expect("get")
        .expect("persisted");
    assert_eq!(stored.version, 1);
    assert_eq!(stored.state.total_batch_count, 1);
    assert_eq!(h.analyzer.topic_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_empty_fetch_skips_without_state() {
    let h = harness(FakeSource::with_windows(vec![]), FakeAnalyzer::new()).await;

    let outcome = h.engine.run_incremental_pass("g1").await.expect("pass");
    assert_eq!(outcome, PassOutcome::Skipped(SkipReason::NoMessages));
    assert!(h
        .store
        .get(&StateKey::today("g1"))
        .await
        .expect("get")
        .is_none());
}

/// **Test: overlapping fetch windows count each distinct message once.**
#[tokio::test]
async fn test_overlapping_windows_do_not_double_count() {
    let h = harness(
        FakeSource::with_windows(vec![window_a(), window_b()]),
        FakeAnalyzer::new(),
    )
    .await;

    h.engine.run_incremental_pass("g1").await.expect("first");
    let outcome = h.engine.run_incremental_pass("g1").await.expect("second");
    let PassOutcome::Merged(report) = outcome else {
        panic!("expected merged outcome, got {:?}", outcome);
    };
    assert_eq!(report.messages_count, 2);

    let stored = h
        .store
        .get(&StateKey::today("g1"))
        .await
        .expect("get")
        .expect("persisted");
    // Six distinct timestamps across both windows.
    assert_eq!(stored.state.total_message_count, 6);
    assert_eq!(stored.state.last_analyzed_message_timestamp, 1500);
    assert_eq!(stored.state.total_batch_count, 2);
}

/// **Test: an LLM failure fails the pass and leaves state unchanged.**
#[tokio::test]
async fn test_llm_failure_leaves_state_unchanged() {
    let h = harness(
        FakeSource::with_windows(vec![window_a()]),
        FakeAnalyzer::failing_topics(),
    )
    .await;

    let err = h
        .engine
        .run_incremental_pass("g1")
        .await
        .expect_err("pass must fail");
    assert!(matches!(err, EngineError::Llm(_)));
    assert!(h
        .store
        .get(&StateKey::today("g1"))
        .await
        .expect("get")
        .is_none());
}

fn engine_on_store(
    source: FakeSource,
    analyzer: FakeAnalyzer,
    store: Arc<dyn StateStore>,
) -> (AnalysisEngine, Arc<CollectSink>) {
    let sink = Arc::new(CollectSink::default());
    let engine = AnalysisEngine::new(
        test_config(),
        Arc::new(source),
        Arc::new(analyzer),
        sink.clone(),
        sink.clone(),
        store,
    );
    (engine, sink)
}

/// **Test: a save rejection after a successful merge is a persist error,
/// distinct from a load-side store error.**
#[tokio::test]
async fn test_save_failure_after_merge_is_persist_error() {
    let (engine, _sink) = engine_on_store(
        FakeSource::with_windows(vec![window_a()]),
        FakeAnalyzer::new(),
        Arc::new(RejectingStore { state: None }),
    );

    let err = engine
        .run_incremental_pass("g1")
        .await
        .expect_err("pass must fail");
    assert!(matches!(
        err,
        EngineError::Persist(StorageError::StaleState { .. })
    ));
}

/// **Test: a stale title-cost save fails finalization before any dispatch.**
#[tokio::test]
async fn test_finalize_title_save_failure_is_persist_error() {
    let (engine, sink) = engine_on_store(
        FakeSource::with_windows(vec![]),
        FakeAnalyzer::new(),
        Arc::new(RejectingStore {
            state: Some(merged_today_state("g1")),
        }),
    );

    let err = engine.finalize_day("g1").await.expect_err("finalize must fail");
    assert!(matches!(
        err,
        EngineError::Persist(StorageError::StaleState { .. })
    ));
    assert!(sink.dispatched.lock().expect("sink lock").is_empty());
    assert!(sink.archived.lock().expect("sink lock").is_empty());
}

#[tokio::test]
async fn test_fetch_failure_surfaces() {
    let h = harness(FakeSource::failing(), FakeAnalyzer::new()).await;
    let err = h
        .engine
        .run_incremental_pass("g1")
        .await
        .expect_err("pass must fail");
    assert!(matches!(err, EngineError::Fetch(_)));
}

/// **Test: concurrent passes for the same key serialize; no lost update.**
#[tokio::test]
async fn test_concurrent_passes_serialize() {
    let h = harness(
        FakeSource::with_windows(vec![window_a(), window_a()]),
        FakeAnalyzer::new(),
    )
    .await;
    let engine = Arc::new(h.engine);

    let a = tokio::spawn({
        let engine = engine.clone();
        async move { engine.run_incremental_pass("g1").await }
    });
    let b = tokio::spawn({
        let engine = engine.clone();
        async move { engine.run_incremental_pass("g1").await }
    });
    let outcome_a = a.await.expect("join").expect("pass a");
    let outcome_b = b.await.expect("join").expect("pass b");

    let merged = [&outcome_a, &outcome_b]
        .iter()
        .filter(|o| matches!(o, PassOutcome::Merged(_)))
        .count();
    assert_eq!(merged, 1, "exactly one pass merges the shared window");

    let stored = h
        .store
        .get(&StateKey::today("g1"))
        .await
        .expect("get")
        .expect("persisted");
    assert_eq!(stored.state.total_message_count, 4);
    assert_eq!(stored.state.total_batch_count, 1);
}

#[tokio::test]
async fn test_finalize_without_data() {
    let h = harness(FakeSource::with_windows(vec![]), FakeAnalyzer::new()).await;
    let outcome = h.engine.finalize_day("g1").await.expect("finalize");
    assert_eq!(outcome, FinalizeOutcome::NoData);
    assert!(h.sink.dispatched.lock().expect("sink lock").is_empty());
}

/// **Test: finalization runs the title pass, folds its token cost into the
/// persisted state and dispatches the canonical result.**
#[tokio::test]
async fn test_finalize_completes_and_dispatches() {
    let h = harness(
        FakeSource::with_windows(vec![window_a()]),
        FakeAnalyzer::new(),
    )
    .await;
    h.engine.run_incremental_pass("g1").await.expect("pass");

    let outcome = h.engine.finalize_day("g1").await.expect("finalize");
    let FinalizeOutcome::Completed(result) = outcome else {
        panic!("expected completed outcome, got {:?}", outcome);
    };

    assert_eq!(result.statistics.message_count, 4);
    assert_eq!(result.topics.len(), 1);
    assert_eq!(result.statistics.golden_quotes.len(), 1);
    assert_eq!(result.user_titles.len(), 3);
    // 15 tokens from the incremental pass + 30 from the title pass.
    assert_eq!(result.statistics.token_usage.total_tokens, 45);
    assert_eq!(h.analyzer.title_calls.load(Ordering::SeqCst), 1);

    // Title token cost was persisted before materialization.
    let stored = h
        .store
        .get(&StateKey::today("g1"))
        .await
        .expect("get")
        .expect("persisted");
    assert_eq!(stored.version, 2);
    assert_eq!(stored.state.token_usage.total_tokens, 45);

    let dispatched = h.sink.dispatched.lock().expect("sink lock");
    let archived = h.sink.archived.lock().expect("sink lock");
    assert_eq!(dispatched.len(), 1);
    assert_eq!(archived.len(), 1);
    assert_eq!(dispatched[0].statistics.message_count, 4);
}

/// **Test: a failed title pass still finalizes, without titles.**
#[tokio::test]
async fn test_finalize_survives_title_failure() {
    let h = harness(
        FakeSource::with_windows(vec![window_a()]),
        FakeAnalyzer::failing_titles(),
    )
    .await;
    h.engine.run_incremental_pass("g1").await.expect("pass");

    let outcome = h.engine.finalize_day("g1").await.expect("finalize");
    let FinalizeOutcome::Completed(result) = outcome else {
        panic!("expected completed outcome, got {:?}", outcome);
    };
    assert!(result.user_titles.is_empty());
    assert_eq!(result.statistics.token_usage.total_tokens, 15);
    assert_eq!(h.sink.dispatched.lock().expect("sink lock").len(), 1);
}

#[tokio::test]
async fn test_sweep_expired_runs() {
    let h = harness(FakeSource::with_windows(vec![]), FakeAnalyzer::new()).await;
    let removed = h.engine.sweep_expired().await.expect("sweep");
    assert_eq!(removed, 0);
}
