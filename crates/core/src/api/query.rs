//! Key-addressed cache for task-instance fetches.
//!
//! Fetches run on spawned tokio tasks and report back over a channel; the
//! owner drains completions with [`TaskInstanceQuery::poll`] from its event
//! loop (or awaits them with [`TaskInstanceQuery::settle`]).

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::mpsc;
use tracing::debug;

use super::{TaskInstanceSource, TaskInstancesResult, map_response, ti_data_path};
use crate::error::CoreResult;
use crate::filters::FetchFilters;

struct Completed {
    key: String,
    result: CoreResult<TaskInstancesResult>,
}

/// Number of keys kept in the cache.
pub const CACHE_CAPACITY: usize = 32;

#[derive(Debug, Default)]
struct Entry {
    data: Option<Arc<TaskInstancesResult>>,
    error: Option<String>,
    last_used: u64,
}

/// Snapshot of the current key's fetch state.
#[derive(Debug, Clone, Default)]
pub struct QueryState {
    /// No data to show yet for any key.
    pub is_loading: bool,
    /// A request for the current key is in flight.
    pub is_fetching: bool,
    /// `data` belongs to an earlier key while the current one loads.
    pub is_previous_data: bool,
    pub data: Option<Arc<TaskInstancesResult>>,
    pub error: Option<String>,
}

impl QueryState {
    /// Whether the last request for the current key failed.
    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}

/// Fixed-interval refetch of the current key.
#[derive(Debug, Clone, Copy)]
pub struct AutoRefresh {
    interval: Duration,
    last: Instant,
}

impl AutoRefresh {
    pub fn new(interval: Duration, now: Instant) -> Self {
        Self {
            interval,
            last: now,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// True once per elapsed interval.
    pub fn due(&mut self, now: Instant) -> bool {
        if now.duration_since(self.last) >= self.interval {
            self.last = now;
            true
        } else {
            false
        }
    }
}

/// Caches task-instance results per query key.
///
/// One request per distinct key is in flight at a time. Results land in
/// their own key's entry, so a late answer for an old key never shows up
/// as the current key's data. At most [`CACHE_CAPACITY`] keys are kept;
/// the least recently used key that is neither current nor in flight goes
/// first.
pub struct TaskInstanceQuery<S> {
    source: Arc<S>,
    current_key: Option<String>,
    entries: HashMap<String, Entry>,
    in_flight: HashSet<String>,
    previous: Option<Arc<TaskInstancesResult>>,
    clock: u64,
    auto_refresh: Option<AutoRefresh>,
    tx: mpsc::UnboundedSender<Completed>,
    rx: mpsc::UnboundedReceiver<Completed>,
}

impl<S: TaskInstanceSource + 'static> TaskInstanceQuery<S> {
    pub fn new(source: Arc<S>) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            source,
            current_key: None,
            entries: HashMap::new(),
            in_flight: HashSet::new(),
            previous: None,
            clock: 0,
            auto_refresh: None,
            tx,
            rx,
        }
    }

    /// Refetch the current key every `interval`. Off unless called.
    pub fn with_auto_refresh(mut self, interval: Duration) -> Self {
        self.auto_refresh = Some(AutoRefresh::new(interval, Instant::now()));
        self
    }

    pub fn current_key(&self) -> Option<&str> {
        self.current_key.as_deref()
    }

    /// Point the query at the key for `filters`.
    pub fn set_filters(&mut self, filters: &FetchFilters) -> bool {
        self.set_key(ti_data_path(filters))
    }

    /// Point the query at `key`, fetching it unless cached or in flight.
    /// Keys whose last request failed are fetched again.
    ///
    /// Returns true when a request was started.
    pub fn set_key(&mut self, key: String) -> bool {
        if self.current_key.as_deref() != Some(key.as_str()) {
            debug!(key = %key, "Query key changed");
            self.current_key = Some(key.clone());
        }
        self.clock += 1;
        if let Some(entry) = self.entries.get_mut(&key)
            && let Some(data) = &entry.data
        {
            debug!(key = %key, "Query cache hit");
            self.previous = Some(Arc::clone(data));
            entry.last_used = self.clock;
            return false;
        }
        self.spawn_fetch(key)
    }

    /// Fetch the current key again, keeping what is cached until it answers.
    pub fn refetch(&mut self) -> bool {
        match self.current_key.clone() {
            Some(key) => self.spawn_fetch(key),
            None => false,
        }
    }

    fn spawn_fetch(&mut self, key: String) -> bool {
        if !self.in_flight.insert(key.clone()) {
            debug!(key = %key, "Request already in flight");
            return false;
        }
        debug!(key = %key, "Spawning fetch");

        let source = Arc::clone(&self.source);
        let tx = self.tx.clone();
        tokio::spawn(async move {
            let result = source.fetch_task_instances(&key).await.map(map_response);
            // The receiver only goes away with the query itself.
            let _ = tx.send(Completed { key, result });
        });
        true
    }

    fn apply(&mut self, completed: Completed) {
        let Completed { key, result } = completed;
        self.in_flight.remove(&key);

        self.clock += 1;
        let entry = self.entries.entry(key.clone()).or_default();
        entry.last_used = self.clock;
        match result {
            Ok(data) => {
                let data = Arc::new(data);
                entry.data = Some(Arc::clone(&data));
                entry.error = None;
                if self.current_key.as_deref() == Some(key.as_str()) {
                    self.previous = Some(data);
                }
            }
            Err(e) => {
                debug!(key = %key, error = %e, "Fetch failed");
                entry.error = Some(e.to_string());
            }
        }
        self.evict();
    }

    fn evict(&mut self) {
        while self.entries.len() > CACHE_CAPACITY {
            let oldest = self
                .entries
                .iter()
                .filter(|(key, _)| {
                    self.current_key.as_deref() != Some(key.as_str())
                        && !self.in_flight.contains(key.as_str())
                })
                .min_by_key(|(_, entry)| entry.last_used)
                .map(|(key, _)| key.clone());
            let Some(key) = oldest else {
                break;
            };
            debug!(key = %key, "Evicting cached query");
            self.entries.remove(&key);
        }
    }

    /// Number of keys with a cached result or error.
    pub fn cached_keys(&self) -> usize {
        self.entries.len()
    }

    /// Apply finished requests and run auto-refresh. Returns true if anything changed.
    pub fn poll(&mut self) -> bool {
        let mut changed = false;
        while let Ok(completed) = self.rx.try_recv() {
            self.apply(completed);
            changed = true;
        }

        let refresh_due = self
            .auto_refresh
            .as_mut()
            .is_some_and(|refresh| refresh.due(Instant::now()));
        if refresh_due {
            self.refetch();
        }
        changed
    }

    /// Wait until no request is in flight.
    pub async fn settle(&mut self) {
        while !self.in_flight.is_empty() {
            match self.rx.recv().await {
                Some(completed) => self.apply(completed),
                None => break,
            }
        }
    }

    /// The state to render for the current key.
    pub fn state(&self) -> QueryState {
        let Some(key) = self.current_key.as_deref() else {
            return QueryState::default();
        };
        let is_fetching = self.in_flight.contains(key);

        match self.entries.get(key) {
            Some(entry) if entry.data.is_some() || entry.error.is_some() => QueryState {
                is_loading: false,
                is_fetching,
                is_previous_data: false,
                data: entry.data.clone(),
                error: entry.error.clone(),
            },
            _ => QueryState {
                is_loading: self.previous.is_none(),
                is_fetching,
                is_previous_data: self.previous.is_some(),
                data: self.previous.clone(),
                error: None,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::ApiResponse;
    use crate::error::CoreError;
    use crate::models::ApiTaskInstance;
    use async_trait::async_trait;
    use std::sync::Mutex;

    #[derive(Default)]
    struct FakeSource {
        calls: Mutex<Vec<String>>,
    }

    impl FakeSource {
        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl TaskInstanceSource for FakeSource {
        async fn fetch_task_instances(&self, path: &str) -> CoreResult<Option<ApiResponse>> {
            self.calls.lock().unwrap().push(path.to_string());
            if path.contains("fail") {
                return Err(CoreError::Status {
                    url: path.to_string(),
                    status: 500,
                });
            }
            if path.contains("null") {
                return Ok(None);
            }
            Ok(Some(ApiResponse {
                tis: vec![ApiTaskInstance {
                    dag_id: Some("etl".to_string()),
                    run_id: "r1".to_string(),
                    task_id: path.to_string(),
                    map_index: None,
                    try_number: 1,
                    hostname: None,
                    queued_dttm: None,
                    start_date: None,
                    end_date: None,
                    state: None,
                }],
                warnings: Vec::new(),
            }))
        }
    }

    fn task_id(state: &QueryState) -> Option<String> {
        state
            .data
            .as_ref()
            .and_then(|d| d.tis.first())
            .map(|ti| ti.task_id.clone())
    }

    #[tokio::test]
    async fn test_dedupes_concurrent_requests() {
        let source = Arc::new(FakeSource::default());
        let mut query = TaskInstanceQuery::new(Arc::clone(&source));

        assert!(query.set_key("a".to_string()));
        assert!(!query.set_key("a".to_string()));
        assert!(!query.refetch());
        query.settle().await;

        assert_eq!(source.calls(), vec!["a".to_string()]);
    }

    #[tokio::test]
    async fn test_cached_key_is_not_refetched() {
        let source = Arc::new(FakeSource::default());
        let mut query = TaskInstanceQuery::new(Arc::clone(&source));

        query.set_key("a".to_string());
        query.settle().await;
        query.set_key("b".to_string());
        query.settle().await;
        assert!(!query.set_key("a".to_string()));

        assert_eq!(source.calls().len(), 2);
        assert_eq!(task_id(&query.state()).as_deref(), Some("a"));
    }

    #[tokio::test]
    async fn test_initial_state_is_loading() {
        let mut query = TaskInstanceQuery::new(Arc::new(FakeSource::default()));
        query.set_key("a".to_string());

        let state = query.state();
        assert!(state.is_loading);
        assert!(state.is_fetching);
        assert!(state.data.is_none());
    }

    #[tokio::test]
    async fn test_keeps_previous_data_while_pending() {
        let mut query = TaskInstanceQuery::new(Arc::new(FakeSource::default()));
        query.set_key("a".to_string());
        query.settle().await;

        query.set_key("b".to_string());
        let pending = query.state();
        assert!(!pending.is_loading);
        assert!(pending.is_previous_data);
        assert_eq!(task_id(&pending).as_deref(), Some("a"));

        query.settle().await;
        let done = query.state();
        assert!(!done.is_previous_data);
        assert_eq!(task_id(&done).as_deref(), Some("b"));
    }

    #[tokio::test]
    async fn test_stale_key_does_not_replace_current() {
        let mut query = TaskInstanceQuery::new(Arc::new(FakeSource::default()));
        query.set_key("a".to_string());
        query.set_key("b".to_string());
        query.settle().await;

        assert_eq!(query.current_key(), Some("b"));
        assert_eq!(task_id(&query.state()).as_deref(), Some("b"));
    }

    #[tokio::test]
    async fn test_error_state() {
        let mut query = TaskInstanceQuery::new(Arc::new(FakeSource::default()));
        query.set_key("fail".to_string());
        query.settle().await;

        let state = query.state();
        assert!(state.is_error());
        assert!(state.data.is_none());
        assert_eq!(state.error.as_deref(), Some("Request to fail returned HTTP 500"));
    }

    #[tokio::test]
    async fn test_null_payload_becomes_warning() {
        let mut query = TaskInstanceQuery::new(Arc::new(FakeSource::default()));
        query.set_key("null".to_string());
        query.settle().await;

        let data = query.state().data.unwrap();
        assert!(data.tis.is_empty());
        assert_eq!(data.warnings, vec!["Invalid response, maybe not logged in?".to_string()]);
    }

    #[tokio::test]
    async fn test_refetch_updates_current_key() {
        let source = Arc::new(FakeSource::default());
        let mut query = TaskInstanceQuery::new(Arc::clone(&source));
        query.set_key("a".to_string());
        query.settle().await;

        assert!(query.refetch());
        let state = query.state();
        assert!(state.is_fetching);
        assert!(!state.is_loading);
        query.settle().await;

        assert_eq!(source.calls().len(), 2);
    }

    #[tokio::test]
    async fn test_auto_refresh_refetches_on_poll() {
        let source = Arc::new(FakeSource::default());
        let mut query =
            TaskInstanceQuery::new(Arc::clone(&source)).with_auto_refresh(Duration::ZERO);
        query.set_key("a".to_string());
        query.settle().await;

        query.poll();
        query.settle().await;
        assert_eq!(source.calls().len(), 2);
    }

    #[tokio::test]
    async fn test_cache_hit_becomes_previous_data() {
        let mut query = TaskInstanceQuery::new(Arc::new(FakeSource::default()));
        query.set_key("a".to_string());
        query.settle().await;
        query.set_key("b".to_string());
        query.settle().await;
        query.set_key("a".to_string());

        query.set_key("c".to_string());
        let pending = query.state();
        assert!(pending.is_previous_data);
        assert_eq!(task_id(&pending).as_deref(), Some("a"));
    }

    #[tokio::test]
    async fn test_cache_is_bounded() {
        let mut query = TaskInstanceQuery::new(Arc::new(FakeSource::default()));
        for i in 0..500 {
            query.set_key(format!("key-{i}"));
            query.settle().await;
        }

        assert_eq!(query.cached_keys(), CACHE_CAPACITY);
        assert_eq!(task_id(&query.state()).as_deref(), Some("key-499"));
    }

    #[tokio::test]
    async fn test_eviction_drops_least_recently_used() {
        let source = Arc::new(FakeSource::default());
        let mut query = TaskInstanceQuery::new(Arc::clone(&source));
        query.set_key("first".to_string());
        query.settle().await;
        for i in 0..CACHE_CAPACITY {
            query.set_key(format!("key-{i}"));
            query.settle().await;
            // keep "first" warm
            query.set_key("first".to_string());
        }
        let calls = source.calls().len();

        assert!(!query.set_key("first".to_string()));
        assert!(query.set_key("key-0".to_string()));
        assert_eq!(source.calls().len(), calls + 1);
    }

    #[test]
    fn test_auto_refresh_due() {
        let start = Instant::now();
        let mut refresh = AutoRefresh::new(Duration::from_secs(5), start);
        assert!(!refresh.due(start + Duration::from_secs(1)));
        assert!(refresh.due(start + Duration::from_secs(5)));
        assert!(!refresh.due(start + Duration::from_secs(6)));
        assert_eq!(refresh.interval(), Duration::from_secs(5));
    }
}
