//! Keyed cache for asynchronous requests
//!
//! [`QueryClient`] deduplicates concurrent requests for the same key, keeps
//! the last successful result together with the time it was fetched, and
//! treats that result as fresh for a caller-supplied stale time.
//!
//! Every fetch runs on its own spawned task and publishes its result on a
//! `watch` channel. Callers that stop waiting (a timed-out page render, a
//! client that disconnects after a hover) never cancel the fetch: the result
//! still lands in the cache.
//!
//! # Example
//!
//! ```rust,no_run
//! use dashgo::services::QueryClient;
//! use std::time::Duration;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client: QueryClient<String, u64> = QueryClient::new();
//!
//! let value = client
//!     .fetch_query("answer".to_string(), Duration::from_secs(60), || async {
//!         Ok::<_, std::io::Error>(42)
//!     })
//!     .await?;
//! assert_eq!(value, 42);
//! # Ok(())
//! # }
//! ```

use std::collections::HashMap;
use std::future::Future;
use std::hash::Hash;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Mutex};
use tokio::time::Instant;

/// Error stored for a failed query
///
/// Cloneable so that every waiter of a deduplicated request receives it.
#[derive(Debug, Clone, thiserror::Error)]
pub enum QueryError {
    #[error("{0}")]
    Fetch(Arc<dyn std::error::Error + Send + Sync>),

    #[error("Query was aborted before completing")]
    Aborted,
}

type Outcome<V> = Option<Result<V, QueryError>>;

/// Snapshot of a single cache entry
#[derive(Debug, Clone)]
pub struct QueryState<V> {
    pub data: Option<V>,
    pub error: Option<QueryError>,
    pub is_fetching: bool,
    pub updated_at: Option<Instant>,
}

impl<V> QueryState<V> {
    fn idle() -> Self {
        Self {
            data: None,
            error: None,
            is_fetching: false,
            updated_at: None,
        }
    }

    /// True until the query produced either data or an error.
    pub fn is_loading(&self) -> bool {
        self.data.is_none() && self.error.is_none()
    }
}

/// What happened when a fetch was requested for a key
enum Start<V> {
    Fresh(V),
    Started(watch::Receiver<Outcome<V>>),
    Joined(watch::Receiver<Outcome<V>>),
}

struct Entry<V> {
    data: Option<V>,
    error: Option<QueryError>,
    updated_at: Option<Instant>,
    invalidated: bool,
    /// Bumped by every invalidation; a fetch started under an older
    /// generation leaves the entry stale when it lands.
    generation: u64,
    in_flight: Option<watch::Receiver<Outcome<V>>>,
    touched_at: Instant,
}

impl<V> Entry<V> {
    fn new() -> Self {
        Self {
            data: None,
            error: None,
            updated_at: None,
            invalidated: false,
            generation: 0,
            in_flight: None,
            touched_at: Instant::now(),
        }
    }

    fn is_fresh(&self, stale_time: Duration) -> bool {
        !self.invalidated
            && self
                .updated_at
                .map(|at| at.elapsed() < stale_time)
                .unwrap_or(false)
    }
}

/// Shared request cache keyed by `K`, holding values of type `V`
///
/// Clones share the same underlying cache.
pub struct QueryClient<K, V> {
    entries: Arc<Mutex<HashMap<K, Entry<V>>>>,
}

impl<K, V> Clone for QueryClient<K, V> {
    fn clone(&self) -> Self {
        Self {
            entries: self.entries.clone(),
        }
    }
}

impl<K, V> Default for QueryClient<K, V>
where
    K: Eq + Hash + Clone + Send + Sync + std::fmt::Debug + 'static,
    V: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> QueryClient<K, V>
where
    K: Eq + Hash + Clone + Send + Sync + std::fmt::Debug + 'static,
    V: Clone + Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self {
            entries: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    async fn start<F, Fut, E>(&self, key: K, stale_time: Duration, fetcher: F) -> Start<V>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<V, E>> + Send + 'static,
        E: std::error::Error + Send + Sync + 'static,
    {
        let mut entries = self.entries.lock().await;
        let entry = entries.entry(key.clone()).or_insert_with(Entry::new);
        entry.touched_at = Instant::now();

        if entry.is_fresh(stale_time) {
            if let Some(data) = &entry.data {
                return Start::Fresh(data.clone());
            }
        }

        if let Some(rx) = &entry.in_flight {
            return Start::Joined(rx.clone());
        }

        let (tx, rx) = watch::channel(None);
        entry.in_flight = Some(rx.clone());
        // Nothing to show yet, so an old error must not hide the spinner
        if entry.data.is_none() {
            entry.error = None;
        }
        let generation = entry.generation;
        drop(entries);

        tracing::debug!("Starting query {:?}", key);

        let shared = self.entries.clone();
        tokio::spawn(async move {
            // A panicking fetcher surfaces as a JoinError instead of
            // leaving the entry in flight forever.
            let result = match tokio::spawn(async move { fetcher().await }).await {
                Ok(result) => result.map_err(|e| QueryError::Fetch(Arc::new(e))),
                Err(join_error) => {
                    tracing::warn!("Query {:?} aborted: {}", key, join_error);
                    Err(QueryError::Aborted)
                }
            };

            {
                let mut entries = shared.lock().await;
                // Removed while in flight: waiters still get the result
                if let Some(entry) = entries.get_mut(&key) {
                    match &result {
                        Ok(data) => {
                            entry.data = Some(data.clone());
                            entry.updated_at = Some(Instant::now());
                            entry.error = None;
                            entry.invalidated = entry.generation != generation;
                        }
                        Err(e) => {
                            tracing::debug!("Query {:?} failed: {}", key, e);
                            entry.error = Some(e.clone());
                        }
                    }
                    entry.in_flight = None;
                    entry.touched_at = Instant::now();
                }
            }

            // Nobody waiting is fine; the cache already holds the result.
            let _ = tx.send(Some(result));
        });

        Start::Started(rx)
    }

    async fn wait(mut rx: watch::Receiver<Outcome<V>>) -> Result<V, QueryError> {
        match rx.wait_for(|outcome| outcome.is_some()).await {
            Ok(outcome) => (*outcome).clone().unwrap_or(Err(QueryError::Aborted)),
            Err(_) => Err(QueryError::Aborted),
        }
    }

    /// Returns fresh cached data for `key`, or runs `fetcher` and waits for it.
    ///
    /// Concurrent callers for the same key share a single request.
    pub async fn fetch_query<F, Fut, E>(
        &self,
        key: K,
        stale_time: Duration,
        fetcher: F,
    ) -> Result<V, QueryError>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<V, E>> + Send + 'static,
        E: std::error::Error + Send + Sync + 'static,
    {
        match self.start(key, stale_time, fetcher).await {
            Start::Fresh(data) => Ok(data),
            Start::Started(rx) | Start::Joined(rx) => Self::wait(rx).await,
        }
    }

    /// Populates `key` in the background unless it is fresh or already loading.
    ///
    /// Returns true when a new request was issued. Errors are kept in the
    /// entry and never reported to the caller.
    pub async fn prefetch_query<F, Fut, E>(&self, key: K, stale_time: Duration, fetcher: F) -> bool
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<V, E>> + Send + 'static,
        E: std::error::Error + Send + Sync + 'static,
    {
        matches!(
            self.start(key, stale_time, fetcher).await,
            Start::Started(_)
        )
    }

    /// Stale-while-revalidate read used by page renders.
    ///
    /// Starts a refetch when the entry is stale. When there is no data yet,
    /// waits up to `wait` for the request to settle. The returned snapshot
    /// reflects whatever the cache holds afterwards.
    pub async fn observe<F, Fut, E>(
        &self,
        key: K,
        stale_time: Duration,
        wait: Duration,
        fetcher: F,
    ) -> QueryState<V>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<V, E>> + Send + 'static,
        E: std::error::Error + Send + Sync + 'static,
    {
        match self.start(key.clone(), stale_time, fetcher).await {
            Start::Fresh(_) => {}
            Start::Started(rx) | Start::Joined(rx) => {
                let has_data = self.get_query_data(&key).await.is_some();
                if !has_data && tokio::time::timeout(wait, Self::wait(rx)).await.is_err() {
                    tracing::debug!("Query {:?} still pending after {:?}", key, wait);
                }
            }
        }

        self.state(&key).await
    }

    /// Snapshot of the entry for `key`.
    pub async fn state(&self, key: &K) -> QueryState<V> {
        let entries = self.entries.lock().await;
        match entries.get(key) {
            Some(entry) => QueryState {
                data: entry.data.clone(),
                error: entry.error.clone(),
                is_fetching: entry.in_flight.is_some(),
                updated_at: entry.updated_at,
            },
            None => QueryState::idle(),
        }
    }

    pub async fn get_query_data(&self, key: &K) -> Option<V> {
        let entries = self.entries.lock().await;
        entries.get(key).and_then(|entry| entry.data.clone())
    }

    /// Stores `data` for `key` as if it had just been fetched.
    pub async fn set_query_data(&self, key: K, data: V) {
        let mut entries = self.entries.lock().await;
        let entry = entries.entry(key).or_insert_with(Entry::new);
        let now = Instant::now();
        entry.data = Some(data);
        entry.updated_at = Some(now);
        entry.error = None;
        entry.invalidated = false;
        entry.touched_at = now;
    }

    /// Marks every matching entry stale. Returns how many were marked.
    pub async fn invalidate_queries<P>(&self, predicate: P) -> usize
    where
        P: Fn(&K) -> bool,
    {
        let mut entries = self.entries.lock().await;
        let mut count = 0;
        for (key, entry) in entries.iter_mut() {
            if predicate(key) {
                entry.invalidated = true;
                entry.generation += 1;
                count += 1;
            }
        }
        count
    }

    /// Drops every matching entry. Returns how many were dropped.
    pub async fn remove_queries<P>(&self, predicate: P) -> usize
    where
        P: Fn(&K) -> bool,
    {
        let mut entries = self.entries.lock().await;
        let before = entries.len();
        entries.retain(|key, _| !predicate(key));
        before - entries.len()
    }

    /// Drops idle entries not touched within `gc_time`.
    pub async fn garbage_collect(&self, gc_time: Duration) -> usize {
        let mut entries = self.entries.lock().await;
        let before = entries.len();
        entries.retain(|_, entry| entry.in_flight.is_some() || entry.touched_at.elapsed() < gc_time);
        let removed = before - entries.len();
        if removed > 0 {
            tracing::debug!("Garbage collected {} query entries", removed);
        }
        removed
    }

    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.lock().await.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Debug, thiserror::Error)]
    #[error("boom")]
    struct Boom;

    fn counting_fetcher(
        calls: Arc<AtomicUsize>,
        value: u32,
    ) -> impl FnOnce() -> std::pin::Pin<Box<dyn Future<Output = Result<u32, Boom>> + Send>>
           + Send
           + 'static {
        move || {
            Box::pin(async move {
                calls.fetch_add(1, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(20)).await;
                Ok(value)
            })
        }
    }

    const TEN_MINUTES: Duration = Duration::from_secs(600);

    #[tokio::test(start_paused = true)]
    async fn test_fetch_query_caches_within_stale_time() {
        let client: QueryClient<&'static str, u32> = QueryClient::new();
        let calls = Arc::new(AtomicUsize::new(0));

        let first = client
            .fetch_query("k", TEN_MINUTES, counting_fetcher(calls.clone(), 1))
            .await
            .unwrap();
        let second = client
            .fetch_query("k", TEN_MINUTES, counting_fetcher(calls.clone(), 2))
            .await
            .unwrap();

        assert_eq!(first, 1);
        assert_eq!(second, 1);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fetch_query_refetches_after_stale_time() {
        let client: QueryClient<&'static str, u32> = QueryClient::new();
        let calls = Arc::new(AtomicUsize::new(0));

        client
            .fetch_query("k", TEN_MINUTES, counting_fetcher(calls.clone(), 1))
            .await
            .unwrap();

        tokio::time::advance(TEN_MINUTES + Duration::from_secs(1)).await;

        let value = client
            .fetch_query("k", TEN_MINUTES, counting_fetcher(calls.clone(), 2))
            .await
            .unwrap();

        assert_eq!(value, 2);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_concurrent_fetches_are_deduplicated() {
        let client: QueryClient<&'static str, u32> = QueryClient::new();
        let calls = Arc::new(AtomicUsize::new(0));

        let (a, b) = tokio::join!(
            client.fetch_query("k", TEN_MINUTES, counting_fetcher(calls.clone(), 1)),
            client.fetch_query("k", TEN_MINUTES, counting_fetcher(calls.clone(), 2)),
        );

        assert_eq!(a.unwrap(), 1);
        assert_eq!(b.unwrap(), 1);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_prefetch_issues_one_request_per_window() {
        let client: QueryClient<String, u32> = QueryClient::new();
        let calls = Arc::new(AtomicUsize::new(0));

        let started = client
            .prefetch_query("1".to_string(), TEN_MINUTES, counting_fetcher(calls.clone(), 1))
            .await;
        assert!(started);

        // Second hover while the first request is still in flight
        let started = client
            .prefetch_query("1".to_string(), TEN_MINUTES, counting_fetcher(calls.clone(), 1))
            .await;
        assert!(!started);

        tokio::time::sleep(Duration::from_millis(50)).await;

        // Third hover after completion, still within the window
        let started = client
            .prefetch_query("1".to_string(), TEN_MINUTES, counting_fetcher(calls.clone(), 1))
            .await;
        assert!(!started);

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(client.get_query_data(&"1".to_string()).await, Some(1));
    }

    #[tokio::test]
    async fn test_errors_are_stored_and_shared() {
        let client: QueryClient<&'static str, u32> = QueryClient::new();

        let result = client
            .fetch_query("k", TEN_MINUTES, || async { Err::<u32, _>(Boom) })
            .await;
        assert!(matches!(result, Err(QueryError::Fetch(_))));

        let state = client.state(&"k").await;
        assert!(state.data.is_none());
        assert!(state.error.is_some());
        assert!(!state.is_loading());
        assert!(!state.is_fetching);
    }

    #[tokio::test]
    async fn test_success_clears_previous_error() {
        let client: QueryClient<&'static str, u32> = QueryClient::new();

        let _ = client
            .fetch_query("k", TEN_MINUTES, || async { Err::<u32, _>(Boom) })
            .await;
        let value = client
            .fetch_query("k", TEN_MINUTES, || async { Ok::<u32, Boom>(5) })
            .await
            .unwrap();

        assert_eq!(value, 5);
        assert!(client.state(&"k").await.error.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_observe_returns_loading_when_wait_elapses() {
        let client: QueryClient<&'static str, u32> = QueryClient::new();

        let state = client
            .observe("k", TEN_MINUTES, Duration::from_millis(10), || async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok::<u32, Boom>(1)
            })
            .await;

        assert!(state.is_loading());
        assert!(state.is_fetching);

        tokio::time::sleep(Duration::from_secs(6)).await;
        let state = client.state(&"k").await;
        assert_eq!(state.data, Some(1));
        assert!(!state.is_fetching);
    }

    #[tokio::test(start_paused = true)]
    async fn test_observe_serves_stale_data_while_refetching() {
        let client: QueryClient<&'static str, u32> = QueryClient::new();
        client.set_query_data("k", 1).await;

        let state = client
            .observe("k", Duration::ZERO, Duration::from_secs(1), || async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok::<u32, Boom>(2)
            })
            .await;

        assert_eq!(state.data, Some(1));
        assert!(state.is_fetching);
    }

    #[tokio::test]
    async fn test_invalidate_marks_entries_stale() {
        let client: QueryClient<u32, u32> = QueryClient::new();
        client.set_query_data(1, 10).await;
        client.set_query_data(2, 20).await;

        let marked = client.invalidate_queries(|page| *page == 1).await;
        assert_eq!(marked, 1);

        let calls = Arc::new(AtomicUsize::new(0));
        let refreshed = client
            .fetch_query(1, TEN_MINUTES, counting_fetcher(calls.clone(), 11))
            .await
            .unwrap();
        let cached = client
            .fetch_query(2, TEN_MINUTES, counting_fetcher(calls.clone(), 21))
            .await
            .unwrap();

        assert_eq!(refreshed, 11);
        assert_eq!(cached, 20);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_invalidate_during_fetch_keeps_result_stale() {
        let client: QueryClient<u32, u32> = QueryClient::new();
        let calls = Arc::new(AtomicUsize::new(0));

        let background = {
            let client = client.clone();
            tokio::spawn(async move {
                client
                    .fetch_query(1, TEN_MINUTES, || async {
                        tokio::time::sleep(Duration::from_secs(1)).await;
                        Ok::<u32, Boom>(10)
                    })
                    .await
            })
        };

        // Let the fetch start before invalidating
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(client.state(&1).await.is_fetching);
        assert_eq!(client.invalidate_queries(|_| true).await, 1);

        assert_eq!(background.await.unwrap().unwrap(), 10);
        assert_eq!(client.get_query_data(&1).await, Some(10));

        let value = client
            .fetch_query(1, TEN_MINUTES, counting_fetcher(calls.clone(), 11))
            .await
            .unwrap();

        assert_eq!(value, 11);
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        // The refetch started after the invalidation, so it counts as fresh
        let cached = client
            .fetch_query(1, TEN_MINUTES, counting_fetcher(calls.clone(), 12))
            .await
            .unwrap();
        assert_eq!(cached, 11);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_refetch_after_error_is_loading() {
        let client: QueryClient<&'static str, u32> = QueryClient::new();

        let _ = client
            .fetch_query("k", TEN_MINUTES, || async { Err::<u32, _>(Boom) })
            .await;
        assert!(client.state(&"k").await.error.is_some());

        let state = client
            .observe("k", TEN_MINUTES, Duration::from_millis(10), || async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok::<u32, Boom>(1)
            })
            .await;

        assert!(state.is_loading());
        assert!(state.error.is_none());
        assert!(state.is_fetching);
    }

    #[tokio::test]
    async fn test_panicking_fetcher_does_not_stay_in_flight() {
        let client: QueryClient<&'static str, u32> = QueryClient::new();

        let result = client
            .fetch_query("k", TEN_MINUTES, || async {
                if true {
                    panic!("fetcher blew up");
                }
                Ok::<u32, Boom>(1)
            })
            .await;
        assert!(matches!(result, Err(QueryError::Aborted)));

        let state = client.state(&"k").await;
        assert!(!state.is_fetching);
        assert!(matches!(state.error, Some(QueryError::Aborted)));

        let value = client
            .fetch_query("k", TEN_MINUTES, || async { Ok::<u32, Boom>(2) })
            .await
            .unwrap();
        assert_eq!(value, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_garbage_collect_drops_idle_entries() {
        let client: QueryClient<u32, u32> = QueryClient::new();
        client.set_query_data(1, 10).await;

        assert_eq!(client.garbage_collect(Duration::from_secs(300)).await, 0);

        tokio::time::advance(Duration::from_secs(301)).await;
        client.set_query_data(2, 20).await;

        assert_eq!(client.garbage_collect(Duration::from_secs(300)).await, 1);
        assert_eq!(client.len().await, 1);
        assert_eq!(client.get_query_data(&2).await, Some(20));
    }

    #[tokio::test]
    async fn test_remove_queries() {
        let client: QueryClient<u32, u32> = QueryClient::new();
        client.set_query_data(1, 10).await;
        client.set_query_data(2, 20).await;

        assert_eq!(client.remove_queries(|_| true).await, 2);
        assert!(client.is_empty().await);
    }
}
