//! Keyed query cache with stale-while-revalidate reads and single-flight
//! fetches.
//!
//! Values are stored type-erased and downcast on read, so one client holds
//! every resource type. Each key tracks a request sequence and an epoch:
//!
//! - a response older than the last one applied for its key is discarded
//! - `invalidate_queries` bumps the epoch, so a response issued before the
//!   invalidation is never stored over the post-mutation state
//!
//! Every slot also carries a client-wide generation. A fetch only lands in
//! the slot that issued it, never in one recreated after `remove_queries`.

use std::any::Any;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::future::{BoxFuture, FutureExt, Shared};
use tokio::runtime::Handle;
use tokio::task::{AbortHandle, JoinHandle};
use tokio::time::Instant;
use tracing::{debug, warn};

use super::entry::CacheEntry;
use super::error::QueryError;
use super::key::QueryKey;
use super::policy::{retry_delay, QueryClientOptions, QueryOptions};
use crate::api::ApiError;

type AnyValue = Arc<dyn Any + Send + Sync>;
type FetchResult = Result<AnyValue, QueryError>;
type SharedFetch = Shared<BoxFuture<'static, FetchResult>>;
type Refetch = Arc<dyn Fn() -> BoxFuture<'static, anyhow::Result<AnyValue>> + Send + Sync>;

struct InFlight {
    seq: u64,
    future: SharedFetch,
    abort: AbortHandle,
}

struct Slot {
    entry: Option<CacheEntry<AnyValue>>,
    error: Option<QueryError>,
    in_flight: Option<InFlight>,
    /// Last fetcher used for this key, for focus/reconnect refetches.
    refetch: Option<(Refetch, u32)>,
    stale_time: Duration,
    invalidated: bool,
    generation: u64,
    issued_seq: u64,
    applied_seq: u64,
    epoch: u64,
    last_used: Instant,
}

impl Slot {
    fn new(stale_time: Duration, generation: u64) -> Self {
        Self {
            entry: None,
            error: None,
            in_flight: None,
            refetch: None,
            stale_time,
            invalidated: false,
            generation,
            issued_seq: 0,
            applied_seq: 0,
            epoch: 0,
            last_used: Instant::now(),
        }
    }

    fn is_stale(&self) -> bool {
        match self.entry {
            Some(ref entry) => self.invalidated || entry.age() >= self.stale_time,
            None => true,
        }
    }
}

/// Identifies one fetch: the slot that issued it and when.
#[derive(Debug, Clone, Copy)]
struct Ticket {
    generation: u64,
    seq: u64,
    epoch: u64,
}

/// Snapshot of one query for rendering.
#[derive(Debug, Clone)]
pub struct QueryState<T> {
    pub data: Option<Arc<T>>,
    pub updated_at: Option<DateTime<Utc>>,
    /// No data yet and a fetch is running.
    pub is_loading: bool,
    pub is_fetching: bool,
    pub is_stale: bool,
    pub error: Option<QueryError>,
}

impl<T> Default for QueryState<T> {
    fn default() -> Self {
        Self {
            data: None,
            updated_at: None,
            is_loading: false,
            is_fetching: false,
            is_stale: true,
            error: None,
        }
    }
}

struct Inner {
    options: QueryClientOptions,
    slots: Mutex<HashMap<QueryKey, Slot>>,
    generations: AtomicU64,
}

impl Inner {
    fn lock(&self) -> MutexGuard<'_, HashMap<QueryKey, Slot>> {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn new_slot(&self, stale_time: Duration) -> Slot {
        Slot::new(stale_time, self.generations.fetch_add(1, Ordering::Relaxed))
    }

    /// Store a finished fetch unless something newer already landed.
    /// Returns what the fetch's waiters should see.
    fn apply(&self, key: &QueryKey, ticket: Ticket, result: FetchResult) -> FetchResult {
        let Ticket { generation, seq, epoch } = ticket;
        let mut slots = self.lock();
        let Some(slot) = slots.get_mut(key).filter(|slot| slot.generation == generation) else {
            debug!(key = %key, "Query removed while fetching, result not stored");
            return result;
        };

        if slot.in_flight.as_ref().map(|f| f.seq) == Some(seq) {
            slot.in_flight = None;
        }

        if seq <= slot.applied_seq {
            debug!(key = %key, seq, applied = slot.applied_seq, "Discarding out-of-order response");
            return match (&result, slot.entry.as_ref()) {
                (Ok(_), Some(entry)) => Ok(entry.value.clone()),
                _ => result,
            };
        }
        if slot.epoch != epoch {
            debug!(key = %key, seq, "Discarding response issued before invalidation");
            return result;
        }

        match result {
            Ok(ref value) => {
                slot.entry = Some(CacheEntry::new(value.clone(), slot.stale_time));
                slot.applied_seq = seq;
                slot.error = None;
                slot.invalidated = false;
            }
            Err(ref e) => {
                warn!(key = %key, error = %e, "Query failed");
                slot.error = Some(e.clone());
            }
        }
        result
    }
}

/// Shared query cache. Clone is cheap; clones share one cache.
#[derive(Clone)]
pub struct QueryClient {
    inner: Arc<Inner>,
}

impl Default for QueryClient {
    fn default() -> Self {
        Self::new(QueryClientOptions::default())
    }
}

impl QueryClient {
    pub fn new(options: QueryClientOptions) -> Self {
        Self {
            inner: Arc::new(Inner {
                options,
                slots: Mutex::new(HashMap::new()),
                generations: AtomicU64::new(0),
            }),
        }
    }

    pub fn options(&self) -> &QueryClientOptions {
        &self.inner.options
    }

    /// Return the cached value for `key`, fetching it when needed.
    ///
    /// - fresh entry: returned without a fetch
    /// - stale entry: returned immediately while a background refresh runs
    /// - no entry: waits for the fetch, sharing it with concurrent callers
    pub async fn fetch_query<T, F, Fut>(
        &self,
        key: QueryKey,
        options: QueryOptions,
        fetcher: F,
    ) -> Result<Arc<T>, QueryError>
    where
        T: Send + Sync + 'static,
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<T>> + Send + 'static,
    {
        if !options.enabled {
            return Err(QueryError::Disabled(key));
        }
        let refetch = erase(fetcher);
        let retry = options.retry.unwrap_or(self.inner.options.retry);

        let pending = {
            let mut slots = self.inner.lock();
            let slot = slots
                .entry(key.clone())
                .or_insert_with(|| self.inner.new_slot(options.stale_time));
            slot.last_used = Instant::now();
            slot.stale_time = options.stale_time;
            slot.refetch = Some((refetch.clone(), retry));

            let cached = slot
                .entry
                .as_ref()
                .map(|entry| entry.value.clone().downcast::<T>());
            match cached {
                Some(Ok(value)) => {
                    if !slot.is_stale() {
                        return Ok(value);
                    }
                    if slot.in_flight.is_none() {
                        debug!(key = %key, "Serving stale entry while refreshing");
                        if let Err(e) = self.start_fetch(&key, slot, refetch, retry) {
                            warn!(key = %key, error = %e, "Background refresh not started");
                        }
                    }
                    return Ok(value);
                }
                Some(Err(_)) => {
                    warn!(key = %key, "Cached value has a different type, refetching");
                }
                None => {}
            }

            let joined = slot.in_flight.as_ref().map(|in_flight| in_flight.future.clone());
            match joined {
                Some(future) => future,
                None => self.start_fetch(&key, slot, refetch, retry)?,
            }
        };

        let value = pending.await?;
        value.downcast::<T>().map_err(|_| {
            warn!(key = %key, "Fetched value has a different type");
            QueryError::TypeMismatch(key)
        })
    }

    /// Warm the cache for `key` without waiting. Never fails: errors are
    /// logged by the fetch itself, and a missing runtime skips the prefetch.
    pub fn prefetch_query<T, F, Fut>(&self, key: QueryKey, options: QueryOptions, fetcher: F)
    where
        T: Send + Sync + 'static,
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<T>> + Send + 'static,
    {
        if !options.enabled {
            return;
        }
        let refetch = erase(fetcher);
        let retry = options.retry.unwrap_or(self.inner.options.retry);

        let mut slots = self.inner.lock();
        let slot = slots
            .entry(key.clone())
            .or_insert_with(|| self.inner.new_slot(options.stale_time));
        slot.last_used = Instant::now();
        slot.stale_time = options.stale_time;
        slot.refetch = Some((refetch.clone(), retry));

        if !slot.is_stale() || slot.in_flight.is_some() {
            return;
        }
        match self.start_fetch(&key, slot, refetch, retry) {
            Ok(_) => debug!(key = %key, "Prefetch started"),
            Err(e) => debug!(key = %key, error = %e, "Prefetch skipped"),
        }
    }

    fn start_fetch(
        &self,
        key: &QueryKey,
        slot: &mut Slot,
        refetch: Refetch,
        retry: u32,
    ) -> Result<SharedFetch, QueryError> {
        let handle = Handle::try_current().map_err(|_| QueryError::NoRuntime(key.clone()))?;

        slot.issued_seq += 1;
        let seq = slot.issued_seq;
        let ticket = Ticket {
            generation: slot.generation,
            seq,
            epoch: slot.epoch,
        };

        let inner = Arc::clone(&self.inner);
        let task_key = key.clone();
        let base_delay = self.inner.options.retry_delay;
        let task = handle.spawn(async move {
            let result = run_with_retry(&task_key, &refetch, retry, base_delay).await;
            inner.apply(&task_key, ticket, result)
        });
        let abort = task.abort_handle();

        let waiter_key = key.clone();
        let future = async move {
            match task.await {
                Ok(result) => result,
                Err(e) if e.is_cancelled() => Err(QueryError::Cancelled(waiter_key)),
                Err(e) => Err(anyhow::anyhow!("Query task for {} failed: {}", waiter_key, e).into()),
            }
        }
        .boxed()
        .shared();

        slot.in_flight = Some(InFlight {
            seq,
            future: future.clone(),
            abort,
        });
        Ok(future)
    }

    /// Snapshot of `key` as a view would render it.
    pub fn read<T: Send + Sync + 'static>(&self, key: &QueryKey) -> QueryState<T> {
        let slots = self.inner.lock();
        let Some(slot) = slots.get(key) else {
            return QueryState::default();
        };
        let data = slot
            .entry
            .as_ref()
            .and_then(|entry| entry.value.clone().downcast::<T>().ok());
        QueryState {
            updated_at: slot.entry.as_ref().map(|entry| entry.cached_at),
            is_loading: slot.in_flight.is_some() && data.is_none(),
            is_fetching: slot.in_flight.is_some(),
            is_stale: slot.is_stale(),
            error: slot.error.clone(),
            data,
        }
    }

    pub fn get_query_data<T: Send + Sync + 'static>(&self, key: &QueryKey) -> Option<Arc<T>> {
        self.get_entry::<T>(key).map(|entry| entry.value)
    }

    /// Cached value with its fetch time, for freshness display.
    pub fn get_entry<T: Send + Sync + 'static>(&self, key: &QueryKey) -> Option<CacheEntry<Arc<T>>> {
        let slots = self.inner.lock();
        let entry = slots.get(key)?.entry.as_ref()?;
        let value = entry.value.clone().downcast::<T>().ok()?;
        Some(entry.map(|_| value))
    }

    /// Write a value locally (optimistic update). Fetches already in flight
    /// for the key will not overwrite it.
    pub fn set_query_data<T: Send + Sync + 'static>(&self, key: QueryKey, value: T) {
        let default_stale = self.inner.options.default_stale_time;
        let mut slots = self.inner.lock();
        let slot = slots
            .entry(key)
            .or_insert_with(|| self.inner.new_slot(default_stale));
        slot.entry = Some(CacheEntry::new(Arc::new(value) as AnyValue, slot.stale_time));
        slot.applied_seq = slot.issued_seq;
        slot.error = None;
        slot.invalidated = false;
        slot.last_used = Instant::now();
    }

    /// Replace the cached value for `key` with `update(current)`. Returns
    /// false when nothing of type `T` is cached.
    pub fn update_query_data<T, F>(&self, key: &QueryKey, update: F) -> bool
    where
        T: Send + Sync + 'static,
        F: FnOnce(&T) -> T,
    {
        let Some(current) = self.get_query_data::<T>(key) else {
            return false;
        };
        self.set_query_data(key.clone(), update(&current));
        true
    }

    /// Mark every entry under `prefix` stale and detach fetches issued
    /// before now. Cached values stay servable until refetched.
    pub fn invalidate_queries(&self, prefix: &QueryKey) -> usize {
        let mut slots = self.inner.lock();
        let mut count = 0;
        for (_, slot) in slots.iter_mut().filter(|(key, _)| key.starts_with(prefix)) {
            slot.invalidated = true;
            slot.epoch += 1;
            slot.in_flight = None;
            count += 1;
        }
        debug!(prefix = %prefix, count, "Invalidated queries");
        count
    }

    /// Drop every entry under `prefix` and abort its in-flight fetches.
    pub fn remove_queries(&self, prefix: &QueryKey) -> usize {
        let mut slots = self.inner.lock();
        let before = slots.len();
        slots.retain(|key, slot| {
            if !key.starts_with(prefix) {
                return true;
            }
            if let Some(in_flight) = slot.in_flight.take() {
                in_flight.abort.abort();
            }
            false
        });
        let count = before - slots.len();
        debug!(prefix = %prefix, count, "Removed queries");
        count
    }

    /// Abort in-flight fetches under `prefix`; their waiters get
    /// `QueryError::Cancelled`.
    pub fn cancel_queries(&self, prefix: &QueryKey) -> usize {
        let mut slots = self.inner.lock();
        let mut count = 0;
        for (_, slot) in slots.iter_mut().filter(|(key, _)| key.starts_with(prefix)) {
            if let Some(in_flight) = slot.in_flight.take() {
                in_flight.abort.abort();
                count += 1;
            }
        }
        if count > 0 {
            debug!(prefix = %prefix, count, "Cancelled queries");
        }
        count
    }

    /// Re-run the last fetcher of every stale entry under `prefix`.
    pub fn refetch_stale(&self, prefix: &QueryKey) -> usize {
        let mut slots = self.inner.lock();
        let mut count = 0;
        for (key, slot) in slots.iter_mut().filter(|(key, _)| key.starts_with(prefix)) {
            if slot.in_flight.is_some() || slot.entry.is_none() || !slot.is_stale() {
                continue;
            }
            let Some((refetch, retry)) = slot.refetch.clone() else {
                continue;
            };
            match self.start_fetch(key, slot, refetch, retry) {
                Ok(_) => count += 1,
                Err(e) => debug!(key = %key, error = %e, "Refetch skipped"),
            }
        }
        count
    }

    pub fn on_window_focus(&self) -> usize {
        if !self.inner.options.refetch_on_window_focus {
            return 0;
        }
        self.refetch_stale(&QueryKey::root())
    }

    pub fn on_reconnect(&self) -> usize {
        if !self.inner.options.refetch_on_reconnect {
            return 0;
        }
        self.refetch_stale(&QueryKey::root())
    }

    /// Drop entries unused for longer than the gc time.
    pub fn collect_garbage(&self) -> usize {
        let gc_time = self.inner.options.gc_time;
        let mut slots = self.inner.lock();
        let before = slots.len();
        slots.retain(|_, slot| slot.in_flight.is_some() || slot.last_used.elapsed() < gc_time);
        let count = before - slots.len();
        if count > 0 {
            debug!(count, "Collected unused queries");
        }
        count
    }

    /// Run `collect_garbage` every gc period until the client is dropped.
    pub fn spawn_gc(&self) -> JoinHandle<()> {
        let weak = Arc::downgrade(&self.inner);
        let period = self.inner.options.gc_time;
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.tick().await;
            loop {
                interval.tick().await;
                let Some(inner) = weak.upgrade() else {
                    break;
                };
                QueryClient { inner }.collect_garbage();
            }
        })
    }

    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn erase<T, F, Fut>(fetcher: F) -> Refetch
where
    T: Send + Sync + 'static,
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<T>> + Send + 'static,
{
    Arc::new(move || {
        let fut = fetcher();
        async move { fut.await.map(|value| Arc::new(value) as AnyValue) }.boxed()
    })
}

async fn run_with_retry(
    key: &QueryKey,
    refetch: &Refetch,
    retry: u32,
    base_delay: Duration,
) -> FetchResult {
    let mut attempt = 0;
    loop {
        match refetch().await {
            Ok(value) => return Ok(value),
            Err(e) => {
                // Rejected requests would be rejected again
                let transient = ApiError::find(&e).map(ApiError::is_transient).unwrap_or(true);
                if attempt >= retry || !transient {
                    return Err(e.into());
                }
                let delay = retry_delay(base_delay, attempt);
                debug!(key = %key, attempt = attempt + 1, error = %e, ?delay, "Query failed, retrying");
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
        }
    }
}
