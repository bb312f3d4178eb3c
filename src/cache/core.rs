//! The keyed loader cache.
//!
//! Each entry holds one [`Shared`] future per freshness window, so every reader
//! inside the window observes the same in-flight load and the same outcome,
//! including a rejection.

use crate::clock::{Clock, SystemClock};
use crate::error::LoadError;
use crate::intent::{ExecutionMode, Intent};
use crate::response::Response;
use crate::runtime_config::{CacheConfig, RuntimeConfig};
use crate::signal::{ChangeSignal, LiveSubscription};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use futures::channel::oneshot;
use futures::future::{BoxFuture, FutureExt, Shared};
use once_cell::sync::Lazy;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info};

/// What a cached loader produces: plain data, or a response carrying redirect and
/// revalidation signals.
#[derive(Debug, Clone, PartialEq)]
pub enum LoaderValue {
    Data(Value),
    Response(Response),
}

impl From<Value> for LoaderValue {
    fn from(value: Value) -> Self {
        LoaderValue::Data(value)
    }
}

impl From<Response> for LoaderValue {
    fn from(response: Response) -> Self {
        LoaderValue::Response(response)
    }
}

pub type LoadResult = Result<LoaderValue, LoadError>;
pub type LoadFuture = BoxFuture<'static, LoadResult>;
pub type SharedLoad = Shared<LoadFuture>;

/// Which keys an invalidation or revalidation applies to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyFilter {
    All,
    /// Keys starting with any of the prefixes. An empty list matches nothing.
    Prefixes(Vec<String>),
}

impl KeyFilter {
    pub fn matches(&self, key: &str) -> bool {
        match self {
            KeyFilter::All => true,
            KeyFilter::Prefixes(prefixes) => prefixes.iter().any(|p| key.starts_with(p.as_str())),
        }
    }
}

impl From<&str> for KeyFilter {
    fn from(prefix: &str) -> Self {
        KeyFilter::Prefixes(vec![prefix.to_string()])
    }
}

impl From<String> for KeyFilter {
    fn from(prefix: String) -> Self {
        KeyFilter::Prefixes(vec![prefix])
    }
}

impl From<Vec<String>> for KeyFilter {
    fn from(prefixes: Vec<String>) -> Self {
        KeyFilter::Prefixes(prefixes)
    }
}

impl From<Option<Vec<String>>> for KeyFilter {
    fn from(prefixes: Option<Vec<String>>) -> Self {
        prefixes.map_or(KeyFilter::All, KeyFilter::Prefixes)
    }
}

struct CacheEntry {
    /// Milliseconds; `0` marks the entry invalidated
    timestamp: u64,
    /// Last timestamp issued, kept across invalidation
    stamp: u64,
    value: SharedLoad,
    intent: Option<Intent>,
    signal: Arc<ChangeSignal>,
}

/// What a lookup hands back once the shard guard is released.
struct Slot {
    value: SharedLoad,
    signal: Arc<ChangeSignal>,
    timestamp: u64,
    live: Option<LiveSubscription>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outcome {
    Hit,
    Refreshed,
    Created,
}

impl CacheEntry {
    fn new(now: u64, value: SharedLoad, intent: Option<Intent>) -> Self {
        Self {
            timestamp: now,
            stamp: now,
            value,
            intent,
            signal: ChangeSignal::new(now),
        }
    }

    fn is_fresh(&self, now: u64, intent: Intent, mode: ExecutionMode, window_ms: u64) -> bool {
        self.timestamp != 0
            && (mode.is_server()
                || intent == Intent::Native
                || self.signal.live() > 0
                || now.saturating_sub(self.timestamp) < window_ms)
    }

    /// Issue a timestamp later than every one issued before, invalidated or not.
    fn restamp(&mut self, now: u64) {
        self.stamp = next_timestamp(now, self.stamp);
        self.timestamp = self.stamp;
    }

    fn slot(&self, track: bool) -> Slot {
        Slot {
            value: self.value.clone(),
            signal: Arc::clone(&self.signal),
            timestamp: self.timestamp,
            live: track.then(|| self.signal.retain()),
        }
    }
}

/// A load whose future is supplied after the shard guard is released.
///
/// Readers that find the entry meanwhile share the same handle and wait for the
/// sender; a sender dropped before sending (a panicking loader) rejects them.
fn pending_load() -> (SharedLoad, oneshot::Sender<LoadFuture>) {
    let (sender, receiver) = oneshot::channel::<LoadFuture>();
    let value: LoadFuture = async move {
        match receiver.await {
            Ok(load) => load.await,
            Err(_) => Err(LoadError::rejected("loader did not start")),
        }
    }
    .boxed();
    (value.shared(), sender)
}

struct CacheInner {
    entries: DashMap<String, CacheEntry>,
    clock: Arc<dyn Clock>,
    mode: ExecutionMode,
    config: CacheConfig,
}

/// Cloneable handle on a loader cache.
///
/// Client execution uses one process-wide instance ([`DataCache::global`]); server
/// execution scopes a fresh instance to each request.
#[derive(Clone)]
pub struct DataCache {
    inner: Arc<CacheInner>,
}

static GLOBAL: Lazy<DataCache> = Lazy::new(|| {
    let config = RuntimeConfig::from_env();
    DataCache::new(config.execution, config.cache, Arc::new(SystemClock))
});

impl DataCache {
    pub fn new(mode: ExecutionMode, config: CacheConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            inner: Arc::new(CacheInner {
                entries: DashMap::new(),
                clock,
                mode,
                config,
            }),
        }
    }

    /// A client-side cache with default timings.
    pub fn client() -> Self {
        Self::new(ExecutionMode::Client, CacheConfig::default(), Arc::new(SystemClock))
    }

    /// A request-scoped server-side cache.
    pub fn server() -> Self {
        Self::new(ExecutionMode::Server, CacheConfig::default(), Arc::new(SystemClock))
    }

    /// The process-wide cache, configured from the environment on first use.
    pub fn global() -> DataCache {
        GLOBAL.clone()
    }

    pub fn mode(&self) -> ExecutionMode {
        self.inner.mode
    }

    pub fn config(&self) -> CacheConfig {
        self.inner.config
    }

    pub fn now(&self) -> u64 {
        self.inner.clock.now_ms()
    }

    /// Read `key`, invoking `loader` when the entry is missing or stale.
    ///
    /// Fresh entries hand back the stored future. A fresh entry produced by a preload
    /// is re-stamped when read for real, and `Navigate` reads publish the entry's
    /// change signal.
    pub fn read<F>(&self, key: &str, intent: Intent, loader: F) -> SharedLoad
    where
        F: FnOnce() -> LoadFuture,
    {
        self.lookup(key, intent, false, loader).0
    }

    /// A tracking read: like [`read`](Self::read) but counts the caller as a live
    /// subscriber until the returned guard is dropped, and calls `on_change` whenever
    /// the entry is revalidated.
    pub fn subscribe<F, C>(
        &self,
        key: &str,
        intent: Intent,
        loader: F,
        on_change: C,
    ) -> (SharedLoad, LiveSubscription)
    where
        F: FnOnce() -> LoadFuture,
        C: Fn(&u64) + Send + Sync + 'static,
    {
        let (value, signal, live) = self.lookup(key, intent, true, loader);
        let observer = signal.observe(on_change);
        let live = match live {
            Some(live) => live.with_observer(observer),
            None => signal.retain().with_observer(observer),
        };
        (value, live)
    }

    fn lookup<F>(
        &self,
        key: &str,
        intent: Intent,
        track: bool,
        loader: F,
    ) -> (SharedLoad, Arc<ChangeSignal>, Option<LiveSubscription>)
    where
        F: FnOnce() -> LoadFuture,
    {
        let now = self.now();
        let mode = self.inner.mode;
        let window_ms = self.inner.config.preload_window.as_millis() as u64;

        // Hit or miss is decided under the entry guard, so concurrent readers of a
        // missing key agree on a single pending load.
        let (slot, outcome, sender) = match self.inner.entries.entry(key.to_string()) {
            Entry::Occupied(mut occupied) => {
                let entry = occupied.get_mut();
                if entry.is_fresh(now, intent, mode, window_ms) {
                    if entry.intent == Some(Intent::Preload) && intent != Intent::Preload {
                        entry.restamp(now);
                    }
                    (entry.slot(track), Outcome::Hit, None)
                } else {
                    let (value, sender) = pending_load();
                    entry.restamp(now);
                    entry.value = value;
                    entry.intent = Some(intent);
                    (entry.slot(track), Outcome::Refreshed, Some(sender))
                }
            }
            Entry::Vacant(vacant) => {
                let (value, sender) = pending_load();
                let entry = vacant.insert(CacheEntry::new(now, value, Some(intent)));
                (entry.slot(track), Outcome::Created, Some(sender))
            }
        };

        // Loaders may read the cache themselves, so they run with no shard lock held.
        match sender {
            Some(sender) => {
                debug!(
                    key = %key,
                    intent = %intent,
                    refreshed = outcome == Outcome::Refreshed,
                    "Cache miss, loading"
                );
                if sender.send(loader()).is_err() {
                    debug!(key = %key, "Pending load dropped before its loader ran");
                }
            }
            None => debug!(key = %key, intent = %intent, "Cache hit"),
        }

        if outcome != Outcome::Created && !mode.is_server() && intent == Intent::Navigate {
            slot.signal.bump(slot.timestamp);
        }
        (slot.value, slot.signal, slot.live)
    }

    /// Seed or overwrite `key` with an already-resolved value.
    pub fn write(&self, key: &str, value: LoaderValue) {
        let now = self.now();
        let ready: LoadFuture = futures::future::ready(Ok(value)).boxed();
        let ready = ready.shared();
        match self.inner.entries.entry(key.to_string()) {
            Entry::Occupied(mut occupied) => {
                let entry = occupied.get_mut();
                entry.restamp(now);
                entry.value = ready;
                entry.intent = Some(Intent::Preload);
            }
            Entry::Vacant(vacant) => {
                vacant.insert(CacheEntry::new(now, ready, None));
            }
        }
        debug!(key = %key, "Cache entry written");
    }

    /// Mark matching entries stale. Returns how many were touched.
    pub fn invalidate(&self, filter: impl Into<KeyFilter>) -> usize {
        let filter = filter.into();
        let mut count = 0;
        for mut entry in self.inner.entries.iter_mut() {
            if filter.matches(entry.key()) {
                entry.timestamp = 0;
                count += 1;
            }
        }
        debug!(filter = ?filter, count, "Cache entries invalidated");
        count
    }

    /// Publish the change signal of matching entries, forcing a reload first when
    /// `force` is set. Returns how many were touched.
    pub fn revalidate(&self, filter: impl Into<KeyFilter>, force: bool) -> usize {
        let filter = filter.into();
        let now = self.now();
        let mut signals = Vec::new();
        for mut entry in self.inner.entries.iter_mut() {
            if filter.matches(entry.key()) {
                if force {
                    entry.timestamp = 0;
                }
                signals.push(Arc::clone(&entry.signal));
            }
        }
        for signal in &signals {
            signal.bump(now);
        }
        debug!(filter = ?filter, force, count = signals.len(), "Cache entries revalidated");
        signals.len()
    }

    /// Evict entries older than the TTL that have no live subscribers.
    pub fn sweep(&self, now: u64) -> usize {
        let ttl_ms = self.inner.config.ttl.as_millis() as u64;
        let before = self.inner.entries.len();
        self.inner
            .entries
            .retain(|_, entry| entry.signal.live() > 0 || now.saturating_sub(entry.timestamp) <= ttl_ms);
        let removed = before.saturating_sub(self.inner.entries.len());
        if removed > 0 {
            info!(removed, remaining = self.inner.entries.len(), "Cache sweep evicted entries");
        }
        removed
    }

    pub fn clear(&self) {
        self.inner.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.inner.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.entries.is_empty()
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.inner.entries.contains_key(key)
    }

    /// Timestamp of `key`; `Some(0)` for an invalidated entry.
    pub fn timestamp(&self, key: &str) -> Option<u64> {
        self.inner.entries.get(key).map(|e| e.timestamp)
    }

    /// Intent that produced the stored value of `key`.
    pub fn intent(&self, key: &str) -> Option<Intent> {
        self.inner.entries.get(key).and_then(|e| e.intent)
    }

    pub fn live_count(&self, key: &str) -> usize {
        self.inner
            .entries
            .get(key)
            .map_or(0, |e| e.signal.live())
    }

    /// Sorted keys currently cached.
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.inner.entries.iter().map(|e| e.key().clone()).collect();
        keys.sort();
        keys
    }
}

impl fmt::Debug for DataCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DataCache")
            .field("mode", &self.inner.mode)
            .field("entries", &self.inner.entries.len())
            .finish()
    }
}

/// Refreshed timestamps strictly increase even when the clock stalls.
fn next_timestamp(now: u64, previous: u64) -> u64 {
    now.max(previous + 1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::MockClock;
    use futures::executor::block_on;
    use serde_json::json;
    use std::time::Duration;

    fn cache_with_clock() -> (DataCache, MockClock) {
        let clock = MockClock::new();
        let cache = DataCache::new(
            ExecutionMode::Client,
            CacheConfig::default(),
            Arc::new(clock.clone()),
        );
        (cache, clock)
    }

    fn value(v: Value) -> LoadFuture {
        futures::future::ready(Ok(LoaderValue::Data(v))).boxed()
    }

    #[test]
    fn test_next_timestamp_is_strictly_increasing() {
        assert_eq!(next_timestamp(100, 0), 100);
        assert_eq!(next_timestamp(100, 100), 101);
        assert_eq!(next_timestamp(200, 100), 200);
    }

    #[test]
    fn test_refresh_after_invalidate_restamps() {
        let (cache, _clock) = cache_with_clock();
        let _ = cache.read("k", Intent::Navigate, || value(json!(1)));
        let first = cache.timestamp("k").unwrap_or_default();
        cache.invalidate("k");
        assert_eq!(cache.timestamp("k"), Some(0));
        let _ = cache.read("k", Intent::Navigate, || value(json!(2)));
        let second = cache.timestamp("k").unwrap_or_default();
        assert_eq!(second, first + 1);

        cache.invalidate("k");
        cache.write("k", LoaderValue::Data(json!(3)));
        assert_eq!(cache.timestamp("k"), Some(second + 1));
    }

    #[test]
    fn test_write_existing_entry_marks_preload() {
        let (cache, clock) = cache_with_clock();
        cache.write("fresh", LoaderValue::Data(json!(1)));
        assert_eq!(cache.intent("fresh"), None);

        let _ = cache.read("k", Intent::Navigate, || value(json!(1)));
        cache.write("k", LoaderValue::Data(json!(2)));
        assert_eq!(cache.intent("k"), Some(Intent::Preload));

        clock.advance(Duration::from_millis(10));
        let got = block_on(cache.read("k", Intent::Navigate, || value(json!(99))));
        assert_eq!(got, Ok(LoaderValue::Data(json!(2))));
    }

    #[test]
    fn test_panicking_loader_rejects_readers() {
        let (cache, _clock) = cache_with_clock();
        let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            cache.read("k", Intent::Navigate, || -> LoadFuture { panic!("loader failed") })
        }));
        assert!(outcome.is_err());

        let got = block_on(cache.read("k", Intent::Navigate, || value(json!(1))));
        assert_eq!(got, Err(LoadError::rejected("loader did not start")));
    }

    #[test]
    fn test_key_filter_from_option() {
        assert_eq!(KeyFilter::from(None::<Vec<String>>), KeyFilter::All);
        assert!(!KeyFilter::from(Some(Vec::new())).matches("anything"));
    }
}
