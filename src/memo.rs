//! Lazily memoized key/value view over a recomputable source.
//!
//! Each key is computed on first access from a snapshot of the source and cached
//! until [`MemoMap::invalidate`] drops every cached entry at once.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

type Source<V> = Arc<dyn Fn() -> HashMap<String, V> + Send + Sync>;

pub struct MemoMap<V> {
    source: Source<V>,
    snapshot: Mutex<Option<Arc<HashMap<String, V>>>>,
    entries: Mutex<HashMap<String, Option<V>>>,
}

impl<V: Clone> MemoMap<V> {
    pub fn new(source: impl Fn() -> HashMap<String, V> + Send + Sync + 'static) -> Self {
        Self {
            source: Arc::new(source),
            snapshot: Mutex::new(None),
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Value for `key`, computing and caching it on first access.
    pub fn get(&self, key: &str) -> Option<V> {
        if let Some(cached) = self.entries.lock().get(key) {
            return cached.clone();
        }
        let value = self.snapshot().get(key).cloned();
        self.entries.lock().insert(key.to_string(), value.clone());
        value
    }

    /// Every key of the current source snapshot.
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.snapshot().keys().cloned().collect();
        keys.sort();
        keys
    }

    /// The full current mapping.
    pub fn to_map(&self) -> HashMap<String, V> {
        self.snapshot().as_ref().clone()
    }

    /// Forget every cached entry; the next access recomputes from the source.
    pub fn invalidate(&self) {
        self.snapshot.lock().take();
        self.entries.lock().clear();
    }

    fn snapshot(&self) -> Arc<HashMap<String, V>> {
        if let Some(snapshot) = self.snapshot.lock().as_ref() {
            return Arc::clone(snapshot);
        }
        // Source may re-enter other locks; compute unlocked.
        let computed = Arc::new((self.source)());
        let mut slot = self.snapshot.lock();
        Arc::clone(slot.get_or_insert(computed))
    }
}

impl<V> std::fmt::Debug for MemoMap<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoMap")
            .field("cached_keys", &self.entries.lock().len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_computes_once_until_invalidated() {
        let calls = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&calls);
        let memo = MemoMap::new(move || {
            c.fetch_add(1, Ordering::SeqCst);
            HashMap::from([("id".to_string(), "42".to_string())])
        });

        assert_eq!(memo.get("id").as_deref(), Some("42"));
        assert_eq!(memo.get("id").as_deref(), Some("42"));
        assert_eq!(memo.get("missing"), None);
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        memo.invalidate();
        assert_eq!(memo.get("id").as_deref(), Some("42"));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
