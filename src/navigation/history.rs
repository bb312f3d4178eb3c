//! The history-storage seam and an in-memory implementation.

use crate::signal::{Observers, Subscription};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

/// A history entry as seen by the navigator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    /// Path including search and hash
    pub value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<Value>,
    /// Position in the history stack, when the backend tracks it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub depth: Option<i64>,
}

impl HistoryEntry {
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            state: None,
            depth: None,
        }
    }
}

/// A write the navigator asks the backend to perform.
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryUpdate {
    pub value: String,
    /// Replace the current entry instead of pushing
    pub replace: bool,
    /// Restore scroll position after the write
    pub scroll: bool,
    pub state: Option<Value>,
}

/// Backend storing the history stack (browser history, memory, a server request).
pub trait HistorySink: Send + Sync {
    /// The current entry.
    fn get(&self) -> HistoryEntry;

    /// Push or replace an entry. Implementations do not echo this write back to
    /// subscribers.
    fn set(&self, update: HistoryUpdate);

    /// Be told about changes made outside the navigator (back/forward).
    fn subscribe(&self, listener: Box<dyn Fn(HistoryEntry) + Send + Sync>) -> Subscription;

    /// Move `delta` entries through the stack. Returns `false` when unsupported.
    fn go_delta(&self, delta: i32) -> bool {
        let _ = delta;
        false
    }
}

struct MemoryState {
    entries: Vec<(String, Option<Value>)>,
    index: usize,
}

/// An in-memory history stack starting at `/`.
///
/// `go` clamps to the ends of the stack and notifies subscribers; `set` pushes
/// (truncating forward entries) or replaces without notifying.
#[derive(Clone)]
pub struct MemoryHistory {
    state: Arc<Mutex<MemoryState>>,
    observers: Arc<Observers<HistoryEntry>>,
}

impl Default for MemoryHistory {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryHistory {
    pub fn new() -> Self {
        Self::with_entry("/")
    }

    pub fn with_entry(value: &str) -> Self {
        Self {
            state: Arc::new(Mutex::new(MemoryState {
                entries: vec![(value.to_string(), None)],
                index: 0,
            })),
            observers: Observers::new(),
        }
    }

    pub fn go(&self, delta: i32) {
        let entry = {
            let mut state = self.state.lock();
            let last = state.entries.len().saturating_sub(1) as i64;
            let target = (state.index as i64 + i64::from(delta)).clamp(0, last);
            state.index = target as usize;
            Self::entry_at(&state)
        };
        self.observers.notify(&entry);
    }

    pub fn back(&self) {
        self.go(-1);
    }

    pub fn forward(&self) {
        self.go(1);
    }

    /// Every stored value, oldest first.
    pub fn entries(&self) -> Vec<String> {
        self.state.lock().entries.iter().map(|(v, _)| v.clone()).collect()
    }

    pub fn index(&self) -> usize {
        self.state.lock().index
    }

    fn entry_at(state: &MemoryState) -> HistoryEntry {
        let (value, entry_state) = state.entries[state.index].clone();
        HistoryEntry {
            value,
            state: entry_state,
            depth: Some(state.index as i64),
        }
    }
}

impl HistorySink for MemoryHistory {
    fn get(&self) -> HistoryEntry {
        Self::entry_at(&self.state.lock())
    }

    fn set(&self, update: HistoryUpdate) {
        let mut state = self.state.lock();
        let index = state.index;
        if update.replace {
            state.entries[index] = (update.value, update.state);
        } else {
            state.entries.truncate(index + 1);
            state.entries.push((update.value, update.state));
            state.index += 1;
        }
    }

    fn subscribe(&self, listener: Box<dyn Fn(HistoryEntry) + Send + Sync>) -> Subscription {
        self.observers.subscribe(move |entry: &HistoryEntry| listener(entry.clone()))
    }

    fn go_delta(&self, delta: i32) -> bool {
        self.go(delta);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn push(history: &MemoryHistory, value: &str) {
        history.set(HistoryUpdate {
            value: value.into(),
            replace: false,
            scroll: true,
            state: None,
        });
    }

    #[test]
    fn test_push_truncates_forward_entries() {
        let history = MemoryHistory::new();
        push(&history, "/a");
        push(&history, "/b");
        history.back();
        push(&history, "/c");
        assert_eq!(history.entries(), vec!["/", "/a", "/c"]);
        assert_eq!(history.get().depth, Some(2));
    }

    #[test]
    fn test_go_clamps_and_notifies() {
        let history = MemoryHistory::new();
        push(&history, "/a");
        let seen = Arc::new(AtomicUsize::new(0));
        let s = Arc::clone(&seen);
        let _sub = history.subscribe(Box::new(move |_| {
            s.fetch_add(1, Ordering::SeqCst);
        }));
        history.go(-10);
        assert_eq!(history.get().value, "/");
        history.go(10);
        assert_eq!(history.get().value, "/a");
        assert_eq!(seen.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_replace_keeps_index() {
        let history = MemoryHistory::new();
        history.set(HistoryUpdate {
            value: "/x".into(),
            replace: true,
            scroll: false,
            state: Some(serde_json::json!({"k": 1})),
        });
        assert_eq!(history.entries(), vec!["/x"]);
        assert_eq!(history.get().state, Some(serde_json::json!({"k": 1})));
    }
}
