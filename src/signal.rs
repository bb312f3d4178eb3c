//! Publish/subscribe primitives standing in for reactive signals.
//!
//! Listeners are invoked outside of any internal lock, so a listener may subscribe,
//! unsubscribe or trigger further notifications.

use parking_lot::Mutex;
use std::fmt;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Weak};

/// Guard returned by every `subscribe`. Dropping it unsubscribes.
#[must_use = "dropping a Subscription unsubscribes immediately"]
pub struct Subscription {
    unsubscribe: Option<Box<dyn FnOnce() + Send + Sync>>,
}

impl Subscription {
    pub fn new(unsubscribe: impl FnOnce() + Send + Sync + 'static) -> Self {
        Self {
            unsubscribe: Some(Box::new(unsubscribe)),
        }
    }

    /// A subscription with nothing to undo.
    pub fn noop() -> Self {
        Self { unsubscribe: None }
    }

    /// Keep the listener registered for the lifetime of its source.
    pub fn detach(mut self) {
        self.unsubscribe = None;
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(f) = self.unsubscribe.take() {
            f();
        }
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.unsubscribe.is_some())
            .finish()
    }
}

type Listener<T> = Arc<dyn Fn(&T) + Send + Sync>;

/// A set of listeners notified with a shared value.
pub struct Observers<T> {
    next_id: AtomicU64,
    listeners: Mutex<Vec<(u64, Listener<T>)>>,
}

impl<T: 'static> Observers<T> {
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            next_id: AtomicU64::new(1),
            listeners: Mutex::new(Vec::new()),
        })
    }

    /// Register `listener`; it stays registered until the returned guard drops.
    pub fn subscribe(self: &Arc<Self>, listener: impl Fn(&T) + Send + Sync + 'static) -> Subscription {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.listeners.lock().push((id, Arc::new(listener)));
        let weak: Weak<Self> = Arc::downgrade(self);
        Subscription::new(move || {
            if let Some(observers) = weak.upgrade() {
                observers.listeners.lock().retain(|(lid, _)| *lid != id);
            }
        })
    }

    /// Call every listener registered at the time of the call.
    pub fn notify(&self, value: &T) {
        let snapshot: Vec<Listener<T>> = self
            .listeners
            .lock()
            .iter()
            .map(|(_, l)| Arc::clone(l))
            .collect();
        for listener in snapshot {
            listener(value);
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.listeners.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Versioned change signal with a live-subscriber count, attached to each cache entry.
pub struct ChangeSignal {
    version: AtomicU64,
    live: AtomicUsize,
    observers: Arc<Observers<u64>>,
}

impl ChangeSignal {
    #[must_use]
    pub fn new(version: u64) -> Arc<Self> {
        Arc::new(Self {
            version: AtomicU64::new(version),
            live: AtomicUsize::new(0),
            observers: Observers::new(),
        })
    }

    #[must_use]
    pub fn version(&self) -> u64 {
        self.version.load(Ordering::Acquire)
    }

    /// Publish a new version to every observer.
    pub fn bump(&self, version: u64) {
        self.version.store(version, Ordering::Release);
        self.observers.notify(&version);
    }

    /// Number of live subscribers.
    #[must_use]
    pub fn live(&self) -> usize {
        self.live.load(Ordering::Acquire)
    }

    /// Observe version changes without affecting the live count.
    pub fn observe(&self, listener: impl Fn(&u64) + Send + Sync + 'static) -> Subscription {
        self.observers.subscribe(listener)
    }

    pub(crate) fn retain(self: &Arc<Self>) -> LiveSubscription {
        self.live.fetch_add(1, Ordering::AcqRel);
        LiveSubscription {
            signal: Arc::clone(self),
            observer: None,
        }
    }
}

/// A live reader of a cache entry. Keeps the entry fresh and out of the sweep
/// until dropped.
#[must_use = "dropping a LiveSubscription releases the entry immediately"]
pub struct LiveSubscription {
    signal: Arc<ChangeSignal>,
    observer: Option<Subscription>,
}

impl LiveSubscription {
    pub(crate) fn with_observer(mut self, observer: Subscription) -> Self {
        self.observer = Some(observer);
        self
    }

    /// Version of the entry's change signal.
    #[must_use]
    pub fn version(&self) -> u64 {
        self.signal.version()
    }
}

impl Drop for LiveSubscription {
    fn drop(&mut self) {
        self.observer.take();
        self.signal.live.fetch_sub(1, Ordering::AcqRel);
    }
}

impl fmt::Debug for LiveSubscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LiveSubscription")
            .field("version", &self.signal.version())
            .field("live", &self.signal.live())
            .finish()
    }
}
