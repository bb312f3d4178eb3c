use super::core::{NavigateOptions, NavigateTarget, Navigator, WeakNavigator};
use crate::location::Location;
use crate::signal::Subscription;
use parking_lot::Mutex;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};

/// Where a guarded navigation is headed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LeaveTarget {
    Path(String),
    /// A history traversal (back/forward) by this many entries
    Delta(i32),
}

type RetryFn = Arc<dyn Fn(bool) + Send + Sync>;

/// Handle to re-attempt a vetoed navigation later.
#[derive(Clone)]
pub struct RetryHandle(RetryFn);

impl RetryHandle {
    /// Navigate to the vetoed target again. With `force`, the next confirmation is
    /// skipped so listeners are not asked twice.
    pub fn retry(&self, force: bool) {
        (self.0)(force);
    }
}

impl fmt::Debug for RetryHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("RetryHandle")
    }
}

/// Delivered to before-leave listeners. Calling [`prevent_default`](Self::prevent_default)
/// vetoes the navigation for every listener.
pub struct BeforeLeaveEvent {
    pub from: Location,
    pub to: LeaveTarget,
    pub options: Option<NavigateOptions>,
    prevented: Arc<AtomicBool>,
    retry: RetryHandle,
}

impl BeforeLeaveEvent {
    pub fn prevent_default(&self) {
        self.prevented.store(true, Ordering::SeqCst);
    }

    pub fn default_prevented(&self) -> bool {
        self.prevented.load(Ordering::SeqCst)
    }

    pub fn retry(&self, force: bool) {
        self.retry.retry(force);
    }

    /// Keep the retry past the listener call, e.g. until a confirmation resolves.
    pub fn retry_handle(&self) -> RetryHandle {
        self.retry.clone()
    }
}

impl fmt::Debug for BeforeLeaveEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BeforeLeaveEvent")
            .field("from", &self.from.pathname)
            .field("to", &self.to)
            .field("prevented", &self.default_prevented())
            .finish()
    }
}

type Listener = Arc<dyn Fn(&BeforeLeaveEvent) + Send + Sync>;

struct Registered {
    id: u64,
    listener: Listener,
    navigator: WeakNavigator,
}

#[derive(Default)]
struct Inner {
    next_id: AtomicU64,
    listeners: Mutex<Vec<Registered>>,
    ignore: Arc<AtomicBool>,
}

/// Registry of listeners that may veto navigations away from the current location.
#[derive(Clone, Default)]
pub struct BeforeLeave {
    inner: Arc<Inner>,
}

impl BeforeLeave {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `listener`; retries it issues go through `navigator`.
    pub fn subscribe(
        &self,
        navigator: &Navigator,
        listener: impl Fn(&BeforeLeaveEvent) + Send + Sync + 'static,
    ) -> Subscription {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        self.inner.listeners.lock().push(Registered {
            id,
            listener: Arc::new(listener),
            navigator: navigator.downgrade(),
        });
        let weak = Arc::downgrade(&self.inner);
        Subscription::new(move || {
            if let Some(inner) = weak.upgrade() {
                inner.listeners.lock().retain(|r| r.id != id);
            }
        })
    }

    /// Ask every listener about leaving `from` for `to`. Returns `false` on veto.
    ///
    /// A pending forced retry consumes this call and allows the navigation.
    pub fn confirm(
        &self,
        from: &Location,
        to: LeaveTarget,
        options: Option<NavigateOptions>,
    ) -> bool {
        if self.inner.ignore.swap(false, Ordering::SeqCst) {
            debug!(to = ?to, "Before-leave confirmation skipped by forced retry");
            return true;
        }

        let snapshot: Vec<(Listener, WeakNavigator)> = self
            .inner
            .listeners
            .lock()
            .iter()
            .map(|r| (Arc::clone(&r.listener), r.navigator.clone()))
            .collect();

        let prevented = Arc::new(AtomicBool::new(false));
        for (listener, navigator) in snapshot {
            let event = BeforeLeaveEvent {
                from: from.clone(),
                to: to.clone(),
                options: options.clone(),
                prevented: Arc::clone(&prevented),
                retry: self.retry_for(navigator, to.clone(), options.clone()),
            };
            listener(&event);
        }
        !prevented.load(Ordering::SeqCst)
    }

    pub fn len(&self) -> usize {
        self.inner.listeners.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn retry_for(
        &self,
        navigator: WeakNavigator,
        to: LeaveTarget,
        options: Option<NavigateOptions>,
    ) -> RetryHandle {
        let ignore = Arc::clone(&self.inner.ignore);
        RetryHandle(Arc::new(move |force: bool| {
            if force {
                ignore.store(true, Ordering::SeqCst);
            }
            let Some(navigator) = navigator.upgrade() else {
                warn!("Retry after navigator was dropped");
                return;
            };
            let target = match &to {
                LeaveTarget::Path(path) => NavigateTarget::Path(path.clone()),
                LeaveTarget::Delta(delta) => NavigateTarget::Delta(*delta),
            };
            let options = NavigateOptions {
                resolve: false,
                ..options.clone().unwrap_or_default()
            };
            if let Err(err) = navigator.navigate(target, options) {
                warn!(error = %err, "Retried navigation failed");
            }
        }))
    }
}

impl fmt::Debug for BeforeLeave {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BeforeLeave")
            .field("listeners", &self.len())
            .field("ignore_next", &self.inner.ignore.load(Ordering::SeqCst))
            .finish()
    }
}
