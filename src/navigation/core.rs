//! The navigator: owns the current location, serializes transitions, detects redirect
//! loops and reconciles history changes made outside the router.
//!
//! # Re-entrancy
//!
//! Loaders, before-leave listeners and location observers all run with no internal
//! lock held, and may navigate again. A loader redirect is exactly that: a nested
//! `navigate` issued while the outer commit is still running its loaders.

use super::before_leave::{BeforeLeave, BeforeLeaveEvent, LeaveTarget};
use super::history::{HistoryEntry, HistorySink, HistoryUpdate};
use super::transition::Transition;
use crate::action::Submissions;
use crate::cache::DataCache;
use crate::definition::RouteKey;
use crate::error::NavigationError;
use crate::ids::TransitionId;
use crate::intent::{ExecutionMode, Intent};
use crate::loader::{LoadArgs, LoadContext, RouteData};
use crate::location::Location;
use crate::memo::MemoMap;
use crate::request::RequestScope;
use crate::router::{merge_params, merge_search_string, resolve_path, RouteMatch, Router};
use crate::signal::{Observers, Subscription};
use futures::future::FutureExt;
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Weak};
use tracing::{debug, info, warn};

/// Pending-transition bound beyond which a navigation is treated as a redirect loop.
pub const MAX_REDIRECTS: usize = 100;

#[derive(Debug, Clone, PartialEq)]
pub struct NavigateOptions {
    /// Replace the current history entry instead of pushing
    pub replace: bool,
    /// Resolve the target against the invoking route (otherwise against the root)
    pub resolve: bool,
    /// Restore scroll position after the write
    pub scroll: bool,
    /// Opaque history state stored with the entry and readable from
    /// [`Location::state`] once the transition commits
    pub state: Option<Value>,
}

impl Default for NavigateOptions {
    fn default() -> Self {
        Self {
            replace: false,
            resolve: true,
            scroll: true,
            state: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NavigateTarget {
    Path(String),
    /// Move through history by this many entries
    Delta(i32),
}

impl From<&str> for NavigateTarget {
    fn from(path: &str) -> Self {
        NavigateTarget::Path(path.to_string())
    }
}

impl From<String> for NavigateTarget {
    fn from(path: String) -> Self {
        NavigateTarget::Path(path)
    }
}

impl From<&String> for NavigateTarget {
    fn from(path: &String) -> Self {
        NavigateTarget::Path(path.clone())
    }
}

impl From<i32> for NavigateTarget {
    fn from(delta: i32) -> Self {
        NavigateTarget::Delta(delta)
    }
}

/// What a call to [`Navigator::navigate`] did.
#[derive(Debug)]
pub enum Navigation {
    /// Same path and state as the current location, or a zero/unsupported delta
    Unchanged,
    /// A before-leave listener vetoed the navigation
    Blocked,
    /// A history traversal was handed to the backend
    Delta(i32),
    /// Server execution: a redirect response was recorded
    Redirected(String),
    /// The location changed; settle the transition to write history
    Started(Transition),
}

impl Navigation {
    pub fn is_started(&self) -> bool {
        matches!(self, Navigation::Started(_))
    }
}

#[derive(Default)]
pub struct NavigatorOptions {
    /// Base path every route is mounted under
    pub base: String,
    pub mode: ExecutionMode,
    /// Request scope for server execution
    pub request: Option<RequestScope>,
    /// Cache loaders read through; defaults to the request's cache on the server and
    /// the process-wide cache on the client
    pub cache: Option<DataCache>,
    /// Share a before-leave registry between navigators
    pub before_leave: Option<BeforeLeave>,
}

/// One matched route kept across navigations.
///
/// When consecutive navigations match the same route definition at the same depth
/// with the same matched path and search string, the route stays active and its
/// loader does not run again.
#[derive(Clone)]
pub struct ActiveRoute {
    pub route_match: RouteMatch,
    search: String,
    data: Option<RouteData>,
}

impl ActiveRoute {
    pub fn key(&self) -> RouteKey {
        self.route_match.route.key
    }

    /// The route loader's outcome, if the route has a loader.
    pub fn data(&self) -> Option<RouteData> {
        self.data.clone()
    }

    fn reusable_for(&self, route_match: &RouteMatch, location: &Location) -> bool {
        self.key() == route_match.route.key
            && self.route_match.path == route_match.path
            && self.search == location.search
    }
}

impl fmt::Debug for ActiveRoute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActiveRoute")
            .field("pattern", &self.route_match.route.pattern)
            .field("path", &self.route_match.path)
            .field("has_data", &self.data.is_some())
            .finish()
    }
}

/// A matched chain loaded ahead of navigation.
#[derive(Default)]
pub struct Preload {
    pub matches: Vec<RouteMatch>,
    pub data: Vec<RouteData>,
}

impl fmt::Debug for Preload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Preload")
            .field("matches", &self.matches)
            .field("loaders", &self.data.len())
            .finish()
    }
}

#[derive(Debug, Clone)]
struct Referrer {
    value: String,
    replace: bool,
    scroll: bool,
    state: Option<Value>,
}

struct NavState {
    reference: String,
    state: Option<Value>,
    location: Location,
    referrers: Vec<Referrer>,
    depth: Option<i64>,
    matches: Arc<Vec<RouteMatch>>,
    active: Arc<Vec<ActiveRoute>>,
    generation: u64,
}

struct Inner {
    router: Arc<Router>,
    sink: Arc<dyn HistorySink>,
    base_path: String,
    mode: ExecutionMode,
    request: Option<RequestScope>,
    cache: DataCache,
    before_leave: BeforeLeave,
    state: Mutex<NavState>,
    params: MemoMap<String>,
    routing: AtomicUsize,
    history_ignore: AtomicBool,
    observers: Arc<Observers<Location>>,
    submissions: Submissions,
    history_subscription: Mutex<Option<Subscription>>,
}

/// Cloneable handle on a navigator.
#[derive(Clone)]
pub struct Navigator {
    inner: Arc<Inner>,
}

/// Non-owning navigator handle, held by loaders and listeners.
#[derive(Clone)]
pub struct WeakNavigator {
    inner: Weak<Inner>,
}

impl WeakNavigator {
    pub fn upgrade(&self) -> Option<Navigator> {
        self.inner.upgrade().map(|inner| Navigator { inner })
    }
}

impl fmt::Debug for WeakNavigator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WeakNavigator")
            .field("alive", &(self.inner.strong_count() > 0))
            .finish()
    }
}

impl Navigator {
    /// Build a navigator over `router`, reading and writing history through `sink`.
    ///
    /// The current history entry is committed with the `Initial` intent, running the
    /// loaders of the routes it matches.
    pub fn new(
        router: Arc<Router>,
        sink: Arc<dyn HistorySink>,
        options: NavigatorOptions,
    ) -> Result<Self, NavigationError> {
        let base_path =
            resolve_path("", &options.base, None).ok_or_else(|| NavigationError::InvalidBasePath {
                base: options.base.clone(),
            })?;
        if sink.get().value.is_empty() {
            sink.set(HistoryUpdate {
                value: base_path.clone(),
                replace: true,
                scroll: false,
                state: None,
            });
        }
        let entry = sink.get();

        let cache = match (options.cache, &options.request) {
            (Some(cache), _) => cache,
            (None, Some(request)) => request.cache().clone(),
            (None, None) if options.mode.is_server() => DataCache::server(),
            (None, None) => DataCache::global(),
        };

        let inner = Arc::new_cyclic(|weak: &Weak<Inner>| {
            let source = weak.clone();
            Inner {
                router,
                sink: Arc::clone(&sink),
                base_path,
                mode: options.mode,
                request: options.request,
                cache,
                before_leave: options.before_leave.unwrap_or_default(),
                state: Mutex::new(NavState {
                    reference: String::new(),
                    state: None,
                    location: Location::root(),
                    referrers: Vec::new(),
                    depth: entry.depth,
                    matches: Arc::new(Vec::new()),
                    active: Arc::new(Vec::new()),
                    generation: 0,
                }),
                params: MemoMap::new(move || {
                    source
                        .upgrade()
                        .map(|inner| {
                            let matches = Arc::clone(&inner.state.lock().matches);
                            merge_params(&matches)
                        })
                        .unwrap_or_default()
                }),
                routing: AtomicUsize::new(0),
                history_ignore: AtomicBool::new(false),
                observers: Observers::new(),
                submissions: Submissions::default(),
                history_subscription: Mutex::new(None),
            }
        });
        let navigator = Navigator { inner };

        let weak = navigator.downgrade();
        let subscription = sink.subscribe(Box::new(move |entry: HistoryEntry| {
            if let Some(navigator) = weak.upgrade() {
                navigator.reconcile_external_change(entry);
            }
        }));
        *navigator.inner.history_subscription.lock() = Some(subscription);

        info!(
            base_path = %navigator.inner.base_path,
            mode = ?navigator.inner.mode,
            initial = %entry.value,
            "Navigator created"
        );
        navigator.commit(entry.value, entry.state, Intent::Initial);
        Ok(navigator)
    }

    /// A handle that does not keep the navigator alive.
    pub fn downgrade(&self) -> WeakNavigator {
        WeakNavigator {
            inner: Arc::downgrade(&self.inner),
        }
    }

    /// Navigate from the root route.
    pub fn navigate(
        &self,
        to: impl Into<NavigateTarget>,
        options: NavigateOptions,
    ) -> Result<Navigation, NavigationError> {
        self.navigate_from(None, to, options)
    }

    /// Navigate from a route whose matched path is `from`; relative targets resolve
    /// against it.
    pub fn navigate_from(
        &self,
        from: Option<&str>,
        to: impl Into<NavigateTarget>,
        options: NavigateOptions,
    ) -> Result<Navigation, NavigationError> {
        let path = match to.into() {
            NavigateTarget::Delta(0) => return Ok(Navigation::Unchanged),
            NavigateTarget::Delta(delta) => {
                if self.inner.sink.go_delta(delta) {
                    debug!(delta, "History traversal requested");
                    return Ok(Navigation::Delta(delta));
                }
                warn!(delta, "History backend does not support relative navigation");
                return Ok(Navigation::Unchanged);
            }
            NavigateTarget::Path(path) => path,
        };

        let resolved = if options.resolve {
            resolve_path(&self.inner.base_path, &path, from)
        } else {
            resolve_path("", &path, None)
        }
        .ok_or_else(|| NavigationError::InvalidPath { path: path.clone() })?;

        let (current, current_state, from_location) = {
            let st = self.inner.state.lock();
            if st.referrers.len() >= MAX_REDIRECTS {
                warn!(
                    to = %resolved,
                    pending = st.referrers.len(),
                    "Redirect loop detected"
                );
                return Err(NavigationError::TooManyRedirects {
                    depth: st.referrers.len(),
                });
            }
            (st.reference.clone(), st.state.clone(), st.location.clone())
        };

        if resolved == current && options.state == current_state {
            debug!(to = %resolved, "Navigation to current location ignored");
            return Ok(Navigation::Unchanged);
        }

        if self.inner.mode.is_server() {
            if let Some(request) = &self.inner.request {
                request.record_redirect(&resolved);
            }
            self.inner.sink.set(HistoryUpdate {
                value: resolved.clone(),
                replace: options.replace,
                scroll: options.scroll,
                state: options.state,
            });
            info!(from = %current, to = %resolved, "Server navigation recorded as redirect");
            return Ok(Navigation::Redirected(resolved));
        }

        if !self.inner.before_leave.confirm(
            &from_location,
            LeaveTarget::Path(resolved.clone()),
            Some(options.clone()),
        ) {
            info!(from = %current, to = %resolved, "Navigation blocked");
            return Ok(Navigation::Blocked);
        }

        let owned_len = {
            let mut st = self.inner.state.lock();
            st.referrers.push(Referrer {
                value: current.clone(),
                replace: options.replace,
                scroll: options.scroll,
                state: current_state,
            });
            st.referrers.len()
        };
        self.inner.routing.fetch_add(1, Ordering::SeqCst);

        let id = TransitionId::new();
        info!(
            transition_id = %id,
            from = %current,
            to = %resolved,
            replace = options.replace,
            pending = owned_len,
            "Navigation started"
        );
        let data = self.commit(resolved.clone(), options.state.clone(), Intent::Navigate);
        Ok(Navigation::Started(Transition::new(
            id,
            self.downgrade(),
            resolved,
            options.state,
            owned_len,
            data,
        )))
    }

    /// Write a settled transition to history if nothing superseded it.
    pub(crate) fn end_transition(
        &self,
        id: TransitionId,
        owned_len: usize,
        target: &str,
        state: &Option<Value>,
    ) -> bool {
        self.inner.routing.fetch_sub(1, Ordering::SeqCst);
        let first = {
            let mut st = self.inner.state.lock();
            if st.referrers.len() != owned_len {
                debug!(
                    transition_id = %id,
                    to = %target,
                    pending = st.referrers.len(),
                    owned = owned_len,
                    "Superseded transition dropped"
                );
                return false;
            }
            let first = st.referrers.first().cloned();
            st.referrers.clear();
            first
        };

        if let Some(first) = first {
            if target != first.value || *state != first.state {
                self.inner.sink.set(HistoryUpdate {
                    value: target.to_string(),
                    replace: first.replace,
                    scroll: first.scroll,
                    state: state.clone(),
                });
            }
        }
        let depth = self.inner.sink.get().depth;
        self.inner.state.lock().depth = depth;
        info!(transition_id = %id, to = %target, "Navigation committed");
        true
    }

    /// React to a history change made outside the navigator (back/forward).
    ///
    /// A traversal vetoed by a before-leave listener is undone with the opposite
    /// traversal, whose own change event is then ignored.
    pub fn reconcile_external_change(&self, entry: HistoryEntry) {
        let (delta, from_location, reference) = {
            let mut st = self.inner.state.lock();
            let delta = match (st.depth, entry.depth) {
                (Some(prev), Some(next)) => next - prev,
                _ => 0,
            };
            st.depth = entry.depth;
            (delta, st.location.clone(), st.reference.clone())
        };

        if self.inner.history_ignore.swap(false, Ordering::SeqCst) {
            debug!(delta, value = %entry.value, "Compensating history change ignored");
            return;
        }

        if delta != 0 {
            let (target, options) = if delta < 0 {
                (LeaveTarget::Delta(delta as i32), None)
            } else {
                (
                    LeaveTarget::Path(entry.value.clone()),
                    Some(NavigateOptions {
                        state: entry.state.clone(),
                        ..NavigateOptions::default()
                    }),
                )
            };
            if !self.inner.before_leave.confirm(&from_location, target, options) {
                info!(delta, value = %entry.value, "History traversal blocked, reverting");
                self.inner.history_ignore.store(true, Ordering::SeqCst);
                if !self.inner.sink.go_delta(-(delta as i32)) {
                    self.inner.history_ignore.store(false, Ordering::SeqCst);
                    warn!(delta, "History backend cannot revert a blocked traversal");
                }
                return;
            }
        }

        if entry.value != reference {
            self.inner.routing.fetch_add(1, Ordering::SeqCst);
            info!(from = %reference, to = %entry.value, delta, "History change committed");
            self.commit(entry.value, entry.state, Intent::Native);
            self.inner.routing.fetch_sub(1, Ordering::SeqCst);
        }
    }

    /// Make `reference` current, match it and activate its routes.
    fn commit(&self, reference: String, state: Option<Value>, intent: Intent) -> Vec<RouteData> {
        let (location, generation) = {
            let mut st = self.inner.state.lock();
            let location = Location::from_path_or(&reference, state.clone(), &st.location);
            st.reference = reference;
            st.state = state;
            st.location = location.clone();
            st.generation += 1;
            (location, st.generation)
        };
        self.inner.submissions.clear();

        let matches = Arc::new(self.inner.router.match_path(&location.pathname));
        let previous = {
            let mut st = self.inner.state.lock();
            st.matches = Arc::clone(&matches);
            Arc::clone(&st.active)
        };
        self.inner.params.invalidate();
        if let Some(request) = &self.inner.request {
            request.record_matches(&matches);
        }

        let active = self.activate(&previous, &matches, &location, intent);
        let data: Vec<RouteData> = active.iter().filter_map(ActiveRoute::data).collect();

        let current = {
            let mut st = self.inner.state.lock();
            if st.generation == generation {
                st.active = Arc::new(active);
                true
            } else {
                false
            }
        };
        if current {
            self.inner.observers.notify(&location);
        } else {
            debug!(pathname = %location.pathname, "Commit superseded while loading");
        }
        data
    }

    fn activate(
        &self,
        previous: &[ActiveRoute],
        matches: &[RouteMatch],
        location: &Location,
        intent: Intent,
    ) -> Vec<ActiveRoute> {
        let params = merge_params(matches);
        matches
            .iter()
            .enumerate()
            .map(|(depth, route_match)| {
                if let Some(prev) = previous.get(depth) {
                    if prev.reusable_for(route_match, location) {
                        debug!(depth, pattern = %route_match.route.pattern, "Route kept active");
                        return ActiveRoute {
                            route_match: route_match.clone(),
                            search: location.search.clone(),
                            data: prev.data.clone(),
                        };
                    }
                }
                let data = route_match.route.load.as_ref().map(|load| {
                    let args = LoadArgs {
                        params: params.clone(),
                        location: location.clone(),
                        intent,
                        context: LoadContext::new(self.inner.cache.clone(), intent)
                            .with_navigator(self),
                    };
                    load(args).shared()
                });
                ActiveRoute {
                    route_match: route_match.clone(),
                    search: location.search.clone(),
                    data,
                }
            })
            .collect()
    }

    /// Match `url` without navigating and, with `preload_data`, start the loaders of
    /// every matched route with the `Preload` intent.
    pub fn preload_route(&self, url: &str, preload_data: bool) -> Result<Preload, NavigationError> {
        let location = Location::parse(url, None)
            .map_err(|_| NavigationError::InvalidPath { path: url.to_string() })?;
        let matches = self.inner.router.match_path(&location.pathname);
        let mut data = Vec::new();
        if preload_data {
            for route_match in &matches {
                let Some(load) = &route_match.route.load else {
                    continue;
                };
                let params: HashMap<String, String> = route_match
                    .params
                    .iter()
                    .map(|(k, v)| (k.to_string(), v.clone()))
                    .collect();
                let args = LoadArgs {
                    params,
                    location: location.clone(),
                    intent: Intent::Preload,
                    context: LoadContext::new(self.inner.cache.clone(), Intent::Preload)
                        .with_navigator(self),
                };
                data.push(load(args).shared());
            }
        }
        debug!(url = %url, depth = matches.len(), loaders = data.len(), "Route preloaded");
        Ok(Preload { matches, data })
    }

    /// Merge `params` into the current search string and navigate there without
    /// scrolling.
    pub fn set_search_params(
        &self,
        params: &[(&str, Option<&str>)],
    ) -> Result<Navigation, NavigationError> {
        self.set_search_params_with(
            params,
            NavigateOptions {
                scroll: false,
                resolve: false,
                ..NavigateOptions::default()
            },
        )
    }

    pub fn set_search_params_with(
        &self,
        params: &[(&str, Option<&str>)],
        options: NavigateOptions,
    ) -> Result<Navigation, NavigationError> {
        let location = self.location();
        let search = merge_search_string(&location.search, params);
        let target = format!("{}{}{}", location.pathname, search, location.hash);
        self.navigate(target, options)
    }

    /// Resolve `to` the way [`navigate_from`](Self::navigate_from) would.
    pub fn resolve(&self, to: &str, from: Option<&str>) -> Option<String> {
        resolve_path(&self.inner.base_path, to, from)
    }

    /// The last committed location, including its history state.
    pub fn location(&self) -> Location {
        self.inner.state.lock().location.clone()
    }

    /// The current matched chain, root first.
    pub fn matches(&self) -> Arc<Vec<RouteMatch>> {
        Arc::clone(&self.inner.state.lock().matches)
    }

    /// Per-level route state for the matched chain, root first, with loader
    /// data wired to the cache.
    pub fn active_routes(&self) -> Arc<Vec<ActiveRoute>> {
        Arc::clone(&self.inner.state.lock().active)
    }

    /// Loader outcome of the active route at `depth`.
    pub fn route_data(&self, depth: usize) -> Option<RouteData> {
        self.inner.state.lock().active.get(depth).and_then(ActiveRoute::data)
    }

    /// Parameters merged across the matched chain (inner routes win).
    pub fn params(&self) -> HashMap<String, String> {
        self.inner.params.to_map()
    }

    pub fn param(&self, name: &str) -> Option<String> {
        self.inner.params.get(name)
    }

    /// Whether a transition is in flight.
    pub fn is_routing(&self) -> bool {
        self.inner.routing.load(Ordering::SeqCst) > 0
    }

    /// Observe committed location changes.
    pub fn subscribe(&self, listener: impl Fn(&Location) + Send + Sync + 'static) -> Subscription {
        self.inner.observers.subscribe(listener)
    }

    pub fn before_leave(&self) -> &BeforeLeave {
        &self.inner.before_leave
    }

    /// Register a listener that may veto navigations away from the current location.
    pub fn on_before_leave(
        &self,
        listener: impl Fn(&BeforeLeaveEvent) + Send + Sync + 'static,
    ) -> Subscription {
        self.inner.before_leave.subscribe(self, listener)
    }

    /// Action submissions tracked by this navigator.
    pub fn submissions(&self) -> &Submissions {
        &self.inner.submissions
    }

    /// The loader cache shared by routes and actions.
    pub fn cache(&self) -> &DataCache {
        &self.inner.cache
    }

    pub fn router(&self) -> &Arc<Router> {
        &self.inner.router
    }

    /// Normalized base path; empty when mounted at the root.
    pub fn base_path(&self) -> &str {
        &self.inner.base_path
    }

    /// Whether this navigator renders on the client or serves a single request.
    pub fn mode(&self) -> ExecutionMode {
        self.inner.mode
    }

    pub fn request(&self) -> Option<&RequestScope> {
        self.inner.request.as_ref()
    }
}

impl fmt::Debug for Navigator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let st = self.inner.state.lock();
        f.debug_struct("Navigator")
            .field("location", &st.location.href())
            .field("pending", &st.referrers.len())
            .field("mode", &self.inner.mode)
            .finish()
    }
}
