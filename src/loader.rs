//! Loader plumbing: the function type routes attach, the arguments it receives and
//! the context it uses to reach the cache and the navigator.
//!
//! Loaders return boxed futures. Futures are lazy, so the navigator keeps each route's
//! data as a [`RouteData`] shared handle: whoever awaits first drives the load, every
//! other holder observes the same outcome.

use crate::cache::DataCache;
use crate::error::{LoadError, NavigationError};
use crate::intent::Intent;
use crate::location::Location;
use crate::navigation::{NavigateOptions, NavigateTarget, Navigation, Navigator, WeakNavigator};
use futures::future::{BoxFuture, FutureExt, Shared};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

/// Outcome of a route loader: optional data or a failure.
pub type DataResult = Result<Option<Value>, LoadError>;

/// Boxed future produced by a route loader.
pub type DataFuture = BoxFuture<'static, DataResult>;

/// Shared handle on a route loader's outcome.
pub type RouteData = Shared<DataFuture>;

/// A route loader.
pub type Loader = Arc<dyn Fn(LoadArgs) -> DataFuture + Send + Sync>;

/// Wrap a closure as a [`Loader`].
pub fn loader<F>(f: F) -> Loader
where
    F: Fn(LoadArgs) -> DataFuture + Send + Sync + 'static,
{
    Arc::new(f)
}

/// An already-resolved loader result.
#[must_use]
pub fn ready(value: Option<Value>) -> DataFuture {
    futures::future::ready(Ok(value)).boxed()
}

/// Arguments handed to a route loader.
#[derive(Clone)]
pub struct LoadArgs {
    /// Parameters merged across the matched chain (inner routes win)
    pub params: HashMap<String, String>,
    /// The location being loaded
    pub location: Location,
    /// Why the load is happening
    pub intent: Intent,
    /// Cache and navigator access for this load
    pub context: LoadContext,
}

/// Per-load context threading the intent, the cache and the navigator explicitly.
#[derive(Clone)]
pub struct LoadContext {
    cache: DataCache,
    intent: Intent,
    navigator: Option<WeakNavigator>,
}

impl LoadContext {
    /// A context with no navigator: redirect signals are reported, not followed.
    #[must_use]
    pub fn new(cache: DataCache, intent: Intent) -> Self {
        Self {
            cache,
            intent,
            navigator: None,
        }
    }

    /// Attach the navigator that redirect signals should drive.
    #[must_use]
    pub fn with_navigator(mut self, navigator: &Navigator) -> Self {
        self.navigator = Some(navigator.downgrade());
        self
    }

    #[must_use]
    pub fn cache(&self) -> &DataCache {
        &self.cache
    }

    #[must_use]
    pub fn intent(&self) -> Intent {
        self.intent
    }

    /// The navigator, if one is attached and still alive.
    #[must_use]
    pub fn navigator(&self) -> Option<Navigator> {
        self.navigator.as_ref().and_then(WeakNavigator::upgrade)
    }

    /// Navigate through the attached navigator.
    pub fn navigate(
        &self,
        to: impl Into<NavigateTarget>,
        options: NavigateOptions,
    ) -> Result<Navigation, NavigationError> {
        self.navigator()
            .ok_or(NavigationError::Detached)?
            .navigate(to, options)
    }
}
