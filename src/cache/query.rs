use super::core::{LoadFuture, LoaderValue, SharedLoad};
use super::key::cache_key;
use crate::error::{LoadError, NavigationError};
use crate::intent::Intent;
use crate::loader::{DataFuture, LoadContext};
use crate::navigation::NavigateOptions;
use crate::signal::LiveSubscription;
use futures::future::FutureExt;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

type QueryFn = Arc<dyn Fn(&[Value]) -> LoadFuture + Send + Sync>;

/// A named, cached data function.
///
/// Calls are keyed by `name + hash_key(args)`, so every caller passing equal
/// arguments inside the freshness window shares one load.
///
/// ```
/// use brrtnav::cache::{DataCache, LoaderValue, Query};
/// use brrtnav::intent::Intent;
/// use brrtnav::loader::LoadContext;
/// use futures::FutureExt;
/// use serde_json::json;
///
/// let user = Query::new("user", |args| {
///     let id = args[0].clone();
///     async move { Ok(LoaderValue::Data(json!({ "id": id }))) }.boxed()
/// });
///
/// let ctx = LoadContext::new(DataCache::client(), Intent::Navigate);
/// let data = futures::executor::block_on(user.fetch(&ctx, &[json!(7)]));
/// assert_eq!(data, Ok(Some(json!({ "id": 7 }))));
/// assert_eq!(user.key_for(&[json!(7)]), "user[7]");
/// ```
#[derive(Clone)]
pub struct Query {
    name: Arc<str>,
    func: QueryFn,
}

impl Query {
    pub fn new<F>(name: &str, func: F) -> Self
    where
        F: Fn(&[Value]) -> LoadFuture + Send + Sync + 'static,
    {
        Self {
            name: Arc::from(name),
            func: Arc::new(func),
        }
    }

    /// The key prefix shared by every call of this query.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn key_for(&self, args: &[Value]) -> String {
        cache_key(&self.name, args)
    }

    /// Read through the context's cache with the context's intent.
    pub fn fetch(&self, ctx: &LoadContext, args: &[Value]) -> DataFuture {
        let key = self.key_for(args);
        let shared = ctx.cache().read(&key, ctx.intent(), self.invoker(args));
        interpret(ctx.clone(), shared)
    }

    /// A tracking read that keeps the entry live and calls `on_change` when it is
    /// revalidated.
    pub fn subscribe<C>(
        &self,
        ctx: &LoadContext,
        args: &[Value],
        on_change: C,
    ) -> (DataFuture, LiveSubscription)
    where
        C: Fn(&u64) + Send + Sync + 'static,
    {
        let key = self.key_for(args);
        let (shared, live) = ctx
            .cache()
            .subscribe(&key, ctx.intent(), self.invoker(args), on_change);
        (interpret(ctx.clone(), shared), live)
    }

    fn invoker(&self, args: &[Value]) -> impl FnOnce() -> LoadFuture {
        let func = Arc::clone(&self.func);
        let args = args.to_vec();
        move || func(&args)
    }
}

impl fmt::Debug for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Query").field("name", &self.name).finish()
    }
}

/// Turn a cached outcome into loader data, following redirect responses.
///
/// Preloads return the stored value untouched. Otherwise a `Location` starting with
/// `/` navigates (replacing the history entry) and yields no data; any other
/// location is reported as an external redirect.
fn interpret(ctx: LoadContext, shared: SharedLoad) -> DataFuture {
    async move {
        let value = shared.await?;
        let response = match value {
            LoaderValue::Data(data) => return Ok(Some(data)),
            LoaderValue::Response(response) => response,
        };
        if ctx.intent() == Intent::Preload {
            return Ok(response.body);
        }
        let Some(location) = response.location() else {
            return Ok(response.body);
        };
        if !location.starts_with('/') {
            return Err(LoadError::ExternalRedirect {
                location: location.to_string(),
            });
        }
        let options = NavigateOptions {
            replace: true,
            ..NavigateOptions::default()
        };
        match ctx.navigate(location, options) {
            Ok(_) | Err(NavigationError::Detached) => {
                debug!(location = %location, "Loader redirected");
                Ok(None)
            }
            Err(err) => {
                warn!(location = %location, error = %err, "Loader redirect failed");
                Err(LoadError::Navigation(err))
            }
        }
    }
    .boxed()
}
