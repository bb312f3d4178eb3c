//! Mutations and their submissions.
//!
//! An [`Action`] wraps an asynchronous mutation. Each call records a [`Submission`] on
//! the navigator so callers can observe pending state, the result or the error, and
//! retry or clear it. Results are run through [`handle_response`], which applies
//! revalidation headers, seeds the cache from single-flight payloads and follows
//! redirects. Submissions are cleared whenever a navigation commits.

use crate::cache::{hash_key, KeyFilter, LoadFuture, LoadResult, LoaderValue};
use crate::error::LoadError;
use crate::loader::DataFuture;
use crate::navigation::{NavigateOptions, Navigator, WeakNavigator};
use crate::response::SINGLE_FLIGHT_VALUE_KEY;
use crate::router::merge_search_string;
use futures::future::FutureExt;
use parking_lot::Mutex;
use serde_json::Value;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};
use url::Url;

static NEXT_SUBMISSION_ID: AtomicU64 = AtomicU64::new(1);

type ActionFn = Arc<dyn Fn(Vec<Value>) -> LoadFuture + Send + Sync>;

/// A named mutation, addressed by `https://action/{name}`.
#[derive(Clone)]
pub struct Action {
    url: String,
    func: ActionFn,
    bound: Vec<Value>,
}

impl Action {
    pub fn new<F>(name: &str, func: F) -> Self
    where
        F: Fn(Vec<Value>) -> LoadFuture + Send + Sync + 'static,
    {
        Self {
            url: format!("https://action/{name}"),
            func: Arc::new(func),
            bound: Vec::new(),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Bind leading arguments. The bound action gets its own url, distinguished by an
    /// `args` query parameter, so its submissions are tracked separately.
    #[must_use]
    pub fn with(&self, args: Vec<Value>) -> Action {
        let url = url_with_args(&self.url, &args);
        let mut bound = self.bound.clone();
        bound.extend(args);
        Action {
            url,
            func: Arc::clone(&self.func),
            bound,
        }
    }

    /// Run the mutation with `input` appended to the bound arguments, recording a
    /// submission on `navigator`.
    pub fn submit(&self, navigator: &Navigator, input: Vec<Value>) -> DataFuture {
        let mut variables = self.bound.clone();
        variables.extend(input);
        let submission = Submission::new(
            self.url.clone(),
            variables.clone(),
            Arc::clone(&self.func),
            navigator.downgrade(),
        );
        navigator.submissions().push(submission.clone());
        info!(url = %self.url, submission_id = submission.id(), "Action submitted");
        let pending = (self.func)(variables);
        submission.drive(pending)
    }
}

impl fmt::Debug for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Action")
            .field("url", &self.url)
            .field("bound", &self.bound)
            .finish()
    }
}

fn url_with_args(url: &str, args: &[Value]) -> String {
    let hash = hash_key(args);
    match Url::parse(url) {
        Ok(parsed) => {
            let search = parsed.query().map(|q| format!("?{q}")).unwrap_or_default();
            let merged = merge_search_string(&search, &[("args", Some(hash.as_str()))]);
            format!(
                "{}{}{}",
                parsed.origin().ascii_serialization(),
                parsed.path(),
                merged
            )
        }
        Err(_) => format!("{url}?args={}", urlencoding::encode(&hash)),
    }
}

struct SubmissionInner {
    id: u64,
    url: String,
    input: Vec<Value>,
    outcome: Mutex<Option<Result<Value, LoadError>>>,
    func: ActionFn,
    navigator: WeakNavigator,
}

/// One call of an action.
#[derive(Clone)]
pub struct Submission {
    inner: Arc<SubmissionInner>,
}

impl Submission {
    fn new(url: String, input: Vec<Value>, func: ActionFn, navigator: WeakNavigator) -> Self {
        Self {
            inner: Arc::new(SubmissionInner {
                id: NEXT_SUBMISSION_ID.fetch_add(1, Ordering::Relaxed),
                url,
                input,
                outcome: Mutex::new(None),
                func,
                navigator,
            }),
        }
    }

    pub fn id(&self) -> u64 {
        self.inner.id
    }

    pub fn url(&self) -> &str {
        &self.inner.url
    }

    pub fn input(&self) -> &[Value] {
        &self.inner.input
    }

    pub fn result(&self) -> Option<Value> {
        match &*self.inner.outcome.lock() {
            Some(Ok(value)) => Some(value.clone()),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<LoadError> {
        match &*self.inner.outcome.lock() {
            Some(Err(err)) => Some(err.clone()),
            _ => None,
        }
    }

    pub fn pending(&self) -> bool {
        self.inner.outcome.lock().is_none()
    }

    /// Remove this submission from the navigator.
    pub fn clear(&self) {
        if let Some(navigator) = self.inner.navigator.upgrade() {
            navigator.submissions().remove(self.inner.id);
        }
    }

    /// Run the mutation again with the same input.
    pub fn retry(&self) -> DataFuture {
        self.inner.outcome.lock().take();
        debug!(url = %self.inner.url, submission_id = self.inner.id, "Submission retried");
        let pending = (self.inner.func)(self.inner.input.clone());
        self.clone().drive(pending)
    }

    fn drive(self, pending: LoadFuture) -> DataFuture {
        async move {
            let outcome = pending.await;
            let Some(navigator) = self.inner.navigator.upgrade() else {
                return Err(LoadError::Navigation(
                    crate::error::NavigationError::Detached,
                ));
            };
            match handle_response(&navigator, outcome) {
                None => {
                    self.clear();
                    Ok(None)
                }
                Some(Ok(data)) => {
                    *self.inner.outcome.lock() = Some(Ok(data.clone()));
                    Ok(Some(data))
                }
                Some(Err(err)) => {
                    warn!(url = %self.inner.url, error = %err, "Submission failed");
                    *self.inner.outcome.lock() = Some(Err(err.clone()));
                    Err(err)
                }
            }
        }
        .boxed()
    }
}

impl fmt::Debug for Submission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Submission")
            .field("id", &self.inner.id)
            .field("url", &self.inner.url)
            .field("input", &self.inner.input)
            .field("pending", &self.pending())
            .finish()
    }
}

/// Submissions recorded on a navigator, oldest first.
#[derive(Clone, Default)]
pub struct Submissions {
    inner: Arc<Mutex<Vec<Submission>>>,
}

impl Submissions {
    pub fn all(&self) -> Vec<Submission> {
        self.inner.lock().clone()
    }

    /// Submissions of the action addressed by `url`.
    pub fn for_url(&self, url: &str) -> Vec<Submission> {
        self.inner
            .lock()
            .iter()
            .filter(|s| s.url() == url)
            .cloned()
            .collect()
    }

    /// The most recent submission of the action addressed by `url`.
    pub fn latest(&self, url: &str) -> Option<Submission> {
        self.inner.lock().iter().rev().find(|s| s.url() == url).cloned()
    }

    /// Whether any submission of `url` is still running.
    pub fn pending(&self, url: &str) -> bool {
        self.inner
            .lock()
            .iter()
            .any(|s| s.url() == url && s.pending())
    }

    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub(crate) fn push(&self, submission: Submission) {
        self.inner.lock().push(submission);
    }

    pub(crate) fn remove(&self, id: u64) {
        self.inner.lock().retain(|s| s.id() != id);
    }

    pub(crate) fn clear(&self) {
        self.inner.lock().clear();
    }
}

impl fmt::Debug for Submissions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.inner.lock().iter()).finish()
    }
}

/// Apply the side effects of an action outcome and extract its data.
///
/// - Errors pass through untouched.
/// - `X-Revalidate` names the key prefixes to invalidate and revalidate; without it,
///   every key is.
/// - Single-flight bodies seed the cache with each top-level key and yield the value
///   stored under `_$value`.
/// - A `Location` navigates; absolute `http` locations are reported as
///   [`LoadError::ExternalRedirect`].
///
/// Returns `None` when there is no data to report.
pub fn handle_response(navigator: &Navigator, outcome: LoadResult) -> Option<Result<Value, LoadError>> {
    let cache = navigator.cache();
    let (data, keys, invalidate, location) = match outcome {
        Err(err) => return Some(Err(err)),
        Ok(LoaderValue::Data(data)) => (Some(data), None, None, None),
        Ok(LoaderValue::Response(response)) => {
            let mut keys = response.revalidate_keys();
            let mut invalidate = keys.clone();
            let mut data = response.body.clone();
            if response.is_single_flight() {
                let seeded = keys.get_or_insert_with(Vec::new);
                invalidate.get_or_insert_with(Vec::new);
                match data.take() {
                    Some(Value::Object(map)) => {
                        for (key, value) in map {
                            if key == SINGLE_FLIGHT_VALUE_KEY {
                                data = Some(value);
                                continue;
                            }
                            cache.write(&key, LoaderValue::Data(value));
                            seeded.push(key);
                        }
                    }
                    other => data = other,
                }
            }
            let location = response
                .location()
                .map(|l| if l.is_empty() { "/".to_string() } else { l.to_string() });
            (data, keys, invalidate, location)
        }
    };

    cache.invalidate(KeyFilter::from(invalidate));
    cache.revalidate(KeyFilter::from(keys), false);

    if let Some(location) = location {
        if location.starts_with("http") {
            return Some(Err(LoadError::ExternalRedirect { location }));
        }
        if let Err(err) = navigator.navigate(location.as_str(), NavigateOptions::default()) {
            return Some(Err(err.into()));
        }
    }

    data.filter(|v| !v.is_null()).map(Ok)
}
