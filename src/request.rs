//! Per-request state for server execution.
//!
//! Server-side navigation never touches a process-wide cache: each request gets its own
//! [`DataCache`], a manifest of the routes it matched, and the redirect response a
//! navigation during rendering produced.

use crate::cache::DataCache;
use crate::ids::RequestId;
use crate::response::{redirect, Response};
use crate::router::RouteMatch;
use http::StatusCode;
use parking_lot::Mutex;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

/// Serializable record of one matched route.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MatchManifest {
    /// Path as declared
    pub path: String,
    /// Compiled pattern
    pub pattern: String,
    /// Portion of the pathname matched
    pub matched: String,
    pub params: HashMap<String, String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub info: Option<Value>,
}

impl From<&RouteMatch> for MatchManifest {
    fn from(m: &RouteMatch) -> Self {
        Self {
            path: m.route.original_path.clone(),
            pattern: m.route.pattern.clone(),
            matched: m.path.clone(),
            params: m
                .params
                .iter()
                .map(|(k, v)| (k.to_string(), v.clone()))
                .collect(),
            info: m.route.info.clone(),
        }
    }
}

struct Inner {
    id: RequestId,
    cache: DataCache,
    matches: Mutex<Option<Vec<MatchManifest>>>,
    response: Mutex<Option<Response>>,
}

#[derive(Clone)]
pub struct RequestScope {
    inner: Arc<Inner>,
}

impl Default for RequestScope {
    fn default() -> Self {
        Self::new()
    }
}

impl RequestScope {
    pub fn new() -> Self {
        Self::with_id(RequestId::new())
    }

    pub fn with_id(id: RequestId) -> Self {
        Self {
            inner: Arc::new(Inner {
                id,
                cache: DataCache::server(),
                matches: Mutex::new(None),
                response: Mutex::new(None),
            }),
        }
    }

    pub fn id(&self) -> RequestId {
        self.inner.id
    }

    /// The request's own cache.
    pub fn cache(&self) -> &DataCache {
        &self.inner.cache
    }

    /// Record the matched chain. Only the first match of a request is kept.
    pub fn record_matches(&self, matches: &[RouteMatch]) {
        let mut slot = self.inner.matches.lock();
        if slot.is_none() {
            debug!(request_id = %self.inner.id, depth = matches.len(), "Request matches recorded");
            *slot = Some(matches.iter().map(MatchManifest::from).collect());
        }
    }

    pub fn matches(&self) -> Vec<MatchManifest> {
        self.inner.matches.lock().clone().unwrap_or_default()
    }

    /// Record a `302` redirect to `location`.
    pub fn record_redirect(&self, location: &str) {
        match redirect(location, StatusCode::FOUND) {
            Ok(response) => {
                debug!(request_id = %self.inner.id, location = %location, "Redirect recorded");
                *self.inner.response.lock() = Some(response);
            }
            Err(err) => {
                warn!(request_id = %self.inner.id, location = %location, error = %err, "Redirect not recorded");
            }
        }
    }

    /// The response recorded for this request, if any.
    pub fn response(&self) -> Option<Response> {
        self.inner.response.lock().clone()
    }
}

impl fmt::Debug for RequestScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestScope")
            .field("id", &self.inner.id)
            .field("cache", &self.inner.cache)
            .finish()
    }
}
