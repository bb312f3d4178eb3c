//! The navigator's view of the current URL.

use crate::memo::MemoMap;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::warn;
use url::Url;

/// Origin used to parse router-relative paths.
const MOCK_BASE: &str = "http://sr";

/// A parsed location.
///
/// `search` and `hash` keep their leading `?`/`#`; both are empty when absent.
/// Query parameters are decoded lazily and memoized per key (the last occurrence
/// of a repeated key wins).
#[derive(Clone)]
pub struct Location {
    pub pathname: String,
    pub search: String,
    pub hash: String,
    pub state: Option<Value>,
    pub key: String,
    query: Arc<MemoMap<String>>,
}

impl Location {
    /// Parse `path` relative to the router origin.
    pub fn parse(path: &str, state: Option<Value>) -> Result<Self, url::ParseError> {
        let url = Url::parse(MOCK_BASE)?.join(path)?;
        Ok(Self::from_url(&url, state))
    }

    /// Parse `path`, keeping `previous` when the string is malformed.
    pub fn from_path_or(path: &str, state: Option<Value>, previous: &Location) -> Self {
        match Self::parse(path, state) {
            Ok(location) => location,
            Err(err) => {
                warn!(path = %path, error = %err, "Invalid path, keeping previous location");
                previous.clone()
            }
        }
    }

    /// The root location `/`.
    pub fn root() -> Self {
        Self::with_parts("/".to_string(), String::new(), String::new(), None)
    }

    pub(crate) fn from_url(url: &Url, state: Option<Value>) -> Self {
        let search = url.query().filter(|q| !q.is_empty()).map(|q| format!("?{q}"));
        let hash = url.fragment().filter(|f| !f.is_empty()).map(|f| format!("#{f}"));
        Self::with_parts(
            url.path().to_string(),
            search.unwrap_or_default(),
            hash.unwrap_or_default(),
            state,
        )
    }

    fn with_parts(pathname: String, search: String, hash: String, state: Option<Value>) -> Self {
        let raw = search.trim_start_matches('?').to_string();
        let query = MemoMap::new(move || {
            url::form_urlencoded::parse(raw.as_bytes())
                .into_owned()
                .collect::<HashMap<String, String>>()
        });
        Self {
            pathname,
            search,
            hash,
            state,
            key: String::new(),
            query: Arc::new(query),
        }
    }

    /// Decoded value of query parameter `key`.
    pub fn query(&self, key: &str) -> Option<String> {
        self.query.get(key)
    }

    /// All decoded query parameters.
    pub fn query_map(&self) -> HashMap<String, String> {
        self.query.to_map()
    }

    /// `pathname + search + hash`.
    pub fn href(&self) -> String {
        format!("{}{}{}", self.pathname, self.search, self.hash)
    }
}

impl Default for Location {
    fn default() -> Self {
        Self::root()
    }
}

impl PartialEq for Location {
    fn eq(&self, other: &Self) -> bool {
        self.pathname == other.pathname
            && self.search == other.search
            && self.hash == other.hash
            && self.state == other.state
            && self.key == other.key
    }
}

impl fmt::Debug for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Location")
            .field("pathname", &self.pathname)
            .field("search", &self.search)
            .field("hash", &self.hash)
            .field("state", &self.state)
            .finish()
    }
}
