//! # Route Definitions
//!
//! A route tree is a list of [`RouteDefinition`]s, each with one or more path
//! alternatives, optional per-parameter match filters, an optional loader, an optional
//! handler name and optional nested children.
//!
//! Trees are usually built in code:
//!
//! ```
//! use brrtnav::definition::RouteDefinition;
//!
//! let routes = vec![
//!     RouteDefinition::new("/users")
//!         .handler("users_layout")
//!         .children(vec![
//!             RouteDefinition::new("/").handler("user_list"),
//!             RouteDefinition::new("/:id").handler("user_detail"),
//!         ]),
//!     RouteDefinition::new("*404").handler("not_found"),
//! ];
//! assert_eq!(routes.len(), 2);
//! ```
//!
//! or loaded from YAML/JSON with [`load_route_config`], binding loader names against a
//! [`LoaderRegistry`]:
//!
//! ```yaml
//! routes:
//!   - path: /users
//!     handler: users_layout
//!     children:
//!       - path: /:id
//!         handler: user_detail
//!         loader: user
//!         match_filters:
//!           id: { regex: "^\\d+$" }
//! ```

use crate::error::RouteConfigError;
use crate::loader::Loader;
use crate::router::{MatchFilter, MatchFilters};
use anyhow::Context;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, info};

static NEXT_ROUTE_KEY: AtomicU64 = AtomicU64::new(1);

/// Identity of a route definition.
///
/// Every route compiled from the same definition (all path alternatives and optional
/// expansions) shares the key; clones of a definition keep it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RouteKey(pub u64);

impl RouteKey {
    fn next() -> Self {
        RouteKey(NEXT_ROUTE_KEY.fetch_add(1, Ordering::Relaxed))
    }
}

/// One node of a declarative route tree.
#[derive(Clone)]
pub struct RouteDefinition {
    pub(crate) key: RouteKey,
    pub(crate) paths: Vec<String>,
    pub(crate) match_filters: Arc<MatchFilters>,
    pub(crate) children: Option<Vec<RouteDefinition>>,
    pub(crate) load: Option<Loader>,
    pub(crate) handler: Option<Arc<str>>,
    pub(crate) info: Option<Value>,
}

impl std::fmt::Debug for RouteDefinition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RouteDefinition")
            .field("key", &self.key)
            .field("paths", &self.paths)
            .field("handler", &self.handler)
            .field("has_loader", &self.load.is_some())
            .field("children", &self.children)
            .finish()
    }
}

impl RouteDefinition {
    /// A definition matching a single path.
    pub fn new(path: impl Into<String>) -> Self {
        Self::with_paths([path.into()])
    }

    /// A definition matching any of several alternative paths.
    pub fn with_paths<I, S>(paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut paths: Vec<String> = paths.into_iter().map(Into::into).collect();
        if paths.is_empty() {
            paths.push(String::new());
        }
        Self {
            key: RouteKey::next(),
            paths,
            match_filters: Arc::new(HashMap::new()),
            children: None,
            load: None,
            handler: None,
            info: None,
        }
    }

    /// A pathless layout definition (matches wherever its children match).
    pub fn layout() -> Self {
        Self::new("")
    }

    /// Nested routes. An empty list makes this definition a leaf.
    #[must_use]
    pub fn children(mut self, children: Vec<RouteDefinition>) -> Self {
        self.children = Some(children);
        self
    }

    /// Attach a filter to a dynamic or splat parameter.
    #[must_use]
    pub fn filter(mut self, param: impl Into<String>, filter: MatchFilter) -> Self {
        Arc::make_mut(&mut self.match_filters).insert(param.into(), filter);
        self
    }

    /// Attach a data loader.
    #[must_use]
    pub fn load(mut self, loader: Loader) -> Self {
        self.load = Some(loader);
        self
    }

    /// Name of the handler rendered for this route.
    #[must_use]
    pub fn handler(mut self, name: impl Into<String>) -> Self {
        self.handler = Some(Arc::from(name.into()));
        self
    }

    /// Free-form metadata carried through to matches.
    #[must_use]
    pub fn info(mut self, info: Value) -> Self {
        self.info = Some(info);
        self
    }

    /// Identity shared by every route compiled from this definition.
    #[must_use]
    pub fn key(&self) -> RouteKey {
        self.key
    }

    /// Path alternatives as declared.
    #[must_use]
    pub fn paths(&self) -> &[String] {
        &self.paths
    }

    /// A definition with no children (or an explicitly empty list) terminates a branch.
    #[must_use]
    pub fn is_leaf(&self) -> bool {
        self.children.as_ref().map_or(true, Vec::is_empty)
    }
}

/// Loaders addressable by name from configuration files.
#[derive(Clone, Default)]
pub struct LoaderRegistry {
    loaders: HashMap<String, Loader>,
}

impl LoaderRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `loader` under `name`, replacing any previous registration.
    pub fn register(&mut self, name: impl Into<String>, loader: Loader) {
        let name = name.into();
        debug!(loader = %name, "Loader registered");
        self.loaders.insert(name, loader);
    }

    /// Look up a loader.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<Loader> {
        self.loaders.get(name).cloned()
    }
}

/// Serializable form of a match filter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FilterConfig {
    /// `id: new`
    Exact(String),
    /// `tab: [profile, settings]`
    OneOf(Vec<String>),
    /// `id: { regex: "^\\d+$" }`
    Regex {
        /// Pattern compiled with the `regex` crate
        regex: String,
    },
}

/// Serializable form of a route tree node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteConfig {
    /// A single path or a list of alternatives
    #[serde(default)]
    pub path: PathConfig,
    /// Handler name
    #[serde(default)]
    pub handler: Option<String>,
    /// Loader name resolved against a [`LoaderRegistry`]
    #[serde(default)]
    pub loader: Option<String>,
    /// Per-parameter filters
    #[serde(default)]
    pub match_filters: HashMap<String, FilterConfig>,
    /// Metadata passed through to matches
    #[serde(default)]
    pub info: Option<Value>,
    /// Nested routes
    #[serde(default)]
    pub children: Option<Vec<RouteConfig>>,
}

/// One path or several alternatives.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PathConfig {
    /// Single path
    One(String),
    /// Alternatives
    Many(Vec<String>),
}

impl Default for PathConfig {
    fn default() -> Self {
        PathConfig::One(String::new())
    }
}

impl PathConfig {
    fn to_vec(&self) -> Vec<String> {
        match self {
            PathConfig::One(p) => vec![p.clone()],
            PathConfig::Many(ps) => ps.clone(),
        }
    }
}

/// Top-level document of a route configuration file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteFile {
    /// Base path the tree is mounted under
    #[serde(default)]
    pub base: Option<String>,
    /// Root routes
    pub routes: Vec<RouteConfig>,
}

impl RouteConfig {
    /// Convert into a definition, resolving loader names against `registry`.
    pub fn into_definition(
        self,
        registry: &LoaderRegistry,
    ) -> Result<RouteDefinition, RouteConfigError> {
        let paths = self.path.to_vec();
        for path in &paths {
            validate_splat(path)?;
        }
        let mut def = RouteDefinition::with_paths(paths.clone());

        for (param, filter) in self.match_filters {
            let filter = match filter {
                FilterConfig::Exact(s) => MatchFilter::Exact(s),
                FilterConfig::OneOf(list) => MatchFilter::OneOf(list),
                FilterConfig::Regex { regex } => {
                    let re = Regex::new(&regex).map_err(|e| RouteConfigError::InvalidFilter {
                        param: param.clone(),
                        reason: e.to_string(),
                    })?;
                    MatchFilter::Regex(re)
                }
            };
            def = def.filter(param, filter);
        }

        if let Some(name) = self.loader {
            let loader = registry
                .get(&name)
                .ok_or_else(|| RouteConfigError::UnknownLoader {
                    path: paths.first().cloned().unwrap_or_default(),
                    loader: name.clone(),
                })?;
            def = def.load(loader);
        }
        if let Some(handler) = self.handler {
            def = def.handler(handler);
        }
        if let Some(info) = self.info {
            def = def.info(info);
        }
        if let Some(children) = self.children {
            let children = children
                .into_iter()
                .map(|c| c.into_definition(registry))
                .collect::<Result<Vec<_>, _>>()?;
            def = def.children(children);
        }
        Ok(def)
    }
}

fn validate_splat(path: &str) -> Result<(), RouteConfigError> {
    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
    let misplaced = segments
        .iter()
        .rev()
        .skip(1)
        .any(|segment| segment.starts_with('*'));
    if misplaced {
        return Err(RouteConfigError::MisplacedSplat {
            path: path.to_string(),
        });
    }
    Ok(())
}

/// Parse a route file from a YAML (or JSON, which is valid YAML) string.
pub fn parse_route_config(content: &str) -> anyhow::Result<RouteFile> {
    let file: RouteFile =
        serde_yaml::from_str(content).context("Failed to parse route configuration")?;
    Ok(file)
}

/// Load a route file from disk and build definitions for it.
///
/// Returns the definitions and the declared base path (empty when absent).
pub fn load_route_config(
    file_path: impl AsRef<Path>,
    registry: &LoaderRegistry,
) -> anyhow::Result<(Vec<RouteDefinition>, String)> {
    let file_path = file_path.as_ref();
    let content = std::fs::read_to_string(file_path)
        .with_context(|| format!("Failed to read route file {}", file_path.display()))?;
    let file = if file_path.extension().is_some_and(|ext| ext == "json") {
        serde_json::from_str(&content).context("Failed to parse route configuration")?
    } else {
        parse_route_config(&content)?
    };

    let base = file.base.unwrap_or_default();
    let definitions = file
        .routes
        .into_iter()
        .map(|r| r.into_definition(registry))
        .collect::<Result<Vec<_>, _>>()?;

    info!(
        file = %file_path.display(),
        roots = definitions.len(),
        base = %base,
        "Route configuration loaded"
    );
    Ok((definitions, base))
}
