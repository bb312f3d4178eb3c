//! Router core module - the matching hot path.
//!
//! # JSF Compliance (Rule 206)
//!
//! Matching is performed on every navigation and preload. The following clippy lints
//! are denied to keep needless allocations out of it:

#![deny(clippy::inefficient_to_string)]
#![deny(clippy::format_push_string)]
#![deny(clippy::unnecessary_to_owned)]

use super::branch::{create_branches, get_route_matches, Branch, RouteMatch};
use super::path::resolve_path;
use super::pattern::{expand_optionals, MatchFilters, PathMatch, PathMatcher};
use crate::definition::RouteDefinition;
use crate::error::NavigationError;
use arc_swap::ArcSwap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// A compiled, ranked route table.
#[derive(Debug)]
pub struct RouteTable {
    branches: Vec<Branch>,
    base_path: String,
    generation: u64,
}

impl RouteTable {
    fn build(defs: &[RouteDefinition], base_path: &str, generation: u64) -> Self {
        let branches = create_branches(defs, base_path);

        let routes_summary: Vec<String> = branches
            .iter()
            .take(10)
            .filter_map(|b| b.leaf().map(|leaf| format!("{} ({})", leaf.pattern, b.score())))
            .collect();

        info!(
            branches_count = branches.len(),
            base_path = %base_path,
            generation,
            routes_summary = ?routes_summary,
            "Route table compiled"
        );

        Self {
            branches,
            base_path: base_path.to_string(),
            generation,
        }
    }

    /// Branches in score order.
    #[must_use]
    pub fn branches(&self) -> &[Branch] {
        &self.branches
    }

    #[must_use]
    pub fn base_path(&self) -> &str {
        &self.base_path
    }

    /// Incremented each time the route tree is replaced.
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.generation
    }
}

/// Router holding the ranked branches of a route tree.
///
/// The table sits behind an [`ArcSwap`] so conditional route trees can be replaced
/// while readers keep matching against a consistent snapshot.
pub struct Router {
    table: ArcSwap<RouteTable>,
}

impl Router {
    /// Compile `defs` mounted under `base`.
    ///
    /// The base is normalized. An unroutable base (one carrying a scheme) mounts at
    /// the root with a warning; use [`try_new`](Self::try_new) to reject it the way
    /// [`Navigator::new`](crate::navigation::Navigator::new) does.
    #[must_use]
    pub fn new(defs: &[RouteDefinition], base: &str) -> Self {
        let base_path = mount_path(base).unwrap_or_else(|| {
            warn!(base = %base, "Unroutable base path, mounting at root");
            String::new()
        });
        Self::mounted(defs, &base_path)
    }

    /// Compile `defs` mounted under `base`, failing on an unroutable base.
    ///
    /// # Errors
    ///
    /// Returns [`NavigationError::InvalidBasePath`] when `base` carries a scheme.
    pub fn try_new(defs: &[RouteDefinition], base: &str) -> Result<Self, NavigationError> {
        let base_path = mount_path(base).ok_or_else(|| NavigationError::InvalidBasePath {
            base: base.to_string(),
        })?;
        Ok(Self::mounted(defs, &base_path))
    }

    fn mounted(defs: &[RouteDefinition], base_path: &str) -> Self {
        Self {
            table: ArcSwap::from_pointee(RouteTable::build(defs, base_path, 1)),
        }
    }

    /// Recompile from a new route tree, keeping the base path.
    pub fn replace_routes(&self, defs: &[RouteDefinition]) {
        let current = self.table.load();
        let next = RouteTable::build(defs, &current.base_path, current.generation + 1);
        self.table.store(Arc::new(next));
    }

    /// Current table snapshot.
    #[must_use]
    pub fn table(&self) -> Arc<RouteTable> {
        self.table.load_full()
    }

    #[must_use]
    pub fn base_path(&self) -> String {
        self.table.load().base_path.clone()
    }

    /// Match `pathname` against the ranked branches.
    ///
    /// Returns the matched chain root first, or an empty vec when nothing matches
    /// (a not-found condition, not a fault).
    #[must_use]
    pub fn match_path(&self, pathname: &str) -> Vec<RouteMatch> {
        let table = self.table.load();
        debug!(
            path = %pathname,
            generation = table.generation,
            "Route match attempt"
        );

        let match_start = Instant::now();
        let matches = get_route_matches(&table.branches, pathname);
        let match_duration = match_start.elapsed();

        match matches.last() {
            Some(leaf) => {
                if match_duration > Duration::from_millis(1) {
                    warn!(
                        path = %pathname,
                        route_pattern = %leaf.route.pattern,
                        depth = matches.len(),
                        duration_us = match_duration.as_micros(),
                        "Slow route matching detected"
                    );
                } else {
                    debug!(
                        path = %pathname,
                        route_pattern = %leaf.route.pattern,
                        handler_name = ?leaf.route.handler_name,
                        depth = matches.len(),
                        duration_us = match_duration.as_micros(),
                        "Route matched"
                    );
                }
            }
            None => {
                debug!(
                    path = %pathname,
                    duration_us = match_duration.as_micros(),
                    "No route matched"
                );
            }
        }

        matches
    }

    /// One line per branch: score, chain of patterns and leaf handler.
    #[must_use]
    pub fn dump_routes(&self) -> Vec<String> {
        let table = self.table.load();
        table
            .branches
            .iter()
            .map(|branch| {
                let chain: Vec<&str> = branch.routes().iter().map(|r| r.pattern.as_str()).collect();
                let handler = branch
                    .leaf()
                    .and_then(|leaf| leaf.handler_name.as_deref())
                    .unwrap_or("-");
                format!("{:>8} {} -> {}", branch.score(), chain.join(" > "), handler)
            })
            .collect()
    }
}

/// Normalized mount point of `base`; the root mounts as the empty string.
fn mount_path(base: &str) -> Option<String> {
    resolve_path("", base, None).map(|path| if path == "/" { String::new() } else { path })
}

/// Match a single ad hoc pattern (with optional segments) against `pathname`.
///
/// The first expansion that matches wins, so earlier optional parameters take
/// precedence.
#[must_use]
pub fn match_pattern(pattern: &str, filters: Arc<MatchFilters>, pathname: &str) -> Option<PathMatch> {
    expand_optionals(pattern)
        .iter()
        .map(|expanded| PathMatcher::new(expanded, false, Arc::clone(&filters)))
        .find_map(|matcher| matcher.matches(pathname))
}
