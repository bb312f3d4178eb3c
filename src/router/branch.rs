//! Branch index: flattens a route tree into ranked root-to-leaf candidate chains.

use super::path::join_paths;
use super::pattern::{escape_pattern, expand_optionals, score_pattern, ParamVec, PathMatcher};
use crate::definition::{RouteDefinition, RouteKey};
use crate::loader::Loader;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Multiplier that keeps leaf specificity dominant over declaration order.
const SCORE_SCALE: i64 = 10_000;

/// An immutable compiled route.
pub struct Route {
    /// Identity of the definition this route was compiled from
    pub key: RouteKey,
    /// Path alternative as declared, before expansion and joining
    pub original_path: String,
    /// Normalized, escaped, fully joined pattern
    pub pattern: String,
    /// Handler associated with the route
    pub handler_name: Option<Arc<str>>,
    /// Data loader associated with the route
    pub load: Option<Loader>,
    /// Free-form metadata
    pub info: Option<Value>,
    matcher: PathMatcher,
}

impl Route {
    /// Names of the parameters this route captures.
    #[must_use]
    pub fn param_keys(&self) -> Vec<Arc<str>> {
        self.matcher.keys()
    }

    /// Match a pathname against this route alone.
    #[must_use]
    pub fn matcher(&self) -> &PathMatcher {
        &self.matcher
    }
}

impl fmt::Debug for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Route")
            .field("key", &self.key)
            .field("pattern", &self.pattern)
            .field("original_path", &self.original_path)
            .field("handler_name", &self.handler_name)
            .field("has_loader", &self.load.is_some())
            .finish()
    }
}

/// Per-route result of matching a branch.
#[derive(Debug, Clone)]
pub struct RouteMatch {
    /// The matched route
    pub route: Arc<Route>,
    /// The portion of the pathname this route consumed
    pub path: String,
    /// Parameters captured by this route
    pub params: ParamVec,
}

impl RouteMatch {
    /// Get a captured parameter by name.
    #[inline]
    #[must_use]
    pub fn get_param(&self, name: &str) -> Option<&str> {
        self.params
            .iter()
            .rfind(|(k, _)| k.as_ref() == name)
            .map(|(_, v)| v.as_str())
    }
}

/// Merge parameters of a matched chain; inner routes overwrite outer ones.
#[must_use]
pub fn merge_params(matches: &[RouteMatch]) -> HashMap<String, String> {
    let mut params = HashMap::new();
    for m in matches {
        for (k, v) in &m.params {
            params.insert(k.to_string(), v.clone());
        }
    }
    params
}

/// A root-to-leaf chain of routes with its specificity score.
#[derive(Debug, Clone)]
pub struct Branch {
    routes: Vec<Arc<Route>>,
    score: i64,
}

impl Branch {
    fn new(routes: Vec<Arc<Route>>, index: usize) -> Self {
        let leaf_score = routes.last().map_or(0, |leaf| score_pattern(&leaf.pattern));
        let index = i64::try_from(index).unwrap_or(i64::MAX);
        Self {
            routes,
            score: leaf_score * SCORE_SCALE - index,
        }
    }

    #[must_use]
    pub fn routes(&self) -> &[Arc<Route>] {
        &self.routes
    }

    #[must_use]
    pub fn score(&self) -> i64 {
        self.score
    }

    /// The leaf route of the chain.
    #[must_use]
    pub fn leaf(&self) -> Option<&Arc<Route>> {
        self.routes.last()
    }

    /// Match every route of the chain against `location`. All must match.
    #[must_use]
    pub fn matches(&self, location: &str) -> Option<Vec<RouteMatch>> {
        let mut matches = Vec::with_capacity(self.routes.len());
        for route in self.routes.iter().rev() {
            let m = route.matcher.matches(location)?;
            matches.push(RouteMatch {
                route: Arc::clone(route),
                path: m.path,
                params: m.params,
            });
        }
        matches.reverse();
        Some(matches)
    }
}

/// Compile one definition into routes, one per path alternative and optional expansion.
#[must_use]
pub fn create_routes(def: &RouteDefinition, base: &str) -> Vec<Arc<Route>> {
    let is_leaf = def.is_leaf();
    let mut routes = Vec::new();
    for original_path in &def.paths {
        for expanded in expand_optionals(original_path) {
            let path = join_paths(base, &expanded);
            let pattern = if is_leaf {
                path.as_str()
            } else {
                path.split("/*").next().unwrap_or_default()
            };
            let pattern = escape_pattern(pattern);
            let matcher = PathMatcher::new(&pattern, !is_leaf, Arc::clone(&def.match_filters));
            routes.push(Arc::new(Route {
                key: def.key,
                original_path: original_path.clone(),
                pattern,
                handler_name: def.handler.clone(),
                load: def.load.clone(),
                info: def.info.clone(),
                matcher,
            }));
        }
    }
    routes
}

/// Build and rank every branch of a route tree.
///
/// Branches are ordered by descending score; among equally specific branches the
/// first declared wins.
#[must_use]
pub fn create_branches(defs: &[RouteDefinition], base: &str) -> Vec<Branch> {
    let mut stack = Vec::new();
    let mut branches = Vec::new();
    collect_branches(defs, base, &mut stack, &mut branches);
    branches.sort_by(|a, b| b.score.cmp(&a.score));
    branches
}

fn collect_branches(
    defs: &[RouteDefinition],
    base: &str,
    stack: &mut Vec<Arc<Route>>,
    branches: &mut Vec<Branch>,
) {
    for def in defs {
        for route in create_routes(def, base) {
            stack.push(Arc::clone(&route));
            match def.children.as_deref() {
                Some(children) if !children.is_empty() => {
                    collect_branches(children, &route.pattern, stack, branches);
                }
                _ => {
                    let index = branches.len();
                    branches.push(Branch::new(stack.clone(), index));
                }
            }
            stack.pop();
        }
    }
}

/// Return the chain of the first branch (in score order) matching `location`, or an
/// empty vec when nothing matches.
#[must_use]
pub fn get_route_matches(branches: &[Branch], location: &str) -> Vec<RouteMatch> {
    branches
        .iter()
        .find_map(|branch| branch.matches(location))
        .unwrap_or_default()
}
