//! # Router Module
//!
//! Compiles a declarative route tree into ranked branches and resolves pathnames to
//! the chain of nested routes that handles them.
//!
//! ## Architecture
//!
//! 1. **Compilation**: each [`RouteDefinition`](crate::definition::RouteDefinition)
//!    path is expanded (`/:a?/:b?` becomes `/`, `/:a`, `/:a/:b`), joined onto its
//!    parent pattern, percent-escaped and compiled into a [`PathMatcher`].
//! 2. **Indexing**: every root-to-leaf chain becomes a [`Branch`] scored by the
//!    specificity of its leaf (3 per static segment, 2 per dynamic one), scaled so that
//!    declaration order only breaks ties.
//! 3. **Matching**: branches are tried in score order; the first chain whose every
//!    route matches wins.
//!
//! ## Example
//!
//! ```rust
//! use brrtnav::definition::RouteDefinition;
//! use brrtnav::router::Router;
//!
//! let router = Router::new(
//!     &[
//!         RouteDefinition::new("/users/:id").handler("user"),
//!         RouteDefinition::new("/users/new").handler("new_user"),
//!     ],
//!     "",
//! );
//!
//! let matches = router.match_path("/users/new");
//! assert_eq!(matches[0].route.handler_name.as_deref(), Some("new_user"));
//!
//! let matches = router.match_path("/users/42");
//! assert_eq!(matches[0].get_param("id"), Some("42"));
//! ```

mod branch;
mod core;
mod path;
mod pattern;

pub use branch::{
    create_branches, create_routes, get_route_matches, merge_params, Branch, Route, RouteMatch,
};
pub use core::{match_pattern, RouteTable, Router};
pub use path::{join_paths, merge_search_string, normalize_path, resolve_path};
pub use pattern::{
    escape_pattern, expand_optionals, score_pattern, MatchFilter, MatchFilters, ParamVec,
    PathMatch, PathMatcher, MAX_INLINE_PARAMS,
};
