//! # brrtnav
//!
//! **brrtnav** is a client-side navigation engine: given a declarative tree of route
//! patterns it ranks every root-to-leaf branch, matches locations against them, runs a
//! serialized navigation state machine over an abstract history sink and feeds route
//! loaders through a keyed, time-windowed, single-flight data cache.
//!
//! ## Architecture
//!
//! - **[`router`]** - Pattern compilation (optional segments, params, splats, match
//!   filters), branch scoring and chain matching
//! - **[`navigation`]** - The [`Navigator`](navigation::Navigator): transitions,
//!   redirect bounds, before-leave vetoes and history reconciliation
//! - **[`cache`]** - Keyed loader cache with single-flight sharing, preload windows,
//!   prefix invalidation, revalidation signals and sweeping
//! - **[`action`]** - Mutations with tracked submissions and response handling
//! - **[`definition`]** - Route trees in code or YAML/JSON
//! - **[`location`]** - Parsed locations with lazily memoized query params
//! - **[`request`]** - Per-request scope for server execution
//! - **[`telemetry`]** - `tracing` subscriber setup
//!
//! ### Navigation Flow
//!
//! ```mermaid
//! sequenceDiagram
//!     participant App
//!     participant Nav as Navigator
//!     participant Router
//!     participant Cache as DataCache
//!     participant History as HistorySink
//!
//!     App->>Nav: navigate("/users/7")
//!     Nav->>Nav: resolve + redirect bound + before-leave
//!     Nav->>Router: match_path("/users/7")
//!     Router-->>Nav: Vec<RouteMatch>
//!     Nav->>Cache: loaders read("user[7]", Navigate)
//!     Cache-->>Nav: shared in-flight loads
//!     Nav-->>App: Navigation::Started(Transition)
//!     App->>Nav: transition settles
//!     Nav->>History: set(HistoryUpdate)
//! ```
//!
//! ## Quick Start
//!
//! ```rust
//! use brrtnav::definition::RouteDefinition;
//! use brrtnav::loader::{loader, ready};
//! use brrtnav::navigation::{MemoryHistory, NavigateOptions, Navigator, NavigatorOptions};
//! use brrtnav::router::Router;
//! use serde_json::json;
//! use std::sync::Arc;
//!
//! let routes = vec![RouteDefinition::new("/users/:id").load(loader(|args| {
//!     ready(Some(json!({ "id": args.params["id"] })))
//! }))];
//! let router = Arc::new(Router::new(&routes, ""));
//! let navigator = Navigator::new(
//!     router,
//!     Arc::new(MemoryHistory::new()),
//!     NavigatorOptions::default(),
//! )
//! .expect("valid base");
//!
//! let nav = navigator.navigate("/users/7", NavigateOptions::default()).expect("routable");
//! drop(nav);
//! assert_eq!(navigator.location().pathname, "/users/7");
//! ```
//!
//! ## Runtime Considerations
//!
//! The engine has no runtime of its own. Loader results are `futures` futures, shared
//! through `futures::future::Shared`; drive them with whatever executor the host uses.
//! Listeners and loaders may navigate re-entrantly, so no internal lock is held while
//! user code runs.
//!
//! ## Configuration
//!
//! Cache timing comes from [`RuntimeConfig::from_env`](runtime_config::RuntimeConfig::from_env)
//! (`BRRTNAV_PRELOAD_WINDOW_MS`, `BRRTNAV_CACHE_TTL_MS`, `BRRTNAV_SWEEP_INTERVAL_MS`,
//! `BRRTNAV_EXECUTION`) and logging from `BRRTNAV_LOG_*`.

pub mod action;
pub mod cache;
pub mod cli;
pub mod clock;
pub mod definition;
pub mod error;
pub mod ids;
pub mod intent;
pub mod loader;
pub mod location;
pub mod memo;
pub mod navigation;
pub mod request;
pub mod response;
pub mod router;
pub mod runtime_config;
pub mod signal;
pub mod telemetry;

pub use error::{LoadError, NavigationError, RouteConfigError};
pub use intent::{ExecutionMode, Intent};
pub use navigation::{Navigation, Navigator};
pub use router::Router;
