//! # Navigation
//!
//! The navigation state machine.
//!
//! ## Transition lifecycle
//!
//! 1. [`Navigator::navigate`] resolves the target, checks the redirect bound and asks
//!    the [`BeforeLeave`] listeners for permission.
//! 2. The previous location is pushed on a referrer stack, the target becomes the
//!    current location and the matched routes' loaders start with the `Navigate`
//!    intent. A loader that navigates again (a redirect) nests another transition.
//! 3. Settling the returned [`Transition`] writes history once, using the
//!    replace/scroll options of the first navigation in the chain. A transition whose
//!    referrer stack was changed by a later navigation is discarded.
//!
//! History moved underneath the router (back/forward) arrives through
//! [`HistorySink::subscribe`] and is committed with the `Native` intent, unless a
//! listener vetoes it, in which case the traversal is reverted.
//!
//! ## Example
//!
//! ```rust
//! use brrtnav::definition::RouteDefinition;
//! use brrtnav::navigation::{MemoryHistory, NavigateOptions, Navigator, NavigatorOptions};
//! use brrtnav::router::Router;
//! use std::sync::Arc;
//!
//! let router = Arc::new(Router::new(&[RouteDefinition::new("/users/:id")], ""));
//! let history = Arc::new(MemoryHistory::new());
//! let navigator = Navigator::new(router, history.clone(), NavigatorOptions::default())
//!     .expect("valid base");
//!
//! let nav = navigator
//!     .navigate("/users/7", NavigateOptions::default())
//!     .expect("routable path");
//! assert!(nav.is_started());
//! drop(nav); // settles the transition
//!
//! assert_eq!(navigator.param("id").as_deref(), Some("7"));
//! assert_eq!(history.entries(), vec!["/", "/users/7"]);
//! ```

mod before_leave;
mod core;
mod history;
mod transition;

pub use before_leave::{BeforeLeave, BeforeLeaveEvent, LeaveTarget, RetryHandle};
pub use self::core::{
    ActiveRoute, NavigateOptions, NavigateTarget, Navigation, Navigator, NavigatorOptions,
    Preload, WeakNavigator, MAX_REDIRECTS,
};
pub use history::{HistoryEntry, HistorySink, HistoryUpdate, MemoryHistory};
pub use transition::Transition;
