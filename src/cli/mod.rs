//! # CLI Module
//!
//! Command-line tools for inspecting route trees declared in YAML or JSON.
//!
//! ## Commands
//!
//! ### `branches`
//!
//! Print every branch of the tree in the order matching tries them, with its score,
//! the route chain and the leaf handler:
//!
//! ```bash
//! brrtnav branches --routes routes.yaml
//! ```
//!
//! ### `match`
//!
//! Match a location against the tree and print the matched chain and merged params:
//!
//! ```bash
//! brrtnav match --routes routes.yaml /users/42?tab=posts
//! ```
//!
//! Loader names in the file are accepted as-is; the CLI never runs loaders.
//!
//! ## Usage from Code
//!
//! ```rust,ignore
//! use brrtnav::cli::{run_cli, Cli};
//! use clap::Parser;
//!
//! run_cli(Cli::parse())?;
//! ```

mod commands;


pub use commands::{run_cli, Cli, Commands};
