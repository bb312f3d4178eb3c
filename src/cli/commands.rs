use crate::definition::{
    load_route_config, parse_route_config, LoaderRegistry, RouteConfig, RouteFile,
};
use crate::loader::{loader, ready};
use crate::location::Location;
use crate::router::{merge_params, RouteMatch, Router};
use anyhow::Context;
use clap::{Parser, Subcommand};
use std::collections::BTreeMap;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing::info;

/// Command-line interface for brrtnav
#[derive(Parser, Debug)]
#[command(name = "brrtnav")]
#[command(about = "Inspect brrtnav route trees", long_about = None)]
pub struct Cli {
    /// Log level (overrides BRRTNAV_LOG_LEVEL)
    #[arg(long, global = true, env = "BRRTNAV_LOG_LEVEL", default_value = "warn")]
    pub log_level: String,

    /// The subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Dump the ranked branches of a route tree
    Branches {
        /// Route tree file (YAML or JSON)
        #[arg(short, long)]
        routes: PathBuf,

        /// Mount the tree under this base path instead of the file's `base`
        #[arg(long)]
        base: Option<String>,
    },
    /// Match a location and print the chain and params
    Match {
        /// Route tree file (YAML or JSON)
        #[arg(short, long)]
        routes: PathBuf,

        /// Mount the tree under this base path instead of the file's `base`
        #[arg(long)]
        base: Option<String>,

        /// Location to match, e.g. `/users/42?tab=posts`
        path: String,
    },
}

/// Execute the CLI command, writing results to stdout.
///
/// # Errors
///
/// Returns an error if the route file cannot be read or parsed, or the location is
/// malformed.
pub fn run_cli(cli: Cli) -> anyhow::Result<()> {
    let stdout = io::stdout();
    let mut out = stdout.lock();
    run_with_output(cli.command, &mut out)
}

pub(crate) fn run_with_output(command: Commands, out: &mut impl Write) -> anyhow::Result<()> {
    match command {
        Commands::Branches { routes, base } => {
            let router = build_router(&routes, base)?;
            for line in router.dump_routes() {
                writeln!(out, "{line}")?;
            }
            Ok(())
        }
        Commands::Match { routes, base, path } => {
            let router = build_router(&routes, base)?;
            let location = Location::parse(&path, None)
                .with_context(|| format!("Malformed location {path:?}"))?;
            let matches = router.match_path(&location.pathname);
            info!(path = %location.pathname, depth = matches.len(), "CLI match");
            write_matches(out, &location, &matches)
        }
    }
}

fn build_router(routes: &Path, base: Option<String>) -> anyhow::Result<Router> {
    let registry = placeholder_registry(routes)?;
    let (definitions, declared_base) = load_route_config(routes, &registry)?;
    let base = base.unwrap_or(declared_base);
    Router::try_new(&definitions, &base)
        .with_context(|| format!("Cannot mount routes from {}", routes.display()))
}

/// Register a no-op loader for every loader name the file mentions.
fn placeholder_registry(routes: &Path) -> anyhow::Result<LoaderRegistry> {
    let content = std::fs::read_to_string(routes)
        .with_context(|| format!("Failed to read route file {}", routes.display()))?;
    let file: RouteFile = if routes.extension().is_some_and(|ext| ext == "json") {
        serde_json::from_str(&content).context("Failed to parse route configuration")?
    } else {
        parse_route_config(&content)?
    };

    let mut names = Vec::new();
    collect_loader_names(&file.routes, &mut names);
    let mut registry = LoaderRegistry::new();
    for name in names {
        registry.register(name, loader(|_| ready(None)));
    }
    Ok(registry)
}

fn collect_loader_names(routes: &[RouteConfig], names: &mut Vec<String>) {
    for route in routes {
        if let Some(name) = &route.loader {
            names.push(name.clone());
        }
        if let Some(children) = &route.children {
            collect_loader_names(children, names);
        }
    }
}

fn write_matches(
    out: &mut impl Write,
    location: &Location,
    matches: &[RouteMatch],
) -> anyhow::Result<()> {
    if matches.is_empty() {
        writeln!(out, "no match for {}", location.pathname)?;
        return Ok(());
    }
    for (depth, m) in matches.iter().enumerate() {
        let handler = m.route.handler_name.as_deref().unwrap_or("-");
        writeln!(
            out,
            "{:indent$}{} [{}] matched {} -> {}",
            "",
            m.route.original_path,
            m.route.pattern,
            m.path,
            handler,
            indent = depth * 2
        )?;
    }
    let params: BTreeMap<String, String> = merge_params(matches).into_iter().collect();
    writeln!(out, "params: {}", serde_json::to_string(&params)?)?;
    let query = location.query_map();
    if !query.is_empty() {
        let query: BTreeMap<String, String> = query.into_iter().collect();
        writeln!(out, "query: {}", serde_json::to_string(&query)?)?;
    }
    Ok(())
}
