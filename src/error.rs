use std::fmt;

/// Errors raised synchronously by [`Navigator::navigate`](crate::navigation::Navigator::navigate)
/// and navigator construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NavigationError {
    /// The target could not be resolved to a routable path (e.g. it carries a scheme)
    InvalidPath {
        /// The target as given by the caller
        path: String,
    },
    /// The configured base path is not routable
    InvalidBasePath {
        /// The base as given by the caller
        base: String,
    },
    /// Too many chained redirects accumulated without a transition settling
    TooManyRedirects {
        /// Number of pending referrers when the bound was hit
        depth: usize,
    },
    /// The navigator behind a weak handle has been dropped
    Detached,
}

impl fmt::Display for NavigationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NavigationError::InvalidPath { path } => {
                write!(f, "Path '{path}' is not a routable path")
            }
            NavigationError::InvalidBasePath { base } => {
                write!(f, "'{base}' is not a valid base path")
            }
            NavigationError::TooManyRedirects { depth } => {
                write!(f, "Too many redirects ({depth} pending transitions)")
            }
            NavigationError::Detached => write!(f, "Navigator is no longer available"),
        }
    }
}

impl std::error::Error for NavigationError {}

/// Outcome of a failed load, shared by every reader of the same cache entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadError {
    /// The loader rejected with a message
    Rejected {
        /// Loader-provided reason
        message: String,
    },
    /// A redirect signal could not be followed
    Navigation(NavigationError),
    /// The loader redirected to a location outside the router (absolute URL)
    ExternalRedirect {
        /// The `Location` header value
        location: String,
    },
    /// A response helper was given a value that is not a valid header
    InvalidHeader {
        /// Header name
        name: String,
    },
}

impl LoadError {
    /// Convenience constructor for loader rejections.
    pub fn rejected(message: impl Into<String>) -> Self {
        LoadError::Rejected {
            message: message.into(),
        }
    }
}

impl fmt::Display for LoadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoadError::Rejected { message } => write!(f, "Loader rejected: {message}"),
            LoadError::Navigation(err) => write!(f, "Redirect failed: {err}"),
            LoadError::ExternalRedirect { location } => {
                write!(f, "Redirect to external location '{location}'")
            }
            LoadError::InvalidHeader { name } => write!(f, "Invalid value for header '{name}'"),
        }
    }
}

impl std::error::Error for LoadError {}

impl From<NavigationError> for LoadError {
    fn from(err: NavigationError) -> Self {
        LoadError::Navigation(err)
    }
}

/// Errors raised while turning a route configuration file into definitions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteConfigError {
    /// A route references a loader name that is not registered
    UnknownLoader {
        /// Route path (first alternative) declaring the loader
        path: String,
        /// Missing loader name
        loader: String,
    },
    /// A match filter regex failed to compile
    InvalidFilter {
        /// Parameter the filter applies to
        param: String,
        /// Regex compiler message
        reason: String,
    },
    /// A splat appears before the last segment
    MisplacedSplat {
        /// Offending path
        path: String,
    },
}

impl fmt::Display for RouteConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RouteConfigError::UnknownLoader { path, loader } => {
                write!(f, "Route '{path}' references unknown loader '{loader}'")
            }
            RouteConfigError::InvalidFilter { param, reason } => {
                write!(f, "Invalid match filter for '{param}': {reason}")
            }
            RouteConfigError::MisplacedSplat { path } => {
                write!(f, "Splat must be the last segment in '{path}'")
            }
        }
    }
}

impl std::error::Error for RouteConfigError {}
