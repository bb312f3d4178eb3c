use serde::{Deserialize, Serialize};
use std::fmt;

/// Why a match or load is happening. Governs cache freshness rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Intent {
    /// First render of the router
    Initial,
    /// History moved underneath the router (back/forward)
    Native,
    /// A navigation requested through the navigator
    Navigate,
    /// Speculative load ahead of a navigation
    Preload,
}

impl Intent {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Intent::Initial => "initial",
            Intent::Native => "native",
            Intent::Navigate => "navigate",
            Intent::Preload => "preload",
        }
    }
}

impl fmt::Display for Intent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where the engine runs. Server execution scopes caches per request and never
/// treats cached data as stale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionMode {
    #[default]
    Client,
    Server,
}

impl ExecutionMode {
    pub fn parse(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "server" => ExecutionMode::Server,
            _ => ExecutionMode::Client,
        }
    }

    #[must_use]
    pub fn is_server(&self) -> bool {
        matches!(self, ExecutionMode::Server)
    }
}
