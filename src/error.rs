use std::path::PathBuf;

use thiserror::Error;

/// Startup failures. Any of these halts the process.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("No playlist found (searched: {})", display_paths(.searched))]
    NotFound { searched: Vec<PathBuf> },

    #[error("Failed to read playlist {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed playlist: {0}")]
    Parse(String),

    #[error("No projects loaded: the playlist has no entries")]
    NoProjectsLoaded,
}

impl From<serde_json::Error> for ConfigError {
    fn from(e: serde_json::Error) -> Self {
        ConfigError::Parse(e.to_string())
    }
}

fn display_paths(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// A navigation request that was not performed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NavigationError {
    #[error("Playlist is empty, navigation is unavailable")]
    EmptyPlaylist,

    #[error("Project {index} has no url")]
    InvalidProject { index: usize },

    #[error("Project index {index} is out of range (playlist has {len})")]
    OutOfRange { index: usize, len: usize },
}

/// Serial enumeration, open, read or close failure.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DeviceError {
    #[error("Failed to list serial devices: {0}")]
    List(String),

    #[error("Failed to open {path}: {reason}")]
    Open { path: String, reason: String },

    #[error("Read error on {path}: {reason}")]
    Read { path: String, reason: String },
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ChallengeError {
    #[error("Password challenge cancelled")]
    Cancelled,

    #[error("A password challenge is already open")]
    AlreadyOpen,

    #[error("Dialog host unavailable: {0}")]
    HostUnavailable(String),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ShellError {
    #[error("Failed to load title card: {0}")]
    Interstitial(String),

    #[error("Failed to load {url}: {reason}")]
    Content { url: String, reason: String },

    #[error("Display shell closed")]
    Closed,
}
