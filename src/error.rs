//! Error taxonomy for the repeat loop
//!
//! Worker-side errors never cross the thread boundary as `Err`: the scheduler
//! turns them into a single [`crate::events::RunEvent::Error`]. The enums here
//! give each failure a category and a user-facing message for that event.

use std::fmt;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

pub type RepeaterResult<T> = Result<T, RepeaterError>;

/// Main error type for a run.
#[derive(Error, Debug)]
pub enum RepeaterError {
    #[error("Browser launch failed: {0}")]
    Launch(#[from] LaunchError),

    #[error("Network unavailable: {url} ({message})")]
    NetworkUnavailable { url: String, message: String },

    #[error("{count} process(es) survived forced termination: {pids:?}")]
    TerminationFailure { count: usize, pids: Vec<u32> },

    #[error("Permission denied for process {pid}")]
    PermissionDenied { pid: u32 },

    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("Filesystem error: {message} (path: {path})")]
    Filesystem {
        message: String,
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Why the browser could not be started.
#[derive(Error, Debug)]
pub enum LaunchError {
    #[error("executable not found: {0}")]
    NotFound(PathBuf),
    #[error("permission denied launching {0}")]
    PermissionDenied(PathBuf),
    #[error("failed to spawn {path}: {source}")]
    Spawn {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("spawned process for {0} reported no pid")]
    MissingPid(PathBuf),
    #[error("no profile directory for a standard-mode launch")]
    MissingProfileDirectory,
}

impl LaunchError {
    /// Classify a spawn failure the way the user needs to hear about it.
    pub fn from_spawn(path: PathBuf, err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::NotFound => LaunchError::NotFound(path),
            io::ErrorKind::PermissionDenied => LaunchError::PermissionDenied(path),
            _ => LaunchError::Spawn { path, source: err },
        }
    }
}

/// Parameter problems caught before any run starts.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("URL must not be empty")]
    EmptyUrl,
    #[error("URL must start with http:// or https://: {value}")]
    InvalidScheme { value: String },
    #[error("not a recognised video URL: {value}")]
    UnsupportedHost { value: String },
    #[error("interval must be a positive number: {value}")]
    InvalidInterval { value: String },
    #[error("unknown time unit: {value}")]
    InvalidTimeUnit { value: String },
    #[error("repeat count must be an integer of at least 1: {value}")]
    InvalidCount { value: String },
    #[error("no supported browser found (set --browser or REPEAT_VIEWER_BROWSER)")]
    BrowserNotFound,
    #[error("browser path does not exist: {path}")]
    BrowserMissing { path: String },
}

/// Coarse grouping used by front ends to title error dialogs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    Launch,
    Network,
    Termination,
    Permission,
    Configuration,
    Filesystem,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl ErrorCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCategory::Launch => "launch",
            ErrorCategory::Network => "network",
            ErrorCategory::Termination => "termination",
            ErrorCategory::Permission => "permission",
            ErrorCategory::Configuration => "configuration",
            ErrorCategory::Filesystem => "filesystem",
        }
    }
}

impl RepeaterError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            RepeaterError::Launch(_) => ErrorCategory::Launch,
            RepeaterError::NetworkUnavailable { .. } => ErrorCategory::Network,
            RepeaterError::TerminationFailure { .. } => ErrorCategory::Termination,
            RepeaterError::PermissionDenied { .. } => ErrorCategory::Permission,
            RepeaterError::Config(_) => ErrorCategory::Configuration,
            RepeaterError::Filesystem { .. } => ErrorCategory::Filesystem,
        }
    }

    pub fn user_message(&self) -> String {
        match self {
            RepeaterError::Launch(LaunchError::NotFound(path)) => format!(
                "Browser not found at {}. Check the browser path.",
                path.display()
            ),
            RepeaterError::Launch(LaunchError::PermissionDenied(path)) => {
                format!("No permission to start {}.", path.display())
            }
            RepeaterError::Launch(err) => format!("Could not start the browser: {}", err),
            RepeaterError::NetworkUnavailable { url, .. } => format!(
                "Cannot reach {}. Check the network connection.",
                url
            ),
            RepeaterError::TerminationFailure { count, .. } => {
                format!("{} browser process(es) did not exit", count)
            }
            RepeaterError::PermissionDenied { pid } => {
                format!("Not allowed to signal process {}", pid)
            }
            RepeaterError::Config(err) => format!("Input validation failed: {}", err),
            RepeaterError::Filesystem { message, path, .. } => {
                format!("File system problem: {} ({})", message, path.display())
            }
        }
    }

    pub fn filesystem(
        message: impl Into<String>,
        path: impl Into<PathBuf>,
        source: io::Error,
    ) -> Self {
        RepeaterError::Filesystem {
            message: message.into(),
            path: path.into(),
            source,
        }
    }
}

/// Failure to read the process table as a whole.
///
/// Individual processes that vanish or deny access are skipped, not reported.
#[derive(Error, Debug)]
pub enum SnapshotError {
    #[error("Failed to enumerate processes: {0}")]
    Enumerate(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spawn_error_classification() {
        let path = PathBuf::from("/nowhere/chrome");
        let err = LaunchError::from_spawn(path.clone(), io::Error::from(io::ErrorKind::NotFound));
        assert!(matches!(err, LaunchError::NotFound(ref p) if *p == path));

        let err = LaunchError::from_spawn(
            path.clone(),
            io::Error::from(io::ErrorKind::PermissionDenied),
        );
        assert!(matches!(err, LaunchError::PermissionDenied(_)));

        let err = LaunchError::from_spawn(path, io::Error::other("boom"));
        assert!(matches!(err, LaunchError::Spawn { .. }));
    }

    #[test]
    fn test_categories_and_messages() {
        let launch = RepeaterError::from(LaunchError::NotFound(PathBuf::from("x")));
        assert_eq!(launch.category(), ErrorCategory::Launch);

        let term = RepeaterError::TerminationFailure {
            count: 1,
            pids: vec![42],
        };
        assert_eq!(term.category(), ErrorCategory::Termination);

        let denied = RepeaterError::PermissionDenied { pid: 7 };
        assert_eq!(denied.category(), ErrorCategory::Permission);
        assert_eq!(denied.user_message(), "Not allowed to signal process 7");

        let cfg = RepeaterError::from(ConfigError::EmptyUrl);
        assert_eq!(cfg.category(), ErrorCategory::Configuration);
        assert!(cfg.user_message().contains("URL must not be empty"));
    }
}
