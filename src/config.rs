//! Constants, environment variable names and the read-only user defaults file.

use crate::core::models::TimeUnit;
use crate::logging::warn;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const APP_DIRECTORY: &str = ".repeat-viewer";
pub const CONFIG_FILE_NAME: &str = "config.json";
pub const PROFILE_DIR_PREFIX: &str = "youtube_repeater_";

pub const BROWSER_ENV: &str = "REPEAT_VIEWER_BROWSER";
pub const DEBUG_ENV: &str = "REPEAT_VIEWER_DEBUG";
pub const PROBE_URL_ENV: &str = "REPEAT_VIEWER_PROBE_URL";

pub const INCOGNITO_FLAG: &str = "--incognito";
pub const DEFAULT_PROBE_URL: &str = "https://www.youtube.com";

pub const PROBE_TIMEOUT: Duration = Duration::from_secs(5);
pub const COUNTDOWN_TICK: Duration = Duration::from_secs(1);
pub const GRACE_PERIOD: Duration = Duration::from_secs(2);
pub const KILL_PERIOD: Duration = Duration::from_secs(1);
pub const SETTLE_DELAY: Duration = Duration::from_secs(2);
pub const EXIT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Executable names searched on `PATH` when no browser is configured.
pub const BROWSER_CANDIDATES: &[&str] = &[
    "google-chrome",
    "google-chrome-stable",
    "chromium",
    "chromium-browser",
    "chrome",
];

/// Defaults a previous session left behind.
///
/// The file is only read here; writing it belongs to whichever front end
/// owns the input form.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct UserDefaults {
    pub last_url: String,
    pub repeat_time: f64,
    pub time_unit: TimeUnit,
    pub repeat_count: u32,
    pub infinite_loop: bool,
    pub use_incognito: bool,
    pub browser_path: Option<PathBuf>,
}

impl Default for UserDefaults {
    fn default() -> Self {
        Self {
            last_url: String::new(),
            repeat_time: 10.0,
            time_unit: TimeUnit::Minutes,
            repeat_count: 1,
            infinite_loop: true,
            use_incognito: false,
            browser_path: None,
        }
    }
}

impl UserDefaults {
    /// Load from the default location, falling back to built-in defaults.
    pub fn load() -> Self {
        match default_config_path() {
            Some(path) => Self::load_from(&path),
            None => Self::default(),
        }
    }

    /// Load from `path`. A missing file is silent; a malformed one is logged.
    pub fn load_from(path: &Path) -> Self {
        if !path.exists() {
            return Self::default();
        }
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(err) => {
                warn(format!("Failed to read {}: {}", path.display(), err));
                return Self::default();
            }
        };
        match serde_json::from_str(&content) {
            Ok(defaults) => defaults,
            Err(err) => {
                warn(format!("Ignoring malformed {}: {}", path.display(), err));
                Self::default()
            }
        }
    }
}

/// `~/.repeat-viewer/config.json`
pub fn default_config_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(APP_DIRECTORY).join(CONFIG_FILE_NAME))
}

pub fn debug_enabled() -> bool {
    std::env::var(DEBUG_ENV)
        .map(|value| matches!(value.as_str(), "1" | "true" | "yes"))
        .unwrap_or(false)
}

pub fn probe_url() -> String {
    std::env::var(PROBE_URL_ENV).unwrap_or_else(|_| DEFAULT_PROBE_URL.to_string())
}
