//! Core data model
//!
//! Process identities captured from the OS, and the validated parameters of a
//! repeat run.

use crate::browser;
use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::num::NonZeroU32;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use url::Url;

/// OS process id. Only meaningful together with the snapshot it came from.
pub type ProcessId = u32;

/// Ordered set of process ids; ordering keeps logs and tests deterministic.
pub type ProcessSet = BTreeSet<ProcessId>;

/// One process as seen at snapshot time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessRecord {
    pub id: ProcessId,
    pub executable_name: String,
    #[serde(default)]
    pub command_line_arguments: Vec<String>,
    #[serde(default)]
    pub parent_id: Option<ProcessId>,
    /// Process group id (Unix only).
    #[serde(default)]
    pub process_group: Option<ProcessId>,
}

impl ProcessRecord {
    pub fn new(id: ProcessId, executable_name: impl Into<String>) -> Self {
        Self {
            id,
            executable_name: executable_name.into(),
            command_line_arguments: Vec::new(),
            parent_id: None,
            process_group: None,
        }
    }

    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.command_line_arguments = args.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_parent(mut self, parent_id: Option<ProcessId>) -> Self {
        self.parent_id = parent_id;
        self
    }

    pub fn with_process_group(mut self, process_group: Option<ProcessId>) -> Self {
        self.process_group = process_group;
        self
    }

    /// True when this is an instance of `target` (e.g. `chrome`).
    ///
    /// Compares the reported name and the file name of `argv[0]`, ignoring case
    /// and a trailing `.exe`. Linux truncates `comm` to 15 bytes, so a name that
    /// is exactly a 15-byte prefix of the target also matches.
    pub fn matches_executable(&self, target: &str) -> bool {
        let target = normalize_executable_name(target);
        if target.is_empty() {
            return false;
        }

        let name = normalize_executable_name(&self.executable_name);
        if name == target || (name.len() == 15 && target.starts_with(&name)) {
            return true;
        }

        self.command_line_arguments
            .first()
            .map(|argv0| normalize_executable_name(argv0) == target)
            .unwrap_or(false)
    }

    /// True when any argument contains `flag`.
    pub fn has_flag(&self, flag: &str) -> bool {
        self.command_line_arguments
            .iter()
            .any(|arg| arg.contains(flag))
    }
}

/// Lowercased file name with any `.exe` suffix removed.
pub fn normalize_executable_name(name: &str) -> String {
    let file_name = name
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(name)
        .trim()
        .to_lowercase();
    match file_name.strip_suffix(".exe") {
        Some(stripped) => stripped.to_string(),
        None => file_name,
    }
}

/// Unit of the repeat interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeUnit {
    #[serde(alias = "秒")]
    Seconds,
    #[serde(alias = "分")]
    Minutes,
    #[serde(alias = "時間")]
    Hours,
    #[serde(alias = "日")]
    Days,
}

impl TimeUnit {
    pub fn seconds(self) -> u64 {
        match self {
            TimeUnit::Seconds => 1,
            TimeUnit::Minutes => 60,
            TimeUnit::Hours => 3600,
            TimeUnit::Days => 86400,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TimeUnit::Seconds => "seconds",
            TimeUnit::Minutes => "minutes",
            TimeUnit::Hours => "hours",
            TimeUnit::Days => "days",
        }
    }
}

impl fmt::Display for TimeUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TimeUnit {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "s" | "sec" | "secs" | "second" | "seconds" | "秒" => Ok(TimeUnit::Seconds),
            "m" | "min" | "mins" | "minute" | "minutes" | "分" => Ok(TimeUnit::Minutes),
            "h" | "hour" | "hours" | "時間" => Ok(TimeUnit::Hours),
            "d" | "day" | "days" | "日" => Ok(TimeUnit::Days),
            _ => Err(ConfigError::InvalidTimeUnit {
                value: s.to_string(),
            }),
        }
    }
}

/// How many iterations a run performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RepeatCount {
    Finite(NonZeroU32),
    Infinite,
}

impl RepeatCount {
    /// Whether another iteration may start after `completed` iterations.
    pub fn allows(self, completed: u32) -> bool {
        match self {
            RepeatCount::Finite(limit) => completed < limit.get(),
            RepeatCount::Infinite => true,
        }
    }

    pub fn total(self) -> Option<u32> {
        match self {
            RepeatCount::Finite(limit) => Some(limit.get()),
            RepeatCount::Infinite => None,
        }
    }
}

/// Unvalidated parameters as the input form (or command line) supplies them.
#[derive(Debug, Clone, PartialEq)]
pub struct RunRequest {
    pub url: String,
    pub interval: String,
    pub unit: TimeUnit,
    pub count: Option<String>,
    pub infinite: bool,
    pub incognito: bool,
    pub browser: Option<PathBuf>,
}

/// Parameters of one scheduler run after validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSettings {
    pub url: String,
    pub interval: Duration,
    pub repeat: RepeatCount,
    pub incognito: bool,
    pub browser: PathBuf,
}

impl RunRequest {
    /// Validate every field and resolve the browser executable.
    ///
    /// Checks run in the order the user fills the form, so the first problem
    /// reported is the first field that is wrong.
    pub fn validate(self) -> Result<RunSettings, ConfigError> {
        let url = validate_url(&self.url)?;
        let interval = parse_interval(&self.interval, self.unit)?;
        let repeat = if self.infinite {
            RepeatCount::Infinite
        } else {
            parse_count(self.count.as_deref().unwrap_or(""))?
        };
        let browser = browser::resolve_browser(self.browser.as_deref())?;

        Ok(RunSettings {
            url,
            interval,
            repeat,
            incognito: self.incognito,
            browser,
        })
    }
}

const VIDEO_HOSTS: &[&str] = &["youtube.com", "youtu.be"];

/// Accept `http(s)` URLs on a recognised video host.
pub fn validate_url(raw: &str) -> Result<String, ConfigError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(ConfigError::EmptyUrl);
    }

    let lower = trimmed.to_lowercase();
    if !(lower.starts_with("http://") || lower.starts_with("https://")) {
        return Err(ConfigError::InvalidScheme {
            value: trimmed.to_string(),
        });
    }

    let parsed = Url::parse(trimmed).map_err(|_| ConfigError::InvalidScheme {
        value: trimmed.to_string(),
    })?;
    let host = parsed.host_str().unwrap_or_default().to_lowercase();
    let recognised = VIDEO_HOSTS
        .iter()
        .any(|known| host == *known || host.ends_with(&format!(".{known}")));
    if !recognised {
        return Err(ConfigError::UnsupportedHost {
            value: trimmed.to_string(),
        });
    }

    Ok(trimmed.to_string())
}

/// Parse a positive interval; fractions are rounded up to whole seconds.
pub fn parse_interval(raw: &str, unit: TimeUnit) -> Result<Duration, ConfigError> {
    let invalid = || ConfigError::InvalidInterval {
        value: raw.to_string(),
    };
    let value: f64 = raw.trim().parse().map_err(|_| invalid())?;
    if !value.is_finite() || value <= 0.0 {
        return Err(invalid());
    }
    let seconds = (value * unit.seconds() as f64).ceil().max(1.0);
    Ok(Duration::from_secs(seconds as u64))
}

pub fn parse_count(raw: &str) -> Result<RepeatCount, ConfigError> {
    raw.trim()
        .parse::<u32>()
        .ok()
        .and_then(NonZeroU32::new)
        .map(RepeatCount::Finite)
        .ok_or_else(|| ConfigError::InvalidCount {
            value: raw.to_string(),
        })
}

/// Clock-style rendering used by the countdown display.
pub fn format_hms(total_seconds: u64) -> String {
    let hours = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;
    format!("{hours:02}:{minutes:02}:{seconds:02}")
}
