//! Command-line definition
//!
//! Flags left out fall back to the user defaults file, then to built-in
//! defaults.

use crate::config::UserDefaults;
use crate::core::models::{RunRequest, TimeUnit};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// Play a video repeatedly in a throwaway browser window.
#[derive(Parser, Debug, Clone)]
#[command(
    name = "repeat-viewer",
    about = "Open a video URL repeatedly and close exactly the browser processes each run started",
    version
)]
pub struct Cli {
    /// Log filter directive (trace, debug, info, warn, error)
    #[arg(long, global = true, value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Also write logs to this file
    #[arg(long, global = true, value_name = "PATH")]
    pub log_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Start the repeat loop
    Run(RunArgs),

    /// Print the browser that would be used
    #[command(name = "detect-browser")]
    DetectBrowser {
        #[arg(long, value_name = "PATH")]
        browser: Option<PathBuf>,
    },

    /// Stop every incognito window of the browser
    ///
    /// Nothing is protected here, so this also closes incognito windows this
    /// tool did not open.
    Cleanup {
        #[arg(long, value_name = "PATH")]
        browser: Option<PathBuf>,
    },
}

#[derive(Args, Debug, Clone, Default)]
pub struct RunArgs {
    /// Video URL (defaults to the last URL in the config file)
    pub url: Option<String>,

    /// Time each iteration plays before the browser is closed
    #[arg(short, long, value_name = "N")]
    pub interval: Option<String>,

    /// Unit of --interval
    #[arg(short, long, value_parser = parse_unit, value_name = "UNIT")]
    pub unit: Option<TimeUnit>,

    /// Number of iterations
    #[arg(short, long, value_name = "N", conflicts_with = "infinite")]
    pub count: Option<String>,

    /// Repeat until interrupted
    #[arg(long)]
    pub infinite: bool,

    /// Use a private window instead of a throwaway profile
    #[arg(long)]
    pub incognito: bool,

    /// Browser executable
    #[arg(long, value_name = "PATH")]
    pub browser: Option<PathBuf>,

    /// Print events as JSON lines instead of a progress display
    #[arg(long)]
    pub json: bool,
}

fn parse_unit(value: &str) -> Result<TimeUnit, String> {
    value.parse().map_err(|err: crate::error::ConfigError| err.to_string())
}

impl RunArgs {
    /// Merge flags over `defaults` into an unvalidated request.
    pub fn to_request(&self, defaults: &UserDefaults) -> RunRequest {
        let infinite = self.infinite || (self.count.is_none() && defaults.infinite_loop);
        RunRequest {
            url: self.url.clone().unwrap_or_else(|| defaults.last_url.clone()),
            interval: self
                .interval
                .clone()
                .unwrap_or_else(|| defaults.repeat_time.to_string()),
            unit: self.unit.unwrap_or(defaults.time_unit),
            count: Some(
                self.count
                    .clone()
                    .unwrap_or_else(|| defaults.repeat_count.to_string()),
            ),
            infinite,
            incognito: self.incognito || defaults.use_incognito,
            browser: self.browser.clone().or_else(|| defaults.browser_path.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("repeat-viewer").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn test_run_flags() {
        let cli = parse(&[
            "run",
            "https://youtu.be/abc",
            "--interval",
            "5",
            "--unit",
            "seconds",
            "--count",
            "2",
            "--incognito",
        ]);
        let Commands::Run(args) = cli.command else {
            panic!("expected run");
        };
        let request = args.to_request(&UserDefaults::default());
        assert_eq!(request.url, "https://youtu.be/abc");
        assert_eq!(request.interval, "5");
        assert_eq!(request.unit, TimeUnit::Seconds);
        assert_eq!(request.count.as_deref(), Some("2"));
        assert!(!request.infinite);
        assert!(request.incognito);
    }

    #[test]
    fn test_defaults_fill_missing_flags() {
        let defaults = UserDefaults {
            last_url: "https://www.youtube.com/watch?v=x".to_string(),
            repeat_time: 1.5,
            time_unit: TimeUnit::Hours,
            infinite_loop: false,
            repeat_count: 4,
            ..UserDefaults::default()
        };
        let request = RunArgs::default().to_request(&defaults);
        assert_eq!(request.url, defaults.last_url);
        assert_eq!(request.interval, "1.5");
        assert_eq!(request.unit, TimeUnit::Hours);
        assert_eq!(request.count.as_deref(), Some("4"));
        assert!(!request.infinite);
    }

    #[test]
    fn test_explicit_count_overrides_infinite_default() {
        let args = RunArgs {
            count: Some("3".to_string()),
            ..RunArgs::default()
        };
        assert!(!args.to_request(&UserDefaults::default()).infinite);
        assert!(RunArgs::default().to_request(&UserDefaults::default()).infinite);
    }

    #[test]
    fn test_count_conflicts_with_infinite() {
        let result = Cli::try_parse_from([
            "repeat-viewer",
            "run",
            "https://youtu.be/abc",
            "--count",
            "2",
            "--infinite",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_unknown_unit_is_rejected() {
        let result = Cli::try_parse_from(["repeat-viewer", "run", "--unit", "fortnights"]);
        assert!(result.is_err());
    }
}
