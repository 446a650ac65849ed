//! Browser discovery and launch command construction

use crate::config::{UserDefaults, BROWSER_CANDIDATES, BROWSER_ENV, INCOGNITO_FLAG};
use crate::core::models::normalize_executable_name;
use crate::error::ConfigError;
use std::ffi::OsString;
use std::path::{Path, PathBuf};

/// Where the browser profile for a launch comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProfileMode {
    /// Private window; no profile directory is passed.
    Incognito,
    /// Throwaway profile directory owned by the current run.
    Isolated(PathBuf),
}

/// Fully built browser invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchCommand {
    pub program: PathBuf,
    pub args: Vec<OsString>,
}

impl LaunchCommand {
    pub fn build(program: &Path, url: &str, profile: &ProfileMode) -> Self {
        let mut args: Vec<OsString> = vec![
            "--new-window".into(),
            "--autoplay-policy=no-user-gesture-required".into(),
        ];

        match profile {
            ProfileMode::Incognito => args.push(INCOGNITO_FLAG.into()),
            ProfileMode::Isolated(dir) => {
                let mut flag = OsString::from("--user-data-dir=");
                flag.push(dir.as_os_str());
                args.push(flag);
            }
        }

        args.extend(
            [
                "--no-first-run",
                "--no-default-browser-check",
                "--disable-sync",
                "--disable-extensions",
            ]
            .into_iter()
            .map(OsString::from),
        );
        args.push(play_url(url).into());

        Self {
            program: program.to_path_buf(),
            args,
        }
    }

    /// Name processes of this browser report, e.g. `chrome`.
    pub fn executable_name(&self) -> String {
        executable_name(&self.program)
    }
}

/// Append `autoplay=1` to watch-page URLs.
pub fn play_url(url: &str) -> String {
    if !url.contains("youtube.com/watch") {
        return url.to_string();
    }
    let separator = if url.contains('?') { '&' } else { '?' };
    format!("{url}{separator}autoplay=1")
}

pub fn executable_name(program: &Path) -> String {
    program
        .file_name()
        .map(|name| normalize_executable_name(&name.to_string_lossy()))
        .unwrap_or_default()
}

/// Pick the browser executable.
///
/// Order: explicit path, `REPEAT_VIEWER_BROWSER`, the user defaults file,
/// `PATH` search, then well-known install locations.
pub fn resolve_browser(explicit: Option<&Path>) -> Result<PathBuf, ConfigError> {
    if let Some(path) = explicit {
        return check_path(path);
    }
    if let Some(value) = std::env::var_os(BROWSER_ENV).filter(|value| !value.is_empty()) {
        return check_path(Path::new(&value));
    }
    if let Some(path) = UserDefaults::load().browser_path {
        return check_path(&path);
    }
    detect_browser().ok_or(ConfigError::BrowserNotFound)
}

/// Search `PATH`, then the usual install locations.
pub fn detect_browser() -> Option<PathBuf> {
    BROWSER_CANDIDATES
        .iter()
        .find_map(|name| which::which(name).ok())
        .or_else(|| {
            well_known_locations()
                .into_iter()
                .find(|path| path.is_file())
        })
}

fn check_path(path: &Path) -> Result<PathBuf, ConfigError> {
    if path.is_file() {
        return Ok(path.to_path_buf());
    }
    // bare names like `chromium` are looked up on PATH
    if path.components().count() == 1 {
        if let Ok(found) = which::which(path) {
            return Ok(found);
        }
    }
    Err(ConfigError::BrowserMissing {
        path: path.display().to_string(),
    })
}

fn well_known_locations() -> Vec<PathBuf> {
    #[cfg(windows)]
    {
        let mut paths = Vec::new();
        for var in ["ProgramFiles", "ProgramFiles(x86)", "LOCALAPPDATA"] {
            if let Some(base) = std::env::var_os(var) {
                paths.push(
                    PathBuf::from(base)
                        .join("Google")
                        .join("Chrome")
                        .join("Application")
                        .join("chrome.exe"),
                );
            }
        }
        paths
    }

    #[cfg(target_os = "macos")]
    {
        vec![
            PathBuf::from("/Applications/Google Chrome.app/Contents/MacOS/Google Chrome"),
            PathBuf::from("/Applications/Chromium.app/Contents/MacOS/Chromium"),
        ]
    }

    #[cfg(not(any(windows, target_os = "macos")))]
    {
        vec![
            PathBuf::from("/opt/google/chrome/chrome"),
            PathBuf::from("/usr/bin/google-chrome"),
            PathBuf::from("/snap/bin/chromium"),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use test_case::test_case;

    #[test_case("https://www.youtube.com/watch?v=abc", "https://www.youtube.com/watch?v=abc&autoplay=1" ; "watch with query")]
    #[test_case("https://www.youtube.com/watch", "https://www.youtube.com/watch?autoplay=1" ; "watch without query")]
    #[test_case("https://youtu.be/abc", "https://youtu.be/abc" ; "short link untouched")]
    #[test_case("https://www.youtube.com/playlist?list=x", "https://www.youtube.com/playlist?list=x" ; "playlist untouched")]
    fn test_play_url(input: &str, expected: &str) {
        assert_eq!(play_url(input), expected);
    }

    fn args(command: &LaunchCommand) -> Vec<String> {
        command
            .args
            .iter()
            .map(|arg| arg.to_string_lossy().into_owned())
            .collect()
    }

    #[test]
    fn test_isolated_profile_command() {
        let command = LaunchCommand::build(
            Path::new("/opt/google/chrome/chrome"),
            "https://www.youtube.com/watch?v=abc",
            &ProfileMode::Isolated(PathBuf::from("/tmp/youtube_repeater_x")),
        );
        assert_eq!(
            args(&command),
            vec![
                "--new-window",
                "--autoplay-policy=no-user-gesture-required",
                "--user-data-dir=/tmp/youtube_repeater_x",
                "--no-first-run",
                "--no-default-browser-check",
                "--disable-sync",
                "--disable-extensions",
                "https://www.youtube.com/watch?v=abc&autoplay=1",
            ]
        );
        assert_eq!(command.executable_name(), "chrome");
    }

    #[test]
    fn test_incognito_command_has_no_profile_dir() {
        let command = LaunchCommand::build(
            Path::new("chrome.exe"),
            "https://youtu.be/abc",
            &ProfileMode::Incognito,
        );
        let args = args(&command);
        assert!(args.contains(&"--incognito".to_string()));
        assert!(!args.iter().any(|arg| arg.starts_with("--user-data-dir")));
        assert_eq!(args.last().unwrap(), "https://youtu.be/abc");
        assert_eq!(command.executable_name(), "chrome");
    }

    #[test]
    fn test_explicit_missing_browser_is_rejected() {
        let err = resolve_browser(Some(Path::new("/definitely/not/here/chrome"))).unwrap_err();
        assert!(matches!(err, ConfigError::BrowserMissing { .. }));
    }

    #[cfg(unix)]
    #[test]
    fn test_explicit_existing_browser_is_accepted() {
        assert_eq!(
            resolve_browser(Some(Path::new("/bin/sh"))).unwrap(),
            PathBuf::from("/bin/sh")
        );
    }
}
