//! External tool discovery.
//!
//! The pipeline shells out to three programs:
//! - `yt-dlp` for media search and page downloads
//! - `ffmpeg` for transcoding to PCM
//! - a headless Chrome/Chromium for the browser search fallback
//!
//! Install:
//! - Windows: `winget install yt-dlp.yt-dlp Gyan.FFmpeg Google.Chrome`
//! - macOS: `brew install yt-dlp ffmpeg` plus Chrome
//! - Linux: `apt install yt-dlp ffmpeg chromium` or equivalent

use std::path::{Path, PathBuf};
use std::process::Command;

use crate::config::ToolsConfig;

/// Common installation paths for a headless-capable browser
#[cfg(windows)]
const BROWSER_PATHS: &[&str] = &[
    "chrome",
    r"C:\Program Files\Google\Chrome\Application\chrome.exe",
    r"C:\Program Files (x86)\Google\Chrome\Application\chrome.exe",
    r"C:\Program Files\Chromium\Application\chrome.exe",
];

#[cfg(target_os = "macos")]
const BROWSER_PATHS: &[&str] = &[
    "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
    "/Applications/Chromium.app/Contents/MacOS/Chromium",
    "chromium",
];

#[cfg(not(any(windows, target_os = "macos")))]
const BROWSER_PATHS: &[&str] = &[
    "chromium",
    "chromium-browser",
    "google-chrome",
    "google-chrome-stable",
    "/usr/bin/chromium",
    "/snap/bin/chromium",
];

/// Run `program <version_arg>` and return the first line of its output
pub fn query_version(program: &Path, version_arg: &str) -> Option<String> {
    Command::new(program)
        .arg(version_arg)
        .output()
        .ok()
        .filter(|o| o.status.success())
        .and_then(|o| {
            String::from_utf8_lossy(&o.stdout)
                .lines()
                .next()
                .map(|line| line.trim().to_string())
        })
}

/// Find a headless browser: the configured path if it runs, else the first
/// common installation that does
pub fn find_browser(configured: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = configured {
        return query_version(path, "--version").map(|_| path.to_path_buf());
    }
    BROWSER_PATHS
        .iter()
        .map(PathBuf::from)
        .find(|path| query_version(path, "--version").is_some())
}

/// Availability of one external tool
#[derive(Debug, Clone)]
pub struct ToolStatus {
    pub name: &'static str,
    pub path: Option<PathBuf>,
    pub version: Option<String>,
}

impl ToolStatus {
    pub fn is_available(&self) -> bool {
        self.version.is_some()
    }
}

/// Check every tool the pipeline can use (for `check-tools`)
pub fn check_tools(config: &ToolsConfig) -> Vec<ToolStatus> {
    let yt_dlp = query_version(&config.yt_dlp, "--version");
    let ffmpeg = query_version(&config.ffmpeg, "-version");
    let browser = find_browser(config.browser.as_deref());
    let browser_version = browser
        .as_deref()
        .and_then(|path| query_version(path, "--version"));

    vec![
        ToolStatus {
            name: "yt-dlp",
            path: Some(config.yt_dlp.clone()),
            version: yt_dlp,
        },
        ToolStatus {
            name: "ffmpeg",
            path: Some(config.ffmpeg.clone()),
            version: ffmpeg,
        },
        ToolStatus {
            name: "browser",
            path: browser.or_else(|| config.browser.clone()),
            version: browser_version,
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_program_has_no_version() {
        assert!(query_version(Path::new("/nonexistent/tool-xyz"), "--version").is_none());
    }

    #[test]
    fn test_configured_browser_that_does_not_run() {
        assert!(find_browser(Some(Path::new("/nonexistent/chrome"))).is_none());
    }

    #[test]
    fn test_check_tools_reports_every_tool() {
        let config = ToolsConfig {
            yt_dlp: PathBuf::from("/nonexistent/yt-dlp"),
            ffmpeg: PathBuf::from("/nonexistent/ffmpeg"),
            browser: Some(PathBuf::from("/nonexistent/chrome")),
            cookies_file: None,
        };
        let report = check_tools(&config);
        let names: Vec<_> = report.iter().map(|t| t.name).collect();
        assert_eq!(names, vec!["yt-dlp", "ffmpeg", "browser"]);
        assert!(report.iter().all(|t| !t.is_available()));
    }
}
