use anyhow::{Context, Result};
use std::path::Path;

use crate::logging::LogLevel;

/// Default number of bytes scanned back from the end of a Vorbis payload
pub const DEFAULT_TAIL_SCAN_WINDOW: u64 = 64 * 1024;

/// Options that affect how bank sessions are opened
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BankOptions {
    /// Bytes scanned back from the end of an Ogg payload for the final granule
    pub tail_scan_window: u64,
    pub log_level: LogLevel,
}

impl Default for BankOptions {
    fn default() -> Self {
        Self {
            tail_scan_window: DEFAULT_TAIL_SCAN_WINDOW,
            log_level: LogLevel::Warning,
        }
    }
}

impl BankOptions {
    pub fn with_tail_scan_window(mut self, window: u64) -> Self {
        self.tail_scan_window = window;
        self
    }

    pub fn with_log_level(mut self, level: LogLevel) -> Self {
        self.log_level = level;
        self
    }
}

/// Load options from a `key = value` file.
///
/// A missing file yields the defaults. Blank lines and lines starting with
/// `#` are ignored.
pub fn load_options(path: &Path) -> Result<BankOptions> {
    if !path.exists() {
        return Ok(BankOptions::default());
    }

    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file {:?}", path))?;
    parse_options(&text).with_context(|| format!("Invalid config file {:?}", path))
}

/// Parse options from `key = value` text
pub fn parse_options(text: &str) -> Result<BankOptions> {
    let mut options = BankOptions::default();

    for (number, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let (key, value) = line
            .split_once('=')
            .with_context(|| format!("Line {}: expected key = value", number + 1))?;
        let value = value.trim();

        match key.trim() {
            "tail_scan_window" => options.tail_scan_window = parse_window(value)?,
            "log_level" => options.log_level = parse_log_level(value)?,
            other => anyhow::bail!("Line {}: unknown option '{}'", number + 1, other),
        }
    }

    Ok(options)
}

/// Parse a scan window, accepting a `k` suffix for kibibytes
pub fn parse_window(s: &str) -> Result<u64> {
    let (digits, scale) = match s.strip_suffix(|c: char| c == 'k' || c == 'K') {
        Some(digits) => (digits, 1024),
        None => (s, 1),
    };

    let window: u64 = digits.trim().parse().context("Invalid scan window value")?;
    if window == 0 {
        anyhow::bail!("Scan window must be positive");
    }

    Ok(window * scale)
}

/// Parse a log level name (nothing, user, error, warning, info, debug, all)
pub fn parse_log_level(s: &str) -> Result<LogLevel> {
    match s.to_ascii_lowercase().as_str() {
        "nothing" | "off" => Ok(LogLevel::Nothing),
        "user" => Ok(LogLevel::User),
        "error" => Ok(LogLevel::Error),
        "warning" | "warn" => Ok(LogLevel::Warning),
        "info" => Ok(LogLevel::Info),
        "debug" => Ok(LogLevel::Debug),
        "all" | "trace" => Ok(LogLevel::All),
        _ => anyhow::bail!("Unknown log level '{}'", s),
    }
}
