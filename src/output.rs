//! # Output Configuration
//!
//! This module provides utilities for controlling CLI output appearance:
//! whether colors and emojis are used, and a few styled building blocks
//! shared by the commands.
//!
//! ## Respecting User Preferences
//!
//! The module respects the following environment variables and flags:
//! - `--color=never|always|auto` - CLI flag for color control
//! - `NO_COLOR` - Disables colors when set (per https://no-color.org/)
//! - `CLICOLOR=0` - Disables colors
//! - `CLICOLOR_FORCE=1` - Forces colors even in non-TTY
//! - `TERM=dumb` - Disables colors for dumb terminals

use std::env;

use console::style;

/// Output configuration for controlling colors and emojis.
#[derive(Debug, Clone)]
pub struct OutputConfig {
    /// Whether colors and emojis should be used in output.
    pub use_color: bool,
}

impl OutputConfig {
    /// Create an output configuration from environment and CLI flag.
    ///
    /// - `always`: Force colors on (overrides NO_COLOR)
    /// - `never`: Force colors off
    /// - anything else: Detect based on environment
    ///
    /// The result is also applied to `console`, so styled strings honor it.
    pub fn from_env_and_flag(color_flag: &str) -> Self {
        let use_color = match color_flag.to_lowercase().as_str() {
            "always" => true,
            "never" => false,
            _ => Self::detect_color_support(),
        };
        console::set_colors_enabled(use_color);
        console::set_colors_enabled_stderr(use_color);

        Self { use_color }
    }

    fn detect_color_support() -> bool {
        // The presence of the variable (even if empty) disables colors
        if env::var_os("NO_COLOR").is_some() {
            return false;
        }

        if env::var("CLICOLOR").is_ok_and(|v| v == "0") {
            return false;
        }

        if env::var("CLICOLOR_FORCE").is_ok_and(|v| v != "0" && !v.is_empty()) {
            return true;
        }

        if env::var("TERM").is_ok_and(|v| v == "dumb") {
            return false;
        }

        console::Term::stdout().features().colors_supported()
    }

    #[cfg(test)]
    pub fn with_color() -> Self {
        Self { use_color: true }
    }

    #[cfg(test)]
    pub fn without_color() -> Self {
        Self { use_color: false }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self::from_env_and_flag("auto")
    }
}

/// Returns the emoji when colors are enabled, `plain` otherwise.
pub fn emoji<'a>(config: &OutputConfig, emoji_str: &'a str, plain: &'a str) -> &'a str {
    if config.use_color {
        emoji_str
    } else {
        plain
    }
}

/// A green `[OK]`-style marker.
pub fn ok_marker(config: &OutputConfig) -> String {
    style(emoji(config, "✅", "[OK]")).green().to_string()
}

/// A red `[ERR]`-style marker.
pub fn err_marker(config: &OutputConfig) -> String {
    style(emoji(config, "❌", "[ERR]")).red().to_string()
}

/// One summary line such as `Deliverables: 3 succeeded, 1 failed`.
pub fn summary_line(label: &str, succeeded: usize, failed: usize) -> String {
    let failed_text = format!("{} failed", failed);
    let failed_text = if failed > 0 {
        style(failed_text).red().bold().to_string()
    } else {
        failed_text
    };
    format!(
        "{}: {} succeeded, {}",
        style(label).bold(),
        style(succeeded).green(),
        failed_text
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_color_never() {
        let config = OutputConfig::from_env_and_flag("never");
        assert!(!config.use_color);
    }

    #[test]
    fn test_emoji_helper() {
        assert_eq!(emoji(&OutputConfig::with_color(), "🔍", "[SCAN]"), "🔍");
        assert_eq!(emoji(&OutputConfig::without_color(), "🔍", "[SCAN]"), "[SCAN]");
    }

    #[test]
    fn test_summary_line_plain() {
        console::set_colors_enabled(false);
        assert_eq!(
            summary_line("Deliverables", 3, 1),
            "Deliverables: 3 succeeded, 1 failed"
        );
    }
}
