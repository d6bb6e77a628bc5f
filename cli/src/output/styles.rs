//! Output styles using owo-colors stylesheet pattern

use burrow_common::TunnelPhase;
use owo_colors::Style;

/// Centralized stylesheet for CLI output colors.
#[derive(Default, Clone)]
pub struct Styles {
    /// Success messages and the running phase (green)
    pub success: Style,
    /// Warnings, transitional phases and `WRN` agent lines (yellow)
    pub warning: Style,
    /// Errors, the crashed phase and `ERR` agent lines (red)
    pub error: Style,
    /// Info messages (blue)
    pub info: Style,
    /// Keys, the idle phase and routine agent output
    pub dim: Style,
    /// Headers/section titles
    pub header: Style,
    /// Public tunnel URLs
    pub url: Style,
}

impl Styles {
    /// Apply colors to the stylesheet.
    pub fn colorize(&mut self) {
        self.success = Style::new().green();
        self.warning = Style::new().yellow();
        self.error = Style::new().red();
        self.info = Style::new().blue();
        self.dim = Style::new().dimmed();
        self.header = Style::new().bold().cyan();
        self.url = Style::new().underline().cyan();
    }

    #[must_use]
    pub fn phase(&self, phase: TunnelPhase) -> Style {
        match phase {
            TunnelPhase::Running => self.success,
            TunnelPhase::Starting | TunnelPhase::Stopping => self.warning,
            TunnelPhase::Crashed => self.error,
            TunnelPhase::Idle => self.dim,
        }
    }

    /// Style for one line of agent output, keyed on its log level.
    #[must_use]
    pub fn agent_line(&self, line: &str) -> Style {
        match agent_level(line) {
            Some("ERR" | "FTL") => self.error,
            Some("WRN") => self.warning,
            _ => self.dim,
        }
    }
}

/// Marker for the agent's phase glyph.
#[must_use]
pub fn phase_glyph(phase: TunnelPhase) -> &'static str {
    match phase {
        TunnelPhase::Running => "●",
        TunnelPhase::Starting | TunnelPhase::Stopping => "◐",
        TunnelPhase::Crashed => "✗",
        TunnelPhase::Idle => "○",
    }
}

/// Level token of an agent log line (`2024-06-01T10:00:00Z ERR ...` or
/// `ERR ...`), if the line carries one.
fn agent_level(line: &str) -> Option<&str> {
    line.split_whitespace()
        .take(2)
        .find(|word| matches!(*word, "DBG" | "INF" | "WRN" | "ERR" | "FTL"))
}
