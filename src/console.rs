//! Operator-facing progress output.
use crate::constants::RULE_WIDTH;

const GREEN_BOLD: &str = "\x1b[1;32m"; // Bright Green
const RED_BOLD: &str = "\x1b[1;31m"; // Bright Red
const YELLOW_BOLD: &str = "\x1b[1;33m"; // Yellow/Gold
const CYAN_BOLD: &str = "\x1b[1;36m"; // Cyan
const RESET: &str = "\x1b[0m"; // Reset color

/// Severity marker printed in front of a status line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Marker {
    Ok,
    Warn,
    Info,
    Error,
}

impl Marker {
    fn label(&self) -> &'static str {
        match self {
            Marker::Ok => "[ok]",
            Marker::Warn => "[warn]",
            Marker::Info => "[info]",
            Marker::Error => "[error]",
        }
    }

    fn color(&self) -> &'static str {
        match self {
            Marker::Ok => GREEN_BOLD,
            Marker::Warn => YELLOW_BOLD,
            Marker::Info => CYAN_BOLD,
            Marker::Error => RED_BOLD,
        }
    }
}

/// Prints the banner, step headers and status lines of a restart run.
#[derive(Debug, Clone, Copy)]
pub struct Console {
    color: bool,
}

impl Console {
    /// Creates a console; `color` toggles ANSI escapes.
    pub fn new(color: bool) -> Self {
        Self { color }
    }

    /// Formats one status line without printing it.
    pub fn format_line(&self, marker: Marker, message: &str) -> String {
        if self.color {
            format!("  {}{}{} {message}", marker.color(), marker.label(), RESET)
        } else {
            format!("  {} {message}", marker.label())
        }
    }

    pub fn banner(&self, title: &str) {
        self.rule();
        println!("  {title}");
        self.rule();
    }

    pub fn rule(&self) {
        println!("{}", "=".repeat(RULE_WIDTH));
    }

    /// `=== [index/total] title ===`
    pub fn step(&self, index: usize, total: usize, title: &str) {
        println!("\n=== [{index}/{total}] {title} ===");
    }

    pub fn ok(&self, message: impl AsRef<str>) {
        println!("{}", self.format_line(Marker::Ok, message.as_ref()));
    }

    pub fn warn(&self, message: impl AsRef<str>) {
        println!("{}", self.format_line(Marker::Warn, message.as_ref()));
    }

    pub fn info(&self, message: impl AsRef<str>) {
        println!("{}", self.format_line(Marker::Info, message.as_ref()));
    }

    pub fn error(&self, message: impl AsRef<str>) {
        println!("{}", self.format_line(Marker::Error, message.as_ref()));
    }

    /// Indented continuation line, e.g. raw socket table output.
    pub fn detail(&self, message: impl AsRef<str>) {
        println!("      {}", message.as_ref());
    }
}
