//! CLI output helpers for consistent formatting.

use colored::Colorize;

pub fn heading(text: &str) -> String {
    format!("{}", text.bright_cyan())
}

pub fn label(text: &str) -> String {
    format!("{}", text.bright_blue())
}

pub fn muted(text: &str) -> String {
    format!("{}", text.bright_black())
}

pub fn success(text: &str) -> String {
    format!("{}", text.bright_green())
}

pub fn err_line(text: &str) -> String {
    format!("{} {}", "Error".red().bold(), text)
}

pub fn status_ok() -> String {
    format!("{}", "OK".green())
}

/// `from.local -> to.remote`, arrow flipped for incoming edges.
pub fn edge(from: &str, local: &str, to: &str, remote: &str, outgoing: bool) -> String {
    let arrow = if outgoing { "->" } else { "<-" };
    format!("{from}.{local} {} {to}.{remote}", arrow.bright_black())
}
