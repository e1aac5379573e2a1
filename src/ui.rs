//! Terminal rendering shared by the commands
//!
//! Status lines go to stdout except [`Mark::Fail`], which goes to stderr so
//! `--json` output stays clean.

use colored::{ColoredString, Colorize};
use farm::{IssueSeverity, OperationKind, WarningSeverity};

/// Leading glyph of a status line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mark {
    Ok,
    Note,
    Warn,
    Fail,
}

impl Mark {
    fn glyph(self) -> ColoredString {
        match self {
            Self::Ok => "✓".green(),
            Self::Note => "·".blue(),
            Self::Warn => "!".yellow(),
            Self::Fail => "✗".red().bold(),
        }
    }
}

pub fn status(mark: Mark, msg: &str) {
    if mark == Mark::Fail {
        eprintln!("{} {msg}", mark.glyph());
    } else {
        println!("{} {msg}", mark.glyph());
    }
}

/// Green tick for healthy, red cross otherwise
pub fn health(healthy: bool) -> ColoredString {
    let mark = if healthy { Mark::Ok } else { Mark::Fail };
    mark.glyph()
}

/// Report title, underlined
pub fn title(text: &str) {
    println!();
    println!("{}", text.bold());
    println!("{}", "─".repeat(text.chars().count()).dimmed());
}

/// Package (or other group) heading inside a report
pub fn group(name: &str) {
    println!();
    println!("{}", name.cyan().bold());
}

/// Right-aligned label column, so the values of a block line up
pub fn field(label: &str, value: &str) {
    println!("  {:>10}  {value}", label.dimmed());
}

pub fn muted(msg: &str) {
    println!("  {}", msg.dimmed());
}

/// Fixed-width colored label for an operation kind
pub fn op_kind(kind: OperationKind) -> ColoredString {
    let label = format!("{:<11}", kind.as_str());
    match kind {
        OperationKind::LinkCreate => label.green(),
        OperationKind::LinkDelete | OperationKind::DirDelete => label.red(),
        OperationKind::DirCreate => label.blue(),
        OperationKind::FileMove | OperationKind::FileBackup => label.yellow(),
    }
}

pub fn issue_severity(severity: IssueSeverity) -> ColoredString {
    let label = severity.to_string();
    match severity {
        IssueSeverity::Error => label.red(),
        IssueSeverity::Warning => label.yellow(),
        IssueSeverity::Info => label.blue(),
    }
}

pub fn warning_mark(severity: WarningSeverity) -> ColoredString {
    match severity {
        WarningSeverity::Info => "·".dimmed(),
        WarningSeverity::Caution => "!".yellow(),
        WarningSeverity::Danger => "!".red().bold(),
    }
}

/// First line of a numbered finding: `N.  <path> [<kind>]`
pub fn finding(num: usize, path: &str, kind: &str) {
    println!(
        "  {}  {path} {}",
        format!("{num}.").bold(),
        format!("[{kind}]").dimmed()
    );
}

/// Indented fix hint under a finding
pub fn fix(action: &str, explanation: Option<&str>) {
    match explanation {
        Some(why) => println!("      {} {action} {}", "Fix:".cyan(), format!("({why})").dimmed()),
        None => println!("      {} {action}", "Fix:".cyan()),
    }
}

/// `count` followed by `word`, pluralized with a trailing `s`
pub fn plural(count: usize, word: &str) -> String {
    if count == 1 {
        format!("{count} {word}")
    } else {
        format!("{count} {word}s")
    }
}

/// Truncate a path string for display, keeping the end
pub fn truncate_path(path: &str, max_len: usize) -> String {
    let len = path.chars().count();
    if len <= max_len {
        path.to_string()
    } else if max_len <= 3 {
        "...".to_string()
    } else {
        let tail: String = path.chars().skip(len - (max_len - 3)).collect();
        format!("...{tail}")
    }
}
