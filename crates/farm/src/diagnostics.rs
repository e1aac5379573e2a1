//! Doctor report types

use serde::Serialize;
use std::fmt;
use std::path::PathBuf;

/// What kind of problem an issue describes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum IssueType {
    BrokenLink,
    OrphanedLink,
    WrongTarget,
    Permission,
    Circular,
    ManifestInconsistency,
}

impl IssueType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::BrokenLink => "broken-link",
            Self::OrphanedLink => "orphaned-link",
            Self::WrongTarget => "wrong-target",
            Self::Permission => "permission",
            Self::Circular => "circular",
            Self::ManifestInconsistency => "manifest-inconsistency",
        }
    }
}

impl fmt::Display for IssueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum IssueSeverity {
    Info,
    Warning,
    Error,
}

impl fmt::Display for IssueSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Info => "info",
            Self::Warning => "warning",
            Self::Error => "error",
        })
    }
}

/// One finding
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Issue {
    pub kind: IssueType,
    pub severity: IssueSeverity,
    /// Path relative to the target directory when known, else absolute
    pub path: PathBuf,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
}

impl Issue {
    pub fn new(
        kind: IssueType,
        severity: IssueSeverity,
        path: impl Into<PathBuf>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            severity,
            path: path.into(),
            message: message.into(),
            suggestion: None,
        }
    }

    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }
}

/// Overall verdict of a doctor run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    #[default]
    Ok,
    Warnings,
    Errors,
}

impl HealthStatus {
    /// Worst status implied by `issues`
    pub fn from_issues(issues: &[Issue]) -> Self {
        match issues.iter().map(|i| i.severity).max() {
            Some(IssueSeverity::Error) => Self::Errors,
            Some(IssueSeverity::Warning) => Self::Warnings,
            Some(IssueSeverity::Info) | None => Self::Ok,
        }
    }
}

impl fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Ok => "healthy",
            Self::Warnings => "warnings",
            Self::Errors => "errors",
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DiagnosticStats {
    /// Links recorded in the manifest
    pub total_links: usize,
    pub managed_links: usize,
    pub broken_links: usize,
    pub orphaned_links: usize,
}

/// Result of a doctor run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DiagnosticReport {
    pub health: HealthStatus,
    pub issues: Vec<Issue>,
    pub stats: DiagnosticStats,
    /// The orphan scan stopped at its issue cap
    pub truncated: bool,
}

impl DiagnosticReport {
    /// Build a report, deriving health from the issues
    pub fn new(issues: Vec<Issue>, stats: DiagnosticStats, truncated: bool) -> Self {
        Self {
            health: HealthStatus::from_issues(&issues),
            issues,
            stats,
            truncated,
        }
    }

    pub fn is_healthy(&self) -> bool {
        self.health == HealthStatus::Ok
    }

    pub fn count(&self, severity: IssueSeverity) -> usize {
        self.issues.iter().filter(|i| i.severity == severity).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn health_from_worst_severity() {
        let info = Issue::new(IssueType::ManifestInconsistency, IssueSeverity::Info, "x", "m");
        let warn = Issue::new(IssueType::OrphanedLink, IssueSeverity::Warning, "y", "m");
        let err = Issue::new(IssueType::BrokenLink, IssueSeverity::Error, "z", "m");

        assert_eq!(HealthStatus::from_issues(&[]), HealthStatus::Ok);
        assert_eq!(HealthStatus::from_issues(&[info.clone()]), HealthStatus::Ok);
        assert_eq!(
            HealthStatus::from_issues(&[info.clone(), warn.clone()]),
            HealthStatus::Warnings
        );
        assert_eq!(HealthStatus::from_issues(&[warn, err, info]), HealthStatus::Errors);
    }

    #[test]
    fn issue_type_serializes_kebab_case() {
        let json = serde_json::to_string(&IssueType::ManifestInconsistency).unwrap();
        assert_eq!(json, "\"manifest-inconsistency\"");
    }
}
