//! Conflicts, warnings and resolution policies

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// Why a prospective link cannot simply be created
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ConflictType {
    /// A regular file (or non-directory) occupies the position
    FileExists,
    /// A symlink points somewhere else
    WrongLink,
    /// A symlink points at a path that does not exist
    BrokenLinkTarget,
    /// A real directory occupies the position
    NotSymlink,
}

impl ConflictType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::FileExists => "file-exists",
            Self::WrongLink => "wrong-link",
            Self::BrokenLinkTarget => "broken-link-target",
            Self::NotSymlink => "not-symlink",
        }
    }
}

impl fmt::Display for ConflictType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Actionable hint attached to a conflict
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Suggestion {
    pub action: String,
    pub explanation: String,
}

impl Suggestion {
    fn new(action: &str, explanation: &str) -> Self {
        Self {
            action: action.to_string(),
            explanation: explanation.to_string(),
        }
    }
}

/// Mismatch between desired and actual target state
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Conflict {
    pub kind: ConflictType,
    pub path: PathBuf,
    pub details: String,
    pub context: BTreeMap<String, String>,
    pub suggestions: Vec<Suggestion>,
}

impl Conflict {
    pub fn new(kind: ConflictType, path: impl Into<PathBuf>, details: impl Into<String>) -> Self {
        Self {
            kind,
            path: path.into(),
            details: details.into(),
            context: BTreeMap::new(),
            suggestions: suggestions_for(kind),
        }
    }

    pub fn with_context(mut self, key: &str, value: impl Into<String>) -> Self {
        self.context.insert(key.to_string(), value.into());
        self
    }
}

impl fmt::Display for Conflict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {} ({})", self.kind, self.path.display(), self.details)
    }
}

/// Standard hints per conflict type
pub fn suggestions_for(kind: ConflictType) -> Vec<Suggestion> {
    match kind {
        ConflictType::FileExists => vec![
            Suggestion::new(
                "Use --backup",
                "Moves the existing file aside before linking",
            ),
            Suggestion::new(
                "Use `dot adopt`",
                "Moves the existing file into the package and links it back",
            ),
            Suggestion::new(
                "Remove the conflicting file manually",
                "Only if its content is no longer needed",
            ),
        ],
        ConflictType::WrongLink => vec![
            Suggestion::new(
                "Use --overwrite",
                "Replaces the existing symlink with one into the package",
            ),
            Suggestion::new(
                "Unmanage the other package first",
                "The link may belong to a different package",
            ),
        ],
        ConflictType::BrokenLinkTarget => vec![
            Suggestion::new(
                "Use --overwrite",
                "The existing symlink is dangling and can be replaced",
            ),
            Suggestion::new("Remove the broken symlink manually", "Then re-run manage"),
        ],
        ConflictType::NotSymlink => vec![
            Suggestion::new(
                "Use --backup",
                "Moves the existing directory aside before linking",
            ),
            Suggestion::new(
                "Use `dot adopt`",
                "Moves the directory contents into the package",
            ),
        ],
    }
}

/// How loud a warning is
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum WarningSeverity {
    Info,
    Caution,
    Danger,
}

impl fmt::Display for WarningSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Info => "info",
            Self::Caution => "caution",
            Self::Danger => "danger",
        })
    }
}

/// Non-fatal diagnostic attached to a plan
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Warning {
    pub message: String,
    pub severity: WarningSeverity,
    pub context: BTreeMap<String, String>,
}

impl Warning {
    pub fn new(severity: WarningSeverity, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            severity,
            context: BTreeMap::new(),
        }
    }

    pub fn with_context(mut self, key: &str, value: impl Into<String>) -> Self {
        self.context.insert(key.to_string(), value.into());
        self
    }
}

/// What to do when a conflict is found
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResolutionPolicy {
    /// Abort planning
    #[default]
    Fail,
    /// Move the occupant aside, then link
    Backup,
    /// Replace links and empty directories; files fall back to backup
    Overwrite,
    /// Leave the occupant, skip the link, warn
    Skip,
}

impl FromStr for ResolutionPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "fail" => Ok(Self::Fail),
            "backup" => Ok(Self::Backup),
            "overwrite" => Ok(Self::Overwrite),
            "skip" => Ok(Self::Skip),
            other => Err(format!(
                "unknown conflict policy '{other}' (expected fail, backup, overwrite or skip)"
            )),
        }
    }
}

/// One policy per conflict type
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResolutionPolicies {
    pub on_file_exists: ResolutionPolicy,
    pub on_wrong_link: ResolutionPolicy,
    pub on_broken_link_target: ResolutionPolicy,
    pub on_not_symlink: ResolutionPolicy,
}

impl ResolutionPolicies {
    /// Same policy for every conflict type
    pub fn uniform(policy: ResolutionPolicy) -> Self {
        Self {
            on_file_exists: policy,
            on_wrong_link: policy,
            on_broken_link_target: policy,
            on_not_symlink: policy,
        }
    }

    pub fn for_conflict(&self, kind: ConflictType) -> ResolutionPolicy {
        match kind {
            ConflictType::FileExists => self.on_file_exists,
            ConflictType::WrongLink => self.on_wrong_link,
            ConflictType::BrokenLinkTarget => self.on_broken_link_target,
            ConflictType::NotSymlink => self.on_not_symlink,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_policies_fail() {
        let policies = ResolutionPolicies::default();
        for kind in [
            ConflictType::FileExists,
            ConflictType::WrongLink,
            ConflictType::BrokenLinkTarget,
            ConflictType::NotSymlink,
        ] {
            assert_eq!(policies.for_conflict(kind), ResolutionPolicy::Fail);
        }
    }

    #[test]
    fn parse_policy() {
        assert_eq!("Backup".parse::<ResolutionPolicy>(), Ok(ResolutionPolicy::Backup));
        assert!("explode".parse::<ResolutionPolicy>().is_err());
    }

    #[test]
    fn conflict_has_suggestions() {
        let c = Conflict::new(ConflictType::FileExists, "/home/me/.vimrc", "file")
            .with_context("package", "vim");
        assert!(!c.suggestions.is_empty());
        assert_eq!(c.context.get("package").map(String::as_str), Some("vim"));
        assert_eq!(c.to_string(), "file-exists: /home/me/.vimrc (file)");
    }
}
