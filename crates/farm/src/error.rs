//! Error types for the planning and execution core.
//!
//! Errors are categorized so callers can tell a bad request (structural)
//! from a policy decision (conflict), a failed filesystem change
//! (execution) or broken persistence (infrastructure).

use crate::conflict::Conflict;
use crate::operation::OperationId;
use std::path::PathBuf;
use thiserror::Error;

/// Categories of errors, mirroring how each is reported to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Invalid input; nothing was planned
    Structural,
    /// Target already occupied and the policy refused to resolve it
    Conflict,
    /// A filesystem change failed part-way through a plan
    Execution,
    /// Manifest could not be read or written
    Infrastructure,
    /// Degraded but recoverable (logged, never returned on its own)
    BestEffort,
}

impl ErrorCategory {
    /// Get a user-friendly description of this error category.
    pub fn description(&self) -> &'static str {
        match self {
            Self::Structural => "Invalid request",
            Self::Conflict => "Conflicting files in target",
            Self::Execution => "Filesystem operation failed",
            Self::Infrastructure => "Manifest unavailable",
            Self::BestEffort => "Partially completed",
        }
    }

    /// Get actionable advice for resolving this error category.
    pub fn advice(&self) -> &'static str {
        match self {
            Self::Structural => "Check package names and directory settings",
            Self::Conflict => "Re-run with --backup, --overwrite or --skip-conflicts, or adopt the files",
            Self::Execution => "Completed operations were rolled back; fix the cause and retry",
            Self::Infrastructure => "Check permissions on the target directory and the manifest file",
            Self::BestEffort => "Run `dot doctor` to inspect the current state",
        }
    }
}

/// Errors that can occur while planning or executing operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Path failed validation
    #[error("invalid path {}: {reason}", .path.display())]
    InvalidPath { path: PathBuf, reason: String },

    /// Package directory missing
    #[error("package not found: {name} (expected at {})", .path.display())]
    PackageNotFound { name: String, path: PathBuf },

    /// File to adopt does not exist
    #[error("source not found: {}", .0.display())]
    SourceNotFound(PathBuf),

    /// Adopt destination already present in the package
    #[error("destination already exists: {}", .0.display())]
    DestinationExists(PathBuf),

    /// Conflicts the resolution policy refused to resolve
    #[error("{} conflict(s) in target: {}", .0.len(), summarize_conflicts(.0))]
    Conflicts(Vec<Conflict>),

    /// Plan contained no operations
    #[error("plan contains no operations")]
    EmptyPlan,

    /// Operation failed self-validation
    #[error("invalid operation {id}: {reason}")]
    InvalidOperation { id: OperationId, reason: String },

    /// Plan failed structural validation
    #[error("invalid plan: {0}")]
    InvalidPlan(String),

    /// Operation depends on an id not present in the plan
    #[error("operation {id} depends on unknown operation {dependency}")]
    UnknownDependency {
        id: OperationId,
        dependency: OperationId,
    },

    /// Dependencies form a cycle
    #[error("cyclic dependency: {}", .cycle.iter().map(ToString::to_string).collect::<Vec<_>>().join(" -> "))]
    CyclicDependency { cycle: Vec<OperationId> },

    /// Operation cannot run against the current filesystem
    #[error("precondition failed for {id}: {reason}")]
    PreconditionFailed { id: OperationId, reason: String },

    /// Some operations failed; completed ones were rolled back
    #[error(
        "execution failed: {} operation(s) failed, {} rolled back: {}",
        .failed.len(),
        .rolled_back.len(),
        .errors.join("; ")
    )]
    ExecutionFailed {
        executed: Vec<OperationId>,
        failed: Vec<OperationId>,
        rolled_back: Vec<OperationId>,
        errors: Vec<String>,
    },

    /// Execution stopped by a cancellation request
    #[error("operation cancelled")]
    Cancelled,

    /// Several independent failures
    #[error("{} errors: {}", .0.len(), .0.iter().map(ToString::to_string).collect::<Vec<_>>().join("; "))]
    Multiple(Vec<Error>),

    /// Manifest store failure
    #[error(transparent)]
    Manifest(#[from] manifest::Error),

    /// Filesystem error while inspecting state
    #[error("IO error at {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl Error {
    /// Wrap an IO error with the path it concerns
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Categorize this error
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::InvalidPath { .. }
            | Self::PackageNotFound { .. }
            | Self::SourceNotFound(_)
            | Self::DestinationExists(_)
            | Self::EmptyPlan
            | Self::InvalidOperation { .. }
            | Self::InvalidPlan(_)
            | Self::UnknownDependency { .. }
            | Self::CyclicDependency { .. } => ErrorCategory::Structural,
            Self::Conflicts(_) => ErrorCategory::Conflict,
            Self::PreconditionFailed { .. }
            | Self::ExecutionFailed { .. }
            | Self::Cancelled
            | Self::Io { .. } => ErrorCategory::Execution,
            Self::Manifest(_) => ErrorCategory::Infrastructure,
            Self::Multiple(errors) => errors
                .first()
                .map_or(ErrorCategory::Execution, Error::category),
        }
    }
}

fn summarize_conflicts(conflicts: &[Conflict]) -> String {
    conflicts
        .iter()
        .map(|c| format!("{} at {}", c.kind, c.path.display()))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Result type for planning and execution
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conflict::ConflictType;

    #[test]
    fn categories() {
        assert_eq!(Error::EmptyPlan.category(), ErrorCategory::Structural);
        assert_eq!(Error::Cancelled.category(), ErrorCategory::Execution);
        assert_eq!(
            Error::Conflicts(Vec::new()).category(),
            ErrorCategory::Conflict
        );
        assert_eq!(
            Error::Manifest(manifest::Error::InvalidPath("x".into())).category(),
            ErrorCategory::Infrastructure
        );
    }

    #[test]
    fn conflicts_message_lists_paths() {
        let err = Error::Conflicts(vec![Conflict::new(
            ConflictType::FileExists,
            "/home/me/.vimrc",
            "regular file in the way",
        )]);
        let msg = err.to_string();
        assert!(msg.contains("1 conflict(s)"));
        assert!(msg.contains(".vimrc"));
    }

    #[test]
    fn execution_failed_message() {
        let err = Error::ExecutionFailed {
            executed: Vec::new(),
            failed: vec![OperationId::new("manage-link-c")],
            rolled_back: vec![OperationId::new("manage-link-a")],
            errors: vec!["manage-link-c: permission denied".into()],
        };
        let msg = err.to_string();
        assert!(msg.contains("1 operation(s) failed"));
        assert!(msg.contains("manage-link-c"));
    }
}
