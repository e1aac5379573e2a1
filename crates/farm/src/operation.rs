//! Filesystem operations
//!
//! Operations are plain data. Side effects live in the executor.

use crate::error::{Error, Result};
use crate::path::FilePath;
use std::fmt;
use std::path::PathBuf;

/// Unique, deterministic identifier of an operation within a plan
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OperationId(String);

impl OperationId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// `<step>-<package>:<key>`, e.g. `manage-link-vim:.vimrc`
    pub fn scoped(step: &str, package: &str, key: &str) -> Self {
        Self(format!("{step}-{package}:{key}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for OperationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for OperationId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for OperationId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Kind of operation, without its payload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationKind {
    LinkCreate,
    LinkDelete,
    DirCreate,
    DirDelete,
    FileMove,
    FileBackup,
}

impl OperationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::LinkCreate => "link-create",
            Self::LinkDelete => "link-delete",
            Self::DirCreate => "dir-create",
            Self::DirDelete => "dir-delete",
            Self::FileMove => "file-move",
            Self::FileBackup => "file-backup",
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What an operation does
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Create `target` as a symlink to `source`
    LinkCreate { source: FilePath, target: FilePath },
    /// Remove the symlink at `target`
    ///
    /// `previous` is the link's content when planned, so rollback can
    /// recreate it.
    LinkDelete {
        target: FilePath,
        previous: Option<PathBuf>,
    },
    /// Create a single directory (parent must exist)
    DirCreate { path: FilePath },
    /// Remove an empty directory
    DirDelete { path: FilePath },
    /// Rename `source` to `dest`
    FileMove { source: FilePath, dest: FilePath },
    /// Move `source` aside to `backup`
    FileBackup { source: FilePath, backup: FilePath },
}

/// A single planned filesystem change
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Operation {
    pub id: OperationId,
    pub action: Action,
    /// Operations that must complete before this one starts
    pub depends_on: Vec<OperationId>,
}

impl Operation {
    pub fn new(id: impl Into<OperationId>, action: Action) -> Self {
        Self {
            id: id.into(),
            action,
            depends_on: Vec::new(),
        }
    }

    pub fn link_create(id: impl Into<OperationId>, source: FilePath, target: FilePath) -> Self {
        Self::new(id, Action::LinkCreate { source, target })
    }

    pub fn link_delete(
        id: impl Into<OperationId>,
        target: FilePath,
        previous: Option<PathBuf>,
    ) -> Self {
        Self::new(id, Action::LinkDelete { target, previous })
    }

    pub fn dir_create(id: impl Into<OperationId>, path: FilePath) -> Self {
        Self::new(id, Action::DirCreate { path })
    }

    pub fn dir_delete(id: impl Into<OperationId>, path: FilePath) -> Self {
        Self::new(id, Action::DirDelete { path })
    }

    pub fn file_move(id: impl Into<OperationId>, source: FilePath, dest: FilePath) -> Self {
        Self::new(id, Action::FileMove { source, dest })
    }

    pub fn file_backup(id: impl Into<OperationId>, source: FilePath, backup: FilePath) -> Self {
        Self::new(id, Action::FileBackup { source, backup })
    }

    /// Add a dependency (duplicates are ignored)
    pub fn with_dependency(mut self, dep: OperationId) -> Self {
        self.add_dependency(dep);
        self
    }

    pub fn add_dependency(&mut self, dep: OperationId) {
        if dep != self.id && !self.depends_on.contains(&dep) {
            self.depends_on.push(dep);
        }
    }

    pub fn kind(&self) -> OperationKind {
        match self.action {
            Action::LinkCreate { .. } => OperationKind::LinkCreate,
            Action::LinkDelete { .. } => OperationKind::LinkDelete,
            Action::DirCreate { .. } => OperationKind::DirCreate,
            Action::DirDelete { .. } => OperationKind::DirDelete,
            Action::FileMove { .. } => OperationKind::FileMove,
            Action::FileBackup { .. } => OperationKind::FileBackup,
        }
    }

    /// Path this operation changes in place
    pub fn primary_path(&self) -> &FilePath {
        match &self.action {
            Action::LinkCreate { target, .. } | Action::LinkDelete { target, .. } => target,
            Action::DirCreate { path } | Action::DirDelete { path } => path,
            Action::FileMove { source, .. } | Action::FileBackup { source, .. } => source,
        }
    }

    /// Path this operation brings into existence, if any
    pub fn produced_path(&self) -> Option<&FilePath> {
        match &self.action {
            Action::LinkCreate { target, .. } => Some(target),
            Action::DirCreate { path } => Some(path),
            Action::FileMove { dest, .. } => Some(dest),
            Action::FileBackup { backup, .. } => Some(backup),
            Action::LinkDelete { .. } | Action::DirDelete { .. } => None,
        }
    }

    /// Self-validation independent of filesystem state
    pub fn validate(&self) -> Result<()> {
        let invalid = |reason: &str| Error::InvalidOperation {
            id: self.id.clone(),
            reason: reason.to_string(),
        };

        if self.id.is_empty() {
            return Err(invalid("operation id cannot be empty"));
        }
        if self.depends_on.contains(&self.id) {
            return Err(invalid("operation depends on itself"));
        }
        match &self.action {
            Action::LinkCreate { source, target } if source == target => {
                Err(invalid("link source and target are the same path"))
            }
            Action::FileMove { source, dest } if source == dest => {
                Err(invalid("move source and destination are the same path"))
            }
            Action::FileBackup { source, backup } if source == backup => {
                Err(invalid("backup path equals the original path"))
            }
            _ => Ok(()),
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.action {
            Action::LinkCreate { source, target } => write!(f, "create link {target} -> {source}"),
            Action::LinkDelete { target, .. } => write!(f, "delete link {target}"),
            Action::DirCreate { path } => write!(f, "create directory {path}"),
            Action::DirDelete { path } => write!(f, "delete directory {path}"),
            Action::FileMove { source, dest } => write!(f, "move {source} -> {dest}"),
            Action::FileBackup { source, backup } => write!(f, "back up {source} -> {backup}"),
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[test]
    fn describe_link_create() {
        let op = Operation::link_create(
            "manage-link-.vimrc",
            FilePath::must("/pkgs/vim/dot-vimrc"),
            FilePath::must("/home/me/.vimrc"),
        );
        assert_eq!(op.kind(), OperationKind::LinkCreate);
        assert_eq!(op.to_string(), "create link /home/me/.vimrc -> /pkgs/vim/dot-vimrc");
        assert!(op.validate().is_ok());
    }

    #[test]
    fn scoped_id_names_package() {
        let id = OperationId::scoped("manage-link", "vim", ".vimrc");
        assert_eq!(id.as_str(), "manage-link-vim:.vimrc");
        assert_ne!(id, OperationId::scoped("manage-link", "neovim", ".vimrc"));
    }

    #[test]
    fn validate_empty_id() {
        let op = Operation::dir_create("", FilePath::must("/home/me/.config"));
        assert!(matches!(op.validate(), Err(Error::InvalidOperation { .. })));
    }

    #[test]
    fn validate_same_paths() {
        let p = FilePath::must("/x");
        assert!(Operation::file_move("m", p.clone(), p.clone()).validate().is_err());
        assert!(Operation::link_create("l", p.clone(), p).validate().is_err());
    }

    #[test]
    fn dependencies_deduplicated() {
        let op = Operation::dir_create("b", FilePath::must("/b"))
            .with_dependency(OperationId::new("a"))
            .with_dependency(OperationId::new("a"))
            .with_dependency(OperationId::new("b"));
        assert_eq!(op.depends_on, vec![OperationId::new("a")]);
    }

    #[test]
    fn equality_compares_payload() {
        let a = Operation::dir_create("d", FilePath::must("/d"));
        let b = Operation::dir_create("d", FilePath::must("/d"));
        let c = Operation::dir_delete("d", FilePath::must("/d"));
        assert_eq!(a, b);
        assert_ne!(a, c);
    }
}
