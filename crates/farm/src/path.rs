//! Typed filesystem paths
//!
//! Package roots, target roots and plain file paths share one runtime
//! representation but are distinct types, so a package root can never be
//! passed where a target root is expected. Every value holds an absolute,
//! lexically normalized path.

use crate::error::{Error, Result};
use std::fmt;
use std::marker::PhantomData;
use std::path::{Component, Path, PathBuf};

/// Marker for the role a [`TypedPath`] plays
pub trait PathKind: Copy + Eq + Send + Sync + 'static {
    /// Human-readable role name used in error messages
    const LABEL: &'static str;
}

/// Directory containing packages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PackageRoot;

/// Directory links are installed into
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TargetRoot;

/// Any file or directory
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AnyFile;

impl PathKind for PackageRoot {
    const LABEL: &'static str = "package directory";
}

impl PathKind for TargetRoot {
    const LABEL: &'static str = "target directory";
}

impl PathKind for AnyFile {
    const LABEL: &'static str = "path";
}

/// An absolute path tagged with its role
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypedPath<K: PathKind> {
    path: PathBuf,
    _kind: PhantomData<K>,
}

pub type PackagePath = TypedPath<PackageRoot>;
pub type TargetPath = TypedPath<TargetRoot>;
pub type FilePath = TypedPath<AnyFile>;

impl<K: PathKind> TypedPath<K> {
    /// Validate and wrap a path
    ///
    /// Fails if the path is empty or relative.
    pub fn new(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if path.as_os_str().is_empty() {
            return Err(Error::InvalidPath {
                path,
                reason: format!("{} cannot be empty", K::LABEL),
            });
        }
        if !path.is_absolute() {
            return Err(Error::InvalidPath {
                path,
                reason: format!("{} must be absolute", K::LABEL),
            });
        }
        Ok(Self {
            path: normalize(&path),
            _kind: PhantomData,
        })
    }

    /// Wrap a path known to be valid
    ///
    /// # Panics
    /// Panics if the path is empty or relative.
    pub fn must(path: impl Into<PathBuf>) -> Self {
        match Self::new(path) {
            Ok(p) => p,
            Err(e) => panic!("{e}"),
        }
    }

    pub fn as_path(&self) -> &Path {
        &self.path
    }

    pub fn into_path_buf(self) -> PathBuf {
        self.path
    }

    /// Append a relative path
    pub fn join(&self, rel: impl AsRef<Path>) -> FilePath {
        FilePath {
            path: normalize(&self.path.join(rel)),
            _kind: PhantomData,
        }
    }

    /// Parent directory, or `None` at the filesystem root
    pub fn parent(&self) -> Option<FilePath> {
        self.path.parent().map(|p| FilePath {
            path: p.to_path_buf(),
            _kind: PhantomData,
        })
    }

    /// Append `suffix` to the last component (`/h/.vimrc` + `.bak`)
    pub fn with_suffix(&self, suffix: &str) -> FilePath {
        let mut raw = self.path.clone().into_os_string();
        raw.push(suffix);
        FilePath {
            path: normalize(Path::new(&raw)),
            _kind: PhantomData,
        }
    }

    /// Reinterpret as a plain file path
    pub fn to_file(&self) -> FilePath {
        FilePath {
            path: self.path.clone(),
            _kind: PhantomData,
        }
    }

    /// Path relative to `root`, or `None` if not underneath it
    pub fn relative_to<R: PathKind>(&self, root: &TypedPath<R>) -> Option<PathBuf> {
        self.path.strip_prefix(&root.path).ok().map(Path::to_path_buf)
    }

    pub fn file_name(&self) -> Option<&std::ffi::OsStr> {
        self.path.file_name()
    }
}

impl<K: PathKind> AsRef<Path> for TypedPath<K> {
    fn as_ref(&self) -> &Path {
        &self.path
    }
}

impl<K: PathKind> fmt::Display for TypedPath<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.path.display())
    }
}

/// Resolve `.` and `..` components without touching the filesystem
pub fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

/// Relative path that leads from directory `from` to `to`
///
/// Both inputs must be absolute. Paths on different prefixes (Windows
/// drives) cannot be related; `to` is returned unchanged.
pub fn relative_path(from: &Path, to: &Path) -> PathBuf {
    let from: Vec<Component<'_>> = from.components().collect();
    let to_components: Vec<Component<'_>> = to.components().collect();

    if from.first() != to_components.first() {
        return to.to_path_buf();
    }

    let common = from
        .iter()
        .zip(&to_components)
        .take_while(|(a, b)| a == b)
        .count();

    let mut rel = PathBuf::new();
    for _ in common..from.len() {
        rel.push("..");
    }
    for component in &to_components[common..] {
        rel.push(component.as_os_str());
    }
    if rel.as_os_str().is_empty() {
        rel.push(".");
    }
    rel
}

/// Forward-slash rendering of a relative path, used as a stable key
pub fn slash_key(path: &Path) -> String {
    path.components()
        .filter(|c| !matches!(c, Component::CurDir))
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}
