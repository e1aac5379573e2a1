//! Filesystem capability interface
//!
//! Every component reaches the filesystem through [`FileSystem`] so tests
//! can wrap [`OsFileSystem`] and inject failures.

use std::fs::{self, Metadata};
use std::io;
use std::path::{Path, PathBuf};

/// Capabilities the planner, executor and scanner rely on
pub trait FileSystem: Send + Sync {
    /// Metadata without following symlinks
    fn symlink_metadata(&self, path: &Path) -> io::Result<Metadata>;

    /// Metadata following symlinks
    fn metadata(&self, path: &Path) -> io::Result<Metadata>;

    /// Entries of a directory, sorted by file name
    fn read_dir(&self, path: &Path) -> io::Result<Vec<PathBuf>>;

    fn read_link(&self, path: &Path) -> io::Result<PathBuf>;

    fn read_file(&self, path: &Path) -> io::Result<Vec<u8>>;

    fn write_file(&self, path: &Path, data: &[u8]) -> io::Result<()>;

    fn create_dir(&self, path: &Path) -> io::Result<()>;

    fn create_dir_all(&self, path: &Path) -> io::Result<()>;

    /// Remove a file or symlink
    fn remove_file(&self, path: &Path) -> io::Result<()>;

    /// Remove an empty directory
    fn remove_dir(&self, path: &Path) -> io::Result<()>;

    fn remove_dir_all(&self, path: &Path) -> io::Result<()>;

    /// Create `link` pointing at `original`
    fn symlink(&self, original: &Path, link: &Path) -> io::Result<()>;

    fn rename(&self, from: &Path, to: &Path) -> io::Result<()>;

    fn canonicalize(&self, path: &Path) -> io::Result<PathBuf>;

    /// Anything (including a dangling symlink) exists at `path`
    fn exists(&self, path: &Path) -> bool {
        self.symlink_metadata(path).is_ok()
    }

    /// `path` is a directory, following symlinks
    fn is_dir(&self, path: &Path) -> bool {
        self.metadata(path).is_ok_and(|m| m.is_dir())
    }

    fn is_symlink(&self, path: &Path) -> bool {
        self.symlink_metadata(path)
            .is_ok_and(|m| m.file_type().is_symlink())
    }
}

/// [`FileSystem`] backed by `std::fs`
#[derive(Debug, Clone, Copy, Default)]
pub struct OsFileSystem;

impl FileSystem for OsFileSystem {
    fn symlink_metadata(&self, path: &Path) -> io::Result<Metadata> {
        fs::symlink_metadata(path)
    }

    fn metadata(&self, path: &Path) -> io::Result<Metadata> {
        fs::metadata(path)
    }

    fn read_dir(&self, path: &Path) -> io::Result<Vec<PathBuf>> {
        let mut entries = fs::read_dir(path)?
            .map(|entry| entry.map(|e| e.path()))
            .collect::<io::Result<Vec<_>>>()?;
        entries.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
        Ok(entries)
    }

    fn read_link(&self, path: &Path) -> io::Result<PathBuf> {
        fs::read_link(path)
    }

    fn read_file(&self, path: &Path) -> io::Result<Vec<u8>> {
        fs::read(path)
    }

    fn write_file(&self, path: &Path, data: &[u8]) -> io::Result<()> {
        fs::write(path, data)
    }

    fn create_dir(&self, path: &Path) -> io::Result<()> {
        fs::create_dir(path)
    }

    fn create_dir_all(&self, path: &Path) -> io::Result<()> {
        fs::create_dir_all(path)
    }

    fn remove_file(&self, path: &Path) -> io::Result<()> {
        fs::remove_file(path)
    }

    fn remove_dir(&self, path: &Path) -> io::Result<()> {
        fs::remove_dir(path)
    }

    fn remove_dir_all(&self, path: &Path) -> io::Result<()> {
        fs::remove_dir_all(path)
    }

    fn symlink(&self, original: &Path, link: &Path) -> io::Result<()> {
        create_symlink(original, link)
    }

    fn rename(&self, from: &Path, to: &Path) -> io::Result<()> {
        fs::rename(from, to)
    }

    fn canonicalize(&self, path: &Path) -> io::Result<PathBuf> {
        fs::canonicalize(path)
    }
}

#[cfg(unix)]
fn create_symlink(original: &Path, link: &Path) -> io::Result<()> {
    std::os::unix::fs::symlink(original, link)
}

#[cfg(windows)]
fn create_symlink(original: &Path, link: &Path) -> io::Result<()> {
    use std::os::windows::fs::{symlink_dir, symlink_file};

    let resolved = match link.parent() {
        Some(parent) if original.is_relative() => parent.join(original),
        _ => original.to_path_buf(),
    };

    if resolved.is_dir() {
        // Junctions don't need admin rights but require an absolute target
        match junction::create(&resolved, link) {
            Ok(()) => Ok(()),
            Err(e) => {
                log::debug!("junction_failed link={} error={}", link.display(), e);
                symlink_dir(original, link)
            }
        }
    } else {
        symlink_file(original, link)
    }
}

#[cfg(not(any(unix, windows)))]
fn create_symlink(_original: &Path, _link: &Path) -> io::Result<()> {
    Err(io::Error::new(
        io::ErrorKind::Unsupported,
        "symlinks not supported on this platform",
    ))
}

/// Resolve a symlink's content against the directory holding the link
pub fn resolve_link_target(link: &Path, content: &Path) -> PathBuf {
    if content.is_absolute() {
        content.to_path_buf()
    } else {
        link.parent()
            .map_or_else(|| content.to_path_buf(), |p| p.join(content))
    }
}

/// Check whether the symlink at `link` resolves to the same file as `expected`
///
/// Both sides are canonicalized when possible; otherwise lexical
/// normalization is compared.
pub fn link_points_to<F: FileSystem + ?Sized>(fs: &F, link: &Path, expected: &Path) -> bool {
    let Ok(content) = fs.read_link(link) else {
        return false;
    };
    let actual = resolve_link_target(link, &content);
    let actual = fs
        .canonicalize(&actual)
        .unwrap_or_else(|_| crate::path::normalize(&actual));
    let expected = fs
        .canonicalize(expected)
        .unwrap_or_else(|_| crate::path::normalize(expected));
    actual == expected
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::os::unix::fs::symlink;
    use tempfile::TempDir;

    #[test]
    fn read_dir_sorted() {
        let tmp = TempDir::new().unwrap();
        for name in ["zeta", "alpha", "mid"] {
            fs::write(tmp.path().join(name), "").unwrap();
        }
        let names: Vec<String> = OsFileSystem
            .read_dir(tmp.path())
            .unwrap()
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().to_string())
            .collect();
        assert_eq!(names, vec!["alpha", "mid", "zeta"]);
    }

    #[test]
    fn dangling_symlink_exists_but_not_dir() {
        let tmp = TempDir::new().unwrap();
        let link = tmp.path().join("dangling");
        symlink(tmp.path().join("missing"), &link).unwrap();

        assert!(OsFileSystem.exists(&link));
        assert!(OsFileSystem.is_symlink(&link));
        assert!(!OsFileSystem.is_dir(&link));
    }

    #[test]
    fn link_points_to_relative_content() {
        let tmp = TempDir::new().unwrap();
        fs::create_dir_all(tmp.path().join("pkg")).unwrap();
        fs::write(tmp.path().join("pkg/file"), "x").unwrap();
        fs::create_dir_all(tmp.path().join("home")).unwrap();
        let link = tmp.path().join("home/file");
        symlink("../pkg/file", &link).unwrap();

        assert!(link_points_to(&OsFileSystem, &link, &tmp.path().join("pkg/file")));
        assert!(!link_points_to(&OsFileSystem, &link, &tmp.path().join("pkg/other")));
    }
}
