//! Deterministic package content hashing
//!
//! Regular files are visited in lexicographic order of their
//! forward-slash relative paths, so the digest depends only on names and
//! bytes, never on directory-listing order. Symlinks are not followed and
//! not hashed.

use crate::error::{Error, Result};
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Hash every regular file under `root`
pub fn hash_package(root: &Path) -> Result<String> {
    hash_package_filtered(root, |_| false)
}

/// Hash regular files under `root`, skipping relative paths for which
/// `exclude` returns true
///
/// An excluded directory is not descended into.
pub fn hash_package_filtered<F>(root: &Path, exclude: F) -> Result<String>
where
    F: Fn(&str) -> bool,
{
    hash_package_cancellable(root, exclude, || false)
}

/// [`hash_package_filtered`] that stops with [`Error::Cancelled`] once
/// `cancelled` returns true, checked per walked entry and per hashed file
pub fn hash_package_cancellable<F, C>(root: &Path, exclude: F, cancelled: C) -> Result<String>
where
    F: Fn(&str) -> bool,
    C: Fn() -> bool,
{
    if !root.is_dir() {
        return Err(Error::PathNotFound(root.to_path_buf()));
    }

    let mut files: Vec<(String, PathBuf)> = Vec::new();
    let walker = WalkDir::new(root)
        .follow_links(false)
        .into_iter()
        .filter_entry(|entry| {
            entry.depth() == 0
                || !exclude(&relative_key(root, entry.path()))
        });

    for entry in walker {
        if cancelled() {
            return Err(Error::Cancelled);
        }
        let entry = entry?;
        if entry.file_type().is_file() {
            files.push((relative_key(root, entry.path()), entry.path().to_path_buf()));
        }
    }

    files.sort_by(|a, b| a.0.cmp(&b.0));

    let mut hasher = Sha256::new();
    for (rel, path) in &files {
        if cancelled() {
            return Err(Error::Cancelled);
        }
        hasher.update((rel.len() as u64).to_le_bytes());
        hasher.update(rel.as_bytes());
        hash_file_into(&mut hasher, path)?;
    }

    log::debug!(
        "package_hashed root={} files={}",
        root.display(),
        files.len()
    );
    Ok(format!("{:x}", hasher.finalize()))
}

/// Forward-slash path of `path` relative to `root`
fn relative_key(root: &Path, path: &Path) -> String {
    let rel = path.strip_prefix(root).unwrap_or(path);
    rel.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

/// Feed a file's length and content into the hasher
fn hash_file_into(hasher: &mut Sha256, path: &Path) -> Result<()> {
    let hash_err = |source| Error::HashFailed {
        path: path.to_path_buf(),
        source,
    };

    let file = File::open(path).map_err(hash_err)?;
    let len = file.metadata().map_err(hash_err)?.len();
    hasher.update(len.to_le_bytes());

    let mut reader = BufReader::new(file);
    let mut buffer = [0u8; 65536]; // 64KB chunks
    loop {
        let bytes_read = reader.read(&mut buffer).map_err(hash_err)?;
        if bytes_read == 0 {
            break;
        }
        hasher.update(&buffer[..bytes_read]);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn make_package(tmp: &TempDir, name: &str, files: &[(&str, &str)]) -> PathBuf {
        let root = tmp.path().join(name);
        fs::create_dir_all(&root).unwrap();
        for (rel, content) in files {
            let path = root.join(rel);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(path, content).unwrap();
        }
        root
    }

    #[test]
    fn hash_is_stable() {
        let tmp = TempDir::new().unwrap();
        let root = make_package(&tmp, "vim", &[("dot-vimrc", "set nu"), ("colors/a.vim", "x")]);

        assert_eq!(hash_package(&root).unwrap(), hash_package(&root).unwrap());
    }

    #[test]
    fn hash_ignores_creation_order() {
        let tmp = TempDir::new().unwrap();
        let a = make_package(&tmp, "a", &[("z", "1"), ("m/n", "2"), ("b", "3")]);
        let b = make_package(&tmp, "b", &[("b", "3"), ("z", "1"), ("m/n", "2")]);

        assert_eq!(hash_package(&a).unwrap(), hash_package(&b).unwrap());
    }

    #[test]
    fn hash_changes_with_one_byte() {
        let tmp = TempDir::new().unwrap();
        let root = make_package(&tmp, "vim", &[("dot-vimrc", "set nu")]);
        let before = hash_package(&root).unwrap();

        fs::write(root.join("dot-vimrc"), "set nU").unwrap();
        assert_ne!(before, hash_package(&root).unwrap());
    }

    #[test]
    fn hash_changes_with_rename() {
        let tmp = TempDir::new().unwrap();
        let a = make_package(&tmp, "a", &[("one", "same")]);
        let b = make_package(&tmp, "b", &[("two", "same")]);

        assert_ne!(hash_package(&a).unwrap(), hash_package(&b).unwrap());
    }

    #[test]
    fn empty_package_has_digest() {
        let tmp = TempDir::new().unwrap();
        let root = make_package(&tmp, "empty", &[]);
        fs::create_dir_all(root.join("nested/dir")).unwrap();

        let digest = hash_package(&root).unwrap();
        assert_eq!(digest.len(), 64);
    }

    #[cfg(unix)]
    #[test]
    fn symlinks_excluded() {
        let tmp = TempDir::new().unwrap();
        let root = make_package(&tmp, "pkg", &[("file", "data")]);
        let before = hash_package(&root).unwrap();

        std::os::unix::fs::symlink(root.join("file"), root.join("link")).unwrap();
        assert_eq!(before, hash_package(&root).unwrap());
    }

    #[test]
    fn filtered_skips_excluded_dirs() {
        let tmp = TempDir::new().unwrap();
        let root = make_package(&tmp, "pkg", &[("file", "data")]);
        let before = hash_package(&root).unwrap();

        fs::create_dir_all(root.join(".git")).unwrap();
        fs::write(root.join(".git/HEAD"), "ref").unwrap();

        assert_ne!(before, hash_package(&root).unwrap());
        assert_eq!(
            before,
            hash_package_filtered(&root, |rel| rel == ".git").unwrap()
        );
    }

    #[test]
    fn missing_root_is_error() {
        let tmp = TempDir::new().unwrap();
        let err = hash_package(&tmp.path().join("missing")).unwrap_err();
        assert!(matches!(err, Error::PathNotFound(_)));
    }

    #[test]
    fn cancelled_hash_stops() {
        let tmp = TempDir::new().unwrap();
        let root = make_package(&tmp, "pkg", &[("a", "1"), ("b", "2")]);

        let err = hash_package_cancellable(&root, |_| false, || true).unwrap_err();
        assert!(matches!(err, Error::Cancelled));
        assert_eq!(
            hash_package_cancellable(&root, |_| false, || false).unwrap(),
            hash_package(&root).unwrap()
        );
    }
}
