//! Manifest persistence
//!
//! One JSON document per target directory, written atomically by writing a
//! sibling `.tmp` file and renaming it over the original.

use crate::error::{Error, Result};
use crate::types::Manifest;
use chrono::Utc;
use std::fs;
use std::path::{Path, PathBuf};

/// File name used when none is configured
pub const DEFAULT_MANIFEST_NAME: &str = ".dot-manifest.json";

/// Storage backend for manifests
pub trait ManifestStore: Send + Sync {
    /// Load the manifest for a target directory
    ///
    /// A missing manifest is not an error: an empty manifest is returned.
    fn load(&self, target_dir: &Path) -> Result<Manifest>;

    /// Persist the manifest, refreshing `updated_at`
    fn save(&self, target_dir: &Path, manifest: &mut Manifest) -> Result<()>;

    /// Whether a manifest has been written for the target directory
    fn exists(&self, target_dir: &Path) -> bool;
}

/// Filesystem-backed manifest store
#[derive(Debug, Clone)]
pub struct FsManifestStore {
    file_name: String,
}

impl Default for FsManifestStore {
    fn default() -> Self {
        Self {
            file_name: DEFAULT_MANIFEST_NAME.to_string(),
        }
    }
}

impl FsManifestStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a custom manifest file name
    pub fn with_file_name(file_name: impl Into<String>) -> Result<Self> {
        let file_name = file_name.into();
        if file_name.is_empty() || file_name.contains(['/', '\\']) {
            return Err(Error::InvalidPath(format!(
                "manifest file name must be a single component: '{file_name}'"
            )));
        }
        Ok(Self { file_name })
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    /// Full path of the manifest for a target directory
    pub fn manifest_path(&self, target_dir: &Path) -> PathBuf {
        target_dir.join(&self.file_name)
    }

    fn temp_path(&self, target_dir: &Path) -> PathBuf {
        target_dir.join(format!("{}.tmp", self.file_name))
    }
}

impl ManifestStore for FsManifestStore {
    fn load(&self, target_dir: &Path) -> Result<Manifest> {
        let path = self.manifest_path(target_dir);

        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                log::debug!("manifest_missing path={}", path.display());
                return Ok(Manifest::new());
            }
            Err(e) => return Err(Error::Io(e)),
        };

        serde_json::from_str(&content).map_err(|source| Error::Json { path, source })
    }

    fn save(&self, target_dir: &Path, manifest: &mut Manifest) -> Result<()> {
        let path = self.manifest_path(target_dir);
        let tmp = self.temp_path(target_dir);

        manifest.updated_at = Utc::now();
        let content = serde_json::to_string_pretty(manifest).map_err(|source| Error::Json {
            path: path.clone(),
            source,
        })?;

        fs::write(&tmp, content).map_err(|source| Error::WriteFailed {
            path: tmp.clone(),
            source,
        })?;

        if let Err(source) = fs::rename(&tmp, &path) {
            let _ = fs::remove_file(&tmp);
            return Err(Error::WriteFailed { path, source });
        }

        log::debug!(
            "manifest_saved path={} packages={}",
            path.display(),
            manifest.packages.len()
        );
        Ok(())
    }

    fn exists(&self, target_dir: &Path) -> bool {
        self.manifest_path(target_dir).is_file()
    }
}
