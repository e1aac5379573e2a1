//! # Manifest
//!
//! Installed-package state and content hashing for a symlink farm.
//!
//! This crate provides functionality to:
//! - Record which packages are installed into a target directory and the
//!   links each one owns
//! - Load and atomically save that record as `.dot-manifest.json`
//! - Compute a deterministic SHA-256 digest of a package tree so unchanged
//!   packages can be skipped on re-install
//!
//! ## Example
//!
//! ```no_run
//! use manifest::{FsManifestStore, ManifestStore, PackageInfo, PackageSource};
//! use std::path::Path;
//!
//! let store = FsManifestStore::new();
//! let target = Path::new("/home/me");
//!
//! let mut manifest = store.load(target)?;
//! manifest.add_package(PackageInfo::new("vim", vec![".vimrc".into()], PackageSource::Managed));
//! let digest = manifest::hash_package(Path::new("/home/me/dotfiles/vim"))?;
//! manifest.set_hash("vim", digest);
//! store.save(target, &mut manifest)?;
//! # Ok::<(), manifest::Error>(())
//! ```

mod error;
mod hash;
mod store;
mod types;

pub use error::{Error, Result};
pub use hash::{hash_package, hash_package_cancellable, hash_package_filtered};
pub use store::{DEFAULT_MANIFEST_NAME, FsManifestStore, ManifestStore};
pub use types::{
    MANIFEST_VERSION, Manifest, ManifestIssue, PackageInfo, PackageSource, RepositoryInfo,
};
