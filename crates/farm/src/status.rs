//! Installed package status

use crate::fs::FileSystem;
use crate::path::TargetPath;
use chrono::{DateTime, Utc};
use manifest::{Manifest, PackageInfo, PackageSource};
use serde::Serialize;

/// Current state of a package's recorded links
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct LinkHealth {
    /// Symlink present and resolving
    pub correct: usize,
    /// Dangling symlink, or something other than a symlink in its place
    pub broken: usize,
    /// Nothing at the link path
    pub missing: usize,
}

impl LinkHealth {
    pub fn is_healthy(&self) -> bool {
        self.broken == 0 && self.missing == 0
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PackageStatus {
    pub name: String,
    pub installed_at: DateTime<Utc>,
    pub link_count: usize,
    pub links: Vec<String>,
    pub source: PackageSource,
    pub hash: Option<String>,
    pub health: LinkHealth,
}

/// Status of `packages` (all installed packages when empty)
///
/// Names not in the manifest are skipped. Results are sorted by name.
pub fn package_status<S: AsRef<str>>(
    fs: &dyn FileSystem,
    target_root: &TargetPath,
    manifest: &Manifest,
    packages: &[S],
) -> Vec<PackageStatus> {
    let infos: Vec<&PackageInfo> = if packages.is_empty() {
        manifest.packages.values().collect()
    } else {
        let mut names: Vec<&str> = packages.iter().map(AsRef::as_ref).collect();
        names.sort_unstable();
        names.dedup();
        names
            .into_iter()
            .filter_map(|name| {
                let info = manifest.get_package(name);
                if info.is_none() {
                    log::debug!("status_unknown_package package={name}");
                }
                info
            })
            .collect()
    };

    infos
        .into_iter()
        .map(|info| PackageStatus {
            name: info.name.clone(),
            installed_at: info.installed_at,
            link_count: info.link_count,
            links: info.links.clone(),
            source: info.source,
            hash: manifest.get_hash(&info.name).map(ToString::to_string),
            health: link_health(fs, target_root, &info.links),
        })
        .collect()
}

fn link_health(fs: &dyn FileSystem, target_root: &TargetPath, links: &[String]) -> LinkHealth {
    let mut health = LinkHealth::default();
    for link in links {
        let path = target_root.as_path().join(link);
        if !fs.exists(&path) {
            health.missing += 1;
        } else if fs.is_symlink(&path) && fs.metadata(&path).is_ok() {
            health.correct += 1;
        } else {
            health.broken += 1;
        }
    }
    health
}
