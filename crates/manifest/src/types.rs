//! Data types for the manifest crate

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Schema version written into every manifest
pub const MANIFEST_VERSION: &str = "1.0";

/// How a package came to be installed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PackageSource {
    /// Linked from an existing package directory
    #[default]
    Managed,
    /// Files were moved into the package by `adopt`
    Adopted,
}

impl PackageSource {
    pub fn is_managed(&self) -> bool {
        matches!(self, Self::Managed)
    }
}

/// Record of one installed package
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageInfo {
    pub name: String,
    pub installed_at: DateTime<Utc>,
    pub link_count: usize,
    /// Link paths relative to the target directory, forward-slash separated
    pub links: Vec<String>,
    #[serde(default, skip_serializing_if = "PackageSource::is_managed")]
    pub source: PackageSource,
}

impl PackageInfo {
    /// Create a record stamped with the current time
    pub fn new(name: impl Into<String>, links: Vec<String>, source: PackageSource) -> Self {
        Self {
            name: name.into(),
            installed_at: Utc::now(),
            link_count: links.len(),
            links,
            source,
        }
    }
}

/// Repository the package directory was cloned from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepositoryInfo {
    pub url: String,
    #[serde(default)]
    pub branch: String,
    pub cloned_at: DateTime<Utc>,
    #[serde(default)]
    pub commit_sha: String,
}

/// Structural problem found by [`Manifest::validate`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ManifestIssue {
    /// A content hash is stored for a package that is not installed
    OrphanedHash { package: String },
    /// `link_count` disagrees with the number of recorded links
    LinkCountMismatch {
        package: String,
        recorded: usize,
        actual: usize,
    },
    /// The map key differs from the package's own name
    NameMismatch { key: String, name: String },
}

impl std::fmt::Display for ManifestIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::OrphanedHash { package } => {
                write!(f, "hash recorded for package '{package}' which is not installed")
            }
            Self::LinkCountMismatch {
                package,
                recorded,
                actual,
            } => write!(
                f,
                "package '{package}' records {recorded} links but lists {actual}"
            ),
            Self::NameMismatch { key, name } => {
                write!(f, "package entry '{key}' is named '{name}'")
            }
        }
    }
}

/// Persisted state of every package installed into one target directory
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    pub version: String,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub packages: BTreeMap<String, PackageInfo>,
    #[serde(default)]
    pub hashes: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repository: Option<RepositoryInfo>,
}

impl Default for Manifest {
    fn default() -> Self {
        Self::new()
    }
}

impl Manifest {
    /// Create an empty manifest
    pub fn new() -> Self {
        Self {
            version: MANIFEST_VERSION.to_string(),
            updated_at: Utc::now(),
            packages: BTreeMap::new(),
            hashes: BTreeMap::new(),
            repository: None,
        }
    }

    /// Insert or replace a package record
    pub fn add_package(&mut self, info: PackageInfo) {
        self.packages.insert(info.name.clone(), info);
    }

    /// Remove a package and its content hash
    pub fn remove_package(&mut self, name: &str) -> Option<PackageInfo> {
        self.hashes.remove(name);
        self.packages.remove(name)
    }

    pub fn get_package(&self, name: &str) -> Option<&PackageInfo> {
        self.packages.get(name)
    }

    pub fn has_package(&self, name: &str) -> bool {
        self.packages.contains_key(name)
    }

    /// Store a content hash for an installed package
    ///
    /// Returns `false` without storing anything if the package is unknown,
    /// so the hash map never references a missing package.
    pub fn set_hash(&mut self, name: &str, hash: impl Into<String>) -> bool {
        if !self.packages.contains_key(name) {
            return false;
        }
        self.hashes.insert(name.to_string(), hash.into());
        true
    }

    pub fn get_hash(&self, name: &str) -> Option<&str> {
        self.hashes.get(name).map(String::as_str)
    }

    /// Installed package names in sorted order
    pub fn package_names(&self) -> Vec<String> {
        self.packages.keys().cloned().collect()
    }

    pub fn is_empty(&self) -> bool {
        self.packages.is_empty()
    }

    /// Set repository metadata
    pub fn set_repository(&mut self, repository: RepositoryInfo) {
        self.repository = Some(repository);
    }

    /// Check internal consistency
    pub fn validate(&self) -> Vec<ManifestIssue> {
        let mut issues = Vec::new();

        for package in self.hashes.keys() {
            if !self.packages.contains_key(package) {
                issues.push(ManifestIssue::OrphanedHash {
                    package: package.clone(),
                });
            }
        }

        for (key, info) in &self.packages {
            if key != &info.name {
                issues.push(ManifestIssue::NameMismatch {
                    key: key.clone(),
                    name: info.name.clone(),
                });
            }
            if info.link_count != info.links.len() {
                issues.push(ManifestIssue::LinkCountMismatch {
                    package: key.clone(),
                    recorded: info.link_count,
                    actual: info.links.len(),
                });
            }
        }

        issues
    }
}
