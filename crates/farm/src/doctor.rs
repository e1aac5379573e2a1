//! Health checks for installed packages
//!
//! Never mutates anything. Each recorded link is inspected, the manifest
//! is checked for internal consistency, and an optional orphan scan
//! looks for links nobody recorded.

use crate::context::CancelToken;
use crate::diagnostics::{DiagnosticReport, DiagnosticStats, Issue, IssueSeverity, IssueType};
use crate::error::Result;
use crate::fs::{FileSystem, resolve_link_target};
use crate::path::{PackagePath, TargetPath, normalize};
use crate::scanner::{OrphanScanner, ScanConfig, ScanMode};
use manifest::Manifest;
use std::io;
use std::path::{Path, PathBuf};

/// Symlink hops followed before a chain is declared circular
pub const MAX_LINK_HOPS: usize = 32;

pub struct Doctor<'a> {
    fs: &'a dyn FileSystem,
    package_root: &'a PackagePath,
    target_root: &'a TargetPath,
    manifest_file: String,
    cancel: CancelToken,
}

impl<'a> Doctor<'a> {
    pub fn new(fs: &'a dyn FileSystem, package_root: &'a PackagePath, target_root: &'a TargetPath) -> Self {
        Self {
            fs,
            package_root,
            target_root,
            manifest_file: manifest::DEFAULT_MANIFEST_NAME.to_string(),
            cancel: CancelToken::new(),
        }
    }

    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn with_manifest_file(mut self, name: impl Into<String>) -> Self {
        self.manifest_file = name.into();
        self
    }

    /// Diagnose the target; `None` means no manifest exists yet
    pub fn diagnose(&self, manifest: Option<&Manifest>, scan: &ScanConfig) -> Result<DiagnosticReport> {
        let Some(manifest) = manifest else {
            let issue = Issue::new(
                IssueType::ManifestInconsistency,
                IssueSeverity::Info,
                self.target_root.as_path(),
                "No manifest found - no packages are currently managed",
            )
            .with_suggestion("Run 'dot manage' to install packages");
            return Ok(DiagnosticReport::new(vec![issue], DiagnosticStats::default(), false));
        };

        let mut issues = Vec::new();
        let mut stats = DiagnosticStats::default();

        for (name, info) in &manifest.packages {
            stats.managed_links += info.link_count;
            for link in &info.links {
                stats.total_links += 1;
                if let Some(issue) = self.check_link(name, link) {
                    if issue.kind == IssueType::BrokenLink {
                        stats.broken_links += 1;
                    }
                    issues.push(issue);
                }
            }
        }

        for problem in manifest.validate() {
            issues.push(
                Issue::new(
                    IssueType::ManifestInconsistency,
                    IssueSeverity::Warning,
                    self.manifest_file.as_str(),
                    problem.to_string(),
                )
                .with_suggestion("Run 'dot remanage' on the affected packages to rewrite their records"),
            );
        }

        let mut truncated = false;
        if scan.mode != ScanMode::Off {
            let outcome = OrphanScanner::new(self.fs, self.target_root, scan)?
                .with_cancel(self.cancel.clone())
                .with_manifest_file(self.manifest_file.clone())
                .scan(manifest);
            stats.orphaned_links = outcome.issues.len();
            truncated = outcome.truncated;
            issues.extend(outcome.issues);
        }

        log::debug!(
            "doctor_complete links={} issues={} truncated={truncated}",
            stats.total_links,
            issues.len()
        );
        Ok(DiagnosticReport::new(issues, stats, truncated))
    }

    fn check_link(&self, package: &str, link: &str) -> Option<Issue> {
        let full = self.target_root.as_path().join(link);
        let issue = |kind, severity, message: String| Issue::new(kind, severity, link, message);
        let permission = |e: io::Error| {
            issue(
                IssueType::Permission,
                IssueSeverity::Error,
                format!("Cannot access link: {e}"),
            )
            .with_suggestion("Check filesystem permissions")
        };

        let meta = match self.fs.symlink_metadata(&full) {
            Ok(meta) => meta,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Some(
                    issue(
                        IssueType::BrokenLink,
                        IssueSeverity::Error,
                        "Link does not exist".to_string(),
                    )
                    .with_suggestion(format!("Run 'dot remanage {package}' to restore link")),
                );
            }
            Err(e) => return Some(permission(e)),
        };

        if !meta.file_type().is_symlink() {
            let found = if meta.is_dir() { "directory" } else { "regular file" };
            return Some(
                issue(
                    IssueType::WrongTarget,
                    IssueSeverity::Error,
                    format!("Expected symlink but found {found}"),
                )
                .with_suggestion(format!(
                    "Run 'dot unmanage {package}' then 'dot manage {package}'"
                )),
            );
        }

        let content = match self.fs.read_link(&full) {
            Ok(content) => content,
            Err(e) => return Some(permission(e)),
        };

        let destination = match self.follow(&full) {
            Ok(Some(dest)) => dest,
            Ok(None) => {
                return Some(
                    issue(
                        IssueType::BrokenLink,
                        IssueSeverity::Error,
                        format!("Link target does not exist: {}", content.display()),
                    )
                    .with_suggestion(format!("Run 'dot remanage {package}' to fix broken link")),
                );
            }
            Err(Hops) => {
                return Some(
                    issue(
                        IssueType::Circular,
                        IssueSeverity::Error,
                        format!("Symlink chain exceeds {MAX_LINK_HOPS} hops"),
                    )
                    .with_suggestion("Remove the link and run 'dot remanage'"),
                );
            }
        };

        let package_dir = self.package_root.as_path().join(package);
        if !self.is_inside(&destination, &package_dir) {
            return Some(
                issue(
                    IssueType::WrongTarget,
                    IssueSeverity::Warning,
                    format!("Link points outside package {package}: {}", content.display()),
                )
                .with_suggestion(format!("Run 'dot remanage {package}' to relink")),
            );
        }
        None
    }

    /// Follow a symlink chain to its final destination
    ///
    /// `Ok(None)` when some hop is missing.
    fn follow(&self, link: &Path) -> std::result::Result<Option<PathBuf>, Hops> {
        let mut current = link.to_path_buf();
        for _ in 0..MAX_LINK_HOPS {
            match self.fs.symlink_metadata(&current) {
                Ok(meta) if meta.file_type().is_symlink() => {
                    let Ok(content) = self.fs.read_link(&current) else {
                        return Ok(None);
                    };
                    current = normalize(&resolve_link_target(&current, &content));
                }
                Ok(_) => return Ok(Some(current)),
                Err(_) => return Ok(None),
            }
        }
        Err(Hops)
    }

    fn is_inside(&self, path: &Path, dir: &Path) -> bool {
        if path.starts_with(dir) {
            return true;
        }
        match (self.fs.canonicalize(path), self.fs.canonicalize(dir)) {
            (Ok(p), Ok(d)) => p.starts_with(d),
            _ => false,
        }
    }
}

/// Symlink chain too long
struct Hops;

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::fs::OsFileSystem;
    use manifest::{PackageInfo, PackageSource};
    use std::fs;
    use std::os::unix::fs::symlink;
    use tempfile::TempDir;

    struct Fixture {
        _tmp: TempDir,
        packages: PackagePath,
        target: TargetPath,
    }

    impl Fixture {
        fn new() -> Self {
            let tmp = TempDir::new().unwrap();
            let root = tmp.path().canonicalize().unwrap();
            fs::create_dir_all(root.join("dotfiles/vim")).unwrap();
            fs::write(root.join("dotfiles/vim/dot-vimrc"), "set number").unwrap();
            fs::create_dir_all(root.join("home")).unwrap();
            Self {
                packages: PackagePath::must(root.join("dotfiles")),
                target: TargetPath::must(root.join("home")),
                _tmp: tmp,
            }
        }

        fn home(&self, rel: &str) -> PathBuf {
            self.target.as_path().join(rel)
        }

        fn doctor(&self) -> Doctor<'_> {
            Doctor::new(&OsFileSystem, &self.packages, &self.target)
        }
    }

    fn vim_manifest() -> Manifest {
        let mut manifest = Manifest::new();
        manifest.add_package(PackageInfo::new(
            "vim",
            vec![".vimrc".into()],
            PackageSource::Managed,
        ));
        manifest
    }

    #[test]
    fn healthy_link() {
        let fx = Fixture::new();
        symlink(fx.packages.as_path().join("vim/dot-vimrc"), fx.home(".vimrc")).unwrap();

        let report = fx.doctor().diagnose(Some(&vim_manifest()), &ScanConfig::off()).unwrap();
        assert!(report.is_healthy());
        assert!(report.issues.is_empty());
        assert_eq!(report.stats.total_links, 1);
    }

    #[test]
    fn missing_manifest_is_info_only() {
        let fx = Fixture::new();
        let report = fx.doctor().diagnose(None, &ScanConfig::off()).unwrap();
        assert!(report.is_healthy());
        assert_eq!(report.issues.len(), 1);
        assert_eq!(report.issues[0].severity, IssueSeverity::Info);
    }

    #[test]
    fn missing_link_is_broken() {
        let fx = Fixture::new();
        let report = fx.doctor().diagnose(Some(&vim_manifest()), &ScanConfig::off()).unwrap();
        assert_eq!(report.health, crate::diagnostics::HealthStatus::Errors);
        assert_eq!(report.issues[0].kind, IssueType::BrokenLink);
        assert_eq!(report.stats.broken_links, 1);
    }

    #[test]
    fn dangling_link_is_broken() {
        let fx = Fixture::new();
        symlink(fx.packages.as_path().join("vim/gone"), fx.home(".vimrc")).unwrap();
        let report = fx.doctor().diagnose(Some(&vim_manifest()), &ScanConfig::off()).unwrap();
        assert_eq!(report.issues[0].kind, IssueType::BrokenLink);
        assert!(report.issues[0].message.contains("does not exist"));
        assert_eq!(
            report.issues[0].suggestion.as_deref(),
            Some("Run 'dot remanage vim' to fix broken link")
        );
    }

    #[test]
    fn regular_file_is_wrong_target() {
        let fx = Fixture::new();
        fs::write(fx.home(".vimrc"), "local").unwrap();
        let report = fx.doctor().diagnose(Some(&vim_manifest()), &ScanConfig::off()).unwrap();
        assert_eq!(report.issues[0].kind, IssueType::WrongTarget);
        assert_eq!(report.issues[0].message, "Expected symlink but found regular file");
        assert_eq!(report.issues[0].severity, IssueSeverity::Error);
    }

    #[test]
    fn link_outside_package_warns() {
        let fx = Fixture::new();
        let elsewhere = fx.home("other");
        fs::write(&elsewhere, "").unwrap();
        symlink(&elsewhere, fx.home(".vimrc")).unwrap();
        let report = fx.doctor().diagnose(Some(&vim_manifest()), &ScanConfig::off()).unwrap();
        assert_eq!(report.health, crate::diagnostics::HealthStatus::Warnings);
        assert_eq!(report.issues[0].kind, IssueType::WrongTarget);
    }

    #[test]
    fn circular_chain_detected() {
        let fx = Fixture::new();
        symlink(fx.home("b"), fx.home(".vimrc")).unwrap();
        symlink(fx.home(".vimrc"), fx.home("b")).unwrap();
        let report = fx.doctor().diagnose(Some(&vim_manifest()), &ScanConfig::off()).unwrap();
        assert_eq!(report.issues[0].kind, IssueType::Circular);
    }

    #[test]
    fn manifest_inconsistency_reported() {
        let fx = Fixture::new();
        symlink(fx.packages.as_path().join("vim/dot-vimrc"), fx.home(".vimrc")).unwrap();
        let mut manifest = vim_manifest();
        manifest.hashes.insert("ghost".into(), "abc".into());

        let report = fx.doctor().diagnose(Some(&manifest), &ScanConfig::off()).unwrap();
        assert_eq!(report.issues.len(), 1);
        assert_eq!(report.issues[0].kind, IssueType::ManifestInconsistency);
    }

    #[test]
    fn orphan_scan_included() {
        let fx = Fixture::new();
        symlink(fx.packages.as_path().join("vim/dot-vimrc"), fx.home(".vimrc")).unwrap();
        symlink(fx.packages.as_path().join("vim/dot-vimrc"), fx.home(".stray")).unwrap();

        let report = fx
            .doctor()
            .diagnose(Some(&vim_manifest()), &ScanConfig::deep(2))
            .unwrap();
        assert_eq!(report.stats.orphaned_links, 1);
        assert_eq!(report.issues[0].kind, IssueType::OrphanedLink);
        assert_eq!(report.issues[0].path, PathBuf::from(".stray"));
    }
}
