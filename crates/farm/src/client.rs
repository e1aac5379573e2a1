//! High-level operations over one package directory and one target
//!
//! Every operation reloads the manifest, plans, executes, and on success
//! writes the manifest back. The `plan_*` variants stop after planning.

use crate::context::{CancelToken, ProgressCallback};
use crate::diagnostics::DiagnosticReport;
use crate::doctor::Doctor;
use crate::error::{Error, Result};
use crate::executor::{ExecuteOptions, ExecutionResult, Executor};
use crate::fs::{FileSystem, OsFileSystem};
use crate::path::{PackagePath, TargetPath};
use crate::plan::Plan;
use crate::planner::{Planner, PlannerOptions};
use crate::scanner::ScanConfig;
use crate::status::{PackageStatus, package_status};
use crate::unmanage::UnmanageOptions;
use manifest::{FsManifestStore, Manifest, ManifestStore, PackageInfo, PackageSource, RepositoryInfo};
use std::path::Path;
use std::sync::Arc;

/// Everything a [`Client`] needs to know about its environment
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub package_dir: PackagePath,
    pub target_dir: TargetPath,
    pub planner: PlannerOptions,
    pub execute: ExecuteOptions,
    /// Scan used by [`Client::doctor`]
    pub scan: ScanConfig,
}

impl ClientConfig {
    pub fn new(package_dir: PackagePath, target_dir: TargetPath) -> Self {
        Self {
            package_dir,
            target_dir,
            planner: PlannerOptions::default(),
            execute: ExecuteOptions::default(),
            scan: ScanConfig::default(),
        }
    }
}

/// Facade over planning, execution and manifest bookkeeping
pub struct Client {
    config: ClientConfig,
    fs: Arc<dyn FileSystem>,
    store: Box<dyn ManifestStore>,
    cancel: CancelToken,
}

impl Client {
    /// Client on the real filesystem with a file-backed manifest
    pub fn new(config: ClientConfig) -> Result<Self> {
        let store = FsManifestStore::with_file_name(config.planner.manifest_file.clone())?;
        Ok(Self {
            config,
            fs: Arc::new(OsFileSystem),
            store: Box::new(store),
            cancel: CancelToken::new(),
        })
    }

    pub fn with_fs(mut self, fs: Arc<dyn FileSystem>) -> Self {
        self.fs = fs;
        self
    }

    pub fn with_store(mut self, store: Box<dyn ManifestStore>) -> Self {
        self.store = store;
        self
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Token that cancels running executions and scans
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    fn planner(&self) -> Planner<'_> {
        Planner::new(
            self.fs.as_ref(),
            &self.config.package_dir,
            &self.config.target_dir,
            &self.config.planner,
        )
        .with_cancel(self.cancel.clone())
    }

    fn target(&self) -> &Path {
        self.config.target_dir.as_path()
    }

    fn load_manifest(&self) -> Result<Manifest> {
        Ok(self.store.load(self.target())?)
    }

    // -- manage ------------------------------------------------------------

    /// Plan installing `packages` without touching the filesystem
    pub fn plan_manage<S: AsRef<str>>(&self, packages: &[S]) -> Result<Plan> {
        let plan = self.planner().plan_manage(packages)?;
        log_dry_run("manage", &plan);
        Ok(plan)
    }

    /// Install `packages`
    pub fn manage<S, P>(&self, packages: &[S], progress: &mut P) -> Result<ExecutionResult>
    where
        S: AsRef<str>,
        P: ProgressCallback + ?Sized,
    {
        let plan = self.planner().plan_manage(packages)?;
        let result = self.run(&plan, progress)?;
        self.record("manage", |manifest| self.record_links(manifest, &plan, PackageSource::Managed));
        Ok(result)
    }

    // -- unmanage ----------------------------------------------------------

    pub fn plan_unmanage<S: AsRef<str>>(&self, packages: &[S]) -> Result<Plan> {
        let manifest = self.load_manifest()?;
        let plan = self
            .planner()
            .plan_unmanage(&manifest, packages, UnmanageOptions::default())?;
        log_dry_run("unmanage", &plan);
        Ok(plan)
    }

    /// Remove `packages`, restoring adopted files
    pub fn unmanage<S, P>(&self, packages: &[S], progress: &mut P) -> Result<ExecutionResult>
    where
        S: AsRef<str>,
        P: ProgressCallback + ?Sized,
    {
        let manifest = self.load_manifest()?;
        let plan = self
            .planner()
            .plan_unmanage(&manifest, packages, UnmanageOptions::default())?;
        let result = self.run(&plan, progress)?;

        let removed: Vec<String> = plan.package_names().iter().map(ToString::to_string).collect();
        if !removed.is_empty() {
            self.record("unmanage", |manifest| {
                for name in &removed {
                    manifest.remove_package(name);
                }
            });
        }
        Ok(result)
    }

    /// Remove every installed package
    pub fn unmanage_all<P: ProgressCallback + ?Sized>(&self, progress: &mut P) -> Result<ExecutionResult> {
        let names = self.load_manifest()?.package_names();
        if names.is_empty() {
            log::info!("nothing_to_unmanage packages=0");
            return Ok(ExecutionResult::default());
        }
        self.unmanage(&names, progress)
    }

    // -- remanage ----------------------------------------------------------

    pub fn plan_remanage<S: AsRef<str>>(&self, packages: &[S]) -> Result<Plan> {
        let manifest = self.load_manifest()?;
        let plan = self.planner().plan_remanage(&manifest, packages)?;
        log_dry_run("remanage", &plan);
        Ok(plan)
    }

    /// Re-install changed `packages`; unchanged ones are left alone
    pub fn remanage<S, P>(&self, packages: &[S], progress: &mut P) -> Result<ExecutionResult>
    where
        S: AsRef<str>,
        P: ProgressCallback + ?Sized,
    {
        let manifest = self.load_manifest()?;
        let plan = self.planner().plan_remanage(&manifest, packages)?;
        let result = self.run(&plan, progress)?;
        if !plan.metadata.package_links.is_empty() {
            self.record("remanage", |manifest| {
                self.record_links(manifest, &plan, PackageSource::Managed);
            });
        }
        Ok(result)
    }

    // -- adopt -------------------------------------------------------------

    pub fn plan_adopt<F: AsRef<Path>>(&self, files: &[F], package: &str) -> Result<Plan> {
        let plan = self.planner().plan_adopt(files, package)?;
        log_dry_run("adopt", &plan);
        Ok(plan)
    }

    /// Move `files` into `package` and link them back
    pub fn adopt<F, P>(&self, files: &[F], package: &str, progress: &mut P) -> Result<ExecutionResult>
    where
        F: AsRef<Path>,
        P: ProgressCallback + ?Sized,
    {
        let plan = self.planner().plan_adopt(files, package)?;
        let result = self.run(&plan, progress)?;
        self.record("adopt", |manifest| {
            self.record_links(manifest, &plan, PackageSource::Adopted);
        });
        Ok(result)
    }

    // -- queries -----------------------------------------------------------

    /// Status of `packages` (everything installed when empty)
    pub fn status<S: AsRef<str>>(&self, packages: &[S]) -> Result<Vec<PackageStatus>> {
        if !self.store.exists(self.target()) {
            return Ok(Vec::new());
        }
        let manifest = self.load_manifest()?;
        Ok(package_status(
            self.fs.as_ref(),
            &self.config.target_dir,
            &manifest,
            packages,
        ))
    }

    /// Every installed package, sorted by name
    pub fn list(&self) -> Result<Vec<PackageStatus>> {
        self.status::<&str>(&[])
    }

    /// Health check using the configured scan
    pub fn doctor(&self) -> Result<DiagnosticReport> {
        self.doctor_with_scan(&self.config.scan)
    }

    pub fn doctor_with_scan(&self, scan: &ScanConfig) -> Result<DiagnosticReport> {
        let manifest = if self.store.exists(self.target()) {
            Some(self.load_manifest()?)
        } else {
            None
        };
        Doctor::new(
            self.fs.as_ref(),
            &self.config.package_dir,
            &self.config.target_dir,
        )
        .with_cancel(self.cancel.clone())
        .with_manifest_file(self.config.planner.manifest_file.clone())
        .diagnose(manifest.as_ref(), scan)
    }

    /// Record where the package directory was cloned from
    pub fn set_repository(&self, repository: RepositoryInfo) -> Result<()> {
        let mut manifest = self.load_manifest()?;
        manifest.set_repository(repository);
        self.store.save(self.target(), &mut manifest)?;
        Ok(())
    }

    // -- internals ---------------------------------------------------------

    /// Execute `plan`; an empty plan succeeds without doing anything
    fn run<P: ProgressCallback + ?Sized>(&self, plan: &Plan, progress: &mut P) -> Result<ExecutionResult> {
        if plan.is_empty() {
            log::info!("nothing_to_do packages={}", plan.package_names().len());
            return Ok(ExecutionResult::default());
        }

        let result = Executor::new(self.fs.as_ref(), self.config.execute.clone())
            .with_cancel(self.cancel.clone())
            .execute(plan, progress)?;
        if !result.success() {
            return Err(result.into_error());
        }
        Ok(result)
    }

    /// Apply `update` to a fresh copy of the manifest and save it
    ///
    /// The filesystem already reflects the operation, so failures are
    /// logged rather than returned.
    fn record(&self, operation: &str, update: impl FnOnce(&mut Manifest)) {
        let saved = self.load_manifest().and_then(|mut manifest| {
            update(&mut manifest);
            self.store
                .save(self.target(), &mut manifest)
                .map_err(Error::from)
        });
        if let Err(e) = saved {
            log::warn!("manifest_update_failed operation={operation} error={e}");
        }
    }

    /// Record every package in `plan` with its links and current hash
    ///
    /// Adopting into an installed package extends its link list; an
    /// existing adopted record stays adopted.
    fn record_links(&self, manifest: &mut Manifest, plan: &Plan, source: PackageSource) {
        let planner = self.planner();
        for (name, links) in &plan.metadata.package_links {
            let (links, source) = match manifest.get_package(name) {
                Some(existing) if source == PackageSource::Adopted => {
                    let mut merged = existing.links.clone();
                    for link in links {
                        if !merged.contains(link) {
                            merged.push(link.clone());
                        }
                    }
                    (merged, PackageSource::Adopted)
                }
                Some(existing) => (links.clone(), existing.source),
                None => (links.clone(), source),
            };
            manifest.add_package(PackageInfo::new(name.clone(), links, source));

            match planner.package_hash(name) {
                Ok(hash) => {
                    manifest.set_hash(name, hash);
                }
                Err(e) => log::warn!("hash_computation_failed package={name} error={e}"),
            }
        }
    }
}

fn log_dry_run(operation: &str, plan: &Plan) {
    log::info!(
        "dry_run_plan operation={operation} operations={} conflicts={} warnings={}",
        plan.len(),
        plan.metadata.conflicts.len(),
        plan.metadata.warnings.len()
    );
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::context::NoProgress;
    use crate::fs::testing::FailingFs;
    use crate::operation::OperationKind;
    use std::fs;
    use std::path::PathBuf;
    use tempfile::TempDir;

    struct Fixture {
        _tmp: TempDir,
        root: PathBuf,
    }

    impl Fixture {
        fn new() -> Self {
            let tmp = TempDir::new().unwrap();
            let root = tmp.path().canonicalize().unwrap();
            fs::create_dir_all(root.join("dotfiles")).unwrap();
            fs::create_dir_all(root.join("home")).unwrap();
            Self { _tmp: tmp, root }
        }

        fn config(&self) -> ClientConfig {
            let mut config = ClientConfig::new(
                PackagePath::must(self.root.join("dotfiles")),
                TargetPath::must(self.root.join("home")),
            );
            config.execute.jobs = 1;
            config
        }

        fn client(&self) -> Client {
            Client::new(self.config()).unwrap()
        }

        fn package_file(&self, rel: &str, content: &str) {
            let path = self.root.join("dotfiles").join(rel);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(path, content).unwrap();
        }

        fn home(&self, rel: &str) -> PathBuf {
            self.root.join("home").join(rel)
        }

        fn manifest(&self) -> Manifest {
            FsManifestStore::new().load(&self.root.join("home")).unwrap()
        }
    }

    #[test]
    fn manage_vim_records_manifest() {
        let fx = Fixture::new();
        fx.package_file("vim/dot-vimrc", "set number");

        let plan = fx.client().plan_manage(&["vim"]).unwrap();
        assert_eq!(plan.len(), 1);
        assert_eq!(plan.operations[0].kind(), OperationKind::LinkCreate);
        assert!(!fx.home(".vimrc").exists());

        fx.client().manage(&["vim"], &mut NoProgress).unwrap();
        assert!(fx.home(".vimrc").is_symlink());
        assert_eq!(fs::read_to_string(fx.home(".vimrc")).unwrap(), "set number");

        let manifest = fx.manifest();
        assert_eq!(manifest.packages["vim"].links, vec![".vimrc".to_string()]);
        assert!(manifest.get_hash("vim").is_some());
    }

    /// Loads an empty manifest and refuses every save
    struct ReadOnlyStore;

    impl ManifestStore for ReadOnlyStore {
        fn load(&self, _target_dir: &Path) -> manifest::Result<Manifest> {
            Ok(Manifest::new())
        }

        fn save(&self, target_dir: &Path, _manifest: &mut Manifest) -> manifest::Result<()> {
            Err(manifest::Error::WriteFailed {
                path: target_dir.to_path_buf(),
                source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "read-only"),
            })
        }

        fn exists(&self, _target_dir: &Path) -> bool {
            false
        }
    }

    #[test]
    fn manage_keeps_links_when_manifest_save_fails() {
        let fx = Fixture::new();
        fx.package_file("vim/dot-vimrc", "set number");
        let client = fx.client().with_store(Box::new(ReadOnlyStore));

        let result = client.manage(&["vim"], &mut NoProgress).unwrap();
        assert_eq!(result.executed.len(), 1);
        assert!(fx.home(".vimrc").is_symlink());
        assert!(!FsManifestStore::new().exists(&fx.root.join("home")));
    }

    #[test]
    fn manage_is_idempotent() {
        let fx = Fixture::new();
        fx.package_file("vim/dot-vimrc", "set number");
        fx.package_file("vim/dot-config/nvim/init.lua", "--");
        let client = fx.client();

        client.manage(&["vim"], &mut NoProgress).unwrap();
        let first = fs::read_link(fx.home(".vimrc")).unwrap();

        let plan = client.plan_manage(&["vim"]).unwrap();
        assert!(plan.is_empty());
        assert!(plan.metadata.conflicts.is_empty());
        let result = client.manage(&["vim"], &mut NoProgress).unwrap();
        assert!(result.executed.is_empty());
        assert_eq!(fs::read_link(fx.home(".vimrc")).unwrap(), first);
        assert_eq!(fx.manifest().packages["vim"].link_count, 2);
    }

    #[test]
    fn manage_fail_policy_leaves_file() {
        let fx = Fixture::new();
        fx.package_file("vim/dot-vimrc", "package");
        fs::write(fx.home(".vimrc"), "mine").unwrap();

        let err = fx.client().manage(&["vim"], &mut NoProgress).unwrap_err();
        assert!(matches!(err, Error::Conflicts(_)));
        assert_eq!(fs::read_to_string(fx.home(".vimrc")).unwrap(), "mine");
        assert!(!FsManifestStore::new().exists(&fx.root.join("home")));
    }

    #[test]
    fn manage_failure_rolls_back_and_aggregates() {
        let fx = Fixture::new();
        for name in ["a", "b", "c", "d", "e"] {
            fx.package_file(&format!("pkg/{name}"), name);
        }
        let failing = FailingFs::new([fx.home("c")]);
        let client = fx.client().with_fs(Arc::new(failing));

        let err = client.manage(&["pkg"], &mut NoProgress).unwrap_err();
        match err {
            Error::ExecutionFailed {
                failed, rolled_back, ..
            } => {
                assert_eq!(failed.len(), 1);
                assert_eq!(failed[0].as_str(), "manage-link-pkg:c");
                assert_eq!(rolled_back.len(), 4);
            }
            other => panic!("unexpected error {other}"),
        }
        for name in ["a", "b", "d", "e"] {
            assert!(fs::symlink_metadata(fx.home(name)).is_err());
        }
        assert!(!FsManifestStore::new().exists(&fx.root.join("home")));
    }

    #[test]
    fn adopt_then_unmanage_round_trip() {
        let fx = Fixture::new();
        fs::write(fx.home(".vimrc"), "original content").unwrap();
        let client = fx.client();

        client.adopt(&[".vimrc"], "vim", &mut NoProgress).unwrap();
        assert!(fx.home(".vimrc").is_symlink());
        assert_eq!(
            fs::read_to_string(fx.root.join("dotfiles/vim/dot-vimrc")).unwrap(),
            "original content"
        );
        let manifest = fx.manifest();
        assert_eq!(manifest.packages["vim"].source, PackageSource::Adopted);

        client.unmanage(&["vim"], &mut NoProgress).unwrap();
        assert!(!fx.home(".vimrc").is_symlink());
        assert_eq!(fs::read_to_string(fx.home(".vimrc")).unwrap(), "original content");
        assert!(!fx.manifest().has_package("vim"));
    }

    #[test]
    fn remanage_unchanged_does_nothing() {
        let fx = Fixture::new();
        fx.package_file("vim/dot-vimrc", "set number");
        let client = fx.client();
        client.manage(&["vim"], &mut NoProgress).unwrap();

        let plan = client.plan_remanage(&["vim"]).unwrap();
        assert!(plan.is_empty());
        let result = client.remanage(&["vim"], &mut NoProgress).unwrap();
        assert!(result.executed.is_empty());
    }

    #[test]
    fn remanage_picks_up_new_files() {
        let fx = Fixture::new();
        fx.package_file("vim/dot-vimrc", "set number");
        let client = fx.client();
        client.manage(&["vim"], &mut NoProgress).unwrap();
        let before = fx.manifest().get_hash("vim").map(ToString::to_string);

        fx.package_file("vim/dot-gvimrc", "set guifont");
        client.remanage(&["vim"], &mut NoProgress).unwrap();

        assert!(fx.home(".gvimrc").is_symlink());
        assert!(fx.home(".vimrc").is_symlink());
        let manifest = fx.manifest();
        assert_eq!(manifest.packages["vim"].link_count, 2);
        assert_ne!(manifest.get_hash("vim").map(ToString::to_string), before);
    }

    #[test]
    fn unmanage_all_clears_manifest() {
        let fx = Fixture::new();
        fx.package_file("vim/dot-vimrc", "");
        fx.package_file("zsh/dot-zshrc", "");
        let client = fx.client();
        client.manage(&["vim", "zsh"], &mut NoProgress).unwrap();

        client.unmanage_all(&mut NoProgress).unwrap();
        assert!(!fx.home(".vimrc").exists());
        assert!(!fx.home(".zshrc").exists());
        assert!(fx.manifest().is_empty());
        assert!(fx.root.join("dotfiles/vim/dot-vimrc").exists());
    }

    #[test]
    fn status_and_doctor() {
        let fx = Fixture::new();
        let client = fx.client();
        assert!(client.list().unwrap().is_empty());
        assert!(client.doctor().unwrap().is_healthy());

        fx.package_file("vim/dot-vimrc", "");
        client.manage(&["vim"], &mut NoProgress).unwrap();
        let status = client.status(&["vim"]).unwrap();
        assert_eq!(status[0].health.correct, 1);

        fs::remove_file(fx.home(".vimrc")).unwrap();
        let report = client.doctor().unwrap();
        assert!(!report.is_healthy());
        assert_eq!(report.stats.broken_links, 1);
    }

    #[test]
    fn set_repository_persists() {
        let fx = Fixture::new();
        let client = fx.client();
        client
            .set_repository(RepositoryInfo {
                url: "https://example.com/dotfiles.git".into(),
                branch: "main".into(),
                cloned_at: chrono::Utc::now(),
                commit_sha: String::new(),
            })
            .unwrap();
        assert_eq!(
            fx.manifest().repository.unwrap().url,
            "https://example.com/dotfiles.git"
        );
    }
}
