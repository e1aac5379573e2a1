//! Manage planner - turns package trees into link operations
//!
//! Packages are walked in sorted order; each file maps to a target path
//! through dotfile translation and is classified against what already
//! sits there. Conflicts are resolved by policy or collected and returned
//! together.

use crate::conflict::{
    Conflict, ConflictType, ResolutionPolicies, ResolutionPolicy, Warning, WarningSeverity,
};
use crate::context::CancelToken;
use crate::dotfile::DotfileTranslator;
use crate::error::{Error, Result};
use crate::fs::{FileSystem, link_points_to, resolve_link_target};
use crate::ignore::IgnoreSet;
use crate::operation::{Operation, OperationId};
use crate::path::{FilePath, PackagePath, TargetPath, slash_key};
use crate::plan::Plan;
use manifest::{DEFAULT_MANIFEST_NAME, PackageInfo};
use std::collections::{HashMap, HashSet};
use std::fs::Metadata;
use std::io;
use std::path::{Path, PathBuf};

/// Default suffix appended to backed-up files
pub const DEFAULT_BACKUP_SUFFIX: &str = ".bak";

/// Targets cleared earlier in the same plan, mapped to the clearing op
pub type Vacated = HashMap<PathBuf, OperationId>;

/// Options shared by the manage, adopt and unmanage planners
#[derive(Debug, Clone)]
pub struct PlannerOptions {
    pub policies: ResolutionPolicies,
    pub translator: DotfileTranslator,
    pub ignore: IgnoreSet,
    pub backup_suffix: String,
    /// Put backups here (mirroring the target layout) instead of next to
    /// the original
    pub backup_dir: Option<FilePath>,
    /// Name of the manifest file, never linked
    pub manifest_file: String,
}

impl Default for PlannerOptions {
    fn default() -> Self {
        Self {
            policies: ResolutionPolicies::default(),
            translator: DotfileTranslator::default(),
            ignore: IgnoreSet::with_defaults(),
            backup_suffix: DEFAULT_BACKUP_SUFFIX.to_string(),
            backup_dir: None,
            manifest_file: DEFAULT_MANIFEST_NAME.to_string(),
        }
    }
}

impl PlannerOptions {
    /// Whether a package-relative path is excluded from linking
    pub fn is_ignored(&self, rel: &Path) -> bool {
        let key = slash_key(rel);
        key.rsplit('/').next() == Some(self.manifest_file.as_str())
            || self.ignore.should_ignore(&key)
    }
}

/// Reject names that would escape the package directory
pub fn validate_package_name(name: &str) -> Result<()> {
    let reason = if name.is_empty() {
        Some("package name cannot be empty")
    } else if name == "." || name == ".." {
        Some("package name cannot be . or ..")
    } else if name.contains('/') || name.contains('\\') {
        Some("package name cannot contain path separators")
    } else {
        None
    };
    match reason {
        Some(reason) => Err(Error::InvalidPath {
            path: PathBuf::from(name),
            reason: reason.to_string(),
        }),
        None => Ok(()),
    }
}

/// Plans operations for packages under one package root
///
/// Manage planning lives here; unmanage and adopt planning extend this
/// type from their own modules.
pub struct Planner<'a> {
    pub(crate) fs: &'a dyn FileSystem,
    pub(crate) package_root: &'a PackagePath,
    pub(crate) target_root: &'a TargetPath,
    pub(crate) options: &'a PlannerOptions,
    pub(crate) cancel: CancelToken,
}

impl<'a> Planner<'a> {
    pub fn new(
        fs: &'a dyn FileSystem,
        package_root: &'a PackagePath,
        target_root: &'a TargetPath,
        options: &'a PlannerOptions,
    ) -> Self {
        Self {
            fs,
            package_root,
            target_root,
            options,
            cancel: CancelToken::new(),
        }
    }

    /// Stop long package walks (content hashing) when `cancel` fires
    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Plan installing `packages` into the target root
    pub fn plan_manage<S: AsRef<str>>(&self, packages: &[S]) -> Result<Plan> {
        self.plan_manage_with(packages, &Vacated::new())?.with_batches()
    }

    /// Plan installing `packages`, treating `vacated` targets as empty
    ///
    /// Link and directory creations at a vacated path depend on the
    /// operation that clears it, which lives in another plan; batches are
    /// left for the caller to compute after merging.
    pub fn plan_manage_with<S: AsRef<str>>(&self, packages: &[S], vacated: &Vacated) -> Result<Plan> {
        let mut build = ManageBuild::new(self, vacated);
        let mut seen = HashSet::new();

        for package in packages {
            let name = package.as_ref();
            validate_package_name(name)?;
            if !seen.insert(name.to_string()) {
                continue;
            }
            build.package(name)?;
        }

        if !build.fatal.is_empty() {
            return Err(Error::Conflicts(build.fatal));
        }

        let mut plan = build.plan;
        plan.refresh_counts();
        Ok(plan)
    }

    /// Plan re-creating the recorded links of an adopted package
    ///
    /// A link whose translated path exists in the package points at that
    /// file; any other link is a directory adoption and points at the
    /// package root. Batches are not computed, as for
    /// [`Planner::plan_manage_with`].
    pub fn plan_relink_with(&self, info: &PackageInfo, vacated: &Vacated) -> Result<Plan> {
        validate_package_name(&info.name)?;
        let dir = self.package_dir(&info.name)?;
        let mut build = ManageBuild::new(self, vacated);
        build.plan.register_package(&info.name);

        let mut links = Vec::new();
        for key in &info.links {
            let rel_target = PathBuf::from(key);
            let candidate = dir.join(self.options.translator.to_package_path(&rel_target));
            let source = if self.fs.exists(candidate.as_path()) {
                candidate
            } else {
                dir.clone()
            };
            if let Some(link) = build.link(&info.name, source, &rel_target)? {
                links.push(link);
            }
        }
        build.plan.metadata.package_links.insert(info.name.clone(), links);

        if !build.fatal.is_empty() {
            return Err(Error::Conflicts(build.fatal));
        }
        let mut plan = build.plan;
        plan.refresh_counts();
        Ok(plan)
    }

    /// Package directory for `name`, checked to exist
    pub fn package_dir(&self, name: &str) -> Result<FilePath> {
        let dir = self.package_root.join(name);
        if self.fs.is_dir(dir.as_path()) {
            Ok(dir)
        } else {
            Err(Error::PackageNotFound {
                name: name.to_string(),
                path: dir.into_path_buf(),
            })
        }
    }
}

/// Outcome of preparing the parent directories of a link
enum Parents {
    /// Parents exist or will; carries the op creating the closest one
    Ready(Option<OperationId>),
    /// An occupant blocks the path and was not cleared
    Blocked,
}

/// Classification of a prospective link target
enum TargetState {
    Missing,
    Correct,
    Occupied(Conflict),
}

/// Mutable state of one manage planning pass
struct ManageBuild<'p, 'a> {
    planner: &'p Planner<'a>,
    vacated: &'p Vacated,
    plan: Plan,
    dir_ops: HashMap<PathBuf, OperationId>,
    /// Link targets, mapped to the package linking them
    claimed: HashMap<PathBuf, String>,
    /// Directories some link needs as a parent, mapped to the first package
    /// needing them
    parent_dirs: HashMap<PathBuf, String>,
    reserved_backups: HashSet<PathBuf>,
    fatal: Vec<Conflict>,
}

impl<'p, 'a> ManageBuild<'p, 'a> {
    fn new(planner: &'p Planner<'a>, vacated: &'p Vacated) -> Self {
        Self {
            planner,
            vacated,
            plan: Plan::new(),
            dir_ops: HashMap::new(),
            claimed: HashMap::new(),
            parent_dirs: HashMap::new(),
            reserved_backups: HashSet::new(),
            fatal: Vec::new(),
        }
    }

    fn fs(&self) -> &'a dyn FileSystem {
        self.planner.fs
    }

    fn package(&mut self, name: &str) -> Result<()> {
        let dir = self.planner.package_dir(name)?;
        self.plan.register_package(name);

        let mut links = Vec::new();
        self.walk(name, &dir, Path::new(""), &mut links)?;
        self.plan
            .metadata
            .package_links
            .insert(name.to_string(), links);
        Ok(())
    }

    fn walk(&mut self, package: &str, dir: &FilePath, rel: &Path, links: &mut Vec<String>) -> Result<()> {
        let entries = self
            .fs()
            .read_dir(dir.as_path())
            .map_err(|e| Error::io(dir.as_path(), e))?;

        for entry in entries {
            let Some(file_name) = entry.file_name() else {
                continue;
            };
            let rel_child = rel.join(file_name);
            if self.planner.options.is_ignored(&rel_child) {
                log::debug!("ignored path={}", rel_child.display());
                continue;
            }

            let meta = self
                .fs()
                .symlink_metadata(&entry)
                .map_err(|e| Error::io(&entry, e))?;
            let source = dir.join(file_name);
            if meta.is_dir() {
                self.walk(package, &source, &rel_child, links)?;
                continue;
            }
            // Only regular files are linked; the content hash skips the rest too
            if !meta.is_file() {
                log::debug!("skipped_non_regular package={package} path={}", rel_child.display());
                continue;
            }
            let rel_target = self.planner.options.translator.to_target_path(&rel_child);
            if let Some(link) = self.link(package, source, &rel_target)? {
                links.push(link);
            }
        }
        Ok(())
    }

    /// Plan one link; returns the target-relative key when the link is
    /// (or will be) managed by `package`
    fn link(&mut self, package: &str, source: FilePath, rel_target: &Path) -> Result<Option<String>> {
        let options = self.planner.options;
        let key = slash_key(rel_target);
        let target = self.planner.target_root.join(rel_target);

        if let Some(owner) = self.claimed.get(target.as_path()).cloned() {
            let details = format!("also provided by package {owner}");
            self.collide(package, &owner, &target, &target, details);
            return Ok(None);
        }
        if let Some(owner) = self.parent_dirs.get(target.as_path()).cloned() {
            let details = format!("package {owner} needs {key} as a directory");
            self.collide(package, &owner, &target, &target, details);
            return Ok(None);
        }

        let Parents::Ready(parent_dep) = self.ensure_parents(package, &target)? else {
            return Ok(None);
        };

        if let Some(vacating) = self.vacated.get(target.as_path()) {
            let id = OperationId::scoped("manage-link", package, &key);
            let mut op =
                Operation::link_create(id, source, target.clone()).with_dependency(vacating.clone());
            if let Some(dep) = parent_dep {
                op.add_dependency(dep);
            }
            self.plan.push(op, Some(package));
            self.claimed.insert(target.into_path_buf(), package.to_string());
            return Ok(Some(key));
        }

        let mut deps: Vec<OperationId> = parent_dep.iter().cloned().collect();
        match self.classify(&source, &target)? {
            TargetState::Missing => {}
            TargetState::Correct => {
                log::debug!("link_unchanged package={package} target={key}");
                self.claimed.insert(target.into_path_buf(), package.to_string());
                return Ok(Some(key));
            }
            TargetState::Occupied(conflict) => {
                let conflict = conflict
                    .with_context("package", package)
                    .with_context("source", source.to_string());
                self.plan.metadata.conflicts.push(conflict.clone());

                match options.policies.for_conflict(conflict.kind) {
                    ResolutionPolicy::Fail => {
                        self.fatal.push(conflict);
                        return Ok(None);
                    }
                    ResolutionPolicy::Skip => {
                        self.skip(&target, package);
                        return Ok(None);
                    }
                    ResolutionPolicy::Backup => {
                        let id = self.back_up(package, &target, &key, parent_dep);
                        deps.push(id);
                    }
                    ResolutionPolicy::Overwrite => {
                        let id = self.overwrite(package, &target, &key, conflict.kind, parent_dep)?;
                        deps.push(id);
                    }
                }
            }
        }

        let id = OperationId::scoped("manage-link", package, &key);
        let mut op = Operation::link_create(id, source, target.clone());
        for dep in deps {
            op.add_dependency(dep);
        }
        self.plan.push(op, Some(package));
        self.claimed.insert(target.into_path_buf(), package.to_string());
        Ok(Some(key))
    }

    /// Make sure every directory between the target root and `target`
    /// exists or is created
    ///
    fn ensure_parents(&mut self, package: &str, target: &FilePath) -> Result<Parents> {
        let root = self.planner.target_root;
        let Some(rel) = target.relative_to(root) else {
            return Ok(Parents::Ready(None));
        };
        let Some(rel_parent) = rel.parent() else {
            return Ok(Parents::Ready(None));
        };

        let mut dep: Option<OperationId> = None;
        let mut current = PathBuf::new();
        for component in rel_parent.components() {
            current.push(component);
            let dir = root.join(&current);
            let key = slash_key(&current);

            if let Some(owner) = self.claimed.get(dir.as_path()).cloned() {
                let details = format!("package {owner} links {key} as a file");
                self.collide(package, &owner, &dir, target, details);
                return Ok(Parents::Blocked);
            }
            self.parent_dirs
                .entry(dir.as_path().to_path_buf())
                .or_insert_with(|| package.to_string());

            if let Some(id) = self.dir_ops.get(dir.as_path()) {
                dep = Some(id.clone());
                continue;
            }

            let mut creation_deps: Vec<OperationId> = dep.iter().cloned().collect();
            if let Some(vacating) = self.vacated.get(dir.as_path()) {
                creation_deps.push(vacating.clone());
            } else {
                match self.occupant(dir.as_path())? {
                    None => {}
                    Some(meta) if meta.is_dir() => {
                        dep = None;
                        continue;
                    }
                    Some(meta) if meta.file_type().is_symlink() && self.fs().is_dir(dir.as_path()) => {
                        dep = None;
                        continue;
                    }
                    Some(_) => {
                        let conflict = Conflict::new(
                            ConflictType::FileExists,
                            dir.as_path(),
                            format!("a non-directory occupies a parent of {key}"),
                        )
                        .with_context("package", package)
                        .with_context("link", target.to_string());
                        self.plan.metadata.conflicts.push(conflict.clone());

                        match self.planner.options.policies.on_file_exists {
                            ResolutionPolicy::Fail => {
                                self.fatal.push(conflict);
                                return Ok(Parents::Blocked);
                            }
                            ResolutionPolicy::Skip => {
                                self.skip(target, package);
                                return Ok(Parents::Blocked);
                            }
                            ResolutionPolicy::Backup | ResolutionPolicy::Overwrite => {
                                creation_deps.push(self.back_up(package, &dir, &key, dep.clone()));
                            }
                        }
                    }
                }
            }

            let id = OperationId::scoped("manage-dir", package, &key);
            let mut op = Operation::dir_create(id.clone(), dir.clone());
            for d in creation_deps {
                op.add_dependency(d);
            }
            self.plan.push(op, Some(package));
            self.dir_ops.insert(dir.into_path_buf(), id.clone());
            dep = Some(id);
        }
        Ok(Parents::Ready(dep))
    }

    /// Two packages in this plan want `path` as different things
    fn collide(&mut self, package: &str, owner: &str, path: &FilePath, link: &FilePath, details: String) {
        let conflict = Conflict::new(ConflictType::FileExists, path.as_path(), details)
            .with_context("package", package)
            .with_context("owner", owner);
        self.plan.metadata.conflicts.push(conflict.clone());
        if self.planner.options.policies.on_file_exists == ResolutionPolicy::Skip {
            self.skip(link, package);
        } else {
            self.fatal.push(conflict);
        }
    }

    fn occupant(&self, path: &Path) -> Result<Option<Metadata>> {
        match self.fs().symlink_metadata(path) {
            Ok(meta) => Ok(Some(meta)),
            Err(e) if matches!(e.kind(), io::ErrorKind::NotFound | io::ErrorKind::NotADirectory) => {
                Ok(None)
            }
            Err(e) => Err(Error::io(path, e)),
        }
    }

    fn classify(&self, source: &FilePath, target: &FilePath) -> Result<TargetState> {
        let Some(meta) = self.occupant(target.as_path())? else {
            return Ok(TargetState::Missing);
        };
        let fs = self.fs();

        if meta.file_type().is_symlink() {
            if link_points_to(fs, target.as_path(), source.as_path()) {
                return Ok(TargetState::Correct);
            }
            let content = fs
                .read_link(target.as_path())
                .map_err(|e| Error::io(target.as_path(), e))?;
            let destination = resolve_link_target(target.as_path(), &content);
            let conflict = if fs.exists(&destination) {
                Conflict::new(
                    ConflictType::WrongLink,
                    target.as_path(),
                    format!("symlink points to {}", content.display()),
                )
            } else {
                Conflict::new(
                    ConflictType::BrokenLinkTarget,
                    target.as_path(),
                    format!("symlink points to missing {}", content.display()),
                )
            };
            return Ok(TargetState::Occupied(
                conflict.with_context("current", content.display().to_string()),
            ));
        }

        if meta.is_dir() {
            return Ok(TargetState::Occupied(Conflict::new(
                ConflictType::NotSymlink,
                target.as_path(),
                "a directory exists at the link target",
            )));
        }

        Ok(TargetState::Occupied(Conflict::new(
            ConflictType::FileExists,
            target.as_path(),
            "a file exists at the link target",
        )))
    }

    fn skip(&mut self, target: &FilePath, package: &str) {
        self.plan.metadata.warnings.push(
            Warning::new(
                WarningSeverity::Info,
                format!("Skipping due to conflict: {target}"),
            )
            .with_context("package", package),
        );
    }

    /// Move the occupant of `target` aside; returns the backup op id
    fn back_up(&mut self, package: &str, target: &FilePath, key: &str, dep: Option<OperationId>) -> OperationId {
        let backup = self.backup_path(target, key);
        self.reserved_backups.insert(backup.as_path().to_path_buf());
        let id = OperationId::scoped("manage-backup", package, key);
        let mut op = Operation::file_backup(id.clone(), target.clone(), backup);
        if let Some(dep) = dep {
            op.add_dependency(dep);
        }
        self.plan.push(op, Some(package));
        id
    }

    fn overwrite(
        &mut self,
        package: &str,
        target: &FilePath,
        key: &str,
        kind: ConflictType,
        dep: Option<OperationId>,
    ) -> Result<OperationId> {
        let fs = self.fs();
        let op = match kind {
            ConflictType::WrongLink | ConflictType::BrokenLinkTarget => {
                let previous = fs.read_link(target.as_path()).ok();
                Some(Operation::link_delete(
                    OperationId::scoped("manage-unlink", package, key),
                    target.clone(),
                    previous,
                ))
            }
            ConflictType::NotSymlink
                if fs.read_dir(target.as_path()).is_ok_and(|entries| entries.is_empty()) =>
            {
                Some(Operation::dir_delete(
                    OperationId::scoped("manage-rmdir", package, key),
                    target.clone(),
                ))
            }
            ConflictType::NotSymlink | ConflictType::FileExists => None,
        };

        let Some(mut op) = op else {
            self.plan.metadata.warnings.push(
                Warning::new(
                    WarningSeverity::Caution,
                    format!("Not overwriting {target}; backing it up instead"),
                )
                .with_context("package", package),
            );
            return Ok(self.back_up(package, target, key, dep));
        };

        if let Some(dep) = dep {
            op.add_dependency(dep);
        }
        let id = op.id.clone();
        self.plan.push(op, Some(package));
        Ok(id)
    }

    /// First free backup location for `target`
    fn backup_path(&self, target: &FilePath, key: &str) -> FilePath {
        let options = self.planner.options;
        let base = match &options.backup_dir {
            Some(dir) => dir.join(format!("{key}{}", options.backup_suffix)),
            None => target.with_suffix(&options.backup_suffix),
        };

        let taken = |p: &FilePath| {
            self.fs().exists(p.as_path()) || self.reserved_backups.contains(p.as_path())
        };
        if !taken(&base) {
            return base;
        }
        let mut n = 1;
        loop {
            let candidate = base.with_suffix(&format!(".{n}"));
            if !taken(&candidate) {
                return candidate;
            }
            n += 1;
        }
    }
}
