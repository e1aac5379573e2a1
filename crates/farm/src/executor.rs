//! Execution engine - applies plan operations in dependency batches
//!
//! Each batch runs on a bounded rayon pool. A failed operation blocks its
//! dependents but not independent work. Once anything fails, the
//! checkpoint is replayed in reverse to undo what was applied. Rollback
//! is best effort: undo errors are logged, never returned.

use crate::checkpoint::Checkpoint;
use crate::context::{CancelToken, ProgressCallback};
use crate::error::{Error, Result};
use crate::fs::FileSystem;
use crate::graph::DependencyGraph;
use crate::operation::{Action, Operation, OperationId};
use crate::path::{FilePath, relative_path};
use crate::plan::Plan;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::io;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// How link contents are written
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LinkMode {
    /// Relative to the directory holding the link
    #[default]
    Relative,
    Absolute,
}

impl FromStr for LinkMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "relative" => Ok(Self::Relative),
            "absolute" => Ok(Self::Absolute),
            other => Err(format!(
                "unknown link mode '{other}' (expected relative or absolute)"
            )),
        }
    }
}

/// Options for plan execution
#[derive(Debug, Clone)]
pub struct ExecuteOptions {
    /// Worker threads per batch (1 = sequential)
    pub jobs: usize,
    pub link_mode: LinkMode,
    /// Undo applied operations when anything fails
    pub rollback_on_failure: bool,
}

impl Default for ExecuteOptions {
    fn default() -> Self {
        Self {
            jobs: default_jobs(),
            link_mode: LinkMode::default(),
            rollback_on_failure: true,
        }
    }
}

/// Number of host cores, or 1 if unknown
pub fn default_jobs() -> usize {
    std::thread::available_parallelism().map_or(1, std::num::NonZeroUsize::get)
}

/// Outcome of one execution
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecutionResult {
    /// Applied operations, in completion order
    pub executed: Vec<OperationId>,
    pub failed: Vec<OperationId>,
    /// Not attempted because a dependency failed or was blocked
    pub blocked: Vec<OperationId>,
    pub rolled_back: Vec<OperationId>,
    /// `"<id>: <error>"` per failure
    pub errors: Vec<String>,
    pub cancelled: bool,
}

impl ExecutionResult {
    /// No operation failed and the run was not cancelled
    pub fn success(&self) -> bool {
        self.failed.is_empty() && !self.cancelled
    }

    /// Some operations applied and some failed
    pub fn partial_failure(&self) -> bool {
        !self.failed.is_empty() && !self.executed.is_empty()
    }

    /// Convert a failed result into [`Error::ExecutionFailed`] (or
    /// [`Error::Cancelled`])
    pub fn into_error(self) -> Error {
        if self.cancelled && self.failed.is_empty() {
            return Error::Cancelled;
        }
        Error::ExecutionFailed {
            executed: self.executed,
            failed: self.failed,
            rolled_back: self.rolled_back,
            errors: self.errors,
        }
    }
}

/// Result of attempting one operation
enum Outcome {
    /// Changed the filesystem; recorded for rollback
    Applied,
    /// Already in the desired state; nothing to undo
    Unchanged,
    Failed(Error),
    /// Dispatch skipped after cancellation
    Cancelled,
}

/// Applies plans against a [`FileSystem`]
pub struct Executor<'a> {
    fs: &'a dyn FileSystem,
    options: ExecuteOptions,
    cancel: CancelToken,
}

impl<'a> Executor<'a> {
    pub fn new(fs: &'a dyn FileSystem, options: ExecuteOptions) -> Self {
        Self {
            fs,
            options,
            cancel: CancelToken::new(),
        }
    }

    /// Observe `cancel` between batches and dispatches
    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Validate the plan and check preconditions against the filesystem
    ///
    /// Returns the dependency levels to execute. Nothing is modified.
    pub fn prepare(&self, plan: &Plan) -> Result<Vec<Vec<usize>>> {
        if plan.is_empty() {
            return Err(Error::EmptyPlan);
        }
        plan.validate()?;

        // Paths other operations create or clear are exempt from the
        // current-state checks
        let mut produced = HashSet::new();
        let mut cleared = HashSet::new();
        for op in &plan.operations {
            if let Some(path) = op.produced_path() {
                produced.insert(path.as_path());
            }
            match &op.action {
                Action::LinkDelete { target, .. } => {
                    cleared.insert(target.as_path());
                }
                Action::DirDelete { path } => {
                    cleared.insert(path.as_path());
                }
                Action::FileMove { source, .. } | Action::FileBackup { source, .. } => {
                    cleared.insert(source.as_path());
                }
                Action::LinkCreate { .. } | Action::DirCreate { .. } => {}
            }
        }

        let mut errors = Vec::new();
        for op in &plan.operations {
            if let Some(reason) = self.precondition(op, &produced, &cleared) {
                errors.push(Error::PreconditionFailed {
                    id: op.id.clone(),
                    reason,
                });
            }
        }
        match errors.len() {
            0 => {}
            1 => return Err(errors.remove(0)),
            _ => return Err(Error::Multiple(errors)),
        }

        DependencyGraph::build(&plan.operations)?.levels()
    }

    fn precondition(&self, op: &Operation, produced: &HashSet<&Path>, cleared: &HashSet<&Path>) -> Option<String> {
        let fs = self.fs;
        match &op.action {
            Action::LinkCreate { source, target } => {
                if !produced.contains(source.as_path()) && !fs.exists(source.as_path()) {
                    return Some(format!("link source {source} does not exist"));
                }
                if !cleared.contains(target.as_path()) && fs.exists(target.as_path()) {
                    return Some(format!("link target {target} already exists"));
                }
                None
            }
            Action::DirCreate { path } => {
                let occupied = fs.exists(path.as_path()) && !fs.is_dir(path.as_path());
                (occupied && !cleared.contains(path.as_path()))
                    .then(|| format!("{path} exists and is not a directory"))
            }
            Action::FileMove { source, .. } | Action::FileBackup { source, .. } => {
                (!produced.contains(source.as_path()) && !fs.exists(source.as_path()))
                    .then(|| format!("{source} does not exist"))
            }
            Action::LinkDelete { .. } | Action::DirDelete { .. } => None,
        }
    }

    /// Execute `plan`
    ///
    /// Returns `Err` only when the plan is rejected before anything runs;
    /// failures during execution are reported in the result.
    pub fn execute<P: ProgressCallback + ?Sized>(&self, plan: &Plan, progress: &mut P) -> Result<ExecutionResult> {
        let levels = self.prepare(plan)?;
        let checkpoint = Checkpoint::new();
        let mut result = ExecutionResult::default();
        let mut stopped: HashSet<usize> = HashSet::new();
        let graph = DependencyGraph::build(&plan.operations)?;

        log::debug!(
            "execute_start checkpoint={} operations={} batches={}",
            checkpoint.id(),
            plan.len(),
            levels.len()
        );
        progress.on_start(plan.len());

        let jobs = self.options.jobs.max(1);
        let pool = if jobs > 1 {
            match rayon::ThreadPoolBuilder::new().num_threads(jobs).build() {
                Ok(pool) => Some(pool),
                Err(e) => {
                    log::warn!("thread_pool_unavailable jobs={jobs} error={e}");
                    None
                }
            }
        } else {
            None
        };

        for level in levels {
            if self.cancel.is_cancelled() {
                result.cancelled = true;
                break;
            }

            let mut runnable = Vec::with_capacity(level.len());
            for index in level {
                if graph.dependencies(index).iter().any(|d| stopped.contains(d)) {
                    stopped.insert(index);
                    let op = &plan.operations[index];
                    log::debug!("operation_blocked id={}", op.id);
                    result.blocked.push(op.id.clone());
                    progress.on_operation_complete(op, false);
                } else {
                    runnable.push(index);
                }
            }

            let outcomes: Vec<(usize, Outcome)> = match &pool {
                Some(pool) if runnable.len() > 1 => pool.install(|| {
                    runnable
                        .par_iter()
                        .map(|&i| (i, self.dispatch(&plan.operations[i], &checkpoint)))
                        .collect()
                }),
                _ => runnable
                    .iter()
                    .map(|&i| (i, self.dispatch(&plan.operations[i], &checkpoint)))
                    .collect(),
            };

            for (index, outcome) in outcomes {
                let op = &plan.operations[index];
                match outcome {
                    Outcome::Applied | Outcome::Unchanged => {
                        result.executed.push(op.id.clone());
                        progress.on_operation_complete(op, true);
                    }
                    Outcome::Failed(e) => {
                        log::warn!("operation_failed id={} error={e}", op.id);
                        stopped.insert(index);
                        result.errors.push(format!("{}: {e}", op.id));
                        result.failed.push(op.id.clone());
                        progress.on_operation_complete(op, false);
                    }
                    Outcome::Cancelled => {
                        stopped.insert(index);
                        result.cancelled = true;
                    }
                }
            }
        }

        if !result.success() && self.options.rollback_on_failure {
            self.rollback(&checkpoint, &mut result, progress);
        }

        progress.on_finish(&result);
        Ok(result)
    }

    fn dispatch(&self, op: &Operation, checkpoint: &Checkpoint) -> Outcome {
        if self.cancel.is_cancelled() {
            return Outcome::Cancelled;
        }
        match self.apply(op) {
            Ok(true) => {
                checkpoint.record(op);
                Outcome::Applied
            }
            Ok(false) => Outcome::Unchanged,
            Err(e) => Outcome::Failed(e),
        }
    }

    fn rollback<P: ProgressCallback + ?Sized>(&self, checkpoint: &Checkpoint, result: &mut ExecutionResult, progress: &mut P) {
        let ops = checkpoint.rollback_order();
        if ops.is_empty() {
            return;
        }
        log::info!("rollback_start checkpoint={} operations={}", checkpoint.id(), ops.len());
        progress.on_rollback(ops.len());

        for op in ops {
            match self.undo(&op) {
                Ok(()) => result.rolled_back.push(op.id.clone()),
                Err(e) => log::warn!("rollback_failed id={} error={e}", op.id),
            }
        }
    }

    /// Apply one operation; `Ok(false)` means nothing needed changing
    fn apply(&self, op: &Operation) -> Result<bool> {
        let fs = self.fs;
        match &op.action {
            Action::LinkCreate { source, target } => {
                let content = self.link_content(source, target);
                fs.symlink(&content, target.as_path())
                    .map_err(|e| Error::io(target.as_path(), e))?;
                Ok(true)
            }
            Action::LinkDelete { target, .. } => {
                let meta = fs
                    .symlink_metadata(target.as_path())
                    .map_err(|e| Error::io(target.as_path(), e))?;
                if !meta.file_type().is_symlink() {
                    return Err(Error::PreconditionFailed {
                        id: op.id.clone(),
                        reason: format!("{target} is not a symlink"),
                    });
                }
                fs.remove_file(target.as_path())
                    .map_err(|e| Error::io(target.as_path(), e))?;
                Ok(true)
            }
            Action::DirCreate { path } => {
                if fs.is_dir(path.as_path()) && !fs.is_symlink(path.as_path()) {
                    return Ok(false);
                }
                match fs.create_dir(path.as_path()) {
                    Ok(()) => Ok(true),
                    // created concurrently by another package's op
                    Err(e) if e.kind() == io::ErrorKind::AlreadyExists && fs.is_dir(path.as_path()) => {
                        Ok(false)
                    }
                    Err(e) => Err(Error::io(path.as_path(), e)),
                }
            }
            Action::DirDelete { path } => {
                fs.remove_dir(path.as_path())
                    .map_err(|e| Error::io(path.as_path(), e))?;
                Ok(true)
            }
            Action::FileMove { source, dest } => {
                if fs.exists(dest.as_path()) {
                    return Err(Error::DestinationExists(dest.as_path().to_path_buf()));
                }
                self.move_path(source.as_path(), dest.as_path())
                    .map_err(|e| Error::io(source.as_path(), e))?;
                Ok(true)
            }
            Action::FileBackup { source, backup } => {
                if fs.exists(backup.as_path()) {
                    return Err(Error::DestinationExists(backup.as_path().to_path_buf()));
                }
                if let Some(parent) = backup.as_path().parent() {
                    fs.create_dir_all(parent).map_err(|e| Error::io(parent, e))?;
                }
                self.move_path(source.as_path(), backup.as_path())
                    .map_err(|e| Error::io(source.as_path(), e))?;
                Ok(true)
            }
        }
    }

    /// Inverse of [`Executor::apply`]
    fn undo(&self, op: &Operation) -> Result<()> {
        let fs = self.fs;
        match &op.action {
            Action::LinkCreate { target, .. } => {
                if !fs.is_symlink(target.as_path()) {
                    return Err(Error::PreconditionFailed {
                        id: op.id.clone(),
                        reason: format!("{target} is no longer a symlink"),
                    });
                }
                fs.remove_file(target.as_path())
                    .map_err(|e| Error::io(target.as_path(), e))
            }
            Action::LinkDelete { target, previous } => {
                let Some(previous) = previous else {
                    return Err(Error::PreconditionFailed {
                        id: op.id.clone(),
                        reason: "link destination was not recorded".to_string(),
                    });
                };
                fs.symlink(previous, target.as_path())
                    .map_err(|e| Error::io(target.as_path(), e))
            }
            Action::DirCreate { path } => fs
                .remove_dir(path.as_path())
                .map_err(|e| Error::io(path.as_path(), e)),
            Action::DirDelete { path } => fs
                .create_dir(path.as_path())
                .map_err(|e| Error::io(path.as_path(), e)),
            Action::FileMove { source, dest } => self
                .move_path(dest.as_path(), source.as_path())
                .map_err(|e| Error::io(dest.as_path(), e)),
            Action::FileBackup { source, backup } => self
                .move_path(backup.as_path(), source.as_path())
                .map_err(|e| Error::io(backup.as_path(), e)),
        }
    }

    fn link_content(&self, source: &FilePath, target: &FilePath) -> PathBuf {
        match self.options.link_mode {
            LinkMode::Absolute => source.as_path().to_path_buf(),
            LinkMode::Relative => {
                let Some(parent) = target.as_path().parent() else {
                    return source.as_path().to_path_buf();
                };
                let from = self
                    .fs
                    .canonicalize(parent)
                    .unwrap_or_else(|_| parent.to_path_buf());
                // Canonicalize the source's directory only, so a symlink
                // inside a package is linked to, not through
                let to = match (source.as_path().parent(), source.file_name()) {
                    (Some(dir), Some(name)) => self
                        .fs
                        .canonicalize(dir)
                        .map_or_else(|_| source.as_path().to_path_buf(), |d| d.join(name)),
                    _ => source.as_path().to_path_buf(),
                };
                relative_path(&from, &to)
            }
        }
    }

    /// Rename, falling back to copy and delete across devices
    fn move_path(&self, from: &Path, to: &Path) -> io::Result<()> {
        match self.fs.rename(from, to) {
            Err(e) if e.kind() == io::ErrorKind::CrossesDevices => {
                let meta = self.fs.symlink_metadata(from)?;
                if !meta.is_file() {
                    return Err(e);
                }
                let data = self.fs.read_file(from)?;
                self.fs.write_file(to, &data)?;
                self.fs.remove_file(from)
            }
            other => other,
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::context::NoProgress;
    use crate::fs::OsFileSystem;
    use crate::fs::testing::FailingFs;
    use std::fs;
    use std::os::unix::fs::symlink;
    use tempfile::TempDir;

    fn root() -> (TempDir, PathBuf) {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path().canonicalize().unwrap();
        fs::create_dir_all(root.join("pkg")).unwrap();
        fs::create_dir_all(root.join("home")).unwrap();
        (tmp, root)
    }

    fn sequential() -> ExecuteOptions {
        ExecuteOptions {
            jobs: 1,
            ..ExecuteOptions::default()
        }
    }

    fn link_plan(root: &Path, names: &[&str]) -> Plan {
        let mut plan = Plan::new();
        for name in names {
            fs::write(root.join("pkg").join(name), name).unwrap();
            plan.push(
                Operation::link_create(
                    format!("manage-link-{name}"),
                    FilePath::must(root.join("pkg").join(name)),
                    FilePath::must(root.join("home").join(name)),
                ),
                Some("pkg"),
            );
        }
        plan.refresh_counts();
        plan
    }

    #[derive(Default)]
    struct Recorder {
        started: usize,
        completed: Vec<(String, bool)>,
        rollbacks: usize,
        finished: bool,
    }

    impl ProgressCallback for Recorder {
        fn on_start(&mut self, total: usize) {
            self.started = total;
        }
        fn on_operation_complete(&mut self, operation: &Operation, success: bool) {
            self.completed.push((operation.id.to_string(), success));
        }
        fn on_rollback(&mut self, count: usize) {
            self.rollbacks = count;
        }
        fn on_finish(&mut self, _result: &ExecutionResult) {
            self.finished = true;
        }
    }

    #[test]
    fn execute_creates_relative_link() {
        let (_tmp, root) = root();
        let plan = link_plan(&root, &["vimrc"]);

        let result = Executor::new(&OsFileSystem, sequential())
            .execute(&plan, &mut NoProgress)
            .unwrap();
        assert!(result.success());
        assert_eq!(
            fs::read_link(root.join("home/vimrc")).unwrap(),
            PathBuf::from("../pkg/vimrc")
        );
    }

    #[test]
    fn execute_creates_absolute_link() {
        let (_tmp, root) = root();
        let plan = link_plan(&root, &["vimrc"]);
        let options = ExecuteOptions {
            link_mode: LinkMode::Absolute,
            ..sequential()
        };

        Executor::new(&OsFileSystem, options)
            .execute(&plan, &mut NoProgress)
            .unwrap();
        assert_eq!(fs::read_link(root.join("home/vimrc")).unwrap(), root.join("pkg/vimrc"));
    }

    #[test]
    fn execute_rolls_back_on_partial_failure() {
        let (_tmp, root) = root();
        let names = ["a", "b", "c", "d", "e"];
        let plan = link_plan(&root, &names);
        let failing = FailingFs::new([root.join("home/c")]);

        let mut progress = Recorder::default();
        let result = Executor::new(&failing, sequential())
            .execute(&plan, &mut progress)
            .unwrap();

        assert!(!result.success());
        assert!(result.partial_failure());
        assert_eq!(result.failed, vec![OperationId::new("manage-link-c")]);
        assert!(result.errors[0].contains("manage-link-c"));
        assert_eq!(result.rolled_back.len(), 4);
        for name in names {
            assert!(fs::symlink_metadata(root.join("home").join(name)).is_err());
        }
        assert_eq!(progress.started, 5);
        assert_eq!(progress.rollbacks, 4);
        assert!(progress.finished);

        match result.into_error() {
            Error::ExecutionFailed { failed, .. } => {
                assert_eq!(failed, vec![OperationId::new("manage-link-c")]);
            }
            other => panic!("unexpected error {other}"),
        }
    }

    #[test]
    fn execute_parallel_batch() {
        let (_tmp, root) = root();
        let names = ["a", "b", "c", "d", "e", "f"];
        let plan = link_plan(&root, &names).with_batches().unwrap();
        let options = ExecuteOptions {
            jobs: 4,
            ..ExecuteOptions::default()
        };

        let result = Executor::new(&OsFileSystem, options)
            .execute(&plan, &mut NoProgress)
            .unwrap();
        assert!(result.success());
        assert_eq!(result.executed.len(), names.len());
        for name in names {
            assert!(root.join("home").join(name).is_symlink());
        }
    }

    #[test]
    fn execute_blocks_dependents() {
        let (_tmp, root) = root();
        fs::write(root.join("pkg/init.lua"), "").unwrap();
        let mut plan = Plan::new();
        plan.push(
            Operation::dir_create("manage-dir-nvim", FilePath::must(root.join("home/nvim"))),
            Some("nvim"),
        );
        plan.push(
            Operation::link_create(
                "manage-link-nvim/init.lua",
                FilePath::must(root.join("pkg/init.lua")),
                FilePath::must(root.join("home/nvim/init.lua")),
            )
            .with_dependency("manage-dir-nvim".into()),
            Some("nvim"),
        );
        let failing = FailingFs::new([root.join("home/nvim")]);

        let result = Executor::new(&failing, sequential())
            .execute(&plan, &mut NoProgress)
            .unwrap();
        assert_eq!(result.failed, vec![OperationId::new("manage-dir-nvim")]);
        assert_eq!(result.blocked, vec![OperationId::new("manage-link-nvim/init.lua")]);
        assert!(result.executed.is_empty());
    }

    #[test]
    fn prepare_rejects_missing_source() {
        let (_tmp, root) = root();
        let mut plan = Plan::new();
        plan.push(
            Operation::link_create(
                "manage-link-x",
                FilePath::must(root.join("pkg/missing")),
                FilePath::must(root.join("home/x")),
            ),
            None,
        );
        let err = Executor::new(&OsFileSystem, sequential())
            .execute(&plan, &mut NoProgress)
            .unwrap_err();
        assert!(matches!(err, Error::PreconditionFailed { .. }));
        assert!(fs::symlink_metadata(root.join("home/x")).is_err());
    }

    #[test]
    fn prepare_rejects_occupied_target() {
        let (_tmp, root) = root();
        let plan = link_plan(&root, &["vimrc"]);
        fs::write(root.join("home/vimrc"), "appeared after planning").unwrap();
        let err = Executor::new(&OsFileSystem, sequential())
            .prepare(&plan)
            .unwrap_err();
        assert!(matches!(err, Error::PreconditionFailed { .. }));
    }

    #[test]
    fn execute_empty_plan() {
        let err = Executor::new(&OsFileSystem, sequential())
            .execute(&Plan::new(), &mut NoProgress)
            .unwrap_err();
        assert!(matches!(err, Error::EmptyPlan));
    }

    #[test]
    fn execute_cancelled_before_start() {
        let (_tmp, root) = root();
        let plan = link_plan(&root, &["a", "b"]);
        let token = CancelToken::new();
        token.cancel();

        let result = Executor::new(&OsFileSystem, sequential())
            .with_cancel(token)
            .execute(&plan, &mut NoProgress)
            .unwrap();
        assert!(result.cancelled);
        assert!(result.executed.is_empty());
        assert!(matches!(result.into_error(), Error::Cancelled));
    }

    #[test]
    fn backup_then_link_rolls_back_backup() {
        let (_tmp, root) = root();
        fs::write(root.join("pkg/vimrc"), "package").unwrap();
        fs::write(root.join("home/vimrc"), "mine").unwrap();
        fs::write(root.join("pkg/zshrc"), "package").unwrap();

        let mut plan = Plan::new();
        plan.push(
            Operation::file_backup(
                "manage-backup-vimrc",
                FilePath::must(root.join("home/vimrc")),
                FilePath::must(root.join("home/vimrc.bak")),
            ),
            None,
        );
        plan.push(
            Operation::link_create(
                "manage-link-vimrc",
                FilePath::must(root.join("pkg/vimrc")),
                FilePath::must(root.join("home/vimrc")),
            )
            .with_dependency("manage-backup-vimrc".into()),
            None,
        );
        plan.push(
            Operation::link_create(
                "manage-link-zshrc",
                FilePath::must(root.join("pkg/zshrc")),
                FilePath::must(root.join("home/zshrc")),
            ),
            None,
        );
        let failing = FailingFs::new([root.join("home/zshrc")]);

        let result = Executor::new(&failing, sequential())
            .execute(&plan, &mut NoProgress)
            .unwrap();
        assert!(!result.success());
        assert_eq!(fs::read_to_string(root.join("home/vimrc")).unwrap(), "mine");
        assert!(!root.join("home/vimrc").is_symlink());
        assert!(!root.join("home/vimrc.bak").exists());
    }

    #[test]
    fn existing_dir_is_not_rolled_back() {
        let (_tmp, root) = root();
        fs::create_dir_all(root.join("home/.config")).unwrap();
        fs::write(root.join("home/.config/keep"), "").unwrap();
        fs::write(root.join("pkg/x"), "").unwrap();

        let mut plan = Plan::new();
        plan.push(
            Operation::dir_create("manage-dir-.config", FilePath::must(root.join("home/.config"))),
            None,
        );
        plan.push(
            Operation::link_create(
                "manage-link-.config/x",
                FilePath::must(root.join("pkg/x")),
                FilePath::must(root.join("home/.config/x")),
            )
            .with_dependency("manage-dir-.config".into()),
            None,
        );
        let failing = FailingFs::new([root.join("home/.config/x")]);

        let result = Executor::new(&failing, sequential())
            .execute(&plan, &mut NoProgress)
            .unwrap();
        assert_eq!(result.executed, vec![OperationId::new("manage-dir-.config")]);
        assert!(result.rolled_back.is_empty());
        assert!(root.join("home/.config/keep").exists());
    }

    #[test]
    fn same_dir_from_two_packages_created_once() {
        let (_tmp, root) = root();
        let mut plan = Plan::new();
        for package in ["git", "fish"] {
            plan.push(
                Operation::dir_create(
                    OperationId::scoped("manage-dir", package, ".config"),
                    FilePath::must(root.join("home/.config")),
                ),
                Some(package),
            );
        }
        plan.refresh_counts();

        let options = ExecuteOptions {
            jobs: 2,
            ..ExecuteOptions::default()
        };
        let result = Executor::new(&OsFileSystem, options)
            .execute(&plan, &mut NoProgress)
            .unwrap();
        assert!(result.failed.is_empty());
        assert!(root.join("home/.config").is_dir());
    }

    #[test]
    fn link_delete_rollback_recreates_link() {
        let (_tmp, root) = root();
        fs::write(root.join("pkg/a"), "").unwrap();
        fs::write(root.join("pkg/b"), "").unwrap();
        symlink(root.join("pkg/a"), root.join("home/a")).unwrap();

        let mut plan = Plan::new();
        plan.push(
            Operation::link_delete(
                "unmanage-link-a",
                FilePath::must(root.join("home/a")),
                Some(root.join("pkg/a")),
            ),
            None,
        );
        plan.push(
            Operation::link_create(
                "manage-link-b",
                FilePath::must(root.join("pkg/b")),
                FilePath::must(root.join("home/b")),
            ),
            None,
        );
        let failing = FailingFs::new([root.join("home/b")]);

        let result = Executor::new(&failing, sequential())
            .execute(&plan, &mut NoProgress)
            .unwrap();
        assert_eq!(result.rolled_back, vec![OperationId::new("unmanage-link-a")]);
        assert_eq!(fs::read_link(root.join("home/a")).unwrap(), root.join("pkg/a"));
    }

    #[test]
    fn link_mode_parse() {
        assert_eq!("Absolute".parse::<LinkMode>(), Ok(LinkMode::Absolute));
        assert!("hard".parse::<LinkMode>().is_err());
    }
}
