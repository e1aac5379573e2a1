//! Adopt planning - absorbs existing target files into a package
//!
//! A file moves into the package at its translated relative path and a
//! symlink takes its place. A directory has its contents moved into the
//! package root, is removed, and becomes a single symlink to the package.
//! Every source is checked before any operation is queued.

use crate::error::{Error, Result};
use crate::operation::{Operation, OperationId};
use crate::path::{FilePath, slash_key};
use crate::plan::Plan;
use crate::planner::{Planner, validate_package_name};
use std::collections::{HashMap, HashSet};
use std::io;
use std::path::{Path, PathBuf};

/// What an adopt source turned out to be
enum SourceKind {
    File,
    Directory,
}

impl Planner<'_> {
    /// Plan adopting `files` into `package`
    ///
    /// Relative paths are taken relative to the target root. Every file
    /// must live inside the target root and must not be a symlink.
    pub fn plan_adopt<P: AsRef<Path>>(&self, files: &[P], package: &str) -> Result<Plan> {
        validate_package_name(package)?;
        if files.is_empty() {
            return Err(Error::InvalidPlan("no files to adopt".to_string()));
        }

        let sources = files
            .iter()
            .map(|file| self.adopt_source(file.as_ref()))
            .collect::<Result<Vec<_>>>()?;

        let package_dir = self.package_root.join(package);
        let mut build = AdoptBuild {
            planner: self,
            package,
            package_dir: package_dir.clone(),
            plan: Plan::new(),
            dirs: HashMap::new(),
            destinations: HashSet::new(),
            links: Vec::new(),
        };
        build.plan.register_package(package);

        let root_dep = if self.fs.exists(package_dir.as_path()) {
            None
        } else {
            let id = OperationId::new(format!("adopt-create-pkg-{package}"));
            build.plan.push(Operation::dir_create(id.clone(), package_dir.clone()), Some(package));
            build.dirs.insert(package_dir.as_path().to_path_buf(), id.clone());
            Some(id)
        };

        let mut seen = HashSet::new();
        for (source, rel, kind) in sources {
            if !seen.insert(source.clone()) {
                continue;
            }
            match kind {
                SourceKind::File => build.file(&source, &rel, root_dep.as_ref())?,
                SourceKind::Directory => build.directory(&source, &rel, root_dep.as_ref())?,
            }
        }

        let AdoptBuild { mut plan, links, .. } = build;
        plan.metadata.package_links.insert(package.to_string(), links);
        plan.refresh_counts();
        plan.with_batches()
    }

    fn adopt_source(&self, file: &Path) -> Result<(FilePath, PathBuf, SourceKind)> {
        let absolute = if file.is_absolute() {
            file.to_path_buf()
        } else {
            self.target_root.as_path().join(file)
        };
        let source = FilePath::new(absolute)?;

        let meta = match self.fs.symlink_metadata(source.as_path()) {
            Ok(meta) => meta,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(Error::SourceNotFound(source.into_path_buf()));
            }
            Err(e) => return Err(Error::io(source.as_path(), e)),
        };
        if meta.file_type().is_symlink() {
            return Err(Error::InvalidPath {
                path: source.into_path_buf(),
                reason: "already a symlink".to_string(),
            });
        }

        let rel = source
            .relative_to(self.target_root)
            .filter(|rel| !rel.as_os_str().is_empty())
            .ok_or_else(|| Error::InvalidPath {
                path: source.as_path().to_path_buf(),
                reason: format!("not inside target directory {}", self.target_root),
            })?;

        let kind = if meta.is_dir() {
            SourceKind::Directory
        } else {
            SourceKind::File
        };
        Ok((source, rel, kind))
    }
}

struct AdoptBuild<'p, 'a> {
    planner: &'p Planner<'a>,
    package: &'p str,
    package_dir: FilePath,
    plan: Plan,
    /// Package directories known to exist after the plan runs
    dirs: HashMap<PathBuf, OperationId>,
    destinations: HashSet<PathBuf>,
    links: Vec<String>,
}

impl AdoptBuild<'_, '_> {
    fn file(&mut self, source: &FilePath, rel: &Path, root_dep: Option<&OperationId>) -> Result<()> {
        let key = slash_key(rel);
        let dest = self
            .package_dir
            .join(self.planner.options.translator.to_package_path(rel));
        self.claim(&dest)?;

        let parent_dep = match dest.parent() {
            Some(parent) => self.ensure_dir(&parent, root_dep)?,
            None => root_dep.cloned(),
        };

        let move_id = OperationId::new(format!("adopt-move-{key}"));
        let mut mv = Operation::file_move(move_id.clone(), source.clone(), dest.clone());
        if let Some(dep) = parent_dep {
            mv.add_dependency(dep);
        }
        self.plan.push(mv, Some(self.package));
        self.plan.push(
            Operation::link_create(format!("adopt-link-{key}"), dest, source.clone())
                .with_dependency(move_id),
            Some(self.package),
        );
        self.links.push(key);
        Ok(())
    }

    fn directory(&mut self, source: &FilePath, rel: &Path, root_dep: Option<&OperationId>) -> Result<()> {
        let key = slash_key(rel);

        // Ops that must finish before `source` itself can be removed
        let mut emptied = Vec::new();
        self.move_contents(source, Path::new(""), &key, root_dep, &mut emptied)?;

        let remove_id = OperationId::new(format!("adopt-rmdir-{key}"));
        let mut remove = Operation::dir_delete(remove_id.clone(), source.clone());
        for dep in emptied {
            remove.add_dependency(dep);
        }
        self.plan.push(remove, Some(self.package));

        let mut link = Operation::link_create(
            format!("adopt-link-{key}"),
            self.package_dir.clone(),
            source.clone(),
        )
        .with_dependency(remove_id);
        if let Some(dep) = root_dep {
            link.add_dependency(dep.clone());
        }
        self.plan.push(link, Some(self.package));
        self.links.push(key);
        Ok(())
    }

    /// Queue moves for everything under `source/rel`, pushing the ids the
    /// removal of `source/rel` must wait for into `emptied`
    fn move_contents(
        &mut self,
        source: &FilePath,
        rel: &Path,
        key: &str,
        root_dep: Option<&OperationId>,
        emptied: &mut Vec<OperationId>,
    ) -> Result<()> {
        let fs = self.planner.fs;
        let current = source.join(rel);
        let entries = fs
            .read_dir(current.as_path())
            .map_err(|e| Error::io(current.as_path(), e))?;

        for entry in entries {
            let Some(file_name) = entry.file_name() else {
                continue;
            };
            let rel_child = rel.join(file_name);
            let child_key = format!("{key}/{}", slash_key(&rel_child));
            let dest = self
                .package_dir
                .join(self.planner.options.translator.to_package_path(&rel_child));
            let meta = fs
                .symlink_metadata(&entry)
                .map_err(|e| Error::io(&entry, e))?;

            if meta.is_dir() {
                self.ensure_dir(&dest, root_dep)?;
                let mut inner = Vec::new();
                self.move_contents(source, &rel_child, key, root_dep, &mut inner)?;

                let remove_id = OperationId::new(format!("adopt-rmdir-{child_key}"));
                let mut remove = Operation::dir_delete(remove_id.clone(), source.join(&rel_child));
                for dep in inner {
                    remove.add_dependency(dep);
                }
                self.plan.push(remove, Some(self.package));
                emptied.push(remove_id);
            } else {
                self.claim(&dest)?;
                let parent_dep = match dest.parent() {
                    Some(parent) => self.ensure_dir(&parent, root_dep)?,
                    None => root_dep.cloned(),
                };
                let move_id = OperationId::new(format!("adopt-move-{child_key}"));
                let mut mv = Operation::file_move(move_id.clone(), source.join(&rel_child), dest);
                if let Some(dep) = parent_dep {
                    mv.add_dependency(dep);
                }
                self.plan.push(mv, Some(self.package));
                emptied.push(move_id);
            }
        }
        Ok(())
    }

    /// Make sure `dir` (inside the package) exists; returns the op that
    /// creates it, if one is needed
    fn ensure_dir(&mut self, dir: &FilePath, root_dep: Option<&OperationId>) -> Result<Option<OperationId>> {
        if let Some(id) = self.dirs.get(dir.as_path()) {
            return Ok(Some(id.clone()));
        }
        if dir == &self.package_dir {
            return Ok(root_dep.cloned());
        }
        if self.planner.fs.is_dir(dir.as_path()) {
            return Ok(None);
        }
        if self.planner.fs.exists(dir.as_path()) {
            return Err(Error::DestinationExists(dir.as_path().to_path_buf()));
        }

        let parent_dep = match dir.parent() {
            Some(parent) if dir.as_path().starts_with(self.package_dir.as_path()) => {
                self.ensure_dir(&parent, root_dep)?
            }
            _ => None,
        };
        let rel = dir
            .relative_to(&self.package_dir)
            .map_or_else(|| dir.to_string(), |rel| slash_key(&rel));
        let id = OperationId::new(format!("adopt-dir-{}/{rel}", self.package));
        let mut op = Operation::dir_create(id.clone(), dir.clone());
        if let Some(dep) = parent_dep {
            op.add_dependency(dep);
        }
        self.plan.push(op, Some(self.package));
        self.dirs.insert(dir.as_path().to_path_buf(), id.clone());
        Ok(Some(id))
    }

    /// Reserve a destination inside the package
    fn claim(&mut self, dest: &FilePath) -> Result<()> {
        if self.planner.fs.exists(dest.as_path()) || !self.destinations.insert(dest.as_path().to_path_buf()) {
            return Err(Error::DestinationExists(dest.as_path().to_path_buf()));
        }
        Ok(())
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::fs::OsFileSystem;
    use crate::operation::{Action, OperationKind};
    use crate::path::{PackagePath, TargetPath};
    use crate::planner::PlannerOptions;
    use std::fs;
    use std::os::unix::fs::symlink;
    use tempfile::TempDir;

    struct Fixture {
        _tmp: TempDir,
        packages: PackagePath,
        target: TargetPath,
        options: PlannerOptions,
    }

    impl Fixture {
        fn new() -> Self {
            let tmp = TempDir::new().unwrap();
            let root = tmp.path().canonicalize().unwrap();
            fs::create_dir_all(root.join("dotfiles")).unwrap();
            fs::create_dir_all(root.join("home")).unwrap();
            Self {
                packages: PackagePath::must(root.join("dotfiles")),
                target: TargetPath::must(root.join("home")),
                options: PlannerOptions::default(),
                _tmp: tmp,
            }
        }

        fn home(&self, rel: &str) -> PathBuf {
            self.target.as_path().join(rel)
        }

        fn write_home(&self, rel: &str) {
            let path = self.home(rel);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(path, rel).unwrap();
        }

        fn plan(&self, files: &[&str], package: &str) -> Result<Plan> {
            Planner::new(&OsFileSystem, &self.packages, &self.target, &self.options)
                .plan_adopt(files, package)
        }
    }

    fn ids(plan: &Plan) -> Vec<&str> {
        plan.operations.iter().map(|op| op.id.as_str()).collect()
    }

    #[test]
    fn plan_adopt_single_file() {
        let fx = Fixture::new();
        fx.write_home(".vimrc");

        let plan = fx.plan(&[".vimrc"], "vim").unwrap();
        assert_eq!(
            ids(&plan),
            vec!["adopt-create-pkg-vim", "adopt-move-.vimrc", "adopt-link-.vimrc"]
        );
        match &plan.operations[1].action {
            Action::FileMove { source, dest } => {
                assert_eq!(source.as_path(), fx.home(".vimrc"));
                assert_eq!(dest.as_path(), fx.packages.as_path().join("vim/dot-vimrc"));
            }
            other => panic!("unexpected action {other:?}"),
        }
        assert_eq!(plan.metadata.package_links["vim"], vec![".vimrc".to_string()]);
        assert_eq!(plan.batches.as_ref().unwrap().len(), 3);
    }

    #[test]
    fn plan_adopt_existing_package_nested_file() {
        let fx = Fixture::new();
        fs::create_dir_all(fx.packages.as_path().join("git")).unwrap();
        fx.write_home(".config/git/config");

        let plan = fx.plan(&[".config/git/config"], "git").unwrap();
        assert_eq!(
            ids(&plan),
            vec![
                "adopt-dir-git/dot-config",
                "adopt-dir-git/dot-config/git",
                "adopt-move-.config/git/config",
                "adopt-link-.config/git/config",
            ]
        );
        assert_eq!(
            plan.operations[2].depends_on,
            vec![OperationId::new("adopt-dir-git/dot-config/git")]
        );
    }

    #[test]
    fn plan_adopt_directory() {
        let fx = Fixture::new();
        fx.write_home(".config/nvim/init.lua");
        fx.write_home(".config/nvim/lua/plugins.lua");

        let plan = fx.plan(&[".config/nvim"], "nvim").unwrap();
        assert_eq!(
            ids(&plan),
            vec![
                "adopt-create-pkg-nvim",
                "adopt-move-.config/nvim/init.lua",
                "adopt-dir-nvim/lua",
                "adopt-move-.config/nvim/lua/plugins.lua",
                "adopt-rmdir-.config/nvim/lua",
                "adopt-rmdir-.config/nvim",
                "adopt-link-.config/nvim",
            ]
        );
        let link = plan.operations.last().unwrap();
        match &link.action {
            Action::LinkCreate { source, target } => {
                assert_eq!(source.as_path(), fx.packages.as_path().join("nvim"));
                assert_eq!(target.as_path(), fx.home(".config/nvim"));
            }
            other => panic!("unexpected action {other:?}"),
        }
        assert!(plan.validate().is_ok());
        assert_eq!(plan.metadata.package_links["nvim"], vec![".config/nvim".to_string()]);
    }

    #[test]
    fn plan_adopt_missing_source_aborts() {
        let fx = Fixture::new();
        fx.write_home(".vimrc");
        let err = fx.plan(&[".vimrc", ".gvimrc"], "vim").unwrap_err();
        assert!(matches!(err, Error::SourceNotFound(ref p) if p == &fx.home(".gvimrc")));
        assert!(fx.home(".vimrc").is_file());
    }

    #[test]
    fn plan_adopt_rejects_symlink() {
        let fx = Fixture::new();
        fx.write_home("real");
        symlink(fx.home("real"), fx.home(".vimrc")).unwrap();
        assert!(matches!(
            fx.plan(&[".vimrc"], "vim"),
            Err(Error::InvalidPath { .. })
        ));
    }

    #[test]
    fn plan_adopt_destination_exists() {
        let fx = Fixture::new();
        fx.write_home(".vimrc");
        fs::create_dir_all(fx.packages.as_path().join("vim")).unwrap();
        fs::write(fx.packages.as_path().join("vim/dot-vimrc"), "").unwrap();
        assert!(matches!(
            fx.plan(&[".vimrc"], "vim"),
            Err(Error::DestinationExists(_))
        ));
    }

    #[test]
    fn plan_adopt_outside_target_rejected() {
        let fx = Fixture::new();
        let outside = fx.packages.as_path().join("stray");
        fs::write(&outside, "").unwrap();
        let files = [outside];
        let err = Planner::new(&OsFileSystem, &fx.packages, &fx.target, &fx.options)
            .plan_adopt(&files, "vim")
            .unwrap_err();
        assert!(matches!(err, Error::InvalidPath { .. }));
    }

    #[test]
    fn plan_adopt_link_follows_move() {
        let fx = Fixture::new();
        fx.write_home(".zshrc");
        let plan = fx.plan(&[".zshrc"], "zsh").unwrap();
        let link = &plan.operations[2];
        assert_eq!(link.kind(), OperationKind::LinkCreate);
        assert_eq!(link.depends_on, vec![OperationId::new("adopt-move-.zshrc")]);
    }
}
