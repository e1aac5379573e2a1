//! Unmanage planning - removes a package's links, restoring adopted files

use crate::conflict::{Warning, WarningSeverity};
use crate::error::{Error, Result};
use crate::fs::resolve_link_target;
use crate::operation::{Operation, OperationId};
use crate::path::{FilePath, normalize, slash_key};
use crate::plan::Plan;
use crate::planner::{Planner, validate_package_name};
use manifest::{Manifest, PackageInfo, PackageSource};
use std::collections::HashSet;
use std::io;
use std::path::{Path, PathBuf};

/// Knobs for unmanage planning
#[derive(Debug, Clone, Copy)]
pub struct UnmanageOptions {
    /// Move adopted files back to where they were adopted from
    pub restore_adopted: bool,
}

impl Default for UnmanageOptions {
    fn default() -> Self {
        Self {
            restore_adopted: true,
        }
    }
}

impl Planner<'_> {
    /// Plan removing the links of installed `packages`
    ///
    /// Packages missing from the manifest produce a warning, not an error.
    /// Only packages that were installed appear in the plan's package
    /// index.
    pub fn plan_unmanage<S: AsRef<str>>(
        &self,
        manifest: &Manifest,
        packages: &[S],
        options: UnmanageOptions,
    ) -> Result<Plan> {
        let mut plan = Plan::new();
        let mut seen = HashSet::new();

        for package in packages {
            let name = package.as_ref();
            validate_package_name(name)?;
            if !seen.insert(name.to_string()) {
                continue;
            }

            let Some(info) = manifest.get_package(name) else {
                log::warn!("package_not_installed package={name}");
                plan.metadata.warnings.push(
                    Warning::new(
                        WarningSeverity::Info,
                        format!("Package not installed: {name}"),
                    )
                    .with_context("package", name),
                );
                continue;
            };

            plan.register_package(name);
            self.unmanage_package(&mut plan, info, options)?;
        }

        if plan.is_empty() {
            log::info!("nothing_to_unmanage packages={}", seen.len());
        }

        plan.refresh_counts();
        plan.with_batches()
    }

    fn unmanage_package(&self, plan: &mut Plan, info: &PackageInfo, options: UnmanageOptions) -> Result<()> {
        let name = info.name.as_str();
        let package_dir = self.package_root.join(name);
        let restore = options.restore_adopted && info.source == PackageSource::Adopted;

        // Destinations of every link, so a directory restore leaves files
        // owned by sibling links alone
        let mut destinations = HashSet::new();
        let mut removable = Vec::new();

        for key in &info.links {
            let target = self.target_root.join(key);
            let meta = match self.fs.symlink_metadata(target.as_path()) {
                Ok(meta) => meta,
                Err(e) if e.kind() == io::ErrorKind::NotFound => {
                    log::debug!("link_missing package={name} target={key}");
                    continue;
                }
                Err(e) => return Err(Error::io(target.as_path(), e)),
            };

            if !meta.file_type().is_symlink() {
                plan.metadata.warnings.push(
                    Warning::new(
                        WarningSeverity::Caution,
                        format!("Not a symlink, leaving in place: {target}"),
                    )
                    .with_context("package", name),
                );
                continue;
            }

            let content = self
                .fs
                .read_link(target.as_path())
                .map_err(|e| Error::io(target.as_path(), e))?;
            let destination = normalize(&resolve_link_target(target.as_path(), &content));
            if !self.is_inside(&destination, package_dir.as_path()) {
                plan.metadata.warnings.push(
                    Warning::new(
                        WarningSeverity::Caution,
                        format!("Link no longer points into package {name}: {target}"),
                    )
                    .with_context("package", name)
                    .with_context("destination", destination.display().to_string()),
                );
                continue;
            }

            destinations.insert(destination.clone());
            removable.push((key.as_str(), target, content, destination));
        }

        for (key, target, content, destination) in removable {
            let unlink_id = OperationId::scoped("unmanage-link", name, key);
            plan.push(
                Operation::link_delete(unlink_id.clone(), target.clone(), Some(content)),
                Some(name),
            );

            if !restore {
                continue;
            }
            let Ok(destination) = FilePath::new(destination) else {
                continue;
            };
            if self.fs.is_dir(destination.as_path()) {
                self.restore_directory(plan, name, key, &destination, &target, unlink_id, &destinations)?;
            } else {
                plan.push(
                    Operation::file_move(
                        OperationId::scoped("unmanage-restore", name, key),
                        destination,
                        target,
                    )
                    .with_dependency(unlink_id),
                    Some(name),
                );
            }
        }
        Ok(())
    }

    /// Recreate an adopted directory and move its contents back
    #[allow(clippy::too_many_arguments)]
    fn restore_directory(
        &self,
        plan: &mut Plan,
        package: &str,
        key: &str,
        source_dir: &FilePath,
        original: &FilePath,
        unlink_id: OperationId,
        skip: &HashSet<PathBuf>,
    ) -> Result<()> {
        let root_id = OperationId::scoped("unmanage-restore-dir", package, key);
        plan.push(
            Operation::dir_create(root_id.clone(), original.clone()).with_dependency(unlink_id),
            Some(package),
        );
        self.restore_entries(plan, package, key, source_dir, original, Path::new(""), &root_id, skip)
    }

    #[allow(clippy::too_many_arguments)]
    fn restore_entries(
        &self,
        plan: &mut Plan,
        package: &str,
        key: &str,
        source_dir: &FilePath,
        original: &FilePath,
        rel: &Path,
        parent_id: &OperationId,
        skip: &HashSet<PathBuf>,
    ) -> Result<()> {
        let current = source_dir.join(rel);
        let entries = self
            .fs
            .read_dir(current.as_path())
            .map_err(|e| Error::io(current.as_path(), e))?;

        for entry in entries {
            let Some(file_name) = entry.file_name() else {
                continue;
            };
            let rel_child = rel.join(file_name);
            let source = source_dir.join(&rel_child);
            if skip.contains(source.as_path()) {
                continue;
            }

            let rel_target = self.options.translator.to_target_path(&rel_child);
            let dest = original.join(&rel_target);
            let id_suffix = format!("{key}/{}", slash_key(&rel_target));
            let meta = self
                .fs
                .symlink_metadata(&entry)
                .map_err(|e| Error::io(&entry, e))?;

            if meta.is_dir() {
                let dir_id = OperationId::scoped("unmanage-restore-dir", package, &id_suffix);
                plan.push(
                    Operation::dir_create(dir_id.clone(), dest).with_dependency(parent_id.clone()),
                    Some(package),
                );
                self.restore_entries(plan, package, key, source_dir, original, &rel_child, &dir_id, skip)?;
            } else {
                plan.push(
                    Operation::file_move(
                        OperationId::scoped("unmanage-restore", package, &id_suffix),
                        source,
                        dest,
                    )
                    .with_dependency(parent_id.clone()),
                    Some(package),
                );
            }
        }
        Ok(())
    }

    fn is_inside(&self, path: &Path, dir: &Path) -> bool {
        if path.starts_with(dir) {
            return true;
        }
        match (self.fs.canonicalize(path), self.fs.canonicalize(dir)) {
            (Ok(path), Ok(dir)) => path.starts_with(dir),
            _ => false,
        }
    }
}
