//! Remanage planning - skips unchanged packages by content hash
//!
//! A changed package is planned as its unmanage operations followed by a
//! fresh manage; every link created at a path the unmanage part clears
//! depends on the op clearing it.

use crate::error::{Error, Result};
use crate::operation::Action;
use crate::plan::Plan;
use crate::planner::{Planner, Vacated, validate_package_name};
use crate::unmanage::UnmanageOptions;
use manifest::{Manifest, PackageSource};
use std::collections::HashSet;
use std::fmt;
use std::path::Path;

/// Why a package has to be fully re-planned
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemanageReason {
    /// No hash was stored at install time
    HashMissing,
    /// Content differs from the stored hash
    HashChanged,
    /// The current content could not be hashed
    HashFailed(String),
}

impl fmt::Display for RemanageReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::HashMissing => f.write_str("no stored hash"),
            Self::HashChanged => f.write_str("content changed"),
            Self::HashFailed(e) => write!(f, "hash failed: {e}"),
        }
    }
}

/// What remanage will do with one package
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemanageDecision {
    /// Not installed; plan a plain manage
    FreshInstall,
    /// Stored hash matches; nothing to do
    Unchanged,
    /// Unmanage then manage
    FullRemanage(RemanageReason),
}

impl Planner<'_> {
    /// Content hash of a package, excluding ignored paths
    pub fn package_hash(&self, package: &str) -> Result<String> {
        let dir = self.package_root.join(package);
        manifest::hash_package_cancellable(
            dir.as_path(),
            |rel| self.options.is_ignored(Path::new(rel)),
            || self.cancel.is_cancelled(),
        )
        .map_err(|e| match e {
            manifest::Error::Cancelled => Error::Cancelled,
            other => other.into(),
        })
    }

    /// Decide how `package` should be remanaged
    pub fn remanage_decision(&self, manifest: &Manifest, package: &str) -> RemanageDecision {
        if !manifest.has_package(package) {
            return RemanageDecision::FreshInstall;
        }

        let current = match self.package_hash(package) {
            Ok(hash) => hash,
            Err(e) => {
                log::warn!("hash_computation_failed package={package} error={e}");
                return RemanageDecision::FullRemanage(RemanageReason::HashFailed(e.to_string()));
            }
        };

        match manifest.get_hash(package) {
            None => RemanageDecision::FullRemanage(RemanageReason::HashMissing),
            Some(stored) if stored == current => RemanageDecision::Unchanged,
            Some(_) => RemanageDecision::FullRemanage(RemanageReason::HashChanged),
        }
    }

    /// Plan remanaging `packages`
    ///
    /// Unchanged packages contribute no operations and are left out of the
    /// plan's package index.
    pub fn plan_remanage<S: AsRef<str>>(&self, manifest: &Manifest, packages: &[S]) -> Result<Plan> {
        let mut seen = HashSet::new();
        let mut fresh = Vec::new();
        let mut changed = Vec::new();

        for package in packages {
            let name = package.as_ref();
            validate_package_name(name)?;
            if !seen.insert(name) {
                continue;
            }
            let decision = self.remanage_decision(manifest, name);
            if self.cancel.is_cancelled() {
                return Err(Error::Cancelled);
            }
            match decision {
                RemanageDecision::FreshInstall => fresh.push(name),
                RemanageDecision::Unchanged => {
                    log::info!("package_unchanged package={name}");
                }
                RemanageDecision::FullRemanage(reason) => {
                    log::debug!("package_changed package={name} reason={reason}");
                    changed.push(name);
                }
            }
        }

        let mut plan = if changed.is_empty() {
            Plan::new()
        } else {
            self.plan_unmanage(
                manifest,
                &changed,
                UnmanageOptions {
                    restore_adopted: false,
                },
            )?
        };
        let vacated = vacated_targets(&plan);

        // Adopted packages keep their recorded links; the rest are planned
        // from the package tree
        let mut from_tree = fresh;
        for name in changed {
            match manifest.get_package(name) {
                Some(info) if info.source == PackageSource::Adopted => {
                    plan.merge(self.plan_relink_with(info, &vacated)?);
                }
                _ => from_tree.push(name),
            }
        }
        if !from_tree.is_empty() {
            plan.merge(self.plan_manage_with(&from_tree, &vacated)?);
        }

        plan.refresh_counts();
        plan.with_batches()
    }
}

/// Link targets removed by `plan`, keyed to the removing operation
pub fn vacated_targets(plan: &Plan) -> Vacated {
    plan.operations
        .iter()
        .filter_map(|op| match &op.action {
            Action::LinkDelete { target, .. } => {
                Some((target.as_path().to_path_buf(), op.id.clone()))
            }
            _ => None,
        })
        .collect()
}
