//! Plans: ordered operations plus the diagnostics gathered while planning

use crate::conflict::{Conflict, Warning};
use crate::error::{Error, Result};
use crate::graph::DependencyGraph;
use crate::operation::{Operation, OperationId, OperationKind};
use std::collections::{BTreeMap, HashSet};

/// Counts and diagnostics attached to a plan
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlanMetadata {
    pub package_count: usize,
    pub operation_count: usize,
    pub link_count: usize,
    pub dir_count: usize,
    /// Every conflict found, including ones a policy resolved
    pub conflicts: Vec<Conflict>,
    pub warnings: Vec<Warning>,
    /// Package name -> every desired link, relative to the target root
    ///
    /// Includes links that were already correct, so this is what the
    /// manifest records.
    pub package_links: BTreeMap<String, Vec<String>>,
}

/// Ordered operations with a per-package index
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Plan {
    pub operations: Vec<Operation>,
    pub package_operations: BTreeMap<String, Vec<OperationId>>,
    /// Dependency levels, computed by [`Plan::with_batches`]
    pub batches: Option<Vec<Vec<OperationId>>>,
    pub metadata: PlanMetadata,
}

impl Plan {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    pub fn len(&self) -> usize {
        self.operations.len()
    }

    /// Append an operation, indexing it under `package` when given
    pub fn push(&mut self, operation: Operation, package: Option<&str>) {
        if let Some(name) = package {
            self.package_operations
                .entry(name.to_string())
                .or_default()
                .push(operation.id.clone());
        }
        self.operations.push(operation);
    }

    pub fn get(&self, id: &OperationId) -> Option<&Operation> {
        self.operations.iter().find(|op| &op.id == id)
    }

    pub fn contains(&self, id: &OperationId) -> bool {
        self.get(id).is_some()
    }

    /// Make sure `package` appears in the index even with no operations
    pub fn register_package(&mut self, package: &str) {
        self.package_operations
            .entry(package.to_string())
            .or_default();
    }

    pub fn operations_for_package(&self, package: &str) -> Vec<&Operation> {
        let Some(ids) = self.package_operations.get(package) else {
            return Vec::new();
        };
        let wanted: HashSet<&OperationId> = ids.iter().collect();
        self.operations
            .iter()
            .filter(|op| wanted.contains(&op.id))
            .collect()
    }

    /// Package names, sorted
    pub fn package_names(&self) -> Vec<&str> {
        self.package_operations.keys().map(String::as_str).collect()
    }

    pub fn has_package(&self, package: &str) -> bool {
        self.package_operations.contains_key(package)
    }

    pub fn operation_count_for_package(&self, package: &str) -> usize {
        self.package_operations.get(package).map_or(0, Vec::len)
    }

    /// True when at least one batch holds more than one operation
    pub fn can_parallelize(&self) -> bool {
        self.batches
            .as_ref()
            .is_some_and(|batches| batches.iter().any(|b| b.len() > 1))
    }

    /// Recompute the counters from the operations
    pub fn refresh_counts(&mut self) {
        self.metadata.operation_count = self.operations.len();
        self.metadata.link_count = self
            .operations
            .iter()
            .filter(|op| op.kind() == OperationKind::LinkCreate)
            .count();
        self.metadata.dir_count = self
            .operations
            .iter()
            .filter(|op| op.kind() == OperationKind::DirCreate)
            .count();
        let packages: HashSet<&String> = self
            .package_operations
            .keys()
            .chain(self.metadata.package_links.keys())
            .collect();
        self.metadata.package_count = packages.len();
    }

    /// Compute dependency-level batches
    pub fn with_batches(mut self) -> Result<Self> {
        let graph = DependencyGraph::build(&self.operations)?;
        self.batches = Some(graph.parallel_batches()?);
        Ok(self)
    }

    /// Structural validation: operations, ids, index, dependencies, cycles
    pub fn validate(&self) -> Result<()> {
        let mut errors = Vec::new();
        for op in &self.operations {
            if let Err(e) = op.validate() {
                errors.push(e);
            }
        }

        let ids: HashSet<&OperationId> = self.operations.iter().map(|op| &op.id).collect();
        for (package, package_ids) in &self.package_operations {
            for id in package_ids {
                if !ids.contains(id) {
                    errors.push(Error::InvalidPlan(format!(
                        "package {package} references missing operation {id}"
                    )));
                }
            }
        }

        if let Err(e) = DependencyGraph::build(&self.operations).and_then(|g| g.topological_sort()) {
            errors.push(e);
        }

        match errors.len() {
            0 => Ok(()),
            1 => Err(errors.remove(0)),
            _ => Err(Error::Multiple(errors)),
        }
    }

    /// Append another plan; `other`'s operations come after this plan's
    pub fn merge(&mut self, other: Self) {
        self.operations.extend(other.operations);
        for (package, ids) in other.package_operations {
            self.package_operations.entry(package).or_default().extend(ids);
        }
        self.metadata.conflicts.extend(other.metadata.conflicts);
        self.metadata.warnings.extend(other.metadata.warnings);
        for (package, links) in other.metadata.package_links {
            self.metadata.package_links.insert(package, links);
        }
        self.batches = None;
        self.refresh_counts();
    }
}
