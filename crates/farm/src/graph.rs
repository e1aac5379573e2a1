//! Dependency graph over plan operations
//!
//! Kahn's algorithm with ties broken by list position, so the same plan
//! always yields the same order and the same batches.

use crate::error::{Error, Result};
use crate::operation::{Operation, OperationId};
use std::collections::{BTreeSet, HashMap};

/// Directed graph: an edge `a -> b` means `b` depends on `a`
#[derive(Debug, Clone)]
pub struct DependencyGraph {
    ids: Vec<OperationId>,
    dependencies: Vec<Vec<usize>>,
    dependents: Vec<Vec<usize>>,
}

impl DependencyGraph {
    /// Build the graph, rejecting duplicate ids and unknown dependencies
    pub fn build(operations: &[Operation]) -> Result<Self> {
        let mut index: HashMap<&OperationId, usize> = HashMap::with_capacity(operations.len());
        for (i, op) in operations.iter().enumerate() {
            if index.insert(&op.id, i).is_some() {
                return Err(Error::InvalidPlan(format!("duplicate operation id {}", op.id)));
            }
        }

        let mut dependencies = vec![Vec::new(); operations.len()];
        let mut dependents = vec![Vec::new(); operations.len()];
        for (i, op) in operations.iter().enumerate() {
            for dep in &op.depends_on {
                let Some(&j) = index.get(dep) else {
                    return Err(Error::UnknownDependency {
                        id: op.id.clone(),
                        dependency: dep.clone(),
                    });
                };
                if !dependencies[i].contains(&j) {
                    dependencies[i].push(j);
                    dependents[j].push(i);
                }
            }
        }

        Ok(Self {
            ids: operations.iter().map(|op| op.id.clone()).collect(),
            dependencies,
            dependents,
        })
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn id(&self, index: usize) -> &OperationId {
        &self.ids[index]
    }

    /// Indices of the operations `index` depends on
    pub fn dependencies(&self, index: usize) -> &[usize] {
        &self.dependencies[index]
    }

    /// Indices of the operations depending on `index`
    pub fn dependents(&self, index: usize) -> &[usize] {
        &self.dependents[index]
    }

    /// Operation ids in dependency order
    pub fn topological_sort(&self) -> Result<Vec<OperationId>> {
        let mut in_degree: Vec<usize> = self.dependencies.iter().map(Vec::len).collect();
        let mut ready: BTreeSet<usize> = (0..self.len()).filter(|&i| in_degree[i] == 0).collect();
        let mut order = Vec::with_capacity(self.len());

        while let Some(next) = ready.pop_first() {
            order.push(self.ids[next].clone());
            for &dependent in &self.dependents[next] {
                in_degree[dependent] -= 1;
                if in_degree[dependent] == 0 {
                    ready.insert(dependent);
                }
            }
        }

        if order.len() == self.len() {
            Ok(order)
        } else {
            Err(self.cycle_error())
        }
    }

    /// Kahn levels as operation indices, each level in list order
    pub fn levels(&self) -> Result<Vec<Vec<usize>>> {
        let mut in_degree: Vec<usize> = self.dependencies.iter().map(Vec::len).collect();
        let mut current: Vec<usize> = (0..self.len()).filter(|&i| in_degree[i] == 0).collect();
        let mut levels = Vec::new();
        let mut placed = 0;

        while !current.is_empty() {
            placed += current.len();
            let mut next = Vec::new();
            for &i in &current {
                for &dependent in &self.dependents[i] {
                    in_degree[dependent] -= 1;
                    if in_degree[dependent] == 0 {
                        next.push(dependent);
                    }
                }
            }
            next.sort_unstable();
            levels.push(std::mem::replace(&mut current, next));
        }

        if placed == self.len() {
            Ok(levels)
        } else {
            Err(self.cycle_error())
        }
    }

    /// Groups of operations that can run concurrently; each group depends
    /// only on earlier groups
    pub fn parallel_batches(&self) -> Result<Vec<Vec<OperationId>>> {
        Ok(self
            .levels()?
            .into_iter()
            .map(|level| level.into_iter().map(|i| self.ids[i].clone()).collect())
            .collect())
    }

    /// Ids forming a dependency cycle, if there is one
    pub fn find_cycle(&self) -> Option<Vec<OperationId>> {
        #[derive(Clone, Copy, PartialEq)]
        enum Mark {
            Unvisited,
            InProgress,
            Done,
        }

        let mut marks = vec![Mark::Unvisited; self.len()];
        let mut stack: Vec<usize> = Vec::new();

        for start in 0..self.len() {
            if marks[start] != Mark::Unvisited {
                continue;
            }
            // Iterative DFS: (node, next dependency position)
            let mut frames: Vec<(usize, usize)> = vec![(start, 0)];
            marks[start] = Mark::InProgress;
            stack.push(start);

            while let Some(frame) = frames.last_mut() {
                let node = frame.0;
                if let Some(&dep) = self.dependencies[node].get(frame.1) {
                    frame.1 += 1;
                    match marks[dep] {
                        Mark::Unvisited => {
                            marks[dep] = Mark::InProgress;
                            stack.push(dep);
                            frames.push((dep, 0));
                        }
                        Mark::InProgress => {
                            let from = stack.iter().position(|&n| n == dep).unwrap_or(0);
                            return Some(
                                stack[from..].iter().map(|&i| self.ids[i].clone()).collect(),
                            );
                        }
                        Mark::Done => {}
                    }
                } else {
                    marks[node] = Mark::Done;
                    stack.pop();
                    frames.pop();
                }
            }
        }
        None
    }

    fn cycle_error(&self) -> Error {
        Error::CyclicDependency {
            cycle: self.find_cycle().unwrap_or_default(),
        }
    }
}
