//! Record of operations applied during one execution

use crate::operation::{Operation, OperationId};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};
use uuid::Uuid;

#[derive(Debug, Default)]
struct Applied {
    operations: HashMap<OperationId, Operation>,
    order: Vec<OperationId>,
}

/// Operations completed so far, in completion order
///
/// Workers record concurrently; rollback reads it once execution stops.
#[derive(Debug)]
pub struct Checkpoint {
    id: Uuid,
    created_at: DateTime<Utc>,
    applied: RwLock<Applied>,
}

impl Checkpoint {
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            created_at: Utc::now(),
            applied: RwLock::new(Applied::default()),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Record a completed operation (recording twice is a no-op)
    pub fn record(&self, operation: &Operation) {
        let mut applied = self.applied.write().unwrap_or_else(PoisonError::into_inner);
        if applied
            .operations
            .insert(operation.id.clone(), operation.clone())
            .is_none()
        {
            applied.order.push(operation.id.clone());
        }
    }

    pub fn contains(&self, id: &OperationId) -> bool {
        self.applied
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .operations
            .contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.applied
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .order
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Ids in completion order
    pub fn completed(&self) -> Vec<OperationId> {
        self.applied
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .order
            .clone()
    }

    /// Operations in the order they must be undone
    pub fn rollback_order(&self) -> Vec<Operation> {
        let applied = self.applied.read().unwrap_or_else(PoisonError::into_inner);
        applied
            .order
            .iter()
            .rev()
            .filter_map(|id| applied.operations.get(id).cloned())
            .collect()
    }
}

impl Default for Checkpoint {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::path::FilePath;
    use std::sync::Arc;
    use std::thread;

    fn op(id: &str) -> Operation {
        Operation::dir_create(id, FilePath::must(format!("/t/{id}")))
    }

    #[test]
    fn rollback_order_is_reverse() {
        let cp = Checkpoint::new();
        cp.record(&op("a"));
        cp.record(&op("b"));
        cp.record(&op("a"));
        cp.record(&op("c"));

        let ids: Vec<String> = cp
            .rollback_order()
            .iter()
            .map(|o| o.id.to_string())
            .collect();
        assert_eq!(ids, vec!["c", "b", "a"]);
        assert_eq!(cp.len(), 3);
        assert!(cp.contains(&OperationId::new("b")));
    }

    #[test]
    fn concurrent_records() {
        let cp = Arc::new(Checkpoint::new());
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let cp = Arc::clone(&cp);
                thread::spawn(move || cp.record(&op(&format!("op{i}"))))
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(cp.len(), 8);
    }

    #[test]
    fn ids_are_unique() {
        assert_ne!(Checkpoint::new().id(), Checkpoint::new().id());
    }
}
