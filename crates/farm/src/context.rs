//! Execution context: progress callbacks and cancellation
//!
//! These traits allow the core to report progress without depending on
//! a specific terminal UI.

use crate::executor::ExecutionResult;
use crate::operation::Operation;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Cooperative cancellation flag shared between a caller and a running
/// execution or scan
///
/// Checked at batch, dispatch and directory-visit boundaries; an
/// operation already in flight always finishes.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// Progress callback for plan execution
///
/// Implement this trait to receive progress updates during execution.
/// Calls happen on the caller's thread after each batch completes.
pub trait ProgressCallback: Send {
    /// Called once before the first batch
    fn on_start(&mut self, total: usize);

    /// Called when an operation finishes
    fn on_operation_complete(&mut self, operation: &Operation, success: bool);

    /// Called before completed operations are rolled back
    fn on_rollback(&mut self, count: usize);

    /// Called after execution (and any rollback) ends
    fn on_finish(&mut self, result: &ExecutionResult);
}

/// No-op progress callback
pub struct NoProgress;

impl ProgressCallback for NoProgress {
    fn on_start(&mut self, _total: usize) {}
    fn on_operation_complete(&mut self, _operation: &Operation, _success: bool) {}
    fn on_rollback(&mut self, _count: usize) {}
    fn on_finish(&mut self, _result: &ExecutionResult) {}
}
