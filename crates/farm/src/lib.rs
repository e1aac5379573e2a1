//! # Farm
//!
//! Planning and execution core for a symlink farm.
//!
//! This crate turns packages (directory trees of configuration files) into
//! dependency-ordered filesystem operations, resolves conflicts with what
//! already lives in the target directory, and applies the operations with
//! checkpoint-based rollback.
//!
//! ## Core Concepts
//!
//! - **Planner**: walks package trees and classifies every prospective link
//!   against the target (`manage`, `unmanage`, `adopt`, `remanage`)
//! - **Plan**: operations, a per-package index, dependency batches and the
//!   conflicts and warnings found while planning
//! - **Executor**: runs batches on a bounded pool, blocks dependents of
//!   failed operations and rolls back what was applied
//! - **Doctor**: inspects recorded links and scans for orphaned ones
//!
//! ## Example
//!
//! ```no_run
//! use farm::{Client, ClientConfig, NoProgress, PackagePath, TargetPath};
//!
//! let config = ClientConfig::new(
//!     PackagePath::new("/home/me/dotfiles")?,
//!     TargetPath::new("/home/me")?,
//! );
//! let client = Client::new(config)?;
//!
//! let plan = client.plan_manage(&["vim"])?;
//! println!("{} operation(s)", plan.len());
//! client.manage(&["vim"], &mut NoProgress)?;
//! # Ok::<(), farm::Error>(())
//! ```
//!
//! ## Provider Traits
//!
//! - [`FileSystem`]: every filesystem access, so tests can inject failures
//! - [`ProgressCallback`]: receives execution progress
//!
//! Neither ties the crate to a terminal UI.

pub mod adopt;
pub mod checkpoint;
pub mod client;
pub mod conflict;
pub mod context;
pub mod diagnostics;
pub mod doctor;
pub mod dotfile;
pub mod error;
pub mod executor;
pub mod fs;
pub mod graph;
pub mod ignore;
pub mod operation;
pub mod path;
pub mod plan;
pub mod planner;
pub mod remanage;
pub mod scanner;
pub mod status;
pub mod unmanage;

// Re-export main types at crate root
pub use checkpoint::Checkpoint;
pub use client::{Client, ClientConfig};
pub use conflict::{
    Conflict, ConflictType, ResolutionPolicies, ResolutionPolicy, Suggestion, Warning,
    WarningSeverity,
};
pub use context::{CancelToken, NoProgress, ProgressCallback};
pub use diagnostics::{
    DiagnosticReport, DiagnosticStats, HealthStatus, Issue, IssueSeverity, IssueType,
};
pub use doctor::Doctor;
pub use dotfile::DotfileTranslator;
pub use error::{Error, ErrorCategory, Result};
pub use executor::{ExecuteOptions, ExecutionResult, Executor, LinkMode};
pub use fs::{FileSystem, OsFileSystem};
pub use graph::DependencyGraph;
pub use ignore::IgnoreSet;
pub use operation::{Action, Operation, OperationId, OperationKind};
pub use path::{FilePath, PackagePath, TargetPath, TypedPath};
pub use plan::{Plan, PlanMetadata};
pub use planner::{Planner, PlannerOptions};
pub use remanage::{RemanageDecision, RemanageReason};
pub use scanner::{OrphanScanner, ScanConfig, ScanMode};
pub use status::{LinkHealth, PackageStatus};
pub use unmanage::UnmanageOptions;
