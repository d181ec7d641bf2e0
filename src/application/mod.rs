//! Application layer - Carries out plans against the store and the disk.
//!
//! The planner decides what should change; this layer applies the change,
//! tracks each operation's state, and restores missing package files.

mod executor;
mod installer;
mod restore;

pub use executor::{ExecutionSummary, OperationOutcome, OperationState, PlanExecutor};
pub use installer::{FsPackageInstaller, MANIFEST_FILE, PackageInstaller};
pub use restore::{RestoreHandle, RestoreSummary, Restorer};

#[cfg(test)]
pub use installer::MockPackageInstaller;
