//! Sandbox driver trait and run report.
//!
//! Defines the [`SandboxDriver`] trait the Wasmtime driver implements. A
//! driver receives a resolved [`VirtualConfig`], runs the sandboxed module
//! with its mounts and arguments, and reports resource usage. The digest
//! itself never travels through the driver: the module writes it to the
//! virtual output path and the output watcher picks it up.

use std::time::Duration;

use wasihash_types::error::SandboxError;
use wasihash_types::request::VirtualConfig;

// ---------------------------------------------------------------------------
// Run report
// ---------------------------------------------------------------------------

/// Resource usage of a completed sandbox run.
#[derive(Debug, Clone)]
pub struct SandboxRun {
    /// Fuel consumed (None for drivers that do not meter fuel).
    pub fuel_consumed: Option<u64>,
    /// Wall-clock duration of compile + instantiate + run.
    pub duration: Duration,
}

// ---------------------------------------------------------------------------
// Driver trait
// ---------------------------------------------------------------------------

/// Runs the sandboxed hashing module for one request.
///
/// Completion is not load-bearing for the result; only failures matter to
/// the caller, which routes them into the same settlement as the watcher.
pub trait SandboxDriver: Send + Sync {
    fn run(
        &self,
        config: &VirtualConfig,
    ) -> impl std::future::Future<Output = Result<SandboxRun, SandboxError>> + Send;
}
