//! File hasher: resolver, output watcher and sandbox driver wired together.
//!
//! A request resolves its virtual paths, arms the watcher on its temp file,
//! then starts the sandbox. Whichever of {content observed, watcher error,
//! sandbox failure} happens first settles the request; a bounded wait covers
//! modules that never write. The watcher is stopped on every path.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::Instrument;
use wasihash_core::resolver::PathResolver;
use wasihash_core::sandbox::SandboxDriver;
use wasihash_core::settle::Settlement;
use wasihash_types::config::HasherConfig;
use wasihash_types::error::HashError;
use wasihash_types::request::VirtualConfig;

use crate::sandbox::{WasmRuntime, WasmSandboxDriver};
use crate::watcher::{OutputWatcher, WatchSignal};

/// Aborts the wrapped task when dropped, so an abandoned request never
/// leaves its sandbox running.
struct TaskGuard(JoinHandle<()>);

impl Drop for TaskGuard {
    fn drop(&mut self) {
        self.0.abort();
    }
}

/// Hashes files by delegating digest computation to a sandboxed module.
pub struct FileHasher<D> {
    resolver: PathResolver,
    driver: Arc<D>,
    timeout: Duration,
}

impl FileHasher<WasmSandboxDriver> {
    /// Build a Wasmtime-backed hasher from config.
    ///
    /// `fallback_workdir` is used when the config does not pin a working
    /// directory. The module itself is loaded lazily on the first request.
    pub fn from_config(config: &HasherConfig, fallback_workdir: &Path) -> Result<Self, HashError> {
        let runtime = Arc::new(WasmRuntime::from_config(config)?);
        Ok(Self::new(
            PathResolver::from_config(config, fallback_workdir),
            Arc::new(WasmSandboxDriver::new(runtime)),
            Duration::from_millis(config.timeout_ms),
        ))
    }
}

impl<D: SandboxDriver + 'static> FileHasher<D> {
    pub fn new(resolver: PathResolver, driver: Arc<D>, timeout: Duration) -> Self {
        Self {
            resolver,
            driver,
            timeout,
        }
    }

    pub fn driver(&self) -> &Arc<D> {
        &self.driver
    }

    /// Resolve `path` without running anything.
    pub fn resolve(&self, path: impl AsRef<Path>) -> Result<VirtualConfig, HashError> {
        self.resolver.resolve(path)
    }

    /// Hash the file at `path` (absolute, or relative to the working
    /// directory) and return the lowercase hex digest.
    ///
    /// # Errors
    ///
    /// - [`HashError::FileNotFound`] before any sandbox work if the file is missing
    /// - [`HashError::Watch`] / [`HashError::Sandbox`] if either side fails first
    /// - [`HashError::Timeout`] if no digest arrives within the configured bound
    pub async fn hash_file(&self, path: impl AsRef<Path>) -> Result<String, HashError> {
        let config = self.resolver.resolve(path)?;
        let span = tracing::info_span!(
            "hash_file",
            request_id = %config.temp_id,
            source = %config.source_path.display(),
        );

        let digest = self.settle_request(config).instrument(span).await?;
        Ok(hex::encode(digest))
    }

    async fn settle_request(&self, config: VirtualConfig) -> Result<Vec<u8>, HashError> {
        let (settler, settlement) = Settlement::channel();

        // Armed before the sandbox starts so no write can be missed.
        let mut watcher = OutputWatcher::new(&config.temp_file_path);
        let mut signals = watcher.start();

        let _watch_task = {
            let settler = settler.clone();
            TaskGuard(tokio::spawn(async move {
                if let Some(signal) = signals.recv().await {
                    let outcome = match signal {
                        WatchSignal::Content(content) => Ok(content),
                        WatchSignal::Error(err) => Err(HashError::Watch(err)),
                    };
                    settler.settle(outcome);
                }
            }))
        };

        let _sandbox_task = {
            let driver = Arc::clone(&self.driver);
            let config = config.clone();
            TaskGuard(tokio::spawn(
                async move {
                    match driver.run(&config).await {
                        Ok(run) => tracing::debug!(
                            fuel_consumed = ?run.fuel_consumed,
                            duration_ms = run.duration.as_millis() as u64,
                            "sandbox finished"
                        ),
                        Err(err) => {
                            tracing::debug!(error = %err, "sandbox failed");
                            if !settler.settle(Err(HashError::Sandbox(err))) {
                                tracing::debug!("sandbox failure arrived after settlement");
                            }
                        }
                    }
                }
                .in_current_span(),
            ))
        };

        let outcome = wait_for_outcome(settlement, self.timeout).await;

        watcher.stop();

        match &outcome {
            Ok(digest) => tracing::debug!(digest_len = digest.len(), "request settled"),
            Err(err) => tracing::warn!(error = %err, "request failed"),
        }

        outcome
    }
}

/// Wait at most `timeout` for the request to settle.
///
/// Every settler dropping without a value is [`HashError::Cancelled`].
async fn wait_for_outcome(
    settlement: Settlement<Result<Vec<u8>, HashError>>,
    timeout: Duration,
) -> Result<Vec<u8>, HashError> {
    match tokio::time::timeout(timeout, settlement.wait()).await {
        Ok(Some(outcome)) => outcome,
        Ok(None) => Err(HashError::Cancelled),
        Err(_) => Err(HashError::Timeout {
            timeout_ms: timeout.as_millis() as u64,
        }),
    }
}
