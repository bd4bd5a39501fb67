//! Wasmtime engine configuration and module loading.
//!
//! Provides [`WasmRuntime`], which owns a single Wasmtime engine and the
//! hashing module compiled from a fixed on-disk path. The module is read and
//! compiled once on first use and shared read-only by every request.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

use tokio::sync::OnceCell;
use wasihash_types::config::HasherConfig;
use wasihash_types::error::SandboxError;
use wasmtime::{Config, Engine, Module};

/// Per-instance limits applied to every sandbox run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SandboxLimits {
    pub max_fuel: u64,
    pub fuel_yield_interval: u64,
    pub max_memory_bytes: usize,
}

impl SandboxLimits {
    pub fn from_config(config: &HasherConfig) -> Self {
        Self {
            max_fuel: config.max_fuel,
            fuel_yield_interval: config.fuel_yield_interval,
            max_memory_bytes: config.max_memory_bytes,
        }
    }
}

impl Default for SandboxLimits {
    fn default() -> Self {
        Self::from_config(&HasherConfig::default())
    }
}

/// Wasmtime runtime holding the engine and the cached hashing module.
pub struct WasmRuntime {
    engine: Engine,
    module_path: PathBuf,
    module: OnceCell<Module>,
    loads: AtomicUsize,
    limits: SandboxLimits,
}

impl WasmRuntime {
    /// Create a runtime for the module at `module_path`.
    ///
    /// Nothing is read from disk until the first [`WasmRuntime::module`] call.
    ///
    /// # Errors
    ///
    /// Returns [`SandboxError::Engine`] if engine creation fails (e.g.,
    /// unsupported platform).
    pub fn new(module_path: impl Into<PathBuf>, limits: SandboxLimits) -> Result<Self, SandboxError> {
        let engine = Engine::new(&Self::create_engine_config())
            .map_err(|e| SandboxError::Engine(format!("{e:#}")))?;

        Ok(Self {
            engine,
            module_path: module_path.into(),
            module: OnceCell::new(),
            loads: AtomicUsize::new(0),
            limits,
        })
    }

    pub fn from_config(config: &HasherConfig) -> Result<Self, SandboxError> {
        Self::new(&config.module_path, SandboxLimits::from_config(config))
    }

    /// Build the Wasmtime [`Config`] used for the hashing sandbox.
    ///
    /// Async support lets the guest yield back to Tokio; fuel metering drives
    /// those yields so a timed-out request can drop a still-running guest.
    fn create_engine_config() -> Config {
        let mut config = Config::new();

        config.async_support(true);
        config.consume_fuel(true);

        // The hashing module is single-threaded.
        config.wasm_threads(false);
        config.wasm_simd(true);

        config
    }

    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    pub fn module_path(&self) -> &Path {
        &self.module_path
    }

    pub fn limits(&self) -> SandboxLimits {
        self.limits
    }

    /// Number of times module bytes were read from disk.
    pub fn load_count(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }

    /// Get the compiled hashing module, loading and compiling it on first use.
    ///
    /// A failed load is not cached; the next call retries.
    pub async fn module(&self) -> Result<&Module, SandboxError> {
        self.module
            .get_or_try_init(|| async {
                self.loads.fetch_add(1, Ordering::SeqCst);
                let bytes = tokio::fs::read(&self.module_path).await.map_err(|e| {
                    SandboxError::LoadModule {
                        path: self.module_path.display().to_string(),
                        reason: e.to_string(),
                    }
                })?;

                tracing::debug!(
                    module = %self.module_path.display(),
                    size_bytes = bytes.len(),
                    "compiling hashing module"
                );

                self.compile(bytes).await
            })
            .await
    }

    /// Compile raw module bytes (binary or text format) off the async threads.
    pub async fn compile(&self, bytes: Vec<u8>) -> Result<Module, SandboxError> {
        let engine = self.engine.clone();
        tokio::task::spawn_blocking(move || Module::new(&engine, &bytes))
            .await
            .map_err(|e| SandboxError::Compile(e.to_string()))?
            .map_err(|e| SandboxError::Compile(format!("{e:#}")))
    }
}
