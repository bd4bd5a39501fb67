//! WASI preview1 sandbox driver using Wasmtime.
//!
//! Every request gets a fresh [`Store`] whose WASI context exposes only the
//! request's mount table (as preopened directories) and the two positional
//! arguments `[virtual_input, virtual_output]`. Fuel bounds CPU and a
//! [`ResourceLimiter`] caps memory growth.

use std::sync::Arc;
use std::time::Instant;

use uuid::Uuid;
use wasihash_core::sandbox::{SandboxDriver, SandboxRun};
use wasihash_types::error::SandboxError;
use wasihash_types::request::VirtualConfig;
use wasmtime::{Linker, ResourceLimiter, Store};
use wasmtime_wasi::p1::{self, WasiP1Ctx};
use wasmtime_wasi::{DirPerms, FilePerms, I32Exit, WasiCtxBuilder};

use super::wasm_runtime::WasmRuntime;

// ---------------------------------------------------------------------------
// HashState -- per-request Store data
// ---------------------------------------------------------------------------

/// Data attached to each Wasmtime [`Store`] for a single hashing request.
struct HashState {
    wasi: WasiP1Ctx,
    request_id: Uuid,
    max_memory_bytes: usize,
}

impl ResourceLimiter for HashState {
    fn memory_growing(
        &mut self,
        current: usize,
        desired: usize,
        _maximum: Option<usize>,
    ) -> anyhow::Result<bool> {
        if desired > self.max_memory_bytes {
            tracing::warn!(
                request_id = %self.request_id,
                current_bytes = current,
                desired_bytes = desired,
                limit_bytes = self.max_memory_bytes,
                "memory growth denied by ResourceLimiter"
            );
            Ok(false)
        } else {
            Ok(true)
        }
    }

    fn table_growing(
        &mut self,
        _current: usize,
        desired: usize,
        _maximum: Option<usize>,
    ) -> anyhow::Result<bool> {
        // Cap table entries at 1000 to limit resource abuse.
        Ok(desired <= 1000)
    }
}

/// Build the WASI context for one request: args plus one preopen per mount.
fn build_wasi_ctx(config: &VirtualConfig) -> Result<WasiP1Ctx, SandboxError> {
    let mut builder = WasiCtxBuilder::new();
    builder.args(&config.module_args()).inherit_stderr();

    for mount in config.mount_table.iter() {
        builder
            .preopened_dir(&mount.host, &mount.guest, DirPerms::all(), FilePerms::all())
            .map_err(|e| SandboxError::Mount {
                guest: mount.guest.clone(),
                host: mount.host.display().to_string(),
                reason: format!("{e:#}"),
            })?;
    }

    Ok(builder.build_p1())
}

// ---------------------------------------------------------------------------
// WasmSandboxDriver
// ---------------------------------------------------------------------------

/// Runs the hashing module in a Wasmtime WASI preview1 sandbox.
///
/// Holds an `Arc<WasmRuntime>` so the engine and compiled module are shared
/// across requests without sharing any mutable state.
pub struct WasmSandboxDriver {
    runtime: Arc<WasmRuntime>,
}

impl WasmSandboxDriver {
    pub fn new(runtime: Arc<WasmRuntime>) -> Self {
        Self { runtime }
    }

    pub fn runtime(&self) -> &Arc<WasmRuntime> {
        &self.runtime
    }
}

impl SandboxDriver for WasmSandboxDriver {
    /// Run the module for one request.
    ///
    /// 1. Compiled module fetched from the runtime cache
    /// 2. Linker configured with WASI preview1 imports
    /// 3. Fresh Store with the request's mounts, args, fuel and memory cap
    /// 4. Module instantiated and `_start` called
    ///
    /// A WASI `proc_exit(0)` counts as success.
    async fn run(&self, config: &VirtualConfig) -> Result<SandboxRun, SandboxError> {
        let start = Instant::now();
        let limits = self.runtime.limits();

        let module = self.runtime.module().await?;
        let engine = self.runtime.engine();

        let mut linker: Linker<HashState> = Linker::new(engine);
        p1::add_to_linker_async(&mut linker, |state: &mut HashState| &mut state.wasi)
            .map_err(|e| SandboxError::Link(format!("{e:#}")))?;

        let state = HashState {
            wasi: build_wasi_ctx(config)?,
            request_id: config.temp_id,
            max_memory_bytes: limits.max_memory_bytes,
        };

        let mut store = Store::new(engine, state);
        store
            .set_fuel(limits.max_fuel)
            .map_err(|e| SandboxError::Instantiate(format!("failed to set fuel: {e:#}")))?;
        store
            .fuel_async_yield_interval(Some(limits.fuel_yield_interval))
            .map_err(|e| SandboxError::Instantiate(format!("failed to set yield interval: {e:#}")))?;
        store.limiter(|state| state);

        let instance = linker
            .instantiate_async(&mut store, module)
            .await
            .map_err(|e| SandboxError::Instantiate(format!("{e:#}")))?;

        let entry = instance
            .get_typed_func::<(), ()>(&mut store, "_start")
            .map_err(|e| SandboxError::Instantiate(format!("missing `_start` entry point: {e:#}")))?;

        tracing::debug!(
            request_id = %config.temp_id,
            input = %config.virtual_input_path,
            output = %config.virtual_output_path,
            "starting sandboxed module"
        );

        if let Err(err) = entry.call_async(&mut store, ()).await {
            match err.downcast_ref::<I32Exit>() {
                Some(I32Exit(0)) => {}
                Some(I32Exit(code)) => return Err(SandboxError::Exit(*code)),
                None => return Err(SandboxError::Trap(format!("{err:#}"))),
            }
        }

        let fuel_remaining = store.get_fuel().unwrap_or(0);
        Ok(SandboxRun {
            fuel_consumed: Some(limits.max_fuel.saturating_sub(fuel_remaining)),
            duration: start.elapsed(),
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
