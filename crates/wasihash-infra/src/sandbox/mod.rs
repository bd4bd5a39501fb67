//! Sandbox execution: Wasmtime runtime and the WASI preview1 driver.

pub mod wasm_driver;
pub mod wasm_runtime;

pub use wasm_driver::WasmSandboxDriver;
pub use wasm_runtime::{SandboxLimits, WasmRuntime};
