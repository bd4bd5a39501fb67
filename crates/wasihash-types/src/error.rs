use std::path::PathBuf;

use thiserror::Error;

/// Errors surfaced to callers of a hashing request.
#[derive(Debug, Error)]
pub enum HashError {
    #[error("file '{}' does not exist in '{}'", path.display(), workdir.display())]
    FileNotFound { path: PathBuf, workdir: PathBuf },

    #[error(transparent)]
    Watch(#[from] WatchError),

    #[error(transparent)]
    Sandbox(#[from] SandboxError),

    #[error("no digest was written within {timeout_ms} ms")]
    Timeout { timeout_ms: u64 },

    #[error("request was dropped before it settled")]
    Cancelled,
}

/// Errors from the output channel watcher.
#[derive(Debug, Error)]
pub enum WatchError {
    #[error("failed to create output file '{path}': {reason}")]
    CreateFile { path: String, reason: String },

    #[error("failed to watch '{path}': {reason}")]
    Watch { path: String, reason: String },

    #[error("failed to read output file '{path}': {reason}")]
    Read { path: String, reason: String },
}

/// Errors from compiling, instantiating or running the sandboxed module.
#[derive(Debug, Error)]
pub enum SandboxError {
    #[error("failed to create wasm engine: {0}")]
    Engine(String),

    #[error("failed to load module '{path}': {reason}")]
    LoadModule { path: String, reason: String },

    #[error("module compilation failed: {0}")]
    Compile(String),

    #[error("failed to link WASI imports: {0}")]
    Link(String),

    #[error("mount '{guest}' -> '{host}' is unavailable: {reason}")]
    Mount {
        guest: String,
        host: String,
        reason: String,
    },

    #[error("module instantiation failed: {0}")]
    Instantiate(String),

    #[error("module exited with status {0}")]
    Exit(i32),

    #[error("module trapped: {0}")]
    Trap(String),
}

/// Teardown failures. Logged by the watcher, never returned to callers.
#[derive(Debug, Error)]
pub enum CleanupError {
    #[error("failed to remove temporary file '{path}': {reason}")]
    RemoveTempFile { path: String, reason: String },

    #[error("failed to close watch on '{path}': {reason}")]
    CloseWatch { path: String, reason: String },
}
