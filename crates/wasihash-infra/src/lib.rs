//! Infrastructure layer for wasihash.
//!
//! Implements the sandbox driver defined in `wasihash-core` on top of
//! Wasmtime + WASI preview1, the notify-based output channel watcher, the
//! TOML config loader, and the [`hasher::FileHasher`] that ties them together.

pub mod config;
pub mod hasher;
pub mod sandbox;
pub mod watcher;

#[cfg(test)]
mod test_support;

use std::path::{Path, PathBuf};

use tokio::sync::OnceCell;
use wasihash_types::error::HashError;

use hasher::FileHasher;
use sandbox::WasmSandboxDriver;

static DEFAULT_HASHER: OnceCell<FileHasher<WasmSandboxDriver>> = OnceCell::const_new();

/// Hash `path` with a process-wide hasher built from the environment.
///
/// The hasher is created on first call from [`config::load_config_from_env`],
/// using the current directory as the working directory unless the config
/// pins one. Later calls reuse it, so the module is compiled once per process.
pub async fn hash_file(path: impl AsRef<Path>) -> Result<String, HashError> {
    let hasher = DEFAULT_HASHER
        .get_or_try_init(|| async {
            let config = config::load_config_from_env().await;
            let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
            FileHasher::from_config(&config, &cwd)
        })
        .await?;

    hasher.hash_file(path).await
}
