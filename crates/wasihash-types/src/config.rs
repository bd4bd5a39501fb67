//! Hasher configuration types.
//!
//! `HasherConfig` represents `wasihash.toml`: where the sandboxed module lives,
//! which directories are mounted, and the limits applied to each request.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Top-level configuration for the file hasher.
///
/// All fields have defaults, so an empty file is a valid config.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HasherConfig {
    /// Location of the compiled WASI module.
    #[serde(default = "default_module_path")]
    pub module_path: PathBuf,

    /// Directory for temp output files, mounted as the output root.
    /// Defaults to the module's own directory.
    #[serde(default)]
    pub module_dir: Option<PathBuf>,

    /// Directory relative inputs are resolved against. Filled from the
    /// process working directory by the binary when absent.
    #[serde(default)]
    pub workdir: Option<PathBuf>,

    /// Guest root name for the input directory.
    #[serde(default = "default_input_mount")]
    pub input_mount: String,

    /// Guest root name for the output directory.
    #[serde(default = "default_output_mount")]
    pub output_mount: String,

    /// Upper bound on how long a request waits for the digest.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Fuel granted to each sandbox instance.
    #[serde(default = "default_max_fuel")]
    pub max_fuel: u64,

    /// Fuel consumed between cooperative yields back to the runtime.
    #[serde(default = "default_fuel_yield_interval")]
    pub fuel_yield_interval: u64,

    /// Linear memory cap per sandbox instance.
    #[serde(default = "default_max_memory_bytes")]
    pub max_memory_bytes: usize,
}

fn default_module_path() -> PathBuf {
    PathBuf::from("blake3.wasm")
}

fn default_input_mount() -> String {
    "/input".to_string()
}

fn default_output_mount() -> String {
    "/output".to_string()
}

fn default_timeout_ms() -> u64 {
    30_000
}

fn default_max_fuel() -> u64 {
    i64::MAX as u64
}

fn default_fuel_yield_interval() -> u64 {
    1_000_000
}

fn default_max_memory_bytes() -> usize {
    256 * 1024 * 1024 // 256 MB
}

impl Default for HasherConfig {
    fn default() -> Self {
        Self {
            module_path: default_module_path(),
            module_dir: None,
            workdir: None,
            input_mount: default_input_mount(),
            output_mount: default_output_mount(),
            timeout_ms: default_timeout_ms(),
            max_fuel: default_max_fuel(),
            fuel_yield_interval: default_fuel_yield_interval(),
            max_memory_bytes: default_max_memory_bytes(),
        }
    }
}

impl HasherConfig {
    /// Directory temp files are created in: `module_dir`, else the module's parent.
    pub fn effective_module_dir(&self) -> PathBuf {
        if let Some(dir) = &self.module_dir {
            return dir.clone();
        }
        match self.module_path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        }
    }

    /// Working directory for relative inputs, falling back to `fallback`.
    pub fn effective_workdir(&self, fallback: &Path) -> PathBuf {
        self.workdir
            .clone()
            .unwrap_or_else(|| fallback.to_path_buf())
    }
}
