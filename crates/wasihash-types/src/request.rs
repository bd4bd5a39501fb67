//! Per-request virtualization config.
//!
//! A [`VirtualConfig`] is produced by the path resolver for every hashing
//! request. It is never reused: each request gets its own temp identifier and
//! therefore its own output file.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::mount::MountTable;

/// Everything the watcher and the sandbox driver need for one request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VirtualConfig {
    /// Path exactly as supplied by the caller.
    pub source_path: PathBuf,
    pub is_absolute: bool,
    /// Host directory mounted as the input root.
    pub workdir: PathBuf,
    /// Random token naming this request's output file.
    pub temp_id: Uuid,
    /// Host location the sandbox's output resolves to.
    pub temp_file_path: PathBuf,
    /// Input path as seen inside the sandbox.
    pub virtual_input_path: String,
    /// Output path as seen inside the sandbox.
    pub virtual_output_path: String,
    pub mount_table: MountTable,
}

impl VirtualConfig {
    /// Command-line-style arguments handed to the sandboxed module.
    pub fn module_args(&self) -> [&str; 2] {
        [&self.virtual_input_path, &self.virtual_output_path]
    }

    /// Host path of the file being hashed.
    pub fn host_input_path(&self) -> PathBuf {
        if self.is_absolute {
            self.source_path.clone()
        } else {
            self.workdir.join(&self.source_path)
        }
    }
}
