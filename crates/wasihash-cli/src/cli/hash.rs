//! `wasihash hash` command.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use console::style;
use serde::Serialize;
use wasihash_core::sandbox::SandboxDriver;
use wasihash_infra::hasher::FileHasher;

/// One hashed file, as printed by `--json`.
#[derive(Debug, Serialize)]
pub struct HashedFile {
    pub path: PathBuf,
    pub digest: String,
}

/// Hash a single file, attaching its path to any failure.
pub async fn hash_one<D: SandboxDriver + 'static>(
    hasher: &FileHasher<D>,
    file: &Path,
) -> Result<HashedFile> {
    let digest = hasher
        .hash_file(file)
        .await
        .with_context(|| format!("failed to hash {}", file.display()))?;
    tracing::info!(path = %file.display(), %digest, "hashed");
    Ok(HashedFile {
        path: file.to_path_buf(),
        digest,
    })
}

/// Hash `files` in order, stopping at the first failure.
pub async fn hash_all<D: SandboxDriver + 'static>(
    hasher: &FileHasher<D>,
    files: &[PathBuf],
) -> Result<Vec<HashedFile>> {
    let mut hashed = Vec::with_capacity(files.len());
    for file in files {
        hashed.push(hash_one(hasher, file).await?);
    }
    Ok(hashed)
}

/// Hash files and print `<hex>  <path>` lines (or a JSON array).
pub async fn hash_files<D: SandboxDriver + 'static>(
    hasher: &FileHasher<D>,
    files: &[PathBuf],
    json: bool,
) -> Result<()> {
    if json {
        let hashed = hash_all(hasher, files).await?;
        println!("{}", serde_json::to_string_pretty(&hashed)?);
        return Ok(());
    }

    // Printed as we go so earlier digests survive a later failure.
    for file in files {
        let hashed = hash_one(hasher, file).await?;
        println!("{}  {}", style(&hashed.digest).green(), hashed.path.display());
    }
    Ok(())
}
