//! `wasihash resolve` command: dry run of the path virtualization.

use std::path::Path;

use anyhow::Result;
use console::style;
use wasihash_core::resolver::PathResolver;

/// Resolve `file` and print the mount table and sandbox paths.
///
/// Nothing is created on disk and no module is loaded.
pub fn resolve(resolver: &PathResolver, file: &Path, json: bool) -> Result<()> {
    let config = resolver.resolve(file)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&config)?);
        return Ok(());
    }

    println!();
    println!(
        "  {} {}",
        style("Resolved").bold(),
        style(config.source_path.display()).cyan()
    );
    println!();
    println!("  Input:      {}", config.virtual_input_path);
    println!("  Output:     {}", config.virtual_output_path);
    println!("  Temp file:  {}", style(config.temp_file_path.display()).dim());
    println!();
    println!("  {}", style("── Mounts ──").dim());
    for mount in config.mount_table.iter() {
        println!("  {:<10}  {}", mount.guest, mount.host.display());
    }
    println!();

    Ok(())
}
