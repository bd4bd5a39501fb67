//! wasihash CLI entry point.
//!
//! Binary name: `wasihash`
//!
//! Parses CLI arguments, sets up tracing, loads the config file, applies flag
//! overrides, then dispatches to the command handler.

mod cli;

use std::path::PathBuf;

use clap::Parser;
use clap_complete::generate;
use wasihash_core::resolver::PathResolver;
use wasihash_infra::config::{DEFAULT_CONFIG_FILE, load_config};
use wasihash_infra::hasher::FileHasher;
use wasihash_observe::tracing_setup::{init_tracing, shutdown_tracing};

use cli::{Cli, Commands};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Shell completions need neither tracing nor config
    if let Commands::Completions { shell } = &cli.command {
        let mut cmd = <Cli as clap::CommandFactory>::command();
        generate(*shell, &mut cmd, "wasihash", &mut std::io::stdout());
        return Ok(());
    }

    init_tracing(cli.filter_directives(), cli.otel).map_err(|e| anyhow::anyhow!(e))?;

    let result = run(cli).await;
    shutdown_tracing();
    result
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config_path = cli
        .config
        .clone()
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));
    let mut config = load_config(&config_path).await;
    cli.apply_overrides(&mut config);

    let cwd = std::env::current_dir()?;
    tracing::debug!(
        module = %config.module_path.display(),
        workdir = %config.effective_workdir(&cwd).display(),
        module_dir = %config.effective_module_dir().display(),
        timeout_ms = config.timeout_ms,
        "configuration loaded"
    );

    match cli.command {
        Commands::Hash { files } => {
            let hasher = FileHasher::from_config(&config, &cwd)?;
            cli::hash::hash_files(&hasher, &files, cli.json).await?;
        }

        Commands::Resolve { file } => {
            let resolver = PathResolver::from_config(&config, &cwd);
            cli::resolve::resolve(&resolver, &file, cli.json)?;
        }

        Commands::Completions { .. } => unreachable!("handled above"),
    }

    Ok(())
}
