//! CLI command definitions for the `wasihash` binary.
//!
//! Uses clap derive macros for argument parsing. Global flags override values
//! from the config file (`wasihash.toml` or `--config`).

pub mod hash;
pub mod resolve;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use clap_complete::Shell;
use wasihash_infra::config::{CONFIG_ENV, MODULE_ENV};
use wasihash_types::config::HasherConfig;

/// Hash files with a sandboxed WebAssembly module.
#[derive(Parser)]
#[command(name = "wasihash", version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Config file (defaults to ./wasihash.toml).
    #[arg(long, global = true, env = CONFIG_ENV)]
    pub config: Option<PathBuf>,

    /// Hashing module (.wasm or .wat), overriding the config file.
    #[arg(long, global = true, env = MODULE_ENV)]
    pub module: Option<PathBuf>,

    /// Give up on a request after this many milliseconds.
    #[arg(long, global = true)]
    pub timeout_ms: Option<u64>,

    /// Output machine-readable JSON instead of styled text.
    #[arg(long, global = true)]
    pub json: bool,

    /// Only log errors (digests and resolve output are still printed).
    #[arg(long, global = true)]
    pub quiet: bool,

    /// Detailed output (-v for verbose, -vv for debug/trace).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Export spans to stdout through OpenTelemetry.
    #[arg(long, global = true)]
    pub otel: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Hash one or more files, one after another.
    Hash {
        /// Files to hash (absolute, or relative to the working directory).
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },

    /// Show how a file would be mapped into the sandbox, without running it.
    Resolve {
        /// File to resolve.
        file: PathBuf,
    },

    /// Generate shell completions.
    Completions {
        /// Shell to generate completions for.
        shell: Shell,
    },
}

impl Cli {
    /// Tracing filter directives for the requested verbosity.
    pub fn filter_directives(&self) -> &'static str {
        match self.verbose {
            0 if self.quiet => "error",
            0 => "warn",
            1 => "info,wasihash_infra=debug,wasihash_core=debug",
            _ => "trace",
        }
    }

    /// Apply command-line overrides on top of the loaded config.
    pub fn apply_overrides(&self, config: &mut HasherConfig) {
        if let Some(module) = &self.module {
            config.module_path = module.clone();
        }
        if let Some(timeout_ms) = self.timeout_ms {
            config.timeout_ms = timeout_ms;
        }
    }
}
