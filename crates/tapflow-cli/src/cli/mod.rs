//! CLI command definitions and dispatch for the `tapflow` binary.
//!
//! Uses clap derive macros for argument parsing. Handlers return the process
//! exit code so a failed run can be distinguished from a rendering error.

pub mod list;
pub mod menu;
pub mod run;
pub mod validate;

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use clap_complete::Shell;

use tapflow_types::workflow::RunMode;

/// Drive on-screen workflows by matching template images and tapping them.
#[derive(Parser)]
#[command(name = "tapflow", version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to tapflow.toml (default: working directory, then the user
    /// config directory).
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Output machine-readable JSON instead of styled text.
    #[arg(long, global = true)]
    pub json: bool,

    /// Suppress all output except errors.
    #[arg(long, global = true)]
    pub quiet: bool,

    /// Detailed output (-v for verbose, -vv for debug/trace).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run a script (interactive picker when omitted).
    Run {
        /// Script file, relative to the scripts directory.
        script: Option<PathBuf>,

        /// One pass over the plan, or cycle until stopped.
        #[arg(long, value_enum)]
        mode: Option<ModeArg>,

        /// Save every captured frame as a PNG for offline inspection.
        #[arg(long)]
        debug: bool,
    },

    /// List discovered scripts.
    #[command(alias = "ls")]
    List,

    /// Parse and flatten a script without running it.
    Validate {
        /// Script file, relative to the scripts directory.
        script: PathBuf,
    },

    /// Generate shell completions.
    Completions {
        /// Target shell.
        #[arg(value_enum)]
        shell: Shell,
    },
}

/// `--mode` argument values.
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum ModeArg {
    /// Execute the plan once and exit.
    Once,
    /// Repeat the plan until stopped.
    Loop,
}

impl From<ModeArg> for RunMode {
    fn from(arg: ModeArg) -> Self {
        match arg {
            ModeArg::Once => RunMode::Once,
            ModeArg::Loop => RunMode::Loop,
        }
    }
}
