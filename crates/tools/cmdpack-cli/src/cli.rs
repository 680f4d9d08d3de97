//! Command-line interface for cmdpack.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// Command-line interface for cmdpack.
#[derive(Parser, Debug)]
#[command(name = "cmdpack", version)]
#[command(about = "Run commands with bounded output reads and process-tree kill on timeout")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run a command and relay its output
    Run {
        #[command(flatten)]
        run: RunArgs,
    },

    /// Run a command with inherited output and return its exit code
    Wait {
        /// Fail if the command returns a non-zero exit code
        #[arg(long)]
        must_succeed: bool,

        /// Discard the command's output
        #[arg(short, long)]
        quiet: bool,

        /// Execute the program directly instead of through the shell
        #[arg(long)]
        direct: bool,

        /// Command line, or program followed by its arguments
        #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
        command: Vec<String>,
    },

    /// List the descendants of a process
    Pids {
        /// Only list direct children
        #[arg(long)]
        no_recursive: bool,

        /// Process id
        pid: u32,
    },

    /// Kill a process and all its descendants
    Kill {
        /// Process id
        pid: u32,
    },
}

/// Options of the `run` command.
#[derive(Args, Debug)]
pub struct RunArgs {
    /// Relay stderr as well
    #[arg(long)]
    pub stderr: bool,

    /// Discard stdout
    #[arg(long, conflicts_with = "output")]
    pub no_stdout: bool,

    /// Write stdout to this file instead of relaying it
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Relay output byte by byte instead of line by line
    #[arg(long)]
    pub raw: bool,

    /// Execute the program directly instead of through the shell
    #[arg(long)]
    pub direct: bool,

    /// Kill the command and its descendants after this many seconds
    #[arg(long, value_name = "SECS")]
    pub max_wait: Option<f64>,

    /// TOML file with run settings, overridden by --max-wait
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Command line, or program followed by its arguments
    #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
    pub command: Vec<String>,
}
