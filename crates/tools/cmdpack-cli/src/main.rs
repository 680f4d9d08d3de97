//! cmdpack command-line tool
//!
//! Runs commands through the cmdpack library:
//!
//! - **run**: relay output while it arrives, killing the command tree once
//!   `--max-wait` passes
//! - **wait**: run with inherited output and return the exit code
//! - **pids**: list the descendants of a process
//! - **kill**: kill a process and its descendants
//!
//! The tool exits with the child's exit code. A child killed by a signal
//! exits with 128 plus the signal number, as shells report it.

mod cli;
mod commands;
mod logging;

use std::process::ExitCode;

use clap::Parser;
use cli::{Cli, Commands};
use tracing::error;

use crate::commands::{handle_kill, handle_pids, handle_run, handle_wait};

/// Shell-style exit status for an exit code.
fn exit_status_byte(code: i32) -> u8 {
    match code {
        0..=255 => code as u8,
        -127..=-1 => (128 - code) as u8,
        _ => 1,
    }
}

/// Main entry point for the cmdpack tool.
///
/// # Examples
///
/// ```bash
/// # Relay the output of a build, killing it after ten minutes
/// cmdpack run --stderr --max-wait 600 -- make -j8
///
/// # Run quietly and fail on a non-zero exit code
/// cmdpack wait --quiet --must-succeed -- "cargo fmt --check"
///
/// # Kill a runaway process tree
/// cmdpack kill 4242
/// ```
fn main() -> ExitCode {
    logging::init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Run { run } => handle_run(run),
        Commands::Wait {
            must_succeed,
            quiet,
            direct,
            command,
        } => handle_wait(command, must_succeed, quiet, direct),
        Commands::Pids { no_recursive, pid } => handle_pids(pid, !no_recursive),
        Commands::Kill { pid } => handle_kill(pid),
    };

    match result {
        Ok(code) => ExitCode::from(exit_status_byte(code)),
        Err(err) => {
            error!("Error: {:#}", err);
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_codes_map_to_status_bytes() {
        assert_eq!(exit_status_byte(0), 0);
        assert_eq!(exit_status_byte(3), 3);
        assert_eq!(exit_status_byte(-9), 137);
        assert_eq!(exit_status_byte(-15), 143);
        assert_eq!(exit_status_byte(256), 1);
        assert_eq!(exit_status_byte(-1000), 1);
    }
}
