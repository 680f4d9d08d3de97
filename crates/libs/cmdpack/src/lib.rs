//! Subprocess execution with non-blocking output reads.
//!
//! Starts external commands, pumps their stdout and stderr from background
//! threads and hands the output out as lines (or single bytes) through reads
//! that never block longer than the caller asked for. A command overrunning
//! its time budget is killed together with all its descendants.
//!
//! # Usage
//!
//! ```rust,no_run
//! use std::time::Duration;
//!
//! use cmdpack::{RunConfig, RunOptions, run_cmd_output};
//!
//! // Capture both streams of a shell command
//! let mut handle = run_cmd_output("make all", RunOptions::default().stderr(true)).unwrap();
//!
//! // Poll for output without blocking for more than a second at a time
//! while !handle.output_ended() {
//!     for line in handle.get_lines(Duration::from_secs(1), 10).unwrap() {
//!         println!("Output: {}", line);
//!     }
//! }
//!
//! // Give the command at most 30 seconds to exit before killing its tree
//! let config = RunConfig::with_max_wait(Duration::from_secs(30));
//! let code = handle.get_exitcode(&config).unwrap();
//! println!("Exit code: {}", code);
//! ```

pub mod command;
pub mod config;
pub mod decode;
pub mod error;
pub mod kill;
pub mod pids;
pub mod prelude;
pub mod process;
pub mod pump;
pub mod run;
pub mod runner;

pub use command::Cmd;
pub use config::RunConfig;
pub use decode::{Encoding, OutputMode};
pub use kill::kill_tree;
pub use pids::get_child_pids;
pub use prelude::{Error, Result};
pub use process::{Redirect, RunOptions};
pub use run::{run_cmd_output, run_cmd_wait, run_command_callback};
pub use runner::{Lines, RunHandle};
