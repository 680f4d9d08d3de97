//! One-call entry points for the common ways of running a command.

use tracing::error;

use crate::{
    command::Cmd,
    config::RunConfig,
    prelude::*,
    process::{Redirect, RunOptions},
    runner::RunHandle,
};

/// Run `cmd` to completion and return its exit code.
///
/// The child writes to the parent's stdout and stderr, or to the null device
/// with `suppress_output`. With `must_succeed` a non-zero exit code is turned
/// into [`Error::CommandFailed`].
///
/// # Examples
///
/// ```rust,no_run
/// let code = cmdpack::run_cmd_wait("make -j4", true, false, true).unwrap();
/// assert_eq!(code, 0);
/// ```
pub fn run_cmd_wait(
    cmd: impl Into<Cmd>,
    must_succeed: bool,
    suppress_output: bool,
    shell: bool,
) -> Result<i32> {
    let sink = || {
        if suppress_output {
            Redirect::Null
        } else {
            Redirect::Inherit
        }
    };
    let options = RunOptions::default()
        .stdout(sink())
        .stderr(sink())
        .shell(shell);

    let mut handle = RunHandle::spawn(cmd, options)?;
    let code = handle.get_exitcode(&RunConfig::default())?;
    if must_succeed && code != 0 {
        error!(command = handle.command(), code, "Command failed");
        return Err(Error::CommandFailed {
            command: handle.command().to_string(),
            code,
        });
    }
    Ok(code)
}

/// Run `cmd`, feeding every output item to `callback`, and return its exit
/// code.
pub fn run_command_callback<F>(cmd: impl Into<Cmd>, callback: F, options: RunOptions) -> Result<i32>
where
    F: FnMut(&str),
{
    let mut handle = RunHandle::spawn(cmd, options)?;
    handle.call_readback(callback)?;
    handle.get_exitcode(&RunConfig::default())
}

/// Start `cmd` and hand back its [`RunHandle`] for reading the output.
pub fn run_cmd_output(cmd: impl Into<Cmd>, options: RunOptions) -> Result<RunHandle> {
    RunHandle::spawn(cmd, options)
}
