//! Forced termination of a process and its descendants.

use std::{
    io,
    process::{Command, Stdio},
};

use tracing::{debug, warn};

use crate::{pids::get_child_pids, prelude::*};

/// Forcefully kill a single process.
///
/// Uses `taskkill /F /PID` on Windows and `kill -9` elsewhere. A process that
/// is already gone makes the tool fail, which is reported but harmless.
pub fn kill_pid(pid: u32) -> io::Result<()> {
    if pid == 0 {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            "pid must be non-zero",
        ));
    }

    let mut command = kill_command(pid);
    let status = command
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()?;

    if !status.success() {
        return Err(io::Error::other(format!(
            "kill failed for pid {pid} ({status})"
        )));
    }
    Ok(())
}

#[cfg(windows)]
fn kill_command(pid: u32) -> Command {
    let mut command = Command::new("taskkill");
    command.args(["/F", "/PID", &pid.to_string()]);
    command
}

#[cfg(not(windows))]
fn kill_command(pid: u32) -> Command {
    let mut command = Command::new("sh");
    command.arg("-c").arg(format!("kill -9 {pid}"));
    command
}

/// Kill `pid` and every live descendant of it.
///
/// Descendants are listed before anything is killed, since children of a dead
/// process get reparented and can't be found anymore. A failing listing is
/// logged and the root is killed anyway; each kill failure is logged and
/// ignored. Returns the pids a kill was issued for, root first.
///
/// # Examples
///
/// ```rust,no_run
/// let handle = std::process::Command::new("sleep").arg("60").spawn().unwrap();
/// let killed = cmdpack::kill_tree(handle.id()).unwrap();
/// assert_eq!(killed[0], handle.id());
/// ```
pub fn kill_tree(pid: u32) -> Result<Vec<u32>> {
    let descendants = match get_child_pids(pid, true) {
        Ok(descendants) => descendants,
        Err(err @ Error::UnsupportedPlatform(_)) => return Err(err),
        Err(err) => {
            warn!(pid, error = %err, "Couldn't list descendants, killing the root only");
            Vec::new()
        }
    };

    let mut targets = Vec::with_capacity(descendants.len() + 1);
    targets.push(pid);
    targets.extend(descendants.into_iter().filter(|child| *child != pid));

    for target in &targets {
        match kill_pid(*target) {
            Ok(()) => debug!(pid = target, "Killed"),
            Err(err) => debug!(pid = target, error = %err, "Kill failed"),
        }
    }
    Ok(targets)
}
