//! Discovery of the live descendants of a process.
//!
//! There is no portable primitive for walking a process tree, so each host
//! family gets its own listing tool. The strategy is picked once per process
//! from the host OS and reused for every lookup.

use std::{
    convert::Infallible,
    process::{Command, Stdio},
    sync::OnceLock,
};

use tracing::{debug, trace};

use crate::prelude::*;

/// Host operating system families with different process models.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostOs {
    /// Native Windows.
    Windows,
    /// Cygwin POSIX emulation on Windows.
    Cygwin,
    /// Linux and Android.
    Linux,
    /// macOS and the BSDs.
    Darwin,
    /// Anything else, by `std::env::consts::OS` name.
    Other(String),
}

impl HostOs {
    /// Classify an OS name as reported by `std::env::consts::OS`.
    pub fn from_os_name(name: &str) -> Self {
        match name {
            "windows" => HostOs::Windows,
            "cygwin" => HostOs::Cygwin,
            "linux" | "android" => HostOs::Linux,
            "macos" | "ios" | "freebsd" | "openbsd" | "netbsd" | "dragonfly" => HostOs::Darwin,
            other => HostOs::Other(String::from(other)),
        }
    }

    /// The OS this process runs on.
    pub fn current() -> &'static HostOs {
        static HOST: OnceLock<HostOs> = OnceLock::new();
        HOST.get_or_init(|| HostOs::from_os_name(std::env::consts::OS))
    }

    /// Name of the OS family.
    pub fn name(&self) -> &str {
        match self {
            HostOs::Windows => "windows",
            HostOs::Cygwin => "cygwin",
            HostOs::Linux => "linux",
            HostOs::Darwin => "darwin",
            HostOs::Other(name) => name,
        }
    }
}

/// How child processes are listed on a host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Enumerator {
    /// One `wmic` query per parent pid.
    Wmic,
    /// A `ps` snapshot whose first two columns are pid and parent pid.
    ProcessTable {
        /// Listing tool.
        program: &'static str,
        /// Arguments producing pid and ppid as the leading columns.
        args: &'static [&'static str],
    },
}

impl Enumerator {
    /// Strategy for `host`.
    pub fn for_host(host: &HostOs) -> Result<Self> {
        match host {
            HostOs::Windows => Ok(Enumerator::Wmic),
            HostOs::Cygwin => Ok(Enumerator::ProcessTable {
                program: "ps",
                args: &["-W"],
            }),
            HostOs::Linux => Ok(Enumerator::ProcessTable {
                program: "ps",
                args: &["-e", "-O", "ppid"],
            }),
            HostOs::Darwin => Ok(Enumerator::ProcessTable {
                program: "ps",
                args: &["-A", "-O", "ppid"],
            }),
            HostOs::Other(name) => Err(Error::UnsupportedPlatform(name.clone())),
        }
    }

    /// Strategy for the current host, selected on first use.
    pub fn current() -> Result<Self> {
        static CURRENT: OnceLock<Option<Enumerator>> = OnceLock::new();
        let host = HostOs::current();
        CURRENT
            .get_or_init(|| Enumerator::for_host(host).ok())
            .ok_or_else(|| Error::UnsupportedPlatform(String::from(host.name())))
    }

    /// Pids of the live children of `pid`, and of their children if `recursive`.
    pub fn descendants(self, pid: u32, recursive: bool) -> Result<Vec<u32>> {
        let found = match self {
            Enumerator::Wmic => walk_descendants(pid, recursive, wmic_children)?,
            Enumerator::ProcessTable { program, args } => {
                let table = parse_process_table(&list_processes(program, args)?);
                descendants_from_table(&table, pid, recursive)
            }
        };
        debug!(pid, children = ?found, "Enumerated child processes");
        Ok(found)
    }
}

/// Return every live descendant of `pid` (only direct children unless `recursive`).
///
/// # Examples
///
/// ```rust,no_run
/// let children = cmdpack::get_child_pids(std::process::id(), true).unwrap();
/// println!("{children:?}");
/// ```
pub fn get_child_pids(pid: u32, recursive: bool) -> Result<Vec<u32>> {
    Enumerator::current()?.descendants(pid, recursive)
}

fn list_processes(program: &str, args: &[&str]) -> Result<String> {
    trace!(program, ?args, "Listing processes");
    let output = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stderr(Stdio::null())
        .output()
        .map_err(|err| Error::Enumerate(format!("{program}: {err}")))?;
    if !output.status.success() {
        return Err(Error::Enumerate(format!(
            "{program} exited with {}",
            output.status
        )));
    }
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

fn wmic_children(parent: u32) -> Result<Vec<u32>> {
    let filter = format!("(ParentProcessId={parent})");
    let output = list_processes("wmic", &["process", "where", &filter, "get", "ProcessId"])?;
    Ok(parse_wmic_pids(&output))
}

/// Walk the tree below `root`, asking `children_of` for the children of each
/// visited pid.
///
/// The root and pids already found are never reported again, so cycles in a
/// garbled listing end the walk instead of looping or listing the root as its
/// own descendant.
fn walk_descendants<E, F>(
    root: u32,
    recursive: bool,
    mut children_of: F,
) -> core::result::Result<Vec<u32>, E>
where
    F: FnMut(u32) -> core::result::Result<Vec<u32>, E>,
{
    let mut found = Vec::new();
    let mut pending = vec![root];
    while let Some(parent) = pending.pop() {
        for child in children_of(parent)? {
            if child == root || found.contains(&child) {
                continue;
            }
            found.push(child);
            if recursive {
                pending.push(child);
            }
        }
    }
    Ok(found)
}

/// Descendants of `root` in a `(pid, ppid)` snapshot.
pub fn descendants_from_table(table: &[(u32, u32)], root: u32, recursive: bool) -> Vec<u32> {
    let children_of = |parent: u32| -> core::result::Result<Vec<u32>, Infallible> {
        Ok(table
            .iter()
            .filter(|(_, ppid)| *ppid == parent)
            .map(|(pid, _)| *pid)
            .collect())
    };
    match walk_descendants(root, recursive, children_of) {
        Ok(found) => found,
        Err(never) => match never {},
    }
}

/// Parse `(pid, ppid)` rows out of a `ps` listing.
///
/// Rows whose first two columns are not both numbers (headers, truncated or
/// garbled lines) are skipped.
pub fn parse_process_table(output: &str) -> Vec<(u32, u32)> {
    output
        .lines()
        .filter_map(|line| {
            let mut columns = line.split_whitespace();
            let pid = columns.next()?.parse().ok()?;
            let ppid = columns.next()?.parse().ok()?;
            Some((pid, ppid))
        })
        .collect()
}

/// Parse the pid column of `wmic ... get ProcessId`.
pub fn parse_wmic_pids(output: &str) -> Vec<u32> {
    output
        .lines()
        .filter_map(|line| line.trim().parse().ok())
        .collect()
}
