//! Command handlers for cmdpack.

use std::{
    io::{self, Write},
    time::{Duration, Instant},
};

use anyhow::Context;
use cmdpack::{
    Cmd, OutputMode, Redirect, RunConfig, RunOptions, get_child_pids, kill_tree,
    run_cmd_output, run_cmd_wait, runner::POLL_INTERVAL,
};
use tracing::{info, warn};

use crate::cli::RunArgs;

/// Largest batch relayed at once.
const RELAY_BATCH: usize = 64;

/// A single word is a command line for the shell, more words are an argument list.
pub fn to_cmd(words: Vec<String>) -> Cmd {
    match <[String; 1]>::try_from(words) {
        Ok([line]) => Cmd::Line(line),
        Err(words) => Cmd::Args(words),
    }
}

/// Run a command, relaying its output to stdout until it ends or the
/// deadline passes.
pub fn handle_run(args: RunArgs) -> anyhow::Result<i32> {
    let mut config = match &args.config {
        Some(path) => RunConfig::from_file(path)
            .with_context(|| format!("Couldn't load run settings from {}", path.display()))?,
        None => RunConfig::default(),
    };
    if let Some(seconds) = args.max_wait {
        let max_wait = Duration::try_from_secs_f64(seconds)
            .with_context(|| format!("Invalid --max-wait value {seconds}"))?;
        config.max_wait_time = Some(max_wait);
    }

    let mode = if args.raw {
        OutputMode::Raw
    } else {
        OutputMode::Lines
    };
    let stdout = match args.output {
        Some(path) => Redirect::File(path),
        None => Redirect::from(!args.no_stdout),
    };
    let options = RunOptions::default()
        .stdout(stdout)
        .stderr(args.stderr)
        .shell(!args.direct)
        .mode(mode);

    let mut handle = run_cmd_output(to_cmd(args.command), options)?;
    let start = Instant::now();
    let mut out = io::stdout().lock();

    while !handle.output_ended() {
        if config
            .max_wait_time
            .is_some_and(|max_wait| start.elapsed() >= max_wait)
        {
            break;
        }
        let batch = handle.get_lines(POLL_INTERVAL, RELAY_BATCH)?;
        relay(&mut out, &batch, mode)?;
    }

    let remaining = RunConfig {
        max_wait_time: config
            .max_wait_time
            .map(|max_wait| max_wait.saturating_sub(start.elapsed())),
    };
    let code = handle.get_exitcode(&remaining)?;
    if handle.was_killed() {
        warn!(command = handle.command(), "Command killed after exceeding its time budget");
    }
    info!(command = handle.command(), code, "Command done");
    Ok(code)
}

fn relay(out: &mut impl Write, items: &[String], mode: OutputMode) -> io::Result<()> {
    for item in items {
        match mode {
            OutputMode::Lines => writeln!(out, "{item}")?,
            OutputMode::Raw => write!(out, "{item}")?,
        }
    }
    out.flush()
}

/// Run a command with inherited (or discarded) output and wait for it.
pub fn handle_wait(
    command: Vec<String>,
    must_succeed: bool,
    quiet: bool,
    direct: bool,
) -> anyhow::Result<i32> {
    Ok(run_cmd_wait(to_cmd(command), must_succeed, quiet, !direct)?)
}

/// Print the descendants of `pid`, one per line.
pub fn handle_pids(pid: u32, recursive: bool) -> anyhow::Result<i32> {
    let children = get_child_pids(pid, recursive)?;
    let mut out = io::stdout().lock();
    for child in children {
        writeln!(out, "{child}")?;
    }
    Ok(0)
}

/// Kill `pid` and its descendants, printing every pid a kill was sent to.
pub fn handle_kill(pid: u32) -> anyhow::Result<i32> {
    let killed = kill_tree(pid)?;
    let mut out = io::stdout().lock();
    for target in killed {
        writeln!(out, "{target}")?;
    }
    Ok(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_word_is_a_command_line() {
        assert_eq!(
            to_cmd(vec![String::from("echo a | wc -l")]),
            Cmd::Line(String::from("echo a | wc -l"))
        );
        assert_eq!(
            to_cmd(vec![String::from("ls"), String::from("-la")]),
            Cmd::Args(vec![String::from("ls"), String::from("-la")])
        );
    }

    #[test]
    fn relay_keeps_raw_items_unterminated() {
        let items = vec![String::from("a"), String::from("b")];

        let mut lines = Vec::new();
        relay(&mut lines, &items, OutputMode::Lines).unwrap();
        assert_eq!(lines, b"a\nb\n");

        let mut raw = Vec::new();
        relay(&mut raw, &items, OutputMode::Raw).unwrap();
        assert_eq!(raw, b"ab");
    }
}
