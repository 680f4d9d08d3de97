//! The handle bound to one running command and its output.

use std::{
    iter::FusedIterator,
    process::{Child, ExitStatus},
    sync::mpsc::{Receiver, RecvTimeoutError, Sender, channel},
    thread::{self, JoinHandle},
    time::{Duration, Instant},
};

use tracing::{debug, info, trace, warn};

use crate::{
    command::Cmd,
    config::RunConfig,
    decode::{Decoder, OutputMode},
    kill::kill_tree,
    prelude::*,
    process::{ProcessStatus, RunOptions, exit_code, get_process_status, spawn_process},
    pump::{PumpEvent, Stream, launch_stream_reader},
};

/// How often the process status is polled while waiting for it to exit.
pub const POLL_INTERVAL: Duration = Duration::from_millis(100);

enum Next {
    Item(String),
    Idle,
    Finished,
}

/// A running command.
///
/// Output of the piped streams is pumped by background threads into an
/// internal channel and handed out through [`RunHandle::get_lines`],
/// [`RunHandle::call_readback`] or iteration. [`RunHandle::get_exitcode`]
/// waits for the process, optionally killing its whole process tree once a
/// deadline passes.
///
/// # Dropping
///
/// Dropping a handle that was never finished does not wait for the command.
/// A child that is still running is killed right away, together with its
/// descendants, and then reaped. This holds for every redirect: a long
/// running command writing to a file stops at the drop and the file keeps
/// only what was written so far. Call [`RunHandle::get_exitcode`] before
/// dropping to let the command run to completion.
///
/// # Examples
///
/// ```rust,no_run
/// use cmdpack::{RunConfig, RunHandle, RunOptions};
///
/// let mut handle = RunHandle::spawn("printf '001\\n002\\n'", RunOptions::default()).unwrap();
/// for line in &mut handle {
///     println!("{}", line.unwrap());
/// }
/// assert_eq!(handle.get_exitcode(&RunConfig::default()).unwrap(), 0);
/// ```
#[derive(Debug)]
pub struct RunHandle {
    command: String,
    pid: u32,
    child: Child,
    events: Receiver<PumpEvent>,
    pumps: Vec<JoinHandle<()>>,
    stdout_ended: bool,
    stderr_ended: bool,
    mode: OutputMode,
    pending_error: Option<Error>,
    exit_code: Option<i32>,
    killed: bool,
}

impl RunHandle {
    /// Launch `cmd` and start one pump per piped stream.
    pub fn spawn(cmd: impl Into<Cmd>, options: RunOptions) -> Result<Self> {
        let cmd = cmd.into();
        let (mut child, decoder) = spawn_process(&cmd, options)?;
        let (tx, events) = channel();

        let pumps = match start_pumps(&mut child, &decoder, &tx) {
            Ok(pumps) => pumps,
            Err(err) => {
                warn!(command = %cmd, error = %err, "Couldn't start output pumps");
                let _ = child.kill();
                let _ = child.wait();
                return Err(err);
            }
        };
        let stdout_ended = !pumps.iter().any(|(stream, _)| *stream == Stream::Stdout);
        let stderr_ended = !pumps.iter().any(|(stream, _)| *stream == Stream::Stderr);

        let pid = child.id();
        info!(pid, command = %cmd, "Command started");

        Ok(Self {
            command: cmd.to_string(),
            pid,
            child,
            events,
            pumps: pumps.into_iter().map(|(_, pump)| pump).collect(),
            stdout_ended,
            stderr_ended,
            mode: decoder.mode(),
            pending_error: None,
            exit_code: None,
            killed: false,
        })
    }

    /// Process id of the child.
    pub fn pid(&self) -> u32 {
        self.pid
    }

    /// Command line the child was started with.
    pub fn command(&self) -> &str {
        &self.command
    }

    /// Whether this handle had to kill the child.
    pub fn was_killed(&self) -> bool {
        self.killed
    }

    /// How output is cut into items.
    pub fn mode(&self) -> OutputMode {
        self.mode
    }

    /// Returns `true` once every piped stream reached its end.
    pub fn output_ended(&self) -> bool {
        self.stdout_ended && self.stderr_ended
    }

    /// Returns `true` while the child process is alive.
    pub fn is_running(&mut self) -> bool {
        if self.exit_code.is_some() {
            return false;
        }
        matches!(
            get_process_status(&mut self.child),
            Ok(ProcessStatus::Running)
        )
    }

    /// Collect output items.
    ///
    /// Returns as soon as `min_lines` items were collected, `timeout` elapsed
    /// or the output ended. Running out of time is not an error, the items
    /// collected so far are returned. With `min_lines == 0` only the items
    /// already queued are returned, without waiting.
    pub fn get_lines(&mut self, timeout: Duration, min_lines: usize) -> Result<Vec<String>> {
        self.take_pending()?;
        let deadline = if min_lines == 0 {
            Some(Instant::now())
        } else {
            Instant::now().checked_add(timeout)
        };

        let mut lines = Vec::new();
        while min_lines == 0 || lines.len() < min_lines {
            match self.next_item(deadline) {
                Ok(Next::Item(line)) => lines.push(line),
                Ok(Next::Idle | Next::Finished) => break,
                Err(err) if lines.is_empty() => return Err(err),
                Err(err) => {
                    self.pending_error = Some(err);
                    break;
                }
            }
        }
        Ok(lines)
    }

    /// Feed every output item to `callback` until the output ends.
    ///
    /// Does not wait for the process to exit.
    pub fn call_readback<F>(&mut self, mut callback: F) -> Result<()>
    where
        F: FnMut(&str),
    {
        self.take_pending()?;
        while let Next::Item(line) = self.next_item(None)? {
            callback(&line);
        }
        Ok(())
    }

    /// Iterate over the output.
    ///
    /// Once the output ends the handle is finished as by
    /// [`RunHandle::get_exitcode`] without a deadline.
    pub fn lines(&mut self) -> Lines<'_> {
        Lines {
            handle: self,
            done: false,
        }
    }

    /// Wait for the child to exit and return its exit code.
    ///
    /// Queued output is discarded while waiting. If `config` carries a
    /// `max_wait_time` and the child is still running once it passed, the
    /// child and all its descendants are killed. The code is cached, later
    /// calls return it right away.
    pub fn get_exitcode(&mut self, config: &RunConfig) -> Result<i32> {
        if let Some(code) = self.exit_code {
            return Ok(code);
        }
        let deadline = config
            .max_wait_time
            .and_then(|max_wait| Instant::now().checked_add(max_wait));

        let status = self.wait_for_exit(deadline)?;
        self.join_pumps();

        let code = exit_code(status);
        self.exit_code = Some(code);
        info!(pid = self.pid, code, killed = self.killed, "Command finished");

        match self.pending_error.take() {
            Some(err) => Err(err),
            None => Ok(code),
        }
    }

    fn take_pending(&mut self) -> Result<()> {
        match self.pending_error.take() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn mark_ended(&mut self, stream: Stream) {
        match stream {
            Stream::Stdout => self.stdout_ended = true,
            Stream::Stderr => self.stderr_ended = true,
        }
    }

    /// Next output item, waiting until `deadline` (forever if `None`).
    fn next_item(&mut self, deadline: Option<Instant>) -> Result<Next> {
        loop {
            if self.output_ended() {
                return Ok(Next::Finished);
            }
            let wait = match deadline {
                Some(deadline) => deadline.saturating_duration_since(Instant::now()),
                None => POLL_INTERVAL,
            };
            match self.events.recv_timeout(wait) {
                Ok(PumpEvent::Output(_, text)) => return Ok(Next::Item(text)),
                Ok(PumpEvent::Failed(_, err)) => return Err(err),
                Ok(PumpEvent::Ended(stream)) => self.mark_ended(stream),
                Err(RecvTimeoutError::Timeout) if deadline.is_none() => continue,
                Err(RecvTimeoutError::Timeout) => return Ok(Next::Idle),
                Err(RecvTimeoutError::Disconnected) => {
                    self.stdout_ended = true;
                    self.stderr_ended = true;
                }
            }
        }
    }

    /// Discard output until `until`, keeping the first pump error.
    fn drain(&mut self, until: Instant) {
        loop {
            match self.next_item(Some(until)) {
                Ok(Next::Item(text)) => trace!(pid = self.pid, text = %text, "Discarded output"),
                Ok(Next::Idle) => return,
                Ok(Next::Finished) => {
                    thread::sleep(until.saturating_duration_since(Instant::now()));
                    return;
                }
                Err(err) => {
                    self.pending_error.get_or_insert(err);
                }
            }
        }
    }

    fn wait_for_exit(&mut self, deadline: Option<Instant>) -> Result<ExitStatus> {
        let mut status = None;
        let mut last_kill: Option<Instant> = None;

        loop {
            if status.is_none() {
                if let ProcessStatus::Done(exit_status) = get_process_status(&mut self.child)? {
                    debug!(pid = self.pid, %exit_status, "Process exited");
                    status = Some(exit_status);
                }
            }
            let overdue = deadline.is_some_and(|deadline| Instant::now() >= deadline);

            match status {
                Some(status) if self.output_ended() => return Ok(status),
                Some(status) if overdue => {
                    // A descendant outlived the child and still holds a pipe.
                    warn!(pid = self.pid, "Output still open after exit, abandoning pumps");
                    self.pumps.clear();
                    self.stdout_ended = true;
                    self.stderr_ended = true;
                    return Ok(status);
                }
                None if overdue && last_kill.is_none_or(|at| at.elapsed() >= POLL_INTERVAL) => {
                    self.kill();
                    last_kill = Some(Instant::now());
                }
                _ => {}
            }

            self.drain(Instant::now() + POLL_INTERVAL);
        }
    }

    fn kill(&mut self) {
        if !self.killed {
            warn!(pid = self.pid, command = %self.command, "Wait deadline passed, killing process tree");
        }
        self.killed = true;
        if let Err(err) = kill_tree(self.pid) {
            warn!(pid = self.pid, error = %err, "Couldn't kill process tree, killing the child only");
            if let Err(err) = self.child.kill() {
                debug!(pid = self.pid, error = %err, "Kill failed");
            }
        }
    }

    fn join_pumps(&mut self) {
        for pump in self.pumps.drain(..) {
            let name = pump.thread().name().unwrap_or("pump").to_string();
            if pump.join().is_err() {
                self.pending_error.get_or_insert(Error::ThreadJoin(name));
            }
        }
    }
}

impl Drop for RunHandle {
    fn drop(&mut self) {
        if self.exit_code.is_some() {
            return;
        }
        let config = RunConfig::with_max_wait(Duration::ZERO);
        if let Err(err) = self.get_exitcode(&config) {
            warn!(pid = self.pid, error = %err, "Cleanup on drop failed");
        }
    }
}

fn start_pumps(
    child: &mut Child,
    decoder: &Decoder,
    tx: &Sender<PumpEvent>,
) -> Result<Vec<(Stream, JoinHandle<()>)>> {
    let mut pumps = Vec::new();
    if let Some(stdout) = child.stdout.take() {
        let pump = launch_stream_reader(Stream::Stdout, stdout, decoder.clone(), tx.clone())?;
        pumps.push((Stream::Stdout, pump));
    }
    if let Some(stderr) = child.stderr.take() {
        let pump = launch_stream_reader(Stream::Stderr, stderr, decoder.clone(), tx.clone())?;
        pumps.push((Stream::Stderr, pump));
    }
    Ok(pumps)
}

/// Iterator over the output of a [`RunHandle`], see [`RunHandle::lines`].
#[derive(Debug)]
pub struct Lines<'a> {
    handle: &'a mut RunHandle,
    done: bool,
}

impl Iterator for Lines<'_> {
    type Item = Result<String>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        if let Err(err) = self.handle.take_pending() {
            return Some(Err(err));
        }
        match self.handle.next_item(None) {
            Ok(Next::Item(line)) => Some(Ok(line)),
            Ok(Next::Idle | Next::Finished) => {
                self.done = true;
                self.handle.get_exitcode(&RunConfig::default()).err().map(Err)
            }
            Err(err) => Some(Err(err)),
        }
    }
}

impl FusedIterator for Lines<'_> {}

impl<'a> IntoIterator for &'a mut RunHandle {
    type Item = Result<String>;
    type IntoIter = Lines<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.lines()
    }
}
