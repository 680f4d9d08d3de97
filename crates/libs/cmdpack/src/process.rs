//! Low-level process launch and status utilities.

use std::{
    collections::HashMap,
    ffi::OsString,
    fs::File,
    io,
    path::{Path, PathBuf},
    process::{Child, Command, ExitStatus, Stdio},
};

use tracing::debug;

use crate::{
    command::{Cmd, ShellFlavor},
    decode::{DEFAULT_ENCODINGS, Decoder, Encoding, OutputMode},
    prelude::*,
};

/// Where a child output stream goes.
#[derive(Debug)]
pub enum Redirect {
    /// Capture through a pipe read by a pump thread.
    Pipe,
    /// Discard to the null device.
    Null,
    /// Share the parent's stream.
    Inherit,
    /// Create or truncate the file at this path and write to it.
    File(PathBuf),
    /// Write to an already open file.
    Handle(File),
}

impl Redirect {
    /// Returns `true` if the stream is captured.
    pub fn is_pipe(&self) -> bool {
        matches!(self, Redirect::Pipe)
    }

    fn into_stdio(self) -> io::Result<Stdio> {
        Ok(match self {
            Redirect::Pipe => Stdio::piped(),
            Redirect::Null => Stdio::null(),
            Redirect::Inherit => Stdio::inherit(),
            Redirect::File(path) => Stdio::from(File::create(path)?),
            Redirect::Handle(file) => Stdio::from(file),
        })
    }
}

impl From<bool> for Redirect {
    fn from(capture: bool) -> Self {
        if capture {
            Redirect::Pipe
        } else {
            Redirect::Null
        }
    }
}

impl From<PathBuf> for Redirect {
    fn from(path: PathBuf) -> Self {
        Redirect::File(path)
    }
}

impl From<&Path> for Redirect {
    fn from(path: &Path) -> Self {
        Redirect::File(path.to_path_buf())
    }
}

impl From<File> for Redirect {
    fn from(file: File) -> Self {
        Redirect::Handle(file)
    }
}

/// Options for launching a command.
///
/// The defaults capture stdout, discard stderr, run through the shell with a
/// copy of the current environment and decode output line by line.
///
/// # Examples
///
/// ```rust
/// use cmdpack::{OutputMode, RunOptions};
///
/// let options = RunOptions::default()
///     .stderr(true)
///     .shell(false)
///     .env_var("LC_ALL", "C")
///     .mode(OutputMode::Raw);
/// assert!(options.stderr.is_pipe());
/// ```
#[derive(Debug)]
pub struct RunOptions {
    /// Stdout target.
    pub stdout: Redirect,
    /// Stderr target.
    pub stderr: Redirect,
    /// Run the command line through `sh -c` / `cmd /C`.
    pub shell: bool,
    /// Complete environment of the child. `None` inherits the current one.
    pub env: Option<HashMap<OsString, OsString>>,
    /// Working directory of the child. `None` keeps the current one.
    pub cwd: Option<PathBuf>,
    /// How output is cut into items.
    pub mode: OutputMode,
    /// Encodings tried in order when decoding output.
    pub encodings: Vec<Encoding>,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            stdout: Redirect::Pipe,
            stderr: Redirect::Null,
            shell: true,
            env: None,
            cwd: None,
            mode: OutputMode::Lines,
            encodings: DEFAULT_ENCODINGS.to_vec(),
        }
    }
}

impl RunOptions {
    /// Set the stdout target.
    pub fn stdout(mut self, target: impl Into<Redirect>) -> Self {
        self.stdout = target.into();
        self
    }

    /// Set the stderr target.
    pub fn stderr(mut self, target: impl Into<Redirect>) -> Self {
        self.stderr = target.into();
        self
    }

    /// Choose between shell interpretation and direct execution.
    pub fn shell(mut self, shell: bool) -> Self {
        self.shell = shell;
        self
    }

    /// Replace the whole environment of the child.
    pub fn env(mut self, env: HashMap<OsString, OsString>) -> Self {
        self.env = Some(env);
        self
    }

    /// Set one variable on top of the environment.
    pub fn env_var(mut self, key: impl Into<OsString>, value: impl Into<OsString>) -> Self {
        self.env
            .get_or_insert_with(|| std::env::vars_os().collect())
            .insert(key.into(), value.into());
        self
    }

    /// Set the working directory of the child.
    pub fn cwd(mut self, cwd: impl Into<PathBuf>) -> Self {
        self.cwd = Some(cwd.into());
        self
    }

    /// Set how output is cut into items.
    pub fn mode(mut self, mode: OutputMode) -> Self {
        self.mode = mode;
        self
    }

    /// Set the encoding fallback chain.
    pub fn encodings(mut self, encodings: Vec<Encoding>) -> Self {
        self.encodings = encodings;
        self
    }
}

/// Current status of a child process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessStatus {
    /// Process has completed with exit status.
    Done(ExitStatus),
    /// Process is still running.
    Running,
}

/// Spawn `cmd` as described by `options`.
///
/// Stdin is always the null device. Returns the child together with the
/// decoder its pumps should use.
///
/// # Examples
///
/// ```rust,no_run
/// use cmdpack::{Cmd, RunOptions, process::spawn_process};
///
/// let (mut child, _decoder) = spawn_process(&Cmd::from("echo Hello"), RunOptions::default()).unwrap();
/// let stdout = child.stdout.take().unwrap();
/// ```
pub fn spawn_process(cmd: &Cmd, options: RunOptions) -> Result<(Child, Decoder)> {
    let RunOptions {
        stdout,
        stderr,
        shell,
        env,
        cwd,
        mode,
        encodings,
    } = options;
    let spawn_error = |source: io::Error| Error::Spawn {
        command: cmd.to_string(),
        source,
    };

    let mut command = if shell {
        if cmd.is_empty() {
            return Err(Error::InvalidCommand(String::from("empty command")));
        }
        shell_command(&cmd.shell_line(ShellFlavor::host()))
    } else {
        let argv = cmd.argv()?;
        let mut command = Command::new(&argv[0]);
        command.args(&argv[1..]);
        command
    };

    if let Some(env) = env {
        command.env_clear().envs(env);
    }
    if let Some(cwd) = cwd {
        command.current_dir(cwd);
    }
    command
        .stdin(Stdio::null())
        .stdout(stdout.into_stdio().map_err(spawn_error)?)
        .stderr(stderr.into_stdio().map_err(spawn_error)?);

    debug!(command = %cmd, shell, "Spawning process");
    let child = command.spawn().map_err(spawn_error)?;
    debug!(pid = child.id(), "Process spawned");

    Ok((child, Decoder::new(mode, encodings)))
}

#[cfg(windows)]
fn shell_command(line: &str) -> Command {
    use std::os::windows::process::CommandExt;

    let mut command = Command::new("cmd");
    command.arg("/C").raw_arg(line);
    command
}

#[cfg(not(windows))]
fn shell_command(line: &str) -> Command {
    let mut command = Command::new("sh");
    command.arg("-c").arg(line);
    command
}

/// Check the process status without blocking.
pub fn get_process_status(child: &mut Child) -> Result<ProcessStatus> {
    Ok(match child.try_wait()? {
        Some(exit_status) => ProcessStatus::Done(exit_status),
        None => ProcessStatus::Running,
    })
}

/// Exit code reported for `status`.
///
/// A process terminated by a signal reports the negated signal number, so a
/// `kill -9` shows up as `-9`. `-1` if the platform reports neither.
pub fn exit_code(status: ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;

        if let Some(signal) = status.signal() {
            return -signal;
        }
    }
    -1
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn redirect_conversions() {
        assert!(Redirect::from(true).is_pipe());
        assert!(matches!(Redirect::from(false), Redirect::Null));
        assert!(matches!(
            Redirect::from(Path::new("/tmp/out.txt")),
            Redirect::File(path) if path == Path::new("/tmp/out.txt")
        ));
    }

    #[test]
    fn env_var_starts_from_current_environment() {
        let options = RunOptions::default().env_var("CMDPACK_TEST_VAR", "1");
        let env = options.env.unwrap();
        assert_eq!(env.get(&OsString::from("CMDPACK_TEST_VAR")), Some(&OsString::from("1")));
        assert_eq!(env.len(), std::env::vars_os().count() + 1);
    }

    #[test]
    fn empty_shell_command_is_rejected() {
        let err = spawn_process(&Cmd::from("  "), RunOptions::default()).unwrap_err();
        assert!(matches!(err, Error::InvalidCommand(_)));
    }

    #[test]
    fn missing_program_is_a_spawn_error() {
        let cmd = Cmd::from(vec!["/nonexistent/cmdpack-no-such-program"]);
        let err = spawn_process(&cmd, RunOptions::default().shell(false)).unwrap_err();
        match err {
            Error::Spawn { command, source } => {
                assert!(command.contains("cmdpack-no-such-program"));
                assert_eq!(source.kind(), io::ErrorKind::NotFound);
            }
            other => panic!("expected a spawn error, got {other:?}"),
        }
    }

    #[cfg(unix)]
    #[test]
    fn signals_map_to_negative_codes() {
        use std::os::unix::process::ExitStatusExt;

        assert_eq!(exit_code(ExitStatus::from_raw(0)), 0);
        assert_eq!(exit_code(ExitStatus::from_raw(3 << 8)), 3);
        assert_eq!(exit_code(ExitStatus::from_raw(9)), -9);
    }
}
