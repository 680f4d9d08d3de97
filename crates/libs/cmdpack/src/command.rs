//! Command description and shell quoting.

use std::fmt;

use crate::prelude::*;

/// A command to launch.
///
/// A command can be handed over either as a single command line, which is
/// passed to the shell untouched, or as a list of discrete arguments.
///
/// # Examples
///
/// ```rust
/// use cmdpack::command::Cmd;
///
/// let line = Cmd::from("echo hello | tr a-z A-Z");
/// let args = Cmd::from(vec!["printf", "%s\\n", "hello world"]);
/// assert_eq!(args.argv().unwrap().len(), 3);
/// assert_eq!(line.shell_line(cmdpack::command::ShellFlavor::Posix), "echo hello | tr a-z A-Z");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Cmd {
    /// A single, already quoted command line.
    Line(String),
    /// Program followed by its arguments.
    Args(Vec<String>),
}

/// Quoting rules of the shell a command line is handed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShellFlavor {
    /// `sh -c`
    Posix,
    /// `cmd /C`
    Windows,
}

impl ShellFlavor {
    /// Shell used on the current host.
    pub const fn host() -> Self {
        if cfg!(windows) {
            ShellFlavor::Windows
        } else {
            ShellFlavor::Posix
        }
    }
}

impl Cmd {
    /// Command line to hand to the shell.
    ///
    /// Argument lists are quoted one argument at a time and joined with spaces.
    pub fn shell_line(&self, flavor: ShellFlavor) -> String {
        match self {
            Cmd::Line(line) => line.clone(),
            Cmd::Args(args) => join_quoted(args, flavor),
        }
    }

    /// Program and arguments for direct execution.
    ///
    /// Command lines are split with [`split_command_line`].
    pub fn argv(&self) -> Result<Vec<String>> {
        let argv = match self {
            Cmd::Line(line) => split_command_line(line)?,
            Cmd::Args(args) => args.clone(),
        };
        if argv.is_empty() {
            return Err(Error::InvalidCommand(String::from("empty command")));
        }
        Ok(argv)
    }

    /// Returns `true` if there is nothing to run.
    pub fn is_empty(&self) -> bool {
        match self {
            Cmd::Line(line) => line.trim().is_empty(),
            Cmd::Args(args) => args.is_empty(),
        }
    }
}

impl fmt::Display for Cmd {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.shell_line(ShellFlavor::host()))
    }
}

impl From<&str> for Cmd {
    fn from(value: &str) -> Self {
        Cmd::Line(String::from(value))
    }
}

impl From<String> for Cmd {
    fn from(value: String) -> Self {
        Cmd::Line(value)
    }
}

impl From<Vec<String>> for Cmd {
    fn from(value: Vec<String>) -> Self {
        Cmd::Args(value)
    }
}

impl From<Vec<&str>> for Cmd {
    fn from(value: Vec<&str>) -> Self {
        Cmd::Args(value.into_iter().map(String::from).collect())
    }
}

impl From<&[&str]> for Cmd {
    fn from(value: &[&str]) -> Self {
        Cmd::Args(value.iter().map(|arg| String::from(*arg)).collect())
    }
}

/// Wrap one argument in double quotes, escaping it for `flavor`.
///
/// Posix shells get every `"`, `\` and `` ` `` escaped with a backslash. The
/// Windows rules only double the backslashes that end up in front of a quote
/// (an embedded one or the closing one); backticks carry no meaning there.
pub fn quote_arg(arg: &str, flavor: ShellFlavor) -> String {
    let mut quoted = String::with_capacity(arg.len() + 2);
    quoted.push('"');
    match flavor {
        ShellFlavor::Posix => {
            for c in arg.chars() {
                if matches!(c, '"' | '\\' | '`') {
                    quoted.push('\\');
                }
                quoted.push(c);
            }
        }
        ShellFlavor::Windows => {
            let mut backslashes = 0;
            for c in arg.chars() {
                match c {
                    '\\' => backslashes += 1,
                    '"' => {
                        push_backslashes(&mut quoted, backslashes * 2 + 1);
                        quoted.push('"');
                        backslashes = 0;
                    }
                    _ => {
                        push_backslashes(&mut quoted, backslashes);
                        quoted.push(c);
                        backslashes = 0;
                    }
                }
            }
            push_backslashes(&mut quoted, backslashes * 2);
        }
    }
    quoted.push('"');
    quoted
}

fn push_backslashes(out: &mut String, count: usize) {
    out.extend(std::iter::repeat_n('\\', count));
}

/// Quote every argument and join them into a single command line.
pub fn join_quoted<S: AsRef<str>>(args: &[S], flavor: ShellFlavor) -> String {
    args.iter()
        .map(|arg| quote_arg(arg.as_ref(), flavor))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Split a command line into arguments without involving a shell.
///
/// Whitespace separates arguments, double quotes group them and a backslash
/// escapes a following `"`, `\` or `` ` ``. Any other backslash is kept as is
/// so Windows paths survive.
pub fn split_command_line(line: &str) -> Result<Vec<String>> {
    let mut args = Vec::new();
    let mut current = String::new();
    let mut in_token = false;
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '\\' => {
                match chars.peek() {
                    Some(&next @ ('"' | '\\' | '`')) => {
                        current.push(next);
                        chars.next();
                    }
                    _ => current.push('\\'),
                }
                in_token = true;
            }
            '"' => {
                in_quotes = !in_quotes;
                in_token = true;
            }
            c if c.is_whitespace() && !in_quotes => {
                if in_token {
                    args.push(std::mem::take(&mut current));
                    in_token = false;
                }
            }
            c => {
                current.push(c);
                in_token = true;
            }
        }
    }

    if in_quotes {
        return Err(Error::InvalidCommand(format!("unbalanced quote in {line:?}")));
    }
    if in_token {
        args.push(current);
    }
    Ok(args)
}
