//! Error types for command execution.

use crate::pump::Stream;

/// Command execution errors.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// The child process could not be started.
    #[error("Failed to launch `{command}`: {source}")]
    Spawn {
        /// Command line that was being launched.
        command: String,
        /// Underlying OS error.
        source: std::io::Error,
    },

    /// The command could not be turned into a program and arguments.
    #[error("Invalid command: {0}")]
    InvalidCommand(String),

    /// A command that had to succeed returned a non-zero exit code.
    #[error("Command `{command}` failed with exit code {code}")]
    CommandFailed {
        /// Command line that was run.
        command: String,
        /// Exit code it returned.
        code: i32,
    },

    /// No encoding of the fallback chain could decode a unit read from a stream.
    #[error("Could not decode {stream} output {bytes:?}")]
    Decode {
        /// Stream the bytes came from.
        stream: Stream,
        /// Bytes that failed to decode.
        bytes: Vec<u8>,
    },

    /// Reading from a child pipe failed.
    #[error("Failed to read {stream}: {source}")]
    Read {
        /// Stream being read.
        stream: Stream,
        /// Underlying OS error.
        source: std::io::Error,
    },

    /// The host OS has no child enumeration or kill strategy.
    #[error("Unsupported platform {0}")]
    UnsupportedPlatform(String),

    /// The process listing tool could not be run.
    #[error("Failed to enumerate child processes: {0}")]
    Enumerate(String),

    /// An output pump thread panicked.
    #[error("Failed to join thread {0}")]
    ThreadJoin(String),

    /// I/O operation failed.
    #[error(transparent)]
    IO(#[from] std::io::Error),

    /// TOML deserialization failed.
    #[error(transparent)]
    Deserialization(#[from] toml::de::Error),
}
