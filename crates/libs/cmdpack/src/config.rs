//! Settings for waiting on a command.

use std::{path::Path, time::Duration};

use serde::{Deserialize, Deserializer};

use crate::prelude::*;

/// How long [`crate::RunHandle::get_exitcode`] may wait.
///
/// In TOML the deadline is given in seconds:
///
/// ```toml
/// max_wait_time = 2.5
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RunConfig {
    /// Kill the process tree if it is still running after this long.
    /// `None` waits forever.
    #[serde(default, deserialize_with = "deserialize_seconds")]
    pub max_wait_time: Option<Duration>,
}

impl RunConfig {
    /// Configuration without a deadline.
    pub fn new() -> Self {
        Self::default()
    }

    /// Configuration killing the command after `max_wait_time`.
    pub fn with_max_wait(max_wait_time: Duration) -> Self {
        Self {
            max_wait_time: Some(max_wait_time),
        }
    }

    /// Load configuration from a TOML file.
    pub fn from_file(file_path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(file_path)?;
        Self::from_toml(&contents)
    }

    /// Parse configuration from TOML string.
    pub fn from_toml(value: &str) -> Result<Self> {
        Ok(toml::from_str(value)?)
    }
}

fn deserialize_seconds<'de, D>(deserializer: D) -> core::result::Result<Option<Duration>, D::Error>
where
    D: Deserializer<'de>,
{
    let Some(seconds) = Option::<f64>::deserialize(deserializer)? else {
        return Ok(None);
    };
    Duration::try_from_secs_f64(seconds)
        .map(Some)
        .map_err(serde::de::Error::custom)
}
