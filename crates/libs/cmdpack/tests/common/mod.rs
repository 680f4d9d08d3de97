#![allow(dead_code)]

use std::time::{Duration, Instant};

use cmdpack::RunHandle;

/// Collect every output item, failing the test on a pump error.
pub fn collect(handle: &mut RunHandle) -> Vec<String> {
    handle
        .lines()
        .collect::<cmdpack::Result<Vec<_>>>()
        .expect("Couldn't read command output")
}

/// Returns `true` if `pid` exists and is not a zombie.
#[cfg(target_os = "linux")]
pub fn is_alive(pid: u32) -> bool {
    match std::fs::read_to_string(format!("/proc/{pid}/stat")) {
        // The state follows the parenthesised command name.
        Ok(stat) => match stat.rsplit_once(')') {
            Some((_, rest)) => !rest.trim_start().starts_with('Z'),
            None => false,
        },
        Err(_) => false,
    }
}

/// Wait up to `timeout` for `pid` to disappear.
#[cfg(target_os = "linux")]
pub fn wait_until_dead(pid: u32, timeout: Duration) -> bool {
    let start = Instant::now();
    while start.elapsed() < timeout {
        if !is_alive(pid) {
            return true;
        }
        std::thread::sleep(Duration::from_millis(50));
    }
    !is_alive(pid)
}
