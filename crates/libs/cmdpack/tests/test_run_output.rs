//! Output capture through pipes, files and callbacks.

#![cfg(unix)]

use std::{
    collections::HashMap,
    ffi::OsString,
    fs,
    time::{Duration, Instant},
};

use cmdpack::{
    Cmd, Error, OutputMode, Redirect, RunConfig, RunOptions, run_cmd_output, run_cmd_wait,
    run_command_callback,
};
use ntest::timeout;

mod common;

const NUMBERS: &str = "printf '001\\n002\\n003\\n004\\n'";

#[test]
#[timeout(5000)]
fn test_lines_arrive_in_order() {
    let mut handle = run_cmd_output(NUMBERS, RunOptions::default()).unwrap();
    let lines = common::collect(&mut handle);
    assert_eq!(lines, vec!["001", "002", "003", "004"]);
    assert_eq!(handle.get_exitcode(&RunConfig::default()).unwrap(), 0);
}

#[test]
#[timeout(5000)]
fn test_discarded_stderr_is_not_counted() {
    let cmd = "echo out1; echo err1 >&2; echo out2; echo err2 >&2";
    let mut handle = run_cmd_output(cmd, RunOptions::default()).unwrap();
    assert_eq!(common::collect(&mut handle), vec!["out1", "out2"]);

    let options = RunOptions::default().stdout(false).stderr(true);
    let mut handle = run_cmd_output(cmd, options).unwrap();
    assert_eq!(common::collect(&mut handle), vec!["err1", "err2"]);
}

#[test]
#[timeout(5000)]
fn test_both_streams_keep_their_own_order() {
    let cmd = "for i in 1 2 3; do echo out$i; echo err$i >&2; done";
    let options = RunOptions::default().stderr(true);
    let mut handle = run_cmd_output(cmd, options).unwrap();
    let lines = common::collect(&mut handle);
    assert_eq!(lines.len(), 6);

    let from = |prefix: &str| -> Vec<String> {
        lines
            .iter()
            .filter(|line| line.starts_with(prefix))
            .cloned()
            .collect()
    };
    assert_eq!(from("out"), vec!["out1", "out2", "out3"]);
    assert_eq!(from("err"), vec!["err1", "err2", "err3"]);
}

#[test]
#[timeout(10000)]
fn test_get_lines_returns_on_timeout() {
    let mut handle = run_cmd_output("sleep 3; echo late", RunOptions::default()).unwrap();

    let start = Instant::now();
    let lines = handle.get_lines(Duration::from_millis(500), 5).unwrap();
    let elapsed = start.elapsed();
    assert!(lines.is_empty());
    assert!(elapsed >= Duration::from_millis(500), "returned early: {elapsed:?}");
    assert!(elapsed < Duration::from_secs(2), "returned late: {elapsed:?}");
    assert!(handle.is_running());
    assert!(!handle.output_ended());

    let lines = handle.get_lines(Duration::from_secs(5), 1).unwrap();
    assert_eq!(lines, vec!["late"]);
    assert_eq!(handle.get_exitcode(&RunConfig::default()).unwrap(), 0);
    assert!(!handle.is_running());
}

#[test]
#[timeout(5000)]
fn test_get_lines_stops_at_min_lines() {
    let mut handle = run_cmd_output(NUMBERS, RunOptions::default()).unwrap();
    let first = handle.get_lines(Duration::from_secs(2), 3).unwrap();
    assert_eq!(first, vec!["001", "002", "003"]);
    let rest = handle.get_lines(Duration::from_secs(2), 3).unwrap();
    assert_eq!(rest, vec!["004"]);
    assert!(handle.output_ended());
}

#[test]
#[timeout(10000)]
fn test_raw_mode_delivers_bytes_as_they_come() {
    let cmd = "for c in a b c d e; do printf $c; sleep 0.3; done";
    let options = RunOptions::default().mode(OutputMode::Raw);
    let mut handle = run_cmd_output(cmd, options).unwrap();

    let start = Instant::now();
    let mut received = Vec::new();
    while !handle.output_ended() {
        for item in handle.get_lines(Duration::from_millis(100), 1).unwrap() {
            received.push((item, start.elapsed()));
        }
    }

    let text: String = received.iter().map(|(item, _)| item.as_str()).collect();
    assert_eq!(text, "abcde");
    assert_eq!(received.len(), 5);
    // The first byte must not wait for the last one.
    assert!(received[0].1 + Duration::from_millis(600) < received[4].1);
    assert_eq!(handle.get_exitcode(&RunConfig::default()).unwrap(), 0);
}

#[test]
#[timeout(5000)]
fn test_file_redirect_matches_pipe() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("out.txt");

    let options = RunOptions::default().stdout(path.as_path());
    let mut handle = run_cmd_output(NUMBERS, options).unwrap();
    assert!(handle.output_ended());
    assert_eq!(handle.get_exitcode(&RunConfig::default()).unwrap(), 0);
    let from_file: Vec<String> = fs::read_to_string(&path)
        .unwrap()
        .lines()
        .map(String::from)
        .collect();

    let mut handle = run_cmd_output(NUMBERS, RunOptions::default()).unwrap();
    assert_eq!(common::collect(&mut handle), from_file);
}

#[test]
#[timeout(5000)]
fn test_open_file_is_used_as_sink() {
    let mut file = tempfile::tempfile().unwrap();
    let sink = file.try_clone().unwrap();
    let code = run_command_callback(
        "echo hidden; echo shown >&2",
        |_| {},
        RunOptions::default().stdout(sink).stderr(Redirect::Null),
    )
    .unwrap();
    assert_eq!(code, 0);

    use std::io::{Read, Seek};
    file.rewind().unwrap();
    let mut content = String::new();
    file.read_to_string(&mut content).unwrap();
    assert_eq!(content, "hidden\n");
}

#[test]
#[timeout(5000)]
fn test_callback_sees_every_line() {
    let mut seen = Vec::new();
    let code = run_command_callback(
        "printf 'x\\ny\\n'; exit 4",
        |line| seen.push(line.to_string()),
        RunOptions::default(),
    )
    .unwrap();
    assert_eq!(code, 4);
    assert_eq!(seen, vec!["x", "y"]);
}

#[test]
#[timeout(5000)]
fn test_exit_code_is_cached() {
    let mut handle = run_cmd_output("exit 5", RunOptions::default()).unwrap();
    assert_eq!(handle.get_exitcode(&RunConfig::default()).unwrap(), 5);
    assert_eq!(
        handle
            .get_exitcode(&RunConfig::with_max_wait(Duration::ZERO))
            .unwrap(),
        5
    );
    assert!(!handle.is_running());
    assert!(handle.get_lines(Duration::from_millis(10), 1).unwrap().is_empty());
}

#[test]
#[timeout(5000)]
fn test_missing_program_fails_to_launch() {
    let cmd = Cmd::from(vec!["/nonexistent/cmdpack-missing"]);
    let err = run_cmd_output(cmd, RunOptions::default().shell(false)).unwrap_err();
    assert!(matches!(err, Error::Spawn { .. }), "{err:?}");
}

#[test]
#[timeout(5000)]
fn test_must_succeed() {
    assert_eq!(run_cmd_wait("exit 7", false, true, true).unwrap(), 7);
    match run_cmd_wait("exit 7", true, true, true).unwrap_err() {
        Error::CommandFailed { command, code } => {
            assert_eq!(command, "exit 7");
            assert_eq!(code, 7);
        }
        other => panic!("expected a command failure, got {other:?}"),
    }
    assert_eq!(run_cmd_wait(vec!["true"], true, true, false).unwrap(), 0);
}

#[test]
#[timeout(5000)]
fn test_environment_and_working_directory() {
    let dir = tempfile::tempdir().unwrap();
    let options = RunOptions::default()
        .env_var("CMDPACK_GREETING", "hello there")
        .cwd(dir.path());
    let mut handle = run_cmd_output("echo \"$CMDPACK_GREETING\"; pwd", options).unwrap();
    let lines = common::collect(&mut handle);
    assert_eq!(lines[0], "hello there");
    assert_eq!(
        fs::canonicalize(&lines[1]).unwrap(),
        fs::canonicalize(dir.path()).unwrap()
    );
}

#[test]
#[timeout(5000)]
fn test_replaced_environment() {
    let env: HashMap<OsString, OsString> = [("ONLY", "this"), ("PATH", "/usr/bin:/bin")]
        .into_iter()
        .map(|(key, value)| (key.into(), value.into()))
        .collect();
    let mut handle = run_cmd_output("echo \"$ONLY:$HOME\"", RunOptions::default().env(env)).unwrap();
    assert_eq!(common::collect(&mut handle), vec!["this:"]);
}

#[test]
#[timeout(5000)]
fn test_direct_mode_does_not_use_a_shell() {
    let options = RunOptions::default().shell(false);
    let mut handle = run_cmd_output(r#"printf "%s|" a "b c" $HOME"#, options).unwrap();
    assert_eq!(common::collect(&mut handle), vec!["a|b c|$HOME|"]);
}

#[test]
#[timeout(5000)]
fn test_quoted_arguments_survive_the_shell() {
    let args = vec!["printf", "%s\\n", "two words", "say \"hi\"", "`id`"];
    let mut handle = run_cmd_output(args, RunOptions::default()).unwrap();
    assert_eq!(
        common::collect(&mut handle),
        vec!["two words", "say \"hi\"", "`id`"]
    );
}

#[test]
#[timeout(5000)]
fn test_latin1_fallback() {
    let mut handle = run_cmd_output("printf 'caf\\351\\n'", RunOptions::default()).unwrap();
    assert_eq!(common::collect(&mut handle), vec!["caf\u{e9}"]);
}
