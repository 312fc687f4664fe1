// src/process.rs

use crate::error::ProcessError;
use std::fs::File;
use std::io::{Read, Seek, SeekFrom, Write};
use std::process::{Command, ExitStatus, Stdio};
use std::thread;
use std::time::{Duration, Instant};

const POLL_INTERVAL: Duration = Duration::from_millis(20);

#[derive(Debug)]
pub struct ProcessOutput {
    pub status: ExitStatus,
    pub stdout: String,
    pub stderr: String,
}

/// Runs `cmd` to completion, feeding `input` on stdin, and kills it once
/// `timeout` has elapsed. Output is spooled to anonymous temp files while
/// the child is polled.
pub fn run_with_timeout(
    cmd: &mut Command,
    input: Option<&str>,
    timeout: Duration,
) -> Result<ProcessOutput, ProcessError> {
    let mut out = tempfile::tempfile()?;
    let mut err = tempfile::tempfile()?;

    cmd.stdout(Stdio::from(out.try_clone()?))
        .stderr(Stdio::from(err.try_clone()?))
        .stdin(if input.is_some() {
            Stdio::piped()
        } else {
            Stdio::null()
        });

    let started = Instant::now();
    let mut child = cmd.spawn().map_err(ProcessError::Spawn)?;

    // Fed from a thread so a child that never reads cannot outlive the timeout
    let feeder = match (input, child.stdin.take()) {
        (Some(text), Some(mut stdin)) => {
            let text = text.to_string();
            Some(thread::spawn(move || {
                // Exit status reports failures
                let _ = stdin.write_all(text.as_bytes());
            }))
        }
        _ => None,
    };

    let status = loop {
        if let Some(status) = child.try_wait()? {
            break status;
        }
        if started.elapsed() >= timeout {
            let _ = child.kill();
            let _ = child.wait();
            return Err(ProcessError::Timeout(timeout));
        }
        thread::sleep(POLL_INTERVAL);
    };
    if let Some(feeder) = feeder {
        let _ = feeder.join();
    }

    Ok(ProcessOutput {
        status,
        stdout: read_back(&mut out)?,
        stderr: read_back(&mut err)?,
    })
}

fn read_back(file: &mut File) -> std::io::Result<String> {
    file.seek(SeekFrom::Start(0))?;
    let mut buf = Vec::new();
    file.read_to_end(&mut buf)?;
    Ok(String::from_utf8_lossy(&buf).into_owned())
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[test]
    fn captures_stdout_and_stdin() {
        let mut cmd = Command::new("sh");
        cmd.arg("-c").arg("read line; echo \"got $line\"; echo oops >&2");
        let output = run_with_timeout(&mut cmd, Some("hello\n"), Duration::from_secs(5)).unwrap();
        assert!(output.status.success());
        assert_eq!(output.stdout.trim(), "got hello");
        assert_eq!(output.stderr.trim(), "oops");
    }

    #[test]
    fn kills_child_after_timeout() {
        let mut cmd = Command::new("sleep");
        cmd.arg("5");
        let started = Instant::now();
        let result = run_with_timeout(&mut cmd, None, Duration::from_millis(100));
        assert!(matches!(result, Err(ProcessError::Timeout(_))));
        assert!(started.elapsed() < Duration::from_secs(4));
    }

    #[test]
    fn unread_large_input_still_times_out() {
        let mut cmd = Command::new("sleep");
        cmd.arg("5");
        let input = "x".repeat(4 * 1024 * 1024);
        let started = Instant::now();
        let result = run_with_timeout(&mut cmd, Some(&input), Duration::from_millis(200));
        assert!(matches!(result, Err(ProcessError::Timeout(_))));
        assert!(started.elapsed() < Duration::from_secs(4));
    }

    #[test]
    fn missing_binary_is_a_spawn_error() {
        let mut cmd = Command::new("definitely-not-a-real-binary-xyz");
        let result = run_with_timeout(&mut cmd, None, Duration::from_secs(1));
        assert!(matches!(result, Err(ProcessError::Spawn(_))));
    }
}
