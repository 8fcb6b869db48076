//! Bounded subprocess execution.
//!
//! The calling thread owns the `Child` and polls it with `try_wait`. Each
//! output pipe is drained on its own helper thread so a chatty child never
//! blocks on a full pipe. On deadline the child is killed and reaped, and
//! the helpers are joined with a bounded wait.

use std::ffi::OsStr;
use std::io::{self, Read};
use std::process::{Command, Stdio};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use tracing::debug;

const POLL_INTERVAL: Duration = Duration::from_millis(10);
const READER_JOIN_TIMEOUT: Duration = Duration::from_secs(2);

/// Captured output of a finished or killed child.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessOutput {
    /// Exit code; `None` when killed by a signal or on timeout.
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
    pub timed_out: bool,
}

impl ProcessOutput {
    pub fn success(&self) -> bool {
        !self.timed_out && self.code == Some(0)
    }

    /// Stdout followed by stderr, as one text.
    pub fn combined(&self) -> String {
        match (self.stdout.is_empty(), self.stderr.is_empty()) {
            (_, true) => self.stdout.clone(),
            (true, false) => self.stderr.clone(),
            (false, false) => format!("{}\n{}", self.stdout, self.stderr),
        }
    }
}

fn drain<R: Read + Send + 'static>(pipe: Option<R>) -> JoinHandle<Vec<u8>> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        if let Some(mut pipe) = pipe {
            let _ = pipe.read_to_end(&mut buf);
        }
        buf
    })
}

fn join_bounded(handle: JoinHandle<Vec<u8>>) -> String {
    let deadline = Instant::now() + READER_JOIN_TIMEOUT;
    while !handle.is_finished() {
        if Instant::now() >= deadline {
            // A descendant still holds the pipe open; abandon the reader.
            return String::new();
        }
        thread::sleep(POLL_INTERVAL);
    }
    handle
        .join()
        .map(|bytes| String::from_utf8_lossy(&bytes).into_owned())
        .unwrap_or_default()
}

/// Run `program args..` and wait at most `timeout`.
///
/// Launch failures (including a missing program, `ErrorKind::NotFound`)
/// are returned as `Err`. A timeout is a normal outcome with `timed_out`
/// set.
pub fn run_with_timeout<S: AsRef<OsStr>>(
    program: &str,
    args: &[S],
    timeout: Duration,
) -> io::Result<ProcessOutput> {
    debug!(program, timeout_secs = timeout.as_secs(), "spawning subprocess");
    let mut child = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()?;

    let stdout = drain(child.stdout.take());
    let stderr = drain(child.stderr.take());

    let deadline = Instant::now() + timeout;
    let (code, timed_out) = loop {
        if let Some(status) = child.try_wait()? {
            break (status.code(), false);
        }
        if Instant::now() >= deadline {
            let _ = child.kill();
            let _ = child.wait();
            break (None, true);
        }
        thread::sleep(POLL_INTERVAL);
    };
    drop(child);

    Ok(ProcessOutput {
        code,
        stdout: join_bounded(stdout),
        stderr: join_bounded(stderr),
        timed_out,
    })
}
