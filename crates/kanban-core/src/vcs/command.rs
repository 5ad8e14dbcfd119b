//! Blocking subprocess execution with a wall-clock bound.

use std::io::{self, Read};
use std::process::{Command, ExitStatus, Stdio};
use std::sync::mpsc::{self, Receiver};
use std::thread;
use std::time::{Duration, Instant};

const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// How long pipes may stay open after the child is gone.
const DRAIN_GRACE: Duration = Duration::from_millis(200);

/// What a finished (or killed) child left behind.
#[derive(Debug)]
pub(crate) struct Finished {
    pub status: ExitStatus,
    pub stdout: String,
    pub stderr: String,
    pub timed_out: bool,
}

/// Run `cmd` to completion, killing it once `timeout` has elapsed.
///
/// Both pipes are drained on helper threads so a child that writes more than
/// the pipe buffer cannot stall. A grandchild that inherited the pipes cannot
/// extend the bound: drains still open after the deadline are abandoned.
pub(crate) fn run_with_timeout(cmd: &mut Command, timeout: Duration) -> io::Result<Finished> {
    let started = Instant::now();
    let mut child = cmd
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()?;

    let stdout = child.stdout.take();
    let stderr = child.stderr.take();
    let out_rx = spawn_drain(stdout);
    let err_rx = spawn_drain(stderr);

    let mut timed_out = false;
    let status = loop {
        if let Some(status) = child.try_wait()? {
            break status;
        }
        if started.elapsed() >= timeout {
            timed_out = true;
            let _ = child.kill();
            break child.wait()?;
        }
        thread::sleep(POLL_INTERVAL);
    };

    let deadline = Instant::now() + timeout.saturating_sub(started.elapsed()).max(DRAIN_GRACE);
    let stdout = collect(&out_rx, deadline);
    let stderr = collect(&err_rx, deadline);

    Ok(Finished {
        status,
        stdout: String::from_utf8_lossy(&stdout).into_owned(),
        stderr: String::from_utf8_lossy(&stderr).into_owned(),
        timed_out,
    })
}

fn spawn_drain(pipe: Option<impl Read + Send + 'static>) -> Receiver<Vec<u8>> {
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        let mut buf = Vec::new();
        if let Some(mut pipe) = pipe {
            let _ = pipe.read_to_end(&mut buf);
        }
        let _ = tx.send(buf);
    });
    rx
}

/// Output of one drain, or nothing if it is still blocked at `deadline`.
fn collect(rx: &Receiver<Vec<u8>>, deadline: Instant) -> Vec<u8> {
    rx.recv_timeout(deadline.saturating_duration_since(Instant::now()))
        .unwrap_or_default()
}
