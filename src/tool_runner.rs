// SPDX-License-Identifier: Apache-2.0

//! Uniform invocation of external synthesis/simulation binaries.
//!
//! Every external tool goes through `invoke`: the child becomes its own
//! process-group leader so a timeout can kill the whole subtree, stdout and
//! stderr are captured and teed to a per-invocation log file in the working
//! directory, and outcomes (including timeouts and spawn failures) come
//! back as values rather than errors. Unix-only, like the rest of the
//! toolchain plumbing.

use std::io::{Read, Seek, SeekFrom};
use std::path::Path;
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunStatus {
    Ok,
    NonZeroExit(i32),
    Timeout,
    LaunchFail(String),
}

impl RunStatus {
    pub fn is_ok(&self) -> bool {
        matches!(self, RunStatus::Ok)
    }
}

#[derive(Debug)]
pub struct InvokeResult {
    pub status: RunStatus,
    pub stdout: String,
    pub stderr: String,
    pub duration: Duration,
}

impl InvokeResult {
    fn launch_fail(msg: String) -> Self {
        InvokeResult {
            status: RunStatus::LaunchFail(msg),
            stdout: String::new(),
            stderr: String::new(),
            duration: Duration::ZERO,
        }
    }
}

/// Exit code produced by `timeout(1)`-style wrappers; folded into the
/// `Timeout` status so shell-wrapped tools classify the same way.
const TIMEOUT_WRAPPER_EXIT: i32 = 124;

const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Runs `exe args...` in `cwd` and waits for completion or `timeout`.
///
/// `cwd` is created if absent. `ROOT` is set to the invoker's working
/// directory so scripts can resolve auxiliary files under the project
/// tree. Captured output is teed to `<name>.log` inside `cwd`.
pub fn invoke(
    name: &str,
    exe: &str,
    args: &[&str],
    cwd: &Path,
    timeout: Duration,
) -> InvokeResult {
    if let Err(e) = std::fs::create_dir_all(cwd) {
        return InvokeResult::launch_fail(format!(
            "failed to create {}: {}",
            cwd.display(),
            e
        ));
    }
    let root = std::env::current_dir()
        .map(|p| p.display().to_string())
        .unwrap_or_else(|_| ".".to_string());

    let mut stdout_file = match tempfile::tempfile() {
        Ok(f) => f,
        Err(e) => return InvokeResult::launch_fail(format!("stdout capture: {}", e)),
    };
    let mut stderr_file = match tempfile::tempfile() {
        Ok(f) => f,
        Err(e) => return InvokeResult::launch_fail(format!("stderr capture: {}", e)),
    };

    let mut cmd = Command::new(exe);
    cmd.args(args)
        .current_dir(cwd)
        .env("ROOT", &root)
        .stdin(Stdio::null());
    match (stdout_file.try_clone(), stderr_file.try_clone()) {
        (Ok(out), Ok(err)) => {
            cmd.stdout(Stdio::from(out));
            cmd.stderr(Stdio::from(err));
        }
        _ => return InvokeResult::launch_fail("failed to clone capture files".to_string()),
    }

    // Child leads its own process group so the whole subtree dies on
    // timeout.
    #[cfg(unix)]
    unsafe {
        use std::os::unix::process::CommandExt;
        cmd.pre_exec(|| {
            if libc::setpgid(0, 0) != 0 {
                return Err(std::io::Error::new(
                    std::io::ErrorKind::Other,
                    "failed to setpgid",
                ));
            }
            Ok(())
        });
    }

    log::debug!("invoke[{}]: {:?}", name, cmd);
    let start = Instant::now();
    let mut child = match cmd.spawn() {
        Ok(c) => c,
        Err(e) => return InvokeResult::launch_fail(format!("spawn {}: {}", exe, e)),
    };

    let deadline = start + timeout;
    let mut timed_out = false;
    let exit_status = loop {
        match child.try_wait() {
            Ok(Some(status)) => break Some(status),
            Ok(None) => {
                if Instant::now() >= deadline {
                    timed_out = true;
                    kill_group(&child);
                    break child.wait().ok();
                }
                std::thread::sleep(POLL_INTERVAL);
            }
            Err(e) => {
                log::warn!("invoke[{}]: wait failed: {}", name, e);
                break None;
            }
        }
    };
    let duration = start.elapsed();

    let stdout = read_back(&mut stdout_file);
    let stderr = read_back(&mut stderr_file);
    tee_log(name, cwd, &stdout, &stderr);

    let status = if timed_out {
        RunStatus::Timeout
    } else {
        match exit_status {
            Some(s) if s.success() => RunStatus::Ok,
            Some(s) => match s.code() {
                Some(TIMEOUT_WRAPPER_EXIT) => RunStatus::Timeout,
                Some(code) => RunStatus::NonZeroExit(code),
                // Killed by a signal.
                None => RunStatus::NonZeroExit(-1),
            },
            None => RunStatus::LaunchFail("wait failed".to_string()),
        }
    };
    log::debug!(
        "invoke[{}]: {:?} after {:?}",
        name,
        status,
        duration
    );
    InvokeResult {
        status,
        stdout,
        stderr,
        duration,
    }
}

#[cfg(unix)]
fn kill_group(child: &std::process::Child) {
    let pid = child.id() as i32;
    unsafe {
        libc::kill(-pid, libc::SIGKILL);
    }
}

#[cfg(not(unix))]
fn kill_group(_child: &std::process::Child) {}

fn read_back(file: &mut std::fs::File) -> String {
    let mut text = String::new();
    if file.seek(SeekFrom::Start(0)).is_ok() {
        let _ = file.read_to_string(&mut text);
    }
    text
}

fn tee_log(name: &str, cwd: &Path, stdout: &str, stderr: &str) {
    let mut log_text = String::with_capacity(stdout.len() + stderr.len() + 32);
    log_text.push_str(stdout);
    if !stderr.is_empty() {
        log_text.push_str("--- stderr ---\n");
        log_text.push_str(stderr);
    }
    let path = cwd.join(format!("{}.log", name));
    if let Err(e) = std::fs::write(&path, log_text) {
        log::warn!("failed to write {}: {}", path.display(), e);
    }
}
