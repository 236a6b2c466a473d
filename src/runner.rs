// SPDX-FileCopyrightText: 2025 Original python code: ruxi09/Fuzzer, fuzzer/fuzzer.py (run_solver)
// SPDX-FileCopyrightText: 2025 Rust port/adaptation: dimacs-fuzz contributors
//
// SPDX-License-Identifier: MIT

//! Bounded subprocess supervision for the SUT. The solver is expected to
//! hang on adversarial inputs, so every invocation is wrapped in a
//! timeout: on expiry we send a graceful termination signal and give the
//! child a short grace window to flush `stdout`/`stderr` before giving up
//! entirely.

use std::io::Read;
use std::path::Path;
use std::process::{Command, Stdio};
use std::time::Duration;

use nix::sys::signal::{self, Signal};
use nix::unistd::Pid;
use wait_timeout::ChildExt;

/// Grace window given to a terminated child to flush its pipes before we
/// give up and report empty output, matching the original's
/// `communicate(timeout=0.5)`.
const DRAIN_GRACE: Duration = Duration::from_millis(500);

#[derive(Clone)]
pub struct SubprocessOutput {
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    pub exit_code: i32,
}

/// Indirection over "invoke the SUT" so the fuzzer's engine can be
/// exercised against a scripted double in tests instead of a real
/// subprocess.
pub trait SolverRunner {
    fn run(&self, solver: &Path, test_file: &Path, timeout: Duration) -> SubprocessOutput;
}

/// Production runner: delegates to the free [`run`] function.
pub struct ProcessSolverRunner;

impl SolverRunner for ProcessSolverRunner {
    fn run(&self, solver: &Path, test_file: &Path, timeout: Duration) -> SubprocessOutput {
        run(solver, test_file, timeout)
    }
}

/// Run `<solver> <test_file>` under a shell, same as the original
/// implementation's `subprocess.Popen(cmd, shell=True, ...)`. Only stderr
/// is classified by the crash analyzer; stdout and exit status are
/// retained for completeness but otherwise unused.
pub fn run(solver: &Path, test_file: &Path, timeout: Duration) -> SubprocessOutput {
    let cmd = format!("{} {}", solver.display(), test_file.display());

    let mut child = match Command::new("sh")
        .arg("-c")
        .arg(&cmd)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
    {
        Ok(child) => child,
        Err(_) => {
            return SubprocessOutput {
                stdout: Vec::new(),
                stderr: Vec::new(),
                exit_code: 0,
            }
        }
    };

    let status = match child.wait_timeout(timeout) {
        Ok(Some(status)) => Some(status),
        Ok(None) => {
            // Timed out: ask nicely first, then keep draining for a bounded
            // grace window before giving up entirely.
            let _ = signal::kill(Pid::from_raw(child.id() as i32), Signal::SIGTERM);
            match child.wait_timeout(DRAIN_GRACE) {
                Ok(Some(status)) => Some(status),
                _ => None,
            }
        }
        Err(_) => None,
    };

    let Some(status) = status else {
        // Drain timed out too: report an empty run rather than block the
        // loop indefinitely.
        return SubprocessOutput {
            stdout: Vec::new(),
            stderr: Vec::new(),
            exit_code: 0,
        };
    };

    let mut stdout = Vec::new();
    let mut stderr = Vec::new();
    if let Some(mut out) = child.stdout.take() {
        let _ = out.read_to_end(&mut stdout);
    }
    if let Some(mut err) = child.stderr.take() {
        let _ = err.read_to_end(&mut stderr);
    }

    SubprocessOutput {
        stdout,
        stderr,
        exit_code: status.code().unwrap_or(0),
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn captures_stderr_and_exit_code() {
        let dir = std::env::temp_dir().join("dimacs-fuzz-runner-test");
        let _ = fs::create_dir_all(&dir);
        let script = dir.join("script.sh");
        fs::write(&script, "#!/bin/sh\necho oops 1>&2\nexit 7\n").unwrap();
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mut perms = fs::metadata(&script).unwrap().permissions();
            perms.set_mode(0o755);
            fs::set_permissions(&script, perms).unwrap();
        }
        let input = dir.join("input.cnf");
        fs::write(&input, "p cnf 1 1\n1 0\n").unwrap();

        let out = run(&script, &input, Duration::from_secs(5));
        assert_eq!(out.exit_code, 7);
        assert_eq!(String::from_utf8_lossy(&out.stderr).trim(), "oops");
    }

    #[test]
    fn timeout_is_bounded() {
        let dir = std::env::temp_dir().join("dimacs-fuzz-runner-timeout-test");
        let _ = fs::create_dir_all(&dir);
        let script = dir.join("hang.sh");
        fs::write(&script, "#!/bin/sh\nsleep 30\n").unwrap();
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mut perms = fs::metadata(&script).unwrap().permissions();
            perms.set_mode(0o755);
            fs::set_permissions(&script, perms).unwrap();
        }
        let input = dir.join("input.cnf");
        fs::write(&input, "p cnf 1 1\n1 0\n").unwrap();

        let start = std::time::Instant::now();
        let _ = run(&script, &input, Duration::from_millis(200));
        assert!(start.elapsed() < Duration::from_secs(5));
    }
}
