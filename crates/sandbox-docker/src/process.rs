use std::os::unix::process::ExitStatusExt;
use std::process::ExitStatus;

use sandbox::ExecutionOutcome;

/// Kill the entire process group of `child` via `killpg(SIGKILL)`.
///
/// SIGKILL rather than SIGINT/SIGTERM: the runtime client must die even if it
/// is wedged. Requires the child to have been spawned with `process_group(0)`
/// so that its PGID equals its PID. No-op if the child has already been
/// reaped or the PID cannot be represented as `i32`.
pub(crate) fn kill_process_group(child: &tokio::process::Child) {
    if let Some(pid) = child.id()
        && let Ok(pid) = i32::try_from(pid)
    {
        let pgid = nix::unistd::Pid::from_raw(pid);
        let _ = nix::sys::signal::killpg(pgid, nix::sys::signal::Signal::SIGKILL);
    }
}

/// Map the exit status of a process that ran to completion.
pub(crate) fn classify_exit(status: ExitStatus, stdout: Vec<u8>, stderr: Vec<u8>) -> ExecutionOutcome {
    match status.code() {
        Some(0) => ExecutionOutcome::Success { output: stdout },
        Some(code) => ExecutionOutcome::NonZeroExit { code, stderr },
        None => ExecutionOutcome::Terminated {
            signal: status.signal(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_exit_is_success_with_stdout() {
        let outcome = classify_exit(ExitStatus::from_raw(0), b"out".to_vec(), b"err".to_vec());
        assert_eq!(
            outcome,
            ExecutionOutcome::Success {
                output: b"out".to_vec()
            }
        );
    }

    #[test]
    fn non_zero_exit_keeps_code_and_stderr() {
        // Raw wait status encodes the exit code in the second byte.
        let outcome = classify_exit(ExitStatus::from_raw(42 << 8), Vec::new(), b"limit".to_vec());
        assert_eq!(
            outcome,
            ExecutionOutcome::NonZeroExit {
                code: 42,
                stderr: b"limit".to_vec()
            }
        );
    }

    #[test]
    fn signal_death_is_terminated() {
        let outcome = classify_exit(ExitStatus::from_raw(9), Vec::new(), Vec::new());
        assert_eq!(outcome, ExecutionOutcome::Terminated { signal: Some(9) });
    }
}
