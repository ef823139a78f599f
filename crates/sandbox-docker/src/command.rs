use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use tokio::process::Command;
use tracing::trace;

/// Format a human-readable display string for a direct command invocation.
pub(crate) fn format_command_display(program: &Path, args: &[String]) -> String {
    let mut parts = Vec::with_capacity(args.len() + 1);
    parts.push(program.display().to_string());
    parts.extend(args.iter().cloned());
    parts.join(" ")
}

/// Execute a command with a deadline, ignoring any errors.
///
/// Used for best-effort cleanup where there is nobody left to report to.
pub(crate) async fn exec_ignore_errors(program: &Path, args: &[String], timeout: Duration) {
    let cmd_display = format_command_display(program, args);
    trace!(command = %cmd_display, "exec_ignore_errors");

    let output = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .kill_on_drop(true)
        .output();

    match tokio::time::timeout(timeout, output).await {
        Ok(Ok(o)) if !o.status.success() => {
            let stderr = String::from_utf8_lossy(&o.stderr);
            trace!(command = %cmd_display, stderr = %stderr.trim(), "command failed (ignored)");
        }
        Ok(Err(e)) => {
            trace!(command = %cmd_display, error = %e, "command failed to spawn (ignored)");
        }
        Err(_) => {
            trace!(command = %cmd_display, "command timed out (ignored)");
        }
        _ => {}
    }
}
