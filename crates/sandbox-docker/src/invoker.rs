use std::process::Stdio;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use sandbox::{ExecutionOutcome, SandboxInvocation, SandboxInvoker};
use tokio::process::{Child, Command};
use tracing::{debug, info, warn};

use crate::capture::{CaptureError, OutputBudget, drain};
use crate::command::{exec_ignore_errors, format_command_display};
use crate::config::DockerConfig;
use crate::prerequisites::{check_prerequisites, validate};
use crate::process::{classify_exit, kill_process_group};

/// Upper bound for the best-effort `rm -f` issued after a forced kill.
const CLEANUP_TIMEOUT: Duration = Duration::from_secs(30);

/// Runs invocations as `docker run` containers.
///
/// Every container is started with a memory cap, `--rm`, an unprivileged
/// user, no network and all capabilities dropped. None of these can be
/// switched off through [`DockerConfig`].
pub struct DockerInvoker {
    config: DockerConfig,
}

impl DockerInvoker {
    /// Validate the configuration and check that the runtime client exists.
    pub fn new(config: DockerConfig) -> sandbox::Result<Self> {
        validate(&config)?;
        check_prerequisites(&config)?;
        info!(runtime = %config.runtime.display(), user = %config.user, "docker invoker ready");
        Ok(Self { config })
    }

    /// Force-kill the client and remove the container it may have left behind.
    async fn force_terminate(&self, child: &mut Child, container: &str) {
        kill_process_group(child);
        if let Err(e) = child.wait().await {
            warn!(container = %container, error = %e, "failed to reap runtime client");
        }

        // A SIGKILLed client never gets to honour --rm, so the container
        // keeps running unless removed here.
        let runtime = self.config.runtime.clone();
        let args = rm_args(&self.config, container);
        tokio::spawn(async move {
            exec_ignore_errors(&runtime, &args, CLEANUP_TIMEOUT).await;
        });
    }
}

#[async_trait]
impl SandboxInvoker for DockerInvoker {
    fn name(&self) -> &str {
        "docker"
    }

    async fn invoke(&self, invocation: &SandboxInvocation) -> ExecutionOutcome {
        let container = container_name();
        let args = run_args(&self.config, invocation, &container);
        let limits = invocation.limits;
        debug!(
            container = %container,
            command = %format_command_display(&self.config.runtime, &args),
            "starting sandbox"
        );

        let started = Instant::now();
        let mut child = match Command::new(&self.config.runtime)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .process_group(0)
            .kill_on_drop(true)
            .spawn()
        {
            Ok(child) => child,
            Err(e) => {
                return ExecutionOutcome::SpawnError {
                    cause: format!("spawn {}: {e}", self.config.runtime.display()),
                };
            }
        };

        let (Some(stdout), Some(stderr)) = (child.stdout.take(), child.stderr.take()) else {
            self.force_terminate(&mut child, &container).await;
            return ExecutionOutcome::SpawnError {
                cause: "runtime client pipes unavailable".into(),
            };
        };

        let budget = OutputBudget::new(limits.max_output_bytes);
        let run = async {
            let (out, err) = tokio::try_join!(drain(stdout, &budget), drain(stderr, &budget))?;
            let status = child.wait().await?;
            Ok::<_, CaptureError>((status, out, err))
        };
        let result = tokio::time::timeout(limits.timeout, run).await;

        let outcome = match result {
            Ok(Ok((status, out, err))) => {
                let outcome = classify_exit(status, out, err);
                debug!(
                    container = %container,
                    outcome = outcome.kind(),
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "sandbox finished"
                );
                return outcome;
            }
            Ok(Err(CaptureError::LimitExceeded(limit))) => {
                warn!(container = %container, limit, "sandbox output limit exceeded, killing");
                ExecutionOutcome::OutputLimitExceeded { limit }
            }
            Ok(Err(CaptureError::Io(e))) => ExecutionOutcome::SpawnError {
                cause: format!("capture output: {e}"),
            },
            Err(_) => {
                warn!(
                    container = %container,
                    timeout_ms = limits.timeout.as_millis() as u64,
                    "sandbox timed out, killing"
                );
                ExecutionOutcome::TimedOut
            }
        };

        self.force_terminate(&mut child, &container).await;
        outcome
    }
}

fn container_name() -> String {
    format!("opt-sandbox-{}", uuid::Uuid::new_v4().simple())
}

/// Full argv (minus the runtime binary) for one sandboxed run.
fn run_args(config: &DockerConfig, invocation: &SandboxInvocation, container: &str) -> Vec<String> {
    let mut args = config.runtime_args.clone();
    args.extend([
        "run".to_string(),
        "-m".to_string(),
        invocation.limits.memory_flag(),
        "--rm".to_string(),
        "--name".to_string(),
        container.to_string(),
        format!("--user={}", config.user),
        "--net=none".to_string(),
        "--cap-drop".to_string(),
        "all".to_string(),
        invocation.image.clone(),
        invocation.program.clone(),
    ]);
    args.extend(invocation.args.iter().cloned());
    args
}

fn rm_args(config: &DockerConfig, container: &str) -> Vec<String> {
    let mut args = config.runtime_args.clone();
    args.extend(["rm".to_string(), "-f".to_string(), container.to_string()]);
    args
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use sandbox::{ResourceLimits, SandboxError};

    use super::*;

    /// Stand-in runtime: `sh -c SCRIPT fake-runtime <docker args...>`.
    /// The behaviour is picked by the last argument.
    const FAKE_RUNTIME: &str = r#"
case "$1" in rm) exit 0 ;; esac
for last; do :; done
case "$last" in
  ok) printf '{"code":"","trace":[]}' ;;
  fail) echo boom >&2; exit 3 ;;
  steps) exit 42 ;;
  hang) sleep 30 ;;
  flood) yes flood ;;
  signal) kill -9 $$ ;;
  argv) printf '%s\n' "$@" ;;
esac
"#;

    fn fake_invoker() -> DockerInvoker {
        DockerInvoker {
            config: DockerConfig {
                runtime: PathBuf::from("/bin/sh"),
                runtime_args: vec![
                    "-c".to_string(),
                    FAKE_RUNTIME.to_string(),
                    "fake-runtime".to_string(),
                ],
                user: "netuser".to_string(),
            },
        }
    }

    fn invocation(behaviour: &str, limits: ResourceLimits) -> SandboxInvocation {
        SandboxInvocation::new("pgbovine/cokapi-js:v1", "/bin/backend", limits).arg(behaviour)
    }

    fn short_limits() -> ResourceLimits {
        ResourceLimits {
            timeout: Duration::from_secs(10),
            ..ResourceLimits::default()
        }
    }

    #[test]
    fn run_args_request_isolation_in_order() {
        let config = DockerConfig::default();
        let inv = SandboxInvocation::new("img:v1", "/tmp/prog", ResourceLimits::default())
            .args(["--code=while(true){}", "extra"]);
        let args = run_args(&config, &inv, "opt-sandbox-x");
        assert_eq!(
            args,
            vec![
                "run",
                "-m",
                "512M",
                "--rm",
                "--name",
                "opt-sandbox-x",
                "--user=netuser",
                "--net=none",
                "--cap-drop",
                "all",
                "img:v1",
                "/tmp/prog",
                "--code=while(true){}",
                "extra",
            ]
        );
    }

    #[test]
    fn runtime_args_come_before_subcommand() {
        let config = DockerConfig {
            runtime_args: vec!["--host".to_string(), "unix:///run/docker.sock".to_string()],
            ..DockerConfig::default()
        };
        let inv = SandboxInvocation::new("img", "prog", ResourceLimits::default());
        let args = run_args(&config, &inv, "c");
        assert_eq!(args[..3], ["--host", "unix:///run/docker.sock", "run"]);
        assert_eq!(
            rm_args(&config, "c"),
            vec!["--host", "unix:///run/docker.sock", "rm", "-f", "c"]
        );
    }

    #[test]
    fn container_names_are_unique() {
        assert_ne!(container_name(), container_name());
    }

    #[test]
    fn new_rejects_missing_runtime() {
        let config = DockerConfig {
            runtime: PathBuf::from("/nonexistent/docker"),
            ..DockerConfig::default()
        };
        assert!(matches!(
            DockerInvoker::new(config),
            Err(SandboxError::RuntimeNotAvailable(_))
        ));
    }

    #[tokio::test]
    async fn success_returns_stdout() {
        let outcome = fake_invoker().invoke(&invocation("ok", short_limits())).await;
        assert_eq!(
            outcome,
            ExecutionOutcome::Success {
                output: br#"{"code":"","trace":[]}"#.to_vec()
            }
        );
    }

    #[tokio::test]
    async fn runtime_receives_isolation_flags_and_literal_code() {
        let inv = SandboxInvocation::new("img:v1", "/bin/backend", short_limits())
            .arg("$(touch /tmp/pwned); echo 'x'")
            .arg("argv");
        let output = match fake_invoker().invoke(&inv).await {
            ExecutionOutcome::Success { output } => output,
            other => panic!("unexpected outcome: {other:?}"),
        };
        let text = String::from_utf8(output).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "run");
        assert!(lines.contains(&"--net=none"));
        assert!(lines.contains(&"--user=netuser"));
        assert!(lines.contains(&"--cap-drop"));
        assert!(lines.contains(&"$(touch /tmp/pwned); echo 'x'"));
    }

    #[tokio::test]
    async fn non_zero_exit_keeps_stderr() {
        let outcome = fake_invoker().invoke(&invocation("fail", short_limits())).await;
        assert_eq!(
            outcome,
            ExecutionOutcome::NonZeroExit {
                code: 3,
                stderr: b"boom\n".to_vec()
            }
        );
    }

    #[tokio::test]
    async fn sentinel_exit_code_is_preserved() {
        let outcome = fake_invoker().invoke(&invocation("steps", short_limits())).await;
        assert!(matches!(outcome, ExecutionOutcome::NonZeroExit { code: 42, .. }));
    }

    #[tokio::test]
    async fn hanging_process_times_out_and_is_killed() {
        let limits = ResourceLimits {
            timeout: Duration::from_millis(300),
            ..ResourceLimits::default()
        };
        let start = Instant::now();
        let outcome = fake_invoker().invoke(&invocation("hang", limits)).await;
        assert_eq!(outcome, ExecutionOutcome::TimedOut);
        assert!(start.elapsed() < Duration::from_secs(10));
    }

    #[tokio::test]
    async fn flooding_output_hits_the_cap() {
        let limits = ResourceLimits {
            max_output_bytes: 4096,
            ..short_limits()
        };
        let outcome = fake_invoker().invoke(&invocation("flood", limits)).await;
        assert_eq!(outcome, ExecutionOutcome::OutputLimitExceeded { limit: 4096 });
    }

    #[tokio::test]
    async fn external_kill_is_terminated() {
        let outcome = fake_invoker().invoke(&invocation("signal", short_limits())).await;
        assert_eq!(outcome, ExecutionOutcome::Terminated { signal: Some(9) });
    }

    #[tokio::test]
    async fn unspawnable_runtime_is_spawn_error() {
        let invoker = DockerInvoker {
            config: DockerConfig {
                runtime: PathBuf::from("/nonexistent/docker"),
                ..DockerConfig::default()
            },
        };
        let outcome = invoker.invoke(&invocation("ok", short_limits())).await;
        assert!(matches!(outcome, ExecutionOutcome::SpawnError { .. }));
    }
}
