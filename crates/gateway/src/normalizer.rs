//! Outcome classification.
//!
//! Every [`ExecutionOutcome`] is matched on its variant and mapped either to a
//! body that can be sent as-is or to one of a handful of fixed failure
//! templates. Raw detail (exit codes, stderr, parse errors) goes to the log
//! and never into a response.

use std::time::Duration;

use sandbox::ExecutionOutcome;
use serde_json::Value;
use tracing::{debug, warn};

use crate::types::{TraceEnvelope, Transport};

/// Exit status the backends reserve for "step limit reached".
pub const STEP_LIMIT_EXIT_CODE: i32 = 42;

/// Longest stderr prefix written to the log.
const STDERR_LOG_LIMIT: usize = 2048;

const STEP_LIMIT_MESSAGE: &str = "Error: stopped after running 1000 steps and cannot display visualization.\n\
Shorten your code, since Python Tutor is not designed to handle long-running code.";

const UNKNOWN_ERROR_MESSAGE: &str = "Unknown error. The server may be OVERLOADED right now; please try again later.\n\
Your code may also contain UNSUPPORTED FEATURES that the tool cannot handle.\n\
Report a bug to philip@pgbovine.net by clicking on the 'Generate shortened link'\n\
button at the bottom and including a URL in your email. [#BackendError]";

const MISSING_PARAMETER_MESSAGE: &str = "Error: missing required parameter 'user_script'.";

/// Every way a request can fail to produce a trace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutionFailure {
    SandboxTimeout,
    /// Killed by a signal the invoker did not send (OOM killer, for example).
    SandboxForceKilled,
    SandboxStepLimitReached,
    SandboxOtherFailure,
    MalformedBackendOutput,
    /// No admission permit within the admission timeout.
    Overloaded,
    MissingParameter,
}

impl ExecutionFailure {
    /// User-facing message. `timeout` is the configured execution budget.
    pub fn message(&self, timeout: Duration) -> String {
        match self {
            Self::SandboxTimeout | Self::SandboxForceKilled => format!(
                "Error: Your code ran for more than {} seconds. It may have an INFINITE LOOP.\n\
                 Or the server may be OVERLOADED right now.\n\
                 Please try again later, or shorten your code. [#BackendError]",
                timeout.as_secs()
            ),
            Self::SandboxStepLimitReached => STEP_LIMIT_MESSAGE.to_string(),
            Self::SandboxOtherFailure | Self::MalformedBackendOutput | Self::Overloaded => {
                UNKNOWN_ERROR_MESSAGE.to_string()
            }
            Self::MissingParameter => MISSING_PARAMETER_MESSAGE.to_string(),
        }
    }

    pub fn envelope(&self, timeout: Duration) -> TraceEnvelope {
        TraceEnvelope::uncaught_exception(self.message(timeout))
    }
}

/// What the router ends up writing.
#[derive(Debug, Clone, PartialEq)]
pub enum ResponseBody {
    /// Backend stdout, forwarded untouched (plain transport).
    Raw(Vec<u8>),
    /// Synthesized failure envelope.
    Envelope(TraceEnvelope),
    /// Backend output that parsed and validated as a trace (callback transport).
    Backend(Value),
}

impl ResponseBody {
    pub fn to_json_bytes(&self) -> serde_json::Result<Vec<u8>> {
        match self {
            Self::Raw(bytes) => Ok(bytes.clone()),
            Self::Envelope(envelope) => serde_json::to_vec(envelope),
            Self::Backend(value) => serde_json::to_vec(value),
        }
    }
}

/// Map an outcome to a sendable body or the failure it represents.
pub fn classify(outcome: ExecutionOutcome, transport: Transport) -> Result<ResponseBody, ExecutionFailure> {
    match outcome {
        ExecutionOutcome::Success { output } => match transport {
            Transport::Plain => Ok(ResponseBody::Raw(output)),
            Transport::Callback => validate_trace(&output).map(ResponseBody::Backend),
        },
        ExecutionOutcome::TimedOut => {
            warn!("sandbox timed out");
            Err(ExecutionFailure::SandboxTimeout)
        }
        ExecutionOutcome::Terminated { signal } => {
            warn!(?signal, "sandbox terminated by signal");
            Err(ExecutionFailure::SandboxForceKilled)
        }
        ExecutionOutcome::NonZeroExit { code: STEP_LIMIT_EXIT_CODE, .. } => {
            debug!("backend reached its step limit");
            Err(ExecutionFailure::SandboxStepLimitReached)
        }
        ExecutionOutcome::NonZeroExit { code, stderr } => {
            let head = stderr.get(..STDERR_LOG_LIMIT).unwrap_or(stderr.as_slice());
            warn!(
                code,
                stderr = %String::from_utf8_lossy(head),
                truncated = stderr.len() > STDERR_LOG_LIMIT,
                "backend exited with failure"
            );
            Err(ExecutionFailure::SandboxOtherFailure)
        }
        ExecutionOutcome::OutputLimitExceeded { limit } => {
            warn!(limit, "backend output exceeded the capture limit");
            Err(ExecutionFailure::SandboxOtherFailure)
        }
        ExecutionOutcome::SpawnError { cause } => {
            warn!(%cause, "sandbox could not be started");
            Err(ExecutionFailure::SandboxOtherFailure)
        }
    }
}

fn validate_trace(output: &[u8]) -> Result<Value, ExecutionFailure> {
    let value: Value = serde_json::from_slice(output).map_err(|e| {
        warn!(error = %e, bytes = output.len(), "backend output is not JSON");
        ExecutionFailure::MalformedBackendOutput
    })?;
    if value.get("trace").is_some_and(Value::is_array) {
        Ok(value)
    } else {
        warn!("backend output has no trace array");
        Err(ExecutionFailure::MalformedBackendOutput)
    }
}

/// Classify and collapse failures into their envelope.
pub fn normalize(outcome: ExecutionOutcome, transport: Transport, timeout: Duration) -> ResponseBody {
    classify(outcome, transport).unwrap_or_else(|failure| ResponseBody::Envelope(failure.envelope(timeout)))
}
