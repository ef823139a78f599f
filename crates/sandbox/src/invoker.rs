use async_trait::async_trait;

use crate::types::{ExecutionOutcome, SandboxInvocation};

/// Runs a [`SandboxInvocation`] to completion inside an isolated boundary.
///
/// Implementations must request the isolation properties (no network, no
/// capabilities, unprivileged user) on every call, enforce the limits carried
/// by the invocation, and never retry. Failures are reported through the
/// returned outcome rather than an error so that every invocation yields
/// exactly one [`ExecutionOutcome`].
#[async_trait]
pub trait SandboxInvoker: Send + Sync {
    /// Human-readable name for this invoker implementation (e.g. "docker").
    fn name(&self) -> &str;

    async fn invoke(&self, invocation: &SandboxInvocation) -> ExecutionOutcome;
}
