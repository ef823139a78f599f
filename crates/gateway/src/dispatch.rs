use std::sync::Arc;
use std::time::Duration;

use sandbox::{ExecutionOutcome, ResourceLimits, SandboxInvoker};
use tokio::sync::Semaphore;
use tracing::{Instrument, debug, error, info, info_span, warn};

use crate::adapter::AdapterSet;
use crate::config::GatewayConfig;
use crate::normalizer::{self, ExecutionFailure, ResponseBody};
use crate::types::ExecutionRequest;

/// Runs one request through adapter, invoker and normalizer.
///
/// Shared by every handler. The only state that crosses requests is the
/// admission semaphore.
pub struct Dispatcher {
    invoker: Arc<dyn SandboxInvoker>,
    adapters: AdapterSet,
    limits: ResourceLimits,
    permits: Arc<Semaphore>,
    admission_timeout: Duration,
}

impl Dispatcher {
    pub fn new(config: &GatewayConfig, invoker: Arc<dyn SandboxInvoker>) -> Self {
        Self {
            invoker,
            adapters: AdapterSet::new(&config.images),
            limits: config.limits.resource_limits(),
            permits: Arc::new(Semaphore::new(config.limits.max_concurrent.min(Semaphore::MAX_PERMITS))),
            admission_timeout: config.limits.admission_timeout(),
        }
    }

    pub fn timeout(&self) -> Duration {
        self.limits.timeout
    }

    pub async fn execute(&self, request: &ExecutionRequest) -> ResponseBody {
        let request_id = uuid::Uuid::new_v4();
        let span = info_span!(
            "exec",
            request_id = %request_id,
            language = %request.language,
            invoker = self.invoker.name(),
        );
        self.execute_inner(request).instrument(span).await
    }

    async fn execute_inner(&self, request: &ExecutionRequest) -> ResponseBody {
        let permit = match tokio::time::timeout(self.admission_timeout, self.permits.clone().acquire_owned()).await
        {
            Ok(Ok(permit)) => permit,
            Ok(Err(_)) => {
                error!("admission semaphore closed unexpectedly");
                return self.failure(ExecutionFailure::Overloaded);
            }
            Err(_) => {
                warn!(wait = ?self.admission_timeout, "no sandbox slot available");
                return self.failure(ExecutionFailure::Overloaded);
            }
        };

        let adapter = self.adapters.for_language(request.language);
        let invocation = adapter.build(request, self.limits);
        debug!(image = adapter.image(), program = %invocation.program, "invoking sandbox");

        // The invocation owns its permit and runs to completion even if the
        // client goes away and this future is dropped.
        let invoker = Arc::clone(&self.invoker);
        let task = tokio::spawn(
            async move {
                let outcome = invoker.invoke(&invocation).await;
                drop(permit);
                outcome
            }
            .in_current_span(),
        );

        let outcome = match task.await {
            Ok(outcome) => outcome,
            Err(e) => {
                error!(error = %e, "sandbox task panicked");
                ExecutionOutcome::SpawnError {
                    cause: format!("internal error: {e}"),
                }
            }
        };
        info!(outcome = outcome.kind(), "sandbox finished");

        normalizer::normalize(outcome, request.transport, self.limits.timeout)
    }

    fn failure(&self, failure: ExecutionFailure) -> ResponseBody {
        ResponseBody::Envelope(failure.envelope(self.limits.timeout))
    }
}
