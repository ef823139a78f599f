mod config;
mod error;
mod invoker;
mod types;

pub use config::ResourceLimits;
pub use error::{Result, SandboxError};
pub use invoker::SandboxInvoker;
pub use types::{ExecutionOutcome, SandboxInvocation};
