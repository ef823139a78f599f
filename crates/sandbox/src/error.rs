#[derive(Debug, thiserror::Error)]
pub enum SandboxError {
    #[error("runtime not available: {0}")]
    RuntimeNotAvailable(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

pub type Result<T> = std::result::Result<T, SandboxError>;
