use std::path::PathBuf;

/// Absolute path of the container runtime client.
pub(crate) const DEFAULT_RUNTIME: &str = "/usr/bin/docker";
/// Unprivileged account baked into every backend image.
pub(crate) const DEFAULT_USER: &str = "netuser";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DockerConfig {
    /// Runtime client binary. Invoked directly, never through a shell.
    pub runtime: PathBuf,
    /// Arguments placed before the `run`/`rm` subcommand (e.g. a remote host flag).
    pub runtime_args: Vec<String>,
    /// User the sandboxed process runs as inside the container.
    pub user: String,
}

impl Default for DockerConfig {
    fn default() -> Self {
        Self {
            runtime: PathBuf::from(DEFAULT_RUNTIME),
            runtime_args: Vec::new(),
            user: DEFAULT_USER.to_string(),
        }
    }
}
