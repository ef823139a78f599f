use sandbox::{Result, SandboxError};

use crate::config::DockerConfig;

/// Verify the runtime client can be launched before accepting any work.
///
/// Collects all failures and returns them in a single error.
pub(crate) fn check_prerequisites(config: &DockerConfig) -> Result<()> {
    let mut errors = Vec::new();

    if let Err(e) = which::which(&config.runtime) {
        errors.push(format!(
            "container runtime not usable: {}: {e}",
            config.runtime.display()
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(SandboxError::RuntimeNotAvailable(errors.join("; ")))
    }
}

/// Reject configurations that would weaken the isolation request.
pub(crate) fn validate(config: &DockerConfig) -> Result<()> {
    let user = config.user.trim();
    if user.is_empty() {
        return Err(SandboxError::InvalidConfig(
            "sandbox user must not be empty".into(),
        ));
    }
    if user == "root" || user == "0" || user.starts_with("0:") || user.starts_with("root:") {
        return Err(SandboxError::InvalidConfig(format!(
            "sandbox user must be unprivileged, got {user}"
        )));
    }
    Ok(())
}
