use std::time::Duration;

/// Memory cap applied by the container boundary (512 MiB).
pub(crate) const DEFAULT_MEMORY_MB: u32 = 512;
/// Wall-clock budget for a single invocation.
pub(crate) const DEFAULT_TIMEOUT: Duration = Duration::from_secs(15);
/// Cap on combined stdout + stderr (10 MiB).
pub(crate) const DEFAULT_MAX_OUTPUT_BYTES: usize = 10 * 1024 * 1024;

/// Per-invocation resource bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResourceLimits {
    pub memory_mb: u32,
    pub timeout: Duration,
    pub max_output_bytes: usize,
}

impl Default for ResourceLimits {
    fn default() -> Self {
        Self {
            memory_mb: DEFAULT_MEMORY_MB,
            timeout: DEFAULT_TIMEOUT,
            max_output_bytes: DEFAULT_MAX_OUTPUT_BYTES,
        }
    }
}

impl ResourceLimits {
    /// Memory flag value understood by container runtimes (e.g. `512M`).
    pub fn memory_flag(&self) -> String {
        format!("{}M", self.memory_mb)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_fixed_constants() {
        let limits = ResourceLimits::default();
        assert_eq!(limits.memory_mb, 512);
        assert_eq!(limits.timeout, Duration::from_secs(15));
        assert_eq!(limits.max_output_bytes, 10_485_760);
    }

    #[test]
    fn memory_flag_uses_megabyte_suffix() {
        assert_eq!(ResourceLimits::default().memory_flag(), "512M");
    }
}
