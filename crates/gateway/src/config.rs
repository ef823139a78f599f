use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::ValueEnum;
use sandbox::ResourceLimits;
use sandbox_docker::DockerConfig;
use serde::{Deserialize, Serialize};
use tokio::sync::Semaphore;

use crate::error::{GatewayError, GatewayResult};

pub(crate) const DEFAULT_JS_IMAGE: &str = "pgbovine/cokapi-js:v1";
pub(crate) const DEFAULT_JAVA_IMAGE: &str = "pgbovine/cokapi-java:v1";
pub(crate) const DEFAULT_RUBY_IMAGE: &str = "pgbovine/cokapi-ruby:v1";
pub(crate) const DEFAULT_C_CPP_IMAGE: &str = "pgbovine/opt-cpp-backend:v1";

const DEFAULT_TLS_DIR: &str = "/etc/letsencrypt/live/cokapi.com";

// ---------------------------------------------------------------------------
// Listener profile
// ---------------------------------------------------------------------------

/// The four fixed (port, transport-security) combinations the server can
/// start with. Anything else is rejected before binding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ListenProfile {
    /// Plain HTTP on port 80 (same as giving no selector)
    #[value(name = "http")]
    Http,
    /// HTTPS on port 443
    #[value(name = "https")]
    Https,
    /// Plain HTTP on port 3000
    #[value(name = "http3000")]
    Http3000,
    /// HTTPS on port 8001
    #[value(name = "https8001")]
    Https8001,
}

impl ListenProfile {
    pub fn port(self) -> u16 {
        match self {
            ListenProfile::Http => 80,
            ListenProfile::Https => 443,
            ListenProfile::Http3000 => 3000,
            ListenProfile::Https8001 => 8001,
        }
    }

    pub fn tls(self) -> bool {
        matches!(self, ListenProfile::Https | ListenProfile::Https8001)
    }

    /// Listen on all interfaces.
    pub fn addr(self) -> SocketAddr {
        SocketAddr::from(([0, 0, 0, 0], self.port()))
    }
}

// ---------------------------------------------------------------------------
// Config file
// ---------------------------------------------------------------------------

/// Everything the gateway needs besides the listener profile. Every section
/// defaults to the fixed production constants, so the file is optional.
#[derive(Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    pub limits: LimitsConfig,
    pub container: ContainerConfig,
    pub images: ImagesConfig,
    pub tls: TlsConfig,
}

#[derive(Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    pub memory_mb: u32,
    pub timeout_secs: u64,
    pub max_output_bytes: usize,
    /// Sandboxes allowed to run at once across all requests.
    pub max_concurrent: usize,
    /// How long a request may wait for a free slot. Defaults to `timeout_secs`.
    pub admission_timeout_secs: Option<u64>,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        let defaults = ResourceLimits::default();
        Self {
            memory_mb: defaults.memory_mb,
            timeout_secs: defaults.timeout.as_secs(),
            max_output_bytes: defaults.max_output_bytes,
            max_concurrent: default_max_concurrent(),
            admission_timeout_secs: None,
        }
    }
}

fn default_max_concurrent() -> usize {
    num_cpus::get().saturating_mul(4).max(1)
}

impl LimitsConfig {
    pub fn resource_limits(&self) -> ResourceLimits {
        ResourceLimits {
            memory_mb: self.memory_mb,
            timeout: Duration::from_secs(self.timeout_secs),
            max_output_bytes: self.max_output_bytes,
        }
    }

    pub fn admission_timeout(&self) -> Duration {
        Duration::from_secs(self.admission_timeout_secs.unwrap_or(self.timeout_secs))
    }
}

#[derive(Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContainerConfig {
    pub runtime: PathBuf,
    pub runtime_args: Vec<String>,
    pub user: String,
}

impl Default for ContainerConfig {
    fn default() -> Self {
        let defaults = DockerConfig::default();
        Self {
            runtime: defaults.runtime,
            runtime_args: defaults.runtime_args,
            user: defaults.user,
        }
    }
}

impl ContainerConfig {
    pub fn docker_config(&self) -> DockerConfig {
        DockerConfig {
            runtime: self.runtime.clone(),
            runtime_args: self.runtime_args.clone(),
            user: self.user.clone(),
        }
    }
}

/// Backend image per adapter.
#[derive(Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImagesConfig {
    pub javascript: String,
    pub java: String,
    pub ruby: String,
    pub c_cpp: String,
}

impl Default for ImagesConfig {
    fn default() -> Self {
        Self {
            javascript: DEFAULT_JS_IMAGE.into(),
            java: DEFAULT_JAVA_IMAGE.into(),
            ruby: DEFAULT_RUBY_IMAGE.into(),
            c_cpp: DEFAULT_C_CPP_IMAGE.into(),
        }
    }
}

impl ImagesConfig {
    fn entries(&self) -> [(&'static str, &str); 4] {
        [
            ("javascript", self.javascript.as_str()),
            ("java", self.java.as_str()),
            ("ruby", self.ruby.as_str()),
            ("c_cpp", self.c_cpp.as_str()),
        ]
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TlsConfig {
    pub key: PathBuf,
    pub cert: PathBuf,
    pub chain: PathBuf,
}

impl Default for TlsConfig {
    fn default() -> Self {
        let dir = Path::new(DEFAULT_TLS_DIR);
        Self {
            key: dir.join("privkey.pem"),
            cert: dir.join("cert.pem"),
            chain: dir.join("chain.pem"),
        }
    }
}

/// Load and validate the gateway config. `None` yields the built-in defaults.
///
/// Relative TLS paths are resolved against the config file's parent directory.
pub async fn load(path: Option<&Path>) -> GatewayResult<GatewayConfig> {
    let Some(path) = path else {
        let config = GatewayConfig::default();
        validate(&config)?;
        return Ok(config);
    };

    let content = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| GatewayError::Config(format!("read {}: {e}", path.display())))?;
    let mut config: GatewayConfig = serde_yaml_ng::from_str(&content)
        .map_err(|e| GatewayError::Config(format!("parse {}: {e}", path.display())))?;
    if let Some(config_dir) = path.parent() {
        config.resolve_relative_paths(config_dir);
    }
    validate(&config)?;
    Ok(config)
}

fn validate(config: &GatewayConfig) -> GatewayResult<()> {
    let limits = &config.limits;
    if limits.memory_mb == 0 {
        return Err(GatewayError::Config("limits.memory_mb must be > 0".into()));
    }
    if limits.timeout_secs == 0 {
        return Err(GatewayError::Config("limits.timeout_secs must be > 0".into()));
    }
    if limits.max_output_bytes == 0 {
        return Err(GatewayError::Config(
            "limits.max_output_bytes must be > 0".into(),
        ));
    }
    if limits.max_concurrent == 0 {
        return Err(GatewayError::Config(
            "limits.max_concurrent must be > 0".into(),
        ));
    }
    if limits.max_concurrent > Semaphore::MAX_PERMITS {
        return Err(GatewayError::Config(format!(
            "limits.max_concurrent must be <= {}",
            Semaphore::MAX_PERMITS
        )));
    }
    if config.container.user.trim().is_empty() {
        return Err(GatewayError::Config("container.user must not be empty".into()));
    }

    let entries = config.images.entries();
    for (i, (label, image)) in entries.iter().enumerate() {
        if image.trim().is_empty() {
            return Err(GatewayError::Config(format!("images.{label} must not be empty")));
        }
        if let Some((other, _)) = entries.iter().skip(i + 1).find(|(_, o)| o == image) {
            return Err(GatewayError::Config(format!(
                "images.{label} and images.{other} must not share image {image}"
            )));
        }
    }
    Ok(())
}

impl GatewayConfig {
    fn resolve_relative_paths(&mut self, config_dir: &Path) {
        let resolve = |p: &mut PathBuf| {
            if p.is_relative() {
                *p = config_dir.join(&*p);
            }
        };
        resolve(&mut self.tls.key);
        resolve(&mut self.tls.cert);
        resolve(&mut self.tls.chain);
    }
}
