mod adapter;
mod config;
mod dispatch;
mod error;
mod jsonp;
mod normalizer;
mod router;
mod server;
mod types;

use std::fmt;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Instant;

use clap::Parser;
use sandbox_docker::DockerInvoker;
use tracing::info;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::time::FormatTime;

use crate::config::ListenProfile;
use crate::error::GatewayResult;
use crate::server::Gateway;

struct Elapsed(Instant);

impl FormatTime for Elapsed {
    fn format_time(&self, w: &mut tracing_subscriber::fmt::format::Writer<'_>) -> fmt::Result {
        let d = self.0.elapsed();
        let total_secs = d.as_secs();
        let mins = total_secs / 60;
        let secs = total_secs % 60;
        let millis = d.subsec_millis();
        write!(w, "[{mins:02}:{secs:02}:{millis:03}]")
    }
}

/// Run visualizer backends in throwaway containers and serve their traces over HTTP.
#[derive(Parser)]
#[command(name = "gateway", version)]
struct Cli {
    /// Listener profile (port and TLS)
    #[arg(value_enum, default_value_t = ListenProfile::Http)]
    profile: ListenProfile,

    /// YAML config file; built-in defaults apply when omitted
    #[arg(short, long, env = "GATEWAY_CONFIG")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_timer(Elapsed(Instant::now()))
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> GatewayResult<()> {
    let config = config::load(cli.config.as_deref()).await?;
    let invoker = DockerInvoker::new(config.container.docker_config())?;
    info!(
        profile = ?cli.profile,
        max_concurrent = config.limits.max_concurrent,
        timeout_secs = config.limits.timeout_secs,
        "starting gateway"
    );
    Gateway::new(&config, cli.profile, Arc::new(invoker)).serve().await
}
