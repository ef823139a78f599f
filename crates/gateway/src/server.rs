use std::future::Future;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum_server::Handle;
use axum_server::tls_rustls::RustlsConfig;
use sandbox::SandboxInvoker;
use tokio::net::TcpListener;
use tracing::info;

use crate::config::{GatewayConfig, ListenProfile, TlsConfig};
use crate::dispatch::Dispatcher;
use crate::error::{GatewayError, GatewayResult};
use crate::router::{AppState, create_router};

/// In-flight requests get this long to finish after a shutdown signal (TLS listener).
const SHUTDOWN_GRACE: Duration = Duration::from_secs(20);

/// The whole service, built once from config and then served.
pub struct Gateway {
    profile: ListenProfile,
    tls: TlsConfig,
    router: Router,
}

impl Gateway {
    pub fn new(config: &GatewayConfig, profile: ListenProfile, invoker: Arc<dyn SandboxInvoker>) -> Self {
        let state = AppState::new(Dispatcher::new(config, invoker));
        Self {
            profile,
            tls: config.tls.clone(),
            router: create_router(state),
        }
    }

    /// Bind the profile's address and serve until SIGTERM or SIGINT.
    pub async fn serve(self) -> GatewayResult<()> {
        let addr = self.profile.addr();
        if self.profile.tls() {
            let tls = load_tls(&self.tls).await?;
            info!(%addr, "listening (https)");

            let handle = Handle::new();
            let shutdown = handle.clone();
            tokio::spawn(async move {
                shutdown_signal().await;
                shutdown.graceful_shutdown(Some(SHUTDOWN_GRACE));
            });

            axum_server::bind_rustls(addr, tls)
                .handle(handle)
                .serve(self.router.into_make_service())
                .await
                .map_err(|source| GatewayError::Bind { addr, source })
        } else {
            let listener = TcpListener::bind(addr)
                .await
                .map_err(|source| GatewayError::Bind { addr, source })?;
            info!(%addr, "listening (http)");
            serve_plain(listener, self.router, shutdown_signal()).await
        }
    }
}

async fn serve_plain(
    listener: TcpListener,
    router: Router,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> GatewayResult<()> {
    let addr = listener.local_addr()?;
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(|source| GatewayError::Bind { addr, source })
}

/// Read the key, certificate and chain. The certificate and chain are
/// presented together as one chain.
async fn load_tls(tls: &TlsConfig) -> GatewayResult<RustlsConfig> {
    let key = read_pem(&tls.key).await?;
    let cert = read_pem(&tls.cert).await?;
    let chain = read_pem(&tls.chain).await?;

    RustlsConfig::from_pem(join_chain(cert, &chain), key)
        .await
        .map_err(|e| GatewayError::Tls(format!("invalid certificate or key: {e}")))
}

async fn read_pem(path: &Path) -> GatewayResult<Vec<u8>> {
    tokio::fs::read(path)
        .await
        .map_err(|e| GatewayError::Tls(format!("{}: {e}", path.display())))
}

fn join_chain(mut cert: Vec<u8>, chain: &[u8]) -> Vec<u8> {
    if !cert.is_empty() && !cert.ends_with(b"\n") {
        cert.push(b'\n');
    }
    cert.extend_from_slice(chain);
    cert
}

async fn shutdown_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    let mut sigterm = signal(SignalKind::terminate()).ok();
    let mut sigint = signal(SignalKind::interrupt()).ok();

    tokio::select! {
        _ = recv_signal(&mut sigterm) => {
            info!("received SIGTERM, shutting down");
        }
        _ = recv_signal(&mut sigint) => {
            info!("received SIGINT, shutting down");
        }
    }
}

async fn recv_signal(sig: &mut Option<tokio::signal::unix::Signal>) {
    match sig {
        Some(s) => {
            s.recv().await;
        }
        None => std::future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpStream;
    use tokio::sync::oneshot;

    use super::*;
    use crate::dispatch::tests::StubInvoker;
    use sandbox::ExecutionOutcome;

    #[test]
    fn chain_is_appended_after_certificate() {
        let joined = join_chain(b"CERT".to_vec(), b"CHAIN\n");
        assert_eq!(joined, b"CERT\nCHAIN\n");

        let joined = join_chain(b"CERT\n".to_vec(), b"CHAIN\n");
        assert_eq!(joined, b"CERT\nCHAIN\n");
    }

    #[tokio::test]
    async fn missing_tls_files_are_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let tls = TlsConfig {
            key: dir.path().join("privkey.pem"),
            cert: dir.path().join("cert.pem"),
            chain: dir.path().join("chain.pem"),
        };

        match load_tls(&tls).await {
            Err(GatewayError::Tls(msg)) => assert!(msg.contains("privkey.pem"), "{msg}"),
            Err(other) => panic!("unexpected error: {other}"),
            Ok(_) => panic!("expected failure"),
        }
    }

    #[tokio::test]
    async fn missing_chain_is_reported_by_path() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("privkey.pem"), "key").unwrap();
        std::fs::write(dir.path().join("cert.pem"), "cert").unwrap();
        let tls = TlsConfig {
            key: dir.path().join("privkey.pem"),
            cert: dir.path().join("cert.pem"),
            chain: dir.path().join("chain.pem"),
        };

        match load_tls(&tls).await {
            Err(GatewayError::Tls(msg)) => assert!(msg.contains("chain.pem"), "{msg}"),
            Err(other) => panic!("unexpected error: {other}"),
            Ok(_) => panic!("expected failure"),
        }
    }

    #[tokio::test]
    async fn plain_listener_serves_routes_until_shutdown() {
        let stub = Arc::new(StubInvoker::returning(ExecutionOutcome::TimedOut));
        let gateway = Gateway::new(&GatewayConfig::default(), ListenProfile::Http3000, stub);

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (tx, rx) = oneshot::channel::<()>();
        let server = tokio::spawn(serve_plain(listener, gateway.router, async move {
            let _ = rx.await;
        }));

        let mut stream = TcpStream::connect(addr).await.unwrap();
        stream
            .write_all(b"GET /exec_ruby HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n")
            .await
            .unwrap();
        let mut response = String::new();
        stream.read_to_string(&mut response).await.unwrap();

        assert!(response.starts_with("HTTP/1.1 200"), "{response}");
        assert!(response.contains("missing required parameter"), "{response}");

        tx.send(()).unwrap();
        server.await.unwrap().unwrap();
    }
}
