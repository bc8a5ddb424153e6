//! Stub server: listener setup and the accept/serve loop.
//!
//! Each accepted connection is served on its own tokio task over HTTP/1.1;
//! TLS connections perform the rustls handshake before HTTP serving.
//! Handler state is the immutable route table and template registry, shared
//! behind an `Arc`.

mod handler;
mod tls;

pub use handler::HandlerState;
pub use tls::{create_acceptor, TlsError};

use crate::routes::RouteTable;
use crate::template::TemplateRegistry;
use handler::handle_request;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{error, info};

/// TLS material for the listener; the server terminates TLS only when
/// both paths are configured.
#[derive(Debug, Clone)]
pub struct TlsPaths {
    pub cert_path: PathBuf,
    pub key_path: PathBuf,
}

/// The stub server: immutable registries plus listener configuration.
pub struct StubServer {
    state: Arc<HandlerState>,
    port: u16,
    tls: Option<TlsPaths>,
}

impl StubServer {
    pub fn new(
        routes: RouteTable,
        templates: TemplateRegistry,
        port: u16,
        tls: Option<TlsPaths>,
    ) -> Self {
        Self {
            state: Arc::new(HandlerState { routes, templates }),
            port,
            tls,
        }
    }

    /// Bind the configured port on all interfaces and serve until the
    /// process exits.
    pub async fn run(self) -> Result<(), anyhow::Error> {
        let addr = SocketAddr::from(([0, 0, 0, 0], self.port));
        let listener = TcpListener::bind(addr).await?;
        self.serve(listener).await
    }

    /// Serve connections from an already-bound listener.
    ///
    /// Split from [`StubServer::run`] so callers (and tests) can bind an
    /// ephemeral port first and learn the local address.
    pub async fn serve(self, listener: TcpListener) -> Result<(), anyhow::Error> {
        let addr = listener.local_addr()?;

        let tls_acceptor = match &self.tls {
            Some(paths) => Some(create_acceptor(&paths.cert_path, &paths.key_path)?),
            None => None,
        };
        let scheme = if tls_acceptor.is_some() { "https" } else { "http" };

        info!("Listening on {}://{}", scheme, addr);
        info!(
            "Serving {} routes from {} compiled templates",
            self.state.routes.len(),
            self.state.templates.len()
        );

        let state = self.state;
        loop {
            let (stream, remote_addr) = listener.accept().await?;
            let state = Arc::clone(&state);
            let tls_acceptor = tls_acceptor.clone();

            tokio::spawn(async move {
                match tls_acceptor {
                    Some(acceptor) => match acceptor.accept(stream).await {
                        Ok(tls_stream) => {
                            let io = TokioIo::new(tls_stream);
                            let service = service_fn(move |req| {
                                let state = Arc::clone(&state);
                                async move { handle_request(state, req, remote_addr).await }
                            });

                            if let Err(err) =
                                http1::Builder::new().serve_connection(io, service).await
                            {
                                error!(
                                    "Error serving HTTPS connection from {}: {}",
                                    remote_addr, err
                                );
                            }
                        }
                        Err(err) => {
                            error!("TLS handshake failed from {}: {}", remote_addr, err);
                        }
                    },
                    None => {
                        let io = TokioIo::new(stream);
                        let service = service_fn(move |req| {
                            let state = Arc::clone(&state);
                            async move { handle_request(state, req, remote_addr).await }
                        });

                        if let Err(err) = http1::Builder::new().serve_connection(io, service).await
                        {
                            error!("Error serving HTTP connection from {}: {}", remote_addr, err);
                        }
                    }
                }
            });
        }
    }
}
