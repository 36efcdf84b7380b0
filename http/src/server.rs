use std::net::SocketAddr;

use hyper::server::conn::http1;
use hyper_util::rt::TokioIo;
use hyper_util::service::TowerToHyperService;
use thiserror::Error;
use tokio::net::TcpListener;

use crate::service::CompatService;

#[derive(Error, Debug)]
pub enum ServeError {
    #[error("invalid listen address: {0}")]
    Addr(#[from] std::net::AddrParseError),
    #[error("server I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Accept HTTP/1 connections on `addr` until the listener fails.
pub async fn serve(addr: &str, service: CompatService) -> Result<(), ServeError> {
    let addr: SocketAddr = addr.parse()?;
    let listener = TcpListener::bind(addr).await?;
    tracing::info!("webcompat listening on http://{}", listener.local_addr()?);

    loop {
        let (stream, peer) = match listener.accept().await {
            Ok(conn) => conn,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to accept connection");
                continue;
            }
        };
        let io = TokioIo::new(stream);
        let svc = TowerToHyperService::new(service.clone());

        tokio::task::spawn(async move {
            if let Err(err) = http1::Builder::new().serve_connection(io, svc).await {
                tracing::error!(%peer, "Error serving connection: {:?}", err);
            }
        });
    }
}
