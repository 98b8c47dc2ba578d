//! Unix socket server exposing ingestion and chat.
//!
//! The server is organized into separate concerns:
//! - `types`: Protocol types for requests and responses
//! - `handler`: Business logic for processing requests
//! - `transport`: Unix socket communication layer
//!
//! Each connection carries one request line and receives newline-delimited
//! [`StreamChunk`] frames until the server closes it.

mod handler;
mod transport;
mod types;

pub use transport::TransportError;
pub use types::{ChunkType, Request, StreamChunk};

use crate::service::RagService;
use std::sync::Arc;
use tokio::signal;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

/// Main server coordinating transport and request handling.
pub struct Server {
    handler: Arc<handler::RequestHandler>,
    transport: transport::UnixSocketTransport,
}

impl Server {
    /// Creates a server listening on `server.socket_path` of the service's
    /// configuration.
    pub fn new(service: RagService) -> Self {
        let transport = transport::UnixSocketTransport::new(&service.config().server.socket_path);
        let handler = Arc::new(handler::RequestHandler::new(service));

        Self { handler, transport }
    }

    pub fn socket_path(&self) -> &str {
        self.transport.socket_path()
    }

    /// Starts the server and listens for connections until Ctrl-C.
    pub async fn start(&self) -> Result<(), TransportError> {
        let listener = self.transport.bind().await?;

        info!(socket = %self.transport.socket_path(), "server listening");

        let shutdown = signal::ctrl_c();
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                accepted = listener.accept() => match accepted {
                    Ok((stream, _)) => {
                        let handler = Arc::clone(&self.handler);
                        tokio::spawn(async move {
                            if let Err(e) = handle_connection(stream, handler).await {
                                error!(error = %e, "connection error");
                            }
                        });
                    }
                    Err(e) => error!(error = %e, "failed to accept connection"),
                },
                _ = &mut shutdown => {
                    info!("shutting down");
                    self.transport.cleanup();
                    break;
                }
            }
        }

        Ok(())
    }
}

/// Handles a single client connection.
async fn handle_connection(
    stream: tokio::net::UnixStream,
    handler: Arc<handler::RequestHandler>,
) -> Result<(), TransportError> {
    let (reader, mut writer) = stream.into_split();
    let request = match transport::read_request(reader).await {
        Ok(request) => request,
        Err(TransportError::Json(e)) => {
            warn!(error = %e, "malformed request");
            let reply = StreamChunk::error(format!("Invalid request: {}", e));
            return transport::write_chunk(&mut writer, &reply).await;
        }
        Err(e) => return Err(e),
    };
    debug!(?request, "request received");

    let (sender, receiver) = mpsc::unbounded_channel();

    let handle_task = tokio::spawn(async move {
        handler.handle(request, sender).await;
    });

    let write_task = tokio::spawn(transport::write_chunks(writer, receiver));

    let (handled, written) = tokio::join!(handle_task, write_task);
    if let Err(e) = handled {
        error!(error = %e, "request handler panicked");
    }
    match written {
        Ok(result) => result,
        Err(e) => {
            error!(error = %e, "response writer panicked");
            Ok(())
        }
    }
}
