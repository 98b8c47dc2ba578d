use super::types::{Request, StreamChunk};
use std::path::Path;
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::UnixListener;
use tokio::sync::mpsc;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Connection closed before a request was received")]
    EmptyRequest,
}

pub type Result<T> = std::result::Result<T, TransportError>;

/// Unix socket transport for IPC communication.
pub struct UnixSocketTransport {
    socket_path: String,
}

impl UnixSocketTransport {
    pub fn new(socket_path: impl Into<String>) -> Self {
        Self {
            socket_path: socket_path.into(),
        }
    }

    pub fn socket_path(&self) -> &str {
        &self.socket_path
    }

    /// Binds to the Unix socket, replacing a stale socket file, and restricts
    /// it to the current user.
    pub async fn bind(&self) -> Result<UnixListener> {
        if Path::new(&self.socket_path).exists() {
            std::fs::remove_file(&self.socket_path)?;
        }

        let listener = UnixListener::bind(&self.socket_path)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let perms = std::fs::Permissions::from_mode(0o600);
            std::fs::set_permissions(&self.socket_path, perms)?;
        }

        Ok(listener)
    }

    /// Cleans up the socket file.
    pub fn cleanup(&self) {
        let _ = std::fs::remove_file(&self.socket_path);
    }
}

/// Reads one newline-terminated request.
pub async fn read_request<R: AsyncRead + Unpin>(reader: R) -> Result<Request> {
    let mut reader = BufReader::new(reader);
    let mut line = String::new();

    if reader.read_line(&mut line).await? == 0 {
        return Err(TransportError::EmptyRequest);
    }
    let request = serde_json::from_str(line.trim_end())?;

    Ok(request)
}

/// Writes one chunk as a JSON line.
pub async fn write_chunk<W: AsyncWrite + Unpin>(writer: &mut W, chunk: &StreamChunk) -> Result<()> {
    let json = serde_json::to_string(chunk)?;
    writer.write_all(json.as_bytes()).await?;
    writer.write_all(b"\n").await?;
    writer.flush().await?;
    Ok(())
}

/// Writes each chunk as one JSON line until the sender side closes.
pub async fn write_chunks<W: AsyncWrite + Unpin>(
    mut writer: W,
    mut receiver: mpsc::UnboundedReceiver<StreamChunk>,
) -> Result<()> {
    while let Some(chunk) = receiver.recv().await {
        write_chunk(&mut writer, &chunk).await?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncReadExt;
    use tokio::net::UnixStream;

    #[tokio::test]
    async fn test_read_request_line() {
        let (mut client, server) = UnixStream::pair().unwrap();
        client.write_all(b"{\"type\":\"stats\"}\n").await.unwrap();

        let request = read_request(server).await.unwrap();
        assert!(matches!(request, Request::Stats));
    }

    #[tokio::test]
    async fn test_unknown_request_type_is_json_error() {
        let (mut client, server) = UnixStream::pair().unwrap();
        client.write_all(b"{\"type\":\"reindex_all\"}\n").await.unwrap();

        assert!(matches!(
            read_request(server).await,
            Err(TransportError::Json(_))
        ));
    }

    #[tokio::test]
    async fn test_closed_connection_is_empty_request() {
        let (client, server) = UnixStream::pair().unwrap();
        drop(client);

        assert!(matches!(
            read_request(server).await,
            Err(TransportError::EmptyRequest)
        ));
    }

    #[tokio::test]
    async fn test_write_chunks_one_per_line() {
        let (mut client, server) = UnixStream::pair().unwrap();
        let (sender, receiver) = mpsc::unbounded_channel();
        sender.send(StreamChunk::chunk("a")).unwrap();
        sender.send(StreamChunk::done("ab")).unwrap();
        drop(sender);

        write_chunks(server, receiver).await.unwrap();

        let mut output = String::new();
        client.read_to_string(&mut output).await.unwrap();
        let lines: Vec<&str> = output.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[1].starts_with("{\"type\":\"done\""));
    }
}
