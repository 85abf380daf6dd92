//! Plain-text HTTP endpoint for `/metrics` and `/health`

use anyhow::{Context, Result};
use std::net::SocketAddr;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, info, warn};

use crate::metrics::metrics;

/// Bind `0.0.0.0:port` and serve until the task is dropped
pub async fn endpoint_server(port: u16) -> Result<()> {
    let bind = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = TcpListener::bind(bind)
        .await
        .with_context(|| format!("Failed to bind metrics endpoint on {}", bind))?;

    info!(%bind, "Serving /metrics and /health");
    serve(listener).await
}

/// Accept loop over an already bound listener
pub async fn serve(listener: TcpListener) -> Result<()> {
    loop {
        let (socket, peer) = match listener.accept().await {
            Ok(accepted) => accepted,
            Err(e) => {
                warn!("Metrics endpoint accept failed: {}", e);
                continue;
            }
        };
        tokio::spawn(async move {
            if let Err(e) = handle_connection(socket).await {
                debug!(%peer, "Metrics request dropped: {}", e);
            }
        });
    }
}

/// One request per connection; the response closes it
async fn handle_connection(mut socket: TcpStream) -> std::io::Result<()> {
    let mut head = [0u8; 1024];
    let read = socket.read(&mut head).await?;
    let request = String::from_utf8_lossy(&head[..read]);
    socket.write_all(respond(request_path(&request)).as_bytes()).await?;
    socket.shutdown().await
}

fn request_path(request: &str) -> &str {
    request
        .lines()
        .next()
        .and_then(|line| line.split_whitespace().nth(1))
        .unwrap_or("/")
}

fn respond(path: &str) -> String {
    let (status, body) = match path {
        "/metrics" => match metrics().encode_text() {
            Ok(text) => ("200 OK", text),
            Err(e) => ("500 Internal Server Error", format!("failed to encode metrics: {}\n", e)),
        },
        "/health" => ("200 OK", "ok\n".to_string()),
        _ => ("404 Not Found", "not found\n".to_string()),
    };

    format!(
        "HTTP/1.1 {}\r\nContent-Type: text/plain; version=0.0.4\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        status,
        body.len(),
        body
    )
}
