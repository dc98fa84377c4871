//! Single-connection HTTP server that writes a response body in timed chunks.
//!
//! wiremock sends whole bodies at once; these tests need control over when
//! each byte arrives and over closing the socket early.

use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

/// Serves one request, answering `200` with the given `Content-Length`, then
/// writes `chunks` with `gap` between them and closes the connection.
///
/// Returns the server's base URL.
pub async fn serve_chunked_once(
    content_length: usize,
    chunks: Vec<Vec<u8>>,
    gap: Duration,
) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind raw server");
    let addr = listener.local_addr().expect("raw server address");

    tokio::spawn(async move {
        let Ok((mut socket, _)) = listener.accept().await else {
            return;
        };

        let mut request = Vec::new();
        let mut buf = [0u8; 1024];
        while !request.windows(4).any(|w| w == b"\r\n\r\n") {
            match socket.read(&mut buf).await {
                Ok(0) | Err(_) => return,
                Ok(n) => request.extend_from_slice(&buf[..n]),
            }
        }

        let head = format!(
            "HTTP/1.1 200 OK\r\nContent-Type: image/tiff\r\nContent-Length: {content_length}\r\nConnection: close\r\n\r\n"
        );
        if socket.write_all(head.as_bytes()).await.is_err() {
            return;
        }
        for chunk in chunks {
            tokio::time::sleep(gap).await;
            if socket.write_all(&chunk).await.is_err() || socket.flush().await.is_err() {
                return;
            }
        }
        let _ = socket.shutdown().await;
    });

    format!("http://{addr}")
}
