//! Pull endpoint serving the metric store over HTTP.
//!
//! Prometheus only ever issues plain `GET` scrapes, so this is a minimal
//! HTTP/1.1 responder: one request per connection, any path answers with the
//! current metrics.

use crate::metrics::{CONTENT_TYPE, MetricStore};
use std::io;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// Upper bound for the request line and headers.
const MAX_REQUEST_HEAD: usize = 8 * 1024;

/// Time a client gets to send its request.
const READ_TIMEOUT: Duration = Duration::from_secs(10);

/// An HTTP response ready to be written.
#[derive(Debug, PartialEq)]
pub struct Response {
    pub status: &'static str,
    pub content_type: &'static str,
    pub body: String,
    /// Send headers only, as for `HEAD`
    pub head_only: bool,
}

impl Response {
    fn text(status: &'static str, body: &str) -> Self {
        Self {
            status,
            content_type: "text/plain; charset=utf-8",
            body: body.to_string(),
            head_only: false,
        }
    }

    /// Serialize status line, headers and body.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut head = format!(
            "HTTP/1.1 {}\r\nContent-Type: {}\r\nContent-Length: {}\r\nConnection: close\r\n",
            self.status,
            self.content_type,
            self.body.len()
        );
        if self.status.starts_with("405") {
            head.push_str("Allow: GET, HEAD\r\n");
        }
        head.push_str("\r\n");

        let mut bytes = head.into_bytes();
        if !self.head_only {
            bytes.extend_from_slice(self.body.as_bytes());
        }
        bytes
    }
}

/// Build the response for a raw request head.
pub fn respond(request_head: &str, store: &MetricStore) -> Response {
    let request_line = request_head.lines().next().unwrap_or_default();
    let mut parts = request_line.split_whitespace();

    let (Some(method), Some(_target), Some(version), None) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return Response::text("400 Bad Request", "bad request\n");
    };
    if !version.starts_with("HTTP/1.") {
        return Response::text("400 Bad Request", "bad request\n");
    }

    match method {
        "GET" | "HEAD" => Response {
            status: "200 OK",
            content_type: CONTENT_TYPE,
            body: store.render(),
            head_only: method == "HEAD",
        },
        _ => Response::text("405 Method Not Allowed", "method not allowed\n"),
    }
}

/// Answer a single request on `stream`.
pub async fn handle_connection<S>(mut stream: S, store: &MetricStore) -> io::Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let response = match tokio::time::timeout(READ_TIMEOUT, read_head(&mut stream)).await {
        Ok(Ok(Some(head))) => respond(&head, store),
        Ok(Ok(None)) => Response::text("400 Bad Request", "bad request\n"),
        Ok(Err(err)) => return Err(err),
        Err(_) => Response::text("408 Request Timeout", "request timeout\n"),
    };

    stream.write_all(&response.to_bytes()).await?;
    stream.shutdown().await
}

/// Read up to the blank line ending the headers; `None` if it never comes.
async fn read_head<S: AsyncRead + Unpin>(stream: &mut S) -> io::Result<Option<String>> {
    let mut buf = Vec::with_capacity(1024);
    let mut chunk = [0u8; 1024];

    loop {
        let n = stream.read(&mut chunk).await?;
        if n == 0 {
            return Ok(None);
        }
        buf.extend_from_slice(&chunk[..n]);

        if let Some(end) = find_head_end(&buf) {
            return Ok(Some(String::from_utf8_lossy(&buf[..end]).into_owned()));
        }
        if buf.len() > MAX_REQUEST_HEAD {
            return Ok(None);
        }
    }
}

fn find_head_end(buf: &[u8]) -> Option<usize> {
    buf.windows(4)
        .position(|w| w == b"\r\n\r\n")
        .or_else(|| buf.windows(2).position(|w| w == b"\n\n"))
}

/// Accept scrapes on `listener` until `shutdown` turns true.
pub async fn serve(
    listener: TcpListener,
    store: Arc<MetricStore>,
    mut shutdown: watch::Receiver<bool>,
) {
    if let Ok(addr) = listener.local_addr() {
        info!(%addr, "serving metrics");
    }

    loop {
        tokio::select! {
            accepted = listener.accept() => {
                let (stream, peer) = match accepted {
                    Ok(connection) => connection,
                    Err(error) => {
                        warn!(%error, "failed to accept connection");
                        continue;
                    }
                };
                let store = Arc::clone(&store);
                tokio::spawn(async move {
                    if let Err(error) = handle_connection(stream, &store).await {
                        debug!(%peer, %error, "scrape failed");
                    }
                });
            }
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }
        }
    }

    debug!("metrics server stopped");
}
