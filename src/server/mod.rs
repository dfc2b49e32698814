//! Async HTTP/1.1 server using Tokio.
//!
//! Accepts connections from a [`Listener`] (TCP, TLS or a Unix socket) and
//! hands every parsed request to a [`Dispatcher`]. Handlers are synchronous,
//! so each dispatch runs on Tokio's blocking pool. HTTP/1.1 persistent
//! connections (keep-alive) are supported out of the box.

use std::net::SocketAddr;
use std::sync::Arc;

use bytes::BytesMut;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, error, info, warn};

use crate::dispatch::Dispatcher;
use crate::http::{
    Method, StatusCode,
    request::{Request, RequestError},
    response::Response,
};

pub mod listener;
pub mod tls;

#[cfg(unix)]
pub use listener::unix_listener;
pub use listener::{Listener, http_listener, tls_listener};
use listener::Connection;

/// Errors produced by the server.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to bind to {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("TLS configuration error: {0}")]
    Tls(#[from] rustls::Error),

    #[error("no certificate found in {}", path.display())]
    MissingCertificate { path: std::path::PathBuf },

    #[error("no private key found in {}", path.display())]
    MissingPrivateKey { path: std::path::PathBuf },
}

/// Default maximum size of a complete HTTP request we will buffer before rejecting it (8 MiB).
pub const MAX_REQUEST_SIZE: usize = 8 * 1024 * 1024;

/// Initial read buffer capacity per connection.
const INITIAL_BUF_SIZE: usize = 4096;

/// The pathmux HTTP server.
///
/// # Examples
///
/// ```rust,no_run
/// use pathmux::context::Context;
/// use pathmux::http::Method;
/// use pathmux::{Dispatcher, Server};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let mut dispatcher = Dispatcher::new();
///     dispatcher.static_route("/", |ctx: &mut Context| ctx.write("Hello!"), &[Method::Get]);
///
///     Server::bind("127.0.0.1:8080").await?.serve(dispatcher).await?;
///     Ok(())
/// }
/// ```
pub struct Server {
    listener: Listener,
    max_request_size: usize,
}

impl Server {
    /// Serves connections accepted from `listener`.
    pub fn new(listener: Listener) -> Self {
        Self {
            listener,
            max_request_size: MAX_REQUEST_SIZE,
        }
    }

    /// Binds a plain TCP listener to `addr` (`host:port`).
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::Bind`] if the address cannot be bound
    /// (e.g. port already in use, insufficient permissions).
    pub async fn bind(addr: impl AsRef<str>) -> Result<Self, ServerError> {
        let addr = addr.as_ref();
        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .map_err(|e| ServerError::Bind {
                addr: addr.to_owned(),
                source: e,
            })?;
        Ok(Self::new(Listener::Tcp(listener)))
    }

    /// Returns the local TCP address, or `None` for a Unix socket.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.listener.local_addr()
    }

    /// Largest request (headers plus body) accepted before answering `413`.
    #[must_use]
    pub fn max_request_size(mut self, bytes: usize) -> Self {
        self.max_request_size = bytes;
        self
    }

    /// Starts accepting connections and dispatching requests.
    ///
    /// The dispatcher is moved into an [`Arc`] shared by every connection
    /// task; routes can no longer change once serving starts.
    ///
    /// This method runs until the process is terminated.
    ///
    /// # Errors
    ///
    /// Accept failures are logged and retried, so this currently only returns
    /// when the surrounding task is cancelled.
    pub async fn serve(self, dispatcher: Dispatcher) -> Result<(), ServerError> {
        let dispatcher = Arc::new(dispatcher);
        match self.listener.local_addr() {
            Some(address) => info!(%address, "pathmux listening"),
            None => info!("pathmux listening on unix socket"),
        }

        loop {
            let (connection, peer) = match self.listener.accept().await {
                Ok(pair) => pair,
                Err(e) => {
                    error!(error = %e, "failed to accept connection");
                    continue;
                }
            };

            debug!(%peer, "connection accepted");
            let dispatcher = Arc::clone(&dispatcher);
            let max_request_size = self.max_request_size;

            tokio::spawn(async move {
                let result = match connection {
                    Connection::Plain(stream) => {
                        handle_connection(stream, &peer, dispatcher, max_request_size).await
                    }
                    Connection::Tls(acceptor, stream) => match acceptor.accept(stream).await {
                        Ok(stream) => {
                            handle_connection(stream, &peer, dispatcher, max_request_size).await
                        }
                        Err(e) => {
                            warn!(%peer, error = %e, "TLS handshake failed");
                            return;
                        }
                    },
                    #[cfg(unix)]
                    Connection::Unix(stream) => {
                        handle_connection(stream, &peer, dispatcher, max_request_size).await
                    }
                };
                if let Err(e) = result {
                    warn!(%peer, error = %e, "connection closed with error");
                }
            });
        }
    }
}

/// Handles a single connection over its lifetime.
///
/// HTTP/1.1 connections are persistent by default: we loop, answering every
/// complete request in the buffer, until the peer closes the connection or
/// signals `Connection: close`.
async fn handle_connection<S>(
    mut stream: S,
    peer: &str,
    dispatcher: Arc<Dispatcher>,
    max_request_size: usize,
) -> Result<(), std::io::Error>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut buf = BytesMut::with_capacity(INITIAL_BUF_SIZE);

    loop {
        if buf.len() > max_request_size {
            return reject_too_large(&mut stream, peer).await;
        }

        match Request::parse(&buf) {
            Ok((request, body_offset)) => {
                let total_needed = body_offset + request.content_length().unwrap_or(0);
                if total_needed > max_request_size {
                    return reject_too_large(&mut stream, peer).await;
                }

                // Complete once the whole body is buffered; otherwise read more.
                if buf.len() >= total_needed {
                    let keep_alive = request.is_keep_alive();
                    let response = dispatch(&dispatcher, request, peer).await;
                    stream
                        .write_all(&response.keep_alive(keep_alive).into_bytes())
                        .await?;
                    stream.flush().await?;

                    // Drop the consumed request bytes from the buffer.
                    let _ = buf.split_to(total_needed);

                    if !keep_alive {
                        debug!(%peer, "Connection: close, shutting down");
                        return Ok(());
                    }
                    continue;
                }
            }
            // Headers not yet fully received.
            Err(RequestError::Incomplete) => {}
            Err(e) => {
                warn!(%peer, error = %e, "bad request, sending 400");
                let response = Response::new(StatusCode::BAD_REQUEST)
                    .body(format!("Bad Request: {e}"))
                    .keep_alive(false);
                stream.write_all(&response.into_bytes()).await?;
                return Ok(());
            }
        }

        if stream.read_buf(&mut buf).await? == 0 {
            debug!(%peer, "connection closed by peer");
            return Ok(());
        }
    }
}

// Runs the synchronous dispatcher on the blocking pool.
async fn dispatch(dispatcher: &Arc<Dispatcher>, request: Request, peer: &str) -> Response {
    let is_head = *request.method() == Method::Head;
    debug!(
        %peer,
        method = %request.method(),
        path = %request.path(),
        "dispatching request"
    );

    let dispatcher = Arc::clone(dispatcher);
    let response = match tokio::task::spawn_blocking(move || dispatcher.dispatch(request)).await {
        Ok(response) => response,
        Err(e) => {
            error!(%peer, error = %e, "dispatch task failed");
            Response::new(StatusCode::INTERNAL_SERVER_ERROR)
                .body(StatusCode::INTERNAL_SERVER_ERROR.canonical_reason())
        }
    };
    response.omit_body(is_head)
}

async fn reject_too_large<S>(stream: &mut S, peer: &str) -> Result<(), std::io::Error>
where
    S: AsyncWrite + Unpin,
{
    warn!(%peer, "request too large, sending 413");
    let response = Response::new(StatusCode::PAYLOAD_TOO_LARGE)
        .body("Request entity too large")
        .keep_alive(false);
    stream.write_all(&response.into_bytes()).await
}

#[cfg(test)]
mod tests {
    use tokio::io::duplex;

    use super::*;
    use crate::context::Context;

    fn dispatcher() -> Arc<Dispatcher> {
        let mut dispatcher = Dispatcher::new();
        dispatcher
            .static_route("/", |ctx: &mut Context| ctx.write("root"), &[Method::Get, Method::Head])
            .static_route(
                "/echo/",
                |ctx: &mut Context| {
                    let body = ctx.request().body().clone();
                    ctx.write(body);
                },
                &[Method::Post],
            );
        Arc::new(dispatcher)
    }

    async fn exchange(raw: &[u8], max_request_size: usize) -> String {
        let (mut client, server) = duplex(64 * 1024);
        let task = tokio::spawn(async move {
            handle_connection(server, "test", dispatcher(), max_request_size).await
        });
        client.write_all(raw).await.unwrap();
        client.shutdown().await.unwrap();

        let mut out = Vec::new();
        client.read_to_end(&mut out).await.unwrap();
        task.await.unwrap().unwrap();
        String::from_utf8(out).unwrap()
    }

    #[tokio::test]
    async fn serves_simple_get() {
        let out = exchange(b"GET / HTTP/1.1\r\nHost: x\r\nConnection: close\r\n\r\n", MAX_REQUEST_SIZE).await;
        assert!(out.starts_with("HTTP/1.1 200 OK\r\n"), "{out}");
        assert!(out.ends_with("\r\n\r\nroot"));
    }

    #[tokio::test]
    async fn pipelined_requests_answered_in_order() {
        let raw = b"POST /echo/ HTTP/1.1\r\nContent-Length: 3\r\n\r\nabcGET / HTTP/1.1\r\nConnection: close\r\n\r\n";
        let out = exchange(raw, MAX_REQUEST_SIZE).await;
        let first = out.find("abc").unwrap();
        let second = out.find("root").unwrap();
        assert!(first < second);
        assert_eq!(out.matches("HTTP/1.1 200 OK").count(), 2);
    }

    #[tokio::test]
    async fn head_omits_body() {
        let out = exchange(b"HEAD / HTTP/1.1\r\nConnection: close\r\n\r\n", MAX_REQUEST_SIZE).await;
        assert!(out.contains("Content-Length: 4\r\n"));
        assert!(out.ends_with("\r\n\r\n"));
    }

    #[tokio::test]
    async fn malformed_request_gets_400() {
        let out = exchange(b"NOT A\0 REQUEST\r\n\r\n", MAX_REQUEST_SIZE).await;
        assert!(out.starts_with("HTTP/1.1 400 Bad Request\r\n"), "{out}");
        assert!(out.contains("Connection: close\r\n"));
    }

    #[tokio::test]
    async fn undecodable_path_gets_400() {
        let out = exchange(b"GET /%ff/ HTTP/1.1\r\n\r\n", MAX_REQUEST_SIZE).await;
        assert!(out.starts_with("HTTP/1.1 400 Bad Request\r\n"), "{out}");
    }

    #[tokio::test]
    async fn oversized_body_gets_413() {
        let out = exchange(b"POST /echo/ HTTP/1.1\r\nContent-Length: 1000\r\n\r\n", 256).await;
        assert!(out.starts_with("HTTP/1.1 413 Payload Too Large\r\n"), "{out}");
    }

    #[tokio::test]
    async fn unknown_route_is_404_and_connection_survives() {
        let raw = b"GET /nope/ HTTP/1.1\r\n\r\nGET / HTTP/1.1\r\nConnection: close\r\n\r\n";
        let out = exchange(raw, MAX_REQUEST_SIZE).await;
        assert!(out.starts_with("HTTP/1.1 404 Not Found\r\n"));
        assert!(out.ends_with("root"));
    }
}
