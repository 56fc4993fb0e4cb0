//! Async TCP server using Tokio — the boundary adapter around the dispatcher.
//!
//! Accepts TCP connections, parses HTTP/1.1 requests, and resolves each one
//! through a shared [`VhostDispatcher`]. Supports HTTP/1.1 persistent
//! connections (keep-alive) out of the box.
//!
//! The engine itself never catches operation failures; this module owns the
//! fallback ladder. Unmatched routes and [`HandlerError::NotFound`] go to the
//! vhost's registered 404 handler (generic `404` otherwise), `Forbidden` to
//! the 403 handler, `Failure` to the 500 handler, and `Redirect` becomes a
//! `301`/`302` response directly.

use std::net::SocketAddr;
use std::sync::Arc;

use bytes::BytesMut;
use thiserror::Error;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, error, info, warn};

use crate::dispatch::{Resolved, VhostDispatcher};
use crate::http::{
    StatusCode,
    request::{Request, RequestError},
    response::Response,
};
use crate::route::HandlerError;

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
}

/// Maximum size of a complete HTTP request we will buffer before rejecting it (8 MiB).
const MAX_REQUEST_SIZE: usize = 8 * 1024 * 1024;

/// Initial read buffer capacity per connection.
const INITIAL_BUF_SIZE: usize = 4096;

/// The plugweb HTTP server.
///
/// Binds to a TCP address and resolves incoming HTTP/1.1 requests against a
/// [`VhostDispatcher`] built at load time.
///
/// # Examples
///
/// ```rust,no_run
/// use plugweb::dispatch::VhostDispatcher;
/// use plugweb::http::Response;
/// use plugweb::route::Plug;
/// use plugweb::server::Server;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let site = Plug::root().bind("hello", || async { Ok(Response::html("Hello!")) })?;
///     let mut dispatcher = VhostDispatcher::new();
///     dispatcher.register("localhost", &site);
///
///     let server = Server::bind("127.0.0.1:8080").await?;
///     server.serve(dispatcher).await?;
///     Ok(())
/// }
/// ```
pub struct Server {
    listener: TcpListener,
    local_addr: SocketAddr,
}

impl Server {
    /// Binds the server to the given TCP address.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::Bind`] if the address cannot be bound
    /// (e.g. port already in use, insufficient permissions).
    pub async fn bind(addr: impl AsRef<str>) -> Result<Self, ServerError> {
        let addr = addr.as_ref();
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| ServerError::Bind {
                addr: addr.to_owned(),
                source: e,
            })?;
        let local_addr = listener.local_addr()?;
        Ok(Self {
            listener,
            local_addr,
        })
    }

    /// Returns the local address the server is bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Starts accepting connections and resolving requests through
    /// `dispatcher`.
    ///
    /// The dispatcher is wrapped in an [`Arc`] and shared read-only across
    /// all spawned Tokio tasks — its tables must be fully built before this
    /// call, and nothing mutates them afterwards.
    ///
    /// This method runs until the process is terminated or an unrecoverable
    /// listener error occurs.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::Io`] if the TCP listener itself fails.
    pub async fn serve(self, dispatcher: VhostDispatcher) -> Result<(), ServerError> {
        let dispatcher = Arc::new(dispatcher);
        info!(address = %self.local_addr, "plugweb listening");

        loop {
            let (stream, peer_addr) = match self.listener.accept().await {
                Ok(pair) => pair,
                Err(e) => {
                    error!(error = %e, "failed to accept connection");
                    continue;
                }
            };

            debug!(peer = %peer_addr, "connection accepted");
            let dispatcher = Arc::clone(&dispatcher);

            tokio::spawn(async move {
                if let Err(e) = handle_connection(stream, peer_addr, dispatcher).await {
                    warn!(peer = %peer_addr, error = %e, "connection closed with error");
                }
            });
        }
    }
}

/// Resolves one request to its final response, applying the error-handler
/// fallback ladder.
///
/// This is the whole boundary contract in one place: handlers never see
/// unmatched routes, and operation failures always become a response here.
pub async fn respond(dispatcher: &VhostDispatcher, request: &Request) -> Response {
    let vhost = request.hostname().unwrap_or("");
    let path = request.path();

    match dispatcher.resolve(vhost, path).await {
        Ok(Resolved::Response(response)) => response,
        Ok(Resolved::NoRoute) | Ok(Resolved::UnknownHost) => {
            debug!(%vhost, %path, "no route matched");
            error_response(dispatcher, vhost, StatusCode::NotFound).await
        }
        Err(HandlerError::NotFound) => {
            error_response(dispatcher, vhost, StatusCode::NotFound).await
        }
        Err(HandlerError::Forbidden) => {
            error_response(dispatcher, vhost, StatusCode::Forbidden).await
        }
        Err(HandlerError::Redirect { to, permanent }) => {
            if permanent {
                Response::permanent_redirect(to)
            } else {
                Response::redirect(to)
            }
        }
        Err(HandlerError::Failure(message)) => {
            error!(%vhost, %path, %message, "operation failed");
            error_response(dispatcher, vhost, StatusCode::InternalServerError).await
        }
    }
}

/// The vhost's registered handler for `status`, or a generic response when
/// none is registered.
async fn error_response(
    dispatcher: &VhostDispatcher,
    vhost: &str,
    status: StatusCode,
) -> Response {
    match dispatcher.resolve_error(vhost, status.as_u16()).await {
        Some(response) => response,
        None => Response::new(status).body(status.canonical_reason()),
    }
}

/// Handles a single TCP connection over its lifetime.
///
/// HTTP/1.1 connections are persistent by default: we loop, reading one
/// request per iteration, until the peer closes the connection or signals
/// `Connection: close`.
async fn handle_connection(
    mut stream: TcpStream,
    peer_addr: SocketAddr,
    dispatcher: Arc<VhostDispatcher>,
) -> Result<(), std::io::Error> {
    let mut buf = BytesMut::with_capacity(INITIAL_BUF_SIZE);

    loop {
        let bytes_read = stream.read_buf(&mut buf).await?;

        if bytes_read == 0 {
            debug!(peer = %peer_addr, "connection closed by peer");
            break;
        }

        // Guard against excessively large requests.
        if buf.len() > MAX_REQUEST_SIZE {
            warn!(peer = %peer_addr, "request too large — sending 413");
            let response = Response::new(StatusCode::PayloadTooLarge)
                .body("Request entity too large")
                .keep_alive(false);
            stream.write_all(&response.into_bytes()).await?;
            break;
        }

        // Attempt to parse the buffered data as an HTTP request.
        let (request, body_offset) = match Request::parse(&buf) {
            Ok(pair) => pair,
            Err(RequestError::Incomplete) => {
                // Headers not yet fully received — read more data.
                continue;
            }
            Err(e) => {
                warn!(peer = %peer_addr, error = %e, "bad request — sending 400");
                let response = Response::new(StatusCode::BadRequest)
                    .body(format!("Bad Request: {e}"))
                    .keep_alive(false);
                stream.write_all(&response.into_bytes()).await?;
                break;
            }
        };

        // Wait for the full body to arrive if Content-Length is set.
        let content_length = request.content_length().unwrap_or(0);
        let total_needed = body_offset + content_length;
        if buf.len() < total_needed {
            continue;
        }

        let keep_alive = request.is_keep_alive();

        debug!(
            peer = %peer_addr,
            method = %request.method(),
            host = request.hostname().unwrap_or("-"),
            path = %request.path(),
            "dispatching request"
        );

        let response = respond(&dispatcher, &request).await;
        stream.write_all(&response.into_bytes()).await?;
        stream.flush().await?;

        // Drop the consumed request bytes from the buffer.
        let _ = buf.split_to(total_needed);

        if !keep_alive {
            debug!(peer = %peer_addr, "Connection: close — shutting down");
            break;
        }
    }

    Ok(())
}
