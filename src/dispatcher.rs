//! TCP listener for the dispatcher.
//!
//! Each accepted client connection carries one request line. The line is
//! forwarded unmodified to the next backend in round-robin order over a
//! fresh outbound connection, the backend's single reply line is relayed
//! back, and the request is recorded in the statistics.
//!
//! Forwarding is single-shot: a backend failure closes the client
//! connection without a reply and is never retried on another backend.

use crate::config::{ConfigError, DispatcherConfig};
use crate::protocol;
use crate::selector::{BackendAddress, Selector};
use crate::stats::StatsRecorder;
use crate::status;
use bytes::Bytes;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Semaphore;
use tokio::time::timeout;
use tracing::{error, info, trace, warn};

/// Failure on either leg of a forwarded request
#[derive(Debug, thiserror::Error)]
pub enum ForwardError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("timed out connecting to backend {0}")]
    ConnectTimeout(BackendAddress),
    #[error("backend {0} did not reply within {1:?}")]
    ReplyTimeout(BackendAddress, Duration),
    #[error("backend {0} closed without a complete reply")]
    NoReply(BackendAddress),
}

/// State shared by every client connection
struct Shared {
    selector: Selector,
    stats: Arc<StatsRecorder>,
    timeout: Duration,
}

/// Dispatcher instance
pub struct Dispatcher {
    config: DispatcherConfig,
    shared: Arc<Shared>,
    connection_limit: Arc<Semaphore>,
}

impl Dispatcher {
    /// Create a new dispatcher; fails if no backends are configured
    pub fn new(config: DispatcherConfig) -> Result<Self, ConfigError> {
        let selector = Selector::new(config.backends.clone())?;
        let stats = Arc::new(StatsRecorder::new(selector.backends(), config.max_events));

        Ok(Dispatcher {
            shared: Arc::new(Shared {
                selector,
                stats,
                timeout: config.timeout,
            }),
            connection_limit: Arc::new(Semaphore::new(config.max_connections)),
            config,
        })
    }

    /// The recorder behind the status feed
    pub fn stats(&self) -> Arc<StatsRecorder> {
        Arc::clone(&self.shared.stats)
    }

    /// Bind the configured addresses and serve forever
    pub async fn run(self) -> std::io::Result<()> {
        if let Some(ref status_listen) = self.config.status_listen {
            let status_listener = TcpListener::bind(status_listen).await?;
            let stats = self.stats();
            tokio::spawn(async move {
                if let Err(e) = status::serve(status_listener, stats).await {
                    error!(error = %e, "Status feed stopped");
                }
            });
        }

        let listener = TcpListener::bind(&self.config.listen).await?;
        self.serve(listener).await
    }

    /// Accept client connections on an already bound listener
    pub async fn serve(self, listener: TcpListener) -> std::io::Result<()> {
        let backends: Vec<String> = self
            .shared
            .selector
            .backends()
            .iter()
            .map(ToString::to_string)
            .collect();
        info!(
            address = %listener.local_addr()?,
            backends = %backends.join(", "),
            count = self.shared.selector.len(),
            timeout_ms = self.shared.timeout.as_millis() as u64,
            "Dispatcher listening"
        );

        loop {
            // Wait for a connection slot
            let permit = self
                .connection_limit
                .clone()
                .acquire_owned()
                .await
                .map_err(std::io::Error::other)?;

            match listener.accept().await {
                Ok((stream, peer)) => {
                    trace!(peer = %peer, "New connection");

                    let shared = Arc::clone(&self.shared);

                    tokio::spawn(async move {
                        if let Err(e) = handle_connection(stream, peer, &shared).await {
                            warn!(client = %peer, error = %e, "Request not forwarded");
                        }
                        drop(permit);
                    });
                }
                Err(e) => {
                    error!(error = %e, "Failed to accept connection");
                }
            }
        }
    }
}

/// Handle a single client connection
async fn handle_connection(
    stream: TcpStream,
    peer: SocketAddr,
    shared: &Shared,
) -> Result<(), ForwardError> {
    let (reader, mut writer) = stream.into_split();
    let mut reader = BufReader::new(reader);

    let Some(request) = protocol::read_line(&mut reader, protocol::MAX_REQUEST_LENGTH).await? else {
        trace!(peer = %peer, "Connection closed without a request");
        return Ok(());
    };

    let backend = shared.selector.next();
    let reply = forward(backend, &request, shared.timeout).await?;

    writer.write_all(&reply).await?;
    writer.flush().await?;

    let message = protocol::trimmed_text(&request);
    shared.stats.record(peer, backend, &message);
    info!(client = %peer, backend = %backend, message = %message, "Forwarded request");

    Ok(())
}

/// Send one request line to a backend and read its reply line
async fn forward(
    backend: &BackendAddress,
    request: &[u8],
    limit: Duration,
) -> Result<Bytes, ForwardError> {
    let stream = timeout(limit, TcpStream::connect((backend.host(), backend.port())))
        .await
        .map_err(|_| ForwardError::ConnectTimeout(backend.clone()))??;

    let (reader, mut writer) = stream.into_split();
    writer.write_all(request).await?;
    writer.flush().await?;

    let mut reader = BufReader::new(reader);
    match timeout(limit, protocol::read_line(&mut reader, protocol::MAX_REPLY_LENGTH)).await {
        Ok(reply) => reply?.ok_or_else(|| ForwardError::NoReply(backend.clone())),
        Err(_) => Err(ForwardError::ReplyTimeout(backend.clone(), limit)),
    }
}
