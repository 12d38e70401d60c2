//! TCP listener for worker processes.
//!
//! Accepts connections, reads one request line, executes it on the command
//! engine, writes one reply line and closes the connection.

use crate::config::WorkerConfig;
use crate::engine::Engine;
use crate::protocol::{self, Request};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::io::{AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Semaphore;
use tracing::{debug, error, info, trace};

/// Worker instance
pub struct Worker {
    config: WorkerConfig,
    engine: Arc<Engine>,
    connection_limit: Arc<Semaphore>,
}

impl Worker {
    /// Create a new worker instance
    pub fn new(config: WorkerConfig) -> Self {
        let connection_limit = Arc::new(Semaphore::new(config.max_connections));
        Worker {
            config,
            engine: Arc::new(Engine::new()),
            connection_limit,
        }
    }

    /// Bind the configured address and serve forever
    pub async fn run(self) -> std::io::Result<()> {
        let listener = TcpListener::bind(&self.config.listen).await?;
        self.serve(listener).await
    }

    /// Accept connections on an already bound listener
    pub async fn serve(self, listener: TcpListener) -> std::io::Result<()> {
        info!(
            address = %listener.local_addr()?,
            name = %self.config.name,
            "Worker listening"
        );

        let name: Arc<str> = Arc::from(self.config.name.as_str());

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

                    let engine = Arc::clone(&self.engine);
                    let name = Arc::clone(&name);

                    tokio::spawn(async move {
                        if let Err(e) = handle_connection(stream, peer, &name, &engine).await {
                            error!(peer = %peer, error = %e, "Error handling connection");
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

    /// Get a reference to the engine for testing
    #[cfg(test)]
    pub fn engine(&self) -> &Arc<Engine> {
        &self.engine
    }
}

/// Handle a single request connection
async fn handle_connection(
    stream: TcpStream,
    peer: SocketAddr,
    name: &str,
    engine: &Engine,
) -> std::io::Result<()> {
    let (reader, mut writer) = stream.into_split();
    let mut reader = BufReader::new(reader);

    let Some(line) = protocol::read_line(&mut reader, protocol::MAX_REQUEST_LENGTH).await? else {
        trace!(peer = %peer, "Connection closed without a request");
        return Ok(());
    };

    let line = String::from_utf8_lossy(&line);
    let request = Request::parse(&line);
    let result = engine.execute(&request).await;

    let reply = protocol::format_reply(name, &request.name, &result.text, result.elapsed);
    writer.write_all(reply.as_bytes()).await?;
    writer.flush().await?;

    debug!(
        peer = %peer,
        command = %request.name,
        elapsed_ms = result.elapsed.as_millis() as u64,
        "Handled request"
    );

    Ok(())
}
