//! roundhouse: a round-robin line-protocol dispatcher
//!
//! One binary, three roles:
//! - `dispatch`: accept client requests and forward each one to the next
//!   backend in round-robin order, with a live HTTP status feed
//! - `worker`: execute forwarded commands (text, arithmetic, primality,
//!   scripted delay, self report)
//! - `send`: issue request lines and print the replies
//!
//! Every connection carries exactly one request line and one reply line.
//! Configuration via CLI arguments or TOML file.

mod client;
mod config;
mod dispatcher;
mod engine;
mod protocol;
mod selector;
mod stats;
mod status;
mod worker;

use config::{Config, Mode};
use dispatcher::Dispatcher;
use tracing::info;
use tracing_subscriber::EnvFilter;
use worker::Worker;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration
    let config = Config::load()?;

    // Initialize logging
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    match config.mode {
        Mode::Dispatch(dispatch) => {
            info!(
                listen = %dispatch.listen,
                backends = dispatch.backends.len(),
                status = dispatch.status_listen.as_deref().unwrap_or("disabled"),
                "Starting dispatcher"
            );
            Dispatcher::new(dispatch)?.run().await?;
        }
        Mode::Worker(worker) => {
            info!(listen = %worker.listen, name = %worker.name, "Starting worker");
            Worker::new(worker).run().await?;
        }
        Mode::Send(send) => {
            client::run(send).await?;
        }
    }

    Ok(())
}
