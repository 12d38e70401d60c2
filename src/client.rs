//! Request producer.
//!
//! Sends request lines one connection at a time and prints each reply.
//! Also used by the socket tests to talk to dispatchers and workers.

use crate::config::{Order, SendConfig};
use crate::protocol;
use rand::seq::SliceRandom;
use std::io;
use std::time::Duration;
use tokio::io::{AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::warn;

/// Request mix used when no commands are given
pub const DEFAULT_COMMANDS: &[&str] = &[
    "ECHO hello load balancer",
    "UPPER make this uppercase",
    "REVERSE abcdefgh",
    "SUM 1 2 3 4 5",
    "SORT 5,3,9,1,7",
    "FACT 12",
    "FIB 20",
    "PRIME 97",
    "SLEEP 200",
    "STATS",
];

/// Send one request line and wait for the reply.
///
/// Returns `Ok(None)` when the server closed the connection without a
/// complete reply line. The reply is returned without its terminator.
pub async fn send_once(target: &str, message: &str, limit: Duration) -> io::Result<Option<String>> {
    let exchange = async {
        let stream = TcpStream::connect(target).await?;
        let (reader, mut writer) = stream.into_split();

        let mut line = message.trim_end_matches('\n').to_string();
        line.push('\n');
        writer.write_all(line.as_bytes()).await?;
        writer.flush().await?;

        let mut reader = BufReader::new(reader);
        let reply = protocol::read_line(&mut reader, protocol::MAX_REPLY_LENGTH).await?;
        Ok::<_, io::Error>(reply.map(|bytes| {
            protocol::strip_terminator(&String::from_utf8_lossy(&bytes)).to_string()
        }))
    };

    timeout(limit, exchange)
        .await
        .map_err(|_| io::Error::new(io::ErrorKind::TimedOut, "request timed out"))?
}

/// Run the `send` subcommand
pub async fn run(config: SendConfig) -> io::Result<()> {
    let commands: Vec<String> = if config.commands.is_empty() {
        DEFAULT_COMMANDS.iter().map(|c| c.to_string()).collect()
    } else {
        config.commands
    };

    for message in pick_commands(&commands, config.count, config.order) {
        match send_once(&config.target, message, config.timeout).await {
            Ok(reply) => {
                println!(
                    "Client -> {message:?} | Reply <- {:?}",
                    reply.unwrap_or_default()
                );
            }
            Err(e) => {
                warn!(addr = %config.target, error = %e, "Request failed");
            }
        }
    }

    Ok(())
}

/// Choose `count` commands, cycling in order or uniformly at random
fn pick_commands(commands: &[String], count: usize, order: Order) -> Vec<&str> {
    match order {
        Order::Inorder => commands
            .iter()
            .cycle()
            .take(count)
            .map(String::as_str)
            .collect(),
        Order::Random => {
            let mut rng = rand::thread_rng();
            (0..count)
                .filter_map(|_| commands.choose(&mut rng))
                .map(String::as_str)
                .collect()
        }
    }
}
