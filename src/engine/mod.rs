//! Command engine executed by worker processes.
//!
//! Each request line names one command:
//! - Text: ECHO, UPPER, REVERSE
//! - Numeric: SUM, SORT, FACT, FIB, PRIME
//! - Latency injection: SLEEP
//! - Self report: STATS
//!
//! Unrecognized commands echo the raw line back. Bad arguments never fail
//! the connection; they are rendered as `ERROR processing command: ...` in
//! the result text.

mod numeric;

use crate::protocol::Request;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tracing::trace;

/// Known commands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Echo,
    Upper,
    Reverse,
    Sum,
    Sort,
    Fact,
    Fib,
    Prime,
    Sleep,
    Stats,
    Unknown,
}

impl Command {
    /// Look up an upper-cased command name
    pub fn from_name(name: &str) -> Self {
        match name {
            "ECHO" => Command::Echo,
            "UPPER" => Command::Upper,
            "REVERSE" => Command::Reverse,
            "SUM" => Command::Sum,
            "SORT" => Command::Sort,
            "FACT" => Command::Fact,
            "FIB" => Command::Fib,
            "PRIME" => Command::Prime,
            "SLEEP" => Command::Sleep,
            "STATS" => Command::Stats,
            _ => Command::Unknown,
        }
    }
}

/// Errors raised while evaluating a command's argument
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CommandError {
    #[error("invalid literal for integer: '{0}'")]
    InvalidInteger(String),
    #[error("could not convert string to float: '{0}'")]
    InvalidNumber(String),
    #[error("integer overflow")]
    Overflow,
    #[error("computation aborted: {0}")]
    Aborted(String),
}

/// Outcome of one command
#[derive(Debug, Clone)]
pub struct CommandResult {
    pub text: String,
    pub elapsed: Duration,
}

/// Executes commands and counts handled requests
#[derive(Debug, Default)]
pub struct Engine {
    handled: AtomicU64,
}

impl Engine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests handled since the process started
    pub fn requests_handled(&self) -> u64 {
        self.handled.load(Ordering::SeqCst)
    }

    /// Execute one request.
    ///
    /// Always produces a result; the handled-request counter is incremented
    /// once the result is ready, so STATS reports the requests before it.
    /// The increment happens here, before the caller writes the reply.
    pub async fn execute(&self, request: &Request<'_>) -> CommandResult {
        let started = Instant::now();
        let command = Command::from_name(&request.name);
        trace!(?command, arg = request.arg, "Executing command");

        let text = match self.run(command, request).await {
            Ok(text) => text,
            Err(e) => format!("ERROR processing command: {e}"),
        };

        self.handled.fetch_add(1, Ordering::SeqCst);

        CommandResult {
            text,
            elapsed: started.elapsed(),
        }
    }

    async fn run(&self, command: Command, request: &Request<'_>) -> Result<String, CommandError> {
        let arg = request.arg;
        match command {
            Command::Echo => Ok(arg.to_string()),
            Command::Upper => Ok(arg.to_uppercase()),
            Command::Reverse => Ok(arg.chars().rev().collect()),
            Command::Sleep => {
                let ms = numeric::parse_int(arg)?;
                tokio::time::sleep(Duration::from_millis(ms.max(0) as u64)).await;
                Ok(format!("Slept {ms} ms"))
            }
            Command::Stats => Ok(format!("requests_handled={}", self.requests_handled())),
            Command::Unknown => Ok(request.raw.to_string()),
            Command::Sum | Command::Sort | Command::Fact | Command::Fib | Command::Prime => {
                // Big-number work runs off the reactor threads
                let arg = arg.to_string();
                tokio::task::spawn_blocking(move || compute(command, &arg))
                    .await
                    .map_err(|e| CommandError::Aborted(e.to_string()))?
            }
        }
    }
}

/// Evaluate a CPU-bound command synchronously
fn compute(command: Command, arg: &str) -> Result<String, CommandError> {
    match command {
        Command::Sum => {
            let numbers = numeric::parse_numbers(arg)?;
            Ok(numeric::sum(&numbers)?.to_string())
        }
        Command::Sort => {
            let numbers = numeric::parse_numbers(arg)?;
            let sorted: Vec<String> = numeric::sorted(&numbers)
                .iter()
                .map(ToString::to_string)
                .collect();
            Ok(sorted.join(" "))
        }
        Command::Fact => Ok(numeric::factorial(numeric::parse_saturating_int(arg)?).to_string()),
        Command::Fib => Ok(numeric::fibonacci(numeric::parse_saturating_int(arg)?).to_string()),
        Command::Prime => {
            let n = numeric::parse_int(arg)?;
            Ok(if numeric::is_prime(n) { "YES" } else { "NO" }.to_string())
        }
        other => Err(CommandError::Aborted(format!("{other:?} is not a compute command"))),
    }
}
