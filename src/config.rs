//! Configuration module for roundhouse.
//!
//! Supports both command-line arguments and a TOML configuration file.
//! CLI arguments take precedence over config file values.

use crate::selector::{parse_backends, BackendAddress};
use crate::stats::DEFAULT_MAX_EVENTS;
use clap::{Parser, Subcommand, ValueEnum};
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

/// Command-line arguments
#[derive(Parser, Debug)]
#[command(name = "roundhouse")]
#[command(author = "roundhouse authors")]
#[command(version = "0.1.0")]
#[command(about = "Round-robin line-protocol dispatcher and command workers", long_about = None)]
pub struct CliArgs {
    /// Path to TOML configuration file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true, default_value = "info")]
    pub log_level: String,

    #[command(subcommand)]
    pub command: ModeArgs,
}

/// What this process runs
#[derive(Subcommand, Debug)]
pub enum ModeArgs {
    /// Accept client requests and forward them to backends round-robin
    Dispatch(DispatchArgs),
    /// Execute forwarded commands
    Worker(WorkerArgs),
    /// Send request lines and print the replies
    Send(SendArgs),
}

#[derive(clap::Args, Debug)]
pub struct DispatchArgs {
    /// Address to accept clients on (e.g., 127.0.0.1:9000)
    #[arg(short = 'l', long)]
    pub listen: Option<String>,

    /// Comma-separated backend list (e.g., 127.0.0.1:9001,127.0.0.1:9002)
    #[arg(short = 'b', long, value_delimiter = ',')]
    pub backends: Vec<String>,

    /// Address for the HTTP status feed
    #[arg(long)]
    pub status_listen: Option<String>,

    /// Do not start the status feed
    #[arg(long)]
    pub no_status: bool,

    /// Connect/reply timeout for the backend leg, in milliseconds
    #[arg(long)]
    pub timeout_ms: Option<u64>,

    /// Number of recent requests kept for the status feed
    #[arg(long)]
    pub max_events: Option<usize>,

    /// Maximum number of in-flight client connections
    #[arg(long)]
    pub max_connections: Option<usize>,
}

#[derive(clap::Args, Debug)]
pub struct WorkerArgs {
    /// Address to accept requests on (e.g., 127.0.0.1:9001)
    #[arg(short = 'l', long)]
    pub listen: Option<String>,

    /// Name reported in every reply
    #[arg(short = 'n', long)]
    pub name: Option<String>,

    /// Maximum number of in-flight connections
    #[arg(long)]
    pub max_connections: Option<usize>,
}

#[derive(clap::Args, Debug)]
pub struct SendArgs {
    /// Dispatcher (or worker) address
    #[arg(short = 't', long, default_value = "127.0.0.1:9000")]
    pub target: String,

    /// Number of requests to send
    #[arg(short = 'n', long, default_value_t = 12)]
    pub count: usize,

    /// Semicolon-separated request lines (defaults to a mix of every command)
    #[arg(long)]
    pub commands: Option<String>,

    /// Order in which commands are sent
    #[arg(long, value_enum, default_value_t = Order::Random)]
    pub order: Order,

    /// Per-request timeout in milliseconds
    #[arg(long, default_value_t = DEFAULT_TIMEOUT_MS)]
    pub timeout_ms: u64,
}

/// Command ordering for `send`
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Order {
    Random,
    Inorder,
}

/// TOML configuration file structure
#[derive(Debug, Deserialize, Default)]
pub struct TomlConfig {
    #[serde(default)]
    pub dispatcher: DispatcherSection,
    #[serde(default)]
    pub worker: WorkerSection,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Dispatcher-related configuration
#[derive(Debug, Deserialize)]
pub struct DispatcherSection {
    #[serde(default = "default_dispatcher_listen")]
    pub listen: String,
    #[serde(default)]
    pub backends: Vec<String>,
    #[serde(default = "default_status_listen")]
    pub status_listen: Option<String>,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    #[serde(default = "default_max_events")]
    pub max_events: usize,
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,
}

impl Default for DispatcherSection {
    fn default() -> Self {
        Self {
            listen: default_dispatcher_listen(),
            backends: Vec::new(),
            status_listen: default_status_listen(),
            timeout_ms: default_timeout_ms(),
            max_events: default_max_events(),
            max_connections: default_max_connections(),
        }
    }
}

/// Worker-related configuration
#[derive(Debug, Deserialize)]
pub struct WorkerSection {
    #[serde(default = "default_worker_listen")]
    pub listen: String,
    #[serde(default = "default_worker_name")]
    pub name: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,
}

impl Default for WorkerSection {
    fn default() -> Self {
        Self {
            listen: default_worker_listen(),
            name: default_worker_name(),
            max_connections: default_max_connections(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Deserialize)]
pub struct LoggingConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

const DEFAULT_TIMEOUT_MS: u64 = 5000;

fn default_dispatcher_listen() -> String {
    "127.0.0.1:9000".to_string()
}

fn default_status_listen() -> Option<String> {
    Some("127.0.0.1:8080".to_string())
}

fn default_timeout_ms() -> u64 {
    DEFAULT_TIMEOUT_MS
}

fn default_max_events() -> usize {
    DEFAULT_MAX_EVENTS
}

fn default_max_connections() -> usize {
    10_000
}

fn default_worker_listen() -> String {
    "127.0.0.1:9001".to_string()
}

fn default_worker_name() -> String {
    "Server".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Resolved dispatcher settings
#[derive(Debug, Clone)]
pub struct DispatcherConfig {
    pub listen: String,
    pub backends: Vec<BackendAddress>,
    pub status_listen: Option<String>,
    pub timeout: Duration,
    pub max_events: usize,
    pub max_connections: usize,
}

/// Resolved worker settings
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub listen: String,
    pub name: String,
    pub max_connections: usize,
}

/// Resolved request-producer settings
#[derive(Debug, Clone)]
pub struct SendConfig {
    pub target: String,
    pub count: usize,
    pub commands: Vec<String>,
    pub order: Order,
    pub timeout: Duration,
}

/// Resolved mode
#[derive(Debug, Clone)]
pub enum Mode {
    Dispatch(DispatcherConfig),
    Worker(WorkerConfig),
    Send(SendConfig),
}

/// Final resolved configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub mode: Mode,
    pub log_level: String,
}

impl Config {
    /// Load configuration from CLI args and optional TOML file.
    pub fn load() -> Result<Self, ConfigError> {
        Self::from_args(CliArgs::parse())
    }

    /// Merge parsed CLI args with the TOML file they name, if any.
    /// CLI arguments take precedence over TOML file values.
    pub fn from_args(cli: CliArgs) -> Result<Self, ConfigError> {
        let toml_config = if let Some(ref config_path) = cli.config {
            let contents = std::fs::read_to_string(config_path)
                .map_err(|e| ConfigError::FileRead(config_path.clone(), e))?;
            toml::from_str(&contents)
                .map_err(|e| ConfigError::TomlParse(config_path.clone(), e))?
        } else {
            TomlConfig::default()
        };

        let mode = match cli.command {
            ModeArgs::Dispatch(args) => {
                let file = toml_config.dispatcher;
                let backends = if args.backends.is_empty() {
                    parse_backends(&file.backends)?
                } else {
                    parse_backends(&args.backends)?
                };
                let status_listen = if args.no_status {
                    None
                } else {
                    args.status_listen.or(file.status_listen)
                };

                Mode::Dispatch(DispatcherConfig {
                    listen: args.listen.unwrap_or(file.listen),
                    backends,
                    status_listen,
                    timeout: Duration::from_millis(args.timeout_ms.unwrap_or(file.timeout_ms)),
                    max_events: args.max_events.unwrap_or(file.max_events),
                    max_connections: args.max_connections.unwrap_or(file.max_connections),
                })
            }
            ModeArgs::Worker(args) => {
                let file = toml_config.worker;
                Mode::Worker(WorkerConfig {
                    listen: args.listen.unwrap_or(file.listen),
                    name: args.name.unwrap_or(file.name),
                    max_connections: args.max_connections.unwrap_or(file.max_connections),
                })
            }
            ModeArgs::Send(args) => {
                let commands = match args.commands {
                    Some(list) => split_commands(&list),
                    None => Vec::new(),
                };
                Mode::Send(SendConfig {
                    target: args.target,
                    count: args.count,
                    commands,
                    order: args.order,
                    timeout: Duration::from_millis(args.timeout_ms),
                })
            }
        };

        Ok(Config {
            mode,
            log_level: if cli.log_level != "info" {
                cli.log_level
            } else {
                toml_config.logging.level
            },
        })
    }
}

fn split_commands(list: &str) -> Vec<String> {
    list.split(';')
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .map(str::to_string)
        .collect()
}

/// Configuration loading errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file '{}': {}", .0.display(), .1)]
    FileRead(PathBuf, #[source] std::io::Error),
    #[error("Failed to parse config file '{}': {}", .0.display(), .1)]
    TomlParse(PathBuf, #[source] toml::de::Error),
    #[error("No backends configured")]
    NoBackends,
    #[error("Invalid backend '{0}': {1}")]
    InvalidBackend(String, String),
}
