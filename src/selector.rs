//! Backend addresses and round-robin selection.
//!
//! The selector owns a fixed, non-empty backend list and a cursor. Every
//! call to [`Selector::next`] returns the backend under the cursor and
//! advances it by one in a single atomic step, so concurrent callers observe
//! a strict cyclic order with no duplicated or skipped picks.

use crate::config::ConfigError;
use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicUsize, Ordering};

/// A worker's `host:port` address
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BackendAddress {
    host: String,
    port: u16,
}

impl BackendAddress {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }
}

impl fmt::Display for BackendAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

impl FromStr for BackendAddress {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let entry = s.trim();
        let invalid = |reason: &str| ConfigError::InvalidBackend(entry.to_string(), reason.to_string());

        let (host, port) = entry
            .rsplit_once(':')
            .ok_or_else(|| invalid("expected host:port"))?;
        if host.is_empty() {
            return Err(invalid("empty host"));
        }
        let port = port
            .parse::<u16>()
            .map_err(|_| invalid("port must be an integer in 0-65535"))?;

        Ok(BackendAddress::new(host, port))
    }
}

/// Parse a list of `host:port` entries, rejecting an empty list.
pub fn parse_backends<S: AsRef<str>>(entries: &[S]) -> Result<Vec<BackendAddress>, ConfigError> {
    let backends = entries
        .iter()
        .map(|entry| entry.as_ref())
        .filter(|entry| !entry.trim().is_empty())
        .map(str::parse::<BackendAddress>)
        .collect::<Result<Vec<BackendAddress>, _>>()?;

    if backends.is_empty() {
        return Err(ConfigError::NoBackends);
    }
    Ok(backends)
}

/// Round-robin backend selector
#[derive(Debug)]
pub struct Selector {
    backends: Vec<BackendAddress>,
    /// Always in `0..backends.len()`
    cursor: AtomicUsize,
}

impl Selector {
    /// Create a selector starting at the first backend
    pub fn new(backends: Vec<BackendAddress>) -> Result<Self, ConfigError> {
        if backends.is_empty() {
            return Err(ConfigError::NoBackends);
        }
        Ok(Self {
            backends,
            cursor: AtomicUsize::new(0),
        })
    }

    /// Pick the next backend and advance the cursor
    pub fn next(&self) -> &BackendAddress {
        let len = self.backends.len();
        let index = match self
            .cursor
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |i| Some((i + 1) % len))
        {
            Ok(previous) | Err(previous) => previous,
        };
        &self.backends[index]
    }

    /// The configured backends, in selection order
    pub fn backends(&self) -> &[BackendAddress] {
        &self.backends
    }

    /// Number of backends; never zero
    #[allow(clippy::len_without_is_empty)]
    pub fn len(&self) -> usize {
        self.backends.len()
    }
}
