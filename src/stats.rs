//! Per-backend request statistics.
//!
//! Counts and the recent-event log live behind one mutex, so a snapshot can
//! never see a counter increment without its paired event (or the reverse).
//! The lock is held only for the in-memory update, never across I/O.

use crate::selector::BackendAddress;
use chrono::{Local, Utc};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::net::SocketAddr;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Default capacity of the recent-event log
pub const DEFAULT_MAX_EVENTS: usize = 100;

/// One forwarded request
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Event {
    /// Local wall-clock time, `HH:MM:SS`
    pub time: String,
    pub client: String,
    pub backend: String,
    pub message: String,
}

/// Point-in-time copy of the recorder state
#[derive(Debug, Clone, Serialize)]
pub struct Snapshot {
    pub counts: BTreeMap<String, u64>,
    /// Most recent first
    pub events: Vec<Event>,
    /// Configured backends, in selection order
    pub backends: Vec<String>,
    /// Seconds since the Unix epoch
    pub time: f64,
}

#[cfg(test)]
impl Snapshot {
    /// Sum of all per-backend counts
    pub fn total(&self) -> u64 {
        self.counts.values().sum()
    }
}

struct StatsState {
    counts: HashMap<BackendAddress, u64>,
    events: VecDeque<Event>,
}

/// Thread-safe recorder shared by all dispatcher connections
pub struct StatsRecorder {
    backends: Vec<BackendAddress>,
    max_events: usize,
    state: Mutex<StatsState>,
}

impl StatsRecorder {
    /// Create an empty recorder with a zero count for every backend
    pub fn new(backends: &[BackendAddress], max_events: usize) -> Self {
        let counts = backends.iter().map(|b| (b.clone(), 0)).collect();
        StatsRecorder {
            backends: backends.to_vec(),
            max_events,
            state: Mutex::new(StatsState {
                counts,
                events: VecDeque::with_capacity(max_events),
            }),
        }
    }

    /// Record one forwarded request
    pub fn record(&self, client: SocketAddr, backend: &BackendAddress, message: &str) {
        let event = Event {
            time: Local::now().format("%H:%M:%S").to_string(),
            client: client.to_string(),
            backend: backend.to_string(),
            message: message.to_string(),
        };

        let mut state = self.lock();
        *state.counts.entry(backend.clone()).or_insert(0) += 1;
        state.events.push_front(event);
        state.events.truncate(self.max_events);
    }

    /// Take a consistent deep copy of the current state
    pub fn snapshot(&self) -> Snapshot {
        let state = self.lock();
        Snapshot {
            counts: state
                .counts
                .iter()
                .map(|(backend, count)| (backend.to_string(), *count))
                .collect(),
            events: state.events.iter().cloned().collect(),
            backends: self.backends.iter().map(ToString::to_string).collect(),
            time: Utc::now().timestamp_micros() as f64 / 1_000_000.0,
        }
    }

    fn lock(&self) -> MutexGuard<'_, StatsState> {
        // record() has no panicking step between its two updates
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    fn backends() -> Vec<BackendAddress> {
        vec![
            BackendAddress::new("127.0.0.1", 9001),
            BackendAddress::new("127.0.0.1", 9002),
        ]
    }

    fn client(port: u16) -> SocketAddr {
        SocketAddr::from(([127, 0, 0, 1], port))
    }

    #[test]
    fn test_new_recorder_is_empty() {
        let stats = StatsRecorder::new(&backends(), DEFAULT_MAX_EVENTS);
        let snapshot = stats.snapshot();

        assert_eq!(snapshot.backends, vec!["127.0.0.1:9001", "127.0.0.1:9002"]);
        assert_eq!(snapshot.counts.get("127.0.0.1:9001"), Some(&0));
        assert_eq!(snapshot.counts.get("127.0.0.1:9002"), Some(&0));
        assert!(snapshot.events.is_empty());
        assert!(snapshot.time > 0.0);
    }

    #[test]
    fn test_record() {
        let list = backends();
        let stats = StatsRecorder::new(&list, DEFAULT_MAX_EVENTS);

        stats.record(client(50000), &list[0], "ECHO one");
        stats.record(client(50001), &list[1], "ECHO two");
        stats.record(client(50002), &list[0], "ECHO three");

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.counts["127.0.0.1:9001"], 2);
        assert_eq!(snapshot.counts["127.0.0.1:9002"], 1);
        assert_eq!(snapshot.total(), 3);

        let messages: Vec<&str> = snapshot.events.iter().map(|e| e.message.as_str()).collect();
        assert_eq!(messages, vec!["ECHO three", "ECHO two", "ECHO one"]);
        assert_eq!(snapshot.events[0].client, "127.0.0.1:50002");
        assert_eq!(snapshot.events[0].backend, "127.0.0.1:9001");
        assert_eq!(snapshot.events[0].time.len(), 8);
    }

    #[test]
    fn test_event_log_is_bounded() {
        let list = backends();
        let stats = StatsRecorder::new(&list, 5);

        for i in 0..12 {
            stats.record(client(50000), &list[i % 2], &format!("req {i}"));
        }

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.total(), 12);
        let messages: Vec<&str> = snapshot.events.iter().map(|e| e.message.as_str()).collect();
        assert_eq!(messages, vec!["req 11", "req 10", "req 9", "req 8", "req 7"]);
    }

    #[test]
    fn test_snapshot_is_a_copy() {
        let list = backends();
        let stats = StatsRecorder::new(&list, DEFAULT_MAX_EVENTS);
        stats.record(client(50000), &list[0], "first");

        let before = stats.snapshot();
        stats.record(client(50000), &list[0], "second");

        assert_eq!(before.total(), 1);
        assert_eq!(before.events.len(), 1);
        assert_eq!(stats.snapshot().total(), 2);
    }

    #[test]
    fn test_concurrent_records() {
        let list = backends();
        let stats = Arc::new(StatsRecorder::new(&list, 50));

        let handles: Vec<_> = (0..8)
            .map(|t| {
                let stats = Arc::clone(&stats);
                let list = list.clone();
                thread::spawn(move || {
                    for i in 0..100 {
                        stats.record(client(40000 + t), &list[i % 2], "load");
                        let snapshot = stats.snapshot();
                        // Events are capped, so compare only while under the cap
                        let total = snapshot.total() as usize;
                        assert_eq!(snapshot.events.len(), total.min(50));
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.total(), 800);
        assert_eq!(snapshot.counts["127.0.0.1:9001"], 400);
        assert_eq!(snapshot.counts["127.0.0.1:9002"], 400);
        assert_eq!(snapshot.events.len(), 50);
    }

    #[test]
    fn test_snapshot_serializes() {
        let list = backends();
        let stats = StatsRecorder::new(&list, DEFAULT_MAX_EVENTS);
        stats.record(client(50000), &list[1], "PRIME 97");

        let json = serde_json::to_value(stats.snapshot()).unwrap();
        assert_eq!(json["counts"]["127.0.0.1:9002"], 1);
        assert_eq!(json["events"][0]["message"], "PRIME 97");
        assert_eq!(json["events"][0]["backend"], "127.0.0.1:9002");
        assert_eq!(json["backends"][0], "127.0.0.1:9001");
        assert!(json["time"].is_f64());
    }
}
