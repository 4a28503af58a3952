//! Session state shared between the main thread and the receive thread
//!
//! The main thread creates the session before the transport starts. While the
//! agent is running only the dispatch path updates it; counters are atomics
//! so the main thread can read a snapshot once the transport has shut down.

use std::sync::atomic::{AtomicU64, Ordering};

use crate::config::MasterEndpoint;

/// Per-process session with the master
#[derive(Debug)]
pub struct Session {
    identity: String,
    master: MasterEndpoint,
    events_received: AtomicU64,
    events_forwarded: AtomicU64,
    bytes_forwarded: AtomicU64,
    events_ignored: AtomicU64,
    transport_errors: AtomicU64,
    sink_failures: AtomicU64,
}

/// Point-in-time copy of the session counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionStats {
    pub events_received: u64,
    pub events_forwarded: u64,
    pub bytes_forwarded: u64,
    pub events_ignored: u64,
    pub transport_errors: u64,
    pub sink_failures: u64,
}

impl Session {
    pub fn new(identity: impl Into<String>, master: MasterEndpoint) -> Self {
        Self {
            identity: identity.into(),
            master,
            events_received: AtomicU64::new(0),
            events_forwarded: AtomicU64::new(0),
            bytes_forwarded: AtomicU64::new(0),
            events_ignored: AtomicU64::new(0),
            transport_errors: AtomicU64::new(0),
            sink_failures: AtomicU64::new(0),
        }
    }

    /// Role tag this agent registers under
    pub fn identity(&self) -> &str {
        &self.identity
    }

    pub fn master(&self) -> &MasterEndpoint {
        &self.master
    }

    pub(crate) fn record_received(&self) {
        self.events_received.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_forwarded(&self, bytes: usize) {
        self.events_forwarded.fetch_add(1, Ordering::Relaxed);
        self.bytes_forwarded.fetch_add(bytes as u64, Ordering::Relaxed);
    }

    pub(crate) fn record_ignored(&self) {
        self.events_ignored.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_transport_error(&self) {
        self.transport_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_sink_failure(&self) {
        self.sink_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn stats(&self) -> SessionStats {
        SessionStats {
            events_received: self.events_received.load(Ordering::Relaxed),
            events_forwarded: self.events_forwarded.load(Ordering::Relaxed),
            bytes_forwarded: self.bytes_forwarded.load(Ordering::Relaxed),
            events_ignored: self.events_ignored.load(Ordering::Relaxed),
            transport_errors: self.transport_errors.load(Ordering::Relaxed),
            sink_failures: self.sink_failures.load(Ordering::Relaxed),
        }
    }
}
