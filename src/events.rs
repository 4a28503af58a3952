//! Events pushed by the master
//!
//! An [`Event`] is the unit of data the transport decodes and hands to the
//! dispatch layer. When the transport cannot produce one it hands over a
//! [`TransportError`] instead.

use std::fmt;
use std::io;

use nix::errno::Errno;
use serde::{Deserialize, Serialize};

/// Semantic type of an event
///
/// Kept as an open integer so kinds unknown to this agent still decode and
/// can be reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventKind(pub i32);

impl EventKind {
    /// Sensor readings pushed by the master
    pub const SENSOR_DATA: EventKind = EventKind(3);

    /// Raw numeric value
    pub fn raw(self) -> i32 {
        self.0
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i32> for EventKind {
    fn from(raw: i32) -> Self {
        EventKind(raw)
    }
}

/// An immutable unit of inbound data
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    pub kind: EventKind,
    pub payload: Vec<u8>,
}

impl Event {
    pub fn new(kind: impl Into<EventKind>, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            kind: kind.into(),
            payload: payload.into(),
        }
    }

    /// Check if this event carries sensor readings
    pub fn is_sensor_data(&self) -> bool {
        self.kind == EventKind::SENSOR_DATA
    }
}

/// Why the transport failed to produce an event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportErrorKind {
    /// The connection to the master is gone; no further events follow
    ConnectionLost,
    /// A frame arrived but its body could not be decoded
    Decode,
    /// A frame header announced a body larger than allowed
    FrameTooLarge,
}

impl TransportErrorKind {
    /// Whether the receive loop stops after this error
    pub fn is_terminal(self) -> bool {
        !matches!(self, TransportErrorKind::Decode)
    }
}

/// Out-of-band transport failure delivered in place of an event
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{description} (errno {code})")]
pub struct TransportError {
    pub kind: TransportErrorKind,
    /// errno-style error code
    pub code: i32,
    pub description: String,
}

impl TransportError {
    pub fn new(kind: TransportErrorKind, code: i32, description: impl Into<String>) -> Self {
        Self {
            kind,
            code,
            description: description.into(),
        }
    }

    /// Peer closed the connection cleanly
    pub fn closed_by_peer() -> Self {
        Self::new(
            TransportErrorKind::ConnectionLost,
            Errno::ECONNRESET as i32,
            "connection closed by master",
        )
    }

    /// I/O failure on the connection
    pub fn io(err: &io::Error) -> Self {
        Self::new(
            TransportErrorKind::ConnectionLost,
            err.raw_os_error().unwrap_or(Errno::EIO as i32),
            format!("connection to master lost: {}", err),
        )
    }

    pub fn decode(detail: impl fmt::Display) -> Self {
        Self::new(
            TransportErrorKind::Decode,
            Errno::EBADMSG as i32,
            format!("failed to decode event: {}", detail),
        )
    }

    pub fn frame_too_large(len: usize) -> Self {
        Self::new(
            TransportErrorKind::FrameTooLarge,
            Errno::EMSGSIZE as i32,
            format!("frame of {} bytes exceeds limit", len),
        )
    }

    pub fn is_terminal(&self) -> bool {
        self.kind.is_terminal()
    }
}
