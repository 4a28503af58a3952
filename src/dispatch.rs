//! Event dispatch
//!
//! The transport calls one [`EventHandler`] for every unit it receives: either
//! a decoded [`Event`] or a [`TransportError`]. [`Dispatcher`] is the agent's
//! handler; it routes sensor readings to a [`Sink`] and logs everything else.
//!
//! Dispatch runs on the transport's receive thread. Nothing that goes wrong
//! here leaves the handler: errors are logged, panics from the sink are
//! caught, and the status returned is always [`DispatchStatus::Handled`].
//! Shutdown is never requested from this path.

use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use crate::events::{Event, EventKind, TransportError};
use crate::session::Session;

/// What the transport hands to the handler for each received unit
pub type Received<'a> = Result<&'a Event, &'a TransportError>;

/// Result reported back to the transport
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchStatus {
    /// The unit was consumed; no retry wanted
    Handled,
}

impl DispatchStatus {
    /// Numeric status as transports expect it
    pub fn code(self) -> i32 {
        match self {
            DispatchStatus::Handled => 0,
        }
    }
}

/// Callback capability invoked by a transport once per received unit
pub trait EventHandler: Send {
    /// Handle one event or transport failure.
    ///
    /// `response` starts out empty. A handler answering a request/response
    /// event stores the answer there and the transport sends it back.
    fn handle(&mut self, received: Received<'_>, response: &mut Option<Event>) -> DispatchStatus;
}

/// Errors reported by a sink
#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    #[error("sink unavailable: {0}")]
    Unavailable(String),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Destination for forwarded payloads
pub trait Sink: Send {
    /// Record one payload, tagged with the kind of event it came from.
    /// Bytes must be kept in the order given.
    fn forward(&mut self, kind: EventKind, payload: &[u8]) -> Result<(), SinkError>;
}

/// Sink that writes each payload as one log record
#[derive(Debug, Default)]
pub struct LogSink;

impl Sink for LogSink {
    fn forward(&mut self, kind: EventKind, payload: &[u8]) -> Result<(), SinkError> {
        log::info!("sensor data (event {}): {:?}", kind, payload);
        Ok(())
    }
}

/// The agent's dispatch coordinator
pub struct Dispatcher<S> {
    session: Arc<Session>,
    sink: S,
}

impl<S: Sink> Dispatcher<S> {
    pub fn new(session: Arc<Session>, sink: S) -> Self {
        Self { session, sink }
    }

    pub fn session(&self) -> &Arc<Session> {
        &self.session
    }

    fn transport_failed(&self, err: &TransportError) {
        self.session.record_transport_error();
        log::error!(
            "transport error (errno {}): {}",
            err.code,
            err.description
        );
    }

    fn forward_sensor_data(&mut self, event: &Event) {
        for byte in &event.payload {
            log::debug!("{}", byte);
        }

        let sink = &mut self.sink;
        let result = panic::catch_unwind(AssertUnwindSafe(|| {
            sink.forward(event.kind, &event.payload)
        }));

        match result {
            Ok(Ok(())) => self.session.record_forwarded(event.payload.len()),
            Ok(Err(e)) => {
                self.session.record_sink_failure();
                log::warn!("failed to forward event {}: {}", event.kind, e);
            }
            Err(_) => {
                self.session.record_sink_failure();
                log::error!("sink panicked while forwarding event {}", event.kind);
            }
        }
    }
}

impl<S: Sink> EventHandler for Dispatcher<S> {
    fn handle(&mut self, received: Received<'_>, _response: &mut Option<Event>) -> DispatchStatus {
        let event = match received {
            Ok(event) => event,
            Err(err) => {
                self.transport_failed(err);
                return DispatchStatus::Handled;
            }
        };

        self.session.record_received();
        log::info!("eventid: {}", event.kind);

        if event.is_sensor_data() {
            self.forward_sensor_data(event);
        } else {
            self.session.record_ignored();
            log::debug!("no handler for event {}, ignoring", event.kind);
        }

        DispatchStatus::Handled
    }
}
