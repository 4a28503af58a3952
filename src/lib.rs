//! dlogger - node agent for sensor data
//!
//! Connects to a master over TCP, receives the events it pushes and logs
//! sensor readings. Shuts down cleanly on SIGINT, SIGHUP or SIGTERM.
//!
//! # Architecture
//!
//! ```text
//!  signal ──▶ handler ──▶ ShutdownGate ──▶ main thread ──▶ Connection::shutdown
//!
//!  master ──▶ TcpTransport (event-rx thread) ──▶ Dispatcher ──▶ Sink
//! ```
//!
//! The main thread only ever blocks on the [`ShutdownGate`]. All event
//! handling happens on the transport's receive thread, and shutdown waits for
//! that thread before the process exits.

pub mod config;
pub mod dispatch;
pub mod events;
pub mod lifecycle;
pub mod protocol;
pub mod session;
pub mod transport;

pub use config::{AgentConfig, ConnectPolicy, MasterEndpoint};
pub use dispatch::{DispatchStatus, Dispatcher, EventHandler, LogSink, Sink, SinkError};
pub use events::{Event, EventKind, TransportError, TransportErrorKind};
pub use lifecycle::{Agent, AgentState, RunReport, ShutdownGate};
pub use session::{Session, SessionStats};
pub use transport::{Connection, InitError, TcpTransport, Transport};
