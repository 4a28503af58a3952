//! Event transport
//!
//! A transport owns the link to the master. `connect` starts a receive
//! thread that calls the given [`EventHandler`] once per received event, or
//! once per transport failure. [`Connection::shutdown`] stops that thread and
//! waits for it, including any dispatch call still in progress.

mod tcp;

pub use tcp::{TcpConnection, TcpTransport};

use std::io;
use std::time::Duration;

use nix::errno::Errno;

use crate::dispatch::EventHandler;
use crate::protocol::ProtocolError;

/// Something that can open a connection to the master
pub trait Transport {
    /// Connect and start receiving. `handler` moves onto the receive thread.
    fn connect(&self, handler: Box<dyn EventHandler>) -> Result<Box<dyn Connection>, InitError>;
}

/// A running connection to the master
pub trait Connection: Send {
    /// Stop receiving and release the socket.
    ///
    /// Returns only after the receive thread has finished, so no dispatch
    /// call runs after this returns. Calling it again is a no-op.
    fn shutdown(&mut self);
}

/// Errors from setting up a connection
#[derive(Debug, thiserror::Error)]
pub enum InitError {
    #[error("failed to connect to master at {addr}: {source}")]
    Connect {
        addr: String,
        #[source]
        source: io::Error,
    },

    #[error("timed out connecting to master at {addr} after {timeout:?}")]
    Timeout { addr: String, timeout: Duration },

    #[error("failed to register with master: {0}")]
    Register(#[source] ProtocolError),

    #[error("failed to build receive runtime: {0}")]
    Runtime(#[source] io::Error),

    #[error("failed to start receive thread: {0}")]
    Thread(#[source] io::Error),

    #[error("receive thread exited during setup")]
    ThreadExited,
}

impl InitError {
    /// errno-style code for log lines
    pub fn errno(&self) -> i32 {
        match self {
            InitError::Connect { source, .. } => source.raw_os_error().unwrap_or(Errno::EIO as i32),
            InitError::Timeout { .. } => Errno::ETIMEDOUT as i32,
            InitError::Register(ProtocolError::Io(e)) => {
                e.raw_os_error().unwrap_or(Errno::EPROTO as i32)
            }
            InitError::Register(_) => Errno::EPROTO as i32,
            InitError::Runtime(e) | InitError::Thread(e) => {
                e.raw_os_error().unwrap_or(Errno::EAGAIN as i32)
            }
            InitError::ThreadExited => Errno::EIO as i32,
        }
    }
}
