//! Shutdown gate
//!
//! A counting gate built on an `eventfd` in semaphore mode. Requesting
//! shutdown is a single `write(2)` of 1, which is async-signal-safe, does not
//! allocate and takes no locks. Waiting is a blocking `read(2)` that returns
//! once the count is positive and takes exactly one request off it.
//!
//! Requests are counted, so a request made before the wait begins is never
//! lost and concurrent requests are each observed.

use std::fmt;
use std::os::fd::{AsFd, AsRawFd};
use std::sync::OnceLock;
use std::time::Duration;

use nix::errno::Errno;
use nix::poll::{poll, PollFd, PollFlags, PollTimeout};
use nix::sys::eventfd::{EfdFlags, EventFd};

/// The process-wide gate signal handlers post to
static GLOBAL_GATE: OnceLock<ShutdownGate> = OnceLock::new();

#[derive(Debug, thiserror::Error)]
pub enum GateError {
    #[error("failed to create eventfd: {0}")]
    Create(#[source] Errno),
}

/// Counting gate between shutdown requesters and the main thread
pub struct ShutdownGate {
    fd: EventFd,
}

impl fmt::Debug for ShutdownGate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ShutdownGate")
            .field("fd", &self.fd.as_fd().as_raw_fd())
            .finish()
    }
}

impl ShutdownGate {
    /// Create a gate with no pending requests
    pub fn new() -> Result<Self, GateError> {
        let fd = EventFd::from_value_and_flags(0, EfdFlags::EFD_SEMAPHORE | EfdFlags::EFD_CLOEXEC)
            .map_err(GateError::Create)?;
        Ok(Self { fd })
    }

    /// The process-wide gate, created on first use
    ///
    /// Create it before installing signal handlers: a handler that runs
    /// before the gate exists has nowhere to post.
    pub fn global() -> Result<&'static ShutdownGate, GateError> {
        if let Some(gate) = GLOBAL_GATE.get() {
            return Ok(gate);
        }
        let gate = Self::new()?;
        Ok(GLOBAL_GATE.get_or_init(|| gate))
    }

    /// The process-wide gate if it has been created
    ///
    /// Lock-free, so usable from a signal handler.
    pub fn try_global() -> Option<&'static ShutdownGate> {
        GLOBAL_GATE.get()
    }

    /// Add one shutdown request and wake a waiter
    ///
    /// Safe to call from a signal handler and from any thread.
    pub fn request_shutdown(&self) {
        // Only fails once the counter nears u64::MAX
        let _ = self.fd.arm();
    }

    /// Block until a request is pending, then consume it
    pub fn wait_for_shutdown(&self) {
        loop {
            match self.fd.read() {
                Ok(_) => return,
                Err(Errno::EINTR) => continue,
                Err(e) => {
                    // Cannot happen on a valid blocking eventfd; treat as a request
                    log::error!("shutdown gate read failed: {}", e);
                    return;
                }
            }
        }
    }

    /// Like [`wait_for_shutdown`](Self::wait_for_shutdown) but gives up after
    /// `timeout`. Returns whether a request was consumed.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        loop {
            let mut fds = [PollFd::new(self.fd.as_fd(), PollFlags::POLLIN)];
            let poll_timeout = PollTimeout::try_from(timeout).unwrap_or(PollTimeout::MAX);
            match poll(&mut fds, poll_timeout) {
                Ok(0) => return false,
                Ok(_) => break,
                Err(Errno::EINTR) => continue,
                Err(e) => {
                    log::error!("shutdown gate poll failed: {}", e);
                    return false;
                }
            }
        }

        // Readable and this thread is the only consumer, so this does not block
        self.wait_for_shutdown();
        true
    }
}
