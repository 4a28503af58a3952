//! Agent main control flow
//!
//! ```text
//! INIT ──▶ RUNNING ──▶ DRAINING ──▶ TERMINATED
//!   │                                   ▲
//!   └──── connect failed, policy=abort ─┘
//! ```
//!
//! - INIT: create the session, connect the transport with a [`Dispatcher`].
//!   A failed connect is logged; by default the agent carries on without a
//!   transport.
//! - RUNNING: block on the shutdown gate. Nothing else happens on the main
//!   thread, and it does not touch the session while the transport runs.
//! - DRAINING: shut the transport down. This returns only once the receive
//!   thread, and any dispatch it was doing, has finished.
//! - TERMINATED: log a summary and report the exit code.
//!
//! Each transition happens once; there is no restart without re-exec.

use std::io::Write;
use std::sync::Arc;

use super::gate::ShutdownGate;
use crate::config::{AgentConfig, ConnectPolicy};
use crate::dispatch::{Dispatcher, Sink};
use crate::session::{Session, SessionStats};
use crate::transport::{Connection, Transport};

/// Exit status for every signal-driven shutdown
pub const EXIT_OK: i32 = 0;
/// Exit status when the first connect failed and the policy is abort
pub const EXIT_CONNECT_FAILED: i32 = 2;

/// Lifecycle states, in the only order they can occur
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum AgentState {
    Init,
    Running,
    Draining,
    Terminated,
}

impl AgentState {
    fn advance(&mut self, to: AgentState) {
        debug_assert!(to > *self, "invalid transition {:?} -> {:?}", self, to);
        log::debug!("agent state {:?} -> {:?}", self, to);
        *self = to;
    }
}

/// What happened during one agent run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunReport {
    pub exit_code: i32,
    /// Whether the transport ever connected
    pub connected: bool,
    /// Last state reached
    pub state: AgentState,
    pub stats: SessionStats,
}

/// One agent process: a transport, a sink and the session between them
pub struct Agent<T, S> {
    config: AgentConfig,
    transport: T,
    sink: S,
    session: Arc<Session>,
}

impl<T, S> Agent<T, S>
where
    T: Transport,
    S: Sink + 'static,
{
    pub fn new(config: AgentConfig, transport: T, sink: S) -> Self {
        let session = Arc::new(Session::new(config.identity.clone(), config.master.clone()));
        Self {
            config,
            transport,
            sink,
            session,
        }
    }

    /// Run until `gate` receives a shutdown request
    pub fn run(self, gate: &ShutdownGate) -> RunReport {
        let Agent {
            config,
            transport,
            sink,
            session,
        } = self;
        let mut state = AgentState::Init;

        log::info!(
            "connecting to master at {} as {}",
            session.master(),
            session.identity()
        );

        let dispatcher = Dispatcher::new(Arc::clone(&session), sink);
        let mut connection: Option<Box<dyn Connection>> = match transport.connect(Box::new(dispatcher)) {
            Ok(connection) => Some(connection),
            Err(e) => {
                log::error!("error initializing event transport (errno {}): {}", e.errno(), e);
                match config.on_connect_failure {
                    ConnectPolicy::Continue => {
                        log::warn!("continuing without a connection to the master");
                        None
                    }
                    ConnectPolicy::Abort => {
                        state.advance(AgentState::Terminated);
                        return finish(state, &session, false, EXIT_CONNECT_FAILED);
                    }
                }
            }
        };
        let connected = connection.is_some();

        state.advance(AgentState::Running);
        gate.wait_for_shutdown();

        state.advance(AgentState::Draining);
        log::info!("shutdown requested, stopping event transport");
        if let Some(connection) = connection.as_mut() {
            connection.shutdown();
        }
        drop(connection);

        state.advance(AgentState::Terminated);
        finish(state, &session, connected, EXIT_OK)
    }
}

fn finish(state: AgentState, session: &Session, connected: bool, exit_code: i32) -> RunReport {
    let stats = session.stats();
    log::info!(
        "terminated: {} events received, {} forwarded ({} bytes), {} ignored, {} transport failures",
        stats.events_received,
        stats.events_forwarded,
        stats.bytes_forwarded,
        stats.events_ignored,
        stats.transport_errors
    );
    let _ = std::io::stdout().flush();

    RunReport {
        exit_code,
        connected,
        state,
        stats,
    }
}
