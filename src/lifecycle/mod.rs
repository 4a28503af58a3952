//! Process lifecycle
//!
//! Handles everything between process start and exit:
//! - The shutdown gate signal handlers post to
//! - Termination signal handlers (SIGINT, SIGHUP, SIGTERM)
//! - The agent state machine and ordered teardown

mod agent;
mod gate;
mod signals;

pub use agent::{Agent, AgentState, RunReport, EXIT_CONNECT_FAILED, EXIT_OK};
pub use gate::{GateError, ShutdownGate};
pub use signals::{
    disposition, install_termination_handlers, Disposition, InstalledHandlers, SignalError,
    TERMINATION_SIGNALS,
};

use crate::config::AgentConfig;
use crate::dispatch::Sink;
use crate::transport::Transport;

/// Run an agent as the process's main flow
///
/// Installs the termination handlers, then runs the agent against the
/// global gate. Must be called from the main thread before any other thread
/// is started.
pub fn run<T, S>(config: AgentConfig, transport: T, sink: S) -> Result<RunReport, LifecycleError>
where
    T: Transport,
    S: Sink + 'static,
{
    let gate = ShutdownGate::global()?;

    let installed = install_termination_handlers()?;
    for signal in &installed.ignored {
        log::info!("{:?} was ignored at startup and will not trigger shutdown", signal);
    }

    Ok(Agent::new(config, transport, sink).run(gate))
}

#[derive(Debug, thiserror::Error)]
pub enum LifecycleError {
    #[error("Shutdown gate setup failed: {0}")]
    Gate(#[from] GateError),

    #[error("Signal setup failed: {0}")]
    Signal(#[from] SignalError),
}
