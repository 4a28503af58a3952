//! Termination signal handling
//!
//! SIGINT, SIGHUP and SIGTERM all request shutdown through the process-wide
//! [`ShutdownGate`]. The handler does nothing else: it posts to the gate and
//! re-registers itself, so every later delivery is counted too.
//!
//! A signal the parent set to "ignore" stays ignored. Whoever started the
//! agent disabled it on purpose (e.g. `nohup` for SIGHUP).

use std::io::Write;
use std::mem::MaybeUninit;

use nix::errno::Errno;
use nix::sys::signal::{sigaction, SaFlags, SigAction, SigHandler, SigSet, Signal};

use super::gate::{GateError, ShutdownGate};

/// Signals that request shutdown
pub const TERMINATION_SIGNALS: [Signal; 3] = [Signal::SIGINT, Signal::SIGHUP, Signal::SIGTERM];

/// Current action for a signal
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    Default,
    Ignore,
    Handler,
}

/// Result of installing the termination handlers
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct InstalledHandlers {
    /// Signals that now request shutdown
    pub handled: Vec<Signal>,
    /// Signals left alone because they were ignored
    pub ignored: Vec<Signal>,
}

#[derive(Debug, thiserror::Error)]
pub enum SignalError {
    #[error(transparent)]
    Gate(#[from] GateError),

    #[error("failed to query action for {signal:?}: {source}")]
    Query {
        signal: Signal,
        #[source]
        source: Errno,
    },

    #[error("failed to install handler for {signal:?}: {source}")]
    Install {
        signal: Signal,
        #[source]
        source: Errno,
    },
}

extern "C" fn handle_termination(signum: libc::c_int) {
    if let Some(gate) = ShutdownGate::try_global() {
        gate.request_shutdown();
    }

    if let Ok(signal) = Signal::try_from(signum) {
        // SAFETY: sigaction is async-signal-safe and the action only
        // references this handler
        let _ = unsafe { sigaction(signal, &termination_action()) };
    }
}

fn termination_action() -> SigAction {
    SigAction::new(
        SigHandler::Handler(handle_termination),
        SaFlags::SA_RESTART,
        SigSet::empty(),
    )
}

/// Read the current action for `signal` without changing it
pub fn disposition(signal: Signal) -> Result<Disposition, SignalError> {
    let mut current = MaybeUninit::<libc::sigaction>::uninit();

    // SAFETY: a null new action only queries; the kernel fills `current`
    let rc = unsafe { libc::sigaction(signal as libc::c_int, std::ptr::null(), current.as_mut_ptr()) };
    Errno::result(rc).map_err(|source| SignalError::Query { signal, source })?;

    // SAFETY: initialised by the successful call above
    let current = unsafe { current.assume_init() };

    Ok(match current.sa_sigaction {
        libc::SIG_IGN => Disposition::Ignore,
        libc::SIG_DFL => Disposition::Default,
        _ => Disposition::Handler,
    })
}

/// Route SIGINT, SIGHUP and SIGTERM to the global shutdown gate
///
/// Call once at startup, before any other thread is spawned. Creates the
/// global gate if needed and flushes stdout so nothing written so far is
/// lost to a signal-driven exit.
pub fn install_termination_handlers() -> Result<InstalledHandlers, SignalError> {
    ShutdownGate::global()?;

    let _ = std::io::stdout().flush();

    let mut installed = InstalledHandlers::default();

    for signal in TERMINATION_SIGNALS {
        if disposition(signal)? == Disposition::Ignore {
            log::debug!("{:?} is ignored, leaving it untouched", signal);
            installed.ignored.push(signal);
            continue;
        }

        // SAFETY: the handler only touches the eventfd and sigaction
        unsafe { sigaction(signal, &termination_action()) }
            .map_err(|source| SignalError::Install { signal, source })?;
        installed.handled.push(signal);
    }

    log::debug!(
        "termination handlers installed for {:?} (ignored: {:?})",
        installed.handled,
        installed.ignored
    );

    Ok(installed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_does_not_change_action() {
        let before = disposition(Signal::SIGUSR2).unwrap();
        let after = disposition(Signal::SIGUSR2).unwrap();
        assert_eq!(before, Disposition::Default);
        assert_eq!(before, after);
    }

    #[test]
    fn test_termination_set() {
        assert!(TERMINATION_SIGNALS.contains(&Signal::SIGINT));
        assert!(TERMINATION_SIGNALS.contains(&Signal::SIGHUP));
        assert!(TERMINATION_SIGNALS.contains(&Signal::SIGTERM));
    }
}
