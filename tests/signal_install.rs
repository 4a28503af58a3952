//! Termination handler installation
//!
//! Signal dispositions are process-wide, so this binary holds a single test.

use std::time::Duration;

use dlogger::lifecycle::{disposition, install_termination_handlers, Disposition};
use dlogger::ShutdownGate;
use nix::sys::signal::{raise, signal, SigHandler, Signal};

#[test]
fn test_termination_signals_reach_gate_and_ignored_stays_ignored() {
    // As if started under nohup
    unsafe { signal(Signal::SIGHUP, SigHandler::SigIgn) }.unwrap();

    let installed = install_termination_handlers().unwrap();
    assert_eq!(installed.handled, vec![Signal::SIGINT, Signal::SIGTERM]);
    assert_eq!(installed.ignored, vec![Signal::SIGHUP]);

    assert_eq!(disposition(Signal::SIGHUP).unwrap(), Disposition::Ignore);
    assert_eq!(disposition(Signal::SIGINT).unwrap(), Disposition::Handler);
    assert_eq!(disposition(Signal::SIGTERM).unwrap(), Disposition::Handler);

    let gate = ShutdownGate::global().unwrap();

    // Every delivery before the wait is counted
    raise(Signal::SIGTERM).unwrap();
    raise(Signal::SIGTERM).unwrap();
    raise(Signal::SIGINT).unwrap();
    for _ in 0..3 {
        assert!(gate.wait_timeout(Duration::from_secs(1)));
    }
    assert!(!gate.wait_timeout(Duration::from_millis(50)));

    // Still installed after delivery
    assert_eq!(disposition(Signal::SIGTERM).unwrap(), Disposition::Handler);
    raise(Signal::SIGTERM).unwrap();
    assert!(gate.wait_timeout(Duration::from_secs(1)));

    // Ignored signal never reaches the gate
    raise(Signal::SIGHUP).unwrap();
    assert!(!gate.wait_timeout(Duration::from_millis(50)));
}
