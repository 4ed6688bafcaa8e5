//! Termination signal forwarding
//!
//! Handlers are installed once, before the first mutation, and stay
//! installed for the rest of the process so a second Ctrl+C can never kill
//! the process halfway through teardown.

use crate::error::Result;
use std::fmt;
use tokio::signal::unix::{SignalKind, signal};
use tokio::sync::mpsc;

/// Why the session is being asked to end
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    Interrupt,
    Terminate,
    Hangup,
}

impl fmt::Display for Termination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Termination::Interrupt => "SIGINT",
            Termination::Terminate => "SIGTERM",
            Termination::Hangup => "SIGHUP",
        };
        write!(f, "{}", s)
    }
}

/// Install handlers for SIGINT, SIGTERM and SIGHUP
///
/// Must be called from within a tokio runtime. Every delivery is forwarded
/// to the returned receiver.
pub fn install() -> Result<mpsc::UnboundedReceiver<Termination>> {
    let (tx, rx) = mpsc::unbounded_channel();

    for (kind, reason) in [
        (SignalKind::interrupt(), Termination::Interrupt),
        (SignalKind::terminate(), Termination::Terminate),
        (SignalKind::hangup(), Termination::Hangup),
    ] {
        let mut stream = signal(kind)?;
        let tx = tx.clone();
        tokio::spawn(async move {
            while stream.recv().await.is_some() {
                if tx.send(reason).is_err() {
                    break;
                }
            }
        });
    }

    Ok(rx)
}
