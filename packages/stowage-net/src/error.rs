//! Listener error types.

use thiserror::Error;

/// Listener operation errors.
#[derive(Error, Debug)]
pub enum ListenerError {
    /// Socket error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Accept called before start
    #[error("Listener has not been started")]
    NotStarted,

    /// Listener was stopped
    #[error("Listener is closed")]
    Closed,

    /// Lock poisoned (Mutex poisoned)
    #[error("Lock poisoned")]
    LockPoisoned,
}
