//! Minimal TCP listener adapter.
//!
//! [`create_listener`] binds a port; the returned [`Listener`] hands out one
//! [`TcpClient`] per accepted connection. What is spoken over the connection
//! is up to the caller.

pub mod client;
pub mod error;
pub mod listener;

pub use client::TcpClient;
pub use error::ListenerError;
pub use listener::{create_listener, Listener, BACKLOG};
