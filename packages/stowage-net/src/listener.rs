//! Listening socket with a start/stop/dispose lifecycle.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::task::{Context, Poll, Waker};

use tokio::net::{TcpListener, TcpSocket, TcpStream};
use tokio::sync::Notify;
use tracing::{debug, info, warn};

use crate::client::TcpClient;
use crate::error::ListenerError;

/// Pending-connection backlog requested on start.
pub const BACKLOG: u32 = 1000;

enum State {
    Created(TcpSocket),
    Listening(Arc<TcpListener>),
    Stopped,
    Disposed,
}

/// TCP listener bound to a local port.
///
/// `Created` until [`Listener::start`], then listening until
/// [`Listener::stop`]. [`Listener::dispose`] can be called in any state;
/// afterwards every operation does nothing.
pub struct Listener {
    state: Mutex<State>,
    pending: Mutex<Option<(TcpStream, SocketAddr)>>,
    held: Notify,
    shutdown: Notify,
    disposed: AtomicBool,
    local_addr: SocketAddr,
}

/// Binds `0.0.0.0:port`. Port 0 picks a free port.
///
/// # Returns
/// `Result<Listener, ListenerError>` with the listener in its created state.
pub fn create_listener(port: u16) -> Result<Listener, ListenerError> {
    let socket = TcpSocket::new_v4()?;
    socket.set_reuseaddr(true)?;
    socket.bind(SocketAddr::from(([0, 0, 0, 0], port)))?;
    let local_addr = socket.local_addr()?;

    debug!("Bound listener to {}", local_addr);
    Ok(Listener {
        state: Mutex::new(State::Created(socket)),
        pending: Mutex::new(None),
        held: Notify::new(),
        shutdown: Notify::new(),
        disposed: AtomicBool::new(false),
        local_addr,
    })
}

impl Listener {
    /// Returns the bound address.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    fn lock_state(&self) -> Result<MutexGuard<'_, State>, ListenerError> {
        self.state.lock().map_err(|_| ListenerError::LockPoisoned)
    }

    fn lock_pending(
        &self,
    ) -> Result<MutexGuard<'_, Option<(TcpStream, SocketAddr)>>, ListenerError> {
        self.pending.lock().map_err(|_| ListenerError::LockPoisoned)
    }

    fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::SeqCst)
    }

    /// Starts listening with a backlog of [`BACKLOG`] connections.
    ///
    /// Starting twice is a no-op.
    ///
    /// # Panics
    /// Must be called from within a Tokio runtime.
    pub fn start(&self) -> Result<(), ListenerError> {
        let mut state = self.lock_state()?;
        match std::mem::replace(&mut *state, State::Stopped) {
            State::Created(socket) => {
                let listener = socket.listen(BACKLOG)?;
                *state = State::Listening(Arc::new(listener));
                info!("Listening on {}", self.local_addr);
                Ok(())
            }
            State::Listening(listener) => {
                *state = State::Listening(listener);
                Ok(())
            }
            State::Stopped => Err(ListenerError::Closed),
            State::Disposed => {
                *state = State::Disposed;
                Ok(())
            }
        }
    }

    /// Returns `true` if a connection is waiting to be accepted.
    ///
    /// Never blocks. A connection seen here is held and returned by an
    /// [`Listener::accept_client`] that is already waiting, or by the next one.
    pub fn has_available_clients(&self) -> bool {
        if self.is_disposed() {
            return false;
        }
        let listener = match self.lock_state().as_deref() {
            Ok(State::Listening(listener)) => Arc::clone(listener),
            _ => return false,
        };
        let Ok(mut pending) = self.lock_pending() else {
            return false;
        };
        if pending.is_some() {
            return true;
        }

        let mut cx = Context::from_waker(Waker::noop());
        match listener.poll_accept(&mut cx) {
            Poll::Ready(Ok(accepted)) => {
                *pending = Some(accepted);
                drop(pending);
                // hand it to an accept that is already waiting
                self.held.notify_waiters();
                true
            }
            Poll::Ready(Err(e)) => {
                warn!("Readiness check on {} failed: {}", self.local_addr, e);
                false
            }
            Poll::Pending => false,
        }
    }

    /// Waits for one inbound connection.
    ///
    /// # Returns
    /// - `Ok(Some(client))` for an accepted connection
    /// - `Ok(None)` once the listener is disposed
    /// - `Err(NotStarted)` before [`Listener::start`]
    /// - `Err(Closed)` after [`Listener::stop`], including when the stop
    ///   interrupts this call
    pub async fn accept_client(&self) -> Result<Option<TcpClient>, ListenerError> {
        loop {
            let notified = self.shutdown.notified();
            let held = self.held.notified();
            tokio::pin!(notified, held);
            notified.as_mut().enable();
            held.as_mut().enable();

            if self.is_disposed() {
                return Ok(None);
            }
            let listener = match &*self.lock_state()? {
                State::Created(_) => return Err(ListenerError::NotStarted),
                State::Listening(listener) => Arc::clone(listener),
                State::Stopped => return Err(ListenerError::Closed),
                State::Disposed => return Ok(None),
            };

            let taken = self.lock_pending()?.take();
            if let Some((stream, peer_addr)) = taken {
                debug!("Accepted held connection from {}", peer_addr);
                return Ok(Some(TcpClient::new(stream, peer_addr)?));
            }

            tokio::select! {
                accepted = listener.accept() => {
                    let (stream, peer_addr) = accepted?;
                    debug!("Accepted connection from {}", peer_addr);
                    return Ok(Some(TcpClient::new(stream, peer_addr)?));
                }
                _ = &mut held => continue,
                _ = &mut notified => {
                    return if self.is_disposed() {
                        Ok(None)
                    } else {
                        Err(ListenerError::Closed)
                    };
                }
            }
        }
    }

    /// Closes the listening socket and wakes pending accepts.
    pub fn stop(&self) -> Result<(), ListenerError> {
        {
            let mut state = self.lock_state()?;
            if matches!(*state, State::Disposed | State::Stopped) {
                return Ok(());
            }
            *state = State::Stopped;
        }
        self.lock_pending()?.take();
        self.shutdown.notify_waiters();

        info!("Stopped listener on {}", self.local_addr);
        Ok(())
    }

    /// Releases the socket. Safe to call any number of times.
    pub fn dispose(&self) {
        if self.disposed.swap(true, Ordering::SeqCst) {
            return;
        }
        if let Ok(mut state) = self.state.lock() {
            *state = State::Disposed;
        }
        if let Ok(mut pending) = self.pending.lock() {
            pending.take();
        }
        self.shutdown.notify_waiters();

        debug!("Disposed listener on {}", self.local_addr);
    }
}

impl std::fmt::Debug for Listener {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Listener")
            .field("local_addr", &self.local_addr)
            .field("disposed", &self.is_disposed())
            .finish()
    }
}
