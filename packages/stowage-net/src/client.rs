//! Accepted client connection.

use std::net::SocketAddr;

use tokio::net::TcpStream;

/// Connection handed out by [`crate::Listener::accept_client`].
#[derive(Debug)]
pub struct TcpClient {
    stream: TcpStream,
    peer_addr: SocketAddr,
}

impl TcpClient {
    pub(crate) fn new(stream: TcpStream, peer_addr: SocketAddr) -> std::io::Result<Self> {
        stream.set_nodelay(true)?;
        Ok(Self { stream, peer_addr })
    }

    /// Returns the remote address.
    pub fn peer_addr(&self) -> SocketAddr {
        self.peer_addr
    }

    /// Returns the underlying stream.
    pub fn stream(&self) -> &TcpStream {
        &self.stream
    }

    /// Returns the underlying stream mutably.
    pub fn stream_mut(&mut self) -> &mut TcpStream {
        &mut self.stream
    }

    /// Consumes the handle, returning the stream.
    pub fn into_stream(self) -> TcpStream {
        self.stream
    }
}
