use std::io;
use std::net::{SocketAddr, UdpSocket};
use std::time::Duration;

/// Outcome of one `recv` attempt.
pub enum RecvOutcome {
    Payload(Vec<u8>, SocketAddr),
    /// A zero-length datagram was received.
    Empty,
    /// No datagram arrived within the timeout.
    Timeout,
    SocketError(io::Error),
}

/// A single blocking UDP socket used for both directions of Chord traffic.
///
/// No fragmentation, no per-message acknowledgement at this layer — both are
/// spec non-goals. Reliability for the handful of messages that need it is
/// provided by [`crate::timers::SendTimers`].
pub struct Transport {
    socket: UdpSocket,
}

impl Transport {
    /// Binds to `self_ip:port`. `self_ip` is the address this node
    /// advertises to peers (spec.md §4.3's "local hostname"), so binding to
    /// it directly — rather than `0.0.0.0` — both satisfies "all interfaces
    /// of the local hostname" for a single-homed host and lets several
    /// nodes share one well-known `chord_port` on a multi-homed or
    /// loopback-aliased host without colliding.
    pub fn bind(self_ip: &str, port: u16) -> io::Result<Self> {
        let socket = UdpSocket::bind((self_ip, port))?;
        Ok(Self { socket })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    /// Sends `bytes` to `addr`, retrying until the kernel has accepted the
    /// whole datagram or an error occurs.
    pub fn send(&self, addr: SocketAddr, bytes: &[u8]) -> io::Result<()> {
        let mut offset = 0;

        while offset < bytes.len() {
            match self.socket.send_to(&bytes[offset..], addr) {
                Ok(0) => break,
                Ok(n) => offset += n,
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => continue,
                Err(e) => return Err(e),
            }
        }

        Ok(())
    }

    /// Waits up to `timeout` for one datagram.
    pub fn recv(&self, timeout: Duration) -> RecvOutcome {
        if let Err(e) = self.socket.set_read_timeout(Some(timeout)) {
            return RecvOutcome::SocketError(e);
        }

        let mut buf = [0u8; 1500];

        match self.socket.recv_from(&mut buf) {
            Ok((0, _)) => RecvOutcome::Empty,
            Ok((n, addr)) => RecvOutcome::Payload(buf[..n].to_vec(), addr),
            Err(e) if matches!(e.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut) => {
                RecvOutcome::Timeout
            }
            Err(e) => RecvOutcome::SocketError(e),
        }
    }
}
