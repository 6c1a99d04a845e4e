use socket2::{Domain, Protocol, SockAddr, Socket, Type};
use std::io;
use std::mem::MaybeUninit;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

use crate::error::PingError;

/// Largest datagram accepted by `receive`
pub const MAX_DATAGRAM_SIZE: usize = 1024;

/// Read timeouts are passed to the kernel in whole microseconds, anything shorter means no
/// timeout at all
const MIN_WAIT: Duration = Duration::from_micros(1);

/// Waits this close to the configured timeout reuse it instead of changing the socket option
const RETUNE_TOLERANCE: Duration = Duration::from_millis(1);

/// Read timeout to apply for a receive that may block for at most `wait`
///
/// Returns `None` when `wait` is too short to be expressed, in which case the receive times out
/// without touching the socket.
fn read_timeout_for(wait: Duration, timeout: Duration) -> Option<Duration> {
    if wait < MIN_WAIT {
        return None;
    }
    match timeout.checked_sub(wait) {
        Some(shortfall) if shortfall > RETUNE_TOLERANCE => Some(wait),
        _ => Some(timeout),
    }
}

/// Send and receive primitives the ping session is driven by
///
/// `IcmpSocket` is the implementation backed by a raw socket. Received datagrams carry their IPv4
/// header.
pub trait Transport {
    /// Transmit one ICMP message to `dest`
    fn send(&mut self, packet: &[u8], dest: Ipv4Addr) -> Result<(), PingError>;

    /// Block until a datagram arrives or `wait` has elapsed
    ///
    /// Fails with `PingError::Timeout` when nothing arrived in time or the wait was interrupted
    /// by a signal.
    fn receive(&mut self, wait: Duration) -> Result<(Vec<u8>, IpAddr), PingError>;
}

/// Raw IPv4 socket bound to the ICMP protocol
///
/// The socket is released when this value is dropped, or earlier by calling `close`.
#[derive(Debug)]
pub struct IcmpSocket {
    socket: Option<Socket>,
    timeout: Duration,
    /// Read timeout currently set on the socket
    applied: Duration,
}

impl IcmpSocket {
    /// Open a raw ICMP socket with the given outgoing TTL and receive timeout
    ///
    /// # Errors
    ///
    /// Fails with `PingError::Permission` if the process may not open raw sockets, which on most
    /// systems requires root or `CAP_NET_RAW`. Every other setup failure is a
    /// `PingError::Address`.
    pub fn open(ttl: u8, timeout: Duration) -> Result<Self, PingError> {
        trace!("Opening raw ICMP socket");

        let socket = Socket::new(Domain::IPV4, Type::RAW, Some(Protocol::ICMPV4))
            .map_err(PingError::from_open)?;

        info!("Set time to live: {}", ttl);
        socket
            .set_ttl(u32::from(ttl))
            .map_err(PingError::Address)?;
        socket
            .set_read_timeout(Some(timeout))
            .map_err(PingError::Address)?;

        Ok(Self {
            socket: Some(socket),
            timeout,
            applied: timeout,
        })
    }

    /// Receive timeout the socket was opened with
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Return `true` until the socket has been closed
    pub fn is_open(&self) -> bool {
        self.socket.is_some()
    }

    /// Release the underlying socket
    ///
    /// Calling this more than once has no further effect.
    pub fn close(&mut self) {
        if self.socket.take().is_some() {
            trace!("Closed raw ICMP socket");
        }
    }

    fn get(&self) -> Result<&Socket, PingError> {
        self.socket.as_ref().ok_or_else(|| {
            PingError::Address(io::Error::new(
                io::ErrorKind::NotConnected,
                "socket already closed",
            ))
        })
    }
}

impl Transport for IcmpSocket {
    fn send(&mut self, packet: &[u8], dest: Ipv4Addr) -> Result<(), PingError> {
        let addr = SockAddr::from(SocketAddr::new(IpAddr::V4(dest), 0));
        self.get()?
            .send_to(packet, &addr)
            .map_err(|e| PingError::Unreachable(format!("{} ({})", dest, e)))?;
        Ok(())
    }

    fn receive(&mut self, wait: Duration) -> Result<(Vec<u8>, IpAddr), PingError> {
        let read_timeout = match read_timeout_for(wait, self.timeout) {
            Some(read_timeout) => read_timeout,
            None => return Err(PingError::Timeout),
        };

        // Only retuned for a shortened wait, the next full wait sets it back
        if read_timeout != self.applied {
            self.get()?.set_read_timeout(Some(read_timeout))?;
            self.applied = read_timeout;
        }

        let mut buf = [MaybeUninit::<u8>::uninit(); MAX_DATAGRAM_SIZE];
        // EINTR surfaces here on Ctrl-C and maps to `PingError::Timeout`
        let (n, addr) = self.get()?.recv_from(&mut buf)?;

        // recv_from initialised the first `n` bytes
        let datagram = buf[..n]
            .iter()
            .map(|b| unsafe { b.assume_init() })
            .collect();
        let source = addr
            .as_socket()
            .map(|a| a.ip())
            .unwrap_or(IpAddr::V4(Ipv4Addr::UNSPECIFIED));

        Ok((datagram, source))
    }
}

impl Drop for IcmpSocket {
    fn drop(&mut self) {
        self.close();
    }
}

/*
 * Note: Raw sockets work only with root privileges, so the tests below accept either outcome of
 * opening one and only check the behaviour that follows from it.
 */
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_reports_permission_or_succeeds() {
        match IcmpSocket::open(64, Duration::from_secs(1)) {
            Ok(socket) => {
                assert!(socket.is_open());
                assert_eq!(socket.timeout(), Duration::from_secs(1));
            }
            Err(e) => assert!(e.is_fatal()),
        }
    }

    #[test]
    fn close_is_idempotent() {
        if let Ok(mut socket) = IcmpSocket::open(64, Duration::from_millis(10)) {
            socket.close();
            assert!(!socket.is_open());
            socket.close();
            assert!(!socket.is_open());

            match socket.send(&[8, 0, 0, 0, 0, 0, 0, 0], Ipv4Addr::LOCALHOST) {
                Err(PingError::Address(_)) => (),
                other => panic!("expected address error, got {:?}", other),
            }
        }
    }

    #[test]
    fn read_timeout_selection() {
        let timeout = Duration::from_secs(1);

        assert_eq!(read_timeout_for(Duration::from_secs(0), timeout), None);
        assert_eq!(read_timeout_for(Duration::from_nanos(999), timeout), None);
        assert_eq!(
            read_timeout_for(Duration::from_micros(1), timeout),
            Some(Duration::from_micros(1))
        );
        assert_eq!(
            read_timeout_for(Duration::from_millis(300), timeout),
            Some(Duration::from_millis(300))
        );

        // Just short of the configured timeout keeps the socket option as it is
        let almost = timeout - Duration::from_micros(20);
        assert_eq!(read_timeout_for(almost, timeout), Some(timeout));
        assert_eq!(read_timeout_for(timeout, timeout), Some(timeout));
        assert_eq!(read_timeout_for(timeout * 2, timeout), Some(timeout));
    }

    #[test]
    fn sub_microsecond_wait_times_out_immediately() {
        if let Ok(mut socket) = IcmpSocket::open(64, Duration::from_millis(10)) {
            assert!(matches!(
                socket.receive(Duration::from_nanos(500)),
                Err(PingError::Timeout)
            ));
            assert_eq!(socket.applied, Duration::from_millis(10));
        }
    }

    #[test]
    fn zero_wait_times_out_immediately() {
        if let Ok(mut socket) = IcmpSocket::open(64, Duration::from_millis(10)) {
            assert!(matches!(
                socket.receive(Duration::from_secs(0)),
                Err(PingError::Timeout)
            ));
        }
    }
}
