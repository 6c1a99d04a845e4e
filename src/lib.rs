//! # ECHOPING ping application
//!
//! This crate provides the components of a minimal ICMP echo diagnostic tool. It consists of
//! three core components:
//! - The packet codec in `packet`, which builds echo requests and decodes received ICMP headers
//! - The raw `IcmpSocket` in `socket`, with a fixed TTL and receive timeout
//! - The `PingSession` in `session`, which sends one request at a time, waits for the reply or
//!   the timeout and accumulates the statistics
//!
//! Argument parsing, logging and console output live in `cli`, `logger` and `report`.

#[macro_use]
extern crate clap;
#[macro_use]
extern crate log;

use std::net::{IpAddr, Ipv4Addr};
use std::time::Duration;

pub mod cli;
pub mod error;
pub mod logger;
pub mod packet;
pub mod report;
pub mod session;
pub mod socket;

use error::PingError;
use report::Reporter;
use session::{CancelToken, PingSession, SessionStats};
use socket::IcmpSocket;

/// Time to wait for each reply
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(1);

/// Default time to live of outgoing requests
pub const DEFAULT_TTL: u8 = 128;

/// Default payload size in bytes
pub const DEFAULT_SIZE: usize = 56;

/// Session configuration
///
/// The `SessionConfig` is immutable once parsed and will be consumed by the `PingSession`.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionConfig {
    pub dest: Dest,
    /// Number of requests to send, `None` for no limit
    pub count: Option<u64>,
    pub ttl: u8,
    pub timeout: Duration,
    /// Payload size of each request
    pub size: usize,
    /// Only accept echo replies matching the request in flight
    pub strict: bool,
}

/// Destination for ping
///
/// The user can choose to either provide an IPv4 address or a host name as destination for the
/// ping. Host names are resolved before the first request is sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dest {
    Ip(IpAddr),
    Host(String),
}

impl From<&str> for Dest {
    fn from(val: &str) -> Self {
        match val.parse::<IpAddr>() {
            Ok(ip) => Dest::Ip(ip),

            // If the input provided is not a valid destination, it will fail during dns resolution
            Err(_) => Dest::Host(val.to_string()),
        }
    }
}

/// Resolved destination
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    /// Destination as given by the user
    pub host: String,
    pub addr: Ipv4Addr,
}

/// Resolve the destination to an IPv4 address
///
/// # Errors
///
/// Returns `PingError::Unreachable` if the host name does not resolve to any IPv4 address. IPv6
/// destinations are not supported and fail the same way.
pub fn resolve(dest: &Dest) -> Result<Target, PingError> {
    use dns_lookup::lookup_host;

    match dest {
        Dest::Ip(IpAddr::V4(addr)) => Ok(Target {
            host: addr.to_string(),
            addr: *addr,
        }),
        Dest::Ip(IpAddr::V6(addr)) => Err(PingError::Unreachable(format!(
            "{} (IPv6 is not supported)",
            addr
        ))),
        Dest::Host(host) => {
            let addrs = lookup_host(host)
                .map_err(|e| PingError::Unreachable(format!("{} ({})", host, e)))?;
            let addr = addrs
                .into_iter()
                .find_map(|addr| match addr {
                    IpAddr::V4(v4) => Some(v4),
                    IpAddr::V6(_) => None,
                })
                .ok_or_else(|| PingError::Unreachable(host.clone()))?;

            info!("Resolved host {} to IP {}", host, addr);

            Ok(Target {
                host: host.clone(),
                addr,
            })
        }
    }
}

/// Run a complete ping session and return its statistics
///
/// Opens the raw socket, resolves the destination and loops until `cancel` fires or the
/// configured count is reached, printing one line per request. The socket is owned by the session
/// and released when this function returns, whichever way it returns.
///
/// # Errors
///
/// Socket setup and destination resolution failures are returned before any request is sent.
pub fn run(config: SessionConfig, cancel: CancelToken) -> Result<SessionStats, PingError> {
    let socket = IcmpSocket::open(config.ttl, config.timeout)?;
    let target = resolve(&config.dest)?;

    let reporter = Reporter::new(&target, config.ttl);
    println!("{}", reporter.header(config.size));

    trace!("Start ping session");

    let mut session = PingSession::new(config, target.addr, socket, cancel);
    session.run(|result| println!("{}", reporter.line(result)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv6Addr;

    #[test]
    fn dest_from_str() {
        assert_eq!(
            Dest::from("10.0.0.1"),
            Dest::Ip(IpAddr::V4(Ipv4Addr::new(10, 0, 0, 1)))
        );
        assert_eq!(Dest::from("::1"), Dest::Ip(IpAddr::V6(Ipv6Addr::LOCALHOST)));
        assert_eq!(
            Dest::from("example.com"),
            Dest::Host("example.com".to_string())
        );
    }

    #[test]
    fn resolve_ipv4_literal() {
        let target = resolve(&Dest::from("127.0.0.1")).unwrap();

        assert_eq!(target.addr, Ipv4Addr::LOCALHOST);
        assert_eq!(target.host, "127.0.0.1");
    }

    #[test]
    fn resolve_rejects_ipv6() {
        let err = resolve(&Dest::from("::1")).unwrap_err();

        assert!(matches!(err, PingError::Unreachable(_)));
        assert!(err.is_fatal());
    }

    #[test]
    fn resolve_unknown_host() {
        let err = resolve(&Dest::from("no-such-host.invalid")).unwrap_err();

        assert!(matches!(err, PingError::Unreachable(_)));
    }
}
