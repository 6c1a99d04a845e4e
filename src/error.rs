use std::error::Error;
use std::fmt;
use std::io;

/// Everything that can go wrong during a ping session
///
/// Setup failures (`Permission`, `Address`, `Unreachable`, `InvalidArgument`) end the session
/// before any statistics are produced. `Timeout` and `Decode` are per-iteration outcomes which
/// the session records and then moves on.
#[derive(Debug)]
pub enum PingError {
    /// The process lacks the privilege to open a raw socket
    Permission(io::Error),
    /// Socket setup failed for a reason other than privilege
    Address(io::Error),
    /// The destination could not be resolved or refused by the operating system
    Unreachable(String),
    /// No datagram arrived before the receive deadline
    Timeout,
    /// A received datagram was too short to carry an ICMP header
    Decode { len: usize },
    /// A command line value failed validation
    InvalidArgument(String),
}

impl PingError {
    /// Return `true` if this error terminates the session
    pub fn is_fatal(&self) -> bool {
        match self {
            PingError::Timeout | PingError::Decode { .. } => false,
            _ => true,
        }
    }

    /// Classify an error raised while opening the raw socket
    pub(crate) fn from_open(error: io::Error) -> Self {
        match error.kind() {
            io::ErrorKind::PermissionDenied => PingError::Permission(error),
            _ => PingError::Address(error),
        }
    }
}

impl fmt::Display for PingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PingError::Permission(_) => write!(
                f,
                "You need administrative privileges to open a raw socket"
            ),
            PingError::Address(e) => write!(f, "Socket error: {}", e),
            PingError::Unreachable(dest) => write!(f, "Destination not found: {}", dest),
            PingError::Timeout => write!(f, "Request timed out"),
            PingError::Decode { len } => {
                write!(f, "Datagram of {} bytes is too short for an ICMP header", len)
            }
            PingError::InvalidArgument(msg) => write!(f, "{}", msg),
        }
    }
}

impl Error for PingError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            PingError::Permission(e) | PingError::Address(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for PingError {
    /// A receive cut short by a signal ends the wait the same way an expired timeout does
    fn from(error: io::Error) -> Self {
        match error.kind() {
            io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock | io::ErrorKind::Interrupted => {
                PingError::Timeout
            }
            _ => PingError::Address(error),
        }
    }
}
