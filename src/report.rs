use std::fmt;

use crate::session::{PingResult, SessionStats};
use crate::Target;

/// Console formatting of a ping session
#[derive(Debug)]
pub struct Reporter {
    host: String,
    addr: String,
    ttl: u8,
}

impl Reporter {
    pub fn new(target: &Target, ttl: u8) -> Self {
        Self {
            host: target.host.clone(),
            addr: target.addr.to_string(),
            ttl,
        }
    }

    /// Line printed before the first request
    pub fn header(&self, size: usize) -> String {
        format!("PING {} ({}): {} bytes of data", self.host, self.addr, size)
    }

    /// Line printed for the outcome of one request
    pub fn line(&self, result: &PingResult) -> String {
        match *result {
            PingResult::Success {
                rtt_ms,
                sequence,
                identifier,
            } => format!(
                "destination = {}; icmp_seq = {}; icmp_id = {}; ttl = {}; rtt = {:.1} ms",
                self.host, sequence, identifier, self.ttl, rtt_ms
            ),
            PingResult::Timeout { sequence } => format!(
                "destination = {}; icmp_seq = {}; icmp_id = {}; ttl = {}; Request timed out",
                self.host, sequence, sequence, self.ttl
            ),
        }
    }
}

/// Final statistics line
pub struct Summary<'a>(pub &'a SessionStats);

impl fmt::Display for Summary<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let stats = self.0;
        write!(
            f,
            "Average rtt: {:.1} ms; {}/{} ({:.2}%) successful pings.",
            stats.average_rtt_ms(),
            stats.successful_count,
            stats.total_count,
            stats.success_percent()
        )
    }
}
