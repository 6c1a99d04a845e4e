use std::net::Ipv4Addr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use crate::error::PingError;
use crate::packet::{decode_icmp_header, encode_echo_request, random_payload};
use crate::socket::Transport;
use crate::SessionConfig;

/// A thread-safe flag representing the receipt of a signal interrupt
///
/// The interrupt handler holds a clone and calls `cancel`; the session polls `is_cancelled` at
/// the top of every iteration.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request the session to stop after the iteration in flight
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Outcome of one request/reply iteration
#[derive(Debug, Copy, Clone, PartialEq)]
pub enum PingResult {
    Success {
        rtt_ms: f64,
        sequence: u16,
        identifier: u16,
    },
    Timeout {
        sequence: u16,
    },
}

impl PingResult {
    pub fn sequence(&self) -> u16 {
        match *self {
            PingResult::Success { sequence, .. } | PingResult::Timeout { sequence } => sequence,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, PingResult::Success { .. })
    }
}

/// Aggregate counters of a ping session
#[derive(Debug, Copy, Clone, Default, PartialEq)]
pub struct SessionStats {
    pub total_rtt_ms: f64,
    pub successful_count: u64,
    pub total_count: u64,
}

impl SessionStats {
    /// Account for the result of one iteration
    pub fn record(&mut self, result: &PingResult) {
        self.total_count += 1;
        if let PingResult::Success { rtt_ms, .. } = *result {
            self.successful_count += 1;
            self.total_rtt_ms += rtt_ms;
        }
    }

    /// Mean round-trip time of the successful iterations, 0 if there were none
    pub fn average_rtt_ms(&self) -> f64 {
        if self.successful_count == 0 {
            0.0
        } else {
            self.total_rtt_ms / self.successful_count as f64
        }
    }

    /// Share of successful iterations in percent, 0 if nothing was sent
    pub fn success_percent(&self) -> f64 {
        if self.total_count == 0 {
            0.0
        } else {
            100.0 * self.successful_count as f64 / self.total_count as f64
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Running,
    Stopping,
    Completed,
}

/// Request/reply loop of one ping session
///
/// Exactly one echo request is in flight at any time: the session sends, waits for a reply or the
/// timeout, records the outcome and only then moves on to the next sequence number. The session
/// owns its transport for its whole lifetime, so dropping the session releases the socket on
/// every exit path.
///
/// The sequence number starts at 0 and is also used as the identifier of the request.
pub struct PingSession<T: Transport> {
    config: SessionConfig,
    addr: Ipv4Addr,
    transport: T,
    cancel: CancelToken,
    state: SessionState,
    next_sequence: u16,
    payload: Vec<u8>,
    stats: SessionStats,
}

impl<T: Transport> PingSession<T> {
    pub fn new(config: SessionConfig, addr: Ipv4Addr, transport: T, cancel: CancelToken) -> Self {
        let payload = random_payload(config.size);
        Self {
            config,
            addr,
            transport,
            cancel,
            state: SessionState::Idle,
            next_sequence: 0,
            payload,
            stats: SessionStats::default(),
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn stats(&self) -> &SessionStats {
        &self.stats
    }

    /// Run the loop until it is cancelled or the configured count is reached
    ///
    /// `on_result` is called once per iteration, right after the outcome is known. Returns the
    /// final statistics.
    ///
    /// # Errors
    ///
    /// Fatal transport errors end the loop immediately and are passed on to the caller.
    pub fn run<F>(&mut self, mut on_result: F) -> Result<SessionStats, PingError>
    where
        F: FnMut(&PingResult),
    {
        while let Some(result) = self.step()? {
            on_result(&result);
        }
        Ok(self.finish())
    }

    /// Perform a single iteration
    ///
    /// Returns `Ok(None)` once the session has stopped, either because cancellation was observed
    /// or because the configured number of requests has been sent.
    pub fn step(&mut self) -> Result<Option<PingResult>, PingError> {
        match self.state {
            SessionState::Idle => self.state = SessionState::Running,
            SessionState::Running => (),
            SessionState::Stopping | SessionState::Completed => return Ok(None),
        }

        if self.cancel.is_cancelled() {
            info!("Interrupted after {} requests", self.stats.total_count);
            self.state = SessionState::Stopping;
            return Ok(None);
        }
        if let Some(count) = self.config.count {
            if self.stats.total_count >= count {
                self.state = SessionState::Stopping;
                return Ok(None);
            }
        }

        let sequence = self.next_sequence;
        self.next_sequence = sequence.wrapping_add(1);

        match self.exchange(sequence) {
            Ok(result) => {
                self.stats.record(&result);
                Ok(Some(result))
            }
            Err(e) => {
                self.state = SessionState::Stopping;
                Err(e)
            }
        }
    }

    /// Close the session and hand out the final statistics
    pub fn finish(&mut self) -> SessionStats {
        self.state = SessionState::Completed;
        self.stats
    }

    /// Send one echo request and wait for its reply
    ///
    /// In the default mode the first datagram arriving before the deadline is taken as the reply.
    /// In strict mode datagrams that do not answer this exact request are skipped and the wait
    /// continues until the same deadline.
    fn exchange(&mut self, sequence: u16) -> Result<PingResult, PingError> {
        let identifier = sequence;
        let packet = encode_echo_request(identifier, sequence, &self.payload)?;

        trace!("Sending echo request icmp_seq={} to {}", sequence, self.addr);
        self.transport.send(&packet, self.addr)?;
        let departure = Instant::now();
        let deadline = departure + self.config.timeout;

        loop {
            let wait = deadline.saturating_duration_since(Instant::now());
            let (datagram, source) = match self.transport.receive(wait) {
                Ok(received) => received,
                Err(PingError::Timeout) => return Ok(PingResult::Timeout { sequence }),
                Err(e) => return Err(e),
            };
            let arrival = Instant::now();

            let reply = match decode_icmp_header(&datagram) {
                Ok(reply) => reply,
                Err(e) if self.config.strict => {
                    trace!("Ignoring datagram from {}: {}", source, e);
                    continue;
                }
                Err(e) => {
                    warn!("Discarding datagram from {}: {}", source, e);
                    return Ok(PingResult::Timeout { sequence });
                }
            };

            if self.config.strict && !reply.answers(identifier, sequence) {
                trace!("Ignoring {} from {}", reply, source);
                continue;
            }

            let rtt_ms = arrival.duration_since(departure).as_secs_f64() * 1000f64;
            return Ok(PingResult::Success {
                rtt_ms,
                sequence: reply.sequence,
                identifier: reply.identifier,
            });
        }
    }
}
