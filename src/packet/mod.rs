//! ICMP echo packet codec
//!
//! Outgoing echo requests are built by [`encode_echo_request`]. Incoming datagrams arrive from the
//! raw socket with their IPv4 header still attached; [`decode_icmp_header`] skips the fixed 20 byte
//! IPv4 header and reads the 8 byte ICMP header that follows.

use pnet::packet::icmp::{echo_reply::EchoReplyPacket, IcmpType};
use std::fmt;

use crate::error::PingError;

pub use request::{encode_echo_request, random_payload};

mod request;

/// Length of an IPv4 header without options
pub const IPV4_HEADER_LEN: usize = 20;

/// Length of the ICMP echo header: type, code, checksum, identifier, sequence
pub const ICMP_HEADER_LEN: usize = 8;

/// Coarse classification of a received ICMP type
///
/// Only the types relevant to an echo exchange are told apart, everything else is `Unknown`.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ReplyKind {
    Reply,
    Unreachable,
    Request,
    Expired,

    // Catch-all for all types that we do not keep track of
    Unknown,
}

#[allow(non_upper_case_globals)]
impl From<IcmpType> for ReplyKind {
    fn from(ty: IcmpType) -> Self {
        use pnet::packet::icmp::IcmpTypes::*;
        match ty {
            DestinationUnreachable => Self::Unreachable,
            EchoReply => Self::Reply,
            EchoRequest => Self::Request,
            TimeExceeded => Self::Expired,
            _ => Self::Unknown,
        }
    }
}

/// Header of a received ICMP message
///
/// Every field of the 8 byte header is kept. The checksum is not verified and the type is not
/// filtered: a destination unreachable message decodes just as well as an echo reply, it is up to
/// the caller to decide whether the message is relevant.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct EchoReply {
    pub icmp_type: u8,
    pub code: u8,
    pub checksum: u16,
    pub identifier: u16,
    pub sequence: u16,
}

impl EchoReply {
    /// Classify the type field of this message
    pub fn kind(&self) -> ReplyKind {
        ReplyKind::from(IcmpType::new(self.icmp_type))
    }

    /// Return `true` if this is an echo reply answering the given identifier and sequence number
    pub fn answers(&self, identifier: u16, sequence: u16) -> bool {
        self.kind() == ReplyKind::Reply
            && self.identifier == identifier
            && self.sequence == sequence
    }
}

impl fmt::Display for EchoReply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "type={} code={} id={} seq={}",
            self.icmp_type, self.code, self.identifier, self.sequence
        )
    }
}

/// Decode the ICMP header of a datagram received on a raw IPv4 socket
///
/// Reads bytes 20 through 27. IPv4 options are not accounted for.
///
/// # Errors
///
/// Returns `PingError::Decode` if the datagram is shorter than 28 bytes.
pub fn decode_icmp_header(datagram: &[u8]) -> Result<EchoReply, PingError> {
    let malformed = || PingError::Decode {
        len: datagram.len(),
    };

    let header = datagram
        .get(IPV4_HEADER_LEN..IPV4_HEADER_LEN + ICMP_HEADER_LEN)
        .ok_or_else(malformed)?;
    let packet = EchoReplyPacket::new(header).ok_or_else(malformed)?;

    Ok(EchoReply {
        icmp_type: packet.get_icmp_type().0,
        code: packet.get_icmp_code().0,
        checksum: packet.get_checksum(),
        identifier: packet.get_identifier(),
        sequence: packet.get_sequence_number(),
    })
}
