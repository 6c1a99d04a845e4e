use pnet::packet::{
    icmp::{echo_request::MutableEchoRequestPacket, IcmpCode, IcmpTypes},
    Packet,
};
use pnet::util::checksum;
use std::io;

use super::ICMP_HEADER_LEN;

/// Build an ICMP echo request message ready for transmission
///
/// The type field is set to 8 (echo request) and the code field to 0. The identifier and the
/// sequence number are written in network byte order, followed by the payload.
///
/// The checksum is the 16-bit one's complement of the one's complement sum of the whole message,
/// computed with the checksum field itself zeroed. A trailing odd byte is padded with zero for the
/// purpose of the sum only.
///
/// # Errors
///
/// The function could theoretically return an error, if the buffer were smaller than the ICMP
/// header. As the buffer always reserves space for the header, this should never occur.
pub fn encode_echo_request(identifier: u16, sequence: u16, payload: &[u8]) -> io::Result<Vec<u8>> {
    let mut buffer = vec![0u8; ICMP_HEADER_LEN + payload.len()];
    {
        let mut packet = MutableEchoRequestPacket::new(&mut buffer)
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidData, "icmp packet"))?;
        packet.set_icmp_type(IcmpTypes::EchoRequest);
        packet.set_icmp_code(IcmpCode::new(0));
        packet.set_identifier(identifier);
        packet.set_sequence_number(sequence);
        packet.set_payload(payload);

        // Skip word 1, the checksum field
        let sum = checksum(packet.packet(), 1);
        packet.set_checksum(sum);
    }
    Ok(buffer)
}

/// Fill a payload of the given size with random bytes
pub fn random_payload(size: usize) -> Vec<u8> {
    let mut payload = vec![0u8; size];
    for x in &mut payload {
        *x = rand::random::<u8>();
    }
    payload
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Folded one's complement sum over 16-bit big endian words
    fn ones_complement_sum(data: &[u8]) -> u16 {
        let mut sum = 0u32;
        for chunk in data.chunks(2) {
            let word = match chunk {
                [hi, lo] => u16::from_be_bytes([*hi, *lo]),
                [hi] => u16::from_be_bytes([*hi, 0]),
                _ => unreachable!(),
            };
            sum += u32::from(word);
        }
        while sum >> 16 != 0 {
            sum = (sum & 0xffff) + (sum >> 16);
        }
        sum as u16
    }

    #[test]
    fn header_layout() {
        let packet = encode_echo_request(0x0102, 0x0304, b"ping").unwrap();

        assert_eq!(packet.len(), 12);
        assert_eq!(packet[0], 8);
        assert_eq!(packet[1], 0);
        assert_eq!(&packet[4..6], &[0x01, 0x02]);
        assert_eq!(&packet[6..8], &[0x03, 0x04]);
        assert_eq!(&packet[8..], b"ping");
    }

    #[test]
    fn checksum_sums_to_zero() {
        for &(id, seq) in &[(0u16, 0u16), (1, 1), (0xffff, 0x8000), (513, 7)] {
            let packet = encode_echo_request(id, seq, b"ping").unwrap();
            assert_eq!(!ones_complement_sum(&packet), 0, "id={} seq={}", id, seq);
        }
    }

    #[test]
    fn checksum_with_odd_payload() {
        let packet = encode_echo_request(42, 9, b"odd").unwrap();

        assert_eq!(packet.len(), 11);
        assert_eq!(!ones_complement_sum(&packet), 0);
    }

    #[test]
    fn checksum_with_random_payload() {
        let payload = random_payload(56);
        let packet = encode_echo_request(3, 4, &payload).unwrap();

        assert_eq!(packet.len(), 64);
        assert_eq!(&packet[8..], &payload[..]);
        assert_eq!(!ones_complement_sum(&packet), 0);
    }

    #[test]
    fn empty_payload() {
        let packet = encode_echo_request(1, 2, &[]).unwrap();

        assert_eq!(packet.len(), ICMP_HEADER_LEN);
        assert_eq!(!ones_complement_sum(&packet), 0);
    }
}
