//! Minimal RTP header parse/build, fixed to the subset this bridge speaks:
//! version 2, no padding, no extension, no CSRCs.
//!
//! Payload type is carried through rather than restricted at this layer;
//! what a given payload type means to the rest of the bridge is decided by
//! the session ingress path.

use crate::{
    constants::{RTP_HEADER_LEN, RTP_VERSION},
    error::RtpError,
};

/// A parsed (or about-to-be-built) RTP packet.
///
/// Borrows its payload from the datagram it was parsed out of when parsing,
/// and owns it when built for transmission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RtpPacket<'a> {
    /// Wrapping sequence number, incremented once per packet.
    pub sequence: u16,
    /// Wrapping RTP timestamp, in samples (not wall-clock time).
    pub timestamp: u32,
    /// Synchronization source identifier.
    pub ssrc: u32,
    /// RTP payload type field, as received (7 bits).
    pub payload_type: u8,
    /// The payload, one byte per 8kHz sample for A-law, two for linear PCM16.
    pub payload: &'a [u8],
}

impl<'a> RtpPacket<'a> {
    /// Parses a 12-byte-header RTP packet out of a raw UDP datagram.
    ///
    /// Rejects anything not version 2, and anything shorter than a bare
    /// header. Extension headers and CSRC lists are not supported; this
    /// bridge never originates them and never expects to receive them from
    /// the PBX leg it talks to. Payload type is not otherwise restricted.
    pub fn parse(datagram: &'a [u8]) -> Result<Self, RtpError> {
        if datagram.len() < RTP_HEADER_LEN {
            return Err(RtpError::TooShort(datagram.len()));
        }

        let first = datagram[0];
        let version = first >> 6;
        if version != RTP_VERSION {
            return Err(RtpError::UnsupportedVersion(version));
        }
        let has_padding = first & 0b0010_0000 != 0;
        let has_extension = first & 0b0001_0000 != 0;
        let csrc_count = (first & 0b0000_1111) as usize;

        let payload_type = datagram[1] & 0b0111_1111;

        let sequence = u16::from_be_bytes([datagram[2], datagram[3]]);
        let timestamp = u32::from_be_bytes([datagram[4], datagram[5], datagram[6], datagram[7]]);
        let ssrc = u32::from_be_bytes([datagram[8], datagram[9], datagram[10], datagram[11]]);

        let mut offset = RTP_HEADER_LEN + csrc_count * 4;
        if has_extension {
            if datagram.len() < offset + 4 {
                return Err(RtpError::TooShort(datagram.len()));
            }
            let ext_len_words =
                u16::from_be_bytes([datagram[offset + 2], datagram[offset + 3]]) as usize;
            offset += 4 + ext_len_words * 4;
        }
        if datagram.len() < offset {
            return Err(RtpError::TooShort(datagram.len()));
        }

        let mut payload = &datagram[offset..];
        if has_padding {
            if let Some(&pad_len) = payload.last() {
                let pad_len = pad_len as usize;
                if pad_len > 0 && pad_len <= payload.len() {
                    payload = &payload[..payload.len() - pad_len];
                }
            }
        }

        Ok(Self {
            sequence,
            timestamp,
            ssrc,
            payload_type,
            payload,
        })
    }

    /// Quick version check without fully parsing the header, used by the
    /// demultiplexer to decide whether a datagram is worth routing at all.
    pub fn looks_like_rtp(datagram: &[u8]) -> bool {
        datagram.len() >= RTP_HEADER_LEN && datagram[0] >> 6 == RTP_VERSION
    }

    /// Serializes a header + payload into a single outbound datagram.
    pub fn build(sequence: u16, timestamp: u32, ssrc: u32, payload_type: u8, payload: &[u8]) -> Vec<u8> {
        let mut out = Vec::with_capacity(RTP_HEADER_LEN + payload.len());
        out.push(RTP_VERSION << 6);
        out.push(payload_type & 0b0111_1111);
        out.extend_from_slice(&sequence.to_be_bytes());
        out.extend_from_slice(&timestamp.to_be_bytes());
        out.extend_from_slice(&ssrc.to_be_bytes());
        out.extend_from_slice(payload);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_packet(seq: u16, ts: u32, ssrc: u32, payload: &[u8]) -> Vec<u8> {
        RtpPacket::build(seq, ts, ssrc, crate::constants::RTP_PAYLOAD_TYPE_PCMA, payload)
    }

    #[test]
    fn round_trips_header_fields() {
        let payload = vec![0xD5u8; 160];
        let datagram = sample_packet(42, 8000, 0xCAFEBABE, &payload);
        let parsed = RtpPacket::parse(&datagram).expect("valid packet");
        assert_eq!(parsed.sequence, 42);
        assert_eq!(parsed.timestamp, 8000);
        assert_eq!(parsed.ssrc, 0xCAFEBABE);
        assert_eq!(parsed.payload_type, crate::constants::RTP_PAYLOAD_TYPE_PCMA);
        assert_eq!(parsed.payload, payload.as_slice());
    }

    #[test]
    fn rejects_short_datagrams() {
        let err = RtpPacket::parse(&[0u8; 4]).unwrap_err();
        assert!(matches!(err, RtpError::TooShort(4)));
    }

    #[test]
    fn rejects_wrong_version() {
        let mut datagram = sample_packet(1, 0, 1, &[0xD5]);
        datagram[0] = 0b0100_0000 | (datagram[0] & 0x0F);
        let err = RtpPacket::parse(&datagram).unwrap_err();
        assert!(matches!(err, RtpError::UnsupportedVersion(1)));
    }

    #[test]
    fn passes_through_non_pcma_payload_type() {
        let mut datagram = sample_packet(1, 0, 1, &[0x00, 0x01]);
        datagram[1] = 0;
        let parsed = RtpPacket::parse(&datagram).expect("valid packet");
        assert_eq!(parsed.payload_type, 0);
        assert_eq!(parsed.payload, &[0x00, 0x01]);
    }

    #[test]
    fn sequence_and_timestamp_wrap() {
        let datagram = sample_packet(u16::MAX, u32::MAX, 1, &[0xD5]);
        let parsed = RtpPacket::parse(&datagram).expect("valid packet");
        assert_eq!(parsed.sequence, u16::MAX);
        assert_eq!(parsed.timestamp, u32::MAX);
        let (next_seq, _) = parsed.sequence.overflowing_add(1);
        assert_eq!(next_seq, 0);
    }

    #[test]
    fn looks_like_rtp_rejects_garbage() {
        assert!(!RtpPacket::looks_like_rtp(b"VBSELFTEST"));
        assert!(RtpPacket::looks_like_rtp(&sample_packet(0, 0, 0, &[0xD5])));
    }
}
