use bytes::Bytes;

use crate::error::StreamError;
use crate::header::{FrameType, HEADER_SIZE, PacketHeader};

/// Largest payload the length field can describe.
pub const MAX_WIRE_PAYLOAD: usize = u32::MAX as usize;

/// Default ceiling the reader enforces before allocating a payload.
pub const MAX_PAYLOAD_SIZE: usize = 64 * 1024 * 1024;

/// One framed unit on the wire. Built right before a write, never stored.
#[derive(Debug, Clone, PartialEq)]
pub struct FramePacket {
    pub frame_type: FrameType,
    pub timestamp: f64,
    pub frame_number: u32,
    pub payload: Bytes,
    pub is_key_frame: bool,
}

impl FramePacket {
    pub fn new(
        frame_type: FrameType,
        timestamp: f64,
        frame_number: u32,
        payload: impl Into<Bytes>,
        is_key_frame: bool,
    ) -> Self {
        Self {
            frame_type,
            timestamp,
            frame_number,
            payload: payload.into(),
            is_key_frame,
        }
    }

    /// Metadata packets always carry frame number 0 and no key-frame flag.
    pub fn metadata(timestamp: f64, payload: impl Into<Bytes>) -> Self {
        Self::new(FrameType::Metadata, timestamp, 0, payload, false)
    }

    pub fn header(&self) -> Result<PacketHeader, StreamError> {
        let payload_length =
            u32::try_from(self.payload.len()).map_err(|_| StreamError::PayloadTooLarge {
                size: self.payload.len(),
                max: MAX_WIRE_PAYLOAD,
            })?;

        Ok(PacketHeader {
            frame_type: self.frame_type,
            timestamp: self.timestamp,
            frame_number: self.frame_number,
            payload_length,
            is_key_frame: self.is_key_frame,
        })
    }

    /// Total bytes this packet occupies on the wire.
    pub fn wire_len(&self) -> usize {
        HEADER_SIZE + self.payload.len()
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, StreamError> {
        let header = self.header()?;
        let mut out = Vec::with_capacity(self.wire_len());
        out.extend_from_slice(&header.encode());
        out.extend_from_slice(&self.payload);
        Ok(out)
    }

    /// Parse exactly one packet; trailing or missing bytes are an error.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, StreamError> {
        let header = PacketHeader::decode(bytes)?;
        let expected = HEADER_SIZE + header.payload_length as usize;
        if bytes.len() != expected {
            return Err(StreamError::InvalidHeader(
                "payload length does not match packet size",
            ));
        }

        Ok(Self::from_parts(
            header,
            Bytes::copy_from_slice(&bytes[HEADER_SIZE..]),
        ))
    }

    pub(crate) fn from_parts(header: PacketHeader, payload: Bytes) -> Self {
        Self {
            frame_type: header.frame_type,
            timestamp: header.timestamp,
            frame_number: header.frame_number,
            payload,
            is_key_frame: header.is_key_frame,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn declared_length_matches_payload() {
        let pkt = FramePacket::new(FrameType::Rgb, 0.25, 3, vec![9u8; 300], true);
        let bytes = pkt.to_bytes().unwrap();

        assert_eq!(bytes.len(), HEADER_SIZE + 300);
        let declared = u32::from_le_bytes(bytes[13..17].try_into().unwrap());
        assert_eq!(declared, 300);
        assert_eq!(bytes[17], 1);
    }

    #[test]
    fn metadata_packet_conventions() {
        let pkt = FramePacket::metadata(1.0, b"{}".to_vec());
        assert_eq!(pkt.frame_type, FrameType::Metadata);
        assert_eq!(pkt.frame_number, 0);
        assert!(!pkt.is_key_frame);
    }

    #[test]
    fn from_bytes_rejects_trailing_data() {
        let pkt = FramePacket::new(FrameType::Depth, 0.0, 1, vec![1, 2, 3], false);
        let mut bytes = pkt.to_bytes().unwrap();
        bytes.push(0xFF);
        assert!(FramePacket::from_bytes(&bytes).is_err());

        bytes.truncate(bytes.len() - 2);
        assert!(FramePacket::from_bytes(&bytes).is_err());
    }

    #[test]
    fn from_bytes_restores_packet() {
        let pkt = FramePacket::new(FrameType::Depth, 2.5, 41, vec![5u8; 12], false);
        let parsed = FramePacket::from_bytes(&pkt.to_bytes().unwrap()).unwrap();
        assert_eq!(parsed, pkt);
    }

    #[test]
    fn empty_payload_is_allowed() {
        let pkt = FramePacket::new(FrameType::Rgb, 0.0, 0, Vec::new(), true);
        assert_eq!(pkt.to_bytes().unwrap().len(), HEADER_SIZE);
    }
}
