//! `tokio_util` framing for the packet stream.
//!
//! The decoder parses strictly sequentially: it waits for a full header,
//! then for the full payload the header declares.

use bytes::{Buf, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use crate::error::StreamError;
use crate::header::{HEADER_SIZE, PacketHeader};
use crate::packet::{FramePacket, MAX_PAYLOAD_SIZE};

#[derive(Debug, Clone)]
pub struct FrameCodec {
    max_payload: usize,
}

impl FrameCodec {
    pub fn new() -> Self {
        Self::with_max_payload(MAX_PAYLOAD_SIZE)
    }

    /// Reject any declared payload above `max_payload` bytes on decode.
    pub fn with_max_payload(max_payload: usize) -> Self {
        Self { max_payload }
    }

    pub fn max_payload(&self) -> usize {
        self.max_payload
    }
}

impl Default for FrameCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for FrameCodec {
    type Item = FramePacket;
    type Error = StreamError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if src.len() < HEADER_SIZE {
            return Ok(None);
        }

        let header = PacketHeader::decode(&src[..HEADER_SIZE])?;
        let payload_len = header.payload_length as usize;
        if payload_len > self.max_payload {
            return Err(StreamError::PayloadTooLarge {
                size: payload_len,
                max: self.max_payload,
            });
        }

        let frame_len = HEADER_SIZE + payload_len;
        if src.len() < frame_len {
            src.reserve(frame_len - src.len());
            return Ok(None);
        }

        src.advance(HEADER_SIZE);
        let payload = src.split_to(payload_len).freeze();
        Ok(Some(FramePacket::from_parts(header, payload)))
    }
}

impl Encoder<FramePacket> for FrameCodec {
    type Error = StreamError;

    fn encode(&mut self, item: FramePacket, dst: &mut BytesMut) -> Result<(), Self::Error> {
        let header = item.header()?;
        dst.reserve(item.wire_len());
        dst.extend_from_slice(&header.encode());
        dst.extend_from_slice(&item.payload);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::header::FrameType;
    use futures::StreamExt;
    use tokio_util::codec::FramedRead;

    fn packet(frame_type: FrameType, n: u32, len: usize) -> FramePacket {
        FramePacket::new(frame_type, n as f64 / 15.0, n, vec![n as u8; len], false)
    }

    #[test]
    fn partial_input_waits() {
        let mut codec = FrameCodec::new();
        let bytes = packet(FrameType::Depth, 1, 50).to_bytes().unwrap();

        let mut buf = BytesMut::from(&bytes[..10]);
        assert!(codec.decode(&mut buf).unwrap().is_none());

        buf.extend_from_slice(&bytes[10..30]);
        assert!(codec.decode(&mut buf).unwrap().is_none());

        buf.extend_from_slice(&bytes[30..]);
        let decoded = codec.decode(&mut buf).unwrap().unwrap();
        assert_eq!(decoded.payload.len(), 50);
        assert!(buf.is_empty());
    }

    #[test]
    fn consecutive_packets_in_one_buffer() {
        let mut codec = FrameCodec::new();
        let mut buf = BytesMut::new();
        for n in 0..3 {
            codec.encode(packet(FrameType::Rgb, n, 4), &mut buf).unwrap();
        }

        for n in 0..3 {
            let pkt = codec.decode(&mut buf).unwrap().unwrap();
            assert_eq!(pkt.frame_number, n);
        }
        assert!(codec.decode(&mut buf).unwrap().is_none());
    }

    #[test]
    fn oversized_payload_rejected() {
        let mut codec = FrameCodec::with_max_payload(16);
        let mut buf = BytesMut::from(&packet(FrameType::Rgb, 0, 17).to_bytes().unwrap()[..]);
        assert!(matches!(
            codec.decode(&mut buf),
            Err(StreamError::PayloadTooLarge { size: 17, max: 16 })
        ));
    }

    #[test]
    fn unknown_type_rejected() {
        let mut codec = FrameCodec::new();
        let mut bytes = packet(FrameType::Rgb, 0, 2).to_bytes().unwrap();
        bytes[0] = 0x00;
        let mut buf = BytesMut::from(&bytes[..]);
        assert!(codec.decode(&mut buf).is_err());
    }

    #[tokio::test]
    async fn framed_read_over_mock_io() {
        let first = packet(FrameType::Metadata, 0, 8).to_bytes().unwrap();
        let second = packet(FrameType::Depth, 1, 3).to_bytes().unwrap();

        let io = tokio_test::io::Builder::new()
            .read(&first[..5])
            .read(&first[5..])
            .read(&second)
            .build();

        let mut reader = FramedRead::new(io, FrameCodec::new());
        let a = reader.next().await.unwrap().unwrap();
        let b = reader.next().await.unwrap().unwrap();
        assert_eq!(a.frame_type, FrameType::Metadata);
        assert_eq!(b.frame_type, FrameType::Depth);
        assert_eq!(b.payload.as_ref(), &[1, 1, 1]);
        assert!(reader.next().await.is_none());
    }
}
