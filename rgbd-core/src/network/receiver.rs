//! Reading side of the stream: a framed reader that remembers the session
//! metadata and keeps running statistics.

use futures::StreamExt;
use tokio::io::AsyncRead;
use tokio_util::codec::FramedRead;
use tracing::{debug, warn};

use crate::codec::FrameCodec;
use crate::depth::{DepthBuffer, DepthCodec, DepthFormat, EncodedDepth};
use crate::error::StreamError;
use crate::header::FrameType;
use crate::packet::FramePacket;
use crate::protocol::SessionMetadata;
use crate::stats::StreamStats;

pub struct FrameReceiver<R> {
    reader: FramedRead<R, FrameCodec>,
    metadata: Option<SessionMetadata>,
    stats: StreamStats,
}

impl<R: AsyncRead + Unpin> FrameReceiver<R> {
    pub fn new(io: R) -> Self {
        Self::with_codec(io, FrameCodec::new())
    }

    pub fn with_codec(io: R, codec: FrameCodec) -> Self {
        Self {
            reader: FramedRead::new(io, codec),
            metadata: None,
            stats: StreamStats::new(),
        }
    }

    /// Next packet from the wire, or `None` once the peer has closed the
    /// stream. METADATA payloads are parsed and kept; one that fails to
    /// parse is still returned, but leaves [`metadata`](Self::metadata)
    /// untouched.
    pub async fn next_packet(&mut self) -> Option<Result<FramePacket, StreamError>> {
        let packet = match self.reader.next().await? {
            Ok(packet) => packet,
            Err(e) => return Some(Err(e)),
        };

        self.stats.record(&packet);
        if packet.frame_type == FrameType::Metadata {
            match SessionMetadata::from_payload(&packet.payload) {
                Ok(metadata) => {
                    debug!(session = %metadata.session_id, "session metadata received");
                    self.metadata = Some(metadata);
                }
                Err(e) => warn!("unparseable session metadata: {e}"),
            }
        }
        Some(Ok(packet))
    }

    pub fn metadata(&self) -> Option<&SessionMetadata> {
        self.metadata.as_ref()
    }

    pub fn stats(&self) -> &StreamStats {
        &self.stats
    }

    /// Decode a DEPTH payload with the dimensions announced in the session
    /// metadata. The format is not on the wire and has to be agreed out of
    /// band.
    pub fn decode_depth(
        &self,
        packet: &FramePacket,
        format: DepthFormat,
    ) -> Result<DepthBuffer, StreamError> {
        let encoded = self.encoded_depth(packet, format)?;
        Ok(DepthCodec::decompress(&encoded)?)
    }

    /// Pair a DEPTH payload with the session's depth dimensions without
    /// decoding it, for callers that decode off the async runtime.
    pub fn encoded_depth(
        &self,
        packet: &FramePacket,
        format: DepthFormat,
    ) -> Result<EncodedDepth, StreamError> {
        if packet.frame_type != FrameType::Depth {
            return Err(StreamError::ProtocolViolation("not a depth frame"));
        }
        let metadata = self
            .metadata
            .as_ref()
            .ok_or(StreamError::ProtocolViolation("no session metadata received"))?;

        Ok(EncodedDepth::new(
            format,
            metadata.depth_width,
            metadata.depth_height,
            packet.payload.clone(),
        ))
    }

    pub fn into_inner(self) -> R {
        self.reader.into_inner()
    }
}
