//! Integration tests: full streamer lifecycle, handshake ordering and
//! failure scenarios over a real TCP connection on localhost.

use std::time::Duration;

use bytes::Bytes;

use rgbd_core::{
    ConnectionState, DepthBuffer, DepthCodec, DepthFormat, FramePacket, FrameReceiver,
    FrameStreamer, FrameType, HEADER_SIZE, PacketHeader, SessionMetadata, StatusReceiver,
    StreamStatus,
};
use tokio::io::AsyncReadExt;
use tokio::net::{TcpListener, TcpStream};

const TIMEOUT: Duration = Duration::from_secs(5);

// ── Helpers ──────────────────────────────────────────────────────

/// Spin up a listener on an OS-assigned port.
async fn ephemeral_listener() -> (TcpListener, u16) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    (listener, port)
}

fn sample_metadata() -> SessionMetadata {
    SessionMetadata::new((640, 480), (256, 192), 15, "jpeg")
}

async fn next_status(status: &mut StatusReceiver) -> StreamStatus {
    tokio::time::timeout(TIMEOUT, status.recv())
        .await
        .expect("timeout waiting for status")
        .expect("status channel closed")
}

/// Consume `Connecting …` and `Connected …`.
async fn expect_connected(status: &mut StatusReceiver, port: u16) {
    let connecting = next_status(status).await;
    assert_eq!(
        connecting,
        StreamStatus::new(format!("Connecting to 127.0.0.1:{port}"), false)
    );
    let connected = next_status(status).await;
    assert_eq!(
        connected,
        StreamStatus::new(format!("Connected to 127.0.0.1:{port}"), true)
    );
}

async fn accept(listener: &TcpListener) -> FrameReceiver<TcpStream> {
    let (stream, _) = tokio::time::timeout(TIMEOUT, listener.accept())
        .await
        .expect("timeout waiting for connection")
        .unwrap();
    FrameReceiver::new(stream)
}

async fn next_packet(rx: &mut FrameReceiver<TcpStream>) -> FramePacket {
    tokio::time::timeout(TIMEOUT, rx.next_packet())
        .await
        .expect("timeout waiting for packet")
        .expect("stream ended")
        .expect("decode error")
}

// ── Handshake and ordering ───────────────────────────────────────

#[tokio::test]
async fn test_metadata_first_then_frames_in_order() {
    let (listener, port) = ephemeral_listener().await;
    let (streamer, mut status) = FrameStreamer::new();
    let metadata = sample_metadata();

    streamer.connect("127.0.0.1", port, metadata.clone());
    let mut rx = accept(&listener).await;
    expect_connected(&mut status, port).await;

    streamer.send_rgb(10.0, vec![0xFFu8, 0xD8, 0xFF]);
    streamer.send_depth(10.0, vec![1u8; 8]);
    streamer.send_rgb(10.1, vec![0xAAu8; 4]);
    streamer.send_frame(FrameType::Depth, 10.1, 42, vec![2u8; 8], true);
    streamer.send_depth(10.2, Vec::new());

    let first = next_packet(&mut rx).await;
    assert_eq!(first.frame_type, FrameType::Metadata);
    assert_eq!(first.frame_number, 0);
    assert!(!first.is_key_frame);
    assert!(first.timestamp > 0.0);
    assert_eq!(rx.metadata(), Some(&metadata));

    let expected = [
        (FrameType::Rgb, 0, true, 3),
        (FrameType::Depth, 0, false, 8),
        (FrameType::Rgb, 1, true, 4),
        (FrameType::Depth, 42, true, 8),
        (FrameType::Depth, 1, false, 0),
    ];
    for (frame_type, number, key, len) in expected {
        let packet = next_packet(&mut rx).await;
        assert_eq!(packet.frame_type, frame_type);
        assert_eq!(packet.frame_number, number);
        assert_eq!(packet.is_key_frame, key);
        assert_eq!(packet.payload.len(), len);
    }
    assert_eq!(rx.stats().metadata_packets, 1);
}

#[tokio::test]
async fn test_wire_bytes_match_header_layout() {
    let (listener, port) = ephemeral_listener().await;
    let (streamer, mut status) = FrameStreamer::new();

    streamer.connect("127.0.0.1", port, sample_metadata());
    let (mut stream, _) = listener.accept().await.unwrap();
    expect_connected(&mut status, port).await;
    streamer.send_rgb(2.5, b"jpeg".to_vec());

    let mut header = [0u8; HEADER_SIZE];
    stream.read_exact(&mut header).await.unwrap();
    assert_eq!(header[0], 3);
    let meta_header = PacketHeader::decode(&header).unwrap();
    let mut json = vec![0u8; meta_header.payload_length as usize];
    stream.read_exact(&mut json).await.unwrap();

    let value: serde_json::Value = serde_json::from_slice(&json).unwrap();
    for key in [
        "sessionId",
        "rgbWidth",
        "rgbHeight",
        "depthWidth",
        "depthHeight",
        "fps",
        "rgbBitrate",
        "rgbEncoding",
    ] {
        assert!(value.get(key).is_some(), "missing {key}");
    }
    assert_eq!(value["rgbBitrate"], 0);
    assert_eq!(value["sessionId"].as_str().unwrap().len(), 32);

    stream.read_exact(&mut header).await.unwrap();
    assert_eq!(header[0], 1);
    assert_eq!(&header[1..9], &2.5f64.to_le_bytes());
    assert_eq!(&header[9..13], &0u32.to_le_bytes());
    assert_eq!(&header[13..17], &4u32.to_le_bytes());
    assert_eq!(header[17], 1);
    let mut payload = [0u8; 4];
    stream.read_exact(&mut payload).await.unwrap();
    assert_eq!(&payload, b"jpeg");
}

#[tokio::test]
async fn test_depth_payload_survives_transport() {
    let (listener, port) = ephemeral_listener().await;
    let (streamer, mut status) = FrameStreamer::new();
    let metadata = SessionMetadata::new((4, 4), (3, 2), 15, "jpeg");

    streamer.connect("127.0.0.1", port, metadata);
    let mut rx = accept(&listener).await;
    expect_connected(&mut status, port).await;

    let depth = DepthBuffer::new(3, 2, vec![0.25, 1.0, 2.5, 0.0, f32::NAN, 10.0]).unwrap();
    let encoded = DepthCodec::compress(&depth, DepthFormat::Png16).unwrap();
    streamer.send_depth(0.5, encoded.into_bytes());

    let _metadata = next_packet(&mut rx).await;
    let packet = next_packet(&mut rx).await;
    let decoded = rx.decode_depth(&packet, DepthFormat::Png16).unwrap();
    assert_eq!(decoded.samples(), &[0.25, 1.0, 2.5, 0.0, 0.0, 10.0]);
}

// ── Not connected ────────────────────────────────────────────────

#[tokio::test]
async fn test_frames_before_connect_are_not_sent() {
    let (listener, port) = ephemeral_listener().await;
    let (streamer, mut status) = FrameStreamer::new();

    streamer.send_rgb(0.0, vec![9u8; 16]);
    streamer.send_frame(FrameType::Depth, 0.0, 3, vec![9u8; 16], false);

    streamer.connect("127.0.0.1", port, sample_metadata());
    let mut rx = accept(&listener).await;
    expect_connected(&mut status, port).await;
    streamer.send_rgb(1.0, vec![1u8]);

    let first = next_packet(&mut rx).await;
    assert_eq!(first.frame_type, FrameType::Metadata);
    let second = next_packet(&mut rx).await;
    assert_eq!(second.frame_type, FrameType::Rgb);
    assert_eq!(second.frame_number, 0);
    assert_eq!(second.payload.as_ref(), &[1u8]);
}

#[tokio::test]
async fn test_frames_while_connecting_are_not_sent() {
    let (listener, port) = ephemeral_listener().await;
    let (streamer, mut status) = FrameStreamer::new();

    // Queued right behind the connect, before the transport can be ready.
    streamer.connect("127.0.0.1", port, sample_metadata());
    streamer.send_rgb(0.0, b"early".to_vec());
    streamer.send_frame(FrameType::Depth, 0.0, 7, b"early".to_vec(), false);

    let mut rx = accept(&listener).await;
    expect_connected(&mut status, port).await;
    streamer.send_rgb(1.0, b"late".to_vec());

    let first = next_packet(&mut rx).await;
    assert_eq!(first.frame_type, FrameType::Metadata);
    let second = next_packet(&mut rx).await;
    assert_eq!(second.frame_type, FrameType::Rgb);
    assert_eq!(second.frame_number, 0);
    assert_eq!(second.payload.as_ref(), b"late");
    assert_eq!(rx.stats().depth.frames, 0);
}

#[tokio::test]
async fn test_frames_after_failure_are_not_sent() {
    let (first_listener, first_port) = ephemeral_listener().await;
    let (second_listener, second_port) = ephemeral_listener().await;
    let (streamer, mut status) = FrameStreamer::new();

    streamer.connect("127.0.0.1", first_port, sample_metadata());
    let (stream, _) = first_listener.accept().await.unwrap();
    expect_connected(&mut status, first_port).await;
    drop(stream);
    let failed = next_status(&mut status).await;
    assert!(failed.message.starts_with("Connection failed:"), "{failed:?}");
    assert_eq!(streamer.current_state(), ConnectionState::Failed);

    // Dropped while Failed, then a fresh connection is observed.
    streamer.send_rgb(0.0, b"stale".to_vec());
    streamer.send_depth(0.0, b"stale".to_vec());
    streamer.connect("127.0.0.1", second_port, sample_metadata());

    let mut rx = accept(&second_listener).await;
    expect_connected(&mut status, second_port).await;
    streamer.send_depth(1.0, b"fresh".to_vec());

    assert_eq!(next_packet(&mut rx).await.frame_type, FrameType::Metadata);
    let packet = next_packet(&mut rx).await;
    assert_eq!(packet.frame_type, FrameType::Depth);
    assert_eq!(packet.frame_number, 0);
    assert_eq!(packet.payload.as_ref(), b"fresh");
    assert_eq!(rx.stats().rgb.frames, 0);
}

#[tokio::test]
async fn test_unreachable_host_reports_single_failure() {
    // Bind then drop to get a port nobody listens on.
    let (listener, port) = ephemeral_listener().await;
    drop(listener);

    let (streamer, mut status) = FrameStreamer::new();
    streamer.connect("127.0.0.1", port, sample_metadata());

    let connecting = next_status(&mut status).await;
    assert_eq!(connecting.message, format!("Connecting to 127.0.0.1:{port}"));
    assert!(!connecting.connected);

    let failed = next_status(&mut status).await;
    assert!(failed.message.starts_with("Connection failed:"), "{failed:?}");
    assert!(!failed.connected);
    assert_eq!(streamer.current_state(), ConnectionState::Failed);

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(status.try_recv().is_err(), "unexpected extra status event");
}

// ── Metadata failure ─────────────────────────────────────────────

#[tokio::test]
async fn test_invalid_metadata_keeps_connection_open() {
    let (listener, port) = ephemeral_listener().await;
    let (streamer, mut status) = FrameStreamer::new();
    let mut metadata = sample_metadata();
    metadata.session_id.clear();

    streamer.connect("127.0.0.1", port, metadata);
    let mut rx = accept(&listener).await;
    expect_connected(&mut status, port).await;

    let failure = next_status(&mut status).await;
    assert!(failure.message.starts_with("Failed to send metadata:"));
    assert!(failure.connected);
    assert!(streamer.is_connected());

    streamer.send_depth(1.0, vec![0u8; 4]);
    let first = next_packet(&mut rx).await;
    assert_eq!(first.frame_type, FrameType::Depth);
    assert!(rx.metadata().is_none());
}

// ── Teardown ─────────────────────────────────────────────────────

#[tokio::test]
async fn test_peer_close_fails_connection() {
    let (listener, port) = ephemeral_listener().await;
    let (streamer, mut status) = FrameStreamer::new();

    streamer.connect("127.0.0.1", port, sample_metadata());
    let (stream, _) = listener.accept().await.unwrap();
    expect_connected(&mut status, port).await;
    drop(stream);

    let failed = next_status(&mut status).await;
    assert!(failed.message.starts_with("Connection failed:"), "{failed:?}");
    assert!(!failed.connected);

    let mut state = streamer.state();
    tokio::time::timeout(TIMEOUT, state.wait_for(|s| *s == ConnectionState::Failed))
        .await
        .expect("timeout")
        .unwrap();

    // Frames after failure go nowhere and produce no events.
    streamer.send_rgb(0.0, vec![1u8]);
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(status.try_recv().is_err());
}

#[tokio::test]
async fn test_disconnect_closes_stream() {
    let (listener, port) = ephemeral_listener().await;
    let (streamer, mut status) = FrameStreamer::new();

    streamer.connect("127.0.0.1", port, sample_metadata());
    let mut rx = accept(&listener).await;
    expect_connected(&mut status, port).await;
    let _metadata = next_packet(&mut rx).await;

    streamer.disconnect();
    assert_eq!(
        next_status(&mut status).await,
        StreamStatus::new("Disconnected", false)
    );
    assert_eq!(streamer.current_state(), ConnectionState::Cancelled);

    streamer.send_rgb(0.0, vec![1u8]);
    let end = tokio::time::timeout(TIMEOUT, rx.next_packet())
        .await
        .expect("timeout waiting for EOF");
    assert!(end.is_none());
}

#[tokio::test]
async fn test_reconnect_resets_frame_numbers() {
    let (listener, port) = ephemeral_listener().await;
    let (streamer, mut status) = FrameStreamer::new();

    streamer.connect("127.0.0.1", port, sample_metadata());
    let mut first_rx = accept(&listener).await;
    expect_connected(&mut status, port).await;
    streamer.send_rgb(0.0, vec![1u8]);
    streamer.send_rgb(0.1, vec![2u8]);
    let _metadata = next_packet(&mut first_rx).await;
    assert_eq!(next_packet(&mut first_rx).await.frame_number, 0);
    assert_eq!(next_packet(&mut first_rx).await.frame_number, 1);

    // Connecting again tears the old link down without a "Disconnected".
    streamer.connect("127.0.0.1", port, sample_metadata());
    let mut second_rx = accept(&listener).await;
    expect_connected(&mut status, port).await;
    streamer.send_rgb(0.2, vec![3u8]);

    assert_eq!(
        next_packet(&mut second_rx).await.frame_type,
        FrameType::Metadata
    );
    let packet = next_packet(&mut second_rx).await;
    assert_eq!(packet.frame_number, 0);
    assert_eq!(packet.payload.as_ref(), &[3u8]);

    let end = tokio::time::timeout(TIMEOUT, first_rx.next_packet())
        .await
        .expect("timeout waiting for EOF");
    assert!(end.is_none());
}

#[tokio::test]
async fn test_disconnect_while_peer_stops_reading() {
    let (listener, port) = ephemeral_listener().await;
    let (streamer, mut status) = FrameStreamer::new();

    streamer.connect("127.0.0.1", port, sample_metadata());
    // Accepted but never read, so the socket buffers fill up.
    let (_stalled, _) = listener.accept().await.unwrap();
    expect_connected(&mut status, port).await;

    let frame = Bytes::from(vec![0u8; 1 << 20]);
    for i in 0..64 {
        streamer.send_depth(i as f64, frame.clone());
    }
    tokio::time::sleep(Duration::from_millis(200)).await;

    streamer.disconnect();
    let mut state = streamer.state();
    tokio::time::timeout(
        Duration::from_secs(3),
        state.wait_for(|s| *s == ConnectionState::Cancelled),
    )
    .await
    .expect("disconnect not handled while a write is pending")
    .unwrap();
    assert_eq!(
        next_status(&mut status).await,
        StreamStatus::new("Disconnected", false)
    );

    // The worker is still responsive to new connections.
    streamer.connect("127.0.0.1", port, sample_metadata());
    let mut rx = accept(&listener).await;
    expect_connected(&mut status, port).await;
    assert_eq!(next_packet(&mut rx).await.frame_type, FrameType::Metadata);
}
