//! Integration tests: frames encoded and delivered over real WebSocket
//! and TCP connections on localhost.

use std::time::Duration;

use futures::StreamExt;
use opc_core::{
    ConnectionInfo, FrameEncoder, OpcCodec, OutputConnection, ReadyState, Rgba, RgbaFrame,
    SampleGrid, SendOutcome, TcpConnection, WsConnection,
};
use tokio::io::AsyncReadExt;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::oneshot;
use tokio_tungstenite::tungstenite::Message;
use tokio_util::codec::FramedRead;

const QUAD_PACKET: [u8; 16] = [
    0x00, 0x00, 0x00, 0x00, 0x0A, 0x14, 0x1E, 0x28, 0x32, 0x3C, 0x46, 0x50, 0x5A, 0x64, 0x6E, 0x78,
];

// ── Helpers ──────────────────────────────────────────────────────

async fn ephemeral_listener() -> (TcpListener, ConnectionInfo) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let info = ConnectionInfo::new(addr.ip().to_string(), addr.port());
    (listener, info)
}

fn quad_frame() -> RgbaFrame {
    RgbaFrame::from_pixels(
        2,
        2,
        &[
            Rgba::new(10, 20, 30, 255),
            Rgba::new(40, 50, 60, 255),
            Rgba::new(70, 80, 90, 255),
            Rgba::new(100, 110, 120, 255),
        ],
    )
    .unwrap()
}

fn quad_encoder() -> FrameEncoder {
    FrameEncoder::for_frame(SampleGrid::matrix(2, 2).unwrap(), 2, 2).unwrap()
}

async fn wait_for_state<C: OutputConnection>(conn: &C, want: ReadyState) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while conn.state() != want {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("timeout waiting for state");
}

// ── WebSocket ────────────────────────────────────────────────────

#[tokio::test]
async fn test_ws_delivers_one_binary_message_per_frame() {
    let (listener, info) = ephemeral_listener().await;

    let server = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();
        let mut frames = Vec::new();
        while frames.len() < 2 {
            match ws.next().await {
                Some(Ok(Message::Binary(data))) => frames.push(data.to_vec()),
                Some(Ok(_)) => {}
                other => panic!("unexpected {other:?}"),
            }
        }
        frames
    });

    let conn = WsConnection::open(&info);
    assert_eq!(conn.ready().await, ReadyState::Open);

    let mut enc = quad_encoder();
    let frame = quad_frame();
    assert_eq!(enc.encode_and_send(&frame, &conn), SendOutcome::Sent);
    wait_for_unflushed_zero(&conn).await;
    assert_eq!(enc.encode_and_send(&frame, &conn), SendOutcome::Sent);

    let frames = tokio::time::timeout(Duration::from_secs(5), server)
        .await
        .expect("timeout")
        .unwrap();
    assert_eq!(frames, vec![QUAD_PACKET.to_vec(), QUAD_PACKET.to_vec()]);
    wait_for_unflushed_zero(&conn).await;
    assert_eq!(conn.bytes_sent(), 32);
}

async fn wait_for_unflushed_zero<C: OutputConnection>(conn: &C) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while conn.unflushed_bytes() != 0 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("backlog never drained");
}

#[tokio::test]
async fn test_ws_server_close_is_observed() {
    let (listener, info) = ephemeral_listener().await;
    let (go_tx, go_rx) = oneshot::channel::<()>();

    let server = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();
        // Hold the close until the client has seen the link open.
        go_rx.await.unwrap();
        ws.close(None).await.unwrap();
        // Keep the socket alive until the client answers the close.
        while let Some(Ok(_)) = ws.next().await {}
    });

    let conn = WsConnection::open(&info);
    assert_eq!(conn.ready().await, ReadyState::Open);
    go_tx.send(()).unwrap();

    wait_for_state(&conn, ReadyState::Closed).await;
    let mut enc = quad_encoder();
    assert_eq!(enc.encode_and_send(&quad_frame(), &conn), SendOutcome::NotOpen);
    let _ = tokio::time::timeout(Duration::from_secs(5), server).await;
}

// ── TCP ──────────────────────────────────────────────────────────

#[tokio::test]
async fn test_tcp_stamps_length_on_the_stream() {
    let (listener, info) = ephemeral_listener().await;

    let server = tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.unwrap();
        let mut raw = [0u8; 16];
        stream.read_exact(&mut raw).await.unwrap();
        raw
    });

    let conn = TcpConnection::open(&info);
    assert_eq!(conn.ready().await, ReadyState::Open);
    assert!(quad_encoder().encode_and_send(&quad_frame(), &conn).is_sent());

    let raw = tokio::time::timeout(Duration::from_secs(5), server)
        .await
        .expect("timeout")
        .unwrap();
    // Payload length 12 in the header, pixels untouched.
    assert_eq!(&raw[..4], &[0, 0, 0, 12]);
    assert_eq!(&raw[4..], &QUAD_PACKET[4..]);
}

#[tokio::test]
async fn test_tcp_frames_decode_in_order() {
    let (listener, info) = ephemeral_listener().await;

    let server = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut reader = FramedRead::new(stream, OpcCodec::stream());
        let mut reds = Vec::new();
        for _ in 0..5 {
            let packet = reader.next().await.unwrap().unwrap();
            reds.push(packet.pixel(0).unwrap().r);
        }
        reds
    });

    let conn = TcpConnection::open(&info);
    assert_eq!(conn.ready().await, ReadyState::Open);

    let mut enc = quad_encoder().with_policy(opc_core::BackpressurePolicy::Disabled);
    for red in 1..=5u8 {
        let frame = RgbaFrame::filled(2, 2, Rgba::new(red, 0, 0, 255));
        assert!(enc.encode_and_send(&frame, &conn).is_sent());
    }

    let reds = tokio::time::timeout(Duration::from_secs(5), server)
        .await
        .expect("timeout")
        .unwrap();
    assert_eq!(reds, vec![1, 2, 3, 4, 5]);
}

#[tokio::test]
async fn test_tcp_from_connected_stream() {
    let (listener, info) = ephemeral_listener().await;

    let server = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut reader = FramedRead::new(stream, OpcCodec::stream());
        reader.next().await.unwrap().unwrap()
    });

    let stream = TcpStream::connect(info.to_string()).await.unwrap();
    let conn = TcpConnection::from_stream(stream);
    assert_eq!(conn.state(), ReadyState::Open);
    assert_eq!(quad_encoder().encode_and_send(&quad_frame(), &conn), SendOutcome::Sent);

    let packet = tokio::time::timeout(Duration::from_secs(5), server)
        .await
        .expect("timeout")
        .unwrap();
    assert_eq!(packet.payload(), &QUAD_PACKET[4..]);
}

#[tokio::test]
async fn test_frames_skipped_while_connecting() {
    let (_listener, info) = ephemeral_listener().await;

    // The connect task has not been polled yet on this single-threaded runtime.
    let conn = TcpConnection::open(&info);
    assert_eq!(conn.state(), ReadyState::Connecting);

    let mut enc = quad_encoder();
    assert_eq!(enc.encode_and_send(&quad_frame(), &conn), SendOutcome::NotOpen);
    assert_eq!(conn.unflushed_bytes(), 0);
}

#[tokio::test]
async fn test_refused_connection_closes() {
    let (listener, info) = ephemeral_listener().await;
    drop(listener);

    let conn = TcpConnection::open(&info);
    assert_eq!(conn.ready().await, ReadyState::Closed);

    let mut enc = quad_encoder();
    assert_eq!(enc.encode_and_send(&quad_frame(), &conn), SendOutcome::NotOpen);
    assert_eq!(enc.stats().skipped_not_open, 1);
}

#[tokio::test]
async fn test_peer_hangup_closes() {
    let (listener, info) = ephemeral_listener().await;

    let server = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        drop(stream);
    });

    let conn = TcpConnection::open(&info);
    assert_eq!(conn.ready().await, ReadyState::Open);
    server.await.unwrap();

    wait_for_state(&conn, ReadyState::Closed).await;
}

#[tokio::test]
async fn test_local_close() {
    let (listener, info) = ephemeral_listener().await;
    let _server = tokio::spawn(async move { listener.accept().await });

    let conn = TcpConnection::open(&info);
    assert_eq!(conn.ready().await, ReadyState::Open);
    conn.close();
    assert_eq!(conn.state(), ReadyState::Closed);

    let mut enc = quad_encoder();
    assert_eq!(enc.encode_and_send(&quad_frame(), &conn), SendOutcome::NotOpen);
}
