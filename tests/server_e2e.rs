use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Mutex;

use respkv::{server, Dispatcher, Store};

/// Spin up a server on an ephemeral port and hand back its address.
async fn start_server() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let store = Arc::new(Mutex::new(Store::new()));
    let dispatcher = Arc::new(Dispatcher::new());
    tokio::spawn(async move {
        let _ = server::serve(listener, store, dispatcher).await;
    });

    addr
}

async fn read_reply(stream: &mut TcpStream, len: usize) -> Vec<u8> {
    let mut buf = vec![0u8; len];
    stream.read_exact(&mut buf).await.unwrap();
    buf
}

async fn send(stream: &mut TcpStream, bytes: &[u8]) {
    stream.write_all(bytes).await.unwrap();
}

#[tokio::test]
async fn set_get_del_roundtrip() {
    let addr = start_server().await;
    let mut conn = TcpStream::connect(addr).await.unwrap();

    send(&mut conn, b"*3\r\n$3\r\nSET\r\n$3\r\nfoo\r\n$3\r\nbar\r\n").await;
    assert_eq!(read_reply(&mut conn, 5).await, b"+OK\r\n");

    send(&mut conn, b"*2\r\n$3\r\nGET\r\n$3\r\nfoo\r\n").await;
    assert_eq!(read_reply(&mut conn, 9).await, b"$3\r\nbar\r\n");

    send(&mut conn, b"*2\r\n$3\r\nDEL\r\n$3\r\nfoo\r\n").await;
    assert_eq!(read_reply(&mut conn, 4).await, b":1\r\n");

    send(&mut conn, b"*2\r\n$3\r\nGET\r\n$3\r\nfoo\r\n").await;
    assert_eq!(read_reply(&mut conn, 5).await, b"$-1\r\n");
}

// Two commands back-to-back in one write must yield two replies in order.
#[tokio::test]
async fn pipelined_requests_get_in_order_replies() {
    let addr = start_server().await;
    let mut conn = TcpStream::connect(addr).await.unwrap();

    let payload = concat!(
        "*4\r\n$6\r\nCLIENT\r\n$7\r\nSETINFO\r\n$8\r\nlib-name\r\n$7\r\nLettuce\r\n",
        "*4\r\n$6\r\nCLIENT\r\n$7\r\nSETINFO\r\n$7\r\nlib-ver\r\n$5\r\n6.3.2\r\n",
    );
    send(&mut conn, payload.as_bytes()).await;

    assert_eq!(read_reply(&mut conn, 10).await, b"+OK\r\n+OK\r\n");
}

#[tokio::test]
async fn pipelined_writes_interleave_correctly() {
    let addr = start_server().await;
    let mut conn = TcpStream::connect(addr).await.unwrap();

    let payload = concat!(
        "*3\r\n$3\r\nSET\r\n$1\r\na\r\n$1\r\n1\r\n",
        "*2\r\n$3\r\nGET\r\n$1\r\na\r\n",
        "*2\r\n$3\r\nDEL\r\n$1\r\na\r\n",
    );
    send(&mut conn, payload.as_bytes()).await;

    assert_eq!(read_reply(&mut conn, 16).await, b"+OK\r\n$1\r\n1\r\n:1\r\n");
}

// One command split mid-frame across three writes must be reassembled.
#[tokio::test]
async fn fragmented_frame_is_reassembled() {
    let addr = start_server().await;
    let mut conn = TcpStream::connect(addr).await.unwrap();

    send(&mut conn, b"*4\r\n$6\r\nCLIENT\r\n$7\r\nSETINFO\r\n").await;
    tokio::time::sleep(Duration::from_millis(50)).await;
    send(&mut conn, b"$8\r\nlib-name\r\n").await;
    tokio::time::sleep(Duration::from_millis(50)).await;
    send(&mut conn, b"$7\r\nLettuce\r\n").await;

    assert_eq!(read_reply(&mut conn, 5).await, b"+OK\r\n");
}

#[tokio::test]
async fn malformed_bytes_leave_connection_usable() {
    let addr = start_server().await;
    let mut conn = TcpStream::connect(addr).await.unwrap();

    send(&mut conn, b"what is this\r\n").await;
    let mut buf = vec![0u8; 256];
    let n = conn.read(&mut buf).await.unwrap();
    assert!(buf[..n].starts_with(b"-ERR Protocol error"));

    // Same connection still serves well-formed requests.
    send(&mut conn, b"*1\r\n$4\r\nPING\r\n").await;
    assert_eq!(read_reply(&mut conn, 7).await, b"+PONG\r\n");
}

#[tokio::test]
async fn unknown_command_is_an_error_not_a_disconnect() {
    let addr = start_server().await;
    let mut conn = TcpStream::connect(addr).await.unwrap();

    send(&mut conn, b"*2\r\n$5\r\nHELLO\r\n$1\r\n3\r\n").await;
    let mut buf = vec![0u8; 256];
    let n = conn.read(&mut buf).await.unwrap();
    assert!(buf[..n].starts_with(b"-ERR unknown command 'HELLO' 3"));

    send(&mut conn, b"*1\r\n$4\r\nPING\r\n").await;
    assert_eq!(read_reply(&mut conn, 7).await, b"+PONG\r\n");
}

#[tokio::test]
async fn set_with_ex_expires_over_the_wire() {
    let addr = start_server().await;
    let mut conn = TcpStream::connect(addr).await.unwrap();

    send(
        &mut conn,
        b"*5\r\n$3\r\nSET\r\n$1\r\nk\r\n$1\r\nv\r\n$2\r\nEX\r\n$1\r\n1\r\n",
    )
    .await;
    assert_eq!(read_reply(&mut conn, 5).await, b"+OK\r\n");

    send(&mut conn, b"*2\r\n$3\r\nGET\r\n$1\r\nk\r\n").await;
    assert_eq!(read_reply(&mut conn, 7).await, b"$1\r\nv\r\n");

    tokio::time::sleep(Duration::from_millis(1100)).await;

    send(&mut conn, b"*2\r\n$3\r\nGET\r\n$1\r\nk\r\n").await;
    assert_eq!(read_reply(&mut conn, 5).await, b"$-1\r\n");
}

// A client stuck mid-frame must not stop anyone else from being served.
#[tokio::test]
async fn slow_client_does_not_block_others() {
    let addr = start_server().await;

    let mut slow = TcpStream::connect(addr).await.unwrap();
    send(&mut slow, b"*3\r\n$3\r\nSET\r\n$4\r\nslow\r\n").await; // never finished

    let mut fast = TcpStream::connect(addr).await.unwrap();
    send(&mut fast, b"*1\r\n$4\r\nPING\r\n").await;
    assert_eq!(read_reply(&mut fast, 7).await, b"+PONG\r\n");
}
