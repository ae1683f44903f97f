//! End-to-end tests: a real `Server` on a loopback port.

use multibulk::{
    AckHandler, Command, CommandHandler, RespValue, Server, ServerConfig, ServerError,
};
use std::sync::atomic::Ordering;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::{sleep, timeout};

const QUIET: Duration = Duration::from_millis(100);

struct TestServer {
    addr: std::net::SocketAddr,
    stats: Arc<multibulk::ConnectionStats>,
    stop: oneshot::Sender<()>,
    task: JoinHandle<Result<(), ServerError>>,
}

async fn start(config: ServerConfig, handler: Arc<dyn CommandHandler>) -> TestServer {
    let server = Server::bind(config.with_bind_addr("127.0.0.1:0"), handler)
        .await
        .unwrap();
    let addr = server.local_addr().unwrap();
    let stats = server.stats();
    let (stop, stopped) = oneshot::channel::<()>();
    let task = tokio::spawn(server.run(async {
        let _ = stopped.await;
    }));
    TestServer {
        addr,
        stats,
        stop,
        task,
    }
}

fn echo_name_handler() -> Arc<dyn CommandHandler> {
    Arc::new(|command: Command| {
        RespValue::simple_string(command.name().unwrap_or("?").to_string())
    })
}

async fn read_reply(client: &mut TcpStream, len: usize) -> Vec<u8> {
    let mut buf = vec![0u8; len];
    timeout(Duration::from_secs(2), client.read_exact(&mut buf))
        .await
        .expect("no reply")
        .unwrap();
    buf
}

#[tokio::test]
async fn test_ack_reply_over_tcp() {
    let server = start(ServerConfig::default(), Arc::new(AckHandler::new())).await;

    let mut client = TcpStream::connect(server.addr).await.unwrap();
    client.write_all(b"*1\r\n$7\r\nCOMMAND\r\n").await.unwrap();

    let expected = AckHandler::acknowledgement().serialize();
    assert_eq!(read_reply(&mut client, expected.len()).await, expected);
}

#[tokio::test]
async fn test_sessions_are_independent() {
    let server = start(ServerConfig::default(), echo_name_handler()).await;

    let mut a = TcpStream::connect(server.addr).await.unwrap();
    let mut b = TcpStream::connect(server.addr).await.unwrap();

    // A leaves a partial frame buffered while B completes one
    a.write_all(b"*1\r\n$3\r\nGE").await.unwrap();
    b.write_all(b"*1\r\n$3\r\nSET\r\n").await.unwrap();
    assert_eq!(read_reply(&mut b, 6).await, b"+SET\r\n");

    a.write_all(b"T\r\n").await.unwrap();
    assert_eq!(read_reply(&mut a, 6).await, b"+GET\r\n");
}

#[tokio::test]
async fn test_malformed_client_does_not_affect_others() {
    let server = start(ServerConfig::default(), echo_name_handler()).await;

    let mut bad = TcpStream::connect(server.addr).await.unwrap();
    let mut good = TcpStream::connect(server.addr).await.unwrap();

    bad.write_all(b"*2\r\nnot-a-dollar\r\n").await.unwrap();
    let mut reply = Vec::new();
    timeout(Duration::from_secs(2), bad.read_to_end(&mut reply))
        .await
        .unwrap()
        .unwrap();
    assert!(reply.starts_with(b"-ERR Protocol error"));

    good.write_all(b"*1\r\n$4\r\nPING\r\n").await.unwrap();
    assert_eq!(read_reply(&mut good, 7).await, b"+PING\r\n");
    assert_eq!(server.stats.protocol_errors.load(Ordering::Relaxed), 1);
}

#[tokio::test]
async fn test_commands_dispatched_in_order_per_connection() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let log = Arc::clone(&seen);
    let handler: Arc<dyn CommandHandler> = Arc::new(move |command: Command| {
        log.lock().unwrap().push(command.arg_str(1).unwrap_or("").to_string());
        RespValue::integer(1)
    });
    let server = start(ServerConfig::default(), handler).await;

    let mut client = TcpStream::connect(server.addr).await.unwrap();
    let mut pipeline = Vec::new();
    for i in 0..20 {
        let value = i.to_string();
        pipeline.extend_from_slice(
            format!("*2\r\n$4\r\nINCR\r\n${}\r\n{}\r\n", value.len(), value).as_bytes(),
        );
    }
    // Deliver in awkward pieces
    for chunk in pipeline.chunks(7) {
        client.write_all(chunk).await.unwrap();
    }

    assert_eq!(read_reply(&mut client, 20 * 4).await, b":1\r\n".repeat(20));
    let expected: Vec<String> = (0..20).map(|i| i.to_string()).collect();
    assert_eq!(*seen.lock().unwrap(), expected);
}

#[tokio::test]
async fn test_connection_limit() {
    let config = ServerConfig::default().with_max_connections(Some(1));
    let server = start(config, echo_name_handler()).await;

    let mut first = TcpStream::connect(server.addr).await.unwrap();
    first.write_all(b"*1\r\n$4\r\nPING\r\n").await.unwrap();
    assert_eq!(read_reply(&mut first, 7).await, b"+PING\r\n");

    // Connects at the TCP level but gets no session yet
    let mut second = TcpStream::connect(server.addr).await.unwrap();
    second.write_all(b"*1\r\n$4\r\nPING\r\n").await.unwrap();
    let mut buf = [0u8; 7];
    assert!(timeout(QUIET, second.read_exact(&mut buf)).await.is_err());

    drop(first);
    assert_eq!(read_reply(&mut second, 7).await, b"+PING\r\n");
}

#[tokio::test]
async fn test_zero_connection_limit_means_unlimited() {
    let config = ServerConfig::default().with_max_connections(Some(0));
    let server = start(config, echo_name_handler()).await;

    let mut first = TcpStream::connect(server.addr).await.unwrap();
    let mut second = TcpStream::connect(server.addr).await.unwrap();
    first.write_all(b"*1\r\n$4\r\nPING\r\n").await.unwrap();
    second.write_all(b"*1\r\n$4\r\nPING\r\n").await.unwrap();

    assert_eq!(read_reply(&mut first, 7).await, b"+PING\r\n");
    assert_eq!(read_reply(&mut second, 7).await, b"+PING\r\n");
}

#[tokio::test]
async fn test_shutdown_drains_sessions() {
    let server = start(ServerConfig::default(), echo_name_handler()).await;

    let mut client = TcpStream::connect(server.addr).await.unwrap();
    client.write_all(b"*2\r\n$3\r\nGET\r\n").await.unwrap();
    sleep(QUIET).await;
    assert_eq!(server.stats.active_connections.load(Ordering::Relaxed), 1);

    server.stop.send(()).unwrap();
    let result = timeout(Duration::from_secs(2), server.task)
        .await
        .expect("server did not drain")
        .unwrap();
    assert!(result.is_ok());

    let mut rest = Vec::new();
    client.read_to_end(&mut rest).await.unwrap();
    assert!(rest.is_empty());
    assert_eq!(server.stats.active_connections.load(Ordering::Relaxed), 0);
    assert_eq!(server.stats.commands_processed.load(Ordering::Relaxed), 0);
}

#[tokio::test]
async fn test_bind_failure_is_reported() {
    let first = Server::bind(
        ServerConfig::default().with_bind_addr("127.0.0.1:0"),
        Arc::new(AckHandler::new()),
    )
    .await
    .unwrap();
    let taken = first.local_addr().unwrap().to_string();

    let second = Server::bind(
        ServerConfig::default().with_bind_addr(taken.clone()),
        Arc::new(AckHandler::new()),
    )
    .await;

    match second {
        Err(ServerError::Bind { addr, .. }) => assert_eq!(addr, taken),
        Err(e) => panic!("unexpected error: {}", e),
        Ok(_) => panic!("second bind on {} succeeded", taken),
    }
}
