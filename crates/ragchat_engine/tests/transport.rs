use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use pretty_assertions::assert_eq;
use ragchat_engine::{
    ClientFrame, ConnectionEvent, EngineEvent, EventSink, ReconnectPolicy, ServerEvent,
    TransportError, TransportHandle,
};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;

const WAIT: Duration = Duration::from_secs(5);

fn init_logging() {
    ragchat_logging::initialize_for_tests();
}

struct TestSink {
    tx: mpsc::UnboundedSender<EngineEvent>,
}

impl EventSink for TestSink {
    fn emit(&self, event: EngineEvent) {
        let _ = self.tx.send(event);
    }
}

fn sink() -> (Arc<dyn EventSink>, mpsc::UnboundedReceiver<EngineEvent>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (Arc::new(TestSink { tx }), rx)
}

fn fast_policy(max_attempts: u32) -> ReconnectPolicy {
    ReconnectPolicy {
        max_attempts,
        delay_floor: Duration::from_millis(10),
        delay_ceiling: Duration::from_millis(40),
        connect_timeout: Duration::from_secs(2),
    }
}

async fn next_event(rx: &mut mpsc::UnboundedReceiver<EngineEvent>) -> EngineEvent {
    tokio::time::timeout(WAIT, rx.recv())
        .await
        .expect("event within timeout")
        .expect("sink open")
}

async fn next_connection(rx: &mut mpsc::UnboundedReceiver<EngineEvent>) -> ConnectionEvent {
    loop {
        if let EngineEvent::Connection(event) = next_event(rx).await {
            return event;
        }
    }
}

#[test]
fn backoff_doubles_up_to_ceiling() {
    let policy = ReconnectPolicy::default();
    let delays: Vec<u64> = (1..=6)
        .map(|attempt| policy.delay_for_attempt(attempt).as_secs())
        .collect();
    assert_eq!(delays, vec![1, 2, 4, 8, 8, 8]);
    assert_eq!(policy.max_attempts, 15);
    assert_eq!(policy.connect_timeout, Duration::from_secs(30));
    assert_eq!(policy.delay_for_attempt(200), Duration::from_secs(8));
}

#[tokio::test]
async fn exchanges_frames_with_server() {
    init_logging();
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let address = listener.local_addr().expect("addr");

    let server = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.expect("accept");
        let mut socket = tokio_tungstenite::accept_async(stream).await.expect("handshake");
        let Some(Ok(Message::Text(text))) = socket.next().await else {
            panic!("expected text frame");
        };
        let frame: serde_json::Value = serde_json::from_str(text.as_str()).expect("json");
        assert_eq!(frame["event"], "chat_message");
        assert_eq!(frame["data"]["request_id"], "7");
        let reply = serde_json::json!({
            "event": "chat_response",
            "data": {"request_id": "7", "text": "pong", "sources": []}
        });
        socket
            .send(Message::Text(reply.to_string().into()))
            .await
            .expect("reply");
        // Keep the socket open until the client leaves.
        while let Some(Ok(_)) = socket.next().await {}
    });

    let (sink, mut rx) = sink();
    let transport = TransportHandle::spawn(format!("ws://{address}"), fast_policy(0), sink);
    assert_eq!(next_connection(&mut rx).await, ConnectionEvent::Connecting);
    assert_eq!(next_connection(&mut rx).await, ConnectionEvent::Connected);
    assert!(transport.is_connected());

    transport
        .send(ClientFrame::ChatMessage {
            request_id: 7,
            session_id: "session_t".to_string(),
            message: "ping".to_string(),
        })
        .expect("queued");

    match next_event(&mut rx).await {
        EngineEvent::Server(ServerEvent::ChatResponse(response)) => {
            assert_eq!(response.request_id, Some(7));
            assert_eq!(response.text, "pong");
        }
        other => panic!("unexpected event {other:?}"),
    }

    transport.shutdown(WAIT).await;
    assert_eq!(next_connection(&mut rx).await, ConnectionEvent::Closed);
    server.await.expect("server task");
}

#[tokio::test]
async fn unreachable_server_gives_up_after_policy() {
    init_logging();
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let address = listener.local_addr().expect("addr");
    drop(listener);

    let (sink, mut rx) = sink();
    let transport = TransportHandle::spawn(format!("ws://{address}"), fast_policy(2), sink);

    let mut events = Vec::new();
    loop {
        let event = next_connection(&mut rx).await;
        let done = matches!(event, ConnectionEvent::GaveUp { .. });
        events.push(event);
        if done {
            break;
        }
    }
    let kinds: Vec<&str> = events
        .iter()
        .map(|event| match event {
            ConnectionEvent::Connecting => "connecting",
            ConnectionEvent::Reconnecting { .. } => "reconnecting",
            ConnectionEvent::ConnectFailed { .. } => "failed",
            ConnectionEvent::GaveUp { .. } => "gave_up",
            _ => "other",
        })
        .collect();
    assert_eq!(
        kinds,
        vec![
            "connecting",
            "failed",
            "reconnecting",
            "failed",
            "reconnecting",
            "failed",
            "gave_up"
        ]
    );
    assert_eq!(events.last(), Some(&ConnectionEvent::GaveUp { attempts: 2 }));

    assert_eq!(
        transport.send(ClientFrame::HealthCheck),
        Err(TransportError::NotConnected)
    );
}

#[tokio::test]
async fn dropped_connection_is_reestablished() {
    init_logging();
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let address = listener.local_addr().expect("addr");

    let server = tokio::spawn(async move {
        // First session: close right after the handshake.
        let (stream, _) = listener.accept().await.expect("accept");
        let mut socket = tokio_tungstenite::accept_async(stream).await.expect("handshake");
        socket.close(None).await.expect("close");
        drop(socket);

        let (stream, _) = listener.accept().await.expect("accept again");
        let mut socket = tokio_tungstenite::accept_async(stream).await.expect("handshake");
        while let Some(Ok(_)) = socket.next().await {}
    });

    let (sink, mut rx) = sink();
    let transport = TransportHandle::spawn(format!("ws://{address}"), fast_policy(3), sink);
    assert_eq!(next_connection(&mut rx).await, ConnectionEvent::Connecting);
    assert_eq!(next_connection(&mut rx).await, ConnectionEvent::Connected);
    assert!(matches!(
        next_connection(&mut rx).await,
        ConnectionEvent::Dropped { .. }
    ));
    assert_eq!(
        next_connection(&mut rx).await,
        ConnectionEvent::Reconnecting { attempt: 1 }
    );
    assert_eq!(next_connection(&mut rx).await, ConnectionEvent::Connected);

    transport.shutdown(WAIT).await;
    server.await.expect("server task");
}

#[tokio::test]
async fn malformed_server_frames_are_dropped() {
    init_logging();
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let address = listener.local_addr().expect("addr");

    let server = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.expect("accept");
        let mut socket = tokio_tungstenite::accept_async(stream).await.expect("handshake");
        for text in [
            "garbage".to_string(),
            serde_json::json!({"event": "unknown_event", "data": {}}).to_string(),
            serde_json::json!({"event": "health_check_response", "data": {}}).to_string(),
        ] {
            socket.send(Message::Text(text.into())).await.expect("send");
        }
        while let Some(Ok(_)) = socket.next().await {}
    });

    let (sink, mut rx) = sink();
    let transport = TransportHandle::spawn(format!("ws://{address}"), fast_policy(0), sink);
    assert_eq!(next_connection(&mut rx).await, ConnectionEvent::Connecting);
    assert_eq!(next_connection(&mut rx).await, ConnectionEvent::Connected);
    assert_eq!(
        next_event(&mut rx).await,
        EngineEvent::Server(ServerEvent::HealthCheckResponse)
    );

    transport.shutdown(WAIT).await;
    server.await.expect("server task");
}
