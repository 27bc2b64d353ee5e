use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use ragchat_logging::{chat_debug, chat_info, chat_warn};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use crate::codec::{decode_server, encode_client};
use crate::{ClientFrame, ConnectionEvent, EngineEvent, TransportError};

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Retry schedule for the persistent connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconnectPolicy {
    /// Reconnect attempts after a failure or drop before giving up.
    pub max_attempts: u32,
    pub delay_floor: Duration,
    pub delay_ceiling: Duration,
    pub connect_timeout: Duration,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 15,
            delay_floor: Duration::from_secs(1),
            delay_ceiling: Duration::from_secs(8),
            connect_timeout: Duration::from_secs(30),
        }
    }
}

impl ReconnectPolicy {
    /// `floor * 2^(attempt-1)`, clamped to the ceiling.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(20);
        self.delay_floor
            .saturating_mul(1u32 << exponent)
            .min(self.delay_ceiling)
    }
}

pub trait EventSink: Send + Sync {
    fn emit(&self, event: EngineEvent);
}

pub struct ChannelEventSink {
    tx: std::sync::mpsc::Sender<EngineEvent>,
}

impl ChannelEventSink {
    pub fn new(tx: std::sync::mpsc::Sender<EngineEvent>) -> Self {
        Self { tx }
    }
}

impl EventSink for ChannelEventSink {
    fn emit(&self, event: EngineEvent) {
        let _ = self.tx.send(event);
    }
}

/// Handle to a running connection task.
///
/// Dropping the handle (or calling [`TransportHandle::close`]) ends the task
/// with a `Closed` event.
pub struct TransportHandle {
    outgoing: Option<mpsc::UnboundedSender<ClientFrame>>,
    connected: Arc<AtomicBool>,
    task: JoinHandle<()>,
}

impl TransportHandle {
    /// Starts the connect/reconnect loop. Must be called inside a tokio runtime.
    pub fn spawn(url: String, policy: ReconnectPolicy, sink: Arc<dyn EventSink>) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let connected = Arc::new(AtomicBool::new(false));
        let task = tokio::spawn(run_connection(url, policy, sink, rx, connected.clone()));
        Self {
            outgoing: Some(tx),
            connected,
            task,
        }
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Queues a frame on the open socket. Never buffers across reconnects.
    pub fn send(&self, frame: ClientFrame) -> Result<(), TransportError> {
        if !self.is_connected() {
            return Err(TransportError::NotConnected);
        }
        match &self.outgoing {
            Some(tx) => tx
                .send(frame)
                .map_err(|_| TransportError::Closed("transport stopped".to_string())),
            None => Err(TransportError::NotConnected),
        }
    }

    pub fn close(&mut self) {
        self.outgoing.take();
    }

    /// Closes the connection and waits for the task to finish.
    pub async fn shutdown(mut self, grace: Duration) {
        self.close();
        let _ = tokio::time::timeout(grace, &mut self.task).await;
    }
}

enum SessionEnd {
    Shutdown,
    Dropped(String),
}

async fn run_connection(
    url: String,
    policy: ReconnectPolicy,
    sink: Arc<dyn EventSink>,
    mut outgoing: mpsc::UnboundedReceiver<ClientFrame>,
    connected: Arc<AtomicBool>,
) {
    let emit = |event: ConnectionEvent| sink.emit(EngineEvent::Connection(event));
    let mut attempt: u32 = 0;
    loop {
        if attempt == 0 {
            emit(ConnectionEvent::Connecting);
        } else {
            emit(ConnectionEvent::Reconnecting { attempt });
        }

        match connect(&url, policy.connect_timeout).await {
            Ok(socket) => {
                chat_info!("connected to {}", url);
                attempt = 0;
                connected.store(true, Ordering::SeqCst);
                emit(ConnectionEvent::Connected);
                let end = run_session(socket, &mut outgoing, sink.as_ref()).await;
                connected.store(false, Ordering::SeqCst);
                match end {
                    SessionEnd::Shutdown => {
                        emit(ConnectionEvent::Closed);
                        return;
                    }
                    SessionEnd::Dropped(reason) => {
                        chat_warn!("connection dropped: {}", reason);
                        emit(ConnectionEvent::Dropped { reason });
                    }
                }
            }
            Err(err) => {
                chat_warn!("connect to {} failed: {}", url, err);
                emit(ConnectionEvent::ConnectFailed {
                    reason: err.to_string(),
                });
            }
        }

        if attempt >= policy.max_attempts {
            emit(ConnectionEvent::GaveUp { attempts: attempt });
            return;
        }
        attempt += 1;
        let delay = policy.delay_for_attempt(attempt);
        chat_debug!("reconnect attempt {} in {:?}", attempt, delay);
        if !wait_before_retry(delay, &mut outgoing, sink.as_ref()).await {
            emit(ConnectionEvent::Closed);
            return;
        }
    }
}

async fn connect(url: &str, timeout: Duration) -> Result<Socket, TransportError> {
    match tokio::time::timeout(timeout, tokio_tungstenite::connect_async(url)).await {
        Ok(Ok((socket, _response))) => Ok(socket),
        Ok(Err(err)) => Err(TransportError::Connect(err.to_string())),
        Err(_) => Err(TransportError::Timeout),
    }
}

async fn run_session(
    socket: Socket,
    outgoing: &mut mpsc::UnboundedReceiver<ClientFrame>,
    sink: &dyn EventSink,
) -> SessionEnd {
    let (mut writer, mut reader) = socket.split();
    loop {
        tokio::select! {
            frame = outgoing.recv() => {
                let Some(frame) = frame else {
                    let _ = writer.send(Message::Close(None)).await;
                    return SessionEnd::Shutdown;
                };
                let request_id = frame.request_id();
                let text = match encode_client(&frame) {
                    Ok(text) => text,
                    Err(err) => {
                        sink.emit(EngineEvent::SendFailed {
                            request_id,
                            error: TransportError::Codec(err.to_string()),
                        });
                        continue;
                    }
                };
                if let Err(err) = writer.send(Message::Text(text.into())).await {
                    sink.emit(EngineEvent::SendFailed {
                        request_id,
                        error: TransportError::Closed(err.to_string()),
                    });
                    return SessionEnd::Dropped(err.to_string());
                }
            }
            message = reader.next() => match message {
                Some(Ok(Message::Text(text))) => match decode_server(text.as_str()) {
                    Ok(event) => sink.emit(EngineEvent::Server(event)),
                    Err(err) => chat_warn!("dropping server frame: {}", err),
                },
                Some(Ok(Message::Close(frame))) => {
                    let reason = frame
                        .map(|frame| frame.reason.to_string())
                        .filter(|reason| !reason.is_empty())
                        .unwrap_or_else(|| "closed by server".to_string());
                    return SessionEnd::Dropped(reason);
                }
                Some(Ok(_)) => {}
                Some(Err(err)) => return SessionEnd::Dropped(err.to_string()),
                None => return SessionEnd::Dropped("stream ended".to_string()),
            },
        }
    }
}

/// Sleeps out the backoff delay, refusing any frame that slipped in while the
/// socket was going down. Returns `false` when the handle was closed.
async fn wait_before_retry(
    delay: Duration,
    outgoing: &mut mpsc::UnboundedReceiver<ClientFrame>,
    sink: &dyn EventSink,
) -> bool {
    let sleep = tokio::time::sleep(delay);
    tokio::pin!(sleep);
    loop {
        tokio::select! {
            _ = &mut sleep => return true,
            frame = outgoing.recv() => match frame {
                Some(frame) => sink.emit(EngineEvent::SendFailed {
                    request_id: frame.request_id(),
                    error: TransportError::NotConnected,
                }),
                None => return false,
            },
        }
    }
}
