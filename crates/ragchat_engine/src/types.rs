use serde::Deserialize;
use thiserror::Error;

pub type JobId = u64;

/// Lifecycle of the persistent connection as seen by the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionEvent {
    Connecting,
    Connected,
    Dropped { reason: String },
    Reconnecting { attempt: u32 },
    ConnectFailed { reason: String },
    GaveUp { attempts: u32 },
    Closed,
}

/// Outgoing frames on the persistent connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientFrame {
    ChatMessage {
        request_id: u64,
        session_id: String,
        message: String,
    },
    HealthCheck,
}

impl ClientFrame {
    pub fn request_id(&self) -> Option<u64> {
        match self {
            ClientFrame::ChatMessage { request_id, .. } => Some(*request_id),
            ClientFrame::HealthCheck => None,
        }
    }
}

/// Decoded server frames.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerEvent {
    ChatResponse(WireChatResponse),
    AssistantStatus(WireStatus),
    HealthCheckResponse,
    ConnectionResponse {
        status: String,
        message: String,
        session_id: Option<String>,
    },
    Error {
        message: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WireChatResponse {
    pub request_id: Option<u64>,
    pub text: String,
    pub sources: Vec<String>,
    pub error: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WireStatusKind {
    Idle,
    Processing,
    Completed,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WireStatus {
    pub request_id: Option<u64>,
    pub status: WireStatusKind,
    pub progress: u8,
    pub details: String,
    pub workflow: Option<WireWorkflow>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct WireWorkflow {
    pub phases: Vec<String>,
    pub current_phase: Option<usize>,
    pub sub_steps: Vec<WireSubStep>,
    pub current_sub_step: usize,
    pub sub_step_progress: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WireSubStepStatus {
    Pending,
    Active,
    Completed,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct WireSubStep {
    pub icon: String,
    pub title: String,
    pub description: String,
    pub status: Option<WireSubStepStatus>,
    pub progress: Option<u8>,
}

/// One document known to the backend.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RemoteFile {
    pub name: String,
    #[serde(default)]
    pub size: u64,
    #[serde(default)]
    pub modified: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEvent {
    Connection(ConnectionEvent),
    Server(ServerEvent),
    /// An outgoing frame never left the client.
    SendFailed {
        request_id: Option<u64>,
        error: TransportError,
    },
    UploadCompleted {
        job_id: JobId,
        result: Result<(), DocumentError>,
    },
    FilesListed(Result<Vec<RemoteFile>, DocumentError>),
    FileDeleted {
        filename: String,
        result: Result<(), DocumentError>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("not connected")]
    NotConnected,
    #[error("connect failed: {0}")]
    Connect(String),
    #[error("connect timed out")]
    Timeout,
    #[error("connection closed: {0}")]
    Closed(String),
    #[error("could not encode frame: {0}")]
    Codec(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DocumentError {
    #[error("could not read {path}: {message}")]
    Io { path: String, message: String },
    #[error("invalid url: {0}")]
    InvalidUrl(String),
    #[error("network error: {0}")]
    Network(String),
    #[error("request timed out")]
    Timeout,
    #[error("HTTP {0}")]
    Status(u16),
    /// The backend answered with an `error` string.
    #[error("{0}")]
    Rejected(String),
    #[error("invalid response: {0}")]
    Decode(String),
}

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("malformed frame: {0}")]
    Json(#[from] serde_json::Error),
    #[error("unknown event {0:?}")]
    UnknownEvent(String),
    #[error("unknown status {0:?}")]
    UnknownStatus(String),
    #[error("invalid request_id {0:?}")]
    InvalidRequestId(String),
}
