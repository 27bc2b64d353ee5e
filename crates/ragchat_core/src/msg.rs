use crate::{JobId, RequestId, StatusUpdate, Timer, TransportEvent, UploadFile};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Msg {
    /// Process start: open the connection and load the file list.
    Started,
    /// User submitted a query.
    QuerySubmitted(String),
    /// User cleared the chat transcript.
    ClearChatClicked,
    /// User selected files to upload.
    UploadRequested(Vec<UploadFile>),
    /// A selected path could not be read, so it never became an upload.
    UploadUnreadable { filename: String, reason: String },
    /// User dismissed the upload status banner.
    UploadStatusDismissed,
    RefreshFilesRequested,
    DeleteFileRequested { filename: String },
    /// User toggled the minimized state of the progress panel.
    MinimizeToggled,
    /// User asked to reconnect after the transport gave up.
    ReconnectRequested,
    /// Lifecycle event from the transport.
    Transport(TransportEvent),
    /// The transport refused an outgoing message.
    SendFailed {
        request_id: Option<RequestId>,
        reason: String,
    },
    ChatResponse(ChatResponse),
    AssistantStatus(StatusUpdate),
    HealthCheckAcknowledged,
    /// Server-side error event, surfaced as an advisory.
    ServerError { message: String },
    UploadFinished {
        job_id: JobId,
        result: Result<(), String>,
    },
    FilesListed(Result<Vec<FileEntry>, String>),
    FileDeleted {
        filename: String,
        result: Result<(), String>,
    },
    TimerFired(Timer),
    /// Leaves the state untouched and produces no effects.
    NoOp,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatResponse {
    /// Echoed request id; `None` for servers that do not echo it.
    pub request_id: Option<RequestId>,
    pub text: String,
    pub sources: Vec<String>,
    pub error: bool,
}

/// One document known to the backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileEntry {
    pub name: String,
    pub size: u64,
    pub modified: String,
}
