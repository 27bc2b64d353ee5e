use std::time::Duration;

use crate::{JobId, RequestId, Timer, UploadFile};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Open the persistent connection (the transport owns retries).
    Connect,
    Send(OutgoingMessage),
    Upload { job_id: JobId, file: UploadFile },
    ListFiles,
    DeleteFile { filename: String },
    ScheduleTimer { timer: Timer, after: Duration },
    CancelTimer { timer: Timer },
}

/// Client to server messages on the persistent connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutgoingMessage {
    ChatMessage {
        request_id: RequestId,
        session_id: String,
        message: String,
    },
    HealthCheck,
}
