use crate::{JobId, RequestId};

/// Identity of a timer requested through [`crate::Effect::ScheduleTimer`].
///
/// Each variant carries the generation, request, or job it belongs to. A
/// firing whose identity no longer matches the owning component is ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Timer {
    Heartbeat { generation: u64 },
    QueryTimeout { request_id: RequestId },
    CompletionGrace { request_id: RequestId },
    HideHold { generation: u64 },
    HideFade { generation: u64 },
    UploadRamp { job_id: JobId },
    UploadStatusClear { generation: u64 },
}
