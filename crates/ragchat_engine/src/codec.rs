//! JSON framing for the persistent connection.
//!
//! Every frame is a text message `{"event": <name>, "data": <object>}`.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{
    ClientFrame, CodecError, ServerEvent, WireChatResponse, WireStatus, WireStatusKind,
    WireSubStep, WireSubStepStatus, WireWorkflow,
};

#[derive(Serialize)]
struct OutgoingFrame<'a, T: Serialize> {
    event: &'a str,
    data: T,
}

#[derive(Serialize)]
struct ChatMessageData<'a> {
    request_id: String,
    session_id: &'a str,
    message: &'a str,
}

#[derive(Serialize)]
struct EmptyData {}

pub fn encode_client(frame: &ClientFrame) -> Result<String, CodecError> {
    let text = match frame {
        ClientFrame::ChatMessage {
            request_id,
            session_id,
            message,
        } => serde_json::to_string(&OutgoingFrame {
            event: "chat_message",
            data: ChatMessageData {
                request_id: request_id.to_string(),
                session_id,
                message,
            },
        })?,
        ClientFrame::HealthCheck => serde_json::to_string(&OutgoingFrame {
            event: "health_check",
            data: EmptyData {},
        })?,
    };
    Ok(text)
}

#[derive(Deserialize)]
struct RawFrame {
    event: String,
    #[serde(default)]
    data: Value,
}

/// Servers echo the id as a decimal string; bare numbers are tolerated.
#[derive(Deserialize)]
#[serde(untagged)]
enum RawRequestId {
    Number(u64),
    Text(String),
}

#[derive(Deserialize)]
struct ChatResponseData {
    #[serde(default)]
    request_id: Option<RawRequestId>,
    #[serde(default)]
    text: String,
    #[serde(default)]
    sources: Vec<Value>,
    #[serde(default)]
    error: bool,
}

#[derive(Deserialize)]
struct StatusData {
    #[serde(default)]
    request_id: Option<RawRequestId>,
    status: String,
    #[serde(default)]
    progress: f64,
    #[serde(default)]
    details: String,
    #[serde(default)]
    workflow: Option<WorkflowData>,
    /// Explicit per-sub-step statuses, outside the workflow object.
    #[serde(default)]
    steps: Option<Vec<TaskStepData>>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct WorkflowData {
    #[serde(default)]
    steps: Vec<PhaseData>,
    #[serde(default)]
    current_step: Option<usize>,
    #[serde(default)]
    task_steps: Vec<TaskStepData>,
    #[serde(default)]
    current_task_step: usize,
    #[serde(default)]
    task_progress: f64,
}

#[derive(Deserialize)]
struct PhaseData {
    #[serde(default)]
    label: Option<String>,
    #[serde(default)]
    name: Option<String>,
}

#[derive(Deserialize)]
struct TaskStepData {
    #[serde(default)]
    icon: Option<String>,
    #[serde(default, rename = "type")]
    kind: Option<String>,
    #[serde(default)]
    title: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    progress: Option<f64>,
}

#[derive(Deserialize)]
struct ConnectionResponseData {
    #[serde(default)]
    status: String,
    #[serde(default)]
    message: String,
    #[serde(default)]
    session_id: Option<String>,
}

#[derive(Deserialize)]
struct ErrorData {
    #[serde(default)]
    message: String,
}

pub fn decode_server(text: &str) -> Result<ServerEvent, CodecError> {
    let raw: RawFrame = serde_json::from_str(text)?;
    let data = if raw.data.is_null() {
        Value::Object(serde_json::Map::new())
    } else {
        raw.data
    };

    match raw.event.as_str() {
        "chat_response" => {
            let data: ChatResponseData = serde_json::from_value(data)?;
            Ok(ServerEvent::ChatResponse(WireChatResponse {
                request_id: parse_request_id(data.request_id)?,
                text: data.text,
                sources: data.sources.into_iter().map(source_label).collect(),
                error: data.error,
            }))
        }
        "assistant_status" | "assistant_status_update" => {
            let data: StatusData = serde_json::from_value(data)?;
            decode_status(data).map(ServerEvent::AssistantStatus)
        }
        "health_check_response" => Ok(ServerEvent::HealthCheckResponse),
        "connection_response" => {
            let data: ConnectionResponseData = serde_json::from_value(data)?;
            Ok(ServerEvent::ConnectionResponse {
                status: data.status,
                message: data.message,
                session_id: data.session_id,
            })
        }
        "error" => {
            let data: ErrorData = serde_json::from_value(data)?;
            Ok(ServerEvent::Error {
                message: data.message,
            })
        }
        other => Err(CodecError::UnknownEvent(other.to_string())),
    }
}

fn decode_status(data: StatusData) -> Result<WireStatus, CodecError> {
    let status = parse_status(&data.status)?;
    let mut workflow = data.workflow.map(|workflow| WireWorkflow {
        phases: workflow
            .steps
            .into_iter()
            .map(|phase| phase.label.or(phase.name).unwrap_or_default())
            .collect(),
        current_phase: workflow.current_step,
        sub_steps: workflow.task_steps.into_iter().map(sub_step).collect(),
        current_sub_step: workflow.current_task_step,
        sub_step_progress: percent(workflow.task_progress),
    });

    if let Some(explicit) = data.steps {
        let explicit: Vec<WireSubStep> = explicit.into_iter().map(sub_step).collect();
        let target = workflow.get_or_insert_with(|| WireWorkflow {
            current_sub_step: explicit
                .iter()
                .position(|step| step.status != Some(WireSubStepStatus::Completed))
                .unwrap_or(explicit.len().saturating_sub(1)),
            ..WireWorkflow::default()
        });
        if target.sub_steps.is_empty() {
            target.sub_steps = explicit;
        } else {
            for (step, update) in target.sub_steps.iter_mut().zip(explicit) {
                if update.status.is_some() {
                    step.status = update.status;
                }
                if update.progress.is_some() {
                    step.progress = update.progress;
                }
            }
        }
    }

    Ok(WireStatus {
        request_id: parse_request_id(data.request_id)?,
        status,
        progress: percent(data.progress),
        details: data.details,
        workflow,
    })
}

fn parse_request_id(raw: Option<RawRequestId>) -> Result<Option<u64>, CodecError> {
    match raw {
        None => Ok(None),
        Some(RawRequestId::Number(id)) => Ok(Some(id)),
        Some(RawRequestId::Text(text)) => text
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| CodecError::InvalidRequestId(text)),
    }
}

fn parse_status(status: &str) -> Result<WireStatusKind, CodecError> {
    match status.trim().to_ascii_lowercase().as_str() {
        "idle" => Ok(WireStatusKind::Idle),
        "processing" | "running" => Ok(WireStatusKind::Processing),
        "completed" => Ok(WireStatusKind::Completed),
        "failed" | "error" => Ok(WireStatusKind::Failed),
        _ => Err(CodecError::UnknownStatus(status.to_string())),
    }
}

fn parse_sub_step_status(status: &str) -> Option<WireSubStepStatus> {
    match status.trim().to_ascii_lowercase().as_str() {
        "pending" | "waiting" => Some(WireSubStepStatus::Pending),
        "active" | "running" | "processing" | "in_progress" => Some(WireSubStepStatus::Active),
        "completed" | "done" => Some(WireSubStepStatus::Completed),
        "error" | "failed" => Some(WireSubStepStatus::Error),
        _ => None,
    }
}

fn sub_step(data: TaskStepData) -> WireSubStep {
    WireSubStep {
        icon: data.icon.or(data.kind).unwrap_or_default(),
        title: data.title,
        description: data.description,
        status: data.status.as_deref().and_then(parse_sub_step_status),
        progress: data.progress.map(percent),
    }
}

fn source_label(value: Value) -> String {
    match value {
        Value::String(text) => text,
        Value::Object(map) => ["source", "filename", "name", "title"]
            .iter()
            .find_map(|key| map.get(*key).and_then(Value::as_str))
            .map(ToOwned::to_owned)
            .unwrap_or_else(|| Value::Object(map).to_string()),
        other => other.to_string(),
    }
}

fn percent(value: f64) -> u8 {
    if value.is_nan() {
        return 0;
    }
    value.clamp(0.0, 100.0).round() as u8
}
