use std::sync::{mpsc, Arc};

use ragchat_core::{
    ChatResponse, Effect, FileEntry, Msg, OutgoingMessage, PhaseLabel, RequestId, ServerStatus,
    StatusUpdate, SubStepSpec, SubStepStatus, TransportEvent, WorkflowSnapshot,
};
use ragchat_engine::{
    ClientFrame, ConnectionEvent, EngineEvent, EngineHandle, EngineSettings, EventSink,
    ServerEvent, WireStatus, WireStatusKind, WireSubStepStatus, WireWorkflow,
};
use ragchat_logging::{chat_debug, chat_info, chat_trace, chat_warn};

use super::app::Input;

/// Forwards engine events into the app loop as core messages.
pub struct MsgSink {
    tx: mpsc::Sender<Input>,
}

impl MsgSink {
    pub fn new(tx: mpsc::Sender<Input>) -> Self {
        Self { tx }
    }
}

impl EventSink for MsgSink {
    fn emit(&self, event: EngineEvent) {
        if let Some(msg) = map_engine_event(event) {
            if self.tx.send(Input::Msg(msg)).is_err() {
                chat_debug!("app loop is gone; engine event dropped");
            }
        }
    }
}

pub struct EffectRunner {
    engine: EngineHandle,
}

impl EffectRunner {
    pub fn new(settings: EngineSettings, tx: mpsc::Sender<Input>) -> std::io::Result<Self> {
        let engine = EngineHandle::new(settings, Arc::new(MsgSink::new(tx)))?;
        Ok(Self { engine })
    }

    pub fn enqueue(&self, effects: Vec<Effect>) {
        for effect in effects {
            self.run(effect);
        }
    }

    fn run(&self, effect: Effect) {
        match effect {
            Effect::Connect => self.engine.connect(),
            Effect::Send(message) => self.engine.send(to_frame(message)),
            Effect::Upload { job_id, file } => {
                chat_info!(
                    "Upload job_id={} name={} size={}",
                    job_id,
                    file.name,
                    file.size
                );
                self.engine.upload(job_id, file.path, file.name);
            }
            Effect::ListFiles => self.engine.list_files(),
            Effect::DeleteFile { filename } => self.engine.delete_file(filename),
            Effect::ScheduleTimer { timer, .. } | Effect::CancelTimer { timer } => {
                chat_trace!("timer effect {:?} reached the runner", timer);
            }
        }
    }
}

pub fn to_frame(message: OutgoingMessage) -> ClientFrame {
    match message {
        OutgoingMessage::ChatMessage {
            request_id,
            session_id,
            message,
        } => ClientFrame::ChatMessage {
            request_id: request_id.get(),
            session_id,
            message,
        },
        OutgoingMessage::HealthCheck => ClientFrame::HealthCheck,
    }
}

pub fn map_engine_event(event: EngineEvent) -> Option<Msg> {
    let msg = match event {
        EngineEvent::Connection(event) => Msg::Transport(map_connection(event)),
        EngineEvent::Server(ServerEvent::ChatResponse(response)) => {
            Msg::ChatResponse(ChatResponse {
                request_id: response.request_id.map(RequestId::new),
                text: response.text,
                sources: response.sources,
                error: response.error,
            })
        }
        EngineEvent::Server(ServerEvent::AssistantStatus(status)) => {
            Msg::AssistantStatus(map_status(status))
        }
        EngineEvent::Server(ServerEvent::HealthCheckResponse) => Msg::HealthCheckAcknowledged,
        EngineEvent::Server(ServerEvent::ConnectionResponse {
            status,
            message,
            session_id,
        }) => {
            chat_info!(
                "connection_response status={} session_id={:?} message={}",
                status,
                session_id,
                message
            );
            return None;
        }
        EngineEvent::Server(ServerEvent::Error { message }) => Msg::ServerError { message },
        EngineEvent::SendFailed { request_id, error } => Msg::SendFailed {
            request_id: request_id.map(RequestId::new),
            reason: error.to_string(),
        },
        EngineEvent::UploadCompleted { job_id, result } => Msg::UploadFinished {
            job_id,
            result: result.map_err(|err| err.to_string()),
        },
        EngineEvent::FilesListed(result) => Msg::FilesListed(
            result
                .map(|files| {
                    files
                        .into_iter()
                        .map(|file| FileEntry {
                            name: file.name,
                            size: file.size,
                            modified: file.modified,
                        })
                        .collect()
                })
                .map_err(|err| err.to_string()),
        ),
        EngineEvent::FileDeleted { filename, result } => {
            if let Err(err) = &result {
                chat_warn!("delete of {} failed: {}", filename, err);
            }
            Msg::FileDeleted {
                filename,
                result: result.map_err(|err| err.to_string()),
            }
        }
    };
    Some(msg)
}

fn map_connection(event: ConnectionEvent) -> TransportEvent {
    match event {
        ConnectionEvent::Connecting => TransportEvent::Connecting,
        ConnectionEvent::Connected => TransportEvent::Connected,
        ConnectionEvent::Dropped { reason } => TransportEvent::Dropped { reason },
        ConnectionEvent::Reconnecting { attempt } => TransportEvent::Reconnecting { attempt },
        ConnectionEvent::ConnectFailed { reason } => TransportEvent::ConnectFailed { reason },
        ConnectionEvent::GaveUp { attempts } => TransportEvent::GaveUp { attempts },
        ConnectionEvent::Closed => TransportEvent::Closed,
    }
}

fn map_status(status: WireStatus) -> StatusUpdate {
    StatusUpdate {
        request_id: status.request_id.map(RequestId::new),
        status: match status.status {
            WireStatusKind::Idle => ServerStatus::Idle,
            WireStatusKind::Processing => ServerStatus::Processing,
            WireStatusKind::Completed => ServerStatus::Completed,
            WireStatusKind::Failed => ServerStatus::Failed,
        },
        progress: status.progress,
        details: status.details,
        workflow: status.workflow.map(map_workflow),
    }
}

fn map_workflow(workflow: WireWorkflow) -> WorkflowSnapshot {
    WorkflowSnapshot {
        phases: workflow
            .phases
            .into_iter()
            .map(|name| PhaseLabel { name })
            .collect(),
        current_phase: workflow.current_phase,
        sub_steps: workflow
            .sub_steps
            .into_iter()
            .map(|step| SubStepSpec {
                icon: step.icon,
                title: step.title,
                description: step.description,
                status: step.status.map(map_sub_step_status),
                progress: step.progress,
            })
            .collect(),
        current_sub_step: workflow.current_sub_step,
        sub_step_progress: workflow.sub_step_progress,
    }
}

fn map_sub_step_status(status: WireSubStepStatus) -> SubStepStatus {
    match status {
        WireSubStepStatus::Pending => SubStepStatus::Pending,
        WireSubStepStatus::Active => SubStepStatus::Active,
        WireSubStepStatus::Completed => SubStepStatus::Completed,
        WireSubStepStatus::Error => SubStepStatus::Error,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use ragchat_engine::{
        DocumentError, RemoteFile, TransportError, WireChatResponse, WireSubStep,
    };

    #[test]
    fn chat_message_keeps_its_request_id() {
        let frame = to_frame(OutgoingMessage::ChatMessage {
            request_id: RequestId::new(9),
            session_id: "session_1".to_string(),
            message: "hello".to_string(),
        });
        assert_eq!(
            frame,
            ClientFrame::ChatMessage {
                request_id: 9,
                session_id: "session_1".to_string(),
                message: "hello".to_string(),
            }
        );
        assert_eq!(to_frame(OutgoingMessage::HealthCheck), ClientFrame::HealthCheck);
    }

    #[test]
    fn status_maps_workflow_and_sub_steps() {
        let msg = map_engine_event(EngineEvent::Server(ServerEvent::AssistantStatus(
            WireStatus {
                request_id: Some(3),
                status: WireStatusKind::Processing,
                progress: 40,
                details: "Searching".to_string(),
                workflow: Some(WireWorkflow {
                    phases: vec!["Analyze".to_string(), "Answer".to_string()],
                    current_phase: Some(1),
                    sub_steps: vec![WireSubStep {
                        icon: "search".to_string(),
                        title: "Retrieve".to_string(),
                        description: String::new(),
                        status: Some(WireSubStepStatus::Active),
                        progress: Some(50),
                    }],
                    current_sub_step: 0,
                    sub_step_progress: 50,
                }),
            },
        )));
        let Some(Msg::AssistantStatus(status)) = msg else {
            panic!("expected a status message");
        };
        assert_eq!(status.request_id, Some(RequestId::new(3)));
        assert_eq!(status.status, ServerStatus::Processing);
        let workflow = status.workflow.unwrap();
        assert_eq!(workflow.phases[1].name, "Answer");
        assert_eq!(workflow.current_phase, Some(1));
        assert_eq!(workflow.sub_steps[0].status, Some(SubStepStatus::Active));
    }

    #[test]
    fn untagged_response_stays_untagged() {
        let msg = map_engine_event(EngineEvent::Server(ServerEvent::ChatResponse(
            WireChatResponse {
                request_id: None,
                text: "answer".to_string(),
                sources: vec!["a.pdf".to_string()],
                error: false,
            },
        )));
        assert_eq!(
            msg,
            Some(Msg::ChatResponse(ChatResponse {
                request_id: None,
                text: "answer".to_string(),
                sources: vec!["a.pdf".to_string()],
                error: false,
            }))
        );
    }

    #[test]
    fn connection_response_is_informational() {
        let msg = map_engine_event(EngineEvent::Server(ServerEvent::ConnectionResponse {
            status: "connected".to_string(),
            message: "welcome".to_string(),
            session_id: None,
        }));
        assert_eq!(msg, None);
    }

    #[test]
    fn failures_carry_readable_reasons() {
        assert_eq!(
            map_engine_event(EngineEvent::SendFailed {
                request_id: Some(2),
                error: TransportError::NotConnected,
            }),
            Some(Msg::SendFailed {
                request_id: Some(RequestId::new(2)),
                reason: "not connected".to_string(),
            })
        );
        assert_eq!(
            map_engine_event(EngineEvent::UploadCompleted {
                job_id: 4,
                result: Err(DocumentError::Rejected("Unsupported file".to_string())),
            }),
            Some(Msg::UploadFinished {
                job_id: 4,
                result: Err("Unsupported file".to_string()),
            })
        );
        assert_eq!(
            map_engine_event(EngineEvent::FilesListed(Err(DocumentError::Status(500)))),
            Some(Msg::FilesListed(Err("HTTP 500".to_string())))
        );
    }

    #[test]
    fn file_listing_maps_entries() {
        let msg = map_engine_event(EngineEvent::FilesListed(Ok(vec![RemoteFile {
            name: "notes.pdf".to_string(),
            size: 2048,
            modified: "2024-01-01".to_string(),
        }])));
        assert_eq!(
            msg,
            Some(Msg::FilesListed(Ok(vec![FileEntry {
                name: "notes.pdf".to_string(),
                size: 2048,
                modified: "2024-01-01".to_string(),
            }])))
        );
    }

    #[test]
    fn connection_events_map_one_to_one() {
        assert_eq!(
            map_engine_event(EngineEvent::Connection(ConnectionEvent::GaveUp { attempts: 15 })),
            Some(Msg::Transport(TransportEvent::GaveUp { attempts: 15 }))
        );
        assert_eq!(
            map_engine_event(EngineEvent::Server(ServerEvent::HealthCheckResponse)),
            Some(Msg::HealthCheckAcknowledged)
        );
    }
}
