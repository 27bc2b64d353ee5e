use ragchat_logging::{chat_debug, chat_warn};

use crate::{
    AppState, ChatEntry, ChatResponse, ChatRole, Effect, Msg, OutgoingMessage, StatusUpdate, Timer,
    Tone, UploadBanner, UploadNotice,
};

const NOT_CONNECTED: &str = "Not connected to server. Please wait for reconnection.";

/// Pure update function: applies a message to state and returns any effects.
pub fn update(mut state: AppState, msg: Msg) -> (AppState, Vec<Effect>) {
    let mut effects = Vec::new();
    let changed = match msg {
        Msg::Started => {
            state.connection.connect(&mut effects);
            effects.push(Effect::ListFiles);
            true
        }
        Msg::QuerySubmitted(text) => submit_query(&mut state, text, &mut effects),
        Msg::ClearChatClicked => {
            state.transcript.clear();
            state.correlator.abandon();
            state.workflow.reset(&mut effects);
            state.presenter.reset(&mut effects);
            true
        }
        Msg::UploadRequested(files) => {
            if files.is_empty() {
                show_banner(
                    &mut state,
                    "Please select files to upload.",
                    None,
                    Tone::Error,
                    &mut effects,
                );
            } else {
                let notices = state
                    .uploads
                    .enqueue(files, &state.settings.upload, &mut effects);
                apply_upload_notices(&mut state, notices, &mut effects);
            }
            true
        }
        Msg::UploadUnreadable { filename, reason } => {
            chat_warn!("cannot read {} for upload: {}", filename, reason);
            let message = format!("Cannot read {filename}: {reason}");
            state.transcript.push(ChatEntry::system(message.clone(), true));
            show_banner(&mut state, message, None, Tone::Error, &mut effects);
            true
        }
        Msg::UploadStatusDismissed => state.presenter.dismiss_banner(&mut effects),
        Msg::RefreshFilesRequested => {
            effects.push(Effect::ListFiles);
            false
        }
        Msg::DeleteFileRequested { filename } => {
            let filename = filename.trim();
            if !filename.is_empty() {
                effects.push(Effect::DeleteFile {
                    filename: filename.to_string(),
                });
            }
            false
        }
        Msg::MinimizeToggled => {
            state.presenter.toggle_minimized();
            true
        }
        Msg::ReconnectRequested => {
            state.connection.connect(&mut effects);
            false
        }
        Msg::Transport(event) => {
            state
                .connection
                .apply(event, &state.settings, &mut effects);
            true
        }
        Msg::SendFailed { request_id, reason } => match request_id {
            None => {
                state.connection.on_heartbeat_send_failed(&reason);
                false
            }
            Some(request_id) => match state.correlator.attribute(Some(request_id)) {
                Ok(request_id) => {
                    state.correlator.resolve(request_id);
                    state.workflow.fail(
                        request_id,
                        format!("Message could not be sent: {reason}"),
                        &mut effects,
                    );
                    present_workflow(&mut state, &mut effects);
                    true
                }
                Err(disposition) => {
                    chat_debug!(
                        "send failure for request {} ignored ({:?})",
                        request_id,
                        disposition
                    );
                    false
                }
            },
        },
        Msg::ChatResponse(response) => apply_chat_response(&mut state, response, &mut effects),
        Msg::AssistantStatus(status) => apply_status(&mut state, status, &mut effects),
        Msg::HealthCheckAcknowledged => {
            state.connection.on_heartbeat_ack();
            false
        }
        Msg::ServerError { message } => {
            chat_warn!("server reported error: {}", message);
            state.connection.set_advisory(message);
            true
        }
        Msg::UploadFinished { job_id, result } => {
            let notices = state.uploads.on_finished(
                job_id,
                result,
                &state.settings.upload,
                &mut effects,
            );
            let changed = !notices.is_empty();
            apply_upload_notices(&mut state, notices, &mut effects);
            changed
        }
        Msg::FilesListed(Ok(files)) => {
            state.files = files;
            state.files_note = None;
            true
        }
        Msg::FilesListed(Err(error)) => {
            chat_warn!("loading files failed: {}", error);
            state.files_note = Some("Error loading files".to_string());
            true
        }
        Msg::FileDeleted { filename, result } => {
            match result {
                Ok(()) => {
                    show_banner(
                        &mut state,
                        format!("{filename} deleted successfully"),
                        None,
                        Tone::Success,
                        &mut effects,
                    );
                    effects.push(Effect::ListFiles);
                }
                Err(error) => {
                    chat_warn!("deleting {} failed: {}", filename, error);
                    show_banner(
                        &mut state,
                        format!("Error deleting {filename}: {error}"),
                        None,
                        Tone::Error,
                        &mut effects,
                    );
                }
            }
            true
        }
        Msg::TimerFired(timer) => on_timer(&mut state, timer, &mut effects),
        Msg::NoOp => false,
    };

    if changed {
        state.mark_dirty();
    }
    (state, effects)
}

fn submit_query(state: &mut AppState, text: String, effects: &mut Vec<Effect>) -> bool {
    let message = text.trim();
    if message.is_empty() {
        return false;
    }
    if !state.connection.is_connected() {
        chat_debug!("query refused while {:?}", state.connection.state());
        state.transcript.push(ChatEntry::system(NOT_CONNECTED, true));
        return true;
    }

    let (request_id, _superseded) = state.correlator.submit();
    state.transcript.push(ChatEntry::user(message));
    effects.push(Effect::Send(OutgoingMessage::ChatMessage {
        request_id,
        session_id: state.session.session_id().to_string(),
        message: message.to_string(),
    }));
    state.workflow.begin(request_id, &state.settings, effects);
    present_workflow(state, effects);
    true
}

fn apply_chat_response(
    state: &mut AppState,
    response: ChatResponse,
    effects: &mut Vec<Effect>,
) -> bool {
    let request_id = match state.correlator.attribute(response.request_id) {
        Ok(request_id) => request_id,
        Err(disposition) => {
            chat_debug!(
                "chat_response for {:?} discarded ({:?})",
                response.request_id,
                disposition
            );
            return false;
        }
    };
    state.correlator.resolve(request_id);
    let text = if response.text.is_empty() {
        "No response received".to_string()
    } else {
        response.text
    };
    state.transcript.push(ChatEntry {
        role: ChatRole::Assistant,
        text: text.clone(),
        sources: response.sources,
        error: response.error,
    });
    if response.error {
        state.workflow.fail(request_id, text, effects);
    } else {
        state.workflow.complete(
            request_id,
            "Response delivered".to_string(),
            &state.settings,
            effects,
        );
    }
    present_workflow(state, effects);
    true
}

fn apply_status(state: &mut AppState, status: StatusUpdate, effects: &mut Vec<Effect>) -> bool {
    let request_id = match state.correlator.attribute(status.request_id) {
        Ok(request_id) => request_id,
        Err(disposition) => {
            chat_debug!(
                "assistant_status {:?} for {:?} discarded ({:?})",
                status.status,
                status.request_id,
                disposition
            );
            return false;
        }
    };
    state
        .workflow
        .apply_status(request_id, status, &state.settings, effects);
    present_workflow(state, effects);
    true
}

fn on_timer(state: &mut AppState, timer: Timer, effects: &mut Vec<Effect>) -> bool {
    match timer {
        Timer::Heartbeat { generation } => {
            state
                .connection
                .on_heartbeat_timer(generation, &state.settings, effects);
            false
        }
        Timer::QueryTimeout { request_id } => {
            if !state.workflow.on_query_timeout(request_id) {
                return false;
            }
            state.correlator.resolve(request_id);
            present_workflow(state, effects);
            true
        }
        Timer::CompletionGrace { request_id } => {
            if !state.workflow.on_grace_elapsed(request_id) {
                return false;
            }
            present_workflow(state, effects);
            true
        }
        Timer::HideHold { generation } => {
            state
                .presenter
                .on_hide_hold(generation, &state.settings, effects)
        }
        Timer::HideFade { generation } => state.presenter.on_hide_fade(generation),
        Timer::UploadRamp { job_id } => {
            match state
                .uploads
                .on_ramp_tick(job_id, &state.settings.upload, effects)
            {
                Some(notice) => {
                    apply_upload_notices(state, vec![notice], effects);
                    true
                }
                None => false,
            }
        }
        Timer::UploadStatusClear { generation } => state.presenter.on_banner_clear(generation),
    }
}

fn present_workflow(state: &mut AppState, effects: &mut Vec<Effect>) -> bool {
    let line = state.workflow.state().status_line();
    state.presenter.present(line, &state.settings, effects)
}

fn show_banner(
    state: &mut AppState,
    message: impl Into<String>,
    percent: Option<u8>,
    tone: Tone,
    effects: &mut Vec<Effect>,
) {
    let banner = UploadBanner {
        message: message.into(),
        percent,
        tone,
    };
    state.presenter.show_banner(banner, &state.settings, effects);
}

fn apply_upload_notices(
    state: &mut AppState,
    notices: Vec<UploadNotice>,
    effects: &mut Vec<Effect>,
) {
    for notice in notices {
        match notice {
            UploadNotice::Rejected { reason, .. } => {
                show_banner(state, reason.to_string(), None, Tone::Error, effects);
            }
            UploadNotice::Started { filename, .. } => {
                show_banner(
                    state,
                    format!("Uploading {filename}..."),
                    Some(0),
                    Tone::Active,
                    effects,
                );
            }
            UploadNotice::Progress { percent, .. } => {
                state.presenter.set_banner_percent(percent);
            }
            UploadNotice::Succeeded { filename, .. } => {
                show_banner(
                    state,
                    format!("{filename} uploaded and processed successfully!"),
                    Some(100),
                    Tone::Success,
                    effects,
                );
                state.transcript.push(ChatEntry::system(
                    format!(
                        "Document \"{filename}\" has been uploaded and processed. You can now ask questions about it!"
                    ),
                    false,
                ));
            }
            UploadNotice::Failed {
                filename, error, ..
            } => {
                show_banner(
                    state,
                    format!("Error uploading {filename}: {error}"),
                    Some(100),
                    Tone::Error,
                    effects,
                );
            }
            UploadNotice::BatchFinished { transmitted } => {
                chat_debug!("upload batch finished, {} transmitted", transmitted);
            }
        }
    }
}
