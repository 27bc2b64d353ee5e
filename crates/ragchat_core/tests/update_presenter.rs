use ragchat_core::{
    update, AppState, ChatResponse, Effect, Msg, OutgoingMessage, RequestId, ServerStatus,
    Session, Settings, StatusUpdate, Timer, Tone, TransportEvent, Visibility,
};

fn init_logging() {
    ragchat_logging::initialize_for_tests();
}

fn submitted() -> (AppState, RequestId) {
    let state = AppState::new(
        Session::new("session_ui", "2026-01-01T00:00:00Z"),
        Settings::default(),
    );
    let (state, _) = update(state, Msg::Transport(TransportEvent::Connected));
    let (state, effects) = update(state, Msg::QuerySubmitted("hello".to_string()));
    let request_id = effects
        .iter()
        .find_map(|effect| match effect {
            Effect::Send(OutgoingMessage::ChatMessage { request_id, .. }) => Some(*request_id),
            _ => None,
        })
        .expect("chat message sent");
    (state, request_id)
}

fn completed(request_id: RequestId) -> Msg {
    Msg::AssistantStatus(StatusUpdate {
        request_id: Some(request_id),
        status: ServerStatus::Completed,
        progress: 100,
        details: "Response ready".to_string(),
        workflow: None,
    })
}

fn hide_holds(effects: &[Effect]) -> Vec<Timer> {
    effects
        .iter()
        .filter_map(|effect| match effect {
            Effect::ScheduleTimer {
                timer: timer @ Timer::HideHold { .. },
                ..
            } => Some(*timer),
            _ => None,
        })
        .collect()
}

#[test]
fn repeated_completion_schedules_one_hide() {
    init_logging();
    let (state, request_id) = submitted();
    assert_eq!(state.view().progress.visibility, Visibility::Visible);

    let (state, first) = update(state, completed(request_id));
    assert_eq!(hide_holds(&first).len(), 1);

    // The final chat_response arrives after the completed status.
    let (state, second) = update(
        state,
        Msg::ChatResponse(ChatResponse {
            request_id: Some(request_id),
            text: "answer".to_string(),
            sources: Vec::new(),
            error: false,
        }),
    );
    assert!(hide_holds(&second).is_empty());
    assert!(state.presenter().has_pending_hide());
    assert_eq!(state.view().progress.tone, Tone::Success);
}

#[test]
fn hide_sequence_returns_to_ready() {
    init_logging();
    let (state, request_id) = submitted();
    let (state, effects) = update(state, completed(request_id));
    let hold = hide_holds(&effects)[0];
    let Timer::HideHold { generation } = hold else {
        panic!("expected hide hold");
    };

    let (state, effects) = update(state, Msg::TimerFired(hold));
    assert_eq!(state.view().progress.visibility, Visibility::Fading);
    let fade = Timer::HideFade { generation };
    assert!(effects.contains(&Effect::ScheduleTimer {
        timer: fade,
        after: Settings::default().hide_fade,
    }));

    let (state, _) = update(state, Msg::TimerFired(fade));
    let view = state.view();
    assert_eq!(view.progress.visibility, Visibility::Hidden);
    assert_eq!(view.progress.label, "Ready");
    assert_eq!(view.progress.tone, Tone::Neutral);
    assert!(!state.presenter().has_pending_hide());
}

#[test]
fn new_activity_cancels_pending_hide() {
    init_logging();
    let (state, request_id) = submitted();
    let (state, effects) = update(state, completed(request_id));
    let hold = hide_holds(&effects)[0];

    let (mut state, effects) = update(state, Msg::QuerySubmitted("next".to_string()));
    assert!(effects.contains(&Effect::CancelTimer { timer: hold }));
    state.consume_dirty();

    // If the cancelled timer fires anyway it is ignored.
    let (mut state, effects) = update(state, Msg::TimerFired(hold));
    assert!(effects.is_empty());
    assert!(!state.consume_dirty());
    assert_eq!(state.view().progress.visibility, Visibility::Visible);
    assert_eq!(state.view().progress.tone, Tone::Active);
}

#[test]
fn errors_stay_visible() {
    init_logging();
    let (state, request_id) = submitted();
    let (state, effects) = update(
        state,
        Msg::AssistantStatus(StatusUpdate {
            request_id: Some(request_id),
            status: ServerStatus::Failed,
            progress: 0,
            details: "Retrieval failed".to_string(),
            workflow: None,
        }),
    );
    assert!(hide_holds(&effects).is_empty());
    let view = state.view();
    assert_eq!(view.progress.visibility, Visibility::Visible);
    assert_eq!(view.progress.tone, Tone::Error);
    assert_eq!(view.progress.label, "Retrieval failed");
}

#[test]
fn minimized_panel_keeps_updating() {
    init_logging();
    let (state, request_id) = submitted();
    let (state, _) = update(state, Msg::MinimizeToggled);
    let (state, _) = update(
        state,
        Msg::AssistantStatus(StatusUpdate {
            request_id: Some(request_id),
            status: ServerStatus::Processing,
            progress: 55,
            details: "Generating".to_string(),
            workflow: None,
        }),
    );
    let view = state.view();
    assert!(view.progress.minimized);
    assert_eq!(view.progress.label, "Generating");
    assert_eq!(view.progress.percent, 55);

    let (state, _) = update(state, Msg::MinimizeToggled);
    assert!(!state.view().progress.minimized);
}
