use std::io::{self, BufRead};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread;
use std::time::Duration;

use anyhow::Context;
use ragchat_core::{update, AppState, Effect, Msg, Session};
use ragchat_logging::{chat_debug, chat_info, chat_warn};

use super::config::ClientConfig;
use super::effects::EffectRunner;
use super::timers::{Clock, SystemClock, TimerQueue};
use super::ui::input::{self, Command};
use super::ui::surfaces::{SurfaceHub, TextPanel};

/// Everything the event loop waits on.
pub enum Input {
    Msg(Msg),
    Quit,
}

/// Owns the state, its timers, and the surfaces that show it.
pub struct Dispatcher<C: Clock> {
    state: AppState,
    timers: TimerQueue<C>,
    surfaces: SurfaceHub,
}

impl<C: Clock> Dispatcher<C> {
    pub fn new(state: AppState, clock: C, surfaces: SurfaceHub) -> Self {
        Self {
            state,
            timers: TimerQueue::new(clock),
            surfaces,
        }
    }

    /// Runs one message through `update`. Timer effects are kept here; the
    /// rest is returned for the effect runner.
    pub fn dispatch(&mut self, msg: Msg) -> Vec<Effect> {
        let state = std::mem::take(&mut self.state);
        let (mut state, effects) = update(state, msg);
        let view = state.view();
        let dirty = state.consume_dirty();
        self.state = state;

        let mut outgoing = Vec::new();
        for effect in effects {
            match effect {
                Effect::ScheduleTimer { timer, after } => self.timers.schedule(timer, after),
                Effect::CancelTimer { timer } => self.timers.cancel(&timer),
                other => outgoing.push(other),
            }
        }
        if dirty {
            self.surfaces.publish(&view);
        }
        outgoing
    }

    /// Fires every timer whose deadline has passed.
    pub fn fire_due(&mut self) -> Vec<Effect> {
        let mut outgoing = Vec::new();
        for timer in self.timers.take_due() {
            outgoing.extend(self.dispatch(Msg::TimerFired(timer)));
        }
        outgoing
    }

    pub fn time_until_next_timer(&self) -> Option<Duration> {
        self.timers.time_until_next()
    }

    pub fn pending_timers(&self) -> usize {
        self.timers.pending()
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }
}

pub fn run(config: ClientConfig, session: Session) -> anyhow::Result<()> {
    let (tx, rx) = mpsc::channel::<Input>();
    let runner = EffectRunner::new(config.engine_settings(), tx.clone())
        .context("starting the network engine")?;

    let mut surfaces = SurfaceHub::new();
    for kind in &config.surfaces {
        surfaces.attach(Box::new(TextPanel::new(*kind, io::stdout())));
    }
    chat_info!(
        "session {} created {} with {} surfaces",
        session.session_id(),
        session.created_at(),
        surfaces.surface_count()
    );

    let state = AppState::new(session, config.core_settings());
    let mut dispatcher = Dispatcher::new(state, SystemClock, surfaces);
    spawn_input_reader(tx)?;

    runner.enqueue(dispatcher.dispatch(Msg::Started));
    loop {
        let input = match dispatcher.time_until_next_timer() {
            Some(wait) => match rx.recv_timeout(wait) {
                Ok(input) => Some(input),
                Err(RecvTimeoutError::Timeout) => None,
                Err(RecvTimeoutError::Disconnected) => break,
            },
            None => match rx.recv() {
                Ok(input) => Some(input),
                Err(_) => break,
            },
        };
        match input {
            Some(Input::Msg(msg)) => runner.enqueue(dispatcher.dispatch(msg)),
            Some(Input::Quit) => break,
            None => {}
        }
        runner.enqueue(dispatcher.fire_due());
    }

    chat_info!(
        "shutting down with {} timers pending and {} transcript entries",
        dispatcher.pending_timers(),
        dispatcher.state().transcript().len()
    );
    Ok(())
}

fn spawn_input_reader(tx: mpsc::Sender<Input>) -> anyhow::Result<()> {
    thread::Builder::new()
        .name("ragchat-input".to_string())
        .spawn(move || {
            println!("{}", input::HELP);
            for line in io::stdin().lock().lines() {
                let line = match line {
                    Ok(line) => line,
                    Err(err) => {
                        chat_warn!("stdin read failed: {}", err);
                        break;
                    }
                };
                let events = match input::parse_line(&line) {
                    Command::Quit => {
                        let _ = tx.send(Input::Quit);
                        return;
                    }
                    Command::Help => {
                        println!("{}", input::HELP);
                        continue;
                    }
                    Command::Unknown(name) => {
                        println!("unknown command /{name}; try /help");
                        continue;
                    }
                    other => input::to_msgs(other),
                };
                for msg in events {
                    if tx.send(Input::Msg(msg)).is_err() {
                        return;
                    }
                }
            }
            chat_debug!("stdin closed");
            let _ = tx.send(Input::Quit);
        })
        .context("starting the input reader")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;
    use std::rc::Rc;

    use super::*;
    use crate::platform::timers::tests::ManualClock;
    use crate::platform::ui::surfaces::{RenderSurface, SurfaceKind};
    use pretty_assertions::assert_eq;
    use ragchat_core::{
        AppViewModel, ChatResponse, OutgoingMessage, RequestId, Settings, TransportEvent,
        Visibility,
    };

    struct CountingSurface(Rc<Cell<usize>>);

    impl RenderSurface for CountingSurface {
        fn kind(&self) -> SurfaceKind {
            SurfaceKind::Desktop
        }

        fn publish(&mut self, _view: &AppViewModel) -> io::Result<()> {
            self.0.set(self.0.get() + 1);
            Ok(())
        }
    }

    fn dispatcher(clock: ManualClock) -> (Dispatcher<ManualClock>, Rc<Cell<usize>>) {
        let published = Rc::new(Cell::new(0));
        let mut surfaces = SurfaceHub::new();
        surfaces.attach(Box::new(CountingSurface(published.clone())));
        let state = AppState::new(
            Session::new("session_app", "2026-01-01T00:00:00Z"),
            Settings::default(),
        );
        (Dispatcher::new(state, clock, surfaces), published)
    }

    #[test]
    fn start_opens_the_connection_and_publishes() {
        let (mut dispatcher, published) = dispatcher(ManualClock::new());
        assert_eq!(
            dispatcher.dispatch(Msg::Started),
            vec![Effect::Connect, Effect::ListFiles]
        );
        assert_eq!(published.get(), 1);

        dispatcher.dispatch(Msg::NoOp);
        assert_eq!(published.get(), 1);
    }

    #[test]
    fn heartbeat_fires_from_the_timer_queue() {
        let clock = ManualClock::new();
        let (mut dispatcher, _) = dispatcher(clock.clone());
        let effects = dispatcher.dispatch(Msg::Transport(TransportEvent::Connected));
        assert!(effects.is_empty());
        assert_eq!(
            dispatcher.time_until_next_timer(),
            Some(Duration::from_secs(30))
        );

        clock.advance(Duration::from_secs(29));
        assert!(dispatcher.fire_due().is_empty());
        clock.advance(Duration::from_secs(1));
        assert_eq!(
            dispatcher.fire_due(),
            vec![Effect::Send(OutgoingMessage::HealthCheck)]
        );
        assert_eq!(dispatcher.pending_timers(), 1);
    }

    #[test]
    fn completed_answer_fades_back_to_ready() {
        let clock = ManualClock::new();
        let (mut dispatcher, _) = dispatcher(clock.clone());
        dispatcher.dispatch(Msg::Transport(TransportEvent::Connected));
        let effects = dispatcher.dispatch(Msg::QuerySubmitted("hello".to_string()));
        assert!(matches!(
            effects.as_slice(),
            [Effect::Send(OutgoingMessage::ChatMessage { .. })]
        ));

        dispatcher.dispatch(Msg::ChatResponse(ChatResponse {
            request_id: Some(RequestId::new(1)),
            text: "Hi there".to_string(),
            sources: Vec::new(),
            error: false,
        }));
        assert_eq!(
            dispatcher.state().view().progress.visibility,
            Visibility::Visible
        );

        clock.advance(Duration::from_secs(2));
        dispatcher.fire_due();
        assert_eq!(
            dispatcher.state().view().progress.visibility,
            Visibility::Fading
        );

        clock.advance(Duration::from_secs(1));
        dispatcher.fire_due();
        let view = dispatcher.state().view();
        assert_eq!(view.progress.visibility, Visibility::Hidden);
        assert_eq!(view.progress.label, "Ready");
    }

    #[test]
    fn clearing_the_chat_drops_the_query_timeout() {
        let clock = ManualClock::new();
        let (mut dispatcher, _) = dispatcher(clock.clone());
        dispatcher.dispatch(Msg::Transport(TransportEvent::Connected));
        dispatcher.dispatch(Msg::QuerySubmitted("hello".to_string()));
        assert_eq!(dispatcher.pending_timers(), 2);

        dispatcher.dispatch(Msg::ClearChatClicked);
        assert_eq!(dispatcher.pending_timers(), 1);
        clock.advance(Duration::from_secs(121));
        assert_eq!(
            dispatcher.fire_due(),
            vec![Effect::Send(OutgoingMessage::HealthCheck)]
        );
        assert!(dispatcher.state().transcript().is_empty());
    }
}
