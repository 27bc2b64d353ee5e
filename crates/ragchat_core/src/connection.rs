use ragchat_logging::{chat_debug, chat_info, chat_warn};

use crate::{Effect, OutgoingMessage, Settings, Timer};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
    Reconnecting,
    Errored,
}

impl ConnectionState {
    pub fn label(self) -> &'static str {
        match self {
            ConnectionState::Disconnected => "Disconnected",
            ConnectionState::Connecting => "Connecting...",
            ConnectionState::Connected => "Connected",
            ConnectionState::Reconnecting => "Reconnecting...",
            ConnectionState::Errored => "Connection Error",
        }
    }
}

/// Lifecycle events reported by the transport. These are the only inputs
/// that move [`ConnectionState`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    Connecting,
    Connected,
    Dropped { reason: String },
    Reconnecting { attempt: u32 },
    ConnectFailed { reason: String },
    GaveUp { attempts: u32 },
    Closed,
}

/// Connection state, user advisory, and heartbeat bookkeeping.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ConnectionSupervisor {
    state: ConnectionState,
    advisory: Option<String>,
    reconnect_attempt: u32,
    heartbeat_generation: u64,
    heartbeat_outstanding: bool,
    missed_heartbeats: u32,
}

impl ConnectionSupervisor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn is_connected(&self) -> bool {
        self.state == ConnectionState::Connected
    }

    /// Non-blocking message for the connection indicator.
    pub fn advisory(&self) -> Option<&str> {
        self.advisory.as_deref()
    }

    pub fn reconnect_attempt(&self) -> u32 {
        self.reconnect_attempt
    }

    pub fn missed_heartbeats(&self) -> u32 {
        self.missed_heartbeats
    }

    /// Requests a connection if none is open or being retried.
    ///
    /// The state itself only moves once the transport reports back.
    pub fn connect(&mut self, effects: &mut Vec<Effect>) -> bool {
        if self.state != ConnectionState::Disconnected {
            chat_debug!("connect ignored while {:?}", self.state);
            return false;
        }
        effects.push(Effect::Connect);
        true
    }

    pub fn apply(
        &mut self,
        event: TransportEvent,
        settings: &Settings,
        effects: &mut Vec<Effect>,
    ) {
        let previous = self.state;
        match event {
            TransportEvent::Connecting => {
                self.state = ConnectionState::Connecting;
            }
            TransportEvent::Connected => {
                self.state = ConnectionState::Connected;
                self.advisory = None;
                self.reconnect_attempt = 0;
                self.start_heartbeat(settings, effects);
            }
            TransportEvent::Dropped { reason } => {
                chat_warn!("connection dropped: {}", reason);
                self.stop_heartbeat(effects);
                self.state = ConnectionState::Reconnecting;
                self.advisory = Some("Connection lost. Reconnecting...".to_string());
            }
            TransportEvent::Reconnecting { attempt } => {
                self.state = ConnectionState::Reconnecting;
                self.reconnect_attempt = attempt;
                self.advisory = Some(format!("Reconnecting (attempt {attempt})..."));
            }
            TransportEvent::ConnectFailed { reason } => {
                chat_warn!("connect failed: {}", reason);
                self.state = ConnectionState::Errored;
                self.advisory = Some(format!("Connection error: {reason}"));
            }
            TransportEvent::GaveUp { attempts } => {
                self.stop_heartbeat(effects);
                self.state = ConnectionState::Disconnected;
                self.advisory = Some(format!(
                    "Unable to reach the server after {attempts} attempts."
                ));
            }
            TransportEvent::Closed => {
                self.stop_heartbeat(effects);
                self.state = ConnectionState::Disconnected;
                self.advisory = None;
            }
        }
        if previous != self.state {
            chat_info!("connection {:?} -> {:?}", previous, self.state);
        }
    }

    /// Surfaces a server-reported error without touching the state.
    pub fn set_advisory(&mut self, message: impl Into<String>) {
        self.advisory = Some(message.into());
    }

    pub fn on_heartbeat_timer(
        &mut self,
        generation: u64,
        settings: &Settings,
        effects: &mut Vec<Effect>,
    ) {
        if generation != self.heartbeat_generation || !self.is_connected() {
            chat_debug!("stale heartbeat timer generation={}", generation);
            return;
        }
        if self.heartbeat_outstanding {
            self.missed_heartbeats += 1;
            chat_warn!(
                "heartbeat not acknowledged (missed={})",
                self.missed_heartbeats
            );
        }
        self.heartbeat_outstanding = true;
        effects.push(Effect::Send(OutgoingMessage::HealthCheck));
        effects.push(Effect::ScheduleTimer {
            timer: Timer::Heartbeat { generation },
            after: settings.heartbeat_interval,
        });
    }

    pub fn on_heartbeat_ack(&mut self) {
        self.heartbeat_outstanding = false;
        self.missed_heartbeats = 0;
    }

    /// A heartbeat that never left the client is logged and otherwise ignored;
    /// the transport's reconnect policy governs recovery.
    pub fn on_heartbeat_send_failed(&mut self, reason: &str) {
        chat_warn!("heartbeat send failed: {}", reason);
        self.heartbeat_outstanding = false;
    }

    fn start_heartbeat(&mut self, settings: &Settings, effects: &mut Vec<Effect>) {
        self.heartbeat_generation += 1;
        self.heartbeat_outstanding = false;
        self.missed_heartbeats = 0;
        effects.push(Effect::ScheduleTimer {
            timer: Timer::Heartbeat {
                generation: self.heartbeat_generation,
            },
            after: settings.heartbeat_interval,
        });
    }

    fn stop_heartbeat(&mut self, effects: &mut Vec<Effect>) {
        if self.state == ConnectionState::Connected {
            effects.push(Effect::CancelTimer {
                timer: Timer::Heartbeat {
                    generation: self.heartbeat_generation,
                },
            });
        }
        self.heartbeat_outstanding = false;
    }
}
