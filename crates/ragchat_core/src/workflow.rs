use ragchat_logging::{chat_debug, chat_warn};

use crate::{Effect, RequestId, Settings, StatusLine, Timer, Tone};

const DEFAULT_PHASES: [&str; 5] = ["Query", "Search Docs", "Analyze", "Generate", "Respond"];

const DEFAULT_SUB_STEPS: [(&str, &str, &str); 5] = [
    (
        "search",
        "Process Query",
        "Analyzing your question for key information",
    ),
    (
        "database-search",
        "Search Documents",
        "Finding relevant information in your documents",
    ),
    (
        "lightbulb",
        "Context Building",
        "Building context from search results",
    ),
    (
        "cpu",
        "Generate Response",
        "Creating an accurate and helpful response",
    ),
    (
        "check-circle",
        "Final Review",
        "Reviewing and polishing the response",
    ),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WorkflowStatus {
    #[default]
    Idle,
    Processing,
    Completed,
    Failed,
    TimedOut,
}

/// Status word reported by the server. `running` and `error` are folded into
/// `Processing` and `Failed` by the decoder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerStatus {
    Idle,
    Processing,
    Completed,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhaseLabel {
    pub name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SubStepStatus {
    #[default]
    Pending,
    Active,
    Completed,
    Error,
}

/// Sub-step as described by the server.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SubStepSpec {
    pub icon: String,
    pub title: String,
    pub description: String,
    /// Explicit status; derived from the current index when absent.
    pub status: Option<SubStepStatus>,
    pub progress: Option<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubStep {
    pub title: String,
    pub description: String,
    pub icon_kind: String,
    pub status: SubStepStatus,
    pub progress: u8,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct WorkflowSnapshot {
    pub phases: Vec<PhaseLabel>,
    /// `None` leaves the phase where it is.
    pub current_phase: Option<usize>,
    pub sub_steps: Vec<SubStepSpec>,
    pub current_sub_step: usize,
    pub sub_step_progress: u8,
}

/// Authoritative status event pushed by the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusUpdate {
    pub request_id: Option<RequestId>,
    pub status: ServerStatus,
    pub progress: u8,
    pub details: String,
    pub workflow: Option<WorkflowSnapshot>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct WorkflowState {
    pub request_id: Option<RequestId>,
    pub status: WorkflowStatus,
    pub phase: usize,
    pub phase_labels: Vec<PhaseLabel>,
    pub sub_steps: Vec<SubStep>,
    pub sub_step_index: usize,
    pub sub_step_progress: u8,
    pub progress: u8,
    pub details: String,
    /// Set by the local entry on submit; cleared by the first server event.
    pub optimistic: bool,
}

impl WorkflowState {
    /// Status line the presenter renders for this state.
    pub fn status_line(&self) -> StatusLine {
        let tone = match self.status {
            WorkflowStatus::Idle => return StatusLine::ready(),
            WorkflowStatus::Processing => Tone::Active,
            WorkflowStatus::Completed => Tone::Success,
            WorkflowStatus::Failed | WorkflowStatus::TimedOut => Tone::Error,
        };
        let label = if self.details.is_empty() {
            match self.status {
                WorkflowStatus::Processing => "processing",
                WorkflowStatus::Completed => "completed",
                WorkflowStatus::TimedOut => "timed out",
                _ => "failed",
            }
            .to_string()
        } else {
            self.details.clone()
        };
        StatusLine {
            label,
            percent: self.progress,
            tone,
        }
    }
}

/// Multi-phase query pipeline driven by authoritative server events.
///
/// Callers must correlate events before handing them in; every method here
/// assumes the event belongs to the request it names.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct WorkflowStateMachine {
    state: WorkflowState,
}

impl WorkflowStateMachine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &WorkflowState {
        &self.state
    }

    pub fn status(&self) -> WorkflowStatus {
        self.state.status
    }

    /// Optimistic `Processing(phase 0)` entry on submit.
    pub fn begin(&mut self, request_id: RequestId, settings: &Settings, effects: &mut Vec<Effect>) {
        self.cancel_timers(effects);
        let phase_labels = DEFAULT_PHASES
            .iter()
            .map(|name| PhaseLabel {
                name: (*name).to_string(),
            })
            .collect();
        let specs: Vec<SubStepSpec> = DEFAULT_SUB_STEPS
            .iter()
            .map(|(icon, title, description)| SubStepSpec {
                icon: (*icon).to_string(),
                title: (*title).to_string(),
                description: (*description).to_string(),
                status: None,
                progress: None,
            })
            .collect();
        self.state = WorkflowState {
            request_id: Some(request_id),
            status: WorkflowStatus::Processing,
            phase: 0,
            phase_labels,
            sub_steps: Vec::new(),
            sub_step_index: 0,
            sub_step_progress: 0,
            progress: 0,
            details: "Sending message...".to_string(),
            optimistic: true,
        };
        self.state.sub_steps = derive_sub_steps(&specs, 0, 0, WorkflowStatus::Processing);
        effects.push(Effect::ScheduleTimer {
            timer: Timer::QueryTimeout { request_id },
            after: settings.query_timeout,
        });
    }

    /// Applies a correlated server status event.
    pub fn apply_status(
        &mut self,
        request_id: RequestId,
        update: StatusUpdate,
        settings: &Settings,
        effects: &mut Vec<Effect>,
    ) {
        if self.state.request_id != Some(request_id) {
            chat_debug!(
                "status for request {} ignored; workflow belongs to {:?}",
                request_id,
                self.state.request_id
            );
            return;
        }
        if update.status != ServerStatus::Idle && self.is_terminal() {
            chat_debug!(
                "{:?} status for request {} after terminal {:?} ignored",
                update.status,
                request_id,
                self.state.status
            );
            return;
        }
        match update.status {
            ServerStatus::Processing => self.apply_processing(update),
            ServerStatus::Completed => {
                let was_optimistic = self.state.optimistic;
                self.apply_snapshot_holding_phase(update.workflow.as_ref(), was_optimistic);
                self.complete(request_id, update.details, settings, effects);
            }
            ServerStatus::Failed => {
                let was_optimistic = self.state.optimistic;
                self.apply_snapshot_holding_phase(update.workflow.as_ref(), was_optimistic);
                self.fail(request_id, update.details, effects);
            }
            ServerStatus::Idle => self.reset(effects),
        }
    }

    /// Moves the workflow to `Completed` and starts the grace window.
    pub fn complete(
        &mut self,
        request_id: RequestId,
        details: String,
        settings: &Settings,
        effects: &mut Vec<Effect>,
    ) {
        if self.state.request_id != Some(request_id) || self.is_terminal() {
            return;
        }
        effects.push(Effect::CancelTimer {
            timer: Timer::QueryTimeout { request_id },
        });
        let state = &mut self.state;
        state.status = WorkflowStatus::Completed;
        state.optimistic = false;
        state.phase = state.phase_labels.len().saturating_sub(1).max(state.phase);
        state.sub_step_index = state.sub_steps.len().saturating_sub(1);
        state.sub_step_progress = 100;
        state.progress = 100;
        if !details.is_empty() {
            state.details = details;
        }
        for step in &mut state.sub_steps {
            step.status = SubStepStatus::Completed;
            step.progress = 100;
        }
        effects.push(Effect::ScheduleTimer {
            timer: Timer::CompletionGrace { request_id },
            after: settings.completion_grace,
        });
    }

    /// Moves the workflow to `Failed`; it stays there until the next submit.
    pub fn fail(&mut self, request_id: RequestId, details: String, effects: &mut Vec<Effect>) {
        if self.state.request_id != Some(request_id) || self.is_terminal() {
            return;
        }
        effects.push(Effect::CancelTimer {
            timer: Timer::QueryTimeout { request_id },
        });
        self.state.status = WorkflowStatus::Failed;
        self.state.optimistic = false;
        self.state.progress = 100;
        self.state.details = if details.is_empty() {
            "Error processing message".to_string()
        } else {
            details
        };
        self.mark_active_step(SubStepStatus::Error);
    }

    /// Returns `true` when the grace window ended and the state reset to idle.
    pub fn on_grace_elapsed(&mut self, request_id: RequestId) -> bool {
        if self.state.status != WorkflowStatus::Completed
            || self.state.request_id != Some(request_id)
        {
            return false;
        }
        self.state = WorkflowState::default();
        true
    }

    /// Returns `true` when the request was still processing and is now timed out.
    pub fn on_query_timeout(&mut self, request_id: RequestId) -> bool {
        if self.state.status != WorkflowStatus::Processing
            || self.state.request_id != Some(request_id)
        {
            return false;
        }
        chat_warn!("request {} timed out without a terminal status", request_id);
        self.state.status = WorkflowStatus::TimedOut;
        self.state.optimistic = false;
        self.state.details = "The assistant did not respond in time.".to_string();
        self.mark_active_step(SubStepStatus::Error);
        true
    }

    pub fn reset(&mut self, effects: &mut Vec<Effect>) {
        self.cancel_timers(effects);
        self.state = WorkflowState::default();
    }

    fn is_terminal(&self) -> bool {
        matches!(
            self.state.status,
            WorkflowStatus::Completed | WorkflowStatus::Failed | WorkflowStatus::TimedOut
        )
    }

    fn apply_processing(&mut self, update: StatusUpdate) {
        if self.is_terminal() {
            chat_debug!("processing event after terminal state ignored");
            return;
        }
        let was_optimistic = self.state.optimistic;
        self.state.status = WorkflowStatus::Processing;
        self.state.optimistic = false;
        self.state.progress = update.progress.min(100);
        if !update.details.is_empty() {
            self.state.details = update.details;
        }
        self.apply_snapshot_holding_phase(update.workflow.as_ref(), was_optimistic);
    }

    /// Applies a snapshot but never moves the phase backwards, except away
    /// from the optimistic entry.
    fn apply_snapshot_holding_phase(
        &mut self,
        snapshot: Option<&WorkflowSnapshot>,
        was_optimistic: bool,
    ) {
        let Some(snapshot) = snapshot else {
            return;
        };
        let regressed = snapshot
            .current_phase
            .filter(|phase| !was_optimistic && *phase < self.state.phase);
        if let Some(reported) = regressed {
            chat_warn!(
                "phase regression for request {:?}: {} -> {} (holding {})",
                self.state.request_id,
                self.state.phase,
                reported,
                self.state.phase
            );
            let held = self.state.phase;
            self.apply_snapshot(Some(snapshot));
            self.state.phase = held;
        } else {
            self.apply_snapshot(Some(snapshot));
        }
    }

    fn apply_snapshot(&mut self, snapshot: Option<&WorkflowSnapshot>) {
        let Some(snapshot) = snapshot else {
            return;
        };
        if !snapshot.phases.is_empty() {
            self.state.phase_labels = snapshot.phases.clone();
        }
        let last_phase = self.state.phase_labels.len().saturating_sub(1);
        let phase = snapshot.current_phase.unwrap_or(self.state.phase);
        self.state.phase = phase.min(last_phase);
        if !snapshot.sub_steps.is_empty() {
            let last_step = snapshot.sub_steps.len() - 1;
            self.state.sub_step_index = snapshot.current_sub_step.min(last_step);
            self.state.sub_step_progress = snapshot.sub_step_progress.min(100);
            self.state.sub_steps = derive_sub_steps(
                &snapshot.sub_steps,
                self.state.sub_step_index,
                self.state.sub_step_progress,
                self.state.status,
            );
        }
    }

    fn mark_active_step(&mut self, status: SubStepStatus) {
        let index = self.state.sub_step_index;
        if let Some(step) = self.state.sub_steps.get_mut(index) {
            step.status = status;
        }
    }

    fn cancel_timers(&mut self, effects: &mut Vec<Effect>) {
        let Some(request_id) = self.state.request_id else {
            return;
        };
        match self.state.status {
            WorkflowStatus::Processing => effects.push(Effect::CancelTimer {
                timer: Timer::QueryTimeout { request_id },
            }),
            WorkflowStatus::Completed => effects.push(Effect::CancelTimer {
                timer: Timer::CompletionGrace { request_id },
            }),
            _ => {}
        }
    }
}

fn derive_sub_steps(
    specs: &[SubStepSpec],
    current: usize,
    current_progress: u8,
    status: WorkflowStatus,
) -> Vec<SubStep> {
    specs
        .iter()
        .enumerate()
        .map(|(index, spec)| {
            let derived = if index < current {
                SubStepStatus::Completed
            } else if index == current {
                match status {
                    WorkflowStatus::Completed => SubStepStatus::Completed,
                    WorkflowStatus::Failed | WorkflowStatus::TimedOut => SubStepStatus::Error,
                    _ => SubStepStatus::Active,
                }
            } else {
                SubStepStatus::Pending
            };
            let status = spec.status.unwrap_or(derived);
            let progress = spec.progress.unwrap_or(match status {
                SubStepStatus::Completed => 100,
                SubStepStatus::Active => current_progress,
                _ => 0,
            });
            SubStep {
                title: spec.title.clone(),
                description: spec.description.clone(),
                icon_kind: spec.icon.clone(),
                status,
                progress: progress.min(100),
            }
        })
        .collect()
}
