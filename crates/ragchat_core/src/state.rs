use crate::view_model::AppViewModel;
use crate::{
    ConnectionSupervisor, FileEntry, ProgressPresenter, RequestCorrelator, Session, Settings,
    UploadOrchestrator, WorkflowStateMachine,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatRole {
    User,
    Assistant,
    System,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatEntry {
    pub role: ChatRole,
    pub text: String,
    pub sources: Vec<String>,
    pub error: bool,
}

impl ChatEntry {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            text: text.into(),
            sources: Vec::new(),
            error: false,
        }
    }

    pub fn system(text: impl Into<String>, error: bool) -> Self {
        Self {
            role: ChatRole::System,
            text: text.into(),
            sources: Vec::new(),
            error,
        }
    }
}

/// The owned context every component works on. One per client process.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AppState {
    pub(crate) session: Session,
    pub(crate) settings: Settings,
    pub(crate) connection: ConnectionSupervisor,
    pub(crate) correlator: RequestCorrelator,
    pub(crate) workflow: WorkflowStateMachine,
    pub(crate) presenter: ProgressPresenter,
    pub(crate) uploads: UploadOrchestrator,
    pub(crate) transcript: Vec<ChatEntry>,
    pub(crate) files: Vec<FileEntry>,
    pub(crate) files_note: Option<String>,
    dirty: bool,
}

impl AppState {
    pub fn new(session: Session, settings: Settings) -> Self {
        Self {
            session,
            settings,
            ..Self::default()
        }
    }

    pub fn view(&self) -> AppViewModel {
        AppViewModel::from_state(self, self.dirty)
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn connection(&self) -> &ConnectionSupervisor {
        &self.connection
    }

    pub fn correlator(&self) -> &RequestCorrelator {
        &self.correlator
    }

    pub fn workflow(&self) -> &WorkflowStateMachine {
        &self.workflow
    }

    pub fn presenter(&self) -> &ProgressPresenter {
        &self.presenter
    }

    pub fn uploads(&self) -> &UploadOrchestrator {
        &self.uploads
    }

    pub fn transcript(&self) -> &[ChatEntry] {
        &self.transcript
    }

    pub fn files(&self) -> &[FileEntry] {
        &self.files
    }

    /// Returns whether anything visible changed since the last call, and clears the flag.
    pub fn consume_dirty(&mut self) -> bool {
        std::mem::take(&mut self.dirty)
    }

    pub(crate) fn mark_dirty(&mut self) {
        self.dirty = true;
    }
}
