//! Ragchat core: pure session and workflow synchronization state machine.
//!
//! Nothing in this crate performs IO or reads a clock. Inputs arrive as
//! [`Msg`] values, [`update`] applies them to the owned [`AppState`], and any
//! work for the outside world is returned as [`Effect`] values.
mod connection;
mod correlator;
mod effect;
mod msg;
mod presenter;
mod session;
mod settings;
mod state;
mod timer;
mod update;
mod upload;
mod view_model;
mod workflow;

pub use connection::{ConnectionState, ConnectionSupervisor, TransportEvent};
pub use correlator::{Disposition, PendingRequest, RequestCorrelator, RequestId, RequestKind};
pub use effect::{Effect, OutgoingMessage};
pub use msg::{ChatResponse, FileEntry, Msg};
pub use presenter::{ProgressPresenter, StatusLine, Tone, UploadBanner, Visibility};
pub use session::Session;
pub use settings::Settings;
pub use state::{AppState, ChatEntry, ChatRole};
pub use timer::Timer;
pub use update::update;
pub use upload::{
    displayed_progress, validate_upload, JobId, UploadFile, UploadJob, UploadNotice,
    UploadOrchestrator, UploadOutcome, UploadPolicy, UploadRejection, MAX_UPLOAD_BYTES,
};
pub use view_model::{
    format_file_size, AppViewModel, PhaseView, PhaseViewState, ProgressPanelView, UploadRowView,
};
pub use workflow::{
    PhaseLabel, ServerStatus, StatusUpdate, SubStep, SubStepSpec, SubStepStatus, WorkflowSnapshot,
    WorkflowState, WorkflowStateMachine, WorkflowStatus,
};
