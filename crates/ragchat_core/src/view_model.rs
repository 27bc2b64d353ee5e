use crate::{
    AppState, ChatEntry, ConnectionState, FileEntry, JobId, SubStep, Tone, UploadBanner,
    UploadOutcome, Visibility, WorkflowStatus,
};

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AppViewModel {
    pub session_id: String,
    pub connection: ConnectionState,
    pub advisory: Option<String>,
    pub transcript: Vec<ChatEntry>,
    pub progress: ProgressPanelView,
    pub workflow_status: WorkflowStatus,
    pub phases: Vec<PhaseView>,
    pub sub_steps: Vec<SubStep>,
    pub upload_banner: Option<UploadBanner>,
    pub uploads: Vec<UploadRowView>,
    pub files: Vec<FileEntry>,
    pub files_note: Option<String>,
    pub document_count: usize,
    pub dirty: bool,
}

/// Content of the progress panel; identical for every surface.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ProgressPanelView {
    pub label: String,
    pub percent: u8,
    pub tone: Tone,
    pub visibility: Visibility,
    pub minimized: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhaseViewState {
    Completed,
    Active,
    Pending,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhaseView {
    pub name: String,
    pub state: PhaseViewState,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadRowView {
    pub job_id: JobId,
    pub filename: String,
    pub percent: u8,
    pub outcome: UploadOutcome,
}

impl AppViewModel {
    pub(crate) fn from_state(state: &AppState, dirty: bool) -> Self {
        let workflow = state.workflow.state();
        let status = state.presenter.status();
        let phases = workflow
            .phase_labels
            .iter()
            .enumerate()
            .map(|(index, label)| PhaseView {
                name: label.name.clone(),
                state: if index < workflow.phase
                    || (index == workflow.phase && workflow.status == WorkflowStatus::Completed)
                {
                    PhaseViewState::Completed
                } else if index == workflow.phase {
                    PhaseViewState::Active
                } else {
                    PhaseViewState::Pending
                },
            })
            .collect();

        Self {
            session_id: state.session.session_id().to_string(),
            connection: state.connection.state(),
            advisory: state.connection.advisory().map(ToOwned::to_owned),
            transcript: state.transcript.clone(),
            progress: ProgressPanelView {
                label: status.label.clone(),
                percent: status.percent,
                tone: status.tone,
                visibility: state.presenter.visibility(),
                minimized: state.presenter.is_minimized(),
            },
            workflow_status: workflow.status,
            phases,
            sub_steps: workflow.sub_steps.clone(),
            upload_banner: state.presenter.banner().cloned(),
            uploads: state
                .uploads
                .jobs()
                .into_iter()
                .map(|job| UploadRowView {
                    job_id: job.job_id,
                    filename: job.file.name.clone(),
                    percent: job.displayed_progress(),
                    outcome: job.outcome.clone(),
                })
                .collect(),
            files: state.files.clone(),
            files_note: state.files_note.clone(),
            document_count: state.files.len(),
            dirty,
        }
    }
}

/// Human-readable size with one decimal, e.g. `1.5 MB`.
pub fn format_file_size(bytes: u64) -> String {
    if bytes == 0 {
        return "Unknown size".to_string();
    }
    const UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];
    let mut size = bytes as f64;
    let mut unit = 0;
    while size >= 1024.0 && unit < UNITS.len() - 1 {
        size /= 1024.0;
        unit += 1;
    }
    format!("{size:.1} {}", UNITS[unit])
}
