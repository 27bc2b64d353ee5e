use ragchat_core::{
    format_file_size, AppViewModel, ChatEntry, ChatRole, ConnectionState, PhaseViewState,
    SubStep, SubStepStatus, Tone, UploadOutcome, Visibility,
};

use super::surfaces::SurfaceKind;

/// Screen regions, in the order they are printed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Section {
    Connection,
    Transcript,
    Progress,
    Workflow,
    Uploads,
    Files,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Frame {
    pub sections: Vec<(Section, Vec<String>)>,
}

impl Frame {
    pub fn lines(&self, section: Section) -> &[String] {
        self.sections
            .iter()
            .find(|(candidate, _)| *candidate == section)
            .map(|(_, lines)| lines.as_slice())
            .unwrap_or(&[])
    }
}

#[derive(Debug, Clone, Copy)]
struct Layout {
    bar_width: usize,
    inline_details: bool,
}

impl Layout {
    fn for_kind(kind: SurfaceKind) -> Self {
        match kind {
            SurfaceKind::Desktop => Self {
                bar_width: 40,
                inline_details: true,
            },
            SurfaceKind::Mobile => Self {
                bar_width: 16,
                inline_details: false,
            },
        }
    }
}

/// Lays the view out for one kind of surface. Every kind gets the same text.
pub fn render(view: &AppViewModel, kind: SurfaceKind) -> Frame {
    let layout = Layout::for_kind(kind);
    Frame {
        sections: vec![
            (Section::Connection, connection_lines(view, layout)),
            (Section::Transcript, transcript_lines(&view.transcript)),
            (Section::Progress, progress_lines(view, layout)),
            (Section::Workflow, workflow_lines(view, layout)),
            (Section::Uploads, upload_lines(view, layout)),
            (Section::Files, file_lines(view, layout)),
        ],
    }
}

fn connection_lines(view: &AppViewModel, layout: Layout) -> Vec<String> {
    let marker = match view.connection {
        ConnectionState::Connected => "*",
        ConnectionState::Connecting | ConnectionState::Reconnecting => "~",
        ConnectionState::Disconnected | ConnectionState::Errored => "x",
    };
    let documents = format!("{} documents", view.document_count);
    let mut lines = if layout.inline_details {
        vec![format!(
            "[{marker}] {} | {} | {documents}",
            view.connection.label(),
            view.session_id
        )]
    } else {
        vec![
            format!("[{marker}] {}", view.connection.label()),
            format!("    {} | {documents}", view.session_id),
        ]
    };
    if let Some(advisory) = &view.advisory {
        lines.push(format!("  ! {advisory}"));
    }
    lines
}

pub fn transcript_lines(entries: &[ChatEntry]) -> Vec<String> {
    entries.iter().flat_map(entry_lines).collect()
}

pub fn entry_lines(entry: &ChatEntry) -> Vec<String> {
    let who = match (entry.role, entry.error) {
        (ChatRole::User, _) => "you",
        (ChatRole::Assistant, false) => "assistant",
        (ChatRole::Assistant, true) => "assistant (error)",
        (ChatRole::System, false) => "system",
        (ChatRole::System, true) => "system (error)",
    };
    let mut lines = vec![format!("{who}: {}", entry.text)];
    if !entry.sources.is_empty() {
        lines.push(format!("    sources: {}", entry.sources.join(", ")));
    }
    lines
}

fn progress_lines(view: &AppViewModel, layout: Layout) -> Vec<String> {
    let progress = &view.progress;
    if progress.visibility == Visibility::Hidden {
        return vec![format!("status: {}", progress.label)];
    }
    let suffix = if progress.visibility == Visibility::Fading {
        " (fading)"
    } else {
        ""
    };
    if progress.minimized {
        return vec![format!(
            "status [-]: {} {}%{suffix}",
            progress.label, progress.percent
        )];
    }
    let bar = progress_bar(progress.percent, layout.bar_width);
    let tone = tone_label(progress.tone);
    if layout.inline_details {
        vec![format!(
            "status {tone}: {bar} {:>3}% {}{suffix}",
            progress.percent, progress.label
        )]
    } else {
        vec![
            format!("status {tone}: {}{suffix}", progress.label),
            format!("  {bar} {:>3}%", progress.percent),
        ]
    }
}

fn workflow_lines(view: &AppViewModel, layout: Layout) -> Vec<String> {
    if view.progress.visibility == Visibility::Hidden
        || view.progress.minimized
        || view.phases.is_empty()
    {
        return Vec::new();
    }
    let phases: Vec<String> = view
        .phases
        .iter()
        .map(|phase| {
            let marker = match phase.state {
                PhaseViewState::Completed => "x",
                PhaseViewState::Active => ">",
                PhaseViewState::Pending => " ",
            };
            format!("[{marker}] {}", phase.name)
        })
        .collect();
    let mut lines = if layout.inline_details {
        vec![format!("  {}", phases.join(" - "))]
    } else {
        phases.iter().map(|phase| format!("  {phase}")).collect()
    };
    lines.extend(
        view.sub_steps
            .iter()
            .flat_map(|step| sub_step_lines(step, layout)),
    );
    lines
}

fn sub_step_lines(step: &SubStep, layout: Layout) -> Vec<String> {
    let marker = match step.status {
        SubStepStatus::Pending => " ",
        SubStepStatus::Active => ">",
        SubStepStatus::Completed => "x",
        SubStepStatus::Error => "!",
    };
    let progress = if step.status == SubStepStatus::Active {
        format!(" {}%", step.progress)
    } else {
        String::new()
    };
    let head = format!("    ({marker}) {} [{}]{progress}", step.title, step.icon_kind);
    match (layout.inline_details, step.description.is_empty()) {
        (_, true) => vec![head],
        (true, false) => vec![format!("{head} - {}", step.description)],
        (false, false) => vec![head, format!("        {}", step.description)],
    }
}

fn upload_lines(view: &AppViewModel, layout: Layout) -> Vec<String> {
    let mut lines = Vec::new();
    if let Some(banner) = &view.upload_banner {
        let percent = banner
            .percent
            .map(|percent| format!(" {}", progress_bar(percent, layout.bar_width / 2)))
            .unwrap_or_default();
        lines.push(format!(
            "upload {}: {}{percent}",
            tone_label(banner.tone),
            banner.message
        ));
    }
    for row in &view.uploads {
        let outcome = match &row.outcome {
            UploadOutcome::Pending => format!("{}%", row.percent),
            UploadOutcome::Success => "done".to_string(),
            UploadOutcome::Failure(reason) => format!("failed: {reason}"),
        };
        lines.push(format!("  #{} {} {outcome}", row.job_id, row.filename));
    }
    lines
}

fn file_lines(view: &AppViewModel, layout: Layout) -> Vec<String> {
    let mut lines = vec![format!("documents ({})", view.document_count)];
    if let Some(note) = &view.files_note {
        lines.push(format!("  ! {note}"));
    }
    for file in &view.files {
        let size = format_file_size(file.size);
        if layout.inline_details && !file.modified.is_empty() {
            lines.push(format!("  {} ({size}, {})", file.name, file.modified));
        } else {
            lines.push(format!("  {} ({size})", file.name));
        }
    }
    lines
}

fn tone_label(tone: Tone) -> &'static str {
    match tone {
        Tone::Neutral => "idle",
        Tone::Active => "working",
        Tone::Success => "done",
        Tone::Error => "error",
    }
}

pub fn progress_bar(percent: u8, width: usize) -> String {
    let filled = usize::from(percent.min(100)) * width / 100;
    format!("[{}{}]", "#".repeat(filled), "-".repeat(width - filled))
}
