use std::collections::VecDeque;
use std::path::PathBuf;
use std::time::Duration;

use ragchat_logging::{chat_debug, chat_info, chat_warn};
use thiserror::Error;

use crate::{Effect, Timer};

pub type JobId = u64;

/// 16 MiB, inclusive.
pub const MAX_UPLOAD_BYTES: u64 = 16 * 1024 * 1024;

const DEFAULT_EXTENSIONS: [&str; 15] = [
    "pdf", "docx", "txt", "md", "csv", "jpg", "jpeg", "png", "gif", "bmp", "mp3", "wav", "mp4",
    "avi", "mov",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadPolicy {
    /// Lower-case extensions without the leading dot.
    pub allowed_extensions: Vec<String>,
    pub max_bytes: u64,
    pub ramp_step: u8,
    pub ramp_interval: Duration,
    /// Highest value the simulated ramp may reach.
    pub ramp_cap: u8,
}

impl Default for UploadPolicy {
    fn default() -> Self {
        Self {
            allowed_extensions: DEFAULT_EXTENSIONS.iter().map(|e| (*e).to_string()).collect(),
            max_bytes: MAX_UPLOAD_BYTES,
            ramp_step: 5,
            ramp_interval: Duration::from_millis(200),
            ramp_cap: 95,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UploadRejection {
    #[error("File type not supported: {filename}")]
    UnsupportedExtension { filename: String },
    #[error("File too large: {filename} (max {} MB)", max_bytes / (1024 * 1024))]
    TooLarge {
        filename: String,
        size: u64,
        max_bytes: u64,
    },
}

/// Pure check of `(filename, size)` against the policy.
pub fn validate_upload(
    filename: &str,
    size: u64,
    policy: &UploadPolicy,
) -> Result<(), UploadRejection> {
    let extension = filename
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();
    if extension.is_empty()
        || !policy
            .allowed_extensions
            .iter()
            .any(|allowed| allowed.eq_ignore_ascii_case(&extension))
    {
        return Err(UploadRejection::UnsupportedExtension {
            filename: filename.to_string(),
        });
    }
    if size > policy.max_bytes {
        return Err(UploadRejection::TooLarge {
            filename: filename.to_string(),
            size,
            max_bytes: policy.max_bytes,
        });
    }
    Ok(())
}

/// Merges the cosmetic ramp with the authoritative value; the latter wins.
pub fn displayed_progress(simulated: u8, real: Option<u8>) -> u8 {
    real.unwrap_or(simulated).min(100)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadFile {
    pub name: String,
    pub size: u64,
    pub path: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadOutcome {
    Pending,
    Success,
    Failure(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadJob {
    pub job_id: JobId,
    pub file: UploadFile,
    pub simulated_progress: u8,
    /// `None` until the request resolves, then 100.
    pub real_progress: Option<u8>,
    pub outcome: UploadOutcome,
}

impl UploadJob {
    fn new(job_id: JobId, file: UploadFile) -> Self {
        Self {
            job_id,
            file,
            simulated_progress: 0,
            real_progress: None,
            outcome: UploadOutcome::Pending,
        }
    }

    pub fn displayed_progress(&self) -> u8 {
        displayed_progress(self.simulated_progress, self.real_progress)
    }
}

/// What happened to the batch, for the caller to surface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadNotice {
    Rejected {
        job_id: JobId,
        reason: UploadRejection,
    },
    Started {
        job_id: JobId,
        filename: String,
    },
    Progress {
        job_id: JobId,
        percent: u8,
    },
    Succeeded {
        job_id: JobId,
        filename: String,
    },
    Failed {
        job_id: JobId,
        filename: String,
        error: String,
    },
    BatchFinished {
        transmitted: usize,
    },
}

/// Sequential upload queue: at most one job is ever in flight.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct UploadOrchestrator {
    next_job_id: JobId,
    queue: VecDeque<UploadJob>,
    in_flight: Option<UploadJob>,
    finished: Vec<UploadJob>,
    batch_open: bool,
    transmitted: usize,
}

impl UploadOrchestrator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn in_flight(&self) -> Option<&UploadJob> {
        self.in_flight.as_ref()
    }

    pub fn is_busy(&self) -> bool {
        self.in_flight.is_some() || !self.queue.is_empty()
    }

    /// Jobs of the current (or most recent) batch in submission order.
    pub fn jobs(&self) -> Vec<&UploadJob> {
        let mut jobs: Vec<&UploadJob> = self
            .finished
            .iter()
            .chain(self.in_flight.iter())
            .chain(self.queue.iter())
            .collect();
        jobs.sort_by_key(|job| job.job_id);
        jobs
    }

    /// Validates and queues files. Requests during an active batch join it.
    pub fn enqueue(
        &mut self,
        files: Vec<UploadFile>,
        policy: &UploadPolicy,
        effects: &mut Vec<Effect>,
    ) -> Vec<UploadNotice> {
        if !self.batch_open {
            self.finished.clear();
            self.transmitted = 0;
        }
        self.batch_open = true;

        let mut notices = Vec::new();
        for file in files {
            self.next_job_id += 1;
            let mut job = UploadJob::new(self.next_job_id, file);
            match validate_upload(&job.file.name, job.file.size, policy) {
                Ok(()) => self.queue.push_back(job),
                Err(reason) => {
                    chat_info!("upload rejected before transmission: {}", reason);
                    job.outcome = UploadOutcome::Failure(reason.to_string());
                    notices.push(UploadNotice::Rejected {
                        job_id: job.job_id,
                        reason,
                    });
                    self.finished.push(job);
                }
            }
        }
        self.pump(policy, effects, &mut notices);
        notices
    }

    /// Advances the cosmetic ramp of the in-flight job.
    pub fn on_ramp_tick(
        &mut self,
        job_id: JobId,
        policy: &UploadPolicy,
        effects: &mut Vec<Effect>,
    ) -> Option<UploadNotice> {
        let job = match self.in_flight.as_mut() {
            Some(job) if job.job_id == job_id && job.real_progress.is_none() => job,
            _ => {
                chat_debug!("ramp tick for inactive upload job {}", job_id);
                return None;
            }
        };
        let cap = policy.ramp_cap.min(99);
        job.simulated_progress = job
            .simulated_progress
            .saturating_add(policy.ramp_step)
            .min(cap);
        if job.simulated_progress < cap && policy.ramp_step > 0 {
            effects.push(Effect::ScheduleTimer {
                timer: Timer::UploadRamp { job_id },
                after: policy.ramp_interval,
            });
        }
        Some(UploadNotice::Progress {
            job_id,
            percent: job.displayed_progress(),
        })
    }

    /// Applies the authoritative outcome of the in-flight job, then starts the next.
    pub fn on_finished(
        &mut self,
        job_id: JobId,
        result: Result<(), String>,
        policy: &UploadPolicy,
        effects: &mut Vec<Effect>,
    ) -> Vec<UploadNotice> {
        let mut job = match self.in_flight.take() {
            Some(job) if job.job_id == job_id => job,
            other => {
                chat_warn!("completion for upload job {} which is not in flight", job_id);
                self.in_flight = other;
                return Vec::new();
            }
        };
        effects.push(Effect::CancelTimer {
            timer: Timer::UploadRamp { job_id },
        });
        job.real_progress = Some(100);

        let mut notices = vec![UploadNotice::Progress {
            job_id,
            percent: job.displayed_progress(),
        }];
        match result {
            Ok(()) => {
                job.outcome = UploadOutcome::Success;
                notices.push(UploadNotice::Succeeded {
                    job_id,
                    filename: job.file.name.clone(),
                });
            }
            Err(error) => {
                chat_warn!("upload of {} failed: {}", job.file.name, error);
                job.outcome = UploadOutcome::Failure(error.clone());
                notices.push(UploadNotice::Failed {
                    job_id,
                    filename: job.file.name.clone(),
                    error,
                });
            }
        }
        self.finished.push(job);
        self.pump(policy, effects, &mut notices);
        notices
    }

    fn pump(
        &mut self,
        policy: &UploadPolicy,
        effects: &mut Vec<Effect>,
        notices: &mut Vec<UploadNotice>,
    ) {
        if self.in_flight.is_some() {
            return;
        }
        if let Some(job) = self.queue.pop_front() {
            self.transmitted += 1;
            effects.push(Effect::Upload {
                job_id: job.job_id,
                file: job.file.clone(),
            });
            effects.push(Effect::ScheduleTimer {
                timer: Timer::UploadRamp { job_id: job.job_id },
                after: policy.ramp_interval,
            });
            notices.push(UploadNotice::Started {
                job_id: job.job_id,
                filename: job.file.name.clone(),
            });
            self.in_flight = Some(job);
            return;
        }
        if self.batch_open {
            self.batch_open = false;
            if self.transmitted > 0 {
                effects.push(Effect::ListFiles);
            }
            notices.push(UploadNotice::BatchFinished {
                transmitted: self.transmitted,
            });
        }
    }
}
