use ragchat_logging::chat_debug;

use crate::{Effect, Settings, Timer};

/// Visual tone shared by every rendering surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Tone {
    #[default]
    Neutral,
    Active,
    Success,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusLine {
    pub label: String,
    pub percent: u8,
    pub tone: Tone,
}

impl StatusLine {
    pub fn ready() -> Self {
        Self {
            label: "Ready".to_string(),
            percent: 0,
            tone: Tone::Neutral,
        }
    }
}

impl Default for StatusLine {
    fn default() -> Self {
        Self::ready()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Visibility {
    #[default]
    Hidden,
    Visible,
    Fading,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum HideStage {
    Hold,
    Fade,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct PendingHide {
    generation: u64,
    stage: HideStage,
}

/// Per-file upload message shown under the upload controls.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadBanner {
    pub message: String,
    pub percent: Option<u8>,
    pub tone: Tone,
}

/// Canonical presentation state consumed by every surface.
///
/// At most one hide sequence is pending at a time; any tone change cancels
/// it, and repeated completions while it is pending leave it untouched.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ProgressPresenter {
    status: StatusLine,
    visibility: Visibility,
    minimized: bool,
    pending_hide: Option<PendingHide>,
    hide_generation: u64,
    banner: Option<UploadBanner>,
    banner_generation: u64,
    banner_clear_pending: bool,
}

impl ProgressPresenter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn status(&self) -> &StatusLine {
        &self.status
    }

    pub fn visibility(&self) -> Visibility {
        self.visibility
    }

    pub fn is_minimized(&self) -> bool {
        self.minimized
    }

    pub fn banner(&self) -> Option<&UploadBanner> {
        self.banner.as_ref()
    }

    pub fn has_pending_hide(&self) -> bool {
        self.pending_hide.is_some()
    }

    /// Presents a status line. Returns `false` when nothing changed.
    pub fn present(
        &mut self,
        line: StatusLine,
        settings: &Settings,
        effects: &mut Vec<Effect>,
    ) -> bool {
        let transition = line.tone != self.status.tone;
        if !transition && line == self.status {
            return false;
        }
        if transition {
            self.cancel_hide(effects);
        }
        let tone = line.tone;
        self.status = line;
        match tone {
            Tone::Neutral => {
                self.visibility = Visibility::Hidden;
            }
            Tone::Active | Tone::Error => {
                self.visibility = Visibility::Visible;
            }
            Tone::Success => {
                if transition || self.pending_hide.is_none() {
                    self.visibility = Visibility::Visible;
                    self.schedule_hide(settings, effects);
                }
            }
        }
        true
    }

    pub fn toggle_minimized(&mut self) {
        self.minimized = !self.minimized;
    }

    pub fn on_hide_hold(
        &mut self,
        generation: u64,
        settings: &Settings,
        effects: &mut Vec<Effect>,
    ) -> bool {
        let expected = Some(PendingHide {
            generation,
            stage: HideStage::Hold,
        });
        if self.pending_hide != expected {
            chat_debug!("stale hide-hold timer generation={}", generation);
            return false;
        }
        self.visibility = Visibility::Fading;
        self.pending_hide = Some(PendingHide {
            generation,
            stage: HideStage::Fade,
        });
        effects.push(Effect::ScheduleTimer {
            timer: Timer::HideFade { generation },
            after: settings.hide_fade,
        });
        true
    }

    pub fn on_hide_fade(&mut self, generation: u64) -> bool {
        let expected = Some(PendingHide {
            generation,
            stage: HideStage::Fade,
        });
        if self.pending_hide != expected {
            chat_debug!("stale hide-fade timer generation={}", generation);
            return false;
        }
        self.pending_hide = None;
        self.visibility = Visibility::Hidden;
        self.status = StatusLine::ready();
        true
    }

    /// Drops any pending hide and returns to the hidden "Ready" line.
    pub fn reset(&mut self, effects: &mut Vec<Effect>) {
        self.cancel_hide(effects);
        self.status = StatusLine::ready();
        self.visibility = Visibility::Hidden;
    }

    /// Replaces the upload banner. Success banners clear themselves.
    pub fn show_banner(
        &mut self,
        banner: UploadBanner,
        settings: &Settings,
        effects: &mut Vec<Effect>,
    ) {
        self.cancel_banner_clear(effects);
        if banner.tone == Tone::Success {
            self.banner_generation += 1;
            self.banner_clear_pending = true;
            effects.push(Effect::ScheduleTimer {
                timer: Timer::UploadStatusClear {
                    generation: self.banner_generation,
                },
                after: settings.upload_status_clear,
            });
        }
        self.banner = Some(banner);
    }

    /// Updates the banner percentage in place without touching its timer.
    pub fn set_banner_percent(&mut self, percent: u8) -> bool {
        match self.banner.as_mut() {
            Some(banner) if banner.percent != Some(percent) => {
                banner.percent = Some(percent);
                true
            }
            _ => false,
        }
    }

    pub fn dismiss_banner(&mut self, effects: &mut Vec<Effect>) -> bool {
        self.cancel_banner_clear(effects);
        self.banner.take().is_some()
    }

    pub fn on_banner_clear(&mut self, generation: u64) -> bool {
        if !self.banner_clear_pending || generation != self.banner_generation {
            return false;
        }
        self.banner_clear_pending = false;
        self.banner = None;
        true
    }

    fn schedule_hide(&mut self, settings: &Settings, effects: &mut Vec<Effect>) {
        self.hide_generation += 1;
        let generation = self.hide_generation;
        self.pending_hide = Some(PendingHide {
            generation,
            stage: HideStage::Hold,
        });
        effects.push(Effect::ScheduleTimer {
            timer: Timer::HideHold { generation },
            after: settings.hide_hold,
        });
    }

    fn cancel_hide(&mut self, effects: &mut Vec<Effect>) {
        if let Some(pending) = self.pending_hide.take() {
            let timer = match pending.stage {
                HideStage::Hold => Timer::HideHold {
                    generation: pending.generation,
                },
                HideStage::Fade => Timer::HideFade {
                    generation: pending.generation,
                },
            };
            effects.push(Effect::CancelTimer { timer });
        }
    }

    fn cancel_banner_clear(&mut self, effects: &mut Vec<Effect>) {
        if self.banner_clear_pending {
            self.banner_clear_pending = false;
            effects.push(Effect::CancelTimer {
                timer: Timer::UploadStatusClear {
                    generation: self.banner_generation,
                },
            });
        }
    }
}
