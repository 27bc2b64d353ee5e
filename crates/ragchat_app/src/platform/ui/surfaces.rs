use std::io::{self, Write};

use ragchat_core::AppViewModel;
use ragchat_logging::chat_warn;
use serde::{Deserialize, Serialize};

use super::render::{entry_lines, render, Frame, Section};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SurfaceKind {
    Desktop,
    Mobile,
}

/// Anything that can show the canonical view model.
pub trait RenderSurface {
    fn kind(&self) -> SurfaceKind;
    fn publish(&mut self, view: &AppViewModel) -> io::Result<()>;
}

/// Fans one published view out to every attached surface.
#[derive(Default)]
pub struct SurfaceHub {
    surfaces: Vec<Box<dyn RenderSurface>>,
}

impl SurfaceHub {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn attach(&mut self, surface: Box<dyn RenderSurface>) {
        self.surfaces.push(surface);
    }

    pub fn surface_count(&self) -> usize {
        self.surfaces.len()
    }

    pub fn publish(&mut self, view: &AppViewModel) {
        for surface in &mut self.surfaces {
            if let Err(err) = surface.publish(view) {
                chat_warn!("{:?} surface failed to render: {}", surface.kind(), err);
            }
        }
    }
}

/// Text panel that prints a section only when its lines changed.
/// New transcript entries are appended; a shorter transcript means the chat
/// was cleared.
pub struct TextPanel<W: Write> {
    kind: SurfaceKind,
    out: W,
    last: Frame,
    entries_shown: usize,
}

impl<W: Write> TextPanel<W> {
    pub fn new(kind: SurfaceKind, out: W) -> Self {
        Self {
            kind,
            out,
            last: Frame::default(),
            entries_shown: 0,
        }
    }

    fn write_transcript(&mut self, view: &AppViewModel) -> io::Result<()> {
        if view.transcript.len() < self.entries_shown {
            writeln!(self.out, "-- chat cleared --")?;
            self.entries_shown = 0;
        }
        for entry in &view.transcript[self.entries_shown..] {
            for line in entry_lines(entry) {
                writeln!(self.out, "{line}")?;
            }
        }
        self.entries_shown = view.transcript.len();
        Ok(())
    }
}

impl<W: Write> RenderSurface for TextPanel<W> {
    fn kind(&self) -> SurfaceKind {
        self.kind
    }

    fn publish(&mut self, view: &AppViewModel) -> io::Result<()> {
        let frame = render(view, self.kind);
        for (section, lines) in &frame.sections {
            if *section == Section::Transcript {
                self.write_transcript(view)?;
                continue;
            }
            if self.last.lines(*section) == lines.as_slice() {
                continue;
            }
            for line in lines {
                writeln!(self.out, "{line}")?;
            }
        }
        self.out.flush()?;
        self.last = frame;
        Ok(())
    }
}

pub fn desktop_panel<W: Write>(out: W) -> TextPanel<W> {
    TextPanel::new(SurfaceKind::Desktop, out)
}

pub fn mobile_panel<W: Write>(out: W) -> TextPanel<W> {
    TextPanel::new(SurfaceKind::Mobile, out)
}
