//! Terminal rendering of the screen state

use std::io::{self, Stderr, Stdout, Write};
use tracing::warn;

use crate::AppError;
use crate::screen::{ScreenState, ScreenView};

const PLACEHOLDER: &str = "-";

/// Prints frames to one writer and notices to another
pub struct ConsoleView<O: Write, E: Write> {
    out: O,
    err: E,
    last_frame: Option<ScreenState>,
    frames: usize,
}

impl ConsoleView<Stdout, Stderr> {
    /// Frames on stdout, notices on stderr
    #[must_use]
    pub fn stdio() -> Self {
        Self::new(io::stdout(), io::stderr())
    }
}

impl<O: Write, E: Write> ConsoleView<O, E> {
    pub fn new(out: O, err: E) -> Self {
        Self {
            out,
            err,
            last_frame: None,
            frames: 0,
        }
    }

    /// Number of frames actually printed
    #[must_use]
    pub fn frames(&self) -> usize {
        self.frames
    }

    pub fn into_inner(self) -> (O, E) {
        (self.out, self.err)
    }

    fn write_frame(&mut self, state: &ScreenState) -> io::Result<()> {
        let out = &mut self.out;
        if self.frames > 0 {
            writeln!(out)?;
        }

        writeln!(out, "📍 {}", state.title.as_deref().unwrap_or(PLACEHOLDER))?;
        if let Some(subtitle) = &state.subtitle {
            writeln!(out, "   {subtitle}")?;
        }
        if let Some(coordinate) = &state.coordinate {
            writeln!(out, "   {}", coordinate.format_coordinates())?;
        }

        let aqi = state.aqi_text.as_deref().unwrap_or(PLACEHOLDER);
        match state.category {
            Some(category) => writeln!(
                out,
                "AQI {aqi}  {} {}  [{}]",
                category.emoji(),
                category.label(),
                category.background_asset()
            )?,
            None => writeln!(out, "AQI {aqi}")?,
        }
        writeln!(
            out,
            "Updated {}",
            state.timestamp_text.as_deref().unwrap_or(PLACEHOLDER)
        )?;
        out.flush()
    }
}

impl<O: Write, E: Write> ScreenView for ConsoleView<O, E> {
    fn render(&mut self, state: &ScreenState) {
        if self.last_frame.as_ref() == Some(state) {
            return;
        }
        if let Err(e) = self.write_frame(state) {
            warn!("Failed to render screen: {}", e);
            return;
        }
        self.frames += 1;
        self.last_frame = Some(state.clone());
    }

    fn notify(&mut self, notice: &AppError) {
        if let Err(e) = writeln!(self.err, "⚠️  {}", notice.user_message()) {
            warn!("Failed to show notice: {}", e);
        }
    }
}
