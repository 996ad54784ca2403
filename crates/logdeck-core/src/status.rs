//! Status line state shown under the input.

use std::time::Instant;

pub const SPINNER_FRAMES: [&str; 4] = ["◐", "◓", "◑", "◒"];
const SPINNER_INTERVAL_MS: u128 = 120;

#[derive(Debug, Clone, Default)]
pub struct Status {
    text: Option<String>,
    spinner_since: Option<Instant>,
}

impl Status {
    /// Replaces the status text; `spinner` animates it until cleared.
    pub fn set(&mut self, text: impl Into<String>, spinner: bool) {
        self.text = Some(text.into());
        self.spinner_since = spinner.then(Instant::now);
    }

    pub fn clear(&mut self) {
        self.text = None;
        self.spinner_since = None;
    }

    pub fn text(&self) -> Option<&str> {
        self.text.as_deref()
    }

    pub fn is_spinning(&self) -> bool {
        self.spinner_since.is_some()
    }

    /// Spinner glyph for `now`, or `None` when not spinning.
    pub fn spinner_frame(&self, now: Instant) -> Option<&'static str> {
        let since = self.spinner_since?;
        let idx = now.duration_since(since).as_millis() / SPINNER_INTERVAL_MS;
        Some(SPINNER_FRAMES[(idx as usize) % SPINNER_FRAMES.len()])
    }
}
