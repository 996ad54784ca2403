//! UI event types consumed by the reducer.

use crossterm::event::Event;
use logdeck_core::router::ConsoleEvent;

#[derive(Debug, Clone)]
pub enum UiEvent {
    /// Timer tick; drives the status spinner.
    Tick,
    /// Prepended to every batch with the current terminal size.
    Frame { width: u16, height: u16 },
    Terminal(Event),
    /// Entries and status updates from other threads, via the inbox.
    Console(ConsoleEvent),
}
