//! Console runtime: owns the terminal, runs the event loop, executes effects.
//!
//! All side effects happen here; the reducer stays pure and returns effects.
//!
//! ## Inbox Pattern
//!
//! Other threads never touch `AppState`. They send [`ConsoleEvent`]s through
//! the router's `ChannelSink` (or a [`crate::ConsoleHandle`]) into the inbox,
//! and the loop drains the inbox once per iteration.

use std::io::Stdout;
use std::time::{Duration, Instant};

use anyhow::Result;
use crossterm::event;
use logdeck_core::router::ConsoleEvent;
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;
use tokio::sync::mpsc;

use crate::effects::UiEffect;
use crate::events::UiEvent;
use crate::state::AppState;
use crate::{ConsoleHandle, exceptions, render, terminal, update};

/// Tick cadence while the user is interacting or the spinner runs (~60fps).
pub const FRAME_DURATION: Duration = Duration::from_millis(16);

/// Tick cadence when idle.
pub const IDLE_POLL_DURATION: Duration = Duration::from_millis(100);

/// Called once after the first frame reaches the screen.
pub type ReadyHook = Box<dyn FnOnce(&ConsoleHandle) + Send>;

pub struct ConsoleRuntime {
    terminal: Terminal<CrosstermBackend<Stdout>>,
    pub state: AppState,
    inbox_rx: mpsc::UnboundedReceiver<ConsoleEvent>,
    handle: ConsoleHandle,
    catch_panics: bool,
    on_ready: Option<ReadyHook>,
    /// Effects that run after the current event batch.
    deferred: Vec<UiEffect>,
    last_tick: Instant,
    last_terminal_event: Instant,
}

impl ConsoleRuntime {
    /// Enters the alternate screen. The panic hook must already be installed.
    ///
    /// # Errors
    /// Returns an error if the terminal cannot be set up.
    pub fn new(
        state: AppState,
        inbox_rx: mpsc::UnboundedReceiver<ConsoleEvent>,
        handle: ConsoleHandle,
        catch_panics: bool,
        on_ready: Option<ReadyHook>,
    ) -> Result<Self> {
        let terminal = terminal::setup_terminal()?;
        let now = Instant::now();
        Ok(Self {
            terminal,
            state,
            inbox_rx,
            handle,
            catch_panics,
            on_ready,
            deferred: Vec::new(),
            last_tick: now,
            last_terminal_event: now,
        })
    }

    /// Runs the event loop until the user quits.
    ///
    /// # Errors
    /// Returns an error if polling, reading or drawing fails.
    pub fn run(&mut self) -> Result<()> {
        terminal::enable_input_features()?;
        exceptions::mark_loop_thread();

        let result = self.event_loop();

        let _ = terminal::disable_input_features();
        result
    }

    fn event_loop(&mut self) -> Result<()> {
        while !self.state.should_quit {
            if exceptions::shutdown_requested() {
                tracing::debug!("shutting down after caught panic");
                break;
            }

            let mut events = self.collect_events()?;

            // Layout updates go before anything that reads the viewport.
            let size = self.terminal.size()?;
            events.insert(
                0,
                UiEvent::Frame {
                    width: size.width,
                    height: size.height,
                },
            );

            for event in events {
                if matches!(&event, UiEvent::Terminal(_)) {
                    self.last_terminal_event = Instant::now();
                }
                let catch = self.catch_panics;
                let state = &mut self.state;
                let effects = exceptions::guarded(catch, || update::update(state, event))
                    .unwrap_or_default();
                self.execute_effects(effects);
            }
            self.run_deferred();

            if self.state.dirty {
                update::sync_view(&mut self.state);
                self.terminal.draw(|frame| render::render(&self.state, frame))?;
                self.state.dirty = false;
                if let Some(ready) = self.on_ready.take() {
                    ready(&self.handle);
                }
            }
        }
        Ok(())
    }

    // ========================================================================
    // Event Collection
    // ========================================================================

    fn collect_events(&mut self) -> Result<Vec<UiEvent>> {
        let mut events = Vec::new();

        let recent_terminal_activity = self.last_terminal_event.elapsed() < IDLE_POLL_DURATION;
        let tick_interval = if recent_terminal_activity || self.state.status.is_spinning() {
            FRAME_DURATION
        } else {
            IDLE_POLL_DURATION
        };

        while let Ok(ev) = self.inbox_rx.try_recv() {
            events.push(UiEvent::Console(ev));
        }

        // Block until the next tick only when there is nothing to process.
        let poll_duration = if events.is_empty() {
            tick_interval.saturating_sub(self.last_tick.elapsed())
        } else {
            Duration::ZERO
        };

        if event::poll(poll_duration)? {
            events.push(UiEvent::Terminal(event::read()?));
            while event::poll(Duration::ZERO)? {
                events.push(UiEvent::Terminal(event::read()?));
            }
        }

        if self.last_tick.elapsed() >= tick_interval {
            events.push(UiEvent::Tick);
            self.last_tick = Instant::now();
        }

        Ok(events)
    }

    // ========================================================================
    // Effect Dispatch
    // ========================================================================

    fn execute_effects(&mut self, effects: Vec<UiEffect>) {
        for effect in effects {
            self.execute_effect(effect);
        }
    }

    fn execute_effect(&mut self, effect: UiEffect) {
        match effect {
            UiEffect::Quit => {
                self.state.should_quit = true;
            }
            UiEffect::ClearScrollback => {
                self.deferred.push(UiEffect::ClearScrollback);
            }
            UiEffect::SetTitle { title } => {
                if let Err(err) = terminal::set_title(&title) {
                    tracing::warn!("{err:#}");
                }
            }
        }
    }

    fn run_deferred(&mut self) {
        for effect in std::mem::take(&mut self.deferred) {
            if effect == UiEffect::ClearScrollback {
                self.state.scrollback.clear();
                self.state.dirty = true;
            }
        }
    }
}

impl Drop for ConsoleRuntime {
    fn drop(&mut self) {
        let _ = terminal::restore_terminal();
    }
}
