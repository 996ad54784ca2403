//! Console reducer.
//!
//! All state mutations happen here. The runtime calls `update(app, event)`
//! and executes the returned effects.

use crossterm::event::{
    Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers, MouseButton, MouseEvent, MouseEventKind,
};
use logdeck_core::repl::Submission;
use logdeck_core::router::ConsoleEvent;
use ratatui::layout::Rect;

use crate::effects::UiEffect;
use crate::events::UiEvent;
use crate::render;
use crate::state::{AppState, ScrollMetrics};

pub fn update(app: &mut AppState, event: UiEvent) -> Vec<UiEffect> {
    match event {
        UiEvent::Tick => {
            app.now = std::time::Instant::now();
            if app.status.is_spinning() {
                app.dirty = true;
            }
            vec![]
        }
        UiEvent::Frame { width, height } => {
            handle_frame(app, width, height);
            vec![]
        }
        UiEvent::Terminal(event) => {
            app.dirty = true;
            handle_terminal_event(app, event)
        }
        UiEvent::Console(event) => {
            app.dirty = true;
            handle_console_event(app, event)
        }
    }
}

/// Refreshes the visible rows and scroll metrics. Called right before a draw.
pub fn sync_view(app: &mut AppState) {
    let height = app.viewport.height as usize;
    app.view = app.scrollback.visible_lines(height);
    app.scroll = ScrollMetrics {
        total_lines: app.scrollback.total_lines(),
        offset: app.scrollback.offset(),
        percentage: app.scrollback.percentage(),
    };
}

fn handle_frame(app: &mut AppState, width: u16, height: u16) {
    if app.terminal_size == (width, height) {
        return;
    }
    app.terminal_size = (width, height);
    app.viewport = render::scrollback_area(Rect::new(0, 0, width, height));
    app.scrollback
        .set_viewport(app.viewport.width as usize, app.viewport.height as usize);
    app.dirty = true;
}

fn handle_console_event(app: &mut AppState, event: ConsoleEvent) -> Vec<UiEffect> {
    match event {
        ConsoleEvent::Entry(entry) => {
            app.scrollback.push_line(entry);
            vec![]
        }
        ConsoleEvent::Status { text, spinner } => {
            app.status.set(text, spinner);
            vec![]
        }
        ConsoleEvent::ClearStatus => {
            app.status.clear();
            vec![]
        }
        ConsoleEvent::Title(title) => vec![UiEffect::SetTitle { title }],
    }
}

// ============================================================================
// Terminal Event Handlers
// ============================================================================

fn handle_terminal_event(app: &mut AppState, event: Event) -> Vec<UiEffect> {
    match event {
        Event::Key(key) => handle_key(app, key),
        Event::Mouse(mouse) => {
            handle_mouse(app, mouse);
            vec![]
        }
        Event::Paste(text) => {
            app.input.insert_str(&text);
            refresh_autocomplete(app);
            vec![]
        }
        _ => vec![],
    }
}

fn handle_mouse(app: &mut AppState, mouse: MouseEvent) {
    match mouse.kind {
        MouseEventKind::ScrollUp => {
            app.scrollback.scroll(-(app.wheel_lines as isize));
        }
        MouseEventKind::ScrollDown => {
            app.scrollback.scroll(app.wheel_lines as isize);
        }
        MouseEventKind::Down(MouseButton::Left) => {
            if mouse.column >= app.viewport.right() {
                return;
            }
            let scrolled_up = app.is_scrolled_up();
            let Some(index) = app.scrollback.resolve_coordinate(
                mouse.row as usize,
                app.viewport.y as usize,
                app.viewport.height as usize,
                scrolled_up,
            ) else {
                app.scrollback.clear_selection();
                return;
            };
            if let Err(err) = app.scrollback.select(index) {
                tracing::debug!(%err, "click on a vanished entry");
                return;
            }
            match app.scrollback.toggle_expansion(index) {
                Ok(expanded) => tracing::debug!(index, expanded, "toggled entry"),
                Err(err) => tracing::debug!(%err, "expansion failed"),
            }
        }
        _ => {}
    }
}

/// Parsed key modifiers for cleaner pattern matching.
struct Modifiers {
    ctrl: bool,
    alt: bool,
}

impl Modifiers {
    fn from(key: &KeyEvent) -> Self {
        Self {
            ctrl: key.modifiers.contains(KeyModifiers::CONTROL),
            alt: key.modifiers.contains(KeyModifiers::ALT),
        }
    }

    fn none(&self) -> bool {
        !self.ctrl && !self.alt
    }
}

fn handle_key(app: &mut AppState, key: KeyEvent) -> Vec<UiEffect> {
    if key.kind == KeyEventKind::Release {
        return vec![];
    }
    let mods = Modifiers::from(&key);

    // First match wins.
    handle_control_keys(app, key.code, &mods)
        .or_else(|| handle_autocomplete(app, key.code, &mods))
        .or_else(|| handle_history(app, key.code, &mods))
        .or_else(|| handle_scrolling(app, key.code, &mods))
        .or_else(|| handle_line_editing(app, key.code, &mods))
        .unwrap_or_else(|| handle_default_input(app, key.code, &mods))
}

fn handle_control_keys(
    app: &mut AppState,
    code: KeyCode,
    mods: &Modifiers,
) -> Option<Vec<UiEffect>> {
    match code {
        KeyCode::Char('c') if mods.ctrl => Some(vec![UiEffect::Quit]),
        KeyCode::Char('l') if mods.ctrl => {
            app.repl.close_autocomplete();
            Some(vec![UiEffect::ClearScrollback])
        }
        KeyCode::Enter if app.repl.autocomplete().is_open() => {
            accept_candidate(app);
            Some(vec![])
        }
        KeyCode::Enter => Some(submit(app)),
        _ => None,
    }
}

fn handle_autocomplete(
    app: &mut AppState,
    code: KeyCode,
    mods: &Modifiers,
) -> Option<Vec<UiEffect>> {
    if !mods.none() {
        return None;
    }
    let open = app.repl.autocomplete().is_open();
    match code {
        KeyCode::Tab if open => accept_candidate(app),
        KeyCode::Tab => refresh_autocomplete(app),
        KeyCode::Esc if open => app.repl.close_autocomplete(),
        KeyCode::Up if open => app.repl.autocomplete_prev(),
        KeyCode::Down if open => app.repl.autocomplete_next(),
        _ => return None,
    }
    Some(vec![])
}

fn handle_history(app: &mut AppState, code: KeyCode, mods: &Modifiers) -> Option<Vec<UiEffect>> {
    if !mods.none() {
        return None;
    }
    match code {
        KeyCode::Up => {
            if let Some(text) = app.repl.older(app.input.text()) {
                app.input.set(text);
            }
        }
        KeyCode::Down => {
            if let Some(text) = app.repl.newer() {
                app.input.set(text);
            }
        }
        _ => return None,
    }
    Some(vec![])
}

fn handle_scrolling(app: &mut AppState, code: KeyCode, mods: &Modifiers) -> Option<Vec<UiEffect>> {
    let page = app.page_lines as isize;
    match code {
        KeyCode::PageUp => {
            app.scrollback.scroll(-page);
        }
        KeyCode::PageDown => {
            app.scrollback.scroll(page);
        }
        KeyCode::Home if mods.ctrl => app.scrollback.scroll_to_top(),
        KeyCode::End if mods.ctrl => app.scrollback.scroll_to_bottom(),
        _ => return None,
    }
    Some(vec![])
}

fn handle_line_editing(
    app: &mut AppState,
    code: KeyCode,
    mods: &Modifiers,
) -> Option<Vec<UiEffect>> {
    let edited = match code {
        KeyCode::Char('a') if mods.ctrl => {
            app.input.move_home();
            false
        }
        KeyCode::Char('e') if mods.ctrl => {
            app.input.move_end();
            false
        }
        KeyCode::Char('u') if mods.ctrl => {
            app.input.delete_to_start();
            true
        }
        KeyCode::Char('k') if mods.ctrl => {
            app.input.delete_to_end();
            true
        }
        KeyCode::Char('w') if mods.ctrl => {
            app.input.delete_word_left();
            true
        }
        KeyCode::Backspace if mods.alt => {
            app.input.delete_word_left();
            true
        }
        KeyCode::Home => {
            app.input.move_home();
            false
        }
        KeyCode::End => {
            app.input.move_end();
            false
        }
        KeyCode::Left => {
            app.input.move_left();
            false
        }
        KeyCode::Right => {
            app.input.move_right();
            false
        }
        KeyCode::Backspace => {
            app.input.delete_prev();
            true
        }
        KeyCode::Delete => {
            app.input.delete_next();
            true
        }
        _ => return None,
    };
    if edited {
        refresh_autocomplete(app);
    } else {
        app.repl.close_autocomplete();
    }
    Some(vec![])
}

fn handle_default_input(app: &mut AppState, code: KeyCode, mods: &Modifiers) -> Vec<UiEffect> {
    let KeyCode::Char(c) = code else {
        return vec![];
    };
    if mods.ctrl || mods.alt {
        return vec![];
    }
    // `.` and `(` complete the selected name before being typed.
    if matches!(c, '.' | '(') && app.repl.autocomplete().is_open() {
        accept_candidate(app);
    }
    app.input.insert_char(c);
    refresh_autocomplete(app);
    vec![]
}

fn refresh_autocomplete(app: &mut AppState) {
    if app.input.cursor_at_end() {
        app.repl.update_autocomplete(app.input.text());
    } else {
        app.repl.close_autocomplete();
    }
}

fn accept_candidate(app: &mut AppState) {
    if let Some(text) = app.repl.accept_candidate() {
        app.input.set(text);
    }
}

fn submit(app: &mut AppState) -> Vec<UiEffect> {
    let text = app.input.take();
    match app.repl.submit(&text, &mut app.scrollback) {
        Submission::Ignored => vec![],
        Submission::Clear => vec![UiEffect::ClearScrollback],
        Submission::Exit => vec![UiEffect::Quit],
        Submission::Evaluated { failed, .. } => {
            tracing::debug!(failed, "command evaluated");
            app.scrollback.scroll_to_bottom();
            vec![]
        }
    }
}

#[cfg(test)]
mod tests {
    use logdeck_core::config::Config;
    use logdeck_core::repl::ReplSession;
    use logdeck_core::{EntryKind, LogEntry, ansi};

    use super::*;

    fn app() -> AppState {
        let mut app = AppState::new(&Config::default(), ReplSession::default());
        update(&mut app, UiEvent::Frame { width: 80, height: 24 });
        app
    }

    fn press(app: &mut AppState, code: KeyCode) -> Vec<UiEffect> {
        let key = KeyEvent::new(code, KeyModifiers::NONE);
        update(app, UiEvent::Terminal(Event::Key(key)))
    }

    fn ctrl(app: &mut AppState, c: char) -> Vec<UiEffect> {
        let key = KeyEvent::new(KeyCode::Char(c), KeyModifiers::CONTROL);
        update(app, UiEvent::Terminal(Event::Key(key)))
    }

    fn type_text(app: &mut AppState, text: &str) {
        for c in text.chars() {
            press(app, KeyCode::Char(c));
        }
    }

    fn click(app: &mut AppState, row: u16) {
        let mouse = MouseEvent {
            kind: MouseEventKind::Down(MouseButton::Left),
            column: 2,
            row,
            modifiers: KeyModifiers::NONE,
        };
        update(app, UiEvent::Terminal(Event::Mouse(mouse)));
    }

    fn entry_text(app: &AppState, index: usize) -> String {
        ansi::strip(&app.scrollback.get(index).unwrap().text()).into_owned()
    }

    #[test]
    fn test_enter_evaluates_the_input() {
        let mut app = app();
        type_text(&mut app, "1 + 1");
        let effects = press(&mut app, KeyCode::Enter);
        assert!(effects.is_empty());
        assert!(app.input.is_empty());
        assert_eq!(app.scrollback.len(), 2);
        assert_eq!(entry_text(&app, 1), "< 2");
    }

    #[test]
    fn test_clear_is_deferred_to_the_runtime() {
        let mut app = app();
        type_text(&mut app, "1");
        press(&mut app, KeyCode::Enter);
        assert_eq!(ctrl(&mut app, 'l'), vec![UiEffect::ClearScrollback]);
        assert_eq!(app.scrollback.len(), 2);

        type_text(&mut app, "cls");
        assert_eq!(press(&mut app, KeyCode::Enter), vec![UiEffect::ClearScrollback]);
    }

    #[test]
    fn test_exit_and_ctrl_c_quit() {
        let mut app = app();
        type_text(&mut app, "quit");
        assert_eq!(press(&mut app, KeyCode::Enter), vec![UiEffect::Quit]);
        assert_eq!(ctrl(&mut app, 'c'), vec![UiEffect::Quit]);
    }

    #[test]
    fn test_history_navigation_restores_draft() {
        let mut app = app();
        for cmd in ["1", "2"] {
            type_text(&mut app, cmd);
            press(&mut app, KeyCode::Enter);
        }
        type_text(&mut app, "dr");
        press(&mut app, KeyCode::Up);
        assert_eq!(app.input.text(), "2");
        press(&mut app, KeyCode::Up);
        assert_eq!(app.input.text(), "1");
        press(&mut app, KeyCode::Down);
        assert_eq!(app.input.text(), "2");
        press(&mut app, KeyCode::Down);
        assert_eq!(app.input.text(), "dr");
    }

    #[test]
    fn test_enter_accepts_open_candidate() {
        let mut app = app();
        type_text(&mut app, "Math.fl");
        assert!(app.repl.autocomplete().is_open());
        press(&mut app, KeyCode::Enter);
        assert_eq!(app.input.text(), "Math.floor");
        assert!(app.scrollback.is_empty());
    }

    #[test]
    fn test_dot_accepts_then_reopens() {
        let mut app = app();
        type_text(&mut app, "JSO.");
        assert_eq!(app.input.text(), "JSON.");
        let candidates = app.repl.autocomplete().candidates();
        assert!(candidates.contains(&"stringify".to_string()));
    }

    #[test]
    fn test_escape_closes_popup_and_arrows_move_selection() {
        let mut app = app();
        type_text(&mut app, "Math.");
        press(&mut app, KeyCode::Down);
        assert_eq!(app.repl.autocomplete().selected(), 1);
        press(&mut app, KeyCode::Esc);
        assert!(!app.repl.autocomplete().is_open());
        assert_eq!(app.input.text(), "Math.");
    }

    #[test]
    fn test_console_events_reach_state() {
        let mut app = app();
        update(&mut app, UiEvent::Console(ConsoleEvent::Entry(LogEntry::plain("hi"))));
        assert_eq!(app.scrollback.len(), 1);

        update(
            &mut app,
            UiEvent::Console(ConsoleEvent::Status {
                text: "loading".into(),
                spinner: true,
            }),
        );
        assert_eq!(app.status.text(), Some("loading"));
        update(&mut app, UiEvent::Console(ConsoleEvent::ClearStatus));
        assert_eq!(app.status.text(), None);

        let effects = update(&mut app, UiEvent::Console(ConsoleEvent::Title("t".into())));
        assert_eq!(effects, vec![UiEffect::SetTitle { title: "t".into() }]);
    }

    #[test]
    fn test_click_selects_and_expands() {
        let mut app = app();
        type_text(&mut app, "{a:1}");
        press(&mut app, KeyCode::Enter);
        assert_eq!(app.scrollback.get(1).unwrap().kind(), EntryKind::EvalOutput);

        click(&mut app, 1);
        assert_eq!(app.scrollback.selection(), Some(1));
        assert_eq!(app.scrollback.len(), 3);
        assert_eq!(app.scrollback.get(2).unwrap().kind(), EntryKind::Property);

        click(&mut app, 1);
        assert_eq!(app.scrollback.len(), 2);

        click(&mut app, 20);
        assert_eq!(app.scrollback.selection(), None);
    }

    #[test]
    fn test_wheel_and_page_scrolling() {
        let mut app = app();
        for i in 0..100 {
            app.scrollback.push_line(LogEntry::plain(format!("line {i}")));
        }
        update(&mut app, UiEvent::Frame { width: 80, height: 12 });
        let wheel = MouseEvent {
            kind: MouseEventKind::ScrollUp,
            column: 0,
            row: 0,
            modifiers: KeyModifiers::NONE,
        };
        update(&mut app, UiEvent::Terminal(Event::Mouse(wheel)));
        assert!(app.is_scrolled_up());
        assert_eq!(app.scrollback.offset(), 100 - 10 - 5);

        press(&mut app, KeyCode::PageDown);
        assert!(!app.is_scrolled_up());
    }

    #[test]
    fn test_sync_view_fills_rows() {
        let mut app = app();
        app.scrollback.push_line(LogEntry::plain("hello"));
        sync_view(&mut app);
        assert_eq!(app.view.len(), 1);
        assert_eq!(app.scroll.total_lines, 1);
        assert_eq!(app.scroll.offset, 0);
    }
}
