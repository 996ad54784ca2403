//! REPL session: history, autocomplete and command submission.
//!
//! A submission echoes the command into the scrollback, evaluates it and
//! places everything it produced (console calls, then the result or error)
//! directly after the echo with `insert_after`, so the echo always precedes
//! its output even when other entries arrive in between.

mod autocomplete;
mod history;

use std::path::Path;

pub use autocomplete::{Autocomplete, POPUP_HEIGHT};
pub use history::{DEFAULT_MAX_ENTRIES, History};

use crate::entry::LogEntry;
use crate::error::ConfigError;
use crate::eval::{Condition, ConsoleCall, Context, Evaluator, Interpreter, Value, format_arg};
use crate::scrollback::Scrollback;
use crate::verbosity::Verbosity;

/// What a submission did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Submission {
    /// Blank input.
    Ignored,
    /// `cls` / `clear`: the caller clears the scrollback.
    Clear,
    /// `exit` / `quit`.
    Exit,
    Evaluated {
        command: usize,
        result: usize,
        failed: bool,
    },
}

fn is_clear_verb(cmd: &str) -> bool {
    matches!(cmd, "cls" | "clear")
}

fn is_exit_verb(cmd: &str) -> bool {
    matches!(cmd, "exit" | "quit")
}

#[derive(Debug)]
pub struct ReplSession<E: Evaluator = Interpreter> {
    evaluator: E,
    context: Context,
    history: History,
    autocomplete: Autocomplete,
}

impl Default for ReplSession {
    fn default() -> Self {
        Self::new(History::default())
    }
}

impl ReplSession {
    pub fn new(history: History) -> Self {
        Self::with_evaluator(Interpreter, history)
    }
}

impl<E: Evaluator> ReplSession<E> {
    pub fn with_evaluator(evaluator: E, history: History) -> Self {
        Self {
            evaluator,
            context: Context::new(),
            history,
            autocomplete: Autocomplete::default(),
        }
    }

    pub fn context(&self) -> &Context {
        &self.context
    }

    /// Binding context, for exposing host values to evaluated code.
    pub fn context_mut(&mut self) -> &mut Context {
        &mut self.context
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    pub fn autocomplete(&self) -> &Autocomplete {
        &self.autocomplete
    }

    /// History step towards older commands; `None` leaves the input as is.
    pub fn older(&mut self, current: &str) -> Option<String> {
        self.history.older(current).map(str::to_string)
    }

    pub fn newer(&mut self) -> Option<String> {
        self.history.newer()
    }

    pub fn update_autocomplete(&mut self, input: &str) {
        self.autocomplete.update(input, &self.context);
    }

    pub fn close_autocomplete(&mut self) {
        self.autocomplete.close();
    }

    pub fn autocomplete_next(&mut self) {
        self.autocomplete.select_next();
    }

    pub fn autocomplete_prev(&mut self) {
        self.autocomplete.select_prev();
    }

    /// Accepts the selected candidate and reopens completion against the
    /// new input. Returns the new input, or `None` when nothing was open.
    pub fn accept_candidate(&mut self) -> Option<String> {
        let input = self.autocomplete.accept()?;
        self.autocomplete.update(&input, &self.context);
        Some(input)
    }

    /// Evaluates `source` as an expression first, then as statements.
    ///
    /// The fallback only happens on a syntax error, so side effects never
    /// run twice.
    ///
    /// # Errors
    /// Returns the raised [`Condition`].
    pub fn evaluate(&mut self, source: &str) -> Result<Value, Condition> {
        let wrapped = format!("({source})");
        match self.evaluator.evaluate(&wrapped, &mut self.context) {
            Err(cond) if cond.is_syntax() => self.evaluator.evaluate(source, &mut self.context),
            other => other,
        }
    }

    /// Submits one line of input.
    pub fn submit(&mut self, input: &str, scrollback: &mut Scrollback) -> Submission {
        self.autocomplete.close();
        let cmd = input.trim();
        if cmd.is_empty() {
            self.history.reset_navigation();
            return Submission::Ignored;
        }
        self.history.record(cmd);

        if is_clear_verb(cmd) {
            return Submission::Clear;
        }
        if is_exit_verb(cmd) {
            return Submission::Exit;
        }

        tracing::debug!(command = cmd, "evaluating");
        let command = scrollback.push_line(LogEntry::command(cmd));
        let outcome = self.evaluate(cmd);

        let mut last = command;
        for call in self.context.take_console() {
            last = insert_or_push(scrollback, console_entry(&call), last);
        }
        let failed = outcome.is_err();
        let entry = match outcome {
            Ok(value) => LogEntry::eval_output(&value),
            Err(cond) => error_entry(&cond),
        };
        let result = insert_or_push(scrollback, entry, last);
        Submission::Evaluated {
            command,
            result,
            failed,
        }
    }

    /// # Errors
    /// [`ConfigError::Write`] when the history file cannot be written.
    pub fn save_history(&self, path: &Path) -> Result<(), ConfigError> {
        self.history.save(path)
    }
}

/// Inserts after `after`, or appends when that entry was evicted.
fn insert_or_push(scrollback: &mut Scrollback, entry: LogEntry, after: usize) -> usize {
    match scrollback.insert_after(entry.clone(), after) {
        Ok(index) => index,
        Err(err) => {
            tracing::debug!(%err, "anchor entry gone, appending instead");
            scrollback.push_line(entry)
        }
    }
}

fn console_entry(call: &ConsoleCall) -> LogEntry {
    let message = call
        .args
        .iter()
        .map(|v| format_arg(v, true))
        .collect::<Vec<_>>()
        .join(" ");
    let raw = call.args.iter().map(Value::to_json).collect();
    LogEntry::args(
        &call.method,
        Verbosity::from_kind(&call.method),
        raw,
        message,
        None,
    )
}

fn error_entry(cond: &Condition) -> LogEntry {
    let message = match &cond.value {
        Value::Error(e) => format!("Uncaught {}", e.stack),
        _ => cond.to_string(),
    };
    LogEntry::error(&message, cond.value.to_json())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ansi;
    use crate::entry::EntryKind;

    fn text(sb: &Scrollback, i: usize) -> String {
        ansi::strip(&sb.get(i).unwrap().text()).into_owned()
    }

    #[test]
    fn test_submit_echoes_and_evaluates() {
        let mut repl = ReplSession::default();
        let mut sb = Scrollback::default();
        let outcome = repl.submit("1 + 1", &mut sb);
        assert_eq!(
            outcome,
            Submission::Evaluated {
                command: 0,
                result: 1,
                failed: false
            }
        );
        assert_eq!(sb.get(0).unwrap().kind(), EntryKind::Command);
        assert_eq!(sb.get(1).unwrap().kind(), EntryKind::EvalOutput);
        assert_eq!(text(&sb, 1), "< 2");
    }

    #[test]
    fn test_object_literal_is_an_expression() {
        let mut repl = ReplSession::default();
        let mut sb = Scrollback::default();
        repl.submit("{a:1}", &mut sb);
        assert_eq!(text(&sb, 1), "< { a: 1 }");
        assert!(sb.get(1).unwrap().is_expandable());
    }

    #[test]
    fn test_throw_becomes_error_entry() {
        let mut repl = ReplSession::default();
        let mut sb = Scrollback::default();
        let outcome = repl.submit("throw new Error('x')", &mut sb);
        assert!(matches!(outcome, Submission::Evaluated { failed: true, .. }));
        assert_eq!(sb.get(1).unwrap().kind(), EntryKind::Error);
        assert!(text(&sb, 1).contains("Uncaught Error: x"));
    }

    #[test]
    fn test_oversized_results_become_range_errors() {
        let cases = [
            ("'ab'.repeat(1e19)", "Invalid string length"),
            ("'x'.padStart(1e15)", "Invalid string length"),
            ("let xs = []; xs.length = 1e300", "Invalid array length"),
            ("let ys = []; ys[1e9] = 1", "Invalid array length"),
            ("Array(4294967295)", "Invalid array length"),
        ];
        for (source, message) in cases {
            let mut repl = ReplSession::default();
            let mut sb = Scrollback::default();
            let outcome = repl.submit(source, &mut sb);
            assert!(
                matches!(outcome, Submission::Evaluated { failed: true, .. }),
                "{source}"
            );
            assert_eq!(sb.len(), 2, "{source}");
            assert_eq!(sb.get(1).unwrap().kind(), EntryKind::Error, "{source}");
            assert!(text(&sb, 1).contains(&format!("RangeError: {message}")), "{source}");
        }
    }

    #[test]
    fn test_growth_within_bounds_still_works() {
        let mut repl = ReplSession::default();
        let mut sb = Scrollback::default();
        repl.submit("let zs = []; zs[2] = 'c'; zs.length", &mut sb);
        assert_eq!(text(&sb, 1), "< 3");
    }

    #[test]
    fn test_statements_run_once() {
        let mut repl = ReplSession::default();
        let mut sb = Scrollback::default();
        repl.submit("let n = 1", &mut sb);
        repl.submit("n += 1; n", &mut sb);
        assert_eq!(text(&sb, 3), "< 2");
    }

    #[test]
    fn test_result_lands_after_its_command() {
        let mut repl = ReplSession::default();
        let mut sb = Scrollback::default();
        sb.push_line(LogEntry::plain("earlier"));
        repl.submit("console.log('side'); 5", &mut sb);
        assert_eq!(text(&sb, 1), "> console.log('side'); 5");
        assert_eq!(text(&sb, 2), "[log] side");
        assert_eq!(text(&sb, 3), "< 5");
    }

    #[test]
    fn test_reserved_verbs_skip_evaluation() {
        let mut repl = ReplSession::default();
        let mut sb = Scrollback::default();
        assert_eq!(repl.submit("  cls ", &mut sb), Submission::Clear);
        assert_eq!(repl.submit("exit", &mut sb), Submission::Exit);
        assert_eq!(repl.submit("   ", &mut sb), Submission::Ignored);
        assert!(sb.is_empty());
        assert_eq!(repl.history().entries(), ["exit", "cls"]);
    }

    #[test]
    fn test_accept_candidate_reopens_against_new_input() {
        let mut repl = ReplSession::default();
        repl.update_autocomplete("JSO");
        assert_eq!(repl.accept_candidate().as_deref(), Some("JSON"));
        assert!(!repl.autocomplete().is_open());
        repl.update_autocomplete("JSON.");
        assert!(repl.autocomplete().candidates().contains(&"parse".to_string()));
    }
}
