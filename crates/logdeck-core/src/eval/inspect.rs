//! Structural, optionally colorized rendering of runtime values.

use std::rc::Rc;

use super::lexer::{is_ident_part, is_ident_start};
use super::value::{Value, format_number};
use crate::ansi;

/// Containers nested deeper than this collapse to `[Object]` / `[Array]`.
const MAX_DEPTH: usize = 2;

/// Containers whose single-line form is wider than this break onto lines.
const BREAK_LENGTH: usize = 72;

/// Renders a value the way the REPL prints results: strings quoted, nested
/// containers limited to [`MAX_DEPTH`], errors as their stack.
pub fn inspect(value: &Value, color: bool) -> String {
    let mut inspector = Inspector {
        color,
        seen: Vec::new(),
    };
    inspector.format(value, 0)
}

/// Renders one `console.*` argument: strings raw, everything else inspected.
pub fn format_arg(value: &Value, color: bool) -> String {
    match value {
        Value::String(s) => s.to_string(),
        other => inspect(other, color),
    }
}

struct Inspector {
    color: bool,
    /// Containers on the current path, for cycle detection.
    seen: Vec<usize>,
}

impl Inspector {
    fn paint(&self, code: &str, text: &str) -> String {
        if self.color {
            ansi::esc(code, text)
        } else {
            text.to_string()
        }
    }

    fn format(&mut self, value: &Value, depth: usize) -> String {
        match value {
            Value::Undefined => self.paint("90", "undefined"),
            Value::Null => self.paint("1", "null"),
            Value::Bool(b) => self.paint("33", if *b { "true" } else { "false" }),
            Value::Number(n) => self.paint("33", &format_number(*n)),
            Value::String(s) => self.paint("32", &quote(s)),
            Value::Function(f) => {
                let label = if f.name.is_empty() {
                    "[Function (anonymous)]".to_string()
                } else {
                    format!("[Function: {}]", f.name)
                };
                self.paint("36", &label)
            }
            Value::Error(e) if depth == 0 => e.stack.clone(),
            Value::Error(e) => {
                if e.message.is_empty() {
                    format!("[{}]", e.name)
                } else {
                    format!("[{}: {}]", e.name, e.message)
                }
            }
            Value::Array(items) => {
                let ptr = Rc::as_ptr(items) as usize;
                if self.seen.contains(&ptr) {
                    return self.paint("36", "[Circular]");
                }
                let items = items.borrow();
                if items.is_empty() {
                    return "[]".to_string();
                }
                if depth > MAX_DEPTH {
                    return self.paint("36", "[Array]");
                }
                self.seen.push(ptr);
                let parts: Vec<String> = items.iter().map(|v| self.format(v, depth + 1)).collect();
                self.seen.pop();
                group('[', ']', &parts)
            }
            Value::Object(obj) => {
                let ptr = Rc::as_ptr(obj) as usize;
                if self.seen.contains(&ptr) {
                    return self.paint("36", "[Circular]");
                }
                let obj = obj.borrow();
                if obj.is_empty() {
                    return "{}".to_string();
                }
                if depth > MAX_DEPTH {
                    return self.paint("36", "[Object]");
                }
                self.seen.push(ptr);
                let parts: Vec<String> = obj
                    .entries()
                    .map(|(k, v)| format!("{}: {}", self.key(k), self.format(v, depth + 1)))
                    .collect();
                self.seen.pop();
                group('{', '}', &parts)
            }
        }
    }

    fn key(&self, key: &str) -> String {
        let mut chars = key.chars();
        let plain = chars.next().is_some_and(is_ident_start) && chars.all(is_ident_part);
        if plain {
            key.to_string()
        } else {
            self.paint("32", &quote(key))
        }
    }
}

fn quote(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('\'');
    for c in s.chars() {
        match c {
            '\'' => out.push_str("\\'"),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c => out.push(c),
        }
    }
    out.push('\'');
    out
}

/// Joins container parts on one line when short, else one part per line.
fn group(open: char, close: char, parts: &[String]) -> String {
    let width: usize = parts.iter().map(|p| ansi::visible_length(p) + 2).sum::<usize>() + 2;
    if width <= BREAK_LENGTH && !parts.iter().any(|p| p.contains('\n')) {
        return format!("{open} {} {close}", parts.join(", "));
    }
    let body = parts
        .iter()
        .map(|p| format!("  {}", p.replace('\n', "\n  ")))
        .collect::<Vec<_>>()
        .join(",\n");
    format!("{open}\n{body}\n{close}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::eval::Object;

    #[test]
    fn test_primitives() {
        assert_eq!(inspect(&Value::Undefined, false), "undefined");
        assert_eq!(inspect(&Value::Number(1.5), false), "1.5");
        assert_eq!(inspect(&Value::from("it's"), false), "'it\\'s'");
        assert_eq!(inspect(&Value::from("x"), true), "\x1b[32m'x'\x1b[0m");
    }

    #[test]
    fn test_format_arg_keeps_strings_raw() {
        assert_eq!(format_arg(&Value::from("plain"), true), "plain");
        assert_eq!(format_arg(&Value::Bool(true), false), "true");
    }

    #[test]
    fn test_depth_limit() {
        let deep = Value::array(vec![Value::array(vec![Value::array(vec![Value::array(
            vec![Value::Number(1.0)],
        )])])]);
        assert_eq!(inspect(&deep, false), "[ [ [ [Array] ] ] ]");
    }

    #[test]
    fn test_circular_reference() {
        let obj = Value::object(Object::new());
        if let Value::Object(inner) = &obj {
            inner.borrow_mut().set("me", obj.clone());
        }
        assert_eq!(inspect(&obj, false), "{ me: [Circular] }");
    }

    #[test]
    fn test_long_containers_break_lines() {
        let items = (0..30).map(|i| Value::Number(f64::from(i))).collect();
        let out = inspect(&Value::array(items), false);
        assert!(out.starts_with("[\n  0,\n  1,"));
        assert!(out.ends_with("  29\n]"));
    }

    #[test]
    fn test_nested_errors_are_bracketed() {
        let arr = Value::array(vec![Value::error("TypeError", "bad")]);
        assert_eq!(inspect(&arr, false), "[ [TypeError: bad] ]");
        assert!(inspect(&Value::error("Error", "top"), false).starts_with("Error: top\n"));
    }
}
