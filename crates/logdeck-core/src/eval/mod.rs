//! Embedded expression language for the console REPL.
//!
//! A small JavaScript-flavoured language: declarations, `throw`, blocks and
//! expressions over a restricted set of builtins. There are no loops and no
//! user-defined functions, so every evaluation terminates; nesting is bounded
//! by [`parser::MAX_DEPTH`].

mod ast;
mod builtins;
pub mod inspect;
mod interp;
mod lexer;
pub mod parser;
mod value;

use std::fmt;

pub use inspect::{format_arg, inspect};
pub use interp::{ConsoleCall, Context};
pub use value::{Callable, ErrorValue, NativeFn, Object, Value, format_number};

/// Category of a raised condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConditionKind {
    SyntaxError,
    ReferenceError,
    TypeError,
    RangeError,
    /// Raised by a `throw` statement.
    Thrown,
}

impl ConditionKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::SyntaxError => "SyntaxError",
            Self::ReferenceError => "ReferenceError",
            Self::TypeError => "TypeError",
            Self::RangeError => "RangeError",
            Self::Thrown => "Error",
        }
    }
}

/// A failed evaluation: what kind of failure and the value that was raised.
#[derive(Debug, Clone)]
pub struct Condition {
    pub kind: ConditionKind,
    pub value: Value,
}

impl Condition {
    fn new(kind: ConditionKind, message: &str) -> Self {
        Self {
            kind,
            value: Value::error(kind.as_str(), message),
        }
    }

    pub fn syntax(message: &str) -> Self {
        Self::new(ConditionKind::SyntaxError, message)
    }

    pub fn reference(message: &str) -> Self {
        Self::new(ConditionKind::ReferenceError, message)
    }

    pub fn type_error(message: &str) -> Self {
        Self::new(ConditionKind::TypeError, message)
    }

    pub fn range(message: &str) -> Self {
        Self::new(ConditionKind::RangeError, message)
    }

    pub fn thrown(value: Value) -> Self {
        Self {
            kind: ConditionKind::Thrown,
            value,
        }
    }

    pub fn is_syntax(&self) -> bool {
        self.kind == ConditionKind::SyntaxError
    }

    /// Stack text when the raised value is an error, otherwise its inspection.
    pub fn details(&self, color: bool) -> String {
        match &self.value {
            Value::Error(e) => e.stack.clone(),
            other => inspect(other, color),
        }
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.value {
            Value::Error(_) => write!(f, "Uncaught {}", self.value.to_js_string()),
            other => write!(f, "Uncaught {}", inspect(other, false)),
        }
    }
}

impl std::error::Error for Condition {}

/// Runs source text against a binding context.
pub trait Evaluator {
    /// # Errors
    /// Returns the raised [`Condition`] when parsing or evaluation fails.
    fn evaluate(&self, source: &str, ctx: &mut Context) -> Result<Value, Condition>;
}

/// Lists the member names reachable from a dotted path.
pub trait NameEnumerator {
    /// Own names of whatever `path` resolves to, followed by inherited ones.
    /// An empty path means the root scope. `None` when the path does not
    /// resolve.
    fn names_at(&self, path: &[&str]) -> Option<Vec<String>>;
}

/// The built-in tree-walking evaluator.
#[derive(Debug, Clone, Copy, Default)]
pub struct Interpreter;

impl Evaluator for Interpreter {
    fn evaluate(&self, source: &str, ctx: &mut Context) -> Result<Value, Condition> {
        let program = parser::parse_program(source)?;
        ctx.run(&program)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn eval(src: &str) -> Result<Value, Condition> {
        let mut ctx = Context::new();
        Interpreter.evaluate(src, &mut ctx)
    }

    fn show(src: &str) -> String {
        inspect(&eval(src).unwrap(), false)
    }

    #[test]
    fn test_arithmetic_and_strings() {
        assert_eq!(show("1 + 1"), "2");
        assert_eq!(show("'a' + 1"), "'a1'");
        assert_eq!(show("2 ** 10 - 24 / 2"), "1012");
        assert_eq!(show("7 % 3"), "1");
        assert_eq!(show("'abc'.toUpperCase().length"), "3");
    }

    #[test]
    fn test_object_literal_as_expression() {
        assert_eq!(show("({a: 1, 'b-c': [1, 'x']})"), "{ a: 1, 'b-c': [ 1, 'x' ] }");
    }

    #[test]
    fn test_bindings_persist_across_evaluations() {
        let mut ctx = Context::new();
        Interpreter.evaluate("let x = 40", &mut ctx).unwrap();
        let v = Interpreter.evaluate("x += 2; x", &mut ctx).unwrap();
        assert_eq!(inspect(&v, false), "42");
    }

    #[test]
    fn test_const_cannot_be_reassigned() {
        let mut ctx = Context::new();
        Interpreter.evaluate("const k = 1", &mut ctx).unwrap();
        let err = Interpreter.evaluate("k = 2", &mut ctx).unwrap_err();
        assert_eq!(err.kind, ConditionKind::TypeError);
    }

    #[test]
    fn test_throw_produces_thrown_condition() {
        let err = eval("throw new Error('x')").unwrap_err();
        assert_eq!(err.kind, ConditionKind::Thrown);
        assert_eq!(err.to_string(), "Uncaught Error: x");
        assert!(err.details(false).starts_with("Error: x"));
    }

    #[test]
    fn test_reference_and_type_errors() {
        assert_eq!(eval("nope").unwrap_err().kind, ConditionKind::ReferenceError);
        assert_eq!(eval("null.x").unwrap_err().kind, ConditionKind::TypeError);
        assert_eq!(eval("(1)()").unwrap_err().kind, ConditionKind::TypeError);
        assert_eq!(show("typeof nope"), "'undefined'");
    }

    #[test]
    fn test_logical_and_conditional() {
        assert_eq!(show("null ?? 'd'"), "'d'");
        assert_eq!(show("0 || 5"), "5");
        assert_eq!(show("1 && 0"), "0");
        assert_eq!(show("3 > 2 ? 'y' : 'n'"), "'y'");
        assert_eq!(show("1 == '1'"), "true");
        assert_eq!(show("1 === '1'"), "false");
    }

    #[test]
    fn test_builtins() {
        assert_eq!(show("Math.max(1, 9, 3)"), "9");
        assert_eq!(show("JSON.stringify({a: [1, 2]})"), "'{\"a\":[1,2]}'");
        assert_eq!(show("JSON.parse('[1,{\"b\":true}]')[1].b"), "true");
        assert_eq!(show("Object.keys({x: 1, y: 2})"), "[ 'x', 'y' ]");
        assert_eq!(show("[3, 1, 2].sort().join('-')"), "'1-2-3'");
        assert_eq!(show("[1, 4, 9].map(Math.sqrt)"), "[ 1, 2, 3 ]");
        assert_eq!(show("parseInt('42px')"), "42");
        assert_eq!(show("(255).toString(16)"), "'ff'");
        assert_eq!(show("(1.005).toFixed(1)"), "'1.0'");
    }

    #[test]
    fn test_console_calls_are_collected() {
        let mut ctx = Context::new();
        let v = Interpreter.evaluate("console.log('hi', 1)", &mut ctx).unwrap();
        assert!(matches!(v, Value::Undefined));
        let calls = ctx.take_console();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].method, "log");
        assert_eq!(calls[0].args.len(), 2);
    }

    #[test]
    fn test_names_at_resolves_paths() {
        let mut ctx = Context::new();
        ctx.expose("profile", Value::from("dev"));
        let root = ctx.names_at(&[]).unwrap();
        let profile = root.iter().position(|n| n == "profile").unwrap();
        let process = root.iter().position(|n| n == "process").unwrap();
        assert!(profile < process);

        let math = ctx.names_at(&["Math"]).unwrap();
        assert!(math.contains(&"floor".to_string()));
        assert!(ctx.names_at(&["missing"]).is_none());
    }

    #[test]
    fn test_deep_evaluation_is_bounded() {
        let src = format!("{}1{}", "[".repeat(300), "]".repeat(300));
        assert!(eval(&src).is_err());
    }
}
