//! Runtime values of the console language.

use std::cell::RefCell;
use std::collections::HashSet;
use std::fmt;
use std::rc::Rc;

use super::Condition;
use super::interp::Context;

/// Signature of every builtin: context, bound receiver, arguments.
pub type NativeFn = fn(&mut Context, &Value, &[Value]) -> Result<Value, Condition>;

#[derive(Clone)]
pub struct Callable {
    pub name: String,
    pub call: NativeFn,
    pub constructor: bool,
    /// Receiver bound when the function was read off a value.
    pub this: Option<Value>,
    /// Members hung off the function itself, such as `Object.keys`.
    pub statics: Object,
}

impl fmt::Debug for Callable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Callable")
            .field("name", &self.name)
            .field("constructor", &self.constructor)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ErrorValue {
    pub name: String,
    pub message: String,
    pub stack: String,
}

impl ErrorValue {
    pub fn new(name: &str, message: &str) -> Self {
        let head = if message.is_empty() {
            name.to_string()
        } else {
            format!("{name}: {message}")
        };
        Self {
            name: name.to_string(),
            message: message.to_string(),
            stack: format!("{head}\n    at <repl>"),
        }
    }
}

/// Insertion-ordered property bag.
#[derive(Debug, Clone, Default)]
pub struct Object {
    props: Vec<(String, Value)>,
}

impl Object {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.props.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn set(&mut self, key: impl Into<String>, value: Value) {
        let key = key.into();
        match self.props.iter_mut().find(|(k, _)| *k == key) {
            Some((_, slot)) => *slot = value,
            None => self.props.push((key, value)),
        }
    }

    pub fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.props.iter().map(|(k, _)| k.as_str())
    }

    pub fn entries(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.props.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.props.len()
    }

    pub fn is_empty(&self) -> bool {
        self.props.is_empty()
    }
}

#[derive(Debug, Clone, Default)]
pub enum Value {
    #[default]
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    String(Rc<str>),
    Array(Rc<RefCell<Vec<Value>>>),
    Object(Rc<RefCell<Object>>),
    Function(Rc<Callable>),
    Error(Rc<ErrorValue>),
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::String(Rc::from(s))
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::String(Rc::from(s))
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Self::Number(n)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl Value {
    pub fn array(items: Vec<Value>) -> Self {
        Self::Array(Rc::new(RefCell::new(items)))
    }

    pub fn object(obj: Object) -> Self {
        Self::Object(Rc::new(RefCell::new(obj)))
    }

    pub fn native(name: &str, call: NativeFn) -> Self {
        Self::Function(Rc::new(Callable {
            name: name.to_string(),
            call,
            constructor: false,
            this: None,
            statics: Object::new(),
        }))
    }

    /// A constructor function carrying static members.
    pub fn constructor(name: &str, call: NativeFn, statics: Object) -> Self {
        Self::Function(Rc::new(Callable {
            name: name.to_string(),
            call,
            constructor: true,
            this: None,
            statics,
        }))
    }

    pub fn error(name: &str, message: &str) -> Self {
        Self::Error(Rc::new(ErrorValue::new(name, message)))
    }

    pub fn type_of(&self) -> &'static str {
        match self {
            Self::Undefined => "undefined",
            Self::Null | Self::Array(_) | Self::Object(_) | Self::Error(_) => "object",
            Self::Bool(_) => "boolean",
            Self::Number(_) => "number",
            Self::String(_) => "string",
            Self::Function(_) => "function",
        }
    }

    pub fn is_nullish(&self) -> bool {
        matches!(self, Self::Undefined | Self::Null)
    }

    pub fn truthy(&self) -> bool {
        match self {
            Self::Undefined | Self::Null => false,
            Self::Bool(b) => *b,
            Self::Number(n) => *n != 0.0 && !n.is_nan(),
            Self::String(s) => !s.is_empty(),
            Self::Array(_) | Self::Object(_) | Self::Function(_) | Self::Error(_) => true,
        }
    }

    pub fn to_number(&self) -> f64 {
        match self {
            Self::Undefined => f64::NAN,
            Self::Null => 0.0,
            Self::Bool(b) => f64::from(u8::from(*b)),
            Self::Number(n) => *n,
            Self::String(s) => string_to_number(s),
            Self::Array(_) => string_to_number(&self.to_js_string()),
            Self::Object(_) | Self::Function(_) | Self::Error(_) => f64::NAN,
        }
    }

    /// String conversion used by `+`, `String()` and template-less joins.
    pub fn to_js_string(&self) -> String {
        let mut seen = HashSet::new();
        self.to_js_string_inner(&mut seen)
    }

    fn to_js_string_inner(&self, seen: &mut HashSet<usize>) -> String {
        match self {
            Self::Undefined => "undefined".to_string(),
            Self::Null => "null".to_string(),
            Self::Bool(b) => b.to_string(),
            Self::Number(n) => format_number(*n),
            Self::String(s) => s.to_string(),
            Self::Array(items) => {
                let ptr = Rc::as_ptr(items) as usize;
                if !seen.insert(ptr) {
                    return String::new();
                }
                let out = items
                    .borrow()
                    .iter()
                    .map(|v| {
                        if v.is_nullish() {
                            String::new()
                        } else {
                            v.to_js_string_inner(seen)
                        }
                    })
                    .collect::<Vec<_>>()
                    .join(",");
                seen.remove(&ptr);
                out
            }
            Self::Object(_) => "[object Object]".to_string(),
            Self::Function(f) => format!("function {}() {{ [native code] }}", f.name),
            Self::Error(e) => {
                if e.message.is_empty() {
                    e.name.clone()
                } else {
                    format!("{}: {}", e.name, e.message)
                }
            }
        }
    }

    /// `===`
    pub fn strict_equals(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Undefined, Self::Undefined) | (Self::Null, Self::Null) => true,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Number(a), Self::Number(b)) => a == b,
            (Self::String(a), Self::String(b)) => a == b,
            (Self::Array(a), Self::Array(b)) => Rc::ptr_eq(a, b),
            (Self::Object(a), Self::Object(b)) => Rc::ptr_eq(a, b),
            (Self::Function(a), Self::Function(b)) => Rc::ptr_eq(a, b),
            (Self::Error(a), Self::Error(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }

    /// `==`
    pub fn loose_equals(&self, other: &Self) -> bool {
        match (self, other) {
            (a, b) if a.is_nullish() && b.is_nullish() => true,
            (a, b) if a.is_nullish() || b.is_nullish() => false,
            (Self::Number(_), Self::String(_) | Self::Bool(_))
            | (Self::String(_) | Self::Bool(_), Self::Number(_))
            | (Self::Bool(_), Self::String(_))
            | (Self::String(_), Self::Bool(_)) => self.to_number() == other.to_number(),
            _ => self.strict_equals(other),
        }
    }

    /// Names of own members, in definition order.
    pub fn own_names(&self) -> Vec<String> {
        match self {
            Self::Object(obj) => obj.borrow().keys().map(str::to_string).collect(),
            Self::Array(items) => (0..items.borrow().len())
                .map(|i| i.to_string())
                .chain(std::iter::once("length".to_string()))
                .collect(),
            Self::String(_) => vec!["length".to_string()],
            Self::Error(_) => vec!["stack".to_string(), "message".to_string()],
            Self::Function(f) => ["name", "length"]
                .into_iter()
                .chain(f.statics.keys())
                .map(str::to_string)
                .collect(),
            _ => Vec::new(),
        }
    }

    /// The prototype chain as lists of member names, nearest first.
    pub fn prototype_chain(&self) -> Vec<&'static [&'static str]> {
        use super::builtins::{
            ARRAY_PROTO, BOOLEAN_PROTO, ERROR_PROTO, FUNCTION_PROTO, NUMBER_PROTO, OBJECT_PROTO,
            STRING_PROTO,
        };
        match self {
            Self::Undefined | Self::Null => Vec::new(),
            Self::Bool(_) => vec![BOOLEAN_PROTO, OBJECT_PROTO],
            Self::Number(_) => vec![NUMBER_PROTO, OBJECT_PROTO],
            Self::String(_) => vec![STRING_PROTO, OBJECT_PROTO],
            Self::Array(_) => vec![ARRAY_PROTO, OBJECT_PROTO],
            Self::Object(_) => vec![OBJECT_PROTO],
            Self::Function(_) => vec![FUNCTION_PROTO, OBJECT_PROTO],
            Self::Error(_) => vec![ERROR_PROTO, OBJECT_PROTO],
        }
    }

    /// Own names followed by every name reachable through the prototype
    /// chain, deduplicated in discovery order.
    pub fn member_names(&self) -> Vec<String> {
        let mut names = self.own_names();
        for proto in self.prototype_chain() {
            for name in proto {
                if !names.iter().any(|n| n == name) {
                    names.push((*name).to_string());
                }
            }
        }
        names
    }

    /// Converts to JSON for storage outside the interpreter.
    pub fn to_json(&self) -> serde_json::Value {
        let mut seen = HashSet::new();
        self.to_json_inner(&mut seen)
    }

    fn to_json_inner(&self, seen: &mut HashSet<usize>) -> serde_json::Value {
        use serde_json::Value as J;
        match self {
            Self::Undefined | Self::Null => J::Null,
            Self::Bool(b) => J::Bool(*b),
            Self::Number(n) => serde_json::Number::from_f64(*n).map_or(J::Null, J::Number),
            Self::String(s) => J::String(s.to_string()),
            Self::Array(items) => {
                let ptr = Rc::as_ptr(items) as usize;
                if !seen.insert(ptr) {
                    return J::String("[Circular]".to_string());
                }
                let out = J::Array(items.borrow().iter().map(|v| v.to_json_inner(seen)).collect());
                seen.remove(&ptr);
                out
            }
            Self::Object(obj) => {
                let ptr = Rc::as_ptr(obj) as usize;
                if !seen.insert(ptr) {
                    return J::String("[Circular]".to_string());
                }
                let map = obj
                    .borrow()
                    .entries()
                    .map(|(k, v)| (k.to_string(), v.to_json_inner(seen)))
                    .collect();
                seen.remove(&ptr);
                J::Object(map)
            }
            Self::Function(f) => J::String(format!("[Function: {}]", f.name)),
            Self::Error(e) => serde_json::json!({
                "name": e.name,
                "message": e.message,
                "stack": e.stack,
            }),
        }
    }

    pub fn from_json(json: &serde_json::Value) -> Self {
        use serde_json::Value as J;
        match json {
            J::Null => Self::Null,
            J::Bool(b) => Self::Bool(*b),
            J::Number(n) => Self::Number(n.as_f64().unwrap_or(f64::NAN)),
            J::String(s) => Self::from(s.as_str()),
            J::Array(items) => Self::array(items.iter().map(Self::from_json).collect()),
            J::Object(map) => {
                let mut obj = Object::new();
                for (k, v) in map {
                    obj.set(k.clone(), Self::from_json(v));
                }
                Self::object(obj)
            }
        }
    }
}

fn string_to_number(s: &str) -> f64 {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        return 0.0;
    }
    if let Some(hex) = trimmed.strip_prefix("0x").or_else(|| trimmed.strip_prefix("0X")) {
        return i64::from_str_radix(hex, 16).map_or(f64::NAN, |n| n as f64);
    }
    match trimmed {
        "Infinity" | "+Infinity" => f64::INFINITY,
        "-Infinity" => f64::NEG_INFINITY,
        _ if trimmed.contains(|c: char| c.is_ascii_alphabetic() && c != 'e' && c != 'E') => {
            f64::NAN
        }
        _ => trimmed.parse().unwrap_or(f64::NAN),
    }
}

/// Formats a number the way the console language prints it.
pub fn format_number(n: f64) -> String {
    if n.is_nan() {
        "NaN".to_string()
    } else if n.is_infinite() {
        if n > 0.0 { "Infinity" } else { "-Infinity" }.to_string()
    } else if n == 0.0 {
        "0".to_string()
    } else if n.fract() == 0.0 && n.abs() < 1e21 {
        format!("{n:.0}")
    } else {
        format!("{n}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_number() {
        assert_eq!(format_number(2.0), "2");
        assert_eq!(format_number(-0.0), "0");
        assert_eq!(format_number(0.1 + 0.2), "0.30000000000000004");
        assert_eq!(format_number(f64::NAN), "NaN");
        assert_eq!(format_number(f64::NEG_INFINITY), "-Infinity");
    }

    #[test]
    fn test_loose_equality() {
        assert!(Value::Null.loose_equals(&Value::Undefined));
        assert!(Value::from("1").loose_equals(&Value::Number(1.0)));
        assert!(!Value::from("1").strict_equals(&Value::Number(1.0)));
        assert!(!Value::Null.loose_equals(&Value::Number(0.0)));
    }

    #[test]
    fn test_member_names_walk_the_chain() {
        let mut obj = Object::new();
        obj.set("toString", Value::Null);
        obj.set("alpha", Value::Number(1.0));
        let names = Value::object(obj).member_names();
        assert_eq!(names[0], "toString");
        assert_eq!(names[1], "alpha");
        assert_eq!(names.iter().filter(|n| *n == "toString").count(), 1);
        assert!(names.contains(&"hasOwnProperty".to_string()));

        let names = Value::from("x").member_names();
        assert_eq!(names[0], "length");
        let upper = names.iter().position(|n| n == "toUpperCase").unwrap();
        let has_own = names.iter().position(|n| n == "hasOwnProperty").unwrap();
        assert!(upper < has_own);
    }

    #[test]
    fn test_json_round_trip_handles_cycles() {
        let obj = Value::object(Object::new());
        if let Value::Object(inner) = &obj {
            inner.borrow_mut().set("self", obj.clone());
        }
        let json = obj.to_json();
        assert_eq!(json["self"], serde_json::json!("[Circular]"));
    }
}
