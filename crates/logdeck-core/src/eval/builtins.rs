//! Global bindings and prototype methods.

use std::cmp::Ordering;
use std::collections::HashSet;
use std::collections::hash_map::RandomState;
use std::hash::{BuildHasher, Hasher};
use std::rc::Rc;

use serde::Serialize;

use super::Condition;
use super::interp::{Context, call_value};
use super::value::{NativeFn, Object, Value, format_number};

/// Longest string a builtin may produce, in characters.
pub(super) const MAX_STRING_LENGTH: usize = 1 << 28;

/// Longest array the language may create or grow to.
pub(super) const MAX_ARRAY_LENGTH: usize = 1 << 24;

pub const OBJECT_PROTO: &[&str] = &[
    "hasOwnProperty",
    "isPrototypeOf",
    "propertyIsEnumerable",
    "toLocaleString",
    "toString",
    "valueOf",
];

pub const STRING_PROTO: &[&str] = &[
    "at",
    "charAt",
    "charCodeAt",
    "concat",
    "endsWith",
    "includes",
    "indexOf",
    "lastIndexOf",
    "padEnd",
    "padStart",
    "repeat",
    "replace",
    "replaceAll",
    "slice",
    "split",
    "startsWith",
    "substring",
    "toLowerCase",
    "toUpperCase",
    "trim",
    "trimEnd",
    "trimStart",
    "toString",
    "valueOf",
];

pub const ARRAY_PROTO: &[&str] = &[
    "at",
    "concat",
    "every",
    "filter",
    "find",
    "findIndex",
    "forEach",
    "includes",
    "indexOf",
    "join",
    "lastIndexOf",
    "map",
    "pop",
    "push",
    "reverse",
    "shift",
    "slice",
    "some",
    "sort",
    "unshift",
    "toString",
];

pub const NUMBER_PROTO: &[&str] = &["toFixed", "toPrecision", "toString", "valueOf"];
pub const BOOLEAN_PROTO: &[&str] = &["toString", "valueOf"];
pub const FUNCTION_PROTO: &[&str] = &["apply", "call", "toString"];
pub const ERROR_PROTO: &[&str] = &["name", "message", "toString"];

type Res = Result<Value, Condition>;

fn arg(args: &[Value], i: usize) -> Value {
    args.get(i).cloned().unwrap_or_default()
}

fn arg_str(args: &[Value], i: usize) -> String {
    arg(args, i).to_js_string()
}

/// Integer argument with JS-style truncation; `default` when absent.
fn arg_int(args: &[Value], i: usize, default: i64) -> i64 {
    match args.get(i) {
        None | Some(Value::Undefined) => default,
        Some(v) => {
            let n = v.to_number();
            if n.is_nan() { 0 } else { n.trunc() as i64 }
        }
    }
}

/// Resolves a relative index (negative counts from the end) into `0..=len`.
fn relative(index: i64, len: usize) -> usize {
    if index < 0 {
        len.saturating_sub(index.unsigned_abs() as usize)
    } else {
        (index as usize).min(len)
    }
}

fn obj(entries: Vec<(&str, Value)>) -> Object {
    let mut o = Object::new();
    for (k, v) in entries {
        o.set(k, v);
    }
    o
}

pub fn globals() -> Object {
    obj(vec![
        ("Math", Value::object(math())),
        ("JSON", Value::object(json())),
        ("Object", Value::constructor("Object", object_ctor, object_statics())),
        ("Array", Value::constructor("Array", array_ctor, array_statics())),
        ("String", Value::constructor("String", string_ctor, Object::new())),
        ("Number", Value::constructor("Number", number_ctor, number_statics())),
        ("Boolean", Value::constructor("Boolean", boolean_ctor, Object::new())),
        ("Error", Value::constructor("Error", error_ctor, Object::new())),
        ("TypeError", Value::constructor("TypeError", type_error_ctor, Object::new())),
        ("RangeError", Value::constructor("RangeError", range_error_ctor, Object::new())),
        ("SyntaxError", Value::constructor("SyntaxError", syntax_error_ctor, Object::new())),
        (
            "ReferenceError",
            Value::constructor("ReferenceError", reference_error_ctor, Object::new()),
        ),
        (
            "Date",
            Value::constructor("Date", date_ctor, obj(vec![("now", Value::native("now", date_now))])),
        ),
        ("console", Value::object(console())),
        ("process", Value::object(process())),
        ("parseInt", Value::native("parseInt", parse_int)),
        ("parseFloat", Value::native("parseFloat", parse_float)),
        ("isNaN", Value::native("isNaN", is_nan)),
        ("isFinite", Value::native("isFinite", is_finite)),
        ("NaN", Value::Number(f64::NAN)),
        ("Infinity", Value::Number(f64::INFINITY)),
        ("undefined", Value::Undefined),
    ])
}

/// Whether `value instanceof <constructor named ctor>` holds.
pub fn instance_of(value: &Value, ctor: &str) -> bool {
    match (value, ctor) {
        (Value::Error(_), "Error" | "Object")
        | (Value::Array(_), "Array" | "Object")
        | (Value::Object(_) | Value::Function(_), "Object") => true,
        (Value::Error(e), name) => e.name == name,
        _ => false,
    }
}

/// Looks up a prototype method for `receiver`, walking to `Object.prototype`.
pub fn proto_method(receiver: &Value, name: &str) -> Option<NativeFn> {
    let specific: Option<NativeFn> = match receiver {
        Value::String(_) => string_method(name),
        Value::Array(_) => array_method(name),
        Value::Number(_) => number_method(name),
        Value::Bool(_) => match name {
            "toString" => Some(to_string),
            "valueOf" => Some(value_of),
            _ => None,
        },
        Value::Function(_) => match name {
            "call" => Some(function_call),
            "apply" => Some(function_apply),
            "toString" => Some(to_string),
            _ => None,
        },
        Value::Error(_) => match name {
            "toString" => Some(to_string),
            _ => None,
        },
        Value::Object(_) | Value::Undefined | Value::Null => None,
    };
    if specific.is_some() || receiver.is_nullish() {
        return specific;
    }
    match name {
        "hasOwnProperty" | "propertyIsEnumerable" => Some(has_own_property),
        "isPrototypeOf" => Some(is_prototype_of),
        "toLocaleString" | "toString" => Some(object_to_string),
        "valueOf" => Some(value_of),
        _ => None,
    }
}

// ---- Object.prototype and friends ----

fn to_string(_: &mut Context, this: &Value, _: &[Value]) -> Res {
    Ok(Value::from(this.to_js_string()))
}

fn object_to_string(_: &mut Context, this: &Value, _: &[Value]) -> Res {
    Ok(Value::from(match this {
        Value::Object(_) => "[object Object]".to_string(),
        other => other.to_js_string(),
    }))
}

fn value_of(_: &mut Context, this: &Value, _: &[Value]) -> Res {
    Ok(this.clone())
}

fn has_own_property(_: &mut Context, this: &Value, args: &[Value]) -> Res {
    let key = arg_str(args, 0);
    Ok(Value::Bool(this.own_names().contains(&key)))
}

fn is_prototype_of(_: &mut Context, _: &Value, _: &[Value]) -> Res {
    Ok(Value::Bool(false))
}

fn function_call(ctx: &mut Context, this: &Value, args: &[Value]) -> Res {
    call_value(ctx, this, args.get(1..).unwrap_or_default())
}

fn function_apply(ctx: &mut Context, this: &Value, args: &[Value]) -> Res {
    let list = match args.get(1) {
        Some(Value::Array(items)) => items.borrow().clone(),
        None | Some(Value::Undefined | Value::Null) => Vec::new(),
        Some(_) => {
            return Err(Condition::type_error(
                "CreateListFromArrayLike called on non-object",
            ));
        }
    };
    call_value(ctx, this, &list)
}

// ---- String.prototype ----

fn string_method(name: &str) -> Option<NativeFn> {
    let f: NativeFn = match name {
        "at" => |_, this, args| {
            let chars: Vec<char> = this.to_js_string().chars().collect();
            let i = arg_int(args, 0, 0);
            let idx = if i < 0 { chars.len() as i64 + i } else { i };
            Ok(usize::try_from(idx)
                .ok()
                .and_then(|i| chars.get(i))
                .map_or(Value::Undefined, |c| Value::from(c.to_string())))
        },
        "charAt" => |_, this, args| {
            let i = usize::try_from(arg_int(args, 0, 0)).ok();
            let s = this.to_js_string();
            Ok(Value::from(
                i.and_then(|i| s.chars().nth(i))
                    .map(String::from)
                    .unwrap_or_default(),
            ))
        },
        "charCodeAt" => |_, this, args| {
            let i = usize::try_from(arg_int(args, 0, 0)).ok();
            let s = this.to_js_string();
            Ok(Value::Number(
                i.and_then(|i| s.chars().nth(i))
                    .map_or(f64::NAN, |c| f64::from(u32::from(c))),
            ))
        },
        "concat" => |_, this, args| {
            let mut s = this.to_js_string();
            for a in args {
                s.push_str(&a.to_js_string());
            }
            Ok(Value::from(s))
        },
        "endsWith" => |_, this, args| {
            Ok(Value::Bool(this.to_js_string().ends_with(&arg_str(args, 0))))
        },
        "startsWith" => |_, this, args| {
            Ok(Value::Bool(this.to_js_string().starts_with(&arg_str(args, 0))))
        },
        "includes" => |_, this, args| {
            Ok(Value::Bool(this.to_js_string().contains(&arg_str(args, 0))))
        },
        "indexOf" => |_, this, args| {
            let s = this.to_js_string();
            Ok(Value::Number(
                s.find(&arg_str(args, 0))
                    .map_or(-1.0, |b| s[..b].chars().count() as f64),
            ))
        },
        "lastIndexOf" => |_, this, args| {
            let s = this.to_js_string();
            Ok(Value::Number(
                s.rfind(&arg_str(args, 0))
                    .map_or(-1.0, |b| s[..b].chars().count() as f64),
            ))
        },
        "padEnd" => |_, this, args| pad(this, args, false),
        "padStart" => |_, this, args| pad(this, args, true),
        "repeat" => |_, this, args| {
            let n = arg(args, 0).to_number();
            if n < 0.0 || !n.is_finite() {
                return Err(Condition::range(&format!(
                    "Invalid count value: {}",
                    format_number(n)
                )));
            }
            let s = this.to_js_string();
            let count = n as usize;
            if s.chars().count().saturating_mul(count) > MAX_STRING_LENGTH {
                return Err(Condition::range("Invalid string length"));
            }
            Ok(Value::from(s.repeat(count)))
        },
        "replace" => |_, this, args| {
            Ok(Value::from(this.to_js_string().replacen(
                &arg_str(args, 0),
                &arg_str(args, 1),
                1,
            )))
        },
        "replaceAll" => |_, this, args| {
            Ok(Value::from(
                this.to_js_string()
                    .replace(&arg_str(args, 0), &arg_str(args, 1)),
            ))
        },
        "slice" => |_, this, args| {
            let chars: Vec<char> = this.to_js_string().chars().collect();
            let len = chars.len();
            let start = relative(arg_int(args, 0, 0), len);
            let end = relative(arg_int(args, 1, len as i64), len);
            Ok(Value::from(
                chars
                    .get(start..end.max(start))
                    .unwrap_or_default()
                    .iter()
                    .collect::<String>(),
            ))
        },
        "substring" => |_, this, args| {
            let chars: Vec<char> = this.to_js_string().chars().collect();
            let len = chars.len() as i64;
            let a = arg_int(args, 0, 0).clamp(0, len) as usize;
            let b = arg_int(args, 1, len).clamp(0, len) as usize;
            let (start, end) = if a <= b { (a, b) } else { (b, a) };
            Ok(Value::from(chars[start..end].iter().collect::<String>()))
        },
        "split" => |_, this, args| {
            let s = this.to_js_string();
            let parts: Vec<Value> = match args.first() {
                None | Some(Value::Undefined) => vec![Value::from(s)],
                Some(sep) => {
                    let sep = sep.to_js_string();
                    if sep.is_empty() {
                        s.chars().map(|c| Value::from(c.to_string())).collect()
                    } else {
                        s.split(sep.as_str()).map(Value::from).collect()
                    }
                }
            };
            let limit = usize::try_from(arg_int(args, 1, i64::MAX)).unwrap_or(0);
            Ok(Value::array(parts.into_iter().take(limit).collect()))
        },
        "toLowerCase" => |_, this, _| Ok(Value::from(this.to_js_string().to_lowercase())),
        "toUpperCase" => |_, this, _| Ok(Value::from(this.to_js_string().to_uppercase())),
        "trim" => |_, this, _| Ok(Value::from(this.to_js_string().trim())),
        "trimEnd" => |_, this, _| Ok(Value::from(this.to_js_string().trim_end())),
        "trimStart" => |_, this, _| Ok(Value::from(this.to_js_string().trim_start())),
        "toString" => to_string,
        "valueOf" => value_of,
        _ => return None,
    };
    Some(f)
}

fn pad(this: &Value, args: &[Value], start: bool) -> Res {
    let s = this.to_js_string();
    let target = usize::try_from(arg_int(args, 0, 0)).unwrap_or(0);
    if target > MAX_STRING_LENGTH {
        return Err(Condition::range("Invalid string length"));
    }
    let fill = match args.get(1) {
        None | Some(Value::Undefined) => " ".to_string(),
        Some(v) => v.to_js_string(),
    };
    let len = s.chars().count();
    if target <= len || fill.is_empty() {
        return Ok(Value::from(s));
    }
    let padding: String = fill.chars().cycle().take(target - len).collect();
    Ok(Value::from(if start { padding + &s } else { s + &padding }))
}

// ---- Array.prototype ----

fn items_of(this: &Value) -> Vec<Value> {
    match this {
        Value::Array(items) => items.borrow().clone(),
        _ => Vec::new(),
    }
}

fn with_items<R>(this: &Value, f: impl FnOnce(&mut Vec<Value>) -> R) -> Option<R> {
    match this {
        Value::Array(items) => Some(f(&mut items.borrow_mut())),
        _ => None,
    }
}

/// Calls `callback(item, index, array)` for each item until `stop` says so.
fn each(
    ctx: &mut Context,
    this: &Value,
    args: &[Value],
    mut visit: impl FnMut(usize, &Value, Value) -> bool,
) -> Result<(), Condition> {
    let callback = arg(args, 0);
    if !matches!(callback, Value::Function(_)) {
        return Err(Condition::type_error(&format!(
            "{} is not a function",
            super::inspect(&callback, false)
        )));
    }
    for (i, item) in items_of(this).into_iter().enumerate() {
        let result = call_value(
            ctx,
            &callback,
            &[item.clone(), Value::Number(i as f64), this.clone()],
        )?;
        if !visit(i, &item, result) {
            break;
        }
    }
    Ok(())
}

fn array_method(name: &str) -> Option<NativeFn> {
    let f: NativeFn = match name {
        "at" => |_, this, args| {
            let items = items_of(this);
            let i = arg_int(args, 0, 0);
            let idx = if i < 0 { items.len() as i64 + i } else { i };
            Ok(usize::try_from(idx)
                .ok()
                .and_then(|i| items.get(i).cloned())
                .unwrap_or_default())
        },
        "concat" => |_, this, args| {
            let mut items = items_of(this);
            for a in args {
                match a {
                    Value::Array(more) => items.extend(more.borrow().iter().cloned()),
                    other => items.push(other.clone()),
                }
            }
            Ok(Value::array(items))
        },
        "every" => |ctx, this, args| {
            let mut all = true;
            each(ctx, this, args, |_, _, r| {
                all = r.truthy();
                all
            })?;
            Ok(Value::Bool(all))
        },
        "some" => |ctx, this, args| {
            let mut any = false;
            each(ctx, this, args, |_, _, r| {
                any = r.truthy();
                !any
            })?;
            Ok(Value::Bool(any))
        },
        "filter" => |ctx, this, args| {
            let mut out = Vec::new();
            each(ctx, this, args, |_, item, r| {
                if r.truthy() {
                    out.push(item.clone());
                }
                true
            })?;
            Ok(Value::array(out))
        },
        "find" => |ctx, this, args| {
            let mut found = Value::Undefined;
            each(ctx, this, args, |_, item, r| {
                if r.truthy() {
                    found = item.clone();
                    return false;
                }
                true
            })?;
            Ok(found)
        },
        "findIndex" => |ctx, this, args| {
            let mut found = -1.0;
            each(ctx, this, args, |i, _, r| {
                if r.truthy() {
                    found = i as f64;
                    return false;
                }
                true
            })?;
            Ok(Value::Number(found))
        },
        "forEach" => |ctx, this, args| {
            each(ctx, this, args, |_, _, _| true)?;
            Ok(Value::Undefined)
        },
        "map" => |ctx, this, args| {
            let mut out = Vec::new();
            each(ctx, this, args, |_, _, r| {
                out.push(r);
                true
            })?;
            Ok(Value::array(out))
        },
        "includes" => |_, this, args| {
            let needle = arg(args, 0);
            Ok(Value::Bool(items_of(this).iter().any(|v| {
                v.strict_equals(&needle)
                    || matches!((v, &needle), (Value::Number(a), Value::Number(b)) if a.is_nan() && b.is_nan())
            })))
        },
        "indexOf" => |_, this, args| {
            let needle = arg(args, 0);
            Ok(Value::Number(
                items_of(this)
                    .iter()
                    .position(|v| v.strict_equals(&needle))
                    .map_or(-1.0, |i| i as f64),
            ))
        },
        "lastIndexOf" => |_, this, args| {
            let needle = arg(args, 0);
            Ok(Value::Number(
                items_of(this)
                    .iter()
                    .rposition(|v| v.strict_equals(&needle))
                    .map_or(-1.0, |i| i as f64),
            ))
        },
        "join" | "toString" => |_, this, args| {
            let sep = match args.first() {
                None | Some(Value::Undefined) => ",".to_string(),
                Some(v) => v.to_js_string(),
            };
            let joined = items_of(this)
                .iter()
                .map(|v| {
                    if v.is_nullish() {
                        String::new()
                    } else {
                        v.to_js_string()
                    }
                })
                .collect::<Vec<_>>()
                .join(&sep);
            Ok(Value::from(joined))
        },
        "pop" => |_, this, _| Ok(with_items(this, Vec::pop).flatten().unwrap_or_default()),
        "shift" => |_, this, _| {
            Ok(with_items(this, |v| (!v.is_empty()).then(|| v.remove(0)))
                .flatten()
                .unwrap_or_default())
        },
        "push" => |_, this, args| {
            let len = with_items(this, |v| {
                v.extend(args.iter().cloned());
                v.len()
            });
            Ok(Value::Number(len.unwrap_or(0) as f64))
        },
        "unshift" => |_, this, args| {
            let len = with_items(this, |v| {
                v.splice(0..0, args.iter().cloned());
                v.len()
            });
            Ok(Value::Number(len.unwrap_or(0) as f64))
        },
        "reverse" => |_, this, _| {
            with_items(this, |v| v.reverse());
            Ok(this.clone())
        },
        "slice" => |_, this, args| {
            let items = items_of(this);
            let len = items.len();
            let start = relative(arg_int(args, 0, 0), len);
            let end = relative(arg_int(args, 1, len as i64), len);
            Ok(Value::array(
                items.get(start..end.max(start)).unwrap_or_default().to_vec(),
            ))
        },
        "sort" => |ctx, this, args| {
            let comparator = arg(args, 0);
            let mut items = items_of(this);
            insertion_sort(&mut items, |a, b| match &comparator {
                Value::Function(_) => {
                    let r = call_value(ctx, &comparator, &[a.clone(), b.clone()])?;
                    Ok(r.to_number().partial_cmp(&0.0).unwrap_or(Ordering::Equal))
                }
                _ => Ok(default_order(a, b)),
            })?;
            with_items(this, |v| *v = items);
            Ok(this.clone())
        },
        _ => return None,
    };
    Some(f)
}

/// Stable sort with a fallible comparator that need not be a total order.
fn insertion_sort(
    items: &mut [Value],
    mut compare: impl FnMut(&Value, &Value) -> Result<Ordering, Condition>,
) -> Result<(), Condition> {
    for i in 1..items.len() {
        let mut j = i;
        while j > 0 && compare(&items[j - 1], &items[j])? == Ordering::Greater {
            items.swap(j - 1, j);
            j -= 1;
        }
    }
    Ok(())
}

/// Default `sort` order: string comparison with `undefined` last.
fn default_order(a: &Value, b: &Value) -> Ordering {
    match (a.is_nullish(), b.is_nullish()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        (false, false) => a.to_js_string().cmp(&b.to_js_string()),
    }
}

// ---- Number.prototype ----

fn number_method(name: &str) -> Option<NativeFn> {
    let f: NativeFn = match name {
        "toFixed" => |_, this, args| {
            let digits = arg_int(args, 0, 0);
            if !(0..=100).contains(&digits) {
                return Err(Condition::range(
                    "toFixed() digits argument must be between 0 and 100",
                ));
            }
            let n = this.to_number();
            if !n.is_finite() {
                return Ok(Value::from(format_number(n)));
            }
            Ok(Value::from(format!("{n:.prec$}", prec = digits as usize)))
        },
        "toPrecision" => |_, this, args| {
            let n = this.to_number();
            let Some(Value::Number(p)) = args.first() else {
                return Ok(Value::from(format_number(n)));
            };
            if !(1.0..=100.0).contains(p) {
                return Err(Condition::range(
                    "toPrecision() argument must be between 1 and 100",
                ));
            }
            if n == 0.0 || !n.is_finite() {
                return Ok(Value::from(format_number(n)));
            }
            let magnitude = n.abs().log10().floor() as i64;
            let decimals = (*p as i64 - 1 - magnitude).max(0) as usize;
            Ok(Value::from(format!("{n:.decimals$}")))
        },
        "toString" => |_, this, args| {
            let n = this.to_number();
            let radix = arg_int(args, 0, 10);
            if !(2..=36).contains(&radix) {
                return Err(Condition::range(
                    "toString() radix must be between 2 and 36",
                ));
            }
            if radix == 10 || n.fract() != 0.0 || !n.is_finite() {
                return Ok(Value::from(format_number(n)));
            }
            Ok(Value::from(to_radix(n as i64, radix as u32)))
        },
        "valueOf" => value_of,
        _ => return None,
    };
    Some(f)
}

fn to_radix(n: i64, radix: u32) -> String {
    let mut digits = Vec::new();
    let mut rest = n.unsigned_abs();
    loop {
        let d = (rest % u64::from(radix)) as u32;
        digits.push(char::from_digit(d, radix).unwrap_or('0'));
        rest /= u64::from(radix);
        if rest == 0 {
            break;
        }
    }
    if n < 0 {
        digits.push('-');
    }
    digits.iter().rev().collect()
}

// ---- constructors and statics ----

fn object_ctor(_: &mut Context, _: &Value, args: &[Value]) -> Res {
    Ok(match args.first() {
        None | Some(Value::Undefined | Value::Null) => Value::object(Object::new()),
        Some(v) => v.clone(),
    })
}

fn object_statics() -> Object {
    obj(vec![
        (
            "keys",
            Value::native("keys", |_, _, args| {
                Ok(Value::array(
                    enumerable_entries(&arg(args, 0))
                        .into_iter()
                        .map(|(k, _)| Value::from(k))
                        .collect(),
                ))
            }),
        ),
        (
            "values",
            Value::native("values", |_, _, args| {
                Ok(Value::array(
                    enumerable_entries(&arg(args, 0))
                        .into_iter()
                        .map(|(_, v)| v)
                        .collect(),
                ))
            }),
        ),
        (
            "entries",
            Value::native("entries", |_, _, args| {
                Ok(Value::array(
                    enumerable_entries(&arg(args, 0))
                        .into_iter()
                        .map(|(k, v)| Value::array(vec![Value::from(k), v]))
                        .collect(),
                ))
            }),
        ),
        (
            "assign",
            Value::native("assign", |_, _, args| {
                let target = arg(args, 0);
                let Value::Object(dest) = &target else {
                    return Err(Condition::type_error(
                        "Cannot convert undefined or null to object",
                    ));
                };
                for source in args.iter().skip(1) {
                    for (k, v) in enumerable_entries(source) {
                        dest.borrow_mut().set(k, v);
                    }
                }
                Ok(target)
            }),
        ),
        (
            "fromEntries",
            Value::native("fromEntries", |_, _, args| {
                let mut out = Object::new();
                for pair in items_of(&arg(args, 0)) {
                    let pair = items_of(&pair);
                    out.set(arg_str(&pair, 0), arg(&pair, 1));
                }
                Ok(Value::object(out))
            }),
        ),
        ("freeze", Value::native("freeze", |_, _, args| Ok(arg(args, 0)))),
    ])
}

fn enumerable_entries(value: &Value) -> Vec<(String, Value)> {
    match value {
        Value::Object(o) => o
            .borrow()
            .entries()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect(),
        Value::Array(items) => items
            .borrow()
            .iter()
            .enumerate()
            .map(|(i, v)| (i.to_string(), v.clone()))
            .collect(),
        Value::String(s) => s
            .chars()
            .enumerate()
            .map(|(i, c)| (i.to_string(), Value::from(c.to_string())))
            .collect(),
        _ => Vec::new(),
    }
}

fn array_ctor(_: &mut Context, _: &Value, args: &[Value]) -> Res {
    if let [Value::Number(n)] = args {
        if *n < 0.0 || n.fract() != 0.0 || *n > MAX_ARRAY_LENGTH as f64 {
            return Err(Condition::range("Invalid array length"));
        }
        return Ok(Value::array(vec![Value::Undefined; *n as usize]));
    }
    Ok(Value::array(args.to_vec()))
}

fn array_statics() -> Object {
    obj(vec![
        (
            "isArray",
            Value::native("isArray", |_, _, args| {
                Ok(Value::Bool(matches!(args.first(), Some(Value::Array(_)))))
            }),
        ),
        ("of", Value::native("of", |_, _, args| Ok(Value::array(args.to_vec())))),
        (
            "from",
            Value::native("from", |_, _, args| {
                Ok(Value::array(
                    enumerable_entries(&arg(args, 0))
                        .into_iter()
                        .map(|(_, v)| v)
                        .collect(),
                ))
            }),
        ),
    ])
}

fn string_ctor(_: &mut Context, _: &Value, args: &[Value]) -> Res {
    Ok(Value::from(match args.first() {
        None => String::new(),
        Some(v) => v.to_js_string(),
    }))
}

fn number_ctor(_: &mut Context, _: &Value, args: &[Value]) -> Res {
    Ok(Value::Number(args.first().map_or(0.0, Value::to_number)))
}

fn number_statics() -> Object {
    obj(vec![
        (
            "isInteger",
            Value::native("isInteger", |_, _, args| {
                Ok(Value::Bool(
                    matches!(args.first(), Some(Value::Number(n)) if n.is_finite() && n.fract() == 0.0),
                ))
            }),
        ),
        ("MAX_SAFE_INTEGER", Value::Number(9_007_199_254_740_991.0)),
        ("MIN_SAFE_INTEGER", Value::Number(-9_007_199_254_740_991.0)),
        ("EPSILON", Value::Number(f64::EPSILON)),
    ])
}

fn boolean_ctor(_: &mut Context, _: &Value, args: &[Value]) -> Res {
    Ok(Value::Bool(args.first().is_some_and(Value::truthy)))
}

macro_rules! error_constructors {
    ($($fn_name:ident => $error_name:literal),* $(,)?) => {
        $(
            fn $fn_name(_: &mut Context, _: &Value, args: &[Value]) -> Res {
                let message = match args.first() {
                    None | Some(Value::Undefined) => String::new(),
                    Some(v) => v.to_js_string(),
                };
                Ok(Value::error($error_name, &message))
            }
        )*
    };
}

error_constructors! {
    error_ctor => "Error",
    type_error_ctor => "TypeError",
    range_error_ctor => "RangeError",
    syntax_error_ctor => "SyntaxError",
    reference_error_ctor => "ReferenceError",
}

fn date_ctor(_: &mut Context, _: &Value, _: &[Value]) -> Res {
    Ok(Value::from(chrono::Local::now().to_rfc3339()))
}

fn date_now(_: &mut Context, _: &Value, _: &[Value]) -> Res {
    Ok(Value::Number(chrono::Utc::now().timestamp_millis() as f64))
}

fn parse_int(_: &mut Context, _: &Value, args: &[Value]) -> Res {
    let s = arg_str(args, 0);
    let s = s.trim_start();
    let (negative, s) = match s.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, s.strip_prefix('+').unwrap_or(s)),
    };
    let mut radix = arg_int(args, 1, 0);
    let mut digits = s;
    if (radix == 0 || radix == 16)
        && let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X"))
    {
        digits = hex;
        radix = 16;
    }
    if radix == 0 {
        radix = 10;
    }
    if !(2..=36).contains(&radix) {
        return Ok(Value::Number(f64::NAN));
    }
    let radix = radix as u32;
    let valid: String = digits.chars().take_while(|c| c.is_digit(radix)).collect();
    if valid.is_empty() {
        return Ok(Value::Number(f64::NAN));
    }
    let n = valid
        .chars()
        .filter_map(|c| c.to_digit(radix))
        .fold(0.0, |acc, d| acc * f64::from(radix) + f64::from(d));
    Ok(Value::Number(if negative { -n } else { n }))
}

fn parse_float(_: &mut Context, _: &Value, args: &[Value]) -> Res {
    let s = arg_str(args, 0);
    let s = s.trim_start();
    let bytes = s.as_bytes();
    let mut end = 0;
    if end < bytes.len() && (bytes[end] == b'+' || bytes[end] == b'-') {
        end += 1;
    }
    if s[end..].starts_with("Infinity") {
        return Ok(Value::Number(if s.starts_with('-') {
            f64::NEG_INFINITY
        } else {
            f64::INFINITY
        }));
    }
    let mut seen_dot = false;
    let mut seen_digit = false;
    while end < bytes.len() {
        match bytes[end] {
            b'0'..=b'9' => seen_digit = true,
            b'.' if !seen_dot => seen_dot = true,
            _ => break,
        }
        end += 1;
    }
    if seen_digit && end < bytes.len() && (bytes[end] == b'e' || bytes[end] == b'E') {
        let mut exp = end + 1;
        if exp < bytes.len() && (bytes[exp] == b'+' || bytes[exp] == b'-') {
            exp += 1;
        }
        if exp < bytes.len() && bytes[exp].is_ascii_digit() {
            end = exp;
            while end < bytes.len() && bytes[end].is_ascii_digit() {
                end += 1;
            }
        }
    }
    if !seen_digit {
        return Ok(Value::Number(f64::NAN));
    }
    Ok(Value::Number(s[..end].parse().unwrap_or(f64::NAN)))
}

fn is_nan(_: &mut Context, _: &Value, args: &[Value]) -> Res {
    Ok(Value::Bool(arg(args, 0).to_number().is_nan()))
}

fn is_finite(_: &mut Context, _: &Value, args: &[Value]) -> Res {
    Ok(Value::Bool(arg(args, 0).to_number().is_finite()))
}

// ---- Math ----

macro_rules! math_unary {
    ($($name:literal => $f:expr),* $(,)?) => {
        vec![$(
            ($name, Value::native($name, |_, _, args| {
                let f: fn(f64) -> f64 = $f;
                Ok(Value::Number(f(arg(args, 0).to_number())))
            })),
        )*]
    };
}

fn math() -> Object {
    let mut entries = vec![
        ("PI", Value::Number(std::f64::consts::PI)),
        ("E", Value::Number(std::f64::consts::E)),
        ("LN2", Value::Number(std::f64::consts::LN_2)),
        ("LN10", Value::Number(std::f64::consts::LN_10)),
        ("SQRT2", Value::Number(std::f64::consts::SQRT_2)),
    ];
    entries.extend(math_unary! {
        "abs" => f64::abs,
        "ceil" => f64::ceil,
        "floor" => f64::floor,
        "round" => |n| (n + 0.5).floor(),
        "trunc" => f64::trunc,
        "sign" => |n| if n.is_nan() || n == 0.0 { n } else { n.signum() },
        "sqrt" => f64::sqrt,
        "cbrt" => f64::cbrt,
        "exp" => f64::exp,
        "log" => f64::ln,
        "log2" => f64::log2,
        "log10" => f64::log10,
        "sin" => f64::sin,
        "cos" => f64::cos,
        "tan" => f64::tan,
    });
    entries.extend([
        (
            "pow",
            Value::native("pow", |_, _, args| {
                Ok(Value::Number(
                    arg(args, 0).to_number().powf(arg(args, 1).to_number()),
                ))
            }),
        ),
        (
            "atan2",
            Value::native("atan2", |_, _, args| {
                Ok(Value::Number(
                    arg(args, 0).to_number().atan2(arg(args, 1).to_number()),
                ))
            }),
        ),
        (
            "hypot",
            Value::native("hypot", |_, _, args| {
                Ok(Value::Number(
                    args.iter()
                        .map(|a| a.to_number().powi(2))
                        .sum::<f64>()
                        .sqrt(),
                ))
            }),
        ),
        (
            "max",
            Value::native("max", |_, _, args| {
                Ok(Value::Number(args.iter().map(Value::to_number).fold(
                    f64::NEG_INFINITY,
                    |acc, n| if n.is_nan() || acc.is_nan() { f64::NAN } else { acc.max(n) },
                )))
            }),
        ),
        (
            "min",
            Value::native("min", |_, _, args| {
                Ok(Value::Number(args.iter().map(Value::to_number).fold(
                    f64::INFINITY,
                    |acc, n| if n.is_nan() || acc.is_nan() { f64::NAN } else { acc.min(n) },
                )))
            }),
        ),
        (
            "random",
            Value::native("random", |_, _, _| {
                let bits = RandomState::new().build_hasher().finish();
                Ok(Value::Number((bits >> 11) as f64 / (1_u64 << 53) as f64))
            }),
        ),
    ]);
    obj(entries)
}

// ---- JSON ----

fn json() -> Object {
    obj(vec![
        ("stringify", Value::native("stringify", json_stringify)),
        ("parse", Value::native("parse", json_parse)),
    ])
}

fn json_stringify(_: &mut Context, _: &Value, args: &[Value]) -> Res {
    let mut seen = HashSet::new();
    let Some(json) = to_json_strict(&arg(args, 0), &mut seen)? else {
        return Ok(Value::Undefined);
    };
    let indent = match args.get(2) {
        Some(Value::Number(n)) if *n >= 1.0 => " ".repeat((*n as usize).min(10)),
        Some(Value::String(s)) => s.chars().take(10).collect(),
        _ => String::new(),
    };
    let text = if indent.is_empty() {
        serde_json::to_string(&json)
    } else {
        let mut buf = Vec::new();
        let formatter = serde_json::ser::PrettyFormatter::with_indent(indent.as_bytes());
        let mut ser = serde_json::Serializer::with_formatter(&mut buf, formatter);
        json.serialize(&mut ser)
            .map(|()| String::from_utf8_lossy(&buf).into_owned())
    };
    text.map(Value::from)
        .map_err(|e| Condition::type_error(&e.to_string()))
}

/// JSON conversion with `JSON.stringify` rules: functions and `undefined`
/// disappear from objects, become `null` in arrays, and cycles are errors.
fn to_json_strict(
    value: &Value,
    seen: &mut HashSet<usize>,
) -> Result<Option<serde_json::Value>, Condition> {
    use serde_json::Value as J;
    Ok(Some(match value {
        Value::Undefined | Value::Function(_) => return Ok(None),
        Value::Null => J::Null,
        Value::Bool(b) => J::Bool(*b),
        Value::Number(n) => serde_json::Number::from_f64(*n).map_or(J::Null, J::Number),
        Value::String(s) => J::String(s.to_string()),
        Value::Error(_) => J::Object(serde_json::Map::new()),
        Value::Array(items) => {
            let ptr = Rc::as_ptr(items) as usize;
            if !seen.insert(ptr) {
                return Err(Condition::type_error(
                    "Converting circular structure to JSON",
                ));
            }
            let mut out = Vec::new();
            for item in items.borrow().iter() {
                out.push(to_json_strict(item, seen)?.unwrap_or(J::Null));
            }
            seen.remove(&ptr);
            J::Array(out)
        }
        Value::Object(o) => {
            let ptr = Rc::as_ptr(o) as usize;
            if !seen.insert(ptr) {
                return Err(Condition::type_error(
                    "Converting circular structure to JSON",
                ));
            }
            let mut map = serde_json::Map::new();
            for (k, v) in o.borrow().entries() {
                if let Some(json) = to_json_strict(v, seen)? {
                    map.insert(k.to_string(), json);
                }
            }
            seen.remove(&ptr);
            J::Object(map)
        }
    }))
}

fn json_parse(_: &mut Context, _: &Value, args: &[Value]) -> Res {
    let text = arg_str(args, 0);
    serde_json::from_str::<serde_json::Value>(&text)
        .map(|json| Value::from_json(&json))
        .map_err(|e| Condition::syntax(&format!("Unexpected token in JSON: {e}")))
}

// ---- console and process ----

macro_rules! console_methods {
    ($($name:literal),* $(,)?) => {
        vec![$(
            ($name, Value::native($name, |ctx, _, args| {
                ctx.record_console($name, args);
                Ok(Value::Undefined)
            })),
        )*]
    };
}

fn console() -> Object {
    obj(console_methods!["log", "info", "warn", "error", "debug", "dir", "trace"])
}

fn process() -> Object {
    let argv = std::env::args().map(Value::from).collect();
    let mut env = Object::new();
    for (k, v) in std::env::vars() {
        env.set(k, Value::from(v));
    }
    obj(vec![
        ("argv", Value::array(argv)),
        ("env", Value::object(env)),
        ("pid", Value::Number(f64::from(std::process::id()))),
        ("platform", Value::from(std::env::consts::OS)),
        ("arch", Value::from(std::env::consts::ARCH)),
        ("title", Value::from("logdeck")),
        (
            "version",
            Value::from(concat!("v", env!("CARGO_PKG_VERSION"))),
        ),
        (
            "cwd",
            Value::native("cwd", |_, _, _| {
                std::env::current_dir()
                    .map(|p| Value::from(p.display().to_string()))
                    .map_err(|e| Condition::thrown(Value::error("Error", &e.to_string())))
            }),
        ),
    ])
}

#[cfg(test)]
mod tests {
    use super::super::{Evaluator, Interpreter, inspect};
    use super::*;

    fn show(src: &str) -> String {
        let mut ctx = Context::new();
        inspect(&Interpreter.evaluate(src, &mut ctx).unwrap(), false)
    }

    #[test]
    fn test_string_methods() {
        assert_eq!(show("'a,b,,c'.split(',')"), "[ 'a', 'b', '', 'c' ]");
        assert_eq!(show("'hello'.slice(-3)"), "'llo'");
        assert_eq!(show("'5'.padStart(3, '0')"), "'005'");
        assert_eq!(show("'abcabc'.lastIndexOf('b')"), "4");
        assert_eq!(show("'x'.repeat(3)"), "'xxx'");
    }

    #[test]
    fn test_array_methods_mutate_in_place() {
        let mut ctx = Context::new();
        Interpreter
            .evaluate("const xs = [1, 2]; xs.push(3, 4); xs.shift()", &mut ctx)
            .unwrap();
        let v = Interpreter.evaluate("xs", &mut ctx).unwrap();
        assert_eq!(inspect(&v, false), "[ 2, 3, 4 ]");
    }

    #[test]
    fn test_callbacks_with_builtins() {
        assert_eq!(show("['1', 'x', '3'].filter(isNaN)"), "[ 'x' ]");
        assert_eq!(show("[1, 2].some(isNaN)"), "false");
    }

    #[test]
    fn test_statics_on_constructors() {
        assert_eq!(show("Array.isArray([])"), "true");
        assert_eq!(show("Number.isInteger(4)"), "true");
        assert_eq!(show("Object.entries({a: 1})"), "[ [ 'a', 1 ] ]");
        assert_eq!(show("[] instanceof Array"), "true");
    }

    #[test]
    fn test_json_stringify_rules() {
        assert_eq!(
            show("JSON.stringify({a: undefined, b: [undefined], c: 1})"),
            "'{\"b\":[null],\"c\":1}'"
        );
        let mut ctx = Context::new();
        let err = Interpreter
            .evaluate("const o = {}; o.o = o; JSON.stringify(o)", &mut ctx)
            .unwrap_err();
        assert_eq!(err.kind, super::super::ConditionKind::TypeError);
    }

    #[test]
    fn test_parse_numbers() {
        assert_eq!(show("parseInt('0x1F')"), "31");
        assert_eq!(show("parseInt('-12.9')"), "-12");
        assert_eq!(show("parseFloat('3.5e2kg')"), "350");
        assert_eq!(show("isNaN(parseFloat('kg'))"), "true");
    }

    #[test]
    fn test_math_random_in_range() {
        let mut ctx = Context::new();
        for _ in 0..20 {
            let Value::Number(n) = Interpreter.evaluate("Math.random()", &mut ctx).unwrap()
            else {
                panic!("expected number");
            };
            assert!((0.0..1.0).contains(&n));
        }
    }
}
