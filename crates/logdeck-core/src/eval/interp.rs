//! Tree-walking evaluation over a binding context.

use std::rc::Rc;

use super::ast::{BinaryOp, DeclKind, Expr, LogicalOp, Stmt, UnaryOp};
use super::builtins;
use super::value::{Callable, Object, Value, format_number};
use super::{Condition, NameEnumerator};

const MAX_EVAL_DEPTH: usize = 512;

#[derive(Debug, Clone)]
struct Binding {
    name: String,
    value: Value,
    constant: bool,
}

/// A `console.*` call made by evaluated code, collected for the host.
#[derive(Debug, Clone)]
pub struct ConsoleCall {
    pub method: String,
    pub args: Vec<Value>,
}

/// Binding context: user and host bindings layered over the builtin globals.
#[derive(Debug)]
pub struct Context {
    scopes: Vec<Vec<Binding>>,
    globals: Object,
    console: Vec<ConsoleCall>,
    depth: usize,
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}

impl Context {
    pub fn new() -> Self {
        Self {
            scopes: vec![Vec::new()],
            globals: builtins::globals(),
            console: Vec::new(),
            depth: 0,
        }
    }

    /// Makes a host value visible to evaluated code as an own binding.
    pub fn expose(&mut self, name: &str, value: Value) {
        self.declare(name, value, false);
    }

    /// Drains the `console.*` calls made since the last drain.
    pub fn take_console(&mut self) -> Vec<ConsoleCall> {
        std::mem::take(&mut self.console)
    }

    pub(super) fn record_console(&mut self, method: &str, args: &[Value]) {
        self.console.push(ConsoleCall {
            method: method.to_string(),
            args: args.to_vec(),
        });
    }

    pub fn lookup(&self, name: &str) -> Option<Value> {
        for scope in self.scopes.iter().rev() {
            if let Some(binding) = scope.iter().rev().find(|b| b.name == name) {
                return Some(binding.value.clone());
            }
        }
        self.globals.get(name).cloned()
    }

    fn declare(&mut self, name: &str, value: Value, constant: bool) {
        let Some(scope) = self.scopes.last_mut() else {
            return;
        };
        match scope.iter_mut().find(|b| b.name == name) {
            Some(binding) => {
                binding.value = value;
                binding.constant = constant;
            }
            None => scope.push(Binding {
                name: name.to_string(),
                value,
                constant,
            }),
        }
    }

    fn assign(&mut self, name: &str, value: Value) -> Result<(), Condition> {
        for scope in self.scopes.iter_mut().rev() {
            if let Some(binding) = scope.iter_mut().find(|b| b.name == name) {
                if binding.constant {
                    return Err(Condition::type_error("Assignment to constant variable."));
                }
                binding.value = value;
                return Ok(());
            }
        }
        // Undeclared assignment creates a root binding.
        if let Some(root) = self.scopes.first_mut() {
            root.push(Binding {
                name: name.to_string(),
                value,
                constant: false,
            });
        }
        Ok(())
    }

    /// Runs a parsed program; the result is the last statement's value.
    pub(super) fn run(&mut self, program: &[Stmt]) -> Result<Value, Condition> {
        self.depth = 0;
        self.exec_all(program)
    }

    fn exec_all(&mut self, stmts: &[Stmt]) -> Result<Value, Condition> {
        let mut completion = Value::Undefined;
        for stmt in stmts {
            completion = self.exec(stmt)?;
        }
        Ok(completion)
    }

    fn exec(&mut self, stmt: &Stmt) -> Result<Value, Condition> {
        match stmt {
            Stmt::Expr(expr) => self.eval(expr),
            Stmt::Decl { kind, declarators } => {
                for (name, init) in declarators {
                    let value = match init {
                        Some(expr) => self.eval(expr)?,
                        None => Value::Undefined,
                    };
                    self.declare(name, value, *kind == DeclKind::Const);
                }
                Ok(Value::Undefined)
            }
            Stmt::Throw(expr) => Err(Condition::thrown(self.eval(expr)?)),
            Stmt::Block(body) => {
                self.scopes.push(Vec::new());
                let result = self.exec_all(body);
                self.scopes.pop();
                result
            }
            Stmt::Empty => Ok(Value::Undefined),
        }
    }

    fn eval(&mut self, expr: &Expr) -> Result<Value, Condition> {
        self.depth += 1;
        if self.depth > MAX_EVAL_DEPTH {
            self.depth -= 1;
            return Err(Condition::range("Maximum call stack size exceeded"));
        }
        let result = self.eval_inner(expr);
        self.depth -= 1;
        result
    }

    fn eval_inner(&mut self, expr: &Expr) -> Result<Value, Condition> {
        match expr {
            Expr::Number(n) => Ok(Value::Number(*n)),
            Expr::Str(s) => Ok(Value::from(s.as_str())),
            Expr::Bool(b) => Ok(Value::Bool(*b)),
            Expr::Null => Ok(Value::Null),
            Expr::Ident(name) => self
                .lookup(name)
                .ok_or_else(|| Condition::reference(&format!("{name} is not defined"))),
            Expr::Array(items) => {
                let values = items
                    .iter()
                    .map(|e| self.eval(e))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(Value::array(values))
            }
            Expr::Object(props) => {
                let mut obj = Object::new();
                for (key, value) in props {
                    let value = self.eval(value)?;
                    obj.set(key.clone(), value);
                }
                Ok(Value::object(obj))
            }
            Expr::Unary { op, expr } => self.eval_unary(*op, expr),
            Expr::Binary { op, lhs, rhs } => {
                let lhs = self.eval(lhs)?;
                let rhs = self.eval(rhs)?;
                binary(*op, &lhs, &rhs)
            }
            Expr::Logical { op, lhs, rhs } => {
                let lhs = self.eval(lhs)?;
                let short_circuit = match op {
                    LogicalOp::And => !lhs.truthy(),
                    LogicalOp::Or => lhs.truthy(),
                    LogicalOp::Nullish => !lhs.is_nullish(),
                };
                if short_circuit {
                    Ok(lhs)
                } else {
                    self.eval(rhs)
                }
            }
            Expr::Conditional {
                test,
                then,
                otherwise,
            } => {
                if self.eval(test)?.truthy() {
                    self.eval(then)
                } else {
                    self.eval(otherwise)
                }
            }
            Expr::Assign { op, target, value } => self.eval_assign(*op, target, value),
            Expr::Member { .. } | Expr::Index { .. } | Expr::Call { .. } => {
                Ok(self.eval_chain(expr)?.unwrap_or_default())
            }
            Expr::New { callee, args } => {
                let function = self.eval(callee)?;
                let args = self.eval_args(args)?;
                match &function {
                    Value::Function(f) if f.constructor => call(self, f, &args),
                    _ => Err(Condition::type_error(&format!(
                        "{} is not a constructor",
                        describe(callee)
                    ))),
                }
            }
        }
    }

    /// Evaluates a member/call chain. `None` means an optional link met a
    /// nullish value and the rest of the chain was skipped.
    fn eval_chain(&mut self, expr: &Expr) -> Result<Option<Value>, Condition> {
        match expr {
            Expr::Member {
                object,
                property,
                optional,
            } => {
                let Some(object) = self.eval_chain(object)? else {
                    return Ok(None);
                };
                if *optional && object.is_nullish() {
                    return Ok(None);
                }
                get_member(&object, property).map(Some)
            }
            Expr::Index {
                object,
                index,
                optional,
            } => {
                let Some(object) = self.eval_chain(object)? else {
                    return Ok(None);
                };
                if *optional && object.is_nullish() {
                    return Ok(None);
                }
                let key = self.eval(index)?;
                get_member(&object, &property_key(&key)).map(Some)
            }
            Expr::Call { callee, args } => {
                let Some(function) = self.eval_chain(callee)? else {
                    return Ok(None);
                };
                let args = self.eval_args(args)?;
                match &function {
                    Value::Function(f) => call(self, f, &args).map(Some),
                    _ => Err(Condition::type_error(&format!(
                        "{} is not a function",
                        describe(callee)
                    ))),
                }
            }
            other => self.eval(other).map(Some),
        }
    }

    fn eval_args(&mut self, args: &[Expr]) -> Result<Vec<Value>, Condition> {
        args.iter().map(|a| self.eval(a)).collect()
    }

    fn eval_unary(&mut self, op: UnaryOp, expr: &Expr) -> Result<Value, Condition> {
        if op == UnaryOp::TypeOf
            && let Expr::Ident(name) = expr
        {
            let value = self.lookup(name).unwrap_or_default();
            return Ok(Value::from(value.type_of()));
        }
        let value = self.eval(expr)?;
        Ok(match op {
            UnaryOp::Not => Value::Bool(!value.truthy()),
            UnaryOp::Neg => Value::Number(-value.to_number()),
            UnaryOp::Plus => Value::Number(value.to_number()),
            UnaryOp::TypeOf => Value::from(value.type_of()),
        })
    }

    fn eval_assign(
        &mut self,
        op: Option<BinaryOp>,
        target: &Expr,
        value: &Expr,
    ) -> Result<Value, Condition> {
        let new_value = match op {
            None => self.eval(value)?,
            Some(op) => {
                let current = self.eval(target)?;
                let rhs = self.eval(value)?;
                binary(op, &current, &rhs)?
            }
        };
        match target {
            Expr::Ident(name) => self.assign(name, new_value.clone())?,
            Expr::Member {
                object, property, ..
            } => {
                let object = self.eval(object)?;
                set_member(&object, property, new_value.clone())?;
            }
            Expr::Index { object, index, .. } => {
                let object = self.eval(object)?;
                let key = self.eval(index)?;
                set_member(&object, &property_key(&key), new_value.clone())?;
            }
            _ => return Err(Condition::syntax("Invalid left-hand side in assignment")),
        }
        Ok(new_value)
    }

    fn scope_names(&self) -> Vec<String> {
        let mut names: Vec<String> = Vec::new();
        for scope in self.scopes.iter().rev() {
            for binding in scope {
                if !names.contains(&binding.name) {
                    names.push(binding.name.clone());
                }
            }
        }
        names
    }
}

impl NameEnumerator for Context {
    fn names_at(&self, path: &[&str]) -> Option<Vec<String>> {
        let Some((first, rest)) = path.split_first() else {
            let mut names = self.scope_names();
            for key in self.globals.keys() {
                if !names.iter().any(|n| n == key) {
                    names.push(key.to_string());
                }
            }
            return Some(names);
        };
        let mut value = self.lookup(first)?;
        for segment in rest {
            value = get_member(&value, segment).ok()?;
            if matches!(value, Value::Undefined) {
                return None;
            }
        }
        Some(value.member_names())
    }
}

pub(super) fn call(ctx: &mut Context, f: &Callable, args: &[Value]) -> Result<Value, Condition> {
    let this = f.this.clone().unwrap_or_default();
    (f.call)(ctx, &this, args)
}

/// Calls any value, failing with a `TypeError` when it is not callable.
pub(super) fn call_value(
    ctx: &mut Context,
    callee: &Value,
    args: &[Value],
) -> Result<Value, Condition> {
    match callee {
        Value::Function(f) => call(ctx, f, args),
        other => Err(Condition::type_error(&format!(
            "{} is not a function",
            super::inspect(other, false)
        ))),
    }
}

fn describe(expr: &Expr) -> String {
    match expr {
        Expr::Ident(name) => name.clone(),
        Expr::Member {
            object, property, ..
        } => format!("{}.{property}", describe(object)),
        Expr::Index { object, .. } => format!("{}[...]", describe(object)),
        Expr::Call { callee, .. } => format!("{}(...)", describe(callee)),
        Expr::Number(n) => format_number(*n),
        Expr::Str(s) => format!("\"{s}\""),
        _ => "expression".to_string(),
    }
}

fn property_key(key: &Value) -> String {
    key.to_js_string()
}

fn array_index(key: &str) -> Option<usize> {
    if key.len() > 1 && key.starts_with('0') {
        return None;
    }
    key.parse().ok()
}

fn bind(receiver: &Value, name: &str, call: super::value::NativeFn) -> Value {
    Value::Function(Rc::new(Callable {
        name: name.to_string(),
        call,
        constructor: false,
        this: Some(receiver.clone()),
        statics: Object::new(),
    }))
}

/// Reads `object[key]`, binding prototype methods to the receiver.
pub(super) fn get_member(object: &Value, key: &str) -> Result<Value, Condition> {
    let own = match object {
        Value::Undefined | Value::Null => {
            return Err(Condition::type_error(&format!(
                "Cannot read properties of {} (reading '{key}')",
                object.to_js_string()
            )));
        }
        Value::Object(obj) => obj.borrow().get(key).cloned(),
        Value::Array(items) => {
            let items = items.borrow();
            if key == "length" {
                Some(Value::Number(items.len() as f64))
            } else {
                array_index(key).map(|i| items.get(i).cloned().unwrap_or_default())
            }
        }
        Value::String(s) => {
            if key == "length" {
                Some(Value::Number(s.chars().count() as f64))
            } else {
                array_index(key).map(|i| {
                    s.chars()
                        .nth(i)
                        .map_or(Value::Undefined, |c| Value::from(c.to_string()))
                })
            }
        }
        Value::Error(e) => match key {
            "name" => Some(Value::from(e.name.as_str())),
            "message" => Some(Value::from(e.message.as_str())),
            "stack" => Some(Value::from(e.stack.as_str())),
            _ => None,
        },
        Value::Function(f) => match key {
            "name" => Some(Value::from(f.name.as_str())),
            "length" => Some(Value::Number(0.0)),
            _ => f.statics.get(key).cloned(),
        },
        Value::Bool(_) | Value::Number(_) => None,
    };
    if let Some(value) = own {
        return Ok(value);
    }
    Ok(builtins::proto_method(object, key).map_or(Value::Undefined, |f| bind(object, key, f)))
}

fn set_member(object: &Value, key: &str, value: Value) -> Result<(), Condition> {
    match object {
        Value::Undefined | Value::Null => Err(Condition::type_error(&format!(
            "Cannot set properties of {} (setting '{key}')",
            object.to_js_string()
        ))),
        Value::Object(obj) => {
            obj.borrow_mut().set(key, value);
            Ok(())
        }
        Value::Array(items) => {
            let mut items = items.borrow_mut();
            if key == "length" {
                let len = value.to_number();
                if len < 0.0 || len.fract() != 0.0 || len > builtins::MAX_ARRAY_LENGTH as f64 {
                    return Err(Condition::range("Invalid array length"));
                }
                items.resize(len as usize, Value::Undefined);
            } else if let Some(i) = array_index(key) {
                if i >= builtins::MAX_ARRAY_LENGTH {
                    return Err(Condition::range("Invalid array length"));
                }
                if i >= items.len() {
                    items.resize(i + 1, Value::Undefined);
                }
                items[i] = value;
            }
            Ok(())
        }
        // Writes to primitives are silently dropped.
        _ => Ok(()),
    }
}

pub(super) fn binary(op: BinaryOp, lhs: &Value, rhs: &Value) -> Result<Value, Condition> {
    use BinaryOp as B;
    Ok(match op {
        B::Add => {
            let stringy = |v: &Value| {
                matches!(
                    v,
                    Value::String(_)
                        | Value::Array(_)
                        | Value::Object(_)
                        | Value::Function(_)
                        | Value::Error(_)
                )
            };
            if stringy(lhs) || stringy(rhs) {
                Value::from(format!("{}{}", lhs.to_js_string(), rhs.to_js_string()))
            } else {
                Value::Number(lhs.to_number() + rhs.to_number())
            }
        }
        B::Sub => Value::Number(lhs.to_number() - rhs.to_number()),
        B::Mul => Value::Number(lhs.to_number() * rhs.to_number()),
        B::Div => Value::Number(lhs.to_number() / rhs.to_number()),
        B::Rem => Value::Number(lhs.to_number() % rhs.to_number()),
        B::Pow => Value::Number(lhs.to_number().powf(rhs.to_number())),
        B::Eq => Value::Bool(lhs.loose_equals(rhs)),
        B::NotEq => Value::Bool(!lhs.loose_equals(rhs)),
        B::StrictEq => Value::Bool(lhs.strict_equals(rhs)),
        B::StrictNotEq => Value::Bool(!lhs.strict_equals(rhs)),
        B::Lt | B::Gt | B::LtEq | B::GtEq => Value::Bool(compare(op, lhs, rhs)),
        B::In => {
            let key = property_key(lhs);
            match rhs {
                Value::Object(obj) => Value::Bool(
                    obj.borrow().contains(&key) || rhs.member_names().contains(&key),
                ),
                Value::Array(_) | Value::Error(_) | Value::Function(_) => {
                    Value::Bool(rhs.member_names().contains(&key))
                }
                _ => {
                    return Err(Condition::type_error(&format!(
                        "Cannot use 'in' operator to search for '{key}' in {}",
                        rhs.to_js_string()
                    )));
                }
            }
        }
        B::InstanceOf => {
            let Value::Function(ctor) = rhs else {
                return Err(Condition::type_error(
                    "Right-hand side of 'instanceof' is not callable",
                ));
            };
            Value::Bool(builtins::instance_of(lhs, &ctor.name))
        }
    })
}

fn compare(op: BinaryOp, lhs: &Value, rhs: &Value) -> bool {
    if let (Value::String(a), Value::String(b)) = (lhs, rhs) {
        return match op {
            BinaryOp::Lt => a < b,
            BinaryOp::Gt => a > b,
            BinaryOp::LtEq => a <= b,
            _ => a >= b,
        };
    }
    let (a, b) = (lhs.to_number(), rhs.to_number());
    match op {
        BinaryOp::Lt => a < b,
        BinaryOp::Gt => a > b,
        BinaryOp::LtEq => a <= b,
        _ => a >= b,
    }
}

#[cfg(test)]
mod tests {
    use super::super::{Evaluator, Interpreter};
    use super::*;

    #[test]
    fn test_block_scopes_shadow_and_pop() {
        let mut ctx = Context::new();
        Interpreter.evaluate("let a = 1; { let a = 2 }", &mut ctx).unwrap();
        assert!(matches!(ctx.lookup("a"), Some(Value::Number(n)) if n == 1.0));
    }

    #[test]
    fn test_member_assignment_mutates_shared_object() {
        let mut ctx = Context::new();
        Interpreter
            .evaluate("const o = {n: 1}; const p = o; p.n = 5", &mut ctx)
            .unwrap();
        let v = Interpreter.evaluate("o.n", &mut ctx).unwrap();
        assert!(matches!(v, Value::Number(n) if n == 5.0));
    }

    #[test]
    fn test_array_index_and_length() {
        let mut ctx = Context::new();
        Interpreter.evaluate("let xs = [1]; xs[3] = 4", &mut ctx).unwrap();
        let v = Interpreter.evaluate("xs.length", &mut ctx).unwrap();
        assert!(matches!(v, Value::Number(n) if n == 4.0));
    }

    #[test]
    fn test_optional_chaining_short_circuits() {
        let mut ctx = Context::new();
        let v = Interpreter.evaluate("let u = null; u?.a.b", &mut ctx).unwrap();
        assert!(matches!(v, Value::Undefined));
        let v = Interpreter.evaluate("u?.f()", &mut ctx).unwrap();
        assert!(matches!(v, Value::Undefined));
    }

    #[test]
    fn test_in_and_instanceof() {
        let mut ctx = Context::new();
        let v = Interpreter
            .evaluate("'a' in {a: 1} && new TypeError('t') instanceof Error", &mut ctx)
            .unwrap();
        assert!(matches!(v, Value::Bool(true)));
    }
}
