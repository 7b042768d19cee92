//! Runtime values and lexical scopes.

use std::cell::RefCell;
use std::cmp::Ordering;
use std::fmt;
use std::path::PathBuf;
use std::rc::Rc;

use indexmap::{IndexMap, IndexSet};
use tm_ast::{Expr, Span, Stmt};

use crate::error::{ErrorKind, ExecError, ExecResult};
use crate::runtime::Runtime;

/// A scope shared by the closures created in it.
pub type Env = Rc<RefCell<Scope>>;

/// One level of name bindings. Lookups fall back to `parent`.
#[derive(Default)]
pub struct Scope {
    vars: IndexMap<String, Value>,
    parent: Option<Env>,
}

impl Scope {
    pub fn new_env(parent: Option<Env>) -> Env {
        Rc::new(RefCell::new(Scope {
            vars: IndexMap::new(),
            parent,
        }))
    }

    /// Binding in this scope only.
    pub fn get(&self, name: &str) -> Option<Value> {
        self.vars.get(name).cloned()
    }

    pub fn set(&mut self, name: impl Into<String>, value: Value) {
        self.vars.insert(name.into(), value);
    }

    pub fn names(&self) -> Vec<String> {
        self.vars.keys().cloned().collect()
    }

    /// Resolve `name` through the scope chain starting at `env`.
    pub fn lookup(env: &Env, name: &str) -> Option<Value> {
        let mut current = env.clone();
        loop {
            let parent = {
                let scope = current.borrow();
                if let Some(value) = scope.vars.get(name) {
                    return Some(value.clone());
                }
                scope.parent.clone()
            };
            current = parent?;
        }
    }
}

/// Hashable projection of a value, used for set members and dict keys.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Key {
    None,
    Bool(bool),
    Int(i64),
    Float(u64),
    Str(Rc<str>),
    Tuple(Rc<[Key]>),
    Ellipsis,
}

impl Key {
    pub fn from_value(value: &Value, span: Span) -> ExecResult<Key> {
        Ok(match value {
            Value::None => Key::None,
            Value::Bool(b) => Key::Bool(*b),
            Value::Int(i) => Key::Int(*i),
            Value::Float(f) if f.fract() == 0.0 && f.abs() < i64::MAX as f64 => Key::Int(*f as i64),
            Value::Float(f) => Key::Float(f.to_bits()),
            Value::Str(s) => Key::Str(s.clone()),
            Value::Ellipsis => Key::Ellipsis,
            Value::Tuple(items) => Key::Tuple(
                items
                    .iter()
                    .map(|item| Key::from_value(item, span))
                    .collect::<ExecResult<Vec<_>>>()?
                    .into(),
            ),
            other => {
                return Err(ExecError::new(
                    ErrorKind::TypeError,
                    format!("unhashable type: '{}'", other.type_name()),
                    span,
                ))
            }
        })
    }

    pub fn to_value(&self) -> Value {
        match self {
            Key::None => Value::None,
            Key::Bool(b) => Value::Bool(*b),
            Key::Int(i) => Value::Int(*i),
            Key::Float(bits) => Value::Float(f64::from_bits(*bits)),
            Key::Str(s) => Value::Str(s.clone()),
            Key::Tuple(items) => Value::Tuple(items.iter().map(Key::to_value).collect()),
            Key::Ellipsis => Value::Ellipsis,
        }
    }
}

/// Body of a user-defined function: a `def` block or a lambda expression.
pub enum FunctionBody {
    Block(Rc<[Stmt]>),
    Expr(Rc<Expr>),
}

pub struct Function {
    pub name: String,
    /// Parameter names with their default values, evaluated at definition.
    pub params: Vec<(String, Option<Value>)>,
    pub body: FunctionBody,
    pub env: Env,
}

/// Arguments of a call to a native function.
pub struct Args {
    pub positional: Vec<Value>,
    pub keywords: Vec<(String, Value)>,
    pub span: Span,
}

pub type BuiltinFn = fn(&mut Runtime, Args) -> ExecResult<Value>;

#[derive(Clone, Copy)]
pub struct Builtin {
    pub name: &'static str,
    pub func: BuiltinFn,
}

/// `receiver.name`, resolved against the receiver's type when called.
pub struct BoundMethod {
    pub receiver: Value,
    pub name: &'static str,
}

/// An executed module and its global scope.
pub struct ModuleObject {
    pub name: String,
    pub origin: Option<PathBuf>,
    pub(crate) globals: Env,
}

impl ModuleObject {
    pub fn new(name: impl Into<String>, origin: Option<PathBuf>, globals: Env) -> Self {
        Self {
            name: name.into(),
            origin,
            globals,
        }
    }

    /// Look up a global of this module.
    pub fn get(&self, name: &str) -> Option<Value> {
        self.globals.borrow().get(name)
    }

    pub fn names(&self) -> Vec<String> {
        self.globals.borrow().names()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RangeValue {
    pub start: i64,
    pub stop: i64,
    pub step: i64,
}

impl RangeValue {
    pub fn len(&self) -> usize {
        let span = if self.step > 0 {
            self.stop.saturating_sub(self.start)
        } else {
            self.start.saturating_sub(self.stop)
        };
        if span <= 0 {
            return 0;
        }
        let step = self.step.unsigned_abs();
        ((span as u64 + step - 1) / step) as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, index: usize) -> Option<i64> {
        (index < self.len()).then(|| self.start + self.step * index as i64)
    }

    pub fn contains(&self, value: i64) -> bool {
        let in_bounds = if self.step > 0 {
            self.start <= value && value < self.stop
        } else {
            self.stop < value && value <= self.start
        };
        in_bounds && (value - self.start) % self.step == 0
    }

    pub fn values(&self) -> Vec<Value> {
        (0..self.len())
            .filter_map(|i| self.get(i))
            .map(Value::Int)
            .collect()
    }
}

#[derive(Clone)]
pub enum Value {
    None,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(Rc<str>),
    Ellipsis,
    List(Rc<RefCell<Vec<Value>>>),
    Tuple(Rc<[Value]>),
    Set(Rc<RefCell<IndexSet<Key>>>),
    Dict(Rc<RefCell<IndexMap<Key, Value>>>),
    Function(Rc<Function>),
    Builtin(Builtin),
    Method(Rc<BoundMethod>),
    Module(Rc<ModuleObject>),
    Range(RangeValue),
    /// Single-pass iterator. Lazy sources are materialized up front.
    Iterator(Rc<RefCell<std::vec::IntoIter<Value>>>),
}

#[derive(Clone, Copy, PartialEq, PartialOrd)]
pub(crate) enum Number {
    Int(i64),
    Float(f64),
}

impl Number {
    pub(crate) fn as_f64(self) -> f64 {
        match self {
            Number::Int(i) => i as f64,
            Number::Float(f) => f,
        }
    }
}

impl Value {
    pub fn str(s: impl AsRef<str>) -> Value {
        Value::Str(Rc::from(s.as_ref()))
    }

    pub fn list(items: Vec<Value>) -> Value {
        Value::List(Rc::new(RefCell::new(items)))
    }

    pub fn tuple(items: Vec<Value>) -> Value {
        Value::Tuple(items.into())
    }

    pub fn iterator(items: Vec<Value>) -> Value {
        Value::Iterator(Rc::new(RefCell::new(items.into_iter())))
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::None => "NoneType",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Str(_) => "str",
            Value::Ellipsis => "ellipsis",
            Value::List(_) => "list",
            Value::Tuple(_) => "tuple",
            Value::Set(_) => "set",
            Value::Dict(_) => "dict",
            Value::Function(_) => "function",
            Value::Builtin(_) => "builtin_function_or_method",
            Value::Method(_) => "method",
            Value::Module(_) => "module",
            Value::Range(_) => "range",
            Value::Iterator(_) => "iterator",
        }
    }

    pub(crate) fn number(&self) -> Option<Number> {
        match self {
            Value::Bool(b) => Some(Number::Int(*b as i64)),
            Value::Int(i) => Some(Number::Int(*i)),
            Value::Float(f) => Some(Number::Float(*f)),
            _ => None,
        }
    }

    /// Integer view of ints and bools.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Bool(b) => Some(*b as i64),
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn truthy(&self) -> bool {
        match self {
            Value::None => false,
            Value::Bool(b) => *b,
            Value::Int(i) => *i != 0,
            Value::Float(f) => *f != 0.0,
            Value::Str(s) => !s.is_empty(),
            Value::List(items) => !items.borrow().is_empty(),
            Value::Tuple(items) => !items.is_empty(),
            Value::Set(items) => !items.borrow().is_empty(),
            Value::Dict(entries) => !entries.borrow().is_empty(),
            Value::Range(range) => !range.is_empty(),
            Value::Ellipsis
            | Value::Function(_)
            | Value::Builtin(_)
            | Value::Method(_)
            | Value::Module(_)
            | Value::Iterator(_) => true,
        }
    }

    pub fn equals(&self, other: &Value) -> bool {
        if let (Some(a), Some(b)) = (self.number(), other.number()) {
            return match (a, b) {
                (Number::Int(a), Number::Int(b)) => a == b,
                (a, b) => a.as_f64() == b.as_f64(),
            };
        }
        match (self, other) {
            (Value::None, Value::None) | (Value::Ellipsis, Value::Ellipsis) => true,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::List(a), Value::List(b)) => {
                Rc::ptr_eq(a, b) || seq_equals(&a.borrow(), &b.borrow())
            }
            (Value::Tuple(a), Value::Tuple(b)) => seq_equals(a, b),
            (Value::Set(a), Value::Set(b)) => {
                let (a, b) = (a.borrow(), b.borrow());
                a.len() == b.len() && a.iter().all(|key| b.contains(key))
            }
            (Value::Dict(a), Value::Dict(b)) => {
                let (a, b) = (a.borrow(), b.borrow());
                a.len() == b.len()
                    && a.iter().all(|(key, value)| {
                        b.get(key).map_or(false, |other| value.equals(other))
                    })
            }
            (Value::Function(a), Value::Function(b)) => Rc::ptr_eq(a, b),
            (Value::Builtin(a), Value::Builtin(b)) => a.name == b.name,
            (Value::Method(a), Value::Method(b)) => Rc::ptr_eq(a, b),
            (Value::Module(a), Value::Module(b)) => Rc::ptr_eq(a, b),
            (Value::Range(a), Value::Range(b)) => a == b,
            (Value::Iterator(a), Value::Iterator(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }

    /// Ordering for `<`, `sorted`, `min` and `max`; `None` when the two
    /// values are not comparable.
    pub fn compare(&self, other: &Value) -> Option<Ordering> {
        if let (Some(a), Some(b)) = (self.number(), other.number()) {
            return match (a, b) {
                (Number::Int(a), Number::Int(b)) => Some(a.cmp(&b)),
                (a, b) => a.as_f64().partial_cmp(&b.as_f64()),
            };
        }
        match (self, other) {
            (Value::Str(a), Value::Str(b)) => Some(a.cmp(b)),
            (Value::List(a), Value::List(b)) => seq_compare(&a.borrow(), &b.borrow()),
            (Value::Tuple(a), Value::Tuple(b)) => seq_compare(a, b),
            _ => None,
        }
    }

    /// `repr(value)`
    pub fn repr(&self) -> String {
        match self {
            Value::Str(s) => {
                let mut out = String::with_capacity(s.len() + 2);
                out.push('\'');
                for c in s.chars() {
                    match c {
                        '\'' => out.push_str("\\'"),
                        '\\' => out.push_str("\\\\"),
                        '\n' => out.push_str("\\n"),
                        '\t' => out.push_str("\\t"),
                        '\r' => out.push_str("\\r"),
                        c => out.push(c),
                    }
                }
                out.push('\'');
                out
            }
            other => other.to_string(),
        }
    }
}

fn seq_equals(a: &[Value], b: &[Value]) -> bool {
    a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.equals(y))
}

fn seq_compare(a: &[Value], b: &[Value]) -> Option<Ordering> {
    for (x, y) in a.iter().zip(b) {
        if !x.equals(y) {
            return x.compare(y);
        }
    }
    Some(a.len().cmp(&b.len()))
}

fn join_repr<'a>(items: impl Iterator<Item = &'a Value>) -> String {
    items.map(Value::repr).collect::<Vec<_>>().join(", ")
}

fn format_float(f: f64) -> String {
    if f.is_nan() {
        "nan".to_string()
    } else if f.is_infinite() {
        (if f > 0.0 { "inf" } else { "-inf" }).to_string()
    } else {
        format!("{f:?}")
    }
}

/// `str(value)`
impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::None => f.write_str("None"),
            Value::Bool(true) => f.write_str("True"),
            Value::Bool(false) => f.write_str("False"),
            Value::Int(i) => write!(f, "{i}"),
            Value::Float(x) => f.write_str(&format_float(*x)),
            Value::Str(s) => f.write_str(s),
            Value::Ellipsis => f.write_str("Ellipsis"),
            Value::List(items) => write!(f, "[{}]", join_repr(items.borrow().iter())),
            Value::Tuple(items) if items.len() == 1 => write!(f, "({},)", items[0].repr()),
            Value::Tuple(items) => write!(f, "({})", join_repr(items.iter())),
            Value::Set(items) => {
                let items = items.borrow();
                if items.is_empty() {
                    return f.write_str("set()");
                }
                let values: Vec<Value> = items.iter().map(Key::to_value).collect();
                write!(f, "{{{}}}", join_repr(values.iter()))
            }
            Value::Dict(entries) => {
                let entries = entries.borrow();
                let parts: Vec<String> = entries
                    .iter()
                    .map(|(key, value)| format!("{}: {}", key.to_value().repr(), value.repr()))
                    .collect();
                write!(f, "{{{}}}", parts.join(", "))
            }
            Value::Function(func) => write!(f, "<function {}>", func.name),
            Value::Builtin(builtin) => write!(f, "<built-in function {}>", builtin.name),
            Value::Method(method) => write!(
                f,
                "<built-in method {} of {} object>",
                method.name,
                method.receiver.type_name()
            ),
            Value::Module(module) => write!(f, "<module '{}'>", module.name),
            Value::Range(r) if r.step == 1 => write!(f, "range({}, {})", r.start, r.stop),
            Value::Range(r) => write!(f, "range({}, {}, {})", r.start, r.stop, r.step),
            Value::Iterator(_) => f.write_str("<iterator>"),
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.repr())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tm_ast::DUMMY_SP;

    #[test]
    fn numbers_compare_across_types() {
        assert!(Value::Int(2).equals(&Value::Float(2.0)));
        assert!(Value::Bool(true).equals(&Value::Int(1)));
        assert_eq!(
            Value::Int(1).compare(&Value::Float(1.5)),
            Some(Ordering::Less)
        );
        assert_eq!(Value::Int(1).compare(&Value::str("a")), None);
    }

    #[test]
    fn sequences_compare_lexicographically() {
        let a = Value::tuple(vec![Value::Int(1), Value::Int(2)]);
        let b = Value::tuple(vec![Value::Int(1), Value::Int(3)]);
        assert_eq!(a.compare(&b), Some(Ordering::Less));
        assert!(Value::list(vec![Value::Int(1)]).equals(&Value::list(vec![Value::Int(1)])));
    }

    #[test]
    fn repr_matches_source_syntax() {
        let value = Value::list(vec![
            Value::str("it's"),
            Value::Float(1.0),
            Value::None,
            Value::tuple(vec![Value::Int(1)]),
        ]);
        assert_eq!(value.repr(), "['it\\'s', 1.0, None, (1,)]");
        assert_eq!(Value::str("plain").to_string(), "plain");
    }

    #[test]
    fn unhashable_values_are_rejected() {
        let err = Key::from_value(&Value::list(vec![]), DUMMY_SP).err().unwrap();
        assert_eq!(err.kind, ErrorKind::TypeError);
        assert_eq!(Key::from_value(&Value::Float(3.0), DUMMY_SP).unwrap(), Key::Int(3));
    }

    #[test]
    fn ranges_count_like_the_builtin() {
        let r = RangeValue { start: 0, stop: 10, step: 3 };
        assert_eq!(r.len(), 4);
        assert!(r.contains(9));
        assert!(!r.contains(10));
        let down = RangeValue { start: 5, stop: 0, step: -2 };
        assert_eq!(down.values().len(), 3);
        assert!(RangeValue { start: 3, stop: 3, step: 1 }.is_empty());
    }

    #[test]
    fn scopes_resolve_through_parents() {
        let globals = Scope::new_env(None);
        globals.borrow_mut().set("x", Value::Int(1));
        let local = Scope::new_env(Some(globals.clone()));
        local.borrow_mut().set("y", Value::Int(2));
        assert!(Scope::lookup(&local, "x").unwrap().equals(&Value::Int(1)));
        assert!(Scope::lookup(&globals, "y").is_none());
    }
}
