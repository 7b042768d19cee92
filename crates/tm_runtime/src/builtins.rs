//! Builtin functions and the methods of builtin types.

use std::cmp::Ordering;
use std::rc::Rc;

use indexmap::{IndexMap, IndexSet};
use tm_ast::Span;

use crate::error::{ErrorKind, ExecError, ExecResult};
use crate::ops;
use crate::runtime::Runtime;
use crate::value::{Args, BoundMethod, Builtin, Env, Key, RangeValue, Value};

impl Args {
    /// Positional arguments only.
    pub fn positional(positional: Vec<Value>, span: Span) -> Self {
        Self {
            positional,
            keywords: Vec::new(),
            span,
        }
    }

    fn take_keyword(&mut self, name: &str) -> Option<Value> {
        let index = self.keywords.iter().position(|(key, _)| key == name)?;
        Some(self.keywords.remove(index).1)
    }

    fn no_keywords(&self, function: &str) -> ExecResult<()> {
        match self.keywords.first() {
            Some((key, _)) => Err(self.type_error(format!(
                "{function}() got an unexpected keyword argument '{key}'"
            ))),
            None => Ok(()),
        }
    }

    fn expect_count(&self, function: &str, min: usize, max: usize) -> ExecResult<()> {
        let given = self.positional.len();
        if (min..=max).contains(&given) {
            return Ok(());
        }
        let expected = if min == max {
            format!("exactly {min}")
        } else if given < min {
            format!("at least {min}")
        } else {
            format!("at most {max}")
        };
        Err(self.type_error(format!(
            "{function}() takes {expected} argument(s) ({given} given)"
        )))
    }

    /// Keywords are rejected and the positional count is checked.
    fn exact(self, function: &str, min: usize, max: usize) -> ExecResult<(Vec<Value>, Span)> {
        self.no_keywords(function)?;
        self.expect_count(function, min, max)?;
        Ok((self.positional, self.span))
    }

    fn type_error(&self, message: String) -> ExecError {
        ExecError::new(ErrorKind::TypeError, message, self.span)
    }
}

fn type_error(message: String, span: Span) -> ExecError {
    ExecError::new(ErrorKind::TypeError, message, span)
}

fn value_error(message: String, span: Span) -> ExecError {
    ExecError::new(ErrorKind::ValueError, message, span)
}

fn int_arg(value: &Value, function: &str, span: Span) -> ExecResult<i64> {
    value.as_int().ok_or_else(|| {
        type_error(
            format!(
                "{function}() expected an integer, got '{}'",
                value.type_name()
            ),
            span,
        )
    })
}

fn call1(rt: &mut Runtime, function: &Value, item: Value, span: Span) -> ExecResult<Value> {
    rt.call_value(function, Args::positional(vec![item], span))
}

macro_rules! builtins {
    ($($name:literal => $func:ident),* $(,)?) => {
        const BUILTINS: &[Builtin] = &[$(Builtin { name: $name, func: $func }),*];
    };
}

builtins! {
    "print" => print,
    "len" => len,
    "repr" => repr,
    "str" => str,
    "int" => int,
    "float" => float,
    "bool" => bool,
    "list" => list,
    "tuple" => tuple,
    "set" => set,
    "dict" => dict,
    "range" => range,
    "sum" => sum,
    "min" => min,
    "max" => max,
    "abs" => abs,
    "any" => any,
    "all" => all,
    "sorted" => sorted,
    "reversed" => reversed,
    "map" => map,
    "filter" => filter,
    "enumerate" => enumerate,
    "zip" => zip,
}

/// Bind every builtin function in `env`.
pub(crate) fn install(env: &Env) {
    let mut scope = env.borrow_mut();
    for builtin in BUILTINS {
        scope.set(builtin.name, Value::Builtin(*builtin));
    }
}

fn print(rt: &mut Runtime, mut args: Args) -> ExecResult<Value> {
    let sep = match args.take_keyword("sep") {
        None | Some(Value::None) => " ".to_string(),
        Some(value) => value.to_string(),
    };
    let end = match args.take_keyword("end") {
        None | Some(Value::None) => "\n".to_string(),
        Some(value) => value.to_string(),
    };
    args.no_keywords("print")?;
    let mut line = args
        .positional
        .iter()
        .map(Value::to_string)
        .collect::<Vec<_>>()
        .join(&sep);
    line.push_str(&end);
    rt.write_output(&line);
    Ok(Value::None)
}

fn len(_: &mut Runtime, args: Args) -> ExecResult<Value> {
    let (values, span) = args.exact("len", 1, 1)?;
    let n = match &values[0] {
        Value::Str(s) => s.chars().count(),
        Value::List(items) => items.borrow().len(),
        Value::Tuple(items) => items.len(),
        Value::Set(items) => items.borrow().len(),
        Value::Dict(entries) => entries.borrow().len(),
        Value::Range(range) => range.len(),
        other => {
            return Err(type_error(
                format!("object of type '{}' has no len()", other.type_name()),
                span,
            ))
        }
    };
    Ok(Value::Int(n as i64))
}

fn repr(_: &mut Runtime, args: Args) -> ExecResult<Value> {
    let (values, _) = args.exact("repr", 1, 1)?;
    Ok(Value::str(values[0].repr()))
}

fn str(_: &mut Runtime, args: Args) -> ExecResult<Value> {
    let (values, _) = args.exact("str", 0, 1)?;
    Ok(values
        .first()
        .map_or_else(|| Value::str(""), |value| Value::str(value.to_string())))
}

fn int(_: &mut Runtime, args: Args) -> ExecResult<Value> {
    let (values, span) = args.exact("int", 0, 1)?;
    let Some(value) = values.first() else {
        return Ok(Value::Int(0));
    };
    match value {
        Value::Bool(b) => Ok(Value::Int(*b as i64)),
        Value::Int(i) => Ok(Value::Int(*i)),
        Value::Float(f) if f.is_finite() && f.abs() < i64::MAX as f64 => {
            Ok(Value::Int(f.trunc() as i64))
        }
        Value::Float(f) => Err(ExecError::new(
            ErrorKind::OverflowError,
            format!("cannot convert float {f} to integer"),
            span,
        )),
        Value::Str(s) => s.trim().parse().map(Value::Int).map_err(|_| {
            value_error(
                format!("invalid literal for int() with base 10: {}", value.repr()),
                span,
            )
        }),
        other => Err(type_error(
            format!(
                "int() argument must be a string or a number, not '{}'",
                other.type_name()
            ),
            span,
        )),
    }
}

fn float(_: &mut Runtime, args: Args) -> ExecResult<Value> {
    let (values, span) = args.exact("float", 0, 1)?;
    let Some(value) = values.first() else {
        return Ok(Value::Float(0.0));
    };
    if let Some(number) = value.number() {
        return Ok(Value::Float(number.as_f64()));
    }
    match value {
        Value::Str(s) => s.trim().parse().map(Value::Float).map_err(|_| {
            value_error(
                format!("could not convert string to float: {}", value.repr()),
                span,
            )
        }),
        other => Err(type_error(
            format!(
                "float() argument must be a string or a number, not '{}'",
                other.type_name()
            ),
            span,
        )),
    }
}

fn bool(_: &mut Runtime, args: Args) -> ExecResult<Value> {
    let (values, _) = args.exact("bool", 0, 1)?;
    Ok(Value::Bool(values.first().map_or(false, Value::truthy)))
}

fn list(_: &mut Runtime, args: Args) -> ExecResult<Value> {
    let (values, span) = args.exact("list", 0, 1)?;
    match values.first() {
        Some(value) => Ok(Value::list(ops::iterate(value, span)?)),
        None => Ok(Value::list(Vec::new())),
    }
}

fn tuple(_: &mut Runtime, args: Args) -> ExecResult<Value> {
    let (values, span) = args.exact("tuple", 0, 1)?;
    match values.first() {
        Some(value) => Ok(Value::tuple(ops::iterate(value, span)?)),
        None => Ok(Value::tuple(Vec::new())),
    }
}

fn set(_: &mut Runtime, args: Args) -> ExecResult<Value> {
    let (values, span) = args.exact("set", 0, 1)?;
    let mut keys = IndexSet::new();
    if let Some(value) = values.first() {
        for item in ops::iterate(value, span)? {
            keys.insert(Key::from_value(&item, span)?);
        }
    }
    Ok(Value::Set(Rc::new(keys.into())))
}

fn dict(_: &mut Runtime, args: Args) -> ExecResult<Value> {
    let span = args.span;
    args.expect_count("dict", 0, 1)?;
    let mut entries = IndexMap::new();
    if let Some(value) = args.positional.first() {
        for item in ops::iterate(value, span)? {
            let pair = ops::iterate(&item, span)?;
            let [key, value] = <[Value; 2]>::try_from(pair).map_err(|pair| {
                value_error(
                    format!(
                        "dictionary update sequence element has length {}; 2 is required",
                        pair.len()
                    ),
                    span,
                )
            })?;
            entries.insert(Key::from_value(&key, span)?, value);
        }
    }
    for (key, value) in args.keywords {
        entries.insert(Key::Str(key.into()), value);
    }
    Ok(Value::Dict(Rc::new(entries.into())))
}

fn range(_: &mut Runtime, args: Args) -> ExecResult<Value> {
    let (values, span) = args.exact("range", 1, 3)?;
    let ints = values
        .iter()
        .map(|value| int_arg(value, "range", span))
        .collect::<ExecResult<Vec<_>>>()?;
    let (start, stop, step) = match ints[..] {
        [stop] => (0, stop, 1),
        [start, stop] => (start, stop, 1),
        [start, stop, step] => (start, stop, step),
        _ => unreachable!("argument count checked above"),
    };
    if step == 0 {
        return Err(value_error("range() arg 3 must not be zero".into(), span));
    }
    Ok(Value::Range(RangeValue { start, stop, step }))
}

fn sum(_: &mut Runtime, mut args: Args) -> ExecResult<Value> {
    let start = args.take_keyword("start");
    let (values, span) = args.exact("sum", 1, 2)?;
    let mut total = values.get(1).cloned().or(start).unwrap_or(Value::Int(0));
    if let Value::Str(_) = total {
        return Err(type_error(
            "sum() can't sum strings [use ''.join(seq) instead]".into(),
            span,
        ));
    }
    for item in ops::iterate(&values[0], span)? {
        total = ops::binary_op(tm_ast::BinaryOp::Add, &total, &item, span)?;
    }
    Ok(total)
}

fn extremum(rt: &mut Runtime, mut args: Args, name: &str, wanted: Ordering) -> ExecResult<Value> {
    let key = args.take_keyword("key").filter(|key| !matches!(key, Value::None));
    let default = args.take_keyword("default");
    let span = args.span;
    args.no_keywords(name)?;
    let candidates = match args.positional.len() {
        0 => return Err(type_error(format!("{name} expected at least 1 argument, got 0"), span)),
        1 => ops::iterate(&args.positional[0], span)?,
        _ => args.positional,
    };
    let mut best: Option<(Value, Value)> = None;
    for item in candidates {
        let rank = match &key {
            Some(key) => call1(rt, key, item.clone(), span)?,
            None => item.clone(),
        };
        let replace = match &best {
            None => true,
            Some((best_rank, _)) => {
                let ordering = rank.compare(best_rank).ok_or_else(|| {
                    type_error(
                        format!(
                            "'{}' not supported between instances of '{}' and '{}'",
                            if wanted == Ordering::Less { "<" } else { ">" },
                            rank.type_name(),
                            best_rank.type_name()
                        ),
                        span,
                    )
                })?;
                ordering == wanted
            }
        };
        if replace {
            best = Some((rank, item));
        }
    }
    match (best, default) {
        (Some((_, item)), _) => Ok(item),
        (None, Some(default)) => Ok(default),
        (None, None) => Err(value_error(format!("{name}() arg is an empty sequence"), span)),
    }
}

fn min(rt: &mut Runtime, args: Args) -> ExecResult<Value> {
    extremum(rt, args, "min", Ordering::Less)
}

fn max(rt: &mut Runtime, args: Args) -> ExecResult<Value> {
    extremum(rt, args, "max", Ordering::Greater)
}

fn abs(_: &mut Runtime, args: Args) -> ExecResult<Value> {
    let (values, span) = args.exact("abs", 1, 1)?;
    match &values[0] {
        Value::Bool(b) => Ok(Value::Int(*b as i64)),
        Value::Int(i) => i.checked_abs().map(Value::Int).ok_or_else(|| {
            ExecError::new(ErrorKind::OverflowError, "integer overflow", span)
        }),
        Value::Float(f) => Ok(Value::Float(f.abs())),
        other => Err(type_error(
            format!("bad operand type for abs(): '{}'", other.type_name()),
            span,
        )),
    }
}

fn any(_: &mut Runtime, args: Args) -> ExecResult<Value> {
    let (values, span) = args.exact("any", 1, 1)?;
    Ok(Value::Bool(ops::iterate(&values[0], span)?.iter().any(Value::truthy)))
}

fn all(_: &mut Runtime, args: Args) -> ExecResult<Value> {
    let (values, span) = args.exact("all", 1, 1)?;
    Ok(Value::Bool(ops::iterate(&values[0], span)?.iter().all(Value::truthy)))
}

fn sorted(rt: &mut Runtime, mut args: Args) -> ExecResult<Value> {
    let key = args.take_keyword("key").filter(|key| !matches!(key, Value::None));
    let reverse = args.take_keyword("reverse").map_or(false, |value| value.truthy());
    let (values, span) = args.exact("sorted", 1, 1)?;
    let items = ops::iterate(&values[0], span)?;
    let mut ranked = Vec::with_capacity(items.len());
    for item in items {
        let rank = match &key {
            Some(key) => call1(rt, key, item.clone(), span)?,
            None => item.clone(),
        };
        ranked.push((rank, item));
    }

    let mut failure = None;
    ranked.sort_by(|(a, _), (b, _)| {
        let ordering = a.compare(b).unwrap_or_else(|| {
            failure.get_or_insert_with(|| {
                type_error(
                    format!(
                        "'<' not supported between instances of '{}' and '{}'",
                        a.type_name(),
                        b.type_name()
                    ),
                    span,
                )
            });
            Ordering::Equal
        });
        if reverse {
            ordering.reverse()
        } else {
            ordering
        }
    });
    match failure {
        Some(err) => Err(err),
        None => Ok(Value::list(ranked.into_iter().map(|(_, item)| item).collect())),
    }
}

fn reversed(_: &mut Runtime, args: Args) -> ExecResult<Value> {
    let (values, span) = args.exact("reversed", 1, 1)?;
    let mut items = ops::iterate(&values[0], span)?;
    items.reverse();
    Ok(Value::iterator(items))
}

fn map(rt: &mut Runtime, args: Args) -> ExecResult<Value> {
    let (values, span) = args.exact("map", 2, usize::MAX)?;
    let function = &values[0];
    let columns = values[1..]
        .iter()
        .map(|value| ops::iterate(value, span))
        .collect::<ExecResult<Vec<_>>>()?;
    let rows = columns.iter().map(Vec::len).min().unwrap_or(0);
    let mut out = Vec::with_capacity(rows);
    for row in 0..rows {
        let call_args = columns.iter().map(|column| column[row].clone()).collect();
        out.push(rt.call_value(function, Args::positional(call_args, span))?);
    }
    Ok(Value::iterator(out))
}

fn filter(rt: &mut Runtime, args: Args) -> ExecResult<Value> {
    let (values, span) = args.exact("filter", 2, 2)?;
    let mut out = Vec::new();
    for item in ops::iterate(&values[1], span)? {
        let keep = match &values[0] {
            Value::None => item.truthy(),
            predicate => call1(rt, predicate, item.clone(), span)?.truthy(),
        };
        if keep {
            out.push(item);
        }
    }
    Ok(Value::iterator(out))
}

fn enumerate(_: &mut Runtime, mut args: Args) -> ExecResult<Value> {
    let start = args.take_keyword("start");
    let (values, span) = args.exact("enumerate", 1, 2)?;
    let start = match values.get(1).or(start.as_ref()) {
        Some(value) => int_arg(value, "enumerate", span)?,
        None => 0,
    };
    let items = ops::iterate(&values[0], span)?;
    let mut out = Vec::with_capacity(items.len());
    for (offset, item) in items.into_iter().enumerate() {
        let index = start.checked_add(offset as i64).ok_or_else(|| {
            ExecError::new(ErrorKind::OverflowError, "integer overflow", span)
        })?;
        out.push(Value::tuple(vec![Value::Int(index), item]));
    }
    Ok(Value::iterator(out))
}

fn zip(_: &mut Runtime, args: Args) -> ExecResult<Value> {
    let (values, span) = args.exact("zip", 0, usize::MAX)?;
    let columns = values
        .iter()
        .map(|value| ops::iterate(value, span))
        .collect::<ExecResult<Vec<_>>>()?;
    let rows = columns.iter().map(Vec::len).min().unwrap_or(0);
    let out = (0..rows)
        .map(|row| Value::tuple(columns.iter().map(|column| column[row].clone()).collect()))
        .collect();
    Ok(Value::iterator(out))
}

// Methods

const LIST_METHODS: &[&str] = &["append", "extend", "pop", "insert", "index", "count"];
const DICT_METHODS: &[&str] = &["get", "keys", "values", "items", "pop"];
const SET_METHODS: &[&str] = &["add", "discard"];
const STR_METHODS: &[&str] = &[
    "upper",
    "lower",
    "strip",
    "split",
    "join",
    "startswith",
    "endswith",
    "replace",
];

/// `value.name` for a method of a builtin type.
pub(crate) fn bind_method(value: &Value, name: &str) -> Option<Value> {
    let methods = match value {
        Value::List(_) => LIST_METHODS,
        Value::Dict(_) => DICT_METHODS,
        Value::Set(_) => SET_METHODS,
        Value::Str(_) => STR_METHODS,
        _ => return None,
    };
    let name = methods.iter().copied().find(|method| *method == name)?;
    Some(Value::Method(Rc::new(BoundMethod {
        receiver: value.clone(),
        name,
    })))
}

pub(crate) fn call_method(
    rt: &mut Runtime,
    receiver: &Value,
    name: &'static str,
    args: Args,
) -> ExecResult<Value> {
    match receiver {
        Value::List(_) => list_method(receiver, name, args),
        Value::Dict(_) => dict_method(receiver, name, args),
        Value::Set(_) => set_method(receiver, name, args),
        Value::Str(s) => str_method(rt, s, name, args),
        other => Err(ExecError::new(
            ErrorKind::AttributeError,
            format!("'{}' object has no attribute '{name}'", other.type_name()),
            args.span,
        )),
    }
}

fn no_such_method(receiver: &Value, name: &str, span: Span) -> ExecError {
    ExecError::new(
        ErrorKind::AttributeError,
        format!("'{}' object has no attribute '{name}'", receiver.type_name()),
        span,
    )
}

fn list_method(receiver: &Value, name: &str, args: Args) -> ExecResult<Value> {
    let Value::List(items) = receiver else {
        return Err(no_such_method(receiver, name, args.span));
    };
    match name {
        "append" => {
            let (mut values, _) = args.exact("append", 1, 1)?;
            items.borrow_mut().push(values.remove(0));
            Ok(Value::None)
        }
        "extend" => {
            let (values, span) = args.exact("extend", 1, 1)?;
            let extra = ops::iterate(&values[0], span)?;
            items.borrow_mut().extend(extra);
            Ok(Value::None)
        }
        "pop" => {
            let (values, span) = args.exact("pop", 0, 1)?;
            let mut items = items.borrow_mut();
            if items.is_empty() {
                return Err(ExecError::new(ErrorKind::IndexError, "pop from empty list", span));
            }
            let len = items.len() as i64;
            let index = match values.first() {
                Some(value) => int_arg(value, "pop", span)?,
                None => -1,
            };
            let resolved = if index < 0 { index + len } else { index };
            if !(0..len).contains(&resolved) {
                return Err(ExecError::new(ErrorKind::IndexError, "pop index out of range", span));
            }
            Ok(items.remove(resolved as usize))
        }
        "insert" => {
            let (mut values, span) = args.exact("insert", 2, 2)?;
            let item = values.remove(1);
            let mut items = items.borrow_mut();
            let len = items.len() as i64;
            let index = int_arg(&values[0], "insert", span)?;
            let resolved = if index < 0 { index + len } else { index };
            items.insert(resolved.clamp(0, len) as usize, item);
            Ok(Value::None)
        }
        "index" => {
            let (values, span) = args.exact("index", 1, 1)?;
            items
                .borrow()
                .iter()
                .position(|item| item.equals(&values[0]))
                .map(|i| Value::Int(i as i64))
                .ok_or_else(|| {
                    value_error(format!("{} is not in list", values[0].repr()), span)
                })
        }
        "count" => {
            let (values, _) = args.exact("count", 1, 1)?;
            let count = items.borrow().iter().filter(|item| item.equals(&values[0])).count();
            Ok(Value::Int(count as i64))
        }
        _ => Err(no_such_method(receiver, name, args.span)),
    }
}

fn dict_method(receiver: &Value, name: &str, args: Args) -> ExecResult<Value> {
    let Value::Dict(entries) = receiver else {
        return Err(no_such_method(receiver, name, args.span));
    };
    match name {
        "get" => {
            let (values, span) = args.exact("get", 1, 2)?;
            let key = Key::from_value(&values[0], span)?;
            let found = entries.borrow().get(&key).cloned();
            Ok(found.or_else(|| values.get(1).cloned()).unwrap_or(Value::None))
        }
        "keys" => {
            args.exact("keys", 0, 0)?;
            Ok(Value::list(entries.borrow().keys().map(Key::to_value).collect()))
        }
        "values" => {
            args.exact("values", 0, 0)?;
            Ok(Value::list(entries.borrow().values().cloned().collect()))
        }
        "items" => {
            args.exact("items", 0, 0)?;
            let items = entries
                .borrow()
                .iter()
                .map(|(key, value)| Value::tuple(vec![key.to_value(), value.clone()]))
                .collect();
            Ok(Value::list(items))
        }
        "pop" => {
            let (values, span) = args.exact("pop", 1, 2)?;
            let key = Key::from_value(&values[0], span)?;
            let removed = entries.borrow_mut().shift_remove(&key);
            removed
                .or_else(|| values.get(1).cloned())
                .ok_or_else(|| ExecError::new(ErrorKind::KeyError, values[0].repr(), span))
        }
        _ => Err(no_such_method(receiver, name, args.span)),
    }
}

fn set_method(receiver: &Value, name: &str, args: Args) -> ExecResult<Value> {
    let Value::Set(items) = receiver else {
        return Err(no_such_method(receiver, name, args.span));
    };
    match name {
        "add" => {
            let (values, span) = args.exact("add", 1, 1)?;
            items.borrow_mut().insert(Key::from_value(&values[0], span)?);
            Ok(Value::None)
        }
        "discard" => {
            let (values, span) = args.exact("discard", 1, 1)?;
            items.borrow_mut().shift_remove(&Key::from_value(&values[0], span)?);
            Ok(Value::None)
        }
        _ => Err(no_such_method(receiver, name, args.span)),
    }
}

fn str_arg<'a>(value: &'a Value, function: &str, span: Span) -> ExecResult<&'a str> {
    match value {
        Value::Str(s) => Ok(&**s),
        other => Err(type_error(
            format!(
                "{function}() argument must be str, not '{}'",
                other.type_name()
            ),
            span,
        )),
    }
}

fn str_method(_: &mut Runtime, s: &str, name: &str, args: Args) -> ExecResult<Value> {
    match name {
        "upper" => {
            args.exact("upper", 0, 0)?;
            Ok(Value::str(s.to_uppercase()))
        }
        "lower" => {
            args.exact("lower", 0, 0)?;
            Ok(Value::str(s.to_lowercase()))
        }
        "strip" => {
            let (values, span) = args.exact("strip", 0, 1)?;
            match values.first() {
                None | Some(Value::None) => Ok(Value::str(s.trim())),
                Some(chars) => {
                    let chars = str_arg(chars, "strip", span)?;
                    Ok(Value::str(s.trim_matches(|c: char| chars.contains(c))))
                }
            }
        }
        "split" => {
            let (values, span) = args.exact("split", 0, 1)?;
            let parts: Vec<Value> = match values.first() {
                None | Some(Value::None) => s.split_whitespace().map(Value::str).collect(),
                Some(sep) => {
                    let sep = str_arg(sep, "split", span)?;
                    if sep.is_empty() {
                        return Err(value_error("empty separator".into(), span));
                    }
                    s.split(sep).map(Value::str).collect()
                }
            };
            Ok(Value::list(parts))
        }
        "join" => {
            let (values, span) = args.exact("join", 1, 1)?;
            let parts = ops::iterate(&values[0], span)?
                .iter()
                .map(|part| str_arg(part, "join", span).map(str::to_string))
                .collect::<ExecResult<Vec<_>>>()?;
            Ok(Value::str(parts.join(s)))
        }
        "startswith" => {
            let (values, span) = args.exact("startswith", 1, 1)?;
            Ok(Value::Bool(s.starts_with(str_arg(&values[0], "startswith", span)?)))
        }
        "endswith" => {
            let (values, span) = args.exact("endswith", 1, 1)?;
            Ok(Value::Bool(s.ends_with(str_arg(&values[0], "endswith", span)?)))
        }
        "replace" => {
            let (values, span) = args.exact("replace", 2, 2)?;
            let from = str_arg(&values[0], "replace", span)?;
            let to = str_arg(&values[1], "replace", span)?;
            Ok(Value::str(s.replace(from, to)))
        }
        _ => Err(ExecError::new(
            ErrorKind::AttributeError,
            format!("'str' object has no attribute '{name}'"),
            args.span,
        )),
    }
}
