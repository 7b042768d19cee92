//! Operators, indexing and iteration over runtime values.

use tm_ast::{BinaryOp, CmpOp, Span, UnaryOp};

use crate::error::{ErrorKind, ExecError, ExecResult};
use crate::value::{Key, Number, Value};

/// Upper bound on the length of a sequence built by repetition.
const MAX_REPEAT_LEN: usize = 1 << 26;

fn type_error(message: String, span: Span) -> ExecError {
    ExecError::new(ErrorKind::TypeError, message, span)
}

/// Materialize everything `value` would yield in a `for` loop.
pub(crate) fn iterate(value: &Value, span: Span) -> ExecResult<Vec<Value>> {
    match value {
        Value::List(items) => Ok(items.borrow().clone()),
        Value::Tuple(items) => Ok(items.to_vec()),
        Value::Str(s) => Ok(s.chars().map(|c| Value::str(c.to_string())).collect()),
        Value::Set(items) => Ok(items.borrow().iter().map(Key::to_value).collect()),
        Value::Dict(entries) => Ok(entries.borrow().keys().map(Key::to_value).collect()),
        Value::Range(range) => Ok(range.values()),
        Value::Iterator(iter) => Ok(iter.borrow_mut().by_ref().collect()),
        other => Err(type_error(
            format!("'{}' object is not iterable", other.type_name()),
            span,
        )),
    }
}

pub(crate) fn unary_op(op: UnaryOp, operand: &Value, span: Span) -> ExecResult<Value> {
    let result = match (op, operand.number()) {
        (UnaryOp::Not, _) => Some(Value::Bool(!operand.truthy())),
        (UnaryOp::Neg, Some(Number::Int(i))) => Some(Value::Int(i.checked_neg().ok_or_else(
            || ExecError::new(ErrorKind::OverflowError, "integer overflow", span),
        )?)),
        (UnaryOp::Neg, Some(Number::Float(f))) => Some(Value::Float(-f)),
        (UnaryOp::Pos, Some(Number::Int(i))) => Some(Value::Int(i)),
        (UnaryOp::Pos, Some(Number::Float(f))) => Some(Value::Float(f)),
        (UnaryOp::Invert, Some(Number::Int(i))) => Some(Value::Int(!i)),
        _ => None,
    };
    result.ok_or_else(|| {
        type_error(
            format!(
                "bad operand type for unary {}: '{}'",
                op,
                operand.type_name()
            ),
            span,
        )
    })
}

pub(crate) fn binary_op(op: BinaryOp, left: &Value, right: &Value, span: Span) -> ExecResult<Value> {
    let unsupported = || {
        type_error(
            format!(
                "unsupported operand type(s) for {}: '{}' and '{}'",
                op,
                left.type_name(),
                right.type_name()
            ),
            span,
        )
    };
    if let (Some(a), Some(b)) = (left.number(), right.number()) {
        return match (a, b) {
            (Number::Int(a), Number::Int(b)) => int_arithmetic(op, a, b, span),
            (a, b) => float_arithmetic(op, a.as_f64(), b.as_f64(), span)?.ok_or_else(unsupported),
        };
    }
    match (op, left, right) {
        (BinaryOp::Add, Value::Str(a), Value::Str(b)) => Ok(Value::str(format!("{a}{b}"))),
        (BinaryOp::Add, Value::List(a), Value::List(b)) => {
            let mut items = a.borrow().clone();
            items.extend(b.borrow().iter().cloned());
            Ok(Value::list(items))
        }
        (BinaryOp::Add, Value::Tuple(a), Value::Tuple(b)) => {
            Ok(Value::tuple(a.iter().chain(b.iter()).cloned().collect()))
        }
        (BinaryOp::Mul, Value::Str(s), n) | (BinaryOp::Mul, n, Value::Str(s))
            if n.as_int().is_some() =>
        {
            let count = repeat_count(s.len(), n, span)?;
            Ok(Value::str(s.repeat(count)))
        }
        (BinaryOp::Mul, Value::List(items), n) | (BinaryOp::Mul, n, Value::List(items))
            if n.as_int().is_some() =>
        {
            let items = items.borrow();
            let count = repeat_count(items.len(), n, span)?;
            Ok(Value::list(repeat(&items, count)))
        }
        (BinaryOp::Mul, Value::Tuple(items), n) | (BinaryOp::Mul, n, Value::Tuple(items))
            if n.as_int().is_some() =>
        {
            let count = repeat_count(items.len(), n, span)?;
            Ok(Value::tuple(repeat(items, count)))
        }
        _ => Err(unsupported()),
    }
}

/// Clamp a repetition count at zero and refuse results longer than
/// `MAX_REPEAT_LEN`.
fn repeat_count(len: usize, n: &Value, span: Span) -> ExecResult<usize> {
    let count = usize::try_from(n.as_int().unwrap_or(0).max(0)).map_err(|_| {
        ExecError::new(
            ErrorKind::OverflowError,
            "cannot fit 'int' into an index-sized integer",
            span,
        )
    })?;
    match len.checked_mul(count) {
        Some(total) if total <= MAX_REPEAT_LEN => Ok(count),
        Some(_) => Err(ExecError::new(
            ErrorKind::MemoryError,
            "repeated sequence is too large",
            span,
        )),
        None => Err(ExecError::new(
            ErrorKind::OverflowError,
            "repeated sequence is too long",
            span,
        )),
    }
}

fn repeat(items: &[Value], count: usize) -> Vec<Value> {
    let mut out = Vec::with_capacity(items.len() * count);
    for _ in 0..count {
        out.extend(items.iter().cloned());
    }
    out
}

fn int_arithmetic(op: BinaryOp, a: i64, b: i64, span: Span) -> ExecResult<Value> {
    let overflow = || ExecError::new(ErrorKind::OverflowError, "integer overflow", span);
    let zero = || {
        ExecError::new(
            ErrorKind::ZeroDivisionError,
            "integer division or modulo by zero",
            span,
        )
    };
    let negative_shift = || ExecError::new(ErrorKind::ValueError, "negative shift count", span);
    Ok(Value::Int(match op {
        BinaryOp::Add => a.checked_add(b).ok_or_else(overflow)?,
        BinaryOp::Sub => a.checked_sub(b).ok_or_else(overflow)?,
        BinaryOp::Mul => a.checked_mul(b).ok_or_else(overflow)?,
        BinaryOp::Div => {
            if b == 0 {
                return Err(ExecError::new(
                    ErrorKind::ZeroDivisionError,
                    "division by zero",
                    span,
                ));
            }
            return Ok(Value::Float(a as f64 / b as f64));
        }
        BinaryOp::FloorDiv => {
            if b == 0 {
                return Err(zero());
            }
            let quotient = a.checked_div(b).ok_or_else(overflow)?;
            if a % b != 0 && (a < 0) != (b < 0) {
                quotient - 1
            } else {
                quotient
            }
        }
        BinaryOp::Mod => {
            if b == 0 {
                return Err(zero());
            }
            let rem = a.checked_rem(b).ok_or_else(overflow)?;
            if rem != 0 && (rem < 0) != (b < 0) {
                rem + b
            } else {
                rem
            }
        }
        BinaryOp::Pow => {
            if b < 0 {
                return Ok(Value::Float((a as f64).powf(b as f64)));
            }
            u32::try_from(b)
                .ok()
                .and_then(|exp| a.checked_pow(exp))
                .ok_or_else(overflow)?
        }
        BinaryOp::LShift => {
            if b < 0 {
                return Err(negative_shift());
            }
            if a == 0 {
                0
            } else {
                let shift = u32::try_from(b).ok().filter(|s| *s < 64).ok_or_else(overflow)?;
                let shifted = a << shift;
                if shifted >> shift != a {
                    return Err(overflow());
                }
                shifted
            }
        }
        BinaryOp::RShift => {
            if b < 0 {
                return Err(negative_shift());
            }
            a >> b.min(63)
        }
        BinaryOp::BitOr => a | b,
        BinaryOp::BitXor => a ^ b,
        BinaryOp::BitAnd => a & b,
    }))
}

/// `None` for operators floats do not support.
fn float_arithmetic(op: BinaryOp, a: f64, b: f64, span: Span) -> ExecResult<Option<Value>> {
    let zero = || ExecError::new(ErrorKind::ZeroDivisionError, "float division by zero", span);
    Ok(Some(Value::Float(match op {
        BinaryOp::Add => a + b,
        BinaryOp::Sub => a - b,
        BinaryOp::Mul => a * b,
        BinaryOp::Div => {
            if b == 0.0 {
                return Err(zero());
            }
            a / b
        }
        BinaryOp::FloorDiv => {
            if b == 0.0 {
                return Err(zero());
            }
            (a / b).floor()
        }
        BinaryOp::Mod => {
            if b == 0.0 {
                return Err(zero());
            }
            a - b * (a / b).floor()
        }
        BinaryOp::Pow => a.powf(b),
        BinaryOp::LShift
        | BinaryOp::RShift
        | BinaryOp::BitOr
        | BinaryOp::BitXor
        | BinaryOp::BitAnd => return Ok(None),
    })))
}

pub(crate) fn compare_op(op: CmpOp, left: &Value, right: &Value, span: Span) -> ExecResult<bool> {
    use std::cmp::Ordering::*;

    let ordering = || {
        left.compare(right).ok_or_else(|| {
            type_error(
                format!(
                    "'{}' not supported between instances of '{}' and '{}'",
                    op,
                    left.type_name(),
                    right.type_name()
                ),
                span,
            )
        })
    };
    Ok(match op {
        CmpOp::Eq => left.equals(right),
        CmpOp::NotEq => !left.equals(right),
        CmpOp::Lt => ordering()? == Less,
        CmpOp::LtE => ordering()? != Greater,
        CmpOp::Gt => ordering()? == Greater,
        CmpOp::GtE => ordering()? != Less,
        CmpOp::In => contains(right, left, span)?,
        CmpOp::NotIn => !contains(right, left, span)?,
        CmpOp::Is => identical(left, right),
        CmpOp::IsNot => !identical(left, right),
    })
}

/// `item in container`
pub(crate) fn contains(container: &Value, item: &Value, span: Span) -> ExecResult<bool> {
    match container {
        Value::List(items) => Ok(items.borrow().iter().any(|v| v.equals(item))),
        Value::Tuple(items) => Ok(items.iter().any(|v| v.equals(item))),
        Value::Set(items) => Ok(items.borrow().contains(&Key::from_value(item, span)?)),
        Value::Dict(entries) => Ok(entries.borrow().contains_key(&Key::from_value(item, span)?)),
        Value::Str(haystack) => match item {
            Value::Str(needle) => Ok(haystack.contains(&**needle)),
            other => Err(type_error(
                format!(
                    "'in <string>' requires string as left operand, not {}",
                    other.type_name()
                ),
                span,
            )),
        },
        Value::Range(range) => Ok(item.as_int().map_or(false, |i| range.contains(i))),
        Value::Iterator(_) => Ok(iterate(container, span)?.iter().any(|v| v.equals(item))),
        other => Err(type_error(
            format!("argument of type '{}' is not iterable", other.type_name()),
            span,
        )),
    }
}

/// `left is right`
fn identical(left: &Value, right: &Value) -> bool {
    use std::rc::Rc;

    match (left, right) {
        (Value::None, Value::None) | (Value::Ellipsis, Value::Ellipsis) => true,
        (Value::Bool(a), Value::Bool(b)) => a == b,
        (Value::Int(a), Value::Int(b)) => a == b,
        (Value::Str(a), Value::Str(b)) => Rc::ptr_eq(a, b),
        (Value::List(a), Value::List(b)) => Rc::ptr_eq(a, b),
        (Value::Tuple(a), Value::Tuple(b)) => Rc::ptr_eq(a, b),
        (Value::Set(a), Value::Set(b)) => Rc::ptr_eq(a, b),
        (Value::Dict(a), Value::Dict(b)) => Rc::ptr_eq(a, b),
        (Value::Function(a), Value::Function(b)) => Rc::ptr_eq(a, b),
        (Value::Module(a), Value::Module(b)) => Rc::ptr_eq(a, b),
        (Value::Builtin(a), Value::Builtin(b)) => a.name == b.name,
        _ => false,
    }
}

/// Resolve a possibly negative index against `len`.
fn normalize_index(index: i64, len: usize, what: &str, span: Span) -> ExecResult<usize> {
    let len = len as i64;
    let resolved = if index < 0 { index + len } else { index };
    if (0..len).contains(&resolved) {
        Ok(resolved as usize)
    } else {
        Err(ExecError::new(
            ErrorKind::IndexError,
            format!("{what} index out of range"),
            span,
        ))
    }
}

fn int_index(value: &Value, index: &Value, span: Span) -> ExecResult<i64> {
    index.as_int().ok_or_else(|| {
        type_error(
            format!(
                "{} indices must be integers, not {}",
                value.type_name(),
                index.type_name()
            ),
            span,
        )
    })
}

/// `value[index]`
pub(crate) fn index_value(value: &Value, index: &Value, span: Span) -> ExecResult<Value> {
    match value {
        Value::List(items) => {
            let items = items.borrow();
            let i = normalize_index(int_index(value, index, span)?, items.len(), "list", span)?;
            Ok(items[i].clone())
        }
        Value::Tuple(items) => {
            let i = normalize_index(int_index(value, index, span)?, items.len(), "tuple", span)?;
            Ok(items[i].clone())
        }
        Value::Str(s) => {
            let chars: Vec<char> = s.chars().collect();
            let i = normalize_index(int_index(value, index, span)?, chars.len(), "string", span)?;
            Ok(Value::str(chars[i].to_string()))
        }
        Value::Range(range) => {
            let i = normalize_index(int_index(value, index, span)?, range.len(), "range", span)?;
            Ok(range.get(i).map_or(Value::None, Value::Int))
        }
        Value::Dict(entries) => {
            let key = Key::from_value(index, span)?;
            entries
                .borrow()
                .get(&key)
                .cloned()
                .ok_or_else(|| ExecError::new(ErrorKind::KeyError, index.repr(), span))
        }
        other => Err(type_error(
            format!("'{}' object is not subscriptable", other.type_name()),
            span,
        )),
    }
}

/// `value[index] = item`
pub(crate) fn set_item(value: &Value, index: &Value, item: Value, span: Span) -> ExecResult<()> {
    match value {
        Value::List(items) => {
            let mut items = items.borrow_mut();
            let i = normalize_index(int_index(value, index, span)?, items.len(), "list", span)?;
            items[i] = item;
            Ok(())
        }
        Value::Dict(entries) => {
            let key = Key::from_value(index, span)?;
            entries.borrow_mut().insert(key, item);
            Ok(())
        }
        other => Err(type_error(
            format!(
                "'{}' object does not support item assignment",
                other.type_name()
            ),
            span,
        )),
    }
}

/// Positions selected by `[lower:upper:step]` on a sequence of `len` items.
pub(crate) fn slice_indices(
    len: usize,
    lower: Option<i64>,
    upper: Option<i64>,
    step: Option<i64>,
    span: Span,
) -> ExecResult<Vec<usize>> {
    let step = step.unwrap_or(1);
    if step == 0 {
        return Err(ExecError::new(
            ErrorKind::ValueError,
            "slice step cannot be zero",
            span,
        ));
    }
    let len = len as i64;
    let resolve = |bound: i64, low: i64, high: i64| {
        let bound = if bound < 0 { bound + len } else { bound };
        bound.clamp(low, high)
    };
    let (start, stop) = if step > 0 {
        (
            lower.map_or(0, |v| resolve(v, 0, len)),
            upper.map_or(len, |v| resolve(v, 0, len)),
        )
    } else {
        (
            lower.map_or(len - 1, |v| resolve(v, -1, len - 1)),
            upper.map_or(-1, |v| resolve(v, -1, len - 1)),
        )
    };
    let mut indices = Vec::new();
    let mut i = start;
    while (step > 0 && i < stop) || (step < 0 && i > stop) {
        indices.push(i as usize);
        i += step;
    }
    Ok(indices)
}

/// `value[lower:upper:step]`
pub(crate) fn slice_value(
    value: &Value,
    lower: Option<i64>,
    upper: Option<i64>,
    step: Option<i64>,
    span: Span,
) -> ExecResult<Value> {
    match value {
        Value::List(items) => {
            let items = items.borrow();
            let picked = slice_indices(items.len(), lower, upper, step, span)?;
            Ok(Value::list(picked.into_iter().map(|i| items[i].clone()).collect()))
        }
        Value::Tuple(items) => {
            let picked = slice_indices(items.len(), lower, upper, step, span)?;
            Ok(Value::tuple(picked.into_iter().map(|i| items[i].clone()).collect()))
        }
        Value::Str(s) => {
            let chars: Vec<char> = s.chars().collect();
            let picked = slice_indices(chars.len(), lower, upper, step, span)?;
            Ok(Value::str(picked.into_iter().map(|i| chars[i]).collect::<String>()))
        }
        other => Err(type_error(
            format!("'{}' object is not sliceable", other.type_name()),
            span,
        )),
    }
}
