//! Binary and unary operator semantics shared by the stack VM and the
//! tree-walking evaluator, so both execution paths agree exactly.

use thiserror::Error;

use crate::value::{Truth, Value};

#[derive(Debug, Error, PartialEq)]
pub enum OpError {
    #[error("division by zero")]
    DivisionByZero,

    #[error("cannot apply '{op}' to {lhs} and {rhs}")]
    Type {
        op: &'static str,
        lhs: &'static str,
        rhs: &'static str,
    },
}

fn type_err(op: &'static str, a: &Value, b: &Value) -> OpError {
    OpError::Type { op, lhs: a.type_name(), rhs: b.type_name() }
}

fn as_f64(v: &Value) -> Option<f64> {
    match v {
        Value::Int(n) => Some(*n as f64),
        Value::Float(x) => Some(*x),
        _ => None,
    }
}

pub fn add(a: &Value, b: &Value) -> Result<Value, OpError> {
    match (a, b) {
        (Value::Int(x), Value::Int(y)) => Ok(Value::Int(x.wrapping_add(*y))),
        (Value::Str(x), Value::Str(y)) => Ok(Value::Str(format!("{x}{y}"))),
        _ => match (as_f64(a), as_f64(b)) {
            (Some(x), Some(y)) => Ok(Value::Float(x + y)),
            _ => Err(type_err("+", a, b)),
        },
    }
}

pub fn sub(a: &Value, b: &Value) -> Result<Value, OpError> {
    match (a, b) {
        (Value::Int(x), Value::Int(y)) => Ok(Value::Int(x.wrapping_sub(*y))),
        _ => match (as_f64(a), as_f64(b)) {
            (Some(x), Some(y)) => Ok(Value::Float(x - y)),
            _ => Err(type_err("-", a, b)),
        },
    }
}

pub fn mul(a: &Value, b: &Value) -> Result<Value, OpError> {
    match (a, b) {
        (Value::Int(x), Value::Int(y)) => Ok(Value::Int(x.wrapping_mul(*y))),
        _ => match (as_f64(a), as_f64(b)) {
            (Some(x), Some(y)) => Ok(Value::Float(x * y)),
            _ => Err(type_err("*", a, b)),
        },
    }
}

/// `/` — an exact integer division stays an integer, anything else goes
/// to float.
pub fn div(a: &Value, b: &Value) -> Result<Value, OpError> {
    match (a, b) {
        (Value::Int(_), Value::Int(0)) => Err(OpError::DivisionByZero),
        (Value::Int(x), Value::Int(y)) => {
            if x.wrapping_rem(*y) == 0 {
                Ok(Value::Int(x.wrapping_div(*y)))
            } else {
                Ok(Value::Float(*x as f64 / *y as f64))
            }
        }
        _ => match (as_f64(a), as_f64(b)) {
            (Some(_), Some(y)) if y == 0.0 => Err(OpError::DivisionByZero),
            (Some(x), Some(y)) => Ok(Value::Float(x / y)),
            _ => Err(type_err("/", a, b)),
        },
    }
}

fn floored_div_i64(a: i64, b: i64) -> i64 {
    let q = a.wrapping_div(b);
    let r = a.wrapping_rem(b);
    if r != 0 && (r < 0) != (b < 0) {
        q - 1
    } else {
        q
    }
}

fn floored_rem_i64(a: i64, b: i64) -> i64 {
    let r = a.wrapping_rem(b);
    if r != 0 && (r < 0) != (b < 0) {
        r + b
    } else {
        r
    }
}

/// `//` — floored division (rounds toward negative infinity).
pub fn floor_div(a: &Value, b: &Value) -> Result<Value, OpError> {
    match (a, b) {
        (Value::Int(_), Value::Int(0)) => Err(OpError::DivisionByZero),
        (Value::Int(x), Value::Int(y)) => Ok(Value::Int(floored_div_i64(*x, *y))),
        _ => match (as_f64(a), as_f64(b)) {
            (Some(_), Some(y)) if y == 0.0 => Err(OpError::DivisionByZero),
            (Some(x), Some(y)) => Ok(Value::Float((x / y).floor())),
            _ => Err(type_err("//", a, b)),
        },
    }
}

/// `%` — floored remainder (result takes the divisor's sign).
pub fn modulo(a: &Value, b: &Value) -> Result<Value, OpError> {
    match (a, b) {
        (Value::Int(_), Value::Int(0)) => Err(OpError::DivisionByZero),
        (Value::Int(x), Value::Int(y)) => Ok(Value::Int(floored_rem_i64(*x, *y))),
        _ => match (as_f64(a), as_f64(b)) {
            (Some(_), Some(y)) if y == 0.0 => Err(OpError::DivisionByZero),
            (Some(x), Some(y)) => {
                let r = x % y;
                if r != 0.0 && (r < 0.0) != (y < 0.0) {
                    Ok(Value::Float(r + y))
                } else {
                    Ok(Value::Float(r))
                }
            }
            _ => Err(type_err("%", a, b)),
        },
    }
}

/// `^` — an integer base with a non-negative integer exponent stays an
/// integer; negative exponents and float operands go to float.
pub fn pow(a: &Value, b: &Value) -> Result<Value, OpError> {
    match (a, b) {
        (Value::Int(x), Value::Int(y)) if *y >= 0 => {
            match u32::try_from(*y).ok().and_then(|e| x.checked_pow(e)) {
                Some(n) => Ok(Value::Int(n)),
                None => Ok(Value::Float((*x as f64).powf(*y as f64))),
            }
        }
        _ => match (as_f64(a), as_f64(b)) {
            (Some(x), Some(y)) => Ok(Value::Float(x.powf(y))),
            _ => Err(type_err("^", a, b)),
        },
    }
}

pub fn bit_and(a: &Value, b: &Value) -> Result<Value, OpError> {
    match (a, b) {
        (Value::Int(x), Value::Int(y)) => Ok(Value::Int(x & y)),
        _ => Err(type_err("&", a, b)),
    }
}

pub fn bit_or(a: &Value, b: &Value) -> Result<Value, OpError> {
    match (a, b) {
        (Value::Int(x), Value::Int(y)) => Ok(Value::Int(x | y)),
        _ => Err(type_err("|", a, b)),
    }
}

pub fn bit_not(a: &Value) -> Result<Value, OpError> {
    match a {
        Value::Int(x) => Ok(Value::Int(!x)),
        _ => Err(OpError::Type {
            op: "~~",
            lhs: a.type_name(),
            rhs: a.type_name(),
        }),
    }
}

fn ordering(op: &'static str, a: &Value, b: &Value) -> Result<std::cmp::Ordering, OpError> {
    match (a, b) {
        (Value::Int(x), Value::Int(y)) => Ok(x.cmp(y)),
        (Value::Str(x), Value::Str(y)) => Ok(x.cmp(y)),
        _ => match (as_f64(a), as_f64(b)) {
            (Some(x), Some(y)) => {
                x.partial_cmp(&y).ok_or(type_err(op, a, b))
            }
            _ => Err(type_err(op, a, b)),
        },
    }
}

pub fn lt(a: &Value, b: &Value) -> Result<Value, OpError> {
    Ok(Value::Bool(Truth::from_bool(ordering("<", a, b)?.is_lt())))
}

pub fn le(a: &Value, b: &Value) -> Result<Value, OpError> {
    Ok(Value::Bool(Truth::from_bool(ordering("<=", a, b)?.is_le())))
}

pub fn gt(a: &Value, b: &Value) -> Result<Value, OpError> {
    Ok(Value::Bool(Truth::from_bool(ordering(">", a, b)?.is_gt())))
}

pub fn ge(a: &Value, b: &Value) -> Result<Value, OpError> {
    Ok(Value::Bool(Truth::from_bool(ordering(">=", a, b)?.is_ge())))
}

/// Equality: numeric values compare across int/float, everything else
/// compares structurally; mismatched types are simply unequal.
/// Same-kind ints compare exactly, only genuinely mixed pairs promote
/// to f64 (which would lose precision past 2^53).
pub fn equals(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Int(x), Value::Int(y)) => x == y,
        (Value::Int(x), Value::Float(y)) | (Value::Float(y), Value::Int(x)) => *x as f64 == *y,
        _ => a == b,
    }
}

pub fn eq(a: &Value, b: &Value) -> Value {
    Value::Bool(Truth::from_bool(equals(a, b)))
}

pub fn ne(a: &Value, b: &Value) -> Value {
    Value::Bool(Truth::from_bool(!equals(a, b)))
}
