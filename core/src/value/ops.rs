//! Operator dispatch on value tag pairs.
//!
//! Arithmetic: int⊕int→int, float⊕float→float, mixed numeric promotes
//! to float, `str + str` concatenates. Comparisons yield bool. Anything
//! else is a type error, as is any division by zero.

use crate::ast::{BinaryOp, UnaryOp};
use crate::errors::{Error, Result};
use crate::memory::Pool;
use crate::value::{new_str, str_value, Value};

/// Apply a pure (non-assigning) binary operator.
pub fn binary(pool: &mut Pool, op: BinaryOp, lhs: &Value, rhs: &Value) -> Result<Value> {
    match op {
        BinaryOp::Add | BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div => {
            arithmetic(pool, op, lhs, rhs)
        }
        BinaryOp::Eq
        | BinaryOp::Ne
        | BinaryOp::Lt
        | BinaryOp::Gt
        | BinaryOp::Le
        | BinaryOp::Ge => Ok(Value::Bool(compare(pool, op, lhs, rhs)?)),
        _ => {
            debug_assert!(false, "assigning operator reached pure dispatch");
            unreachable!("assigning operators are resolved against a place")
        }
    }
}

fn arithmetic(pool: &mut Pool, op: BinaryOp, lhs: &Value, rhs: &Value) -> Result<Value> {
    match (lhs, rhs) {
        (Value::Int(a), Value::Int(b)) => Ok(Value::Int(int_arithmetic(op, *a, *b)?)),
        (Value::Float(a), Value::Float(b)) => Ok(Value::Float(float_arithmetic(op, *a, *b)?)),
        (Value::Int(a), Value::Float(b)) => Ok(Value::Float(float_arithmetic(op, *a as f64, *b)?)),
        (Value::Float(a), Value::Int(b)) => Ok(Value::Float(float_arithmetic(op, *a, *b as f64)?)),
        (Value::Str(a), Value::Str(b)) if op == BinaryOp::Add => {
            let mut text = str_value(pool, *a)?;
            text.push_str(&str_value(pool, *b)?);
            new_str(pool, &text)
        }
        _ => Err(mismatch(op, lhs, rhs)),
    }
}

/// Wrapping arithmetic, so overflow never panics. Integer division
/// truncates toward zero.
fn int_arithmetic(op: BinaryOp, a: i64, b: i64) -> Result<i64> {
    match op {
        BinaryOp::Add => Ok(a.wrapping_add(b)),
        BinaryOp::Sub => Ok(a.wrapping_sub(b)),
        BinaryOp::Mul => Ok(a.wrapping_mul(b)),
        BinaryOp::Div => {
            if b == 0 {
                Err(Error::DivisionByZero)
            } else {
                Ok(a.wrapping_div(b))
            }
        }
        _ => {
            debug_assert!(false, "non-arithmetic operator in int dispatch");
            unreachable!()
        }
    }
}

fn float_arithmetic(op: BinaryOp, a: f64, b: f64) -> Result<f64> {
    match op {
        BinaryOp::Add => Ok(a + b),
        BinaryOp::Sub => Ok(a - b),
        BinaryOp::Mul => Ok(a * b),
        BinaryOp::Div => {
            if b == 0.0 {
                Err(Error::DivisionByZero)
            } else {
                Ok(a / b)
            }
        }
        _ => {
            debug_assert!(false, "non-arithmetic operator in float dispatch");
            unreachable!()
        }
    }
}

fn compare(pool: &Pool, op: BinaryOp, lhs: &Value, rhs: &Value) -> Result<bool> {
    match (lhs, rhs) {
        (Value::Int(a), Value::Int(b)) => Ok(ordering(op, a.cmp(b))),
        (Value::Float(a), Value::Float(b)) => compare_floats(op, *a, *b),
        (Value::Int(a), Value::Float(b)) => compare_floats(op, *a as f64, *b),
        (Value::Float(a), Value::Int(b)) => compare_floats(op, *a, *b as f64),
        (Value::Str(a), Value::Str(b)) => {
            let left = str_value(pool, *a)?;
            let right = str_value(pool, *b)?;
            Ok(ordering(op, left.cmp(&right)))
        }
        (Value::Bool(a), Value::Bool(b)) => match op {
            BinaryOp::Eq => Ok(a == b),
            BinaryOp::Ne => Ok(a != b),
            _ => Err(mismatch(op, lhs, rhs)),
        },
        _ => Err(mismatch(op, lhs, rhs)),
    }
}

fn compare_floats(op: BinaryOp, a: f64, b: f64) -> Result<bool> {
    Ok(match op {
        BinaryOp::Eq => a == b,
        BinaryOp::Ne => a != b,
        BinaryOp::Lt => a < b,
        BinaryOp::Gt => a > b,
        BinaryOp::Le => a <= b,
        BinaryOp::Ge => a >= b,
        _ => {
            debug_assert!(false, "non-comparison operator in float comparison");
            unreachable!()
        }
    })
}

fn ordering(op: BinaryOp, cmp: std::cmp::Ordering) -> bool {
    match op {
        BinaryOp::Eq => cmp.is_eq(),
        BinaryOp::Ne => cmp.is_ne(),
        BinaryOp::Lt => cmp.is_lt(),
        BinaryOp::Gt => cmp.is_gt(),
        BinaryOp::Le => cmp.is_le(),
        BinaryOp::Ge => cmp.is_ge(),
        _ => {
            debug_assert!(false, "non-comparison operator in ordering dispatch");
            unreachable!()
        }
    }
}

fn mismatch(op: BinaryOp, lhs: &Value, rhs: &Value) -> Error {
    Error::TypeMismatch {
        op: op.symbol(),
        lhs: lhs.type_name(),
        rhs: rhs.type_name(),
    }
}

/// Apply a unary operator. `-` negates numerics, `!` flips bools.
pub fn unary(op: UnaryOp, value: &Value) -> Result<Value> {
    match (op, value) {
        (UnaryOp::Neg, Value::Int(i)) => Ok(Value::Int(i.wrapping_neg())),
        (UnaryOp::Neg, Value::Float(f)) => Ok(Value::Float(-f)),
        (UnaryOp::Not, Value::Bool(b)) => Ok(Value::Bool(!b)),
        _ => Err(Error::InvalidUnary {
            op: op.symbol(),
            operand: value.type_name(),
        }),
    }
}
