//! Expression and interpolation evaluator.
//!
//! The evaluator is a closed walk over [`Expression`]: the only things it can
//! reach are variables and functions handed to it through [`EvalContext`].
//!
//! Typing rules:
//!   - `+` adds numbers or concatenates two strings, never a mix
//!   - `/` always produces a float; `%` follows the sign of the divisor
//!   - integers mix with floats by widening; integer overflow is an error
//!   - comparisons need compatible operands (both numeric, both strings, ...)
//!   - `and`, `or`, `not` need booleans and short-circuit

use std::cmp::Ordering;

use crate::ast::{BinOp, Expression, StringSegment, UnaryOp};
use crate::error::{Interrupt, ScriptError};
use crate::value::Value;

/// What the evaluator may see of the running interpreter.
pub trait EvalContext {
    /// Resolves a variable through the current scope.
    fn lookup(&self, name: &str) -> Result<Value, ScriptError>;

    /// Calls a builtin or user-defined function with evaluated arguments.
    fn call_function(&mut self, name: &str, args: Vec<Value>) -> Result<Value, Interrupt>;
}

pub fn evaluate(expr: &Expression, ctx: &mut dyn EvalContext) -> Result<Value, Interrupt> {
    match expr {
        Expression::Literal(value) => Ok(value.clone()),
        Expression::Interpolated(segments) => Ok(Value::String(interpolate(segments, ctx)?)),
        Expression::Identifier(name) => Ok(ctx.lookup(name)?),
        Expression::Call { name, args } => {
            let mut values = Vec::with_capacity(args.len());
            for arg in args {
                values.push(evaluate(arg, ctx)?);
            }
            ctx.call_function(name, values)
        }
        Expression::Unary { op, operand } => {
            let value = evaluate(operand, ctx)?;
            Ok(eval_unary(*op, value)?)
        }
        Expression::Binary { op: BinOp::And, left, right } => {
            if !expect_bool(evaluate(left, ctx)?, "and")? {
                return Ok(Value::Boolean(false));
            }
            Ok(Value::Boolean(expect_bool(evaluate(right, ctx)?, "and")?))
        }
        Expression::Binary { op: BinOp::Or, left, right } => {
            if expect_bool(evaluate(left, ctx)?, "or")? {
                return Ok(Value::Boolean(true));
            }
            Ok(Value::Boolean(expect_bool(evaluate(right, ctx)?, "or")?))
        }
        Expression::Binary { op, left, right } => {
            let l = evaluate(left, ctx)?;
            let r = evaluate(right, ctx)?;
            Ok(eval_binary(*op, l, r)?)
        }
    }
}

/// Substitutes every `{name}` segment with the string form of its value.
pub fn interpolate(
    segments: &[StringSegment],
    ctx: &dyn EvalContext,
) -> Result<String, ScriptError> {
    let mut out = String::new();
    for segment in segments {
        match segment {
            StringSegment::Literal(text) => out.push_str(text),
            StringSegment::Variable(name) => out.push_str(&ctx.lookup(name)?.to_string()),
        }
    }
    Ok(out)
}

fn expect_bool(value: Value, op: &str) -> Result<bool, ScriptError> {
    match value {
        Value::Boolean(b) => Ok(b),
        other => Err(ScriptError::data(format!(
            "'{}' expects boolean operands, got {}",
            op,
            other.type_name()
        ))),
    }
}

fn eval_unary(op: UnaryOp, value: Value) -> Result<Value, ScriptError> {
    match (op, value) {
        (UnaryOp::Neg, Value::Integer(n)) => n
            .checked_neg()
            .map(Value::Integer)
            .ok_or_else(|| ScriptError::data("Integer overflow")),
        (UnaryOp::Neg, Value::Float(x)) => Ok(Value::Float(-x)),
        (UnaryOp::Neg, other) => {
            Err(ScriptError::data(format!("Cannot negate {}", other.type_name())))
        }
        (UnaryOp::Not, Value::Boolean(b)) => Ok(Value::Boolean(!b)),
        (UnaryOp::Not, other) => Err(ScriptError::data(format!(
            "'not' expects a boolean, got {}",
            other.type_name()
        ))),
    }
}

fn eval_binary(op: BinOp, l: Value, r: Value) -> Result<Value, ScriptError> {
    match op {
        BinOp::Add => match (l, r) {
            (Value::String(a), Value::String(b)) => Ok(Value::String(a + &b)),
            (Value::String(_), other) | (other, Value::String(_)) => Err(ScriptError::data(format!(
                "Cannot add string and {} (use str() to convert)",
                other.type_name()
            ))),
            (l, r) => arithmetic(op, l, r),
        },
        BinOp::Sub | BinOp::Mul | BinOp::Div | BinOp::Mod => arithmetic(op, l, r),
        BinOp::Eq => Ok(Value::Boolean(equals(&l, &r)?)),
        BinOp::NotEq => Ok(Value::Boolean(!equals(&l, &r)?)),
        BinOp::Lt | BinOp::Gt | BinOp::LtEq | BinOp::GtEq => {
            let ord = compare(op, &l, &r)?;
            Ok(Value::Boolean(match op {
                BinOp::Lt => ord == Ordering::Less,
                BinOp::Gt => ord == Ordering::Greater,
                BinOp::LtEq => ord != Ordering::Greater,
                _ => ord != Ordering::Less,
            }))
        }
        BinOp::And | BinOp::Or => {
            let a = expect_bool(l, op.symbol())?;
            let b = expect_bool(r, op.symbol())?;
            Ok(Value::Boolean(if op == BinOp::And { a && b } else { a || b }))
        }
    }
}

fn arithmetic(op: BinOp, l: Value, r: Value) -> Result<Value, ScriptError> {
    if !l.is_numeric() || !r.is_numeric() {
        return Err(ScriptError::data(format!(
            "Unsupported operand types for '{}': {} and {}",
            op.symbol(),
            l.type_name(),
            r.type_name()
        )));
    }

    if let (Value::Integer(a), Value::Integer(b)) = (&l, &r) {
        let (a, b) = (*a, *b);
        let result = match op {
            BinOp::Add => a.checked_add(b),
            BinOp::Sub => a.checked_sub(b),
            BinOp::Mul => a.checked_mul(b),
            BinOp::Mod => {
                if b == 0 {
                    return Err(ScriptError::data("Modulo by zero"));
                }
                a.checked_rem(b).map(|m| if m != 0 && (m < 0) != (b < 0) { m + b } else { m })
            }
            _ => {
                if b == 0 {
                    return Err(ScriptError::data("Division by zero"));
                }
                return Ok(Value::Float(a as f64 / b as f64));
            }
        };
        return result
            .map(Value::Integer)
            .ok_or_else(|| ScriptError::data("Integer overflow"));
    }

    let (a, b) = match (l.as_f64(), r.as_f64()) {
        (Some(a), Some(b)) => (a, b),
        _ => return Err(ScriptError::data("Expected numeric operands")),
    };
    let result = match op {
        BinOp::Add => a + b,
        BinOp::Sub => a - b,
        BinOp::Mul => a * b,
        BinOp::Div => {
            if b == 0.0 {
                return Err(ScriptError::data("Division by zero"));
            }
            a / b
        }
        _ => {
            if b == 0.0 {
                return Err(ScriptError::data("Modulo by zero"));
            }
            let m = a % b;
            if m != 0.0 && (m < 0.0) != (b < 0.0) {
                m + b
            } else {
                m
            }
        }
    };
    Ok(Value::Float(result))
}

fn equals(l: &Value, r: &Value) -> Result<bool, ScriptError> {
    match (l, r) {
        (Value::Integer(a), Value::Integer(b)) => Ok(a == b),
        (a, b) if a.is_numeric() && b.is_numeric() => Ok(a.as_f64() == b.as_f64()),
        (Value::String(a), Value::String(b)) => Ok(a == b),
        (Value::Boolean(a), Value::Boolean(b)) => Ok(a == b),
        (Value::List(a), Value::List(b)) => Ok(a == b),
        (Value::Unit, Value::Unit) => Ok(true),
        _ => Err(mismatch("==", l, r)),
    }
}

fn compare(op: BinOp, l: &Value, r: &Value) -> Result<Ordering, ScriptError> {
    match (l, r) {
        (Value::Integer(a), Value::Integer(b)) => Ok(a.cmp(b)),
        (a, b) if a.is_numeric() && b.is_numeric() => match (a.as_f64(), b.as_f64()) {
            (Some(x), Some(y)) => x
                .partial_cmp(&y)
                .ok_or_else(|| ScriptError::data("Cannot compare NaN")),
            _ => Err(mismatch(op.symbol(), l, r)),
        },
        (Value::String(a), Value::String(b)) => Ok(a.cmp(b)),
        _ => Err(mismatch(op.symbol(), l, r)),
    }
}

fn mismatch(op: &str, l: &Value, r: &Value) -> ScriptError {
    ScriptError::data(format!(
        "Cannot compare {} and {} with '{}'",
        l.type_name(),
        r.type_name(),
        op
    ))
}
