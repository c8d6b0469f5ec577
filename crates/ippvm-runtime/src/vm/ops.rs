//! Operation library
//!
//! Pure value-level semantics of every computing instruction. The VM routes
//! both the destination forms (`SUB var symb symb`) and the stack forms
//! (`SUBS`) through [`apply_binary`] / [`apply_unary`], so the two can never
//! disagree.
//!
//! Operand order: operands are pushed in source order and popped LIFO, so a
//! binary operation receives `(second_popped, first_popped)` which is
//! `(symb1, symb2)`.

use super::stack::OperandStack;
use crate::value::{RuntimeError, Value};
use std::cmp::Ordering;

/// Two-operand operations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    IDiv,
    Div,
    Lt,
    Gt,
    Eq,
    And,
    Or,
    Concat,
    GetChar,
    Stri2Int,
}

/// One-operand operations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Not,
    Int2Char,
    Int2Float,
    Float2Int,
    StrLen,
}

impl BinaryOp {
    pub fn name(self) -> &'static str {
        match self {
            BinaryOp::Add => "ADD",
            BinaryOp::Sub => "SUB",
            BinaryOp::Mul => "MUL",
            BinaryOp::IDiv => "IDIV",
            BinaryOp::Div => "DIV",
            BinaryOp::Lt => "LT",
            BinaryOp::Gt => "GT",
            BinaryOp::Eq => "EQ",
            BinaryOp::And => "AND",
            BinaryOp::Or => "OR",
            BinaryOp::Concat => "CONCAT",
            BinaryOp::GetChar => "GETCHAR",
            BinaryOp::Stri2Int => "STRI2INT",
        }
    }

    /// Compute `lhs <op> rhs`
    pub fn apply(self, lhs: &Value, rhs: &Value) -> Result<Value, RuntimeError> {
        match self {
            BinaryOp::Add | BinaryOp::Sub | BinaryOp::Mul => self.arithmetic(lhs, rhs),
            BinaryOp::IDiv => match (lhs, rhs) {
                (Value::Int(a), Value::Int(b)) => floor_div(*a, *b).map(Value::Int),
                _ => Err(self.mismatch(lhs, rhs, "two ints")),
            },
            BinaryOp::Div => match (lhs, rhs) {
                (Value::Float(_), Value::Float(b)) if *b == 0.0 => {
                    Err(RuntimeError::value_error("float division by zero"))
                }
                (Value::Float(a), Value::Float(b)) => Ok(Value::Float(a / b)),
                _ => Err(self.mismatch(lhs, rhs, "two floats")),
            },
            BinaryOp::Lt => Ok(Value::Bool(self.compare(lhs, rhs)? == Some(Ordering::Less))),
            BinaryOp::Gt => Ok(Value::Bool(
                self.compare(lhs, rhs)? == Some(Ordering::Greater),
            )),
            BinaryOp::Eq => equals(lhs, rhs).map(Value::Bool),
            BinaryOp::And | BinaryOp::Or => match (lhs, rhs) {
                (Value::Bool(a), Value::Bool(b)) => Ok(Value::Bool(if self == BinaryOp::And {
                    *a && *b
                } else {
                    *a || *b
                })),
                _ => Err(self.mismatch(lhs, rhs, "two bools")),
            },
            BinaryOp::Concat => match (lhs, rhs) {
                (Value::String(a), Value::String(b)) => {
                    let mut joined = String::with_capacity(a.len() + b.len());
                    joined.push_str(a);
                    joined.push_str(b);
                    Ok(Value::string(joined))
                }
                _ => Err(self.mismatch(lhs, rhs, "two strings")),
            },
            BinaryOp::GetChar => match (lhs, rhs) {
                (Value::String(s), Value::Int(index)) => {
                    char_at(s, *index).map(|c| Value::string(c.to_string()))
                }
                _ => Err(self.mismatch(lhs, rhs, "a string and an int")),
            },
            BinaryOp::Stri2Int => match (lhs, rhs) {
                (Value::String(s), Value::Int(index)) => {
                    char_at(s, *index).map(|c| Value::Int(i64::from(u32::from(c))))
                }
                _ => Err(self.mismatch(lhs, rhs, "a string and an int")),
            },
        }
    }

    fn arithmetic(self, lhs: &Value, rhs: &Value) -> Result<Value, RuntimeError> {
        match (lhs, rhs) {
            (Value::Int(a), Value::Int(b)) => {
                let result = match self {
                    BinaryOp::Add => a.checked_add(*b),
                    BinaryOp::Sub => a.checked_sub(*b),
                    _ => a.checked_mul(*b),
                };
                result.map(Value::Int).ok_or_else(|| {
                    RuntimeError::value_error(format!("{} overflows: {} and {}", self.name(), a, b))
                })
            }
            (Value::Float(a), Value::Float(b)) => Ok(Value::Float(match self {
                BinaryOp::Add => a + b,
                BinaryOp::Sub => a - b,
                _ => a * b,
            })),
            _ => Err(self.mismatch(lhs, rhs, "two ints or two floats")),
        }
    }

    /// Ordering of two same-kind values. `None` only for NaN floats.
    fn compare(self, lhs: &Value, rhs: &Value) -> Result<Option<Ordering>, RuntimeError> {
        match (lhs, rhs) {
            (Value::Int(a), Value::Int(b)) => Ok(Some(a.cmp(b))),
            (Value::Float(a), Value::Float(b)) => Ok(a.partial_cmp(b)),
            (Value::Bool(a), Value::Bool(b)) => Ok(Some(a.cmp(b))),
            (Value::String(a), Value::String(b)) => Ok(Some(a.as_str().cmp(b.as_str()))),
            _ => Err(self.mismatch(lhs, rhs, "two values of the same non-nil type")),
        }
    }

    fn mismatch(self, lhs: &Value, rhs: &Value, expected: &str) -> RuntimeError {
        RuntimeError::type_error(format!(
            "{} expects {}, got {} and {}",
            self.name(),
            expected,
            lhs.type_name(),
            rhs.type_name()
        ))
    }
}

impl UnaryOp {
    pub fn name(self) -> &'static str {
        match self {
            UnaryOp::Not => "NOT",
            UnaryOp::Int2Char => "INT2CHAR",
            UnaryOp::Int2Float => "INT2FLOAT",
            UnaryOp::Float2Int => "FLOAT2INT",
            UnaryOp::StrLen => "STRLEN",
        }
    }

    pub fn apply(self, operand: &Value) -> Result<Value, RuntimeError> {
        match (self, operand) {
            (UnaryOp::Not, Value::Bool(b)) => Ok(Value::Bool(!b)),
            (UnaryOp::Int2Char, Value::Int(code)) => u32::try_from(*code)
                .ok()
                .and_then(char::from_u32)
                .map(|c| Value::string(c.to_string()))
                .ok_or_else(|| {
                    RuntimeError::string_error(format!("{} is not a valid code point", code))
                }),
            (UnaryOp::Int2Float, Value::Int(n)) => Ok(Value::Float(*n as f64)),
            (UnaryOp::Float2Int, Value::Float(x)) => float_to_int(*x).map(Value::Int),
            (UnaryOp::StrLen, Value::String(s)) => Ok(Value::Int(s.chars().count() as i64)),
            _ => Err(RuntimeError::type_error(format!(
                "{} expects {}, got {}",
                self.name(),
                self.expected(),
                operand.type_name()
            ))),
        }
    }

    fn expected(self) -> &'static str {
        match self {
            UnaryOp::Not => "a bool",
            UnaryOp::Int2Char | UnaryOp::Int2Float => "an int",
            UnaryOp::Float2Int => "a float",
            UnaryOp::StrLen => "a string",
        }
    }
}

/// Pop two operands, apply `op`, push the result
pub fn apply_binary(stack: &mut OperandStack, op: BinaryOp) -> Result<(), RuntimeError> {
    let rhs = stack.pop()?;
    let lhs = stack.pop()?;
    stack.push(op.apply(&lhs, &rhs)?);
    Ok(())
}

/// Pop one operand, apply `op`, push the result
pub fn apply_unary(stack: &mut OperandStack, op: UnaryOp) -> Result<(), RuntimeError> {
    let operand = stack.pop()?;
    stack.push(op.apply(&operand)?);
    Ok(())
}

/// EQ semantics. `nil` compares with anything; other kinds must match.
pub fn equals(lhs: &Value, rhs: &Value) -> Result<bool, RuntimeError> {
    match (lhs, rhs) {
        (Value::Nil, other) | (other, Value::Nil) => Ok(other.is_nil()),
        (Value::Int(a), Value::Int(b)) => Ok(a == b),
        (Value::Float(a), Value::Float(b)) => Ok(a == b),
        (Value::Bool(a), Value::Bool(b)) => Ok(a == b),
        (Value::String(a), Value::String(b)) => Ok(a == b),
        _ => Err(RuntimeError::type_error(format!(
            "EQ expects two values of the same type or nil, got {} and {}",
            lhs.type_name(),
            rhs.type_name()
        ))),
    }
}

/// SETCHAR: `target` with the character at `index` replaced by the first
/// character of `source`
pub fn set_char(target: &Value, index: &Value, source: &Value) -> Result<Value, RuntimeError> {
    let (Value::String(target), Value::Int(index), Value::String(source)) =
        (target, index, source)
    else {
        return Err(RuntimeError::type_error(format!(
            "SETCHAR expects a string, an int and a string, got {}, {} and {}",
            target.type_name(),
            index.type_name(),
            source.type_name()
        )));
    };

    let replacement = source
        .chars()
        .next()
        .ok_or_else(|| RuntimeError::string_error("SETCHAR with an empty string"))?;
    let position = char_index(target, *index)?;

    let mut chars: Vec<char> = target.chars().collect();
    chars[position] = replacement;
    Ok(Value::string(chars.into_iter().collect::<String>()))
}

fn char_at(s: &str, index: i64) -> Result<char, RuntimeError> {
    let position = char_index(s, index)?;
    s.chars()
        .nth(position)
        .ok_or_else(|| RuntimeError::string_error(format!("index {} out of range", index)))
}

/// Validate `0 <= index < len` in characters
fn char_index(s: &str, index: i64) -> Result<usize, RuntimeError> {
    let len = s.chars().count();
    usize::try_from(index)
        .ok()
        .filter(|i| *i < len)
        .ok_or_else(|| {
            RuntimeError::string_error(format!(
                "index {} out of range for string of length {}",
                index, len
            ))
        })
}

fn floor_div(a: i64, b: i64) -> Result<i64, RuntimeError> {
    if b == 0 {
        return Err(RuntimeError::value_error("integer division by zero"));
    }
    let quotient = a
        .checked_div(b)
        .ok_or_else(|| RuntimeError::value_error(format!("IDIV overflows: {} and {}", a, b)))?;
    if a % b != 0 && ((a < 0) != (b < 0)) {
        Ok(quotient - 1)
    } else {
        Ok(quotient)
    }
}

fn float_to_int(x: f64) -> Result<i64, RuntimeError> {
    // i64::MAX as f64 rounds up to 2^63, so the upper bound is exclusive.
    if !x.is_finite() || x < i64::MIN as f64 || x >= i64::MAX as f64 {
        return Err(RuntimeError::value_error(format!(
            "float {} does not fit an int",
            x
        )));
    }
    Ok(x.trunc() as i64)
}
