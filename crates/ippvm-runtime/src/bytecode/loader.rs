//! Program loader
//!
//! Converts the serde data model of a program (one record per instruction,
//! each argument a `{type, value}` pair) into validated [`Instruction`]s in
//! execution order. Every structural problem is reported as
//! [`RuntimeError::MalformedProgram`]; duplicate labels are left to
//! [`Program::new`].

use super::{Instruction, Opcode, Operand, OperandKind, Program, Scope, TypeName, VarRef};
use crate::text;
use crate::value::{RuntimeError, Value};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Program as delivered by a front end
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct ProgramSource {
    /// Instructions in any order; `order` decides execution order
    #[serde(default)]
    pub instructions: Vec<RawInstruction>,
}

/// Unvalidated instruction
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct RawInstruction {
    pub order: i64,
    pub opcode: String,
    #[serde(default)]
    pub args: Vec<RawArgument>,
}

/// Unvalidated argument
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct RawArgument {
    /// `var`, `int`, `float`, `bool`, `string`, `nil`, `label` or `type`
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub value: String,
}

impl RawArgument {
    pub fn new(kind: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            value: value.into(),
        }
    }
}

impl ProgramSource {
    /// Deserialize from JSON
    pub fn from_json(json: &str) -> Result<Self, RuntimeError> {
        serde_json::from_str(json)
            .map_err(|e| RuntimeError::malformed(format!("invalid program JSON: {}", e)))
    }

    /// Validate and order the instructions, then build the label table
    pub fn into_program(self) -> Result<Program, RuntimeError> {
        let mut seen = HashSet::new();
        for raw in &self.instructions {
            if raw.order <= 0 || raw.order > i64::from(u32::MAX) {
                return Err(RuntimeError::malformed(format!(
                    "instruction order {} is out of range",
                    raw.order
                )));
            }
            if !seen.insert(raw.order) {
                return Err(RuntimeError::malformed(format!(
                    "instruction order {} appears twice",
                    raw.order
                )));
            }
        }

        let mut raw_instructions = self.instructions;
        raw_instructions.sort_by_key(|raw| raw.order);

        let instructions = raw_instructions
            .into_iter()
            .map(convert_instruction)
            .collect::<Result<Vec<_>, _>>()?;

        Program::new(instructions)
    }
}

/// Load a program from its JSON form
pub fn load_json(json: &str) -> Result<Program, RuntimeError> {
    ProgramSource::from_json(json)?.into_program()
}

fn convert_instruction(raw: RawInstruction) -> Result<Instruction, RuntimeError> {
    let opcode = Opcode::from_name(raw.opcode.trim())
        .ok_or_else(|| RuntimeError::malformed(format!("unknown opcode '{}'", raw.opcode)))?;
    let signature = opcode.signature();
    if raw.args.len() != signature.len() {
        return Err(RuntimeError::malformed(format!(
            "{} (order {}) expects {} argument(s), got {}",
            opcode,
            raw.order,
            signature.len(),
            raw.args.len()
        )));
    }

    let operands = raw
        .args
        .iter()
        .zip(signature)
        .map(|(arg, kind)| convert_argument(arg, *kind))
        .collect::<Result<Vec<_>, _>>()?;

    // Order was range-checked by the caller.
    let order = u32::try_from(raw.order)
        .map_err(|_| RuntimeError::malformed(format!("bad order {}", raw.order)))?;
    Instruction::new(order, opcode, operands)
}

fn convert_argument(arg: &RawArgument, expected: OperandKind) -> Result<Operand, RuntimeError> {
    let operand = match arg.kind.as_str() {
        "var" => Operand::Var(parse_var(&arg.value)?),
        "label" => {
            if arg.value.is_empty() {
                return Err(RuntimeError::malformed("empty label name"));
            }
            Operand::Label(arg.value.clone())
        }
        "type" => Operand::Type(
            TypeName::from_name(&arg.value)
                .ok_or_else(|| RuntimeError::malformed(format!("bad type name '{}'", arg.value)))?,
        ),
        literal => Operand::Literal(parse_literal(literal, &arg.value)?),
    };

    if !operand.fits(expected) {
        return Err(RuntimeError::malformed(format!(
            "argument '{}' of type {} is not allowed here",
            arg.value, arg.kind
        )));
    }
    Ok(operand)
}

fn parse_literal(kind: &str, text: &str) -> Result<Value, RuntimeError> {
    let bad = || RuntimeError::malformed(format!("bad {} literal '{}'", kind, text));
    match kind {
        "int" => text::parse_int(text).map(Value::Int).ok_or_else(bad),
        "float" => text::parse_float(text).map(Value::Float).ok_or_else(bad),
        "bool" => match text {
            "true" => Ok(Value::Bool(true)),
            "false" => Ok(Value::Bool(false)),
            _ => Err(bad()),
        },
        "string" => Ok(Value::string(text)),
        "nil" if text == "nil" => Ok(Value::Nil),
        "nil" => Err(bad()),
        other => Err(RuntimeError::malformed(format!(
            "unknown argument type '{}'",
            other
        ))),
    }
}

/// Parse `GF@name`, `LF@name` or `TF@name`
pub fn parse_var(text: &str) -> Result<VarRef, RuntimeError> {
    let (prefix, name) = text
        .split_once('@')
        .ok_or_else(|| RuntimeError::malformed(format!("bad variable '{}'", text)))?;
    let scope = Scope::from_prefix(prefix)
        .ok_or_else(|| RuntimeError::malformed(format!("bad frame '{}' in '{}'", prefix, text)))?;
    if name.is_empty() {
        return Err(RuntimeError::malformed(format!(
            "empty variable name in '{}'",
            text
        )));
    }
    Ok(VarRef::new(scope, name))
}
