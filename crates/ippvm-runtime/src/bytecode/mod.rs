//! Program representation
//!
//! A program is an ordered list of validated instructions plus the label
//! table derived from its LABEL instructions. Instructions are immutable once
//! built; the VM only ever reads them.

mod loader;
mod opcode;

pub use loader::{load_json, parse_var, ProgramSource, RawArgument, RawInstruction};
pub use opcode::{Opcode, OperandKind};

use crate::value::{RuntimeError, Value};
use std::collections::HashMap;
use std::fmt;

/// Variable scope
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scope {
    /// `GF`, the single global frame
    Global,
    /// `LF`, top of the local frame stack
    Local,
    /// `TF`, the pending temporary frame
    Temporary,
}

impl Scope {
    /// Parse a frame prefix (`GF`, `LF`, `TF`)
    pub fn from_prefix(prefix: &str) -> Option<Scope> {
        match prefix {
            "GF" => Some(Scope::Global),
            "LF" => Some(Scope::Local),
            "TF" => Some(Scope::Temporary),
            _ => None,
        }
    }

    pub fn prefix(self) -> &'static str {
        match self {
            Scope::Global => "GF",
            Scope::Local => "LF",
            Scope::Temporary => "TF",
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.prefix())
    }
}

/// Reference to a variable, `scope@name`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VarRef {
    pub scope: Scope,
    pub name: String,
}

impl VarRef {
    pub fn new(scope: Scope, name: impl Into<String>) -> Self {
        Self {
            scope,
            name: name.into(),
        }
    }
}

impl fmt::Display for VarRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.scope, self.name)
    }
}

/// Type name operand of READ
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeName {
    Int,
    Float,
    Bool,
    String,
}

impl TypeName {
    pub fn from_name(name: &str) -> Option<TypeName> {
        match name {
            "int" => Some(TypeName::Int),
            "float" => Some(TypeName::Float),
            "bool" => Some(TypeName::Bool),
            "string" => Some(TypeName::String),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            TypeName::Int => "int",
            TypeName::Float => "float",
            TypeName::Bool => "bool",
            TypeName::String => "string",
        }
    }
}

/// Instruction operand
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    Var(VarRef),
    Literal(Value),
    Label(String),
    Type(TypeName),
}

impl Operand {
    pub fn kind_name(&self) -> &'static str {
        match self {
            Operand::Var(_) => "var",
            Operand::Literal(_) => "literal",
            Operand::Label(_) => "label",
            Operand::Type(_) => "type",
        }
    }

    /// Whether the operand fits a slot of the given kind
    pub fn fits(&self, kind: OperandKind) -> bool {
        matches!(
            (self, kind),
            (Operand::Var(_), OperandKind::Var | OperandKind::Symb)
                | (Operand::Literal(_), OperandKind::Symb)
                | (Operand::Label(_), OperandKind::Label)
                | (Operand::Type(_), OperandKind::Type)
        )
    }
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operand::Var(var) => write!(f, "{}", var),
            Operand::Literal(value) => write!(f, "{}", value),
            Operand::Label(name) => f.write_str(name),
            Operand::Type(ty) => f.write_str(ty.name()),
        }
    }
}

/// A single instruction
#[derive(Debug, Clone, PartialEq)]
pub struct Instruction {
    /// Sequence number from the program source
    pub order: u32,
    pub opcode: Opcode,
    pub operands: Vec<Operand>,
}

impl Instruction {
    /// Build an instruction, checking operands against the opcode signature
    pub fn new(order: u32, opcode: Opcode, operands: Vec<Operand>) -> Result<Self, RuntimeError> {
        let signature = opcode.signature();
        if operands.len() != signature.len() {
            return Err(RuntimeError::malformed(format!(
                "{} expects {} operand(s), got {}",
                opcode,
                signature.len(),
                operands.len()
            )));
        }
        for (slot, (operand, kind)) in operands.iter().zip(signature).enumerate() {
            if !operand.fits(*kind) {
                return Err(RuntimeError::malformed(format!(
                    "{} operand {} cannot be a {}",
                    opcode,
                    slot + 1,
                    operand.kind_name()
                )));
            }
        }
        if operands
            .iter()
            .any(|op| matches!(op, Operand::Literal(Value::Uninitialized)))
        {
            return Err(RuntimeError::malformed(format!(
                "{} has an uninitialized literal",
                opcode
            )));
        }

        Ok(Self {
            order,
            opcode,
            operands,
        })
    }

    fn operand(&self, slot: usize) -> Result<&Operand, RuntimeError> {
        self.operands.get(slot).ok_or_else(|| {
            RuntimeError::malformed(format!("{} is missing operand {}", self.opcode, slot + 1))
        })
    }

    /// Variable operand in `slot`
    pub fn var(&self, slot: usize) -> Result<&VarRef, RuntimeError> {
        match self.operand(slot)? {
            Operand::Var(var) => Ok(var),
            other => Err(self.mismatch(slot, other, "var")),
        }
    }

    /// Variable-or-literal operand in `slot`
    pub fn symb(&self, slot: usize) -> Result<&Operand, RuntimeError> {
        match self.operand(slot)? {
            op @ (Operand::Var(_) | Operand::Literal(_)) => Ok(op),
            other => Err(self.mismatch(slot, other, "symb")),
        }
    }

    /// Label operand in `slot`
    pub fn label(&self, slot: usize) -> Result<&str, RuntimeError> {
        match self.operand(slot)? {
            Operand::Label(name) => Ok(name),
            other => Err(self.mismatch(slot, other, "label")),
        }
    }

    /// Type operand in `slot`
    pub fn type_name(&self, slot: usize) -> Result<TypeName, RuntimeError> {
        match self.operand(slot)? {
            Operand::Type(ty) => Ok(*ty),
            other => Err(self.mismatch(slot, other, "type")),
        }
    }

    fn mismatch(&self, slot: usize, found: &Operand, expected: &str) -> RuntimeError {
        RuntimeError::malformed(format!(
            "{} operand {} should be a {}, found a {}",
            self.opcode,
            slot + 1,
            expected,
            found.kind_name()
        ))
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.opcode)?;
        for operand in &self.operands {
            write!(f, " {}", operand)?;
        }
        Ok(())
    }
}

/// Label name to instruction index
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LabelTable {
    entries: HashMap<String, usize>,
}

impl LabelTable {
    /// Collect every LABEL instruction. Duplicate names are rejected here,
    /// before anything runs.
    pub fn build(instructions: &[Instruction]) -> Result<Self, RuntimeError> {
        let mut entries = HashMap::new();
        for (index, instruction) in instructions.iter().enumerate() {
            if instruction.opcode != Opcode::Label {
                continue;
            }
            let name = instruction.label(0)?;
            if entries.insert(name.to_string(), index).is_some() {
                return Err(RuntimeError::DuplicateLabel {
                    name: name.to_string(),
                });
            }
        }
        Ok(Self { entries })
    }

    /// Instruction index of a label
    pub fn resolve(&self, name: &str) -> Result<usize, RuntimeError> {
        self.entries
            .get(name)
            .copied()
            .ok_or_else(|| RuntimeError::UndefinedLabel {
                name: name.to_string(),
            })
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Executable program
#[derive(Debug, Clone, PartialEq)]
pub struct Program {
    instructions: Vec<Instruction>,
    labels: LabelTable,
}

impl Program {
    /// Wrap instructions already in execution order and build the label table
    pub fn new(instructions: Vec<Instruction>) -> Result<Self, RuntimeError> {
        let labels = LabelTable::build(&instructions)?;
        Ok(Self {
            instructions,
            labels,
        })
    }

    pub fn instructions(&self) -> &[Instruction] {
        &self.instructions
    }

    pub fn get(&self, index: usize) -> Option<&Instruction> {
        self.instructions.get(index)
    }

    pub fn labels(&self) -> &LabelTable {
        &self.labels
    }

    pub fn len(&self) -> usize {
        self.instructions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }
}
