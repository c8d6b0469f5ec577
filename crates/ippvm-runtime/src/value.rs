//! Runtime value representation
//!
//! Values are small tagged scalars. Strings are reference-counted so that
//! moving them between variables and the operand stack is a refcount bump.
//! `Uninitialized` only ever lives inside a freshly defined variable; every
//! read path rejects it with [`RuntimeError::MissingValue`].

use crate::bytecode::Scope;
use crate::text;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// Runtime value
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// 64-bit signed integer
    Int(i64),
    /// IEEE 754 double
    Float(f64),
    /// Boolean
    Bool(bool),
    /// Immutable string (stored with escapes undecoded)
    String(Arc<String>),
    /// The `nil` value
    Nil,
    /// Placeholder held by a variable between DEFVAR and its first write
    Uninitialized,
}

impl Value {
    /// Create a string value
    pub fn string(s: impl Into<String>) -> Self {
        Value::String(Arc::new(s.into()))
    }

    /// Type name as reported by the TYPE instruction.
    ///
    /// An uninitialized value has the empty type name.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Bool(_) => "bool",
            Value::String(_) => "string",
            Value::Nil => "nil",
            Value::Uninitialized => "",
        }
    }

    pub fn is_initialized(&self) -> bool {
        !matches!(self, Value::Uninitialized)
    }

    pub fn is_nil(&self) -> bool {
        matches!(self, Value::Nil)
    }

    /// Text written to the output stream by WRITE
    pub fn to_output_string(&self) -> String {
        match self {
            Value::Int(n) => n.to_string(),
            Value::Float(f) => text::format_float(*f),
            Value::Bool(b) => b.to_string(),
            Value::String(s) => text::decode_escapes(s),
            Value::Nil | Value::Uninitialized => String::new(),
        }
    }
}

/// Literal notation (`int@5`, `string@hello`, `nil@nil`), used in traces
/// and state dumps.
impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int(n) => write!(f, "int@{}", n),
            Value::Float(x) => write!(f, "float@{}", text::format_float(*x)),
            Value::Bool(b) => write!(f, "bool@{}", b),
            Value::String(s) => write!(f, "string@{}", s),
            Value::Nil => write!(f, "nil@nil"),
            Value::Uninitialized => write!(f, "<uninitialized>"),
        }
    }
}

/// Error kinds, each mapped to a fixed process exit code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    MalformedProgram,
    DuplicateLabel,
    UndefinedLabel,
    VariableRedefinition,
    VariableNotDefined,
    ScopeNotAvailable,
    MissingValue,
    CallStackEmpty,
    OperandStackEmpty,
    OperandTypeBad,
    OperandValueBad,
    StringIndexBad,
    Internal,
}

impl ErrorKind {
    /// Process exit code reported for this kind of error
    pub fn exit_code(self) -> u8 {
        match self {
            ErrorKind::MalformedProgram => 32,
            ErrorKind::DuplicateLabel
            | ErrorKind::UndefinedLabel
            | ErrorKind::VariableRedefinition => 52,
            ErrorKind::OperandTypeBad => 53,
            ErrorKind::VariableNotDefined => 54,
            ErrorKind::ScopeNotAvailable => 55,
            ErrorKind::MissingValue | ErrorKind::CallStackEmpty | ErrorKind::OperandStackEmpty => {
                56
            }
            ErrorKind::OperandValueBad => 57,
            ErrorKind::StringIndexBad => 58,
            ErrorKind::Internal => 99,
        }
    }
}

/// Runtime error. Every error is fatal to the run that raised it.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RuntimeError {
    /// Program violates a structural precondition
    #[error("Malformed program: {msg}")]
    MalformedProgram { msg: String },
    /// Two LABEL instructions share a name
    #[error("Duplicate label: {name}")]
    DuplicateLabel { name: String },
    /// Jump or call to a label that does not exist
    #[error("Undefined label: {name}")]
    UndefinedLabel { name: String },
    /// DEFVAR of a name that already exists in the frame
    #[error("Variable redefinition: {scope}@{name}")]
    VariableRedefinition { scope: Scope, name: String },
    /// Access to a name missing from an existing frame
    #[error("Undefined variable: {scope}@{name}")]
    VariableNotDefined { scope: Scope, name: String },
    /// Access to LF with no local frame or TF with no temporary frame
    #[error("Frame not available: {scope}")]
    ScopeNotAvailable { scope: Scope },
    /// Read of a variable that was defined but never assigned
    #[error("Missing value: {what}")]
    MissingValue { what: String },
    /// RETURN without a matching CALL
    #[error("Call stack is empty")]
    CallStackEmpty,
    /// Pop from an empty operand stack
    #[error("Operand stack is empty")]
    OperandStackEmpty,
    /// Operand kinds do not fit the operation
    #[error("Type error: {msg}")]
    OperandType { msg: String },
    /// Operand kind fits but its value does not
    #[error("Invalid operand value: {msg}")]
    OperandValue { msg: String },
    /// String index or code point out of range
    #[error("String error: {msg}")]
    StringIndex { msg: String },
    /// Failure of the input or output stream
    #[error("I/O error: {message}")]
    IoError { message: String },
}

impl RuntimeError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            RuntimeError::MalformedProgram { .. } => ErrorKind::MalformedProgram,
            RuntimeError::DuplicateLabel { .. } => ErrorKind::DuplicateLabel,
            RuntimeError::UndefinedLabel { .. } => ErrorKind::UndefinedLabel,
            RuntimeError::VariableRedefinition { .. } => ErrorKind::VariableRedefinition,
            RuntimeError::VariableNotDefined { .. } => ErrorKind::VariableNotDefined,
            RuntimeError::ScopeNotAvailable { .. } => ErrorKind::ScopeNotAvailable,
            RuntimeError::MissingValue { .. } => ErrorKind::MissingValue,
            RuntimeError::CallStackEmpty => ErrorKind::CallStackEmpty,
            RuntimeError::OperandStackEmpty => ErrorKind::OperandStackEmpty,
            RuntimeError::OperandType { .. } => ErrorKind::OperandTypeBad,
            RuntimeError::OperandValue { .. } => ErrorKind::OperandValueBad,
            RuntimeError::StringIndex { .. } => ErrorKind::StringIndexBad,
            RuntimeError::IoError { .. } => ErrorKind::Internal,
        }
    }

    pub fn exit_code(&self) -> u8 {
        self.kind().exit_code()
    }

    pub(crate) fn malformed(msg: impl Into<String>) -> Self {
        RuntimeError::MalformedProgram { msg: msg.into() }
    }

    pub(crate) fn type_error(msg: impl Into<String>) -> Self {
        RuntimeError::OperandType { msg: msg.into() }
    }

    pub(crate) fn value_error(msg: impl Into<String>) -> Self {
        RuntimeError::OperandValue { msg: msg.into() }
    }

    pub(crate) fn string_error(msg: impl Into<String>) -> Self {
        RuntimeError::StringIndex { msg: msg.into() }
    }
}

impl From<std::io::Error> for RuntimeError {
    fn from(err: std::io::Error) -> Self {
        RuntimeError::IoError {
            message: err.to_string(),
        }
    }
}
