//! Operand stack and call stack

use crate::value::{RuntimeError, Value};

/// LIFO scratch area for values
#[derive(Debug, Clone, Default)]
pub struct OperandStack {
    values: Vec<Value>,
}

impl OperandStack {
    pub fn new() -> Self {
        Self {
            values: Vec::with_capacity(64),
        }
    }

    pub fn push(&mut self, value: Value) {
        self.values.push(value);
    }

    pub fn pop(&mut self) -> Result<Value, RuntimeError> {
        self.values.pop().ok_or(RuntimeError::OperandStackEmpty)
    }

    pub fn clear(&mut self) {
        self.values.clear();
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Bottom to top
    pub fn values(&self) -> &[Value] {
        &self.values
    }
}

/// Return addresses pushed by CALL
#[derive(Debug, Clone, Default)]
pub struct CallStack {
    returns: Vec<usize>,
}

impl CallStack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, return_ip: usize) {
        self.returns.push(return_ip);
    }

    pub fn pop(&mut self) -> Result<usize, RuntimeError> {
        self.returns.pop().ok_or(RuntimeError::CallStackEmpty)
    }

    pub fn len(&self) -> usize {
        self.returns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.returns.is_empty()
    }
}
