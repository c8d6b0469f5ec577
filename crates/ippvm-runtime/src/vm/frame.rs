//! Frame store
//!
//! Owns the three variable scopes and is the only place scope resolution
//! happens:
//!
//! ```text
//! GF  global frame, alive for the whole run
//! LF  top of the local frame stack   [frame0][frame1]...[top]
//! TF  pending temporary frame        Option<Frame>
//! ```
//!
//! `LF@x` with an empty local stack or `TF@x` with no pending frame is a
//! [`RuntimeError::ScopeNotAvailable`]; there is no fallback to another scope.

use crate::bytecode::{Scope, VarRef};
use crate::value::{RuntimeError, Value};
use std::collections::HashMap;

/// Named variable inside a frame
#[derive(Debug, Clone, PartialEq)]
pub struct Variable {
    pub name: String,
    pub value: Value,
}

/// One frame: variable name to variable
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Frame {
    variables: HashMap<String, Variable>,
}

impl Frame {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&Variable> {
        self.variables.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.variables.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.variables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.variables.is_empty()
    }

    /// Variables sorted by name
    pub fn variables(&self) -> Vec<&Variable> {
        let mut vars: Vec<_> = self.variables.values().collect();
        vars.sort_by(|a, b| a.name.cmp(&b.name));
        vars
    }
}

/// Global frame, local frame stack and the optional temporary frame
#[derive(Debug, Clone, Default)]
pub struct FrameStore {
    global: Frame,
    locals: Vec<Frame>,
    temporary: Option<Frame>,
}

impl FrameStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Define `name` in `scope` holding [`Value::Uninitialized`]
    pub fn define(&mut self, scope: Scope, name: &str) -> Result<(), RuntimeError> {
        let frame = self.frame_mut(scope)?;
        if frame.contains(name) {
            return Err(RuntimeError::VariableRedefinition {
                scope,
                name: name.to_string(),
            });
        }
        frame.variables.insert(
            name.to_string(),
            Variable {
                name: name.to_string(),
                value: Value::Uninitialized,
            },
        );
        Ok(())
    }

    pub fn get(&self, scope: Scope, name: &str) -> Result<&Variable, RuntimeError> {
        self.frame(scope)?
            .get(name)
            .ok_or_else(|| RuntimeError::VariableNotDefined {
                scope,
                name: name.to_string(),
            })
    }

    pub fn set(&mut self, scope: Scope, name: &str, value: Value) -> Result<(), RuntimeError> {
        let variable = self.frame_mut(scope)?.variables.get_mut(name).ok_or_else(|| {
            RuntimeError::VariableNotDefined {
                scope,
                name: name.to_string(),
            }
        })?;
        variable.value = value;
        Ok(())
    }

    /// Initialized value of a variable; uninitialized is a missing value
    pub fn read(&self, var: &VarRef) -> Result<Value, RuntimeError> {
        let variable = self.get(var.scope, &var.name)?;
        if !variable.value.is_initialized() {
            return Err(RuntimeError::MissingValue {
                what: var.to_string(),
            });
        }
        Ok(variable.value.clone())
    }

    /// Value of a variable, possibly [`Value::Uninitialized`]
    pub fn peek(&self, var: &VarRef) -> Result<Value, RuntimeError> {
        Ok(self.get(var.scope, &var.name)?.value.clone())
    }

    pub fn assign(&mut self, var: &VarRef, value: Value) -> Result<(), RuntimeError> {
        self.set(var.scope, &var.name, value)
    }

    /// CREATEFRAME: replace any pending temporary frame with an empty one
    pub fn create_temporary(&mut self) {
        self.temporary = Some(Frame::new());
    }

    /// PUSHFRAME: move the temporary frame onto the local stack
    pub fn push_temporary_to_local(&mut self) -> Result<(), RuntimeError> {
        let frame = self
            .temporary
            .take()
            .ok_or(RuntimeError::ScopeNotAvailable {
                scope: Scope::Temporary,
            })?;
        self.locals.push(frame);
        Ok(())
    }

    /// POPFRAME: move the top local frame into the temporary slot
    pub fn pop_local_to_temporary(&mut self) -> Result<(), RuntimeError> {
        let frame = self.locals.pop().ok_or(RuntimeError::ScopeNotAvailable {
            scope: Scope::Local,
        })?;
        self.temporary = Some(frame);
        Ok(())
    }

    pub fn global(&self) -> &Frame {
        &self.global
    }

    pub fn local(&self) -> Option<&Frame> {
        self.locals.last()
    }

    pub fn temporary(&self) -> Option<&Frame> {
        self.temporary.as_ref()
    }

    pub fn local_depth(&self) -> usize {
        self.locals.len()
    }

    fn frame(&self, scope: Scope) -> Result<&Frame, RuntimeError> {
        match scope {
            Scope::Global => Some(&self.global),
            Scope::Local => self.locals.last(),
            Scope::Temporary => self.temporary.as_ref(),
        }
        .ok_or(RuntimeError::ScopeNotAvailable { scope })
    }

    fn frame_mut(&mut self, scope: Scope) -> Result<&mut Frame, RuntimeError> {
        match scope {
            Scope::Global => Some(&mut self.global),
            Scope::Local => self.locals.last_mut(),
            Scope::Temporary => self.temporary.as_mut(),
        }
        .ok_or(RuntimeError::ScopeNotAvailable { scope })
    }
}
