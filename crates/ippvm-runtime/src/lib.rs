//! ippvm runtime - interpreter core
//!
//! This library provides the execution engine of a frame-based stack
//! bytecode language:
//! - Values and the fatal error kinds with their exit codes
//! - The program model, label table and JSON program loader
//! - The frame store, operand and call stacks, and operation library
//! - The fetch-execute VM and an embedding facade

/// ippvm runtime version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod bytecode;
pub mod runtime;
pub mod text;
pub mod value;
pub mod vm;

pub use bytecode::{load_json, Instruction, Opcode, Operand, Program, Scope, VarRef};
pub use runtime::{CapturedRun, RunOutcome, Runtime, SharedBuffer};
pub use value::{ErrorKind, RuntimeError, Value};
pub use vm::{Fault, VmOptions, VmState, VM};
