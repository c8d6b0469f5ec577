//! Execution engine
//!
//! Fetch-execute loop over a validated [`Program`]. The engine owns every
//! piece of run-time state: the frame store, the operand stack, the call
//! stack and the instruction pointer.
//!
//! State machine:
//!
//! ```text
//! Running { ip } --(instruction ok)--> Running { next }
//!                --(EXIT n / end)----> Halted { code }
//!                --(any error)-------> Faulted(fault)
//! ```
//!
//! Once halted or faulted, no further instruction executes.

mod frame;
pub mod ops;
mod profiler;
mod stack;

pub use frame::{Frame, FrameStore, Variable};
pub use ops::{BinaryOp, UnaryOp};
pub use profiler::Profiler;
pub use stack::{CallStack, OperandStack};

use crate::bytecode::{Instruction, Opcode, Operand, Program, TypeName};
use crate::text;
use crate::value::{ErrorKind, RuntimeError, Value};
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, trace, warn};

/// Highest exit code a program may request with EXIT
pub const MAX_EXIT_CODE: i64 = 49;

/// Error raised by an instruction, with the instruction that raised it
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{error} (instruction {position}, order {order}, {opcode})")]
pub struct Fault {
    /// Index into the program's instruction list
    pub position: usize,
    /// Order number from the program source
    pub order: u32,
    pub opcode: Opcode,
    #[source]
    pub error: RuntimeError,
}

impl Fault {
    pub fn kind(&self) -> ErrorKind {
        self.error.kind()
    }

    pub fn exit_code(&self) -> u8 {
        self.error.exit_code()
    }
}

/// Engine state
#[derive(Debug, Clone, PartialEq)]
pub enum VmState {
    /// Next instruction to execute is `ip`
    Running { ip: usize },
    /// Stopped by EXIT or by running off the end of the program
    Halted { code: u8 },
    /// Stopped by an error
    Faulted(Fault),
}

/// Control transfer requested by an instruction
#[derive(Debug, Clone, PartialEq)]
enum Transfer {
    Label(String),
    Return(usize),
    Halt(u8),
}

/// Engine options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VmOptions {
    /// DPRINT and BREAK write to the diagnostic stream
    pub debug_output: bool,
}

impl Default for VmOptions {
    fn default() -> Self {
        Self { debug_output: true }
    }
}

/// Virtual machine
pub struct VM {
    program: Arc<Program>,
    frames: FrameStore,
    operands: OperandStack,
    calls: CallStack,
    state: VmState,
    /// Instructions executed so far
    executed: u64,
    /// Position, order and opcode of the last executed instruction
    last_executed: Option<(usize, u32, Opcode)>,
    options: VmOptions,
    profiler: Option<Profiler>,
    /// READ source (defaults to stdin)
    input: Box<dyn BufRead>,
    /// WRITE target (defaults to stdout)
    output: Box<dyn Write>,
    /// DPRINT and BREAK target (defaults to stderr)
    diagnostics: Box<dyn Write>,
}

impl VM {
    pub fn new(program: impl Into<Arc<Program>>) -> Self {
        let program = program.into();
        let state = if program.is_empty() {
            VmState::Halted { code: 0 }
        } else {
            VmState::Running { ip: 0 }
        };
        Self {
            program,
            frames: FrameStore::new(),
            operands: OperandStack::new(),
            calls: CallStack::new(),
            state,
            executed: 0,
            last_executed: None,
            options: VmOptions::default(),
            profiler: None,
            input: Box::new(BufReader::new(io::stdin())),
            output: Box::new(BufWriter::new(io::stdout())),
            diagnostics: Box::new(io::stderr()),
        }
    }

    /// Create a VM that collects execution statistics
    pub fn with_profiling(program: impl Into<Arc<Program>>) -> Self {
        let mut vm = Self::new(program);
        vm.profiler = Some(Profiler::new());
        vm
    }

    pub fn set_options(&mut self, options: VmOptions) {
        self.options = options;
    }

    pub fn set_input(&mut self, input: Box<dyn BufRead>) {
        self.input = input;
    }

    pub fn set_output(&mut self, output: Box<dyn Write>) {
        self.output = output;
    }

    pub fn set_diagnostics(&mut self, diagnostics: Box<dyn Write>) {
        self.diagnostics = diagnostics;
    }

    pub fn enable_profiling(&mut self) {
        if self.profiler.is_none() {
            self.profiler = Some(Profiler::new());
        }
    }

    pub fn profiler(&self) -> Option<&Profiler> {
        self.profiler.as_ref()
    }

    pub fn program(&self) -> &Program {
        &self.program
    }

    pub fn state(&self) -> &VmState {
        &self.state
    }

    pub fn frames(&self) -> &FrameStore {
        &self.frames
    }

    pub fn operand_stack(&self) -> &OperandStack {
        &self.operands
    }

    pub fn call_stack(&self) -> &CallStack {
        &self.calls
    }

    pub fn executed(&self) -> u64 {
        self.executed
    }

    /// Run until the program halts or faults, returning the exit code
    pub fn run(&mut self) -> Result<u8, Fault> {
        debug!(
            instructions = self.program.len(),
            labels = self.program.labels().len(),
            "starting program"
        );

        let result = loop {
            match self.step() {
                Ok(true) => continue,
                Ok(false) => break Ok(self.exit_code()),
                Err(fault) => break Err(fault),
            }
        };

        match result {
            Ok(code) => {
                self.flush()?;
                debug!(code, executed = self.executed, "program halted");
                Ok(code)
            }
            Err(fault) => {
                // Output written before the fault stays visible.
                let _ = self.flush();
                warn!(
                    code = fault.exit_code(),
                    position = fault.position,
                    order = fault.order,
                    "program faulted: {}",
                    fault.error
                );
                Err(fault)
            }
        }
    }

    /// Execute one instruction. Returns whether the VM is still running.
    pub fn step(&mut self) -> Result<bool, Fault> {
        let ip = match &self.state {
            VmState::Running { ip } => *ip,
            VmState::Halted { .. } => return Ok(false),
            VmState::Faulted(fault) => return Err(fault.clone()),
        };

        let program = Arc::clone(&self.program);
        let Some(instruction) = program.get(ip) else {
            self.state = VmState::Halted { code: 0 };
            return Ok(false);
        };

        trace!(position = ip, order = instruction.order, "{}", instruction);
        self.executed += 1;
        self.last_executed = Some((ip, instruction.order, instruction.opcode));
        if let Some(profiler) = self.profiler.as_mut() {
            profiler.record_instruction(instruction.opcode);
        }

        let outcome = self
            .execute(instruction, ip)
            .and_then(|transfer| self.next_state(&program, ip, transfer));

        match outcome {
            Ok(state) => {
                if let Some(profiler) = self.profiler.as_mut() {
                    profiler.update_depths(self.operands.len(), self.frames.local_depth());
                }
                self.state = state;
                Ok(matches!(self.state, VmState::Running { .. }))
            }
            Err(error) => {
                let fault = Fault {
                    position: ip,
                    order: instruction.order,
                    opcode: instruction.opcode,
                    error,
                };
                self.state = VmState::Faulted(fault.clone());
                Err(fault)
            }
        }
    }

    fn next_state(
        &self,
        program: &Program,
        ip: usize,
        transfer: Option<Transfer>,
    ) -> Result<VmState, RuntimeError> {
        let next = match transfer {
            None => ip + 1,
            Some(Transfer::Label(name)) => program.labels().resolve(&name)?,
            Some(Transfer::Return(target)) => target,
            Some(Transfer::Halt(code)) => return Ok(VmState::Halted { code }),
        };
        if next < program.len() {
            Ok(VmState::Running { ip: next })
        } else {
            Ok(VmState::Halted { code: 0 })
        }
    }

    fn exit_code(&self) -> u8 {
        match self.state {
            VmState::Halted { code } => code,
            _ => 0,
        }
    }

    fn flush(&mut self) -> Result<(), Fault> {
        let flushed = self
            .output
            .flush()
            .and_then(|()| self.diagnostics.flush());
        match (flushed, self.last_executed) {
            (Err(err), Some((position, order, opcode))) => {
                let fault = Fault {
                    position,
                    order,
                    opcode,
                    error: err.into(),
                };
                self.state = VmState::Faulted(fault.clone());
                Err(fault)
            }
            _ => Ok(()),
        }
    }

    fn execute(
        &mut self,
        instr: &Instruction,
        ip: usize,
    ) -> Result<Option<Transfer>, RuntimeError> {
        match instr.opcode {
            // ===== Frames and variables =====
            Opcode::Move => {
                let value = self.symb(instr, 1)?;
                self.frames.assign(instr.var(0)?, value)?;
            }
            Opcode::CreateFrame => self.frames.create_temporary(),
            Opcode::PushFrame => self.frames.push_temporary_to_local()?,
            Opcode::PopFrame => self.frames.pop_local_to_temporary()?,
            Opcode::DefVar => {
                let var = instr.var(0)?;
                self.frames.define(var.scope, &var.name)?;
            }

            // ===== Calls =====
            Opcode::Call => {
                let label = instr.label(0)?;
                self.calls.push(ip + 1);
                return Ok(Some(Transfer::Label(label.to_string())));
            }
            Opcode::Return => return Ok(Some(Transfer::Return(self.calls.pop()?))),

            // ===== Operand stack =====
            Opcode::PushS => {
                let value = self.symb(instr, 0)?;
                self.operands.push(value);
            }
            Opcode::PopS => {
                let value = self.operands.pop()?;
                self.frames.assign(instr.var(0)?, value)?;
            }
            Opcode::ClearS => self.operands.clear(),

            // ===== Destination forms =====
            Opcode::Add => self.binary_into(instr, BinaryOp::Add)?,
            Opcode::Sub => self.binary_into(instr, BinaryOp::Sub)?,
            Opcode::Mul => self.binary_into(instr, BinaryOp::Mul)?,
            Opcode::IDiv => self.binary_into(instr, BinaryOp::IDiv)?,
            Opcode::Div => self.binary_into(instr, BinaryOp::Div)?,
            Opcode::Lt => self.binary_into(instr, BinaryOp::Lt)?,
            Opcode::Gt => self.binary_into(instr, BinaryOp::Gt)?,
            Opcode::Eq => self.binary_into(instr, BinaryOp::Eq)?,
            Opcode::And => self.binary_into(instr, BinaryOp::And)?,
            Opcode::Or => self.binary_into(instr, BinaryOp::Or)?,
            Opcode::Not => self.unary_into(instr, UnaryOp::Not)?,
            Opcode::Int2Char => self.unary_into(instr, UnaryOp::Int2Char)?,
            Opcode::Stri2Int => self.binary_into(instr, BinaryOp::Stri2Int)?,
            Opcode::Int2Float => self.unary_into(instr, UnaryOp::Int2Float)?,
            Opcode::Float2Int => self.unary_into(instr, UnaryOp::Float2Int)?,
            Opcode::Concat => self.binary_into(instr, BinaryOp::Concat)?,
            Opcode::StrLen => self.unary_into(instr, UnaryOp::StrLen)?,
            Opcode::GetChar => self.binary_into(instr, BinaryOp::GetChar)?,

            // ===== Stack forms =====
            Opcode::AddS => ops::apply_binary(&mut self.operands, BinaryOp::Add)?,
            Opcode::SubS => ops::apply_binary(&mut self.operands, BinaryOp::Sub)?,
            Opcode::MulS => ops::apply_binary(&mut self.operands, BinaryOp::Mul)?,
            Opcode::IDivS => ops::apply_binary(&mut self.operands, BinaryOp::IDiv)?,
            Opcode::DivS => ops::apply_binary(&mut self.operands, BinaryOp::Div)?,
            Opcode::LtS => ops::apply_binary(&mut self.operands, BinaryOp::Lt)?,
            Opcode::GtS => ops::apply_binary(&mut self.operands, BinaryOp::Gt)?,
            Opcode::EqS => ops::apply_binary(&mut self.operands, BinaryOp::Eq)?,
            Opcode::AndS => ops::apply_binary(&mut self.operands, BinaryOp::And)?,
            Opcode::OrS => ops::apply_binary(&mut self.operands, BinaryOp::Or)?,
            Opcode::NotS => ops::apply_unary(&mut self.operands, UnaryOp::Not)?,
            Opcode::Int2CharS => ops::apply_unary(&mut self.operands, UnaryOp::Int2Char)?,
            Opcode::Stri2IntS => ops::apply_binary(&mut self.operands, BinaryOp::Stri2Int)?,
            Opcode::Int2FloatS => ops::apply_unary(&mut self.operands, UnaryOp::Int2Float)?,
            Opcode::Float2IntS => ops::apply_unary(&mut self.operands, UnaryOp::Float2Int)?,

            // ===== Input / output =====
            Opcode::Read => {
                let value = self.read_value(instr.type_name(1)?)?;
                self.frames.assign(instr.var(0)?, value)?;
            }
            Opcode::Write => {
                let value = self.symb(instr, 0)?;
                self.output.write_all(value.to_output_string().as_bytes())?;
            }

            // ===== Strings =====
            Opcode::SetChar => {
                let var = instr.var(0)?;
                let target = self.frames.read(var)?;
                let index = self.symb(instr, 1)?;
                let source = self.symb(instr, 2)?;
                let result = ops::set_char(&target, &index, &source)?;
                self.frames.assign(var, result)?;
            }

            // ===== Types =====
            Opcode::Type => {
                // TYPE is the one reader that accepts an uninitialized variable.
                let value = match instr.symb(1)? {
                    Operand::Var(var) => self.frames.peek(var)?,
                    Operand::Literal(value) => value.clone(),
                    other => return Err(unexpected_operand(instr, other)),
                };
                self.frames
                    .assign(instr.var(0)?, Value::string(value.type_name()))?;
            }

            // ===== Control flow =====
            Opcode::Label => {}
            Opcode::Jump => return Ok(Some(Transfer::Label(instr.label(0)?.to_string()))),
            Opcode::JumpIfEq | Opcode::JumpIfNeq => {
                self.push_symbols(instr, &[1, 2])?;
                return self.conditional_jump(instr, instr.opcode == Opcode::JumpIfEq);
            }
            Opcode::JumpIfEqS | Opcode::JumpIfNeqS => {
                return self.conditional_jump(instr, instr.opcode == Opcode::JumpIfEqS);
            }
            Opcode::Exit => {
                let code = match self.symb(instr, 0)? {
                    Value::Int(code) if (0..=MAX_EXIT_CODE).contains(&code) => code as u8,
                    Value::Int(code) => {
                        return Err(RuntimeError::value_error(format!(
                            "exit code {} outside 0..={}",
                            code, MAX_EXIT_CODE
                        )))
                    }
                    other => {
                        return Err(RuntimeError::type_error(format!(
                            "EXIT expects an int, got {}",
                            other.type_name()
                        )))
                    }
                };
                return Ok(Some(Transfer::Halt(code)));
            }

            // ===== Debugging =====
            Opcode::DPrint => {
                let value = self.symb(instr, 0)?;
                if self.options.debug_output {
                    self.diagnostics
                        .write_all(value.to_output_string().as_bytes())?;
                }
            }
            Opcode::Break => {
                if self.options.debug_output {
                    let dump = self.state_dump(ip);
                    self.diagnostics.write_all(dump.as_bytes())?;
                }
            }
        }
        Ok(None)
    }

    /// Value of a variable-or-literal operand
    fn symb(&self, instr: &Instruction, slot: usize) -> Result<Value, RuntimeError> {
        match instr.symb(slot)? {
            Operand::Var(var) => self.frames.read(var),
            Operand::Literal(value) => Ok(value.clone()),
            other => Err(unexpected_operand(instr, other)),
        }
    }

    /// Push the given operand slots onto the operand stack, in order
    fn push_symbols(&mut self, instr: &Instruction, slots: &[usize]) -> Result<(), RuntimeError> {
        for &slot in slots {
            let value = self.symb(instr, slot)?;
            self.operands.push(value);
        }
        Ok(())
    }

    fn binary_into(&mut self, instr: &Instruction, op: BinaryOp) -> Result<(), RuntimeError> {
        self.push_symbols(instr, &[1, 2])?;
        ops::apply_binary(&mut self.operands, op)?;
        let result = self.operands.pop()?;
        self.frames.assign(instr.var(0)?, result)
    }

    fn unary_into(&mut self, instr: &Instruction, op: UnaryOp) -> Result<(), RuntimeError> {
        self.push_symbols(instr, &[1])?;
        ops::apply_unary(&mut self.operands, op)?;
        let result = self.operands.pop()?;
        self.frames.assign(instr.var(0)?, result)
    }

    /// Pop two operands and jump when their equality matches `jump_if_equal`.
    /// The label must exist even when the jump is not taken.
    fn conditional_jump(
        &mut self,
        instr: &Instruction,
        jump_if_equal: bool,
    ) -> Result<Option<Transfer>, RuntimeError> {
        let label = instr.label(0)?;
        if !self.program.labels().contains(label) {
            return Err(RuntimeError::UndefinedLabel {
                name: label.to_string(),
            });
        }
        let rhs = self.operands.pop()?;
        let lhs = self.operands.pop()?;
        if ops::equals(&lhs, &rhs)? == jump_if_equal {
            Ok(Some(Transfer::Label(label.to_string())))
        } else {
            Ok(None)
        }
    }

    /// READ one line and convert it; end of input or a failed conversion
    /// (invalid UTF-8 included) yields nil
    fn read_value(&mut self, ty: TypeName) -> Result<Value, RuntimeError> {
        let mut bytes = Vec::new();
        if self.input.read_until(b'\n', &mut bytes)? == 0 {
            return Ok(Value::Nil);
        }
        let Ok(line) = String::from_utf8(bytes) else {
            return Ok(Value::Nil);
        };
        let line = line.strip_suffix('\n').unwrap_or(&line);
        let line = line.strip_suffix('\r').unwrap_or(line);

        Ok(match ty {
            TypeName::Int => text::parse_int(line).map_or(Value::Nil, Value::Int),
            TypeName::Float => text::parse_float(line).map_or(Value::Nil, Value::Float),
            TypeName::Bool => Value::Bool(line.trim().eq_ignore_ascii_case("true")),
            TypeName::String => Value::string(line),
        })
    }

    /// Human-readable engine state, as printed by BREAK
    pub fn state_dump(&self, position: usize) -> String {
        let mut dump = String::new();
        match self.program.get(position) {
            Some(instr) => dump.push_str(&format!(
                "BREAK at instruction {} (order {}): {}\n",
                position, instr.order, instr
            )),
            None => dump.push_str(&format!("state at instruction {}\n", position)),
        }
        dump.push_str(&format!("  executed instructions: {}\n", self.executed));

        dump.push_str(&format!(
            "  GF: {} variable(s)\n",
            self.frames.global().len()
        ));
        push_variables(&mut dump, self.frames.global());

        match self.frames.local() {
            Some(frame) => {
                dump.push_str(&format!(
                    "  LF: {} variable(s), {} frame(s) deep\n",
                    frame.len(),
                    self.frames.local_depth()
                ));
                push_variables(&mut dump, frame);
            }
            None => dump.push_str("  LF: none\n"),
        }
        match self.frames.temporary() {
            Some(frame) => {
                dump.push_str(&format!("  TF: {} variable(s)\n", frame.len()));
                push_variables(&mut dump, frame);
            }
            None => dump.push_str("  TF: none\n"),
        }

        let stack: Vec<String> = self
            .operands
            .values()
            .iter()
            .map(ToString::to_string)
            .collect();
        dump.push_str(&format!(
            "  operand stack: {} [{}]\n",
            self.operands.len(),
            stack.join(", ")
        ));
        dump.push_str(&format!("  call stack: {}\n", self.calls.len()));
        dump
    }
}

fn push_variables(dump: &mut String, frame: &Frame) {
    for var in frame.variables() {
        dump.push_str(&format!("    {} = {}\n", var.name, var.value));
    }
}

fn unexpected_operand(instr: &Instruction, operand: &Operand) -> RuntimeError {
    RuntimeError::MalformedProgram {
        msg: format!("{} cannot use {} operand '{}'", instr.opcode, operand.kind_name(), operand),
    }
}
