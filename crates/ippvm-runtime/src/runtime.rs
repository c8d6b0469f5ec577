//! Runtime API for embedding
//!
//! Thin facade over the loader and the [`VM`]: load a program, run it
//! against chosen streams and collect the outcome.

use crate::bytecode::{load_json, Program};
use crate::value::RuntimeError;
use crate::vm::{Fault, VmOptions, VM};
use std::cell::RefCell;
use std::io::{self, BufRead, Cursor, Write};
use std::rc::Rc;

/// Result of one program run
#[derive(Debug, Clone, PartialEq)]
pub struct RunOutcome {
    pub result: Result<u8, Fault>,
    /// Instructions executed before halting or faulting
    pub executed: u64,
    /// Profiler report, when profiling was enabled
    pub report: Option<String>,
}

impl RunOutcome {
    /// Process exit code: the program's own code or the fault's fixed code
    pub fn exit_code(&self) -> u8 {
        match &self.result {
            Ok(code) => *code,
            Err(fault) => fault.exit_code(),
        }
    }
}

/// Run with captured output streams
#[derive(Debug, Clone, PartialEq)]
pub struct CapturedRun {
    pub outcome: RunOutcome,
    pub stdout: String,
    pub stderr: String,
}

impl CapturedRun {
    pub fn exit_code(&self) -> u8 {
        self.outcome.exit_code()
    }
}

/// Interpreter runtime
///
/// # Examples
///
/// ```
/// use ippvm_runtime::Runtime;
///
/// let program = Runtime::load(r#"{"instructions": [
///     {"order": 1, "opcode": "WRITE", "args": [{"type": "string", "value": "hi"}]}
/// ]}"#).unwrap();
/// let run = Runtime::new().run_captured(program, "");
/// assert_eq!(run.stdout, "hi");
/// assert_eq!(run.exit_code(), 0);
/// ```
#[derive(Debug, Clone, Default)]
pub struct Runtime {
    options: VmOptions,
    profiling: bool,
}

impl Runtime {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_options(mut self, options: VmOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_profiling(mut self, profiling: bool) -> Self {
        self.profiling = profiling;
        self
    }

    pub fn options(&self) -> VmOptions {
        self.options
    }

    /// Load a program from its JSON form
    pub fn load(json: &str) -> Result<Program, RuntimeError> {
        load_json(json)
    }

    /// Run on the process's stdout and stderr
    pub fn execute(&self, program: Program, input: Box<dyn BufRead>) -> RunOutcome {
        self.execute_with(
            program,
            input,
            Box::new(io::BufWriter::new(io::stdout())),
            Box::new(io::stderr()),
        )
    }

    /// Run against explicit streams
    pub fn execute_with(
        &self,
        program: Program,
        input: Box<dyn BufRead>,
        output: Box<dyn Write>,
        diagnostics: Box<dyn Write>,
    ) -> RunOutcome {
        let mut vm = if self.profiling {
            VM::with_profiling(program)
        } else {
            VM::new(program)
        };
        vm.set_options(self.options);
        vm.set_input(input);
        vm.set_output(output);
        vm.set_diagnostics(diagnostics);

        let result = vm.run();
        RunOutcome {
            result,
            executed: vm.executed(),
            report: vm.profiler().map(|profiler| profiler.report()),
        }
    }

    /// Run with `input` as the READ source, capturing both output streams
    pub fn run_captured(&self, program: Program, input: &str) -> CapturedRun {
        let stdout = SharedBuffer::default();
        let stderr = SharedBuffer::default();
        let outcome = self.execute_with(
            program,
            Box::new(Cursor::new(input.as_bytes().to_vec())),
            Box::new(stdout.clone()),
            Box::new(stderr.clone()),
        );
        CapturedRun {
            outcome,
            stdout: stdout.contents(),
            stderr: stderr.contents(),
        }
    }
}

/// In-memory writer whose clones share one buffer
#[derive(Debug, Clone, Default)]
pub struct SharedBuffer {
    bytes: Rc<RefCell<Vec<u8>>>,
}

impl SharedBuffer {
    /// Buffer contents, lossily decoded
    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.bytes.borrow()).into_owned()
    }
}

impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.bytes.borrow_mut().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
