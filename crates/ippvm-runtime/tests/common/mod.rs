//! Shared test utilities
//!
//! `assemble` turns a compact one-instruction-per-line listing into a
//! [`Program`] by way of the real loader, so every integration test also
//! exercises [`ProgramSource::into_program`]:
//!
//! ```text
//! DEFVAR GF@x
//! MOVE GF@x int@5
//! JUMPIFEQ end GF@x nil@nil
//! ```
//!
//! Arguments in a label or type slot are taken verbatim; everything else is
//! `GF|LF|TF@name` or `type@value`. Blank lines and `#` comments are skipped.

#![allow(dead_code)]

use ippvm_runtime::bytecode::{OperandKind, ProgramSource, RawArgument, RawInstruction};
use ippvm_runtime::{CapturedRun, Opcode, Program, Runtime, RuntimeError};

// Re-export testing utilities
pub use pretty_assertions::assert_eq;

/// Build a program, panicking on loader errors
pub fn assemble(listing: &str) -> Program {
    try_assemble(listing).unwrap_or_else(|err| panic!("listing failed to load: {}", err))
}

/// Build a program, returning loader errors
pub fn try_assemble(listing: &str) -> Result<Program, RuntimeError> {
    source(listing).into_program()
}

/// Raw program source for a listing, orders 1, 2, 3, ...
pub fn source(listing: &str) -> ProgramSource {
    let instructions = listing
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .enumerate()
        .map(|(i, line)| raw_instruction(i as i64 + 1, line))
        .collect();
    ProgramSource { instructions }
}

fn raw_instruction(order: i64, line: &str) -> RawInstruction {
    let mut tokens = line.split_whitespace();
    let opcode = tokens.next().unwrap_or_default().to_string();
    let signature = Opcode::from_name(&opcode)
        .map(|op| op.signature())
        .unwrap_or(&[]);

    let args = tokens
        .enumerate()
        .map(|(slot, token)| match signature.get(slot) {
            Some(OperandKind::Label) => RawArgument::new("label", token),
            Some(OperandKind::Type) => RawArgument::new("type", token),
            _ => raw_argument(token),
        })
        .collect();

    RawInstruction {
        order,
        opcode,
        args,
    }
}

fn raw_argument(token: &str) -> RawArgument {
    match token.split_once('@') {
        Some(("GF" | "LF" | "TF", _)) => RawArgument::new("var", token),
        Some((kind, value)) => RawArgument::new(kind, value),
        None => RawArgument::new("label", token),
    }
}

/// Run a listing with empty input
pub fn run(listing: &str) -> CapturedRun {
    run_with_input(listing, "")
}

/// Run a listing with `input` as the READ source
pub fn run_with_input(listing: &str, input: &str) -> CapturedRun {
    Runtime::new().run_captured(assemble(listing), input)
}

/// Assert a listing prints `expected` and exits 0
pub fn assert_output(listing: &str, expected: &str) {
    let run = run(listing);
    assert_eq!(
        run.exit_code(),
        0,
        "unexpected exit code, fault: {:?}",
        run.outcome.result
    );
    assert_eq!(run.stdout, expected);
}

/// Assert a listing ends with `code`
pub fn assert_exit_code(listing: &str, code: u8) {
    let run = run(listing);
    assert_eq!(
        run.exit_code(),
        code,
        "outcome: {:?}, stdout: {:?}",
        run.outcome.result,
        run.stdout
    );
}
