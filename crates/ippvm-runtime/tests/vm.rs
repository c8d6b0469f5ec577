//! Engine behaviour: control flow, termination and faults

mod common;

use common::assert_eq;
use common::*;
use ippvm_runtime::{ErrorKind, Opcode, Runtime, Scope, Value, VmState, VM};
use rstest::rstest;

// ===== End-to-end programs =====

#[test]
fn test_sub_prints_difference() {
    assert_output(
        "
        DEFVAR GF@x
        MOVE GF@x int@5
        DEFVAR GF@y
        MOVE GF@y int@3
        SUB GF@x GF@x GF@y
        WRITE GF@x
        ",
        "2",
    );
}

#[test]
fn test_write_decodes_escapes() {
    assert_output("WRITE string@\\065", "A");
    assert_output("WRITE string@a\\032b\\010", "a b\n");
}

#[test]
fn test_write_formats_every_type() {
    assert_output(
        "
        WRITE int@-3
        WRITE bool@true
        WRITE nil@nil
        WRITE float@0x1.8p+1
        ",
        "-3true0x1.8000000000000p+1",
    );
}

#[test]
fn test_loop_counts_down() {
    assert_output(
        "
        DEFVAR GF@n
        MOVE GF@n int@3
        LABEL top
        JUMPIFEQ done GF@n int@0
        WRITE GF@n
        SUB GF@n GF@n int@1
        JUMP top
        LABEL done
        ",
        "321",
    );
}

// ===== Termination =====

#[rstest]
#[case("EXIT int@0", 0)]
#[case("EXIT int@49", 49)]
#[case("EXIT int@50", 57)]
#[case("EXIT int@-1", 57)]
#[case("EXIT string@1", 53)]
#[case("EXIT nil@nil", 53)]
fn test_exit_codes(#[case] listing: &str, #[case] code: u8) {
    assert_exit_code(listing, code);
}

#[test]
fn test_exit_stops_execution() {
    let run = run("
        WRITE string@before
        EXIT int@3
        WRITE string@after
    ");
    assert_eq!(run.stdout, "before");
    assert_eq!(run.exit_code(), 3);
}

#[test]
fn test_end_of_program_exits_zero() {
    assert_exit_code("LABEL only", 0);
}

#[test]
fn test_output_before_fault_is_kept() {
    let run = run("
        WRITE string@partial
        POPFRAME
        WRITE string@never
    ");
    assert_eq!(run.stdout, "partial");
    assert_eq!(run.exit_code(), 55);
}

// ===== Calls =====

#[test]
fn test_call_returns_to_next_instruction() {
    let program = assemble(
        "
        CALL sub
        WRITE string@back
        EXIT int@0
        LABEL sub
        WRITE string@in
        RETURN
        ",
    );
    let mut vm = VM::new(program);
    vm.set_output(Box::new(std::io::sink()));

    vm.step().unwrap();
    assert_eq!(vm.state(), &VmState::Running { ip: 3 });
    assert_eq!(vm.call_stack().len(), 1);

    vm.step().unwrap(); // LABEL
    vm.step().unwrap(); // WRITE
    vm.step().unwrap(); // RETURN
    assert_eq!(vm.state(), &VmState::Running { ip: 1 });
    assert!(vm.call_stack().is_empty());
}

#[test]
fn test_call_output_order() {
    assert_output(
        "
        CALL sub
        WRITE string@back
        EXIT int@0
        LABEL sub
        WRITE string@in,
        RETURN
        ",
        "in,back",
    );
}

#[test]
fn test_return_without_call() {
    assert_exit_code("RETURN", 56);
}

#[rstest]
#[case("JUMP nowhere")]
#[case("CALL nowhere")]
#[case("JUMPIFEQ nowhere int@1 int@2")]
#[case("JUMPIFNEQ nowhere int@1 int@1")]
#[case("PUSHS int@1\nPUSHS int@2\nJUMPIFEQS nowhere")]
fn test_undefined_label(#[case] listing: &str) {
    let run = run(listing);
    let fault = run.outcome.result.unwrap_err();
    assert_eq!(fault.kind(), ErrorKind::UndefinedLabel);
    assert_eq!(fault.exit_code(), 52);
}

#[test]
fn test_duplicate_label_rejected_before_running() {
    let err = try_assemble("LABEL a\nWRITE int@1\nLABEL a").unwrap_err();
    assert_eq!(err.exit_code(), 52);
}

// ===== Conditional jumps =====

#[rstest]
#[case("JUMPIFEQ skip int@1 int@1", "")]
#[case("JUMPIFEQ skip int@1 int@2", "x")]
#[case("JUMPIFNEQ skip int@1 int@2", "")]
#[case("JUMPIFNEQ skip string@a string@a", "x")]
#[case("JUMPIFEQ skip nil@nil int@1", "x")]
#[case("JUMPIFNEQ skip nil@nil bool@true", "")]
fn test_conditional_jumps(#[case] jump: &str, #[case] expected: &str) {
    let listing = format!("{}\nWRITE string@x\nLABEL skip", jump);
    assert_output(&listing, expected);
}

#[test]
fn test_conditional_jump_type_mismatch() {
    assert_exit_code("JUMPIFEQ l int@1 string@1\nLABEL l", 53);
}

#[test]
fn test_stack_conditional_jumps() {
    assert_output(
        "
        PUSHS int@4
        PUSHS int@4
        JUMPIFEQS same
        WRITE string@different
        LABEL same
        PUSHS int@4
        PUSHS int@5
        JUMPIFNEQS end
        WRITE string@unreachable
        LABEL end
        ",
        "",
    );
}

// ===== Stepping =====

#[test]
fn test_infinite_loop_with_step_budget() {
    let mut vm = VM::new(assemble("LABEL loop\nJUMP loop"));
    for _ in 0..1000 {
        assert_eq!(vm.step(), Ok(true));
    }
    assert_eq!(vm.executed(), 1000);
    assert!(matches!(vm.state(), VmState::Running { .. }));
}

#[test]
fn test_step_after_halt_is_noop() {
    let mut vm = VM::new(assemble("LABEL a"));
    assert_eq!(vm.step(), Ok(false));
    assert_eq!(vm.step(), Ok(false));
    assert_eq!(vm.executed(), 1);
    assert_eq!(vm.state(), &VmState::Halted { code: 0 });
}

// ===== Faults =====

#[rstest]
#[case("WRITE GF@missing", 54)]
#[case("WRITE LF@x", 55)]
#[case("WRITE TF@x", 55)]
#[case("DEFVAR GF@x\nWRITE GF@x", 56)]
#[case("DEFVAR GF@x\nDEFVAR GF@x", 52)]
#[case("DEFVAR GF@x\nPOPS GF@x", 56)]
#[case("PUSHFRAME", 55)]
#[case("POPFRAME", 55)]
fn test_memory_faults(#[case] listing: &str, #[case] code: u8) {
    assert_exit_code(listing, code);
}

#[test]
fn test_fault_points_at_instruction() {
    let run = run("DEFVAR GF@a\nMOVE GF@a int@1\nADD GF@a GF@a string@x");
    let fault = run.outcome.result.unwrap_err();
    assert_eq!(fault.position, 2);
    assert_eq!(fault.order, 3);
    assert_eq!(fault.opcode, Opcode::Add);
    assert_eq!(run.outcome.executed, 3);
}

// ===== Input =====

#[test]
fn test_read_each_type() {
    let run = run_with_input(
        "
        DEFVAR GF@i
        DEFVAR GF@f
        DEFVAR GF@b
        DEFVAR GF@s
        READ GF@i int
        READ GF@f float
        READ GF@b bool
        READ GF@s string
        WRITE GF@i
        WRITE string@|
        WRITE GF@f
        WRITE string@|
        WRITE GF@b
        WRITE string@|
        WRITE GF@s
        ",
        "42\n0x1p-1\nTRUE\nhello world\n",
    );
    assert_eq!(run.exit_code(), 0);
    assert_eq!(run.stdout, "42|0x1.0000000000000p-1|true|hello world");
}

#[test]
fn test_read_failures_give_nil() {
    let program = assemble(
        "
        DEFVAR GF@i
        DEFVAR GF@e
        DEFVAR GF@b
        READ GF@i int
        READ GF@b bool
        READ GF@e string
        ",
    );
    let mut vm = VM::new(program);
    vm.set_input(Box::new(std::io::Cursor::new(b"forty\nyes\n".to_vec())));
    vm.set_output(Box::new(std::io::sink()));
    assert_eq!(vm.run(), Ok(0));

    let value = |name: &str| vm.frames().get(Scope::Global, name).unwrap().value.clone();
    assert_eq!(value("i"), Value::Nil);
    assert_eq!(value("b"), Value::Bool(false));
    assert_eq!(value("e"), Value::Nil);
}

#[test]
fn test_read_invalid_utf8_gives_nil() {
    let program = assemble(
        "
        DEFVAR GF@s
        DEFVAR GF@t
        READ GF@s string
        READ GF@t string
        ",
    );
    let mut vm = VM::new(program);
    vm.set_input(Box::new(std::io::Cursor::new(vec![0xff, 0xfe, b'\n', b'o', b'k', b'\n'])));
    vm.set_output(Box::new(std::io::sink()));
    assert_eq!(vm.run(), Ok(0));

    let value = |name: &str| vm.frames().get(Scope::Global, name).unwrap().value.clone();
    assert_eq!(value("s"), Value::Nil);
    assert_eq!(value("t"), Value::string("ok"));
}

// ===== Debugging =====

#[test]
fn test_dprint_and_break_go_to_diagnostics() {
    let run = run("
        DEFVAR GF@x
        MOVE GF@x int@5
        DPRINT GF@x
        BREAK
        WRITE string@out
    ");
    assert_eq!(run.stdout, "out");
    assert!(run.stderr.starts_with("5BREAK at instruction 3 (order 4)"));
    assert!(run.stderr.contains("x = int@5"));
    assert!(run.stderr.contains("executed instructions: 4"));
}

#[test]
fn test_debug_output_can_be_disabled() {
    let runtime = Runtime::new().with_options(ippvm_runtime::VmOptions {
        debug_output: false,
    });
    let run = runtime.run_captured(assemble("DPRINT int@1\nBREAK"), "");
    assert_eq!(run.stderr, "");
    assert_eq!(run.exit_code(), 0);
}

#[test]
fn test_dprint_still_checks_operand() {
    let runtime = Runtime::new().with_options(ippvm_runtime::VmOptions {
        debug_output: false,
    });
    let run = runtime.run_captured(assemble("DPRINT GF@nope"), "");
    assert_eq!(run.exit_code(), 54);
}
