//! Operation semantics through whole programs
//!
//! Each case computes into `GF@r` and writes it, so both the operation and
//! its output formatting are covered.

mod common;

use common::assert_eq;
use common::*;
use ippvm_runtime::vm::{ops, BinaryOp, OperandStack};
use ippvm_runtime::text::format_float;
use ippvm_runtime::Value;
use proptest::prelude::*;
use rstest::rstest;

fn compute(instruction: &str) -> ippvm_runtime::CapturedRun {
    run(&format!("DEFVAR GF@r\n{}\nWRITE GF@r", instruction))
}

fn assert_computes(instruction: &str, expected: &str) {
    let run = compute(instruction);
    assert_eq!(
        run.exit_code(),
        0,
        "{} faulted: {:?}",
        instruction,
        run.outcome.result
    );
    assert_eq!(run.stdout, expected, "{}", instruction);
}

// ===== Operand order =====

#[rstest]
#[case("SUB GF@r int@10 int@4", "6")]
#[case("SUB GF@r int@4 int@10", "-6")]
#[case("IDIV GF@r int@10 int@3", "3")]
#[case("IDIV GF@r int@3 int@10", "0")]
#[case("LT GF@r int@1 int@2", "true")]
#[case("LT GF@r int@2 int@1", "false")]
#[case("GT GF@r int@2 int@1", "true")]
#[case("GT GF@r int@1 int@2", "false")]
#[case("CONCAT GF@r string@ab string@cd", "abcd")]
fn test_operand_order(#[case] instruction: &str, #[case] expected: &str) {
    assert_computes(instruction, expected);
}

#[rstest]
#[case("SUBS", "6")]
#[case("IDIVS", "2")]
#[case("LTS", "false")]
#[case("GTS", "true")]
fn test_stack_operand_order(#[case] opcode: &str, #[case] expected: &str) {
    let listing = format!(
        "DEFVAR GF@r\nPUSHS int@10\nPUSHS int@4\n{}\nPOPS GF@r\nWRITE GF@r",
        opcode
    );
    assert_output(&listing, expected);
}

// ===== Arithmetic =====

#[rstest]
#[case("ADD GF@r int@2 int@3", "5")]
#[case("MUL GF@r int@-4 int@3", "-12")]
#[case("IDIV GF@r int@-7 int@2", "-4")]
#[case("IDIV GF@r int@7 int@-2", "-4")]
#[case("ADD GF@r float@0x1p+0 float@0x1p+1", "0x1.8000000000000p+1")]
#[case("DIV GF@r float@0x1p+0 float@0x1p+2", "0x1.0000000000000p-2")]
#[case("MUL GF@r float@2.5 float@2.0", "0x1.4000000000000p+2")]
fn test_arithmetic(#[case] instruction: &str, #[case] expected: &str) {
    assert_computes(instruction, expected);
}

#[rstest]
#[case("IDIV GF@r int@1 int@0")]
#[case("IDIV GF@r int@-1 int@0")]
#[case("IDIV GF@r int@0 int@0")]
#[case("DIV GF@r float@1.0 float@0.0")]
#[case("ADD GF@r int@9223372036854775807 int@1")]
#[case("MUL GF@r int@-9223372036854775808 int@-1")]
fn test_arithmetic_value_errors(#[case] instruction: &str) {
    assert_eq!(compute(instruction).exit_code(), 57);
}

#[rstest]
#[case("ADD GF@r int@1 float@1.0")]
#[case("SUB GF@r string@a string@b")]
#[case("IDIV GF@r float@4.0 float@2.0")]
#[case("DIV GF@r int@4 int@2")]
#[case("MUL GF@r bool@true int@2")]
#[case("ADD GF@r nil@nil int@2")]
fn test_arithmetic_type_errors(#[case] instruction: &str) {
    assert_eq!(compute(instruction).exit_code(), 53);
}

// ===== Relational and boolean =====

#[rstest]
#[case("LT GF@r string@abc string@abd", "true")]
#[case("GT GF@r bool@true bool@false", "true")]
#[case("LT GF@r float@1.5 float@1.25", "false")]
#[case("EQ GF@r int@3 int@3", "true")]
#[case("EQ GF@r string@a string@b", "false")]
#[case("EQ GF@r nil@nil nil@nil", "true")]
#[case("EQ GF@r nil@nil string@", "false")]
#[case("EQ GF@r int@0 nil@nil", "false")]
#[case("AND GF@r bool@true bool@false", "false")]
#[case("OR GF@r bool@true bool@false", "true")]
#[case("NOT GF@r bool@false", "true")]
fn test_relational_and_boolean(#[case] instruction: &str, #[case] expected: &str) {
    assert_computes(instruction, expected);
}

#[rstest]
#[case("LT GF@r nil@nil nil@nil")]
#[case("GT GF@r int@1 float@1.0")]
#[case("EQ GF@r int@1 string@1")]
#[case("AND GF@r bool@true int@1")]
#[case("NOT GF@r int@0")]
fn test_relational_type_errors(#[case] instruction: &str) {
    assert_eq!(compute(instruction).exit_code(), 53);
}

// ===== Strings and conversions =====

#[rstest]
#[case("STRLEN GF@r string@hello", "5")]
#[case("STRLEN GF@r string@", "0")]
#[case("GETCHAR GF@r string@hello int@1", "e")]
#[case("STRI2INT GF@r string@A int@0", "65")]
#[case("INT2CHAR GF@r int@97", "a")]
#[case("INT2FLOAT GF@r int@3", "0x1.8000000000000p+1")]
#[case("FLOAT2INT GF@r float@-0x1.cp+1", "-3")]
#[case("TYPE GF@r int@1", "int")]
#[case("TYPE GF@r nil@nil", "nil")]
#[case("TYPE GF@r GF@r", "")]
fn test_strings_and_conversions(#[case] instruction: &str, #[case] expected: &str) {
    assert_computes(instruction, expected);
}

#[rstest]
#[case("GETCHAR GF@r string@abc int@3", 58)]
#[case("GETCHAR GF@r string@abc int@-1", 58)]
#[case("STRI2INT GF@r string@ int@0", 58)]
#[case("INT2CHAR GF@r int@-5", 58)]
#[case("INT2CHAR GF@r int@1114112", 58)]
#[case("GETCHAR GF@r int@1 int@0", 53)]
#[case("STRLEN GF@r int@1", 53)]
#[case("FLOAT2INT GF@r int@1", 53)]
fn test_string_errors(#[case] instruction: &str, #[case] code: u8) {
    assert_eq!(compute(instruction).exit_code(), code);
}

#[rstest]
#[case("string@abc", "int@0", "string@X", "Xbc")]
#[case("string@abc", "int@2", "string@YZ", "abY")]
fn test_setchar(
    #[case] start: &str,
    #[case] index: &str,
    #[case] with: &str,
    #[case] expected: &str,
) {
    let listing = format!(
        "DEFVAR GF@s\nMOVE GF@s {}\nSETCHAR GF@s {} {}\nWRITE GF@s",
        start, index, with
    );
    assert_output(&listing, expected);
}

#[rstest]
#[case("MOVE GF@s string@abc\nSETCHAR GF@s int@3 string@X", 58)]
#[case("MOVE GF@s string@abc\nSETCHAR GF@s int@0 string@", 58)]
#[case("SETCHAR GF@s int@0 string@X", 56)]
#[case("MOVE GF@s int@1\nSETCHAR GF@s int@0 string@X", 53)]
fn test_setchar_errors(#[case] body: &str, #[case] code: u8) {
    assert_exit_code(&format!("DEFVAR GF@s\n{}", body), code);
}

#[test]
fn test_clears_empties_stack() {
    assert_exit_code("PUSHS int@1\nCLEARS\nDEFVAR GF@x\nPOPS GF@x", 56);
}

// ===== Stack and destination forms agree =====

/// Destination form: `OP GF@r arg...`
fn destination_form(opcode: &str, args: &[&str]) -> (String, u8) {
    let run = compute(&format!("{} GF@r {}", opcode, args.join(" ")));
    (run.stdout.clone(), run.exit_code())
}

/// Stack form: push each argument in source order, `OPS`, pop into `GF@r`
fn stack_form(opcode: &str, args: &[&str]) -> (String, u8) {
    let pushes: String = args.iter().map(|arg| format!("PUSHS {}\n", arg)).collect();
    let run = run(&format!(
        "DEFVAR GF@r\n{}{}S\nPOPS GF@r\nWRITE GF@r",
        pushes, opcode
    ));
    (run.stdout.clone(), run.exit_code())
}

#[rstest]
#[case("ADD", &["int@2", "int@3"], "5")]
#[case("SUB", &["int@10", "int@4"], "6")]
#[case("MUL", &["int@-4", "int@3"], "-12")]
#[case("IDIV", &["int@7", "int@-2"], "-4")]
#[case("DIV", &["float@0x1p+0", "float@0x1p+2"], "0x1.0000000000000p-2")]
#[case("LT", &["string@abc", "string@abd"], "true")]
#[case("GT", &["bool@true", "bool@false"], "true")]
#[case("EQ", &["nil@nil", "nil@nil"], "true")]
#[case("AND", &["bool@true", "bool@false"], "false")]
#[case("OR", &["bool@false", "bool@true"], "true")]
#[case("NOT", &["bool@false"], "true")]
#[case("INT2CHAR", &["int@97"], "a")]
#[case("STRI2INT", &["string@AB", "int@1"], "66")]
#[case("INT2FLOAT", &["int@3"], "0x1.8000000000000p+1")]
#[case("FLOAT2INT", &["float@-0x1.cp+1"], "-3")]
fn test_stack_form_matches_destination_form(
    #[case] opcode: &str,
    #[case] args: &[&str],
    #[case] expected: &str,
) {
    let expected = (expected.to_string(), 0);
    assert_eq!(destination_form(opcode, args), expected, "{}", opcode);
    assert_eq!(stack_form(opcode, args), expected, "{}S", opcode);
}

#[rstest]
#[case("DIV", &["float@1.0", "float@0.0"], 57)]
#[case("IDIV", &["int@5", "int@0"], 57)]
#[case("STRI2INT", &["string@AB", "int@2"], 58)]
#[case("STRI2INT", &["int@1", "string@AB"], 53)]
#[case("INT2CHAR", &["int@-1"], 58)]
#[case("FLOAT2INT", &["int@1"], 53)]
#[case("INT2FLOAT", &["float@1.0"], 53)]
#[case("NOT", &["int@0"], 53)]
#[case("AND", &["bool@true", "nil@nil"], 53)]
#[case("OR", &["int@1", "bool@true"], 53)]
fn test_stack_form_faults_match_destination_form(
    #[case] opcode: &str,
    #[case] args: &[&str],
    #[case] code: u8,
) {
    let expected = (String::new(), code);
    assert_eq!(destination_form(opcode, args), expected, "{}", opcode);
    assert_eq!(stack_form(opcode, args), expected, "{}S", opcode);
}

type BinaryCase = (&'static str, String, String);

fn int_case() -> impl Strategy<Value = BinaryCase> {
    (
        prop::sample::select(vec!["ADD", "SUB", "MUL", "LT", "GT", "EQ"]),
        -1000i64..1000,
        -1000i64..1000,
    )
        .prop_map(|(op, lhs, rhs)| (op, format!("int@{}", lhs), format!("int@{}", rhs)))
}

fn idiv_case() -> impl Strategy<Value = BinaryCase> {
    (-1000i64..1000, prop_oneof![-1000i64..-1, 1i64..1000])
        .prop_map(|(lhs, rhs)| ("IDIV", format!("int@{}", lhs), format!("int@{}", rhs)))
}

fn float_case() -> impl Strategy<Value = BinaryCase> {
    (
        prop::sample::select(vec!["ADD", "SUB", "MUL", "DIV", "LT", "GT", "EQ"]),
        -1.0e6f64..1.0e6,
        -1.0e6f64..1.0e6,
    )
        .prop_map(|(op, lhs, rhs)| {
            (
                op,
                format!("float@{}", format_float(lhs)),
                format!("float@{}", format_float(rhs)),
            )
        })
}

fn string_case() -> impl Strategy<Value = BinaryCase> {
    (
        prop::sample::select(vec!["LT", "GT", "EQ"]),
        "[a-z]{0,6}",
        "[a-z]{0,6}",
    )
        .prop_map(|(op, lhs, rhs)| (op, format!("string@{}", lhs), format!("string@{}", rhs)))
}

fn bool_case() -> impl Strategy<Value = BinaryCase> {
    (
        prop::sample::select(vec!["AND", "OR", "LT", "GT", "EQ"]),
        any::<bool>(),
        any::<bool>(),
    )
        .prop_map(|(op, lhs, rhs)| (op, format!("bool@{}", lhs), format!("bool@{}", rhs)))
}

fn stri2int_case() -> impl Strategy<Value = BinaryCase> {
    ("[a-zA-Z]{1,6}", 0i64..8)
        .prop_map(|(text, index)| ("STRI2INT", format!("string@{}", text), format!("int@{}", index)))
}

proptest! {
    #[test]
    fn prop_stack_and_destination_forms_agree(
        (opcode, lhs, rhs) in prop_oneof![
            int_case(),
            idiv_case(),
            float_case(),
            string_case(),
            bool_case(),
            stri2int_case(),
        ],
    ) {
        let args = [lhs.as_str(), rhs.as_str()];
        prop_assert_eq!(destination_form(opcode, &args), stack_form(opcode, &args));
    }

    #[test]
    fn prop_idiv_by_zero_is_value_error(lhs in any::<i64>()) {
        prop_assert_eq!(compute(&format!("IDIV GF@r int@{} int@0", lhs)).exit_code(), 57);
        let mut stack = OperandStack::new();
        stack.push(Value::Int(lhs));
        stack.push(Value::Int(0));
        prop_assert_eq!(
            ops::apply_binary(&mut stack, BinaryOp::IDiv).unwrap_err().exit_code(),
            57
        );
    }

    #[test]
    fn prop_idiv_floors(lhs in -10_000i64..10_000, rhs in prop::sample::select(vec![-7i64, -3, -1, 1, 2, 5])) {
        let quotient = BinaryOp::IDiv.apply(&Value::Int(lhs), &Value::Int(rhs)).unwrap();
        let expected = (lhs as f64 / rhs as f64).floor() as i64;
        prop_assert_eq!(quotient, Value::Int(expected));
    }
}
