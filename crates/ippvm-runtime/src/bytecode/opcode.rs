//! Instruction set
//!
//! Closed set of opcodes, each with a fixed operand signature. Stack forms
//! (`ADDS`, `LTS`, ...) take their operands from the operand stack and push
//! the result back instead of writing a destination variable.

use std::fmt;

/// Kind of operand an opcode expects in a slot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperandKind {
    /// Variable reference (`GF@x`)
    Var,
    /// Variable reference or literal
    Symb,
    /// Label name
    Label,
    /// Type name (`int`, `float`, `bool`, `string`)
    Type,
}

use OperandKind::{Label as L, Symb as S, Type as T, Var as V};

/// Opcode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Opcode {
    // ===== Frames and variables =====
    Move,
    CreateFrame,
    PushFrame,
    PopFrame,
    DefVar,

    // ===== Calls =====
    Call,
    Return,

    // ===== Operand stack =====
    PushS,
    PopS,
    ClearS,

    // ===== Arithmetic =====
    Add,
    Sub,
    Mul,
    IDiv,
    Div,

    // ===== Relational and boolean =====
    Lt,
    Gt,
    Eq,
    And,
    Or,
    Not,

    // ===== Conversions =====
    Int2Char,
    Stri2Int,
    Int2Float,
    Float2Int,

    // ===== Stack forms =====
    AddS,
    SubS,
    MulS,
    IDivS,
    DivS,
    LtS,
    GtS,
    EqS,
    AndS,
    OrS,
    NotS,
    Int2CharS,
    Stri2IntS,
    Int2FloatS,
    Float2IntS,

    // ===== Input / output =====
    Read,
    Write,

    // ===== Strings =====
    Concat,
    StrLen,
    GetChar,
    SetChar,

    // ===== Types =====
    Type,

    // ===== Control flow =====
    Label,
    Jump,
    JumpIfEq,
    JumpIfNeq,
    JumpIfEqS,
    JumpIfNeqS,
    Exit,

    // ===== Debugging =====
    DPrint,
    Break,
}

impl Opcode {
    /// Every opcode, in declaration order
    pub const ALL: [Opcode; 56] = [
        Opcode::Move,
        Opcode::CreateFrame,
        Opcode::PushFrame,
        Opcode::PopFrame,
        Opcode::DefVar,
        Opcode::Call,
        Opcode::Return,
        Opcode::PushS,
        Opcode::PopS,
        Opcode::ClearS,
        Opcode::Add,
        Opcode::Sub,
        Opcode::Mul,
        Opcode::IDiv,
        Opcode::Div,
        Opcode::Lt,
        Opcode::Gt,
        Opcode::Eq,
        Opcode::And,
        Opcode::Or,
        Opcode::Not,
        Opcode::Int2Char,
        Opcode::Stri2Int,
        Opcode::Int2Float,
        Opcode::Float2Int,
        Opcode::AddS,
        Opcode::SubS,
        Opcode::MulS,
        Opcode::IDivS,
        Opcode::DivS,
        Opcode::LtS,
        Opcode::GtS,
        Opcode::EqS,
        Opcode::AndS,
        Opcode::OrS,
        Opcode::NotS,
        Opcode::Int2CharS,
        Opcode::Stri2IntS,
        Opcode::Int2FloatS,
        Opcode::Float2IntS,
        Opcode::Read,
        Opcode::Write,
        Opcode::Concat,
        Opcode::StrLen,
        Opcode::GetChar,
        Opcode::SetChar,
        Opcode::Type,
        Opcode::Label,
        Opcode::Jump,
        Opcode::JumpIfEq,
        Opcode::JumpIfNeq,
        Opcode::JumpIfEqS,
        Opcode::JumpIfNeqS,
        Opcode::Exit,
        Opcode::DPrint,
        Opcode::Break,
    ];

    /// Mnemonic as written in programs
    pub fn name(self) -> &'static str {
        match self {
            Opcode::Move => "MOVE",
            Opcode::CreateFrame => "CREATEFRAME",
            Opcode::PushFrame => "PUSHFRAME",
            Opcode::PopFrame => "POPFRAME",
            Opcode::DefVar => "DEFVAR",
            Opcode::Call => "CALL",
            Opcode::Return => "RETURN",
            Opcode::PushS => "PUSHS",
            Opcode::PopS => "POPS",
            Opcode::ClearS => "CLEARS",
            Opcode::Add => "ADD",
            Opcode::Sub => "SUB",
            Opcode::Mul => "MUL",
            Opcode::IDiv => "IDIV",
            Opcode::Div => "DIV",
            Opcode::Lt => "LT",
            Opcode::Gt => "GT",
            Opcode::Eq => "EQ",
            Opcode::And => "AND",
            Opcode::Or => "OR",
            Opcode::Not => "NOT",
            Opcode::Int2Char => "INT2CHAR",
            Opcode::Stri2Int => "STRI2INT",
            Opcode::Int2Float => "INT2FLOAT",
            Opcode::Float2Int => "FLOAT2INT",
            Opcode::AddS => "ADDS",
            Opcode::SubS => "SUBS",
            Opcode::MulS => "MULS",
            Opcode::IDivS => "IDIVS",
            Opcode::DivS => "DIVS",
            Opcode::LtS => "LTS",
            Opcode::GtS => "GTS",
            Opcode::EqS => "EQS",
            Opcode::AndS => "ANDS",
            Opcode::OrS => "ORS",
            Opcode::NotS => "NOTS",
            Opcode::Int2CharS => "INT2CHARS",
            Opcode::Stri2IntS => "STRI2INTS",
            Opcode::Int2FloatS => "INT2FLOATS",
            Opcode::Float2IntS => "FLOAT2INTS",
            Opcode::Read => "READ",
            Opcode::Write => "WRITE",
            Opcode::Concat => "CONCAT",
            Opcode::StrLen => "STRLEN",
            Opcode::GetChar => "GETCHAR",
            Opcode::SetChar => "SETCHAR",
            Opcode::Type => "TYPE",
            Opcode::Label => "LABEL",
            Opcode::Jump => "JUMP",
            Opcode::JumpIfEq => "JUMPIFEQ",
            Opcode::JumpIfNeq => "JUMPIFNEQ",
            Opcode::JumpIfEqS => "JUMPIFEQS",
            Opcode::JumpIfNeqS => "JUMPIFNEQS",
            Opcode::Exit => "EXIT",
            Opcode::DPrint => "DPRINT",
            Opcode::Break => "BREAK",
        }
    }

    /// Look up an opcode by mnemonic, ignoring case
    pub fn from_name(name: &str) -> Option<Opcode> {
        Opcode::ALL
            .iter()
            .copied()
            .find(|op| op.name().eq_ignore_ascii_case(name))
    }

    /// Operand kinds expected in each slot
    pub fn signature(self) -> &'static [OperandKind] {
        match self {
            Opcode::CreateFrame
            | Opcode::PushFrame
            | Opcode::PopFrame
            | Opcode::Return
            | Opcode::ClearS
            | Opcode::Break
            | Opcode::AddS
            | Opcode::SubS
            | Opcode::MulS
            | Opcode::IDivS
            | Opcode::DivS
            | Opcode::LtS
            | Opcode::GtS
            | Opcode::EqS
            | Opcode::AndS
            | Opcode::OrS
            | Opcode::NotS
            | Opcode::Int2CharS
            | Opcode::Stri2IntS
            | Opcode::Int2FloatS
            | Opcode::Float2IntS => &[],

            Opcode::DefVar | Opcode::PopS => &[V],
            Opcode::PushS | Opcode::Write | Opcode::Exit | Opcode::DPrint => &[S],
            Opcode::Call
            | Opcode::Label
            | Opcode::Jump
            | Opcode::JumpIfEqS
            | Opcode::JumpIfNeqS => &[L],

            Opcode::Move
            | Opcode::Not
            | Opcode::Int2Char
            | Opcode::Int2Float
            | Opcode::Float2Int
            | Opcode::StrLen
            | Opcode::Type => &[V, S],

            Opcode::Read => &[V, T],

            Opcode::Add
            | Opcode::Sub
            | Opcode::Mul
            | Opcode::IDiv
            | Opcode::Div
            | Opcode::Lt
            | Opcode::Gt
            | Opcode::Eq
            | Opcode::And
            | Opcode::Or
            | Opcode::Stri2Int
            | Opcode::Concat
            | Opcode::GetChar
            | Opcode::SetChar => &[V, S, S],

            Opcode::JumpIfEq | Opcode::JumpIfNeq => &[L, S, S],
        }
    }

    /// Whether the opcode works purely on the operand stack
    pub fn is_stack_form(self) -> bool {
        matches!(
            self,
            Opcode::AddS
                | Opcode::SubS
                | Opcode::MulS
                | Opcode::IDivS
                | Opcode::DivS
                | Opcode::LtS
                | Opcode::GtS
                | Opcode::EqS
                | Opcode::AndS
                | Opcode::OrS
                | Opcode::NotS
                | Opcode::Int2CharS
                | Opcode::Stri2IntS
                | Opcode::Int2FloatS
                | Opcode::Float2IntS
                | Opcode::JumpIfEqS
                | Opcode::JumpIfNeqS
        )
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_names_are_unique_and_round_trip() {
        let mut seen = HashSet::new();
        for op in Opcode::ALL {
            assert!(seen.insert(op.name()), "duplicate mnemonic {}", op);
            assert_eq!(Opcode::from_name(op.name()), Some(op));
        }
    }

    #[test]
    fn test_from_name_ignores_case() {
        assert_eq!(Opcode::from_name("defvar"), Some(Opcode::DefVar));
        assert_eq!(Opcode::from_name("JumpIfEqS"), Some(Opcode::JumpIfEqS));
        assert_eq!(Opcode::from_name("NOPE"), None);
    }

    #[test]
    fn test_signatures() {
        assert_eq!(Opcode::Sub.signature(), &[V, S, S]);
        assert_eq!(Opcode::SubS.signature(), &[] as &[OperandKind]);
        assert_eq!(Opcode::Read.signature(), &[V, T]);
        assert_eq!(Opcode::JumpIfNeq.signature(), &[L, S, S]);
    }

    #[test]
    fn test_stack_forms_take_no_operands() {
        for op in Opcode::ALL {
            if op.is_stack_form() && !matches!(op, Opcode::JumpIfEqS | Opcode::JumpIfNeqS) {
                assert!(op.signature().is_empty(), "{} should take no operands", op);
            }
        }
    }
}
