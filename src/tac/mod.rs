// This module defines flexc's three-address code: the linear IR every later stage consumes.
// An instruction has an opcode, one result operand and up to two argument operands, plus the
// source line it was lowered from and two rendering flags (whether it belongs to a `shw`
// statement, and whether its result is character-typed). Operands are temporaries, named
// variables, integer or string constants. The Program container owns the ordered instruction
// list and the temporary counter, which hands out fresh ids monotonically so every temporary
// is defined by exactly one instruction. Alongside the list, Program keeps a side table from
// temporary id to the metadata of its defining instruction (opcode, character flag, string
// payload), filled at emission time; the interpreter uses it to render printed temporaries
// without scanning backwards through the program. The Display impl produces the numbered TAC
// listing, with print and concat instructions left out.

//! Three-address code IR.

use std::fmt;

pub mod generator;
pub mod interpreter;
pub mod peephole;

pub use generator::generate;
pub use interpreter::{execute, execute_to_string, RuntimeError};
pub use peephole::optimize;

/// TAC operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Opcode {
    Add,
    Sub,
    Mul,
    Div,
    Copy,
    LoadInt,
    LoadStr,
    Print,
    Concat,
}

impl Opcode {
    pub const fn is_arithmetic(self) -> bool {
        matches!(self, Opcode::Add | Opcode::Sub | Opcode::Mul | Opcode::Div)
    }

    /// Infix symbol for arithmetic, mnemonic otherwise.
    pub const fn as_str(self) -> &'static str {
        match self {
            Opcode::Add => "+",
            Opcode::Sub => "-",
            Opcode::Mul => "*",
            Opcode::Div => "/",
            Opcode::Copy => "=",
            Opcode::LoadInt => "load_int",
            Opcode::LoadStr => "load_str",
            Opcode::Print => "print",
            Opcode::Concat => "concat",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum OperandKind {
    None,
    Temporary(u32),
    Variable(String),
    IntegerConstant(i64),
    StringConstant(String),
}

/// An instruction operand and its character flag.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Operand {
    pub kind: OperandKind,
    /// Character-typed, used for print rendering and result type propagation.
    pub is_char: bool,
}

impl Operand {
    pub const fn none() -> Self {
        Self {
            kind: OperandKind::None,
            is_char: false,
        }
    }

    pub fn temp(id: u32) -> Self {
        Self {
            kind: OperandKind::Temporary(id),
            is_char: false,
        }
    }

    pub fn var(name: &str) -> Self {
        Self {
            kind: OperandKind::Variable(name.to_string()),
            is_char: false,
        }
    }

    pub fn int(value: i64) -> Self {
        Self {
            kind: OperandKind::IntegerConstant(value),
            is_char: false,
        }
    }

    pub fn str(text: &str) -> Self {
        Self {
            kind: OperandKind::StringConstant(text.to_string()),
            is_char: false,
        }
    }

    pub fn with_char(mut self, is_char: bool) -> Self {
        self.is_char = is_char;
        self
    }

    pub fn as_temp(&self) -> Option<u32> {
        match self.kind {
            OperandKind::Temporary(id) => Some(id),
            _ => None,
        }
    }

    pub fn is_none(&self) -> bool {
        self.kind == OperandKind::None
    }
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            OperandKind::None => Ok(()),
            OperandKind::Temporary(id) => write!(f, "t{id}"),
            OperandKind::Variable(name) => f.write_str(name),
            OperandKind::IntegerConstant(v) => write!(f, "{v}"),
            OperandKind::StringConstant(s) => write!(f, "{s:?}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Instruction {
    pub opcode: Opcode,
    pub result: Operand,
    pub arg1: Operand,
    pub arg2: Operand,
    pub line: u32,
    /// Part of a `shw` statement; skipped by the code generator.
    pub in_print_context: bool,
    pub result_is_char: bool,
}

impl Instruction {
    /// Operands read by this instruction.
    pub fn args(&self) -> [&Operand; 2] {
        [&self.arg1, &self.arg2]
    }

    /// Whether either argument reads temporary `id`.
    pub fn reads_temp(&self, id: u32) -> bool {
        self.args().iter().any(|op| op.as_temp() == Some(id))
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.opcode {
            Opcode::Add | Opcode::Sub | Opcode::Mul | Opcode::Div => write!(
                f,
                "{} = {} {} {}",
                self.result,
                self.arg1,
                self.opcode.as_str(),
                self.arg2
            ),
            Opcode::Copy | Opcode::LoadInt | Opcode::LoadStr => {
                write!(f, "{} = {}", self.result, self.arg1)
            }
            Opcode::Print | Opcode::Concat => write!(f, "{} {}", self.opcode.as_str(), self.arg1),
        }
    }
}

/// Metadata about the instruction that defined a temporary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TempInfo {
    pub defined_by: Opcode,
    pub is_char: bool,
    /// String payload for temporaries defined by `LoadStr`.
    pub text: Option<String>,
    pub line: u32,
}

/// A lowered program: ordered instructions plus the temporary counter.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Program {
    instructions: Vec<Instruction>,
    temp_count: u32,
    temps: Vec<Option<TempInfo>>,
}

impl Program {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a fresh temporary id.
    pub fn new_temp(&mut self) -> u32 {
        let id = self.temp_count;
        self.temp_count += 1;
        self.temps.push(None);
        id
    }

    /// Number of temporaries allocated so far.
    pub fn temp_count(&self) -> u32 {
        self.temp_count
    }

    /// Append an instruction, recording temporary definitions in the side table.
    pub fn push(&mut self, instr: Instruction) {
        if let Some(id) = instr.result.as_temp() {
            if let Some(slot) = self.temps.get_mut(id as usize) {
                *slot = Some(TempInfo {
                    defined_by: instr.opcode,
                    is_char: instr.result_is_char,
                    text: match &instr.arg1.kind {
                        OperandKind::StringConstant(s) if instr.opcode == Opcode::LoadStr => {
                            Some(s.clone())
                        }
                        _ => None,
                    },
                    line: instr.line,
                });
            }
        }
        self.instructions.push(instr);
    }

    /// Defining-instruction metadata for temporary `id`.
    pub fn temp_info(&self, id: u32) -> Option<&TempInfo> {
        self.temps.get(id as usize).and_then(Option::as_ref)
    }

    pub fn instructions(&self) -> &[Instruction] {
        &self.instructions
    }

    pub(crate) fn instructions_mut(&mut self) -> &mut Vec<Instruction> {
        &mut self.instructions
    }

    pub fn len(&self) -> usize {
        self.instructions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }
}

impl fmt::Display for Program {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let listed = self
            .instructions
            .iter()
            .filter(|i| !matches!(i.opcode, Opcode::Print | Opcode::Concat));
        for (n, instr) in listed.enumerate() {
            writeln!(f, "{:3}: {}", n + 1, instr)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn instr(opcode: Opcode, result: Operand, arg1: Operand, arg2: Operand) -> Instruction {
        Instruction {
            opcode,
            result,
            arg1,
            arg2,
            line: 1,
            in_print_context: false,
            result_is_char: false,
        }
    }

    #[test]
    fn test_temporaries_are_monotonic() {
        let mut program = Program::new();
        assert_eq!(program.new_temp(), 0);
        assert_eq!(program.new_temp(), 1);
        assert_eq!(program.new_temp(), 2);
        assert_eq!(program.temp_count(), 3);
    }

    #[test]
    fn test_side_table_records_definitions() {
        let mut program = Program::new();
        let t0 = program.new_temp();
        let t1 = program.new_temp();
        program.push(instr(Opcode::LoadStr, Operand::temp(t0), Operand::str("hi"), Operand::none()));
        program.push(Instruction {
            result_is_char: true,
            ..instr(Opcode::LoadInt, Operand::temp(t1), Operand::int(65), Operand::none())
        });

        let info0 = program.temp_info(t0).unwrap();
        assert_eq!(info0.defined_by, Opcode::LoadStr);
        assert_eq!(info0.text.as_deref(), Some("hi"));
        let info1 = program.temp_info(t1).unwrap();
        assert!(info1.is_char);
        assert_eq!(info1.text, None);
        assert!(program.temp_info(7).is_none());
    }

    #[test]
    fn test_listing_skips_print_instructions() {
        let mut program = Program::new();
        let t0 = program.new_temp();
        let t1 = program.new_temp();
        program.push(instr(Opcode::LoadInt, Operand::temp(t0), Operand::int(5), Operand::none()));
        program.push(instr(Opcode::Add, Operand::temp(t1), Operand::var("x"), Operand::temp(t0)));
        program.push(instr(Opcode::Concat, Operand::none(), Operand::temp(t1), Operand::none()));
        program.push(instr(Opcode::Print, Operand::none(), Operand::str("\n"), Operand::none()));
        program.push(instr(Opcode::Copy, Operand::var("y"), Operand::temp(t1), Operand::none()));

        assert_eq!(
            program.to_string(),
            "  1: t0 = 5\n  2: t1 = x + t0\n  3: y = t1\n"
        );
    }

    #[test]
    fn test_reads_temp() {
        let i = instr(Opcode::Sub, Operand::temp(3), Operand::temp(1), Operand::var("a"));
        assert!(i.reads_temp(1));
        assert!(!i.reads_temp(3));
    }
}
