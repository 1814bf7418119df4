// This module executes TAC directly. One pass over the instruction list maintains a value
// store with one slot per temporary (zero initialized) and mutates the finalized symbol table
// in place. Variable operands resolve through the table: a flex variable yields its current
// tagged value, a chr variable yields its character (whose code point is what arithmetic
// sees), a nmbr variable its number. Arithmetic is 64-bit wrapping and the result is tagged
// with the instruction's character flag, which the generator copied from the left operand;
// stores convert to the destination's declared type. Division by zero stops execution at once
// with an error naming the source line. `Concat` appends the rendering of its operand to the
// current output line (characters as their single raw byte, numbers in decimal, string constants and
// string temporaries verbatim, the latter recovered from the program's temporary side table),
// and `Print` appends the newline and flushes the line to the output sink.

//! Direct TAC execution.

use std::io::{self, Write};

use thiserror::Error;

use crate::front::symbol_table::{Finalized, SymbolTable, Value};

use super::{Instruction, Opcode, Operand, OperandKind, Program};

/// Errors that stop the interpreter.
#[derive(Error, Debug)]
pub enum RuntimeError {
    #[error("Runtime error at line {line}: Division by zero")]
    DivisionByZero { line: u32 },

    #[error("failed to write program output: {0}")]
    Output(#[from] io::Error),
}

/// Execute `program`, writing printed lines to `out`.
///
/// Returns the number of instructions executed.
pub fn execute(
    program: &Program,
    symbols: &mut SymbolTable<Finalized>,
    out: &mut impl Write,
) -> Result<usize, RuntimeError> {
    let mut interp = Interpreter {
        program,
        symbols,
        temps: vec![Value::Number(0); program.temp_count() as usize],
        line_buf: Vec::new(),
    };

    let mut steps = 0;
    for instr in program.instructions() {
        interp.step(instr, out)?;
        steps += 1;
    }
    log::debug!("interpreter executed {steps} instructions");
    Ok(steps)
}

/// Execute `program` and collect everything it prints.
///
/// Character bytes above 0x7F are not valid UTF-8 on their own and come back
/// as U+FFFD; use [`execute`] with a byte sink to see them unchanged.
pub fn execute_to_string(
    program: &Program,
    symbols: &mut SymbolTable<Finalized>,
) -> Result<String, RuntimeError> {
    let mut out = Vec::new();
    execute(program, symbols, &mut out)?;
    Ok(String::from_utf8_lossy(&out).into_owned())
}

struct Interpreter<'a> {
    program: &'a Program,
    symbols: &'a mut SymbolTable<Finalized>,
    temps: Vec<Value>,
    line_buf: Vec<u8>,
}

impl Interpreter<'_> {
    fn step(&mut self, instr: &Instruction, out: &mut impl Write) -> Result<(), RuntimeError> {
        match instr.opcode {
            Opcode::LoadInt | Opcode::Copy => {
                let value = self.read(&instr.arg1);
                let value = if instr.opcode == Opcode::LoadInt {
                    Value::from_raw(value.as_number(), instr.result_is_char)
                } else {
                    value
                };
                self.write(&instr.result, value);
            }
            Opcode::Add | Opcode::Sub | Opcode::Mul | Opcode::Div => {
                let l = self.read(&instr.arg1).as_number();
                let r = self.read(&instr.arg2).as_number();
                let raw = match instr.opcode {
                    Opcode::Add => l.wrapping_add(r),
                    Opcode::Sub => l.wrapping_sub(r),
                    Opcode::Mul => l.wrapping_mul(r),
                    _ => {
                        if r == 0 {
                            log::error!("division by zero at line {}", instr.line);
                            return Err(RuntimeError::DivisionByZero { line: instr.line });
                        }
                        l.wrapping_div(r)
                    }
                };
                self.write(&instr.result, Value::from_raw(raw, instr.result_is_char));
            }
            // Strings never enter the value store.
            Opcode::LoadStr => {}
            Opcode::Concat => {
                let bytes = self.render(&instr.arg1);
                self.line_buf.extend_from_slice(&bytes);
            }
            Opcode::Print => {
                let bytes = self.render(&instr.arg1);
                self.line_buf.extend_from_slice(&bytes);
                out.write_all(&self.line_buf)?;
                self.line_buf.clear();
            }
        }
        Ok(())
    }

    fn read(&self, op: &Operand) -> Value {
        match &op.kind {
            OperandKind::IntegerConstant(v) => Value::from_raw(*v, op.is_char),
            OperandKind::Temporary(id) => self.temps.get(*id as usize).copied().unwrap_or(Value::Number(0)),
            OperandKind::Variable(name) => match self.symbols.lookup(name) {
                Some(sym) => sym.value(),
                None => {
                    log::warn!("read of undeclared variable '{name}', using 0");
                    Value::Number(0)
                }
            },
            OperandKind::None | OperandKind::StringConstant(_) => Value::Number(0),
        }
    }

    fn write(&mut self, op: &Operand, value: Value) {
        match &op.kind {
            OperandKind::Temporary(id) => {
                if let Some(slot) = self.temps.get_mut(*id as usize) {
                    *slot = value;
                }
            }
            OperandKind::Variable(name) => match self.symbols.lookup_mut(name) {
                Some(sym) => sym.store(value),
                None => log::warn!("write to undeclared variable '{name}' ignored"),
            },
            _ => {}
        }
    }

    fn render(&self, op: &Operand) -> Vec<u8> {
        match &op.kind {
            OperandKind::StringConstant(s) => s.as_bytes().to_vec(),
            OperandKind::Temporary(id) => match self.program.temp_info(*id) {
                Some(info) if info.defined_by == Opcode::LoadStr => {
                    info.text.as_deref().unwrap_or_default().as_bytes().to_vec()
                }
                _ => value_bytes(self.read(op)),
            },
            OperandKind::None => Vec::new(),
            _ => value_bytes(self.read(op)),
        }
    }
}

/// Printed form of a value: one raw byte for a character, decimal digits for a number.
fn value_bytes(value: Value) -> Vec<u8> {
    match value {
        Value::Character(c) => vec![c],
        Value::Number(n) => n.to_string().into_bytes(),
    }
}
