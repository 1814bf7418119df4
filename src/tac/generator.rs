// This module lowers the AST into three-address code. Expressions return the operand that
// holds their value: literals are loaded into a fresh temporary (`LoadInt` for numbers and
// characters, `LoadStr` for strings), identifiers are returned as variable operands with no
// load, and binary operations lower both sides before computing into a fresh temporary whose
// character flag follows the left operand. Declarations with an initializer and assignments
// end in a `Copy` into the variable; a compound assignment computes `x op expr` into a
// temporary and copies it back, keeping every instruction at two arguments. A `shw` statement
// flattens its concatenation tree left to right: each leaf is evaluated and immediately
// followed by a `Concat`, and a final `Print` carries the newline. Everything emitted while
// lowering a `shw` is tagged as print context. Nodes that have no expression meaning lower to
// a `None` operand; validity was established by the semantic pass.

//! AST to TAC lowering.

use crate::front::ast::{BinaryOp, Node, NodeKind, VarType};
use crate::front::symbol_table::SymbolTable;

use super::{Instruction, Opcode, Operand, Program};

/// Lower `ast` into a fresh program.
///
/// The symbol table supplies declared types so that `chr` variables carry
/// the character flag into the instructions that read them.
pub fn generate<P>(ast: &Node, symbols: &SymbolTable<P>) -> Program {
    let mut gen = TacGenerator {
        program: Program::new(),
        symbols,
        in_print: false,
    };
    gen.gen_stmt(ast);
    log::debug!(
        "generated {} TAC instructions, {} temporaries",
        gen.program.len(),
        gen.program.temp_count()
    );
    gen.program
}

struct TacGenerator<'a, P> {
    program: Program,
    symbols: &'a SymbolTable<P>,
    in_print: bool,
}

impl<P> TacGenerator<'_, P> {
    fn emit(&mut self, opcode: Opcode, result: Operand, arg1: Operand, arg2: Operand, line: u32) {
        let result_is_char = result.is_char;
        self.program.push(Instruction {
            opcode,
            result,
            arg1,
            arg2,
            line,
            in_print_context: self.in_print,
            result_is_char,
        });
    }

    fn fresh(&mut self, is_char: bool) -> Operand {
        Operand::temp(self.program.new_temp()).with_char(is_char)
    }

    fn gen_expr(&mut self, node: &Node) -> Operand {
        match &node.kind {
            NodeKind::NumberLiteral(v) => {
                let res = self.fresh(false);
                self.emit(Opcode::LoadInt, res.clone(), Operand::int(*v), Operand::none(), node.line);
                res
            }
            NodeKind::CharLiteral(c) => {
                let res = self.fresh(true);
                let value = Operand::int(i64::from(*c)).with_char(true);
                self.emit(Opcode::LoadInt, res.clone(), value, Operand::none(), node.line);
                res
            }
            NodeKind::StringLiteral(s) => {
                let res = self.fresh(false);
                self.emit(Opcode::LoadStr, res.clone(), Operand::str(s), Operand::none(), node.line);
                res
            }
            NodeKind::Identifier(name) => {
                let is_char = self
                    .symbols
                    .lookup(name)
                    .is_some_and(|s| s.var_type == VarType::Character);
                Operand::var(name).with_char(is_char)
            }
            NodeKind::BinaryOp { op, left, right } => {
                let l = self.gen_expr(left);
                let r = self.gen_expr(right);
                let res = self.fresh(l.is_char);
                self.emit(arith_opcode(*op), res.clone(), l, r, node.line);
                res
            }
            NodeKind::Concat { left, right } => {
                self.gen_concat(left);
                self.gen_concat(right);
                Operand::none()
            }
            _ => Operand::none(),
        }
    }

    /// Evaluate one `shw` leaf (or recurse into a nested concat) and append it.
    fn gen_concat(&mut self, node: &Node) {
        if let NodeKind::Concat { left, right } = &node.kind {
            self.gen_concat(left);
            self.gen_concat(right);
            return;
        }
        let value = self.gen_expr(node);
        self.emit(Opcode::Concat, Operand::none(), value, Operand::none(), node.line);
    }

    fn gen_stmt(&mut self, node: &Node) {
        match &node.kind {
            NodeKind::Program(stmts) | NodeKind::DeclarationList(stmts) => {
                for stmt in stmts {
                    self.gen_stmt(stmt);
                }
            }
            NodeKind::Declaration {
                name,
                init: Some(init),
                ..
            } => {
                let value = self.gen_expr(init);
                self.emit_copy(name, value, node.line);
            }
            NodeKind::Declaration { init: None, .. } => {}
            NodeKind::Assignment { name, value } => {
                let value = self.gen_expr(value);
                self.emit_copy(name, value, node.line);
            }
            NodeKind::CompoundAssignment { name, op, value } => {
                let var = self.gen_expr(&Node::ident(name, node.line));
                let rhs = self.gen_expr(value);
                let res = self.fresh(var.is_char);
                self.emit(arith_opcode(*op), res.clone(), var, rhs, node.line);
                self.emit_copy(name, res, node.line);
            }
            NodeKind::Show(expr) => {
                self.in_print = true;
                self.gen_concat(expr);
                self.emit(
                    Opcode::Print,
                    Operand::none(),
                    Operand::str("\n"),
                    Operand::none(),
                    node.line,
                );
                self.in_print = false;
            }
            _ => {
                self.gen_expr(node);
            }
        }
    }

    fn emit_copy(&mut self, name: &str, value: Operand, line: u32) {
        let dest = Operand::var(name).with_char(value.is_char);
        self.emit(Opcode::Copy, dest, value, Operand::none(), line);
    }
}

fn arith_opcode(op: BinaryOp) -> Opcode {
    match op {
        BinaryOp::Add => Opcode::Add,
        BinaryOp::Sub => Opcode::Sub,
        BinaryOp::Mul => Opcode::Mul,
        BinaryOp::Div => Opcode::Div,
    }
}
