// This module defines the abstract syntax tree handed to flexc by the parser. A program is a
// list of statements: typed declarations (optionally grouped into declaration lists),
// assignments, compound assignments (`+:`, `-:`, `*:`, `/:`) and `shw` print statements whose
// argument is a concatenation tree. Expressions are integer, character and string literals,
// identifiers and the four binary arithmetic operators. Every node carries the source line it
// came from so diagnostics and runtime errors can point back at the program text. The tree is
// consumed read-only by the semantic pass and the TAC generator; `Node::dump` renders the
// indented tree view used when debugging a front end.

//! AST node definitions and constructors.

use std::fmt::{self, Write};

/// Declared type of a variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VarType {
    /// `nmbr`: 64-bit signed integer.
    Number,
    /// `chr`: a single byte character.
    Character,
    /// `flex`: holds either a number or a character, decided at runtime.
    Flex,
}

impl VarType {
    /// Source keyword for the type.
    pub const fn keyword(self) -> &'static str {
        match self {
            VarType::Number => "nmbr",
            VarType::Character => "chr",
            VarType::Flex => "flex",
        }
    }
}

impl fmt::Display for VarType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.keyword())
    }
}

/// Arithmetic operator of a binary expression or compound assignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
}

impl BinaryOp {
    pub const fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
        }
    }

    /// Compound assignment spelling (`+:` and friends).
    pub const fn compound_symbol(self) -> &'static str {
        match self {
            BinaryOp::Add => "+:",
            BinaryOp::Sub => "-:",
            BinaryOp::Mul => "*:",
            BinaryOp::Div => "/:",
        }
    }
}

/// A node of the syntax tree together with its source line.
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub kind: NodeKind,
    pub line: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    /// Top level statement list.
    Program(Vec<Node>),
    /// `nmbr x = expr` (initializer optional).
    Declaration {
        var_type: VarType,
        name: String,
        init: Option<Box<Node>>,
    },
    /// Several declarations written as one statement.
    DeclarationList(Vec<Node>),
    /// `x : expr`
    Assignment { name: String, value: Box<Node> },
    /// `x +: expr`
    CompoundAssignment {
        name: String,
        op: BinaryOp,
        value: Box<Node>,
    },
    BinaryOp {
        op: BinaryOp,
        left: Box<Node>,
        right: Box<Node>,
    },
    /// `shw expr`
    Show(Box<Node>),
    /// `left + right` inside a `shw` argument.
    Concat { left: Box<Node>, right: Box<Node> },
    NumberLiteral(i64),
    CharLiteral(u8),
    StringLiteral(String),
    Identifier(String),
}

impl Node {
    pub fn new(kind: NodeKind, line: u32) -> Self {
        Self { kind, line }
    }

    pub fn program(stmts: Vec<Node>) -> Self {
        Self::new(NodeKind::Program(stmts), 0)
    }

    pub fn declaration(var_type: VarType, name: &str, init: Option<Node>, line: u32) -> Self {
        Self::new(
            NodeKind::Declaration {
                var_type,
                name: name.to_string(),
                init: init.map(Box::new),
            },
            line,
        )
    }

    pub fn declaration_list(decls: Vec<Node>, line: u32) -> Self {
        Self::new(NodeKind::DeclarationList(decls), line)
    }

    pub fn assignment(name: &str, value: Node, line: u32) -> Self {
        Self::new(
            NodeKind::Assignment {
                name: name.to_string(),
                value: Box::new(value),
            },
            line,
        )
    }

    pub fn compound_assignment(name: &str, op: BinaryOp, value: Node, line: u32) -> Self {
        Self::new(
            NodeKind::CompoundAssignment {
                name: name.to_string(),
                op,
                value: Box::new(value),
            },
            line,
        )
    }

    pub fn binary(op: BinaryOp, left: Node, right: Node, line: u32) -> Self {
        Self::new(
            NodeKind::BinaryOp {
                op,
                left: Box::new(left),
                right: Box::new(right),
            },
            line,
        )
    }

    pub fn show(expr: Node, line: u32) -> Self {
        Self::new(NodeKind::Show(Box::new(expr)), line)
    }

    pub fn concat(left: Node, right: Node, line: u32) -> Self {
        Self::new(
            NodeKind::Concat {
                left: Box::new(left),
                right: Box::new(right),
            },
            line,
        )
    }

    pub fn number(value: i64, line: u32) -> Self {
        Self::new(NodeKind::NumberLiteral(value), line)
    }

    pub fn character(value: u8, line: u32) -> Self {
        Self::new(NodeKind::CharLiteral(value), line)
    }

    pub fn string(value: &str, line: u32) -> Self {
        Self::new(NodeKind::StringLiteral(value.to_string()), line)
    }

    pub fn ident(name: &str, line: u32) -> Self {
        Self::new(NodeKind::Identifier(name.to_string()), line)
    }

    /// Render the tree, one node per line, indented two spaces per level.
    pub fn dump(&self) -> String {
        let mut out = String::new();
        // Writing into a String cannot fail.
        let _ = self.write_tree(&mut out, 0);
        out
    }

    fn write_tree(&self, out: &mut impl Write, depth: usize) -> fmt::Result {
        let pad = "  ".repeat(depth);
        match &self.kind {
            NodeKind::Program(stmts) => {
                writeln!(out, "{pad}Program")?;
                for stmt in stmts {
                    stmt.write_tree(out, depth + 1)?;
                }
            }
            NodeKind::Declaration { var_type, name, init } => {
                writeln!(out, "{pad}Decl({var_type} {name})")?;
                if let Some(init) = init {
                    init.write_tree(out, depth + 1)?;
                }
            }
            NodeKind::DeclarationList(decls) => {
                writeln!(out, "{pad}DeclList (line {})", self.line)?;
                for decl in decls {
                    decl.write_tree(out, depth + 1)?;
                }
            }
            NodeKind::Assignment { name, value } => {
                writeln!(out, "{pad}Assign({name})")?;
                value.write_tree(out, depth + 1)?;
            }
            NodeKind::CompoundAssignment { name, op, value } => {
                writeln!(out, "{pad}CompoundAssign({name} {})", op.compound_symbol())?;
                value.write_tree(out, depth + 1)?;
            }
            NodeKind::BinaryOp { op, left, right } => {
                writeln!(out, "{pad}BinOp({})", op.symbol())?;
                left.write_tree(out, depth + 1)?;
                right.write_tree(out, depth + 1)?;
            }
            NodeKind::Show(expr) => {
                writeln!(out, "{pad}Shw")?;
                expr.write_tree(out, depth + 1)?;
            }
            NodeKind::Concat { left, right } => {
                writeln!(out, "{pad}Concat")?;
                left.write_tree(out, depth + 1)?;
                right.write_tree(out, depth + 1)?;
            }
            NodeKind::NumberLiteral(v) => writeln!(out, "{pad}NumLit({v})")?,
            NodeKind::CharLiteral(c) => writeln!(out, "{pad}ChrLit('{}')", *c as char)?,
            NodeKind::StringLiteral(s) => writeln!(out, "{pad}StrLit(\"{s}\")")?,
            NodeKind::Identifier(name) => writeln!(out, "{pad}Ident({name})")?,
        }
        Ok(())
    }
}
