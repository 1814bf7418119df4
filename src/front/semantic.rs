// This module implements the semantic pass that runs between parsing and IR generation. It
// walks the AST once in statement order: declarations populate a fresh symbol table (a
// redeclaration or an exhausted table becomes an error diagnostic, and traversal continues),
// while every identifier read or written is checked against the declarations seen so far
// (an unknown name becomes a warning). Division and `/:` compound assignment are checked for a
// divisor that folds to the constant zero; multiplication by zero is ordinary arithmetic and
// is never reported. String literals only have a meaning as printed text, so one reached
// anywhere but a `shw` operand or concatenation is an error. The result bundles the declaring-phase symbol table with the collected
// diagnostics; callers decide whether errors block IR generation.

//! Symbol table construction and semantic warnings.

use std::fmt;

use thiserror::Error;

use super::ast::{BinaryOp, Node, NodeKind};
use super::symbol_table::{Declaring, SymbolError, SymbolTable};

/// Problems found by the semantic pass.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SemanticError {
    #[error("line {line}: redeclaration of '{name}'")]
    Redeclaration { name: String, line: u32 },

    #[error("line {line}: symbol table full, '{name}' not declared")]
    SymbolTableFull { name: String, line: u32 },

    #[error("line {line}: use of undeclared identifier '{name}'")]
    UndeclaredIdentifier { name: String, line: u32 },

    #[error("line {line}: division by constant zero")]
    DivisionByConstantZero { line: u32 },

    #[error("line {line}: string literal outside a shw statement")]
    StringOutsidePrint { line: u32 },
}

impl SemanticError {
    pub fn severity(&self) -> Severity {
        match self {
            SemanticError::Redeclaration { .. }
            | SemanticError::SymbolTableFull { .. }
            | SemanticError::StringOutsidePrint { .. } => Severity::Error,
            SemanticError::UndeclaredIdentifier { .. }
            | SemanticError::DivisionByConstantZero { .. } => Severity::Warning,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Error,
    Warning,
}

/// Diagnostics collected by one semantic pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Diagnostics {
    entries: Vec<SemanticError>,
}

impl Diagnostics {
    fn push(&mut self, diag: SemanticError) {
        match diag.severity() {
            Severity::Error => log::error!("{diag}"),
            Severity::Warning => log::warn!("{diag}"),
        }
        self.entries.push(diag);
    }

    pub fn errors(&self) -> impl Iterator<Item = &SemanticError> {
        self.entries
            .iter()
            .filter(|d| d.severity() == Severity::Error)
    }

    pub fn warnings(&self) -> impl Iterator<Item = &SemanticError> {
        self.entries
            .iter()
            .filter(|d| d.severity() == Severity::Warning)
    }

    pub fn error_count(&self) -> usize {
        self.errors().count()
    }

    pub fn warning_count(&self) -> usize {
        self.warnings().count()
    }

    pub fn has_errors(&self) -> bool {
        self.error_count() > 0
    }

    pub fn iter(&self) -> impl Iterator<Item = &SemanticError> {
        self.entries.iter()
    }
}

impl fmt::Display for Diagnostics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for diag in &self.entries {
            let label = match diag.severity() {
                Severity::Error => "error",
                Severity::Warning => "warning",
            };
            writeln!(f, "{label}: {diag}")?;
        }
        writeln!(
            f,
            "{} error(s), {} warning(s)",
            self.error_count(),
            self.warning_count()
        )
    }
}

/// Output of [`analyze`].
#[derive(Debug, Clone)]
pub struct Analysis {
    pub symbols: SymbolTable<Declaring>,
    pub diagnostics: Diagnostics,
}

/// Build the symbol table for `program` and collect diagnostics.
pub fn analyze(program: &Node) -> Analysis {
    let mut checker = Checker {
        symbols: SymbolTable::new(),
        diagnostics: Diagnostics::default(),
    };
    checker.visit_stmt(program);
    log::debug!(
        "semantic pass: {} symbols, {} errors, {} warnings",
        checker.symbols.len(),
        checker.diagnostics.error_count(),
        checker.diagnostics.warning_count()
    );

    Analysis {
        symbols: checker.symbols,
        diagnostics: checker.diagnostics,
    }
}

/// Fold an expression made only of integer and character literals.
///
/// Division by a zero divisor does not fold.
pub fn const_value(node: &Node) -> Option<i64> {
    match &node.kind {
        NodeKind::NumberLiteral(v) => Some(*v),
        NodeKind::CharLiteral(c) => Some(i64::from(*c)),
        NodeKind::BinaryOp { op, left, right } => {
            let l = const_value(left)?;
            let r = const_value(right)?;
            match op {
                BinaryOp::Add => Some(l.wrapping_add(r)),
                BinaryOp::Sub => Some(l.wrapping_sub(r)),
                BinaryOp::Mul => Some(l.wrapping_mul(r)),
                BinaryOp::Div => (r != 0).then(|| l.wrapping_div(r)),
            }
        }
        _ => None,
    }
}

struct Checker {
    symbols: SymbolTable<Declaring>,
    diagnostics: Diagnostics,
}

impl Checker {
    fn visit_stmt(&mut self, node: &Node) {
        match &node.kind {
            NodeKind::Program(stmts) | NodeKind::DeclarationList(stmts) => {
                for stmt in stmts {
                    self.visit_stmt(stmt);
                }
            }
            NodeKind::Declaration { var_type, name, init } => {
                // The initializer cannot see the variable it initializes.
                if let Some(init) = init {
                    self.visit_expr(init, false);
                }
                if let Err(err) = self.symbols.declare(name, *var_type) {
                    self.diagnostics.push(match err {
                        SymbolError::Redeclaration { name } => SemanticError::Redeclaration {
                            name,
                            line: node.line,
                        },
                        SymbolError::TableFull { name } => SemanticError::SymbolTableFull {
                            name,
                            line: node.line,
                        },
                    });
                }
            }
            NodeKind::Assignment { name, value } => {
                self.visit_expr(value, false);
                self.check_declared(name, node.line);
            }
            NodeKind::CompoundAssignment { name, op, value } => {
                self.check_declared(name, node.line);
                self.visit_expr(value, false);
                if *op == BinaryOp::Div && const_value(value) == Some(0) {
                    self.diagnostics
                        .push(SemanticError::DivisionByConstantZero { line: node.line });
                }
            }
            NodeKind::Show(expr) => self.visit_expr(expr, true),
            _ => self.visit_expr(node, false),
        }
    }

    /// `printing` is set while the expression only feeds a `shw` line.
    fn visit_expr(&mut self, node: &Node, printing: bool) {
        match &node.kind {
            NodeKind::Identifier(name) => self.check_declared(name, node.line),
            NodeKind::StringLiteral(_) if !printing => {
                self.diagnostics
                    .push(SemanticError::StringOutsidePrint { line: node.line });
            }
            NodeKind::BinaryOp { op, left, right } => {
                self.visit_expr(left, false);
                self.visit_expr(right, false);
                if *op == BinaryOp::Div && const_value(right) == Some(0) {
                    self.diagnostics
                        .push(SemanticError::DivisionByConstantZero { line: node.line });
                }
            }
            NodeKind::Concat { left, right } => {
                self.visit_expr(left, printing);
                self.visit_expr(right, printing);
            }
            _ => {}
        }
    }

    fn check_declared(&mut self, name: &str, line: u32) {
        if self.symbols.lookup(name).is_none() {
            self.diagnostics.push(SemanticError::UndeclaredIdentifier {
                name: name.to_string(),
                line,
            });
        }
    }
}
