//! Front-end data consumed by the backend.
//!
//! - [`ast`] - syntax tree produced by the parser
//! - [`symbol_table`] - declarations, runtime values and memory layout
//! - [`semantic`] - symbol table construction and warnings

pub mod ast;
pub mod semantic;
pub mod symbol_table;

pub use ast::{BinaryOp, Node, NodeKind, VarType};
pub use semantic::{analyze, Analysis, Diagnostics, SemanticError, Severity};
pub use symbol_table::{
    Declaring, Finalized, Symbol, SymbolError, SymbolTable, Value, MAX_SYMBOLS, SLOT_SIZE,
};
