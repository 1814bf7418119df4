//! flexc - TAC generation, optimization and MIPS64 code generation for a small typed
//! imperative language.
//!
//! The crate takes a syntax tree built with the [`front::ast`] constructors, lowers it to
//! three-address code, optionally fuses copy pairs, and then either interprets the code
//! directly or compiles it to register-allocated MIPS64 assembly with matching hex and binary
//! words.
//!
//! # Primary Usage
//!
//! ```
//! use flexc::core::CompilationSession;
//! use flexc::front::{BinaryOp, Node, VarType};
//!
//! let ast = Node::program(vec![
//!     Node::declaration(VarType::Number, "x", Some(Node::number(10, 1)), 1),
//!     Node::compound_assignment("x", BinaryOp::Add, Node::number(5, 2), 2),
//!     Node::show(Node::ident("x", 3), 3),
//! ]);
//!
//! let mut session = CompilationSession::default();
//! let mut lowered = session.lower(&ast)?;
//! assert_eq!(session.run_to_string(&mut lowered)?, "15\n");
//!
//! let code = session.generate_code(&lowered)?;
//! assert_eq!(code.hex().len(), code.instructions.len());
//! # Ok::<(), flexc::core::CompileError>(())
//! ```
//!
//! # Architecture
//!
//! - [`front`] - AST, symbol table and semantic pass
//! - [`tac`] - three-address code, lowering, peephole passes, interpreter
//! - [`core`] - session, errors, liveness, register file
//! - [`mips64`] - instruction encoding and code generation

pub mod core;
pub mod front;
pub mod mips64;
pub mod tac;

pub use self::core::{CompilationSession, CompileError, CompileResult, SessionConfig, SessionStats};
pub use mips64::{generate_code, CodegenConfig, GeneratedCode, MachineInst};
pub use tac::{Instruction, Opcode, Operand, OperandKind, Program};
