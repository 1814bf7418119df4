// This module defines the crate-wide error type using the thiserror crate. Each stage has its
// own error enum (runtime errors from the interpreter, code generation errors from the MIPS64
// back end); CompileError wraps them through `#[from]` conversions so a session can propagate
// any of them with `?`. Declaration errors found by the semantic pass are not a single error
// but a set of diagnostics, so the Semantic variant carries the whole Diagnostics value along
// with the error count. CompileResult<T> is the matching Result alias.

//! Error types for the flexc pipeline.

use thiserror::Error;

use crate::front::semantic::Diagnostics;
use crate::mips64::codegen::CodegenError;
use crate::tac::interpreter::RuntimeError;

/// Main error type for a compilation session.
#[derive(Error, Debug)]
pub enum CompileError {
    #[error("{count} declaration error(s); IR generation refused")]
    Semantic {
        count: usize,
        diagnostics: Diagnostics,
    },

    #[error(transparent)]
    Runtime(#[from] RuntimeError),

    #[error("Code generation failed: {0}")]
    Codegen(#[from] CodegenError),
}

/// Result type alias for compile operations.
pub type CompileResult<T> = Result<T, CompileError>;
