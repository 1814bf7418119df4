// This module is the hub for flexc's shared back-end infrastructure: the compilation session
// that drives the pipeline and keeps statistics, the crate-wide error type, the liveness
// analysis over linear TAC, and the register file that implements the bounded allocation
// policy. The MIPS64 generator builds on the last two; the session ties every stage together.

//! Core flexc infrastructure
//!
//! ## Session Management (`session`)
//! - Pipeline driver: semantic pass, lowering, optimization, execution, code generation
//! - Compilation statistics
//!
//! ## Register Allocation (`register_file`)
//! - Fixed pool of working registers with next-use distances and dirty bits
//! - Furthest-next-use eviction with spill reporting
//!
//! ## Liveness (`analyzer`)
//! - Definition and use positions per temporary
//! - Next-use distance queries

pub mod analyzer;
pub mod error;
pub mod register_file;
pub mod session;

pub use analyzer::{Liveness, LivenessInfo};
pub use error::{CompileError, CompileResult};
pub use register_file::{Allocation, Reg, RegAllocError, RegisterFile, Slot};
pub use session::{CompilationSession, Lowered, SessionConfig, SessionStats};
