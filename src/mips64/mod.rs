// This module groups flexc's MIPS64 back end. The encoder owns the register naming, the two
// instruction formats and the bit-exact encode/decode of the handful of instructions the
// generator emits; the code generator walks optimized TAC with the register file from the
// core module and produces assembly text together with the encoded words.

//! MIPS64 code generation.

pub mod codegen;
pub mod encoder;

pub use codegen::{generate_code, CodeGenerator, CodegenConfig, CodegenError, GeneratedCode};
pub use encoder::{EncodingError, MachineInst};
