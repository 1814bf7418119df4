// This module provides the compilation session that drives flexc's pipeline and records its
// statistics. A session owns its configuration (whether to run the peephole optimizer, and
// the code generator settings) and a SessionStats accumulator. `lower` runs the semantic pass,
// refuses to go further when declaration errors were found, lowers the AST to TAC, optionally
// optimizes it, and finalizes the symbol table layout; the result is a Lowered bundle that
// owns the program, the finalized symbol table and the diagnostics. The bundle can then be
// executed by the interpreter (which mutates the symbol values it owns) and handed to the
// MIPS64 code generator, in either order. SessionStats tracks TAC size, fusions, interpreter
// steps, machine instructions with a per-mnemonic breakdown, register allocations, spills
// and reloads.

//! Compilation session management.

use std::fmt;
use std::io::Write;

use hashbrown::HashMap;

use super::error::{CompileError, CompileResult};
use crate::front::ast::Node;
use crate::front::semantic::{analyze, Analysis, Diagnostics};
use crate::front::symbol_table::{Finalized, SymbolTable};
use crate::mips64::codegen::{generate_code, CodegenConfig, GeneratedCode};
use crate::tac::{self, Program};

/// Session settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionConfig {
    /// Run the peephole optimizer after lowering.
    pub optimize: bool,
    pub codegen: CodegenConfig,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            optimize: true,
            codegen: CodegenConfig::default(),
        }
    }
}

/// A program lowered to TAC together with its finalized symbols.
#[derive(Debug, Clone)]
pub struct Lowered {
    pub program: Program,
    pub symbols: SymbolTable<Finalized>,
    /// Warnings from the semantic pass. Never contains errors.
    pub diagnostics: Diagnostics,
}

/// Drives the pipeline for one or more programs.
#[derive(Debug, Default)]
pub struct CompilationSession {
    config: SessionConfig,
    stats: SessionStats,
}

impl CompilationSession {
    pub fn new(config: SessionConfig) -> Self {
        Self {
            config,
            stats: SessionStats::default(),
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Analyze and lower `ast` to TAC.
    pub fn lower(&mut self, ast: &Node) -> CompileResult<Lowered> {
        let Analysis { symbols, diagnostics } = analyze(ast);
        if diagnostics.has_errors() {
            return Err(CompileError::Semantic {
                count: diagnostics.error_count(),
                diagnostics,
            });
        }

        let mut program = tac::generate(ast, &symbols);
        self.stats.tac_instructions += program.len();
        if self.config.optimize {
            self.stats.instructions_fused += tac::optimize(&mut program);
        }
        self.stats.programs_lowered += 1;

        Ok(Lowered {
            program,
            symbols: symbols.compute_offsets(),
            diagnostics,
        })
    }

    /// Interpret a lowered program, writing its output to `out`.
    pub fn run(&mut self, lowered: &mut Lowered, out: &mut impl Write) -> CompileResult<usize> {
        let steps = tac::execute(&lowered.program, &mut lowered.symbols, out)?;
        self.stats.interpreter_steps += steps;
        Ok(steps)
    }

    /// Interpret a lowered program and return what it printed.
    pub fn run_to_string(&mut self, lowered: &mut Lowered) -> CompileResult<String> {
        let mut out = Vec::new();
        self.run(lowered, &mut out)?;
        Ok(String::from_utf8_lossy(&out).into_owned())
    }

    /// Generate MIPS64 code for a lowered program.
    pub fn generate_code(&mut self, lowered: &Lowered) -> CompileResult<GeneratedCode> {
        let code = generate_code(&lowered.program, &lowered.symbols, &self.config.codegen)?;

        self.stats.machine_instructions += code.instructions.len();
        self.stats.registers_allocated += code.registers_allocated;
        self.stats.spills_generated += code.spills;
        self.stats.reloads_generated += code.reloads;
        for inst in &code.instructions {
            *self.stats.instruction_counts.entry(inst.mnemonic()).or_insert(0) += 1;
        }
        Ok(code)
    }

    pub fn stats(&self) -> &SessionStats {
        &self.stats
    }
}

/// Compilation session statistics.
#[derive(Debug, Default, Clone)]
pub struct SessionStats {
    /// Programs successfully lowered to TAC.
    pub programs_lowered: usize,

    /// TAC instructions generated, before optimization.
    pub tac_instructions: usize,

    /// Instruction pairs fused by the peephole optimizer.
    pub instructions_fused: usize,

    /// TAC instructions executed by the interpreter.
    pub interpreter_steps: usize,

    /// Machine instructions emitted.
    pub machine_instructions: usize,

    /// Count of each mnemonic emitted.
    pub instruction_counts: HashMap<&'static str, usize>,

    /// Registers handed to temporaries.
    pub registers_allocated: usize,

    /// Spills generated.
    pub spills_generated: usize,

    /// Reloads from temporary storage.
    pub reloads_generated: usize,
}

impl fmt::Display for SessionStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Compilation Session Statistics:")?;
        writeln!(f, "  Programs lowered: {}", self.programs_lowered)?;
        writeln!(f, "  TAC instructions: {}", self.tac_instructions)?;
        writeln!(f, "  Instructions fused: {}", self.instructions_fused)?;
        writeln!(f, "  Interpreter steps: {}", self.interpreter_steps)?;
        writeln!(f, "  Machine instructions: {}", self.machine_instructions)?;
        writeln!(f, "  Registers allocated: {}", self.registers_allocated)?;
        writeln!(f, "  Spills generated: {}", self.spills_generated)?;
        writeln!(f, "  Reloads generated: {}", self.reloads_generated)?;

        if !self.instruction_counts.is_empty() {
            writeln!(f, "  Instruction breakdown:")?;
            let mut sorted: Vec<_> = self.instruction_counts.iter().collect();
            sorted.sort_by(|a, b| b.1.cmp(a.1).then(a.0.cmp(b.0)));

            for (mnemonic, count) in sorted {
                writeln!(f, "    {}: {}", mnemonic, count)?;
            }
        }

        Ok(())
    }
}
