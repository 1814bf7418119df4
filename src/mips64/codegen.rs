// This module lowers optimized TAC into MIPS64 machine code with a bounded register allocator.
// Print context instructions are filtered out first: the generated code performs no I/O, so
// `Concat` and `Print` have no machine equivalent. Liveness is computed over the remaining
// list and the walk is a single forward pass. Temporaries live in the working register pool
// managed by RegisterFile. Before each instruction the occupants' next-use distances are
// refreshed; a temporary read by the current instruction sits at distance zero, so operand
// loading never evicts an operand of the same instruction if anything else is available.
// When an eviction hits a dirty occupant, its value is stored to the temporary storage region
// (base plus id times 8) and a later read reloads it from there. Variables are never cached:
// every variable read loads from the symbol's fixed offset into a scratch register, and every
// variable write stores right after the producing instruction. Constants go through the
// scratch registers as `daddiu rX, $zero, imm`. A destination temporary prefers the register
// of a source temporary that dies at this instruction. Multiply and divide use the HI/LO
// idiom: `dmult`/`ddiv` followed by `mflo`. Division by zero is never checked here; the
// hardware decides. The assembly text carries a `.data` section with one doubleword per
// symbol (plus the spill region when any spill happened) and a `.code` section with one
// instruction per line, in one-to-one correspondence with the encoded words.

//! TAC to MIPS64 code generation.

use hashbrown::HashSet;
use thiserror::Error;

use crate::core::analyzer::Liveness;
use crate::core::register_file::{Allocation, Reg, RegAllocError, RegisterFile};
use crate::front::symbol_table::{Finalized, SymbolTable, SLOT_SIZE};
use crate::tac::{Instruction, Opcode, Operand, OperandKind, Program};

use super::encoder::{
    imm16, to_binary, to_hex, working_registers, EncodingError, MachineInst, MAX_WORKING_REGS,
    SCRATCH0, SCRATCH1, ZERO,
};

/// Code generator settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CodegenConfig {
    /// Size of the working register pool, 1..=16.
    pub register_count: usize,
    /// Byte address of the spill region. Must not overlap the variables.
    pub temp_storage_base: u32,
    /// Emit the TAC text of each instruction as an assembly comment.
    pub annotate: bool,
}

impl Default for CodegenConfig {
    fn default() -> Self {
        Self {
            register_count: 8,
            temp_storage_base: 0x2000,
            annotate: false,
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodegenError {
    #[error("line {line}: unknown variable '{name}'")]
    UnknownVariable { name: String, line: u32 },

    #[error("line {line}: temporary t{id} is read before it holds a value")]
    UndefinedTemporary { id: u32, line: u32 },

    #[error("line {line}: operand has no machine representation")]
    UnsupportedOperand { line: u32 },

    #[error("memory offset {offset} does not fit a 16-bit displacement")]
    OffsetOutOfRange { offset: u64 },

    #[error("line {line}: constant {value} does not fit a 16-bit immediate")]
    ImmediateOutOfRange { value: i64, line: u32 },

    #[error("register count {0} is not in 1..=16")]
    InvalidRegisterCount(usize),

    #[error("temporary storage at {base:#x} overlaps {data_size} bytes of variables")]
    TempStorageOverlap { base: u32, data_size: u32 },

    #[error(transparent)]
    Encoding(#[from] EncodingError),

    #[error("register allocation failed: {0}")]
    RegAlloc(#[from] RegAllocError),
}

/// Output of one code generation run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GeneratedCode {
    /// `.data` / `.code` assembly text.
    pub assembly: String,
    /// Emitted instructions, in order.
    pub instructions: Vec<MachineInst>,
    pub spills: usize,
    pub reloads: usize,
    pub registers_allocated: usize,
}

impl GeneratedCode {
    pub fn words(&self) -> Vec<u32> {
        self.instructions.iter().map(MachineInst::encode).collect()
    }

    /// One `0xXXXXXXXX` token per instruction.
    pub fn hex(&self) -> Vec<String> {
        self.instructions.iter().map(|i| to_hex(i.encode())).collect()
    }

    /// One 32-character binary token per instruction.
    pub fn binary(&self) -> Vec<String> {
        self.instructions.iter().map(|i| to_binary(i.encode())).collect()
    }

    pub fn hex_text(&self) -> String {
        lines_of(self.hex())
    }

    pub fn binary_text(&self) -> String {
        lines_of(self.binary())
    }
}

fn lines_of(tokens: Vec<String>) -> String {
    let mut text = String::new();
    for token in tokens {
        text.push_str(&token);
        text.push('\n');
    }
    text
}

/// Generate code for `program` against the finalized symbol layout.
pub fn generate_code(
    program: &Program,
    symbols: &SymbolTable<Finalized>,
    config: &CodegenConfig,
) -> Result<GeneratedCode, CodegenError> {
    CodeGenerator::new(symbols, *config)?.generate(program)
}

/// Single-use code generator. Holds the allocator state for one run.
pub struct CodeGenerator<'a> {
    symbols: &'a SymbolTable<Finalized>,
    config: CodegenConfig,
    regs: RegisterFile,
    /// Temporaries whose current value is in temporary storage.
    spilled: HashSet<u32>,
    highest_slot: Option<u32>,
    code: Vec<MachineInst>,
    lines: Vec<String>,
    spills: usize,
    reloads: usize,
    registers_allocated: usize,
}

impl<'a> CodeGenerator<'a> {
    pub fn new(symbols: &'a SymbolTable<Finalized>, config: CodegenConfig) -> Result<Self, CodegenError> {
        if config.register_count == 0 || config.register_count > MAX_WORKING_REGS {
            return Err(CodegenError::InvalidRegisterCount(config.register_count));
        }
        let data_size = symbols.data_size();
        if config.temp_storage_base < data_size {
            return Err(CodegenError::TempStorageOverlap {
                base: config.temp_storage_base,
                data_size,
            });
        }

        Ok(Self {
            symbols,
            config,
            regs: RegisterFile::new(working_registers(config.register_count)?),
            spilled: HashSet::new(),
            highest_slot: None,
            code: Vec::new(),
            lines: Vec::new(),
            spills: 0,
            reloads: 0,
            registers_allocated: 0,
        })
    }

    pub fn generate(mut self, program: &Program) -> Result<GeneratedCode, CodegenError> {
        self.regs.reset();

        let visible: Vec<&Instruction> = program
            .instructions()
            .iter()
            .filter(|i| !i.in_print_context)
            .collect();
        let live = Liveness::compute(&visible, program.temp_count());

        for (pos, instr) in visible.iter().enumerate() {
            if self.config.annotate {
                self.lines.push(format!("    ; {instr}"));
            }
            self.lower(instr, pos, &live)?;
        }

        log::debug!(
            "codegen: {} machine instructions, {} spills, {} reloads",
            self.code.len(),
            self.spills,
            self.reloads
        );

        Ok(GeneratedCode {
            assembly: self.render_assembly(),
            instructions: self.code,
            spills: self.spills,
            reloads: self.reloads,
            registers_allocated: self.registers_allocated,
        })
    }

    fn lower(&mut self, instr: &Instruction, pos: usize, live: &Liveness) -> Result<(), CodegenError> {
        let line = instr.line;
        self.regs.refresh(|t| live.next_use_from(t, pos));

        match instr.opcode {
            Opcode::LoadInt => {
                let OperandKind::IntegerConstant(value) = instr.arg1.kind else {
                    return Err(CodegenError::UnsupportedOperand { line });
                };
                let imm = immediate(value, line)?;
                match &instr.result.kind {
                    OperandKind::Variable(name) => {
                        self.emit(MachineInst::Daddiu { rt: SCRATCH0, rs: ZERO, imm });
                        self.store_var(name, SCRATCH0, line)?;
                    }
                    OperandKind::Temporary(id) => {
                        let rd = self.alloc(*id, &[])?;
                        self.emit(MachineInst::Daddiu { rt: rd, rs: ZERO, imm });
                        self.regs.mark_dirty(rd);
                    }
                    _ => return Err(CodegenError::UnsupportedOperand { line }),
                }
            }
            Opcode::Copy => {
                let src = self.source(&instr.arg1, SCRATCH0, &[], line)?;
                match &instr.result.kind {
                    OperandKind::Variable(name) => self.store_var(name, src, line)?,
                    OperandKind::Temporary(id) => {
                        let rd = self.dest_temp(*id, [&instr.arg1, &instr.arg1], pos, live)?;
                        if rd != src {
                            self.emit(MachineInst::mov(rd, src));
                        }
                        self.regs.mark_dirty(rd);
                    }
                    _ => return Err(CodegenError::UnsupportedOperand { line }),
                }
            }
            Opcode::Add | Opcode::Sub | Opcode::Mul | Opcode::Div => {
                self.lower_arith(instr, pos, live)?;
            }
            Opcode::LoadStr => {
                log::warn!("line {line}: string load outside print context has no machine code");
            }
            Opcode::Print | Opcode::Concat => {
                log::trace!("line {line}: skipping {} outside print context", instr.opcode.as_str());
            }
        }

        self.release_dead(instr, pos, live);
        Ok(())
    }

    fn lower_arith(&mut self, instr: &Instruction, pos: usize, live: &Liveness) -> Result<(), CodegenError> {
        let line = instr.line;

        // Keep the second operand's register out of reach while the first loads.
        let pinned: Vec<Reg> = instr.arg2.as_temp().and_then(|t| self.regs.find(t)).into_iter().collect();
        let rs = self.source(&instr.arg1, SCRATCH0, &pinned, line)?;
        let rt = self.source(&instr.arg2, SCRATCH1, &[rs], line)?;

        let rd = match &instr.result.kind {
            OperandKind::Variable(_) => SCRATCH0,
            OperandKind::Temporary(id) => self.dest_temp(*id, [&instr.arg1, &instr.arg2], pos, live)?,
            _ => return Err(CodegenError::UnsupportedOperand { line }),
        };

        match instr.opcode {
            Opcode::Add => self.emit(MachineInst::Daddu { rd, rs, rt }),
            Opcode::Sub => self.emit(MachineInst::Dsubu { rd, rs, rt }),
            Opcode::Mul => {
                self.emit(MachineInst::Dmult { rs, rt });
                self.emit(MachineInst::Mflo { rd });
            }
            _ => {
                self.emit(MachineInst::Ddiv { rs, rt });
                self.emit(MachineInst::Mflo { rd });
            }
        }

        match &instr.result.kind {
            OperandKind::Variable(name) => self.store_var(name, rd, line)?,
            _ => self.regs.mark_dirty(rd),
        }
        Ok(())
    }

    /// Put an argument operand in a register.
    fn source(&mut self, op: &Operand, scratch: Reg, exclude: &[Reg], line: u32) -> Result<Reg, CodegenError> {
        match &op.kind {
            OperandKind::Temporary(id) => self.temp_in_reg(*id, exclude, line),
            OperandKind::Variable(name) => {
                let offset = self.var_offset(name, line)?;
                self.emit(MachineInst::Ld { rt: scratch, base: ZERO, offset });
                Ok(scratch)
            }
            OperandKind::IntegerConstant(value) => {
                let imm = immediate(*value, line)?;
                self.emit(MachineInst::Daddiu { rt: scratch, rs: ZERO, imm });
                Ok(scratch)
            }
            OperandKind::None | OperandKind::StringConstant(_) => {
                Err(CodegenError::UnsupportedOperand { line })
            }
        }
    }

    fn temp_in_reg(&mut self, id: u32, exclude: &[Reg], line: u32) -> Result<Reg, CodegenError> {
        if let Some(reg) = self.regs.find(id) {
            return Ok(reg);
        }
        if !self.spilled.contains(&id) {
            return Err(CodegenError::UndefinedTemporary { id, line });
        }
        let reg = self.alloc(id, exclude)?;
        let offset = self.spill_offset(id)?;
        self.emit(MachineInst::Ld { rt: reg, base: ZERO, offset });
        self.reloads += 1;
        log::trace!("reloaded t{id} into {reg}");
        Ok(reg)
    }

    /// Register for a freshly defined temporary.
    fn dest_temp(
        &mut self,
        id: u32,
        sources: [&Operand; 2],
        pos: usize,
        live: &Liveness,
    ) -> Result<Reg, CodegenError> {
        for src in sources {
            let Some(s) = src.as_temp() else { continue };
            if !live.dies_at(s, pos) {
                continue;
            }
            if let Some(reg) = self.regs.free_temp(s) {
                self.regs.assign(reg, id)?;
                self.registers_allocated += 1;
                log::trace!("t{id} takes {reg} from dying t{s}");
                return Ok(reg);
            }
        }

        // Operands already sit in registers; from here on only later reads matter.
        self.regs.refresh(|t| live.next_use(t, pos));
        self.alloc(id, &[])
    }

    fn alloc(&mut self, id: u32, exclude: &[Reg]) -> Result<Reg, CodegenError> {
        let alloc = self.regs.allocate(id, exclude)?;
        match alloc {
            Allocation::Resident(_) => return Ok(alloc.reg()),
            Allocation::Empty(reg) => log::trace!("t{id} -> {reg}"),
            Allocation::Reclaimed { reg, victim } => {
                log::trace!("t{id} -> {reg}, reclaimed from dead t{victim}");
            }
            Allocation::Evicted { reg, victim, spill } => {
                if spill {
                    let offset = self.spill_offset(victim)?;
                    self.emit(MachineInst::Sd { rt: reg, base: ZERO, offset });
                    self.spilled.insert(victim);
                    self.spills += 1;
                    log::debug!("spilled t{victim} from {reg} for t{id}");
                } else {
                    log::trace!("t{id} -> {reg}, evicted clean t{victim}");
                }
            }
        }
        self.registers_allocated += 1;
        Ok(alloc.reg())
    }

    fn release_dead(&mut self, instr: &Instruction, pos: usize, live: &Liveness) {
        for arg in instr.args() {
            if let Some(t) = arg.as_temp() {
                if live.dies_at(t, pos) {
                    self.regs.free_temp(t);
                }
            }
        }
        if let Some(t) = instr.result.as_temp() {
            if live.dies_at(t, pos) {
                self.regs.free_temp(t);
            }
        }
    }

    fn store_var(&mut self, name: &str, reg: Reg, line: u32) -> Result<(), CodegenError> {
        let offset = self.var_offset(name, line)?;
        self.emit(MachineInst::Sd { rt: reg, base: ZERO, offset });
        Ok(())
    }

    fn var_offset(&self, name: &str, line: u32) -> Result<i16, CodegenError> {
        let offset = self
            .symbols
            .offset_of(name)
            .ok_or_else(|| CodegenError::UnknownVariable {
                name: name.to_string(),
                line,
            })?;
        displacement(u64::from(offset))
    }

    fn spill_offset(&mut self, id: u32) -> Result<i16, CodegenError> {
        let offset = u64::from(self.config.temp_storage_base) + u64::from(id) * u64::from(SLOT_SIZE);
        let disp = displacement(offset)?;
        self.highest_slot = Some(self.highest_slot.map_or(id, |h| h.max(id)));
        Ok(disp)
    }

    fn emit(&mut self, inst: MachineInst) {
        log::trace!("emit {inst}");
        self.lines.push(format!("    {inst}"));
        self.code.push(inst);
    }

    fn render_assembly(&self) -> String {
        let mut asm = String::from(".data\n");
        for sym in self.symbols.iter() {
            asm.push_str(&format!("{}: .word64 0\n", sym.name));
        }
        if let Some(highest) = self.highest_slot {
            let padding = self.config.temp_storage_base - self.symbols.data_size();
            if padding > 0 {
                asm.push_str(&format!("    .space {padding}\n"));
            }
            asm.push_str(&format!("tmp_storage: .space {}\n", (highest + 1) * SLOT_SIZE));
        }
        asm.push_str(".code\n");
        for line in &self.lines {
            asm.push_str(line);
            asm.push('\n');
        }
        asm
    }
}

fn immediate(value: i64, line: u32) -> Result<i16, CodegenError> {
    imm16(value).map_err(|_| CodegenError::ImmediateOutOfRange { value, line })
}

fn displacement(offset: u64) -> Result<i16, CodegenError> {
    i16::try_from(offset).map_err(|_| CodegenError::OffsetOutOfRange { offset })
}
