// This module provides bit-exact MIPS64 instruction encoding for flexc's code generator. The
// generator only needs a handful of instructions: immediate add, doubleword load and store,
// register add and subtract, multiply and divide through the HI/LO pair, and the move-from-LO
// that reads the quotient or low product back. The adds and subtract are the unsigned forms
// (daddiu, daddu, dsubu), which wrap on overflow instead of trapping. Each is a MachineInst variant that renders as
// one assembly line and encodes to one 32-bit word in either the immediate format (opcode, rs,
// rt, 16-bit signed immediate) or the register format (zero opcode, rs, rt, rd, shift amount,
// function code). `decode` inverts the encoding so emitted words can be checked field by field.
// The register name table follows the standard MIPS ABI naming; the working pool handed to
// the register allocator is $t0-$t7 followed by $s0-$s7, and $t8/$t9 are reserved as scratch
// registers for variable and constant operands.

//! MIPS64 instruction encoding and decoding.

use std::fmt;

use thiserror::Error;

use crate::core::register_file::Reg;

/// Immediate-format opcodes.
pub const OP_DADDIU: u32 = 0x19;
pub const OP_LD: u32 = 0x37;
pub const OP_SD: u32 = 0x3F;

/// Register-format function codes.
pub const FUNCT_DADDU: u32 = 0x2D;
pub const FUNCT_DSUBU: u32 = 0x2F;
pub const FUNCT_DMULT: u32 = 0x1C;
pub const FUNCT_DDIV: u32 = 0x1E;
pub const FUNCT_MFLO: u32 = 0x12;

pub const ZERO: Reg = Reg(0);
/// Scratch register for the first variable/constant operand and variable results.
pub const SCRATCH0: Reg = Reg(24);
/// Scratch register for the second variable/constant operand.
pub const SCRATCH1: Reg = Reg(25);

/// Largest working pool: $t0-$t7 then $s0-$s7.
pub const MAX_WORKING_REGS: usize = 16;

const REG_NAMES: [&str; 32] = [
    "$zero", "$at", "$v0", "$v1", "$a0", "$a1", "$a2", "$a3",
    "$t0", "$t1", "$t2", "$t3", "$t4", "$t5", "$t6", "$t7",
    "$s0", "$s1", "$s2", "$s3", "$s4", "$s5", "$s6", "$s7",
    "$t8", "$t9", "$k0", "$k1", "$gp", "$sp", "$fp", "$ra",
];

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EncodingError {
    #[error("register number {0} out of range")]
    RegisterOutOfRange(u8),

    #[error("immediate {0} does not fit in 16 signed bits")]
    ImmediateOutOfRange(i64),

    #[error("working register pool of {0} is not in 1..=16")]
    InvalidPoolSize(usize),

    #[error("unknown opcode {0:#04x}")]
    UnknownOpcode(u32),

    #[error("unknown function code {0:#04x}")]
    UnknownFunction(u32),
}

impl Reg {
    /// Checked constructor for a hardware register number.
    pub fn new(number: u8) -> Result<Self, EncodingError> {
        if (number as usize) < REG_NAMES.len() {
            Ok(Reg(number))
        } else {
            Err(EncodingError::RegisterOutOfRange(number))
        }
    }

    /// ABI name, e.g. `$t0`.
    pub fn name(self) -> &'static str {
        REG_NAMES[(self.0 & 0x1F) as usize]
    }
}

impl fmt::Display for Reg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// The first `count` working registers.
pub fn working_registers(count: usize) -> Result<Vec<Reg>, EncodingError> {
    if count == 0 || count > MAX_WORKING_REGS {
        return Err(EncodingError::InvalidPoolSize(count));
    }
    // $t0..$t7 are 8..15 and $s0..$s7 are 16..23: one contiguous run.
    Ok((0..count).map(|i| Reg(8 + i as u8)).collect())
}

/// Narrow a value to a signed 16-bit immediate.
pub fn imm16(value: i64) -> Result<i16, EncodingError> {
    i16::try_from(value).map_err(|_| EncodingError::ImmediateOutOfRange(value))
}

/// A single machine instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MachineInst {
    /// `daddiu rt, rs, imm`
    Daddiu { rt: Reg, rs: Reg, imm: i16 },
    /// `ld rt, offset(base)`
    Ld { rt: Reg, base: Reg, offset: i16 },
    /// `sd rt, offset(base)`
    Sd { rt: Reg, base: Reg, offset: i16 },
    /// `daddu rd, rs, rt`
    Daddu { rd: Reg, rs: Reg, rt: Reg },
    /// `dsubu rd, rs, rt`
    Dsubu { rd: Reg, rs: Reg, rt: Reg },
    /// `dmult rs, rt`, product in HI/LO.
    Dmult { rs: Reg, rt: Reg },
    /// `ddiv rs, rt`, quotient in LO.
    Ddiv { rs: Reg, rt: Reg },
    /// `mflo rd`
    Mflo { rd: Reg },
}

fn i_format(op: u32, rs: Reg, rt: Reg, imm: i16) -> u32 {
    (op << 26) | ((rs.0 as u32) << 21) | ((rt.0 as u32) << 16) | (imm as u16 as u32)
}

fn r_format(rs: Reg, rt: Reg, rd: Reg, shamt: u32, funct: u32) -> u32 {
    ((rs.0 as u32) << 21) | ((rt.0 as u32) << 16) | ((rd.0 as u32) << 11) | (shamt << 6) | funct
}

impl MachineInst {
    pub fn mnemonic(&self) -> &'static str {
        match self {
            MachineInst::Daddiu { .. } => "daddiu",
            MachineInst::Ld { .. } => "ld",
            MachineInst::Sd { .. } => "sd",
            MachineInst::Daddu { .. } => "daddu",
            MachineInst::Dsubu { .. } => "dsubu",
            MachineInst::Dmult { .. } => "dmult",
            MachineInst::Ddiv { .. } => "ddiv",
            MachineInst::Mflo { .. } => "mflo",
        }
    }

    /// Register-to-register move, spelled `daddu rd, rs, $zero`.
    pub fn mov(rd: Reg, rs: Reg) -> Self {
        MachineInst::Daddu { rd, rs, rt: ZERO }
    }

    /// Encode into a 32-bit word.
    pub fn encode(&self) -> u32 {
        match *self {
            MachineInst::Daddiu { rt, rs, imm } => i_format(OP_DADDIU, rs, rt, imm),
            MachineInst::Ld { rt, base, offset } => i_format(OP_LD, base, rt, offset),
            MachineInst::Sd { rt, base, offset } => i_format(OP_SD, base, rt, offset),
            MachineInst::Daddu { rd, rs, rt } => r_format(rs, rt, rd, 0, FUNCT_DADDU),
            MachineInst::Dsubu { rd, rs, rt } => r_format(rs, rt, rd, 0, FUNCT_DSUBU),
            MachineInst::Dmult { rs, rt } => r_format(rs, rt, ZERO, 0, FUNCT_DMULT),
            MachineInst::Ddiv { rs, rt } => r_format(rs, rt, ZERO, 0, FUNCT_DDIV),
            MachineInst::Mflo { rd } => r_format(ZERO, ZERO, rd, 0, FUNCT_MFLO),
        }
    }

    /// Decode a word produced by [`MachineInst::encode`].
    pub fn decode(word: u32) -> Result<Self, EncodingError> {
        let op = word >> 26;
        let rs = Reg(((word >> 21) & 0x1F) as u8);
        let rt = Reg(((word >> 16) & 0x1F) as u8);
        let rd = Reg(((word >> 11) & 0x1F) as u8);
        let imm = (word & 0xFFFF) as u16 as i16;

        match op {
            0 => match word & 0x3F {
                FUNCT_DADDU => Ok(MachineInst::Daddu { rd, rs, rt }),
                FUNCT_DSUBU => Ok(MachineInst::Dsubu { rd, rs, rt }),
                FUNCT_DMULT => Ok(MachineInst::Dmult { rs, rt }),
                FUNCT_DDIV => Ok(MachineInst::Ddiv { rs, rt }),
                FUNCT_MFLO => Ok(MachineInst::Mflo { rd }),
                funct => Err(EncodingError::UnknownFunction(funct)),
            },
            OP_DADDIU => Ok(MachineInst::Daddiu { rt, rs, imm }),
            OP_LD => Ok(MachineInst::Ld { rt, base: rs, offset: imm }),
            OP_SD => Ok(MachineInst::Sd { rt, base: rs, offset: imm }),
            other => Err(EncodingError::UnknownOpcode(other)),
        }
    }
}

impl fmt::Display for MachineInst {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let m = self.mnemonic();
        match self {
            MachineInst::Daddiu { rt, rs, imm } => write!(f, "{m} {rt}, {rs}, {imm}"),
            MachineInst::Ld { rt, base, offset } | MachineInst::Sd { rt, base, offset } => {
                write!(f, "{m} {rt}, {offset}({base})")
            }
            MachineInst::Daddu { rd, rs, rt } | MachineInst::Dsubu { rd, rs, rt } => {
                write!(f, "{m} {rd}, {rs}, {rt}")
            }
            MachineInst::Dmult { rs, rt } | MachineInst::Ddiv { rs, rt } => {
                write!(f, "{m} {rs}, {rt}")
            }
            MachineInst::Mflo { rd } => write!(f, "{m} {rd}"),
        }
    }
}

/// `0xXXXXXXXX`, upper case.
pub fn to_hex(word: u32) -> String {
    format!("0x{word:08X}")
}

/// 32 characters of `0`/`1`.
pub fn to_binary(word: u32) -> String {
    format!("{word:032b}")
}
