//! Addressing modes shared by every opcode kind.
//!
//! An operand names *where* a value lives; [`Operand8::read`] and
//! [`Operand8::write`] resolve it against the register file and the Mmu.
//! Immediates are fetched relative to the opcode byte at PC.

use std::fmt;

use crate::{
    cpu::{Cpu, FLAG_C, FLAG_Z},
    error::EmuError,
    mmu::Mmu,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reg8 {
    A,
    B,
    C,
    D,
    E,
    H,
    L,
}

impl Reg8 {
    pub fn get(self, cpu: &Cpu) -> u8 {
        match self {
            Reg8::A => cpu.a,
            Reg8::B => cpu.b,
            Reg8::C => cpu.c,
            Reg8::D => cpu.d,
            Reg8::E => cpu.e,
            Reg8::H => cpu.h,
            Reg8::L => cpu.l,
        }
    }

    pub fn set(self, cpu: &mut Cpu, value: u8) {
        match self {
            Reg8::A => cpu.a = value,
            Reg8::B => cpu.b = value,
            Reg8::C => cpu.c = value,
            Reg8::D => cpu.d = value,
            Reg8::E => cpu.e = value,
            Reg8::H => cpu.h = value,
            Reg8::L => cpu.l = value,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reg16 {
    AF,
    BC,
    DE,
    HL,
    SP,
}

impl Reg16 {
    pub fn get(self, cpu: &Cpu) -> u16 {
        match self {
            Reg16::AF => cpu.af(),
            Reg16::BC => cpu.bc(),
            Reg16::DE => cpu.de(),
            Reg16::HL => cpu.hl(),
            Reg16::SP => cpu.sp,
        }
    }

    pub fn set(self, cpu: &mut Cpu, value: u16) {
        match self {
            Reg16::AF => cpu.set_af(value),
            Reg16::BC => cpu.set_bc(value),
            Reg16::DE => cpu.set_de(value),
            Reg16::HL => cpu.set_hl(value),
            Reg16::SP => cpu.sp = value,
        }
    }
}

/// Flag predicate used by conditional jumps, calls and returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Condition {
    NZ,
    Z,
    NC,
    C,
}

impl Condition {
    pub fn holds(self, cpu: &Cpu) -> bool {
        match self {
            Condition::NZ => !cpu.flag(FLAG_Z),
            Condition::Z => cpu.flag(FLAG_Z),
            Condition::NC => !cpu.flag(FLAG_C),
            Condition::C => cpu.flag(FLAG_C),
        }
    }
}

/// 8-bit operand.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operand8 {
    Register(Reg8),
    /// n8 at PC+1.
    Immediate,
    AtHl,
    AtBc,
    AtDe,
    /// (HL), then HL += 1.
    AtHlIncrement,
    /// (HL), then HL -= 1.
    AtHlDecrement,
    /// (0xFF00 + C)
    HighC,
    /// (0xFF00 + n8)
    HighImmediate,
    /// (a16)
    AtImmediate,
}

impl Operand8 {
    /// Memory address for indirect modes. Post-increment/decrement modes
    /// update HL here, so call this once per access.
    fn address(self, cpu: &mut Cpu, mmu: &Mmu) -> Option<u16> {
        let addr = match self {
            Operand8::Register(_) | Operand8::Immediate => return None,
            Operand8::AtHl => cpu.hl(),
            Operand8::AtBc => cpu.bc(),
            Operand8::AtDe => cpu.de(),
            Operand8::AtHlIncrement => {
                let hl = cpu.hl();
                cpu.set_hl(hl.wrapping_add(1));
                hl
            }
            Operand8::AtHlDecrement => {
                let hl = cpu.hl();
                cpu.set_hl(hl.wrapping_sub(1));
                hl
            }
            Operand8::HighC => 0xFF00 | cpu.c as u16,
            Operand8::HighImmediate => 0xFF00 | mmu.read_byte(cpu.pc.wrapping_add(1)) as u16,
            Operand8::AtImmediate => mmu.read_word(cpu.pc.wrapping_add(1)),
        };
        Some(addr)
    }

    pub fn read(self, cpu: &mut Cpu, mmu: &Mmu) -> u8 {
        match self {
            Operand8::Register(r) => r.get(cpu),
            Operand8::Immediate => mmu.read_byte(cpu.pc.wrapping_add(1)),
            _ => match self.address(cpu, mmu) {
                Some(addr) => mmu.read_byte(addr),
                None => 0xFF,
            },
        }
    }

    pub fn write(self, cpu: &mut Cpu, mmu: &mut Mmu, value: u8) -> Result<(), EmuError> {
        match self {
            Operand8::Register(r) => r.set(cpu, value),
            Operand8::Immediate => return Err(EmuError::ReadOnlyOperand(self.to_string())),
            _ => {
                if let Some(addr) = self.address(cpu, mmu) {
                    mmu.write_byte(addr, value);
                }
            }
        }
        Ok(())
    }

    /// Memory cost of the addressing mode, used to derive CB-prefixed timings.
    pub fn is_memory(self) -> bool {
        !matches!(self, Operand8::Register(_) | Operand8::Immediate)
    }
}

impl fmt::Display for Operand8 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operand8::Register(r) => write!(f, "{r:?}"),
            Operand8::Immediate => f.write_str("n8"),
            Operand8::AtHl => f.write_str("(HL)"),
            Operand8::AtBc => f.write_str("(BC)"),
            Operand8::AtDe => f.write_str("(DE)"),
            Operand8::AtHlIncrement => f.write_str("(HL+)"),
            Operand8::AtHlDecrement => f.write_str("(HL-)"),
            Operand8::HighC => f.write_str("(C)"),
            Operand8::HighImmediate => f.write_str("(a8)"),
            Operand8::AtImmediate => f.write_str("(a16)"),
        }
    }
}

/// 16-bit operand.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operand16 {
    Register(Reg16),
    /// n16 at PC+1.
    Immediate,
    /// Word at (a16).
    AtImmediate,
    /// SP plus the signed byte at PC+1. Read-only.
    SpPlusSigned,
}

impl Operand16 {
    pub fn read(self, cpu: &Cpu, mmu: &Mmu) -> u16 {
        match self {
            Operand16::Register(r) => r.get(cpu),
            Operand16::Immediate => mmu.read_word(cpu.pc.wrapping_add(1)),
            Operand16::AtImmediate => mmu.read_word(mmu.read_word(cpu.pc.wrapping_add(1))),
            Operand16::SpPlusSigned => {
                let offset = mmu.read_byte(cpu.pc.wrapping_add(1)) as i8;
                cpu.sp.wrapping_add_signed(offset as i16)
            }
        }
    }

    pub fn write(self, cpu: &mut Cpu, mmu: &mut Mmu, value: u16) -> Result<(), EmuError> {
        match self {
            Operand16::Register(r) => r.set(cpu, value),
            Operand16::AtImmediate => {
                let addr = mmu.read_word(cpu.pc.wrapping_add(1));
                mmu.write_word(addr, value);
            }
            Operand16::Immediate | Operand16::SpPlusSigned => {
                return Err(EmuError::ReadOnlyOperand(self.to_string()));
            }
        }
        Ok(())
    }
}

impl fmt::Display for Operand16 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operand16::Register(r) => write!(f, "{r:?}"),
            Operand16::Immediate => f.write_str("n16"),
            Operand16::AtImmediate => f.write_str("(a16)"),
            Operand16::SpPlusSigned => f.write_str("SP+e8"),
        }
    }
}
