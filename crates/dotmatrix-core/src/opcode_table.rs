//! The 256 primary and 256 CB-prefixed dispatch entries.
//!
//! Entries are decoded from the opcode bit fields (`xx yyy zzz`, see
//! gbdev.io/gb-opcodes) once at construction and checked so that every
//! valid slot holds the opcode its index names.

use log::debug;

use crate::{
    error::EmuError,
    mmu::Mmu,
    opcode::{A, OpCode, OpKind},
    operand::{Condition, Operand8, Operand16, Reg8, Reg16},
};

pub const PREFIX: u8 = 0xCB;

/// Base T-cycles per primary opcode; conditional entries hold the
/// not-taken cost. Unofficial slots are 0.
#[rustfmt::skip]
const PRIMARY_CYCLES: [u8; 256] = [
//  x0  x1  x2  x3  x4  x5  x6  x7  x8  x9  xA  xB  xC  xD  xE  xF
     4, 12,  8,  8,  4,  4,  8,  4, 20,  8,  8,  8,  4,  4,  8,  4, // 0x
     4, 12,  8,  8,  4,  4,  8,  4, 12,  8,  8,  8,  4,  4,  8,  4, // 1x
     8, 12,  8,  8,  4,  4,  8,  4,  8,  8,  8,  8,  4,  4,  8,  4, // 2x
     8, 12,  8,  8, 12, 12, 12,  4,  8,  8,  8,  8,  4,  4,  8,  4, // 3x
     4,  4,  4,  4,  4,  4,  8,  4,  4,  4,  4,  4,  4,  4,  8,  4, // 4x
     4,  4,  4,  4,  4,  4,  8,  4,  4,  4,  4,  4,  4,  4,  8,  4, // 5x
     4,  4,  4,  4,  4,  4,  8,  4,  4,  4,  4,  4,  4,  4,  8,  4, // 6x
     8,  8,  8,  8,  8,  8,  4,  8,  4,  4,  4,  4,  4,  4,  8,  4, // 7x
     4,  4,  4,  4,  4,  4,  8,  4,  4,  4,  4,  4,  4,  4,  8,  4, // 8x
     4,  4,  4,  4,  4,  4,  8,  4,  4,  4,  4,  4,  4,  4,  8,  4, // 9x
     4,  4,  4,  4,  4,  4,  8,  4,  4,  4,  4,  4,  4,  4,  8,  4, // Ax
     4,  4,  4,  4,  4,  4,  8,  4,  4,  4,  4,  4,  4,  4,  8,  4, // Bx
     8, 12, 12, 16, 12, 16,  8, 16,  8, 16, 12,  4, 12, 24,  8, 16, // Cx
     8, 12, 12,  0, 12, 16,  8, 16,  8, 16, 12,  0, 12,  0,  8, 16, // Dx
    12, 12,  8,  0,  0, 16,  8, 16, 16,  4, 16,  0,  0,  0,  8, 16, // Ex
    12, 12,  8,  4,  0, 16,  8, 16, 12,  8, 16,  4,  0,  0,  8, 16, // Fx
];

const R: [Operand8; 8] = [
    Operand8::Register(Reg8::B),
    Operand8::Register(Reg8::C),
    Operand8::Register(Reg8::D),
    Operand8::Register(Reg8::E),
    Operand8::Register(Reg8::H),
    Operand8::Register(Reg8::L),
    Operand8::AtHl,
    A,
];
const RP: [Reg16; 4] = [Reg16::BC, Reg16::DE, Reg16::HL, Reg16::SP];
const RP2: [Reg16; 4] = [Reg16::BC, Reg16::DE, Reg16::HL, Reg16::AF];
const CC: [Condition; 4] = [Condition::NZ, Condition::Z, Condition::NC, Condition::C];

/// Immutable dispatch tables.
pub struct OpCodeTable {
    primary: Box<[OpCode; 256]>,
    prefixed: Box<[OpCode; 256]>,
}

impl OpCodeTable {
    pub fn new() -> Result<Self, EmuError> {
        let primary: Box<[OpCode; 256]> =
            Box::new(std::array::from_fn(|i| decode_primary(i as u8)));
        let prefixed: Box<[OpCode; 256]> =
            Box::new(std::array::from_fn(|i| decode_prefixed(i as u8)));
        let table = Self { primary, prefixed };
        table.verify()?;
        debug!("Opcode tables ready");
        Ok(table)
    }

    /// Every non-placeholder slot must carry its own index as id.
    pub fn verify(&self) -> Result<(), EmuError> {
        for entries in [&self.primary, &self.prefixed] {
            for (index, op) in entries.iter().enumerate() {
                if op.kind != OpKind::Invalid && op.id as usize != index {
                    return Err(EmuError::OpcodeTableMismatch {
                        index: index as u8,
                        id: op.id,
                    });
                }
            }
        }
        Ok(())
    }

    pub fn primary(&self, opcode: u8) -> &OpCode {
        &self.primary[opcode as usize]
    }

    pub fn prefixed(&self, opcode: u8) -> &OpCode {
        &self.prefixed[opcode as usize]
    }

    /// Decode the instruction at `pc`, following the CB prefix.
    pub fn fetch(&self, mmu: &Mmu, pc: u16) -> &OpCode {
        let opcode = mmu.read_byte(pc);
        if opcode == PREFIX {
            self.prefixed(mmu.read_byte(pc.wrapping_add(1)))
        } else {
            self.primary(opcode)
        }
    }

    #[cfg(test)]
    fn primary_mut(&mut self) -> &mut [OpCode; 256] {
        &mut self.primary
    }
}

fn entry(id: u8, length: u8, kind: OpKind) -> OpCode {
    OpCode {
        id,
        prefixed: false,
        length,
        cycles: PRIMARY_CYCLES[id as usize],
        kind,
    }
}

fn decode_primary(op: u8) -> OpCode {
    let x = op >> 6;
    let y = (op >> 3) & 7;
    let z = op & 7;
    let p = (y >> 1) as usize;
    let q = y & 1;

    let (length, kind) = match (x, z) {
        (0, 0) => match y {
            0 => (1, OpKind::Nop),
            1 => (3, OpKind::Load16(Operand16::AtImmediate, Operand16::Register(Reg16::SP))),
            2 => (2, OpKind::Stop),
            3 => (2, OpKind::JumpRelative(None)),
            _ => (2, OpKind::JumpRelative(Some(CC[(y - 4) as usize]))),
        },
        (0, 1) if q == 0 => (3, OpKind::Load16(Operand16::Register(RP[p]), Operand16::Immediate)),
        (0, 1) => (1, OpKind::AddWord(RP[p])),
        (0, 2) => {
            let mem = [
                Operand8::AtBc,
                Operand8::AtDe,
                Operand8::AtHlIncrement,
                Operand8::AtHlDecrement,
            ][p];
            if q == 0 {
                (1, OpKind::Load8(mem, A))
            } else {
                (1, OpKind::Load8(A, mem))
            }
        }
        (0, 3) if q == 0 => (1, OpKind::IncrementWord(RP[p])),
        (0, 3) => (1, OpKind::DecrementWord(RP[p])),
        (0, 4) => (1, OpKind::IncrementByte(R[y as usize])),
        (0, 5) => (1, OpKind::DecrementByte(R[y as usize])),
        (0, 6) => (2, OpKind::Load8(R[y as usize], Operand8::Immediate)),
        (0, _) => (
            1,
            [
                OpKind::RotateLeftCarryA,
                OpKind::RotateRightCarryA,
                OpKind::RotateLeftA,
                OpKind::RotateRightA,
                OpKind::DecimalAdjust,
                OpKind::Complement,
                OpKind::SetCarry,
                OpKind::ComplementCarry,
            ][y as usize],
        ),

        (1, 6) if y == 6 => (1, OpKind::Halt),
        (1, _) => (1, OpKind::Load8(R[y as usize], R[z as usize])),

        (2, _) => (1, alu(y, R[z as usize])),

        (3, 0) => match y {
            0..=3 => (1, OpKind::Return(Some(CC[y as usize]))),
            4 => (2, OpKind::Load8(Operand8::HighImmediate, A)),
            5 => (2, OpKind::AddSpSigned),
            6 => (2, OpKind::Load8(A, Operand8::HighImmediate)),
            _ => (2, OpKind::LoadHlSpOffset),
        },
        (3, 1) if q == 0 => (1, OpKind::Pop(RP2[p])),
        (3, 1) => match p {
            0 => (1, OpKind::Return(None)),
            1 => (1, OpKind::ReturnInterrupt),
            2 => (1, OpKind::JumpHl),
            _ => (
                1,
                OpKind::Load16(Operand16::Register(Reg16::SP), Operand16::Register(Reg16::HL)),
            ),
        },
        (3, 2) => match y {
            0..=3 => (3, OpKind::Jump(Some(CC[y as usize]))),
            4 => (1, OpKind::Load8(Operand8::HighC, A)),
            5 => (3, OpKind::Load8(Operand8::AtImmediate, A)),
            6 => (1, OpKind::Load8(A, Operand8::HighC)),
            _ => (3, OpKind::Load8(A, Operand8::AtImmediate)),
        },
        (3, 3) => match y {
            0 => (3, OpKind::Jump(None)),
            1 => (2, OpKind::Prefix),
            6 => (1, OpKind::DisableInterrupts),
            7 => (1, OpKind::EnableInterrupts),
            _ => (1, OpKind::Invalid),
        },
        (3, 4) if y < 4 => (3, OpKind::Call(Some(CC[y as usize]))),
        (3, 5) if q == 0 => (1, OpKind::Push(RP2[p])),
        (3, 5) if p == 0 => (3, OpKind::Call(None)),
        (3, 6) => (2, alu(y, Operand8::Immediate)),
        (3, 7) => (1, OpKind::Restart(y * 8)),
        _ => (1, OpKind::Invalid),
    };

    entry(op, length, kind)
}

fn alu(y: u8, src: Operand8) -> OpKind {
    match y {
        0 => OpKind::AddByte(src),
        1 => OpKind::AddCarryByte(src),
        2 => OpKind::SubtractByte(src),
        3 => OpKind::SubtractCarryByte(src),
        4 => OpKind::AndByte(src),
        5 => OpKind::XorByte(src),
        6 => OpKind::OrByte(src),
        _ => OpKind::CompareByte(src),
    }
}

fn decode_prefixed(op: u8) -> OpCode {
    let x = op >> 6;
    let y = (op >> 3) & 7;
    let target = R[(op & 7) as usize];

    let kind = match x {
        0 => [
            OpKind::RotateLeftCarry(target),
            OpKind::RotateRightCarry(target),
            OpKind::RotateLeft(target),
            OpKind::RotateRight(target),
            OpKind::ShiftLeftArithmetic(target),
            OpKind::ShiftRightArithmetic(target),
            OpKind::Swap(target),
            OpKind::ShiftRightLogical(target),
        ][y as usize],
        1 => OpKind::Bit(y, target),
        2 => OpKind::Reset(y, target),
        _ => OpKind::Set(y, target),
    };

    let cycles = match (target.is_memory(), x) {
        (false, _) => 8,
        (true, 1) => 12,
        (true, _) => 16,
    };

    OpCode {
        id: op,
        prefixed: true,
        length: 2,
        cycles,
        kind,
    }
}
