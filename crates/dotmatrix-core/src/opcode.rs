//! Instruction semantics.
//!
//! Every SM83 instruction is one [`OpKind`] variant bound to its operands.
//! [`OpCode::execute`] applies it to the register file and the Mmu and
//! reports how many cycles it took and whether the scheduler should advance
//! PC by the instruction length.

use std::fmt;

use crate::{
    cpu::{Cpu, FLAG_C, FLAG_H, FLAG_N, FLAG_Z, PendingAction},
    error::EmuError,
    mmu::Mmu,
    operand::{Condition, Operand8, Operand16, Reg8, Reg16},
};

/// Accumulator operand.
pub const A: Operand8 = Operand8::Register(Reg8::A);

/// Instruction kind with its operand bindings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpKind {
    Nop,
    Halt,
    Stop,
    DisableInterrupts,
    EnableInterrupts,

    Load8(Operand8, Operand8),
    Load16(Operand16, Operand16),
    /// LD HL,SP+e8
    LoadHlSpOffset,
    Push(Reg16),
    Pop(Reg16),

    AddByte(Operand8),
    AddCarryByte(Operand8),
    SubtractByte(Operand8),
    SubtractCarryByte(Operand8),
    AndByte(Operand8),
    XorByte(Operand8),
    OrByte(Operand8),
    CompareByte(Operand8),
    IncrementByte(Operand8),
    DecrementByte(Operand8),

    /// ADD HL,rr
    AddWord(Reg16),
    /// ADD SP,e8
    AddSpSigned,
    IncrementWord(Reg16),
    DecrementWord(Reg16),

    RotateLeftCarryA,
    RotateRightCarryA,
    RotateLeftA,
    RotateRightA,
    DecimalAdjust,
    Complement,
    SetCarry,
    ComplementCarry,

    Jump(Option<Condition>),
    JumpHl,
    JumpRelative(Option<Condition>),
    Call(Option<Condition>),
    Return(Option<Condition>),
    ReturnInterrupt,
    Restart(u8),

    /// 0xCB; resolved by the table before execution.
    Prefix,

    RotateLeftCarry(Operand8),
    RotateRightCarry(Operand8),
    RotateLeft(Operand8),
    RotateRight(Operand8),
    ShiftLeftArithmetic(Operand8),
    ShiftRightArithmetic(Operand8),
    Swap(Operand8),
    ShiftRightLogical(Operand8),
    Bit(u8, Operand8),
    Reset(u8, Operand8),
    Set(u8, Operand8),

    Invalid,
}

/// Outcome of one instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OpCodeResult {
    pub cycles: u32,
    pub length: u16,
    /// False when the instruction already set PC itself.
    pub move_program_counter: bool,
    pub stop_requested: bool,
}

/// One dispatch table entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OpCode {
    pub id: u8,
    pub prefixed: bool,
    pub length: u8,
    /// Base cost; conditional control flow adds to it when taken.
    pub cycles: u8,
    pub kind: OpKind,
}

// Extra cost of a taken branch over the not-taken base in the table.
const JUMP_TAKEN_EXTRA: u32 = 4;
const JUMP_RELATIVE_TAKEN_EXTRA: u32 = 4;
const CALL_TAKEN_EXTRA: u32 = 12;
const RETURN_TAKEN_EXTRA: u32 = 12;

impl OpCode {
    pub fn execute(&self, cpu: &mut Cpu, mmu: &mut Mmu) -> Result<OpCodeResult, EmuError> {
        let mut result = OpCodeResult {
            cycles: self.cycles as u32,
            length: self.length as u16,
            move_program_counter: true,
            stop_requested: false,
        };

        match self.kind {
            OpKind::Nop => {}
            OpKind::Halt => cpu.halted = true,
            OpKind::Stop => {
                cpu.halted = true;
                result.stop_requested = true;
            }
            OpKind::DisableInterrupts => {
                cpu.ime = false;
                cpu.pending = PendingAction::None;
            }
            OpKind::EnableInterrupts => cpu.pending = PendingAction::EnableInterrupts,

            OpKind::Load8(dst, src) => {
                let v = src.read(cpu, mmu);
                dst.write(cpu, mmu, v)?;
            }
            OpKind::Load16(dst, src) => {
                let v = src.read(cpu, mmu);
                dst.write(cpu, mmu, v)?;
            }
            OpKind::LoadHlSpOffset => {
                let v = add_sp_signed(cpu, mmu);
                cpu.set_hl(v);
            }
            OpKind::Push(reg) => {
                let v = reg.get(cpu);
                push(cpu, mmu, v);
            }
            OpKind::Pop(reg) => {
                let v = pop(cpu, mmu);
                reg.set(cpu, v);
            }

            OpKind::AddByte(src) => {
                let v = src.read(cpu, mmu);
                let a = cpu.a;
                cpu.a = add8(cpu, a, v, false);
            }
            OpKind::AddCarryByte(src) => {
                let v = src.read(cpu, mmu);
                let carry = cpu.flag(FLAG_C);
                let a = cpu.a;
                cpu.a = add8(cpu, a, v, carry);
            }
            OpKind::SubtractByte(src) => {
                let v = src.read(cpu, mmu);
                let a = cpu.a;
                cpu.a = sub8(cpu, a, v, false);
            }
            OpKind::SubtractCarryByte(src) => {
                let v = src.read(cpu, mmu);
                let carry = cpu.flag(FLAG_C);
                let a = cpu.a;
                cpu.a = sub8(cpu, a, v, carry);
            }
            OpKind::AndByte(src) => {
                let v = src.read(cpu, mmu);
                cpu.a &= v;
                cpu.set_flags(cpu.a == 0, false, true, false);
            }
            OpKind::XorByte(src) => {
                let v = src.read(cpu, mmu);
                cpu.a ^= v;
                cpu.set_flags(cpu.a == 0, false, false, false);
            }
            OpKind::OrByte(src) => {
                let v = src.read(cpu, mmu);
                cpu.a |= v;
                cpu.set_flags(cpu.a == 0, false, false, false);
            }
            OpKind::CompareByte(src) => {
                let v = src.read(cpu, mmu);
                let a = cpu.a;
                sub8(cpu, a, v, false);
            }
            OpKind::IncrementByte(target) => {
                let v = target.read(cpu, mmu);
                let r = v.wrapping_add(1);
                cpu.set_flag(FLAG_Z, r == 0);
                cpu.set_flag(FLAG_N, false);
                cpu.set_flag(FLAG_H, v & 0x0F == 0x0F);
                target.write(cpu, mmu, r)?;
            }
            OpKind::DecrementByte(target) => {
                let v = target.read(cpu, mmu);
                let r = v.wrapping_sub(1);
                cpu.set_flag(FLAG_Z, r == 0);
                cpu.set_flag(FLAG_N, true);
                cpu.set_flag(FLAG_H, v & 0x0F == 0);
                target.write(cpu, mmu, r)?;
            }

            OpKind::AddWord(src) => {
                let hl = cpu.hl();
                let v = src.get(cpu);
                let (r, carry) = hl.overflowing_add(v);
                cpu.set_flag(FLAG_N, false);
                cpu.set_flag(FLAG_H, (hl & 0x0FFF) + (v & 0x0FFF) > 0x0FFF);
                cpu.set_flag(FLAG_C, carry);
                cpu.set_hl(r);
            }
            OpKind::AddSpSigned => cpu.sp = add_sp_signed(cpu, mmu),
            OpKind::IncrementWord(reg) => {
                let v = reg.get(cpu).wrapping_add(1);
                reg.set(cpu, v);
            }
            OpKind::DecrementWord(reg) => {
                let v = reg.get(cpu).wrapping_sub(1);
                reg.set(cpu, v);
            }

            OpKind::RotateLeftCarryA => {
                let a = cpu.a;
                cpu.a = rlc(cpu, a);
                cpu.set_flag(FLAG_Z, false);
            }
            OpKind::RotateRightCarryA => {
                let a = cpu.a;
                cpu.a = rrc(cpu, a);
                cpu.set_flag(FLAG_Z, false);
            }
            OpKind::RotateLeftA => {
                let a = cpu.a;
                cpu.a = rl(cpu, a);
                cpu.set_flag(FLAG_Z, false);
            }
            OpKind::RotateRightA => {
                let a = cpu.a;
                cpu.a = rr(cpu, a);
                cpu.set_flag(FLAG_Z, false);
            }
            OpKind::DecimalAdjust => daa(cpu),
            OpKind::Complement => {
                cpu.a = !cpu.a;
                cpu.set_flag(FLAG_N, true);
                cpu.set_flag(FLAG_H, true);
            }
            OpKind::SetCarry => {
                cpu.set_flag(FLAG_N, false);
                cpu.set_flag(FLAG_H, false);
                cpu.set_flag(FLAG_C, true);
            }
            OpKind::ComplementCarry => {
                let c = cpu.flag(FLAG_C);
                cpu.set_flag(FLAG_N, false);
                cpu.set_flag(FLAG_H, false);
                cpu.set_flag(FLAG_C, !c);
            }

            OpKind::Jump(cond) => {
                if taken(cpu, cond) {
                    cpu.pc = mmu.read_word(cpu.pc.wrapping_add(1));
                    result.move_program_counter = false;
                    if cond.is_some() {
                        result.cycles += JUMP_TAKEN_EXTRA;
                    }
                }
            }
            OpKind::JumpHl => {
                cpu.pc = cpu.hl();
                result.move_program_counter = false;
            }
            OpKind::JumpRelative(cond) => {
                if taken(cpu, cond) {
                    // The scheduler still adds the length afterwards, which
                    // lands on PC + 2 + e.
                    let offset = mmu.read_byte(cpu.pc.wrapping_add(1)) as i8;
                    cpu.pc = cpu.pc.wrapping_add_signed(offset as i16);
                    if cond.is_some() {
                        result.cycles += JUMP_RELATIVE_TAKEN_EXTRA;
                    }
                }
            }
            OpKind::Call(cond) => {
                if taken(cpu, cond) {
                    let target = mmu.read_word(cpu.pc.wrapping_add(1));
                    let ret = cpu.pc.wrapping_add(self.length as u16);
                    push(cpu, mmu, ret);
                    cpu.pc = target;
                    result.move_program_counter = false;
                    if cond.is_some() {
                        result.cycles += CALL_TAKEN_EXTRA;
                    }
                }
            }
            OpKind::Return(cond) => {
                if taken(cpu, cond) {
                    cpu.pc = pop(cpu, mmu);
                    result.move_program_counter = false;
                    if cond.is_some() {
                        result.cycles += RETURN_TAKEN_EXTRA;
                    }
                }
            }
            OpKind::ReturnInterrupt => {
                cpu.pc = pop(cpu, mmu);
                cpu.ime = true;
                result.move_program_counter = false;
            }
            OpKind::Restart(vector) => {
                let ret = cpu.pc.wrapping_add(self.length as u16);
                push(cpu, mmu, ret);
                cpu.pc = vector as u16;
                result.move_program_counter = false;
            }

            OpKind::RotateLeftCarry(t) => modify(cpu, mmu, t, rlc)?,
            OpKind::RotateRightCarry(t) => modify(cpu, mmu, t, rrc)?,
            OpKind::RotateLeft(t) => modify(cpu, mmu, t, rl)?,
            OpKind::RotateRight(t) => modify(cpu, mmu, t, rr)?,
            OpKind::ShiftLeftArithmetic(t) => modify(cpu, mmu, t, sla)?,
            OpKind::ShiftRightArithmetic(t) => modify(cpu, mmu, t, sra)?,
            OpKind::Swap(t) => modify(cpu, mmu, t, swap)?,
            OpKind::ShiftRightLogical(t) => modify(cpu, mmu, t, srl)?,
            OpKind::Bit(bit, src) => {
                let v = src.read(cpu, mmu);
                cpu.set_flag(FLAG_Z, v & (1 << bit) == 0);
                cpu.set_flag(FLAG_N, false);
                cpu.set_flag(FLAG_H, true);
            }
            OpKind::Reset(bit, t) => {
                let v = t.read(cpu, mmu) & !(1 << bit);
                t.write(cpu, mmu, v)?;
            }
            OpKind::Set(bit, t) => {
                let v = t.read(cpu, mmu) | (1 << bit);
                t.write(cpu, mmu, v)?;
            }

            OpKind::Prefix | OpKind::Invalid => {
                return Err(EmuError::InvalidOpcode {
                    opcode: self.id,
                    prefixed: self.prefixed,
                    pc: cpu.pc,
                });
            }
        }

        Ok(result)
    }

    pub fn mnemonic(&self) -> String {
        self.kind.to_string()
    }
}

#[inline]
fn taken(cpu: &Cpu, cond: Option<Condition>) -> bool {
    cond.is_none_or(|c| c.holds(cpu))
}

/// Push a word; shared with interrupt dispatch.
pub fn push(cpu: &mut Cpu, mmu: &mut Mmu, value: u16) {
    cpu.sp = cpu.sp.wrapping_sub(2);
    mmu.write_word(cpu.sp, value);
}

fn pop(cpu: &mut Cpu, mmu: &Mmu) -> u16 {
    let v = mmu.read_word(cpu.sp);
    cpu.sp = cpu.sp.wrapping_add(2);
    v
}

fn add8(cpu: &mut Cpu, a: u8, b: u8, carry: bool) -> u8 {
    let c = carry as u8;
    let r = a as u16 + b as u16 + c as u16;
    let half = (a & 0x0F) + (b & 0x0F) + c > 0x0F;
    let r8 = r as u8;
    cpu.set_flags(r8 == 0, false, half, r > 0xFF);
    r8
}

fn sub8(cpu: &mut Cpu, a: u8, b: u8, carry: bool) -> u8 {
    let c = carry as u8;
    let r = a.wrapping_sub(b).wrapping_sub(c);
    let half = (a & 0x0F) < (b & 0x0F) + c;
    let borrow = (a as u16) < b as u16 + c as u16;
    cpu.set_flags(r == 0, true, half, borrow);
    r
}

/// SP + e8 with the flags both ADD SP,e8 and LD HL,SP+e8 produce.
fn add_sp_signed(cpu: &mut Cpu, mmu: &Mmu) -> u16 {
    let raw = mmu.read_byte(cpu.pc.wrapping_add(1));
    let sp = cpu.sp;
    let half = (sp & 0x000F) + (raw as u16 & 0x000F) > 0x000F;
    let carry = (sp & 0x00FF) + raw as u16 > 0x00FF;
    cpu.set_flags(false, false, half, carry);
    sp.wrapping_add_signed(raw as i8 as i16)
}

fn daa(cpu: &mut Cpu) {
    let mut a = cpu.a;
    let mut carry = cpu.flag(FLAG_C);
    let mut adjust = 0u8;
    if !cpu.flag(FLAG_N) {
        if carry || a > 0x99 {
            adjust |= 0x60;
            carry = true;
        }
        if cpu.flag(FLAG_H) || a & 0x0F > 0x09 {
            adjust |= 0x06;
        }
        a = a.wrapping_add(adjust);
    } else {
        if carry {
            adjust |= 0x60;
        }
        if cpu.flag(FLAG_H) {
            adjust |= 0x06;
        }
        a = a.wrapping_sub(adjust);
    }
    cpu.a = a;
    cpu.set_flag(FLAG_Z, a == 0);
    cpu.set_flag(FLAG_H, false);
    cpu.set_flag(FLAG_C, carry);
}

/// Read-modify-write through `target` using a CB-style shifter.
fn modify(
    cpu: &mut Cpu,
    mmu: &mut Mmu,
    target: Operand8,
    op: fn(&mut Cpu, u8) -> u8,
) -> Result<(), EmuError> {
    let v = target.read(cpu, mmu);
    let r = op(cpu, v);
    target.write(cpu, mmu, r)
}

// Shifters set Z from the result; the accumulator forms clear it afterwards.

fn rlc(cpu: &mut Cpu, v: u8) -> u8 {
    let r = v.rotate_left(1);
    cpu.set_flags(r == 0, false, false, v & 0x80 != 0);
    r
}

fn rrc(cpu: &mut Cpu, v: u8) -> u8 {
    let r = v.rotate_right(1);
    cpu.set_flags(r == 0, false, false, v & 0x01 != 0);
    r
}

fn rl(cpu: &mut Cpu, v: u8) -> u8 {
    let r = (v << 1) | cpu.flag(FLAG_C) as u8;
    cpu.set_flags(r == 0, false, false, v & 0x80 != 0);
    r
}

fn rr(cpu: &mut Cpu, v: u8) -> u8 {
    let r = (v >> 1) | ((cpu.flag(FLAG_C) as u8) << 7);
    cpu.set_flags(r == 0, false, false, v & 0x01 != 0);
    r
}

fn sla(cpu: &mut Cpu, v: u8) -> u8 {
    let r = v << 1;
    cpu.set_flags(r == 0, false, false, v & 0x80 != 0);
    r
}

fn sra(cpu: &mut Cpu, v: u8) -> u8 {
    let r = (v >> 1) | (v & 0x80);
    cpu.set_flags(r == 0, false, false, v & 0x01 != 0);
    r
}

fn swap(cpu: &mut Cpu, v: u8) -> u8 {
    let r = v.rotate_left(4);
    cpu.set_flags(r == 0, false, false, false);
    r
}

fn srl(cpu: &mut Cpu, v: u8) -> u8 {
    let r = v >> 1;
    cpu.set_flags(r == 0, false, false, v & 0x01 != 0);
    r
}

fn cond_suffix(cond: &Option<Condition>) -> String {
    match cond {
        Some(c) => format!(" {c:?},"),
        None => String::new(),
    }
}

impl fmt::Display for OpKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OpKind::Nop => f.write_str("NOP"),
            OpKind::Halt => f.write_str("HALT"),
            OpKind::Stop => f.write_str("STOP"),
            OpKind::DisableInterrupts => f.write_str("DI"),
            OpKind::EnableInterrupts => f.write_str("EI"),
            OpKind::Load8(d, s) => write!(f, "LD {d},{s}"),
            OpKind::Load16(d, s) => write!(f, "LD {d},{s}"),
            OpKind::LoadHlSpOffset => f.write_str("LD HL,SP+e8"),
            OpKind::Push(r) => write!(f, "PUSH {r:?}"),
            OpKind::Pop(r) => write!(f, "POP {r:?}"),
            OpKind::AddByte(s) => write!(f, "ADD A,{s}"),
            OpKind::AddCarryByte(s) => write!(f, "ADC A,{s}"),
            OpKind::SubtractByte(s) => write!(f, "SUB A,{s}"),
            OpKind::SubtractCarryByte(s) => write!(f, "SBC A,{s}"),
            OpKind::AndByte(s) => write!(f, "AND A,{s}"),
            OpKind::XorByte(s) => write!(f, "XOR A,{s}"),
            OpKind::OrByte(s) => write!(f, "OR A,{s}"),
            OpKind::CompareByte(s) => write!(f, "CP A,{s}"),
            OpKind::IncrementByte(t) => write!(f, "INC {t}"),
            OpKind::DecrementByte(t) => write!(f, "DEC {t}"),
            OpKind::AddWord(r) => write!(f, "ADD HL,{r:?}"),
            OpKind::AddSpSigned => f.write_str("ADD SP,e8"),
            OpKind::IncrementWord(r) => write!(f, "INC {r:?}"),
            OpKind::DecrementWord(r) => write!(f, "DEC {r:?}"),
            OpKind::RotateLeftCarryA => f.write_str("RLCA"),
            OpKind::RotateRightCarryA => f.write_str("RRCA"),
            OpKind::RotateLeftA => f.write_str("RLA"),
            OpKind::RotateRightA => f.write_str("RRA"),
            OpKind::DecimalAdjust => f.write_str("DAA"),
            OpKind::Complement => f.write_str("CPL"),
            OpKind::SetCarry => f.write_str("SCF"),
            OpKind::ComplementCarry => f.write_str("CCF"),
            OpKind::Jump(c) => write!(f, "JP{} a16", cond_suffix(c)),
            OpKind::JumpHl => f.write_str("JP HL"),
            OpKind::JumpRelative(c) => write!(f, "JR{} e8", cond_suffix(c)),
            OpKind::Call(c) => write!(f, "CALL{} a16", cond_suffix(c)),
            OpKind::Return(Some(c)) => write!(f, "RET {c:?}"),
            OpKind::Return(None) => f.write_str("RET"),
            OpKind::ReturnInterrupt => f.write_str("RETI"),
            OpKind::Restart(v) => write!(f, "RST ${v:02X}"),
            OpKind::Prefix => f.write_str("PREFIX"),
            OpKind::RotateLeftCarry(t) => write!(f, "RLC {t}"),
            OpKind::RotateRightCarry(t) => write!(f, "RRC {t}"),
            OpKind::RotateLeft(t) => write!(f, "RL {t}"),
            OpKind::RotateRight(t) => write!(f, "RR {t}"),
            OpKind::ShiftLeftArithmetic(t) => write!(f, "SLA {t}"),
            OpKind::ShiftRightArithmetic(t) => write!(f, "SRA {t}"),
            OpKind::Swap(t) => write!(f, "SWAP {t}"),
            OpKind::ShiftRightLogical(t) => write!(f, "SRL {t}"),
            OpKind::Bit(b, t) => write!(f, "BIT {b},{t}"),
            OpKind::Reset(b, t) => write!(f, "RES {b},{t}"),
            OpKind::Set(b, t) => write!(f, "SET {b},{t}"),
            OpKind::Invalid => f.write_str("INVALID"),
        }
    }
}
