//! SM83 register file.
//!
//! Instruction semantics live in [`crate::opcode`]; this module only owns the
//! registers, the flag bits and the small amount of control state the
//! scheduler needs (halt, IME, the deferred EI slot).

use std::fmt;

// CPU flag bits as documented in gbdev.io/pandocs/The_CPU_Flags.html
pub const FLAG_Z: u8 = 0x80; // Zero
pub const FLAG_N: u8 = 0x40; // Subtract
pub const FLAG_H: u8 = 0x20; // Half Carry
pub const FLAG_C: u8 = 0x10; // Carry

// Post-boot DMG register state from gbdev.io/pandocs/Power_Up_State.html
const BOOT_A: u8 = 0x01;
const BOOT_F: u8 = 0xB0;
const BOOT_B: u8 = 0x00;
const BOOT_C: u8 = 0x13;
const BOOT_D: u8 = 0x00;
const BOOT_E: u8 = 0xD8;
const BOOT_H: u8 = 0x01;
const BOOT_L: u8 = 0x4D;
const BOOT_PC: u16 = 0x0100;
const BOOT_SP: u16 = 0xFFFE;

/// Work deferred to the start of the next scheduler step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PendingAction {
    #[default]
    None,
    /// EI was executed; IME turns on once the following instruction starts.
    EnableInterrupts,
}

#[derive(Debug, Clone)]
pub struct Cpu {
    pub a: u8,
    pub f: u8,
    pub b: u8,
    pub c: u8,
    pub d: u8,
    pub e: u8,
    pub h: u8,
    pub l: u8,
    pub pc: u16,
    pub sp: u16,
    /// Interrupt master enable.
    pub ime: bool,
    pub halted: bool,
    pub pending: PendingAction,
}

impl Cpu {
    /// Power-on state, meant to be paired with a mapped boot image.
    pub fn new() -> Self {
        Self {
            a: 0,
            f: 0,
            b: 0,
            c: 0,
            d: 0,
            e: 0,
            h: 0,
            l: 0,
            pc: 0x0000,
            sp: BOOT_SP,
            ime: false,
            halted: false,
            pending: PendingAction::None,
        }
    }

    /// Register state the DMG boot ROM leaves behind when it hands over to
    /// the cartridge at 0x0100.
    pub fn new_post_boot() -> Self {
        Self {
            a: BOOT_A,
            f: BOOT_F,
            b: BOOT_B,
            c: BOOT_C,
            d: BOOT_D,
            e: BOOT_E,
            h: BOOT_H,
            l: BOOT_L,
            pc: BOOT_PC,
            sp: BOOT_SP,
            ime: false,
            halted: false,
            pending: PendingAction::None,
        }
    }

    pub fn af(&self) -> u16 {
        ((self.a as u16) << 8) | self.f as u16
    }

    /// The low nibble of F does not exist in hardware and always reads 0.
    pub fn set_af(&mut self, val: u16) {
        self.a = (val >> 8) as u8;
        self.f = (val as u8) & 0xF0;
    }

    pub fn bc(&self) -> u16 {
        ((self.b as u16) << 8) | self.c as u16
    }

    pub fn set_bc(&mut self, val: u16) {
        self.b = (val >> 8) as u8;
        self.c = val as u8;
    }

    pub fn de(&self) -> u16 {
        ((self.d as u16) << 8) | self.e as u16
    }

    pub fn set_de(&mut self, val: u16) {
        self.d = (val >> 8) as u8;
        self.e = val as u8;
    }

    pub fn hl(&self) -> u16 {
        ((self.h as u16) << 8) | self.l as u16
    }

    pub fn set_hl(&mut self, val: u16) {
        self.h = (val >> 8) as u8;
        self.l = val as u8;
    }

    #[inline]
    pub fn flag(&self, mask: u8) -> bool {
        self.f & mask != 0
    }

    #[inline]
    pub fn set_flag(&mut self, mask: u8, on: bool) {
        if on {
            self.f |= mask;
        } else {
            self.f &= !mask;
        }
    }

    /// Overwrite all four flags at once.
    #[inline]
    pub fn set_flags(&mut self, z: bool, n: bool, h: bool, c: bool) {
        self.f = if z { FLAG_Z } else { 0 }
            | if n { FLAG_N } else { 0 }
            | if h { FLAG_H } else { 0 }
            | if c { FLAG_C } else { 0 };
    }

    pub fn flag_z(&self) -> bool {
        self.flag(FLAG_Z)
    }

    pub fn flag_n(&self) -> bool {
        self.flag(FLAG_N)
    }

    pub fn flag_h(&self) -> bool {
        self.flag(FLAG_H)
    }

    pub fn flag_c(&self) -> bool {
        self.flag(FLAG_C)
    }

    /// Snapshot of the registers for diagnostics.
    pub fn state(&self) -> CpuState {
        CpuState {
            af: self.af(),
            bc: self.bc(),
            de: self.de(),
            hl: self.hl(),
            pc: self.pc,
            sp: self.sp,
            ime: self.ime,
            halted: self.halted,
        }
    }

    /// Formatted CPU state string for debugging.
    pub fn debug_state(&self) -> String {
        self.state().to_string()
    }
}

impl Default for Cpu {
    fn default() -> Self {
        Self::new()
    }
}

/// Copy of the register file handed to hosts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CpuState {
    pub af: u16,
    pub bc: u16,
    pub de: u16,
    pub hl: u16,
    pub pc: u16,
    pub sp: u16,
    pub ime: bool,
    pub halted: bool,
}

impl fmt::Display for CpuState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "AF:{:04X} BC:{:04X} DE:{:04X} HL:{:04X} PC:{:04X} SP:{:04X} IME:{} HALT:{}",
            self.af,
            self.bc,
            self.de,
            self.hl,
            self.pc,
            self.sp,
            self.ime as u8,
            self.halted as u8
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn af_write_clears_low_nibble() {
        let mut cpu = Cpu::new();
        cpu.set_af(0x12FF);
        assert_eq!(cpu.a, 0x12);
        assert_eq!(cpu.f, 0xF0);
        assert_eq!(cpu.af(), 0x12F0);
    }

    #[test]
    fn pairs_are_big_endian() {
        let mut cpu = Cpu::new();
        cpu.set_hl(0xC0DE);
        assert_eq!((cpu.h, cpu.l), (0xC0, 0xDE));
        cpu.b = 0x01;
        cpu.c = 0x02;
        assert_eq!(cpu.bc(), 0x0102);
    }

    #[test]
    fn set_flags_only_touches_high_nibble() {
        let mut cpu = Cpu::new();
        cpu.set_flags(true, false, true, false);
        assert_eq!(cpu.f, FLAG_Z | FLAG_H);
        cpu.set_flag(FLAG_C, true);
        assert!(cpu.flag_c());
        cpu.set_flag(FLAG_Z, false);
        assert_eq!(cpu.f, FLAG_H | FLAG_C);
    }
}
