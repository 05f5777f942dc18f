//! Named address ranges of the DMG memory map.
//!
//! Ranges overlap freely (the tile pattern tables sit inside VRAM, the IF
//! register sits inside I/O). They are used for routing cartridge accesses
//! and for the write-listener table in [`crate::mmu`].

/// An inclusive address range with a human readable name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryRange {
    pub name: &'static str,
    pub start: u16,
    pub end: u16,
}

impl MemoryRange {
    pub const fn new(name: &'static str, start: u16, end: u16) -> Self {
        assert!(start <= end, "memory range start past end");
        Self { name, start, end }
    }

    #[inline]
    pub const fn contains(&self, addr: u16) -> bool {
        addr >= self.start && addr <= self.end
    }

    pub const fn len(&self) -> usize {
        (self.end - self.start) as usize + 1
    }

    pub const fn is_empty(&self) -> bool {
        false
    }

    /// Offset of `addr` from the start of the range.
    #[inline]
    pub const fn offset(&self, addr: u16) -> usize {
        (addr - self.start) as usize
    }
}

pub const BOOT_ROM: MemoryRange = MemoryRange::new("Boot ROM overlay", 0x0000, 0x00FF);
pub const ROM_BANK_0: MemoryRange = MemoryRange::new("ROM bank 0", 0x0000, 0x3FFF);
pub const ROM_BANK_X: MemoryRange = MemoryRange::new("ROM bank X", 0x4000, 0x7FFF);
pub const CARTRIDGE_ROM: MemoryRange = MemoryRange::new("Cartridge ROM", 0x0000, 0x7FFF);

// MBC register windows; writes into ROM space land here instead of memory.
pub const RAM_ENABLE: MemoryRange = MemoryRange::new("RAM enable", 0x0000, 0x1FFF);
pub const ROM_BANK_NUMBER: MemoryRange = MemoryRange::new("ROM bank number", 0x2000, 0x3FFF);
pub const RAM_BANK_NUMBER: MemoryRange =
    MemoryRange::new("RAM bank number / upper ROM bank bits", 0x4000, 0x5FFF);
pub const BANKING_MODE: MemoryRange = MemoryRange::new("Banking mode select", 0x6000, 0x7FFF);

/// Every tile pattern byte, 384 tiles.
pub const TILE_DATA: MemoryRange = MemoryRange::new("Tile pattern data", 0x8000, 0x97FF);
pub const BG_TILE_MAP_0: MemoryRange = MemoryRange::new("BG tile map 0", 0x9800, 0x9BFF);
pub const BG_TILE_MAP_1: MemoryRange = MemoryRange::new("BG tile map 1", 0x9C00, 0x9FFF);

pub const CARTRIDGE_RAM: MemoryRange = MemoryRange::new("Cartridge RAM", 0xA000, 0xBFFF);
pub const WORK_RAM: MemoryRange = MemoryRange::new("Work RAM", 0xC000, 0xDFFF);
pub const ECHO_RAM: MemoryRange = MemoryRange::new("Work RAM echo", 0xE000, 0xFDFF);
pub const OAM: MemoryRange = MemoryRange::new("Object attribute memory", 0xFE00, 0xFE9F);

// Individual I/O register ranges used by the write-listener table.
pub const JOYPAD_REGISTER: MemoryRange = MemoryRange::new("Joypad", 0xFF00, 0xFF00);
pub const SERIAL_REGISTERS: MemoryRange = MemoryRange::new("Serial", 0xFF01, 0xFF02);
pub const TIMER_REGISTERS: MemoryRange = MemoryRange::new("Timer", 0xFF04, 0xFF07);
pub const LCD_REGISTERS: MemoryRange = MemoryRange::new("LCD", 0xFF40, 0xFF4B);

pub const JOYP: u16 = 0xFF00;
pub const SB: u16 = 0xFF01;
pub const SC: u16 = 0xFF02;
pub const DIV: u16 = 0xFF04;
pub const TIMA: u16 = 0xFF05;
pub const TMA: u16 = 0xFF06;
pub const TAC: u16 = 0xFF07;
pub const IF: u16 = 0xFF0F;
pub const LCDC: u16 = 0xFF40;
pub const STAT: u16 = 0xFF41;
pub const SCY: u16 = 0xFF42;
pub const SCX: u16 = 0xFF43;
pub const LY: u16 = 0xFF44;
pub const LYC: u16 = 0xFF45;
pub const DMA: u16 = 0xFF46;
pub const BGP: u16 = 0xFF47;
pub const OBP0: u16 = 0xFF48;
pub const OBP1: u16 = 0xFF49;
pub const WY: u16 = 0xFF4A;
pub const WX: u16 = 0xFF4B;
/// Any write here unmaps the boot image (the boot ROM's last instruction).
pub const BOOT_OFF: u16 = 0xFF50;
pub const IE: u16 = 0xFFFF;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn range_bounds_are_inclusive() {
        assert!(OAM.contains(0xFE00));
        assert!(OAM.contains(0xFE9F));
        assert!(!OAM.contains(0xFEA0));
        assert_eq!(OAM.len(), 160);
        assert_eq!(TILE_DATA.len(), 384 * 16);
        assert_eq!(BG_TILE_MAP_1.offset(0x9C20), 0x20);
    }
}
