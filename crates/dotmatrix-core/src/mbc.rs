//! Cartridge memory bank controllers.
//!
//! The controller is picked once from the header type byte and never
//! changes. Each variant only carries its bank registers; ROM and RAM are
//! owned by [`crate::cartridge::Cartridge`] and passed in on every access.

use log::debug;

use crate::{
    battery::{SharedRam, lock_ram},
    error::EmuError,
    memory_map::{
        BANKING_MODE, CARTRIDGE_RAM, RAM_BANK_NUMBER, RAM_ENABLE, ROM_BANK_0, ROM_BANK_NUMBER,
        ROM_BANK_X,
    },
};

const ROM_BANK_SIZE: usize = 0x4000;
const RAM_BANK_SIZE: usize = 0x2000;

/// Controller family named by the header type byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MbcKind {
    NoMbc,
    Mbc1,
    Mbc3,
    Mbc5,
}

/// Everything the header type byte says about the cartridge hardware.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MbcFeatures {
    pub kind: MbcKind,
    pub ram: bool,
    pub battery: bool,
    pub timer: bool,
    pub rumble: bool,
}

impl MbcFeatures {
    pub fn from_type_byte(value: u8) -> Result<Self, EmuError> {
        let (kind, ram, battery, timer, rumble) = match value {
            0x00 => (MbcKind::NoMbc, true, false, false, false),
            0x01 => (MbcKind::Mbc1, false, false, false, false),
            0x02 => (MbcKind::Mbc1, true, false, false, false),
            0x03 => (MbcKind::Mbc1, true, true, false, false),
            0x0F => (MbcKind::Mbc3, false, true, true, false),
            0x10 => (MbcKind::Mbc3, true, true, true, false),
            0x11 => (MbcKind::Mbc3, false, false, false, false),
            0x12 => (MbcKind::Mbc3, true, false, false, false),
            0x13 => (MbcKind::Mbc3, true, true, false, false),
            0x19 => (MbcKind::Mbc5, false, false, false, false),
            0x1A => (MbcKind::Mbc5, true, false, false, false),
            0x1B => (MbcKind::Mbc5, true, true, false, false),
            0x1C => (MbcKind::Mbc5, false, false, false, true),
            0x1D => (MbcKind::Mbc5, true, false, false, true),
            0x1E => (MbcKind::Mbc5, true, true, false, true),
            other => return Err(EmuError::UnsupportedCartridge(other)),
        };
        Ok(Self {
            kind,
            ram,
            battery,
            timer,
            rumble,
        })
    }

    /// Size of the RAM buffer this controller addresses.
    pub fn ram_size(&self) -> usize {
        if !self.ram {
            return 0;
        }
        match self.kind {
            MbcKind::NoMbc => 8 * 1024,
            MbcKind::Mbc1 | MbcKind::Mbc3 => 32 * 1024,
            MbcKind::Mbc5 => 128 * 1024,
        }
    }

    /// Header-style description, e.g. `MBC5+RUMBLE+RAM+BATTERY`.
    pub fn describe(&self) -> String {
        let mut name = match self.kind {
            MbcKind::NoMbc => return "ROM ONLY".to_string(),
            MbcKind::Mbc1 => String::from("MBC1"),
            MbcKind::Mbc3 => String::from("MBC3"),
            MbcKind::Mbc5 => String::from("MBC5"),
        };
        for (present, tag) in [
            (self.timer, "+TIMER"),
            (self.rumble, "+RUMBLE"),
            (self.ram, "+RAM"),
            (self.battery, "+BATTERY"),
        ] {
            if present {
                name.push_str(tag);
            }
        }
        name
    }
}

#[derive(Debug, Clone, Default)]
pub struct Mbc1 {
    ram_enabled: bool,
    advanced_mode: bool,
    lower: u8,
    upper: u8,
    rom_bank: u16,
    ram_bank: u8,
}

impl Mbc1 {
    fn new() -> Self {
        Self {
            rom_bank: 1,
            ..Self::default()
        }
    }

    fn update_rom_bank(&mut self, lower: u8, upper: u8) {
        self.lower = lower & 0x1F;
        self.upper = upper & 0x03;
        if self.lower == 0 {
            self.lower = 1;
        }
        let mut bank = if self.advanced_mode {
            self.lower
        } else {
            (self.upper << 5) | self.lower
        };
        // Banks 0x20/0x40/0x60 can't be selected; the chip reads the next one.
        if matches!(bank, 0x20 | 0x40 | 0x60) {
            bank += 1;
        }
        self.rom_bank = bank as u16;
        debug!(
            "MBC1 ROM bank {:02X} (lower {:02X}, upper {:02X})",
            bank, self.lower, self.upper
        );
    }

    fn ram_offset(&self) -> usize {
        if self.advanced_mode {
            self.ram_bank as usize * RAM_BANK_SIZE
        } else {
            0
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Mbc3 {
    ram_enabled: bool,
    rom_bank: u16,
    ram_bank: u8,
}

#[derive(Debug, Clone, Default)]
pub struct Mbc5 {
    ram_enabled: bool,
    lower: u8,
    upper: u8,
    rom_bank: u16,
    ram_bank: u8,
}

/// Active bank controller with its register state.
#[derive(Debug, Clone)]
pub enum Mbc {
    NoMbc,
    Mbc1(Mbc1),
    Mbc3(Mbc3),
    Mbc5(Mbc5),
}

impl Mbc {
    pub fn new(kind: MbcKind) -> Self {
        match kind {
            MbcKind::NoMbc => Mbc::NoMbc,
            MbcKind::Mbc1 => Mbc::Mbc1(Mbc1::new()),
            MbcKind::Mbc3 => Mbc::Mbc3(Mbc3 {
                rom_bank: 1,
                ..Mbc3::default()
            }),
            MbcKind::Mbc5 => Mbc::Mbc5(Mbc5 {
                rom_bank: 1,
                lower: 1,
                ..Mbc5::default()
            }),
        }
    }

    /// Bank currently mapped at 0x4000-0x7FFF.
    pub fn rom_bank(&self) -> u16 {
        match self {
            Mbc::NoMbc => 1,
            Mbc::Mbc1(m) => m.rom_bank,
            Mbc::Mbc3(m) => m.rom_bank,
            Mbc::Mbc5(m) => m.rom_bank,
        }
    }

    pub fn ram_bank(&self) -> u8 {
        match self {
            Mbc::NoMbc => 0,
            Mbc::Mbc1(m) => m.ram_bank,
            Mbc::Mbc3(m) => m.ram_bank,
            Mbc::Mbc5(m) => m.ram_bank,
        }
    }

    pub fn ram_enabled(&self) -> bool {
        match self {
            Mbc::NoMbc => true,
            Mbc::Mbc1(m) => m.ram_enabled,
            Mbc::Mbc3(m) => m.ram_enabled,
            Mbc::Mbc5(m) => m.ram_enabled,
        }
    }

    pub fn read(&self, rom: &[u8], ram: &SharedRam, addr: u16) -> u8 {
        if ROM_BANK_0.contains(addr) {
            return rom.get(addr as usize).copied().unwrap_or(0xFF);
        }
        if ROM_BANK_X.contains(addr) {
            let bank_offset = match self {
                Mbc::NoMbc => ROM_BANK_SIZE,
                _ => self.rom_bank() as usize * ROM_BANK_SIZE,
            };
            return read_rom_wrapping(rom, bank_offset + ROM_BANK_X.offset(addr));
        }
        if CARTRIDGE_RAM.contains(addr) {
            let offset = match self {
                Mbc::NoMbc => Some(0),
                Mbc::Mbc1(m) => m.ram_enabled.then(|| m.ram_offset()),
                Mbc::Mbc3(m) => m.ram_enabled.then(|| m.ram_bank as usize * RAM_BANK_SIZE),
                Mbc::Mbc5(m) => m.ram_enabled.then(|| m.ram_bank as usize * RAM_BANK_SIZE),
            };
            return match offset {
                Some(base) => lock_ram(ram)
                    .data
                    .get(base + CARTRIDGE_RAM.offset(addr))
                    .copied()
                    .unwrap_or(0xFF),
                None => 0xFF,
            };
        }
        0xFF
    }

    pub fn write(&mut self, ram: &SharedRam, addr: u16, value: u8) {
        if CARTRIDGE_RAM.contains(addr) {
            let offset = match self {
                Mbc::NoMbc => Some(0),
                Mbc::Mbc1(m) => m.ram_enabled.then(|| m.ram_offset()),
                Mbc::Mbc3(m) => m.ram_enabled.then(|| m.ram_bank as usize * RAM_BANK_SIZE),
                Mbc::Mbc5(m) => m.ram_enabled.then(|| m.ram_bank as usize * RAM_BANK_SIZE),
            };
            if let Some(base) = offset {
                let mut guard = lock_ram(ram);
                if let Some(cell) = guard.data.get_mut(base + CARTRIDGE_RAM.offset(addr)) {
                    *cell = value;
                    guard.dirty = true;
                }
            }
            return;
        }

        match self {
            Mbc::NoMbc => {}
            Mbc::Mbc1(m) => {
                if RAM_ENABLE.contains(addr) {
                    m.ram_enabled = value & 0x0F == 0x0A;
                } else if ROM_BANK_NUMBER.contains(addr) {
                    let upper = m.upper;
                    m.update_rom_bank(value, upper);
                } else if RAM_BANK_NUMBER.contains(addr) {
                    if !m.advanced_mode {
                        let lower = m.lower;
                        m.update_rom_bank(lower, value);
                    } else if value <= 3 {
                        // Out-of-range selects keep the current bank rather than wrapping.
                        m.ram_bank = value;
                        debug!("MBC1 RAM bank {}", m.ram_bank);
                    }
                } else if BANKING_MODE.contains(addr) {
                    m.advanced_mode = value != 0;
                }
            }
            Mbc::Mbc3(m) => {
                if RAM_ENABLE.contains(addr) {
                    m.ram_enabled = value & 0x0F == 0x0A;
                } else if ROM_BANK_NUMBER.contains(addr) {
                    let bank = value & 0x7F;
                    m.rom_bank = if bank == 0 { 1 } else { bank as u16 };
                    debug!("MBC3 ROM bank {:02X}", m.rom_bank);
                } else if RAM_BANK_NUMBER.contains(addr) {
                    // 0x08-0x0C select RTC registers, which are not emulated.
                    if value <= 3 {
                        m.ram_bank = value;
                        debug!("MBC3 RAM bank {}", m.ram_bank);
                    }
                }
                // 0x6000-0x7FFF latches the RTC; nothing to latch.
            }
            Mbc::Mbc5(m) => {
                if RAM_ENABLE.contains(addr) {
                    m.ram_enabled = value & 0x0F == 0x0A;
                } else if (0x2000..=0x2FFF).contains(&addr) {
                    m.lower = value;
                    m.rom_bank = ((m.upper as u16) << 8) | m.lower as u16;
                    debug!("MBC5 ROM bank {:03X}", m.rom_bank);
                } else if (0x3000..=0x3FFF).contains(&addr) {
                    m.upper = value & 0x01;
                    m.rom_bank = ((m.upper as u16) << 8) | m.lower as u16;
                    debug!("MBC5 ROM bank {:03X}", m.rom_bank);
                } else if RAM_BANK_NUMBER.contains(addr) {
                    m.ram_bank = value & 0x0F;
                    debug!("MBC5 RAM bank {}", m.ram_bank);
                }
            }
        }
    }
}

fn read_rom_wrapping(rom: &[u8], index: usize) -> u8 {
    if rom.is_empty() {
        return 0xFF;
    }
    rom[index % rom.len()]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::battery::shared_ram;

    fn banked_rom(banks: usize) -> Vec<u8> {
        let mut rom = vec![0u8; banks * ROM_BANK_SIZE];
        for bank in 0..banks {
            rom[bank * ROM_BANK_SIZE] = bank as u8;
        }
        rom
    }

    #[test]
    fn type_byte_table() {
        let f = MbcFeatures::from_type_byte(0x03).unwrap();
        assert_eq!(f.kind, MbcKind::Mbc1);
        assert!(f.ram && f.battery);
        let f = MbcFeatures::from_type_byte(0x0F).unwrap();
        assert!(f.timer && f.battery && !f.ram);
        assert_eq!(f.ram_size(), 0);
        let f = MbcFeatures::from_type_byte(0x1E).unwrap();
        assert_eq!(f.describe(), "MBC5+RUMBLE+RAM+BATTERY");
        assert_eq!(f.ram_size(), 128 * 1024);
        assert!(matches!(
            MbcFeatures::from_type_byte(0x05),
            Err(EmuError::UnsupportedCartridge(0x05))
        ));
    }

    #[test]
    fn mbc1_bank_zero_reads_as_one() {
        let rom = banked_rom(4);
        let ram = shared_ram(0);
        let mut mbc = Mbc::new(MbcKind::Mbc1);
        mbc.write(&ram, 0x2000, 0x00);
        assert_eq!(mbc.rom_bank(), 1);
        assert_eq!(mbc.read(&rom, &ram, 0x4000), 1);
    }

    #[test]
    fn mbc1_skips_0x20_0x40_0x60() {
        let ram = shared_ram(0);
        let mut mbc = Mbc::new(MbcKind::Mbc1);
        mbc.write(&ram, 0x2000, 0x00);
        mbc.write(&ram, 0x4000, 0x01);
        assert_eq!(mbc.rom_bank(), 0x21);
        mbc.write(&ram, 0x4000, 0x02);
        assert_eq!(mbc.rom_bank(), 0x41);
        mbc.write(&ram, 0x2000, 0x05);
        assert_eq!(mbc.rom_bank(), 0x45);
    }

    #[test]
    fn mbc1_advanced_mode_routes_upper_bits_to_ram() {
        let ram = shared_ram(32 * 1024);
        let mut mbc = Mbc::new(MbcKind::Mbc1);
        mbc.write(&ram, 0x0000, 0x0A);
        mbc.write(&ram, 0x6000, 0x01);
        mbc.write(&ram, 0x4000, 0x02);
        assert_eq!(mbc.ram_bank(), 2);
        mbc.write(&ram, 0xA000, 0x77);
        assert_eq!(lock_ram(&ram).data[2 * RAM_BANK_SIZE], 0x77);
        assert!(lock_ram(&ram).dirty);
    }

    #[test]
    fn disabled_ram_reads_ff_and_ignores_writes() {
        let rom = banked_rom(2);
        let ram = shared_ram(32 * 1024);
        let mut mbc = Mbc::new(MbcKind::Mbc3);
        mbc.write(&ram, 0xA000, 0x12);
        assert_eq!(mbc.read(&rom, &ram, 0xA000), 0xFF);
        assert!(!lock_ram(&ram).dirty);
        mbc.write(&ram, 0x0000, 0x0A);
        mbc.write(&ram, 0xA000, 0x12);
        assert_eq!(mbc.read(&rom, &ram, 0xA000), 0x12);
    }

    #[test]
    fn mbc3_rtc_select_is_ignored() {
        let ram = shared_ram(32 * 1024);
        let mut mbc = Mbc::new(MbcKind::Mbc3);
        mbc.write(&ram, 0x4000, 0x02);
        mbc.write(&ram, 0x4000, 0x08);
        mbc.write(&ram, 0x4000, 0x0C);
        assert_eq!(mbc.ram_bank(), 2);
        mbc.write(&ram, 0x2000, 0x00);
        assert_eq!(mbc.rom_bank(), 1);
    }

    #[test]
    fn mbc5_nine_bit_bank_and_wrap() {
        let rom = banked_rom(4);
        let ram = shared_ram(0);
        let mut mbc = Mbc::new(MbcKind::Mbc5);
        mbc.write(&ram, 0x2000, 0x03);
        mbc.write(&ram, 0x3000, 0x01);
        assert_eq!(mbc.rom_bank(), 0x103);
        // 0x103 % 4 banks == bank 3
        assert_eq!(mbc.read(&rom, &ram, 0x4000), 3);
        mbc.write(&ram, 0x3000, 0x00);
        mbc.write(&ram, 0x2000, 0x00);
        assert_eq!(mbc.rom_bank(), 0);
        assert_eq!(mbc.read(&rom, &ram, 0x4000), 0);
    }

    #[test]
    fn no_mbc_ram_is_always_open() {
        let rom = banked_rom(2);
        let ram = shared_ram(8 * 1024);
        let mut mbc = Mbc::new(MbcKind::NoMbc);
        mbc.write(&ram, 0xBFFF, 0x5A);
        assert_eq!(mbc.read(&rom, &ram, 0xBFFF), 0x5A);
        mbc.write(&ram, 0x2000, 0x03);
        assert_eq!(mbc.read(&rom, &ram, 0x4000), 1);
    }
}
