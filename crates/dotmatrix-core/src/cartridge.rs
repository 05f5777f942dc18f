use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

use log::{info, warn};

use crate::{
    battery::{Battery, DEFAULT_FLUSH_INTERVAL, SharedRam, lock_ram, save_path_for, shared_ram},
    error::EmuError,
    mbc::{Mbc, MbcFeatures},
};

/// Images shorter than this are zero padded so every header field exists.
pub const MIN_ROM_SIZE: usize = 0x0200;

/// Parsed cartridge header fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CartridgeHeader {
    pub title: String,
    pub cartridge_type: u8,
    pub rom_size: usize,
    /// Region byte non-zero: overseas (non-Japanese) release.
    pub overseas_only: bool,
    pub version: u8,
    pub header_checksum: u8,
}

impl CartridgeHeader {
    fn parse(data: &[u8]) -> Self {
        let mut title = &data[0x0134..0x0143];
        if let Some(pos) = title.iter().position(|&b| b == 0) {
            title = &title[..pos];
        }
        Self {
            title: String::from_utf8_lossy(title).trim().to_string(),
            cartridge_type: data[0x0147],
            rom_size: (32 * 1024usize).checked_shl(data[0x0148] as u32).unwrap_or(0),
            overseas_only: data[0x014A] != 0,
            version: data[0x014C],
            header_checksum: data[0x014D],
        }
    }
}

/// Checksum over 0x0134-0x014C as computed by the boot ROM.
pub fn header_checksum(data: &[u8]) -> u8 {
    data[0x0134..=0x014C]
        .iter()
        .fold(0u8, |acc, &b| acc.wrapping_sub(b).wrapping_sub(1))
}

/// A loaded cartridge: ROM image, bank controller and (optionally)
/// battery-backed RAM.
#[derive(Debug)]
pub struct Cartridge {
    pub header: CartridgeHeader,
    pub features: MbcFeatures,
    rom: Vec<u8>,
    ram: SharedRam,
    mbc: Mbc,
    battery: Option<Battery>,
}

impl Cartridge {
    /// Build a cartridge from an in-memory image. No save file is attached.
    pub fn from_bytes(mut data: Vec<u8>) -> Result<Self, EmuError> {
        if data.len() < MIN_ROM_SIZE {
            data.resize(MIN_ROM_SIZE, 0);
        }
        let header = CartridgeHeader::parse(&data);
        let features = MbcFeatures::from_type_byte(header.cartridge_type)?;

        let computed = header_checksum(&data);
        if computed != header.header_checksum {
            warn!(
                "header checksum mismatch: expected {:02X}, computed {:02X}",
                header.header_checksum, computed
            );
        }

        Ok(Self {
            ram: shared_ram(features.ram_size()),
            mbc: Mbc::new(features.kind),
            header,
            features,
            rom: data,
            battery: None,
        })
    }

    /// Load a ROM file with the default save flush interval.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, EmuError> {
        Self::from_file_with_interval(path, DEFAULT_FLUSH_INTERVAL)
    }

    /// Load a ROM file. Battery-backed carts pick up `<rom>.sav` and keep it
    /// up to date every `flush_interval`.
    pub fn from_file_with_interval<P: AsRef<Path>>(
        path: P,
        flush_interval: Duration,
    ) -> Result<Self, EmuError> {
        let path = path.as_ref();
        let mut cart = Self::from_bytes(fs::read(path)?)?;

        if cart.features.battery && cart.features.ram_size() > 0 {
            let save = save_path_for(path);
            cart.battery = Some(Battery::attach(save, cart.ram.clone(), flush_interval)?);
        }

        info!(
            "Loaded ROM: {} ({}, {} KiB ROM, {} KiB RAM, version {})",
            cart.header.title,
            cart.features.describe(),
            cart.header.rom_size / 1024,
            cart.features.ram_size() / 1024,
            cart.header.version
        );
        Ok(cart)
    }

    #[inline]
    pub fn read(&self, addr: u16) -> u8 {
        self.mbc.read(&self.rom, &self.ram, addr)
    }

    #[inline]
    pub fn write(&mut self, addr: u16, value: u8) {
        self.mbc.write(&self.ram, addr, value);
    }

    /// Copy of the cartridge RAM contents.
    pub fn ram_snapshot(&self) -> Vec<u8> {
        lock_ram(&self.ram).data.clone()
    }

    pub fn save_path(&self) -> Option<PathBuf> {
        self.battery.as_ref().map(|b| b.path().to_path_buf())
    }

    /// Flush battery RAM now if dirty. Returns whether anything was written.
    pub fn flush_save(&self) -> Result<bool, EmuError> {
        match &self.battery {
            Some(battery) => battery.flush(),
            None => Ok(false),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rom_with_header(cart_type: u8, title: &[u8]) -> Vec<u8> {
        let mut rom = vec![0u8; 0x8000];
        rom[0x0134..0x0134 + title.len()].copy_from_slice(title);
        rom[0x0147] = cart_type;
        rom[0x0148] = 0x00;
        rom[0x014C] = 0x02;
        rom[0x014D] = header_checksum(&rom);
        rom
    }

    #[test]
    fn parses_header_fields() {
        let cart = Cartridge::from_bytes(rom_with_header(0x01, b"TETRIS\0\0")).unwrap();
        assert_eq!(cart.header.title, "TETRIS");
        assert_eq!(cart.header.rom_size, 32 * 1024);
        assert_eq!(cart.header.version, 2);
        assert!(!cart.header.overseas_only);
        assert_eq!(cart.features.describe(), "MBC1");
    }

    #[test]
    fn short_image_is_padded() {
        let cart = Cartridge::from_bytes(vec![0x3E; 0x10]).unwrap();
        assert_eq!(cart.read(0x000F), 0x3E);
        assert_eq!(cart.read(MIN_ROM_SIZE as u16 - 1), 0x00);
        assert_eq!(cart.read(0x0000), 0x3E);
        assert_eq!(cart.read(0x0100), 0x00);
        assert_eq!(cart.features.describe(), "ROM ONLY");
    }

    #[test]
    fn unknown_type_byte_is_rejected() {
        let err = Cartridge::from_bytes(rom_with_header(0x05, b"MBC2")).unwrap_err();
        assert!(matches!(err, EmuError::UnsupportedCartridge(0x05)));
    }

    #[test]
    fn checksum_matches_boot_rom_algorithm() {
        let rom = rom_with_header(0x00, b"ABC");
        let sum = rom[0x0134..=0x014C]
            .iter()
            .fold(0i32, |acc, &b| acc - b as i32 - 1);
        assert_eq!(header_checksum(&rom), sum as u8);
    }
}
