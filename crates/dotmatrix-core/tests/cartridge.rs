mod common;

use std::{fs, thread, time::Duration};

use common::banked_rom;
use dotmatrix_core::{
    EmuError,
    battery::save_path_for,
    cartridge::Cartridge,
    mbc::MbcKind,
};
use tempfile::tempdir;

const NEVER: Duration = Duration::from_secs(3600);

#[test]
fn battery_ram_round_trips_through_save_file() {
    let dir = tempdir().unwrap();
    let rom_path = dir.path().join("game.gb");
    fs::write(&rom_path, banked_rom(4, 0x03, 0x03)).unwrap(); // MBC1+RAM+BATTERY, 32 KiB

    let mut cart = Cartridge::from_file_with_interval(&rom_path, NEVER).unwrap();
    cart.write(0x0000, 0x0A);
    cart.write(0xA000, 0x5A);
    cart.write(0xBFFF, 0x77);
    assert!(cart.flush_save().unwrap());
    assert!(!cart.flush_save().unwrap());
    let before = cart.ram_snapshot();
    drop(cart);

    let save = fs::read(save_path_for(&rom_path)).unwrap();
    assert_eq!(save.len(), 0x8000);
    assert_eq!(save[0], 0x5A);

    let mut cart = Cartridge::from_file_with_interval(&rom_path, NEVER).unwrap();
    assert_eq!(cart.ram_snapshot(), before);
    cart.write(0x0000, 0x0A);
    assert_eq!(cart.read(0xA000), 0x5A);
    assert_eq!(cart.read(0xBFFF), 0x77);
}

#[test]
fn missing_save_file_is_created_zeroed() {
    let dir = tempdir().unwrap();
    let rom_path = dir.path().join("fresh.gb");
    fs::write(&rom_path, banked_rom(2, 0x13, 0x03)).unwrap(); // MBC3+RAM+BATTERY

    let cart = Cartridge::from_file_with_interval(&rom_path, NEVER).unwrap();
    let save_path = cart.save_path().unwrap();
    assert_eq!(save_path, dir.path().join("fresh.gb.sav"));
    let save = fs::read(save_path).unwrap();
    assert_eq!(save.len(), 0x8000);
    assert!(save.iter().all(|&b| b == 0));
}

#[test]
fn background_thread_flushes_dirty_ram() {
    let dir = tempdir().unwrap();
    let rom_path = dir.path().join("auto.gb");
    fs::write(&rom_path, banked_rom(2, 0x1B, 0x02)).unwrap(); // MBC5+RAM+BATTERY, 8 KiB

    let mut cart = Cartridge::from_file_with_interval(&rom_path, Duration::from_millis(10)).unwrap();
    cart.write(0x0000, 0x0A);
    cart.write(0xA010, 0xC3);

    let save_path = save_path_for(&rom_path);
    let flushed = (0..200).any(|_| {
        thread::sleep(Duration::from_millis(10));
        fs::read(&save_path).is_ok_and(|d| d.get(0x10) == Some(&0xC3))
    });
    assert!(flushed);
}

#[test]
fn cartridge_without_battery_has_no_save() {
    let dir = tempdir().unwrap();
    let rom_path = dir.path().join("plain.gb");
    fs::write(&rom_path, banked_rom(2, 0x02, 0x02)).unwrap(); // MBC1+RAM

    let cart = Cartridge::from_file(&rom_path).unwrap();
    assert!(cart.save_path().is_none());
    assert!(!save_path_for(&rom_path).exists());
}

#[test]
fn missing_rom_is_an_io_error() {
    let dir = tempdir().unwrap();
    let err = Cartridge::from_file(dir.path().join("nope.gb")).unwrap_err();
    assert!(matches!(err, EmuError::Io(_)));
}

#[test]
fn mbc1_bank_zero_selects_bank_one() {
    let mut cart = Cartridge::from_bytes(banked_rom(8, 0x01, 0x00)).unwrap();
    assert_eq!(cart.features.kind, MbcKind::Mbc1);
    cart.write(0x2000, 0x00);
    assert_eq!(cart.read(0x4000), 1);
    cart.write(0x2000, 0x05);
    assert_eq!(cart.read(0x4000), 5);
    assert_eq!(cart.read(0x0000), 0);
}

#[test]
fn mbc1_bumps_unreachable_bank_numbers() {
    let mut cart = Cartridge::from_bytes(banked_rom(64, 0x01, 0x00)).unwrap();
    cart.write(0x4000, 0x01); // upper bits
    cart.write(0x2000, 0x00); // lower bits -> 0x20
    assert_eq!(cart.read(0x4000), 0x21);
}

#[test]
fn mbc1_ignores_ram_bank_numbers_above_three() {
    let mut cart = Cartridge::from_bytes(banked_rom(4, 0x02, 0x03)).unwrap(); // MBC1+RAM, 32 KiB
    cart.write(0x0000, 0x0A);
    cart.write(0x6000, 0x01); // advanced banking
    cart.write(0x4000, 0x01);
    cart.write(0xA000, 0x11);

    cart.write(0x4000, 0x05);
    assert_eq!(cart.read(0xA000), 0x11);

    cart.write(0x4000, 0x02);
    assert_eq!(cart.read(0xA000), 0x00);
    cart.write(0x4000, 0x01);
    assert_eq!(cart.read(0xA000), 0x11);
}

#[test]
fn mbc5_can_map_bank_zero_high() {
    let mut cart = Cartridge::from_bytes(banked_rom(4, 0x19, 0x00)).unwrap();
    cart.write(0x2000, 0x00);
    assert_eq!(cart.read(0x4000), 0);
    cart.write(0x2000, 0x03);
    assert_eq!(cart.read(0x7FFF), 3);
}

#[test]
fn mbc3_switches_ram_banks() {
    let mut cart = Cartridge::from_bytes(banked_rom(2, 0x12, 0x03)).unwrap(); // MBC3+RAM
    cart.write(0x0000, 0x0A);
    cart.write(0x4000, 0x00);
    cart.write(0xA000, 0x11);
    cart.write(0x4000, 0x02);
    cart.write(0xA000, 0x22);
    assert_eq!(cart.read(0xA000), 0x22);
    cart.write(0x4000, 0x00);
    assert_eq!(cart.read(0xA000), 0x11);

    // RTC register select leaves the RAM bank alone.
    cart.write(0x4000, 0x08);
    assert_eq!(cart.read(0xA000), 0x11);
}

#[test]
fn header_describes_the_controller() {
    let mut rom = banked_rom(2, 0x1E, 0x03);
    rom[0x0134..0x0139].copy_from_slice(b"TETRA");
    let cart = Cartridge::from_bytes(rom).unwrap();
    assert_eq!(cart.header.title, "TETRA");
    assert_eq!(cart.features.describe(), "MBC5+RUMBLE+RAM+BATTERY");
}
