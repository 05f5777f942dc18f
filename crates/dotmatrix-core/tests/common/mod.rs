#![allow(dead_code)]

use dotmatrix_core::{
    GameBoy, SystemOptions,
    cartridge::Cartridge,
    cpu::Cpu,
    joypad::SharedJoypad,
    mmu::Mmu,
    opcode::OpCodeResult,
    opcode_table::OpCodeTable,
};

pub const ENTRY: usize = 0x0100;

/// 32 KiB ROM-only image with `program` at the cartridge entry point.
pub fn rom_with_program(program: &[u8]) -> Vec<u8> {
    let mut rom = vec![0u8; 0x8000];
    rom[ENTRY..ENTRY + program.len()].copy_from_slice(program);
    rom
}

/// Image of `banks` 16 KiB banks, each filled with its own bank number,
/// and the given controller/RAM header bytes.
pub fn banked_rom(banks: usize, cart_type: u8, ram_code: u8) -> Vec<u8> {
    let mut rom = vec![0u8; banks * 0x4000];
    for (bank, chunk) in rom.chunks_mut(0x4000).enumerate() {
        chunk.fill(bank as u8);
    }
    rom[0x0147] = cart_type;
    rom[0x0148] = banks.trailing_zeros().saturating_sub(1) as u8;
    rom[0x0149] = ram_code;
    rom
}

/// Unpaced machine that skips the boot ROM.
pub fn machine(program: &[u8]) -> GameBoy {
    machine_from_rom(rom_with_program(program), false)
}

pub fn machine_from_rom(rom: Vec<u8>, debug_buffers: bool) -> GameBoy {
    let cart = Cartridge::from_bytes(rom).unwrap();
    let options = SystemOptions {
        pace: false,
        debug_buffers,
        ..SystemOptions::default()
    };
    GameBoy::new(cart, SharedJoypad::default(), options).unwrap()
}

/// CPU, Mmu and dispatch table without the scheduler, for single
/// instruction checks. Programs are loaded into work RAM.
pub struct Bench {
    pub cpu: Cpu,
    pub mmu: Mmu,
    pub table: OpCodeTable,
}

impl Bench {
    pub fn new() -> Self {
        Self::with_rom(vec![0u8; 0x8000])
    }

    pub fn with_rom(rom: Vec<u8>) -> Self {
        let cart = Cartridge::from_bytes(rom).unwrap();
        let mut mmu = Mmu::new(cart, None, SharedJoypad::default(), false);
        mmu.apply_post_boot_io();
        let mut cpu = Cpu::new_post_boot();
        cpu.pc = 0xC000;
        Self {
            cpu,
            mmu,
            table: OpCodeTable::new().unwrap(),
        }
    }

    pub fn load(&mut self, program: &[u8]) {
        for (i, &b) in program.iter().enumerate() {
            self.mmu.write_byte(self.cpu.pc + i as u16, b);
        }
    }

    /// Execute the instruction at PC without the scheduler's PC advance.
    pub fn exec(&mut self) -> OpCodeResult {
        let op = *self.table.fetch(&self.mmu, self.cpu.pc);
        op.execute(&mut self.cpu, &mut self.mmu).unwrap()
    }

    /// Execute and advance PC the way the scheduler does.
    pub fn run(&mut self) -> OpCodeResult {
        let r = self.exec();
        if r.move_program_counter {
            self.cpu.pc = self.cpu.pc.wrapping_add(r.length);
        }
        r
    }
}
