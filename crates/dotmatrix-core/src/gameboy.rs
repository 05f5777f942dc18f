//! The machine facade and its frame-paced scheduler.

use std::{
    path::Path,
    sync::atomic::{AtomicBool, Ordering},
    thread,
    time::{Duration, Instant},
};

#[cfg(feature = "cpu-trace")]
use log::trace;
use log::{error, info, warn};

use crate::{
    battery::DEFAULT_FLUSH_INTERVAL,
    cartridge::Cartridge,
    cpu::{Cpu, CpuState, PendingAction},
    error::EmuError,
    interrupt::Interrupt,
    joypad::SharedJoypad,
    memory_map::{IE, IF},
    mmu::Mmu,
    opcode,
    opcode_table::OpCodeTable,
};

pub const CLOCK_HZ: u32 = 4_194_304;
pub const FRAMES_PER_SECOND: u32 = 60;
pub const CYCLES_PER_FRAME: u32 = CLOCK_HZ / FRAMES_PER_SECOND;

const INTERRUPT_CYCLES: u32 = 20;
const HALT_IDLE_CYCLES: u32 = 4;
const FRAME_TIME: Duration = Duration::from_nanos(1_000_000_000 / FRAMES_PER_SECOND as u64);

/// Knobs the host chooses at construction.
#[derive(Debug, Clone)]
pub struct SystemOptions {
    /// Start at 0x0100 with post-boot register state even if a boot image is given.
    pub skip_boot: bool,
    pub boot_rom: Option<Vec<u8>>,
    /// Produce the background/window/sprite/tile debug images each frame.
    pub debug_buffers: bool,
    /// Sleep out the rest of each 1/60 s frame.
    pub pace: bool,
    pub flush_interval: Duration,
}

impl Default for SystemOptions {
    fn default() -> Self {
        Self {
            skip_boot: false,
            boot_rom: None,
            debug_buffers: false,
            pace: true,
            flush_interval: DEFAULT_FLUSH_INTERVAL,
        }
    }
}

/// A completed 160x144 RGB frame. Ownership passes to the consumer.
#[derive(Debug)]
pub struct Frame {
    pub pixels: Box<[u8]>,
    pub number: u64,
}

pub type FrameSink = Box<dyn FnMut(Frame) + Send>;
pub type FaultSink = Box<dyn FnMut(&EmuError) + Send>;

pub struct GameBoy {
    pub cpu: Cpu,
    pub mmu: Mmu,
    table: OpCodeTable,
    pace: bool,
    frame_sink: Option<FrameSink>,
    fault_sink: Option<FaultSink>,
    faulted: bool,
    frames: u64,
}

impl GameBoy {
    pub fn new(
        cart: Cartridge,
        joypad: SharedJoypad,
        options: SystemOptions,
    ) -> Result<Self, EmuError> {
        let table = OpCodeTable::new()?;
        let boot_rom = if options.skip_boot { None } else { options.boot_rom };
        let skip = boot_rom.is_none();

        let mut mmu = Mmu::new(cart, boot_rom, joypad, options.debug_buffers);
        let cpu = if skip {
            mmu.apply_post_boot_io();
            Cpu::new_post_boot()
        } else {
            Cpu::new()
        };
        info!(
            "Starting {} at {:04X}",
            mmu.cart.header.title,
            cpu.pc
        );

        Ok(Self {
            cpu,
            mmu,
            table,
            pace: options.pace,
            frame_sink: None,
            fault_sink: None,
            faulted: false,
            frames: 0,
        })
    }

    /// Load a ROM from disk, attaching its save file if the cartridge has a battery.
    pub fn from_rom_file<P: AsRef<Path>>(
        path: P,
        joypad: SharedJoypad,
        options: SystemOptions,
    ) -> Result<Self, EmuError> {
        let cart = Cartridge::from_file_with_interval(path, options.flush_interval)?;
        Self::new(cart, joypad, options)
    }

    pub fn on_frame(&mut self, sink: impl FnMut(Frame) + Send + 'static) {
        self.frame_sink = Some(Box::new(sink));
    }

    pub fn on_fault(&mut self, sink: impl FnMut(&EmuError) + Send + 'static) {
        self.fault_sink = Some(Box::new(sink));
    }

    pub fn faulted(&self) -> bool {
        self.faulted
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }

    pub fn cpu_state(&self) -> CpuState {
        self.cpu.state()
    }

    pub fn serial_output(&self) -> &[u8] {
        self.mmu.serial.output()
    }

    /// Execute one instruction (or one idle slot) and advance the devices.
    /// Returns the cycles consumed.
    pub fn step(&mut self) -> Result<u32, EmuError> {
        let mut cycles = 0;
        if self.service_interrupts() {
            cycles += INTERRUPT_CYCLES;
        }

        if self.cpu.pending == PendingAction::EnableInterrupts {
            self.cpu.ime = true;
            self.cpu.pending = PendingAction::None;
        }

        let mut result = None;
        if self.cpu.halted {
            cycles += HALT_IDLE_CYCLES;
        } else {
            let op = *self.table.fetch(&self.mmu, self.cpu.pc);
            #[cfg(feature = "cpu-trace")]
            trace!("{:04X} {:<16} {}", self.cpu.pc, op.mnemonic(), self.cpu.state());
            let r = match op.execute(&mut self.cpu, &mut self.mmu) {
                Ok(r) => r,
                Err(e) => {
                    // Interrupt dispatch already spent these cycles.
                    self.mmu.step_ppu(cycles);
                    self.mmu.step_timer(cycles);
                    return Err(e);
                }
            };
            cycles += r.cycles;
            result = Some(r);
        }

        self.mmu.step_ppu(cycles);
        self.mmu.step_timer(cycles);

        if let Some(r) = result {
            if r.move_program_counter {
                self.cpu.pc = self.cpu.pc.wrapping_add(r.length);
            }
            if self.mmu.in_boot() && self.cpu.pc >= 0x0100 {
                self.mmu.leave_boot();
            }
            if r.stop_requested {
                self.mmu.reset_div();
                self.mmu.force_render();
            }
        }

        Ok(cycles)
    }

    /// Run one frame's cycle budget, delivering any frame the PPU completes.
    /// Returns false once the machine has faulted.
    pub fn run_frame(&mut self) -> bool {
        if self.faulted {
            return false;
        }
        self.mmu.poll_joypad();

        let mut spent = 0;
        while spent < CYCLES_PER_FRAME {
            match self.step() {
                Ok(cycles) => spent += cycles,
                Err(err) => {
                    self.fault(err);
                    return false;
                }
            }
            self.deliver_frame();
        }

        if !self.mmu.ppu.display_enabled() {
            self.mmu.ppu.present_blank();
            self.deliver_frame();
        }
        true
    }

    /// Run frames until `cancel` is set or the machine faults. The flag is
    /// checked between frames.
    pub fn run(&mut self, cancel: &AtomicBool) {
        let mut deadline = Instant::now();
        while !cancel.load(Ordering::Relaxed) {
            if !self.run_frame() {
                break;
            }
            if self.pace {
                deadline += FRAME_TIME;
                let now = Instant::now();
                if deadline > now {
                    thread::sleep(deadline - now);
                } else {
                    // Running late: don't try to catch up.
                    deadline = now;
                }
            }
        }

        if let Err(err) = self.mmu.cart.flush_save() {
            warn!("Final save flush failed: {err}");
        }
    }

    fn service_interrupts(&mut self) -> bool {
        let pending = self.mmu.read_byte(IE) & self.mmu.read_byte(IF) & 0x1F;
        if pending == 0 {
            return false;
        }
        if !self.cpu.ime {
            self.cpu.halted = false;
            return false;
        }
        let Some(irq) = Interrupt::highest(pending) else {
            return false;
        };

        let flags = self.mmu.read_byte(IF) & !irq.bit();
        self.mmu.write_internal(IF, flags);
        self.cpu.ime = false;
        self.cpu.halted = false;
        let pc = self.cpu.pc;
        opcode::push(&mut self.cpu, &mut self.mmu, pc);
        self.cpu.pc = irq.vector();
        #[cfg(feature = "cpu-trace")]
        trace!("Interrupt {irq:?} -> {:04X}", self.cpu.pc);
        true
    }

    fn deliver_frame(&mut self) {
        let Some(pixels) = self.mmu.ppu.take_frame() else {
            return;
        };
        self.frames += 1;
        if let Some(sink) = self.frame_sink.as_mut() {
            sink(Frame {
                pixels,
                number: self.frames,
            });
        }
    }

    fn fault(&mut self, err: EmuError) {
        error!("Execution halted: {err} [{}]", self.cpu.debug_state());
        self.faulted = true;
        self.mmu.force_render();
        self.deliver_frame();
        if let Some(sink) = self.fault_sink.as_mut() {
            sink(&err);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn machine(program: &[u8]) -> GameBoy {
        let mut rom = vec![0u8; 0x8000];
        rom[0x100..0x100 + program.len()].copy_from_slice(program);
        let cart = Cartridge::from_bytes(rom).unwrap();
        let options = SystemOptions {
            pace: false,
            ..SystemOptions::default()
        };
        GameBoy::new(cart, SharedJoypad::default(), options).unwrap()
    }

    #[test]
    fn skipping_boot_starts_at_cartridge_entry() {
        let gb = machine(&[]);
        assert_eq!(gb.cpu.pc, 0x0100);
        assert_eq!(gb.cpu.af(), 0x01B0);
        assert!(!gb.mmu.in_boot());
        assert_eq!(gb.mmu.read_byte(0xFF40), 0x91);
    }

    #[test]
    fn boot_overlay_is_left_at_0x100() {
        let mut rom = vec![0u8; 0x8000];
        rom[0x100] = 0x00;
        let cart = Cartridge::from_bytes(rom).unwrap();
        // LD SP,n16 then JP 0x00FF, where a NOP runs into 0x0100.
        let mut boot = vec![0u8; 0x100];
        boot[..6].copy_from_slice(&[0x31, 0xFE, 0xFF, 0xC3, 0xFF, 0x00]);
        let options = SystemOptions {
            boot_rom: Some(boot),
            pace: false,
            ..SystemOptions::default()
        };
        let mut gb = GameBoy::new(cart, SharedJoypad::default(), options).unwrap();
        assert!(gb.mmu.in_boot());
        gb.step().unwrap();
        gb.step().unwrap();
        assert_eq!(gb.cpu.pc, 0x00FF);
        assert!(gb.mmu.in_boot());
        gb.step().unwrap();
        assert_eq!(gb.cpu.pc, 0x0100);
        assert!(!gb.mmu.in_boot());
    }

    #[test]
    fn frame_budget_delivers_one_frame() {
        // JR -2: spin forever.
        let mut gb = machine(&[0x18, 0xFE]);
        let (tx, rx) = std::sync::mpsc::channel();
        gb.on_frame(move |f| tx.send(f.pixels.len()).unwrap());
        for _ in 0..3 {
            assert!(gb.run_frame());
        }
        let delivered: Vec<usize> = rx.try_iter().collect();
        assert!(!delivered.is_empty());
        assert!(delivered.iter().all(|&len| len == 160 * 144 * 3));
    }
}
