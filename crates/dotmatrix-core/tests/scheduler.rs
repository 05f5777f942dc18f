mod common;

use std::sync::{
    Arc, Mutex,
    atomic::{AtomicBool, Ordering},
};

use common::{machine, machine_from_rom, rom_with_program};
use dotmatrix_core::{
    EmuError,
    memory_map::{DIV, IE, IF, LCDC, TAC, TIMA, TMA},
    palette::SHADES_RGB,
    ppu::PpuMode,
};

#[test]
fn ei_takes_effect_after_the_next_instruction() {
    // EI; NOP; NOP
    let mut gb = machine(&[0xFB, 0x00, 0x00]);
    gb.cpu.sp = 0xDFFE;
    gb.mmu.write_byte(IE, 0x04);
    gb.mmu.write_byte(IF, 0x04);

    gb.step().unwrap();
    assert!(!gb.cpu.ime);
    assert_eq!(gb.cpu.pc, 0x0101);

    gb.step().unwrap();
    assert!(gb.cpu.ime);
    assert_eq!(gb.cpu.pc, 0x0102);

    let cycles = gb.step().unwrap();
    assert_eq!(cycles, 20 + 4);
    assert_eq!(gb.cpu.pc, 0x0051);
    assert!(!gb.cpu.ime);
    assert_eq!(gb.mmu.read_word(gb.cpu.sp), 0x0102);
    assert_eq!(gb.mmu.read_byte(IF) & 0x04, 0);
}

#[test]
fn di_cancels_a_pending_ei() {
    // EI; DI; NOP
    let mut gb = machine(&[0xFB, 0xF3, 0x00]);
    gb.step().unwrap();
    gb.step().unwrap();
    gb.step().unwrap();
    assert!(!gb.cpu.ime);
}

#[test]
fn interrupts_are_serviced_by_priority() {
    let mut gb = machine(&[]);
    gb.cpu.sp = 0xDFFE;
    gb.cpu.ime = true;
    gb.mmu.write_byte(IE, 0x1F);
    gb.mmu.write_byte(IF, 0x06); // LCD STAT + Timer

    gb.step().unwrap();
    assert_eq!(gb.cpu.pc, 0x0049);
    assert_eq!(gb.mmu.read_byte(IF) & 0x1F, 0x04);
}

#[test]
fn disabled_interrupt_is_not_serviced() {
    let mut gb = machine(&[]);
    gb.cpu.ime = true;
    gb.mmu.write_byte(IE, 0x00);
    gb.mmu.write_byte(IF, 0x1F);
    gb.step().unwrap();
    assert_eq!(gb.cpu.pc, 0x0101);
}

#[test]
fn halt_resumes_without_servicing_when_ime_is_off() {
    // HALT; NOP
    let mut gb = machine(&[0x76, 0x00]);
    gb.mmu.write_byte(IE, 0x04);
    gb.mmu.write_byte(IF, 0x00);

    gb.step().unwrap();
    assert!(gb.cpu.halted);
    assert_eq!(gb.cpu.pc, 0x0101);

    assert_eq!(gb.step().unwrap(), 4);
    assert_eq!(gb.cpu.pc, 0x0101);

    gb.mmu.write_byte(IF, 0x04);
    gb.step().unwrap();
    assert!(!gb.cpu.halted);
    assert_eq!(gb.cpu.pc, 0x0102);
    assert_eq!(gb.mmu.read_byte(IF) & 0x04, 0x04);
}

#[test]
fn timer_overflow_reaches_its_vector() {
    let mut gb = machine(&[]);
    gb.cpu.sp = 0xDFFE;
    gb.cpu.ime = true;
    gb.mmu.write_byte(IE, 0x04);
    gb.mmu.write_byte(TMA, 0xAB);
    gb.mmu.write_byte(TIMA, 0xFF);
    gb.mmu.write_byte(TAC, 0x05); // enabled, 16 cycles

    let reached = (0..16).any(|_| {
        gb.step().unwrap();
        (0x0050..0x0058).contains(&gb.cpu.pc)
    });
    assert!(reached);
    assert_eq!(gb.mmu.read_byte(TIMA) & 0xF0, 0xA0);
}

#[test]
fn stop_resets_divider_and_publishes_frame() {
    let mut gb = machine(&[0x10, 0x00]);
    gb.mmu.write_internal(DIV, 0x42);
    gb.step().unwrap();
    assert_eq!(gb.mmu.read_byte(DIV), 0);
    assert!(gb.cpu.halted);
    assert!(gb.mmu.ppu.frame_ready());
}

#[test]
fn fault_stops_execution_and_notifies_once() {
    // NOP; invalid
    let mut gb = machine(&[0x00, 0xD3]);
    let faults = Arc::new(Mutex::new(Vec::new()));
    let seen = Arc::clone(&faults);
    gb.on_fault(move |err| seen.lock().unwrap().push(err.to_string()));
    let frames = Arc::new(Mutex::new(0));
    let count = Arc::clone(&frames);
    gb.on_frame(move |_| *count.lock().unwrap() += 1);

    assert!(!gb.run_frame());
    assert!(gb.faulted());
    assert_eq!(gb.cpu.pc, 0x0101);
    assert_eq!(*frames.lock().unwrap(), 1);

    assert!(!gb.run_frame());
    assert_eq!(gb.cpu.pc, 0x0101);
    let faults = faults.lock().unwrap();
    assert_eq!(faults.len(), 1);
    assert!(faults[0].contains("0xD3"));
}

#[test]
fn step_error_is_returned_to_the_caller() {
    let mut gb = machine(&[0xDD]);
    assert!(matches!(
        gb.step(),
        Err(EmuError::InvalidOpcode { opcode: 0xDD, prefixed: false, pc: 0x0100 })
    ));
}

#[test]
fn devices_see_interrupt_cycles_when_the_handler_faults() {
    let mut rom = rom_with_program(&[0x00; 17]);
    rom[0x0040] = 0xD3; // VBlank vector
    let mut gb = machine_from_rom(rom, false);
    for _ in 0..17 {
        gb.step().unwrap();
    }
    assert_eq!(gb.mmu.ppu.mode(), PpuMode::ScanlineOam);

    gb.cpu.ime = true;
    gb.mmu.write_byte(IE, 0x01);
    gb.mmu.write_byte(IF, 0x01);
    assert!(matches!(
        gb.step(),
        Err(EmuError::InvalidOpcode { opcode: 0xD3, pc: 0x0040, .. })
    ));
    // 68 + 20 cycles crosses the 80-cycle OAM scan.
    assert_eq!(gb.mmu.ppu.mode(), PpuMode::ScanlineVram);
}

#[test]
fn debug_images_survive_any_frame_boundary() {
    // JR -2
    let mut gb = machine_from_rom(rom_with_program(&[0x18, 0xFE]), true);
    // Frame and PPU boundaries drift apart, so some of these stops land
    // mid-frame.
    for n in 0..30 {
        assert!(gb.run_frame());
        let buffers = gb.mmu.ppu.debug_buffers().unwrap();
        assert_eq!(buffers.background[..3], SHADES_RGB[0], "frame {n}");
    }
}

#[test]
fn display_off_presents_blank_frames() {
    // XOR A; LDH (0x40),A; JR -2
    let mut gb = machine(&[0xAF, 0xE0, 0x40, 0x18, 0xFE]);
    let last = Arc::new(Mutex::new(None));
    let sink = Arc::clone(&last);
    gb.on_frame(move |frame| *sink.lock().unwrap() = Some(frame.pixels));

    assert!(gb.run_frame());
    assert_eq!(gb.mmu.read_byte(LCDC), 0x00);
    let frame = last.lock().unwrap().take().unwrap();
    assert!(frame.chunks_exact(3).all(|px| px == SHADES_RGB[0]));
}

#[test]
fn run_stops_when_cancelled_between_frames() {
    let mut gb = machine(&[0x18, 0xFE]);
    let cancel = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&cancel);
    gb.on_frame(move |frame| {
        if frame.number >= 3 {
            flag.store(true, Ordering::Relaxed);
        }
    });
    gb.run(&cancel);
    assert!(cancel.load(Ordering::Relaxed));
    assert_eq!(gb.frames(), 3);
    assert!(!gb.faulted());
}

#[test]
fn run_returns_immediately_when_already_cancelled() {
    let mut gb = machine(&[0x18, 0xFE]);
    let cancel = AtomicBool::new(true);
    gb.run(&cancel);
    assert_eq!(gb.frames(), 0);
    assert_eq!(gb.cpu.pc, 0x0100);
}

#[test]
fn serial_output_is_captured() {
    // LD A,'O'; LDH (SB),A; LD A,0x81; LDH (SC),A; LD A,'K'; LDH (SB),A; LD A,0x81; LDH (SC),A
    let mut gb = machine(&[
        0x3E, b'O', 0xE0, 0x01, 0x3E, 0x81, 0xE0, 0x02, 0x3E, b'K', 0xE0, 0x01, 0x3E, 0x81, 0xE0,
        0x02,
    ]);
    for _ in 0..8 {
        gb.step().unwrap();
    }
    assert_eq!(gb.serial_output(), b"OK");
}
