//! Original Game Boy (DMG) emulation core.
//!
//! The crate is host-agnostic: it owns the CPU, memory map, PPU, timer,
//! joypad and cartridge controllers, and hands finished frames to whatever
//! drives the [`gameboy`] facade. The `dotmatrix` binary is one such host.

/// Battery-backed cartridge RAM and its background save thread.
pub mod battery;

/// ROM image, header parsing and controller wiring.
pub mod cartridge;

/// SM83 register file.
pub mod cpu;

/// Debug images (background map, window, sprites, tile sheets).
pub mod debug_view;

/// Core error type.
pub mod error;

/// Machine facade and scheduler.
pub mod gameboy;

/// Interrupt sources, priorities and vectors.
pub mod interrupt;

/// Button state shared with the host and the JOYP register.
pub mod joypad;

/// Memory bank controllers.
pub mod mbc;

/// Named address ranges and register addresses.
pub mod memory_map;

/// Address decoding and write routing.
pub mod mmu;

/// Instruction semantics.
pub mod opcode;

/// Primary and CB-prefixed dispatch tables.
pub mod opcode_table;

/// Addressing modes.
pub mod operand;

/// Shade palettes.
pub mod palette;

/// Scanline renderer and LCD mode state machine.
pub mod ppu;

/// Serial port capture.
pub mod serial;

/// OAM entries.
pub mod sprite;

/// Decoded tile data.
pub mod tile;

/// Divider and timer unit.
pub mod timer;

pub use error::EmuError;
pub use gameboy::{Frame, GameBoy, SystemOptions};
