use std::io;

use thiserror::Error;

/// Errors surfaced by the emulation core.
#[derive(Debug, Error)]
pub enum EmuError {
    /// The cartridge header names a controller this core does not emulate.
    #[error("unsupported cartridge type 0x{0:02X}")]
    UnsupportedCartridge(u8),

    /// An unofficial opcode reached the execute stage.
    #[error("invalid opcode 0x{opcode:02X}{} at PC={pc:04X}", prefix_note(.prefixed))]
    InvalidOpcode { opcode: u8, prefixed: bool, pc: u16 },

    /// A dispatch table slot does not hold the opcode its index implies.
    #[error("opcode table slot {index:02X} holds opcode {id:02X}")]
    OpcodeTableMismatch { index: u8, id: u8 },

    /// Something tried to store through an operand that can only be read.
    #[error("operand {0} is read-only")]
    ReadOnlyOperand(String),

    #[error(transparent)]
    Io(#[from] io::Error),
}

fn prefix_note(prefixed: &bool) -> &'static str {
    if *prefixed { " (CB-prefixed)" } else { "" }
}
