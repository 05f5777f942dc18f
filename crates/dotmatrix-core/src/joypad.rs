use std::sync::{Arc, Mutex, PoisonError};

use crate::interrupt::{self, Interrupt};

/// Buttons currently held by the player. Shared with the host, which
/// updates it from its own input source.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct JoypadState {
    pub start: bool,
    pub select: bool,
    pub a: bool,
    pub b: bool,
    pub up: bool,
    pub down: bool,
    pub left: bool,
    pub right: bool,
}

impl JoypadState {
    /// Low nibble for the direction keys, 0 = pressed.
    fn directions(&self) -> u8 {
        !(bit(self.down, 0x08) | bit(self.up, 0x04) | bit(self.left, 0x02) | bit(self.right, 0x01))
            & 0x0F
    }

    /// Low nibble for the action buttons, 0 = pressed.
    fn buttons(&self) -> u8 {
        !(bit(self.start, 0x08) | bit(self.select, 0x04) | bit(self.b, 0x02) | bit(self.a, 0x01))
            & 0x0F
    }
}

fn bit(on: bool, mask: u8) -> u8 {
    if on { mask } else { 0 }
}

pub type SharedJoypad = Arc<Mutex<JoypadState>>;

/// The 0xFF00 latch.
#[derive(Debug)]
pub struct Joypad {
    state: SharedJoypad,
    /// Snapshot from the last poll, used for press edge detection.
    last: JoypadState,
}

impl Joypad {
    pub fn new(state: SharedJoypad) -> Self {
        Self {
            state,
            last: JoypadState::default(),
        }
    }

    fn current(&self) -> JoypadState {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Compose the register from the select bits the game last wrote.
    pub fn read(&self, select: u8) -> u8 {
        let state = self.current();
        let mut low = 0x0F;
        if select & 0x10 == 0 {
            low &= state.directions();
        }
        if select & 0x20 == 0 {
            low &= state.buttons();
        }
        0xC0 | (select & 0x30) | low
    }

    /// Only the two select bits are writable.
    pub fn on_write(&mut self, addr: u16, memory: &mut [u8]) {
        let cell = &mut memory[addr as usize];
        *cell = 0xC0 | (*cell & 0x30) | 0x0F;
    }

    /// Sample the shared state once per frame; a newly pressed key requests
    /// the joypad interrupt.
    pub fn poll(&mut self, memory: &mut [u8]) {
        let now = self.current();
        let pressed = (!now.directions() & self.last.directions())
            | (!now.buttons() & self.last.buttons());
        if pressed & 0x0F != 0 {
            interrupt::request(memory, Interrupt::Joypad);
        }
        self.last = now;
    }
}
