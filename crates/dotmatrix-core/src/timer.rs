use crate::{
    interrupt::{self, Interrupt},
    memory_map::{DIV, TAC, TIMA, TMA},
};

/// Cycles per DIV increment (16384 Hz).
const DIV_PERIOD: u32 = 256;

/// Divider and programmable timer. DIV, TIMA, TMA and TAC live in the
/// memory array; the timer only keeps its cycle accumulators and a decoded
/// copy of TAC.
#[derive(Debug, Clone)]
pub struct Timer {
    div_cycles: u32,
    tima_cycles: u32,
    enabled: bool,
    /// Cycles per TIMA increment for the selected TAC frequency.
    period: u32,
}

impl Timer {
    pub fn new() -> Self {
        Self {
            div_cycles: 0,
            tima_cycles: 0,
            enabled: false,
            period: Self::period_for(0),
        }
    }

    /// Cycles per tick for TAC bits 0-1.
    pub const fn period_for(tac: u8) -> u32 {
        match tac & 0x03 {
            0x00 => 1024,
            0x01 => 16,
            0x02 => 64,
            _ => 256,
        }
    }

    pub fn enabled(&self) -> bool {
        self.enabled
    }

    pub fn period(&self) -> u32 {
        self.period
    }

    /// React to a game write into 0xFF04-0xFF07. The value has already been
    /// stored in `memory`.
    pub fn on_write(&mut self, addr: u16, memory: &mut [u8]) {
        match addr {
            DIV => self.reset_div(memory),
            TAC => {
                let tac = memory[TAC as usize];
                self.enabled = tac & 0x04 != 0;
                self.period = Self::period_for(tac);
            }
            // TIMA and TMA are read straight from memory when needed.
            _ => {}
        }
    }

    /// Any write to DIV (and STOP) clears it.
    pub fn reset_div(&mut self, memory: &mut [u8]) {
        self.div_cycles = 0;
        memory[DIV as usize] = 0;
    }

    /// Advance by `cycles` CPU cycles, requesting the timer interrupt on
    /// TIMA overflow.
    pub fn step(&mut self, cycles: u32, memory: &mut [u8]) {
        self.div_cycles += cycles;
        while self.div_cycles >= DIV_PERIOD {
            self.div_cycles -= DIV_PERIOD;
            let div = &mut memory[DIV as usize];
            *div = div.wrapping_add(1);
        }

        if !self.enabled {
            return;
        }
        self.tima_cycles += cycles;
        while self.tima_cycles >= self.period {
            self.tima_cycles -= self.period;
            self.increment_tima(memory);
        }
    }

    fn increment_tima(&mut self, memory: &mut [u8]) {
        let (next, overflow) = memory[TIMA as usize].overflowing_add(1);
        if overflow {
            memory[TIMA as usize] = memory[TMA as usize];
            interrupt::request(memory, Interrupt::Timer);
        } else {
            memory[TIMA as usize] = next;
        }
    }
}

impl Default for Timer {
    fn default() -> Self {
        Self::new()
    }
}
