use crate::memory_map::IF;

/// Interrupt sources in service priority order (gbdev.io/pandocs/Interrupts.html).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interrupt {
    VBlank,
    LcdStat,
    Timer,
    Serial,
    Joypad,
}

impl Interrupt {
    /// Highest priority first.
    pub const PRIORITY: [Interrupt; 5] = [
        Interrupt::VBlank,
        Interrupt::LcdStat,
        Interrupt::Timer,
        Interrupt::Serial,
        Interrupt::Joypad,
    ];

    /// Bit in IF/IE.
    pub const fn bit(self) -> u8 {
        match self {
            Interrupt::VBlank => 0x01,
            Interrupt::LcdStat => 0x02,
            Interrupt::Timer => 0x04,
            Interrupt::Serial => 0x08,
            Interrupt::Joypad => 0x10,
        }
    }

    pub const fn vector(self) -> u16 {
        match self {
            Interrupt::VBlank => 0x0040,
            Interrupt::LcdStat => 0x0048,
            Interrupt::Timer => 0x0050,
            Interrupt::Serial => 0x0058,
            Interrupt::Joypad => 0x0060,
        }
    }

    /// Highest priority interrupt whose bit is set in `pending`.
    pub fn highest(pending: u8) -> Option<Interrupt> {
        Self::PRIORITY
            .into_iter()
            .find(|irq| pending & irq.bit() != 0)
    }
}

/// Set the request bit for `irq` in the IF register held in `memory`.
#[inline]
pub fn request(memory: &mut [u8], irq: Interrupt) {
    memory[IF as usize] |= irq.bit();
}
