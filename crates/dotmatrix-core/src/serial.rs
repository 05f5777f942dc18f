use crate::{
    interrupt::{self, Interrupt},
    memory_map::{SB, SC},
};

/// Serial port with no cable attached.
///
/// Transfers complete instantly: the outgoing byte is captured (test ROMs
/// print their results this way), the line reads back 0xFF and the serial
/// interrupt is requested.
#[derive(Debug, Default)]
pub struct Serial {
    out_buf: Vec<u8>,
}

impl Serial {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_write(&mut self, addr: u16, memory: &mut [u8]) {
        if addr != SC || memory[SC as usize] & 0x80 == 0 {
            return;
        }
        self.out_buf.push(memory[SB as usize]);
        memory[SB as usize] = 0xFF;
        memory[SC as usize] &= 0x7F;
        interrupt::request(memory, Interrupt::Serial);
    }

    pub fn output(&self) -> &[u8] {
        &self.out_buf
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory_map::IF;

    #[test]
    fn transfer_start_captures_byte() {
        let mut serial = Serial::new();
        let mut mem = vec![0u8; 0x10000];
        mem[SB as usize] = b'P';
        serial.on_write(SB, &mut mem);
        assert!(serial.output().is_empty());

        mem[SC as usize] = 0x81;
        serial.on_write(SC, &mut mem);
        assert_eq!(serial.output(), b"P");
        assert_eq!(mem[SB as usize], 0xFF);
        assert_eq!(mem[SC as usize], 0x01);
        assert_eq!(mem[IF as usize], 0x08);
    }
}
