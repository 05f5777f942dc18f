use log::{debug, info};

use crate::{
    cartridge::Cartridge,
    joypad::{Joypad, SharedJoypad},
    memory_map::{
        BG_TILE_MAP_0, BG_TILE_MAP_1, BGP, BOOT_OFF, BOOT_ROM, CARTRIDGE_RAM, CARTRIDGE_ROM, DMA,
        ECHO_RAM, IE, IF, JOYP, JOYPAD_REGISTER, LCD_REGISTERS, LCDC, MemoryRange, OAM, OBP0, OBP1,
        SC, SERIAL_REGISTERS, STAT, TAC, TILE_DATA, TIMER_REGISTERS, WORK_RAM,
    },
    ppu::Ppu,
    serial::Serial,
    timer::Timer,
};

const ADDRESS_SPACE: usize = 0x10000;

/// Component notified after a game write lands in one of its ranges.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Owner {
    Ppu,
    Timer,
    Joypad,
    Serial,
}

/// Write-notification table, checked in order on every game write.
pub const WRITE_LISTENERS: [(MemoryRange, Owner); 8] = [
    (TILE_DATA, Owner::Ppu),
    (BG_TILE_MAP_0, Owner::Ppu),
    (BG_TILE_MAP_1, Owner::Ppu),
    (OAM, Owner::Ppu),
    (LCD_REGISTERS, Owner::Ppu),
    (TIMER_REGISTERS, Owner::Timer),
    (JOYPAD_REGISTER, Owner::Joypad),
    (SERIAL_REGISTERS, Owner::Serial),
];

// I/O state the DMG boot ROM leaves behind (gbdev.io/pandocs/Power_Up_State.html).
// LCDC goes last so the PPU starts with its palettes already decoded.
const POST_BOOT_IO: [(u16, u8); 8] = [
    (JOYP, 0xCF),
    (SC, 0x7E),
    (TAC, 0xF8),
    (IF, 0xE1),
    (BGP, 0xFC),
    (OBP0, 0xFF),
    (OBP1, 0xFF),
    (LCDC, 0x91),
];

/// The 64K address space: a flat byte array plus the components that own
/// parts of it.
pub struct Mmu {
    memory: Box<[u8; ADDRESS_SPACE]>,
    pub cart: Cartridge,
    boot_rom: Option<Vec<u8>>,
    in_boot: bool,
    pub ppu: Ppu,
    pub timer: Timer,
    pub joypad: Joypad,
    pub serial: Serial,
}

impl Mmu {
    /// With a boot image the overlay is mapped until [`Mmu::leave_boot`].
    pub fn new(
        cart: Cartridge,
        boot_rom: Option<Vec<u8>>,
        joypad: SharedJoypad,
        debug_buffers: bool,
    ) -> Self {
        Self {
            memory: Box::new([0; ADDRESS_SPACE]),
            cart,
            in_boot: boot_rom.is_some(),
            boot_rom,
            ppu: Ppu::new(debug_buffers),
            timer: Timer::new(),
            joypad: Joypad::new(joypad),
            serial: Serial::new(),
        }
    }

    pub fn in_boot(&self) -> bool {
        self.in_boot
    }

    pub fn leave_boot(&mut self) {
        if self.in_boot {
            self.in_boot = false;
            info!("Left boot ROM");
        }
    }

    /// Program the I/O registers the way the boot ROM leaves them.
    pub fn apply_post_boot_io(&mut self) {
        for (addr, value) in POST_BOOT_IO {
            self.write_byte(addr, value);
        }
        self.memory[STAT as usize] = 0x85 & 0xF8 | (self.memory[STAT as usize] & 0x07);
        self.memory[DMA as usize] = 0xFF;
        self.memory[IE as usize] = 0x00;
    }

    pub fn read_byte(&self, addr: u16) -> u8 {
        if self.in_boot
            && BOOT_ROM.contains(addr)
            && let Some(byte) = self.boot_rom.as_ref().and_then(|b| b.get(addr as usize))
        {
            return *byte;
        }
        if CARTRIDGE_ROM.contains(addr) || CARTRIDGE_RAM.contains(addr) {
            return self.cart.read(addr);
        }
        if addr == JOYP {
            return self.joypad.read(self.memory[JOYP as usize]);
        }
        self.memory[mirror(addr) as usize]
    }

    pub fn write_byte(&mut self, addr: u16, value: u8) {
        if CARTRIDGE_ROM.contains(addr) || CARTRIDGE_RAM.contains(addr) {
            self.cart.write(addr, value);
            return;
        }
        if addr == DMA {
            self.memory[DMA as usize] = value;
            self.oam_dma(value);
            return;
        }
        if addr == BOOT_OFF && value != 0 {
            self.leave_boot();
        }

        self.memory[mirror(addr) as usize] = value;
        for (range, owner) in WRITE_LISTENERS {
            if range.contains(addr) {
                self.notify(owner, addr);
            }
        }
    }

    /// Little-endian; built from two byte reads.
    pub fn read_word(&self, addr: u16) -> u16 {
        let lo = self.read_byte(addr) as u16;
        let hi = self.read_byte(addr.wrapping_add(1)) as u16;
        (hi << 8) | lo
    }

    /// Little-endian; high byte first, so listeners see two writes.
    pub fn write_word(&mut self, addr: u16, value: u16) {
        self.write_byte(addr.wrapping_add(1), (value >> 8) as u8);
        self.write_byte(addr, value as u8);
    }

    /// Store without routing or notifications (hardware-side updates).
    pub fn write_internal(&mut self, addr: u16, value: u8) {
        self.memory[addr as usize] = value;
    }

    pub fn step_ppu(&mut self, cycles: u32) {
        self.ppu.step(cycles, &mut self.memory[..]);
    }

    pub fn step_timer(&mut self, cycles: u32) {
        self.timer.step(cycles, &mut self.memory[..]);
    }

    pub fn poll_joypad(&mut self) {
        self.joypad.poll(&mut self.memory[..]);
    }

    pub fn reset_div(&mut self) {
        self.timer.reset_div(&mut self.memory[..]);
    }

    pub fn force_render(&mut self) {
        self.ppu.force_render(&self.memory[..]);
    }

    fn notify(&mut self, owner: Owner, addr: u16) {
        let memory = &mut self.memory[..];
        match owner {
            Owner::Ppu => self.ppu.on_write(addr, memory),
            Owner::Timer => self.timer.on_write(addr, memory),
            Owner::Joypad => self.joypad.on_write(addr, memory),
            Owner::Serial => self.serial.on_write(addr, memory),
        }
    }

    fn oam_dma(&mut self, value: u8) {
        let source = (value as u16) << 8;
        debug!("OAM DMA from {source:04X}");
        for i in 0..OAM.len() {
            let byte = self.read_byte(source.wrapping_add(i as u16));
            self.memory[OAM.start as usize + i] = byte;
        }
        self.ppu.refresh_sprites(&self.memory[..]);
    }
}

/// Echo RAM aliases the first 0x1E00 bytes of work RAM.
#[inline]
fn mirror(addr: u16) -> u16 {
    if ECHO_RAM.contains(addr) {
        addr - (ECHO_RAM.start - WORK_RAM.start)
    } else {
        addr
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mmu_with(boot: Option<Vec<u8>>) -> Mmu {
        let mut rom = vec![0u8; 0x8000];
        rom[0x0000] = 0xC3;
        let cart = Cartridge::from_bytes(rom).unwrap();
        Mmu::new(cart, boot, SharedJoypad::default(), false)
    }

    #[test]
    fn echo_ram_mirrors_work_ram() {
        let mut mmu = mmu_with(None);
        mmu.write_byte(0xE010, 0xAB);
        assert_eq!(mmu.read_byte(0xC010), 0xAB);
        mmu.write_byte(0xC123, 0xCD);
        assert_eq!(mmu.read_byte(0xE123), 0xCD);
    }

    #[test]
    fn boot_overlay_until_left() {
        let mut mmu = mmu_with(Some(vec![0x31; 0x100]));
        assert!(mmu.in_boot());
        assert_eq!(mmu.read_byte(0x0000), 0x31);
        assert_eq!(mmu.read_byte(0x0100), 0x00);
        mmu.leave_boot();
        assert_eq!(mmu.read_byte(0x0000), 0xC3);
    }

    #[test]
    fn boot_off_register_unmaps_overlay() {
        let mut mmu = mmu_with(Some(vec![0x31; 0x100]));
        mmu.write_byte(BOOT_OFF, 0x00);
        assert!(mmu.in_boot());
        mmu.write_byte(BOOT_OFF, 0x01);
        assert!(!mmu.in_boot());
    }

    #[test]
    fn words_are_little_endian() {
        let mut mmu = mmu_with(None);
        mmu.write_word(0xC000, 0xBEEF);
        assert_eq!(mmu.read_byte(0xC000), 0xEF);
        assert_eq!(mmu.read_byte(0xC001), 0xBE);
        assert_eq!(mmu.read_word(0xC000), 0xBEEF);
    }

    #[test]
    fn every_listener_range_is_inside_the_io_vram_or_oam_windows() {
        for (range, _) in WRITE_LISTENERS {
            assert!(!CARTRIDGE_ROM.contains(range.start));
            assert!(!CARTRIDGE_RAM.contains(range.start));
        }
    }
}
