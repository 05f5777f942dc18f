use std::collections::VecDeque;

#[cfg(feature = "ppu-trace")]
use log::trace;
use log::debug;

use crate::{
    debug_view::DebugBuffers,
    interrupt::{self, Interrupt},
    memory_map::{
        BG_TILE_MAP_0, BG_TILE_MAP_1, BGP, LCDC, LY, LYC, OAM, OBP0, OBP1, SCX, SCY, STAT,
        TILE_DATA, WX, WY,
    },
    palette::{Palette, SHADES_RGB},
    sprite::{self, SPRITE_COUNT, Sprite},
    tile::TileSet,
};

// Screen resolution used by the Game Boy PPU
pub const SCREEN_WIDTH: usize = 160;
pub const SCREEN_HEIGHT: usize = 144;
/// RGB bytes in one frame.
pub const FRAME_BYTES: usize = SCREEN_WIDTH * SCREEN_HEIGHT * 3;

// Timing constants per LCD mode in T-cycles
const MODE0_CYCLES: u32 = 204; // HBlank
const MODE1_CYCLES: u32 = 456; // One line during VBlank
const MODE2_CYCLES: u32 = 80; // OAM scan
const MODE3_CYCLES: u32 = 172; // Pixel transfer

const LAST_VISIBLE_LINE: u8 = 143;
const LAST_LINE: u8 = 153;

// Window X position is clipped if greater than this value
const WINDOW_X_MAX: u8 = 166;

// STAT interrupt source enables
const STAT_HBLANK_IRQ: u8 = 0x08;
const STAT_VBLANK_IRQ: u8 = 0x10;
const STAT_OAM_IRQ: u8 = 0x20;
const STAT_LYC_IRQ: u8 = 0x40;
const STAT_COINCIDENCE: u8 = 0x04;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PpuMode {
    HorizontalBlank,
    VerticalBlank,
    ScanlineOam,
    ScanlineVram,
}

impl PpuMode {
    /// Cycle budget of one pass through this mode.
    pub const fn cycles(self) -> u32 {
        match self {
            PpuMode::HorizontalBlank => MODE0_CYCLES,
            PpuMode::VerticalBlank => MODE1_CYCLES,
            PpuMode::ScanlineOam => MODE2_CYCLES,
            PpuMode::ScanlineVram => MODE3_CYCLES,
        }
    }

    /// Value of STAT bits 0-1.
    pub const fn stat_bits(self) -> u8 {
        match self {
            PpuMode::HorizontalBlank => 0,
            PpuMode::VerticalBlank => 1,
            PpuMode::ScanlineOam => 2,
            PpuMode::ScanlineVram => 3,
        }
    }
}

/// Decoded LCDC register.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Lcdc {
    pub display: bool,
    /// Window map at 0x9C00 instead of 0x9800.
    pub window_map_high: bool,
    pub window: bool,
    /// Background/window tiles addressed unsigned from 0x8000.
    pub unsigned_tiles: bool,
    pub bg_map_high: bool,
    pub tall_sprites: bool,
    pub sprites: bool,
    pub background: bool,
}

impl Lcdc {
    pub fn from_byte(v: u8) -> Self {
        Self {
            display: v & 0x80 != 0,
            window_map_high: v & 0x40 != 0,
            window: v & 0x20 != 0,
            unsigned_tiles: v & 0x10 != 0,
            bg_map_high: v & 0x08 != 0,
            tall_sprites: v & 0x04 != 0,
            sprites: v & 0x02 != 0,
            background: v & 0x01 != 0,
        }
    }

    fn bg_map(&self) -> usize {
        if self.bg_map_high {
            BG_TILE_MAP_1.start as usize
        } else {
            BG_TILE_MAP_0.start as usize
        }
    }

    fn window_map(&self) -> usize {
        if self.window_map_high {
            BG_TILE_MAP_1.start as usize
        } else {
            BG_TILE_MAP_0.start as usize
        }
    }
}

/// Sprite pixel that survived transparency.
struct SpritePixel {
    colour: u8,
    above_background: bool,
    palette1: bool,
}

fn blank_frame() -> Box<[u8]> {
    let mut frame = vec![0u8; FRAME_BYTES].into_boxed_slice();
    for px in frame.chunks_exact_mut(3) {
        px.copy_from_slice(&SHADES_RGB[0]);
    }
    frame
}

/// Scanline state machine and renderer.
///
/// Registers live in the shared memory array; the PPU keeps decoded copies
/// (LCDC, palettes, tiles, sprites) refreshed by write notifications.
#[derive(Debug)]
pub struct Ppu {
    mode: PpuMode,
    clock: u32,
    line: u8,
    /// Window rows drawn so far this frame.
    window_line: u8,
    coincidence: bool,

    lcdc: Lcdc,
    scy: u8,
    scx: u8,
    wy: u8,
    wx: u8,
    bgp: Palette,
    obp0: Palette,
    obp1: Palette,

    tiles: TileSet,
    sprites: [Sprite; SPRITE_COUNT],
    /// OAM indices drawn on the current line, leftmost first.
    line_sprites: Vec<usize>,
    /// Scroll/window writes made during pixel transfer, applied at HBlank.
    deferred: VecDeque<(u16, u8)>,

    frame: Box<[u8]>,
    frame_ready: bool,
    /// Debug images being drawn this frame.
    debug: Option<DebugBuffers>,
    /// Debug images of the last published frame.
    debug_shown: Option<DebugBuffers>,
}

impl Ppu {
    pub fn new(debug_buffers: bool) -> Self {
        Self {
            mode: PpuMode::ScanlineOam,
            clock: 0,
            line: 0,
            window_line: 0,
            coincidence: false,
            lcdc: Lcdc::default(),
            scy: 0,
            scx: 0,
            wy: 0,
            wx: 0,
            bgp: Palette::new(0, false),
            obp0: Palette::new(0, true),
            obp1: Palette::new(0, true),
            tiles: TileSet::default(),
            sprites: [Sprite::default(); SPRITE_COUNT],
            line_sprites: Vec::with_capacity(sprite::MAX_SPRITES_PER_LINE),
            deferred: VecDeque::new(),
            frame: blank_frame(),
            frame_ready: false,
            debug: debug_buffers.then(|| DebugBuffers::new(SCREEN_WIDTH, SCREEN_HEIGHT)),
            debug_shown: debug_buffers.then(|| DebugBuffers::new(SCREEN_WIDTH, SCREEN_HEIGHT)),
        }
    }

    pub fn mode(&self) -> PpuMode {
        self.mode
    }

    pub fn line(&self) -> u8 {
        self.line
    }

    pub fn lcdc(&self) -> Lcdc {
        self.lcdc
    }

    pub fn display_enabled(&self) -> bool {
        self.lcdc.display
    }

    pub fn frame(&self) -> &[u8] {
        &self.frame
    }

    pub fn frame_ready(&self) -> bool {
        self.frame_ready
    }

    pub fn sprite(&self, index: usize) -> &Sprite {
        &self.sprites[index]
    }

    pub fn tiles(&self) -> &TileSet {
        &self.tiles
    }

    /// Debug images of the most recently published frame.
    pub fn debug_buffers(&self) -> Option<&DebugBuffers> {
        self.debug_shown.as_ref()
    }

    /// Hand the completed frame to the caller and start a fresh buffer.
    pub fn take_frame(&mut self) -> Option<Box<[u8]>> {
        if !self.frame_ready {
            return None;
        }
        self.frame_ready = false;
        Some(std::mem::replace(&mut self.frame, blank_frame()))
    }

    /// Publish whatever has been drawn so far (STOP, faults).
    pub fn force_render(&mut self, memory: &[u8]) {
        self.render_debug(memory);
        self.frame_ready = true;
    }

    /// Publish a blank frame while the display is switched off.
    pub fn present_blank(&mut self) {
        self.frame = blank_frame();
        self.frame_ready = true;
    }

    /// React to a game write inside a PPU-owned range. The value is already
    /// stored in `memory`.
    pub fn on_write(&mut self, addr: u16, memory: &mut [u8]) {
        let value = memory[addr as usize];
        if TILE_DATA.contains(addr) {
            self.tiles.write(TILE_DATA.offset(addr), value);
            return;
        }
        if OAM.contains(addr) {
            self.refresh_sprite(OAM.offset(addr) / 4, memory);
            return;
        }
        if BG_TILE_MAP_0.contains(addr) || BG_TILE_MAP_1.contains(addr) {
            // Maps are read straight from memory while rendering.
            return;
        }
        match addr {
            LCDC => self.write_lcdc(value, memory),
            STAT => {
                memory[STAT as usize] = (value & 0xF8) | self.stat_low_bits();
            }
            LY => memory[LY as usize] = self.line,
            SCY | SCX | WY | WX => {
                if self.mode == PpuMode::ScanlineVram {
                    self.deferred.push_back((addr, value));
                } else {
                    self.apply_position(addr, value);
                }
            }
            BGP => self.bgp.update(value),
            OBP0 => self.obp0.update(value),
            OBP1 => self.obp1.update(value),
            _ => {}
        }
    }

    /// Re-derive all 40 sprites from OAM (after DMA or a sprite size change).
    pub fn refresh_sprites(&mut self, memory: &[u8]) {
        for i in 0..SPRITE_COUNT {
            self.refresh_sprite(i, memory);
        }
    }

    fn refresh_sprite(&mut self, index: usize, memory: &[u8]) {
        let base = OAM.start as usize + index * 4;
        self.sprites[index] = Sprite::from_oam(&memory[base..base + 4], self.lcdc.tall_sprites);
    }

    fn write_lcdc(&mut self, value: u8, memory: &mut [u8]) {
        let new = Lcdc::from_byte(value);
        let old = std::mem::replace(&mut self.lcdc, new);
        if new.tall_sprites != old.tall_sprites {
            debug!("sprite size 8x{}", if new.tall_sprites { 16 } else { 8 });
            self.refresh_sprites(memory);
        }
        if old.display && !new.display {
            debug!("LCD off");
            self.clock = 0;
            self.set_line(0, memory);
            self.mode = PpuMode::HorizontalBlank;
            self.write_stat_low_bits(memory);
        } else if !old.display && new.display {
            debug!("LCD on");
            self.clock = 0;
            self.window_line = 0;
            self.set_line(0, memory);
            self.enter(PpuMode::ScanlineOam, memory);
        }
    }

    fn apply_position(&mut self, addr: u16, value: u8) {
        match addr {
            SCY => self.scy = value,
            SCX => self.scx = value,
            WY => self.wy = value,
            WX => self.wx = value,
            _ => {}
        }
    }

    fn stat_low_bits(&self) -> u8 {
        (if self.coincidence { STAT_COINCIDENCE } else { 0 }) | self.mode.stat_bits()
    }

    fn write_stat_low_bits(&self, memory: &mut [u8]) {
        let stat = &mut memory[STAT as usize];
        *stat = (*stat & 0xF8) | self.stat_low_bits();
    }

    /// Move LY and refresh the coincidence bit. The LYC interrupt itself is
    /// only raised on entering `ScanlineVram`.
    fn set_line(&mut self, line: u8, memory: &mut [u8]) {
        self.line = line;
        memory[LY as usize] = line;
        self.coincidence = memory[LYC as usize] == line;
        self.write_stat_low_bits(memory);
    }

    /// Advance by `cycles`; surplus cycles carry into the next mode.
    pub fn step(&mut self, cycles: u32, memory: &mut [u8]) {
        if !self.lcdc.display {
            return;
        }
        self.clock += cycles;
        while self.clock >= self.mode.cycles() {
            self.clock -= self.mode.cycles();
            match self.mode {
                PpuMode::ScanlineOam => {
                    self.select_line_sprites();
                    self.enter(PpuMode::ScanlineVram, memory);
                }
                PpuMode::ScanlineVram => {
                    self.render_line(memory);
                    self.enter(PpuMode::HorizontalBlank, memory);
                }
                PpuMode::HorizontalBlank => {
                    self.set_line(self.line + 1, memory);
                    if self.line > LAST_VISIBLE_LINE {
                        self.enter(PpuMode::VerticalBlank, memory);
                    } else {
                        self.enter(PpuMode::ScanlineOam, memory);
                    }
                }
                PpuMode::VerticalBlank => {
                    if self.line >= LAST_LINE {
                        self.set_line(0, memory);
                        self.window_line = 0;
                        self.enter(PpuMode::ScanlineOam, memory);
                    } else {
                        self.set_line(self.line + 1, memory);
                    }
                }
            }
        }
    }

    fn enter(&mut self, mode: PpuMode, memory: &mut [u8]) {
        #[cfg(feature = "ppu-trace")]
        trace!("LY={:3} {:?} -> {:?}", self.line, self.mode, mode);

        self.mode = mode;
        let stat = memory[STAT as usize];
        let mut raise = match mode {
            PpuMode::HorizontalBlank => stat & STAT_HBLANK_IRQ != 0,
            PpuMode::VerticalBlank => stat & STAT_VBLANK_IRQ != 0,
            PpuMode::ScanlineOam => stat & STAT_OAM_IRQ != 0,
            PpuMode::ScanlineVram => false,
        };

        match mode {
            PpuMode::ScanlineVram => {
                raise |= self.coincidence && stat & STAT_LYC_IRQ != 0;
            }
            PpuMode::HorizontalBlank => {
                while let Some((addr, value)) = self.deferred.pop_front() {
                    self.apply_position(addr, value);
                }
            }
            PpuMode::VerticalBlank => {
                interrupt::request(memory, Interrupt::VBlank);
                self.render_debug(memory);
                self.frame_ready = true;
            }
            PpuMode::ScanlineOam => {}
        }

        self.write_stat_low_bits(memory);
        if raise {
            interrupt::request(memory, Interrupt::LcdStat);
        }
    }

    fn select_line_sprites(&mut self) {
        let tall = self.lcdc.tall_sprites;
        let mut picked = sprite::select_for_line(&self.sprites, self.line, tall);
        // Lower X wins on DMG; the sort is stable so OAM order breaks ties.
        picked.sort_by_key(|&i| self.sprites[i].x);
        self.line_sprites = picked;
    }

    fn render_line(&mut self, memory: &[u8]) {
        let y = self.line;
        if !self.lcdc.display || y as usize >= SCREEN_HEIGHT {
            return;
        }
        let signed = !self.lcdc.unsigned_tiles;
        let mut window_drawn = false;

        for x in 0..SCREEN_WIDTH as u8 {
            let bg = self.background_pixel(x, y, signed, memory);
            let win = self.window_pixel(x, signed, memory);
            let obj = if self.lcdc.sprites {
                self.sprite_pixel(x, y)
            } else {
                None
            };

            let mut rgb = bg.map(|c| self.bgp.rgb(c));
            if let Some(c) = win {
                let colour = self.bgp.rgb(c);
                rgb = Some(colour);
                window_drawn = true;
                if let Some(dbg) = self.debug.as_mut() {
                    dbg.put_window_pixel(x as usize, y as usize, colour);
                }
            }
            if let Some(obj) = obj {
                let palette = if obj.palette1 { &self.obp1 } else { &self.obp0 };
                let colour = palette.rgb(obj.colour);
                if obj.above_background || win.or(bg).unwrap_or(0) == 0 {
                    rgb = Some(colour);
                }
                if let Some(dbg) = self.debug.as_mut() {
                    dbg.put_sprite_pixel(x as usize, y as usize, colour);
                }
            }

            let i = (y as usize * SCREEN_WIDTH + x as usize) * 3;
            self.frame[i..i + 3].copy_from_slice(&rgb.unwrap_or(SHADES_RGB[0]));
        }

        if window_drawn {
            self.window_line = self.window_line.wrapping_add(1);
        }
    }

    fn background_pixel(&self, x: u8, y: u8, signed: bool, memory: &[u8]) -> Option<u8> {
        if !self.lcdc.background {
            return None;
        }
        let py = y.wrapping_add(self.scy);
        let px = x.wrapping_add(self.scx);
        let entry = self.lcdc.bg_map() + (py as usize / 8) * 32 + px as usize / 8;
        let tile = self.tiles.get(TileSet::resolve(memory[entry], signed));
        Some(tile.pixel(px % 8, py % 8))
    }

    fn window_pixel(&self, x: u8, signed: bool, memory: &[u8]) -> Option<u8> {
        let visible = self.lcdc.window
            && self.lcdc.background
            && self.wy <= LAST_VISIBLE_LINE
            && self.wx < WINDOW_X_MAX
            && self.wy <= self.line
            && x as i16 >= self.wx as i16 - 7;
        if !visible {
            return None;
        }
        let col = (x as i16 - (self.wx as i16 - 7)) as u8;
        let row = self.window_line;
        let entry = self.lcdc.window_map() + (row as usize / 8) * 32 + col as usize / 8;
        let tile = self.tiles.get(TileSet::resolve(memory[entry], signed));
        Some(tile.pixel(col % 8, row % 8))
    }

    fn sprite_pixel(&self, x: u8, y: u8) -> Option<SpritePixel> {
        let tall = self.lcdc.tall_sprites;
        self.line_sprites.iter().find_map(|&i| {
            let s = &self.sprites[i];
            if !s.covers_x(x) {
                return None;
            }
            let (tile, row) = s.tile_row(y, tall);
            let colour = self.tiles.get(tile).pixel(s.tile_column(x), row);
            let palette = if s.palette1 { &self.obp1 } else { &self.obp0 };
            (!palette.is_transparent(colour)).then_some(SpritePixel {
                colour,
                above_background: s.above_background,
                palette1: s.palette1,
            })
        })
    }

    fn render_debug(&mut self, memory: &[u8]) {
        let Some(dbg) = self.debug.as_mut() else {
            return;
        };
        dbg.render_background(
            &self.tiles,
            memory,
            self.lcdc.bg_map(),
            !self.lcdc.unsigned_tiles,
            &self.bgp,
        );
        dbg.render_tile_sheets(&self.tiles, &self.bgp);

        if let Some(shown) = self.debug_shown.as_mut() {
            std::mem::swap(dbg, shown);
        }
        dbg.clear();
    }
}
