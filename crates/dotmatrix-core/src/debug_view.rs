//! Optional diagnostic images produced alongside the LCD frame.

use crate::{
    palette::{Palette, Rgb},
    tile::TileSet,
};

pub const BACKGROUND_SIZE: usize = 256;
/// Tile sheets are 16 tiles wide and 8 tiles tall.
pub const SHEET_WIDTH: usize = 128;
pub const SHEET_HEIGHT: usize = 64;
const TILES_PER_SHEET: usize = 128;

/// Colour used for pixels nothing drew into this frame.
const UNDRAWN: Rgb = [255, 0, 255];

/// RGB debug images. Layer images share the screen geometry; sheet `n`
/// shows tiles `n * 128 .. n * 128 + 127` (0x8000, 0x8800 and 0x9000 blocks).
#[derive(Debug, Clone)]
pub struct DebugBuffers {
    pub background: Box<[u8]>,
    pub sprites: Box<[u8]>,
    pub window: Box<[u8]>,
    pub tile_sheets: [Box<[u8]>; 3],
    screen_width: usize,
}

impl DebugBuffers {
    pub fn new(screen_width: usize, screen_height: usize) -> Self {
        let layer = || vec![0u8; screen_width * screen_height * 3].into_boxed_slice();
        let sheet = || vec![0u8; SHEET_WIDTH * SHEET_HEIGHT * 3].into_boxed_slice();
        let mut buffers = Self {
            background: vec![0u8; BACKGROUND_SIZE * BACKGROUND_SIZE * 3].into_boxed_slice(),
            sprites: layer(),
            window: layer(),
            tile_sheets: [sheet(), sheet(), sheet()],
            screen_width,
        };
        buffers.clear();
        buffers
    }

    /// Reset the per-frame images to magenta.
    pub fn clear(&mut self) {
        for buf in [&mut self.background, &mut self.sprites, &mut self.window] {
            fill(buf, UNDRAWN);
        }
    }

    pub fn put_sprite_pixel(&mut self, x: usize, y: usize, rgb: Rgb) {
        put(&mut self.sprites, self.screen_width, x, y, rgb);
    }

    pub fn put_window_pixel(&mut self, x: usize, y: usize, rgb: Rgb) {
        put(&mut self.window, self.screen_width, x, y, rgb);
    }

    /// Draw the full 32x32 tile map at `map` (offset into `memory`).
    pub fn render_background(
        &mut self,
        tiles: &TileSet,
        memory: &[u8],
        map: usize,
        signed: bool,
        palette: &Palette,
    ) {
        for entry in 0..32 * 32 {
            let tile = tiles.get(TileSet::resolve(memory[map + entry], signed));
            let (tx, ty) = ((entry % 32) * 8, (entry / 32) * 8);
            for row in 0..8u8 {
                for col in 0..8u8 {
                    let rgb = palette.rgb(tile.pixel(col, row));
                    put(
                        &mut self.background,
                        BACKGROUND_SIZE,
                        tx + col as usize,
                        ty + row as usize,
                        rgb,
                    );
                }
            }
        }
    }

    pub fn render_tile_sheets(&mut self, tiles: &TileSet, palette: &Palette) {
        for (sheet_no, sheet) in self.tile_sheets.iter_mut().enumerate() {
            for i in 0..TILES_PER_SHEET {
                let tile = tiles.get(sheet_no * TILES_PER_SHEET + i);
                let (tx, ty) = ((i % 16) * 8, (i / 16) * 8);
                for row in 0..8u8 {
                    for col in 0..8u8 {
                        let rgb = palette.rgb(tile.pixel(col, row));
                        put(sheet, SHEET_WIDTH, tx + col as usize, ty + row as usize, rgb);
                    }
                }
            }
        }
    }
}

fn fill(buf: &mut [u8], rgb: Rgb) {
    for px in buf.chunks_exact_mut(3) {
        px.copy_from_slice(&rgb);
    }
}

#[inline]
fn put(buf: &mut [u8], width: usize, x: usize, y: usize, rgb: Rgb) {
    let i = (y * width + x) * 3;
    buf[i..i + 3].copy_from_slice(&rgb);
}
