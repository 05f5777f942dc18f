use crate::palette::colour_index;

pub const TILE_BYTES: usize = 16;
/// Tiles addressable in 0x8000-0x97FF.
pub const TILE_COUNT: usize = 384;

/// One 8x8 tile: its 16 pattern bytes and the decoded colour indices.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tile {
    bytes: [u8; TILE_BYTES],
    pixels: [[u8; 8]; 8],
}

impl Default for Tile {
    fn default() -> Self {
        Self {
            bytes: [0; TILE_BYTES],
            pixels: [[0; 8]; 8],
        }
    }
}

impl Tile {
    /// Update one pattern byte and re-decode the row it belongs to.
    pub fn write(&mut self, offset: usize, value: u8) {
        self.bytes[offset] = value;
        let row = offset / 2;
        let low = self.bytes[row * 2];
        let high = self.bytes[row * 2 + 1];
        for x in 0..8u8 {
            self.pixels[row][x as usize] = colour_index(low, high, x);
        }
    }

    #[inline]
    pub fn pixel(&self, x: u8, y: u8) -> u8 {
        self.pixels[y as usize][x as usize]
    }
}

/// Decoded copy of the whole tile pattern area.
#[derive(Debug, Clone)]
pub struct TileSet {
    tiles: Box<[Tile; TILE_COUNT]>,
}

impl Default for TileSet {
    fn default() -> Self {
        Self {
            tiles: Box::new([Tile::default(); TILE_COUNT]),
        }
    }
}

impl TileSet {
    /// Apply a write at `offset` bytes from 0x8000.
    pub fn write(&mut self, offset: usize, value: u8) {
        self.tiles[offset / TILE_BYTES].write(offset % TILE_BYTES, value);
    }

    /// Tile by absolute number, 0 at 0x8000 up to 383 at 0x97F0.
    #[inline]
    pub fn get(&self, number: usize) -> &Tile {
        &self.tiles[number % TILE_COUNT]
    }

    /// Resolve a background/window tile-map entry to a tile number.
    /// Signed addressing puts index 0 at 0x9000 (tile 256).
    #[inline]
    pub fn resolve(index: u8, signed: bool) -> usize {
        if signed {
            (256 + (index as i8) as i32) as usize
        } else {
            index as usize
        }
    }
}
