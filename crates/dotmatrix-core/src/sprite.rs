/// Number of OAM entries.
pub const SPRITE_COUNT: usize = 40;
/// Hardware limit of sprites drawn on one scanline.
pub const MAX_SPRITES_PER_LINE: usize = 10;

/// One OAM entry with the silicon position offsets already applied.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Sprite {
    pub y: i16,
    pub x: i16,
    /// Tile number in the 0x8000 block; forced even for 8x16 sprites.
    pub tile: u8,
    pub above_background: bool,
    pub y_flip: bool,
    pub x_flip: bool,
    /// OBP1 instead of OBP0.
    pub palette1: bool,
}

impl Sprite {
    pub fn from_oam(raw: &[u8], tall: bool) -> Self {
        let flags = raw[3];
        Self {
            y: raw[0] as i16 - 16,
            x: raw[1] as i16 - 8,
            tile: if tall { raw[2] & 0xFE } else { raw[2] },
            above_background: flags & 0x80 == 0,
            y_flip: flags & 0x40 != 0,
            x_flip: flags & 0x20 != 0,
            palette1: flags & 0x10 != 0,
        }
    }

    pub fn height(tall: bool) -> i16 {
        if tall { 16 } else { 8 }
    }

    pub fn on_line(&self, line: u8, tall: bool) -> bool {
        let line = line as i16;
        line >= self.y && line < self.y + Self::height(tall)
    }

    pub fn covers_x(&self, x: u8) -> bool {
        let x = x as i16;
        x >= self.x && x < self.x + 8
    }

    /// Tile number and row inside that tile for `line`, honouring flips.
    pub fn tile_row(&self, line: u8, tall: bool) -> (usize, u8) {
        let height = Self::height(tall);
        let mut row = line as i16 - self.y;
        if self.y_flip {
            row = height - 1 - row;
        }
        (self.tile as usize + (row / 8) as usize, (row % 8) as u8)
    }

    /// Column inside the tile for screen `x`, honouring flips.
    pub fn tile_column(&self, x: u8) -> u8 {
        let col = (x as i16 - self.x) as u8;
        if self.x_flip { 7 - col } else { col }
    }
}

/// First `MAX_SPRITES_PER_LINE` sprites on `line`, in OAM order.
pub fn select_for_line(sprites: &[Sprite], line: u8, tall: bool) -> Vec<usize> {
    sprites
        .iter()
        .enumerate()
        .filter(|(_, s)| s.on_line(line, tall))
        .map(|(i, _)| i)
        .take(MAX_SPRITES_PER_LINE)
        .collect()
}
