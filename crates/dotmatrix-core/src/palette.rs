/// RGB triple written into frame buffers.
pub type Rgb = [u8; 3];

/// Greenish LCD shades, lightest first.
pub const SHADES_RGB: [Rgb; 4] = [[224, 248, 208], [136, 192, 112], [52, 104, 86], [8, 24, 32]];

/// Decoded BGP/OBP0/OBP1 register.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Palette {
    /// Shade number (0-3) for each colour index.
    shades: [u8; 4],
    /// Object palettes treat colour index 0 as transparent.
    pub object: bool,
}

impl Palette {
    pub fn new(value: u8, object: bool) -> Self {
        let mut palette = Self {
            shades: [0; 4],
            object,
        };
        palette.update(value);
        palette
    }

    pub fn update(&mut self, value: u8) {
        for (i, shade) in self.shades.iter_mut().enumerate() {
            *shade = (value >> (i * 2)) & 0x03;
        }
    }

    pub fn shade(&self, index: u8) -> u8 {
        self.shades[(index & 0x03) as usize]
    }

    pub fn rgb(&self, index: u8) -> Rgb {
        SHADES_RGB[self.shade(index) as usize]
    }

    /// Object palettes never draw colour index 0.
    pub fn is_transparent(&self, index: u8) -> bool {
        self.object && index == 0
    }
}

/// Colour index (0-3) of pixel `x` (0 = leftmost) in a row given as its two
/// bit planes. The first byte holds the low bit.
#[inline]
pub fn colour_index(low_plane: u8, high_plane: u8, x: u8) -> u8 {
    let mask = 0x80 >> x;
    ((low_plane & mask != 0) as u8) | (((high_plane & mask != 0) as u8) << 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_register_pairs() {
        let p = Palette::new(0b1110_0100, false);
        assert_eq!(p.shade(0), 0);
        assert_eq!(p.shade(1), 1);
        assert_eq!(p.shade(2), 2);
        assert_eq!(p.shade(3), 3);
        assert_eq!(p.rgb(0), [224, 248, 208]);

        let inverted = Palette::new(0b0001_1011, false);
        assert_eq!(inverted.rgb(0), SHADES_RGB[3]);
        assert_eq!(inverted.rgb(3), SHADES_RGB[0]);
    }

    #[test]
    fn only_object_palettes_have_transparency() {
        assert!(Palette::new(0, true).is_transparent(0));
        assert!(!Palette::new(0, true).is_transparent(1));
        assert!(!Palette::new(0, false).is_transparent(0));
    }

    #[test]
    fn first_plane_is_low_bit() {
        assert_eq!(colour_index(0x80, 0x00, 0), 1);
        assert_eq!(colour_index(0x00, 0x80, 0), 2);
        assert_eq!(colour_index(0x01, 0x01, 7), 3);
        assert_eq!(colour_index(0x01, 0x01, 6), 0);
    }
}
