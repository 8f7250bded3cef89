//! Fixed semantic palette for the background map and its quantizer.
//!
//! The base map arrives as a wide-gamut grayscale GIF; it is collapsed into
//! eight semantic entries (land outline, administrative grays, ocean,
//! highlight, white) once at startup and stored as indices.

use embedded_graphics::pixelcolor::Rgb565;
use embedded_graphics::prelude::*;

/// Number of entries in the background map palette (entry 0 is reserved).
pub const MAP_PALETTE_LEN: usize = 9;

/// Palette index the map background and label strip are filled with.
pub const WHITE_INDEX: u8 = 8;

/// Semantic display palette for [`BackgroundSurface`](crate::surface::BackgroundSurface).
///
/// Entry 0 is a reserved placeholder and is never produced by [`quantize`].
pub const MAP_PALETTE: [Rgb565; MAP_PALETTE_LEN] = [
    Rgb565::BLACK,            // 0: reserved
    Rgb565::BLACK,            // 1: land outline
    Rgb565::new(12, 25, 12),  // 2: gray 0x666666
    Rgb565::new(17, 34, 17),  // 3: gray 0x888888
    Rgb565::new(19, 38, 19),  // 4: gray 0x999999
    Rgb565::new(21, 42, 21),  // 5: gray 0xABABAB
    Rgb565::BLUE,             // 6: ocean
    Rgb565::RED,              // 7: highlight
    Rgb565::WHITE,            // 8: white
];

/// Ordered threshold bands: a source value below the bound maps to the index.
const BANDS: [(u8, u8); 7] = [
    (8, 1),
    (78, 2),
    (113, 6),
    (147, 7),
    (168, 3),
    (193, 4),
    (223, 5),
];

/// Collapse a raw 8-bit source value into a semantic palette index.
pub fn quantize(value: u8) -> u8 {
    for (bound, index) in BANDS {
        if value < bound {
            return index;
        }
    }
    WHITE_INDEX
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_band_edges() {
        assert_eq!(quantize(0), 1);
        assert_eq!(quantize(7), 1);
        assert_eq!(quantize(8), 2);
        assert_eq!(quantize(77), 2);
        assert_eq!(quantize(78), 6);
        assert_eq!(quantize(112), 6);
        assert_eq!(quantize(113), 7);
        assert_eq!(quantize(146), 7);
        assert_eq!(quantize(147), 3);
        assert_eq!(quantize(167), 3);
        assert_eq!(quantize(168), 4);
        assert_eq!(quantize(192), 4);
        assert_eq!(quantize(193), 5);
        assert_eq!(quantize(222), 5);
        assert_eq!(quantize(223), 8);
        assert_eq!(quantize(255), 8);
    }

    #[test]
    fn test_every_output_is_a_valid_palette_index() {
        for v in 0..=255u8 {
            let idx = quantize(v) as usize;
            assert!(idx > 0 && idx < MAP_PALETTE_LEN);
        }
    }
}
