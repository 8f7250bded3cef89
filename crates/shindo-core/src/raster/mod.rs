//! Scanline rasterizers: the live display path and the background map path.
//!
//! Both implement [`ScanlineSink`](crate::decode::ScanlineSink) so the
//! decoder stays oblivious to where its pixels end up.

pub mod live;
pub mod map;

/// Proportional coordinate rescale from source image space to the display.
///
/// Floor semantics; monotonic in `src` for any fixed pair of dimensions.
pub fn rescale(src: u32, src_dim: u32, dest_dim: u32) -> i32 {
    if src_dim == 0 {
        return 0;
    }
    (src * dest_dim / src_dim) as i32
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::surface::{DISPLAY_HEIGHT_PX, DISPLAY_WIDTH_PX};

    #[test]
    fn test_rescale_is_monotonic_for_feed_dimensions() {
        for (src_dim, dest_dim) in [
            (352u32, DISPLAY_WIDTH_PX as u32),
            (400, DISPLAY_HEIGHT_PX as u32),
            (100, DISPLAY_WIDTH_PX as u32),
            (320, DISPLAY_WIDTH_PX as u32),
            (1, DISPLAY_HEIGHT_PX as u32),
        ] {
            let mut prev = rescale(0, src_dim, dest_dim);
            for src in 1..src_dim {
                let cur = rescale(src, src_dim, dest_dim);
                assert!(cur >= prev, "{src}/{src_dim} -> {cur} < {prev}");
                assert!(cur < dest_dim as i32);
                prev = cur;
            }
        }
    }

    #[test]
    fn test_rescale_endpoints() {
        assert_eq!(rescale(0, 352, 320), 0);
        assert_eq!(rescale(351, 352, 320), 319);
        assert_eq!(rescale(176, 352, 320), 160);
        // Degenerate source dimension falls back to the origin.
        assert_eq!(rescale(5, 0, 320), 0);
    }
}
