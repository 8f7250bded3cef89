//! Pixel surfaces: the live RGB framebuffer and the indexed background map.
//!
//! All rendering lands in RAM first. The rasterizers feed the
//! [`FrameBuffer`] with clipped span writes; after a poll cycle only the
//! rectangle containing changed pixels is flushed to the hardware panel in
//! one transaction, so a cycle never tears mid-frame.

extern crate alloc;

use alloc::boxed::Box;
use alloc::vec;
use alloc::vec::Vec;
use core::convert::Infallible;
use embedded_graphics::pixelcolor::Rgb565;
use embedded_graphics::prelude::*;
use embedded_graphics::primitives::Rectangle;
use log::debug;

use crate::palette::{MAP_PALETTE, MAP_PALETTE_LEN, WHITE_INDEX};

pub const DISPLAY_WIDTH_PX: u16 = 320;
pub const DISPLAY_HEIGHT_PX: u16 = 240;

/// Total number of pixels in a full-screen surface (320 x 240 = 76,800).
const PIXEL_COUNT: usize = DISPLAY_WIDTH_PX as usize * DISPLAY_HEIGHT_PX as usize;

/// Bounding box of pixels that have changed since the last flush.
#[derive(Debug, Clone, Copy)]
struct DirtyRect {
    min_x: usize,
    min_y: usize,
    max_x: usize,
    max_y: usize,
}

impl DirtyRect {
    fn from_point(x: usize, y: usize) -> Self {
        Self {
            min_x: x,
            min_y: y,
            max_x: x,
            max_y: y,
        }
    }

    fn expand(&mut self, x: usize, y: usize) {
        self.min_x = self.min_x.min(x);
        self.min_y = self.min_y.min(y);
        self.max_x = self.max_x.max(x);
        self.max_y = self.max_y.max(y);
    }
}

/// RAM framebuffer implementing `DrawTarget<Color = Rgb565>`.
///
/// One heap allocation of 320x240x2 = 153,600 bytes, alive for the whole
/// process. Span writes are the hot path (one call per opaque run of a
/// scanline); `DrawTarget` is kept for text overlays drawn on top.
pub struct FrameBuffer {
    pixels: Vec<Rgb565>,
    dirty: Option<DirtyRect>,
}

impl Default for FrameBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameBuffer {
    /// Allocate a framebuffer filled with black pixels.
    pub fn new() -> Self {
        Self {
            pixels: vec![Rgb565::BLACK; PIXEL_COUNT],
            dirty: None,
        }
    }

    #[inline]
    fn set_pixel(&mut self, x: usize, y: usize, color: Rgb565) {
        let idx = y * DISPLAY_WIDTH_PX as usize + x;
        if self.pixels[idx] != color {
            self.pixels[idx] = color;
            match &mut self.dirty {
                Some(rect) => rect.expand(x, y),
                None => self.dirty = Some(DirtyRect::from_point(x, y)),
            }
        }
    }

    /// Write one contiguous horizontal run of pixels at `(x, y)`.
    ///
    /// The run is clipped to the surface; out-of-bounds parts are dropped,
    /// never wrapped onto a neighboring row.
    pub fn write_span(&mut self, x: i32, y: i32, colors: &[Rgb565]) {
        let w = DISPLAY_WIDTH_PX as i32;
        let h = DISPLAY_HEIGHT_PX as i32;
        if y < 0 || y >= h || x >= w {
            return;
        }
        let skip = (-x).max(0) as usize;
        if skip >= colors.len() {
            return;
        }
        let start_x = (x + skip as i32) as usize;
        let count = colors.len() - skip;
        let count = count.min(w as usize - start_x);
        for (i, &color) in colors[skip..skip + count].iter().enumerate() {
            self.set_pixel(start_x + i, y as usize, color);
        }
    }

    /// Read back one pixel (tests and the simulator use this).
    pub fn pixel(&self, x: usize, y: usize) -> Rgb565 {
        self.pixels[y * DISPLAY_WIDTH_PX as usize + x]
    }

    /// Flush the dirty region to a hardware display, then reset the dirty
    /// state. If nothing changed, this is a no-op.
    pub fn flush<D>(&mut self, display: &mut D) -> Result<(), D::Error>
    where
        D: DrawTarget<Color = Rgb565>,
    {
        let Some(rect) = self.dirty.take() else {
            return Ok(());
        };

        let width = rect.max_x - rect.min_x + 1;
        let height = rect.max_y - rect.min_y + 1;

        debug!(
            "Flushing {}x{} dirty region at ({}, {})",
            width, height, rect.min_x, rect.min_y
        );

        let area = Rectangle::new(
            Point::new(rect.min_x as i32, rect.min_y as i32),
            Size::new(width as u32, height as u32),
        );

        let pixels = &self.pixels;
        let stride = DISPLAY_WIDTH_PX as usize;
        let pixel_iter = (rect.min_y..=rect.max_y).flat_map(move |y| {
            let row_start = y * stride + rect.min_x;
            pixels[row_start..row_start + width].iter().copied()
        });

        display.fill_contiguous(&area, pixel_iter)
    }
}

impl OriginDimensions for FrameBuffer {
    fn size(&self) -> Size {
        Size::new(DISPLAY_WIDTH_PX as u32, DISPLAY_HEIGHT_PX as u32)
    }
}

impl DrawTarget for FrameBuffer {
    type Color = Rgb565;
    type Error = Infallible;

    fn draw_iter<I>(&mut self, pixels: I) -> Result<(), Self::Error>
    where
        I: IntoIterator<Item = Pixel<Self::Color>>,
    {
        let w = DISPLAY_WIDTH_PX as i32;
        let h = DISPLAY_HEIGHT_PX as i32;

        for Pixel(coord, color) in pixels {
            if coord.x >= 0 && coord.y >= 0 && coord.x < w && coord.y < h {
                self.set_pixel(coord.x as usize, coord.y as usize, color);
            }
        }
        Ok(())
    }

    fn fill_solid(&mut self, area: &Rectangle, color: Self::Color) -> Result<(), Self::Error> {
        let w = DISPLAY_WIDTH_PX as usize;
        let h = DISPLAY_HEIGHT_PX as usize;

        let x_start = (area.top_left.x.max(0) as usize).min(w);
        let y_start = (area.top_left.y.max(0) as usize).min(h);
        let x_end = ((area.top_left.x.max(0) as usize).saturating_add(area.size.width as usize)).min(w);
        let y_end = ((area.top_left.y.max(0) as usize).saturating_add(area.size.height as usize)).min(h);

        for y in y_start..y_end {
            for x in x_start..x_end {
                self.set_pixel(x, y, color);
            }
        }
        Ok(())
    }

    fn clear(&mut self, color: Self::Color) -> Result<(), Self::Error> {
        for y in 0..DISPLAY_HEIGHT_PX as usize {
            for x in 0..DISPLAY_WIDTH_PX as usize {
                self.set_pixel(x, y, color);
            }
        }
        Ok(())
    }
}

/// Offscreen indexed-color surface holding the quantized background map.
///
/// One byte per pixel; indices refer to [`MAP_PALETTE`]. Built once at
/// startup by the quantizing rasterizer, then only read back via
/// [`BackgroundSurface::blit`] at the start of every poll cycle.
pub struct BackgroundSurface {
    cells: Box<[u8]>,
}

impl Default for BackgroundSurface {
    fn default() -> Self {
        Self::new()
    }
}

impl BackgroundSurface {
    /// Allocate a background surface filled with white.
    pub fn new() -> Self {
        Self {
            cells: vec![WHITE_INDEX; PIXEL_COUNT].into_boxed_slice(),
        }
    }

    pub fn fill(&mut self, index: u8) {
        self.cells.fill(index);
    }

    /// Write one horizontal run of palette indices, clipped to the surface.
    pub fn write_indexed_span(&mut self, x: i32, y: i32, indices: &[u8]) {
        let w = DISPLAY_WIDTH_PX as i32;
        let h = DISPLAY_HEIGHT_PX as i32;
        if y < 0 || y >= h || x >= w {
            return;
        }
        let skip = (-x).max(0) as usize;
        if skip >= indices.len() {
            return;
        }
        let start_x = (x + skip as i32) as usize;
        let count = (indices.len() - skip).min(w as usize - start_x);
        let row_start = y as usize * w as usize + start_x;
        self.cells[row_start..row_start + count].copy_from_slice(&indices[skip..skip + count]);
    }

    /// Overwrite a rectangle with one palette index (label strip clearing).
    pub fn clear_rect(&mut self, x: u16, y: u16, width: u16, height: u16, index: u8) {
        let w = DISPLAY_WIDTH_PX as usize;
        let x_end = (x as usize + width as usize).min(w);
        let y_end = (y as usize + height as usize).min(DISPLAY_HEIGHT_PX as usize);
        for row in (y as usize)..y_end {
            self.cells[row * w + x as usize..row * w + x_end].fill(index);
        }
    }

    pub fn index_at(&self, x: usize, y: usize) -> u8 {
        self.cells[y * DISPLAY_WIDTH_PX as usize + x]
    }

    /// Copy the whole map onto the framebuffer, translating indices through
    /// the fixed palette. This is the per-cycle frame reset.
    pub fn blit(&self, frame: &mut FrameBuffer) {
        let w = DISPLAY_WIDTH_PX as usize;
        let mut row = [Rgb565::WHITE; DISPLAY_WIDTH_PX as usize];
        for y in 0..DISPLAY_HEIGHT_PX as usize {
            for (x, color) in row.iter_mut().enumerate() {
                let index = (self.cells[y * w + x] as usize).min(MAP_PALETTE_LEN - 1);
                *color = MAP_PALETTE[index];
            }
            frame.write_span(0, y as i32, &row);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use embedded_graphics::primitives::Rectangle;

    /// Minimal capture target recording what `flush` sends out.
    struct Capture {
        area: Option<Rectangle>,
        colors: Vec<Rgb565>,
    }

    impl Capture {
        fn new() -> Self {
            Self {
                area: None,
                colors: Vec::new(),
            }
        }
    }

    impl OriginDimensions for Capture {
        fn size(&self) -> Size {
            Size::new(DISPLAY_WIDTH_PX as u32, DISPLAY_HEIGHT_PX as u32)
        }
    }

    impl DrawTarget for Capture {
        type Color = Rgb565;
        type Error = Infallible;

        fn draw_iter<I>(&mut self, _pixels: I) -> Result<(), Self::Error>
        where
            I: IntoIterator<Item = Pixel<Self::Color>>,
        {
            Ok(())
        }

        fn fill_contiguous<I>(&mut self, area: &Rectangle, colors: I) -> Result<(), Self::Error>
        where
            I: IntoIterator<Item = Self::Color>,
        {
            self.area = Some(*area);
            self.colors = colors.into_iter().collect();
            Ok(())
        }
    }

    #[test]
    fn test_write_span_clips_left_and_right() {
        let mut fb = FrameBuffer::new();
        let colors = [Rgb565::RED; 10];

        fb.write_span(-3, 0, &colors);
        assert_eq!(fb.pixel(0, 0), Rgb565::RED);
        assert_eq!(fb.pixel(6, 0), Rgb565::RED);
        assert_eq!(fb.pixel(7, 0), Rgb565::BLACK);

        fb.write_span(DISPLAY_WIDTH_PX as i32 - 2, 1, &colors);
        assert_eq!(fb.pixel(DISPLAY_WIDTH_PX as usize - 1, 1), Rgb565::RED);
        // Nothing wrapped onto the next row.
        assert_eq!(fb.pixel(0, 2), Rgb565::BLACK);
    }

    #[test]
    fn test_write_span_off_surface_is_dropped() {
        let mut fb = FrameBuffer::new();
        fb.write_span(0, -1, &[Rgb565::RED; 4]);
        fb.write_span(0, DISPLAY_HEIGHT_PX as i32, &[Rgb565::RED; 4]);
        fb.write_span(DISPLAY_WIDTH_PX as i32, 0, &[Rgb565::RED; 4]);
        let mut capture = Capture::new();
        fb.flush(&mut capture).unwrap();
        assert!(capture.area.is_none());
    }

    #[test]
    fn test_flush_covers_only_the_dirty_rect() {
        let mut fb = FrameBuffer::new();
        fb.write_span(10, 5, &[Rgb565::RED; 3]);
        fb.write_span(12, 8, &[Rgb565::GREEN; 2]);

        let mut capture = Capture::new();
        fb.flush(&mut capture).unwrap();
        let area = capture.area.unwrap();
        assert_eq!(area.top_left, Point::new(10, 5));
        assert_eq!(area.size, Size::new(4, 4));
        assert_eq!(capture.colors.len(), 16);

        // A second flush with no writes sends nothing.
        let mut capture = Capture::new();
        fb.flush(&mut capture).unwrap();
        assert!(capture.area.is_none());
    }

    #[test]
    fn test_background_blit_translates_indices() {
        let mut bg = BackgroundSurface::new();
        bg.write_indexed_span(0, 0, &[1, 6, 7]);
        let mut fb = FrameBuffer::new();
        bg.blit(&mut fb);
        assert_eq!(fb.pixel(0, 0), Rgb565::BLACK);
        assert_eq!(fb.pixel(1, 0), Rgb565::BLUE);
        assert_eq!(fb.pixel(2, 0), Rgb565::RED);
        assert_eq!(fb.pixel(3, 0), Rgb565::WHITE);
    }

    #[test]
    fn test_clear_rect_overwrites_label_strip() {
        let mut bg = BackgroundSurface::new();
        bg.fill(6);
        bg.clear_rect(0, 0, 220, 40, WHITE_INDEX);
        assert_eq!(bg.index_at(0, 0), WHITE_INDEX);
        assert_eq!(bg.index_at(219, 39), WHITE_INDEX);
        assert_eq!(bg.index_at(220, 0), 6);
        assert_eq!(bg.index_at(0, 40), 6);
    }
}
