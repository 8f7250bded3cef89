//! Background map rasterizer: quantizes the base map into the indexed
//! offscreen surface.
//!
//! Runs exactly once per process lifetime, at startup. Each source pixel's
//! raw palette index is collapsed through the fixed threshold bands into
//! one of the eight semantic map entries; the completed line is stored at
//! its rescaled row and the label strip is kept clear of map content.

use crate::config::WatchConfig;
use crate::decode::{Scanline, ScanlineSink};
use crate::palette::{WHITE_INDEX, quantize};
use crate::raster::rescale;
use crate::surface::{BackgroundSurface, DISPLAY_HEIGHT_PX, DISPLAY_WIDTH_PX};

pub struct MapRasterizer<'a> {
    background: &'a mut BackgroundSurface,
    label_width: u16,
    label_clear_height: u16,
}

impl<'a> MapRasterizer<'a> {
    pub fn new(background: &'a mut BackgroundSurface, config: &WatchConfig) -> Self {
        Self {
            background,
            label_width: config.label.width,
            label_clear_height: config.map_label_clear_height,
        }
    }
}

impl ScanlineSink for MapRasterizer<'_> {
    fn push_scanline(&mut self, line: &Scanline<'_>) {
        let width = line.pixels.len().min(line.width as usize);

        // Positions the rescale skips over stay white, same as the fill.
        let mut row = [WHITE_INDEX; DISPLAY_WIDTH_PX as usize];
        for (x, &raw) in line.pixels[..width].iter().enumerate() {
            let dest_x = rescale(
                x as u32,
                u32::from(line.width),
                u32::from(DISPLAY_WIDTH_PX),
            );
            row[dest_x as usize] = quantize(raw);
        }

        let dest_y = rescale(
            u32::from(line.source_y()),
            u32::from(line.height),
            u32::from(DISPLAY_HEIGHT_PX),
        );
        self.background.write_indexed_span(0, dest_y, &row);
        self.background
            .clear_rect(0, 0, self.label_width, self.label_clear_height, WHITE_INDEX);
    }
}
