//! Scanline decode contract between the image codec and the rasterizers.
//!
//! The codec walks a compressed image stream and hands every completed
//! scanline to a [`ScanlineSink`] together with its palette and positioning
//! metadata. The sink decides where (and whether) the pixels land; the
//! codec never touches a surface itself.

pub mod gif;

use embedded_graphics::pixelcolor::Rgb565;
use thiserror_no_std::Error;

/// Indexed images carry at most 256 palette entries.
pub const MAX_PALETTE_ENTRIES: usize = 256;

/// One decoded horizontal line of palette indices.
///
/// Borrows straight into the decoder's working buffers; valid only for the
/// duration of one [`ScanlineSink::push_scanline`] call.
pub struct Scanline<'a> {
    /// X offset of the frame within the image canvas.
    pub frame_x: u16,
    /// Y offset of the frame within the image canvas.
    pub frame_y: u16,
    /// Row offset of this line within the frame.
    pub row: u16,
    /// Width of the frame in pixels; `pixels` holds exactly this many.
    pub width: u16,
    /// Height of the frame in pixels.
    pub height: u16,
    /// Raw palette indices for this line.
    pub pixels: &'a [u8],
    /// Palette for this decode, 256 entries (unused tail is black).
    pub palette: &'a [Rgb565; MAX_PALETTE_ENTRIES],
    /// Index that must not be drawn, if this frame declares one.
    pub transparent: Option<u8>,
}

impl Scanline<'_> {
    /// Absolute source Y of this line within the image.
    pub fn source_y(&self) -> u16 {
        self.frame_y + self.row
    }
}

/// Receiver for decoded scanlines.
///
/// Called synchronously, once per completed line, in stream order (top to
/// bottom for non-interlaced images), for exactly one bracketed decode.
pub trait ScanlineSink {
    fn push_scanline(&mut self, line: &Scanline<'_>);
}

/// A codec that turns a complete in-memory image stream into scanlines.
pub trait FrameDecoder {
    fn decode(&mut self, data: &[u8], sink: &mut dyn ScanlineSink) -> Result<(), DecodeError>;
}

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeError {
    #[error("not a GIF stream")]
    BadSignature,
    #[error("stream ended mid-structure")]
    UnexpectedEof,
    #[error("corrupt image data")]
    Corrupt,
    #[error("frame exceeds the declared canvas")]
    FrameOutOfBounds,
}
