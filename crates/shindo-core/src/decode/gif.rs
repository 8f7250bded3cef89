//! Compact GIF87a/89a reader feeding decoded rows to a [`ScanlineSink`].
//!
//! Supports global and local color tables, graphic-control transparency,
//! interlacing, and LZW codes up to 12 bits. The feed publishes small
//! single-frame images; multi-frame streams are decoded frame by frame in
//! stream order, matching how the watcher composites them.
//!
//! All working storage is allocated once in [`GifDecoder::new`] and reused
//! across decodes, so a decode never allocates.

use alloc::boxed::Box;
use alloc::vec;
use alloc::vec::Vec;

use embedded_graphics::pixelcolor::{Rgb565, Rgb888};
use embedded_graphics::prelude::*;

use super::{DecodeError, FrameDecoder, MAX_PALETTE_ENTRIES, Scanline, ScanlineSink};

/// LZW code space is capped at 12 bits.
const MAX_CODES: usize = 1 << 12;

/// Interlace passes: (starting row, row step).
const INTERLACE_PASSES: [(u16, u16); 4] = [(0, 8), (4, 8), (2, 4), (1, 2)];

pub struct GifDecoder {
    global_palette: [Rgb565; MAX_PALETTE_ENTRIES],
    frame_palette: [Rgb565; MAX_PALETTE_ENTRIES],
    prefix: Box<[u16]>,
    suffix: Box<[u8]>,
    stack: Box<[u8]>,
    row: Vec<u8>,
}

impl GifDecoder {
    pub fn new() -> Self {
        Self {
            global_palette: [Rgb565::BLACK; MAX_PALETTE_ENTRIES],
            frame_palette: [Rgb565::BLACK; MAX_PALETTE_ENTRIES],
            prefix: vec![0u16; MAX_CODES].into_boxed_slice(),
            suffix: vec![0u8; MAX_CODES].into_boxed_slice(),
            stack: vec![0u8; MAX_CODES].into_boxed_slice(),
            row: Vec::new(),
        }
    }
}

impl Default for GifDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameDecoder for GifDecoder {
    fn decode(&mut self, data: &[u8], sink: &mut dyn ScanlineSink) -> Result<(), DecodeError> {
        let mut r = Reader { data, pos: 0 };

        let signature = r.bytes(6)?;
        if signature != b"GIF87a" && signature != b"GIF89a" {
            return Err(DecodeError::BadSignature);
        }

        let canvas_w = r.u16le()?;
        let canvas_h = r.u16le()?;
        let packed = r.u8()?;
        let _background = r.u8()?;
        let _aspect = r.u8()?;

        // No state may leak between decodes.
        self.global_palette = [Rgb565::BLACK; MAX_PALETTE_ENTRIES];
        let has_global = packed & 0x80 != 0;
        if has_global {
            read_palette(&mut r, 2 << (packed & 0x07), &mut self.global_palette)?;
        }

        let mut transparent: Option<u8> = None;
        loop {
            match r.u8()? {
                0x3B => break,
                0x21 => {
                    let label = r.u8()?;
                    if label == 0xF9 {
                        // Graphic control extension: only the transparency
                        // flag and index matter here.
                        if r.u8()? != 4 {
                            return Err(DecodeError::Corrupt);
                        }
                        let flags = r.u8()?;
                        let _delay = r.u16le()?;
                        let index = r.u8()?;
                        transparent = (flags & 0x01 != 0).then_some(index);
                    }
                    skip_sub_blocks(&mut r)?;
                }
                0x2C => {
                    let frame = FrameMeta {
                        x: r.u16le()?,
                        y: r.u16le()?,
                        width: r.u16le()?,
                        height: r.u16le()?,
                        interlaced: false,
                        transparent,
                    };
                    let packed = r.u8()?;
                    if frame.width == 0 || frame.height == 0 {
                        return Err(DecodeError::Corrupt);
                    }
                    if u32::from(frame.x) + u32::from(frame.width) > u32::from(canvas_w)
                        || u32::from(frame.y) + u32::from(frame.height) > u32::from(canvas_h)
                    {
                        return Err(DecodeError::FrameOutOfBounds);
                    }

                    self.frame_palette = self.global_palette;
                    let has_local = packed & 0x80 != 0;
                    if has_local {
                        read_palette(&mut r, 2 << (packed & 0x07), &mut self.frame_palette)?;
                    } else if !has_global {
                        return Err(DecodeError::Corrupt);
                    }

                    let frame = FrameMeta {
                        interlaced: packed & 0x40 != 0,
                        ..frame
                    };
                    self.decode_frame(&mut r, frame, sink)?;

                    // Graphic control applies to one image only.
                    transparent = None;
                }
                _ => return Err(DecodeError::Corrupt),
            }
        }
        Ok(())
    }
}

#[derive(Clone, Copy)]
struct FrameMeta {
    x: u16,
    y: u16,
    width: u16,
    height: u16,
    interlaced: bool,
    transparent: Option<u8>,
}

impl GifDecoder {
    /// LZW-decode one image's pixel stream, emitting each completed row.
    fn decode_frame(
        &mut self,
        r: &mut Reader<'_>,
        frame: FrameMeta,
        sink: &mut dyn ScanlineSink,
    ) -> Result<(), DecodeError> {
        let min_code = r.u8()?;
        if !(2..=8).contains(&min_code) {
            return Err(DecodeError::Corrupt);
        }
        let clear: u16 = 1 << min_code;
        let end: u16 = clear + 1;

        self.row.clear();
        self.row.resize(frame.width as usize, 0);
        let mut x = 0usize;
        let mut order = RowOrder::new(frame.height, frame.interlaced);
        let mut rows_left = frame.height;

        let mut blocks = SubBlocks::new();
        let mut bitbuf: u32 = 0;
        let mut nbits: u32 = 0;
        let mut code_size: u32 = u32::from(min_code) + 1;
        let mut next_code: u16 = clear + 2;
        let mut prev: Option<u16> = None;
        let mut prev_first: u8 = 0;

        'stream: loop {
            while nbits < code_size {
                match blocks.next_byte(r)? {
                    Some(b) => {
                        bitbuf |= u32::from(b) << nbits;
                        nbits += 8;
                    }
                    // Some encoders omit the end code; treat exhaustion of
                    // the sub-blocks as end of image.
                    None => break 'stream,
                }
            }
            let code = (bitbuf & ((1 << code_size) - 1)) as u16;
            bitbuf >>= code_size;
            nbits -= code_size;

            if code == clear {
                code_size = u32::from(min_code) + 1;
                next_code = clear + 2;
                prev = None;
                continue;
            }
            if code == end {
                break;
            }

            // Expand the code onto the stack (string comes out reversed).
            let mut top = 0usize;
            let first: u8;
            if let Some(p) = prev {
                let mut cur = if code < next_code {
                    code
                } else if code == next_code {
                    // KwKwK: output is str(prev) + first(prev).
                    self.stack[top] = prev_first;
                    top += 1;
                    p
                } else {
                    return Err(DecodeError::Corrupt);
                };
                while cur >= clear {
                    if top >= MAX_CODES {
                        return Err(DecodeError::Corrupt);
                    }
                    self.stack[top] = self.suffix[cur as usize];
                    top += 1;
                    cur = self.prefix[cur as usize];
                }
                self.stack[top] = cur as u8;
                top += 1;
                first = cur as u8;

                if next_code < MAX_CODES as u16 {
                    self.prefix[next_code as usize] = p;
                    self.suffix[next_code as usize] = first;
                    next_code += 1;
                    if u32::from(next_code) == (1 << code_size) && code_size < 12 {
                        code_size += 1;
                    }
                }
            } else {
                if code >= clear {
                    return Err(DecodeError::Corrupt);
                }
                self.stack[top] = code as u8;
                top += 1;
                first = code as u8;
            }
            prev = Some(code);
            prev_first = first;

            // Drain the stack into rows, emitting each completed line.
            while top > 0 {
                top -= 1;
                if rows_left == 0 {
                    // Surplus pixels past the declared bounds are dropped.
                    continue;
                }
                self.row[x] = self.stack[top];
                x += 1;
                if x == frame.width as usize {
                    sink.push_scanline(&Scanline {
                        frame_x: frame.x,
                        frame_y: frame.y,
                        row: order.current(),
                        width: frame.width,
                        height: frame.height,
                        pixels: &self.row,
                        palette: &self.frame_palette,
                        transparent: frame.transparent,
                    });
                    x = 0;
                    rows_left -= 1;
                    order.advance();
                }
            }
        }

        blocks.finish(r)
    }
}

/// Produces row indices in emission order, honoring interlacing.
struct RowOrder {
    interlaced: bool,
    height: u16,
    pass: usize,
    row: u16,
}

impl RowOrder {
    fn new(height: u16, interlaced: bool) -> Self {
        Self {
            interlaced,
            height,
            pass: 0,
            row: 0,
        }
    }

    fn current(&self) -> u16 {
        self.row
    }

    fn advance(&mut self) {
        if !self.interlaced {
            self.row += 1;
            return;
        }
        self.row += INTERLACE_PASSES[self.pass].1;
        while self.row >= self.height && self.pass < 3 {
            self.pass += 1;
            self.row = INTERLACE_PASSES[self.pass].0;
        }
    }
}

/// Cursor over the raw stream.
struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn u8(&mut self) -> Result<u8, DecodeError> {
        let b = *self
            .data
            .get(self.pos)
            .ok_or(DecodeError::UnexpectedEof)?;
        self.pos += 1;
        Ok(b)
    }

    fn u16le(&mut self) -> Result<u16, DecodeError> {
        let lo = self.u8()?;
        let hi = self.u8()?;
        Ok(u16::from_le_bytes([lo, hi]))
    }

    fn bytes(&mut self, n: usize) -> Result<&'a [u8], DecodeError> {
        let slice = self
            .data
            .get(self.pos..self.pos + n)
            .ok_or(DecodeError::UnexpectedEof)?;
        self.pos += n;
        Ok(slice)
    }

    fn skip(&mut self, n: usize) -> Result<(), DecodeError> {
        if self.pos + n > self.data.len() {
            return Err(DecodeError::UnexpectedEof);
        }
        self.pos += n;
        Ok(())
    }
}

/// Byte source spanning the length-prefixed data sub-blocks of one image.
struct SubBlocks {
    remaining: u8,
    done: bool,
}

impl SubBlocks {
    fn new() -> Self {
        Self {
            remaining: 0,
            done: false,
        }
    }

    fn next_byte(&mut self, r: &mut Reader<'_>) -> Result<Option<u8>, DecodeError> {
        while self.remaining == 0 {
            if self.done {
                return Ok(None);
            }
            let n = r.u8()?;
            if n == 0 {
                self.done = true;
                return Ok(None);
            }
            self.remaining = n;
        }
        self.remaining -= 1;
        r.u8().map(Some)
    }

    /// Skip whatever is left of the sub-blocks, including the terminator.
    fn finish(&mut self, r: &mut Reader<'_>) -> Result<(), DecodeError> {
        loop {
            if self.remaining > 0 {
                r.skip(self.remaining as usize)?;
                self.remaining = 0;
            }
            if self.done {
                return Ok(());
            }
            let n = r.u8()?;
            if n == 0 {
                self.done = true;
            } else {
                self.remaining = n;
            }
        }
    }
}

fn skip_sub_blocks(r: &mut Reader<'_>) -> Result<(), DecodeError> {
    loop {
        let n = r.u8()?;
        if n == 0 {
            return Ok(());
        }
        r.skip(n as usize)?;
    }
}

fn read_palette(
    r: &mut Reader<'_>,
    entries: usize,
    palette: &mut [Rgb565; MAX_PALETTE_ENTRIES],
) -> Result<(), DecodeError> {
    for slot in palette.iter_mut().take(entries) {
        let rgb = r.bytes(3)?;
        *slot = Rgb888::new(rgb[0], rgb[1], rgb[2]).into();
    }
    Ok(())
}
