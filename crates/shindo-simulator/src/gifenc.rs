//! Minimal GIF89a encoder for the synthetic feed.
//!
//! Single frame, global 256-entry palette, standard LZW. Exists so the
//! simulator can exercise the real decoder with byte streams shaped like
//! the production feed.

use std::collections::HashMap;

const MIN_CODE_SIZE: u8 = 8;
const MAX_CODE: u16 = 4096;

pub struct Frame<'a> {
    pub width: u16,
    pub height: u16,
    /// Up to 256 RGB entries; the rest of the table is padded black.
    pub palette: &'a [[u8; 3]],
    /// `width * height` palette indices, row-major.
    pub pixels: &'a [u8],
    pub transparent: Option<u8>,
}

pub fn encode(frame: &Frame<'_>) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(b"GIF89a");
    out.extend_from_slice(&frame.width.to_le_bytes());
    out.extend_from_slice(&frame.height.to_le_bytes());
    // Global color table, 256 entries.
    out.push(0x80 | 0x07);
    out.push(0);
    out.push(0);
    for i in 0..256usize {
        let rgb = frame.palette.get(i).copied().unwrap_or([0, 0, 0]);
        out.extend_from_slice(&rgb);
    }

    if let Some(t) = frame.transparent {
        out.extend_from_slice(&[0x21, 0xF9, 4, 0x01, 0, 0, t, 0]);
    }

    out.push(0x2C);
    out.extend_from_slice(&0u16.to_le_bytes());
    out.extend_from_slice(&0u16.to_le_bytes());
    out.extend_from_slice(&frame.width.to_le_bytes());
    out.extend_from_slice(&frame.height.to_le_bytes());
    out.push(0x00);

    out.push(MIN_CODE_SIZE);
    let compressed = lzw_compress(frame.pixels);
    for chunk in compressed.chunks(255) {
        out.push(chunk.len() as u8);
        out.extend_from_slice(chunk);
    }
    out.push(0);
    out.push(0x3B);
    out
}

/// LSB-first bit packer for LZW codes.
struct BitWriter {
    out: Vec<u8>,
    buf: u32,
    nbits: u32,
}

impl BitWriter {
    fn new() -> Self {
        Self {
            out: Vec::new(),
            buf: 0,
            nbits: 0,
        }
    }

    fn put(&mut self, code: u16, width: u32) {
        self.buf |= u32::from(code) << self.nbits;
        self.nbits += width;
        while self.nbits >= 8 {
            self.out.push((self.buf & 0xFF) as u8);
            self.buf >>= 8;
            self.nbits -= 8;
        }
    }

    fn finish(mut self) -> Vec<u8> {
        if self.nbits > 0 {
            self.out.push((self.buf & 0xFF) as u8);
        }
        self.out
    }
}

/// Standard GIF LZW. The width bump happens after emitting a code, once
/// the next free slot has outgrown the current width, which is the giflib
/// ordering every decoder expects. The dictionary freezes at 4096 entries
/// rather than emitting a mid-stream clear.
fn lzw_compress(pixels: &[u8]) -> Vec<u8> {
    let clear: u16 = 1 << MIN_CODE_SIZE;
    let end: u16 = clear + 1;

    let mut w = BitWriter::new();
    let mut width = u32::from(MIN_CODE_SIZE) + 1;
    let mut dict: HashMap<(u16, u8), u16> = HashMap::new();
    let mut next_free: u16 = clear + 2;

    let mut emit = |w: &mut BitWriter, width: &mut u32, next_free: u16, code: u16| {
        w.put(code, *width);
        if u32::from(next_free) >= (1 << *width) && *width < 12 {
            *width += 1;
        }
    };

    emit(&mut w, &mut width, next_free, clear);

    let mut prefix: Option<u16> = None;
    for &p in pixels {
        let Some(pre) = prefix else {
            prefix = Some(u16::from(p));
            continue;
        };
        if let Some(&code) = dict.get(&(pre, p)) {
            prefix = Some(code);
        } else {
            emit(&mut w, &mut width, next_free, pre);
            if next_free < MAX_CODE {
                dict.insert((pre, p), next_free);
                next_free += 1;
            }
            prefix = Some(u16::from(p));
        }
    }
    if let Some(pre) = prefix {
        emit(&mut w, &mut width, next_free, pre);
    }
    emit(&mut w, &mut width, next_free, end);
    w.finish()
}
