//! In-process stand-in for the kyoshin image feed.
//!
//! Implements the core `Connect` trait with connections that parse the
//! HTTP request line and answer with synthetic GIFs, so the whole
//! fetch -> decode -> raster -> watch pipeline runs unmodified on the host.

use std::cell::RefCell;
use std::rc::Rc;

use embedded_io_async::{ErrorKind, Read, Write};
use log::debug;

use shindo_core::feed::BASE_MAP_PATH;
use shindo_core::fetch::{Connect, FetchError};

use crate::gifenc::{self, Frame};

const SOURCE_WIDTH: u16 = 352;
const SOURCE_HEIGHT: u16 = 400;

/// Raw-index values chosen so the quantizer maps them onto the expected
/// map entries: coastline to black, sea to ocean blue, land to white.
const COAST_VALUE: u8 = 0;
const SEA_VALUE: u8 = 100;
const LAND_VALUE: u8 = 250;

/// Palette slots used by the live overlay images.
const BLOB_STRONG: u8 = 10;
const BLOB_WEAK: u8 = 11;
const RING: u8 = 20;
const DOT: u8 = 30;

pub struct FeedState {
    /// Advances once per forecast request; drives the blob animation.
    t: u32,
    /// When set, forecast requests answer 404 so the countdown/off
    /// transition can be watched live.
    pub failing: bool,
}

impl FeedState {
    fn new() -> Self {
        Self {
            t: 0,
            failing: false,
        }
    }

    fn respond(&mut self, path: &str) -> Vec<u8> {
        debug!("feed request: {}", path);
        if path == BASE_MAP_PATH {
            return http_ok(&self.base_map());
        }
        if path.contains("EstShindoImg") {
            if self.failing {
                return http_not_found();
            }
            self.t = self.t.wrapping_add(1);
            return http_ok(&self.forecast());
        }
        if path.contains("PSWaveImg") {
            return http_ok(&self.wavefront());
        }
        if path.contains("RealTimeImg") {
            return http_ok(&self.realtime());
        }
        http_not_found()
    }

    /// Gray sea, one white diamond island with a black coastline.
    fn base_map(&self) -> Vec<u8> {
        let mut pixels = vec![SEA_VALUE; usize::from(SOURCE_WIDTH) * usize::from(SOURCE_HEIGHT)];
        let (cx, cy) = (i32::from(SOURCE_WIDTH) / 2, i32::from(SOURCE_HEIGHT) / 2);
        for y in 0..i32::from(SOURCE_HEIGHT) {
            for x in 0..i32::from(SOURCE_WIDTH) {
                let d = (x - cx).abs() + (y - cy).abs();
                let idx = (y * i32::from(SOURCE_WIDTH) + x) as usize;
                if d < 120 {
                    pixels[idx] = LAND_VALUE;
                } else if d < 124 {
                    pixels[idx] = COAST_VALUE;
                }
            }
        }
        gifenc::encode(&Frame {
            width: SOURCE_WIDTH,
            height: SOURCE_HEIGHT,
            palette: &grayscale_palette(),
            pixels: &pixels,
            transparent: None,
        })
    }

    /// Transparent frame with one intensity blob orbiting the island.
    fn forecast(&self) -> Vec<u8> {
        let mut pixels = vec![0u8; usize::from(SOURCE_WIDTH) * usize::from(SOURCE_HEIGHT)];
        let angle = f64::from(self.t) * 0.35;
        let cx = f64::from(SOURCE_WIDTH) / 2.0 + 70.0 * angle.cos();
        let cy = f64::from(SOURCE_HEIGHT) / 2.0 + 70.0 * angle.sin();
        for y in 0..i32::from(SOURCE_HEIGHT) {
            for x in 0..i32::from(SOURCE_WIDTH) {
                let dx = f64::from(x) - cx;
                let dy = f64::from(y) - cy;
                let d2 = dx * dx + dy * dy;
                let idx = (y * i32::from(SOURCE_WIDTH) + x) as usize;
                if d2 < 100.0 {
                    pixels[idx] = BLOB_STRONG;
                } else if d2 < 300.0 {
                    pixels[idx] = BLOB_WEAK;
                }
            }
        }
        gifenc::encode(&Frame {
            width: SOURCE_WIDTH,
            height: SOURCE_HEIGHT,
            palette: &overlay_palette(),
            pixels: &pixels,
            transparent: Some(0),
        })
    }

    /// Expanding wavefront ring around the island center.
    fn wavefront(&self) -> Vec<u8> {
        let mut pixels = vec![0u8; usize::from(SOURCE_WIDTH) * usize::from(SOURCE_HEIGHT)];
        let radius = f64::from(20 + (self.t * 9) % 160);
        let (cx, cy) = (f64::from(SOURCE_WIDTH) / 2.0, f64::from(SOURCE_HEIGHT) / 2.0);
        for y in 0..i32::from(SOURCE_HEIGHT) {
            for x in 0..i32::from(SOURCE_WIDTH) {
                let d = (f64::from(x) - cx).hypot(f64::from(y) - cy);
                if (d - radius).abs() < 2.0 {
                    pixels[(y * i32::from(SOURCE_WIDTH) + x) as usize] = RING;
                }
            }
        }
        gifenc::encode(&Frame {
            width: SOURCE_WIDTH,
            height: SOURCE_HEIGHT,
            palette: &overlay_palette(),
            pixels: &pixels,
            transparent: Some(0),
        })
    }

    /// A scatter of measurement dots.
    fn realtime(&self) -> Vec<u8> {
        let mut pixels = vec![0u8; usize::from(SOURCE_WIDTH) * usize::from(SOURCE_HEIGHT)];
        for i in 0u32..40 {
            let x = (i * 61 + self.t * 7) % u32::from(SOURCE_WIDTH);
            let y = (i * 97 + 31) % u32::from(SOURCE_HEIGHT);
            pixels[(y * u32::from(SOURCE_WIDTH) + x) as usize] = DOT;
        }
        gifenc::encode(&Frame {
            width: SOURCE_WIDTH,
            height: SOURCE_HEIGHT,
            palette: &overlay_palette(),
            pixels: &pixels,
            transparent: Some(0),
        })
    }
}

fn grayscale_palette() -> Vec<[u8; 3]> {
    (0..=255u16).map(|v| [v as u8; 3]).collect()
}

fn overlay_palette() -> Vec<[u8; 3]> {
    let mut palette = vec![[0u8, 0, 0]; 256];
    palette[usize::from(BLOB_STRONG)] = [255, 40, 0];
    palette[usize::from(BLOB_WEAK)] = [255, 160, 0];
    palette[usize::from(RING)] = [0, 80, 255];
    palette[usize::from(DOT)] = [0, 160, 60];
    palette
}

fn http_ok(body: &[u8]) -> Vec<u8> {
    let mut out = format!(
        "HTTP/1.0 200 OK\r\nContent-Length: {}\r\nContent-Type: image/gif\r\n\r\n",
        body.len()
    )
    .into_bytes();
    out.extend_from_slice(body);
    out
}

fn http_not_found() -> Vec<u8> {
    b"HTTP/1.0 404 Not Found\r\nContent-Length: 0\r\n\r\n".to_vec()
}

/// Feed connector handed to the watcher. The shared state handle lets the
/// main loop flip failure injection while the watcher owns the connector.
pub struct SyntheticFeed {
    state: Rc<RefCell<FeedState>>,
}

impl SyntheticFeed {
    pub fn new() -> (Self, Rc<RefCell<FeedState>>) {
        let state = Rc::new(RefCell::new(FeedState::new()));
        (
            Self {
                state: state.clone(),
            },
            state,
        )
    }
}

impl Connect for SyntheticFeed {
    type Connection<'c>
        = FeedConn
    where
        Self: 'c;

    async fn connect(&mut self, _host: &str, _port: u16) -> Result<FeedConn, FetchError> {
        Ok(FeedConn {
            state: self.state.clone(),
            request: Vec::new(),
            response: None,
            pos: 0,
        })
    }
}

/// One request/response exchange. The response is synthesized lazily on
/// the first read, once the request line has been written.
pub struct FeedConn {
    state: Rc<RefCell<FeedState>>,
    request: Vec<u8>,
    response: Option<Vec<u8>>,
    pos: usize,
}

impl FeedConn {
    fn request_path(&self) -> Option<String> {
        let text = core::str::from_utf8(&self.request).ok()?;
        let line = text.lines().next()?;
        let mut parts = line.split(' ');
        if parts.next()? != "GET" {
            return None;
        }
        parts.next().map(str::to_owned)
    }
}

impl embedded_io_async::ErrorType for FeedConn {
    type Error = ErrorKind;
}

impl Read for FeedConn {
    async fn read(&mut self, buf: &mut [u8]) -> Result<usize, ErrorKind> {
        if self.response.is_none() {
            let path = self.request_path().unwrap_or_default();
            self.response = Some(self.state.borrow_mut().respond(&path));
        }
        let response = self.response.as_ref().expect("set above");
        let n = (response.len() - self.pos).min(buf.len());
        buf[..n].copy_from_slice(&response[self.pos..self.pos + n]);
        self.pos += n;
        Ok(n)
    }
}

impl Write for FeedConn {
    async fn write(&mut self, buf: &[u8]) -> Result<usize, ErrorKind> {
        self.request.extend_from_slice(buf);
        Ok(buf.len())
    }
}
