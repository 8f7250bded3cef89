//! Poll/display controller: the state machine tying fetch, decode, and
//! raster together.
//!
//! One watcher instance owns every large allocation of the pipeline (the
//! resource buffer, the framebuffer, the background surface) and runs one
//! cycle at a time. The host loop owns pacing, button sampling, and the
//! watchdog; it calls [`Watcher::tick`] with the current time and
//! [`Watcher::flush`] afterwards.

use embedded_graphics::mono_font::MonoTextStyle;
use embedded_graphics::mono_font::ascii::FONT_8X13_BOLD;
use embedded_graphics::pixelcolor::Rgb565;
use embedded_graphics::prelude::*;
use embedded_graphics::primitives::{PrimitiveStyle, Rectangle, RoundedRectangle};
use embedded_graphics::text::{Alignment, Text};
use log::{debug, info};
use thiserror_no_std::Error;

use crate::buffer::ResourceBuffer;
use crate::config::WatchConfig;
use crate::decode::{DecodeError, FrameDecoder};
use crate::feed::{BASE_MAP_PATH, DateTime, TimeKey};
use crate::fetch::{Connect, FetchError, HttpFetcher};
use crate::palette::WHITE_INDEX;
use crate::raster::live::LiveRasterizer;
use crate::raster::map::MapRasterizer;
use crate::surface::{BackgroundSurface, FrameBuffer};

const BRIGHTNESS_FULL: u8 = 255;
const BRIGHTNESS_BOOT: u8 = 100;

const ALERT_TONE_HZ: u32 = 1200;
const ALERT_TONE_MS: u32 = 1000;
const BOOT_TONE_HZ: u32 = 440;
const BEEP_MS: u32 = 50;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchError {
    #[error("fetch failed: {0}")]
    Fetch(#[from] FetchError),
    #[error("decode failed: {0}")]
    Decode(#[from] DecodeError),
}

/// A debounced button edge, delivered by the host loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Button {
    Wake,
    MuteToggle,
    Sleep,
}

/// Observable display state. Mute gating happens here, never in the panel.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DisplayState {
    pub on: bool,
    /// Scheduled checks since the last forecast hit or button reset.
    pub countdown: u32,
    pub muted: bool,
}

/// Hardware the watcher drives directly: LCD backlight and buzzer.
pub trait Panel {
    fn set_brightness(&mut self, level: u8);
    fn play_tone(&mut self, hz: u32, ms: u32);
}

pub struct Watcher<'a, C: Connect, D: FrameDecoder, P: Panel> {
    fetcher: HttpFetcher<C>,
    decoder: D,
    panel: P,
    host: &'a str,
    config: WatchConfig,
    buffer: ResourceBuffer,
    background: BackgroundSurface,
    frame: FrameBuffer,
    state: DisplayState,
    last_check: Option<u64>,
}

impl<'a, C: Connect, D: FrameDecoder, P: Panel> Watcher<'a, C, D, P> {
    pub fn new(connector: C, decoder: D, panel: P, host: &'a str, config: WatchConfig) -> Self {
        Self {
            fetcher: HttpFetcher::new(connector),
            decoder,
            panel,
            host,
            config,
            buffer: ResourceBuffer::new(),
            background: BackgroundSurface::new(),
            frame: FrameBuffer::new(),
            state: DisplayState::default(),
            last_check: None,
        }
    }

    pub fn state(&self) -> DisplayState {
        self.state
    }

    pub fn frame(&self) -> &FrameBuffer {
        &self.frame
    }

    /// Fetch and quantize the startup base map into the background surface.
    ///
    /// Without a map no cycle can render anything useful, so the caller
    /// treats an error here as fatal.
    pub async fn load_base_map(&mut self) -> Result<(), WatchError> {
        self.background.fill(WHITE_INDEX);
        self.fetcher
            .fetch(self.host, BASE_MAP_PATH, &mut self.buffer)
            .await?;
        let mut sink = MapRasterizer::new(&mut self.background, &self.config);
        self.decoder.decode(self.buffer.as_slice(), &mut sink)?;
        info!("base map loaded ({} bytes)", self.buffer.len());
        Ok(())
    }

    /// Turn the panel on at boot brightness with the startup chirp.
    pub fn power_on(&mut self) {
        self.panel.set_brightness(BRIGHTNESS_BOOT);
        self.state.on = true;
        self.tone(BOOT_TONE_HZ, BEEP_MS);
    }

    /// Run one scheduled check against `key`.
    ///
    /// Fetch or decode failures never escape a cycle; a missing image is
    /// simply absent from this frame.
    pub async fn poll(&mut self, key: TimeKey) {
        self.background.blit(&mut self.frame);

        match self.fetch_and_draw(key.forecast_path().as_str()).await {
            Ok(()) => {
                self.state.countdown = 0;
                if !self.state.on {
                    info!("forecast active, waking display");
                    self.panel.set_brightness(BRIGHTNESS_FULL);
                    self.state.on = true;
                    self.tone(ALERT_TONE_HZ, ALERT_TONE_MS);
                }
            }
            Err(err) => debug!("forecast unavailable: {}", err),
        }

        // Overlays are only worth fetching while someone can see them.
        if self.state.on {
            if let Err(err) = self.fetch_and_draw(key.wavefront_path().as_str()).await {
                debug!("wavefront unavailable: {}", err);
            }
            if let Err(err) = self.fetch_and_draw(key.realtime_path().as_str()).await {
                debug!("realtime unavailable: {}", err);
            }
        }

        self.state.countdown += 1;
        if self.state.countdown >= self.config.display_off_count && self.state.on {
            info!("no forecast for {} checks, display off", self.state.countdown);
            self.state.on = false;
            self.panel.set_brightness(0);
        }
    }

    /// Outer step: run a poll if the check interval has elapsed.
    ///
    /// Deterministic and non-blocking apart from the poll itself; the host
    /// loop owns sleeping and the watchdog feed. Returns whether a poll ran.
    pub async fn tick(&mut self, now: DateTime) -> bool {
        let unix = now.unix_time();
        let due = match self.last_check {
            None => true,
            Some(prev) => unix >= prev + u64::from(self.config.check_interval_secs),
        };
        if !due {
            return false;
        }
        self.last_check = Some(unix);
        self.poll(TimeKey::from_datetime(&now)).await;
        true
    }

    /// Apply a button edge. Never fetches; the next scheduled poll fills
    /// the frame in.
    pub fn handle_button(&mut self, button: Button) {
        match button {
            Button::Wake => {
                self.panel.set_brightness(BRIGHTNESS_FULL);
                self.state.on = true;
                self.state.countdown = 0;
                self.tone(ALERT_TONE_HZ, BEEP_MS);
                self.overlay("LOADING...");
            }
            Button::MuteToggle => {
                self.state.muted = !self.state.muted;
                info!("mute {}", if self.state.muted { "on" } else { "off" });
                let text = if self.state.muted { "MUTE" } else { "MUTE OFF" };
                self.overlay(text);
            }
            Button::Sleep => {
                self.panel.set_brightness(0);
                self.state.on = false;
                self.state.countdown = 0;
                self.tone(ALERT_TONE_HZ, BEEP_MS);
            }
        }
    }

    /// Push the dirty rectangle to the physical panel.
    pub fn flush<T>(&mut self, display: &mut T) -> Result<(), T::Error>
    where
        T: DrawTarget<Color = Rgb565>,
    {
        self.frame.flush(display)
    }

    async fn fetch_and_draw(&mut self, path: &str) -> Result<(), WatchError> {
        self.fetcher.fetch(self.host, path, &mut self.buffer).await?;
        let mut sink = LiveRasterizer::new(&mut self.frame, self.config.label);
        self.decoder.decode(self.buffer.as_slice(), &mut sink)?;
        Ok(())
    }

    fn tone(&mut self, hz: u32, ms: u32) {
        if !self.state.muted {
            self.panel.play_tone(hz, ms);
        }
    }

    /// Centered status banner on top of the current frame.
    fn overlay(&mut self, message: &str) {
        let banner = RoundedRectangle::with_equal_corners(
            Rectangle::new(Point::new(80, 100), Size::new(160, 36)),
            Size::new(5, 5),
        );
        let _ = banner
            .into_styled(PrimitiveStyle::with_fill(Rgb565::BLACK))
            .draw(&mut self.frame);
        let style = MonoTextStyle::new(&FONT_8X13_BOLD, Rgb565::WHITE);
        let _ = Text::with_alignment(message, Point::new(160, 122), style, Alignment::Center)
            .draw(&mut self.frame);
    }
}
