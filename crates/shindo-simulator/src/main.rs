//! Desktop simulator for the shindo-rs earthquake monitor.
//!
//! Runs the full fetch -> decode -> raster -> watch pipeline against a
//! synthetic in-process feed and renders the framebuffer in an SDL2 window
//! via `embedded-graphics-simulator`.
//!
//! # Key bindings
//!
//! | Key | Action                        |
//! |-----|-------------------------------|
//! | 1   | Wake button                   |
//! | 2   | Mute toggle button            |
//! | 3   | Sleep button                  |
//! | F   | Toggle forecast feed failures |
//! | Q   | Quit                          |

mod feed;
mod gifenc;

use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use embassy_futures::block_on;
use embedded_graphics::pixelcolor::Rgb565;
use embedded_graphics::prelude::*;
use embedded_graphics_simulator::{
    OutputSettingsBuilder, SimulatorDisplay, SimulatorEvent, Window, sdl2::Keycode,
};
use log::info;

use shindo_core::config::WatchConfig;
use shindo_core::decode::gif::GifDecoder;
use shindo_core::feed::{Clock, DateTime, FEED_HOST};
use shindo_core::surface::{DISPLAY_HEIGHT_PX, DISPLAY_WIDTH_PX};
use shindo_core::watcher::{Button, Panel, Watcher};

use feed::SyntheticFeed;

/// Pixel scale factor for the simulator window.
const WINDOW_SCALE: u32 = 2;

/// Target frame duration (~30 FPS).
const FRAME_DURATION: Duration = Duration::from_millis(33);

/// Host wall clock shifted to JST, which is what the feed keys on.
struct SystemClock;

impl Clock for SystemClock {
    fn now(&mut self) -> DateTime {
        let unix = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs();
        DateTime::from_unix(unix + 9 * 3600)
    }
}

/// Panel double: brightness and tones go to the log instead of hardware.
struct LogPanel;

impl Panel for LogPanel {
    fn set_brightness(&mut self, level: u8) {
        info!("panel brightness -> {}", level);
    }

    fn play_tone(&mut self, hz: u32, ms: u32) {
        info!("panel tone: {} Hz for {} ms", hz, ms);
    }
}

fn keycode_to_button(keycode: Keycode) -> Option<Button> {
    match keycode {
        Keycode::Num1 | Keycode::Kp1 => Some(Button::Wake),
        Keycode::Num2 | Keycode::Kp2 => Some(Button::MuteToggle),
        Keycode::Num3 | Keycode::Kp3 => Some(Button::Sleep),
        _ => None,
    }
}

fn main() {
    env_logger::init();
    info!("Starting shindo-rs simulator");
    info!(
        "Display: {}x{} (scale {}x)",
        DISPLAY_WIDTH_PX, DISPLAY_HEIGHT_PX, WINDOW_SCALE
    );
    info!("Keys: 1=Wake  2=Mute  3=Sleep  F=FeedFailures  Q=Quit");

    let mut display = SimulatorDisplay::<Rgb565>::new(Size::new(
        u32::from(DISPLAY_WIDTH_PX),
        u32::from(DISPLAY_HEIGHT_PX),
    ));
    let output_settings = OutputSettingsBuilder::new().scale(WINDOW_SCALE).build();
    let mut window = Window::new("Shindo Simulator", &output_settings);

    let (connect, feed_state) = SyntheticFeed::new();
    let mut clock = SystemClock;
    let mut watcher = Watcher::new(
        connect,
        GifDecoder::new(),
        LogPanel,
        FEED_HOST,
        WatchConfig::default(),
    );

    block_on(watcher.load_base_map()).expect("synthetic base map must decode");
    watcher.power_on();

    // The SDL window is lazily initialized on the first `update()` call.
    // We must call `update()` once before `events()` or it will panic.
    window.update(&display);

    'running: loop {
        let frame_start = Instant::now();

        for event in window.events() {
            match event {
                SimulatorEvent::Quit => break 'running,
                SimulatorEvent::KeyDown { keycode, .. } => {
                    if keycode == Keycode::Q || keycode == Keycode::Escape {
                        break 'running;
                    }
                    if keycode == Keycode::F {
                        let mut state = feed_state.borrow_mut();
                        state.failing = !state.failing;
                        info!("forecast failures: {}", state.failing);
                    }
                    if let Some(button) = keycode_to_button(keycode) {
                        info!("button: {:?}", button);
                        watcher.handle_button(button);
                    }
                }
                _ => {}
            }
        }

        if block_on(watcher.tick(clock.now())) {
            info!("polled; state: {:?}", watcher.state());
        }

        watcher
            .flush(&mut display)
            .expect("simulator display is infallible");
        window.update(&display);

        if let Some(remaining) = FRAME_DURATION.checked_sub(frame_start.elapsed()) {
            std::thread::sleep(remaining);
        }
    }
}
