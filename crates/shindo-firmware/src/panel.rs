//! Backlight and buzzer behind the watcher's panel seam.

use embassy_time::{Duration, block_for};
use esp_hal::gpio::Output;
use esp_hal::ledc::LowSpeed;
use esp_hal::ledc::channel::{Channel, ChannelIFace};
use log::warn;

use shindo_core::watcher::Panel;

/// LCD backlight on an LEDC PWM channel, buzzer bit-banged on a plain
/// GPIO. Tones are short and infrequent enough that blocking through them
/// is fine; the watcher never plays one mid-transfer.
pub struct LcdPanel<'d> {
    backlight: Channel<'d, LowSpeed>,
    buzzer: Output<'d>,
}

impl<'d> LcdPanel<'d> {
    pub fn new(backlight: Channel<'d, LowSpeed>, buzzer: Output<'d>) -> Self {
        Self { backlight, buzzer }
    }
}

impl Panel for LcdPanel<'_> {
    fn set_brightness(&mut self, level: u8) {
        let pct = (u32::from(level) * 100 / 255) as u8;
        if let Err(err) = self.backlight.set_duty(pct) {
            warn!("backlight duty update failed: {:?}", err);
        }
    }

    fn play_tone(&mut self, hz: u32, ms: u32) {
        if hz == 0 {
            return;
        }
        let half_period = Duration::from_micros(u64::from(500_000 / hz));
        let cycles = ms.saturating_mul(hz) / 1000;
        for _ in 0..cycles {
            self.buzzer.set_high();
            block_for(half_period);
            self.buzzer.set_low();
            block_for(half_period);
        }
    }
}
