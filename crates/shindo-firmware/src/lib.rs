//! ESP32-S3 specific plumbing for the shindo-rs earthquake monitor.
//!
//! Everything that cannot compile on a desktop target lives here: the
//! embassy-net connector, the SNTP-seeded clock, and the backlight/buzzer
//! panel. The portable pipeline itself is `shindo-core`.

#![no_std]

extern crate alloc;

pub mod clock;
pub mod net;
pub mod panel;
pub mod secrets;
