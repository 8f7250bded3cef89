//! Wi-Fi credentials, baked in at build time.
//!
//! `build.rs` reads them from a `.env` file next to the crate (or the
//! plain environment) and re-exports them as compile-time env vars.

pub const WIFI_SSID: &str = env!("WIFI_SSID");
pub const WIFI_PASSWORD: &str = env!("WIFI_PASSWORD");
