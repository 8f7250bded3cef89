use serde::{Deserialize, Serialize};

use crate::feed::FEED_HOST;

#[derive(Serialize, Deserialize, Debug, Default)]
#[serde(bound(deserialize = "'de: 'a"))]
pub struct Config<'a> {
    pub internet: InternetConfig<'a>,
    pub feed: FeedConfig<'a>,
    pub watch: WatchConfig,
}

#[derive(Serialize, Deserialize, Debug, Default)]
pub struct InternetConfig<'a> {
    pub ssid: &'a str,
    pub password: &'a str,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct FeedConfig<'a> {
    pub host: &'a str,
}

impl Default for FeedConfig<'_> {
    fn default() -> Self {
        Self { host: FEED_HOST }
    }
}

/// Tuning for the poll/display state machine and the rasterizers.
#[derive(Serialize, Deserialize, Debug, Clone, Copy)]
pub struct WatchConfig {
    /// Seconds between scheduled feed checks.
    pub check_interval_secs: u32,
    /// Number of scheduled checks after the last forecast hit before the
    /// display turns itself off.
    pub display_off_count: u32,
    /// Textual label area of the feed images, kept at source resolution by
    /// the live rasterizer.
    pub label: LabelRegion,
    /// Height of the label strip cleared out of the background map. Wider
    /// than the live label region so descenders never collide with map
    /// content.
    pub map_label_clear_height: u16,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            check_interval_secs: 5,
            display_off_count: 6,
            label: LabelRegion::default(),
            map_label_clear_height: 40,
        }
    }
}

/// Rectangle at the image origin reserved for textual labels.
///
/// The boundary values are not principled, they match where the feed
/// happens to draw its timestamps and legends.
#[derive(Serialize, Deserialize, Debug, Clone, Copy)]
pub struct LabelRegion {
    pub width: u16,
    pub height: u16,
}

impl Default for LabelRegion {
    fn default() -> Self {
        Self {
            width: 220,
            height: 35,
        }
    }
}

impl LabelRegion {
    /// Whether an (x, y) coordinate falls inside the label area.
    pub fn contains(&self, x: i32, y: i32) -> bool {
        x >= 0 && y >= 0 && x < self.width as i32 && y < self.height as i32
    }
}
