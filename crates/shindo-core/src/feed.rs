//! Feed time bucketing, resource paths, and the clock seam.
//!
//! The feed publishes one image per second per category, named after the
//! JST wall-clock second it describes. A poll derives a [`TimeKey`] from
//! the current clock reading and synthesizes the three resource paths for
//! that instant.

use core::fmt::Write as _;

use heapless::String;

/// Host serving the feed images.
pub const FEED_HOST: &str = "www.kmoni.bosai.go.jp";

/// Path of the startup base map (not time-bucketed).
pub const BASE_MAP_PATH: &str = "/data/map_img/CommonImg/base_map_w.gif";

/// A synthesized feed resource path.
pub type ResourcePath = String<96>;

/// Civil date and time, JST.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateTime {
    pub year: u16,
    pub month: u8,
    pub day: u8,
    pub hour: u8,
    pub minute: u8,
    pub second: u8,
}

impl DateTime {
    /// Convert seconds since the Unix epoch into a civil date and time.
    pub fn from_unix(secs: u64) -> Self {
        let days = (secs / 86_400) as i64;
        let rem = secs % 86_400;
        let (year, month, day) = civil_from_days(days);
        Self {
            year: year as u16,
            month,
            day,
            hour: (rem / 3600) as u8,
            minute: (rem / 60 % 60) as u8,
            second: (rem % 60) as u8,
        }
    }

    /// Seconds since the Unix epoch for this civil date and time.
    pub fn unix_time(&self) -> u64 {
        let days = days_from_civil(self.year as i64, self.month as i64, self.day as i64);
        days as u64 * 86_400
            + self.hour as u64 * 3600
            + self.minute as u64 * 60
            + self.second as u64
    }
}

/// Source of the current wall-clock reading.
///
/// On firmware this is an SNTP-seeded monotonic counter; tests and the
/// simulator script it.
pub trait Clock {
    fn now(&mut self) -> DateTime;
}

/// Date+time bucket naming the feed resources for one observation instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeKey {
    year: u16,
    month: u8,
    day: u8,
    hour: u8,
    minute: u8,
    second: u8,
}

impl TimeKey {
    /// Derive the key for a clock reading.
    ///
    /// The feed publishes with a little latency, so a nonzero second is
    /// truncated back by one to ask for an image that already exists.
    pub fn from_datetime(dt: &DateTime) -> Self {
        Self {
            year: dt.year,
            month: dt.month,
            day: dt.day,
            hour: dt.hour,
            minute: dt.minute,
            second: dt.second.saturating_sub(1),
        }
    }

    fn date_dir(&self) -> String<8> {
        let mut s = String::new();
        let _ = write!(s, "{:04}{:02}{:02}", self.year, self.month, self.day);
        s
    }

    fn stamp(&self) -> String<14> {
        let mut s = String::new();
        let _ = write!(
            s,
            "{:04}{:02}{:02}{:02}{:02}{:02}",
            self.year, self.month, self.day, self.hour, self.minute, self.second
        );
        s
    }

    fn path(&self, segment: &str, suffix: &str) -> ResourcePath {
        let mut s = ResourcePath::new();
        let _ = write!(
            s,
            "/data/map_img/{}/{}/{}.{}.gif",
            segment,
            self.date_dir(),
            self.stamp(),
            suffix
        );
        s
    }

    /// Estimated-intensity forecast image (the alerting one).
    pub fn forecast_path(&self) -> ResourcePath {
        self.path("EstShindoImg/eew", "eew")
    }

    /// Epicenter and P/S wavefront overlay.
    pub fn wavefront_path(&self) -> ResourcePath {
        self.path("PSWaveImg/eew", "eew")
    }

    /// Real-time measured intensity overlay.
    pub fn realtime_path(&self) -> ResourcePath {
        self.path("RealTimeImg/jma_s", "jma_s")
    }
}

/// Days since 1970-01-01 for a civil date (proleptic Gregorian).
fn days_from_civil(year: i64, month: i64, day: i64) -> i64 {
    let y = year - i64::from(month <= 2);
    let era = y.div_euclid(400);
    let yoe = y - era * 400;
    let doy = (153 * (month + if month > 2 { -3 } else { 9 }) + 2) / 5 + day - 1;
    let doe = yoe * 365 + yoe / 4 - yoe / 100 + doy;
    era * 146_097 + doe - 719_468
}

/// Civil date for days since 1970-01-01.
fn civil_from_days(days: i64) -> (i64, u8, u8) {
    let z = days + 719_468;
    let era = z.div_euclid(146_097);
    let doe = z - era * 146_097;
    let yoe = (doe - doe / 1460 + doe / 36_524 - doe / 146_096) / 365;
    let y = yoe + era * 400;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let day = doy - (153 * mp + 2) / 5 + 1;
    let month = if mp < 10 { mp + 3 } else { mp - 9 };
    (y + i64::from(month <= 2), month as u8, day as u8)
}
