//! SNTP-seeded wall clock (JST).
//!
//! The feed is named after Japanese wall-clock seconds, so the device
//! needs real time once at boot. A single SNTP exchange seeds the clock;
//! afterwards `embassy_time::Instant` carries it forward.

use embassy_net::Stack;
use embassy_net::dns::DnsQueryType;
use embassy_net::udp::{PacketMetadata, UdpSocket};
use embassy_time::{Duration, Instant, with_timeout};
use log::{debug, warn};

use shindo_core::feed::{Clock, DateTime};

pub const NTP_SERVER: &str = "ntp.nict.jp";

const NTP_PORT: u16 = 123;
const LOCAL_PORT: u16 = 50123;
const NTP_PACKET_BYTES: usize = 48;
/// Seconds between the NTP epoch (1900) and the Unix epoch (1970).
const NTP_UNIX_DELTA: u64 = 2_208_988_800;
const JST_OFFSET_SECS: u64 = 9 * 3600;
const QUERY_TIMEOUT: Duration = Duration::from_secs(5);

/// Wall clock counting forward from one SNTP fix.
pub struct SntpClock {
    base_unix_jst: u64,
    synced_at: Instant,
}

impl SntpClock {
    pub fn new(base_unix_jst: u64) -> Self {
        Self {
            base_unix_jst,
            synced_at: Instant::now(),
        }
    }
}

impl Clock for SntpClock {
    fn now(&mut self) -> DateTime {
        DateTime::from_unix(self.base_unix_jst + self.synced_at.elapsed().as_secs())
    }
}

/// One SNTP query. Returns JST-adjusted Unix seconds, or `None` on any
/// failure (the caller retries).
pub async fn sntp_query(stack: Stack<'_>) -> Option<u64> {
    let addrs = stack
        .dns_query(NTP_SERVER, DnsQueryType::A)
        .await
        .map_err(|err| warn!("NTP DNS lookup failed: {:?}", err))
        .ok()?;
    let addr = *addrs.first()?;

    let mut rx_meta = [PacketMetadata::EMPTY; 4];
    let mut rx_buffer = [0u8; 128];
    let mut tx_meta = [PacketMetadata::EMPTY; 4];
    let mut tx_buffer = [0u8; 128];
    let mut socket = UdpSocket::new(
        stack,
        &mut rx_meta,
        &mut rx_buffer,
        &mut tx_meta,
        &mut tx_buffer,
    );
    socket
        .bind(LOCAL_PORT)
        .map_err(|err| warn!("NTP bind failed: {:?}", err))
        .ok()?;

    // Client request: version 4, mode 3, everything else zero.
    let mut packet = [0u8; NTP_PACKET_BYTES];
    packet[0] = 0x23;
    socket
        .send_to(&packet, (addr, NTP_PORT))
        .await
        .map_err(|err| warn!("NTP send failed: {:?}", err))
        .ok()?;

    let mut response = [0u8; NTP_PACKET_BYTES];
    let (len, _) = with_timeout(QUERY_TIMEOUT, socket.recv_from(&mut response))
        .await
        .map_err(|_| warn!("NTP query timed out"))
        .ok()?
        .map_err(|err| warn!("NTP receive failed: {:?}", err))
        .ok()?;
    if len < NTP_PACKET_BYTES {
        warn!("short NTP response ({} bytes)", len);
        return None;
    }

    // Transmit timestamp seconds, bytes 40..44, big-endian.
    let ntp_secs = u64::from(u32::from_be_bytes([
        response[40],
        response[41],
        response[42],
        response[43],
    ]));
    if ntp_secs <= NTP_UNIX_DELTA {
        return None;
    }
    let unix_jst = ntp_secs - NTP_UNIX_DELTA + JST_OFFSET_SECS;
    debug!("NTP fix: {} (JST unix)", unix_jst);
    Some(unix_jst)
}
