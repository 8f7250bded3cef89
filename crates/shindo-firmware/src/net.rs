//! embassy-net implementation of the feed connector.

use embassy_net::Stack;
use embassy_net::dns::DnsQueryType;
use embassy_net::tcp::TcpSocket;
use embassy_time::Duration;
use log::warn;

use shindo_core::fetch::{Connect, FetchError};

/// Per-direction socket buffer sizes. The feed responses are small (the
/// resource buffer caps them at 20 kB) but arrive in large TCP segments.
const RX_BUFFER_BYTES: usize = 4096;
const TX_BUFFER_BYTES: usize = 512;

/// Per-socket timeout. A cycle runs up to three sequential fetches
/// between watchdog feeds, so the worst case has to stay inside the
/// 10 s watchdog window.
const SOCKET_TIMEOUT: Duration = Duration::from_secs(3);

/// [`Connect`] over the Wi-Fi stack: one DNS lookup, one TCP socket.
///
/// Owns the socket buffers; the returned socket borrows them, so only one
/// connection can be alive at a time, which is exactly how the fetcher
/// drives it.
pub struct StackConnect {
    stack: Stack<'static>,
    rx_buffer: [u8; RX_BUFFER_BYTES],
    tx_buffer: [u8; TX_BUFFER_BYTES],
}

impl StackConnect {
    pub fn new(stack: Stack<'static>) -> Self {
        Self {
            stack,
            rx_buffer: [0; RX_BUFFER_BYTES],
            tx_buffer: [0; TX_BUFFER_BYTES],
        }
    }
}

impl Connect for StackConnect {
    type Connection<'c>
        = TcpSocket<'c>
    where
        Self: 'c;

    async fn connect(&mut self, host: &str, port: u16) -> Result<TcpSocket<'_>, FetchError> {
        let addrs = self
            .stack
            .dns_query(host, DnsQueryType::A)
            .await
            .map_err(|err| {
                warn!("DNS lookup for {} failed: {:?}", host, err);
                FetchError::Connect
            })?;
        let addr = *addrs.first().ok_or(FetchError::Connect)?;

        let mut socket = TcpSocket::new(self.stack, &mut self.rx_buffer, &mut self.tx_buffer);
        socket.set_timeout(Some(SOCKET_TIMEOUT));
        socket.connect((addr, port)).await.map_err(|err| {
            warn!("TCP connect to {}:{} failed: {:?}", host, port, err);
            FetchError::Connect
        })?;
        Ok(socket)
    }
}
