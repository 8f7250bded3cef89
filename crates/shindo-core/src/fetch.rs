//! Bounded streaming fetch of feed resources over plain HTTP.
//!
//! One GET per resource, HTTP/1.0 with `Connection: close` so the body is
//! simply "everything until EOF" and chunked transfer never appears. The
//! fetch is abandoned the moment anything would overflow the fixed
//! [`ResourceBuffer`]; callers must treat any failure as "no image" and
//! never trust prior buffer contents.
//!
//! There is no retry logic here. A failed fetch is skipped by the watcher
//! and the next scheduled cycle simply asks for a newer resource.

use core::fmt::Write as _;

use embedded_io_async::{Read, Write};
use heapless::String;
use log::debug;
use thiserror_no_std::Error;

use crate::buffer::ResourceBuffer;

/// Upper bound on the response head (status line + headers).
const MAX_HEADER_BYTES: usize = 1024;

/// Read granularity for bodies without a declared length.
const BODY_CHUNK_BYTES: usize = 512;

const HTTP_PORT: u16 = 80;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchError {
    #[error("connection failed")]
    Connect,
    #[error("unexpected HTTP status {0}")]
    Status(u16),
    #[error("malformed response header")]
    BadHeader,
    #[error("response larger than the buffer capacity")]
    CapacityExceeded,
    #[error("connection closed before the declared length")]
    Truncated,
    #[error("transport error")]
    Io,
}

/// Opens a byte stream to a host. Firmware implements this over DNS +
/// embassy-net TCP; tests and the simulator script it.
///
/// The connection may borrow socket buffers owned by the connector, hence
/// the lifetime on the associated type. At most one connection is alive at
/// a time.
pub trait Connect {
    type Connection<'c>: Read + Write
    where
        Self: 'c;

    async fn connect(&mut self, host: &str, port: u16)
    -> Result<Self::Connection<'_>, FetchError>;
}

/// Streams one resource at a time into a caller-owned [`ResourceBuffer`].
pub struct HttpFetcher<C: Connect> {
    connector: C,
}

impl<C: Connect> HttpFetcher<C> {
    pub fn new(connector: C) -> Self {
        Self { connector }
    }

    /// Fetch `http://{host}{path}` into `buffer`.
    ///
    /// On success the buffer holds exactly the response body. On any error
    /// the buffer contents are unspecified and must not be used.
    pub async fn fetch(
        &mut self,
        host: &str,
        path: &str,
        buffer: &mut ResourceBuffer,
    ) -> Result<usize, FetchError> {
        buffer.clear();
        debug!("GET http://{}{}", host, path);

        let mut conn = self.connector.connect(host, HTTP_PORT).await?;

        let mut request: String<192> = String::new();
        let _ = write!(
            request,
            "GET {path} HTTP/1.0\r\nHost: {host}\r\nConnection: close\r\n\r\n"
        );
        conn.write_all(request.as_bytes())
            .await
            .map_err(|_| FetchError::Io)?;
        conn.flush().await.map_err(|_| FetchError::Io)?;

        // Accumulate the response head until the blank line.
        let mut header = [0u8; MAX_HEADER_BYTES];
        let mut filled = 0usize;
        let head_len = loop {
            if let Some(end) = find_terminator(&header[..filled]) {
                break end;
            }
            if filled == header.len() {
                return Err(FetchError::BadHeader);
            }
            let n = conn
                .read(&mut header[filled..])
                .await
                .map_err(|_| FetchError::Io)?;
            if n == 0 {
                return Err(FetchError::BadHeader);
            }
            filled += n;
        };

        let head = &header[..head_len];
        let status = parse_status(head)?;
        if status != 200 {
            debug!("status {} for {}", status, path);
            return Err(FetchError::Status(status));
        }
        let declared = parse_content_length(head)?;

        // A declared size over capacity is rejected before any body byte
        // is accepted.
        if let Some(len) = declared
            && len > buffer.capacity()
        {
            return Err(FetchError::CapacityExceeded);
        }

        let body_prefix = &header[head_len + 4..filled];
        match declared {
            Some(len) => {
                let prefix = &body_prefix[..body_prefix.len().min(len)];
                buffer
                    .extend_from_slice(prefix)
                    .map_err(|_| FetchError::CapacityExceeded)?;
                while buffer.len() < len {
                    let want = len - buffer.len();
                    let spare = buffer.spare_mut();
                    let n = conn
                        .read(&mut spare[..want])
                        .await
                        .map_err(|_| FetchError::Io)?;
                    if n == 0 {
                        return Err(FetchError::Truncated);
                    }
                    buffer
                        .commit(n)
                        .map_err(|_| FetchError::CapacityExceeded)?;
                }
            }
            None => {
                // No declared length: stream until EOF, abandoning at the
                // exact chunk that would overflow.
                buffer
                    .extend_from_slice(body_prefix)
                    .map_err(|_| FetchError::CapacityExceeded)?;
                let mut chunk = [0u8; BODY_CHUNK_BYTES];
                loop {
                    let n = conn.read(&mut chunk).await.map_err(|_| FetchError::Io)?;
                    if n == 0 {
                        break;
                    }
                    buffer
                        .extend_from_slice(&chunk[..n])
                        .map_err(|_| FetchError::CapacityExceeded)?;
                }
            }
        }

        debug!("fetched {} bytes from {}", buffer.len(), path);
        Ok(buffer.len())
    }
}

/// Index of the `\r\n\r\n` head terminator, if present.
fn find_terminator(data: &[u8]) -> Option<usize> {
    data.windows(4).position(|w| w == b"\r\n\r\n")
}

fn parse_status(head: &[u8]) -> Result<u16, FetchError> {
    let line = head.split(|&b| b == b'\r').next().ok_or(FetchError::BadHeader)?;
    let text = core::str::from_utf8(line).map_err(|_| FetchError::BadHeader)?;
    if !text.starts_with("HTTP/") {
        return Err(FetchError::BadHeader);
    }
    let code = text.split(' ').nth(1).ok_or(FetchError::BadHeader)?;
    code.parse().map_err(|_| FetchError::BadHeader)
}

fn parse_content_length(head: &[u8]) -> Result<Option<usize>, FetchError> {
    for line in head.split(|&b| b == b'\n') {
        let line = line.strip_suffix(b"\r").unwrap_or(line);
        let Some(colon) = line.iter().position(|&b| b == b':') else {
            continue;
        };
        let (name, value) = line.split_at(colon);
        if name.eq_ignore_ascii_case(b"content-length") {
            let value = core::str::from_utf8(&value[1..]).map_err(|_| FetchError::BadHeader)?;
            let len = value.trim().parse().map_err(|_| FetchError::BadHeader)?;
            return Ok(Some(len));
        }
    }
    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::rc::Rc;
    use alloc::vec::Vec;
    use core::cell::RefCell;
    use embassy_futures::block_on;
    use embedded_io_async::ErrorKind;

    /// In-memory connection serving a canned response in fixed-size reads.
    struct TestConn {
        data: Vec<u8>,
        pos: usize,
        read_size: usize,
        written: Rc<RefCell<Vec<u8>>>,
    }

    impl embedded_io_async::ErrorType for TestConn {
        type Error = ErrorKind;
    }

    impl Read for TestConn {
        async fn read(&mut self, buf: &mut [u8]) -> Result<usize, ErrorKind> {
            let n = (self.data.len() - self.pos).min(self.read_size).min(buf.len());
            buf[..n].copy_from_slice(&self.data[self.pos..self.pos + n]);
            self.pos += n;
            Ok(n)
        }
    }

    impl Write for TestConn {
        async fn write(&mut self, buf: &[u8]) -> Result<usize, ErrorKind> {
            self.written.borrow_mut().extend_from_slice(buf);
            Ok(buf.len())
        }

        async fn flush(&mut self) -> Result<(), ErrorKind> {
            Ok(())
        }
    }

    struct CannedConnect {
        response: Vec<u8>,
        read_size: usize,
        written: Rc<RefCell<Vec<u8>>>,
    }

    impl CannedConnect {
        fn new(response: Vec<u8>) -> Self {
            Self {
                response,
                read_size: 64,
                written: Rc::new(RefCell::new(Vec::new())),
            }
        }
    }

    impl Connect for CannedConnect {
        type Connection<'c>
            = TestConn
        where
            Self: 'c;

        async fn connect(&mut self, _host: &str, _port: u16) -> Result<TestConn, FetchError> {
            Ok(TestConn {
                data: self.response.clone(),
                pos: 0,
                read_size: self.read_size,
                written: self.written.clone(),
            })
        }
    }

    fn response(status: &str, headers: &str, body: &[u8]) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(status.as_bytes());
        out.extend_from_slice(b"\r\n");
        out.extend_from_slice(headers.as_bytes());
        out.extend_from_slice(b"\r\n");
        out.extend_from_slice(body);
        out
    }

    #[test]
    fn test_fetch_with_content_length() {
        let canned = CannedConnect::new(response(
            "HTTP/1.0 200 OK",
            "Content-Length: 5\r\n",
            b"hello",
        ));
        let written = canned.written.clone();
        let mut fetcher = HttpFetcher::new(canned);
        let mut buf = ResourceBuffer::with_capacity(16);

        let n = block_on(fetcher.fetch("example.test", "/a.gif", &mut buf)).unwrap();
        assert_eq!(n, 5);
        assert_eq!(buf.as_slice(), b"hello");

        let request = written.borrow().clone();
        let request = core::str::from_utf8(&request).unwrap();
        assert!(request.starts_with("GET /a.gif HTTP/1.0\r\n"));
        assert!(request.contains("Host: example.test\r\n"));
        assert!(request.ends_with("\r\n\r\n"));
    }

    #[test]
    fn test_declared_length_over_capacity_reads_no_body() {
        let canned = CannedConnect::new(response(
            "HTTP/1.0 200 OK",
            "Content-Length: 100\r\n",
            &[0xAA; 100],
        ));
        let mut fetcher = HttpFetcher::new(canned);
        let mut buf = ResourceBuffer::with_capacity(16);

        let err = block_on(fetcher.fetch("h", "/big.gif", &mut buf)).unwrap_err();
        assert_eq!(err, FetchError::CapacityExceeded);
        assert!(buf.is_empty());
    }

    #[test]
    fn test_unknown_length_streams_to_eof() {
        let canned = CannedConnect::new(response("HTTP/1.0 200 OK", "", b"seven b"));
        let mut fetcher = HttpFetcher::new(canned);
        let mut buf = ResourceBuffer::with_capacity(16);

        let n = block_on(fetcher.fetch("h", "/x.gif", &mut buf)).unwrap();
        assert_eq!(n, 7);
        assert_eq!(buf.as_slice(), b"seven b");
    }

    #[test]
    fn test_unknown_length_abandons_at_overflowing_chunk() {
        let mut canned = CannedConnect::new(response("HTTP/1.0 200 OK", "", &[0x55; 40]));
        canned.read_size = 64; // header arrives whole, body follows in 16s
        let mut fetcher = HttpFetcher::new(canned);
        let mut buf = ResourceBuffer::with_capacity(24);

        let err = block_on(fetcher.fetch("h", "/x.gif", &mut buf)).unwrap_err();
        assert_eq!(err, FetchError::CapacityExceeded);
        // The overflowing chunk must not be partially committed.
        assert!(buf.len() <= 24);
    }

    #[test]
    fn test_non_success_status() {
        let canned = CannedConnect::new(response("HTTP/1.0 404 Not Found", "", b""));
        let mut fetcher = HttpFetcher::new(canned);
        let mut buf = ResourceBuffer::with_capacity(16);

        let err = block_on(fetcher.fetch("h", "/missing.gif", &mut buf)).unwrap_err();
        assert_eq!(err, FetchError::Status(404));
    }

    #[test]
    fn test_truncated_body() {
        let canned = CannedConnect::new(response(
            "HTTP/1.0 200 OK",
            "Content-Length: 10\r\n",
            b"shrt",
        ));
        let mut fetcher = HttpFetcher::new(canned);
        let mut buf = ResourceBuffer::with_capacity(16);

        let err = block_on(fetcher.fetch("h", "/t.gif", &mut buf)).unwrap_err();
        assert_eq!(err, FetchError::Truncated);
    }

    #[test]
    fn test_garbage_header() {
        let canned = CannedConnect::new(b"not http at all\r\n\r\n".to_vec());
        let mut fetcher = HttpFetcher::new(canned);
        let mut buf = ResourceBuffer::with_capacity(16);

        let err = block_on(fetcher.fetch("h", "/g.gif", &mut buf)).unwrap_err();
        assert_eq!(err, FetchError::BadHeader);
    }

    #[test]
    fn test_header_split_across_reads() {
        let mut canned = CannedConnect::new(response(
            "HTTP/1.0 200 OK",
            "Content-Length: 3\r\nX-Filler: padding padding padding\r\n",
            b"abc",
        ));
        canned.read_size = 3;
        let mut fetcher = HttpFetcher::new(canned);
        let mut buf = ResourceBuffer::with_capacity(16);

        let n = block_on(fetcher.fetch("h", "/s.gif", &mut buf)).unwrap();
        assert_eq!(n, 3);
        assert_eq!(buf.as_slice(), b"abc");
    }

    #[test]
    fn test_case_insensitive_content_length() {
        let canned = CannedConnect::new(response(
            "HTTP/1.0 200 OK",
            "CONTENT-LENGTH: 2\r\n",
            b"ok",
        ));
        let mut fetcher = HttpFetcher::new(canned);
        let mut buf = ResourceBuffer::with_capacity(16);

        let n = block_on(fetcher.fetch("h", "/c.gif", &mut buf)).unwrap();
        assert_eq!(n, 2);
    }
}
