//! Byte transport towards the meters.
//!
//! The drivers never manage socket lifetimes themselves: they borrow a
//! [`Transport`] for one logical operation (one `init` or one `read` call) and
//! the owner drops it afterwards, so a stalled device cannot pin a connection
//! across poll cycles. The stock implementation talks to a serial-to-TCP
//! bridge that forwards raw RTU bytes.

use crate::error::TransportError;
use std::io::{Read, Write};
use std::net::{TcpStream, ToSocketAddrs};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// One request/response round-trip. Modbus RTU is strictly request-then-
/// response, so there is nothing to pipeline.
pub trait Transport {
    fn send_receive(&mut self, request: &[u8]) -> Result<Vec<u8>, TransportError>;
}

/// Cooperative cancellation flag, checked by drivers between register-plan
/// steps (never mid-frame).
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }

    /// Arms a deadline: the token cancels itself after `delay`.
    pub fn cancel_after(&self, delay: Duration) {
        let token = self.clone();
        std::thread::spawn(move || {
            std::thread::sleep(delay);
            token.cancel();
        });
    }
}

/// Raw RTU frames over a serial-to-TCP bridge.
///
/// The connection is opened by [`TcpTransport::connect`] and closed on drop.
/// Every exchange is bounded by the read timeout given at connect time; a
/// timeout is a [`TransportError::Timeout`], distinct from a validation
/// failure on a frame that did arrive.
#[derive(Debug)]
pub struct TcpTransport {
    stream: TcpStream,
    timeout: Duration,
}

impl TcpTransport {
    pub fn connect(address: &str, timeout: Duration) -> Result<Self, TransportError> {
        let connect = || -> std::io::Result<TcpStream> {
            let mut last_error = None;
            for socket_addr in address.to_socket_addrs()? {
                match TcpStream::connect_timeout(&socket_addr, timeout) {
                    Ok(stream) => return Ok(stream),
                    Err(err) => last_error = Some(err),
                }
            }
            Err(last_error.unwrap_or_else(|| {
                std::io::Error::new(std::io::ErrorKind::InvalidInput, "no socket address resolved")
            }))
        };
        let stream = connect().map_err(|source| TransportError::Connect {
            address: address.to_string(),
            source,
        })?;
        stream.set_read_timeout(Some(timeout))?;
        stream.set_write_timeout(Some(timeout))?;
        stream.set_nodelay(true)?;
        Ok(TcpTransport { stream, timeout })
    }

    fn read_exact(&mut self, buf: &mut [u8]) -> Result<(), TransportError> {
        self.stream.read_exact(buf).map_err(|err| {
            match err.kind() {
                std::io::ErrorKind::WouldBlock | std::io::ErrorKind::TimedOut => {
                    TransportError::Timeout(self.timeout)
                }
                _ => TransportError::Io(err),
            }
        })
    }
}

impl Transport for TcpTransport {
    fn send_receive(&mut self, request: &[u8]) -> Result<Vec<u8>, TransportError> {
        self.stream.write_all(request)?;

        // Header: address, function code, then either the byte count or the
        // exception code. The rest of the frame length follows from it.
        let mut header = [0u8; 3];
        self.read_exact(&mut header)?;
        let remaining = if header[1] & 0x80 != 0 {
            2 // exception frame: the CRC is all that is left
        } else {
            header[2] as usize + 2
        };

        let mut response = vec![0u8; 3 + remaining];
        response[..3].copy_from_slice(&header);
        self.read_exact(&mut response[3..])?;
        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame;
    use assert_matches::assert_matches;
    use std::net::TcpListener;

    fn scripted_listener(mut response: Vec<u8>) -> std::net::SocketAddr {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        std::thread::spawn(move || {
            let (mut socket, _) = listener.accept().unwrap();
            let mut request = [0u8; 8];
            socket.read_exact(&mut request).unwrap();
            frame::append_crc(&mut response);
            socket.write_all(&response).unwrap();
        });
        addr
    }

    #[test]
    fn round_trip_over_loopback() {
        let addr = scripted_listener(vec![0x01, 0x03, 0x02, 0x00, 0x2A]);
        let mut link =
            TcpTransport::connect(&addr.to_string(), Duration::from_secs(1)).unwrap();
        let response = link
            .send_receive(&frame::encode_read_holding(0x01, 0x0143, 1))
            .unwrap();
        assert_eq!(response[..3], [0x01, 0x03, 0x02]);
        assert_eq!(response.len(), 7);
    }

    #[test]
    fn silent_device_times_out() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let _keep_alive = std::thread::spawn(move || {
            let (_socket, _) = listener.accept().unwrap();
            std::thread::sleep(Duration::from_secs(2));
        });
        let mut link =
            TcpTransport::connect(&addr.to_string(), Duration::from_millis(50)).unwrap();
        assert_matches!(
            link.send_receive(&frame::encode_read_holding(0x01, 0xEF50, 2)),
            Err(TransportError::Timeout(_))
        );
    }

    #[test]
    fn connect_failure_names_the_address() {
        // Port 1 on loopback is almost certainly closed.
        let result = TcpTransport::connect("127.0.0.1:1", Duration::from_millis(200));
        assert_matches!(
            result,
            Err(TransportError::Connect { address, .. }) if address == "127.0.0.1:1"
        );
    }

    #[test]
    fn cancel_token_flips_once() {
        let token = CancelToken::new();
        assert!(!token.is_cancelled());
        token.cancel();
        assert!(token.is_cancelled());
        assert!(token.clone().is_cancelled());
    }
}
