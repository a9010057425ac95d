//! Syslog `Backend` (§4.4 "syslog/plugin bypass"): writes go straight to a
//! UDP socket, never through rotation or retention.
//!
//! No syslog crate appears in the teacher's dependency set, so this speaks
//! a minimal RFC 3164-style framing over `std::net::UdpSocket` rather than
//! pulling in a new dependency for one narrow backend.

use std::net::UdpSocket;

use crate::backend::Backend;
use crate::error::{Error, ErrorCode, Result};

pub struct SyslogBackend {
    socket: UdpSocket,
    facility: u8,
}

impl SyslogBackend {
    /// `facility` is the syslog facility code (e.g. 1 = user-level, 16 =
    /// local0); the severity is derived per-message by the caller and
    /// folded into the PRI header by `write`.
    pub fn connect(remote_addr: &str, facility: u8) -> Result<Self> {
        let socket = UdpSocket::bind("0.0.0.0:0")
            .map_err(|e| Error::from_io(ErrorCode::SyslogConnection, "syslog_bind", e))?;
        socket
            .connect(remote_addr)
            .map_err(|e| Error::from_io(ErrorCode::SyslogConnection, "syslog_connect", e))?;
        Ok(SyslogBackend { socket, facility })
    }
}

impl Backend for SyslogBackend {
    fn write(&mut self, bytes: &[u8]) -> Result<()> {
        // PRI = facility * 8 + severity; severity 6 (informational) is used
        // as a fixed default since the already-formatted bytes carry their
        // own level text and callers don't currently pass severity through.
        let pri = self.facility * 8 + 6;
        let mut framed = format!("<{pri}>").into_bytes();
        framed.extend_from_slice(bytes);
        self.socket
            .send(&framed)
            .map(|_| ())
            .map_err(|e| Error::from_io(ErrorCode::SyslogWrite, "syslog_write", e))
    }

    fn flush(&mut self) -> Result<()> {
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        Ok(())
    }

    fn supports_atomic(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::UdpSocket as StdUdpSocket;

    #[test]
    fn writes_frame_with_pri_header() {
        let receiver = StdUdpSocket::bind("127.0.0.1:0").unwrap();
        let addr = receiver.local_addr().unwrap();
        receiver.set_read_timeout(Some(std::time::Duration::from_secs(1))).unwrap();

        let mut backend = SyslogBackend::connect(&addr.to_string(), 1).unwrap();
        backend.write(b"hello syslog").unwrap();

        let mut buf = [0u8; 256];
        let n = receiver.recv(&mut buf).unwrap();
        let received = String::from_utf8_lossy(&buf[..n]);
        assert!(received.starts_with("<14>"));
        assert!(received.ends_with("hello syslog"));
    }
}
