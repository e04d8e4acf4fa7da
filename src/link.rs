//! DIAG command/response link
//!
//! `DiagLink` owns one open transport and performs strictly sequential
//! exchanges: discard stale input, write one framed command, wait for the
//! framed answer. It does not interpret the response beyond unframing it.

use std::thread;
use std::time::{Duration, Instant};

use crate::constants::{opcode_name, DIAG_CMD_VERSION_INFO};
use crate::error::LinkError;
use crate::frame;
use crate::transport::{DiagConfig, Transport};

/// Exclusive owner of an open DIAG transport
pub struct DiagLink {
    transport: Option<Box<dyn Transport>>,
    poll_interval: Duration,
}

impl DiagLink {
    /// Take ownership of an open transport
    pub fn open(transport: Box<dyn Transport>, config: &DiagConfig) -> Self {
        log::debug!("DIAG link up on {}", transport.name());
        Self {
            transport: Some(transport),
            poll_interval: config.poll_interval,
        }
    }

    /// A link with no transport; every exchange fails with `NotConnected`
    pub fn disconnected() -> Self {
        Self {
            transport: None,
            poll_interval: DiagConfig::default().poll_interval,
        }
    }

    /// Check if a transport is attached
    pub fn is_connected(&self) -> bool {
        self.transport.is_some()
    }

    /// Name of the attached endpoint
    pub fn port_name(&self) -> Option<&str> {
        self.transport.as_deref().map(|t| t.name())
    }

    /// Close the transport. Safe to call more than once.
    pub fn close(&mut self) {
        if let Some(transport) = self.transport.take() {
            log::debug!("DIAG link down on {}", transport.name());
        }
    }

    /// Send one command and return the unframed response
    ///
    /// The returned bytes still carry the trailing checksum.
    pub fn send(&mut self, command: &[u8], timeout: Duration) -> Result<Vec<u8>, LinkError> {
        let poll_interval = self.poll_interval;
        let transport = self.transport.as_mut().ok_or(LinkError::NotConnected)?;

        transport.clear_input()?;

        let request = frame::encode(command);
        log::trace!(
            "TX {} [{}]",
            command.first().copied().map_or("EMPTY", opcode_name),
            frame::hex(&request)
        );
        transport.write_all(&request)?;

        let raw = receive(&mut **transport, timeout, poll_interval)?;
        log::trace!("RX [{}]", frame::hex(&raw));

        Ok(frame::decode(&raw)?)
    }

    /// Request version information, used to confirm the port speaks DIAG
    pub fn version_info(&mut self, timeout: Duration) -> Result<Vec<u8>, LinkError> {
        self.send(&[DIAG_CMD_VERSION_INFO], timeout)
    }
}

impl std::fmt::Debug for DiagLink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DiagLink")
            .field("port", &self.port_name())
            .field("poll_interval", &self.poll_interval)
            .finish()
    }
}

/// Wait for inbound bytes, then drain until a frame closes or time runs out
fn receive(
    transport: &mut dyn Transport,
    timeout: Duration,
    poll_interval: Duration,
) -> Result<Vec<u8>, LinkError> {
    let deadline = Instant::now() + timeout;
    let mut buf = Vec::new();

    loop {
        let pending = transport.bytes_to_read()?;
        if pending > 0 {
            let start = buf.len();
            buf.resize(start + pending, 0);
            let read = transport.read_available(&mut buf[start..])?;
            buf.truncate(start + read);

            if frame::is_complete(&buf) {
                return Ok(buf);
            }
        }

        if Instant::now() >= deadline {
            break;
        }
        thread::sleep(poll_interval);
    }

    if buf.is_empty() {
        return Err(LinkError::Timeout(timeout));
    }

    // Partial frame; decoding reports the missing delimiter
    Ok(buf)
}
