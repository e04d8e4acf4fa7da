//! Serial transport for the DIAG port
//!
//! The link layer talks to an exclusively-owned duplex byte channel through the
//! [`Transport`] trait. [`SerialTransport`] is the real implementation on top
//! of the `serialport` crate; dropping it closes the port.

use std::io::{ErrorKind, Read, Write};
use std::time::Duration;

use serialport::{ClearBuffer, DataBits, FlowControl, Parity, SerialPort, StopBits};

use crate::constants::{
    DIAG_BAUD_RATE, NV_READ_TIMEOUT, NV_WRITE_TIMEOUT, POLL_INTERVAL, PORT_IO_TIMEOUT,
    PROBE_TIMEOUT,
};
use crate::error::TransportError;

/// Serial line settings and timeouts used by the scanner, link and session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiagConfig {
    /// Line speed (always 8N1, no flow control)
    pub baud_rate: u32,
    /// Wait for a probe answer
    pub probe_timeout: Duration,
    /// Wait for an NV read answer
    pub read_timeout: Duration,
    /// Wait for an NV write answer
    pub write_timeout: Duration,
    /// Interval between polls of the inbound buffer
    pub poll_interval: Duration,
    /// Blocking I/O timeout configured on the port
    pub io_timeout: Duration,
}

impl Default for DiagConfig {
    fn default() -> Self {
        Self {
            baud_rate: DIAG_BAUD_RATE,
            probe_timeout: PROBE_TIMEOUT,
            read_timeout: NV_READ_TIMEOUT,
            write_timeout: NV_WRITE_TIMEOUT,
            poll_interval: POLL_INTERVAL,
            io_timeout: PORT_IO_TIMEOUT,
        }
    }
}

impl DiagConfig {
    /// Override the line speed
    pub fn with_baud_rate(mut self, baud_rate: u32) -> Self {
        self.baud_rate = baud_rate;
        self
    }

    /// Override the probe wait
    pub fn with_probe_timeout(mut self, timeout: Duration) -> Self {
        self.probe_timeout = timeout;
        self
    }

    /// Override the NV read wait
    pub fn with_read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = timeout;
        self
    }

    /// Override the NV write wait
    pub fn with_write_timeout(mut self, timeout: Duration) -> Self {
        self.write_timeout = timeout;
        self
    }

    /// Override the inbound poll interval
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }
}

/// Duplex byte channel carrying DIAG frames
pub trait Transport: Send {
    /// Endpoint identifier (port name)
    fn name(&self) -> &str;

    /// Drop any bytes waiting in the inbound buffer
    fn clear_input(&mut self) -> Result<(), TransportError>;

    /// Write all bytes and flush
    fn write_all(&mut self, data: &[u8]) -> Result<(), TransportError>;

    /// Number of bytes waiting in the inbound buffer
    fn bytes_to_read(&mut self) -> Result<usize, TransportError>;

    /// Read up to `buf.len()` already-buffered bytes, returning the count
    fn read_available(&mut self, buf: &mut [u8]) -> Result<usize, TransportError>;
}

/// Source of candidate endpoints and opened transports
pub trait TransportOpener {
    /// Enumerate candidate endpoint identifiers
    fn candidates(&self) -> Result<Vec<String>, TransportError>;

    /// Open an endpoint with the configured line settings
    fn open(&self, id: &str, config: &DiagConfig) -> Result<Box<dyn Transport>, TransportError>;
}

/// Opens real serial ports
#[derive(Debug, Clone, Copy, Default)]
pub struct SerialOpener;

impl TransportOpener for SerialOpener {
    fn candidates(&self) -> Result<Vec<String>, TransportError> {
        let ports = serialport::available_ports()
            .map_err(|e| TransportError::Enumerate(e.to_string()))?;
        Ok(ports.into_iter().map(|info| info.port_name).collect())
    }

    fn open(&self, id: &str, config: &DiagConfig) -> Result<Box<dyn Transport>, TransportError> {
        Ok(Box::new(SerialTransport::open(id, config)?))
    }
}

/// DIAG serial port
pub struct SerialTransport {
    port: Box<dyn SerialPort>,
    name: String,
}

impl SerialTransport {
    /// Open a serial port at 8N1 without flow control, with DTR and RTS asserted
    pub fn open(name: &str, config: &DiagConfig) -> Result<Self, TransportError> {
        let open_error = |e: serialport::Error| TransportError::Open {
            port: name.to_string(),
            reason: e.to_string(),
        };

        let mut port = serialport::new(name, config.baud_rate)
            .data_bits(DataBits::Eight)
            .parity(Parity::None)
            .stop_bits(StopBits::One)
            .flow_control(FlowControl::None)
            .timeout(config.io_timeout)
            .open()
            .map_err(open_error)?;

        port.write_data_terminal_ready(true).map_err(open_error)?;
        port.write_request_to_send(true).map_err(open_error)?;

        log::debug!("Opened {} at {} baud", name, config.baud_rate);

        Ok(Self {
            port,
            name: name.to_string(),
        })
    }
}

impl Transport for SerialTransport {
    fn name(&self) -> &str {
        &self.name
    }

    fn clear_input(&mut self) -> Result<(), TransportError> {
        self.port.clear(ClearBuffer::Input)?;
        Ok(())
    }

    fn write_all(&mut self, data: &[u8]) -> Result<(), TransportError> {
        self.port.write_all(data)?;
        self.port.flush()?;
        Ok(())
    }

    fn bytes_to_read(&mut self) -> Result<usize, TransportError> {
        Ok(self.port.bytes_to_read()? as usize)
    }

    fn read_available(&mut self, buf: &mut [u8]) -> Result<usize, TransportError> {
        match self.port.read(buf) {
            Ok(len) => Ok(len),
            Err(e) if e.kind() == ErrorKind::TimedOut => Ok(0),
            Err(e) => Err(e.into()),
        }
    }
}

impl std::fmt::Debug for SerialTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SerialTransport")
            .field("name", &self.name)
            .field("baud_rate", &self.port.baud_rate().ok())
            .finish()
    }
}

impl Drop for SerialTransport {
    fn drop(&mut self) {
        log::debug!("Closing {}", self.name);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = DiagConfig::default();
        assert_eq!(config.baud_rate, 115_200);
        assert!(config.read_timeout < config.write_timeout);
        assert!(config.probe_timeout <= config.read_timeout);
    }

    #[test]
    fn test_config_builders() {
        let config = DiagConfig::default()
            .with_baud_rate(921_600)
            .with_read_timeout(Duration::from_millis(50))
            .with_write_timeout(Duration::from_millis(80))
            .with_probe_timeout(Duration::from_millis(20))
            .with_poll_interval(Duration::from_millis(1));
        assert_eq!(config.baud_rate, 921_600);
        assert_eq!(config.read_timeout, Duration::from_millis(50));
        assert_eq!(config.write_timeout, Duration::from_millis(80));
        assert_eq!(config.probe_timeout, Duration::from_millis(20));
        assert_eq!(config.poll_interval, Duration::from_millis(1));
    }

    #[test]
    fn test_open_missing_port_fails() {
        let err = SerialTransport::open("/dev/does-not-exist-diag", &DiagConfig::default())
            .unwrap_err();
        assert!(matches!(err, TransportError::Open { .. }));
    }
}
