//! NV item access over the DIAG link
//!
//! Commands are `[opcode, item_lo, item_hi, data...]`. A read response carries
//! a 4-byte header before the item payload; a write is accepted when the
//! response echoes the write opcode. Every response checksum is verified.

use std::time::Duration;

use crate::constants::{opcode_name, DIAG_CMD_NV_READ, DIAG_CMD_NV_WRITE, NV_RESPONSE_HEADER_LEN};
use crate::error::{FrameError, LinkError, NvError};
use crate::frame;
use crate::link::DiagLink;
use crate::transport::DiagConfig;

/// Typed NV item read/write on top of a `DiagLink`
///
/// Operations are blocking and strictly one at a time; the DIAG port does not
/// pipeline commands.
#[derive(Debug)]
pub struct NvStore {
    link: DiagLink,
    read_timeout: Duration,
    write_timeout: Duration,
}

impl NvStore {
    /// Wrap a link using the configured NV timeouts
    pub fn new(link: DiagLink, config: &DiagConfig) -> Self {
        Self {
            link,
            read_timeout: config.read_timeout,
            write_timeout: config.write_timeout,
        }
    }

    /// Underlying link
    pub fn link(&self) -> &DiagLink {
        &self.link
    }

    /// Underlying link, mutably
    pub fn link_mut(&mut self) -> &mut DiagLink {
        &mut self.link
    }

    /// Give the link back
    pub fn into_link(self) -> DiagLink {
        self.link
    }

    /// Read an NV item payload
    ///
    /// An empty payload means the device holds nothing under this item.
    pub fn read_item(&mut self, item: u16) -> Result<Vec<u8>, NvError> {
        let command = nv_command(DIAG_CMD_NV_READ, item, &[]);
        let response = self
            .exchange(item, &command, self.read_timeout)
            .map_err(|e| match e {
                LinkError::Frame(FrameError::TooShort { len }) => {
                    NvError::ShortResponse { item, len }
                }
                e => nv_error(item, e),
            })?;

        if response.len() < NV_RESPONSE_HEADER_LEN {
            return Err(NvError::ShortResponse {
                item,
                len: response.len(),
            });
        }

        let payload = response[NV_RESPONSE_HEADER_LEN..].to_vec();
        log::debug!("NV item {} read: {} bytes", item, payload.len());
        Ok(payload)
    }

    /// Write an NV item payload
    ///
    /// Anything but a well-formed answer echoing the write opcode, including
    /// silence, is reported as `Rejected`.
    pub fn write_item(&mut self, item: u16, data: &[u8]) -> Result<(), NvError> {
        let command = nv_command(DIAG_CMD_NV_WRITE, item, data);
        let response = match self.exchange(item, &command, self.write_timeout) {
            Ok(response) => response,
            Err(LinkError::Timeout(_)) => {
                log::warn!("NV item {} write: no answer", item);
                return Err(NvError::Rejected { item });
            }
            Err(LinkError::Frame(source)) => {
                log::warn!("NV item {} write: unreadable answer ({})", item, source);
                return Err(NvError::Rejected { item });
            }
            Err(e) => return Err(nv_error(item, e)),
        };

        match response.first() {
            Some(&DIAG_CMD_NV_WRITE) => {
                log::debug!("NV item {} written: {} bytes", item, data.len());
                Ok(())
            }
            other => {
                log::warn!(
                    "NV item {} write rejected (answer {})",
                    item,
                    other.copied().map_or("EMPTY", opcode_name)
                );
                Err(NvError::Rejected { item })
            }
        }
    }

    /// Send a command and return the checksum-verified response payload
    fn exchange(
        &mut self,
        item: u16,
        command: &[u8],
        timeout: Duration,
    ) -> Result<Vec<u8>, LinkError> {
        let decoded = self.link.send(command, timeout)?;
        let payload = frame::verify(&decoded).map_err(|source| {
            log::debug!("NV item {} response: {}", item, source);
            LinkError::Frame(source)
        })?;
        Ok(payload.to_vec())
    }
}

/// Attribute a link failure to the item being accessed
fn nv_error(item: u16, error: LinkError) -> NvError {
    match error {
        LinkError::Timeout(_) => NvError::NoResponse { item },
        LinkError::Frame(source) => NvError::Frame { item, source },
        source => NvError::Link { item, source },
    }
}

fn nv_command(opcode: u8, item: u16, data: &[u8]) -> Vec<u8> {
    let mut command = Vec::with_capacity(3 + data.len());
    command.push(opcode);
    command.extend_from_slice(&item.to_le_bytes());
    command.extend_from_slice(data);
    command
}
