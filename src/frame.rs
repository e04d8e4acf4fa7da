//! DIAG link-layer framing
//!
//! Commands and responses travel as HDLC-style frames: the payload gets a
//! trailing CRC-16/CCITT checksum (little-endian), flag and escape bytes inside
//! it are escaped, and the result is wrapped in `0x7E` delimiters.
//!
//! ```text
//! +------+---------------------+-------------+------+
//! | 0x7E | payload (escaped)   | CRC (2, LE) | 0x7E |
//! +------+---------------------+-------------+------+
//! ```

use crc::{Crc, CRC_16_GENIBUS};

use crate::constants::{FRAME_CHECKSUM_LEN, HDLC_ESCAPE, HDLC_ESCAPE_XOR, HDLC_FLAG};
use crate::error::FrameError;

/// Polynomial 0x1021, initial value 0xFFFF, no reflection, final complement
const DIAG_CRC: Crc<u16> = Crc::<u16>::new(&CRC_16_GENIBUS);

/// Compute the frame checksum over unescaped bytes
pub fn checksum(data: &[u8]) -> u16 {
    DIAG_CRC.checksum(data)
}

/// Frame a payload for transmission
pub fn encode(payload: &[u8]) -> Vec<u8> {
    let crc = checksum(payload).to_le_bytes();
    let mut frame = Vec::with_capacity(payload.len() + FRAME_CHECKSUM_LEN + 4);

    frame.push(HDLC_FLAG);
    for &byte in payload.iter().chain(crc.iter()) {
        if byte == HDLC_FLAG || byte == HDLC_ESCAPE {
            frame.push(HDLC_ESCAPE);
            frame.push(byte ^ HDLC_ESCAPE_XOR);
        } else {
            frame.push(byte);
        }
    }
    frame.push(HDLC_FLAG);

    frame
}

/// Unframe received bytes
///
/// Returns the unescaped payload with its two checksum bytes still attached;
/// use [`verify`] to check and strip them. The leading delimiter is optional
/// since some devices only emit the trailing one. Anything after the first
/// closing delimiter is ignored.
pub fn decode(frame: &[u8]) -> Result<Vec<u8>, FrameError> {
    let body = frame.strip_prefix(&[HDLC_FLAG]).unwrap_or(frame);
    let end = body
        .iter()
        .position(|&b| b == HDLC_FLAG)
        .ok_or(FrameError::MissingDelimiter)?;

    let mut decoded = Vec::with_capacity(end);
    let mut bytes = body[..end].iter();
    while let Some(&byte) = bytes.next() {
        if byte == HDLC_ESCAPE {
            let &escaped = bytes.next().ok_or(FrameError::Truncated)?;
            decoded.push(escaped ^ HDLC_ESCAPE_XOR);
        } else {
            decoded.push(byte);
        }
    }

    if decoded.is_empty() {
        return Err(FrameError::Empty);
    }

    Ok(decoded)
}

/// Check the trailing checksum of a decoded frame and return the payload
pub fn verify(decoded: &[u8]) -> Result<&[u8], FrameError> {
    if decoded.len() < FRAME_CHECKSUM_LEN {
        return Err(FrameError::TooShort { len: decoded.len() });
    }

    let (payload, crc) = decoded.split_at(decoded.len() - FRAME_CHECKSUM_LEN);
    let expected = u16::from_le_bytes([crc[0], crc[1]]);
    let actual = checksum(payload);
    if expected != actual {
        return Err(FrameError::ChecksumMismatch { expected, actual });
    }

    Ok(payload)
}

/// Check whether a receive buffer holds a closing delimiter
pub(crate) fn is_complete(buf: &[u8]) -> bool {
    let body = buf.strip_prefix(&[HDLC_FLAG]).unwrap_or(buf);
    body.contains(&HDLC_FLAG)
}

/// Render bytes as space-separated hex for trace output
pub(crate) fn hex(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|b| format!("{:02X}", b))
        .collect::<Vec<_>>()
        .join(" ")
}
