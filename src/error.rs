//! Error types for the DIAG client
//!
//! Each layer has its own error enum so callers can tell a framing fault from
//! a transport fault from a rejected NV write. `SessionError` wraps them all
//! for the high-level operations.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::structures::IdentitySlot;

/// Result type alias for session operations
pub type Result<T> = std::result::Result<T, SessionError>;

/// Errors opening or talking to a serial endpoint
#[derive(Error, Debug)]
pub enum TransportError {
    /// The endpoint could not be opened or configured
    #[error("Failed to open {port}: {reason}")]
    Open { port: String, reason: String },

    /// Serial port enumeration failed
    #[error("Failed to enumerate serial ports: {0}")]
    Enumerate(String),

    /// Serial driver error
    #[error("Serial port error: {0}")]
    Serial(#[from] serialport::Error),

    /// Read or write failed
    #[error("Transport I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Link-layer framing errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FrameError {
    /// No payload bytes were recovered
    #[error("Frame contains no payload")]
    Empty,

    /// An escape byte was the last byte before the closing delimiter
    #[error("Frame ends inside an escape sequence")]
    Truncated,

    /// No closing delimiter was found
    #[error("Frame has no closing delimiter")]
    MissingDelimiter,

    /// Decoded frame cannot hold a checksum
    #[error("Frame too short to carry a checksum ({len} bytes)")]
    TooShort { len: usize },

    /// Checksum carried by the frame does not match its payload
    #[error("Checksum mismatch: frame carries 0x{expected:04X}, payload gives 0x{actual:04X}")]
    ChecksumMismatch { expected: u16, actual: u16 },
}

/// Command/response exchange errors
#[derive(Error, Debug)]
pub enum LinkError {
    /// The transport was never opened or has been closed
    #[error("DIAG link is not connected")]
    NotConnected,

    /// No bytes arrived within the wait
    #[error("No response within {0:?}")]
    Timeout(Duration),

    /// Underlying transport failure
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// Response could not be unframed
    #[error("Malformed response frame: {0}")]
    Frame(#[from] FrameError),
}

impl LinkError {
    /// Check if this error is a response timeout
    pub fn is_timeout(&self) -> bool {
        matches!(self, LinkError::Timeout(_))
    }
}

/// NV item read/write errors
#[derive(Error, Debug)]
pub enum NvError {
    /// The device did not answer
    #[error("No response for NV item {item}")]
    NoResponse { item: u16 },

    /// The response was shorter than the fixed header
    #[error("NV item {item} response too short: {len} bytes")]
    ShortResponse { item: u16, len: usize },

    /// The device refused the write
    #[error("NV item {item} write rejected by device")]
    Rejected { item: u16 },

    /// The response frame was malformed or failed its checksum
    #[error("NV item {item}: {source}")]
    Frame {
        item: u16,
        #[source]
        source: FrameError,
    },

    /// The link failed for a reason other than a timeout
    #[error("NV item {item}: {source}")]
    Link {
        item: u16,
        #[source]
        source: LinkError,
    },
}

impl NvError {
    /// Check if this error is a missing response
    pub fn is_timeout(&self) -> bool {
        matches!(self, NvError::NoResponse { .. })
    }

    /// NV item the failed operation addressed
    pub fn item(&self) -> u16 {
        match self {
            NvError::NoResponse { item }
            | NvError::ShortResponse { item, .. }
            | NvError::Rejected { item }
            | NvError::Frame { item, .. }
            | NvError::Link { item, .. } => *item,
        }
    }
}

/// Identity number format errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Not exactly 15 characters
    #[error("Identity number must have 15 digits, got {len} characters")]
    WrongLength { len: usize },

    /// A character is not a decimal digit
    #[error("Identity number has a non-digit character at position {position}")]
    NonDigit { position: usize },
}

/// QCN container errors
#[derive(Error, Debug)]
pub enum QcnError {
    /// Neither the structured parse nor the heuristic scan found an identity
    #[error("No identity number found in QCN data")]
    NoIdentityFound,

    /// Structured data ends in the middle of a header or record
    #[error("Malformed QCN data at offset {offset}: {reason}")]
    Malformed { offset: usize, reason: &'static str },

    /// A record holds an identity that cannot be packed
    #[error("Invalid identity number: {0}")]
    Identity(#[from] ValidationError),
}

/// Errors from the high-level device and file operations
#[derive(Error, Debug)]
pub enum SessionError {
    /// The candidate did not answer or could not be opened
    #[error("Failed to connect to {port}: {reason}")]
    ConnectFailed { port: String, reason: String },

    /// A device operation was requested without a connection
    #[error("No DIAG port connected")]
    NotConnected,

    /// QCN input file does not exist
    #[error("QCN file not found: {}", .0.display())]
    FileNotFound(PathBuf),

    /// File system error
    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// QCN parse or serialize failure
    #[error(transparent)]
    Qcn(#[from] QcnError),

    /// A new identity number failed the format check
    #[error("{slot} identity rejected: {source}")]
    Validation {
        slot: IdentitySlot,
        #[source]
        source: ValidationError,
    },

    /// NV item read failure
    #[error(transparent)]
    Nv(#[from] NvError),

    /// Writing one of the identity items failed
    #[error("Failed writing {slot} identity: {source}")]
    IdentityWrite {
        slot: IdentitySlot,
        #[source]
        source: NvError,
    },

    /// The device returned an empty primary identity item
    #[error("Device returned no primary identity")]
    PrimaryIdentityMissing,

    /// The caller cancelled the operation between NV commands
    #[error("Operation cancelled")]
    Cancelled,
}

impl SessionError {
    /// Check if this error came from the device side rather than the file side
    pub fn is_device_error(&self) -> bool {
        matches!(
            self,
            SessionError::ConnectFailed { .. }
                | SessionError::NotConnected
                | SessionError::Nv(_)
                | SessionError::IdentityWrite { .. }
                | SessionError::PrimaryIdentityMissing
        )
    }
}
