//! Qualcomm DIAG client for NV identity items and QCN files
//!
//! This crate talks to the diagnostic (DIAG) serial port of Qualcomm-based
//! modems. It frames commands with the HDLC-style DIAG framing, reads and
//! writes NV items, and converts the identity items to and from QCN
//! calibration files.
//!
//! # Features
//!
//! - DIAG port discovery by probing serial ports with a version request
//! - HDLC-style framing with escape sequences and CRC-16 checksums
//! - NV item read/write with per-item error reporting
//! - Packed identity-number codec and plausibility check (prefix + Luhn)
//! - Structured QCN files, plus identity recovery from legacy blobs
//! - Pluggable progress sinks and cooperative cancellation
//!
//! # Example
//!
//! ```no_run
//! use qcn_diag::{CancelFlag, DeviceSession, DiagConfig, TransportScanner};
//!
//! fn main() -> qcn_diag::Result<()> {
//!     // Find a port that answers DIAG commands
//!     let ports = TransportScanner::new(DiagConfig::default()).scan();
//!     let Some(port) = ports.first() else {
//!         println!("No DIAG port found");
//!         return Ok(());
//!     };
//!
//!     let mut session = DeviceSession::new(DiagConfig::default());
//!     session.connect(port)?;
//!
//!     // Save the device identities, change one, write them back
//!     let cancel = CancelFlag::new();
//!     session.read_from_device("device.qcn", &cancel)?;
//!     session.edit_identity_in_file("device.qcn", "490154203237518", None)?;
//!     session.write_to_device("device.qcn", &cancel)?;
//!     Ok(())
//! }
//! ```

pub mod constants;
pub mod error;
pub mod events;
pub mod frame;
pub mod identity;
pub mod link;
pub mod nv;
pub mod qcn;
pub mod scanner;
pub mod session;
pub mod structures;
pub mod transport;
pub mod validator;

#[cfg(test)]
mod mock;

// Re-export main types at crate root
pub use constants::{
    // DIAG opcodes
    DIAG_CMD_DIAG_VER,
    DIAG_CMD_ESN,
    DIAG_CMD_NV_READ,
    DIAG_CMD_NV_WRITE,
    DIAG_CMD_STATUS,
    DIAG_CMD_VERSION_INFO,
    // Framing
    HDLC_ESCAPE,
    HDLC_FLAG,
    // NV items
    NV_ITEM_IMEI,
    NV_ITEM_IMEI_2,
    NV_ITEM_MEID,
    // QCN container
    QCN_BACKUP_SUFFIX,
    QCN_MAGIC,
    QCN_VERSION,
};

pub use error::{
    FrameError, LinkError, NvError, QcnError, Result, SessionError, TransportError,
    ValidationError,
};
pub use events::{ChannelSink, Event, EventLevel, EventSink, LogSink, NullSink};
pub use link::DiagLink;
pub use nv::NvStore;
pub use scanner::TransportScanner;
pub use session::{CancelFlag, DeviceSession, SessionState};
pub use structures::{DeviceIdentityRecord, IdentitySlot};
pub use transport::{DiagConfig, SerialOpener, SerialTransport, Transport, TransportOpener};
