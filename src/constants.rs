//! DIAG protocol and QCN file constants
//!
//! This module contains the constants used on the DIAG serial link and in the
//! QCN container format: framing bytes, command opcodes, NV item ids, line
//! settings, timeouts and identity-number layout.

use std::time::Duration;

// ============================================================================
// HDLC-style Framing
// ============================================================================

/// Frame delimiter (flag) byte
pub const HDLC_FLAG: u8 = 0x7E;
/// Escape byte
pub const HDLC_ESCAPE: u8 = 0x7D;
/// Value XORed into an escaped byte
pub const HDLC_ESCAPE_XOR: u8 = 0x20;
/// Size of the trailing frame checksum in bytes
pub const FRAME_CHECKSUM_LEN: usize = 2;

// ============================================================================
// DIAG Command Opcodes
// ============================================================================

/// Version information request (also used as a liveness probe)
pub const DIAG_CMD_VERSION_INFO: u8 = 0x00;
/// Electronic serial number request
pub const DIAG_CMD_ESN: u8 = 0x01;
/// Status request
pub const DIAG_CMD_STATUS: u8 = 0x0C;
/// NV item read
pub const DIAG_CMD_NV_READ: u8 = 0x26;
/// NV item write
pub const DIAG_CMD_NV_WRITE: u8 = 0x27;
/// DIAG protocol version request
pub const DIAG_CMD_DIAG_VER: u8 = 0x3C;

/// Get human-readable name for a DIAG opcode
pub fn opcode_name(opcode: u8) -> &'static str {
    match opcode {
        DIAG_CMD_VERSION_INFO => "VERSION_INFO",
        DIAG_CMD_ESN => "ESN",
        DIAG_CMD_STATUS => "STATUS",
        DIAG_CMD_NV_READ => "NV_READ",
        DIAG_CMD_NV_WRITE => "NV_WRITE",
        DIAG_CMD_DIAG_VER => "DIAG_VER",
        _ => "UNKNOWN",
    }
}

// ============================================================================
// NV Items
// ============================================================================

/// Primary identity number (NV_UE_IMEI_I)
pub const NV_ITEM_IMEI: u16 = 550;
/// Secondary identity number on dual-identity devices
pub const NV_ITEM_IMEI_2: u16 = NV_ITEM_IMEI + 1;
/// Mobile equipment identifier (NV_MEID_I), handled as an opaque item
pub const NV_ITEM_MEID: u16 = 1943;

/// Fixed header in front of an NV read response payload
pub const NV_RESPONSE_HEADER_LEN: usize = 4;

// ============================================================================
// Serial Line Settings
// ============================================================================

/// DIAG port baud rate
pub const DIAG_BAUD_RATE: u32 = 115_200;

// ============================================================================
// Timeouts
// ============================================================================

/// Liveness probe wait
pub const PROBE_TIMEOUT: Duration = Duration::from_millis(250);
/// NV read response wait
pub const NV_READ_TIMEOUT: Duration = Duration::from_millis(500);
/// NV write response wait (the modem commits to flash before answering)
pub const NV_WRITE_TIMEOUT: Duration = Duration::from_millis(1500);
/// Interval between polls of the inbound buffer
pub const POLL_INTERVAL: Duration = Duration::from_millis(10);
/// Blocking I/O timeout configured on the serial port itself
pub const PORT_IO_TIMEOUT: Duration = Duration::from_millis(1000);

// ============================================================================
// Identity Numbers
// ============================================================================

/// Number of decimal digits in an identity number
pub const IDENTITY_DIGITS: usize = 15;
/// Length of the packed identity representation
pub const IDENTITY_PACKED_LEN: usize = 9;
/// Leading length/tag byte of a packed identity
pub const IDENTITY_TAG: u8 = 0x08;
/// High-nibble filler of the last packed byte
pub const IDENTITY_FILLER: u8 = 0xF0;

/// Allocation prefixes accepted by the plausibility check
pub const IDENTITY_PREFIXES: [&str; 20] = [
    "01", "10", "30", "33", "35", "44", "45", "49", "50", "51", "52", "53", "54", "86", "87",
    "88", "89", "90", "91", "99",
];

// ============================================================================
// QCN Container
// ============================================================================

/// Structured container magic tag
pub const QCN_MAGIC: [u8; 4] = *b"QCNV";
/// Structured container version written by this crate
pub const QCN_VERSION: u16 = 1;
/// Header size: magic (4) + version (2) + reserved (4)
pub const QCN_HEADER_LEN: usize = 10;
/// Record list terminator
pub const QCN_SENTINEL: u16 = 0xFFFF;
/// Suffix appended to a QCN file name for the pre-edit backup
pub const QCN_BACKUP_SUFFIX: &str = ".backup";

/// Model string reported for devices read over DIAG
pub const DEFAULT_MODEL_HINT: &str = "Qualcomm Device";
