//! QCN container codec
//!
//! Two input layouts are understood:
//!
//! ```text
//! structured : "QCNV" | version u16 | reserved u32 | { id u16 | len u16 | payload }* | 0xFFFF
//! legacy     : opaque blob with packed identities somewhere inside
//! ```
//!
//! All structured fields are little-endian. Legacy blobs are searched for the
//! packed-identity tag and only plausible identities are kept. Output is always
//! the structured layout.

use crate::constants::{
    IDENTITY_DIGITS, IDENTITY_PACKED_LEN, IDENTITY_TAG, QCN_HEADER_LEN, QCN_MAGIC, QCN_SENTINEL,
    QCN_VERSION,
};
use crate::error::QcnError;
use crate::identity;
use crate::structures::{DeviceIdentityRecord, IdentitySlot};
use crate::validator;

/// Check for the structured-format magic tag
pub fn is_structured(bytes: &[u8]) -> bool {
    bytes.starts_with(&QCN_MAGIC)
}

/// Iterator over the records of a structured container
///
/// Stops at the sentinel id or at the end of the buffer. A record cut short
/// yields one `Malformed` error and ends the iteration.
#[derive(Debug, Clone)]
pub struct Records<'a> {
    bytes: &'a [u8],
    offset: usize,
    done: bool,
}

impl<'a> Records<'a> {
    /// Version field from the header
    pub fn version(&self) -> u16 {
        u16::from_le_bytes([self.bytes[4], self.bytes[5]])
    }

    /// Byte offset of the next record
    pub fn offset(&self) -> usize {
        self.offset
    }

    fn read_u16(&mut self, reason: &'static str) -> Result<u16, QcnError> {
        let field = self
            .bytes
            .get(self.offset..self.offset + 2)
            .ok_or(QcnError::Malformed {
                offset: self.offset,
                reason,
            })?;
        self.offset += 2;
        Ok(u16::from_le_bytes([field[0], field[1]]))
    }

    fn next_record(&mut self) -> Result<Option<(u16, &'a [u8])>, QcnError> {
        if self.offset >= self.bytes.len() {
            return Ok(None);
        }

        let id = self.read_u16("truncated record id")?;
        if id == QCN_SENTINEL {
            return Ok(None);
        }

        let len = usize::from(self.read_u16("truncated record length")?);
        let bytes = self.bytes;
        let payload = bytes
            .get(self.offset..self.offset + len)
            .ok_or(QcnError::Malformed {
                offset: self.offset,
                reason: "record payload runs past end of data",
            })?;
        self.offset += len;

        Ok(Some((id, payload)))
    }
}

impl<'a> Iterator for Records<'a> {
    type Item = Result<(u16, &'a [u8]), QcnError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        let record = self.next_record();
        if !matches!(record, Ok(Some(_))) {
            self.done = true;
        }
        record.transpose()
    }
}

/// Validate a structured header and iterate its records
pub fn records(bytes: &[u8]) -> Result<Records<'_>, QcnError> {
    if !is_structured(bytes) {
        return Err(QcnError::Malformed {
            offset: 0,
            reason: "missing QCNV magic",
        });
    }
    if bytes.len() < QCN_HEADER_LEN {
        return Err(QcnError::Malformed {
            offset: bytes.len(),
            reason: "truncated header",
        });
    }

    let records = Records {
        bytes,
        offset: QCN_HEADER_LEN,
        done: false,
    };
    if records.version() != QCN_VERSION {
        log::warn!(
            "QCN version {} is not {}, reading records anyway",
            records.version(),
            QCN_VERSION
        );
    }
    Ok(records)
}

/// Extract the identity record from QCN data
///
/// Structured data is read record by record; anything else goes through the
/// legacy identity scan.
pub fn parse(bytes: &[u8]) -> Result<DeviceIdentityRecord, QcnError> {
    if is_structured(bytes) {
        parse_structured(bytes)
    } else {
        log::debug!("No QCNV header, scanning {} bytes for identities", bytes.len());
        parse_legacy(bytes)
    }
}

fn parse_structured(bytes: &[u8]) -> Result<DeviceIdentityRecord, QcnError> {
    let mut primary = None;
    let mut secondary = None;

    for record in records(bytes)? {
        let (id, payload) = record?;
        match IdentitySlot::from_nv_item(id) {
            Some(IdentitySlot::Primary) => primary = Some(identity::decode(payload)),
            Some(IdentitySlot::Secondary) => secondary = Some(identity::decode(payload)),
            None => log::trace!("Skipping NV item {} ({} bytes)", id, payload.len()),
        }
    }

    let primary = primary.ok_or(QcnError::NoIdentityFound)?;
    Ok(DeviceIdentityRecord {
        primary,
        is_dual: secondary.is_some(),
        secondary,
        model_hint: String::new(),
    })
}

/// Collect up to two distinct plausible identities in offset order
fn scan_identities(bytes: &[u8]) -> Vec<String> {
    let mut found: Vec<String> = Vec::with_capacity(2);

    for window in bytes.windows(IDENTITY_PACKED_LEN) {
        if window[0] != IDENTITY_TAG {
            continue;
        }

        let digits = identity::unpack_digits(window);
        if digits.len() == IDENTITY_DIGITS
            && validator::is_plausible(&digits)
            && !found.contains(&digits)
        {
            found.push(digits);
            if found.len() == 2 {
                break;
            }
        }
    }

    found
}

fn parse_legacy(bytes: &[u8]) -> Result<DeviceIdentityRecord, QcnError> {
    let mut found = scan_identities(bytes).into_iter();

    match (found.next(), found.next()) {
        // Legacy containers store the secondary identity first
        (Some(first), Some(second)) => Ok(DeviceIdentityRecord::dual(second, first)),
        (Some(only), None) => Ok(DeviceIdentityRecord::single(only)),
        _ => Err(QcnError::NoIdentityFound),
    }
}

/// Encode an identity record in the structured layout
///
/// The secondary identity is written only for dual-identity records.
pub fn serialize(record: &DeviceIdentityRecord) -> Result<Vec<u8>, QcnError> {
    let identities = record.active_identities();
    let mut out = Vec::with_capacity(
        QCN_HEADER_LEN + identities.len() * (4 + IDENTITY_PACKED_LEN) + 2,
    );

    out.extend_from_slice(&QCN_MAGIC);
    out.extend_from_slice(&QCN_VERSION.to_le_bytes());
    out.extend_from_slice(&0u32.to_le_bytes());

    for (slot, id) in identities {
        let packed = identity::encode(id)?;
        out.extend_from_slice(&slot.nv_item().to_le_bytes());
        out.extend_from_slice(&(packed.len() as u16).to_le_bytes());
        out.extend_from_slice(&packed);
    }

    out.extend_from_slice(&QCN_SENTINEL.to_le_bytes());
    Ok(out)
}
