//! Device and QCN file operations
//!
//! `DeviceSession` owns at most one DIAG link and runs the three user-facing
//! operations on top of it: read the identity items into a QCN file, write a
//! QCN file's identities to the device, and edit the identities inside a QCN
//! file. Progress goes to the injected [`EventSink`].
//!
//! ```text
//! Disconnected --connect--> Connected --read/write/edit--> *InProgress --> Connected
//! ```

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::constants::{
    DEFAULT_MODEL_HINT, IDENTITY_DIGITS, NV_ITEM_IMEI, NV_ITEM_IMEI_2, QCN_BACKUP_SUFFIX,
};
use crate::error::{LinkError, Result, SessionError};
use crate::events::{EventLevel, EventSink, LogSink};
use crate::identity;
use crate::link::DiagLink;
use crate::nv::NvStore;
use crate::qcn;
use crate::scanner::TransportScanner;
use crate::structures::{DeviceIdentityRecord, IdentitySlot};
use crate::transport::{DiagConfig, SerialOpener, TransportOpener};

/// Where a session is in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No DIAG link is open
    Disconnected,
    /// A DIAG link is open and idle
    Connected,
    /// Identity items are being read from the device
    ReadInProgress,
    /// A QCN file is being written to the device
    WriteInProgress,
    /// A QCN file is being rewritten
    EditInProgress,
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            SessionState::Disconnected => "disconnected",
            SessionState::Connected => "connected",
            SessionState::ReadInProgress => "reading",
            SessionState::WriteInProgress => "writing",
            SessionState::EditInProgress => "editing",
        };
        write!(f, "{}", name)
    }
}

/// Cooperative cancellation shared with another thread
///
/// Checked before every NV command; an exchange already on the wire always
/// runs to completion or timeout.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    /// Flag that has not been raised
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation of the running operation
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Check if cancellation was requested
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    fn checkpoint(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(SessionError::Cancelled)
        } else {
            Ok(())
        }
    }
}

/// Backup location used before a QCN file is rewritten in place
pub fn backup_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(QCN_BACKUP_SUFFIX);
    PathBuf::from(name)
}

/// DIAG session orchestrating NV and QCN operations
///
/// # Example
///
/// ```no_run
/// use qcn_diag::{CancelFlag, DeviceSession, DiagConfig, TransportScanner};
///
/// let scanner = TransportScanner::new(DiagConfig::default());
/// let Some(port) = scanner.scan().into_iter().next() else {
///     println!("No DIAG port found");
///     return Ok(());
/// };
///
/// let mut session = DeviceSession::new(DiagConfig::default());
/// session.connect(&port)?;
/// let record = session.read_from_device("backup.qcn", &CancelFlag::new())?;
/// println!("{}", record);
/// # Ok::<(), qcn_diag::SessionError>(())
/// ```
pub struct DeviceSession<O: TransportOpener = SerialOpener> {
    scanner: TransportScanner<O>,
    sink: Arc<dyn EventSink>,
    nv: Option<NvStore>,
    state: SessionState,
}

impl DeviceSession<SerialOpener> {
    /// Session on the system's serial ports, reporting through `log`
    pub fn new(config: DiagConfig) -> Self {
        Self::with_opener(SerialOpener, config)
    }
}

impl<O: TransportOpener> DeviceSession<O> {
    /// Session on a custom endpoint source
    pub fn with_opener(opener: O, config: DiagConfig) -> Self {
        Self {
            scanner: TransportScanner::with_opener(opener, config),
            sink: Arc::new(LogSink),
            nv: None,
            state: SessionState::Disconnected,
        }
    }

    /// Replace the progress sink
    pub fn with_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sink = sink;
        self
    }

    /// Scanner used to validate endpoints before connecting
    pub fn scanner(&self) -> &TransportScanner<O> {
        &self.scanner
    }

    /// Current lifecycle state
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Check if a DIAG link is open
    pub fn is_connected(&self) -> bool {
        self.nv.is_some()
    }

    /// Name of the connected endpoint
    pub fn port_name(&self) -> Option<&str> {
        self.nv.as_ref().and_then(|nv| nv.link().port_name())
    }

    /// Connect to a DIAG endpoint
    ///
    /// Any existing link is closed first. The endpoint must pass a probe and
    /// then answer a version request on the kept link.
    pub fn connect(&mut self, id: &str) -> Result<()> {
        self.disconnect();

        match self.open_link(id) {
            Ok(nv) => {
                self.nv = Some(nv);
                self.state = SessionState::Connected;
                self.sink
                    .emit(EventLevel::Success, &format!("Connected to DIAG port: {}", id));
                Ok(())
            }
            Err(e) => {
                self.sink.emit(EventLevel::Error, &e.to_string());
                Err(e)
            }
        }
    }

    fn open_link(&self, id: &str) -> Result<NvStore> {
        let failed = |reason: String| SessionError::ConnectFailed {
            port: id.to_string(),
            reason,
        };

        if !self.scanner.probe(id) {
            return Err(failed("no DIAG response".to_string()));
        }

        let config = self.scanner.config();
        let transport = self
            .scanner
            .opener()
            .open(id, config)
            .map_err(|e| failed(e.to_string()))?;
        let mut link = DiagLink::open(transport, config);

        match link.version_info(config.probe_timeout) {
            Ok(version) => log::debug!("{} version: {}", id, printable(&version)),
            Err(LinkError::Frame(e)) => log::debug!("{} version answer: {}", id, e),
            Err(e) => return Err(failed(e.to_string())),
        }

        Ok(NvStore::new(link, config))
    }

    /// Close the link, if any
    pub fn disconnect(&mut self) {
        if let Some(nv) = self.nv.take() {
            nv.into_link().close();
            self.sink.emit(EventLevel::Info, "DIAG port disconnected");
        }
        self.state = SessionState::Disconnected;
    }

    /// Read the identity items without writing a file
    pub fn read_device_identity(&mut self, cancel: &CancelFlag) -> Result<DeviceIdentityRecord> {
        self.run(SessionState::ReadInProgress, |session| {
            let nv = session.nv.as_mut().ok_or(SessionError::NotConnected)?;
            read_identity(nv, session.sink.as_ref(), cancel)
        })
    }

    /// Read the identity items and save them as a structured QCN file
    pub fn read_from_device(
        &mut self,
        path: impl AsRef<Path>,
        cancel: &CancelFlag,
    ) -> Result<DeviceIdentityRecord> {
        let path = path.as_ref();
        self.run(SessionState::ReadInProgress, |session| {
            let nv = session.nv.as_mut().ok_or(SessionError::NotConnected)?;
            let sink = session.sink.as_ref();

            sink.emit(EventLevel::Info, "=== Reading QCN ===");
            sink.emit(EventLevel::Info, &format!("Output file: {}", path.display()));

            let record = read_identity(nv, sink, cancel)?;
            emit_record(sink, &record);

            let bytes = qcn::serialize(&record)?;
            fs::write(path, &bytes)?;
            sink.emit(
                EventLevel::Success,
                &format!("QCN saved: {} ({} bytes)", path.display(), bytes.len()),
            );
            Ok(record)
        })
    }

    /// Write the identities stored in a QCN file to the device
    ///
    /// Not transactional: if the secondary write fails the primary has
    /// already been committed.
    pub fn write_to_device(
        &mut self,
        path: impl AsRef<Path>,
        cancel: &CancelFlag,
    ) -> Result<DeviceIdentityRecord> {
        let path = path.as_ref();
        self.run(SessionState::WriteInProgress, |session| {
            let nv = session.nv.as_mut().ok_or(SessionError::NotConnected)?;
            let sink = session.sink.as_ref();

            let bytes = read_existing(path)?;
            sink.emit(EventLevel::Info, "=== Writing QCN ===");
            sink.emit(
                EventLevel::Info,
                &format!("File: {} ({} bytes)", path.display(), bytes.len()),
            );

            let record = qcn::parse(&bytes)?;
            emit_record(sink, &record);
            warn_implausible(sink, &record);

            let packed = record
                .active_identities()
                .into_iter()
                .map(|(slot, id)| {
                    identity::encode(id)
                        .map(|packed| (slot, packed))
                        .map_err(|source| SessionError::Validation { slot, source })
                })
                .collect::<Result<Vec<_>>>()?;

            sink.emit(EventLevel::Info, "Writing identities to device...");
            for (slot, packed) in packed {
                cancel.checkpoint()?;
                nv.write_item(slot.nv_item(), &packed)
                    .map_err(|source| SessionError::IdentityWrite { slot, source })?;
                sink.emit(EventLevel::Success, &format!("{} identity written", slot));
            }

            sink.emit(EventLevel::Success, "QCN written to device");
            sink.emit(EventLevel::Info, "Reboot the device to apply changes");
            Ok(record)
        })
    }

    /// Replace the identities inside a QCN file
    ///
    /// Only the format of the new identities is checked. The original file is
    /// copied to [`backup_path`] before it is rewritten in the structured
    /// layout. Works without a device connection.
    pub fn edit_identity_in_file(
        &mut self,
        path: impl AsRef<Path>,
        new_primary: &str,
        new_secondary: Option<&str>,
    ) -> Result<DeviceIdentityRecord> {
        let path = path.as_ref();
        self.run(SessionState::EditInProgress, |session| {
            edit_file(session.sink.as_ref(), path, new_primary, new_secondary)
        })
    }

    fn run<T>(
        &mut self,
        state: SessionState,
        op: impl FnOnce(&mut Self) -> Result<T>,
    ) -> Result<T> {
        let previous = std::mem::replace(&mut self.state, state);
        let result = op(self);
        self.state = previous;

        if let Err(e) = &result {
            self.sink.emit(EventLevel::Error, &e.to_string());
        }
        result
    }
}

impl<O: TransportOpener> std::fmt::Debug for DeviceSession<O> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceSession")
            .field("port", &self.port_name())
            .field("state", &self.state)
            .finish()
    }
}

impl<O: TransportOpener> Drop for DeviceSession<O> {
    fn drop(&mut self) {
        if let Some(nv) = self.nv.take() {
            nv.into_link().close();
        }
    }
}

fn read_identity(
    nv: &mut NvStore,
    sink: &dyn EventSink,
    cancel: &CancelFlag,
) -> Result<DeviceIdentityRecord> {
    sink.emit(EventLevel::Info, "Reading device identities...");

    cancel.checkpoint()?;
    let raw = nv.read_item(NV_ITEM_IMEI)?;
    if raw.is_empty() {
        return Err(SessionError::PrimaryIdentityMissing);
    }
    let primary = identity::decode(&raw);

    cancel.checkpoint()?;
    let secondary = match nv.read_item(NV_ITEM_IMEI_2) {
        Ok(raw) if raw.is_empty() => None,
        Ok(raw) => Some(identity::decode(&raw)).filter(|id| !is_blank(id)),
        Err(e) => {
            sink.emit(
                EventLevel::Warning,
                &format!("Secondary identity unavailable: {}", e),
            );
            None
        }
    };

    let record = DeviceIdentityRecord {
        primary,
        is_dual: secondary.is_some(),
        secondary,
        model_hint: DEFAULT_MODEL_HINT.to_string(),
    };

    warn_implausible(sink, &record);
    Ok(record)
}

/// Zero-padded decodes of damaged items show up here
fn warn_implausible(sink: &dyn EventSink, record: &DeviceIdentityRecord) {
    for slot in record.implausible_slots() {
        sink.emit(
            EventLevel::Warning,
            &format!(
                "{} identity {} fails the plausibility check",
                slot,
                record.identity(slot).unwrap_or_default()
            ),
        );
    }
}

fn edit_file(
    sink: &dyn EventSink,
    path: &Path,
    new_primary: &str,
    new_secondary: Option<&str>,
) -> Result<DeviceIdentityRecord> {
    identity::validate_format(new_primary).map_err(|source| SessionError::Validation {
        slot: IdentitySlot::Primary,
        source,
    })?;
    if let Some(secondary) = new_secondary {
        identity::validate_format(secondary).map_err(|source| SessionError::Validation {
            slot: IdentitySlot::Secondary,
            source,
        })?;
    }

    let bytes = read_existing(path)?;
    sink.emit(EventLevel::Info, "=== Editing QCN ===");
    sink.emit(EventLevel::Info, &format!("File: {}", path.display()));

    let mut record = qcn::parse(&bytes)?;
    sink.emit(
        EventLevel::Info,
        &format!("Identity 1: {} -> {}", record.primary, new_primary),
    );
    record.primary = new_primary.to_string();

    if let Some(secondary) = new_secondary {
        sink.emit(
            EventLevel::Info,
            &format!(
                "Identity 2: {} -> {}",
                record.secondary.as_deref().unwrap_or("-"),
                secondary
            ),
        );
        record.secondary = Some(secondary.to_string());
        record.is_dual = true;
    }

    let updated = qcn::serialize(&record)?;

    let backup = backup_path(path);
    fs::write(&backup, &bytes)?;
    sink.emit(EventLevel::Info, &format!("Backup created: {}", backup.display()));

    fs::write(path, &updated)?;
    sink.emit(EventLevel::Success, "QCN edited, ready to write to the device");
    Ok(record)
}

fn read_existing(path: &Path) -> Result<Vec<u8>> {
    if !path.is_file() {
        return Err(SessionError::FileNotFound(path.to_path_buf()));
    }
    Ok(fs::read(path)?)
}

fn emit_record(sink: &dyn EventSink, record: &DeviceIdentityRecord) {
    for line in record.to_string().lines() {
        sink.emit(EventLevel::Info, line);
    }
}

/// Unprogrammed secondary slots read back as all zeros
fn is_blank(id: &str) -> bool {
    id.len() == IDENTITY_DIGITS && id.bytes().all(|b| b == b'0')
}

fn printable(bytes: &[u8]) -> String {
    bytes
        .iter()
        .skip(1)
        .filter(|b| b.is_ascii_graphic() || **b == b' ')
        .map(|&b| char::from(b))
        .collect()
}
