//! Scripted in-memory transport for tests
//!
//! A `MockTransport` decodes every frame written to it, records the command
//! payload and hands it to a responder closure. Whatever wire bytes the
//! responder returns are queued as inbound data.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use crate::constants::*;
use crate::error::TransportError;
use crate::frame;
use crate::identity;
use crate::transport::{DiagConfig, Transport, TransportOpener};

/// Maps a command payload to raw reply bytes (or silence)
pub(crate) type Responder = Box<dyn FnMut(&[u8]) -> Option<Vec<u8>> + Send>;

#[derive(Default)]
pub(crate) struct MockState {
    pub inbound: VecDeque<u8>,
    /// Verified command payloads in the order they were written
    pub commands: Vec<Vec<u8>>,
    /// Limit on bytes handed out per read, to exercise reassembly
    pub max_read: Option<usize>,
    pub open_now: usize,
    pub opened_total: usize,
}

pub(crate) struct MockTransport {
    name: String,
    state: Arc<Mutex<MockState>>,
    responder: Arc<Mutex<Responder>>,
}

impl MockTransport {
    pub fn new(name: &str, responder: Responder) -> (Self, Arc<Mutex<MockState>>) {
        let state = Arc::new(Mutex::new(MockState {
            open_now: 1,
            opened_total: 1,
            ..Default::default()
        }));
        let transport = Self {
            name: name.to_string(),
            state: Arc::clone(&state),
            responder: Arc::new(Mutex::new(responder)),
        };
        (transport, state)
    }
}

impl Transport for MockTransport {
    fn name(&self) -> &str {
        &self.name
    }

    fn clear_input(&mut self) -> Result<(), TransportError> {
        self.state.lock().unwrap().inbound.clear();
        Ok(())
    }

    fn write_all(&mut self, data: &[u8]) -> Result<(), TransportError> {
        let decoded = frame::decode(data).expect("host sent a malformed frame");
        let payload = frame::verify(&decoded)
            .expect("host sent a bad checksum")
            .to_vec();

        let reply = {
            let mut responder = self.responder.lock().unwrap();
            (&mut *responder)(&payload)
        };

        let mut state = self.state.lock().unwrap();
        state.commands.push(payload);
        if let Some(reply) = reply {
            state.inbound.extend(reply);
        }
        Ok(())
    }

    fn bytes_to_read(&mut self) -> Result<usize, TransportError> {
        Ok(self.state.lock().unwrap().inbound.len())
    }

    fn read_available(&mut self, buf: &mut [u8]) -> Result<usize, TransportError> {
        let mut state = self.state.lock().unwrap();
        let limit = state.max_read.unwrap_or(usize::MAX);
        let len = buf.len().min(state.inbound.len()).min(limit);
        for (slot, byte) in buf.iter_mut().zip(state.inbound.drain(..len)) {
            *slot = byte;
        }
        Ok(len)
    }
}

impl Drop for MockTransport {
    fn drop(&mut self) {
        self.state.lock().unwrap().open_now -= 1;
    }
}

/// One endpoint known to a `MockOpener`
pub(crate) struct MockPort {
    name: String,
    /// `None` makes every open attempt fail
    responder: Option<Arc<Mutex<Responder>>>,
    pub state: Arc<Mutex<MockState>>,
}

impl MockPort {
    pub fn answering(name: &str, responder: Responder) -> Self {
        Self {
            name: name.to_string(),
            responder: Some(Arc::new(Mutex::new(responder))),
            state: Arc::default(),
        }
    }

    pub fn busy(name: &str) -> Self {
        Self {
            name: name.to_string(),
            responder: None,
            state: Arc::default(),
        }
    }
}

#[derive(Default)]
pub(crate) struct MockOpener {
    pub ports: Vec<MockPort>,
}

impl MockOpener {
    pub fn with(ports: Vec<MockPort>) -> Self {
        Self { ports }
    }

    pub fn state(&self, name: &str) -> Arc<Mutex<MockState>> {
        let port = self.ports.iter().find(|p| p.name == name).unwrap();
        Arc::clone(&port.state)
    }
}

impl TransportOpener for MockOpener {
    fn candidates(&self) -> Result<Vec<String>, TransportError> {
        Ok(self.ports.iter().map(|p| p.name.clone()).collect())
    }

    fn open(&self, id: &str, _config: &DiagConfig) -> Result<Box<dyn Transport>, TransportError> {
        let port = self
            .ports
            .iter()
            .find(|p| p.name == id)
            .ok_or_else(|| TransportError::Open {
                port: id.to_string(),
                reason: "no such port".to_string(),
            })?;

        let responder = port.responder.as_ref().ok_or_else(|| TransportError::Open {
            port: id.to_string(),
            reason: "port busy".to_string(),
        })?;

        {
            let mut state = port.state.lock().unwrap();
            state.open_now += 1;
            state.opened_total += 1;
        }

        Ok(Box::new(MockTransport {
            name: id.to_string(),
            state: Arc::clone(&port.state),
            responder: Arc::clone(responder),
        }))
    }
}

/// Fast timeouts so failing exchanges do not slow the suite
pub(crate) fn test_config() -> DiagConfig {
    DiagConfig::default()
        .with_probe_timeout(std::time::Duration::from_millis(30))
        .with_read_timeout(std::time::Duration::from_millis(30))
        .with_write_timeout(std::time::Duration::from_millis(30))
        .with_poll_interval(std::time::Duration::from_millis(1))
}

/// Responder that never answers
pub(crate) fn silent() -> Responder {
    Box::new(|_: &[u8]| None)
}

/// Responder emulating a modem with an NV item table
///
/// Reads of unknown items return a bare header, writes store the payload.
/// Items listed in `reject_writes` answer writes with an error opcode.
pub(crate) fn modem(items: HashMap<u16, Vec<u8>>, reject_writes: Vec<u16>) -> Responder {
    let mut items = items;
    Box::new(move |command: &[u8]| {
        let reply = match command {
            [DIAG_CMD_VERSION_INFO, ..] => b"\x00Mock Modem 1.0".to_vec(),
            [DIAG_CMD_NV_READ, lo, hi, ..] => {
                let id = u16::from_le_bytes([*lo, *hi]);
                let mut reply = vec![DIAG_CMD_NV_READ, *lo, *hi, 0x00];
                if let Some(value) = items.get(&id) {
                    reply.extend_from_slice(value);
                }
                reply
            }
            [DIAG_CMD_NV_WRITE, lo, hi, data @ ..] => {
                let id = u16::from_le_bytes([*lo, *hi]);
                if reject_writes.contains(&id) {
                    vec![0x14, *lo, *hi]
                } else {
                    items.insert(id, data.to_vec());
                    vec![DIAG_CMD_NV_WRITE, *lo, *hi, 0x00]
                }
            }
            _ => return None,
        };
        Some(frame::encode(&reply))
    })
}

/// Item table holding packed identities
pub(crate) fn identity_items(primary: &str, secondary: Option<&str>) -> HashMap<u16, Vec<u8>> {
    let mut items = HashMap::new();
    items.insert(NV_ITEM_IMEI, identity::encode(primary).unwrap().to_vec());
    if let Some(secondary) = secondary {
        items.insert(NV_ITEM_IMEI_2, identity::encode(secondary).unwrap().to_vec());
    }
    items
}
