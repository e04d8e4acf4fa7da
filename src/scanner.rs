//! DIAG port discovery
//!
//! Every candidate serial endpoint is opened at the DIAG line settings and sent
//! a version-info command. A candidate that answers with any bytes inside the
//! probe window speaks DIAG. Probing never leaves a port open and never fails:
//! busy or silent ports are simply left out.

use crate::error::LinkError;
use crate::link::DiagLink;
use crate::transport::{DiagConfig, SerialOpener, TransportOpener};

/// Finds serial endpoints that answer DIAG commands
#[derive(Debug, Clone)]
pub struct TransportScanner<O: TransportOpener = SerialOpener> {
    opener: O,
    config: DiagConfig,
}

impl TransportScanner<SerialOpener> {
    /// Scanner over the system's serial ports
    pub fn new(config: DiagConfig) -> Self {
        Self::with_opener(SerialOpener, config)
    }
}

impl<O: TransportOpener> TransportScanner<O> {
    /// Scanner over a custom endpoint source
    pub fn with_opener(opener: O, config: DiagConfig) -> Self {
        Self { opener, config }
    }

    /// Endpoint source
    pub fn opener(&self) -> &O {
        &self.opener
    }

    /// Line settings and timeouts
    pub fn config(&self) -> &DiagConfig {
        &self.config
    }

    /// Enumerate candidate endpoints
    pub fn list_candidates(&self) -> Vec<String> {
        match self.opener.candidates() {
            Ok(candidates) => candidates,
            Err(e) => {
                log::warn!("{}", e);
                Vec::new()
            }
        }
    }

    /// Check whether an endpoint answers DIAG commands
    pub fn probe(&self, id: &str) -> bool {
        let transport = match self.opener.open(id, &self.config) {
            Ok(transport) => transport,
            Err(e) => {
                log::debug!("Probe {}: {}", id, e);
                return false;
            }
        };

        // The link owns the transport and closes it when dropped below
        let mut link = DiagLink::open(transport, &self.config);
        let alive = match link.version_info(self.config.probe_timeout) {
            Ok(_) => true,
            // Any bytes count as an answer, even a garbled frame
            Err(LinkError::Frame(e)) => {
                log::debug!("Probe {}: answered with {}", id, e);
                true
            }
            Err(e) => {
                log::debug!("Probe {}: {}", id, e);
                false
            }
        };
        link.close();

        if alive {
            log::info!("DIAG port found: {}", id);
        }
        alive
    }

    /// Enumerate and probe, returning the endpoints that answered
    pub fn scan(&self) -> Vec<String> {
        self.list_candidates()
            .into_iter()
            .filter(|id| self.probe(id))
            .collect()
    }
}
