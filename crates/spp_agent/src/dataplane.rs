//! Contract to the packet-forwarding side.
//!
//! The forwarding loops, NIC handling and classifier tables live outside this
//! crate; the commit step reaches them only through this trait.

use thiserror::Error;

use crate::model::WorkerId;
use spp_protocol::PortKind;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DataplaneError {
    #[error("failed to set up port {kind}:{index}: {reason}")]
    PortSetup {
        kind: PortKind,
        index: u32,
        reason: String,
    },
    #[error("failed to refresh worker {0}: {1}")]
    WorkerRefresh(usize, String),
}

pub trait Dataplane {
    /// Open or reconfigure a dataplane port, returning its ethdev id.
    fn ensure_port(&mut self, kind: PortKind, index: u32) -> Result<u16, DataplaneError>;

    /// Tell a worker to refresh its port handles after a commit.
    fn refresh_worker(&mut self, worker: WorkerId) -> Result<(), DataplaneError>;

    /// Reinitialize a classifier's auxiliary table when it stops.
    fn reset_classifier(&mut self, worker: WorkerId);
}

/// Stand-in dataplane used when the agent runs without a forwarding backend,
/// and by the test suites. Assigns sequential ethdev ids and records calls.
#[derive(Debug, Default)]
pub struct SimDataplane {
    next_ethdev: u16,
    pub opened: Vec<(PortKind, u32)>,
    pub refreshed: Vec<WorkerId>,
    pub classifier_resets: Vec<WorkerId>,
    /// Make the next `ensure_port` fail, for commit-failure tests.
    pub fail_port_setup: bool,
}

impl SimDataplane {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Dataplane for SimDataplane {
    fn ensure_port(&mut self, kind: PortKind, index: u32) -> Result<u16, DataplaneError> {
        if self.fail_port_setup {
            return Err(DataplaneError::PortSetup {
                kind,
                index,
                reason: "injected failure".to_string(),
            });
        }
        let id = self.next_ethdev;
        self.next_ethdev += 1;
        self.opened.push((kind, index));
        Ok(id)
    }

    fn refresh_worker(&mut self, worker: WorkerId) -> Result<(), DataplaneError> {
        self.refreshed.push(worker);
        Ok(())
    }

    fn reset_classifier(&mut self, worker: WorkerId) {
        self.classifier_resets.push(worker);
    }
}
