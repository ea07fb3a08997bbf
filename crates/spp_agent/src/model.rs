//! In-memory inventory of ports, workers and cores.
//!
//! Everything here is owned by the control plane. Mutations land in the
//! staging side of the double-buffered core tables; the dataplane only ever
//! observes the committed side, published at flush.

use std::sync::atomic::{AtomicUsize, Ordering};

use spp_protocol::{PortAbility, PortDir, PortId, PortKind, WorkerType, VID_MAX};

/// Port slots pre-allocated per kind, and the per-direction attachment cap.
pub const MAX_ETHPORTS: usize = 32;

/// Transform slots per port.
pub const ABILITY_MAX: usize = 4;

/// Worker id pool size.
pub const MAX_WORKERS: usize = 32;

/// Lcore slots.
pub const MAX_LCORES: usize = 32;

/// Dense worker id drawn from the free pool on START.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WorkerId(pub usize);

impl WorkerId {
    pub const fn as_usize(self) -> usize {
        self.0
    }
}

/// Classifier attributes of one port. `vid == VID_MAX` and `mac == 0` mean
/// "unset".
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClsAttrs {
    pub vid: u16,
    pub mac: u64,
    pub mac_str: String,
}

impl Default for ClsAttrs {
    fn default() -> Self {
        Self {
            vid: VID_MAX,
            mac: 0,
            mac_str: String::new(),
        }
    }
}

impl ClsAttrs {
    pub fn clear(&mut self) {
        *self = Self::default();
    }
}

/// One pre-allocated port slot.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PortRecord {
    /// Unset until the port is first attached to a worker.
    pub kind: Option<PortKind>,
    /// Dataplane handle, assigned the first time the port is flushed.
    pub ethdev_id: Option<u16>,
    pub cls_attrs: ClsAttrs,
    pub abilities: [PortAbility; ABILITY_MAX],
}

impl PortRecord {
    /// Active VLAN transform for one direction, if any.
    pub fn vlan_ability(&self, dir: PortDir) -> Option<&PortAbility> {
        self.abilities
            .iter()
            .find(|ability| ability.op != spp_protocol::AbilityOp::None && ability.dir == dir)
    }
}

/// One running worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerRecord {
    pub name: String,
    pub wk_type: WorkerType,
    pub lcore_id: u32,
    pub rx_ports: Vec<PortId>,
    pub tx_ports: Vec<PortId>,
}

impl WorkerRecord {
    pub fn new(name: impl Into<String>, wk_type: WorkerType, lcore_id: u32) -> Self {
        Self {
            name: name.into(),
            wk_type,
            lcore_id,
            rx_ports: Vec::new(),
            tx_ports: Vec::new(),
        }
    }

    pub fn ports(&self, dir: PortDir) -> &[PortId] {
        match dir {
            PortDir::Rx => &self.rx_ports,
            PortDir::Tx => &self.tx_ports,
        }
    }

    pub fn ports_mut(&mut self, dir: PortDir) -> &mut Vec<PortId> {
        match dir {
            PortDir::Rx => &mut self.rx_ports,
            PortDir::Tx => &mut self.tx_ports,
        }
    }
}

/// Scheduling state of one lcore.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoreStatus {
    Unuse,
    Idle,
    Running,
    Stopped,
}

/// Double-buffered assignment of workers to one lcore.
///
/// The control plane edits the staging side; dataplane readers follow the
/// committed index with an acquire load, so a publish is observed as a single
/// event and a reader never sees a half-edited list.
#[derive(Debug)]
pub struct CoreRecord {
    pub status: CoreStatus,
    sides: [Vec<WorkerId>; 2],
    committed: AtomicUsize,
}

impl CoreRecord {
    pub fn new(status: CoreStatus) -> Self {
        Self {
            status,
            sides: [Vec::new(), Vec::new()],
            committed: AtomicUsize::new(0),
        }
    }

    fn staging_index(&self) -> usize {
        1 - self.committed.load(Ordering::Relaxed)
    }

    pub fn staging(&self) -> &[WorkerId] {
        &self.sides[self.staging_index()]
    }

    pub fn staging_mut(&mut self) -> &mut Vec<WorkerId> {
        let index = self.staging_index();
        &mut self.sides[index]
    }

    /// Workers assigned to this lcore as the dataplane sees them.
    pub fn committed(&self) -> &[WorkerId] {
        &self.sides[self.committed.load(Ordering::Acquire)]
    }

    /// Publish the staging side, then re-seed the new staging side from the
    /// freshly committed one so later edits start from current state.
    pub fn publish(&mut self) {
        let staged = self.staging_index();
        self.committed.store(staged, Ordering::Release);
        self.sides[1 - staged] = self.sides[staged].clone();
    }
}

impl Clone for CoreRecord {
    fn clone(&self) -> Self {
        Self {
            status: self.status,
            sides: self.sides.clone(),
            committed: AtomicUsize::new(self.committed.load(Ordering::Relaxed)),
        }
    }
}

/// Pre-allocated port slots, one array per kind.
#[derive(Debug, Clone, Default)]
pub struct PortTable {
    phy: Vec<PortRecord>,
    vhost: Vec<PortRecord>,
    ring: Vec<PortRecord>,
}

impl PortTable {
    fn with_slots(slots: usize) -> Self {
        Self {
            phy: vec![PortRecord::default(); slots],
            vhost: vec![PortRecord::default(); slots],
            ring: vec![PortRecord::default(); slots],
        }
    }

    fn slots(&self, kind: PortKind) -> &[PortRecord] {
        match kind {
            PortKind::Phy => &self.phy,
            PortKind::Vhost => &self.vhost,
            PortKind::Ring => &self.ring,
        }
    }

    fn slots_mut(&mut self, kind: PortKind) -> &mut [PortRecord] {
        match kind {
            PortKind::Phy => &mut self.phy,
            PortKind::Vhost => &mut self.vhost,
            PortKind::Ring => &mut self.ring,
        }
    }

    pub fn get(&self, id: PortId) -> Option<&PortRecord> {
        self.slots(id.kind).get(id.index as usize)
    }

    pub fn get_mut(&mut self, id: PortId) -> Option<&mut PortRecord> {
        self.slots_mut(id.kind).get_mut(id.index as usize)
    }

    /// Indices of ports of one kind that have been flushed, ascending.
    pub fn flushed_indices(&self, kind: PortKind) -> Vec<u32> {
        self.slots(kind)
            .iter()
            .enumerate()
            .filter(|(_, record)| record.ethdev_id.is_some())
            .map(|(index, _)| index as u32)
            .collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (PortId, &PortRecord)> {
        let phy = self
            .phy
            .iter()
            .enumerate()
            .map(|(index, record)| (PortId::new(PortKind::Phy, index as u32), record));
        let vhost = self
            .vhost
            .iter()
            .enumerate()
            .map(|(index, record)| (PortId::new(PortKind::Vhost, index as u32), record));
        let ring = self
            .ring
            .iter()
            .enumerate()
            .map(|(index, record)| (PortId::new(PortKind::Ring, index as u32), record));
        phy.chain(vhost).chain(ring)
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (PortId, &mut PortRecord)> {
        let phy = self
            .phy
            .iter_mut()
            .enumerate()
            .map(|(index, record)| (PortId::new(PortKind::Phy, index as u32), record));
        let vhost = self
            .vhost
            .iter_mut()
            .enumerate()
            .map(|(index, record)| (PortId::new(PortKind::Vhost, index as u32), record));
        let ring = self
            .ring
            .iter_mut()
            .enumerate()
            .map(|(index, record)| (PortId::new(PortKind::Ring, index as u32), record));
        phy.chain(vhost).chain(ring)
    }
}

/// Snapshot of the last successfully committed inventory.
#[derive(Debug, Clone, Default)]
struct BackupInfo {
    ports: PortTable,
    workers: Vec<Option<WorkerRecord>>,
    cores: Vec<CoreRecord>,
}

/// The whole control-plane inventory, passed explicitly into every handler.
#[derive(Debug)]
pub struct AgentState {
    pub ports: PortTable,
    pub workers: Vec<Option<WorkerRecord>>,
    pub cores: Vec<CoreRecord>,
    /// Lcores edited in staging since the last flush.
    pub change_core: Vec<bool>,
    /// Workers that must be notified at the next flush.
    pub change_worker: Vec<bool>,
    backup: BackupInfo,
}

impl AgentState {
    /// Pre-allocate all slot structures. `worker_lcores` become Idle, every
    /// other lcore stays Unuse.
    pub fn new(worker_lcores: &[u32]) -> Self {
        let mut cores: Vec<CoreRecord> = (0..MAX_LCORES)
            .map(|_| CoreRecord::new(CoreStatus::Unuse))
            .collect();
        for &lcore in worker_lcores {
            if let Some(core) = cores.get_mut(lcore as usize) {
                core.status = CoreStatus::Idle;
            }
        }
        let mut state = Self {
            ports: PortTable::with_slots(MAX_ETHPORTS),
            workers: vec![None; MAX_WORKERS],
            cores,
            change_core: vec![false; MAX_LCORES],
            change_worker: vec![false; MAX_WORKERS],
            backup: BackupInfo::default(),
        };
        state.snapshot();
        state
    }

    pub fn worker(&self, id: WorkerId) -> Option<&WorkerRecord> {
        self.workers.get(id.0).and_then(Option::as_ref)
    }

    pub fn worker_mut(&mut self, id: WorkerId) -> Option<&mut WorkerRecord> {
        self.workers.get_mut(id.0).and_then(Option::as_mut)
    }

    pub fn worker_id_by_name(&self, name: &str) -> Option<WorkerId> {
        self.workers.iter().position(|slot| {
            slot.as_ref()
                .is_some_and(|record| record.name == name)
        })
        .map(WorkerId)
    }

    pub fn free_worker_id(&self) -> Option<WorkerId> {
        self.workers
            .iter()
            .position(Option::is_none)
            .map(WorkerId)
    }

    /// Mark every worker holding `port` on `dir` for republication.
    pub fn mark_workers_with_port(&mut self, port: PortId, dir: PortDir) {
        for (wid, slot) in self.workers.iter().enumerate() {
            if let Some(record) = slot {
                if record.ports(dir).contains(&port) {
                    self.change_worker[wid] = true;
                }
            }
        }
    }

    /// Record the current inventory as the rollback point.
    pub fn snapshot(&mut self) {
        self.backup = BackupInfo {
            ports: self.ports.clone(),
            workers: self.workers.clone(),
            cores: self.cores.clone(),
        };
    }

    /// Restore the last snapshot and drop all staged edits.
    pub fn rollback(&mut self) {
        self.ports = self.backup.ports.clone();
        self.workers = self.backup.workers.clone();
        self.cores = self.backup.cores.clone();
        self.change_core.iter_mut().for_each(|flag| *flag = false);
        self.change_worker.iter_mut().for_each(|flag| *flag = false);
    }
}
