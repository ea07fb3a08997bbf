//! Mutation handlers behind the command dispatcher.
//!
//! Each handler validates its preconditions and edits the staging view only;
//! nothing here touches the dataplane-visible state. The single exception is
//! the classifier reset on STOP, which goes straight to the dataplane because
//! the auxiliary table is not part of the double-buffered inventory.

use thiserror::Error;
use tracing::{debug, error, info};

use crate::dataplane::{Dataplane, DataplaneError};
use crate::flavor::WorkerFlavor;
use crate::model::{AgentState, CoreStatus, WorkerRecord, MAX_ETHPORTS};
use spp_protocol::{
    mac_str_to_u64, AbilityOp, PortAbility, PortDir, PortId, WkAction, WorkerType, VID_MAX,
};

#[derive(Debug, Error)]
pub enum CmdError {
    #[error("invalid MAC address `{0}`")]
    InvalidMac(String),
    #[error("no port {0}")]
    UnknownPort(PortId),
    #[error("port {0} is not bound")]
    PortNotBound(PortId),
    #[error("unexpected VLAN ID {0}")]
    VlanMismatch(u16),
    #[error("unexpected MAC address `{0}`")]
    MacMismatch(String),
    #[error("port {0} already in classifier use")]
    ClassifierSlotInUse(PortId),
    #[error("lcore {0} is not available")]
    CoreUnavailable(u32),
    #[error("worker name `{0}` is already used")]
    NameInUse(String),
    #[error("no free worker slot")]
    NoFreeWorkerSlot,
    #[error("worker type is required to start a worker")]
    WorkerTypeRequired,
    #[error("worker type `{0}` not supported by this process")]
    WorkerTypeNotSupported(WorkerType),
    #[error("unknown worker `{0}`")]
    UnknownWorker(String),
    #[error("port limit exceeded for worker `{0}`")]
    PortLimitExceeded(String),
    #[error("no add-vlan ability registered on port {0}")]
    VlanNotRegistered(PortId),
    #[error("no free ability slot on port {0}")]
    NoFreeAbilitySlot(PortId),
    #[error("too many ports attached")]
    TooManyPorts,
    #[error("unexpected action `{0}`")]
    UnexpectedAction(WkAction),
    #[error(transparent)]
    Dataplane(#[from] DataplaneError),
}

/// Add or delete one classifier rule on a port.
pub fn update_classifier_table(
    state: &mut AgentState,
    action: WkAction,
    vid: u16,
    mac_str: &str,
    port_id: PortId,
) -> Result<(), CmdError> {
    debug!("update classifier table, mac addr `{mac_str}`, port `{port_id}`");

    let mac = mac_str_to_u64(mac_str).map_err(|_| {
        error!("Invalid MAC address `{mac_str}`");
        CmdError::InvalidMac(mac_str.to_string())
    })?;

    let port = state.ports.get_mut(port_id).ok_or_else(|| {
        error!("Failed to get port {port_id}");
        CmdError::UnknownPort(port_id)
    })?;
    if port.kind.is_none() {
        error!("Port {port_id} doesn't exist");
        return Err(CmdError::PortNotBound(port_id));
    }

    if action == WkAction::Del {
        if port.cls_attrs.vid != 0 && port.cls_attrs.vid != vid {
            error!("Unexpected VLAN ID `{vid}`");
            return Err(CmdError::VlanMismatch(vid));
        }
        if port.cls_attrs.mac != 0 && port.cls_attrs.mac != mac {
            error!("Unexpected MAC `{mac_str}`");
            return Err(CmdError::MacMismatch(mac_str.to_string()));
        }
        port.cls_attrs.clear();
    } else if action == WkAction::Add {
        if port.cls_attrs.vid != VID_MAX {
            error!(
                "Used port {port_id}, vid {} != {vid}",
                port.cls_attrs.vid
            );
            return Err(CmdError::ClassifierSlotInUse(port_id));
        }
        if port.cls_attrs.mac != 0 {
            error!(
                "Used port {port_id}, mac {} != {mac_str}",
                port.cls_attrs.mac_str
            );
            return Err(CmdError::ClassifierSlotInUse(port_id));
        }
        port.cls_attrs.vid = vid;
        port.cls_attrs.mac = mac;
        port.cls_attrs.mac_str = mac_str.to_string();
    }

    // The owning worker republishes its forwarding table at the next flush.
    state.mark_workers_with_port(port_id, PortDir::Tx);
    Ok(())
}

/// Start a worker on an lcore, or stop it by name.
pub fn update_worker(
    state: &mut AgentState,
    dataplane: &mut dyn Dataplane,
    flavor: &WorkerFlavor,
    action: WkAction,
    name: &str,
    lcore_id: u32,
    wk_type: Option<WorkerType>,
) -> Result<(), CmdError> {
    match action {
        WkAction::Start => {
            let wk_type = wk_type.ok_or(CmdError::WorkerTypeRequired)?;
            if !flavor.allows_worker_type(wk_type) {
                error!(
                    "Worker type `{wk_type}` is not supported by `{}` process",
                    flavor.proc_kind()
                );
                return Err(CmdError::WorkerTypeNotSupported(wk_type));
            }

            let available = state
                .cores
                .get(lcore_id as usize)
                .is_some_and(|core| core.status != CoreStatus::Unuse);
            if !available {
                error!("Core {lcore_id} is not available because it is in unuse state");
                return Err(CmdError::CoreUnavailable(lcore_id));
            }

            if state.worker_id_by_name(name).is_some() {
                error!("Component name '{name}' is already used");
                return Err(CmdError::NameInUse(name.to_string()));
            }

            let wid = state.free_worker_id().ok_or_else(|| {
                error!("Cannot assign component over the maximum number");
                CmdError::NoFreeWorkerSlot
            })?;

            state.workers[wid.as_usize()] =
                Some(WorkerRecord::new(name, wk_type, lcore_id));
            state.cores[lcore_id as usize].staging_mut().push(wid);
            state.change_worker[wid.as_usize()] = true;
            state.change_core[lcore_id as usize] = true;
        }

        WkAction::Stop => {
            // Stopping an unknown worker is a no-op by design.
            let Some(wid) = state.worker_id_by_name(name) else {
                return Ok(());
            };
            let Some(record) = state.workers[wid.as_usize()].take() else {
                return Ok(());
            };

            if record.wk_type == WorkerType::Classify {
                dataplane.reset_classifier(wid);
            }

            let lcore = record.lcore_id as usize;
            if let Some(core) = state.cores.get_mut(lcore) {
                core.staging_mut().retain(|id| *id != wid);
            }
            state.change_worker[wid.as_usize()] = false;
            if let Some(flag) = state.change_core.get_mut(lcore) {
                *flag = true;
            }
        }

        other => {
            error!("Unexpected action `{other}` for component command");
            return Err(CmdError::UnexpectedAction(other));
        }
    }
    Ok(())
}

/// Check if the attach would exceed the per-type rx/tx limits.
fn check_port_count(wk_type: WorkerType, dir: PortDir, nof_rx: usize, nof_tx: usize) -> bool {
    let (nof_rx, nof_tx) = match dir {
        PortDir::Rx => (nof_rx + 1, nof_tx),
        PortDir::Tx => (nof_rx, nof_tx + 1),
    };
    info!(
        "Num of ports after count up, dir={}, rx={nof_rx}, tx={nof_tx}",
        dir.as_str()
    );
    match wk_type {
        WorkerType::Forward => nof_rx <= 1 && nof_tx <= 1,
        WorkerType::Merge => nof_tx <= 1,
        WorkerType::Classify => nof_rx <= 1,
        WorkerType::Mirror => nof_rx <= 1 && nof_tx <= 2,
    }
}

/// Attach a port to or detach it from one side of a worker.
pub fn update_port(
    state: &mut AgentState,
    action: WkAction,
    port_id: PortId,
    dir: PortDir,
    name: &str,
    ability: PortAbility,
) -> Result<(), CmdError> {
    let wid = state.worker_id_by_name(name).ok_or_else(|| {
        error!("Unknown component by port command. (component = {name})");
        CmdError::UnknownWorker(name.to_string())
    })?;
    if state.ports.get(port_id).is_none() {
        error!("Failed to get port {port_id}");
        return Err(CmdError::UnknownPort(port_id));
    }

    match action {
        WkAction::Add => {
            let (wk_type, nof_rx, nof_tx, attached) = {
                let Some(worker) = state.worker(wid) else {
                    return Err(CmdError::UnknownWorker(name.to_string()));
                };
                (
                    worker.wk_type,
                    worker.rx_ports.len(),
                    worker.tx_ports.len(),
                    worker.ports(dir).contains(&port_id),
                )
            };

            if !check_port_count(wk_type, dir, nof_rx, nof_tx) {
                error!("Cannot add port over the limit of `{wk_type}`");
                return Err(CmdError::PortLimitExceeded(name.to_string()));
            }

            if attached {
                // Re-adding an attached port only updates an installed
                // add-vlan transform; anything else is an idempotent no-op.
                if ability.op != AbilityOp::AddVlan {
                    return Ok(());
                }
                let Some(port) = state.ports.get_mut(port_id) else {
                    return Err(CmdError::UnknownPort(port_id));
                };
                match port
                    .abilities
                    .iter_mut()
                    .find(|slot| slot.op == AbilityOp::AddVlan)
                {
                    Some(slot) => *slot = ability,
                    None => {
                        error!("No add-vlan ability registered on {port_id}");
                        return Err(CmdError::VlanNotRegistered(port_id));
                    }
                }
            } else {
                let nof_ports = match dir {
                    PortDir::Rx => nof_rx,
                    PortDir::Tx => nof_tx,
                };
                if nof_ports >= MAX_ETHPORTS {
                    error!("Cannot assign port over the maximum number");
                    return Err(CmdError::TooManyPorts);
                }

                let Some(port) = state.ports.get_mut(port_id) else {
                    return Err(CmdError::UnknownPort(port_id));
                };
                if ability.op != AbilityOp::None {
                    match port
                        .abilities
                        .iter_mut()
                        .find(|slot| slot.op == AbilityOp::None)
                    {
                        Some(slot) => *slot = ability,
                        None => {
                            error!("No space of port ability");
                            return Err(CmdError::NoFreeAbilitySlot(port_id));
                        }
                    }
                }
                port.kind = Some(port_id.kind);
                if let Some(worker) = state.worker_mut(wid) {
                    worker.ports_mut(dir).push(port_id);
                }
            }
        }

        WkAction::Del => {
            if let Some(port) = state.ports.get_mut(port_id) {
                for slot in port.abilities.iter_mut() {
                    if slot.op != AbilityOp::None && slot.dir == dir {
                        *slot = PortAbility::default();
                    }
                }
            }
            if let Some(worker) = state.worker_mut(wid) {
                worker.ports_mut(dir).retain(|id| *id != port_id);
            }
        }

        other => {
            error!("Unexpected action `{other}` for port command");
            return Err(CmdError::UnexpectedAction(other));
        }
    }

    state.change_worker[wid.as_usize()] = true;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataplane::SimDataplane;
    use crate::model::WorkerId;
    use spp_protocol::{PortKind, ProcKind};

    fn vf_flavor() -> WorkerFlavor {
        WorkerFlavor::new(ProcKind::Vf)
    }

    fn start_worker(state: &mut AgentState, dp: &mut SimDataplane, name: &str, lcore: u32) {
        update_worker(
            state,
            dp,
            &vf_flavor(),
            WkAction::Start,
            name,
            lcore,
            Some(WorkerType::Forward),
        )
        .unwrap();
    }

    #[test]
    fn test_start_writes_staging_only() {
        let mut state = AgentState::new(&[2]);
        let mut dp = SimDataplane::new();
        start_worker(&mut state, &mut dp, "fwd1", 2);

        assert_eq!(state.cores[2].staging(), &[WorkerId(0)]);
        assert!(state.cores[2].committed().is_empty());
        assert!(state.change_core[2]);
        assert!(state.change_worker[0]);
    }

    #[test]
    fn test_start_rejects_unuse_core_and_dup_name() {
        let mut state = AgentState::new(&[2]);
        let mut dp = SimDataplane::new();

        let err = update_worker(
            &mut state,
            &mut dp,
            &vf_flavor(),
            WkAction::Start,
            "fwd1",
            9,
            Some(WorkerType::Forward),
        )
        .unwrap_err();
        assert!(matches!(err, CmdError::CoreUnavailable(9)));

        start_worker(&mut state, &mut dp, "fwd1", 2);
        let err = update_worker(
            &mut state,
            &mut dp,
            &vf_flavor(),
            WkAction::Start,
            "fwd1",
            2,
            Some(WorkerType::Merge),
        )
        .unwrap_err();
        assert!(matches!(err, CmdError::NameInUse(_)));
    }

    #[test]
    fn test_stop_unknown_worker_is_noop() {
        let mut state = AgentState::new(&[2]);
        let mut dp = SimDataplane::new();
        update_worker(
            &mut state,
            &mut dp,
            &vf_flavor(),
            WkAction::Stop,
            "ghost",
            0,
            None,
        )
        .unwrap();
        assert!(state.change_core.iter().all(|flag| !flag));
    }

    #[test]
    fn test_stop_classifier_resets_aux_table() {
        let mut state = AgentState::new(&[2]);
        let mut dp = SimDataplane::new();
        update_worker(
            &mut state,
            &mut dp,
            &vf_flavor(),
            WkAction::Start,
            "cls1",
            2,
            Some(WorkerType::Classify),
        )
        .unwrap();
        update_worker(
            &mut state,
            &mut dp,
            &vf_flavor(),
            WkAction::Stop,
            "cls1",
            0,
            None,
        )
        .unwrap();
        assert_eq!(dp.classifier_resets, vec![WorkerId(0)]);
        assert!(state.workers[0].is_none());
        assert!(!state.change_worker[0]);
    }

    #[test]
    fn test_forwarder_limits_one_port_per_side() {
        let mut state = AgentState::new(&[2]);
        let mut dp = SimDataplane::new();
        start_worker(&mut state, &mut dp, "fwd1", 2);

        let phy0 = PortId::new(PortKind::Phy, 0);
        let phy1 = PortId::new(PortKind::Phy, 1);
        let phy2 = PortId::new(PortKind::Phy, 2);
        update_port(
            &mut state,
            WkAction::Add,
            phy0,
            PortDir::Rx,
            "fwd1",
            PortAbility::default(),
        )
        .unwrap();
        update_port(
            &mut state,
            WkAction::Add,
            phy1,
            PortDir::Tx,
            "fwd1",
            PortAbility::default(),
        )
        .unwrap();
        let err = update_port(
            &mut state,
            WkAction::Add,
            phy2,
            PortDir::Tx,
            "fwd1",
            PortAbility::default(),
        )
        .unwrap_err();
        assert!(matches!(err, CmdError::PortLimitExceeded(_)));
        assert_eq!(state.worker(WorkerId(0)).unwrap().tx_ports, vec![phy1]);
    }

    #[test]
    fn test_idempotent_attach_on_unlimited_side() {
        let mut state = AgentState::new(&[2]);
        let mut dp = SimDataplane::new();
        update_worker(
            &mut state,
            &mut dp,
            &vf_flavor(),
            WkAction::Start,
            "mrg1",
            2,
            Some(WorkerType::Merge),
        )
        .unwrap();

        let ring0 = PortId::new(PortKind::Ring, 0);
        update_port(
            &mut state,
            WkAction::Add,
            ring0,
            PortDir::Rx,
            "mrg1",
            PortAbility::default(),
        )
        .unwrap();
        update_port(
            &mut state,
            WkAction::Add,
            ring0,
            PortDir::Rx,
            "mrg1",
            PortAbility::default(),
        )
        .unwrap();
        assert_eq!(state.worker(WorkerId(0)).unwrap().rx_ports, vec![ring0]);
    }

    #[test]
    fn test_port_del_clears_matching_direction_abilities() {
        let mut state = AgentState::new(&[2]);
        let mut dp = SimDataplane::new();
        start_worker(&mut state, &mut dp, "fwd1", 2);

        let ring0 = PortId::new(PortKind::Ring, 0);
        let tagging = PortAbility {
            op: AbilityOp::AddVlan,
            dir: PortDir::Tx,
            vid: 100,
            pcp: 3,
        };
        update_port(&mut state, WkAction::Add, ring0, PortDir::Tx, "fwd1", tagging).unwrap();
        // A transform on the other direction survives the detach.
        let rx_strip = PortAbility {
            op: AbilityOp::DelVlan,
            dir: PortDir::Rx,
            vid: 0,
            pcp: 0,
        };
        update_port(&mut state, WkAction::Add, ring0, PortDir::Rx, "fwd1", rx_strip).unwrap();

        update_port(
            &mut state,
            WkAction::Del,
            ring0,
            PortDir::Tx,
            "fwd1",
            PortAbility::default(),
        )
        .unwrap();

        let port = state.ports.get(ring0).unwrap();
        assert!(port.vlan_ability(PortDir::Tx).is_none());
        assert_eq!(port.vlan_ability(PortDir::Rx), Some(&rx_strip));
        assert!(state.worker(WorkerId(0)).unwrap().tx_ports.is_empty());
        assert_eq!(state.worker(WorkerId(0)).unwrap().rx_ports, vec![ring0]);
    }

    #[test]
    fn test_classifier_add_del_cycle() {
        let mut state = AgentState::new(&[2]);
        let mut dp = SimDataplane::new();
        start_worker(&mut state, &mut dp, "fwd1", 2);
        let phy1 = PortId::new(PortKind::Phy, 1);
        update_port(
            &mut state,
            WkAction::Add,
            phy1,
            PortDir::Tx,
            "fwd1",
            PortAbility::default(),
        )
        .unwrap();

        update_classifier_table(&mut state, WkAction::Add, 100, "00:11:22:33:44:55", phy1)
            .unwrap();
        // A second add without a delete is rejected.
        let err =
            update_classifier_table(&mut state, WkAction::Add, 200, "00:11:22:33:44:66", phy1)
                .unwrap_err();
        assert!(matches!(err, CmdError::ClassifierSlotInUse(_)));

        // Delete with the wrong vid is rejected, the rule survives.
        let err =
            update_classifier_table(&mut state, WkAction::Del, 101, "00:11:22:33:44:55", phy1)
                .unwrap_err();
        assert!(matches!(err, CmdError::VlanMismatch(101)));
        assert_eq!(state.ports.get(phy1).unwrap().cls_attrs.vid, 100);

        update_classifier_table(&mut state, WkAction::Del, 100, "00:11:22:33:44:55", phy1)
            .unwrap();
        let attrs = &state.ports.get(phy1).unwrap().cls_attrs;
        assert_eq!(attrs.vid, VID_MAX);
        assert_eq!(attrs.mac, 0);
        assert!(attrs.mac_str.is_empty());
    }

    #[test]
    fn test_classifier_rejects_unbound_port() {
        let mut state = AgentState::new(&[2]);
        let err = update_classifier_table(
            &mut state,
            WkAction::Add,
            VID_MAX,
            "00:11:22:33:44:55",
            PortId::new(PortKind::Phy, 0),
        )
        .unwrap_err();
        assert!(matches!(err, CmdError::PortNotBound(_)));
    }
}
