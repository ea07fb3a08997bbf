//! Commit step: publish staged edits to the dataplane-visible state.
//!
//! The only operation that may affect the dataplane. Individual `update_*`
//! edits are invisible until this runs.

use tracing::{debug, error};

use crate::commands::CmdError;
use crate::dataplane::Dataplane;
use crate::model::{AgentState, WorkerId};

/// Publish staged edits in three ordered steps: ports, core tables, worker
/// notifications. The rollback snapshot is refreshed only when all steps
/// succeed; on failure the inventory is restored to the previous snapshot.
pub fn flush(state: &mut AgentState, dataplane: &mut dyn Dataplane) -> Result<(), CmdError> {
    if let Err(err) = publish_ports(state, dataplane) {
        error!("Failed to flush ports: {err}");
        state.rollback();
        return Err(err);
    }

    publish_cores(state);

    if let Err(err) = publish_workers(state, dataplane) {
        error!("Failed to flush workers: {err}");
        state.rollback();
        return Err(err);
    }

    state.snapshot();
    Ok(())
}

/// Open or reconfigure every bound port that has no dataplane handle yet.
fn publish_ports(state: &mut AgentState, dataplane: &mut dyn Dataplane) -> Result<(), CmdError> {
    for (id, record) in state.ports.iter_mut() {
        if record.kind.is_some() && record.ethdev_id.is_none() {
            let ethdev_id = dataplane.ensure_port(id.kind, id.index)?;
            debug!("Port {id} flushed as ethdev {ethdev_id}");
            record.ethdev_id = Some(ethdev_id);
        }
    }
    Ok(())
}

/// Swap the published side of every changed core table.
fn publish_cores(state: &mut AgentState) {
    for (lcore, core) in state.cores.iter_mut().enumerate() {
        if state.change_core[lcore] {
            core.publish();
            state.change_core[lcore] = false;
        }
    }
}

/// Notify every changed worker so it refreshes its port handles.
fn publish_workers(
    state: &mut AgentState,
    dataplane: &mut dyn Dataplane,
) -> Result<(), CmdError> {
    for wid in 0..state.change_worker.len() {
        if state.change_worker[wid] {
            dataplane.refresh_worker(WorkerId(wid))?;
            state.change_worker[wid] = false;
        }
    }
    Ok(())
}
