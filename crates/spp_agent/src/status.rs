//! Status iterators feeding the `info` block of a response.
//!
//! The block is assembled by walking a static catalog of `(tag, emitter)`
//! pairs, each visiting part of the inventory and inserting its section into
//! the response tree. An emitter that contributes nothing (classifier table
//! on a non-vf process) simply leaves its tag out.

use serde_json::{Map, Value};
use tracing::warn;

use crate::config::AgentConfig;
use crate::flavor::WorkerFlavor;
use crate::model::{AgentState, CoreStatus};
use spp_protocol::{ClassifierEntry, CoreBlock, PortBlock, PortDir, PortId, PortKind, VlanBlock, VID_MAX};

/// Everything the emitters may look at.
pub struct StatusCtx<'a> {
    pub state: &'a AgentState,
    pub config: &'a AgentConfig,
    pub flavor: &'a WorkerFlavor,
}

type EmitFn = fn(&StatusCtx<'_>, &str, &mut Map<String, Value>) -> Result<(), serde_json::Error>;

/// Tag/emitter catalog, iterated in order to build the `info` block.
const INFO_CATALOG: &[(&str, EmitFn)] = &[
    ("client-id", emit_client_id),
    ("phy", emit_port_indices),
    ("vhost", emit_port_indices),
    ("ring", emit_port_indices),
    ("master-lcore", emit_master_lcore),
    ("core", emit_cores),
    ("classifier_table", emit_classifier_table),
];

/// Build the `info` block for a status response.
pub fn build_info(ctx: &StatusCtx<'_>) -> Result<Value, serde_json::Error> {
    let mut info = Map::new();
    for (tag, emit) in INFO_CATALOG {
        emit(ctx, tag, &mut info)?;
    }
    Ok(Value::Object(info))
}

fn emit_client_id(
    ctx: &StatusCtx<'_>,
    tag: &str,
    info: &mut Map<String, Value>,
) -> Result<(), serde_json::Error> {
    info.insert(tag.to_string(), Value::from(ctx.config.client_id));
    Ok(())
}

/// Flushed port indices of one kind; the tag doubles as the kind name.
fn emit_port_indices(
    ctx: &StatusCtx<'_>,
    tag: &str,
    info: &mut Map<String, Value>,
) -> Result<(), serde_json::Error> {
    let kind = match tag.parse::<PortKind>() {
        Ok(kind) => kind,
        Err(_) => return Ok(()),
    };
    let indices = ctx.state.ports.flushed_indices(kind);
    info.insert(tag.to_string(), serde_json::to_value(indices)?);
    Ok(())
}

fn emit_master_lcore(
    ctx: &StatusCtx<'_>,
    tag: &str,
    info: &mut Map<String, Value>,
) -> Result<(), serde_json::Error> {
    info.insert(tag.to_string(), Value::from(ctx.config.master_lcore));
    Ok(())
}

fn emit_cores(
    ctx: &StatusCtx<'_>,
    tag: &str,
    info: &mut Map<String, Value>,
) -> Result<(), serde_json::Error> {
    let mut blocks = Vec::new();
    for (lcore, core) in ctx.state.cores.iter().enumerate() {
        let lcore = lcore as u32;
        if lcore == ctx.config.master_lcore || core.status == CoreStatus::Unuse {
            continue;
        }
        let assigned = core.committed();
        if assigned.is_empty() {
            blocks.push(CoreBlock::unused(lcore));
            continue;
        }
        for &wid in assigned {
            let Some(worker) = ctx.state.worker(wid) else {
                warn!("Core {lcore} references missing worker {}", wid.as_usize());
                continue;
            };
            blocks.push(CoreBlock {
                core: lcore,
                name: Some(worker.name.clone()),
                wk_type: worker.wk_type.as_str(),
                rx_port: Some(port_blocks(ctx.state, &worker.rx_ports, PortDir::Rx)),
                tx_port: Some(port_blocks(ctx.state, &worker.tx_ports, PortDir::Tx)),
            });
        }
    }
    info.insert(tag.to_string(), serde_json::to_value(blocks)?);
    Ok(())
}

fn port_blocks(state: &AgentState, ports: &[PortId], dir: PortDir) -> Vec<PortBlock> {
    ports
        .iter()
        .map(|&id| {
            let vlan = state
                .ports
                .get(id)
                .and_then(|record| record.vlan_ability(dir))
                .map(VlanBlock::from)
                .unwrap_or_else(VlanBlock::none);
            PortBlock {
                port: id.to_string(),
                vlan,
            }
        })
        .collect()
}

fn emit_classifier_table(
    ctx: &StatusCtx<'_>,
    tag: &str,
    info: &mut Map<String, Value>,
) -> Result<(), serde_json::Error> {
    if !ctx.flavor.supports_classifier_table() {
        return Ok(());
    }
    let mut entries = Vec::new();
    for (id, record) in ctx.state.ports.iter() {
        let attrs = &record.cls_attrs;
        if attrs.mac == 0 {
            continue;
        }
        let (cls_type, value) = if attrs.vid == VID_MAX {
            ("mac", attrs.mac_str.clone())
        } else {
            ("vlan", format!("{}/{}", attrs.vid, attrs.mac_str))
        };
        entries.push(ClassifierEntry {
            cls_type,
            value,
            port: id.to_string(),
        });
    }
    info.insert(tag.to_string(), serde_json::to_value(entries)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use spp_protocol::ProcKind;

    fn ctx_parts() -> (AgentState, AgentConfig, WorkerFlavor) {
        let config = AgentConfig {
            ctl_addr: "127.0.0.1:7010".to_string(),
            client_id: 4,
            proc_kind: ProcKind::Vf,
            master_lcore: 0,
            worker_lcores: vec![2, 3],
        };
        (AgentState::new(&[2, 3]), config, WorkerFlavor::new(ProcKind::Vf))
    }

    #[test]
    fn test_empty_status_shape() {
        let (state, config, flavor) = ctx_parts();
        let info = build_info(&StatusCtx {
            state: &state,
            config: &config,
            flavor: &flavor,
        })
        .unwrap();

        assert_eq!(info["client-id"], 4);
        assert_eq!(info["master-lcore"], 0);
        assert_eq!(info["phy"], serde_json::json!([]));
        // Both worker lcores are reported as in-use-but-empty.
        assert_eq!(
            info["core"],
            serde_json::json!([
                {"core": 2, "type": "unuse"},
                {"core": 3, "type": "unuse"}
            ])
        );
        assert_eq!(info["classifier_table"], serde_json::json!([]));
    }

    #[test]
    fn test_mirror_flavor_omits_classifier_table() {
        let (state, mut config, _) = ctx_parts();
        config.proc_kind = ProcKind::Mirror;
        let flavor = WorkerFlavor::new(ProcKind::Mirror);
        let info = build_info(&StatusCtx {
            state: &state,
            config: &config,
            flavor: &flavor,
        })
        .unwrap();
        assert!(info.get("classifier_table").is_none());
    }
}
