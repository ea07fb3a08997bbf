//! Agent configuration (plain data).

use spp_protocol::ProcKind;

/// Startup configuration assembled by the binary and passed into the runner.
#[derive(Debug, Clone)]
pub struct AgentConfig {
    /// Controller address, `ip:port`.
    pub ctl_addr: String,
    /// Client id reported back on `_get_client_id`.
    pub client_id: i32,
    /// Secondary process kind, selects the worker flavor.
    pub proc_kind: ProcKind,
    /// Lcore running the control plane.
    pub master_lcore: u32,
    /// Lcores available for workers.
    pub worker_lcores: Vec<u32>,
}
