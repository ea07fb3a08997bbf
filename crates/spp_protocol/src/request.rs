//! Parsed request tree handed from the parser to the command runner.

use crate::types::{PortAbility, PortDir, PortId, WkAction, WorkerType};

/// One parsed controller batch.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CmdRequest {
    pub commands: Vec<Command>,
    /// Batch contained a `_get_client_id` command.
    pub request_client_id: bool,
    /// Batch contained a `status` command.
    pub request_status: bool,
    /// Batch contained an `exit` command.
    pub request_exit: bool,
}

impl CmdRequest {
    pub fn nof_cmds(&self) -> usize {
        self.commands.len()
    }
}

/// One command inside a batch.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    ClassifierTable(ClsTableSpec),
    Worker(WorkerSpec),
    Port(PortSpec),
    ClientId,
    Status,
    Exit,
}

impl Command {
    /// Wire name of the command, for logging.
    pub fn kind_str(&self) -> &'static str {
        match self {
            Command::ClassifierTable(_) => "classifier_table",
            Command::Worker(_) => "component",
            Command::Port(_) => "port",
            Command::ClientId => "_get_client_id",
            Command::Status => "status",
            Command::Exit => "exit",
        }
    }
}

/// Which key form a classifier rule uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClsType {
    Mac,
    Vlan,
}

impl ClsType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ClsType::Mac => "mac",
            ClsType::Vlan => "vlan",
        }
    }
}

/// Parameters of a `classifier_table` command.
#[derive(Debug, Clone, PartialEq)]
pub struct ClsTableSpec {
    pub action: WkAction,
    pub cls_type: ClsType,
    pub vid: u16,
    pub mac: String,
    pub port: PortId,
}

/// Parameters of a `component` command. `wk_type` is present only for
/// `start`; `lcore_id` is ignored on `stop`.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkerSpec {
    pub action: WkAction,
    pub name: String,
    pub lcore_id: u32,
    pub wk_type: Option<WorkerType>,
}

/// Parameters of a `port` command.
#[derive(Debug, Clone, PartialEq)]
pub struct PortSpec {
    pub action: WkAction,
    pub port: PortId,
    pub dir: PortDir,
    pub name: String,
    pub ability: PortAbility,
}
