//! Control protocol between spp-ctl and a secondary worker process.
//!
//! The controller drives the agent with newline-delimited JSON batches:
//!
//! ```text
//! {"commands": [
//!     {"command": "component", "action": "start",
//!      "name": "fwd1", "core": 2, "type": "forward"},
//!     {"command": "port", "action": "add",
//!      "port": "phy:0", "dir": "rx", "name": "fwd1"}
//! ]}
//! ```
//!
//! This crate owns the shared vocabulary (port identities, worker types,
//! actions, abilities), the parsed request tree, the request parser with its
//! error taxonomy, and the serializable response types. Executing commands is
//! the agent's job.

pub mod parse;
pub mod request;
pub mod response;
pub mod types;

pub use parse::{parse_request, ParseError, ParseErrorCode};
pub use request::{ClsTableSpec, ClsType, CmdRequest, Command, PortSpec, WorkerSpec};
pub use response::{
    ClassifierEntry, CmdResult, CoreBlock, ErrorDetails, PortBlock, Response, ResultCode,
    VlanBlock,
};
pub use types::{
    mac_str_to_u64, AbilityOp, PortAbility, PortDir, PortId, PortKind, ProcKind, ProtocolError,
    WkAction, WorkerType, NAME_MAX, VID_MAX,
};
