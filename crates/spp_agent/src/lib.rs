//! Control-plane agent of a Soft Patch Panel secondary process.
//!
//! An external controller drives the process over a TCP session, sending
//! batches of commands that assign worker roles to lcores, attach ports to
//! workers and program classifier rules. Edits land in a staging view and
//! become dataplane-visible only at the flush that follows each successful
//! command; status queries describe the committed topology.

pub mod agent;
pub mod commands;
pub mod config;
pub mod conn;
pub mod dataplane;
pub mod flavor;
pub mod flush;
pub mod model;
pub mod runner;
pub mod status;

pub use agent::Agent;
pub use commands::CmdError;
pub use config::AgentConfig;
pub use dataplane::{Dataplane, DataplaneError, SimDataplane};
pub use flavor::WorkerFlavor;
pub use model::AgentState;
pub use runner::{CmdRunner, LoopSignal};
