//! Soft Patch Panel secondary agent.
//!
//! Usage:
//!     spp-agent --ctl-addr 127.0.0.1:7010 --client-id 1 --process-type vf

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use tracing::info;

use spp_agent::{Agent, AgentConfig, LoopSignal, SimDataplane};
use spp_logging::LogConfig;
use spp_protocol::ProcKind;

#[derive(Parser, Debug)]
#[command(name = "spp-agent", about = "Control-plane agent for a Soft Patch Panel secondary")]
struct Args {
    /// Controller address
    #[arg(long, default_value = "127.0.0.1:7010")]
    ctl_addr: String,

    /// Client id reported to the controller
    #[arg(long, default_value_t = 1)]
    client_id: i32,

    /// Process kind: vf, mirror or none
    #[arg(long, default_value = "vf")]
    process_type: ProcKind,

    /// Lcore running the control plane
    #[arg(long, default_value_t = 0)]
    master_lcore: u32,

    /// Lcores available for workers
    #[arg(long, value_delimiter = ',', default_value = "1,2,3,4")]
    lcores: Vec<u32>,

    /// Append logs to this file in addition to stderr
    #[arg(long)]
    log_file: Option<PathBuf>,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    spp_logging::init_logging(LogConfig {
        verbose: args.verbose,
        log_file: args.log_file.as_deref(),
    })?;

    info!("Starting spp agent");
    info!("  Controller: {}", args.ctl_addr);
    info!("  Client id: {}", args.client_id);
    info!("  Process type: {}", args.process_type);

    let config = AgentConfig {
        ctl_addr: args.ctl_addr,
        client_id: args.client_id,
        proc_kind: args.process_type,
        master_lcore: args.master_lcore,
        worker_lcores: args.lcores,
    };

    let mut agent = Agent::new(config, SimDataplane::new());
    loop {
        match agent.run_once() {
            LoopSignal::Terminate => break,
            LoopSignal::Continue => std::thread::sleep(Duration::from_millis(10)),
        }
    }

    info!("spp agent stopped");
    Ok(())
}
