//! The agent's outer loop: one connect-or-receive attempt per call.

use tracing::error;

use crate::config::AgentConfig;
use crate::conn::CtlConnection;
use crate::dataplane::Dataplane;
use crate::runner::{CmdRunner, LoopSignal};

/// Control-plane agent: the command runner plus its controller connection.
pub struct Agent<D: Dataplane> {
    runner: CmdRunner<D>,
    conn: CtlConnection,
}

impl<D: Dataplane> Agent<D> {
    pub fn new(config: AgentConfig, dataplane: D) -> Self {
        let conn = CtlConnection::new(config.ctl_addr.clone());
        Self {
            runner: CmdRunner::new(config, dataplane),
            conn,
        }
    }

    /// One non-blocking connect-or-receive attempt. Transport errors are
    /// logged and swallowed so the outer loop simply retries.
    pub fn run_once(&mut self) -> LoopSignal {
        let Some(request) = self.conn.poll_request() else {
            return LoopSignal::Continue;
        };

        let (response, signal) = self.runner.exec_cmds(&request);
        match serde_json::to_string(&response) {
            Ok(text) => {
                if let Err(err) = self.conn.send(&text) {
                    error!("Failed to send command result response: {err}");
                }
            }
            // Abandon the response; the loop goes on.
            Err(err) => error!("Failed to serialize response: {err}"),
        }
        signal
    }
}
