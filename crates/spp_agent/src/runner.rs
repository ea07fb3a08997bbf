//! Request dispatcher: executes parsed batches and composes responses.

use tracing::{debug, error, info};

use crate::commands::{update_classifier_table, update_port, update_worker, CmdError};
use crate::config::AgentConfig;
use crate::dataplane::Dataplane;
use crate::flavor::WorkerFlavor;
use crate::flush::flush;
use crate::model::AgentState;
use crate::status::{build_info, StatusCtx};
use spp_protocol::{
    parse_request, CmdRequest, CmdResult, Command, ParseError, Response,
};

/// What the outer loop should do after a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopSignal {
    Continue,
    Terminate,
}

/// Executes command batches against the inventory. Owns no I/O; the outer
/// [`Agent`](crate::agent::Agent) feeds it request strings.
pub struct CmdRunner<D: Dataplane> {
    state: AgentState,
    dataplane: D,
    config: AgentConfig,
    flavor: WorkerFlavor,
}

impl<D: Dataplane> CmdRunner<D> {
    pub fn new(config: AgentConfig, dataplane: D) -> Self {
        let flavor = WorkerFlavor::new(config.proc_kind);
        let state = AgentState::new(&config.worker_lcores);
        Self {
            state,
            dataplane,
            config,
            flavor,
        }
    }

    pub fn state(&self) -> &AgentState {
        &self.state
    }

    pub fn dataplane(&self) -> &D {
        &self.dataplane
    }

    pub fn dataplane_mut(&mut self) -> &mut D {
        &mut self.dataplane
    }

    /// Execute one batch and build its response.
    pub fn exec_cmds(&mut self, request_str: &str) -> (Response, LoopSignal) {
        debug!("Parse cmds, {request_str}");
        let request = match parse_request(request_str) {
            Ok(request) => request,
            Err(err) => {
                debug!("Failed to parse cmds: {err}");
                return (parse_error_response(&err), LoopSignal::Continue);
            }
        };

        debug!("Num of cmds is {}", request.nof_cmds());

        let mut results = Vec::with_capacity(request.nof_cmds());
        for (index, command) in request.commands.iter().enumerate() {
            match self.exec_one_cmd(command) {
                Ok(()) => results.push(CmdResult::success()),
                Err(err) => {
                    error!("Command {index} failed: {err}");
                    results.push(CmdResult::failure("error occur"));
                    // Remaining commands are not executed.
                    results.extend(
                        (index + 1..request.nof_cmds()).map(|_| CmdResult::invalid()),
                    );
                    break;
                }
            }
        }

        if request.request_exit {
            if let Some(first) = results.first_mut() {
                *first = CmdResult::success();
            }
            info!("Process is terminated with exit cmd");
            return (self.build_response(&request, results), LoopSignal::Terminate);
        }

        (self.build_response(&request, results), LoopSignal::Continue)
    }

    fn exec_one_cmd(&mut self, command: &Command) -> Result<(), CmdError> {
        info!("Exec `{}` cmd", command.kind_str());
        match command {
            Command::ClassifierTable(spec) => {
                update_classifier_table(
                    &mut self.state,
                    spec.action,
                    spec.vid,
                    &spec.mac,
                    spec.port,
                )?;
                info!("Exec flush");
                flush(&mut self.state, &mut self.dataplane)
            }
            Command::Worker(spec) => {
                update_worker(
                    &mut self.state,
                    &mut self.dataplane,
                    &self.flavor,
                    spec.action,
                    &spec.name,
                    spec.lcore_id,
                    spec.wk_type,
                )?;
                info!("Exec flush");
                flush(&mut self.state, &mut self.dataplane)
            }
            Command::Port(spec) => {
                update_port(
                    &mut self.state,
                    spec.action,
                    spec.port,
                    spec.dir,
                    &spec.name,
                    spec.ability,
                )?;
                info!("Exec flush");
                flush(&mut self.state, &mut self.dataplane)
            }
            // Status-only commands mutate nothing.
            Command::ClientId | Command::Status | Command::Exit => Ok(()),
        }
    }

    fn build_response(&self, request: &CmdRequest, results: Vec<CmdResult>) -> Response {
        let mut response = Response::new(results);
        if request.request_client_id {
            response.client_id = Some(self.config.client_id);
            response.process_type = Some(self.config.proc_kind.as_str());
        }
        if request.request_status {
            let ctx = StatusCtx {
                state: &self.state,
                config: &self.config,
                flavor: &self.flavor,
            };
            match build_info(&ctx) {
                Ok(info) => response.info = Some(info),
                Err(err) => error!("Failed to make status response: {err}"),
            }
        }
        response
    }
}

/// Results layout for a batch that failed to parse: every command before the
/// offending one succeeded, the offending one fails with the parser's
/// message, the rest are invalid.
fn parse_error_response(err: &ParseError) -> Response {
    let len = err.total_cmds.max(err.valid_cmds + 1);
    let mut results = Vec::with_capacity(len);
    for index in 0..len {
        if index < err.valid_cmds {
            results.push(CmdResult::success());
        } else if index == err.valid_cmds {
            results.push(CmdResult::failure(err.message()));
        } else {
            results.push(CmdResult::invalid());
        }
    }
    Response::new(results)
}

#[cfg(test)]
mod tests {
    use super::*;
    use spp_protocol::{ParseErrorCode, ResultCode};

    #[test]
    fn test_parse_error_results_layout() {
        let err = ParseError {
            code: ParseErrorCode::InvalidValue,
            details: String::new(),
            msg: "core -1 out of range".to_string(),
            valid_cmds: 1,
            total_cmds: 3,
        };
        let response = parse_error_response(&err);
        let codes: Vec<_> = response
            .results
            .iter()
            .map(|result| result.result)
            .collect();
        assert_eq!(
            codes,
            vec![ResultCode::Success, ResultCode::Failure, ResultCode::Invalid]
        );
        assert_eq!(
            response.results[1].error_details.as_ref().unwrap().message,
            "Invalid value (core -1 out of range)"
        );
    }

    #[test]
    fn test_wrong_format_yields_single_failure() {
        let err = ParseError {
            code: ParseErrorCode::WrongFormat,
            details: String::new(),
            msg: String::new(),
            valid_cmds: 0,
            total_cmds: 0,
        };
        let response = parse_error_response(&err);
        assert_eq!(response.results.len(), 1);
        assert_eq!(response.results[0].result, ResultCode::Failure);
    }
}
