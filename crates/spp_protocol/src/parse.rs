//! Default request parser: newline-framed JSON batches into [`CmdRequest`].
//!
//! The agent treats the parser as a collaborator behind this function's
//! contract: either a fully parsed batch, or a [`ParseError`] carrying the
//! error taxonomy plus the index of the command that failed so the runner can
//! lay out the results array around it.

use serde_json::{Map, Value};
use thiserror::Error;

use crate::request::{ClsTableSpec, ClsType, CmdRequest, Command, PortSpec, WorkerSpec};
use crate::types::{
    AbilityOp, PortAbility, PortDir, PortId, WkAction, WorkerType, NAME_MAX, PCP_MAX, VID_MAX,
};

/// Why a request failed to parse.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseErrorCode {
    /// The envelope itself is not a command batch.
    WrongFormat,
    /// Unrecognized `command` discriminator.
    UnknownCmd,
    /// A required parameter is missing.
    NoParam,
    /// A parameter has the wrong JSON type.
    InvalidType,
    /// A parameter is out of range or unparseable.
    InvalidValue,
    /// Anything the taxonomy does not cover.
    Unexpected,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("{}", self.message())]
pub struct ParseError {
    pub code: ParseErrorCode,
    /// Offending token for `UnknownCmd`.
    pub details: String,
    /// Parameter-level explanation for the remaining codes.
    pub msg: String,
    /// Commands parsed successfully before the failing one.
    pub valid_cmds: usize,
    /// Commands in the batch, when the envelope itself parsed; 0 otherwise.
    pub total_cmds: usize,
}

impl ParseError {
    fn envelope(code: ParseErrorCode) -> Self {
        Self {
            code,
            details: String::new(),
            msg: String::new(),
            valid_cmds: 0,
            total_cmds: 0,
        }
    }

    /// Human-readable message reported to the controller.
    pub fn message(&self) -> String {
        match self.code {
            ParseErrorCode::WrongFormat => "Wrong message format".to_string(),
            ParseErrorCode::UnknownCmd => format!("Unknown command({})", self.details),
            ParseErrorCode::NoParam => {
                format!("No or insufficient number of params ({})", self.msg)
            }
            ParseErrorCode::InvalidType => format!("Invalid value type ({})", self.msg),
            ParseErrorCode::InvalidValue => format!("Invalid value ({})", self.msg),
            ParseErrorCode::Unexpected => "Failed to parse with unexpected reason".to_string(),
        }
    }
}

/// A classified failure before batch indexes are known.
struct RawError {
    code: ParseErrorCode,
    details: String,
    msg: String,
}

impl RawError {
    fn unknown_cmd(details: impl Into<String>) -> Self {
        Self {
            code: ParseErrorCode::UnknownCmd,
            details: details.into(),
            msg: String::new(),
        }
    }

    fn no_param(msg: impl Into<String>) -> Self {
        Self {
            code: ParseErrorCode::NoParam,
            details: String::new(),
            msg: msg.into(),
        }
    }

    fn invalid_type(msg: impl Into<String>) -> Self {
        Self {
            code: ParseErrorCode::InvalidType,
            details: String::new(),
            msg: msg.into(),
        }
    }

    fn invalid_value(msg: impl Into<String>) -> Self {
        Self {
            code: ParseErrorCode::InvalidValue,
            details: String::new(),
            msg: msg.into(),
        }
    }

    fn at(self, valid_cmds: usize, total_cmds: usize) -> ParseError {
        ParseError {
            code: self.code,
            details: self.details,
            msg: self.msg,
            valid_cmds,
            total_cmds,
        }
    }
}

/// Parse one controller batch.
pub fn parse_request(text: &str) -> Result<CmdRequest, ParseError> {
    let root: Value = match serde_json::from_str(text) {
        Ok(value) => value,
        Err(err) if err.is_io() => return Err(ParseError::envelope(ParseErrorCode::Unexpected)),
        Err(_) => return Err(ParseError::envelope(ParseErrorCode::WrongFormat)),
    };

    let commands = root
        .as_object()
        .and_then(|obj| obj.get("commands"))
        .and_then(Value::as_array)
        .ok_or_else(|| ParseError::envelope(ParseErrorCode::WrongFormat))?;

    let total_cmds = commands.len();
    let mut request = CmdRequest::default();
    for (index, value) in commands.iter().enumerate() {
        let command = parse_command(value).map_err(|raw| raw.at(index, total_cmds))?;
        match command {
            Command::ClientId => request.request_client_id = true,
            Command::Status => request.request_status = true,
            Command::Exit => request.request_exit = true,
            _ => {}
        }
        request.commands.push(command);
    }
    Ok(request)
}

fn parse_command(value: &Value) -> Result<Command, RawError> {
    let obj = value
        .as_object()
        .ok_or_else(|| RawError::invalid_type("command must be an object"))?;
    match str_field(obj, "command")? {
        "classifier_table" => parse_cls_table(obj),
        "component" => parse_worker(obj),
        "port" => parse_port(obj),
        "_get_client_id" => Ok(Command::ClientId),
        "status" => Ok(Command::Status),
        "exit" => Ok(Command::Exit),
        other => Err(RawError::unknown_cmd(other)),
    }
}

fn parse_cls_table(obj: &Map<String, Value>) -> Result<Command, RawError> {
    let action = parse_action(obj, &[WkAction::Add, WkAction::Del])?;
    let cls_type = match str_field(obj, "type")? {
        "mac" => ClsType::Mac,
        "vlan" => ClsType::Vlan,
        other => {
            return Err(RawError::invalid_value(format!(
                "unknown classifier type `{other}`"
            )))
        }
    };
    // MAC-only rules carry the sentinel VLAN ID, matching how the classifier
    // table stores them.
    let vid = match cls_type {
        ClsType::Vlan => vid_field(obj, "vid", true)?,
        ClsType::Mac => VID_MAX,
    };
    let mac = str_field(obj, "mac")?.to_string();
    let port = port_field(obj, "port")?;
    Ok(Command::ClassifierTable(ClsTableSpec {
        action,
        cls_type,
        vid,
        mac,
        port,
    }))
}

fn parse_worker(obj: &Map<String, Value>) -> Result<Command, RawError> {
    let action = parse_action(obj, &[WkAction::Start, WkAction::Stop])?;
    let name = name_field(obj)?;
    match action {
        WkAction::Start => {
            let core = uint_field(obj, "core")?;
            let lcore_id = u32::try_from(core)
                .map_err(|_| RawError::invalid_value(format!("core {core} out of range")))?;
            let wk_type = str_field(obj, "type")?
                .parse::<WorkerType>()
                .map_err(|err| RawError::invalid_value(err.to_string()))?;
            Ok(Command::Worker(WorkerSpec {
                action,
                name,
                lcore_id,
                wk_type: Some(wk_type),
            }))
        }
        _ => Ok(Command::Worker(WorkerSpec {
            action,
            name,
            lcore_id: 0,
            wk_type: None,
        })),
    }
}

fn parse_port(obj: &Map<String, Value>) -> Result<Command, RawError> {
    let action = parse_action(obj, &[WkAction::Add, WkAction::Del])?;
    let port = port_field(obj, "port")?;
    let dir = match str_field(obj, "dir")? {
        "rx" => PortDir::Rx,
        "tx" => PortDir::Tx,
        other => return Err(RawError::invalid_value(format!("unknown direction `{other}`"))),
    };
    let name = name_field(obj)?;
    let ability = match obj.get("vlan") {
        None => PortAbility {
            dir,
            ..PortAbility::default()
        },
        Some(Value::Object(vlan)) => parse_vlan_ability(vlan, dir)?,
        Some(_) => return Err(RawError::invalid_type("vlan must be an object")),
    };
    Ok(Command::Port(PortSpec {
        action,
        port,
        dir,
        name,
        ability,
    }))
}

fn parse_vlan_ability(obj: &Map<String, Value>, dir: PortDir) -> Result<PortAbility, RawError> {
    let op = match str_field(obj, "operation")? {
        "none" => AbilityOp::None,
        "add" => AbilityOp::AddVlan,
        "del" => AbilityOp::DelVlan,
        other => {
            return Err(RawError::invalid_value(format!(
                "unknown vlan operation `{other}`"
            )))
        }
    };
    // Tagging needs the full (vid, pcp) pair; stripping does not.
    let vid = vid_field(obj, "id", op == AbilityOp::AddVlan)?;
    let pcp = match obj.get("pcp") {
        None if op == AbilityOp::AddVlan => return Err(RawError::no_param("pcp")),
        None => 0,
        Some(value) => {
            let pcp = value
                .as_u64()
                .ok_or_else(|| RawError::invalid_type("pcp must be an unsigned integer"))?;
            if pcp > u64::from(PCP_MAX) {
                return Err(RawError::invalid_value(format!("pcp {pcp} out of range")));
            }
            pcp as u8
        }
    };
    Ok(PortAbility { op, dir, vid, pcp })
}

fn parse_action(obj: &Map<String, Value>, allowed: &[WkAction]) -> Result<WkAction, RawError> {
    let action = str_field(obj, "action")?;
    let parsed = match action {
        "start" => WkAction::Start,
        "stop" => WkAction::Stop,
        "add" => WkAction::Add,
        "del" => WkAction::Del,
        other => return Err(RawError::invalid_value(format!("unknown action `{other}`"))),
    };
    if !allowed.contains(&parsed) {
        return Err(RawError::invalid_value(format!(
            "action `{action}` not applicable here"
        )));
    }
    Ok(parsed)
}

fn str_field<'a>(obj: &'a Map<String, Value>, name: &str) -> Result<&'a str, RawError> {
    match obj.get(name) {
        None => Err(RawError::no_param(name)),
        Some(Value::String(s)) => Ok(s),
        Some(_) => Err(RawError::invalid_type(format!("{name} must be a string"))),
    }
}

fn uint_field(obj: &Map<String, Value>, name: &str) -> Result<u64, RawError> {
    match obj.get(name) {
        None => Err(RawError::no_param(name)),
        Some(value) => value
            .as_u64()
            .ok_or_else(|| RawError::invalid_type(format!("{name} must be an unsigned integer"))),
    }
}

fn vid_field(obj: &Map<String, Value>, name: &str, required: bool) -> Result<u16, RawError> {
    let vid = match obj.get(name) {
        None if required => return Err(RawError::no_param(name)),
        None => return Ok(0),
        Some(value) => value
            .as_u64()
            .ok_or_else(|| RawError::invalid_type(format!("{name} must be an unsigned integer")))?,
    };
    if vid > u64::from(VID_MAX) {
        return Err(RawError::invalid_value(format!("VLAN ID {vid} out of range")));
    }
    Ok(vid as u16)
}

fn name_field(obj: &Map<String, Value>) -> Result<String, RawError> {
    let name = str_field(obj, "name")?;
    if name.is_empty() {
        return Err(RawError::invalid_value("name must not be empty"));
    }
    if name.len() > NAME_MAX {
        return Err(RawError::invalid_value(format!("name `{name}` is too long")));
    }
    Ok(name.to_string())
}

fn port_field(obj: &Map<String, Value>, name: &str) -> Result<PortId, RawError> {
    str_field(obj, name)?
        .parse::<PortId>()
        .map_err(|err| RawError::invalid_value(err.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PortKind;

    #[test]
    fn test_parse_component_start() {
        let req = parse_request(
            r#"{"commands":[{"command":"component","action":"start",
                "name":"fwd1","core":2,"type":"forward"}]}"#,
        )
        .unwrap();
        assert_eq!(req.nof_cmds(), 1);
        match &req.commands[0] {
            Command::Worker(spec) => {
                assert_eq!(spec.action, WkAction::Start);
                assert_eq!(spec.name, "fwd1");
                assert_eq!(spec.lcore_id, 2);
                assert_eq!(spec.wk_type, Some(WorkerType::Forward));
            }
            other => panic!("wrong command: {other:?}"),
        }
    }

    #[test]
    fn test_parse_port_with_vlan() {
        let req = parse_request(
            r#"{"commands":[{"command":"port","action":"add","port":"ring:1",
                "dir":"tx","name":"fwd1",
                "vlan":{"operation":"add","id":100,"pcp":3}}]}"#,
        )
        .unwrap();
        match &req.commands[0] {
            Command::Port(spec) => {
                assert_eq!(spec.port, PortId::new(PortKind::Ring, 1));
                assert_eq!(spec.dir, PortDir::Tx);
                assert_eq!(spec.ability.op, AbilityOp::AddVlan);
                assert_eq!(spec.ability.dir, PortDir::Tx);
                assert_eq!(spec.ability.vid, 100);
                assert_eq!(spec.ability.pcp, 3);
            }
            other => panic!("wrong command: {other:?}"),
        }
    }

    #[test]
    fn test_parse_classifier_vlan_requires_vid() {
        let err = parse_request(
            r#"{"commands":[{"command":"classifier_table","action":"add",
                "type":"vlan","mac":"00:11:22:33:44:55","port":"phy:1"}]}"#,
        )
        .unwrap_err();
        assert_eq!(err.code, ParseErrorCode::NoParam);
        assert_eq!(err.message(), "No or insufficient number of params (vid)");
    }

    #[test]
    fn test_parse_request_flags() {
        let req = parse_request(
            r#"{"commands":[{"command":"_get_client_id"},{"command":"status"}]}"#,
        )
        .unwrap();
        assert!(req.request_client_id);
        assert!(req.request_status);
        assert!(!req.request_exit);
        assert_eq!(req.nof_cmds(), 2);

        let req = parse_request(r#"{"commands":[{"command":"exit"}]}"#).unwrap();
        assert!(req.request_exit);
    }

    #[test]
    fn test_wrong_format_envelope() {
        for text in ["not json at all", "[1,2]", "{}", r#"{"commands":3}"#] {
            let err = parse_request(text).unwrap_err();
            assert_eq!(err.code, ParseErrorCode::WrongFormat, "for `{text}`");
            assert_eq!(err.total_cmds, 0);
            assert_eq!(err.message(), "Wrong message format");
        }
    }

    #[test]
    fn test_unknown_command_reports_name() {
        let err =
            parse_request(r#"{"commands":[{"command":"flush"}]}"#).unwrap_err();
        assert_eq!(err.code, ParseErrorCode::UnknownCmd);
        assert_eq!(err.message(), "Unknown command(flush)");
    }

    #[test]
    fn test_error_indexes_mid_batch() {
        let err = parse_request(
            r#"{"commands":[
                {"command":"status"},
                {"command":"component","action":"start","name":"x","core":"two","type":"forward"},
                {"command":"status"}]}"#,
        )
        .unwrap_err();
        assert_eq!(err.code, ParseErrorCode::InvalidType);
        assert_eq!(err.valid_cmds, 1);
        assert_eq!(err.total_cmds, 3);
    }

    #[test]
    fn test_invalid_values() {
        let cases = [
            (
                r#"{"commands":[{"command":"component","action":"add","name":"x"}]}"#,
                "Invalid value (action `add` not applicable here)",
            ),
            (
                r#"{"commands":[{"command":"port","action":"add","port":"nic:0","dir":"rx","name":"x"}]}"#,
                "Invalid value (invalid port `nic:0`, expected `<phy|vhost|ring>:<index>`)",
            ),
            (
                r#"{"commands":[{"command":"classifier_table","action":"add","type":"vlan","vid":4096,"mac":"00:11:22:33:44:55","port":"phy:0"}]}"#,
                "Invalid value (VLAN ID 4096 out of range)",
            ),
        ];
        for (text, message) in cases {
            let err = parse_request(text).unwrap_err();
            assert_eq!(err.code, ParseErrorCode::InvalidValue, "for `{text}`");
            assert_eq!(err.message(), message);
        }
    }

    #[test]
    fn test_overlong_name_rejected() {
        let name = "w".repeat(NAME_MAX + 1);
        let text = format!(
            r#"{{"commands":[{{"command":"component","action":"stop","name":"{name}"}}]}}"#
        );
        let err = parse_request(&text).unwrap_err();
        assert_eq!(err.code, ParseErrorCode::InvalidValue);
    }
}
