//! Serializable response types.
//!
//! The agent materializes the whole response as typed values and serializes
//! once, instead of appending JSON fragments to a growing string buffer.

use serde::Serialize;
use serde_json::Value;

use crate::types::{AbilityOp, PortAbility};

/// Outcome of one command in a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ResultCode {
    #[serde(rename = "success")]
    Success,
    #[serde(rename = "error")]
    Failure,
    #[serde(rename = "invalid")]
    Invalid,
}

impl ResultCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResultCode::Success => "success",
            ResultCode::Failure => "error",
            ResultCode::Invalid => "invalid",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorDetails {
    pub message: String,
}

/// One entry of the `results` array. Only failures carry details.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CmdResult {
    pub result: ResultCode,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_details: Option<ErrorDetails>,
}

impl CmdResult {
    pub fn success() -> Self {
        Self {
            result: ResultCode::Success,
            error_details: None,
        }
    }

    pub fn invalid() -> Self {
        Self {
            result: ResultCode::Invalid,
            error_details: None,
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            result: ResultCode::Failure,
            error_details: Some(ErrorDetails {
                message: message.into(),
            }),
        }
    }
}

/// Top-level response envelope. `client_id`/`process_type` appear only when
/// the batch asked for the client id, `info` only when it asked for status.
#[derive(Debug, Clone, Serialize)]
pub struct Response {
    pub results: Vec<CmdResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_id: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub process_type: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub info: Option<Value>,
}

impl Response {
    pub fn new(results: Vec<CmdResult>) -> Self {
        Self {
            results,
            client_id: None,
            process_type: None,
            info: None,
        }
    }
}

/// VLAN transform active on one direction of a port attachment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VlanBlock {
    pub operation: &'static str,
    pub id: u16,
    pub pcp: u8,
}

impl VlanBlock {
    pub fn none() -> Self {
        Self {
            operation: AbilityOp::None.as_str(),
            id: 0,
            pcp: 0,
        }
    }
}

impl From<&PortAbility> for VlanBlock {
    fn from(ability: &PortAbility) -> Self {
        Self {
            operation: ability.op.as_str(),
            id: ability.vid,
            pcp: ability.pcp,
        }
    }
}

/// One attached port inside a core block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PortBlock {
    pub port: String,
    pub vlan: VlanBlock,
}

/// One entry of the `core` status array. Idle lcores carry only `core` and
/// `type: "unuse"`.
#[derive(Debug, Clone, Serialize)]
pub struct CoreBlock {
    pub core: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(rename = "type")]
    pub wk_type: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rx_port: Option<Vec<PortBlock>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tx_port: Option<Vec<PortBlock>>,
}

impl CoreBlock {
    pub fn unused(core: u32) -> Self {
        Self {
            core,
            name: None,
            wk_type: "unuse",
            rx_port: None,
            tx_port: None,
        }
    }
}

/// One entry of the `classifier_table` status array.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClassifierEntry {
    #[serde(rename = "type")]
    pub cls_type: &'static str,
    pub value: String,
    pub port: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_success_omits_error_details() {
        let json = serde_json::to_string(&CmdResult::success()).unwrap();
        assert_eq!(json, r#"{"result":"success"}"#);
        let json = serde_json::to_string(&CmdResult::invalid()).unwrap();
        assert_eq!(json, r#"{"result":"invalid"}"#);
    }

    #[test]
    fn test_failure_carries_message() {
        let json = serde_json::to_string(&CmdResult::failure("error occur")).unwrap();
        assert_eq!(
            json,
            r#"{"result":"error","error_details":{"message":"error occur"}}"#
        );
    }

    #[test]
    fn test_envelope_skips_absent_sections() {
        let response = Response::new(vec![CmdResult::success()]);
        let json = serde_json::to_string(&response).unwrap();
        assert_eq!(json, r#"{"results":[{"result":"success"}]}"#);
    }

    #[test]
    fn test_unused_core_block_shape() {
        let json = serde_json::to_value(CoreBlock::unused(3)).unwrap();
        assert_eq!(json, serde_json::json!({"core": 3, "type": "unuse"}));
    }
}
