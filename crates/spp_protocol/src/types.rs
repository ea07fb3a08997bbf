//! Canonical enums and identity types shared across the protocol and agent.

use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Highest valid 802.1Q VLAN ID. Classifier attributes use this value as the
/// "no VLAN configured" sentinel.
pub const VID_MAX: u16 = 4095;

/// Highest valid 802.1p priority code point.
pub const PCP_MAX: u8 = 7;

/// Longest accepted worker name, in bytes.
pub const NAME_MAX: usize = 31;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("invalid port `{0}`, expected `<phy|vhost|ring>:<index>`")]
    InvalidPort(String),
    #[error("invalid MAC address `{0}`")]
    InvalidMac(String),
    #[error("unknown worker type `{0}`")]
    UnknownWorkerType(String),
    #[error("unknown process kind `{0}`")]
    UnknownProcKind(String),
}

/// Kind of a dataplane port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PortKind {
    Phy,
    Vhost,
    Ring,
}

impl PortKind {
    pub const ALL: [PortKind; 3] = [PortKind::Phy, PortKind::Vhost, PortKind::Ring];

    pub fn as_str(&self) -> &'static str {
        match self {
            PortKind::Phy => "phy",
            PortKind::Vhost => "vhost",
            PortKind::Ring => "ring",
        }
    }
}

impl fmt::Display for PortKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for PortKind {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "phy" => Ok(PortKind::Phy),
            "vhost" => Ok(PortKind::Vhost),
            "ring" => Ok(PortKind::Ring),
            _ => Err(ProtocolError::InvalidPort(s.to_string())),
        }
    }
}

/// Identity of a dataplane port, written `phy:0`, `vhost:1`, `ring:2`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PortId {
    pub kind: PortKind,
    pub index: u32,
}

impl PortId {
    pub const fn new(kind: PortKind, index: u32) -> Self {
        Self { kind, index }
    }
}

impl fmt::Display for PortId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind, self.index)
    }
}

impl FromStr for PortId {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (kind, index) = s
            .split_once(':')
            .ok_or_else(|| ProtocolError::InvalidPort(s.to_string()))?;
        let kind = kind.parse::<PortKind>()?;
        let index = index
            .parse::<u32>()
            .map_err(|_| ProtocolError::InvalidPort(s.to_string()))?;
        Ok(PortId { kind, index })
    }
}

impl Serialize for PortId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for PortId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(de::Error::custom)
    }
}

/// Action requested by a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WkAction {
    Start,
    Stop,
    Add,
    Del,
}

impl WkAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            WkAction::Start => "start",
            WkAction::Stop => "stop",
            WkAction::Add => "add",
            WkAction::Del => "del",
        }
    }
}

impl fmt::Display for WkAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Role a worker performs on its lcore.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WorkerType {
    #[serde(rename = "forward")]
    Forward,
    #[serde(rename = "merge")]
    Merge,
    #[serde(rename = "classify")]
    Classify,
    #[serde(rename = "mirror")]
    Mirror,
}

impl WorkerType {
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkerType::Forward => "forward",
            WorkerType::Merge => "merge",
            WorkerType::Classify => "classify",
            WorkerType::Mirror => "mirror",
        }
    }
}

impl fmt::Display for WorkerType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for WorkerType {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "forward" => Ok(WorkerType::Forward),
            "merge" => Ok(WorkerType::Merge),
            "classify" => Ok(WorkerType::Classify),
            "mirror" => Ok(WorkerType::Mirror),
            _ => Err(ProtocolError::UnknownWorkerType(s.to_string())),
        }
    }
}

/// Kind of secondary process the agent runs as. Selects the worker flavor
/// and is reported back to the controller as `process_type`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProcKind {
    #[default]
    None,
    Vf,
    Mirror,
}

impl ProcKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProcKind::None => "none",
            ProcKind::Vf => "vf",
            ProcKind::Mirror => "mirror",
        }
    }
}

impl fmt::Display for ProcKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ProcKind {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "none" => Ok(ProcKind::None),
            "vf" => Ok(ProcKind::Vf),
            "mirror" => Ok(ProcKind::Mirror),
            _ => Err(ProtocolError::UnknownProcKind(s.to_string())),
        }
    }
}

/// Direction of a port attachment relative to the worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum PortDir {
    #[default]
    Rx,
    Tx,
}

impl PortDir {
    pub fn as_str(&self) -> &'static str {
        match self {
            PortDir::Rx => "rx",
            PortDir::Tx => "tx",
        }
    }
}

/// Per-port transform operation. Reported in status as `none`/`add`/`del`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum AbilityOp {
    #[default]
    #[serde(rename = "none")]
    None,
    #[serde(rename = "add")]
    AddVlan,
    #[serde(rename = "del")]
    DelVlan,
}

impl AbilityOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            AbilityOp::None => "none",
            AbilityOp::AddVlan => "add",
            AbilityOp::DelVlan => "del",
        }
    }
}

/// A per-port, per-direction transform slot. The default value is the empty
/// slot (`op == None`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PortAbility {
    pub op: AbilityOp,
    pub dir: PortDir,
    pub vid: u16,
    pub pcp: u8,
}

/// Convert a `xx:xx:xx:xx:xx:xx` MAC address into its 48-bit integer form.
pub fn mac_str_to_u64(s: &str) -> Result<u64, ProtocolError> {
    let mut value: u64 = 0;
    let mut octets = 0;
    for part in s.split(':') {
        if part.is_empty() || part.len() > 2 {
            return Err(ProtocolError::InvalidMac(s.to_string()));
        }
        let octet =
            u8::from_str_radix(part, 16).map_err(|_| ProtocolError::InvalidMac(s.to_string()))?;
        value = (value << 8) | u64::from(octet);
        octets += 1;
    }
    if octets != 6 {
        return Err(ProtocolError::InvalidMac(s.to_string()));
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_port_id_roundtrip() {
        for s in ["phy:0", "vhost:3", "ring:12"] {
            let port: PortId = s.parse().unwrap();
            assert_eq!(port.to_string(), s);
        }
    }

    #[test]
    fn test_port_id_rejects_garbage() {
        for s in ["phy", "phy:", "phy:-1", "nic:0", "phy:0:1", ""] {
            assert!(s.parse::<PortId>().is_err(), "accepted `{}`", s);
        }
    }

    #[test]
    fn test_port_id_serde_is_string() {
        let port = PortId::new(PortKind::Ring, 7);
        assert_eq!(serde_json::to_string(&port).unwrap(), "\"ring:7\"");
        let back: PortId = serde_json::from_str("\"ring:7\"").unwrap();
        assert_eq!(back, port);
    }

    #[test]
    fn test_mac_conversion() {
        assert_eq!(
            mac_str_to_u64("00:11:22:33:44:55").unwrap(),
            0x0011_2233_4455
        );
        assert_eq!(mac_str_to_u64("ff:ff:ff:ff:ff:ff").unwrap(), 0xffff_ffff_ffff);
        assert_eq!(mac_str_to_u64("0:1:2:3:4:5").unwrap(), 0x0001_0203_0405);
    }

    #[test]
    fn test_mac_conversion_rejects_garbage() {
        for s in [
            "",
            "00:11:22:33:44",
            "00:11:22:33:44:55:66",
            "00:11:22:33:44:zz",
            "001:1:2:3:4:5",
            "00-11-22-33-44-55",
        ] {
            assert!(mac_str_to_u64(s).is_err(), "accepted `{}`", s);
        }
    }

    #[test]
    fn test_worker_type_strings() {
        for (s, ty) in [
            ("forward", WorkerType::Forward),
            ("merge", WorkerType::Merge),
            ("classify", WorkerType::Classify),
            ("mirror", WorkerType::Mirror),
        ] {
            assert_eq!(s.parse::<WorkerType>().unwrap(), ty);
            assert_eq!(ty.as_str(), s);
        }
        assert!("fwd".parse::<WorkerType>().is_err());
    }
}
