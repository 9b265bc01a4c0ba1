use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub type NodeId = usize;
pub type Round = u64;

/// A node's opinion. Encoded on the wire as `0`, `1` or `"?"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "serde_json::Value", into = "serde_json::Value")]
pub enum Value {
    Zero,
    One,
    Unknown,
}

impl Value {
    pub fn is_binary(self) -> bool {
        matches!(self, Value::Zero | Value::One)
    }
}

impl From<bool> for Value {
    fn from(bit: bool) -> Self {
        if bit {
            Value::One
        } else {
            Value::Zero
        }
    }
}

impl From<Value> for serde_json::Value {
    fn from(value: Value) -> Self {
        match value {
            Value::Zero => serde_json::json!(0),
            Value::One => serde_json::json!(1),
            Value::Unknown => serde_json::json!("?"),
        }
    }
}

impl TryFrom<serde_json::Value> for Value {
    type Error = String;

    fn try_from(raw: serde_json::Value) -> Result<Self, Self::Error> {
        match &raw {
            serde_json::Value::Number(n) => match n.as_u64() {
                Some(0) => Ok(Value::Zero),
                Some(1) => Ok(Value::One),
                _ => Err(format!("not a binary value: {}", raw)),
            },
            serde_json::Value::String(s) if s == "?" => Ok(Value::Unknown),
            _ => Err(format!("not a binary value: {}", raw)),
        }
    }
}

impl FromStr for Value {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "0" => Ok(Value::Zero),
            "1" => Ok(Value::One),
            "?" => Ok(Value::Unknown),
            other => Err(format!("invalid value '{}', expected 0, 1 or ?", other)),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Zero => write!(f, "0"),
            Value::One => write!(f, "1"),
            Value::Unknown => write!(f, "?"),
        }
    }
}

/// A round-tagged vote as carried by `POST /message`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vote {
    pub step: Round,
    pub value: Value,
}

impl Vote {
    pub fn new(step: Round, value: Value) -> Self {
        Self { step, value }
    }
}

/// Externally visible node state, the body of `GET /getState`.
///
/// `None` fields serialize as `null`, which is how a faulty node reports.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeState {
    pub killed: bool,
    pub x: Option<Value>,
    pub decided: Option<bool>,
    pub k: Option<Round>,
}

/// How a faulty node misbehaves once it sees a round.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FaultMode {
    /// Never sends anything.
    Silent,
    /// Sends `"?"` once per observed round.
    #[default]
    Unknown,
    /// Sends a coin value once per observed round.
    Random,
}

impl FromStr for FaultMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "silent" => Ok(FaultMode::Silent),
            "unknown" => Ok(FaultMode::Unknown),
            "random" => Ok(FaultMode::Random),
            other => Err(format!("invalid fault mode '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Behavior {
    Correct,
    Byzantine(FaultMode),
}

impl Behavior {
    pub fn is_faulty(self) -> bool {
        matches!(self, Behavior::Byzantine(_))
    }
}
