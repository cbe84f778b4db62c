//! Call, outcome and wire types of the RPC surface

use crate::ledger::LedgerError;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub const INVALID_ADDRESS: &str = "invalid address";
pub const ADDRESS_NOT_FOUND: &str = "address not found";
pub const WRONG_PARAMETERS: &str = "wrong parameters";
pub const UNIT_NOT_FOUND: &str = "unit not found";
pub const INVALID_REWARD_PERIOD: &str = "rewardPeriod must be a number and more than 0";
pub const INVALID_ROUND_INDEX: &str = "roundIndex must be a number and more than 0";

/// Error returned by an RPC handler.
///
/// The display text is exactly what the caller sees.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RpcError {
    /// Malformed or invalid argument, rejected before any collaborator call.
    #[error("{0}")]
    Validation(String),

    /// Well-formed reference absent from the ledger or the wallet.
    #[error("{0}")]
    NotFound(String),

    /// A collaborator failed; its message is relayed unchanged.
    #[error("{0}")]
    Dependency(#[from] LedgerError),

    #[error("Method not found: {0}")]
    UnknownMethod(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl RpcError {
    pub fn validation(message: &str) -> Self {
        RpcError::Validation(message.to_string())
    }

    pub fn not_found(message: &str) -> Self {
        RpcError::NotFound(message.to_string())
    }

    /// JSON-RPC error code.
    pub fn code(&self) -> i64 {
        match self {
            RpcError::Validation(_) => -32602,
            RpcError::NotFound(_) => -32004,
            RpcError::Dependency(_) => -32000,
            RpcError::UnknownMethod(_) => -32601,
            RpcError::InvalidRequest(_) => -32600,
        }
    }
}

/// Result of one RPC call: a value or an error, never both.
pub type RpcResult = Result<Value, RpcError>;

/// Arguments of an RPC call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Params {
    Positional(Vec<Value>),
    Named(Map<String, Value>),
}

impl Default for Params {
    fn default() -> Self {
        Params::Positional(Vec::new())
    }
}

impl Params {
    pub fn positional(values: Vec<Value>) -> Self {
        Params::Positional(values)
    }

    /// Positional argument at `index`; `Null` when absent or when the params are named.
    pub fn arg(&self, index: usize) -> &Value {
        match self {
            Params::Positional(values) => values.get(index).unwrap_or(&Value::Null),
            Params::Named(_) => &Value::Null,
        }
    }

    /// Positional argument at `index` if it is a non-empty string.
    pub fn str_arg(&self, index: usize) -> Option<&str> {
        self.arg(index).as_str().filter(|s| !s.is_empty())
    }

    /// Named argument, also looked up in an object passed as the first positional argument.
    pub fn named(&self, key: &str) -> &Value {
        let map = match self {
            Params::Named(map) => Some(map),
            Params::Positional(values) => values.first().and_then(Value::as_object),
        };
        map.and_then(|m| m.get(key)).unwrap_or(&Value::Null)
    }
}

/// JSON-RPC 2.0 request.
#[derive(Debug, Clone, Deserialize)]
pub struct RpcRequest {
    #[serde(default)]
    pub jsonrpc: Option<String>,
    pub method: String,
    #[serde(default)]
    pub params: Params,
    #[serde(default)]
    pub id: Value,
}

/// JSON-RPC 2.0 error object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpcErrorObject {
    pub code: i64,
    pub message: String,
}

impl From<&RpcError> for RpcErrorObject {
    fn from(err: &RpcError) -> Self {
        Self {
            code: err.code(),
            message: err.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RpcOutcome {
    Result(Value),
    Error(RpcErrorObject),
}

/// JSON-RPC 2.0 response carrying exactly one of `result` or `error`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpcResponse {
    pub jsonrpc: String,
    #[serde(flatten)]
    pub outcome: RpcOutcome,
    pub id: Value,
}

impl RpcResponse {
    pub fn from_result(id: Value, result: RpcResult) -> Self {
        let outcome = match result {
            Ok(value) => RpcOutcome::Result(value),
            Err(err) => RpcOutcome::Error(RpcErrorObject::from(&err)),
        };
        Self {
            jsonrpc: "2.0".to_string(),
            outcome,
            id,
        }
    }
}
