//! The JSON-RPC 2.0 core.
//!
//! Holds bindings for all APIs and their methods and dispatches requests to
//! the appropriate handler. Feature slices register themselves during
//! initialization under `api.method` names; requests may address a method
//! either directly (`"method": "block_api.get_block"`) or through the
//! generic `call` form (`"method": "call", "params": ["block_api",
//! "get_block", {...}]`).

mod registry;

pub use registry::{ApiRegistry, VoidArgs};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::borrow::Cow;

pub const JSONRPC_VERSION: &str = "2.0";

pub const JSON_RPC_PARSE_ERROR: i64 = -32700;
pub const JSON_RPC_INVALID_REQUEST: i64 = -32600;
pub const JSON_RPC_METHOD_NOT_FOUND: i64 = -32601;
pub const JSON_RPC_INVALID_PARAMS: i64 = -32602;
pub const JSON_RPC_INTERNAL_ERROR: i64 = -32603;
pub const JSON_RPC_SERVER_ERROR: i64 = -32000;
pub const JSON_RPC_NO_PARAMS: i64 = -32001;
pub const JSON_RPC_PARSE_PARAMS_ERROR: i64 = -32002;
pub const JSON_RPC_ERROR_DURING_CALL: i64 = -32003;

/// A single JSON-RPC request.
#[derive(Debug, Clone, Deserialize)]
pub struct RpcRequest {
    pub jsonrpc: Option<String>,
    pub method: String,
    #[serde(default)]
    pub params: Option<Value>,
    #[serde(default)]
    pub id: Option<Value>,
}

/// The error member of a failed response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcErrorObject {
    pub code: i64,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

/// A single JSON-RPC response.
#[derive(Debug, Clone, Serialize)]
pub struct RpcResponse {
    pub jsonrpc: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<RpcErrorObject>,
    pub id: Value,
}

impl RpcResponse {
    #[must_use]
    pub fn success(id: Value, result: Value) -> Self {
        Self { jsonrpc: JSONRPC_VERSION, result: Some(result), error: None, id }
    }

    #[must_use]
    pub fn failure(id: Value, code: i64, message: impl Into<String>) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION,
            result: None,
            error: Some(RpcErrorObject { code, message: message.into(), data: None }),
            id,
        }
    }
}

/// Errors an API handler can surface to the RPC layer.
///
/// Dispatch-level failures (unparsable body, unknown method) are produced by
/// the registry itself and never pass through this type.
#[stx_derive::stx_error]
pub enum ApiError {
    /// The params do not deserialize into the method's argument type.
    #[error("Invalid params{}: {message}", format_context(.context))]
    ParseParams { message: Cow<'static, str>, context: Option<Cow<'static, str>> },

    /// The params are structurally valid but semantically unusable.
    #[error("Invalid params{}: {message}", format_context(.context))]
    InvalidParams { message: Cow<'static, str>, context: Option<Cow<'static, str>> },

    /// The addressed entity does not exist.
    #[error("Not found{}: {message}", format_context(.context))]
    NotFound { message: Cow<'static, str>, context: Option<Cow<'static, str>> },

    /// The call reached the feature but failed there.
    #[error("Call failed{}: {message}", format_context(.context))]
    Execution { message: Cow<'static, str>, context: Option<Cow<'static, str>> },

    #[error("Internal error{}: {message}", format_context(.context))]
    Internal { message: Cow<'static, str>, context: Option<Cow<'static, str>> },
}

impl ApiError {
    /// The JSON-RPC error code this error maps to.
    #[must_use]
    pub const fn code(&self) -> i64 {
        match self {
            Self::ParseParams { .. } => JSON_RPC_PARSE_PARAMS_ERROR,
            Self::InvalidParams { .. } => JSON_RPC_INVALID_PARAMS,
            Self::NotFound { .. } | Self::Execution { .. } => JSON_RPC_ERROR_DURING_CALL,
            Self::Internal { .. } => JSON_RPC_INTERNAL_ERROR,
        }
    }
}

impl From<ApiError> for RpcErrorObject {
    fn from(err: ApiError) -> Self {
        Self { code: err.code(), message: err.to_string(), data: None }
    }
}
