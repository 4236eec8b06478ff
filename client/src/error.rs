// Copyright 2019-2023 ChainX Project Authors. Licensed under GPL-3.0.

//! Error types and wire-level constants of the JSON-RPC client stack.

use serde_json::Value;
use thiserror::Error;

/// JSON-RPC error code a node returns for an internal server fault.
pub const RPC_INTERNAL_ERROR_CODE: i64 = -32603;

/// Marker carried in the structured error body when the hosted endpoint
/// refuses service for the caller's geography.
pub const COUNTRY_BLOCKED_SENTINEL: &str = "countryBlocked";

/// A failed JSON-RPC round-trip.
#[derive(Debug, Clone, Error)]
pub enum RpcError {
    /// The endpoint answered with a structured JSON-RPC error.
    #[error("rpc error {code}: {message}")]
    Rpc {
        code: i64,
        message: String,
        data: Option<Value>,
    },
    /// The request never produced a JSON-RPC response.
    #[error("transport error: {0}")]
    Transport(String),
    /// A response arrived but did not have the expected shape.
    #[error("unexpected response: {0}")]
    UnexpectedResponse(String),
}

impl RpcError {
    /// True when the structured error body carries [`COUNTRY_BLOCKED_SENTINEL`].
    pub fn is_country_blocked(&self) -> bool {
        match self {
            RpcError::Rpc { message, .. } => serde_json::from_str::<Value>(message)
                .map(|body| body.get("error").and_then(Value::as_str) == Some(COUNTRY_BLOCKED_SENTINEL))
                .unwrap_or(false),
            _ => false,
        }
    }

    /// True when the endpoint reported an internal server fault.
    pub fn is_internal(&self) -> bool {
        matches!(self, RpcError::Rpc { code, .. } if *code == RPC_INTERNAL_ERROR_CODE)
    }
}

/// A failure constructing or tearing down a network client.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The endpoint URL could not be used to build a transport.
    #[error("invalid endpoint url {url:?}: {reason}")]
    InvalidEndpoint { url: String, reason: String },
    /// The block tracker task could not be joined.
    #[error("block tracker shutdown failed: {0}")]
    Shutdown(String),
    #[error(transparent)]
    Rpc(#[from] RpcError),
}
