// Copyright 2019-2023 ChainX Project Authors. Licensed under GPL-3.0.

//! Middlewares composed in front of the HTTP transport.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use xwallet_primitives::ChainId;

use crate::{error::RpcError, transport::RpcProvider};

/// How many times a request is retried after a transport-level failure.
const MAX_RETRIES: u32 = 3;
/// Base delay of the exponential backoff between retries.
const RETRY_BASE_DELAY: Duration = Duration::from_millis(250);

/// Answers `eth_chainId` locally from the network descriptor.
pub struct StaticChainId<T> {
    inner: T,
    chain_id: ChainId,
}

impl<T> StaticChainId<T> {
    pub fn new(inner: T, chain_id: ChainId) -> Self {
        Self { inner, chain_id }
    }
}

#[async_trait]
impl<T: RpcProvider> RpcProvider for StaticChainId<T> {
    async fn request(&self, method: &str, params: Vec<Value>) -> Result<Value, RpcError> {
        if method == "eth_chainId" {
            return Ok(Value::String(self.chain_id.as_str().to_string()));
        }
        self.inner.request(method, params).await
    }
}

/// Retries transport-level failures with exponential backoff.
///
/// Structured JSON-RPC errors pass through untouched so callers can still
/// classify them.
pub struct Retry<T> {
    inner: T,
    max_retries: u32,
}

impl<T> Retry<T> {
    pub fn new(inner: T) -> Self {
        Self::with_max_retries(inner, MAX_RETRIES)
    }

    pub fn with_max_retries(inner: T, max_retries: u32) -> Self {
        Self { inner, max_retries }
    }
}

#[async_trait]
impl<T: RpcProvider> RpcProvider for Retry<T> {
    async fn request(&self, method: &str, params: Vec<Value>) -> Result<Value, RpcError> {
        let mut attempt = 0;
        loop {
            match self.inner.request(method, params.clone()).await {
                Err(RpcError::Transport(reason)) if attempt < self.max_retries => {
                    attempt += 1;
                    log::debug!(
                        "retrying {method} after transport failure ({attempt}/{}): {reason}",
                        self.max_retries
                    );
                    tokio::time::sleep(RETRY_BASE_DELAY * 2u32.pow(attempt - 1)).await;
                }
                other => return other,
            }
        }
    }
}
