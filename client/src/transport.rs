// Copyright 2019-2023 ChainX Project Authors. Licensed under GPL-3.0.

//! The provider trait and its HTTP transport.

use async_trait::async_trait;
use jsonrpsee::{
    core::{client::ClientT, params::ArrayParams},
    http_client::{HttpClient, HttpClientBuilder},
};
use serde::Deserialize;
use serde_json::Value;

use crate::error::{ClientError, RpcError};

/// A JSON-RPC endpoint behind a middleware chain.
#[async_trait]
pub trait RpcProvider: Send + Sync {
    /// Issue a raw JSON-RPC request with positional parameters.
    async fn request(&self, method: &str, params: Vec<Value>) -> Result<Value, RpcError>;
}

/// The slice of a block header the wallet reads.
#[derive(PartialEq, Eq, Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockHeader {
    /// Hex block number; pending blocks carry none.
    #[serde(default)]
    pub number: Option<String>,
    /// Post-London base fee; absent on chains without EIP-1559.
    #[serde(default)]
    pub base_fee_per_gas: Option<String>,
}

/// Typed wrappers for the eth methods the wallet issues itself.
#[async_trait]
pub trait EthRpc: RpcProvider {
    /// `net_version`: the decimal network id as reported by the node.
    async fn net_version(&self) -> Result<String, RpcError> {
        let value = self.request("net_version", Vec::new()).await?;
        value
            .as_str()
            .map(str::to_owned)
            .ok_or_else(|| RpcError::UnexpectedResponse(format!("net_version: {value}")))
    }

    /// `eth_blockNumber`: the hex number of the chain head.
    async fn block_number(&self) -> Result<String, RpcError> {
        let value = self.request("eth_blockNumber", Vec::new()).await?;
        value
            .as_str()
            .map(str::to_owned)
            .ok_or_else(|| RpcError::UnexpectedResponse(format!("eth_blockNumber: {value}")))
    }

    /// `eth_getBlockByNumber("latest", false)`; `None` while the node has no
    /// head to report.
    async fn latest_block(&self) -> Result<Option<BlockHeader>, RpcError> {
        let params = vec![Value::String("latest".to_string()), Value::Bool(false)];
        let value = self.request("eth_getBlockByNumber", params).await?;
        if value.is_null() {
            return Ok(None);
        }
        serde_json::from_value(value)
            .map(Some)
            .map_err(|err| RpcError::UnexpectedResponse(format!("eth_getBlockByNumber: {err}")))
    }
}

impl<T: RpcProvider + ?Sized> EthRpc for T {}

/// Plain HTTP JSON-RPC transport.
pub struct HttpTransport {
    client: HttpClient,
    url: String,
}

impl HttpTransport {
    /// Requests are issued lazily; construction only validates the URL.
    pub fn new(url: &str) -> Result<Self, ClientError> {
        let client = HttpClientBuilder::default()
            .build(url)
            .map_err(|err| ClientError::InvalidEndpoint {
                url: url.to_string(),
                reason: err.to_string(),
            })?;
        Ok(Self {
            client,
            url: url.to_string(),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl RpcProvider for HttpTransport {
    async fn request(&self, method: &str, params: Vec<Value>) -> Result<Value, RpcError> {
        let mut array = ArrayParams::new();
        for param in params {
            array
                .insert(param)
                .map_err(|err| RpcError::Transport(format!("unencodable params: {err}")))?;
        }
        self.client
            .request(method, array)
            .await
            .map_err(RpcError::from)
    }
}

impl From<jsonrpsee::core::client::Error> for RpcError {
    fn from(err: jsonrpsee::core::client::Error) -> Self {
        use jsonrpsee::core::client::Error;
        match err {
            Error::Call(object) => RpcError::Rpc {
                code: object.code() as i64,
                message: object.message().to_string(),
                data: object
                    .data()
                    .and_then(|raw| serde_json::from_str(raw.get()).ok()),
            },
            Error::ParseError(err) => RpcError::UnexpectedResponse(err.to_string()),
            other => RpcError::Transport(other.to_string()),
        }
    }
}
