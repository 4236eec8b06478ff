// Copyright 2019-2023 ChainX Project Authors. Licensed under GPL-3.0.

//! JSON-RPC client stack for the wallet: provider middleware chain plus the
//! polling block tracker, built per network by [`create_network_client`].

pub mod emitter;
pub mod error;
pub mod middleware;
pub mod tracker;
pub mod transport;

pub use emitter::{
    is_internal_event, EventEmitter, Evented, Listener, ListenerId, INTERNAL_EVENT_MARKER,
};
pub use error::{ClientError, RpcError, COUNTRY_BLOCKED_SENTINEL, RPC_INTERNAL_ERROR_CODE};
pub use tracker::{
    BlockTracker, DEFAULT_POLLING_INTERVAL, ENDED_EVENT, ERROR_EVENT, LATEST_EVENT, STARTED_EVENT,
    SYNC_EVENT,
};
pub use transport::{BlockHeader, EthRpc, HttpTransport, RpcProvider};

use std::sync::Arc;

use xwallet_primitives::{BuiltInNetwork, ChainId};

use crate::middleware::{Retry, StaticChainId};

/// Everything needed to stand up a client for one network.
#[derive(PartialEq, Eq, Clone, Debug)]
pub enum NetworkClientSpec {
    /// A hosted first-party endpoint addressed by short name and credential.
    BuiltIn {
        network: BuiltInNetwork,
        api_key: String,
    },
    /// A user-supplied endpoint.
    Custom { rpc_url: String, chain_id: ChainId },
}

/// A live provider/tracker pair for a single network.
pub struct NetworkClient {
    pub provider: Arc<dyn RpcProvider>,
    pub block_tracker: Arc<BlockTracker>,
}

fn hosted_url(network: BuiltInNetwork, api_key: &str) -> String {
    format!("https://{}.infura.io/v3/{}", network.as_str(), api_key)
}

/// Build an independent provider/tracker pair for the given spec.
pub fn create_network_client(spec: &NetworkClientSpec) -> Result<NetworkClient, ClientError> {
    let (url, chain_id) = match spec {
        NetworkClientSpec::BuiltIn { network, api_key } => {
            (hosted_url(*network, api_key), network.chain_id())
        }
        NetworkClientSpec::Custom { rpc_url, chain_id } => (rpc_url.clone(), chain_id.clone()),
    };
    url::Url::parse(&url).map_err(|err| ClientError::InvalidEndpoint {
        url: url.clone(),
        reason: err.to_string(),
    })?;
    let transport = HttpTransport::new(&url)?;
    let provider: Arc<dyn RpcProvider> = Arc::new(StaticChainId::new(Retry::new(transport), chain_id));
    let block_tracker = BlockTracker::new(provider.clone());
    Ok(NetworkClient {
        provider,
        block_tracker,
    })
}
