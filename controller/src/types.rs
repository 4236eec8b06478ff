// Copyright 2019-2023 ChainX Project Authors. Licensed under GPL-3.0.

//! State and configuration records of the network controller.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use xwallet_primitives::{BuiltInNetwork, ChainId, NetworkId, NetworkStatus, ProviderType};

/// The EIP whose support the controller probes. Kept as the persisted-state
/// object key.
pub const EIP_1559: &str = "1559";

/// Name of the metrics event reported when a new custom network is saved.
pub const CUSTOM_NETWORK_ADDED_EVENT: &str = "Custom Network Added";
/// Metrics category of the controller's events.
pub const NETWORK_EVENT_CATEGORY: &str = "Network";

/// Identifier of a user-defined network configuration.
pub type NetworkConfigurationId = Uuid;

/// The registry of user-defined networks.
pub type NetworkConfigurations = BTreeMap<NetworkConfigurationId, NetworkConfiguration>;

/// Per-network UI preferences.
#[derive(PartialEq, Eq, Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RpcPrefs {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub block_explorer_url: Option<String>,
}

/// Where the active connection points.
///
/// For a built-in provider the chain id always equals the table value for
/// that network and `rpc_url` is unused; both constructors maintain this.
#[derive(PartialEq, Eq, Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderConfig {
    #[serde(rename = "type")]
    pub kind: ProviderType,
    pub chain_id: ChainId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rpc_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ticker: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nickname: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rpc_prefs: Option<RpcPrefs>,
}

impl ProviderConfig {
    /// Configuration for a hosted network, filled from the built-in table.
    pub fn built_in(network: BuiltInNetwork) -> Self {
        Self {
            kind: ProviderType::BuiltIn(network),
            chain_id: network.chain_id(),
            rpc_url: None,
            ticker: Some(network.ticker().unwrap_or("ETH").to_string()),
            nickname: None,
            rpc_prefs: network.block_explorer_url().map(|url| RpcPrefs {
                block_explorer_url: Some(url.to_string()),
            }),
        }
    }

    /// Configuration pointing at a saved custom network.
    pub fn from_configuration(configuration: &NetworkConfiguration) -> Self {
        Self {
            kind: ProviderType::Rpc,
            chain_id: configuration.chain_id.clone(),
            rpc_url: Some(configuration.rpc_url.clone()),
            ticker: Some(configuration.ticker.clone()),
            nickname: configuration.nickname.clone(),
            rpc_prefs: configuration.rpc_prefs.clone(),
        }
    }

    fn localhost() -> Self {
        Self {
            kind: ProviderType::Rpc,
            chain_id: ChainId::localhost(),
            rpc_url: Some("http://localhost:8545".to_string()),
            ticker: Some("ETH".to_string()),
            nickname: Some("Localhost 8545".to_string()),
            rpc_prefs: None,
        }
    }
}

impl Default for ProviderConfig {
    /// The starting network when no state was restored: mainnet in release
    /// builds, goerli in debug builds, the local node under the
    /// `integration-test` feature.
    fn default() -> Self {
        if cfg!(feature = "integration-test") {
            ProviderConfig::localhost()
        } else if cfg!(debug_assertions) {
            ProviderConfig::built_in(BuiltInNetwork::Goerli)
        } else {
            ProviderConfig::built_in(BuiltInNetwork::Mainnet)
        }
    }
}

/// A user-defined custom network.
#[derive(PartialEq, Eq, Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkConfiguration {
    pub id: NetworkConfigurationId,
    pub rpc_url: String,
    pub chain_id: ChainId,
    pub ticker: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nickname: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rpc_prefs: Option<RpcPrefs>,
}

/// The submitted fields of a custom network, before an id is assigned.
#[derive(PartialEq, Eq, Clone, Debug)]
pub struct NetworkConfigurationUpdate {
    pub rpc_url: String,
    pub chain_id: ChainId,
    pub ticker: String,
    pub nickname: Option<String>,
    pub rpc_prefs: Option<RpcPrefs>,
}

/// Feature-support facts about the active network.
///
/// An open record: fields this controller does not know about survive
/// load/save cycles untouched.
#[derive(PartialEq, Clone, Debug, Default, Serialize, Deserialize)]
pub struct NetworkDetails {
    /// EIP number → supported. A missing entry means "not probed yet".
    #[serde(rename = "EIPS", default)]
    pub eips: BTreeMap<String, bool>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl NetworkDetails {
    pub fn eip1559_support(&self) -> Option<bool> {
        self.eips.get(EIP_1559).copied()
    }
}

/// The persisted composite state.
#[derive(PartialEq, Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkControllerState {
    pub provider: ProviderConfig,
    /// Snapshot of the provider before the most recent switch.
    #[serde(rename = "previousProviderStore")]
    pub previous_provider: ProviderConfig,
    pub network_id: Option<NetworkId>,
    pub network_status: NetworkStatus,
    pub network_details: NetworkDetails,
    pub network_configurations: NetworkConfigurations,
}

impl Default for NetworkControllerState {
    fn default() -> Self {
        let provider = ProviderConfig::default();
        Self {
            previous_provider: provider.clone(),
            provider,
            network_id: None,
            network_status: NetworkStatus::default(),
            network_details: NetworkDetails::default(),
            network_configurations: NetworkConfigurations::new(),
        }
    }
}

/// A metrics record handed to the embedding analytics sink.
#[derive(PartialEq, Eq, Clone, Debug, Serialize)]
pub struct TrackedEvent {
    pub event: String,
    pub category: String,
    pub referrer: EventReferrer,
    pub properties: TrackedEventProperties,
}

#[derive(PartialEq, Eq, Clone, Debug, Serialize)]
pub struct EventReferrer {
    pub url: String,
}

#[derive(PartialEq, Eq, Clone, Debug, Serialize)]
pub struct TrackedEventProperties {
    pub chain_id: ChainId,
    pub symbol: String,
    pub source: String,
}
