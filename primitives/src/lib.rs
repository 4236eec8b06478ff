// Copyright 2019-2023 ChainX Project Authors. Licensed under GPL-3.0.

//! Low-level chain and network primitives shared across the wallet.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The largest chain id the wallet accepts.
///
/// Chain ids travel through the UI layer as ECMAScript numbers, so anything
/// above 2^53 - 1 would silently lose precision there.
pub const MAX_SAFE_CHAIN_ID: u64 = 9_007_199_254_740_991;

/// Chain id of the Ethereum main network.
pub const MAINNET_CHAIN_ID: u64 = 1;
/// Chain id of the Goerli test network.
pub const GOERLI_CHAIN_ID: u64 = 5;
/// Chain id of the Sepolia test network.
pub const SEPOLIA_CHAIN_ID: u64 = 11_155_111;
/// Chain id conventionally used by local development nodes.
pub const LOCALHOST_CHAIN_ID: u64 = 1337;

/// The given string is not a usable EIP-155 chain id.
#[derive(PartialEq, Eq, Clone, Debug, Error)]
#[error("invalid chain id: {0:?}")]
pub struct InvalidChainId(pub String);

/// The given string is not a decimal network id.
#[derive(PartialEq, Eq, Clone, Debug, Error)]
#[error("invalid network id: {0:?}")]
pub struct InvalidNetworkId(pub String);

/// An EIP-155 chain identifier.
///
/// Stored as the canonical lowercase `0x`-prefixed hex string: no leading
/// zeros, value in `1..=MAX_SAFE_CHAIN_ID`.
#[derive(PartialEq, Eq, Clone, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ChainId(String);

impl ChainId {
    /// Parse and normalize a `0x`-prefixed hex chain id.
    pub fn new(s: &str) -> Result<Self, InvalidChainId> {
        let digits = s
            .strip_prefix("0x")
            .ok_or_else(|| InvalidChainId(s.to_string()))?;
        if digits.is_empty()
            || digits.starts_with('0')
            || !digits.bytes().all(|b| b.is_ascii_hexdigit())
        {
            return Err(InvalidChainId(s.to_string()));
        }
        let value =
            u64::from_str_radix(digits, 16).map_err(|_| InvalidChainId(s.to_string()))?;
        if value > MAX_SAFE_CHAIN_ID {
            return Err(InvalidChainId(s.to_string()));
        }
        Ok(Self(format!("0x{}", digits.to_ascii_lowercase())))
    }

    /// Build a chain id from its numeric value.
    pub fn from_u64(value: u64) -> Result<Self, InvalidChainId> {
        if value == 0 || value > MAX_SAFE_CHAIN_ID {
            return Err(InvalidChainId(value.to_string()));
        }
        Ok(Self(format!("{:#x}", value)))
    }

    /// The chain id local development nodes answer with.
    pub fn localhost() -> Self {
        Self(format!("{:#x}", LOCALHOST_CHAIN_ID))
    }

    /// The canonical `0x`-prefixed hex form.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The numeric value of the chain id.
    pub fn value(&self) -> u64 {
        // Guaranteed to parse: the only constructors are `new` and `from_u64`.
        u64::from_str_radix(&self.0[2..], 16).unwrap_or_default()
    }
}

impl fmt::Display for ChainId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for ChainId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ChainId({})", self.0)
    }
}

impl FromStr for ChainId {
    type Err = InvalidChainId;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for ChainId {
    type Error = InvalidChainId;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(&s)
    }
}

impl From<ChainId> for String {
    fn from(id: ChainId) -> Self {
        id.0
    }
}

/// The decimal network identifier reported by `net_version`.
///
/// Usually equal to the chain id but a distinct concept on the wire, so it is
/// kept as the untouched decimal string.
#[derive(PartialEq, Eq, Clone, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct NetworkId(String);

impl NetworkId {
    /// Accepts a non-empty string of decimal digits.
    pub fn new(s: &str) -> Result<Self, InvalidNetworkId> {
        if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
            return Err(InvalidNetworkId(s.to_string()));
        }
        Ok(Self(s.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NetworkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for NetworkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NetworkId({})", self.0)
    }
}

impl TryFrom<String> for NetworkId {
    type Error = InvalidNetworkId;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(&s)
    }
}

impl From<NetworkId> for String {
    fn from(id: NetworkId) -> Self {
        id.0
    }
}

/// Reachability of the active network as of the most recent probe.
#[derive(PartialEq, Eq, Clone, Copy, Debug, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NetworkStatus {
    /// Not probed yet, or the probe outcome could not be classified.
    Unknown,
    /// The endpoint answered both probe calls.
    Available,
    /// The hosted endpoint refused service for this geography.
    Blocked,
    /// The endpoint could not be reached or returned an error.
    Unavailable,
}

impl Default for NetworkStatus {
    fn default() -> Self {
        NetworkStatus::Unknown
    }
}

/// The hosted networks the wallet ships credentials for.
#[derive(PartialEq, Eq, Clone, Copy, Debug, Hash)]
pub enum BuiltInNetwork {
    Mainnet,
    Goerli,
    Sepolia,
}

impl BuiltInNetwork {
    /// Every hosted network, in display order.
    pub const ALL: [BuiltInNetwork; 3] = [
        BuiltInNetwork::Mainnet,
        BuiltInNetwork::Goerli,
        BuiltInNetwork::Sepolia,
    ];

    /// The short name used in persisted state and endpoint subdomains.
    pub fn as_str(&self) -> &'static str {
        match self {
            BuiltInNetwork::Mainnet => "mainnet",
            BuiltInNetwork::Goerli => "goerli",
            BuiltInNetwork::Sepolia => "sepolia",
        }
    }

    /// Look up a hosted network by its short name.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|n| n.as_str() == name)
    }

    pub fn chain_id(&self) -> ChainId {
        let value = match self {
            BuiltInNetwork::Mainnet => MAINNET_CHAIN_ID,
            BuiltInNetwork::Goerli => GOERLI_CHAIN_ID,
            BuiltInNetwork::Sepolia => SEPOLIA_CHAIN_ID,
        };
        ChainId(format!("{:#x}", value))
    }

    /// The currency symbol shown for this network.
    pub fn ticker(&self) -> Option<&'static str> {
        match self {
            BuiltInNetwork::Mainnet => Some("ETH"),
            BuiltInNetwork::Goerli => Some("GoerliETH"),
            BuiltInNetwork::Sepolia => Some("SepoliaETH"),
        }
    }

    pub fn block_explorer_url(&self) -> Option<&'static str> {
        match self {
            BuiltInNetwork::Mainnet => Some("https://etherscan.io"),
            BuiltInNetwork::Goerli => Some("https://goerli.etherscan.io"),
            BuiltInNetwork::Sepolia => Some("https://sepolia.etherscan.io"),
        }
    }
}

impl fmt::Display for BuiltInNetwork {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which kind of endpoint the active provider points at.
#[derive(PartialEq, Eq, Clone, Copy, Debug, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum ProviderType {
    /// A hosted first-party endpoint.
    BuiltIn(BuiltInNetwork),
    /// A user-supplied JSON-RPC endpoint.
    Rpc,
}

impl ProviderType {
    /// The short name used in persisted state.
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderType::BuiltIn(network) => network.as_str(),
            ProviderType::Rpc => "rpc",
        }
    }

    pub fn is_built_in(&self) -> bool {
        matches!(self, ProviderType::BuiltIn(_))
    }
}

impl fmt::Display for ProviderType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<String> for ProviderType {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        if s == "rpc" {
            return Ok(ProviderType::Rpc);
        }
        BuiltInNetwork::from_name(&s)
            .map(ProviderType::BuiltIn)
            .ok_or_else(|| format!("unknown provider type: {s:?}"))
    }
}

impl From<ProviderType> for String {
    fn from(provider_type: ProviderType) -> Self {
        provider_type.as_str().to_string()
    }
}
