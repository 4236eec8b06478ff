// Copyright 2019-2023 ChainX Project Authors. Licensed under GPL-3.0.

//! Network controller: owns the wallet's single live JSON-RPC connection,
//! switches it between networks on demand, and publishes authoritative
//! status to the rest of the application.
//!
//! Long-lived subscribers never hold the raw provider or block tracker. They
//! hold the two swappable proxies, whose targets the controller silently
//! retargets on every switch.

pub mod messenger;
pub mod proxy;
pub mod store;
pub mod types;

#[cfg(test)]
mod mock;

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc, Weak,
};

use futures::future;
use parking_lot::Mutex;
use thiserror::Error;
use uuid::Uuid;

use xwallet_network_client::{
    create_network_client, BlockHeader, BlockTracker, ClientError, EthRpc, NetworkClient,
    NetworkClientSpec, RpcError,
};
use xwallet_primitives::{BuiltInNetwork, ChainId, NetworkId, NetworkStatus, ProviderType};

use crate::{
    messenger::{NetworkControllerEvent, NetworkControllerMessenger},
    proxy::{EmitterProxy, EventFilter, ProviderProxy, SwappableProxy},
    store::{AnyStore, ComposedStore, ObservableStore},
    types::{
        EventReferrer, NetworkConfiguration, NetworkConfigurationId, NetworkConfigurations,
        NetworkConfigurationUpdate, NetworkControllerState, NetworkDetails, ProviderConfig,
        TrackedEvent, TrackedEventProperties, CUSTOM_NETWORK_ADDED_EVENT, EIP_1559,
        NETWORK_EVENT_CATEGORY,
    },
};

/// Builds a live client for a network descriptor.
pub type ClientFactory =
    Box<dyn Fn(&NetworkClientSpec) -> Result<NetworkClient, ClientError> + Send + Sync>;

/// Receives metrics records.
pub type TrackEventFn = Box<dyn Fn(TrackedEvent) + Send + Sync>;

/// A failed controller operation.
///
/// Only user-initiated mutations fail; probe outcomes are recorded in
/// [`NetworkStatus`], never surfaced here.
#[derive(Debug, Error)]
pub enum Error {
    /// The hosted-endpoint credential is missing.
    #[error("api key must be a non-empty string")]
    InvalidApiKey,
    /// `set_provider_type` only handles hosted networks.
    #[error("unknown built-in network: {0:?}")]
    UnknownProviderType(String),
    /// Custom endpoints are activated through their network configuration.
    #[error("custom endpoints must be activated via set_active_network")]
    RpcProviderType,
    /// No configuration with this id exists.
    #[error("no network configuration with id {0}")]
    UnknownNetworkConfiguration(NetworkConfigurationId),
    /// A provider configuration of type rpc carries no endpoint URL.
    #[error("provider configuration of type rpc has no rpc url")]
    MissingRpcUrl,
    /// The submitted RPC URL does not parse.
    #[error("invalid rpc url: {0:?}")]
    InvalidRpcUrl(String),
    /// The submitted ticker is empty.
    #[error("ticker must be provided")]
    MissingTicker,
    /// Metrics attribution requires both referrer and source.
    #[error("referrer and source must both be provided")]
    MissingEventAttribution,
    #[error(transparent)]
    Client(#[from] ClientError),
    #[error(transparent)]
    Rpc(#[from] RpcError),
}

/// Inputs of [`NetworkController::new`].
pub struct NetworkControllerOptions {
    /// The controller's slice of the wallet event bus.
    pub messenger: Arc<NetworkControllerMessenger>,
    /// Previously persisted state, if any.
    pub state: Option<NetworkControllerState>,
    /// Credential for the hosted endpoints.
    pub api_key: String,
    /// Sink for metrics records.
    pub track_event: TrackEventFn,
    /// Client constructor; `None` uses [`create_network_client`]. Tests
    /// substitute scripted clients here.
    pub client_factory: Option<ClientFactory>,
}

/// Options of [`NetworkController::upsert_network_configuration`].
pub struct UpsertNetworkOptions {
    /// Switch to the network right after saving it.
    pub set_active: bool,
    /// Page or flow the request originated from, for metrics.
    pub referrer: String,
    /// UI surface that submitted the network, for metrics.
    pub source: String,
}

/// The stable handles handed to long-lived subscribers.
#[derive(Clone)]
pub struct ProviderAndBlockTracker {
    pub provider: Option<Arc<ProviderProxy>>,
    pub block_tracker: Option<Arc<EmitterProxy<BlockTracker>>>,
}

struct ProbeOutcome {
    status: NetworkStatus,
    network_id: Option<NetworkId>,
    supports_eip1559: bool,
}

impl ProbeOutcome {
    fn with_status(status: NetworkStatus) -> Self {
        Self {
            status,
            network_id: None,
            supports_eip1559: false,
        }
    }
}

/// The wallet's network management subsystem.
///
/// Owned by the application's composition root; constructed explicitly,
/// destroyed explicitly. All state flows through the observable stores, and
/// the composed store is what the persistence layer watches.
pub struct NetworkController {
    messenger: Arc<NetworkControllerMessenger>,
    api_key: String,
    track_event: TrackEventFn,
    client_factory: ClientFactory,
    provider_store: Arc<ObservableStore<ProviderConfig>>,
    previous_provider_store: Arc<ObservableStore<ProviderConfig>>,
    network_id_store: Arc<ObservableStore<Option<NetworkId>>>,
    network_status_store: Arc<ObservableStore<NetworkStatus>>,
    network_details_store: Arc<ObservableStore<NetworkDetails>>,
    network_configurations_store: Arc<ObservableStore<NetworkConfigurations>>,
    composed_store: ComposedStore<NetworkControllerState>,
    provider_proxy: Mutex<Option<Arc<ProviderProxy>>>,
    block_tracker_proxy: Mutex<Option<Arc<EmitterProxy<BlockTracker>>>>,
    active_client: Mutex<Option<NetworkClient>>,
    weak_self: Weak<NetworkController>,
}

impl NetworkController {
    /// Wire up the stores from restored state or defaults.
    ///
    /// No network activity happens here; the first connection is made by
    /// [`initialize_provider`](Self::initialize_provider).
    pub fn new(options: NetworkControllerOptions) -> Result<Arc<Self>, Error> {
        let NetworkControllerOptions {
            messenger,
            state,
            api_key,
            track_event,
            client_factory,
        } = options;
        if api_key.trim().is_empty() {
            return Err(Error::InvalidApiKey);
        }
        let initial = state.unwrap_or_default();

        let provider_store = Arc::new(ObservableStore::new(initial.provider));
        let previous_provider_store = Arc::new(ObservableStore::new(initial.previous_provider));
        let network_id_store = Arc::new(ObservableStore::new(initial.network_id));
        let network_status_store = Arc::new(ObservableStore::new(initial.network_status));
        let network_details_store = Arc::new(ObservableStore::new(initial.network_details));
        let network_configurations_store =
            Arc::new(ObservableStore::new(initial.network_configurations));

        let composed_store = {
            let provider = provider_store.clone();
            let previous = previous_provider_store.clone();
            let network_id = network_id_store.clone();
            let status = network_status_store.clone();
            let details = network_details_store.clone();
            let configurations = network_configurations_store.clone();
            ComposedStore::new(
                move || NetworkControllerState {
                    provider: provider.get(),
                    previous_provider: previous.get(),
                    network_id: network_id.get(),
                    network_status: status.get(),
                    network_details: details.get(),
                    network_configurations: configurations.get(),
                },
                &[
                    &*provider_store,
                    &*previous_provider_store,
                    &*network_id_store,
                    &*network_status_store,
                    &*network_details_store,
                    &*network_configurations_store,
                ],
            )
        };

        Ok(Arc::new_cyclic(|weak_self| Self {
            messenger,
            api_key,
            track_event,
            client_factory: client_factory
                .unwrap_or_else(|| Box::new(|spec| create_network_client(spec))),
            provider_store,
            previous_provider_store,
            network_id_store,
            network_status_store,
            network_details_store,
            network_configurations_store,
            composed_store,
            provider_proxy: Mutex::new(None),
            block_tracker_proxy: Mutex::new(None),
            active_client: Mutex::new(None),
            weak_self: weak_self.clone(),
        }))
    }

    /// Current composite snapshot.
    pub fn state(&self) -> NetworkControllerState {
        self.composed_store.get()
    }

    /// The composed store the persistence layer subscribes to.
    pub fn store(&self) -> &ComposedStore<NetworkControllerState> {
        &self.composed_store
    }

    /// Build the client for the current configuration, install the proxies,
    /// and probe. Calling again just re-applies the latest configuration.
    pub async fn initialize_provider(&self) -> Result<(), Error> {
        let config = self.provider_store.get();
        let client = (self.client_factory)(&self.client_spec(&config)?)?;
        self.install_client(client);
        self.lookup_network().await;
        Ok(())
    }

    /// The stable proxies; both `None` until the first
    /// [`initialize_provider`](Self::initialize_provider).
    pub fn get_provider_and_block_tracker(&self) -> ProviderAndBlockTracker {
        ProviderAndBlockTracker {
            provider: self.provider_proxy.lock().clone(),
            block_tracker: self.block_tracker_proxy.lock().clone(),
        }
    }

    /// Whether the active network supports EIP-1559, probing once and
    /// memoizing the answer in the network details.
    ///
    /// Without a provider this reports `false` without touching state;
    /// callers depend on that shape.
    pub async fn get_eip1559_compatibility(&self) -> Result<bool, Error> {
        if let Some(known) = self.network_details_store.get().eip1559_support() {
            return Ok(known);
        }
        let provider = self.provider_proxy.lock().clone();
        let Some(provider) = provider else {
            return Ok(false);
        };
        let supports = match provider.latest_block().await? {
            Some(block) => block.base_fee_per_gas.is_some(),
            None => false,
        };
        self.network_details_store.update(|details| {
            details.eips.insert(EIP_1559.to_string(), supports);
        });
        Ok(supports)
    }

    /// Probe the live network and record the outcome.
    ///
    /// A switch landing while the probe is in flight wins: the stale results
    /// are discarded and the switch's own probe reports instead.
    pub async fn lookup_network(&self) {
        let config = self.provider_store.get();
        let provider = self.provider_proxy.lock().clone();
        let Some(provider) = provider else {
            log::warn!("lookup_network invoked without a provider");
            self.reset_network_state();
            return;
        };
        let is_built_in = config.kind.is_built_in();

        let network_changed = Arc::new(AtomicBool::new(false));
        let flag = network_changed.clone();
        let subscription = self.messenger.subscribe(
            NetworkControllerEvent::NetworkDidChange,
            Arc::new(move || flag.store(true, Ordering::SeqCst)),
        );

        let (version, block) = future::join(provider.net_version(), provider.latest_block()).await;
        let outcome = classify_probe(version, block);

        self.messenger
            .unsubscribe(NetworkControllerEvent::NetworkDidChange, subscription);
        if network_changed.load(Ordering::SeqCst) {
            log::debug!("network changed mid-probe, discarding results");
            return;
        }

        self.network_status_store.put(outcome.status);
        if outcome.status == NetworkStatus::Available {
            self.network_id_store.put(outcome.network_id);
            let supports = outcome.supports_eip1559;
            self.network_details_store.update(|details| {
                details.eips.insert(EIP_1559.to_string(), supports);
            });
        } else {
            self.network_id_store.put(None);
            self.network_details_store.put(NetworkDetails::default());
        }

        match (is_built_in, outcome.status) {
            (true, NetworkStatus::Available) => self
                .messenger
                .publish(NetworkControllerEvent::InfuraIsUnblocked),
            (true, NetworkStatus::Blocked) => self
                .messenger
                .publish(NetworkControllerEvent::InfuraIsBlocked),
            (true, _) => {}
            // Leaving the hosted endpoint clears any latched blocked state.
            (false, _) => self
                .messenger
                .publish(NetworkControllerEvent::InfuraIsUnblocked),
        }
    }

    /// Switch to a saved custom network; returns its RPC URL.
    pub fn set_active_network(
        &self,
        id: NetworkConfigurationId,
    ) -> Result<String, Error> {
        let configuration = self
            .network_configurations_store
            .get()
            .get(&id)
            .cloned()
            .ok_or(Error::UnknownNetworkConfiguration(id))?;
        self.set_provider_config(ProviderConfig::from_configuration(&configuration))?;
        Ok(configuration.rpc_url)
    }

    /// Switch to a hosted network by short name.
    pub fn set_provider_type(&self, name: &str) -> Result<(), Error> {
        if name == "rpc" {
            return Err(Error::RpcProviderType);
        }
        let network = BuiltInNetwork::from_name(name)
            .ok_or_else(|| Error::UnknownProviderType(name.to_string()))?;
        self.set_provider_config(ProviderConfig::built_in(network))
    }

    /// Tear down and rebuild the connection for the current configuration.
    ///
    /// Snapshots into the previous-provider store like any other switch, so
    /// a rollback after a reset stays on the reset configuration.
    pub fn reset_connection(&self) -> Result<(), Error> {
        let config = self.provider_store.get();
        self.set_provider_config(config)
    }

    /// Return to the provider active before the last switch.
    ///
    /// The current provider is not snapshotted first: rolling back twice
    /// lands on the provider before the previous one, it does not oscillate.
    pub fn rollback_to_previous_provider(&self) -> Result<(), Error> {
        let config = self.previous_provider_store.get();
        self.provider_store.put(config.clone());
        self.switch_network(&config)
    }

    /// Save a custom network, keyed case-insensitively by URL.
    ///
    /// A URL seen before keeps its id and only updates the record; a new URL
    /// mints an id and reports a metrics event. With `set_active` the
    /// network is switched to immediately. Returns the configuration id.
    pub fn upsert_network_configuration(
        &self,
        update: NetworkConfigurationUpdate,
        options: UpsertNetworkOptions,
    ) -> Result<NetworkConfigurationId, Error> {
        url::Url::parse(&update.rpc_url)
            .map_err(|_| Error::InvalidRpcUrl(update.rpc_url.clone()))?;
        if update.ticker.trim().is_empty() {
            return Err(Error::MissingTicker);
        }
        if options.referrer.trim().is_empty() || options.source.trim().is_empty() {
            return Err(Error::MissingEventAttribution);
        }

        let existing_id = self
            .network_configurations_store
            .get()
            .values()
            .find(|configuration| configuration.rpc_url.eq_ignore_ascii_case(&update.rpc_url))
            .map(|configuration| configuration.id);
        let id = existing_id.unwrap_or_else(Uuid::new_v4);

        let configuration = NetworkConfiguration {
            id,
            rpc_url: update.rpc_url,
            chain_id: update.chain_id.clone(),
            ticker: update.ticker.clone(),
            nickname: update.nickname,
            rpc_prefs: update.rpc_prefs,
        };
        self.network_configurations_store.update(|configurations| {
            configurations.insert(id, configuration);
        });

        if existing_id.is_none() {
            (self.track_event)(TrackedEvent {
                event: CUSTOM_NETWORK_ADDED_EVENT.to_string(),
                category: NETWORK_EVENT_CATEGORY.to_string(),
                referrer: EventReferrer {
                    url: options.referrer,
                },
                properties: TrackedEventProperties {
                    chain_id: update.chain_id,
                    symbol: update.ticker,
                    source: options.source,
                },
            });
        }

        if options.set_active {
            self.set_active_network(id)?;
        }
        Ok(id)
    }

    /// Drop a saved network. Unknown ids are ignored, and the live
    /// connection is left untouched even when it points at the removed
    /// entry; switching away is the caller's job.
    pub fn remove_network_configuration(&self, id: NetworkConfigurationId) {
        self.network_configurations_store.update(|configurations| {
            configurations.remove(&id);
        });
    }

    /// Find a saved network by chain id.
    pub fn find_network_configuration_by_chain_id(
        &self,
        chain_id: &ChainId,
    ) -> Option<NetworkConfiguration> {
        self.network_configurations_store
            .get()
            .into_values()
            .find(|configuration| &configuration.chain_id == chain_id)
    }

    /// Stop the block tracker's polling task. In-flight requests are not
    /// aborted.
    pub async fn destroy(&self) -> Result<(), Error> {
        let client = self.active_client.lock().take();
        if let Some(client) = client {
            client.block_tracker.destroy().await?;
        }
        Ok(())
    }

    fn set_provider_config(&self, config: ProviderConfig) -> Result<(), Error> {
        self.previous_provider_store.put(self.provider_store.get());
        self.provider_store.put(config.clone());
        self.switch_network(&config)
    }

    /// The switch sequence: `NetworkWillChange`, derived-state reset, proxy
    /// retarget, `NetworkDidChange`, then a fresh probe (not awaited).
    fn switch_network(&self, config: &ProviderConfig) -> Result<(), Error> {
        let client = (self.client_factory)(&self.client_spec(config)?)?;
        self.messenger
            .publish(NetworkControllerEvent::NetworkWillChange);
        self.reset_network_state();
        self.install_client(client);
        self.messenger
            .publish(NetworkControllerEvent::NetworkDidChange);
        if let Some(controller) = self.weak_self.upgrade() {
            tokio::spawn(async move { controller.lookup_network().await });
        }
        Ok(())
    }

    fn install_client(&self, client: NetworkClient) {
        {
            let mut proxy = self.provider_proxy.lock();
            match proxy.as_ref() {
                Some(existing) => existing.set_target(client.provider.clone()),
                None => *proxy = Some(Arc::new(SwappableProxy::new(client.provider.clone()))),
            }
        }
        {
            let mut proxy = self.block_tracker_proxy.lock();
            match proxy.as_ref() {
                Some(existing) => existing.set_target(client.block_tracker.clone()),
                None => {
                    *proxy = Some(Arc::new(EmitterProxy::new(
                        client.block_tracker.clone(),
                        EventFilter::SkipInternal,
                    )))
                }
            }
        }
        *self.active_client.lock() = Some(client);
    }

    fn reset_network_state(&self) {
        self.network_id_store.put(None);
        self.network_status_store.put(NetworkStatus::default());
        self.network_details_store.put(NetworkDetails::default());
    }

    fn client_spec(&self, config: &ProviderConfig) -> Result<NetworkClientSpec, Error> {
        match config.kind {
            ProviderType::BuiltIn(network) => Ok(NetworkClientSpec::BuiltIn {
                network,
                api_key: self.api_key.clone(),
            }),
            ProviderType::Rpc => {
                let rpc_url = config.rpc_url.clone().ok_or(Error::MissingRpcUrl)?;
                Ok(NetworkClientSpec::Custom {
                    rpc_url,
                    chain_id: config.chain_id.clone(),
                })
            }
        }
    }
}

fn classify_probe(
    version: Result<String, RpcError>,
    block: Result<Option<BlockHeader>, RpcError>,
) -> ProbeOutcome {
    match (version, block) {
        (Ok(version), Ok(block)) => match NetworkId::new(&version) {
            Ok(network_id) => ProbeOutcome {
                status: NetworkStatus::Available,
                network_id: Some(network_id),
                supports_eip1559: block
                    .map(|header| header.base_fee_per_gas.is_some())
                    .unwrap_or(false),
            },
            Err(_) => {
                log::warn!("could not classify probe outcome: net_version returned {version:?}");
                ProbeOutcome::with_status(NetworkStatus::Unknown)
            }
        },
        (Err(err), _) | (_, Err(err)) => ProbeOutcome::with_status(classify_probe_error(&err)),
    }
}

fn classify_probe_error(err: &RpcError) -> NetworkStatus {
    if err.is_country_blocked() {
        return NetworkStatus::Blocked;
    }
    if err.is_internal() {
        return NetworkStatus::Unknown;
    }
    match err {
        RpcError::UnexpectedResponse(detail) => {
            log::warn!("could not classify probe failure: {detail}");
            NetworkStatus::Unknown
        }
        _ => NetworkStatus::Unavailable,
    }
}
