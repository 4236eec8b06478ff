// Copyright 2019-2023 ChainX Project Authors. Licensed under GPL-3.0.

//! Test fixtures: scripted RPC endpoints and a controller builder.

use std::{
    collections::{HashMap, VecDeque},
    sync::Arc,
    time::Duration,
};

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{json, Value};
use tokio::sync::Notify;

use xwallet_network_client::{BlockTracker, NetworkClient, NetworkClientSpec, RpcError, RpcProvider};

use crate::{
    messenger::{NetworkControllerEvent, NetworkControllerMessenger},
    types::{NetworkControllerState, ProviderConfig, TrackedEvent},
    ClientFactory, NetworkController, NetworkControllerOptions,
};

pub(crate) const TEST_API_KEY: &str = "test-key";

/// A scripted JSON-RPC endpoint.
///
/// Responses queue per method; the last queued response repeats. Methods
/// without a script fall back to [`default_response`]. A gated method blocks
/// until the gate is released once per call.
pub struct MockRpc {
    responses: Mutex<HashMap<String, VecDeque<Result<Value, RpcError>>>>,
    gates: Mutex<HashMap<String, Arc<Notify>>>,
    calls: Mutex<Vec<String>>,
}

impl MockRpc {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            responses: Mutex::new(HashMap::new()),
            gates: Mutex::new(HashMap::new()),
            calls: Mutex::new(Vec::new()),
        })
    }

    /// Queue a response for a method.
    pub fn respond(&self, method: &str, response: Result<Value, RpcError>) {
        self.responses
            .lock()
            .entry(method.to_string())
            .or_default()
            .push_back(response);
    }

    /// Make a method block until the returned gate is notified.
    pub fn gate(&self, method: &str) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        self.gates.lock().insert(method.to_string(), gate.clone());
        gate
    }

    pub fn calls(&self, method: &str) -> usize {
        self.calls.lock().iter().filter(|m| *m == method).count()
    }
}

fn default_response(method: &str) -> Result<Value, RpcError> {
    match method {
        "eth_blockNumber" => Ok(json!("0x1")),
        _ => Err(RpcError::Transport(format!("no mock response for {method}"))),
    }
}

#[async_trait]
impl RpcProvider for MockRpc {
    async fn request(&self, method: &str, _params: Vec<Value>) -> Result<Value, RpcError> {
        self.calls.lock().push(method.to_string());
        let gate = self.gates.lock().get(method).cloned();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        let scripted = {
            let mut responses = self.responses.lock();
            match responses.get_mut(method) {
                Some(queue) if queue.len() > 1 => queue.pop_front(),
                Some(queue) => queue.front().cloned(),
                None => None,
            }
        };
        scripted.unwrap_or_else(|| default_response(method))
    }
}

/// An endpoint that answers both probe calls successfully.
pub fn healthy_rpc(network_version: &str, base_fee: bool) -> Arc<MockRpc> {
    let rpc = MockRpc::new();
    rpc.respond("net_version", Ok(json!(network_version)));
    let block = if base_fee {
        json!({ "number": "0x1", "baseFeePerGas": "0x1" })
    } else {
        json!({ "number": "0x1" })
    };
    rpc.respond("eth_getBlockByNumber", Ok(block));
    rpc
}

/// The error shape of a geo-blocked hosted endpoint.
pub fn country_blocked_error() -> RpcError {
    RpcError::Rpc {
        code: -32005,
        message: r#"{"error":"countryBlocked"}"#.to_string(),
        data: None,
    }
}

/// A controller wired to scripted endpoints, plus the recorders.
pub struct TestContext {
    pub controller: Arc<NetworkController>,
    pub messenger: Arc<NetworkControllerMessenger>,
    pub events: Arc<Mutex<Vec<NetworkControllerEvent>>>,
    pub tracked: Arc<Mutex<Vec<TrackedEvent>>>,
    pub factory_specs: Arc<Mutex<Vec<NetworkClientSpec>>>,
}

impl TestContext {
    pub fn events(&self) -> Vec<NetworkControllerEvent> {
        self.events.lock().clone()
    }
}

/// Builder for [`TestContext`]; scripted endpoints are consumed in switch
/// order, after which every client gets a fresh healthy endpoint.
pub struct ExtBuilder {
    state: Option<NetworkControllerState>,
    rpcs: VecDeque<Arc<MockRpc>>,
}

impl Default for ExtBuilder {
    fn default() -> Self {
        Self {
            state: None,
            rpcs: VecDeque::new(),
        }
    }
}

impl ExtBuilder {
    pub fn with_state(mut self, state: NetworkControllerState) -> Self {
        self.state = Some(state);
        self
    }

    pub fn with_provider(self, provider: ProviderConfig) -> Self {
        let state = NetworkControllerState {
            previous_provider: provider.clone(),
            provider,
            ..NetworkControllerState::default()
        };
        self.with_state(state)
    }

    pub fn with_rpc(mut self, rpc: Arc<MockRpc>) -> Self {
        self.rpcs.push_back(rpc);
        self
    }

    pub fn build(self) -> TestContext {
        let messenger = Arc::new(NetworkControllerMessenger::new());
        let events = Arc::new(Mutex::new(Vec::new()));
        for event in [
            NetworkControllerEvent::NetworkWillChange,
            NetworkControllerEvent::NetworkDidChange,
            NetworkControllerEvent::InfuraIsBlocked,
            NetworkControllerEvent::InfuraIsUnblocked,
        ] {
            let events = events.clone();
            messenger.subscribe(event, Arc::new(move || events.lock().push(event)));
        }

        let tracked = Arc::new(Mutex::new(Vec::new()));
        let tracked_sink = tracked.clone();
        let factory_specs = Arc::new(Mutex::new(Vec::new()));
        let specs = factory_specs.clone();
        let rpcs = Arc::new(Mutex::new(self.rpcs));
        let factory: ClientFactory = Box::new(move |spec| {
            specs.lock().push(spec.clone());
            let rpc = rpcs
                .lock()
                .pop_front()
                .unwrap_or_else(|| healthy_rpc("1", true));
            let provider: Arc<dyn RpcProvider> = rpc;
            let block_tracker = BlockTracker::with_interval(provider.clone(), Duration::from_secs(1));
            Ok(NetworkClient {
                provider,
                block_tracker,
            })
        });

        let controller = NetworkController::new(NetworkControllerOptions {
            messenger: messenger.clone(),
            state: self.state,
            api_key: TEST_API_KEY.to_string(),
            track_event: Box::new(move |event| tracked_sink.lock().push(event)),
            client_factory: Some(factory),
        })
        .expect("test controller construction");

        TestContext {
            controller,
            messenger,
            events,
            tracked,
            factory_specs,
        }
    }
}

/// Let spawned probes and tracker tasks run.
pub async fn settle() {
    for _ in 0..32 {
        tokio::task::yield_now().await;
    }
}
