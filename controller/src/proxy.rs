// Copyright 2019-2023 ChainX Project Authors. Licensed under GPL-3.0.

//! Swappable proxies handed to long-lived subscribers.
//!
//! Subscribers capture a proxy once; the controller retargets it on every
//! network switch and the captured reference keeps working.

use std::sync::{
    atomic::{AtomicBool, AtomicU64, Ordering},
    Arc, Weak,
};

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use serde_json::Value;

use xwallet_network_client::{is_internal_event, Evented, Listener, ListenerId, RpcError, RpcProvider};

/// A stable façade whose backing target can be replaced atomically.
pub struct SwappableProxy<T: ?Sized> {
    target: RwLock<Arc<T>>,
}

impl<T: ?Sized> SwappableProxy<T> {
    pub fn new(target: Arc<T>) -> Self {
        Self {
            target: RwLock::new(target),
        }
    }

    /// Replace the backing target.
    pub fn set_target(&self, target: Arc<T>) {
        *self.target.write() = target;
    }

    /// The current backing target.
    pub fn target(&self) -> Arc<T> {
        self.target.read().clone()
    }
}

/// The provider façade. Requests dispatch against the target current at call
/// time, not the one current when the proxy was captured.
pub type ProviderProxy = SwappableProxy<dyn RpcProvider>;

#[async_trait]
impl RpcProvider for SwappableProxy<dyn RpcProvider> {
    async fn request(&self, method: &str, params: Vec<Value>) -> Result<Value, RpcError> {
        let target = self.target();
        target.request(method, params).await
    }
}

/// Whether target-private events participate in rebinding.
#[derive(PartialEq, Eq, Clone, Copy, Debug)]
pub enum EventFilter {
    /// Ledger every subscription.
    All,
    /// Leave `_`-prefixed events bound to the target they were registered on.
    SkipInternal,
}

/// Handle for a subscription made through an [`EmitterProxy`].
#[derive(PartialEq, Eq, Clone, Copy, Debug, Hash)]
pub struct ProxySubscription(u64);

struct LedgerEntry<T: ?Sized> {
    id: ProxySubscription,
    event: String,
    /// The listener as bound (for `once`, the self-disarming wrapper).
    listener: Listener,
    bound: ListenerId,
    bound_target: Weak<T>,
    rebind: bool,
    once: bool,
    spent: Arc<AtomicBool>,
}

/// Event-emitter façade: listeners registered here survive target swaps.
///
/// Every subscription is recorded in a ledger; `set_target` detaches each
/// recorded listener from the old target before attaching it to the new one,
/// so a subscriber never hears the old target again and never misses the new.
pub struct EmitterProxy<T: Evented + ?Sized> {
    target: RwLock<Arc<T>>,
    filter: EventFilter,
    ledger: Mutex<Vec<LedgerEntry<T>>>,
    next_id: AtomicU64,
}

impl<T: Evented + ?Sized> EmitterProxy<T> {
    pub fn new(target: Arc<T>, filter: EventFilter) -> Self {
        Self {
            target: RwLock::new(target),
            filter,
            ledger: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(0),
        }
    }

    /// The current backing target.
    pub fn target(&self) -> Arc<T> {
        self.target.read().clone()
    }

    /// Subscribe through the proxy.
    pub fn on(&self, event: &str, listener: Listener) -> ProxySubscription {
        self.attach(event, listener, false)
    }

    /// Subscribe for a single delivery.
    pub fn once(&self, event: &str, listener: Listener) -> ProxySubscription {
        self.attach(event, listener, true)
    }

    /// Emit on the current target.
    pub fn emit(&self, event: &str, payload: &Value) -> usize {
        self.target().emit(event, payload)
    }

    fn attach(&self, event: &str, user: Listener, once: bool) -> ProxySubscription {
        let id = ProxySubscription(self.next_id.fetch_add(1, Ordering::Relaxed) + 1);
        let spent = Arc::new(AtomicBool::new(false));
        let listener: Listener = if once {
            let spent = spent.clone();
            Arc::new(move |payload| {
                if !spent.swap(true, Ordering::SeqCst) {
                    user(payload);
                }
            })
        } else {
            user
        };
        let target = self.target();
        let bound = target.on(event, listener.clone());
        let rebind = !(self.filter == EventFilter::SkipInternal && is_internal_event(event));
        self.ledger.lock().push(LedgerEntry {
            id,
            event: event.to_string(),
            listener,
            bound,
            bound_target: Arc::downgrade(&target),
            rebind,
            once,
            spent,
        });
        id
    }

    /// Remove a subscription made through the proxy.
    pub fn off(&self, id: ProxySubscription) -> bool {
        let entry = {
            let mut ledger = self.ledger.lock();
            ledger
                .iter()
                .position(|entry| entry.id == id)
                .map(|index| ledger.remove(index))
        };
        match entry {
            Some(entry) => {
                if let Some(target) = entry.bound_target.upgrade() {
                    target.off(&entry.event, entry.bound);
                }
                true
            }
            None => false,
        }
    }

    /// Swap the backing target, migrating every ledgered listener.
    ///
    /// Listeners are detached from the old target first, so no duplicate
    /// delivery can occur. Fired `once` entries are dropped instead of
    /// migrated.
    pub fn set_target(&self, new_target: Arc<T>) {
        let mut ledger = self.ledger.lock();
        let mut target = self.target.write();
        ledger.retain(|entry| !(entry.once && entry.spent.load(Ordering::SeqCst)));
        for entry in ledger.iter_mut() {
            if !entry.rebind {
                continue;
            }
            if let Some(old) = entry.bound_target.upgrade() {
                old.off(&entry.event, entry.bound);
            }
            entry.bound = new_target.on(&entry.event, entry.listener.clone());
            entry.bound_target = Arc::downgrade(&new_target);
        }
        *target = new_target;
    }
}
