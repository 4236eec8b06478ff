// Copyright 2019-2023 ChainX Project Authors. Licensed under GPL-3.0.

//! Restricted synchronous event bus.

use std::{collections::HashMap, hash::Hash, sync::Arc};

use parking_lot::Mutex;

use crate::store::SubscriptionId;

/// A parameterless event callback.
pub type EventListener = Arc<dyn Fn() + Send + Sync>;

struct Registrations<E> {
    next_id: u64,
    subscribers: HashMap<E, Vec<(SubscriptionId, EventListener)>>,
}

/// Synchronous publish/subscribe over a closed event set.
///
/// Subscribers run on the publishing task, in subscription order.
pub struct Messenger<E> {
    inner: Mutex<Registrations<E>>,
}

impl<E: Eq + Hash + Copy> Messenger<E> {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Registrations {
                next_id: 0,
                subscribers: HashMap::new(),
            }),
        }
    }

    pub fn publish(&self, event: E) {
        let listeners: Vec<EventListener> = self
            .inner
            .lock()
            .subscribers
            .get(&event)
            .map(|list| list.iter().map(|(_, listener)| listener.clone()).collect())
            .unwrap_or_default();
        for listener in listeners {
            listener();
        }
    }

    pub fn subscribe(&self, event: E, listener: EventListener) -> SubscriptionId {
        let mut inner = self.inner.lock();
        inner.next_id += 1;
        let id = SubscriptionId(inner.next_id);
        inner
            .subscribers
            .entry(event)
            .or_default()
            .push((id, listener));
        id
    }

    pub fn unsubscribe(&self, event: E, id: SubscriptionId) -> bool {
        let mut inner = self.inner.lock();
        match inner.subscribers.get_mut(&event) {
            Some(list) => {
                let before = list.len();
                list.retain(|(subscriber_id, _)| *subscriber_id != id);
                before != list.len()
            }
            None => false,
        }
    }
}

impl<E: Eq + Hash + Copy> Default for Messenger<E> {
    fn default() -> Self {
        Self::new()
    }
}

/// Events the network controller publishes. None carries a payload.
#[derive(PartialEq, Eq, Clone, Copy, Debug, Hash)]
pub enum NetworkControllerEvent {
    /// A switch is about to tear down the current connection.
    NetworkWillChange,
    /// The proxies now point at the new connection.
    NetworkDidChange,
    /// The hosted endpoint is geo-blocking the user.
    InfuraIsBlocked,
    /// The active network is anything other than a blocked hosted endpoint.
    InfuraIsUnblocked,
}

/// The controller's namespaced slice of the wallet bus.
pub type NetworkControllerMessenger = Messenger<NetworkControllerEvent>;
