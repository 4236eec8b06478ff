// Copyright 2019-2023 ChainX Project Authors. Licensed under GPL-3.0.

//! Observable single-value stores and their composition.

use std::{
    panic::{catch_unwind, AssertUnwindSafe},
    sync::Arc,
};

use parking_lot::Mutex;

/// Handle identifying one subscriber.
#[derive(PartialEq, Eq, Clone, Copy, Debug, Hash)]
pub struct SubscriptionId(pub(crate) u64);

/// A subscriber to value changes.
pub type StoreListener<S> = Arc<dyn Fn(&S) + Send + Sync>;

/// Type-erased change notification.
pub type ChangeListener = Arc<dyn Fn() + Send + Sync>;

struct Subscribers<S> {
    next_id: u64,
    list: Vec<(SubscriptionId, StoreListener<S>)>,
}

/// A single-value observable cell.
///
/// Writes notify subscribers in subscription order, synchronously on the
/// writing task, and only when the value actually changed. A panicking
/// subscriber does not stop the remaining ones.
pub struct ObservableStore<S> {
    value: Mutex<S>,
    subscribers: Mutex<Subscribers<S>>,
}

impl<S: Clone + PartialEq + 'static> ObservableStore<S> {
    pub fn new(initial: S) -> Self {
        Self {
            value: Mutex::new(initial),
            subscribers: Mutex::new(Subscribers {
                next_id: 0,
                list: Vec::new(),
            }),
        }
    }

    pub fn get(&self) -> S {
        self.value.lock().clone()
    }

    /// Replace the value, notifying subscribers if it changed.
    pub fn put(&self, next: S) {
        let changed = {
            let mut value = self.value.lock();
            if *value == next {
                false
            } else {
                *value = next.clone();
                true
            }
        };
        if changed {
            self.notify(&next);
        }
    }

    /// Mutate the value in place, then behave as `put`.
    pub fn update(&self, patch: impl FnOnce(&mut S)) {
        let next = {
            let mut value = self.value.lock();
            let prior = value.clone();
            patch(&mut value);
            if *value == prior {
                None
            } else {
                Some(value.clone())
            }
        };
        if let Some(next) = next {
            self.notify(&next);
        }
    }

    pub fn subscribe(&self, listener: StoreListener<S>) -> SubscriptionId {
        let mut subscribers = self.subscribers.lock();
        subscribers.next_id += 1;
        let id = SubscriptionId(subscribers.next_id);
        subscribers.list.push((id, listener));
        id
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut subscribers = self.subscribers.lock();
        let before = subscribers.list.len();
        subscribers.list.retain(|(subscriber_id, _)| *subscriber_id != id);
        before != subscribers.list.len()
    }

    fn notify(&self, value: &S) {
        let listeners: Vec<StoreListener<S>> = self
            .subscribers
            .lock()
            .list
            .iter()
            .map(|(_, listener)| listener.clone())
            .collect();
        for listener in listeners {
            if catch_unwind(AssertUnwindSafe(|| listener(value))).is_err() {
                log::error!("store subscriber panicked");
            }
        }
    }
}

/// Change-only view of a store, for composition across value types.
pub trait AnyStore: Send + Sync {
    fn subscribe_change(&self, listener: ChangeListener) -> SubscriptionId;
}

impl<S: Clone + PartialEq + Send + Sync + 'static> AnyStore for ObservableStore<S> {
    fn subscribe_change(&self, listener: ChangeListener) -> SubscriptionId {
        self.subscribe(Arc::new(move |_| listener()))
    }
}

/// Read-only observable assembling a composite record from child stores.
pub struct ComposedStore<S> {
    inner: Arc<ObservableStore<S>>,
}

impl<S: Clone + PartialEq + Send + Sync + 'static> ComposedStore<S> {
    /// `read` assembles the composite; any child change triggers a re-read.
    pub fn new(read: impl Fn() -> S + Send + Sync + 'static, children: &[&dyn AnyStore]) -> Self {
        let read = Arc::new(read);
        let inner = Arc::new(ObservableStore::new(read()));
        for child in children {
            let inner = inner.clone();
            let read = read.clone();
            child.subscribe_change(Arc::new(move || inner.put(read())));
        }
        Self { inner }
    }

    pub fn get(&self) -> S {
        self.inner.get()
    }

    pub fn subscribe(&self, listener: StoreListener<S>) -> SubscriptionId {
        self.inner.subscribe(listener)
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.inner.unsubscribe(id)
    }
}
