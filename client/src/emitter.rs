// Copyright 2019-2023 ChainX Project Authors. Licensed under GPL-3.0.

//! A small synchronous event emitter.

use std::{collections::HashMap, sync::Arc};

use parking_lot::Mutex;
use serde_json::Value;

/// Names starting with this marker denote target-private lifecycle signals.
pub const INTERNAL_EVENT_MARKER: char = '_';

/// True for target-private lifecycle events.
pub fn is_internal_event(event: &str) -> bool {
    event.starts_with(INTERNAL_EVENT_MARKER)
}

/// A callback registered for a named event.
pub type Listener = Arc<dyn Fn(&Value) + Send + Sync>;

/// Handle identifying one registered listener.
#[derive(PartialEq, Eq, Clone, Copy, Debug, Hash)]
pub struct ListenerId(u64);

/// Anything listeners can be attached to by event name.
pub trait Evented: Send + Sync {
    fn on(&self, event: &str, listener: Listener) -> ListenerId;
    fn off(&self, event: &str, id: ListenerId) -> bool;
    fn emit(&self, event: &str, payload: &Value) -> usize;
}

#[derive(Default)]
struct Registry {
    next_id: u64,
    listeners: HashMap<String, Vec<(ListenerId, Listener)>>,
}

/// Synchronous name-to-listeners fan-out.
#[derive(Default)]
pub struct EventEmitter {
    registry: Mutex<Registry>,
}

impl EventEmitter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on(&self, event: &str, listener: Listener) -> ListenerId {
        let mut registry = self.registry.lock();
        registry.next_id += 1;
        let id = ListenerId(registry.next_id);
        registry
            .listeners
            .entry(event.to_string())
            .or_default()
            .push((id, listener));
        id
    }

    pub fn off(&self, event: &str, id: ListenerId) -> bool {
        let mut registry = self.registry.lock();
        match registry.listeners.get_mut(event) {
            Some(list) => {
                let before = list.len();
                list.retain(|(listener_id, _)| *listener_id != id);
                before != list.len()
            }
            None => false,
        }
    }

    /// Invoke every listener in registration order; returns how many ran.
    ///
    /// The registry lock is released first, so listeners may register or
    /// remove listeners while running.
    pub fn emit(&self, event: &str, payload: &Value) -> usize {
        let listeners: Vec<Listener> = self
            .registry
            .lock()
            .listeners
            .get(event)
            .map(|list| list.iter().map(|(_, listener)| listener.clone()).collect())
            .unwrap_or_default();
        for listener in &listeners {
            listener(payload);
        }
        listeners.len()
    }

    pub fn listener_count(&self, event: &str) -> usize {
        self.registry
            .lock()
            .listeners
            .get(event)
            .map(Vec::len)
            .unwrap_or(0)
    }
}

impl Evented for EventEmitter {
    fn on(&self, event: &str, listener: Listener) -> ListenerId {
        EventEmitter::on(self, event, listener)
    }

    fn off(&self, event: &str, id: ListenerId) -> bool {
        EventEmitter::off(self, event, id)
    }

    fn emit(&self, event: &str, payload: &Value) -> usize {
        EventEmitter::emit(self, event, payload)
    }
}
