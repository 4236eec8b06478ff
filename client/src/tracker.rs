// Copyright 2019-2023 ChainX Project Authors. Licensed under GPL-3.0.

//! Polling block tracker.

use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Weak,
    },
    time::Duration,
};

use parking_lot::Mutex;
use serde_json::{json, Value};
use tokio::{sync::Notify, task::JoinHandle};

use crate::{
    emitter::{EventEmitter, Evented, Listener, ListenerId},
    error::{ClientError, RpcError},
    transport::{EthRpc, RpcProvider},
};

/// Fired with the hex head number whenever the chain head advances.
pub const LATEST_EVENT: &str = "latest";
/// Fired with `{ oldBlock, newBlock }` alongside `latest`.
pub const SYNC_EVENT: &str = "sync";
/// Fired with the error text when a poll fails.
pub const ERROR_EVENT: &str = "error";
/// Internal lifecycle marker: the polling task came up.
pub const STARTED_EVENT: &str = "_started";
/// Internal lifecycle marker: the polling task wound down.
pub const ENDED_EVENT: &str = "_ended";

/// Cadence of the head poll.
pub const DEFAULT_POLLING_INTERVAL: Duration = Duration::from_secs(20);

/// Polls `eth_blockNumber` and fans the advancing head out to listeners.
///
/// The poll task is lazy: it spawns with the first `latest`/`sync` listener,
/// winds down when the last of them detaches, and is joined by
/// [`BlockTracker::destroy`].
pub struct BlockTracker {
    provider: Arc<dyn RpcProvider>,
    interval: Duration,
    emitter: EventEmitter,
    current_block: Mutex<Option<String>>,
    running: AtomicBool,
    destroyed: AtomicBool,
    wake: Notify,
    task: Mutex<Option<JoinHandle<()>>>,
    weak_self: Weak<BlockTracker>,
}

impl BlockTracker {
    pub fn new(provider: Arc<dyn RpcProvider>) -> Arc<Self> {
        Self::with_interval(provider, DEFAULT_POLLING_INTERVAL)
    }

    pub fn with_interval(provider: Arc<dyn RpcProvider>, interval: Duration) -> Arc<Self> {
        Arc::new_cyclic(|weak_self| Self {
            provider,
            interval,
            emitter: EventEmitter::new(),
            current_block: Mutex::new(None),
            running: AtomicBool::new(false),
            destroyed: AtomicBool::new(false),
            wake: Notify::new(),
            task: Mutex::new(None),
            weak_self: weak_self.clone(),
        })
    }

    /// The most recent head seen, once a poll has succeeded.
    pub fn current_block(&self) -> Option<String> {
        self.current_block.lock().clone()
    }

    /// Poll once immediately, outside the regular cadence.
    pub async fn check_for_latest_block(&self) -> Result<String, RpcError> {
        let latest = self.provider.block_number().await?;
        self.apply_latest(&latest);
        Ok(latest)
    }

    /// Stop polling and wait for the task to wind down.
    ///
    /// An in-flight poll request is left to finish on its own.
    pub async fn destroy(&self) -> Result<(), ClientError> {
        self.destroyed.store(true, Ordering::SeqCst);
        self.running.store(false, Ordering::SeqCst);
        self.wake.notify_one();
        let task = self.task.lock().take();
        if let Some(task) = task {
            task.await
                .map_err(|err| ClientError::Shutdown(err.to_string()))?;
        }
        Ok(())
    }

    fn start_if_needed(&self) {
        if self.destroyed.load(Ordering::SeqCst) {
            return;
        }
        if self.running.swap(true, Ordering::SeqCst) {
            return;
        }
        if let Some(tracker) = self.weak_self.upgrade() {
            let task = tokio::spawn(tracker.poll_loop());
            *self.task.lock() = Some(task);
        }
    }

    fn stop_if_idle(&self) {
        if self.emitter.listener_count(LATEST_EVENT) == 0
            && self.emitter.listener_count(SYNC_EVENT) == 0
        {
            self.running.store(false, Ordering::SeqCst);
            self.wake.notify_one();
        }
    }

    async fn poll_loop(self: Arc<Self>) {
        self.emitter.emit(STARTED_EVENT, &Value::Null);
        while self.running.load(Ordering::SeqCst) {
            match self.provider.block_number().await {
                Ok(latest) => self.apply_latest(&latest),
                Err(err) => {
                    log::warn!("block tracker poll failed: {err}");
                    self.emitter.emit(ERROR_EVENT, &json!(err.to_string()));
                }
            }
            if !self.running.load(Ordering::SeqCst) {
                break;
            }
            tokio::select! {
                _ = tokio::time::sleep(self.interval) => {}
                _ = self.wake.notified() => {}
            }
        }
        self.emitter.emit(ENDED_EVENT, &Value::Null);
    }

    fn apply_latest(&self, latest: &str) {
        let old = {
            let mut current = self.current_block.lock();
            if current.as_deref() == Some(latest) {
                return;
            }
            current.replace(latest.to_string())
        };
        self.emitter.emit(LATEST_EVENT, &json!(latest));
        self.emitter
            .emit(SYNC_EVENT, &json!({ "oldBlock": old, "newBlock": latest }));
    }
}

impl Evented for BlockTracker {
    fn on(&self, event: &str, listener: Listener) -> ListenerId {
        let id = self.emitter.on(event, listener);
        if event == LATEST_EVENT || event == SYNC_EVENT {
            self.start_if_needed();
        }
        id
    }

    fn off(&self, event: &str, id: ListenerId) -> bool {
        let removed = self.emitter.off(event, id);
        if removed {
            self.stop_if_idle();
        }
        removed
    }

    fn emit(&self, event: &str, payload: &Value) -> usize {
        self.emitter.emit(event, payload)
    }
}
