//! Session-wide notification channel.
//!
//! One subscription to the node's event stream is shared by every test in a
//! session. A dispatcher task routes each event to the waiters registered for
//! its (address, hash) pair; events nobody waits for are dropped.

use std::collections::HashMap;
use std::sync::Arc;

use futures::StreamExt;
use parking_lot::Mutex;
use tokio::sync::{oneshot, Mutex as AsyncMutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::client::{EventSource, EventStream};
use crate::error::{HarnessError, HarnessResult};
use crate::identity::Address;
use crate::transaction::{TransactionEvent, TransactionHash};

type WaiterKey = (Address, TransactionHash);
type WaiterMap = HashMap<WaiterKey, Vec<oneshot::Sender<TransactionEvent>>>;

enum ChannelState {
    Closed,
    Open { dispatcher: JoinHandle<()> },
}

/// Waiters plus whether a live stream can still resolve them. `accepting`
/// drops to false when the stream ends, under the same lock that fails the
/// waiters, so no waiter can slip in after the last event.
#[derive(Default)]
struct Registry {
    accepting: bool,
    waiters: WaiterMap,
}

pub struct NotificationChannel {
    source: Arc<dyn EventSource>,
    state: AsyncMutex<ChannelState>,
    registry: Arc<Mutex<Registry>>,
}

impl NotificationChannel {
    pub fn new(source: Arc<dyn EventSource>) -> Self {
        Self {
            source,
            state: AsyncMutex::new(ChannelState::Closed),
            registry: Arc::new(Mutex::new(Registry::default())),
        }
    }

    /// Subscribes to the event stream. Fails with `ChannelAlreadyOpen` rather
    /// than subscribing a second time. A channel whose stream ended is not
    /// open and subscribes again.
    pub async fn open(&self) -> HarnessResult<()> {
        let mut state = self.state.lock().await;
        if self.serving(&state) {
            return Err(HarnessError::ChannelAlreadyOpen);
        }
        self.subscribe(&mut state).await?;
        info!("notification channel opened");
        Ok(())
    }

    /// Renews the subscription of an opened channel whose stream ended.
    ///
    /// Returns `true` when it subscribed again. A channel that is serving, or
    /// that was closed on purpose, is left as it is.
    pub async fn resume(&self) -> HarnessResult<bool> {
        let mut state = self.state.lock().await;
        if matches!(*state, ChannelState::Closed) || self.serving(&state) {
            return Ok(false);
        }
        info!("event stream ended, resubscribing");
        self.subscribe(&mut state).await?;
        Ok(true)
    }

    /// Drops the subscription and fails every pending waiter. Closing a closed
    /// channel does nothing.
    pub async fn close(&self) -> HarnessResult<()> {
        let mut state = self.state.lock().await;
        let ChannelState::Open { dispatcher } = std::mem::replace(&mut *state, ChannelState::Closed)
        else {
            return Ok(());
        };
        dispatcher.abort();
        if let Err(err) = dispatcher.await {
            if !err.is_cancelled() {
                warn!(?err, "notification dispatcher did not shut down cleanly");
            }
        }
        let abandoned = {
            let mut registry = self.registry.lock();
            registry.accepting = false;
            std::mem::take(&mut registry.waiters)
        };
        if !abandoned.is_empty() {
            warn!(pending = abandoned.len(), "closing channel with unresolved announcements");
        }
        info!("notification channel closed");
        Ok(())
    }

    /// True while a subscription is live. Turns false on `close` and when the
    /// node ends the stream.
    pub async fn is_open(&self) -> bool {
        let state = self.state.lock().await;
        self.serving(&state)
    }

    /// Registers interest in the outcome of `hash` signed by `address`.
    ///
    /// Register before submitting so the outcome cannot race past the waiter.
    pub async fn watch(&self, address: Address, hash: TransactionHash) -> HarnessResult<Waiter> {
        let state = self.state.lock().await;
        if matches!(*state, ChannelState::Closed) {
            return Err(HarnessError::ChannelNotOpen);
        }
        let (sender, receiver) = oneshot::channel();
        {
            let mut registry = self.registry.lock();
            if !registry.accepting {
                return Err(HarnessError::ChannelNotOpen);
            }
            registry.waiters.entry((address, hash)).or_default().push(sender);
        }
        Ok(Waiter {
            key: (address, hash),
            receiver,
            registry: Arc::clone(&self.registry),
        })
    }

    /// Number of (address, hash) pairs with at least one waiter.
    pub fn pending(&self) -> usize {
        self.registry.lock().waiters.len()
    }

    fn serving(&self, state: &ChannelState) -> bool {
        matches!(state, ChannelState::Open { .. }) && self.registry.lock().accepting
    }

    /// Caller holds the state lock. A finished dispatcher is simply replaced.
    async fn subscribe(&self, state: &mut ChannelState) -> HarnessResult<()> {
        let stream = self.source.subscribe().await?;
        self.registry.lock().accepting = true;
        let dispatcher = tokio::spawn(dispatch(stream, Arc::clone(&self.registry)));
        *state = ChannelState::Open { dispatcher };
        Ok(())
    }
}

async fn dispatch(mut stream: EventStream, registry: Arc<Mutex<Registry>>) {
    while let Some(item) = stream.next().await {
        match item {
            Ok(event) => route(&registry, event),
            Err(err) => warn!(%err, "skipping undecodable notification"),
        }
    }
    let abandoned = {
        let mut registry = registry.lock();
        registry.accepting = false;
        std::mem::take(&mut registry.waiters)
    };
    warn!(pending = abandoned.len(), "event stream ended, failing pending announcements");
}

fn route(registry: &Mutex<Registry>, event: TransactionEvent) {
    let key = (*event.address(), *event.hash());
    let Some(senders) = registry.lock().waiters.remove(&key) else {
        debug!(address = %key.0, hash = %key.1, "no waiter for notification");
        return;
    };
    for sender in senders {
        // A receiver that gave up (timeout) is fine to skip.
        let _ = sender.send(event.clone());
    }
}

/// Pending interest in one transaction outcome. Dropping it deregisters.
pub struct Waiter {
    key: WaiterKey,
    receiver: oneshot::Receiver<TransactionEvent>,
    registry: Arc<Mutex<Registry>>,
}

impl Waiter {
    pub fn hash(&self) -> &TransactionHash {
        &self.key.1
    }

    pub async fn outcome(mut self) -> HarnessResult<TransactionEvent> {
        (&mut self.receiver)
            .await
            .map_err(|_| HarnessError::ChannelClosed {
                address: self.key.0,
                hash: self.key.1,
            })
    }
}

impl Drop for Waiter {
    fn drop(&mut self) {
        self.receiver.close();
        let mut registry = self.registry.lock();
        let waiters = &mut registry.waiters;
        if let Some(senders) = waiters.get_mut(&self.key) {
            senders.retain(|sender| !sender.is_closed());
            if senders.is_empty() {
                waiters.remove(&self.key);
            }
        }
    }
}
