//! Seams to the node's public interface.

use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::Stream;
use url::Url;

use crate::currency::Currency;
use crate::error::HarnessResult;
use crate::identity::NetworkType;
use crate::transaction::{GenerationHash, SignedTransaction, TransactionEvent};

/// Unbounded sequence of status notifications, ended by dropping it.
pub type EventStream = Pin<Box<dyn Stream<Item = HarnessResult<TransactionEvent>> + Send>>;

/// Typed request operations against a running node.
#[async_trait]
pub trait NodeClient: Send + Sync {
    async fn network_type(&self) -> HarnessResult<NetworkType>;

    async fn generation_hash(&self) -> HarnessResult<GenerationHash>;

    /// Offset between the network epoch and the unix epoch.
    async fn epoch_adjustment(&self) -> HarnessResult<Duration>;

    async fn network_currency(&self) -> HarnessResult<Currency>;

    /// Hands the payload to the node. Acceptance is reported on the event stream.
    async fn announce(&self, transaction: &SignedTransaction) -> HarnessResult<()>;
}

/// Source of the node's asynchronous transaction status notifications.
#[async_trait]
pub trait EventSource: Send + Sync {
    async fn subscribe(&self) -> HarnessResult<EventStream>;
}

/// Both halves of a connection to one node.
#[derive(Clone)]
pub struct NodeConnection {
    pub client: Arc<dyn NodeClient>,
    pub events: Arc<dyn EventSource>,
}

/// Builds a [`NodeConnection`] from the node's public url.
#[async_trait]
pub trait RepositoryFactory: Send + Sync {
    async fn connect(&self, api_url: &Url) -> HarnessResult<NodeConnection>;
}
