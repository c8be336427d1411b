//! WebSocket JSON-RPC adapter for the node's public interface.
//!
//! The harness core only sees [`NodeClient`] and [`EventSource`]; this module
//! provides both over a single jsonrpsee connection.
//!
//! # Example
//!
//! ```no_run
//! use ledger_harness::rpc::WsNodeClient;
//! use ledger_harness::NodeClient;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = WsNodeClient::connect("ws://127.0.0.1:3000/ws").await?;
//! println!("network: {}", client.network_type().await?);
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use jsonrpsee::core::client::{ClientT, SubscriptionClientT};
use jsonrpsee::rpc_params;
use jsonrpsee::ws_client::{WsClient, WsClientBuilder};
use serde::Deserialize;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};
use url::Url;

use crate::client::{EventSource, EventStream, NodeClient, NodeConnection, RepositoryFactory};
use crate::currency::Currency;
use crate::error::{HarnessError, HarnessResult};
use crate::identity::NetworkType;
use crate::transaction::{GenerationHash, SignedTransaction, TransactionEvent};

const WS_PATH: &str = "/ws";

/// Connection settings for [`WsNodeClient`].
#[derive(Clone, Debug)]
pub struct WsClientConfig {
    /// WebSocket endpoint URL (e.g., "ws://127.0.0.1:3000/ws")
    pub endpoint: String,
    /// Time allowed for the WebSocket handshake
    pub connection_timeout: Duration,
    /// Time allowed for a single query or announcement
    pub request_timeout: Duration,
    /// Reconnection attempts before a request fails
    pub max_reconnect_attempts: u32,
    /// Delay between reconnection attempts
    pub reconnect_delay: Duration,
    /// Status notifications buffered per subscription. A listener that falls
    /// further behind loses its subscription.
    pub subscription_buffer: usize,
}

impl Default for WsClientConfig {
    fn default() -> Self {
        Self {
            endpoint: "ws://127.0.0.1:3000/ws".to_string(),
            connection_timeout: Duration::from_secs(30),
            request_timeout: Duration::from_secs(60),
            max_reconnect_attempts: 5,
            reconnect_delay: Duration::from_secs(2),
            subscription_buffer: 1024,
        }
    }
}

impl WsClientConfig {
    /// Default settings against `endpoint`
    pub fn with_endpoint(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            ..Default::default()
        }
    }
}

/// Maps the node's http url onto its WebSocket listener.
pub fn ws_endpoint(api_url: &Url) -> HarnessResult<String> {
    let mut url = api_url.clone();
    let scheme = match url.scheme() {
        "http" | "ws" => "ws",
        "https" | "wss" => "wss",
        other => {
            return Err(HarnessError::Config(format!(
                "cannot derive websocket url from scheme '{other}'"
            )));
        }
    };
    url.set_scheme(scheme)
        .map_err(|()| HarnessError::Config(format!("cannot rewrite scheme of {api_url}")))?;
    if matches!(url.path(), "" | "/") {
        url.set_path(WS_PATH);
    }
    Ok(url.to_string())
}

/// Epoch adjustment arrives either as seconds or as text like `"1573430400s"`.
#[derive(Deserialize)]
#[serde(untagged)]
enum EpochAdjustmentWire {
    Seconds(u64),
    Text(String),
}

impl EpochAdjustmentWire {
    fn into_duration(self) -> HarnessResult<Duration> {
        match self {
            Self::Seconds(seconds) => Ok(Duration::from_secs(seconds)),
            Self::Text(text) => text
                .trim()
                .trim_end_matches('s')
                .parse()
                .map(Duration::from_secs)
                .map_err(|err| HarnessError::Query {
                    query: "epoch adjustment",
                    reason: format!("'{text}': {err}"),
                }),
        }
    }
}

pub struct WsNodeClient {
    client: Arc<RwLock<WsClient>>,
    config: WsClientConfig,
}

impl WsNodeClient {
    pub async fn connect(endpoint: &str) -> HarnessResult<Self> {
        Self::connect_with_config(WsClientConfig::with_endpoint(endpoint)).await
    }

    pub async fn connect_with_config(config: WsClientConfig) -> HarnessResult<Self> {
        let client = Self::build_client(&config).await?;
        Ok(Self {
            client: Arc::new(RwLock::new(client)),
            config,
        })
    }

    async fn build_client(config: &WsClientConfig) -> HarnessResult<WsClient> {
        debug!(endpoint = %config.endpoint, "connecting to node");
        WsClientBuilder::default()
            .connection_timeout(config.connection_timeout)
            .request_timeout(config.request_timeout)
            .max_buffer_capacity_per_subscription(config.subscription_buffer)
            .build(&config.endpoint)
            .await
            .map_err(|e| HarnessError::Rpc(format!("failed to connect to {}: {}", config.endpoint, e)))
    }

    /// Replaces a dropped connection. Returns `true` when it had to reconnect.
    ///
    /// Subscriptions die with the old connection; the notification channel
    /// renews its own through `NotificationChannel::resume`.
    async fn ensure_connected(&self) -> HarnessResult<bool> {
        if self.client.read().await.is_connected() {
            return Ok(false);
        }
        let mut client = self.client.write().await;
        // Another caller may have reconnected while we waited for the lock.
        if client.is_connected() {
            return Ok(false);
        }
        warn!(endpoint = %self.config.endpoint, "node connection lost, reconnecting");

        let mut attempts = 0;
        loop {
            attempts += 1;
            match Self::build_client(&self.config).await {
                Ok(new_client) => {
                    *client = new_client;
                    info!(endpoint = %self.config.endpoint, attempts, "reconnected to node");
                    return Ok(true);
                }
                Err(err) if attempts >= self.config.max_reconnect_attempts => return Err(err),
                Err(err) => {
                    debug!(%err, attempts, "reconnect attempt failed");
                    tokio::time::sleep(self.config.reconnect_delay).await;
                }
            }
        }
    }

    async fn request<T>(&self, method: &'static str) -> HarnessResult<T>
    where
        T: serde::de::DeserializeOwned,
    {
        self.ensure_connected().await?;
        let client = self.client.read().await;
        client
            .request(method, rpc_params![])
            .await
            .map_err(|e| HarnessError::Rpc(format!("{method} failed: {e}")))
    }

    pub fn endpoint(&self) -> &str {
        &self.config.endpoint
    }

    pub async fn is_connected(&self) -> bool {
        self.client.read().await.is_connected()
    }
}

#[async_trait]
impl NodeClient for WsNodeClient {
    async fn network_type(&self) -> HarnessResult<NetworkType> {
        let code: u8 = self.request("node_networkType").await?;
        NetworkType::try_from(code)
    }

    async fn generation_hash(&self) -> HarnessResult<GenerationHash> {
        let hash: String = self.request("node_generationHash").await?;
        hash.parse()
    }

    async fn epoch_adjustment(&self) -> HarnessResult<Duration> {
        let wire: EpochAdjustmentWire = self.request("node_epochAdjustment").await?;
        wire.into_duration()
    }

    async fn network_currency(&self) -> HarnessResult<Currency> {
        self.request("node_networkCurrency").await
    }

    async fn announce(&self, transaction: &SignedTransaction) -> HarnessResult<()> {
        self.ensure_connected().await?;
        let client = self.client.read().await;
        let _: serde_json::Value = client
            .request("transaction_announce", rpc_params![transaction])
            .await
            .map_err(|e| HarnessError::Rpc(format!("transaction_announce failed: {e}")))?;
        Ok(())
    }
}

#[async_trait]
impl EventSource for WsNodeClient {
    async fn subscribe(&self) -> HarnessResult<EventStream> {
        if self.ensure_connected().await? {
            debug!("subscribing on a fresh connection");
        }
        let client = self.client.read().await;
        let subscription = client
            .subscribe::<TransactionEvent, _>(
                "transaction_subscribeStatus",
                rpc_params![],
                "transaction_unsubscribeStatus",
            )
            .await
            .map_err(|e| HarnessError::Rpc(format!("failed to subscribe to transaction status: {e}")))?;
        Ok(Box::pin(subscription.map(|item| item.map_err(HarnessError::from))))
    }
}

/// Connects [`WsNodeClient`]s using timeouts from the harness config.
#[derive(Clone, Debug, Default)]
pub struct WsRepositoryFactory {
    pub connection_timeout: Option<Duration>,
    pub request_timeout: Option<Duration>,
}

#[async_trait]
impl RepositoryFactory for WsRepositoryFactory {
    async fn connect(&self, api_url: &Url) -> HarnessResult<NodeConnection> {
        let mut config = WsClientConfig::with_endpoint(ws_endpoint(api_url)?);
        if let Some(timeout) = self.connection_timeout {
            config.connection_timeout = timeout;
        }
        if let Some(timeout) = self.request_timeout {
            config.request_timeout = timeout;
        }
        let client = Arc::new(WsNodeClient::connect_with_config(config).await?);
        Ok(NodeConnection {
            client: client.clone(),
            events: client,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_defaults() {
        let config = WsClientConfig::default();
        assert_eq!(config.endpoint, "ws://127.0.0.1:3000/ws");
        assert_eq!(config.max_reconnect_attempts, 5);
        assert_eq!(config.subscription_buffer, 1024);
        assert_eq!(WsClientConfig::with_endpoint("ws://node:9").endpoint, "ws://node:9");
    }

    #[test]
    fn http_url_maps_to_listener() {
        let url = Url::parse("http://localhost:3000").unwrap();
        assert_eq!(ws_endpoint(&url).unwrap(), "ws://localhost:3000/ws");
        let url = Url::parse("https://node.example:3001/").unwrap();
        assert_eq!(ws_endpoint(&url).unwrap(), "wss://node.example:3001/ws");
        let url = Url::parse("ws://localhost:3000/custom").unwrap();
        assert_eq!(ws_endpoint(&url).unwrap(), "ws://localhost:3000/custom");
        let url = Url::parse("ftp://localhost").unwrap();
        assert!(ws_endpoint(&url).is_err());
    }

    #[test]
    fn epoch_adjustment_formats() {
        let seconds: EpochAdjustmentWire = serde_json::from_str("1573430400").unwrap();
        assert_eq!(seconds.into_duration().unwrap(), Duration::from_secs(1_573_430_400));
        let text: EpochAdjustmentWire = serde_json::from_str(r#""1616694977s""#).unwrap();
        assert_eq!(text.into_duration().unwrap(), Duration::from_secs(1_616_694_977));
        let bad: EpochAdjustmentWire = serde_json::from_str(r#""soon""#).unwrap();
        assert!(bad.into_duration().is_err());
    }
}
