//! In-process stand-ins for the node and the bootstrap toolchain.

use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use parking_lot::Mutex;
use tokio::sync::{broadcast, Notify};
use tokio_stream::wrappers::BroadcastStream;
use url::Url;

use crate::address_book::{AccountDescriptor, AddressBook, GeneratedAddresses, MosaicAccounts};
use crate::client::{EventSource, EventStream, NodeClient, NodeConnection, RepositoryFactory};
use crate::currency::{Currency, MosaicId};
use crate::error::{HarnessError, HarnessResult};
use crate::identity::NetworkType;
use crate::service::{BootstrapService, StartParams};
use crate::transaction::{GenerationHash, SignedTransaction, TransactionEvent, TransactionHash};

const EVENT_CAPACITY: usize = 1024;
pub const MOCK_CURRENCY_ID: MosaicId = MosaicId(0x6BED_913F_A202_23F8);
pub const MOCK_EPOCH_ADJUSTMENT: Duration = Duration::from_secs(1_573_430_400);

/// How the mock node reacts to a submitted transaction.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum AnnounceBehavior {
    /// Emit a confirmation right away.
    #[default]
    Confirm,
    /// Emit a rejection with this status.
    Reject(String),
    /// Fail the submission itself.
    Fail(String),
    /// Accept and stay silent until the test emits an outcome.
    Hold,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MockQuery {
    NetworkType,
    GenerationHash,
    EpochAdjustment,
    NetworkCurrency,
}

impl MockQuery {
    fn name(self) -> &'static str {
        match self {
            Self::NetworkType => "network type",
            Self::GenerationHash => "generation hash",
            Self::EpochAdjustment => "epoch adjustment",
            Self::NetworkCurrency => "network currency",
        }
    }
}

struct MockState {
    network_type: NetworkType,
    generation_hash: GenerationHash,
    epoch_adjustment: Duration,
    currency: Currency,
    failing_queries: HashSet<MockQuery>,
    default_behavior: AnnounceBehavior,
    behaviors: HashMap<TransactionHash, AnnounceBehavior>,
    announced: Vec<SignedTransaction>,
    height: u64,
    subscriptions: usize,
    connects: usize,
    refuse_connections: bool,
}

/// Scriptable node. Clones share state and the event stream.
#[derive(Clone)]
pub struct MockNode {
    state: Arc<Mutex<MockState>>,
    events: broadcast::Sender<TransactionEvent>,
    announcement: Arc<Notify>,
}

impl Default for MockNode {
    fn default() -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            state: Arc::new(Mutex::new(MockState {
                network_type: NetworkType::PrivateTest,
                generation_hash: GenerationHash::from_bytes([0x57; 32]),
                epoch_adjustment: MOCK_EPOCH_ADJUSTMENT,
                currency: Currency {
                    mosaic_id: MOCK_CURRENCY_ID,
                    namespace: Some("symbol.xym".to_string()),
                    divisibility: 6,
                    transferable: true,
                    supply_mutable: false,
                },
                failing_queries: HashSet::new(),
                default_behavior: AnnounceBehavior::Confirm,
                behaviors: HashMap::new(),
                announced: Vec::new(),
                height: 1,
                subscriptions: 0,
                connects: 0,
                refuse_connections: false,
            })),
            events,
            announcement: Arc::new(Notify::new()),
        }
    }
}

impl MockNode {
    pub fn with_network_type(self, network_type: NetworkType) -> Self {
        self.state.lock().network_type = network_type;
        self
    }

    pub fn with_currency(self, currency: Currency) -> Self {
        self.state.lock().currency = currency;
        self
    }

    pub fn generation_hash_value(&self) -> GenerationHash {
        self.state.lock().generation_hash
    }

    pub fn fail_query(&self, query: MockQuery) {
        self.state.lock().failing_queries.insert(query);
    }

    pub fn refuse_connections(&self) {
        self.state.lock().refuse_connections = true;
    }

    pub fn set_default_behavior(&self, behavior: AnnounceBehavior) {
        self.state.lock().default_behavior = behavior;
    }

    pub fn set_behavior(&self, hash: TransactionHash, behavior: AnnounceBehavior) {
        self.state.lock().behaviors.insert(hash, behavior);
    }

    /// Hashes of every accepted submission, in order.
    pub fn announced(&self) -> Vec<TransactionHash> {
        self.state.lock().announced.iter().map(|tx| tx.hash).collect()
    }

    pub fn subscription_count(&self) -> usize {
        self.state.lock().subscriptions
    }

    pub fn connect_count(&self) -> usize {
        self.state.lock().connects
    }

    /// Publishes `event` to every open subscription.
    pub fn emit(&self, event: TransactionEvent) {
        // No subscriber is a valid state for a node.
        let _ = self.events.send(event);
    }

    /// Confirms a previously held submission.
    pub fn confirm(&self, hash: &TransactionHash) -> bool {
        let Some(event) = self.outcome_for(hash, None) else {
            return false;
        };
        self.emit(event);
        true
    }

    /// Rejects a previously held submission.
    pub fn reject(&self, hash: &TransactionHash, reason: &str) -> bool {
        let Some(event) = self.outcome_for(hash, Some(reason.to_string())) else {
            return false;
        };
        self.emit(event);
        true
    }

    /// Resolves once `count` submissions have been accepted.
    pub async fn wait_for_announced(&self, count: usize) -> Vec<TransactionHash> {
        loop {
            // Armed before the check so a submission in between still wakes us.
            let notified = self.announcement.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            let announced = self.announced();
            if announced.len() >= count {
                return announced;
            }
            notified.await;
        }
    }

    fn outcome_for(&self, hash: &TransactionHash, rejection: Option<String>) -> Option<TransactionEvent> {
        let mut state = self.state.lock();
        let address = state
            .announced
            .iter()
            .find(|tx| &tx.hash == hash)?
            .signer_address();
        Some(match rejection {
            Some(reason) => TransactionEvent::Rejected {
                address,
                hash: *hash,
                reason,
            },
            None => {
                state.height += 1;
                TransactionEvent::Confirmed {
                    address,
                    hash: *hash,
                    height: state.height,
                }
            }
        })
    }

    fn query<T>(&self, query: MockQuery, read: impl FnOnce(&MockState) -> T) -> HarnessResult<T> {
        let state = self.state.lock();
        if state.failing_queries.contains(&query) {
            return Err(HarnessError::Query {
                query: query.name(),
                reason: "mock node refused the query".to_string(),
            });
        }
        Ok(read(&*state))
    }
}

#[async_trait]
impl NodeClient for MockNode {
    async fn network_type(&self) -> HarnessResult<NetworkType> {
        self.query(MockQuery::NetworkType, |state| state.network_type)
    }

    async fn generation_hash(&self) -> HarnessResult<GenerationHash> {
        self.query(MockQuery::GenerationHash, |state| state.generation_hash)
    }

    async fn epoch_adjustment(&self) -> HarnessResult<Duration> {
        self.query(MockQuery::EpochAdjustment, |state| state.epoch_adjustment)
    }

    async fn network_currency(&self) -> HarnessResult<Currency> {
        self.query(MockQuery::NetworkCurrency, |state| state.currency.clone())
    }

    async fn announce(&self, transaction: &SignedTransaction) -> HarnessResult<()> {
        let behavior = {
            let mut state = self.state.lock();
            let behavior = state
                .behaviors
                .get(&transaction.hash)
                .cloned()
                .unwrap_or_else(|| state.default_behavior.clone());
            if let AnnounceBehavior::Fail(reason) = &behavior {
                return Err(HarnessError::Rpc(reason.clone()));
            }
            state.announced.push(transaction.clone());
            behavior
        };
        self.announcement.notify_waiters();
        match behavior {
            AnnounceBehavior::Confirm => {
                self.confirm(&transaction.hash);
            }
            AnnounceBehavior::Reject(reason) => {
                self.reject(&transaction.hash, &reason);
            }
            AnnounceBehavior::Hold | AnnounceBehavior::Fail(_) => {}
        }
        Ok(())
    }
}

#[async_trait]
impl EventSource for MockNode {
    async fn subscribe(&self) -> HarnessResult<EventStream> {
        let receiver = self.events.subscribe();
        self.state.lock().subscriptions += 1;
        let stream = BroadcastStream::new(receiver).map(|item| {
            item.map_err(|err| HarnessError::Rpc(format!("notification stream lagged: {err}")))
        });
        Ok(Box::pin(stream))
    }
}

#[async_trait]
impl RepositoryFactory for MockNode {
    async fn connect(&self, _api_url: &Url) -> HarnessResult<NodeConnection> {
        let mut state = self.state.lock();
        if state.refuse_connections {
            return Err(HarnessError::Rpc("connection refused".to_string()));
        }
        state.connects += 1;
        drop(state);
        let node = Arc::new(self.clone());
        Ok(NodeConnection {
            client: node.clone(),
            events: node,
        })
    }
}

#[derive(Default)]
struct RecorderState {
    starts: Vec<StartParams>,
    stops: Vec<StartParams>,
}

/// Records bootstrap calls instead of running the toolchain.
#[derive(Default)]
pub struct RecordingBootstrap {
    state: Mutex<RecorderState>,
    fail_start: bool,
    fail_stop: bool,
}

impl RecordingBootstrap {
    pub fn failing_start() -> Self {
        Self {
            fail_start: true,
            ..Default::default()
        }
    }

    pub fn failing_stop() -> Self {
        Self {
            fail_stop: true,
            ..Default::default()
        }
    }

    pub fn starts(&self) -> usize {
        self.state.lock().starts.len()
    }

    pub fn stops(&self) -> usize {
        self.state.lock().stops.len()
    }

    pub fn last_start(&self) -> Option<StartParams> {
        self.state.lock().starts.last().cloned()
    }
}

#[async_trait]
impl BootstrapService for RecordingBootstrap {
    async fn start(&self, params: &StartParams) -> HarnessResult<()> {
        self.state.lock().starts.push(params.clone());
        if self.fail_start {
            return Err(HarnessError::Service("bootstrap start failed".to_string()));
        }
        Ok(())
    }

    async fn stop(&self, params: &StartParams) -> HarnessResult<()> {
        self.state.lock().stops.push(params.clone());
        if self.fail_stop {
            return Err(HarnessError::Service("bootstrap stop failed".to_string()));
        }
        Ok(())
    }
}

/// Deterministic private key for slot `index` of a generated address book.
pub fn test_private_key(index: usize) -> String {
    let mut seed = [0u8; 32];
    seed[..8].copy_from_slice(&(index as u64 + 1).to_be_bytes());
    seed[31] = 0xA5;
    hex::encode_upper(seed)
}

/// Writes `addresses.json` with `count` funded accounts into `target_dir`.
pub fn write_address_book(target_dir: &Path, count: usize) -> HarnessResult<Vec<String>> {
    let keys: Vec<String> = (0..count).map(test_private_key).collect();
    let addresses = GeneratedAddresses {
        version: Some(1),
        network_type: Some(NetworkType::PrivateTest),
        nemesis_generation_hash_seed: None,
        mosaics: vec![MosaicAccounts {
            name: "currency".to_string(),
            id: Some(MOCK_CURRENCY_ID.to_string()),
            accounts: keys
                .iter()
                .map(|key| AccountDescriptor {
                    private_key: Some(key.clone()),
                    ..Default::default()
                })
                .collect(),
        }],
    };
    addresses.save(AddressBook::path_in(target_dir))?;
    Ok(keys)
}
