use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use crate::client::NodeClient;
use crate::error::{HarnessError, HarnessResult};
use crate::listener::NotificationChannel;
use crate::transaction::{ConfirmedTransaction, SignedTransaction, TransactionEvent};

/// Turns a fire-and-forget submission into a confirmed result.
///
/// The node is the only source of progress: with no `confirmation_timeout`
/// an unresponsive node leaves the caller waiting indefinitely.
#[derive(Clone)]
pub struct TransactionAnnouncer {
    client: Arc<dyn NodeClient>,
    channel: Arc<NotificationChannel>,
    confirmation_timeout: Option<Duration>,
}

impl TransactionAnnouncer {
    pub fn new(client: Arc<dyn NodeClient>, channel: Arc<NotificationChannel>) -> Self {
        Self {
            client,
            channel,
            confirmation_timeout: None,
        }
    }

    pub fn with_confirmation_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.confirmation_timeout = timeout;
        self
    }

    pub fn confirmation_timeout(&self) -> Option<Duration> {
        self.confirmation_timeout
    }

    /// Submits `transaction` and waits for the node to confirm or reject it.
    pub async fn announce(
        &self,
        transaction: &SignedTransaction,
    ) -> HarnessResult<ConfirmedTransaction> {
        info!(
            tx_type = %transaction.transaction_type,
            hash = %transaction.hash,
            "announcing transaction"
        );
        let signer = transaction.signer_address();
        // Renew a subscription the node dropped; a closed channel stays closed.
        self.channel.resume().await?;
        let waiter = self.channel.watch(signer, transaction.hash).await?;
        self.client.announce(transaction).await?;

        let event = match self.confirmation_timeout {
            Some(timeout) => tokio::time::timeout(timeout, waiter.outcome())
                .await
                .map_err(|_| HarnessError::ConfirmationTimeout {
                    hash: transaction.hash,
                    timeout,
                })??,
            None => waiter.outcome().await?,
        };

        match event {
            TransactionEvent::Confirmed { height, .. } => {
                info!(
                    tx_type = %transaction.transaction_type,
                    hash = %transaction.hash,
                    height,
                    "transaction confirmed"
                );
                Ok(ConfirmedTransaction {
                    hash: transaction.hash,
                    signer,
                    transaction_type: transaction.transaction_type,
                    height,
                })
            }
            TransactionEvent::Rejected { reason, .. } => {
                info!(hash = %transaction.hash, %reason, "transaction rejected");
                Err(HarnessError::TransactionRejected {
                    hash: transaction.hash,
                    reason,
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};

    use async_trait::async_trait;

    use super::*;
    use crate::client::{EventSource, EventStream};
    use crate::identity::{Identity, NetworkType};
    use crate::test_utils::{AnnounceBehavior, MockNode};
    use crate::transaction::{GenerationHash, TransactionType};

    async fn setup(node: Arc<MockNode>) -> (TransactionAnnouncer, Arc<NotificationChannel>) {
        let channel = Arc::new(NotificationChannel::new(node.clone()));
        channel.open().await.unwrap();
        (TransactionAnnouncer::new(node, channel.clone()), channel)
    }

    fn signed(seed: u8) -> SignedTransaction {
        let identity = Identity::from_private_key(&hex::encode([seed; 32]), NetworkType::PrivateTest).unwrap();
        identity.sign_transaction(
            TransactionType::TRANSFER,
            &[seed, 1, 2, 3],
            &GenerationHash::from_bytes([9; 32]),
        )
    }

    #[tokio::test]
    async fn confirmed_transaction_is_correlated() {
        let node = Arc::new(MockNode::default());
        let (announcer, channel) = setup(node.clone()).await;
        let tx = signed(1);
        let confirmed = announcer.announce(&tx).await.unwrap();
        assert_eq!(confirmed.hash, tx.hash);
        assert_eq!(confirmed.signer, tx.signer_address());
        assert_eq!(node.announced(), vec![tx.hash]);
        assert_eq!(channel.pending(), 0);
    }

    #[tokio::test]
    async fn rejection_carries_reason() {
        let node = Arc::new(MockNode::default());
        node.set_default_behavior(AnnounceBehavior::Reject("Failure_Core_Insufficient_Balance".into()));
        let (announcer, _) = setup(node).await;
        let err = announcer.announce(&signed(2)).await.unwrap_err();
        assert!(matches!(
            err,
            HarnessError::TransactionRejected { ref reason, .. } if reason == "Failure_Core_Insufficient_Balance"
        ));
    }

    #[tokio::test]
    async fn submission_failure_removes_waiter() {
        let node = Arc::new(MockNode::default());
        node.set_default_behavior(AnnounceBehavior::Fail("connection reset".into()));
        let (announcer, channel) = setup(node).await;
        assert!(matches!(
            announcer.announce(&signed(3)).await,
            Err(HarnessError::Rpc(_))
        ));
        assert_eq!(channel.pending(), 0);
    }

    #[tokio::test]
    async fn closed_channel_is_reported_before_submitting() {
        let node = Arc::new(MockNode::default());
        let channel = Arc::new(NotificationChannel::new(node.clone()));
        let announcer = TransactionAnnouncer::new(node.clone(), channel);
        assert!(matches!(
            announcer.announce(&signed(4)).await,
            Err(HarnessError::ChannelNotOpen)
        ));
        assert!(node.announced().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_is_opt_in() {
        let node = Arc::new(MockNode::default());
        node.set_default_behavior(AnnounceBehavior::Hold);
        let (announcer, channel) = setup(node).await;
        let announcer = announcer.with_confirmation_timeout(Some(Duration::from_secs(30)));
        let err = announcer.announce(&signed(5)).await.unwrap_err();
        assert!(matches!(err, HarnessError::ConfirmationTimeout { .. }));
        assert_eq!(channel.pending(), 0);
    }

    /// Ends its first subscription at once, then follows the node.
    struct DroppingSource {
        node: Arc<MockNode>,
        dropped: AtomicBool,
    }

    #[async_trait]
    impl EventSource for DroppingSource {
        async fn subscribe(&self) -> HarnessResult<EventStream> {
            if !self.dropped.swap(true, Ordering::SeqCst) {
                return Ok(Box::pin(futures::stream::empty::<HarnessResult<TransactionEvent>>()));
            }
            self.node.subscribe().await
        }
    }

    #[tokio::test]
    async fn ended_subscription_is_renewed_before_announcing() {
        let node = Arc::new(MockNode::default());
        let source = DroppingSource {
            node: node.clone(),
            dropped: AtomicBool::new(false),
        };
        let channel = Arc::new(NotificationChannel::new(Arc::new(source)));
        channel.open().await.unwrap();
        while channel.is_open().await {
            tokio::task::yield_now().await;
        }

        let announcer = TransactionAnnouncer::new(node.clone(), channel.clone());
        let tx = signed(6);
        assert_eq!(announcer.announce(&tx).await.unwrap().hash, tx.hash);
        assert!(channel.is_open().await);
        assert_eq!(node.subscription_count(), 1);
    }
}
