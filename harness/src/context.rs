use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::Serialize;

use crate::client::NodeClient;
use crate::currency::Currency;
use crate::error::HarnessResult;
use crate::identity::NetworkType;
use crate::transaction::GenerationHash;

/// Fee ceiling used until the harness reads the node's fee multiplier.
pub const DEFAULT_MAX_FEE: u64 = 1_000_000;

/// Network constants read once per session.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SessionContext {
    pub network_type: NetworkType,
    pub generation_hash: GenerationHash,
    pub epoch_adjustment: Duration,
    pub network_currency: Currency,
    pub max_fee: u64,
}

impl SessionContext {
    /// Runs the four queries concurrently. Either all succeed or the first
    /// error is returned and nothing is kept.
    pub async fn fetch(client: &dyn NodeClient, max_fee: u64) -> HarnessResult<Self> {
        let (network_type, generation_hash, epoch_adjustment, network_currency) = tokio::try_join!(
            client.network_type(),
            client.generation_hash(),
            client.epoch_adjustment(),
            client.network_currency(),
        )?;
        Ok(Self {
            network_type,
            generation_hash,
            epoch_adjustment,
            network_currency,
            max_fee,
        })
    }

    /// Converts a network timestamp (milliseconds since the network epoch).
    pub fn network_time(&self, timestamp_ms: u64) -> SystemTime {
        UNIX_EPOCH + self.epoch_adjustment + Duration::from_millis(timestamp_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::HarnessError;
    use crate::test_utils::{MockNode, MockQuery, MOCK_CURRENCY_ID, MOCK_EPOCH_ADJUSTMENT};

    #[tokio::test]
    async fn fetches_network_constants() {
        let node = MockNode::default().with_network_type(NetworkType::Testnet);
        let context = SessionContext::fetch(&node, DEFAULT_MAX_FEE).await.unwrap();
        assert_eq!(context.network_type, NetworkType::Testnet);
        assert_eq!(context.generation_hash, node.generation_hash_value());
        assert_eq!(context.network_currency.mosaic_id, MOCK_CURRENCY_ID);
        assert_eq!(context.max_fee, 1_000_000);
    }

    #[tokio::test]
    async fn any_failed_query_fails_the_fetch() {
        let node = MockNode::default();
        node.fail_query(MockQuery::EpochAdjustment);
        let err = SessionContext::fetch(&node, DEFAULT_MAX_FEE).await.unwrap_err();
        assert!(matches!(err, HarnessError::Query { query: "epoch adjustment", .. }));
    }

    #[tokio::test]
    async fn network_time_is_offset_by_epoch() {
        let context = SessionContext::fetch(&MockNode::default(), 10).await.unwrap();
        let time = context.network_time(1_500);
        assert_eq!(
            time.duration_since(UNIX_EPOCH).unwrap(),
            MOCK_EPOCH_ADJUSTMENT + Duration::from_millis(1_500)
        );
    }
}
