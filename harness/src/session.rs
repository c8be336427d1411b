//! One integration-test session against a bootstrapped node.
//!
//! `IntegrationHarness::start` assembles everything a test needs: the
//! address book, the named identities, the network constants and the shared
//! notification channel. `close` tears it down again and may be called any
//! number of times.

use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};
use url::Url;

use crate::address_book::AddressBook;
use crate::announce::TransactionAnnouncer;
use crate::client::{NodeClient, NodeConnection, RepositoryFactory};
use crate::config::HarnessConfig;
use crate::context::SessionContext;
use crate::currency::Mosaic;
use crate::error::HarnessResult;
use crate::identity::Identity;
use crate::listener::NotificationChannel;
use crate::roster::Roster;
use crate::service::{BootstrapService, ServiceHandle, StartParams};
use crate::transaction::{ConfirmedTransaction, SignedTransaction, TransactionType};

struct SessionParts {
    connection: NodeConnection,
    context: Arc<SessionContext>,
    roster: Roster,
    channel: Arc<NotificationChannel>,
}

pub struct IntegrationHarness {
    config: HarnessConfig,
    api_url: Url,
    service: ServiceHandle,
    connection: NodeConnection,
    context: Arc<SessionContext>,
    roster: Roster,
    channel: Arc<NotificationChannel>,
    announcer: TransactionAnnouncer,
}

impl IntegrationHarness {
    /// Builds a ready session or fails without leaving a node running.
    ///
    /// If this call started the node and a later step fails, the node is
    /// stopped (subject to `stop_on_close`) before the error is returned.
    pub async fn start(
        config: HarnessConfig,
        service: Arc<dyn BootstrapService>,
        factory: Arc<dyn RepositoryFactory>,
    ) -> HarnessResult<Self> {
        config.validate()?;
        let target_dir = config.target_dir();
        info!(dir = %target_dir.display(), "loading bootstrap address book");
        let address_book = AddressBook::load(&target_dir)?;
        let api_url = config
            .api_url
            .clone()
            .unwrap_or_else(|| address_book.api_url.clone());

        let service = ServiceHandle::new(
            service,
            StartParams::for_target(&target_dir),
            config.stop_on_close,
        );
        if config.start_service {
            service.start().await?;
        }

        let parts = match Self::assemble(&config, &address_book, &api_url, factory.as_ref()).await {
            Ok(parts) => parts,
            Err(err) => {
                warn!(%err, "session startup failed");
                service.stop().await;
                return Err(err);
            }
        };

        let announcer = TransactionAnnouncer::new(
            Arc::clone(&parts.connection.client),
            Arc::clone(&parts.channel),
        )
        .with_confirmation_timeout(config.confirmation_timeout());

        info!(
            %api_url,
            network = %parts.context.network_type,
            identities = parts.roster.accounts.len(),
            "integration session ready"
        );
        Ok(Self {
            config,
            api_url,
            service,
            connection: parts.connection,
            context: parts.context,
            roster: parts.roster,
            channel: parts.channel,
            announcer,
        })
    }

    async fn assemble(
        config: &HarnessConfig,
        address_book: &AddressBook,
        api_url: &Url,
        factory: &dyn RepositoryFactory,
    ) -> HarnessResult<SessionParts> {
        let connection = factory.connect(api_url).await?;
        let context = SessionContext::fetch(connection.client.as_ref(), config.max_fee).await?;
        let roster = Roster::derive(&address_book.private_keys, context.network_type)?;
        let channel = Arc::new(NotificationChannel::new(Arc::clone(&connection.events)));
        if config.open_listener {
            channel.open().await?;
        }
        Ok(SessionParts {
            connection,
            context: Arc::new(context),
            roster,
            channel,
        })
    }

    pub fn api_url(&self) -> &Url {
        &self.api_url
    }

    pub fn context(&self) -> Arc<SessionContext> {
        Arc::clone(&self.context)
    }

    pub fn roster(&self) -> &Roster {
        &self.roster
    }

    pub fn client(&self) -> Arc<dyn NodeClient> {
        Arc::clone(&self.connection.client)
    }

    pub fn channel(&self) -> Arc<NotificationChannel> {
        Arc::clone(&self.channel)
    }

    pub fn announcer(&self) -> &TransactionAnnouncer {
        &self.announcer
    }

    pub fn config(&self) -> &HarnessConfig {
        &self.config
    }

    pub fn service(&self) -> &ServiceHandle {
        &self.service
    }

    /// Native currency amount; `relative` scales by the currency divisibility.
    pub fn create_currency(&self, amount: u64, relative: bool) -> HarnessResult<Mosaic> {
        let currency = &self.context.network_currency;
        if relative {
            currency.create_relative(amount)
        } else {
            Ok(currency.create_absolute(amount))
        }
    }

    /// Signs `payload` for this session's network.
    pub fn sign(
        &self,
        signer: &Identity,
        transaction_type: TransactionType,
        payload: &[u8],
    ) -> SignedTransaction {
        signer.sign_transaction(transaction_type, payload, &self.context.generation_hash)
    }

    pub async fn announce(
        &self,
        transaction: &SignedTransaction,
    ) -> HarnessResult<ConfirmedTransaction> {
        self.announcer.announce(transaction).await
    }

    /// Closes the channel, then stops the node if this session owns it and
    /// waits for it to settle.
    pub async fn close(&self) -> HarnessResult<()> {
        self.channel.close().await?;
        if self.service.stop().await {
            let delay = self.config.settle_delay();
            info!(?delay, "waiting for node to settle");
            Self::sleep(delay).await;
        }
        Ok(())
    }

    pub async fn sleep(duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}
