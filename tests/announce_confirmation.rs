//! Announcement and confirmation through a full session.

use std::sync::Arc;

use ledger_harness::identity::Identity;
use ledger_harness::roster::REQUIRED_IDENTITIES;
use ledger_harness::test_utils::{write_address_book, AnnounceBehavior, MockNode, RecordingBootstrap};
use ledger_harness::transaction::{SignedTransaction, TransactionEvent, TransactionType};
use ledger_harness::{HarnessConfig, HarnessError, IntegrationHarness};
use tempfile::TempDir;

struct Session {
    harness: IntegrationHarness,
    node: Arc<MockNode>,
    _dir: TempDir,
}

async fn session() -> Session {
    let dir = tempfile::tempdir().expect("tempdir");
    write_address_book(dir.path(), REQUIRED_IDENTITIES).expect("address book");
    let node = Arc::new(MockNode::default());
    let harness = IntegrationHarness::start(
        HarnessConfig::with_target_dir(dir.path()),
        Arc::new(RecordingBootstrap::default()),
        node.clone(),
    )
    .await
    .expect("session starts");
    Session {
        harness,
        node,
        _dir: dir,
    }
}

fn transfer(harness: &IntegrationHarness, signer: &Identity, nonce: u8) -> SignedTransaction {
    harness.sign(signer, TransactionType::TRANSFER, &[0x01, nonce, 0xFF])
}

#[tokio::test]
async fn announce_resolves_with_confirmation() {
    let Session { harness, node, .. } = session().await;
    let signer = &harness.roster().account;
    let tx = transfer(&harness, signer, 1);

    let confirmed = harness.announce(&tx).await.expect("confirmed");
    assert_eq!(confirmed.hash, tx.hash);
    assert_eq!(confirmed.signer, signer.address());
    assert_eq!(confirmed.transaction_type, TransactionType::TRANSFER);
    assert_eq!(node.announced(), vec![tx.hash]);
    harness.close().await.expect("close");
}

#[tokio::test]
async fn concurrent_announcements_never_cross_resolve() {
    let Session { harness, node, .. } = session().await;
    node.set_default_behavior(AnnounceBehavior::Hold);
    let first = transfer(&harness, &harness.roster().account, 1);
    let second = transfer(&harness, &harness.roster().account2, 2);

    let driver = async {
        node.wait_for_announced(2).await;
        // Resolve out of submission order.
        assert!(node.confirm(&second.hash));
        assert!(node.confirm(&first.hash));
    };
    let (first_result, second_result, ()) =
        tokio::join!(harness.announce(&first), harness.announce(&second), driver);

    let first_result = first_result.expect("first confirmed");
    let second_result = second_result.expect("second confirmed");
    assert_eq!(first_result.hash, first.hash);
    assert_eq!(second_result.hash, second.hash);
    assert!(first_result.height > second_result.height);
    assert_eq!(harness.channel().pending(), 0);
}

#[tokio::test]
async fn rejection_is_never_also_a_success() {
    let Session { harness, node, .. } = session().await;
    let tx = transfer(&harness, &harness.roster().multisig_account, 3);
    node.set_behavior(tx.hash, AnnounceBehavior::Reject("Failure_Core_Past_Deadline".into()));

    let err = harness.announce(&tx).await.expect_err("rejected");
    assert!(matches!(
        err,
        HarnessError::TransactionRejected { hash, ref reason }
            if hash == tx.hash && reason == "Failure_Core_Past_Deadline"
    ));

    // A late confirmation for the same hash finds nobody waiting.
    assert!(node.confirm(&tx.hash));
    assert_eq!(harness.channel().pending(), 0);

    let next = transfer(&harness, &harness.roster().account, 4);
    harness.announce(&next).await.expect("channel still serves");
}

#[tokio::test]
async fn watchers_of_the_same_transaction_all_hear_the_outcome() {
    let Session { harness, node, .. } = session().await;
    let signer = harness.roster().cosign_account1.clone();
    let tx = transfer(&harness, &signer, 5);
    let channel = harness.channel();

    let a = channel.watch(signer.address(), tx.hash).await.expect("watch");
    let b = channel.watch(signer.address(), tx.hash).await.expect("watch");
    node.emit(TransactionEvent::Confirmed {
        address: signer.address(),
        hash: tx.hash,
        height: 42,
    });
    assert_eq!(a.outcome().await.expect("a"), b.outcome().await.expect("b"));
}

#[tokio::test]
async fn close_fails_in_flight_announcement() {
    let Session { harness, node, .. } = session().await;
    node.set_default_behavior(AnnounceBehavior::Hold);
    let tx = transfer(&harness, &harness.roster().harvesting_account, 6);

    let closer = async {
        node.wait_for_announced(1).await;
        harness.close().await.expect("close");
    };
    let (result, ()) = tokio::join!(harness.announce(&tx), closer);
    assert!(matches!(result, Err(HarnessError::ChannelClosed { hash, .. }) if hash == tx.hash));
}

#[tokio::test]
async fn announce_without_listener_is_refused() {
    let dir = tempfile::tempdir().expect("tempdir");
    write_address_book(dir.path(), REQUIRED_IDENTITIES).expect("address book");
    let node = Arc::new(MockNode::default());
    let config = HarnessConfig {
        open_listener: false,
        ..HarnessConfig::with_target_dir(dir.path())
    };
    let harness = IntegrationHarness::start(config, Arc::new(RecordingBootstrap::default()), node.clone())
        .await
        .expect("session starts");
    let tx = transfer(&harness, &harness.roster().account3, 7);
    assert!(matches!(harness.announce(&tx).await, Err(HarnessError::ChannelNotOpen)));
    assert!(node.announced().is_empty());

    harness.channel().open().await.expect("open on demand");
    harness.announce(&tx).await.expect("confirmed once open");
}
