//! Per-wallet queue ordering, isolation and nonce tracking

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{harness, quick_settings};
use r2_autobot::actions::ActionKind;
use r2_autobot::config::Config;
use r2_autobot::scheduler::{
    NetworkHandle, QueueEvent, QueueStatus, SchedulerError, WalletScheduler,
};
use r2_autobot::simulation::{
    seed_wallets, simulated_network_config, SimulatedBackend, SimulatedNetwork,
};
use r2_autobot::{Address, NetworkId, Wallet};

const BLOCK: Duration = Duration::from_millis(50);

#[tokio::test(start_paused = true)]
async fn test_wallet_jobs_run_in_order_one_at_a_time() {
    let h = harness(BLOCK, quick_settings(), 1);
    let wallet = &h.wallets[0];

    let tickets: Vec<_> = (0..5)
        .map(|_| {
            h.scheduler
                .enqueue_kind(ActionKind::stake(1.0), &h.network, wallet)
                .unwrap()
        })
        .collect();
    assert_eq!(h.scheduler.board().len(), 5);
    let expected = ActionKind::stake(1.0).describe();
    assert!(h
        .scheduler
        .board()
        .snapshot()
        .iter()
        .all(|entry| entry.description == expected));

    let mut nonces = Vec::new();
    for ticket in tickets {
        let confirmed = ticket.outcome().await.expect("stake should succeed");
        nonces.push(confirmed.transaction.nonce);
    }

    assert_eq!(nonces, vec![0, 1, 2, 3, 4]);
    assert_eq!(h.chain.max_in_flight(wallet.address), 1);
    assert!(h.scheduler.board().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_wallets_do_not_wait_on_each_other() {
    let h = harness(BLOCK, quick_settings(), 2);
    let (a, b) = (&h.wallets[0], &h.wallets[1]);

    let start = tokio::time::Instant::now();
    let a_tickets: Vec<_> = (0..3)
        .map(|_| {
            h.scheduler
                .enqueue_kind(ActionKind::stake(1.0), &h.network, a)
                .unwrap()
        })
        .collect();
    let b_ticket = h
        .scheduler
        .enqueue_kind(ActionKind::stake(1.0), &h.network, b)
        .unwrap();

    assert!(b_ticket.outcome().await.is_some());
    assert!(start.elapsed() < BLOCK * 2);

    for ticket in a_tickets {
        assert!(ticket.outcome().await.is_some());
    }
    assert!(start.elapsed() >= BLOCK * 3);
}

#[tokio::test]
async fn test_nonces_continue_from_pending_count() {
    let h = harness(Duration::from_millis(1), quick_settings(), 1);
    let wallet = &h.wallets[0];
    h.chain.set_pending_count(wallet.address, 7);

    for _ in 0..3 {
        let ticket = h
            .scheduler
            .enqueue_kind(ActionKind::stake(1.0), &h.network, wallet)
            .unwrap();
        assert!(ticket.outcome().await.is_some());
    }

    let nonces: Vec<u64> = h
        .chain
        .submitted_by(wallet.address)
        .iter()
        .map(|tx| tx.nonce)
        .collect();
    assert_eq!(nonces, vec![7, 8, 9]);
    assert_eq!(h.chain.pending_count_queries(), 1);
    assert_eq!(h.scheduler.nonce_stats().resyncs, 1);
}

#[tokio::test]
async fn test_precondition_failure_leaves_queue_running() {
    let h = harness(Duration::from_millis(1), quick_settings(), 1);
    let wallet = &h.wallets[0];
    h.chain.set_pending_count(wallet.address, 3);
    let mut events = h.scheduler.board().subscribe();

    let first = h
        .scheduler
        .enqueue_kind(ActionKind::stake(1.0), &h.network, wallet)
        .unwrap();
    let second = h
        .scheduler
        .enqueue_kind(ActionKind::stake(5_000.0), &h.network, wallet)
        .unwrap();
    let third = h
        .scheduler
        .enqueue_kind(ActionKind::stake(1.0), &h.network, wallet)
        .unwrap();
    let second_id = second.id;

    assert!(first.outcome().await.is_some());
    assert!(second.outcome().await.is_none());
    assert!(third.outcome().await.is_some());

    let nonces: Vec<u64> = h
        .chain
        .submitted_by(wallet.address)
        .iter()
        .map(|tx| tx.nonce)
        .collect();
    assert_eq!(nonces, vec![3, 4]);
    assert_eq!(h.chain.pending_count_queries(), 2);
    assert!(h.scheduler.log().contains("Insufficient R2USD balance"));

    let mut second_statuses = Vec::new();
    while let Ok(event) = events.try_recv() {
        if let QueueEvent::StatusChanged { id, status } = event {
            if id == second_id {
                second_statuses.push(status);
            }
        }
    }
    assert_eq!(second_statuses, vec![QueueStatus::Processing, QueueStatus::Error]);
}

#[tokio::test]
async fn test_reverted_transaction_resyncs_nonce() {
    let h = harness(Duration::from_millis(1), quick_settings(), 1);
    let wallet = &h.wallets[0];
    h.chain.reject_next(1);

    let reverted = h
        .scheduler
        .enqueue_kind(ActionKind::stake(1.0), &h.network, wallet)
        .unwrap();
    assert!(reverted.outcome().await.is_none());

    let next = h
        .scheduler
        .enqueue_kind(ActionKind::stake(1.0), &h.network, wallet)
        .unwrap();
    let confirmed = next.outcome().await.expect("second stake should succeed");

    assert_eq!(confirmed.transaction.nonce, 1);
    assert_eq!(h.chain.pending_count_queries(), 2);
    assert!(h.scheduler.log().contains("rejected by contract"));
}

#[tokio::test]
async fn test_refused_submission_reuses_nonce() {
    let h = harness(Duration::from_millis(1), quick_settings(), 1);
    let wallet = &h.wallets[0];
    h.chain.fail_next_submissions(1);

    let refused = h
        .scheduler
        .enqueue_kind(ActionKind::stake(1.0), &h.network, wallet)
        .unwrap();
    assert!(refused.outcome().await.is_none());

    let retry = h
        .scheduler
        .enqueue_kind(ActionKind::stake(1.0), &h.network, wallet)
        .unwrap();
    let confirmed = retry.outcome().await.expect("retry should succeed");
    assert_eq!(confirmed.transaction.nonce, 0);
    assert_eq!(h.chain.submitted().len(), 1);
}

#[tokio::test]
async fn test_unknown_network_is_rejected_at_enqueue() {
    let h = harness(Duration::from_millis(1), quick_settings(), 1);
    let err = h
        .scheduler
        .enqueue_kind(ActionKind::stake(1.0), &NetworkId::new("Holesky"), &h.wallets[0])
        .unwrap_err();
    assert_eq!(err, SchedulerError::UnknownNetwork(NetworkId::new("Holesky")));
    assert!(h.scheduler.board().is_empty());
}

#[tokio::test]
async fn test_same_wallet_keeps_separate_nonces_per_network() {
    let defaults = Config::default();
    let wallet = Wallet::new("Wallet 1", Address::repeat_byte(0x01));
    let wallets = vec![wallet.clone()];

    let sepolia = simulated_network_config(defaults.networks[0].clone());
    let r2 = simulated_network_config(defaults.networks[1].clone());
    let sepolia_chain = Arc::new(SimulatedNetwork::new(Duration::from_millis(1)));
    let r2_chain = Arc::new(SimulatedNetwork::new(Duration::from_millis(1)));
    seed_wallets(&sepolia_chain, &sepolia, &wallets, &defaults.simulation);
    seed_wallets(&r2_chain, &r2, &wallets, &defaults.simulation);

    let scheduler = WalletScheduler::new(
        quick_settings(),
        &defaults.trading,
        vec![
            NetworkHandle::new(sepolia.clone(), sepolia_chain.clone()),
            NetworkHandle::new(r2.clone(), r2_chain.clone()),
        ],
        Arc::new(SimulatedBackend::new(sepolia_chain.clone(), defaults.trading.max_slippage_bps)),
    );

    for _ in 0..3 {
        let ticket = scheduler
            .enqueue_kind(ActionKind::stake(1.0), &sepolia.name, &wallet)
            .unwrap();
        assert!(ticket.outcome().await.is_some());
    }

    let on_r2 = scheduler
        .enqueue_kind(ActionKind::stake(1.0), &r2.name, &wallet)
        .unwrap()
        .outcome()
        .await
        .expect("first stake on the second network should succeed");

    assert_eq!(on_r2.transaction.nonce, 0);
    assert_eq!(r2_chain.pending_count_queries(), 1);
    assert_eq!(sepolia_chain.pending_count_queries(), 1);
    assert_eq!(r2_chain.submitted_by(wallet.address).len(), 1);
    assert!(!scheduler.log().contains("nonce too high"));
}
