//! Benchmarks for the per-wallet transaction pipeline
//!
//! Runs against the simulated chain with a zero block time, so the numbers
//! measure queue, nonce cache and board overhead rather than confirmation.
//!
//! Benchmarks:
//! - Nonce reservation on a warm cache
//! - One wallet draining a burst of jobs
//! - Many wallets draining concurrently

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use std::sync::Arc;
use std::time::Duration;

use r2_autobot::actions::ActionKind;
use r2_autobot::config::{Config, SchedulerConfig};
use r2_autobot::nonce_manager::NonceCache;
use r2_autobot::scheduler::{NetworkHandle, WalletScheduler};
use r2_autobot::simulation::{seed_wallets, simulated_network_config, SimulatedBackend, SimulatedNetwork};
use r2_autobot::{Address, NetworkId, Wallet};

/// Helper: scheduler over a fresh simulated chain with `wallet_count` funded wallets
fn setup(wallet_count: u8) -> (WalletScheduler, NetworkId, Vec<Wallet>) {
    let mut defaults = Config::default();
    defaults.simulation.initial_token_balance = 1_000_000_000.0;
    let config = simulated_network_config(defaults.networks[0].clone());
    let network = config.name.clone();
    let chain = Arc::new(SimulatedNetwork::new(Duration::ZERO));

    let wallets: Vec<Wallet> = (1..=wallet_count)
        .map(|i| Wallet::new(format!("Wallet {}", i), Address::repeat_byte(i)))
        .collect();
    seed_wallets(&chain, &config, &wallets, &defaults.simulation);

    let settings = SchedulerConfig {
        min_delay_secs: 0,
        max_delay_secs: 0,
        cancel_poll_interval_ms: 10,
        confirmation_timeout_secs: 0,
    };
    let scheduler = WalletScheduler::new(
        settings,
        &defaults.trading,
        vec![NetworkHandle::new(config, chain.clone())],
        Arc::new(SimulatedBackend::new(chain, defaults.trading.max_slippage_bps)),
    );
    (scheduler, network, wallets)
}

/// Benchmark: nonce reservation once the address is cached
fn bench_nonce_reservation(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let chain = SimulatedNetwork::new(Duration::ZERO);
    let cache = NonceCache::new();
    let address = Address::repeat_byte(0x42);
    let network = NetworkId::new("Sepolia");

    c.bench_function("nonce_reservation_warm", |b| {
        b.iter(|| {
            rt.block_on(async {
                black_box(cache.reserve(&network, address, &chain).await.unwrap());
            })
        });
    });
}

/// Benchmark: one wallet draining a burst of stake jobs
fn bench_single_wallet_burst(c: &mut Criterion) {
    let mut group = c.benchmark_group("single_wallet_burst");
    let rt = tokio::runtime::Runtime::new().unwrap();

    for burst in [1usize, 10, 50].iter() {
        let (scheduler, network, wallets) = rt.block_on(async { setup(1) });

        group.bench_with_input(BenchmarkId::from_parameter(burst), burst, |b, &burst| {
            b.iter(|| {
                rt.block_on(async {
                    let tickets: Vec<_> = (0..burst)
                        .map(|_| {
                            scheduler
                                .enqueue_kind(ActionKind::stake(0.01), &network, &wallets[0])
                                .unwrap()
                        })
                        .collect();
                    for ticket in tickets {
                        black_box(ticket.outcome().await);
                    }
                })
            });
        });
    }

    group.finish();
}

/// Benchmark: independent wallets draining in parallel
fn bench_concurrent_wallets(c: &mut Criterion) {
    let mut group = c.benchmark_group("concurrent_wallets");
    let rt = tokio::runtime::Runtime::new().unwrap();

    for wallet_count in [2u8, 8, 32].iter() {
        let (scheduler, network, wallets) = rt.block_on(async { setup(*wallet_count) });

        group.bench_with_input(
            BenchmarkId::from_parameter(wallet_count),
            wallet_count,
            |b, _| {
                b.iter(|| {
                    rt.block_on(async {
                        let tickets: Vec<_> = wallets
                            .iter()
                            .map(|wallet| {
                                scheduler
                                    .enqueue_kind(ActionKind::stake(0.01), &network, wallet)
                                    .unwrap()
                            })
                            .collect();
                        for ticket in tickets {
                            black_box(ticket.outcome().await);
                        }
                    })
                });
            },
        );
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_nonce_reservation,
    bench_single_wallet_burst,
    bench_concurrent_wallets,
);
criterion_main!(benches);
