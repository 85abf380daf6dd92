//! Wallet scheduler
//!
//! [`WalletScheduler`] is the single context object for the pipeline. It owns
//! the per-wallet transaction queue, the nonce cache, the queue board, stop
//! flags, running-action counters, swap directions and random amount ranges.
//! Cloning it is cheap and every clone shares the same state.
//!
//! Two serialization domains apply per wallet:
//! - the transaction queue, always enforced, one job in flight per wallet;
//! - the running-action counter, advisory, rejecting a second auto or manual
//!   run for the same wallet on the same network.

use parking_lot::RwLock;
use rand::Rng;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

pub mod cancellation;
pub mod queue_board;
pub mod scheduler_errors;
pub mod swap_direction;
pub mod tx_queue;

pub use cancellation::{wait_with_cancel, CancellationRegistry, RunGuard, RunningActions};
pub use queue_board::{QueueBoard, QueueEntry, QueueEvent, QueueStatus, EMPTY_QUEUE_TEXT};
pub use scheduler_errors::{SchedulerError, TransactionError};
pub use swap_direction::SwapDirections;
pub use tx_queue::{NetworkHandle, QueueTicket, TransactionQueue};

use crate::activity_log::ActivityLog;
use crate::actions::{ActionBackend, ActionKind, AmountRanges, BoundAction, TransactionAction};
use crate::config::{RangeConfig, SchedulerConfig, TradingConfig};
use crate::metrics::metrics;
use crate::nonce_manager::NonceStats;
use crate::types::{Confirmed, NetworkId, SwapPair, Token, Wallet};

/// What an auto run does for each wallet
#[derive(Debug, Clone, PartialEq)]
pub enum AutoPlan {
    /// Swap back and forth on a pair, `iterations` times per wallet
    AlternatingSwap { pair: SwapPair, iterations: u32 },

    /// One fixed-amount operation per wallet (stake, add liquidity)
    Once(ActionKind),
}

impl AutoPlan {
    pub fn name(&self) -> String {
        match self {
            AutoPlan::AlternatingSwap { pair, .. } => {
                let [a, b] = pair.tokens();
                format!("Auto Swap {} & {}", a, b)
            }
            AutoPlan::Once(ActionKind::Stake { .. }) => "Auto Stake R2USD".to_string(),
            AutoPlan::Once(ActionKind::AddLiquidity { pool, .. }) => format!("Auto Add LP {}", pool),
            AutoPlan::Once(ActionKind::Swap { leg, .. }) => format!("Auto Swap {} to {}", leg.from, leg.to),
        }
    }
}

/// Per-run tally over all wallets
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Wallets whose run started
    pub started: usize,
    /// Wallets skipped because they were already running
    pub skipped: usize,
    /// Iterations that ended with a successful receipt
    pub confirmed: usize,
    /// Iterations that ended without one
    pub unconfirmed: usize,
    /// Wallets stopped before their last iteration
    pub stopped: usize,
}

struct SchedulerInner {
    queue: TransactionQueue,
    log: Arc<ActivityLog>,
    backend: Arc<dyn ActionBackend>,
    cancellations: CancellationRegistry,
    running: RunningActions,
    directions: SwapDirections,
    ranges: RwLock<AmountRanges>,
    settings: SchedulerConfig,
}

#[derive(Clone)]
pub struct WalletScheduler {
    inner: Arc<SchedulerInner>,
}

impl std::fmt::Debug for WalletScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WalletScheduler")
            .field("queue", &self.inner.queue)
            .field("settings", &self.inner.settings)
            .finish()
    }
}

impl WalletScheduler {
    pub fn new(
        settings: SchedulerConfig,
        trading: &TradingConfig,
        networks: Vec<NetworkHandle>,
        backend: Arc<dyn ActionBackend>,
    ) -> Self {
        let log = Arc::new(ActivityLog::new());
        let queue = TransactionQueue::new(networks, Arc::clone(&log), settings.confirmation_timeout());

        Self {
            inner: Arc::new(SchedulerInner {
                queue,
                log,
                backend,
                cancellations: CancellationRegistry::new(),
                running: RunningActions::new(),
                directions: SwapDirections::new(),
                ranges: RwLock::new(AmountRanges::from_config(trading)),
                settings,
            }),
        }
    }

    pub fn log(&self) -> &ActivityLog {
        &self.inner.log
    }

    pub fn board(&self) -> &QueueBoard {
        self.inner.queue.board()
    }

    pub fn queue(&self) -> &TransactionQueue {
        &self.inner.queue
    }

    pub fn nonce_stats(&self) -> NonceStats {
        self.inner.queue.nonces().stats()
    }

    pub fn network(&self, name: &NetworkId) -> Result<Arc<NetworkHandle>, SchedulerError> {
        self.inner
            .queue
            .network(name)
            .ok_or_else(|| SchedulerError::UnknownNetwork(name.clone()))
    }

    // ---- queue -------------------------------------------------------------

    /// Queue an arbitrary action for `wallet`
    pub fn enqueue(
        &self,
        action: Box<dyn TransactionAction>,
        description: impl Into<String>,
        network: &NetworkId,
        wallet: &Wallet,
    ) -> Result<QueueTicket, SchedulerError> {
        self.inner.queue.enqueue(action, description, network, wallet)
    }

    /// Queue `kind` using the configured backend
    pub fn enqueue_kind(
        &self,
        kind: ActionKind,
        network: &NetworkId,
        wallet: &Wallet,
    ) -> Result<QueueTicket, SchedulerError> {
        let action = BoundAction::new(Arc::clone(&self.inner.backend), kind);
        let description = action.kind().describe();
        self.enqueue(Box::new(action), description, network, wallet)
    }

    /// Queue `kind` and wait for its outcome
    pub async fn perform(
        &self,
        network: &NetworkId,
        wallet: &Wallet,
        kind: ActionKind,
    ) -> Result<Option<Confirmed>, SchedulerError> {
        Ok(self.enqueue_kind(kind, network, wallet)?.outcome().await)
    }

    // ---- swaps -------------------------------------------------------------

    /// Current direction of `pair` on `network`; `true` is the forward leg
    pub fn direction(&self, network: &NetworkId, pair: SwapPair) -> bool {
        self.inner.directions.get(network, pair)
    }

    pub fn amount_range(&self, pair: SwapPair, token: Token) -> Option<RangeConfig> {
        self.inner.ranges.read().range(pair, token)
    }

    /// Change the random amount range of both tokens of `pair`
    pub fn set_range(&self, pair: SwapPair, min: f64, max: f64) -> Result<(), SchedulerError> {
        self.inner
            .ranges
            .write()
            .set_range(pair, min, max)
            .map_err(|e| SchedulerError::InvalidInput(e.to_string()))?;
        info!(%pair, min, max, "Swap amount range updated");
        Ok(())
    }

    /// One alternating-swap step: swap a random amount on the current leg and
    /// flip the direction only if the receipt reports success
    pub async fn swap_step(
        &self,
        network: &NetworkId,
        wallet: &Wallet,
        pair: SwapPair,
    ) -> Result<Option<Confirmed>, SchedulerError> {
        let direction = self.inner.directions.get(network, pair);
        let leg = pair.leg(direction);
        let amount = self
            .inner
            .ranges
            .read()
            .sample(pair, leg.from, &mut rand::thread_rng())
            .map_err(|e| SchedulerError::InvalidInput(e.to_string()))?;

        self.inner.log.swap(
            network,
            format!(
                "Attempting swap: {:.6} {} to {} for wallet {}",
                amount,
                leg.from,
                leg.to,
                wallet.short_address()
            ),
        );

        let outcome = self
            .perform(network, wallet, ActionKind::swap(leg, amount))
            .await?;
        if outcome.as_ref().is_some_and(|c| c.receipt.status) {
            self.inner.directions.flip_from(network, pair, direction);
        }
        Ok(outcome)
    }

    // ---- runs --------------------------------------------------------------

    /// Run `action` `iterations` times for each wallet in order.
    ///
    /// A wallet already running on `network` is skipped with a warning. Each
    /// iteration checks the stop flag first; between iterations the loop waits
    /// a random delay from the configured window, polling the flag. Errors end
    /// that wallet's run and the loop moves on to the next wallet.
    pub async fn run_auto_action<F, Fut>(
        &self,
        action_name: &str,
        network: &NetworkId,
        iterations: u32,
        wallets: &[Wallet],
        mut action: F,
    ) -> Result<RunSummary, SchedulerError>
    where
        F: FnMut(NetworkId, Wallet) -> Fut,
        Fut: Future<Output = Result<Option<Confirmed>, SchedulerError>>,
    {
        self.network(network)?;
        if iterations == 0 {
            return Err(SchedulerError::InvalidInput(
                "iteration count must be positive".to_string(),
            ));
        }

        let inner = &self.inner;
        let mut summary = RunSummary::default();

        for wallet in wallets {
            let short = wallet.short_address();
            let Some(_run) = inner.running.try_begin(network, wallet.address) else {
                inner.log.warning(
                    network,
                    format!(
                        "{}: cannot start for wallet {} because a transaction is running on {}",
                        action_name, short, network
                    ),
                );
                metrics().runs_skipped_busy.inc();
                summary.skipped += 1;
                continue;
            };
            inner.cancellations.clear(network, wallet.address);
            summary.started += 1;

            for i in 1..=iterations {
                if inner.cancellations.is_cancelled(network, wallet.address) {
                    inner.log.swap(
                        network,
                        format!("{}: stopped at iteration {} for wallet {}", action_name, i, short),
                    );
                    metrics().runs_cancelled.inc();
                    summary.stopped += 1;
                    break;
                }

                inner
                    .log
                    .swap(network, format!("Starting iteration {} for wallet {}", i, short));

                match action(network.clone(), wallet.clone()).await {
                    Ok(Some(_)) => summary.confirmed += 1,
                    Ok(None) => summary.unconfirmed += 1,
                    Err(err) => {
                        summary.unconfirmed += 1;
                        inner.log.error(
                            network,
                            format!("{}: failed - {} (Wallet: {})", action_name, err, short),
                        );
                        break;
                    }
                }

                if i < iterations {
                    let delay = self.random_delay();
                    inner.log.swap(
                        network,
                        format!(
                            "Iteration {} finished for wallet {}. Waiting {} min {} s.",
                            i,
                            short,
                            delay.as_secs() / 60,
                            delay.as_secs() % 60
                        ),
                    );
                    let completed = wait_with_cancel(delay, inner.settings.cancel_poll_interval(), || {
                        inner.cancellations.is_cancelled(network, wallet.address)
                    })
                    .await;
                    if !completed {
                        debug!(%network, wallet = %short, "Delay interrupted by stop request");
                    }
                }
            }

            inner
                .log
                .swap(network, format!("{}: finished for wallet {}", action_name, short));
        }

        Ok(summary)
    }

    /// Run a plan for every wallet
    pub async fn run_plan(
        &self,
        network: &NetworkId,
        plan: AutoPlan,
        wallets: &[Wallet],
    ) -> Result<RunSummary, SchedulerError> {
        let name = plan.name();
        match plan {
            AutoPlan::AlternatingSwap { pair, iterations } => {
                self.run_auto_action(&name, network, iterations, wallets, |network, wallet| {
                    let this = self.clone();
                    async move { this.swap_step(&network, &wallet, pair).await }
                })
                .await
            }
            AutoPlan::Once(kind) => {
                kind.validate()
                    .map_err(|e| SchedulerError::InvalidInput(e.to_string()))?;
                self.run_auto_action(&name, network, 1, wallets, |network, wallet| {
                    let this = self.clone();
                    let kind = kind.clone();
                    async move { this.perform(&network, &wallet, kind).await }
                })
                .await
            }
        }
    }

    /// Run a single action for one wallet, rejected if the wallet is busy
    pub async fn run_manual(
        &self,
        network: &NetworkId,
        wallet: &Wallet,
        kind: ActionKind,
    ) -> Result<Option<Confirmed>, SchedulerError> {
        self.network(network)?;
        kind.validate()
            .map_err(|e| SchedulerError::InvalidInput(e.to_string()))?;

        let inner = &self.inner;
        let Some(_run) = inner.running.try_begin(network, wallet.address) else {
            inner.log.warning(
                network,
                format!(
                    "{}: wallet {} already has a running transaction on {}",
                    kind,
                    wallet.short_address(),
                    network
                ),
            );
            return Err(SchedulerError::WalletBusy {
                network: network.clone(),
                wallet: wallet.short_address(),
            });
        };
        inner.cancellations.clear(network, wallet.address);

        let description = kind.describe();
        let outcome = self.perform(network, wallet, kind).await?;
        match &outcome {
            Some(_) => inner.log.success(
                network,
                format!("{}: Done (Wallet: {})", description, wallet.short_address()),
            ),
            None => inner.log.error(
                network,
                format!("{}: Failed (Wallet: {})", description, wallet.short_address()),
            ),
        }
        Ok(outcome)
    }

    /// Ask every run on `network` to stop at its next check
    pub fn stop(&self, network: &NetworkId) -> usize {
        let flagged = self.inner.cancellations.request_stop_network(network);
        self.inner.log.system(
            network,
            format!("Stop requested for running actions on {}", network),
        );
        flagged
    }

    /// Whether any wallet has a running auto or manual action on `network`
    pub fn has_running(&self, network: &NetworkId) -> bool {
        self.inner.running.has_running(network)
    }

    pub fn running_count(&self, network: &NetworkId, wallet: &Wallet) -> usize {
        self.inner.running.count(network, wallet.address)
    }

    fn random_delay(&self) -> Duration {
        let (min, max) = self.inner.settings.delay_window();
        if max <= min {
            return min;
        }
        let millis = rand::thread_rng().gen_range(min.as_millis() as u64..max.as_millis() as u64);
        Duration::from_millis(millis)
    }
}
