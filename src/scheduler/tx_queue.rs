//! Per-wallet serialized transaction queue
//!
//! Every wallet gets one worker task fed by an unbounded mpsc channel. A job
//! is fully resolved (submission, receipt, classification) before the worker
//! takes the next one, so a wallet never has two transactions in flight and
//! its nonce cache entry is only touched from its own worker. Wallets do not
//! wait on each other.

use alloy_primitives::Address;
use chrono::Local;
use dashmap::DashMap;
use futures::FutureExt;
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error};

use super::queue_board::{QueueBoard, QueueEntry, QueueStatus};
use super::scheduler_errors::{SchedulerError, TransactionError};
use crate::activity_log::ActivityLog;
use crate::actions::{ActionContext, TransactionAction};
use crate::config::NetworkConfig;
use crate::metrics::{metrics, Timer};
use crate::nonce_manager::NonceCache;
use crate::rpc::NetworkConnection;
use crate::types::{short_hash, Confirmed, NetworkId, Wallet};

/// A configured network and the connection used to reach it
#[derive(Debug, Clone)]
pub struct NetworkHandle {
    pub config: NetworkConfig,
    pub connection: Arc<dyn NetworkConnection>,
}

impl NetworkHandle {
    pub fn new(config: NetworkConfig, connection: Arc<dyn NetworkConnection>) -> Self {
        Self { config, connection }
    }

    pub fn name(&self) -> &NetworkId {
        &self.config.name
    }
}

/// Handle to the eventual outcome of a queued job
#[derive(Debug)]
pub struct QueueTicket {
    pub id: u64,
    rx: oneshot::Receiver<Option<Confirmed>>,
}

impl QueueTicket {
    /// `Some` when the transaction was mined with success status
    pub async fn outcome(self) -> Option<Confirmed> {
        self.rx.await.ok().flatten()
    }
}

struct Job {
    id: u64,
    action: Box<dyn TransactionAction>,
    network: Arc<NetworkHandle>,
    wallet: Wallet,
    reply: oneshot::Sender<Option<Confirmed>>,
}

struct QueueInner {
    networks: HashMap<NetworkId, Arc<NetworkHandle>>,
    nonces: NonceCache,
    board: QueueBoard,
    log: Arc<ActivityLog>,
    workers: DashMap<Address, mpsc::UnboundedSender<Job>>,
    confirmation_timeout: Option<Duration>,
}

#[derive(Clone)]
pub struct TransactionQueue {
    inner: Arc<QueueInner>,
}

impl std::fmt::Debug for TransactionQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransactionQueue")
            .field("networks", &self.inner.networks.keys().collect::<Vec<_>>())
            .field("workers", &self.inner.workers.len())
            .field("board", &self.inner.board)
            .finish()
    }
}

impl TransactionQueue {
    pub fn new(
        networks: Vec<NetworkHandle>,
        log: Arc<ActivityLog>,
        confirmation_timeout: Option<Duration>,
    ) -> Self {
        let networks = networks
            .into_iter()
            .map(|handle| (handle.name().clone(), Arc::new(handle)))
            .collect();

        Self {
            inner: Arc::new(QueueInner {
                networks,
                nonces: NonceCache::new(),
                board: QueueBoard::new(),
                log,
                workers: DashMap::new(),
                confirmation_timeout,
            }),
        }
    }

    pub fn network(&self, name: &NetworkId) -> Option<Arc<NetworkHandle>> {
        self.inner.networks.get(name).cloned()
    }

    pub fn networks(&self) -> impl Iterator<Item = &NetworkId> {
        self.inner.networks.keys()
    }

    pub fn board(&self) -> &QueueBoard {
        &self.inner.board
    }

    pub fn nonces(&self) -> &NonceCache {
        &self.inner.nonces
    }

    /// Queue `action` behind every job already queued for `wallet`.
    ///
    /// Must be called from within a Tokio runtime; the wallet's worker is
    /// spawned on first use. Business failures never surface here: they
    /// resolve the ticket to `None`.
    pub fn enqueue(
        &self,
        action: Box<dyn TransactionAction>,
        description: impl Into<String>,
        network: &NetworkId,
        wallet: &Wallet,
    ) -> Result<QueueTicket, SchedulerError> {
        let handle = self
            .network(network)
            .ok_or_else(|| SchedulerError::UnknownNetwork(network.clone()))?;

        let inner = &self.inner;
        let id = inner.board.allocate_id();
        let description = description.into();

        inner.board.add(QueueEntry {
            id,
            description: description.clone(),
            submitted_at: Local::now(),
            status: QueueStatus::Queued,
            wallet: wallet.address,
            network: network.clone(),
        });
        inner.log.system(
            network,
            format!(
                "Transaction [{}] added to queue: {} (Wallet: {})",
                id,
                description,
                wallet.short_address()
            ),
        );

        let (reply, rx) = oneshot::channel();
        let job = Job {
            id,
            action,
            network: handle,
            wallet: wallet.clone(),
            reply,
        };

        let sender = self.worker(wallet.address);
        if sender.send(job).is_err() {
            inner.workers.remove(&wallet.address);
            inner.board.remove(id);
            return Err(SchedulerError::QueueClosed(wallet.short_address()));
        }

        metrics().tx_enqueued.inc();
        Ok(QueueTicket { id, rx })
    }

    fn worker(&self, address: Address) -> mpsc::UnboundedSender<Job> {
        self.inner
            .workers
            .entry(address)
            .or_insert_with(|| {
                let (tx, rx) = mpsc::unbounded_channel();
                tokio::spawn(run_worker(Arc::clone(&self.inner), rx));
                debug!(%address, "Spawned wallet queue worker");
                tx
            })
            .clone()
    }
}

async fn run_worker(inner: Arc<QueueInner>, mut jobs: mpsc::UnboundedReceiver<Job>) {
    while let Some(job) = jobs.recv().await {
        let outcome = inner.process(&job).await;
        // caller may have dropped its ticket
        let _ = job.reply.send(outcome);
    }
}

impl QueueInner {
    async fn process(&self, job: &Job) -> Option<Confirmed> {
        scopeguard::defer! {
            self.board.remove(job.id);
        }

        let network = job.network.name();
        let wallet = &job.wallet;
        self.board.set_status(job.id, QueueStatus::Processing);

        match self.execute(job).await {
            Ok(confirmed) if confirmed.receipt.status => {
                self.board.set_status(job.id, QueueStatus::Completed);
                metrics().tx_completed.inc();
                self.log.success(
                    network,
                    format!(
                        "Transaction completed. Hash: {} (Wallet: {})",
                        short_hash(&confirmed.hash),
                        wallet.short_address()
                    ),
                );
                Some(confirmed)
            }
            Ok(_) => {
                self.board.set_status(job.id, QueueStatus::Failed);
                metrics().tx_failed.inc();
                self.nonces.invalidate(network, wallet.address);
                self.log.error(
                    network,
                    format!(
                        "Transaction [{}] failed: rejected by contract (Wallet: {})",
                        job.id,
                        wallet.short_address()
                    ),
                );
                None
            }
            Err(err) => {
                self.board.set_status(job.id, QueueStatus::Error);
                metrics().tx_errored.inc();
                self.nonces.invalidate(network, wallet.address);
                self.log.error(
                    network,
                    format!(
                        "Transaction [{}] failed: {} (Wallet: {})",
                        job.id,
                        err,
                        wallet.short_address()
                    ),
                );
                None
            }
        }
    }

    async fn execute(&self, job: &Job) -> Result<Confirmed, TransactionError> {
        let connection = job.network.connection.as_ref();
        let wallet = &job.wallet;

        let nonce = self
            .nonces
            .reserve(job.network.name(), wallet.address, connection)
            .await
            .map_err(TransactionError::Nonce)?;

        let ctx = ActionContext {
            nonce,
            wallet,
            connection,
            network: &job.network.config,
        };
        let submitted = AssertUnwindSafe(job.action.submit(ctx))
            .catch_unwind()
            .await
            .map_err(|_| {
                error!(id = job.id, "Action panicked during submission");
                TransactionError::Panicked
            })??;

        self.log.warning(
            job.network.name(),
            format!(
                "Transaction sent. Hash: {} (Wallet: {})",
                short_hash(&submitted.hash),
                wallet.short_address()
            ),
        );

        let timer = Timer::new();
        let wait = connection.wait_for_receipt(submitted.hash);
        let receipt = match self.confirmation_timeout {
            Some(limit) => tokio::time::timeout(limit, wait)
                .await
                .map_err(|_| TransactionError::ConfirmationTimeout(limit))?,
            None => wait.await,
        }
        .map_err(TransactionError::Receipt)?;
        timer.observe_duration(&metrics().confirmation_latency);

        Ok(Confirmed {
            hash: submitted.hash,
            receipt,
            transaction: submitted,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::ActionError;
    use crate::scheduler::queue_board::QueueEvent;
    use crate::simulation::SimulatedNetwork;
    use crate::types::SubmittedTx;
    use async_trait::async_trait;

    /// Submits an empty transfer through the simulated chain
    struct Transfer;

    #[async_trait]
    impl TransactionAction for Transfer {
        async fn submit(&self, ctx: ActionContext<'_>) -> Result<SubmittedTx, ActionError> {
            let raw = SimulatedNetwork::encode_transaction(ctx.wallet.address, ctx.nonce, None);
            let hash = ctx.connection.send_raw_transaction(&raw).await?;
            Ok(SubmittedTx {
                hash,
                nonce: ctx.nonce,
                from: ctx.wallet.address,
                to: None,
            })
        }
    }

    struct Refuse;

    #[async_trait]
    impl TransactionAction for Refuse {
        async fn submit(&self, _ctx: ActionContext<'_>) -> Result<SubmittedTx, ActionError> {
            Err(ActionError::InvalidAmount("refused".to_string()))
        }
    }

    struct Explode;

    #[async_trait]
    impl TransactionAction for Explode {
        async fn submit(&self, _ctx: ActionContext<'_>) -> Result<SubmittedTx, ActionError> {
            panic!("encoder bug");
        }
    }

    fn setup(
        block_time: Duration,
        timeout: Option<Duration>,
    ) -> (TransactionQueue, Arc<SimulatedNetwork>, NetworkId) {
        let network = Arc::new(SimulatedNetwork::new(block_time));
        let config = crate::config::Config::default().networks[0].clone();
        let name = config.name.clone();
        let queue = TransactionQueue::new(
            vec![NetworkHandle::new(config, network.clone())],
            Arc::new(ActivityLog::new()),
            timeout,
        );
        (queue, network, name)
    }

    fn wallet(byte: u8) -> Wallet {
        Wallet::new(format!("Wallet {}", byte), Address::repeat_byte(byte))
    }

    #[tokio::test]
    async fn test_success_resolves_with_receipt() {
        let (queue, _network, name) = setup(Duration::from_millis(5), None);
        let w = wallet(1);

        let ticket = queue.enqueue(Box::new(Transfer), "transfer", &name, &w).unwrap();
        assert_eq!(queue.board().get(ticket.id).unwrap().status, QueueStatus::Queued);

        let confirmed = ticket.outcome().await.unwrap();
        assert!(confirmed.receipt.status);
        assert_eq!(confirmed.transaction.nonce, 0);
        assert_eq!(confirmed.hash, confirmed.receipt.transaction_hash);
        assert!(queue.board().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_network_is_rejected_before_queueing() {
        let (queue, _network, _) = setup(Duration::from_millis(5), None);
        let err = queue
            .enqueue(Box::new(Transfer), "transfer", &NetworkId::from("Mainnet"), &wallet(1))
            .unwrap_err();
        assert_eq!(err, SchedulerError::UnknownNetwork(NetworkId::from("Mainnet")));
        assert!(queue.board().is_empty());
    }

    #[tokio::test]
    async fn test_action_error_invalidates_nonce() {
        let (queue, network, name) = setup(Duration::from_millis(5), None);
        let w = wallet(2);

        let first = queue.enqueue(Box::new(Transfer), "a", &name, &w).unwrap();
        assert!(first.outcome().await.is_some());
        assert_eq!(queue.nonces().peek(&name, &w.address), Some(1));

        assert!(queue.enqueue(Box::new(Refuse), "b", &name, &w).unwrap().outcome().await.is_none());
        assert_eq!(queue.nonces().peek(&name, &w.address), None);

        let third = queue.enqueue(Box::new(Transfer), "c", &name, &w).unwrap();
        let confirmed = third.outcome().await.unwrap();
        assert_eq!(confirmed.transaction.nonce, 1);
        assert_eq!(network.pending_count_queries(), 2);
    }

    #[tokio::test]
    async fn test_panicking_action_is_classified_as_error() {
        let (queue, _network, name) = setup(Duration::from_millis(5), None);
        let w = wallet(3);

        let mut events = queue.board().subscribe();
        let ticket = queue.enqueue(Box::new(Explode), "boom", &name, &w).unwrap();
        let id = ticket.id;
        assert!(ticket.outcome().await.is_none());

        // worker survives the panic
        let after = queue.enqueue(Box::new(Transfer), "after", &name, &w).unwrap();
        assert!(after.outcome().await.is_some());

        let mut saw_error = false;
        while let Ok(event) = events.try_recv() {
            if event == (QueueEvent::StatusChanged { id, status: QueueStatus::Error }) {
                saw_error = true;
            }
        }
        assert!(saw_error);
    }

    #[tokio::test(start_paused = true)]
    async fn test_confirmation_timeout_is_an_error() {
        let (queue, network, name) =
            setup(Duration::from_secs(600), Some(Duration::from_secs(300)));
        let w = wallet(4);

        let outcome = queue.enqueue(Box::new(Transfer), "slow", &name, &w).unwrap().outcome().await;
        assert!(outcome.is_none());
        assert_eq!(queue.nonces().peek(&name, &w.address), None);
        assert_eq!(network.submitted().len(), 1);
        assert!(queue.board().is_empty());
    }
}
