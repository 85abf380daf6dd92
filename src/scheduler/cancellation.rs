//! Stop flags and running-action counters per (network, wallet)

use alloy_primitives::Address;
use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

use crate::metrics::metrics;
use crate::types::NetworkId;

type RunKey = (NetworkId, Address);

/// Cooperative stop flags consulted by auto loops and delay waits
#[derive(Debug, Default)]
pub struct CancellationRegistry {
    flags: DashMap<RunKey, bool>,
}

impl CancellationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reset the flag; called when a run starts
    pub fn clear(&self, network: &NetworkId, wallet: Address) {
        self.flags.insert((network.clone(), wallet), false);
    }

    /// Flag every wallet that has run on `network`; returns how many were set
    pub fn request_stop_network(&self, network: &NetworkId) -> usize {
        let mut count = 0;
        for mut flag in self.flags.iter_mut() {
            if &flag.key().0 == network {
                *flag.value_mut() = true;
                count += 1;
            }
        }
        count
    }

    pub fn is_cancelled(&self, network: &NetworkId, wallet: Address) -> bool {
        self.flags
            .get(&(network.clone(), wallet))
            .map(|flag| *flag)
            .unwrap_or(false)
    }
}

/// Advisory counter of auto/manual runs per (network, wallet)
#[derive(Debug, Clone, Default)]
pub struct RunningActions {
    counts: Arc<DashMap<RunKey, usize>>,
}

impl RunningActions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a run unless one is already active for this wallet on `network`.
    /// The run ends when the returned guard drops, including on panic.
    pub fn try_begin(&self, network: &NetworkId, wallet: Address) -> Option<RunGuard> {
        let key = (network.clone(), wallet);
        {
            let mut count = self.counts.entry(key.clone()).or_insert(0);
            if *count > 0 {
                return None;
            }
            *count += 1;
        }
        metrics().active_runs.inc();
        Some(RunGuard {
            counts: Arc::clone(&self.counts),
            key,
        })
    }

    pub fn count(&self, network: &NetworkId, wallet: Address) -> usize {
        self.counts
            .get(&(network.clone(), wallet))
            .map(|count| *count)
            .unwrap_or(0)
    }

    /// Whether any wallet has an active run on `network`
    pub fn has_running(&self, network: &NetworkId) -> bool {
        self.counts
            .iter()
            .any(|entry| &entry.key().0 == network && *entry.value() > 0)
    }
}

/// Active run marker; decrements the counter on drop
#[derive(Debug)]
pub struct RunGuard {
    counts: Arc<DashMap<RunKey, usize>>,
    key: RunKey,
}

impl Drop for RunGuard {
    fn drop(&mut self) {
        if let Some(mut count) = self.counts.get_mut(&self.key) {
            *count = count.saturating_sub(1);
        }
        metrics().active_runs.dec();
    }
}

/// Sleep for `duration` while polling `is_cancelled` every `poll`.
///
/// Returns `true` when the full duration elapsed and `false` as soon as a
/// stop is observed.
pub async fn wait_with_cancel<F>(duration: Duration, poll: Duration, mut is_cancelled: F) -> bool
where
    F: FnMut() -> bool,
{
    let deadline = Instant::now() + duration;
    loop {
        if is_cancelled() {
            return false;
        }
        let now = Instant::now();
        if now >= deadline {
            return true;
        }
        tokio::time::sleep(poll.min(deadline - now)).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};

    fn sepolia() -> NetworkId {
        NetworkId::from("Sepolia")
    }

    #[test]
    fn test_flags_are_per_network_and_wallet() {
        let registry = CancellationRegistry::new();
        let a = Address::repeat_byte(1);
        let b = Address::repeat_byte(2);
        let r2 = NetworkId::from("Sepolia R2");

        registry.clear(&sepolia(), a);
        registry.clear(&sepolia(), b);
        registry.clear(&r2, a);

        assert_eq!(registry.request_stop_network(&sepolia()), 2);
        assert!(registry.is_cancelled(&sepolia(), a));
        assert!(registry.is_cancelled(&sepolia(), b));
        assert!(!registry.is_cancelled(&r2, a));

        registry.clear(&sepolia(), a);
        assert!(!registry.is_cancelled(&sepolia(), a));
    }

    #[test]
    fn test_running_guard_excludes_second_run() {
        let running = RunningActions::new();
        let wallet = Address::repeat_byte(3);

        let guard = running.try_begin(&sepolia(), wallet).unwrap();
        assert_eq!(running.count(&sepolia(), wallet), 1);
        assert!(running.has_running(&sepolia()));
        assert!(running.try_begin(&sepolia(), wallet).is_none());
        assert!(running
            .try_begin(&NetworkId::from("Sepolia R2"), wallet)
            .is_some());

        drop(guard);
        assert_eq!(running.count(&sepolia(), wallet), 0);
        assert!(!running.has_running(&sepolia()));
        assert!(running.try_begin(&sepolia(), wallet).is_some());
    }

    #[test]
    fn test_guard_released_on_panic() {
        let running = RunningActions::new();
        let wallet = Address::repeat_byte(4);
        let cloned = running.clone();

        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(move || {
            let _guard = cloned.try_begin(&sepolia(), wallet).unwrap();
            panic!("action blew up");
        }));
        assert!(result.is_err());
        assert_eq!(running.count(&sepolia(), wallet), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_completes_without_stop() {
        let started = Instant::now();
        assert!(wait_with_cancel(Duration::from_secs(30), Duration::from_millis(100), || false).await);
        assert!(started.elapsed() >= Duration::from_secs(30));
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_returns_promptly_after_stop() {
        let flag = Arc::new(AtomicBool::new(false));
        let setter = Arc::clone(&flag);
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(5)).await;
            setter.store(true, Ordering::SeqCst);
        });

        let started = Instant::now();
        let finished = wait_with_cancel(Duration::from_secs(60), Duration::from_millis(100), || {
            flag.load(Ordering::SeqCst)
        })
        .await;

        assert!(!finished);
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_secs(5));
        assert!(elapsed <= Duration::from_secs(5) + Duration::from_millis(100));
    }
}
