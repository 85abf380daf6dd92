//! Display list of queued and in-flight transactions
//!
//! Writers serialize on a mutex and publish a fresh snapshot after every
//! change; readers load the snapshot without locking. Every change is also
//! sent on a broadcast feed for live views, under the same lock, so the feed
//! order matches the snapshot order.

use alloy_primitives::Address;
use arc_swap::ArcSwap;
use chrono::{DateTime, Local};
use parking_lot::Mutex;
use serde::Serialize;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::broadcast;

use crate::metrics::metrics;
use crate::types::{short_address, NetworkId};

/// Text shown when nothing is queued
pub const EMPTY_QUEUE_TEXT: &str = "No transactions in queue.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum QueueStatus {
    Queued,
    Processing,
    /// Mined with success status
    Completed,
    /// Mined with failure status
    Failed,
    /// Construction, submission or wait error
    Error,
}

impl QueueStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            QueueStatus::Completed | QueueStatus::Failed | QueueStatus::Error
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            QueueStatus::Queued => "queued",
            QueueStatus::Processing => "processing",
            QueueStatus::Completed => "completed",
            QueueStatus::Failed => "failed",
            QueueStatus::Error => "error",
        }
    }
}

impl fmt::Display for QueueStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueueEntry {
    pub id: u64,
    pub description: String,
    pub submitted_at: DateTime<Local>,
    pub status: QueueStatus,
    pub wallet: Address,
    pub network: NetworkId,
}

impl QueueEntry {
    /// `ID: 3 | Swap 1.000000 USDC to R2USD | queued | 12:00:01 | Wallet: 0x1234...abcd`
    pub fn render(&self) -> String {
        format!(
            "ID: {} | {} | {} | {} | Wallet: {}",
            self.id,
            self.description,
            self.status,
            self.submitted_at.format("%H:%M:%S"),
            short_address(&self.wallet)
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum QueueEvent {
    Added(QueueEntry),
    StatusChanged { id: u64, status: QueueStatus },
    Removed { id: u64 },
}

pub struct QueueBoard {
    entries: Mutex<Vec<QueueEntry>>,
    snapshot: ArcSwap<Vec<QueueEntry>>,
    next_id: AtomicU64,
    events: broadcast::Sender<QueueEvent>,
}

impl fmt::Debug for QueueBoard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueueBoard")
            .field("entries", &self.snapshot.load().len())
            .field("next_id", &self.next_id.load(Ordering::Relaxed))
            .finish()
    }
}

impl Default for QueueBoard {
    fn default() -> Self {
        Self::new()
    }
}

impl QueueBoard {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(1024);
        Self {
            entries: Mutex::new(Vec::new()),
            snapshot: ArcSwap::from_pointee(Vec::new()),
            next_id: AtomicU64::new(1),
            events,
        }
    }

    /// Monotonic entry id, never reused
    pub fn allocate_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    pub fn add(&self, entry: QueueEntry) {
        self.mutate(|entries| {
            entries.push(entry.clone());
            Some(QueueEvent::Added(entry))
        });
    }

    pub fn set_status(&self, id: u64, status: QueueStatus) {
        self.mutate(|entries| {
            let entry = entries.iter_mut().find(|e| e.id == id)?;
            entry.status = status;
            Some(QueueEvent::StatusChanged { id, status })
        });
    }

    pub fn remove(&self, id: u64) {
        self.mutate(|entries| {
            let before = entries.len();
            entries.retain(|e| e.id != id);
            (entries.len() != before).then_some(QueueEvent::Removed { id })
        });
    }

    /// Apply `f`; a returned event is published before the lock is released
    fn mutate(&self, f: impl FnOnce(&mut Vec<QueueEntry>) -> Option<QueueEvent>) {
        let mut entries = self.entries.lock();
        let Some(event) = f(&mut entries) else {
            return;
        };
        metrics().queued_entries.set(entries.len() as i64);
        self.snapshot.store(Arc::new(entries.clone()));
        // no subscribers is fine
        let _ = self.events.send(event);
    }

    /// Current visible entries, in enqueue order
    pub fn snapshot(&self) -> Arc<Vec<QueueEntry>> {
        self.snapshot.load_full()
    }

    pub fn get(&self, id: u64) -> Option<QueueEntry> {
        self.snapshot.load().iter().find(|e| e.id == id).cloned()
    }

    pub fn len(&self) -> usize {
        self.snapshot.load().len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshot.load().is_empty()
    }

    /// Queue panel text
    pub fn render(&self) -> String {
        let entries = self.snapshot.load();
        if entries.is_empty() {
            return EMPTY_QUEUE_TEXT.to_string();
        }
        entries
            .iter()
            .map(QueueEntry::render)
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn subscribe(&self) -> broadcast::Receiver<QueueEvent> {
        self.events.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(board: &QueueBoard, description: &str) -> QueueEntry {
        QueueEntry {
            id: board.allocate_id(),
            description: description.to_string(),
            submitted_at: Local::now(),
            status: QueueStatus::Queued,
            wallet: Address::repeat_byte(0x12),
            network: NetworkId::from("Sepolia"),
        }
    }

    #[test]
    fn test_ids_are_monotonic() {
        let board = QueueBoard::new();
        let a = board.allocate_id();
        let b = board.allocate_id();
        assert!(b > a);
    }

    #[test]
    fn test_lifecycle_updates_snapshot() {
        let board = QueueBoard::new();
        let first = entry(&board, "Swap 1 USDC to R2USD");
        let id = first.id;
        board.add(first);
        assert_eq!(board.len(), 1);

        board.set_status(id, QueueStatus::Processing);
        assert_eq!(board.get(id).unwrap().status, QueueStatus::Processing);

        board.remove(id);
        assert!(board.is_empty());
        assert_eq!(board.render(), EMPTY_QUEUE_TEXT);
    }

    #[test]
    fn test_render_line() {
        let board = QueueBoard::new();
        let e = entry(&board, "Stake 5 R2USD to sR2USD");
        let id = e.id;
        board.add(e);

        let text = board.render();
        assert!(text.starts_with(&format!("ID: {} | Stake 5 R2USD to sR2USD | queued | ", id)));
        assert!(text.ends_with("| Wallet: 0x1212...1212"));
    }

    #[tokio::test]
    async fn test_events_follow_changes() {
        let board = QueueBoard::new();
        let mut rx = board.subscribe();
        let e = entry(&board, "x");
        let id = e.id;
        board.add(e);
        board.set_status(id, QueueStatus::Error);
        board.remove(id);
        board.remove(id);

        assert!(matches!(rx.recv().await.unwrap(), QueueEvent::Added(_)));
        assert_eq!(
            rx.recv().await.unwrap(),
            QueueEvent::StatusChanged { id, status: QueueStatus::Error }
        );
        assert_eq!(rx.recv().await.unwrap(), QueueEvent::Removed { id });
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_concurrent_adds_publish_in_snapshot_order() {
        let board = QueueBoard::new();
        let mut rx = board.subscribe();

        std::thread::scope(|s| {
            for _ in 0..8 {
                s.spawn(|| {
                    for _ in 0..50 {
                        let e = entry(&board, "x");
                        board.add(e);
                    }
                });
            }
        });

        let mut published = Vec::new();
        while let Ok(event) = rx.try_recv() {
            if let QueueEvent::Added(e) = event {
                published.push(e.id);
            }
        }
        let snapshot: Vec<u64> = board.snapshot().iter().map(|e| e.id).collect();
        assert_eq!(published.len(), 400);
        assert_eq!(published, snapshot);
    }

    #[test]
    fn test_terminal_statuses() {
        assert!(!QueueStatus::Queued.is_terminal());
        assert!(!QueueStatus::Processing.is_terminal());
        assert!(QueueStatus::Failed.is_terminal());
    }
}
