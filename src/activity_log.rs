//! Activity log feeding the dashboard
//!
//! Every event is kept in a bounded in-memory buffer for display and mirrored
//! into `tracing` so the same lines reach the process log.

use chrono::{DateTime, Local};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;
use tokio::sync::broadcast;

use crate::types::NetworkId;

/// Entries retained in memory
pub const LOG_CAPACITY: usize = 100;

/// Entries shown by the dashboard
pub const LOG_DISPLAY: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogCategory {
    Swap,
    System,
    Error,
    Success,
    Warning,
}

impl fmt::Display for LogCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LogCategory::Swap => "swap",
            LogCategory::System => "system",
            LogCategory::Error => "error",
            LogCategory::Success => "success",
            LogCategory::Warning => "warning",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct LogEntry {
    pub timestamp: DateTime<Local>,
    pub message: String,
    pub category: LogCategory,
    pub network: Option<NetworkId>,
}

impl LogEntry {
    /// `[HH:MM:SS] [network] message`
    pub fn render(&self) -> String {
        let time = self.timestamp.format("%H:%M:%S");
        match &self.network {
            Some(network) => format!("[{}] [{}] {}", time, network, self.message),
            None => format!("[{}] {}", time, self.message),
        }
    }
}

/// Bounded activity log with a live feed
#[derive(Debug)]
pub struct ActivityLog {
    entries: Mutex<VecDeque<LogEntry>>,
    feed: broadcast::Sender<LogEntry>,
}

impl Default for ActivityLog {
    fn default() -> Self {
        Self::new()
    }
}

impl ActivityLog {
    pub fn new() -> Self {
        let (feed, _) = broadcast::channel(LOG_CAPACITY);
        Self {
            entries: Mutex::new(VecDeque::with_capacity(LOG_CAPACITY)),
            feed,
        }
    }

    pub fn log(&self, network: Option<&NetworkId>, category: LogCategory, message: impl Into<String>) {
        let entry = LogEntry {
            timestamp: Local::now(),
            message: message.into(),
            category,
            network: network.cloned(),
        };

        let network_name = network.map(NetworkId::as_str).unwrap_or("-");
        match category {
            LogCategory::Error => {
                tracing::error!(network = network_name, category = %category, "{}", entry.message)
            }
            LogCategory::Warning => {
                tracing::warn!(network = network_name, category = %category, "{}", entry.message)
            }
            _ => tracing::info!(network = network_name, category = %category, "{}", entry.message),
        }

        {
            let mut entries = self.entries.lock();
            if entries.len() == LOG_CAPACITY {
                entries.pop_front();
            }
            entries.push_back(entry.clone());
        }

        // no subscribers is fine
        let _ = self.feed.send(entry);
    }

    pub fn swap(&self, network: &NetworkId, message: impl Into<String>) {
        self.log(Some(network), LogCategory::Swap, message);
    }

    pub fn system(&self, network: &NetworkId, message: impl Into<String>) {
        self.log(Some(network), LogCategory::System, message);
    }

    pub fn success(&self, network: &NetworkId, message: impl Into<String>) {
        self.log(Some(network), LogCategory::Success, message);
    }

    pub fn warning(&self, network: &NetworkId, message: impl Into<String>) {
        self.log(Some(network), LogCategory::Warning, message);
    }

    pub fn error(&self, network: &NetworkId, message: impl Into<String>) {
        self.log(Some(network), LogCategory::Error, message);
    }

    /// Up to `limit` most recent entries, oldest first
    pub fn recent(&self, limit: usize) -> Vec<LogEntry> {
        let entries = self.entries.lock();
        let skip = entries.len().saturating_sub(limit);
        entries.iter().skip(skip).cloned().collect()
    }

    /// Entries the dashboard shows
    pub fn display(&self) -> Vec<LogEntry> {
        self.recent(LOG_DISPLAY)
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    pub fn clear(&self) {
        self.entries.lock().clear();
    }

    /// Any retained entry whose message contains `needle`
    pub fn contains(&self, needle: &str) -> bool {
        self.entries.lock().iter().any(|e| e.message.contains(needle))
    }

    pub fn subscribe(&self) -> broadcast::Receiver<LogEntry> {
        self.feed.subscribe()
    }
}
