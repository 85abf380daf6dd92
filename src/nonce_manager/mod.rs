//! Nonce Manager Module
//!
//! Per-wallet nonce bookkeeping for the transaction queue. Each wallet's entry
//! is only touched from that wallet's queue worker, so at most one reservation
//! is outstanding per wallet at any time.

pub mod nonce_cache;

pub use nonce_cache::{NonceCache, NonceStats};
