//! Last notified price per pair
//!
//! Uses DashMap so the notifier can read and record entries through `&self`
//! while the polling task holds it behind an `Arc`

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use parking_lot::RwLock;
use rust_decimal::Decimal;
use std::sync::atomic::{AtomicU64, Ordering};

use oracle_core::PairKey;

/// Price last written on chain for a pair
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotifyEntry {
    pub price: Decimal,
    pub notified_at: DateTime<Utc>,
}

impl NotifyEntry {
    pub fn age(&self, now: DateTime<Utc>) -> chrono::Duration {
        now.signed_duration_since(self.notified_at)
    }
}

/// In-memory notify state, reset on restart
#[derive(Debug, Default)]
pub struct NotifyState {
    entries: DashMap<PairKey, NotifyEntry>,

    /// Stats
    update_count: AtomicU64,
    last_update: RwLock<Option<DateTime<Utc>>>,
}

impl NotifyState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a successful notification
    pub fn record(&self, key: PairKey, price: Decimal, at: DateTime<Utc>) {
        self.entries.insert(
            key,
            NotifyEntry {
                price,
                notified_at: at,
            },
        );
        self.update_count.fetch_add(1, Ordering::Relaxed);
        *self.last_update.write() = Some(at);
    }

    pub fn get(&self, key: &PairKey) -> Option<NotifyEntry> {
        self.entries.get(key).map(|r| r.value().clone())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn stats(&self) -> NotifyStateStats {
        NotifyStateStats {
            pair_count: self.entries.len(),
            update_count: self.update_count.load(Ordering::Relaxed),
            last_update: *self.last_update.read(),
        }
    }
}

/// Statistics about notify state
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotifyStateStats {
    pub pair_count: usize,
    pub update_count: u64,
    pub last_update: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_record_replaces_entry() {
        let state = NotifyState::new();
        let key = PairKey::new("EGLD", "USD");
        let at = Utc::now();

        assert!(state.get(&key).is_none());
        state.record(key.clone(), Decimal::from(40), at);
        state.record(key.clone(), Decimal::from(41), at);

        assert_eq!(state.len(), 1);
        assert_eq!(state.get(&key).unwrap().price, Decimal::from(41));
        assert_eq!(state.stats().update_count, 2);
        assert_eq!(state.stats().last_update, Some(at));
    }

    #[test]
    fn test_concurrent_updates() {
        use std::thread;

        let state = Arc::new(NotifyState::new());
        let handles: Vec<_> = (0..4)
            .map(|i| {
                let state = Arc::clone(&state);
                thread::spawn(move || {
                    for j in 0..100 {
                        let key = PairKey::new(format!("T{}", i), "USD");
                        state.record(key, Decimal::from(j), Utc::now());
                    }
                })
            })
            .collect();

        for h in handles {
            h.join().unwrap();
        }

        assert_eq!(state.len(), 4);
        assert_eq!(state.stats().update_count, 400);
    }
}
