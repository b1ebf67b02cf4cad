//! In-memory purchase and sale counters per item kind

use futures::FutureExt;
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

use crate::core::item::ItemKind;
use crate::store::StatsTable;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TransactionStats {
    pub purchased: u64,
    pub sold: u64,
}

/// Counters for the current session, merged with persisted values at startup.
#[derive(Debug, Default)]
pub struct StatsAggregator {
    stats: BTreeMap<ItemKind, TransactionStats>,
    loaded: bool,
    table: Option<StatsTable>,
}

impl StatsAggregator {
    pub fn new(table: Option<StatsTable>) -> Self {
        Self {
            stats: BTreeMap::new(),
            loaded: false,
            table,
        }
    }

    pub fn increment_purchased(&mut self, kind: &ItemKind, amount: i64) {
        if let Some(amount) = Self::accept(kind, amount) {
            let entry = self.stats.entry(kind.clone()).or_default();
            entry.purchased = entry.purchased.saturating_add(amount);
        }
    }

    pub fn increment_sold(&mut self, kind: &ItemKind, amount: i64) {
        if let Some(amount) = Self::accept(kind, amount) {
            let entry = self.stats.entry(kind.clone()).or_default();
            entry.sold = entry.sold.saturating_add(amount);
        }
    }

    fn accept(kind: &ItemKind, amount: i64) -> Option<u64> {
        if amount <= 0 {
            warn!(item = %kind, amount, "Ignoring non-positive stats increment");
            return None;
        }
        Some(amount as u64)
    }

    pub fn get(&self, kind: &ItemKind) -> TransactionStats {
        self.stats.get(kind).copied().unwrap_or_default()
    }

    pub fn snapshot(&self) -> BTreeMap<ItemKind, TransactionStats> {
        self.stats.clone()
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    /// Merges persisted counters into the session counters. Only the first call has
    /// an effect.
    pub fn load(&mut self, persisted: BTreeMap<ItemKind, TransactionStats>) {
        if self.loaded {
            warn!("Stats already loaded, ignoring repeated load");
            return;
        }
        for (kind, stored) in persisted {
            let entry = self.stats.entry(kind).or_default();
            entry.purchased = entry.purchased.saturating_add(stored.purchased);
            entry.sold = entry.sold.saturating_add(stored.sold);
        }
        self.loaded = true;
        info!(items = self.stats.len(), "Stats loaded");
    }

    pub fn has_store(&self) -> bool {
        self.table.is_some()
    }

    /// Disconnects the store; later flushes resolve to an empty list.
    pub fn detach_store(&mut self) {
        self.table = None;
    }

    /// Persists a snapshot of every counter. Resolves to one flag per item kind.
    pub fn flush(&self) -> BoxFuture<'static, Vec<bool>> {
        let Some(table) = &self.table else {
            return futures::future::ready(Vec::new()).boxed();
        };
        if !self.loaded {
            // Writing before the merge would clobber persisted totals.
            warn!("Skipping flush, stats were never loaded");
            return futures::future::ready(Vec::new()).boxed();
        }
        let timestamp = chrono::Utc::now().timestamp_millis();
        debug!(items = self.stats.len(), timestamp, "Flushing stats");
        table.save_stats(&self.stats, timestamp).boxed()
    }
}

/// Counts host ticks and signals when a periodic flush is due.
#[derive(Debug, Clone)]
pub struct FlushTimer {
    interval_ticks: u64,
    elapsed: u64,
    stopped: bool,
}

impl FlushTimer {
    pub fn new(interval_ticks: u64) -> Self {
        Self {
            interval_ticks: interval_ticks.max(1),
            elapsed: 0,
            stopped: false,
        }
    }

    /// Advances one tick; true when the interval has elapsed.
    pub fn tick(&mut self) -> bool {
        if self.stopped {
            return false;
        }
        self.elapsed += 1;
        if self.elapsed >= self.interval_ticks {
            self.elapsed = 0;
            return true;
        }
        false
    }

    pub fn stop(&mut self) {
        self.stopped = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{PersistenceQueue, open_in_memory};

    fn stone() -> ItemKind {
        ItemKind::new("minecraft:stone")
    }

    #[test]
    fn test_non_positive_increments_are_ignored() {
        let mut stats = StatsAggregator::new(None);
        stats.increment_sold(&stone(), 3);
        stats.increment_sold(&stone(), 0);
        stats.increment_sold(&stone(), -5);
        stats.increment_purchased(&stone(), -1);

        assert_eq!(stats.get(&stone()), TransactionStats { purchased: 0, sold: 3 });
    }

    #[test]
    fn test_load_merges_once() {
        let mut stats = StatsAggregator::new(None);
        stats.increment_purchased(&stone(), 2);

        let persisted = BTreeMap::from([(stone(), TransactionStats { purchased: 10, sold: 1 })]);
        stats.load(persisted.clone());
        stats.load(persisted);

        assert!(stats.is_loaded());
        assert_eq!(stats.get(&stone()), TransactionStats { purchased: 12, sold: 1 });
    }

    #[test]
    fn test_snapshot_is_ordered() {
        let mut stats = StatsAggregator::new(None);
        stats.increment_sold(&ItemKind::new("minecraft:stone"), 1);
        stats.increment_sold(&ItemKind::new("minecraft:dirt"), 1);
        let keys: Vec<_> = stats.snapshot().into_keys().map(|k| k.to_string()).collect();
        assert_eq!(keys, vec!["minecraft:dirt", "minecraft:stone"]);
    }

    #[test]
    fn test_flush_timer_fires_every_interval() {
        let mut timer = FlushTimer::new(3);
        let fired: Vec<bool> = (0..7).map(|_| timer.tick()).collect();
        assert_eq!(fired, vec![false, false, true, false, false, true, false]);

        timer.stop();
        assert!((0..10).all(|_| !timer.tick()));
    }

    #[tokio::test]
    async fn test_flush_reports_each_row() {
        let pool = open_in_memory().await.expect("in-memory pool");
        let table = StatsTable::new(PersistenceQueue::spawn(pool));
        table.create_table().await.expect("create table");

        let mut stats = StatsAggregator::new(Some(table.clone()));
        stats.load(table.load_stats().await.expect("load"));
        stats.increment_sold(&stone(), 4);
        stats.increment_purchased(&ItemKind::new("minecraft:dirt"), 1);

        assert_eq!(stats.flush().await, vec![true, true]);
        let persisted = table.load_stats().await.expect("reload");
        assert_eq!(persisted[&stone()].sold, 4);
    }

    #[tokio::test]
    async fn test_flush_without_store_is_empty() {
        let mut stats = StatsAggregator::new(None);
        stats.increment_sold(&stone(), 1);
        assert!(stats.flush().await.is_empty());
    }
}
