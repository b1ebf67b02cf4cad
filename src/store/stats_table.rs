use futures::future::join_all;
use sqlx::Row;
use std::collections::BTreeMap;
use std::future::Future;
use tracing::warn;

use super::{PersistenceQueue, SqlParam, Statement};
use crate::core::error::PersistenceError;
use crate::core::item::ItemKind;
use crate::stats::TransactionStats;

const CREATE_TABLE: &str = "CREATE TABLE IF NOT EXISTS stats (\
     item_type TEXT PRIMARY KEY UNIQUE, \
     buy INTEGER NOT NULL DEFAULT 0, \
     sell INTEGER NOT NULL DEFAULT 0, \
     last_updated INTEGER NOT NULL DEFAULT 0)";

const CREATE_INDEX: &str = "CREATE INDEX IF NOT EXISTS idx_item_types ON stats (item_type)";

/// Counters and timestamp are only replaced by a strictly newer write.
const UPSERT: &str = "INSERT INTO stats (item_type, buy, sell, last_updated) VALUES (?, ?, ?, ?) \
     ON CONFLICT (item_type) DO UPDATE SET \
     buy = excluded.buy, sell = excluded.sell, last_updated = excluded.last_updated \
     WHERE stats.last_updated < excluded.last_updated";

const SELECT_ALL: &str = "SELECT item_type, buy, sell FROM stats ORDER BY item_type";

/// The `stats` table, accessed through the persistence queue.
#[derive(Debug, Clone)]
pub struct StatsTable {
    queue: PersistenceQueue,
}

impl StatsTable {
    pub fn new(queue: PersistenceQueue) -> Self {
        Self { queue }
    }

    /// Creates the table and its index in one batch.
    pub fn create_table(&self) -> impl Future<Output = Result<(), PersistenceError>> + Send + 'static {
        let batch = self.queue.queue_bulk_write(vec![
            Statement::new(CREATE_TABLE, vec![]),
            Statement::new(CREATE_INDEX, vec![]),
        ]);
        async move { batch.await.map(|_| ()) }
    }

    /// Upserts one row per item kind. Each entry of the result tells whether the
    /// store accepted that row; rejected or failed rows are `false`.
    pub fn save_stats(
        &self,
        stats: &BTreeMap<ItemKind, TransactionStats>,
        timestamp_millis: i64,
    ) -> impl Future<Output = Vec<bool>> + Send + 'static {
        let writes: Vec<_> = stats
            .iter()
            .map(|(kind, entry)| {
                let kind = kind.clone();
                let write = self.queue.queue_write(
                    UPSERT,
                    vec![
                        SqlParam::Text(kind.to_string()),
                        SqlParam::Integer(to_column(entry.purchased)),
                        SqlParam::Integer(to_column(entry.sold)),
                        SqlParam::Integer(timestamp_millis),
                    ],
                );
                async move {
                    match write.await {
                        Ok(rows) => rows > 0,
                        Err(e) => {
                            warn!(item = %kind, error = %e, "Failed to save stats row");
                            false
                        }
                    }
                }
            })
            .collect();
        join_all(writes)
    }

    pub fn load_stats(
        &self,
    ) -> impl Future<Output = Result<BTreeMap<ItemKind, TransactionStats>, PersistenceError>> + Send + 'static
    {
        let rows = self.queue.queue_read(SELECT_ALL, vec![], |row| {
            let kind = ItemKind::new(row.try_get::<String, _>("item_type")?);
            let purchased = from_column(row.try_get::<i64, _>("buy")?);
            let sold = from_column(row.try_get::<i64, _>("sell")?);
            Ok((kind, TransactionStats { purchased, sold }))
        });
        async move { Ok(rows.await?.into_iter().collect()) }
    }
}

fn to_column(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

fn from_column(value: i64) -> u64 {
    u64::try_from(value).unwrap_or(0)
}
