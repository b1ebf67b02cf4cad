//! Error taxonomy shared by the shop components

use thiserror::Error;

use crate::core::item::ItemKind;

/// Failures of a shop operation. Everything except `Persistence` is user-facing.
#[derive(Debug, Error)]
pub enum ShopError {
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("insufficient funds: need {required:.2}, have {balance:.2}")]
    InsufficientFunds { required: f64, balance: f64 },

    #[error("not enough {kind}: need {required}, have {available}")]
    NotEnoughItems {
        kind: ItemKind,
        required: u64,
        available: u64,
    },

    #[error("{0} cannot be sold here")]
    Unsellable(String),

    #[error("{0} cannot be bought here")]
    Unbuyable(String),

    #[error("transaction cancelled by a hook")]
    HookCancelled,

    #[error("ledger rejected the transaction: {0}")]
    Ledger(String),

    #[error("no screen is open for this user")]
    ScreenNotOpen,
}

/// Failures of the persistence worker. These are logged and never shown to a user.
#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("persistence worker is not running")]
    WorkerStopped,

    #[error("failed to map row: {0}")]
    RowMapping(String),

    #[error("timed out after {0}s waiting for persistence")]
    TimedOut(u64),
}

pub type ShopResult<T> = std::result::Result<T, ShopError>;
