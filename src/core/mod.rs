//! Shared domain types and the interfaces to host services

pub mod error;
pub mod hook;
pub mod host;
pub mod item;
pub mod log;
pub mod money;

// Re-export main types for cleaner imports
pub use error::{PersistenceError, ShopError, ShopResult};
pub use hook::{HookBus, HookDecision, TransactionEvent};
pub use host::{ItemDelivery, Ledger, Messenger, Services, User, UserId};
pub use item::{Inventory, ItemKind, ItemRegistry, ItemStack, NamespacedRegistry};
pub use money::{RoundingMode, format_money};
