//! Narrow interfaces to the services the host game server provides

use serde::{Deserialize, Serialize};
use std::fmt::Display;
use std::sync::Arc;
use uuid::Uuid;

use crate::core::hook::HookBus;
use crate::core::item::{ItemRegistry, ItemStack};
use crate::gui::ScreenPainter;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UserId(pub Uuid);

impl Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub name: String,
}

impl User {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: UserId(Uuid::new_v4()),
            name: name.into(),
        }
    }
}

/// Opaque balance service.
pub trait Ledger: Send + Sync {
    fn balance(&self, user: &User) -> f64;
    fn withdraw(&self, user: &User, amount: f64) -> Result<(), String>;
    fn deposit(&self, user: &User, amount: f64) -> Result<(), String>;
}

pub trait ItemDelivery: Send + Sync {
    /// Puts the stack into the user's inventory, dropping any overflow at the user's
    /// location.
    fn give_item(&self, user: &User, stack: ItemStack);
    fn dispatch_console_command(&self, command: &str);
}

pub trait Messenger: Send + Sync {
    fn send(&self, user: &User, message: &str);
}

/// Everything the shop needs from its host, bundled for cheap cloning.
#[derive(Clone)]
pub struct Services {
    pub ledger: Arc<dyn Ledger>,
    pub delivery: Arc<dyn ItemDelivery>,
    pub messenger: Arc<dyn Messenger>,
    pub painter: Arc<dyn ScreenPainter>,
    pub registry: Arc<dyn ItemRegistry>,
    pub hooks: Arc<HookBus>,
}
