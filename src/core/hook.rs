//! Cancellable pre-commit hooks fired before a transaction mutates any state

use std::sync::RwLock;
use tracing::debug;

use crate::core::host::User;
use crate::core::item::ItemStack;

#[derive(Debug, Clone, PartialEq)]
pub enum TransactionEvent {
    ItemPurchased {
        user: User,
        stack: ItemStack,
        total: f64,
    },
    CommandPurchased {
        user: User,
        name: String,
        amount: u32,
        total: f64,
    },
    /// Fired once per stack during sweeps.
    ItemSold {
        user: User,
        stack: ItemStack,
        total: f64,
    },
    CommandSold {
        user: User,
        name: String,
        amount: u32,
        total: f64,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookDecision {
    Allow,
    Deny,
}

type Hook = Box<dyn Fn(&TransactionEvent) -> HookDecision + Send + Sync>;

/// Synchronous hook registry. A single `Deny` cancels the transaction.
#[derive(Default)]
pub struct HookBus {
    hooks: RwLock<Vec<Hook>>,
}

impl HookBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<F>(&self, hook: F)
    where
        F: Fn(&TransactionEvent) -> HookDecision + Send + Sync + 'static,
    {
        let mut hooks = self.hooks.write().unwrap_or_else(|e| e.into_inner());
        hooks.push(Box::new(hook));
    }

    /// Runs every hook; all of them observe the event even after one denies.
    pub fn evaluate(&self, event: &TransactionEvent) -> HookDecision {
        let hooks = self.hooks.read().unwrap_or_else(|e| e.into_inner());
        let denied = hooks
            .iter()
            .map(|hook| hook(event))
            .fold(false, |denied, d| denied || d == HookDecision::Deny);
        if denied {
            debug!(?event, "Transaction denied by hook");
            HookDecision::Deny
        } else {
            HookDecision::Allow
        }
    }
}

impl std::fmt::Debug for HookBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let count = self.hooks.read().map(|h| h.len()).unwrap_or(0);
        f.debug_struct("HookBus").field("hooks", &count).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::item::ItemKind;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn sold_event() -> TransactionEvent {
        TransactionEvent::ItemSold {
            user: User::new("alex"),
            stack: ItemStack::new(ItemKind::new("minecraft:stone"), 4),
            total: 2.0,
        }
    }

    #[test]
    fn test_empty_bus_allows() {
        assert_eq!(HookBus::new().evaluate(&sold_event()), HookDecision::Allow);
    }

    #[test]
    fn test_single_deny_cancels_and_all_hooks_run() {
        let bus = HookBus::new();
        let calls = Arc::new(AtomicUsize::new(0));

        let c = Arc::clone(&calls);
        bus.register(move |_| {
            c.fetch_add(1, Ordering::SeqCst);
            HookDecision::Deny
        });
        let c = Arc::clone(&calls);
        bus.register(move |_| {
            c.fetch_add(1, Ordering::SeqCst);
            HookDecision::Allow
        });

        assert_eq!(bus.evaluate(&sold_event()), HookDecision::Deny);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
