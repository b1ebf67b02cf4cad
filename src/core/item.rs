//! Item identities, stacks and slot-based inventories

use serde::{Deserialize, Serialize};
use std::fmt::Display;
use std::ops::RangeInclusive;
use tracing::debug;

/// Slots 0..=35 hold the main inventory, 36..=39 hold armor and 40 the off-hand.
pub const PLAYER_INVENTORY_SIZE: usize = 41;
pub const ARMOR_SLOTS: RangeInclusive<usize> = 36..=39;
pub const MAX_STACK_SIZE: u32 = 64;

const DEFAULT_NAMESPACE: &str = "minecraft";

/// Namespaced identity of a stackable item, e.g. `minecraft:stone`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemKind(String);

impl ItemKind {
    pub fn new(key: impl Into<String>) -> Self {
        ItemKind(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for ItemKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemStack {
    pub kind: ItemKind,
    pub amount: u32,
}

impl ItemStack {
    pub fn new(kind: ItemKind, amount: u32) -> Self {
        Self { kind, amount }
    }
}

/// Resolves configured item names to item kinds.
pub trait ItemRegistry: Send + Sync {
    fn resolve(&self, name: &str) -> Option<ItemKind>;
}

/// Accepts any well-formed name and places bare names in the default namespace.
#[derive(Debug, Default, Clone)]
pub struct NamespacedRegistry;

impl ItemRegistry for NamespacedRegistry {
    fn resolve(&self, name: &str) -> Option<ItemKind> {
        let normalized = name.trim().to_lowercase();
        let (namespace, key) = match normalized.split_once(':') {
            Some((ns, key)) => (ns, key),
            None => (DEFAULT_NAMESPACE, normalized.as_str()),
        };

        let valid = |s: &str| {
            !s.is_empty()
                && s.chars()
                    .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.' | '/'))
        };
        if !valid(namespace) || !valid(key) {
            debug!(name = %normalized, "Rejected malformed item name");
            return None;
        }
        Some(ItemKind(format!("{namespace}:{key}")))
    }
}

/// A fixed-size grid of optional stacks.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Inventory {
    slots: Vec<Option<ItemStack>>,
}

impl Inventory {
    pub fn with_size(size: usize) -> Self {
        Self {
            slots: vec![None; size],
        }
    }

    pub fn player() -> Self {
        Self::with_size(PLAYER_INVENTORY_SIZE)
    }

    pub fn size(&self) -> usize {
        self.slots.len()
    }

    pub fn get(&self, slot: usize) -> Option<&ItemStack> {
        self.slots.get(slot).and_then(|s| s.as_ref())
    }

    /// Places a stack into a slot; out-of-range slots are ignored.
    pub fn set(&mut self, slot: usize, stack: Option<ItemStack>) {
        if let Some(entry) = self.slots.get_mut(slot) {
            *entry = stack.filter(|s| s.amount > 0);
        }
    }

    pub fn take(&mut self, slot: usize) -> Option<ItemStack> {
        self.slots.get_mut(slot).and_then(|s| s.take())
    }

    pub fn clear(&mut self) {
        self.slots.iter_mut().for_each(|s| *s = None);
    }

    pub fn is_empty(&self) -> bool {
        self.slots.iter().all(|s| s.is_none())
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, &ItemStack)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(i, s)| s.as_ref().map(|s| (i, s)))
    }

    pub fn count(&self, kind: &ItemKind) -> u64 {
        self.iter()
            .filter(|(_, s)| &s.kind == kind)
            .map(|(_, s)| s.amount as u64)
            .sum()
    }

    /// Removes `amount` units of `kind`, lowest slot first. Nothing is removed when
    /// fewer than `amount` units are present.
    pub fn remove_amount(&mut self, kind: &ItemKind, amount: u64) -> bool {
        if self.count(kind) < amount {
            return false;
        }
        let mut remaining = amount;
        for slot in self.slots.iter_mut() {
            if remaining == 0 {
                break;
            }
            let Some(stack) = slot.as_mut() else { continue };
            if &stack.kind != kind {
                continue;
            }
            let taken = remaining.min(stack.amount as u64);
            stack.amount -= taken as u32;
            remaining -= taken;
            if stack.amount == 0 {
                *slot = None;
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stone() -> ItemKind {
        ItemKind::new("minecraft:stone")
    }

    #[test]
    fn test_registry_normalizes_bare_names() {
        let registry = NamespacedRegistry;
        assert_eq!(registry.resolve("STONE"), Some(stone()));
        assert_eq!(
            registry.resolve("mymod:ruby_ore"),
            Some(ItemKind::new("mymod:ruby_ore"))
        );
        assert_eq!(registry.resolve("not an item"), None);
        assert_eq!(registry.resolve(":"), None);
    }

    #[test]
    fn test_remove_amount_spans_slots() {
        let mut inv = Inventory::with_size(4);
        inv.set(0, Some(ItemStack::new(stone(), 10)));
        inv.set(2, Some(ItemStack::new(stone(), 64)));
        inv.set(3, Some(ItemStack::new(ItemKind::new("minecraft:dirt"), 5)));

        assert!(inv.remove_amount(&stone(), 20));
        assert!(inv.get(0).is_none());
        assert_eq!(inv.get(2).map(|s| s.amount), Some(54));
        assert_eq!(inv.count(&stone()), 54);

        // Not enough: untouched
        assert!(!inv.remove_amount(&stone(), 100));
        assert_eq!(inv.count(&stone()), 54);
    }
}
