//! Sell prices derived from shop definitions

use std::collections::{BTreeMap, HashMap};
use tracing::{debug, warn};

use crate::config::{ButtonType, ScreenDefinition, TransactionType};
use crate::core::item::{ItemKind, ItemRegistry};

/// Item kind to sell unit price, rebuilt wholesale on every configuration load.
#[derive(Debug, Default, Clone)]
pub struct PriceCache {
    prices: HashMap<ItemKind, f64>,
}

impl PriceCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Clears the cache and scans every transaction button of every shop. When two
    /// buttons price the same item the one scanned last wins.
    pub fn rebuild(&mut self, shops: &BTreeMap<String, ScreenDefinition>, registry: &dyn ItemRegistry) {
        self.prices.clear();
        let buttons = shops.iter().flat_map(|(shop_id, shop)| {
            shop.pages
                .iter()
                .flat_map(|p| p.buttons.iter())
                .map(move |b| (shop_id, b))
        });

        for (shop_id, button) in buttons {
            if button.button_type != ButtonType::Transaction {
                continue;
            }
            let Some(data) = &button.transaction else { continue };
            if data.transaction_type != TransactionType::Item || !data.sell_enabled() {
                continue;
            }
            let Some(name) = &data.item else { continue };
            match registry.resolve(name) {
                Some(kind) => {
                    if let Some(previous) = self.prices.insert(kind.clone(), data.sell_price) {
                        debug!(item = %kind, previous, price = data.sell_price, shop = %shop_id, "Sell price overridden");
                    }
                }
                None => warn!(item = %name, shop = %shop_id, slot = button.slot, "Skipping unknown item"),
            }
        }
        debug!(entries = self.prices.len(), "Price cache rebuilt");
    }

    pub fn lookup(&self, kind: &ItemKind) -> Option<f64> {
        self.prices.get(kind).copied()
    }

    pub fn len(&self) -> usize {
        self.prices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.prices.is_empty()
    }

    /// Entries sorted by item kind.
    pub fn entries(&self) -> Vec<(ItemKind, f64)> {
        let mut entries: Vec<_> = self.prices.iter().map(|(k, v)| (k.clone(), *v)).collect();
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use crate::core::item::NamespacedRegistry;

    fn config() -> AppConfig {
        serde_yaml::from_str(
            r#"
menu:
  title: "Shop"
  pages: []
shops:
  a_blocks:
    title: "Blocks"
    pages:
      - buttons:
          - { slot: 0, type: transaction, transaction: { item: stone, sell_price: 1.0 } }
          - { slot: 1, type: transaction, transaction: { item: dirt, buy_price: 1.0 } }
          - { slot: 2, type: transaction, transaction: { item: "bad item", sell_price: 3.0 } }
          - { slot: 3, type: transaction, transaction: { type: command, item: gold_ingot, sell_price: 9.0 } }
          - { slot: 4, type: display, transaction: { item: emerald, sell_price: 9.0 } }
  b_ores:
    title: "Ores"
    pages:
      - buttons: []
      - buttons:
          - { slot: 0, type: transaction, transaction: { item: STONE, sell_price: 2.5 } }
"#,
        )
        .expect("Failed to deserialize")
    }

    #[test]
    fn test_rebuild_applies_filters_and_last_writer_wins() {
        let mut cache = PriceCache::new();
        cache.rebuild(&config().shops, &NamespacedRegistry);

        assert_eq!(cache.len(), 1);
        assert_eq!(cache.lookup(&ItemKind::new("minecraft:stone")), Some(2.5));
        assert_eq!(cache.lookup(&ItemKind::new("minecraft:dirt")), None);
        assert_eq!(cache.lookup(&ItemKind::new("minecraft:gold_ingot")), None);
        assert_eq!(cache.lookup(&ItemKind::new("minecraft:emerald")), None);
    }

    #[test]
    fn test_rebuild_clears_previous_entries() {
        let mut cache = PriceCache::new();
        cache.rebuild(&config().shops, &NamespacedRegistry);
        assert!(!cache.is_empty());

        cache.rebuild(&BTreeMap::new(), &NamespacedRegistry);
        assert!(cache.is_empty());
    }
}
