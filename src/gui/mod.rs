//! Shop screens and the navigation state machine that drives them

pub mod controller;
pub mod layout;
pub mod screen;

pub use controller::{ClickDisposition, NavigationController};
pub use screen::{
    Action, Binding, CloseReason, ScreenId, ScreenInstance, ScreenKind, ScreenPainter, ScreenView,
    SlotView,
};

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use crate::core::host::{Services, User};
    use crate::core::item::{Inventory, ItemKind, ItemStack, NamespacedRegistry};
    use crate::price::PriceCache;
    use crate::stats::StatsAggregator;
    use crate::transaction::TransactionEngine;
    use crate::transaction::tests::{MockHost, services, stone, test_config};
    use std::sync::Arc;

    struct Fixture {
        host: Arc<MockHost>,
        services: Services,
        config: AppConfig,
        prices: PriceCache,
        stats: StatsAggregator,
        nav: NavigationController,
        user: User,
    }

    impl Fixture {
        fn new() -> Self {
            let host = Arc::new(MockHost::default());
            let services = services(&host);
            let config = test_config();
            let mut prices = PriceCache::new();
            prices.rebuild(&config.shops, &NamespacedRegistry);
            Self {
                host,
                services,
                config,
                prices,
                stats: StatsAggregator::new(None),
                nav: NavigationController::new(),
                user: User::new("alex"),
            }
        }

        /// Runs `f` with the controller and a fresh engine.
        fn with<R>(&mut self, f: impl FnOnce(&mut NavigationController, &mut TransactionEngine<'_>, &User) -> R) -> R {
            let mut engine =
                TransactionEngine::new(&self.config, &self.services, &self.prices, &mut self.stats);
            f(&mut self.nav, &mut engine, &self.user)
        }

        fn current_kind(&self) -> Option<ScreenKind> {
            self.nav.current(&self.user.id).map(|s| s.kind.clone())
        }

        fn paints(&self) -> usize {
            self.host.painted.lock().unwrap().len()
        }

        fn open_shop(&mut self) -> ScreenId {
            self.with(|nav, engine, user| {
                nav.open_root(user, engine).unwrap();
                nav.open_child(
                    user,
                    ScreenKind::Shop {
                        shop_id: "blocks".to_string(),
                    },
                    engine,
                )
                .unwrap()
            })
        }

        fn open_transaction(&mut self, slot: usize) -> ScreenId {
            self.open_shop();
            self.with(|nav, engine, user| {
                nav.open_child(
                    user,
                    ScreenKind::Transaction {
                        shop_id: "blocks".to_string(),
                        page: 0,
                        slot,
                    },
                    engine,
                )
                .unwrap()
            })
        }
    }

    fn shop_kind() -> ScreenKind {
        ScreenKind::Shop {
            shop_id: "blocks".to_string(),
        }
    }

    #[test]
    fn test_open_root_tracks_and_paints() {
        let mut fx = Fixture::new();
        let id = fx.with(|nav, engine, user| nav.open_root(user, engine)).unwrap();

        assert_eq!(fx.current_kind(), Some(ScreenKind::Menu));
        assert_eq!(fx.nav.tracked_count(), 1);
        assert_eq!(fx.host.painted.lock().unwrap()[0].id, id);

        // Opening the root again replaces the tracked screen
        fx.with(|nav, engine, user| nav.open_root(user, engine)).unwrap();
        assert_eq!(fx.nav.tracked_count(), 1);
        assert_ne!(fx.nav.current(&fx.user.id).map(|s| s.id), Some(id));
    }

    #[test]
    fn test_open_child_keeps_back_chain_and_ignores_replace_notification() {
        let mut fx = Fixture::new();
        let menu = fx.with(|nav, engine, user| nav.open_root(user, engine)).unwrap();
        fx.with(|nav, engine, user| nav.open_child(user, shop_kind(), engine)).unwrap();

        let acted = fx.with(|nav, engine, user| nav.handle_close(&user.id, menu, CloseReason::OpenNew, engine));
        assert!(!acted);
        let current = fx.nav.current(&fx.user.id).unwrap();
        assert_eq!(current.kind, shop_kind());
        assert_eq!(current.depth(), 1);
        assert_eq!(fx.nav.pending_tasks(), 0);
    }

    #[test]
    fn test_paging_is_bounded() {
        let mut fx = Fixture::new();
        fx.open_shop();

        assert!(!fx.with(|nav, engine, user| nav.page_previous(&user.id, engine)));
        assert!(fx.with(|nav, engine, user| nav.page_next(&user.id, engine)));
        let paints = fx.paints();
        assert!(!fx.with(|nav, engine, user| nav.page_next(&user.id, engine)));

        assert_eq!(fx.nav.current(&fx.user.id).unwrap().current_page, 1);
        assert_eq!(fx.paints(), paints);
    }

    #[test]
    fn test_close_manual_releases_once_and_reopens_parent_once() {
        let mut fx = Fixture::new();
        let shop = fx.open_shop();

        assert!(fx.with(|nav, engine, user| nav.close_manual(&user.id, engine)));
        // The host echoes close notifications for the view we just closed
        assert!(!fx.with(|nav, engine, user| nav.handle_close(&user.id, shop, CloseReason::Player, engine)));
        assert!(!fx.with(|nav, engine, user| nav.handle_close(&user.id, shop, CloseReason::OpenNew, engine)));
        assert_eq!(fx.nav.pending_tasks(), 1);
        assert_eq!(*fx.host.closed_views.lock().unwrap(), 1);

        let paints = fx.paints();
        fx.with(|nav, engine, _| nav.run_deferred(engine));
        assert_eq!(fx.paints(), paints + 1);
        assert_eq!(fx.current_kind(), Some(ScreenKind::Menu));
        assert!(fx.nav.current(&fx.user.id).unwrap().open);

        // Nothing further happens on later ticks
        assert_eq!(fx.with(|nav, engine, _| nav.run_deferred(engine)), 0);
        assert_eq!(fx.paints(), paints + 1);
    }

    #[test]
    fn test_disconnect_close_does_not_reopen() {
        let mut fx = Fixture::new();
        let shop = fx.open_shop();

        assert!(fx.with(|nav, engine, user| nav.handle_close(&user.id, shop, CloseReason::Disconnect, engine)));
        fx.with(|nav, engine, _| nav.run_deferred(engine));
        assert_eq!(fx.nav.tracked_count(), 0);
    }

    #[test]
    fn test_force_unload_on_shutdown_skips_parent() {
        let mut fx = Fixture::new();
        let shop = fx.open_shop();

        assert!(fx.with(|nav, engine, user| nav.force_unload(&user.id, true, engine)));
        assert_eq!(fx.nav.tracked_count(), 0);
        assert!(!fx.with(|nav, engine, user| nav.handle_close(&user.id, shop, CloseReason::Unloaded, engine)));
        fx.with(|nav, engine, _| nav.run_deferred(engine));
        assert_eq!(fx.nav.tracked_count(), 0);
    }

    #[test]
    fn test_force_unload_reopens_parent_next_tick() {
        let mut fx = Fixture::new();
        fx.open_shop();

        fx.with(|nav, engine, user| nav.force_unload(&user.id, false, engine));
        assert_eq!(fx.nav.tracked_count(), 0);
        fx.with(|nav, engine, _| nav.run_deferred(engine));
        assert_eq!(fx.current_kind(), Some(ScreenKind::Menu));
    }

    #[test]
    fn test_return_button_navigates_back() {
        let mut fx = Fixture::new();
        fx.open_transaction(0);

        let mut inventory = Inventory::player();
        let disposition = fx.with(|nav, engine, user| nav.handle_click(user, 49, &mut inventory, engine));
        assert_eq!(disposition, ClickDisposition::Consumed);
        assert_eq!(fx.current_kind(), Some(shop_kind()));
        assert_eq!(fx.nav.current(&fx.user.id).unwrap().depth(), 1);
    }

    #[test]
    fn test_buy_click_with_insufficient_funds_closes_screen() {
        let mut fx = Fixture::new();
        fx.host.set_balance("alex", 1.0);
        fx.open_transaction(0);

        let mut inventory = Inventory::player();
        fx.with(|nav, engine, user| nav.handle_click(user, 10, &mut inventory, engine));
        assert_eq!(fx.nav.tracked_count(), 0);
        assert_eq!(fx.host.messages(), vec!["You cannot afford this. It costs $2.00."]);

        fx.with(|nav, engine, _| nav.run_deferred(engine));
        assert_eq!(fx.current_kind(), Some(shop_kind()));
    }

    #[test]
    fn test_disconnect_drops_pending_reopen() {
        let mut fx = Fixture::new();
        fx.host.set_balance("alex", 1.0);
        fx.open_transaction(0);

        let mut inventory = Inventory::player();
        fx.with(|nav, engine, user| nav.handle_click(user, 10, &mut inventory, engine));
        assert_eq!(fx.nav.pending_tasks(), 1);

        // Nothing is tracked any more, but the queued reopen must not survive
        assert!(!fx.with(|nav, engine, user| nav.force_unload(&user.id, true, engine)));
        assert_eq!(fx.nav.pending_tasks(), 0);
        let paints = fx.paints();
        fx.with(|nav, engine, _| nav.run_deferred(engine));
        assert_eq!(fx.nav.tracked_count(), 0);
        assert_eq!(fx.paints(), paints);
    }

    #[test]
    fn test_sell_and_sell_all_clicks() {
        let mut fx = Fixture::new();
        fx.open_transaction(0);
        let mut inventory = Inventory::player();
        inventory.set(0, Some(ItemStack::new(stone(), 10)));
        inventory.set(38, Some(ItemStack::new(stone(), 2)));

        // Sell 4 at slot 30
        fx.with(|nav, engine, user| nav.handle_click(user, 30, &mut inventory, engine));
        assert_eq!(inventory.count(&stone()), 8);
        assert_eq!(fx.host.balance_of("alex"), 20.0);

        fx.with(|nav, engine, user| nav.handle_click(user, 48, &mut inventory, engine));
        assert_eq!(inventory.count(&stone()), 0);
        assert_eq!(fx.host.balance_of("alex"), 60.0);
        assert_eq!(fx.stats.get(&stone()).sold, 12);
    }

    #[test]
    fn test_sell_screen_close_sweeps_contents() {
        let mut fx = Fixture::new();
        fx.with(|nav, engine, user| nav.open_root(user, engine)).unwrap();
        let mut inventory = Inventory::player();
        let id = match fx.with(|nav, engine, user| nav.handle_click(user, 16, &mut inventory, engine)) {
            ClickDisposition::Consumed => fx.nav.current(&fx.user.id).unwrap().id,
            other => panic!("unexpected {other:?}"),
        };
        assert_eq!(fx.current_kind(), Some(ScreenKind::SellAll));
        assert_eq!(
            fx.with(|nav, engine, user| nav.handle_click(user, 3, &mut inventory, engine)),
            ClickDisposition::Passthrough
        );

        let contents = fx.nav.sell_contents_mut(&fx.user.id).unwrap();
        contents.set(0, Some(ItemStack::new(stone(), 2)));
        contents.set(1, Some(ItemStack::new(ItemKind::new("minecraft:dirt"), 3)));

        fx.with(|nav, engine, user| nav.handle_close(&user.id, id, CloseReason::Player, engine));
        assert_eq!(fx.host.balance_of("alex"), 10.0);
        assert_eq!(
            fx.host.given.lock().unwrap().clone(),
            vec![ItemStack::new(ItemKind::new("minecraft:dirt"), 3)]
        );

        fx.with(|nav, engine, _| nav.run_deferred(engine));
        assert_eq!(fx.current_kind(), Some(ScreenKind::Menu));
    }

    #[test]
    fn test_failed_child_keeps_current_screen() {
        let mut fx = Fixture::new();
        fx.with(|nav, engine, user| nav.open_root(user, engine)).unwrap();

        let result = fx.with(|nav, engine, user| {
            nav.open_child(
                user,
                ScreenKind::Shop {
                    shop_id: "missing".to_string(),
                },
                engine,
            )
        });
        assert!(result.is_err());
        assert_eq!(fx.current_kind(), Some(ScreenKind::Menu));
        assert_eq!(
            fx.host.messages(),
            vec!["This menu could not be opened. Please contact an administrator."]
        );
    }

    #[test]
    fn test_stats_screen_refused_when_disabled() {
        let mut fx = Fixture::new();
        fx.config.settings.statistics = false;

        let result = fx.with(|nav, engine, user| nav.open_standalone(user, ScreenKind::Stats, engine));
        assert!(result.is_err());
        assert_eq!(fx.nav.tracked_count(), 0);
        assert_eq!(fx.host.messages(), vec!["Statistics are disabled on this server."]);
    }

    #[test]
    fn test_clicks_without_screen_are_ignored() {
        let mut fx = Fixture::new();
        let mut inventory = Inventory::player();
        assert_eq!(
            fx.with(|nav, engine, user| nav.handle_click(user, 0, &mut inventory, engine)),
            ClickDisposition::Ignored
        );
    }
}
