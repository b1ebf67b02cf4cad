//! Entry point for the host: owns every component and exposes the operations the
//! host calls from its dispatch thread.

use anyhow::{Context, Result};
use futures::future::BoxFuture;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::runtime::Handle;
use tracing::{debug, error, info, warn};

use crate::config::AppConfig;
use crate::core::error::ShopResult;
use crate::core::host::{Services, User, UserId};
use crate::core::item::{Inventory, ItemKind};
use crate::gui::{ClickDisposition, CloseReason, NavigationController, ScreenId, ScreenKind};
use crate::price::PriceCache;
use crate::stats::{FlushTimer, StatsAggregator, TransactionStats};
use crate::store::{PersistenceQueue, StatsTable, open_pool, with_deadline};
use crate::transaction::{Receipt, SweepReport, TransactionEngine};

pub struct Shop {
    config: AppConfig,
    config_path: Option<PathBuf>,
    services: Services,
    prices: PriceCache,
    stats: StatsAggregator,
    nav: NavigationController,
    timer: FlushTimer,
    queue: Option<PersistenceQueue>,
    runtime: Handle,
}

impl Shop {
    /// Loads the configuration at `path` and starts the shop. The first start
    /// clears the first-run flag in the file.
    pub async fn start_from_path<P: AsRef<Path>>(path: P, services: Services) -> Result<Self> {
        let path = path.as_ref();
        let mut config = AppConfig::load_from_path(path)?;
        if config.settings.first_run {
            config.mark_first_run_complete(path)?;
        }
        let mut shop = Self::start(config, services).await?;
        shop.config_path = Some(path.to_path_buf());
        Ok(shop)
    }

    /// Starts the shop. Statistics failures disable statistics but never prevent
    /// the shop from starting.
    pub async fn start(config: AppConfig, services: Services) -> Result<Self> {
        let problems = config.validate();
        for problem in &problems {
            warn!(%problem, "Configuration problem");
        }

        let queue = if config.settings.statistics {
            match open_pool(&config.database_path()?).await {
                Ok(pool) => Some(PersistenceQueue::spawn(pool)),
                Err(e) => {
                    error!(error = %e, "Failed to open statistics database, statistics disabled");
                    None
                }
            }
        } else {
            info!("Statistics disabled by configuration");
            None
        };
        let mut stats = StatsAggregator::new(queue.clone().map(StatsTable::new));
        if let Some(queue) = &queue {
            let table = StatsTable::new(queue.clone());
            // Both are queued before either is awaited; the worker keeps them ordered.
            let create = table.create_table();
            let load = table.load_stats();
            match create.await {
                Ok(()) => match load.await {
                    Ok(persisted) => stats.load(persisted),
                    Err(e) => {
                        error!(error = %e, "Failed to load statistics, statistics disabled");
                        stats.detach_store();
                    }
                },
                Err(e) => {
                    error!(error = %e, "Failed to create statistics table, statistics disabled");
                    stats.detach_store();
                }
            }
        }

        let mut prices = PriceCache::new();
        prices.rebuild(&config.shops, services.registry.as_ref());
        info!(shops = config.shops.len(), prices = prices.len(), "Shop started");

        Ok(Self {
            timer: FlushTimer::new(config.settings.flush_interval_ticks),
            config,
            config_path: None,
            services,
            prices,
            stats,
            nav: NavigationController::new(),
            queue,
            runtime: Handle::current(),
        })
    }

    fn split(&mut self) -> (&mut NavigationController, TransactionEngine<'_>) {
        (
            &mut self.nav,
            TransactionEngine::new(&self.config, &self.services, &self.prices, &mut self.stats),
        )
    }

    fn engine(&mut self) -> TransactionEngine<'_> {
        self.split().1
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn prices(&self) -> &PriceCache {
        &self.prices
    }

    pub fn navigation(&self) -> &NavigationController {
        &self.nav
    }

    pub fn stats_snapshot(&self) -> BTreeMap<ItemKind, TransactionStats> {
        self.stats.snapshot()
    }

    pub fn statistics_available(&self) -> bool {
        self.stats.has_store()
    }

    /// Swaps in a new configuration. Every open screen is unloaded first so no
    /// screen outlives the definitions it was built from.
    pub fn reload(&mut self, config: AppConfig) -> usize {
        let unloaded = {
            let (nav, mut engine) = self.split();
            nav.unload_all(true, &mut engine)
        };
        for problem in config.validate() {
            warn!(%problem, "Configuration problem");
        }
        self.config = config;
        self.prices.rebuild(&self.config.shops, self.services.registry.as_ref());
        info!(unloaded, prices = self.prices.len(), "Configuration reloaded");
        unloaded
    }

    /// Re-reads the configuration file the shop was started from. The user who asked
    /// for the reload, if any, is told once it is done.
    pub fn reload_from_disk(&mut self, requested_by: Option<&User>) -> Result<usize> {
        let path = self
            .config_path
            .clone()
            .context("Shop was not started from a configuration file")?;
        let config = AppConfig::load_from_path(&path)?;
        let unloaded = self.reload(config);
        if let Some(user) = requested_by {
            let locale = &self.config.locale;
            self.services
                .messenger
                .send(user, &locale.render(&locale.config_reload, &[]));
        }
        Ok(unloaded)
    }

    /// Host tick: runs deferred screen work and the periodic flush.
    pub fn tick(&mut self) {
        {
            let (nav, mut engine) = self.split();
            nav.run_deferred(&mut engine);
        }
        if self.timer.tick() && self.stats.has_store() {
            let flush = self.stats.flush();
            self.runtime.spawn(async move {
                let results = flush.await;
                let rejected = results.iter().filter(|ok| !**ok).count();
                if rejected > 0 {
                    warn!(rows = results.len(), rejected, "Periodic stats flush had rejected rows");
                } else {
                    debug!(rows = results.len(), "Periodic stats flush complete");
                }
            });
        }
    }

    pub fn open_menu(&mut self, user: &User) -> ShopResult<ScreenId> {
        let (nav, mut engine) = self.split();
        nav.open_root(user, &mut engine)
    }

    pub fn open_shop(&mut self, user: &User, shop_id: &str) -> ShopResult<ScreenId> {
        let (nav, mut engine) = self.split();
        let kind = ScreenKind::Shop {
            shop_id: shop_id.to_string(),
        };
        nav.open_standalone(user, kind, &mut engine)
    }

    pub fn open_sell_gui(&mut self, user: &User) -> ShopResult<ScreenId> {
        let (nav, mut engine) = self.split();
        nav.open_standalone(user, ScreenKind::SellAll, &mut engine)
    }

    pub fn open_stats(&mut self, user: &User) -> ShopResult<ScreenId> {
        let (nav, mut engine) = self.split();
        nav.open_standalone(user, ScreenKind::Stats, &mut engine)
    }

    pub fn click(&mut self, user: &User, slot: usize, inventory: &mut Inventory) -> ClickDisposition {
        let (nav, mut engine) = self.split();
        nav.handle_click(user, slot, inventory, &mut engine)
    }

    pub fn page_next(&mut self, user: &UserId) -> bool {
        let (nav, engine) = self.split();
        nav.page_next(user, &engine)
    }

    pub fn page_previous(&mut self, user: &UserId) -> bool {
        let (nav, engine) = self.split();
        nav.page_previous(user, &engine)
    }

    /// Close notification from the host.
    pub fn close_event(&mut self, user: &UserId, screen: ScreenId, reason: CloseReason) -> bool {
        let (nav, mut engine) = self.split();
        nav.handle_close(user, screen, reason, &mut engine)
    }

    pub fn close(&mut self, user: &UserId) -> bool {
        let (nav, mut engine) = self.split();
        nav.close_manual(user, &mut engine)
    }

    pub fn disconnect(&mut self, user: &UserId) -> bool {
        let (nav, mut engine) = self.split();
        nav.force_unload(user, true, &mut engine)
    }

    pub fn sell_contents_mut(&mut self, user: &UserId) -> Option<&mut Inventory> {
        self.nav.sell_contents_mut(user)
    }

    pub fn sell_single(&mut self, user: &User, inventory: &mut Inventory, slot: usize) -> ShopResult<Receipt> {
        self.engine().sell_single(user, inventory, slot)
    }

    pub fn sell_inventory(&mut self, user: &User, inventory: &mut Inventory) -> SweepReport {
        self.engine().sell_inventory(user, inventory)
    }

    pub fn sell_player_inventory(&mut self, user: &User, inventory: &mut Inventory) -> SweepReport {
        self.engine().sell_player_inventory(user, inventory)
    }

    pub fn sell_all_matching(
        &mut self,
        user: &User,
        inventory: &mut Inventory,
        kind: &ItemKind,
    ) -> ShopResult<SweepReport> {
        self.engine().sell_all_matching(user, inventory, kind, None)
    }

    /// Persists the current counters. The returned future is independent of the shop.
    pub fn flush_stats(&self) -> BoxFuture<'static, Vec<bool>> {
        self.stats.flush()
    }

    /// Unloads all screens, stops the flush timer, runs a final flush and closes
    /// the database. A flush that does not finish in time is abandoned.
    pub async fn shutdown(mut self) {
        self.timer.stop();
        {
            let (nav, mut engine) = self.split();
            nav.unload_all(true, &mut engine);
        }

        let secs = self.config.settings.shutdown_flush_timeout_secs;
        if self.stats.has_store() {
            match with_deadline(secs, self.stats.flush()).await {
                Ok(results) => {
                    let rejected = results.iter().filter(|ok| !**ok).count();
                    info!(rows = results.len(), rejected, "Final stats flush complete");
                }
                Err(e) => warn!(error = %e, "Final stats flush abandoned"),
            }
        }

        if let Some(queue) = self.queue.take() {
            if let Err(e) = with_deadline(secs, queue.close()).await {
                warn!(error = %e, "Persistence worker did not stop in time");
            }
        }
        info!("Shop shut down");
    }
}
