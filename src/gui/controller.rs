//! Per-user screen tracking and navigation.
//!
//! At most one screen is tracked per user. Child screens keep their parent in an
//! owned back chain, so returning or closing can restore it. Host close
//! notifications arrive for every view that goes away, including views replaced
//! during navigation; only the first notification for a tracked, open screen is
//! acted upon. Untracking and reopening a parent run one tick later from
//! [`NavigationController::run_deferred`], because the host cannot open a view
//! while it is still closing one.

use std::collections::{HashMap, VecDeque};
use tracing::{debug, info};

use crate::core::error::{ShopError, ShopResult};
use crate::core::host::{User, UserId};
use crate::core::item::Inventory;
use crate::gui::layout::{self, SELL_SCREEN_SIZE};
use crate::gui::screen::{Action, CloseReason, ScreenId, ScreenInstance, ScreenKind};
use crate::transaction::{PendingTransaction, SweepReport, TransactionEngine};

/// How the host should treat the click it reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClickDisposition {
    /// The shop handled the click; the host must cancel the item movement.
    Consumed,
    /// Item movement is allowed, e.g. placing items into a sell screen.
    Passthrough,
    /// No shop screen is open for the user.
    Ignored,
}

#[derive(Debug)]
enum Deferred {
    Release {
        user: UserId,
        screen: ScreenId,
        reopen_parent: bool,
    },
    Reopen {
        user: UserId,
        screen: Box<ScreenInstance>,
    },
}

impl Deferred {
    fn user(&self) -> &UserId {
        match self {
            Deferred::Release { user, .. } | Deferred::Reopen { user, .. } => user,
        }
    }
}

#[derive(Debug, Default)]
pub struct NavigationController {
    screens: HashMap<UserId, ScreenInstance>,
    deferred: VecDeque<Deferred>,
    next_id: u64,
}

impl NavigationController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self, user: &UserId) -> Option<&ScreenInstance> {
        self.screens.get(user)
    }

    pub fn tracked_count(&self) -> usize {
        self.screens.len()
    }

    pub fn pending_tasks(&self) -> usize {
        self.deferred.len()
    }

    /// Contents of the user's open sell screen, for the host to mirror item moves.
    pub fn sell_contents_mut(&mut self, user: &UserId) -> Option<&mut Inventory> {
        self.screens
            .get_mut(user)
            .filter(|s| s.open && s.kind.is_sell_screen())
            .map(|s| &mut s.contents)
    }

    fn create(
        &mut self,
        user: &User,
        kind: ScreenKind,
        has_parent: bool,
        engine: &TransactionEngine<'_>,
    ) -> ShopResult<ScreenInstance> {
        if kind == ScreenKind::Stats && !engine.config().settings.statistics {
            let locale = &engine.config().locale;
            engine
                .services()
                .messenger
                .send(user, &locale.render(&locale.stats_disabled, &[]));
            return Err(ShopError::Configuration("statistics are disabled".to_string()));
        }

        let layout = match layout::build(&kind, 0, has_parent, engine) {
            Ok(layout) => layout,
            Err(e) => {
                debug!(user = %user.name, ?kind, error = %e, "Failed to build screen");
                engine.notify(user, &e);
                return Err(e);
            }
        };
        self.next_id += 1;
        let contents = if kind.is_sell_screen() {
            Inventory::with_size(SELL_SCREEN_SIZE)
        } else {
            Inventory::default()
        };
        Ok(ScreenInstance {
            id: ScreenId(self.next_id),
            owner: user.clone(),
            kind,
            title: layout.title,
            size: layout.size,
            current_page: layout.page,
            page_count: layout.page_count,
            bindings: layout.bindings,
            open: true,
            parent: None,
            contents,
        })
    }

    fn show(&mut self, screen: ScreenInstance, engine: &TransactionEngine<'_>) -> ScreenId {
        let id = screen.id;
        engine.services().painter.paint(&screen.owner, &screen.view());
        debug!(user = %screen.owner.name, screen = %id, kind = ?screen.kind, depth = screen.depth(), "Screen shown");
        self.screens.insert(screen.owner.id, screen);
        id
    }

    /// Sweep-sells whatever is left in a sell screen that is going away.
    fn settle_contents(screen: &mut ScreenInstance, engine: &mut TransactionEngine<'_>) -> Option<SweepReport> {
        if !screen.kind.is_sell_screen() || screen.contents.is_empty() {
            return None;
        }
        let owner = screen.owner.clone();
        Some(engine.sell_screen_contents(&owner, &mut screen.contents))
    }

    /// Opens the main menu, replacing whatever screen the user had.
    pub fn open_root(&mut self, user: &User, engine: &mut TransactionEngine<'_>) -> ShopResult<ScreenId> {
        self.open_standalone(user, ScreenKind::Menu, engine)
    }

    /// Opens a screen without a parent. A failed build leaves the current screen
    /// untouched.
    pub fn open_standalone(
        &mut self,
        user: &User,
        kind: ScreenKind,
        engine: &mut TransactionEngine<'_>,
    ) -> ShopResult<ScreenId> {
        let screen = self.create(user, kind, false, engine)?;
        if let Some(mut old) = self.screens.remove(&user.id) {
            debug!(user = %user.name, screen = %old.id, "Replacing screen");
            Self::settle_contents(&mut old, engine);
        }
        Ok(self.show(screen, engine))
    }

    /// Opens a child of the user's current screen. The current screen moves into the
    /// child's back chain without any close side effects.
    pub fn open_child(
        &mut self,
        user: &User,
        kind: ScreenKind,
        engine: &mut TransactionEngine<'_>,
    ) -> ShopResult<ScreenId> {
        if !self.screens.get(&user.id).is_some_and(|s| s.open) {
            return Err(ShopError::ScreenNotOpen);
        }
        let mut child = self.create(user, kind, true, engine)?;
        let Some(mut parent) = self.screens.remove(&user.id) else {
            return Err(ShopError::ScreenNotOpen);
        };
        parent.open = false;
        child.parent = Some(Box::new(parent));
        Ok(self.show(child, engine))
    }

    pub fn page_next(&mut self, user: &UserId, engine: &TransactionEngine<'_>) -> bool {
        self.turn_page(user, 1, engine)
    }

    pub fn page_previous(&mut self, user: &UserId, engine: &TransactionEngine<'_>) -> bool {
        self.turn_page(user, -1, engine)
    }

    fn turn_page(&mut self, user: &UserId, delta: isize, engine: &TransactionEngine<'_>) -> bool {
        let Some(screen) = self.screens.get_mut(user).filter(|s| s.open) else {
            return false;
        };
        let Some(target) = screen.current_page.checked_add_signed(delta) else {
            return false;
        };
        if target >= screen.page_count {
            return false;
        }

        let has_parent = screen.has_parent();
        match layout::build(&screen.kind, target, has_parent, engine) {
            Ok(layout) => {
                screen.current_page = layout.page;
                screen.page_count = layout.page_count;
                screen.bindings = layout.bindings;
                engine.services().painter.paint(&screen.owner, &screen.view());
                true
            }
            Err(e) => {
                engine.notify(&screen.owner, &e);
                false
            }
        }
    }

    /// Goes back to the parent screen, or closes when there is none.
    pub fn navigate_back(&mut self, user: &User, engine: &mut TransactionEngine<'_>) -> bool {
        let Some(mut screen) = self.screens.remove(&user.id) else {
            return false;
        };
        Self::settle_contents(&mut screen, engine);
        match screen.parent.take() {
            Some(parent) => self.reopen(*parent, engine),
            None => {
                engine.services().painter.close_view(user);
                true
            }
        }
    }

    fn reopen(&mut self, mut screen: ScreenInstance, engine: &TransactionEngine<'_>) -> bool {
        let owner = screen.owner.clone();
        match layout::build(&screen.kind, screen.current_page, screen.has_parent(), engine) {
            Ok(layout) => {
                screen.title = layout.title;
                screen.current_page = layout.page;
                screen.page_count = layout.page_count;
                screen.bindings = layout.bindings;
                screen.open = true;
                self.show(screen, engine);
                true
            }
            Err(e) => {
                engine.notify(&owner, &e);
                false
            }
        }
    }

    /// Dispatches a click inside the user's open screen.
    pub fn handle_click(
        &mut self,
        user: &User,
        slot: usize,
        inventory: &mut Inventory,
        engine: &mut TransactionEngine<'_>,
    ) -> ClickDisposition {
        let Some(screen) = self.screens.get(&user.id).filter(|s| s.open) else {
            return ClickDisposition::Ignored;
        };
        if screen.kind.is_sell_screen() {
            return ClickDisposition::Passthrough;
        }
        let Some(action) = screen.action_at(slot).cloned() else {
            return ClickDisposition::Consumed;
        };
        let kind = screen.kind.clone();
        debug!(user = %user.name, slot, ?action, "Click");

        match action {
            Action::PreviousPage => {
                self.page_previous(&user.id, engine);
            }
            Action::NextPage => {
                self.page_next(&user.id, engine);
            }
            Action::Return => {
                self.navigate_back(user, engine);
            }
            Action::OpenShop(shop_id) => {
                let _ = self.open_child(user, ScreenKind::Shop { shop_id }, engine);
            }
            Action::OpenTransaction {
                shop_id,
                page,
                slot,
            } => {
                let _ = self.open_child(user, ScreenKind::Transaction { shop_id, page, slot }, engine);
            }
            Action::OpenSellGui => {
                let _ = self.open_child(user, ScreenKind::SellAll, engine);
            }
            Action::Buy(amount) | Action::Sell(amount) => {
                let buying = matches!(action, Action::Buy(_));
                self.trade(user, &kind, amount, buying, inventory, engine);
            }
            Action::SellAll => {
                if let ScreenKind::Transaction { shop_id, page, slot } = &kind {
                    let offer = layout::transaction_data(engine, shop_id, *page, *slot).and_then(|data| {
                        let name = data.item.as_deref().unwrap_or_default();
                        engine
                            .services()
                            .registry
                            .resolve(name)
                            .map(|kind| (kind, data.sell_price))
                            .ok_or_else(|| ShopError::Configuration(format!("unknown item '{name}'")))
                    });
                    match offer {
                        Ok((item, price)) => {
                            let _ = engine.sell_all_matching(user, inventory, &item, Some(price));
                        }
                        Err(e) => engine.notify(user, &e),
                    }
                }
            }
            Action::None => {}
        }
        ClickDisposition::Consumed
    }

    fn trade(
        &mut self,
        user: &User,
        kind: &ScreenKind,
        amount: u32,
        buying: bool,
        inventory: &mut Inventory,
        engine: &mut TransactionEngine<'_>,
    ) {
        let ScreenKind::Transaction { shop_id, page, slot } = kind else {
            return;
        };
        let pending = layout::transaction_data(engine, shop_id, *page, *slot).and_then(|data| {
            if buying {
                PendingTransaction::buy(data, amount, engine.services())
            } else {
                PendingTransaction::sell(data, amount, engine.services())
            }
        });
        let pending = match pending {
            Ok(pending) => pending,
            Err(e) => {
                engine.notify(user, &e);
                return;
            }
        };

        let result = if buying {
            engine.buy(user, &pending).map(|_| ())
        } else {
            engine.sell(user, inventory, &pending).map(|_| ())
        };
        if let Err(ShopError::InsufficientFunds { .. }) = result {
            // The purchase screen is modal; send the user back to the shop.
            self.force_unload(&user.id, false, engine);
        }
    }

    /// Handles a close notification from the host. Returns whether it was acted on.
    pub fn handle_close(
        &mut self,
        user: &UserId,
        screen_id: ScreenId,
        reason: CloseReason,
        engine: &mut TransactionEngine<'_>,
    ) -> bool {
        let Some(screen) = self.screens.get_mut(user) else {
            debug!(%user, screen = %screen_id, "Close for untracked user ignored");
            return false;
        };
        if screen.id != screen_id || !screen.open || reason == CloseReason::OpenNew {
            debug!(%user, screen = %screen_id, ?reason, "Redundant close ignored");
            return false;
        }

        screen.open = false;
        Self::settle_contents(screen, engine);
        let reopen_parent = reason == CloseReason::Player;
        self.deferred.push_back(Deferred::Release {
            user: *user,
            screen: screen_id,
            reopen_parent,
        });
        debug!(%user, screen = %screen_id, ?reason, "Screen closed");
        true
    }

    /// Closes the user's screen on the shop's initiative.
    pub fn close_manual(&mut self, user: &UserId, engine: &mut TransactionEngine<'_>) -> bool {
        let Some(screen) = self.screens.get(user).filter(|s| s.open) else {
            return false;
        };
        let (owner, id) = (screen.owner.clone(), screen.id);
        engine.services().painter.close_view(&owner);
        self.handle_close(user, id, CloseReason::Player, engine)
    }

    /// Untracks the user's screen immediately. Sell screens are still settled. The
    /// parent is reopened on the next tick unless the shop is shutting down, in which
    /// case work already deferred for the user is dropped as well.
    pub fn force_unload(&mut self, user: &UserId, on_shutdown: bool, engine: &mut TransactionEngine<'_>) -> bool {
        if on_shutdown {
            self.deferred.retain(|task| task.user() != user);
        }
        let Some(mut screen) = self.screens.remove(user) else {
            return false;
        };
        if screen.open {
            screen.open = false;
            engine.services().painter.close_view(&screen.owner);
        }
        Self::settle_contents(&mut screen, engine);
        if !on_shutdown {
            if let Some(parent) = screen.parent.take() {
                self.deferred.push_back(Deferred::Reopen {
                    user: *user,
                    screen: parent,
                });
            }
        }
        debug!(%user, screen = %screen.id, on_shutdown, "Screen unloaded");
        true
    }

    /// Unloads every tracked screen, e.g. on reload or shutdown.
    pub fn unload_all(&mut self, on_shutdown: bool, engine: &mut TransactionEngine<'_>) -> usize {
        let users: Vec<UserId> = self.screens.keys().copied().collect();
        let count = users
            .iter()
            .filter(|user| self.force_unload(user, on_shutdown, engine))
            .count();
        if on_shutdown {
            self.deferred.clear();
        }
        info!(count, "Unloaded all screens");
        count
    }

    /// Runs work deferred from earlier close events. Call once per host tick.
    pub fn run_deferred(&mut self, engine: &mut TransactionEngine<'_>) -> usize {
        let tasks: Vec<Deferred> = self.deferred.drain(..).collect();
        let count = tasks.len();
        for task in tasks {
            match task {
                Deferred::Release {
                    user,
                    screen,
                    reopen_parent,
                } => {
                    if self.screens.get(&user).is_none_or(|s| s.id != screen) {
                        continue;
                    }
                    let Some(mut released) = self.screens.remove(&user) else { continue };
                    debug!(%user, screen = %screen, "Screen released");
                    if let Some(parent) = released.parent.take().filter(|_| reopen_parent) {
                        self.reopen(*parent, engine);
                    }
                }
                Deferred::Reopen { user, screen } => {
                    if self.screens.contains_key(&user) {
                        continue;
                    }
                    self.reopen(*screen, engine);
                }
            }
        }
        count
    }
}
