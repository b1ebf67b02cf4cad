//! Buy and sell execution against the ledger, inventories and hooks.
//!
//! Every attempt goes priced, funds or items checked, hook evaluated, then either
//! committed or aborted. Nothing is mutated before the hook has allowed the
//! transaction. User-facing failures are reported to the user here; a hook
//! cancellation is silent.

use tracing::{debug, error, info, warn};

use crate::config::{AppConfig, TransactionData, TransactionType};
use crate::core::error::{ShopError, ShopResult};
use crate::core::hook::{HookDecision, TransactionEvent};
use crate::core::host::{Services, User};
use crate::core::item::{ARMOR_SLOTS, Inventory, ItemKind, ItemStack, MAX_STACK_SIZE};
use crate::core::money::format_money;
use crate::price::PriceCache;
use crate::stats::StatsAggregator;

#[derive(Debug, Clone, PartialEq)]
pub enum Goods {
    Item(ItemKind),
    Commands {
        name: String,
        commands: Vec<String>,
    },
}

impl Goods {
    fn label(&self) -> String {
        match self {
            Goods::Item(kind) => kind.to_string(),
            Goods::Commands { name, .. } => name.clone(),
        }
    }
}

/// A priced offer built from one button click.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingTransaction {
    pub goods: Goods,
    pub amount: u32,
    pub unit_price: f64,
    pub total: f64,
}

impl PendingTransaction {
    pub fn new(goods: Goods, amount: u32, unit_price: f64) -> Self {
        Self {
            goods,
            amount,
            unit_price,
            total: unit_price * amount as f64,
        }
    }

    pub fn buy(data: &TransactionData, amount: u32, services: &Services) -> ShopResult<Self> {
        if !data.buy_enabled() {
            return Err(ShopError::Unbuyable(data.display_name()));
        }
        let goods = Self::goods(data, &data.buy_commands, services)?;
        Ok(Self::new(goods, amount, data.buy_price))
    }

    pub fn sell(data: &TransactionData, amount: u32, services: &Services) -> ShopResult<Self> {
        if !data.sell_enabled() {
            return Err(ShopError::Unsellable(data.display_name()));
        }
        let goods = Self::goods(data, &data.sell_commands, services)?;
        Ok(Self::new(goods, amount, data.sell_price))
    }

    fn goods(data: &TransactionData, commands: &[String], services: &Services) -> ShopResult<Goods> {
        match data.transaction_type {
            TransactionType::Item => {
                let name = data.item.as_deref().ok_or_else(|| {
                    ShopError::Configuration("item transaction without an item".to_string())
                })?;
                services
                    .registry
                    .resolve(name)
                    .map(Goods::Item)
                    .ok_or_else(|| ShopError::Configuration(format!("unknown item '{name}'")))
            }
            TransactionType::Command => Ok(Goods::Commands {
                name: data.display_name(),
                commands: commands.to_vec(),
            }),
        }
    }
}

/// Outcome of a committed single transaction.
#[derive(Debug, Clone, PartialEq)]
pub struct Receipt {
    pub amount: u64,
    pub total: f64,
    pub balance: f64,
}

/// Outcome of a sweep over several slots.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SweepReport {
    pub sold: Vec<ItemStack>,
    pub total: f64,
    pub unsellable: usize,
    pub cancelled: usize,
    /// Stacks handed back to the user; only the sell-screen sweep returns items.
    pub returned: Vec<ItemStack>,
}

impl SweepReport {
    pub fn units_sold(&self) -> u64 {
        self.sold.iter().map(|s| s.amount as u64).sum()
    }
}

/// What happens to a stack that is skipped during a sweep.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Skipped {
    LeaveInPlace,
    ReturnToUser,
}

/// Executes transactions for the duration of one host callback.
pub struct TransactionEngine<'a> {
    pub(crate) config: &'a AppConfig,
    pub(crate) services: &'a Services,
    pub(crate) prices: &'a PriceCache,
    pub(crate) stats: &'a mut StatsAggregator,
}

impl<'a> TransactionEngine<'a> {
    pub fn new(
        config: &'a AppConfig,
        services: &'a Services,
        prices: &'a PriceCache,
        stats: &'a mut StatsAggregator,
    ) -> Self {
        Self {
            config,
            services,
            prices,
            stats,
        }
    }

    pub fn config(&self) -> &AppConfig {
        self.config
    }

    pub fn services(&self) -> &Services {
        self.services
    }

    pub fn stats(&self) -> &StatsAggregator {
        self.stats
    }

    fn money(&self, value: f64) -> String {
        format_money(value, self.config.settings.rounding)
    }

    fn send(&self, user: &User, template: &str, placeholders: &[(&str, &str)]) {
        let message = self.config.locale.render(template, placeholders);
        self.services.messenger.send(user, &message);
    }

    /// Tells the user why an operation failed. Cancellations and internal errors
    /// stay silent.
    pub fn notify(&self, user: &User, err: &ShopError) {
        let locale = &self.config.locale;
        match err {
            ShopError::InsufficientFunds { required, .. } => {
                self.send(user, &locale.insufficient_funds, &[("price", &self.money(*required))])
            }
            ShopError::NotEnoughItems { .. } => self.send(user, &locale.not_enough_items, &[]),
            ShopError::Unsellable(_) => self.send(user, &locale.unsellable, &[]),
            ShopError::Unbuyable(_) => self.send(user, &locale.unbuyable, &[]),
            ShopError::Configuration(_) => self.send(user, &locale.gui_open_error, &[]),
            ShopError::HookCancelled | ShopError::Ledger(_) | ShopError::ScreenNotOpen => {}
        }
    }

    fn fail<T>(&self, user: &User, err: ShopError) -> ShopResult<T> {
        debug!(user = %user.name, error = %err, "Transaction aborted");
        self.notify(user, &err);
        Err(err)
    }

    fn allowed(&self, event: TransactionEvent) -> bool {
        self.services.hooks.evaluate(&event) == HookDecision::Allow
    }

    fn run_commands(&self, user: &User, commands: &[String], times: u32) {
        for _ in 0..times {
            for command in commands {
                let command = command
                    .replace("<player>", &user.name)
                    .replace("<uuid>", &user.id.to_string());
                self.services.delivery.dispatch_console_command(&command);
            }
        }
    }

    pub fn buy(&mut self, user: &User, pending: &PendingTransaction) -> ShopResult<Receipt> {
        let balance = self.services.ledger.balance(user);
        if balance < pending.total {
            return self.fail(
                user,
                ShopError::InsufficientFunds {
                    required: pending.total,
                    balance,
                },
            );
        }

        let event = match &pending.goods {
            Goods::Item(kind) => TransactionEvent::ItemPurchased {
                user: user.clone(),
                stack: ItemStack::new(kind.clone(), pending.amount),
                total: pending.total,
            },
            Goods::Commands { name, .. } => TransactionEvent::CommandPurchased {
                user: user.clone(),
                name: name.clone(),
                amount: pending.amount,
                total: pending.total,
            },
        };
        if !self.allowed(event) {
            return Err(ShopError::HookCancelled);
        }

        if let Err(reason) = self.services.ledger.withdraw(user, pending.total) {
            warn!(user = %user.name, %reason, "Withdraw rejected");
            return Err(ShopError::Ledger(reason));
        }

        let locale = &self.config.locale;
        let template = match &pending.goods {
            Goods::Item(kind) => {
                let mut remaining = pending.amount;
                while remaining > 0 {
                    let chunk = remaining.min(MAX_STACK_SIZE);
                    self.services
                        .delivery
                        .give_item(user, ItemStack::new(kind.clone(), chunk));
                    remaining -= chunk;
                }
                self.stats.increment_purchased(kind, pending.amount as i64);
                &locale.buy_item_success
            }
            Goods::Commands { commands, .. } => {
                self.run_commands(user, commands, pending.amount);
                &locale.buy_command_success
            }
        };

        let balance = self.services.ledger.balance(user);
        info!(user = %user.name, goods = %pending.goods.label(), amount = pending.amount, total = pending.total, "Purchase committed");
        self.send(
            user,
            template,
            &[
                ("amount", &pending.amount.to_string()),
                ("item", &pending.goods.label()),
                ("price", &self.money(pending.total)),
                ("bal", &self.money(balance)),
            ],
        );
        Ok(Receipt {
            amount: pending.amount as u64,
            total: pending.total,
            balance,
        })
    }

    /// Sells a fixed amount at the offer's embedded price.
    pub fn sell(
        &mut self,
        user: &User,
        inventory: &mut Inventory,
        pending: &PendingTransaction,
    ) -> ShopResult<Receipt> {
        let locale = &self.config.locale;
        let (event, template) = match &pending.goods {
            Goods::Item(kind) => {
                let available = inventory.count(kind);
                if available < pending.amount as u64 {
                    return self.fail(
                        user,
                        ShopError::NotEnoughItems {
                            kind: kind.clone(),
                            required: pending.amount as u64,
                            available,
                        },
                    );
                }
                let event = TransactionEvent::ItemSold {
                    user: user.clone(),
                    stack: ItemStack::new(kind.clone(), pending.amount),
                    total: pending.total,
                };
                (event, &locale.sell_item_success)
            }
            Goods::Commands { name, .. } => {
                let event = TransactionEvent::CommandSold {
                    user: user.clone(),
                    name: name.clone(),
                    amount: pending.amount,
                    total: pending.total,
                };
                (event, &locale.sell_command_success)
            }
        };
        if !self.allowed(event) {
            return Err(ShopError::HookCancelled);
        }

        match &pending.goods {
            Goods::Item(kind) => {
                inventory.remove_amount(kind, pending.amount as u64);
                self.stats.increment_sold(kind, pending.amount as i64);
            }
            Goods::Commands { commands, .. } => self.run_commands(user, commands, pending.amount),
        }
        self.deposit(user, pending.total);

        let balance = self.services.ledger.balance(user);
        info!(user = %user.name, goods = %pending.goods.label(), amount = pending.amount, total = pending.total, "Sale committed");
        self.send(
            user,
            template,
            &[
                ("amount", &pending.amount.to_string()),
                ("item", &pending.goods.label()),
                ("price", &self.money(pending.total)),
                ("bal", &self.money(balance)),
            ],
        );
        Ok(Receipt {
            amount: pending.amount as u64,
            total: pending.total,
            balance,
        })
    }

    fn deposit(&self, user: &User, total: f64) {
        if let Err(reason) = self.services.ledger.deposit(user, total) {
            error!(user = %user.name, total, %reason, "Deposit rejected after items were removed");
        }
    }

    /// Sells the stack in one slot at its cached price.
    pub fn sell_single(&mut self, user: &User, inventory: &mut Inventory, slot: usize) -> ShopResult<Receipt> {
        let Some(stack) = inventory.get(slot).cloned() else {
            return self.fail(
                user,
                ShopError::NotEnoughItems {
                    kind: ItemKind::new("minecraft:air"),
                    required: 1,
                    available: 0,
                },
            );
        };
        if self.prices.lookup(&stack.kind).is_none() {
            return self.fail(user, ShopError::Unsellable(stack.kind.to_string()));
        }

        let prices = self.prices;
        let report = self.sweep(user, inventory, [slot], |k| prices.lookup(k), Skipped::LeaveInPlace);
        if report.cancelled > 0 {
            return Err(ShopError::HookCancelled);
        }
        self.deposit(user, report.total);

        let balance = self.services.ledger.balance(user);
        self.send(
            user,
            &self.config.locale.sell_item_success,
            &[
                ("amount", &stack.amount.to_string()),
                ("item", stack.kind.as_str()),
                ("price", &self.money(report.total)),
                ("bal", &self.money(balance)),
            ],
        );
        Ok(Receipt {
            amount: stack.amount as u64,
            total: report.total,
            balance,
        })
    }

    /// Sells every priced stack in every slot.
    pub fn sell_inventory(&mut self, user: &User, inventory: &mut Inventory) -> SweepReport {
        let slots: Vec<usize> = (0..inventory.size()).collect();
        let prices = self.prices;
        let report = self.sweep(user, inventory, slots, |k| prices.lookup(k), Skipped::LeaveInPlace);
        self.settle(user, &report);
        report
    }

    /// Sells every priced stack of a player inventory, leaving worn armor alone.
    pub fn sell_player_inventory(&mut self, user: &User, inventory: &mut Inventory) -> SweepReport {
        let slots: Vec<usize> = (0..inventory.size())
            .filter(|slot| !ARMOR_SLOTS.contains(slot))
            .collect();
        let prices = self.prices;
        let report = self.sweep(user, inventory, slots, |k| prices.lookup(k), Skipped::LeaveInPlace);
        self.settle(user, &report);
        report
    }

    /// Sells every stack of one kind, armor slots included. `unit_price` overrides
    /// the cached price.
    pub fn sell_all_matching(
        &mut self,
        user: &User,
        inventory: &mut Inventory,
        kind: &ItemKind,
        unit_price: Option<f64>,
    ) -> ShopResult<SweepReport> {
        let price = match unit_price.filter(|p| *p > 0.0).or_else(|| self.prices.lookup(kind)) {
            Some(price) => price,
            None => return self.fail(user, ShopError::Unsellable(kind.to_string())),
        };
        let slots: Vec<usize> = inventory
            .iter()
            .filter(|(_, stack)| &stack.kind == kind)
            .map(|(slot, _)| slot)
            .collect();
        if slots.is_empty() {
            return self.fail(
                user,
                ShopError::NotEnoughItems {
                    kind: kind.clone(),
                    required: 1,
                    available: 0,
                },
            );
        }

        let report = self.sweep(user, inventory, slots, |_| Some(price), Skipped::LeaveInPlace);
        self.settle(user, &report);
        Ok(report)
    }

    /// Sells everything placed into a sell screen. Unpriced and cancelled stacks go
    /// back to the user and the screen is left empty.
    pub fn sell_screen_contents(&mut self, user: &User, contents: &mut Inventory) -> SweepReport {
        let slots: Vec<usize> = (0..contents.size()).collect();
        let prices = self.prices;
        let report = self.sweep(user, contents, slots, |k| prices.lookup(k), Skipped::ReturnToUser);

        for stack in &report.returned {
            self.services.delivery.give_item(user, stack.clone());
        }
        if report.unsellable > 0 {
            self.send(user, &self.config.locale.sellall_unsellable, &[]);
        }
        self.settle(user, &report);
        report
    }

    fn sweep<I, P>(
        &mut self,
        user: &User,
        inventory: &mut Inventory,
        slots: I,
        price_of: P,
        skipped: Skipped,
    ) -> SweepReport
    where
        I: IntoIterator<Item = usize>,
        P: Fn(&ItemKind) -> Option<f64>,
    {
        let mut report = SweepReport::default();
        for slot in slots {
            let Some(stack) = inventory.get(slot).cloned() else { continue };

            let allowed = match price_of(&stack.kind) {
                None => {
                    report.unsellable += 1;
                    false
                }
                Some(price) => {
                    let total = price * stack.amount as f64;
                    let event = TransactionEvent::ItemSold {
                        user: user.clone(),
                        stack: stack.clone(),
                        total,
                    };
                    if self.allowed(event) {
                        inventory.take(slot);
                        self.stats.increment_sold(&stack.kind, stack.amount as i64);
                        report.total += total;
                        report.sold.push(stack.clone());
                        true
                    } else {
                        report.cancelled += 1;
                        false
                    }
                }
            };

            if !allowed && skipped == Skipped::ReturnToUser {
                if let Some(stack) = inventory.take(slot) {
                    report.returned.push(stack);
                }
            }
        }
        debug!(user = %user.name, sold = report.sold.len(), unsellable = report.unsellable, cancelled = report.cancelled, total = report.total, "Sweep finished");
        report
    }

    /// Deposits a sweep's proceeds once and reports them.
    fn settle(&self, user: &User, report: &SweepReport) {
        if report.total <= 0.0 {
            return;
        }
        self.deposit(user, report.total);
        let balance = self.services.ledger.balance(user);
        info!(user = %user.name, units = report.units_sold(), total = report.total, "Sweep committed");
        self.send(
            user,
            &self.config.locale.sellall_success,
            &[("price", &self.money(report.total)), ("bal", &self.money(balance))],
        );
    }
}
