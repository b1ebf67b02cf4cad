//! Builds slot bindings for each screen kind from the current configuration

use std::collections::BTreeMap;
use tracing::warn;

use crate::config::{ButtonDefinition, ButtonType, ScreenDefinition, TransactionData, TransactionType};
use crate::core::error::{ShopError, ShopResult};
use crate::core::money::format_money;
use crate::gui::screen::{Action, Binding, ScreenKind, SlotView};
use crate::transaction::TransactionEngine;

pub const SELL_SCREEN_SIZE: usize = 54;
pub const STATS_PER_PAGE: usize = 45;

const STATS_PREVIOUS_SLOT: usize = 45;
const STATS_RETURN_SLOT: usize = 49;
const STATS_NEXT_SLOT: usize = 53;

const ARROW: &str = "minecraft:arrow";
const BARRIER: &str = "minecraft:barrier";
const HOPPER: &str = "minecraft:hopper";
const CHEST: &str = "minecraft:chest";
const FILLER: &str = "minecraft:gray_stained_glass_pane";
const PAPER: &str = "minecraft:paper";

#[derive(Debug, Clone)]
pub struct Layout {
    pub title: String,
    pub size: usize,
    pub page_count: usize,
    pub page: usize,
    pub bindings: BTreeMap<usize, Binding>,
}

pub fn build(
    kind: &ScreenKind,
    page: usize,
    has_parent: bool,
    engine: &TransactionEngine<'_>,
) -> ShopResult<Layout> {
    match kind {
        ScreenKind::Menu => configured(&engine.config().menu, page, has_parent, None, engine),
        ScreenKind::Shop { shop_id } => {
            let shop = find_shop(engine, shop_id)?;
            configured(shop, page, has_parent, Some(shop_id), engine)
        }
        ScreenKind::Transaction {
            shop_id,
            page: shop_page,
            slot,
        } => transaction(shop_id, *shop_page, *slot, page, has_parent, engine),
        ScreenKind::SellAll => Ok(Layout {
            title: "Sell items".to_string(),
            size: SELL_SCREEN_SIZE,
            page_count: 1,
            page: 0,
            bindings: BTreeMap::new(),
        }),
        ScreenKind::Stats => Ok(stats(page, has_parent, engine)),
    }
}

fn find_shop<'c>(engine: &'c TransactionEngine<'_>, shop_id: &str) -> ShopResult<&'c ScreenDefinition> {
    engine
        .config()
        .shops
        .get(shop_id)
        .ok_or_else(|| ShopError::Configuration(format!("unknown shop '{shop_id}'")))
}

/// Returns the transaction data behind a shop button.
pub fn transaction_data<'c>(
    engine: &'c TransactionEngine<'_>,
    shop_id: &str,
    page: usize,
    slot: usize,
) -> ShopResult<&'c TransactionData> {
    find_shop(engine, shop_id)?
        .pages
        .get(page)
        .and_then(|p| p.buttons.iter().find(|b| b.slot == slot))
        .and_then(|b| b.transaction.as_ref())
        .ok_or_else(|| {
            ShopError::Configuration(format!(
                "no transaction at shop '{shop_id}' page {} slot {slot}",
                page + 1
            ))
        })
}

fn page_bounds(screen: &ScreenDefinition, page: usize) -> ShopResult<(usize, usize)> {
    if screen.pages.is_empty() {
        return Err(ShopError::Configuration(format!("'{}' has no pages", screen.title)));
    }
    let count = screen.pages.len();
    Ok((page.min(count - 1), count))
}

/// Icon and name, preferring what the button itself configures.
fn view(button: &ButtonDefinition, item: &str, name: Option<&str>) -> SlotView {
    let view = SlotView::new(button.item.clone().unwrap_or_else(|| item.to_string()))
        .with_lore(button.lore.clone());
    match button.name.as_deref().or(name) {
        Some(name) => view.named(name),
        None => view,
    }
}

/// Shared handling of navigation buttons. `None` means the button is hidden.
fn navigation(
    button: &ButtonDefinition,
    page: usize,
    page_count: usize,
    has_parent: bool,
) -> Option<Option<Binding>> {
    let binding = match button.button_type {
        ButtonType::PreviousPage if page > 0 => Binding {
            view: view(button, ARROW, Some("Previous page")),
            action: Action::PreviousPage,
        },
        ButtonType::NextPage if page + 1 < page_count => Binding {
            view: view(button, ARROW, Some("Next page")),
            action: Action::NextPage,
        },
        ButtonType::Return if has_parent => Binding {
            view: view(button, BARRIER, Some("Back")),
            action: Action::Return,
        },
        ButtonType::PreviousPage | ButtonType::NextPage | ButtonType::Return => return Some(None),
        ButtonType::SellGui => Binding {
            view: view(button, CHEST, Some("Sell items")),
            action: Action::OpenSellGui,
        },
        ButtonType::Filler => Binding {
            view: view(button, FILLER, Some(" ")),
            action: Action::None,
        },
        _ => return None,
    };
    Some(Some(binding))
}

fn price_lore(data: &TransactionData, engine: &TransactionEngine<'_>) -> Vec<String> {
    let rounding = engine.config().settings.rounding;
    let mut lore = Vec::new();
    if data.buy_enabled() {
        lore.push(format!("Buy: ${}", format_money(data.buy_price, rounding)));
    }
    if data.sell_enabled() {
        lore.push(format!("Sell: ${}", format_money(data.sell_price, rounding)));
    }
    lore
}

fn icon(data: &TransactionData) -> String {
    data.display_item
        .clone()
        .or_else(|| data.item.clone())
        .unwrap_or_else(|| PAPER.to_string())
}

/// The menu and shop screens.
fn configured(
    screen: &ScreenDefinition,
    page: usize,
    has_parent: bool,
    shop_id: Option<&String>,
    engine: &TransactionEngine<'_>,
) -> ShopResult<Layout> {
    let (page, page_count) = page_bounds(screen, page)?;
    let mut bindings = BTreeMap::new();

    for button in &screen.pages[page].buttons {
        if let Some(nav) = navigation(button, page, page_count, has_parent) {
            if let Some(binding) = nav {
                bindings.insert(button.slot, binding);
            }
            continue;
        }
        let binding = match (button.button_type, &button.transaction, shop_id) {
            (ButtonType::OpenShop, _, _) => {
                let target = button.shop.clone().ok_or_else(|| {
                    ShopError::Configuration(format!("open_shop at slot {} has no shop", button.slot))
                })?;
                Binding {
                    view: view(button, CHEST, Some(&target)),
                    action: Action::OpenShop(target),
                }
            }
            (ButtonType::Transaction, Some(data), Some(shop_id)) => {
                let mut slot_view = view(button, &icon(data), Some(&data.display_name()));
                slot_view.lore.extend(price_lore(data, engine));
                Binding {
                    view: slot_view,
                    action: Action::OpenTransaction {
                        shop_id: shop_id.clone(),
                        page,
                        slot: button.slot,
                    },
                }
            }
            (ButtonType::Transaction, _, _) => {
                warn!(slot = button.slot, title = %screen.title, "Transaction button outside a shop or without data");
                Binding {
                    view: view(button, PAPER, None),
                    action: Action::None,
                }
            }
            _ => Binding {
                view: view(button, PAPER, None),
                action: Action::None,
            },
        };
        bindings.insert(button.slot, binding);
    }

    Ok(Layout {
        title: screen.title.clone(),
        size: screen.size(),
        page_count,
        page,
        bindings,
    })
}

fn transaction(
    shop_id: &str,
    shop_page: usize,
    slot: usize,
    page: usize,
    has_parent: bool,
    engine: &TransactionEngine<'_>,
) -> ShopResult<Layout> {
    let data = transaction_data(engine, shop_id, shop_page, slot)?;
    let style = engine
        .config()
        .transaction_style(&data.style)
        .ok_or_else(|| ShopError::Configuration(format!("unknown style '{}'", data.style)))?;
    let (page, page_count) = page_bounds(&style, page)?;
    let rounding = engine.config().settings.rounding;
    let item = icon(data);
    let mut bindings = BTreeMap::new();

    for button in &style.pages[page].buttons {
        if let Some(nav) = navigation(button, page, page_count, has_parent) {
            if let Some(binding) = nav {
                bindings.insert(button.slot, binding);
            }
            continue;
        }
        let amount = button.amount.unwrap_or(1).max(1);
        let binding = match button.button_type {
            ButtonType::Buy if data.buy_enabled() => Binding {
                view: view(button, &item, Some(&format!("Buy {amount}")))
                    .with_amount(amount.min(64))
                    .with_lore(vec![format!(
                        "Price: ${}",
                        format_money(data.buy_price * amount as f64, rounding)
                    )]),
                action: Action::Buy(amount),
            },
            ButtonType::Sell if data.sell_enabled() => Binding {
                view: view(button, &item, Some(&format!("Sell {amount}")))
                    .with_amount(amount.min(64))
                    .with_lore(vec![format!(
                        "Price: ${}",
                        format_money(data.sell_price * amount as f64, rounding)
                    )]),
                action: Action::Sell(amount),
            },
            ButtonType::SellAll
                if data.sell_enabled() && data.transaction_type == TransactionType::Item =>
            {
                Binding {
                    view: view(button, HOPPER, Some("Sell all")).with_lore(vec![format!(
                        "Each: ${}",
                        format_money(data.sell_price, rounding)
                    )]),
                    action: Action::SellAll,
                }
            }
            ButtonType::Buy | ButtonType::Sell | ButtonType::SellAll => continue,
            ButtonType::Display => {
                let mut slot_view = view(button, &item, Some(&data.display_name()));
                slot_view.lore.extend(price_lore(data, engine));
                Binding {
                    view: slot_view,
                    action: Action::None,
                }
            }
            _ => Binding {
                view: view(button, PAPER, None),
                action: Action::None,
            },
        };
        bindings.insert(button.slot, binding);
    }

    Ok(Layout {
        title: data.display_name(),
        size: style.size(),
        page_count,
        page,
        bindings,
    })
}

pub fn stats_page_count(entries: usize) -> usize {
    entries.div_ceil(STATS_PER_PAGE).max(1)
}

fn stats(page: usize, has_parent: bool, engine: &TransactionEngine<'_>) -> Layout {
    let snapshot = engine.stats().snapshot();
    let page_count = stats_page_count(snapshot.len());
    let page = page.min(page_count - 1);

    let mut bindings: BTreeMap<usize, Binding> = snapshot
        .iter()
        .skip(page * STATS_PER_PAGE)
        .take(STATS_PER_PAGE)
        .enumerate()
        .map(|(slot, (kind, entry))| {
            let view = SlotView::new(kind.to_string())
                .named(kind.to_string())
                .with_lore(vec![
                    format!("Purchased: {}", entry.purchased),
                    format!("Sold: {}", entry.sold),
                ]);
            (slot, Binding { view, action: Action::None })
        })
        .collect();

    if page > 0 {
        bindings.insert(
            STATS_PREVIOUS_SLOT,
            Binding {
                view: SlotView::new(ARROW).named("Previous page"),
                action: Action::PreviousPage,
            },
        );
    }
    if page + 1 < page_count {
        bindings.insert(
            STATS_NEXT_SLOT,
            Binding {
                view: SlotView::new(ARROW).named("Next page"),
                action: Action::NextPage,
            },
        );
    }
    if has_parent {
        bindings.insert(
            STATS_RETURN_SLOT,
            Binding {
                view: SlotView::new(BARRIER).named("Back"),
                action: Action::Return,
            },
        );
    }

    Layout {
        title: "Statistics".to_string(),
        size: SELL_SCREEN_SIZE,
        page_count,
        page,
        bindings,
    }
}
