use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt::Display;

use crate::core::host::User;
use crate::core::item::Inventory;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct ScreenId(pub u64);

impl Display for ScreenId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum ScreenKind {
    Menu,
    Shop {
        shop_id: String,
    },
    /// Buy and sell screen for the transaction button at `slot` of a shop page.
    Transaction {
        shop_id: String,
        page: usize,
        slot: usize,
    },
    SellAll,
    Stats,
}

impl ScreenKind {
    pub fn is_sell_screen(&self) -> bool {
        matches!(self, ScreenKind::SellAll)
    }
}

/// Why the host closed a view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseReason {
    Player,
    /// The view was replaced while navigating.
    OpenNew,
    Disconnect,
    Unloaded,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    PreviousPage,
    NextPage,
    Return,
    OpenShop(String),
    OpenTransaction {
        shop_id: String,
        page: usize,
        slot: usize,
    },
    OpenSellGui,
    Buy(u32),
    Sell(u32),
    SellAll,
    None,
}

/// What the host should draw in one slot.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SlotView {
    pub item: String,
    pub amount: u32,
    pub name: Option<String>,
    pub lore: Vec<String>,
}

impl SlotView {
    pub fn new(item: impl Into<String>) -> Self {
        Self {
            item: item.into(),
            amount: 1,
            name: None,
            lore: Vec::new(),
        }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_lore(mut self, lore: Vec<String>) -> Self {
        self.lore = lore;
        self
    }

    pub fn with_amount(mut self, amount: u32) -> Self {
        self.amount = amount.max(1);
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Binding {
    pub view: SlotView,
    pub action: Action,
}

/// Snapshot handed to the painter.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScreenView {
    pub id: ScreenId,
    pub title: String,
    pub size: usize,
    pub page: usize,
    pub page_count: usize,
    pub slots: BTreeMap<usize, SlotView>,
}

/// Paints screen state. Layout and rendering belong to the host.
pub trait ScreenPainter: Send + Sync {
    fn paint(&self, user: &User, view: &ScreenView);
    /// Closes whatever view the user has open.
    fn close_view(&self, user: &User);
}

/// One open screen. Bindings are rebuilt on every redraw.
#[derive(Debug, Clone)]
pub struct ScreenInstance {
    pub id: ScreenId,
    pub owner: User,
    pub kind: ScreenKind,
    pub title: String,
    pub size: usize,
    pub current_page: usize,
    pub page_count: usize,
    pub bindings: BTreeMap<usize, Binding>,
    pub open: bool,
    pub parent: Option<Box<ScreenInstance>>,
    /// Items placed into a sell screen.
    pub contents: Inventory,
}

impl ScreenInstance {
    pub fn view(&self) -> ScreenView {
        let mut slots: BTreeMap<usize, SlotView> = self
            .bindings
            .iter()
            .map(|(slot, b)| (*slot, b.view.clone()))
            .collect();
        for (slot, stack) in self.contents.iter() {
            slots.insert(
                slot,
                SlotView::new(stack.kind.to_string()).with_amount(stack.amount),
            );
        }
        ScreenView {
            id: self.id,
            title: self.title.clone(),
            size: self.size,
            page: self.current_page,
            page_count: self.page_count,
            slots,
        }
    }

    pub fn action_at(&self, slot: usize) -> Option<&Action> {
        self.bindings.get(&slot).map(|b| &b.action)
    }

    pub fn has_parent(&self) -> bool {
        self.parent.is_some()
    }

    /// Number of screens below this one in the back chain.
    pub fn depth(&self) -> usize {
        let mut depth = 0;
        let mut current = self.parent.as_deref();
        while let Some(screen) = current {
            depth += 1;
            current = screen.parent.as_deref();
        }
        depth
    }
}
