use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::{fs, path::Path, path::PathBuf};
use tracing::{debug, info};

use crate::core::money::RoundingMode;
use crate::locale::Locale;

pub const DEFAULT_STYLE: &str = "default";
pub const SLOTS_PER_ROW: usize = 9;

/// 900 seconds at 20 ticks per second.
const DEFAULT_FLUSH_INTERVAL_TICKS: u64 = 20 * 900;
const DEFAULT_SHUTDOWN_FLUSH_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ButtonType {
    Filler,
    PreviousPage,
    NextPage,
    Return,
    OpenShop,
    Transaction,
    Buy,
    Sell,
    Display,
    SellAll,
    SellGui,
    Dummy,
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum TransactionType {
    #[default]
    Item,
    Command,
}

/// What a transaction button trades and at which prices. Zero or negative prices
/// disable that direction.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct TransactionData {
    #[serde(rename = "type", default)]
    pub transaction_type: TransactionType,
    #[serde(default = "default_style_name")]
    pub style: String,
    #[serde(default)]
    pub buy_price: f64,
    #[serde(default)]
    pub sell_price: f64,
    pub name: Option<String>,
    /// Item shown on the transaction screen; defaults to `item`.
    pub display_item: Option<String>,
    /// Item traded. Required for item transactions.
    pub item: Option<String>,
    #[serde(default)]
    pub buy_commands: Vec<String>,
    #[serde(default)]
    pub sell_commands: Vec<String>,
}

impl TransactionData {
    pub fn buy_enabled(&self) -> bool {
        self.buy_price > 0.0
    }

    pub fn sell_enabled(&self) -> bool {
        self.sell_price > 0.0
    }

    pub fn display_name(&self) -> String {
        self.name
            .clone()
            .or_else(|| self.item.clone())
            .unwrap_or_else(|| "item".to_string())
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct ButtonDefinition {
    pub slot: usize,
    #[serde(rename = "type")]
    pub button_type: ButtonType,
    /// Icon shown in the slot.
    pub item: Option<String>,
    pub name: Option<String>,
    #[serde(default)]
    pub lore: Vec<String>,
    /// Target of `open_shop` buttons.
    pub shop: Option<String>,
    pub transaction: Option<TransactionData>,
    /// Units traded by `buy` and `sell` buttons of a transaction style.
    pub amount: Option<u32>,
}

impl ButtonDefinition {
    pub fn new(slot: usize, button_type: ButtonType) -> Self {
        Self {
            slot,
            button_type,
            item: None,
            name: None,
            lore: Vec::new(),
            shop: None,
            transaction: None,
            amount: None,
        }
    }

    fn with_amount(mut self, amount: u32) -> Self {
        self.amount = Some(amount);
        self
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Default)]
pub struct PageDefinition {
    #[serde(default)]
    pub buttons: Vec<ButtonDefinition>,
}

/// Layout of a paginated screen: the menu, a shop or a transaction style.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct ScreenDefinition {
    pub title: String,
    #[serde(default = "default_rows")]
    pub rows: usize,
    #[serde(default)]
    pub pages: Vec<PageDefinition>,
}

impl ScreenDefinition {
    pub fn size(&self) -> usize {
        self.rows * SLOTS_PER_ROW
    }

    /// Built-in transaction layout. Page one trades 1 to 64 units in powers of two,
    /// page two trades one to nine full stacks.
    pub fn default_transaction_style() -> Self {
        let mut first = PageDefinition::default();
        for (i, amount) in [1, 2, 4, 8, 16, 32, 64].into_iter().enumerate() {
            first
                .buttons
                .push(ButtonDefinition::new(10 + i, ButtonType::Buy).with_amount(amount));
            first
                .buttons
                .push(ButtonDefinition::new(28 + i, ButtonType::Sell).with_amount(amount));
        }
        first.buttons.extend([
            ButtonDefinition::new(22, ButtonType::Display),
            ButtonDefinition::new(48, ButtonType::SellAll),
            ButtonDefinition::new(49, ButtonType::Return),
            ButtonDefinition::new(50, ButtonType::SellGui),
            ButtonDefinition::new(51, ButtonType::NextPage),
        ]);

        let mut second = PageDefinition::default();
        for stacks in 1..=9u32 {
            let slot = stacks as usize - 1;
            second
                .buttons
                .push(ButtonDefinition::new(9 + slot, ButtonType::Buy).with_amount(stacks * 64));
            second
                .buttons
                .push(ButtonDefinition::new(27 + slot, ButtonType::Sell).with_amount(stacks * 64));
        }
        second.buttons.extend([
            ButtonDefinition::new(47, ButtonType::PreviousPage),
            ButtonDefinition::new(49, ButtonType::Return),
        ]);

        Self {
            title: "Buy & Sell".to_string(),
            rows: 6,
            pages: vec![first, second],
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(default)]
pub struct Settings {
    pub locale: String,
    pub statistics: bool,
    pub first_run: bool,
    pub rounding: RoundingMode,
    pub flush_interval_ticks: u64,
    pub shutdown_flush_timeout_secs: u64,
    pub database_path: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            locale: "en_us".to_string(),
            statistics: true,
            first_run: true,
            rounding: RoundingMode::default(),
            flush_interval_ticks: DEFAULT_FLUSH_INTERVAL_TICKS,
            shutdown_flush_timeout_secs: DEFAULT_SHUTDOWN_FLUSH_TIMEOUT_SECS,
            database_path: None,
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct AppConfig {
    #[serde(default)]
    pub settings: Settings,
    pub menu: ScreenDefinition,
    #[serde(default)]
    pub shops: BTreeMap<String, ScreenDefinition>,
    #[serde(default)]
    pub transaction_styles: BTreeMap<String, ScreenDefinition>,
    #[serde(default)]
    pub locale: Locale,
}

impl AppConfig {
    pub fn load() -> Result<Self> {
        debug!("Loading default config");
        let config_path = Self::default_config_path()?;
        Self::load_from_path(&config_path)
    }

    fn project_dirs() -> Result<ProjectDirs> {
        ProjectDirs::from("dev", "tradepost", "tradepost")
            .context("Could not determine project directories")
    }

    pub fn default_config_path() -> Result<PathBuf> {
        Ok(Self::project_dirs()?.config_dir().join("config.yaml"))
    }

    /// Location of the statistics database.
    pub fn database_path(&self) -> Result<PathBuf> {
        if let Some(custom_path) = &self.settings.database_path {
            return Ok(PathBuf::from(custom_path));
        }
        Ok(Self::project_dirs()?.data_dir().join("stats.db"))
    }

    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let config_str = fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;

        let config: Self = serde_yaml::from_str(&config_str)
            .with_context(|| format!("Failed to parse config file: {}", path.as_ref().display()))?;
        debug!(
            shops = config.shops.len(),
            styles = config.transaction_styles.len(),
            "Successfully loaded config"
        );
        Ok(config)
    }

    /// Flips the first-run flag and writes the whole document back to `path`.
    pub fn mark_first_run_complete<P: AsRef<Path>>(&mut self, path: P) -> Result<()> {
        self.settings.first_run = false;
        let yaml = serde_yaml::to_string(self).context("Failed to serialize config")?;
        fs::write(path.as_ref(), yaml).with_context(|| {
            format!("Failed to write config file: {}", path.as_ref().display())
        })?;
        info!(path = %path.as_ref().display(), "First run complete");
        Ok(())
    }

    /// Resolves a transaction style. `default` falls back to the built-in layout.
    pub fn transaction_style(&self, name: &str) -> Option<ScreenDefinition> {
        match self.transaction_styles.get(name) {
            Some(style) => Some(style.clone()),
            None if name == DEFAULT_STYLE => Some(ScreenDefinition::default_transaction_style()),
            None => None,
        }
    }

    /// Lists every problem that would make a screen fail to open.
    pub fn validate(&self) -> Vec<String> {
        let mut problems = Vec::new();
        self.validate_screen("menu", &self.menu, &mut problems);
        for (id, shop) in &self.shops {
            self.validate_screen(&format!("shop '{id}'"), shop, &mut problems);
        }
        for (id, style) in &self.transaction_styles {
            self.validate_screen(&format!("style '{id}'"), style, &mut problems);
        }
        problems
    }

    fn validate_screen(&self, label: &str, screen: &ScreenDefinition, problems: &mut Vec<String>) {
        if !(1..=6).contains(&screen.rows) {
            problems.push(format!("{label}: rows must be between 1 and 6"));
        }
        if screen.pages.is_empty() {
            problems.push(format!("{label}: no pages defined"));
        }
        for (page_no, page) in screen.pages.iter().enumerate() {
            for button in &page.buttons {
                let at = format!("{label} page {} slot {}", page_no + 1, button.slot);
                if button.slot >= screen.size() {
                    problems.push(format!("{at}: slot outside the screen"));
                }
                match button.button_type {
                    ButtonType::OpenShop => match &button.shop {
                        Some(shop) if self.shops.contains_key(shop) => {}
                        Some(shop) => problems.push(format!("{at}: unknown shop '{shop}'")),
                        None => problems.push(format!("{at}: open_shop without a shop")),
                    },
                    ButtonType::Transaction => match &button.transaction {
                        None => problems.push(format!("{at}: transaction without data")),
                        Some(data) => {
                            if self.transaction_style(&data.style).is_none() {
                                problems.push(format!("{at}: unknown style '{}'", data.style));
                            }
                            if data.transaction_type == TransactionType::Item
                                && data.item.is_none()
                            {
                                problems.push(format!("{at}: item transaction without an item"));
                            }
                        }
                    },
                    _ => {}
                }
            }
        }
    }
}

fn default_rows() -> usize {
    6
}

fn default_style_name() -> String {
    DEFAULT_STYLE.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const YAML: &str = r#"
settings:
  statistics: false
  rounding: half_up
menu:
  title: "Shop"
  pages:
    - buttons:
        - slot: 10
          type: open_shop
          item: stone
          shop: blocks
        - slot: 12
          type: open_shop
          shop: missing
shops:
  blocks:
    title: "Blocks"
    rows: 3
    pages:
      - buttons:
          - slot: 0
            type: transaction
            transaction:
              item: stone
              buy_price: 2.0
              sell_price: 0.5
          - slot: 1
            type: transaction
            transaction:
              type: command
              style: fancy
              name: "VIP rank"
              buy_price: 1000
              buy_commands: ["lp user <player> parent add vip"]
          - slot: 40
            type: filler
"#;

    #[test]
    fn test_config_deserialization() {
        let config: AppConfig = serde_yaml::from_str(YAML).expect("Failed to deserialize");
        assert!(!config.settings.statistics);
        assert_eq!(config.settings.rounding, RoundingMode::HalfUp);
        assert_eq!(config.settings.flush_interval_ticks, 18000);
        assert_eq!(config.menu.rows, 6);

        let blocks = &config.shops["blocks"];
        assert_eq!(blocks.size(), 27);
        let data = blocks.pages[0].buttons[0]
            .transaction
            .as_ref()
            .expect("transaction data");
        assert_eq!(data.transaction_type, TransactionType::Item);
        assert_eq!(data.style, DEFAULT_STYLE);
        assert!(data.sell_enabled());
        assert_eq!(config.locale, Locale::default());
    }

    #[test]
    fn test_validate_reports_problems() {
        let config: AppConfig = serde_yaml::from_str(YAML).expect("Failed to deserialize");
        let problems = config.validate();
        assert_eq!(problems.len(), 3, "{problems:?}");
        assert!(problems.iter().any(|p| p.contains("unknown shop 'missing'")));
        assert!(problems.iter().any(|p| p.contains("unknown style 'fancy'")));
        assert!(problems.iter().any(|p| p.contains("slot outside the screen")));
    }

    #[test]
    fn test_default_transaction_style_layout() {
        let style = ScreenDefinition::default_transaction_style();
        assert_eq!(style.pages.len(), 2);

        let buys: Vec<(usize, u32)> = style.pages[0]
            .buttons
            .iter()
            .filter(|b| b.button_type == ButtonType::Buy)
            .map(|b| (b.slot, b.amount.unwrap_or(0)))
            .collect();
        assert_eq!(buys.first(), Some(&(10, 1)));
        assert_eq!(buys.last(), Some(&(16, 64)));

        let sells = style.pages[1]
            .buttons
            .iter()
            .filter(|b| b.button_type == ButtonType::Sell)
            .count();
        assert_eq!(sells, 9);
    }

    #[test]
    fn test_mark_first_run_complete_round_trips() -> Result<()> {
        let dir = TempDir::new()?;
        let path = dir.path().join("config.yaml");
        fs::write(&path, YAML)?;

        let mut config = AppConfig::load_from_path(&path)?;
        assert!(config.settings.first_run);
        config.mark_first_run_complete(&path)?;

        let reloaded = AppConfig::load_from_path(&path)?;
        assert!(!reloaded.settings.first_run);
        assert_eq!(reloaded.shops, config.shops);
        Ok(())
    }
}
