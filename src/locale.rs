//! User-facing message templates with `<placeholder>` substitution

use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(default)]
pub struct Locale {
    pub prefix: String,
    pub config_reload: String,
    pub not_enough_items: String,
    pub insufficient_funds: String,
    pub buy_item_success: String,
    pub sell_item_success: String,
    pub buy_command_success: String,
    pub sell_command_success: String,
    pub sellall_success: String,
    pub sellall_unsellable: String,
    pub unbuyable: String,
    pub unsellable: String,
    pub gui_open_error: String,
    pub stats_disabled: String,
}

impl Default for Locale {
    fn default() -> Self {
        Self {
            prefix: "[Shop] ".to_string(),
            config_reload: "Configuration reloaded.".to_string(),
            not_enough_items: "You do not have enough items to sell.".to_string(),
            insufficient_funds: "You cannot afford this. It costs $<price>.".to_string(),
            buy_item_success: "You bought <amount> <item> for $<price>. Balance: $<bal>"
                .to_string(),
            sell_item_success: "You sold <amount> <item> for $<price>. Balance: $<bal>"
                .to_string(),
            buy_command_success: "You bought <amount> <item> for $<price>. Balance: $<bal>"
                .to_string(),
            sell_command_success: "You sold <amount> <item> for $<price>. Balance: $<bal>"
                .to_string(),
            sellall_success: "You sold your items for $<price>. Balance: $<bal>".to_string(),
            sellall_unsellable: "Some items could not be sold and were returned.".to_string(),
            unbuyable: "This item cannot be bought.".to_string(),
            unsellable: "This item cannot be sold.".to_string(),
            gui_open_error: "This menu could not be opened. Please contact an administrator."
                .to_string(),
            stats_disabled: "Statistics are disabled on this server.".to_string(),
        }
    }
}

impl Locale {
    /// Prefixes a template and substitutes each `<name>` placeholder.
    pub fn render(&self, template: &str, placeholders: &[(&str, &str)]) -> String {
        let body = placeholders
            .iter()
            .fold(template.to_string(), |acc, (name, value)| {
                acc.replace(&format!("<{name}>"), value)
            });
        format!("{}{}", self.prefix, body)
    }
}
