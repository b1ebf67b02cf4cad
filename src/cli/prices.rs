use super::ui;
use crate::config::AppConfig;
use crate::core::item::NamespacedRegistry;
use crate::price::PriceCache;
use anyhow::Result;
use comfy_table::Cell;
use tracing::debug;

/// Validates the configuration and prints the sell prices it produces.
pub fn run(config: &AppConfig) -> Result<()> {
    let problems = config.validate();
    let mut prices = PriceCache::new();
    prices.rebuild(&config.shops, &NamespacedRegistry);
    debug!(problems = problems.len(), prices = prices.len(), "Checked configuration");

    println!("{}", render(config, &prices, &problems));
    if !problems.is_empty() {
        anyhow::bail!("Configuration has {} problem(s)", problems.len());
    }
    Ok(())
}

fn render(config: &AppConfig, prices: &PriceCache, problems: &[String]) -> String {
    let mut output = format!("{}\n\n", ui::style_text("Sell prices", ui::StyleType::Title));

    if prices.is_empty() {
        output.push_str(&ui::style_text("No sellable items configured.", ui::StyleType::Subtle));
    } else {
        let mut table = ui::new_styled_table();
        table.set_header(vec![ui::header_cell("Item"), ui::header_cell("Sell price")]);
        for (kind, price) in prices.entries() {
            let formatted = crate::core::money::format_money(price, config.settings.rounding);
            table.add_row(vec![Cell::new(kind.as_str()), ui::money_cell(&formatted, price)]);
        }
        output.push_str(&table.to_string());
    }

    output.push_str(&format!(
        "\n\n{} {}",
        ui::style_text("Shops:", ui::StyleType::TotalLabel),
        ui::style_text(&config.shops.len().to_string(), ui::StyleType::TotalValue)
    ));

    for problem in problems {
        output.push_str(&format!("\n{}", ui::style_text(problem, ui::StyleType::Warning)));
    }
    output
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_lists_prices_and_problems() {
        console::set_colors_enabled(false);
        let config: AppConfig = serde_yaml::from_str(
            r#"
menu:
  title: "Shop"
  pages: []
shops:
  blocks:
    title: "Blocks"
    pages:
      - buttons:
          - { slot: 0, type: transaction, transaction: { item: stone, sell_price: 0.125 } }
"#,
        )
        .expect("Failed to deserialize");
        let mut prices = PriceCache::new();
        prices.rebuild(&config.shops, &NamespacedRegistry);

        let output = render(&config, &prices, &config.validate());
        assert!(output.contains("minecraft:stone"));
        assert!(output.contains("$0.13"));
        assert!(output.contains("menu: no pages defined"));
    }
}
