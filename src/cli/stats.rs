use super::ui;
use crate::config::AppConfig;
use crate::core::item::ItemKind;
use crate::stats::TransactionStats;
use crate::store::{PersistenceQueue, StatsTable, open_pool};
use anyhow::{Context, Result};
use comfy_table::Cell;
use std::collections::BTreeMap;
use tracing::info;

/// Prints the persisted statistics as a table or as JSON.
pub async fn run(config: &AppConfig, json: bool) -> Result<()> {
    let path = config.database_path()?;
    if !path.exists() {
        anyhow::bail!("No statistics database at {}", path.display());
    }

    let pool = open_pool(&path).await?;
    let queue = PersistenceQueue::spawn(pool);
    let table = StatsTable::new(queue.clone());
    let create = table.create_table();
    let load = table.load_stats();
    create.await.context("Failed to prepare statistics table")?;
    let stats = load.await.context("Failed to read statistics")?;
    queue.close().await;
    info!(items = stats.len(), "Loaded statistics");

    if json {
        println!("{}", serde_json::to_string_pretty(&to_json(&stats))?);
    } else {
        println!("{}", render(&stats));
    }
    Ok(())
}

fn to_json(stats: &BTreeMap<ItemKind, TransactionStats>) -> serde_json::Value {
    serde_json::to_value(stats).unwrap_or_default()
}

fn render(stats: &BTreeMap<ItemKind, TransactionStats>) -> String {
    let mut output = format!("{}\n\n", ui::style_text("Statistics", ui::StyleType::Title));
    if stats.is_empty() {
        output.push_str(&ui::style_text("No transactions recorded yet.", ui::StyleType::Subtle));
        return output;
    }

    let mut table = ui::new_styled_table();
    table.set_header(vec![
        ui::header_cell("Item"),
        ui::header_cell("Purchased"),
        ui::header_cell("Sold"),
    ]);
    for (kind, entry) in stats {
        table.add_row(vec![
            Cell::new(kind.as_str()),
            ui::number_cell(entry.purchased),
            ui::number_cell(entry.sold),
        ]);
    }
    output.push_str(&table.to_string());

    let purchased: u64 = stats.values().map(|s| s.purchased).sum();
    let sold: u64 = stats.values().map(|s| s.sold).sum();
    output.push_str(&format!(
        "\n\n{} {} purchased, {} sold",
        ui::style_text("Total:", ui::StyleType::TotalLabel),
        ui::style_text(&purchased.to_string(), ui::StyleType::TotalValue),
        ui::style_text(&sold.to_string(), ui::StyleType::TotalValue)
    ));
    output
}
