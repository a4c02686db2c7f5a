use std::error::Error;
use std::sync::Arc;
use valuation_history_builder::*;

fn load_config(path: Option<String>) -> std::result::Result<ValuationConfig, Box<dyn Error>> {
    match path {
        Some(path) => Ok(ValuationConfig::from_json(&std::fs::read_to_string(path)?)?),
        None => Ok(ValuationConfig::new(CompanyId(1), "Demo Company", [AccountId(371)])),
    }
}

fn main() -> std::result::Result<(), Box<dyn Error>> {
    let mut args = std::env::args().skip(1);
    let journal_path = args
        .next()
        .unwrap_or_else(|| "demos/journal.json".to_string());
    let config = load_config(args.next())?;

    let entries = load_journal_file(&journal_path)?;
    println!("Loaded {} ledger entries from {}", entries.len(), journal_path);

    let store = Arc::new(SqliteValuationStore::open_in_memory()?);
    let engine = ValuationEngine::new(
        config,
        Arc::new(InMemoryLedger::new(entries)),
        store.clone(),
        store.clone(),
    );

    let summary = engine.rebuild_all()?;
    println!("{}\n", serde_json::to_string_pretty(&summary)?);

    println!(
        "{:<28} {:>10} {:>10} {:>10} {:>10} {:>12} {:>12}",
        "Key", "Date", "Qty in", "Qty out", "Qty", "Qty final", "Amount final"
    );
    for row in store.list_history()? {
        println!(
            "{:<28} {:>10} {:>10.2} {:>10.2} {:>10.2} {:>12.2} {:>12.2}",
            row.key.to_string(),
            row.date.format("%Y-%m-%d"),
            row.movement.quantity_in,
            row.movement.quantity_out,
            row.movement.quantity,
            row.balance.quantity_final,
            row.balance.amount_final
        );
    }

    println!();
    for row in store.list_current()? {
        println!(
            "Current {}: qty {:.2}, value {:.2}",
            row.key, row.movement.quantity, row.movement.amount
        );
    }

    Ok(())
}
