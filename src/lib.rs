//! # Valuation History Builder
//!
//! Rolls an append-only stream of posted ledger entries up into stock
//! valuation balances: one current row per dimension key and a dense,
//! gapless monthly history with running opening and closing balances.
//!
//! ## Core Concepts
//!
//! - **Dimension key**: (product, valuation area, account, company), one
//!   independent balance series
//! - **Period**: a calendar month, dated to its last day
//! - **Gap filling**: months without activity still get a zero row so the
//!   balance carries forward
//! - **Running balance**: per-key prefix sums of net quantity and amount
//! - **Value-bearing accounts**: the stock valuation accounts whose posted
//!   entries participate
//!
//! ## Example
//!
//! ```rust,ignore
//! use valuation_history_builder::*;
//! use chrono::NaiveDate;
//!
//! let config = ValuationConfig::new(CompanyId(1), "ACME", [AccountId(371)]);
//! let entries = vec![LedgerEntry {
//!     product: ProductId(10),
//!     valuation_area: None,
//!     account: AccountId(371),
//!     company: CompanyId(1),
//!     move_type: MoveType::InboundInvoice,
//!     debit: 100.0,
//!     credit: 0.0,
//!     quantity: 10.0,
//!     uom_factor: 1.0,
//!     template_uom_factor: 1.0,
//!     date: NaiveDate::from_ymd_opt(2023, 1, 15).unwrap(),
//!     status: PostingStatus::Posted,
//! }];
//!
//! let snapshot = process_ledger(&entries, &config).unwrap();
//! assert_eq!(snapshot.history[0].balance.quantity_final, 10.0);
//! ```

pub mod aggregator;
pub mod balancer;
pub mod engine;
pub mod error;
pub mod ingestion;
pub mod ledger;
pub mod model;
pub mod schema;
pub mod store;
pub mod utils;
pub mod valuation;

pub use aggregator::{aggregate_monthly, aggregate_totals, quantity_signs, Movement, QuantitySigns};
pub use balancer::{verify_running_balances, RunningBalancer};
pub use engine::{process_current, process_history, Densifier};
pub use error::{Result, ValuationError};
pub use ingestion::*;
pub use ledger::{
    normalize_quantity, InMemoryLedger, LedgerQuery, LedgerReader, LedgerSource, NormalizedEntry,
};
pub use model::*;
pub use schema::*;
pub use store::sqlite::SqliteValuationStore;
pub use store::{
    CurrentValuationRepositoryTrait, HistoricalValuationRepositoryTrait,
    ValuationAreaRegistryTrait, ValuationStore,
};
pub use utils::*;
pub use valuation::{RebuildSummary, ValuationEngine};

use log::info;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DataOrigin {
    /// Aggregated from posted ledger entries
    Ledger,
    /// Synthesized zero row for a month without activity
    GapFill,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MonthlyMovement {
    pub movement: Movement,
    pub origin: DataOrigin,
}

pub type MonthlySeries = BTreeMap<Period, MonthlyMovement>;
pub type DenseHistory = BTreeMap<DimensionKey, MonthlySeries>;

/// Both valuation tables computed in memory, without a store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValuationSnapshot {
    pub current: Vec<NewCurrentValuation>,
    pub history: Vec<NewHistoricalValuation>,
}

/// Runs the full rebuild pipeline over `entries` and returns the rows a
/// rebuild would write. Valuation areas are taken as posted.
pub fn process_ledger(entries: &[LedgerEntry], config: &ValuationConfig) -> Result<ValuationSnapshot> {
    config.validate()?;

    info!(
        "Processing {} ledger entries for company {} ({})",
        entries.len(),
        config.company_name,
        config.company
    );

    let ledger = InMemoryLedger::new(entries.to_vec());
    let normalized = LedgerReader::new(&ledger)
        .read(&LedgerQuery::for_accounts(&config.value_bearing_accounts))?;

    let current = process_current(&normalized);
    let history = process_history(&normalized, config.balance_tolerance)?;

    Ok(ValuationSnapshot { current, history })
}
