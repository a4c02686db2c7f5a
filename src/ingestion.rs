use crate::error::Result;
use crate::schema::{
    AccountId, CompanyId, LedgerEntry, MoveType, PostingStatus, ProductId, ValuationAreaId,
};
use chrono::NaiveDate;
use log::debug;
use serde::{Deserialize, Serialize};
use std::path::Path;

fn unit_factor() -> f64 {
    1.0
}

/// Journal header as exported from the accounting system.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JournalMove {
    #[serde(default)]
    pub name: Option<String>,
    pub move_type: MoveType,
    pub date: NaiveDate,
    pub state: PostingStatus,
    pub company_id: CompanyId,
    #[serde(default)]
    pub lines: Vec<JournalLine>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JournalLine {
    #[serde(default)]
    pub product_id: Option<ProductId>,
    pub account_id: AccountId,
    #[serde(default)]
    pub valuation_area_id: Option<ValuationAreaId>,
    #[serde(default)]
    pub debit: f64,
    #[serde(default)]
    pub credit: f64,
    #[serde(default)]
    pub quantity: f64,
    #[serde(default = "unit_factor")]
    pub uom_factor: f64,
    #[serde(default = "unit_factor")]
    pub product_uom_factor: f64,
}

/// One ledger entry per journal line carrying a product. Lines without a
/// product (taxes, counterparts) have no stock dimension and are skipped.
pub fn flatten_moves(moves: &[JournalMove]) -> Vec<LedgerEntry> {
    let mut entries = Vec::new();
    let mut skipped = 0usize;

    for journal_move in moves {
        for line in &journal_move.lines {
            let Some(product) = line.product_id else {
                skipped += 1;
                continue;
            };

            entries.push(LedgerEntry {
                product,
                valuation_area: line.valuation_area_id,
                account: line.account_id,
                company: journal_move.company_id,
                move_type: journal_move.move_type,
                debit: line.debit,
                credit: line.credit,
                quantity: line.quantity,
                uom_factor: line.uom_factor,
                template_uom_factor: line.product_uom_factor,
                date: journal_move.date,
                status: journal_move.state,
            });
        }
    }

    debug!(
        "Flattened {} journal moves into {} ledger entries ({} lines without product)",
        moves.len(),
        entries.len(),
        skipped
    );

    entries
}

pub fn parse_journal_json(json: &str) -> Result<Vec<LedgerEntry>> {
    let moves: Vec<JournalMove> = serde_json::from_str(json)?;
    Ok(flatten_moves(&moves))
}

pub fn load_journal_file(path: impl AsRef<Path>) -> Result<Vec<LedgerEntry>> {
    let json = std::fs::read_to_string(path)?;
    parse_journal_json(&json)
}
