use crate::ledger::NormalizedEntry;
use crate::schema::{DimensionKey, MoveType, Period};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Multipliers applied to an entry's normalized quantity.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QuantitySigns {
    pub quantity_in: f64,
    pub quantity_out: f64,
    pub quantity: f64,
}

/// Sign table keyed by move type. Entries not linked to an invoice are
/// classified by which side of the ledger they hit.
pub fn quantity_signs(move_type: MoveType, debit: f64, credit: f64) -> QuantitySigns {
    match move_type {
        MoveType::InboundInvoice => QuantitySigns {
            quantity_in: 1.0,
            quantity_out: 0.0,
            quantity: 1.0,
        },
        MoveType::InboundRefund => QuantitySigns {
            quantity_in: -1.0,
            quantity_out: 0.0,
            quantity: -1.0,
        },
        MoveType::OutboundInvoice => QuantitySigns {
            quantity_in: 0.0,
            quantity_out: 1.0,
            quantity: -1.0,
        },
        MoveType::OutboundRefund => QuantitySigns {
            quantity_in: 0.0,
            quantity_out: -1.0,
            quantity: 1.0,
        },
        MoveType::Other => QuantitySigns {
            quantity_in: if debit > 0.0 { 1.0 } else { 0.0 },
            quantity_out: if credit > 0.0 { -1.0 } else { 0.0 },
            quantity: 1.0,
        },
    }
}

/// Summed activity of one bucket.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Movement {
    pub debit: f64,
    pub credit: f64,
    /// Always `debit - credit`.
    pub amount: f64,
    pub quantity_in: f64,
    pub quantity_out: f64,
    /// Net signed quantity.
    pub quantity: f64,
}

impl Movement {
    pub fn record(&mut self, entry: &NormalizedEntry) {
        let signs = quantity_signs(entry.move_type, entry.debit, entry.credit);

        self.debit += entry.debit;
        self.credit += entry.credit;
        self.amount += entry.debit - entry.credit;
        self.quantity_in += entry.quantity * signs.quantity_in;
        self.quantity_out += entry.quantity * signs.quantity_out;
        self.quantity += entry.quantity * signs.quantity;
    }

    pub fn is_zero(&self) -> bool {
        *self == Self::default()
    }
}

/// Collapses entries into one movement per dimension key.
pub fn aggregate_totals(entries: &[NormalizedEntry]) -> BTreeMap<DimensionKey, Movement> {
    let mut buckets: BTreeMap<DimensionKey, Movement> = BTreeMap::new();
    for entry in entries {
        buckets.entry(entry.key).or_default().record(entry);
    }
    buckets
}

/// Collapses entries into one movement per dimension key and month.
pub fn aggregate_monthly(
    entries: &[NormalizedEntry],
) -> BTreeMap<(DimensionKey, Period), Movement> {
    let mut buckets: BTreeMap<(DimensionKey, Period), Movement> = BTreeMap::new();
    for entry in entries {
        buckets
            .entry((entry.key, entry.period))
            .or_default()
            .record(entry);
    }
    buckets
}
