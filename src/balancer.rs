use crate::error::{Result, ValuationError};
use crate::model::{NewHistoricalValuation, PeriodBalance, RunningBalance};
use crate::schema::DimensionKey;
use crate::{DenseHistory, MonthlySeries};
use log::debug;
use rayon::prelude::*;
use std::collections::BTreeMap;

/// Derives initial and final balances per period as ordered prefix sums.
#[derive(Debug, Default, Clone, Copy)]
pub struct RunningBalancer;

impl RunningBalancer {
    pub fn new() -> Self {
        Self
    }

    /// Accumulates each series independently, in parallel across keys.
    /// Rows come back ordered by key, then period.
    pub fn accumulate(&self, dense: &DenseHistory) -> Vec<NewHistoricalValuation> {
        let series: Vec<(&DimensionKey, &MonthlySeries)> = dense.iter().collect();

        let rows: Vec<NewHistoricalValuation> = series
            .par_iter()
            .flat_map_iter(|(key, series)| self.accumulate_series(key, series))
            .collect();

        debug!(
            "Accumulated running balances for {} series ({} rows)",
            series.len(),
            rows.len()
        );

        rows
    }

    pub fn accumulate_series(
        &self,
        key: &DimensionKey,
        series: &MonthlySeries,
    ) -> Vec<NewHistoricalValuation> {
        let mut quantity_final = 0.0;
        let mut amount_final = 0.0;

        // BTreeMap iteration is already chronological.
        series
            .iter()
            .map(|(period, point)| {
                let quantity_initial = quantity_final;
                let amount_initial = amount_final;
                quantity_final = quantity_initial + point.movement.quantity;
                amount_final = amount_initial + point.movement.amount;

                NewHistoricalValuation {
                    key: *key,
                    period: *period,
                    movement: point.movement,
                    balance: RunningBalance {
                        quantity_initial,
                        quantity_final,
                        amount_initial,
                        amount_final,
                    },
                }
            })
            .collect()
    }

    /// Checks, per key in period order, that each period opens at the
    /// previous close (zero for the first) and closes at opening plus
    /// movement, for both quantity and amount.
    pub fn verify<R: PeriodBalance>(&self, rows: &[R], tolerance: f64) -> Result<()> {
        let mut by_key: BTreeMap<&DimensionKey, Vec<&R>> = BTreeMap::new();
        for row in rows {
            by_key.entry(row.key()).or_default().push(row);
        }

        for (key, mut series) in by_key {
            series.sort_by_key(|row| row.period());

            let mut prev_quantity = 0.0;
            let mut prev_amount = 0.0;
            for row in series {
                let balance = row.balance();
                let movement = row.movement();

                let checks = [
                    ("quantity_initial", balance.quantity_initial, prev_quantity),
                    ("amount_initial", balance.amount_initial, prev_amount),
                    (
                        "quantity_final",
                        balance.quantity_final,
                        balance.quantity_initial + movement.quantity,
                    ),
                    (
                        "amount_final",
                        balance.amount_final,
                        balance.amount_initial + movement.amount,
                    ),
                ];

                for (field, actual, expected) in checks {
                    if (actual - expected).abs() > tolerance {
                        return Err(ValuationError::RunningBalanceViolation {
                            key: key.to_string(),
                            period: row.period().to_string(),
                            details: format!("{} is {} but expected {}", field, actual, expected),
                        });
                    }
                }

                prev_quantity = balance.quantity_final;
                prev_amount = balance.amount_final;
            }
        }

        Ok(())
    }
}

pub fn verify_running_balances<R: PeriodBalance>(rows: &[R], tolerance: f64) -> Result<()> {
    RunningBalancer::new().verify(rows, tolerance)
}
