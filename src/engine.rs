use crate::aggregator::{aggregate_monthly, aggregate_totals, Movement};
use crate::balancer::{verify_running_balances, RunningBalancer};
use crate::error::Result;
use crate::ledger::NormalizedEntry;
use crate::model::{NewCurrentValuation, NewHistoricalValuation};
use crate::schema::{DimensionKey, Period};
use crate::utils::get_month_ends_in_period;
use crate::{DataOrigin, DenseHistory, MonthlyMovement};
use log::debug;
use std::collections::{BTreeMap, BTreeSet};

/// Turns sparse monthly buckets into a gapless series per dimension key.
#[derive(Debug, Default, Clone, Copy)]
pub struct Densifier;

impl Densifier {
    pub fn new() -> Self {
        Self
    }

    /// Every month between the earliest and latest populated period,
    /// inclusive. Empty input yields an empty calendar.
    pub fn calendar(
        &self,
        sparse: &BTreeMap<(DimensionKey, Period), Movement>,
    ) -> Result<Vec<Period>> {
        let mut periods = sparse.keys().map(|(_, period)| *period);
        let Some(first) = periods.next() else {
            return Ok(Vec::new());
        };
        let (min, max) = periods.fold((first, first), |(lo, hi), p| (lo.min(p), hi.max(p)));

        get_month_ends_in_period(min.end_date(), max.end_date())
            .into_iter()
            .map(Period::from_date)
            .collect()
    }

    /// Materializes a zero-valued bucket for every combination of the
    /// distinct products, valuation areas, accounts and companies seen in
    /// `sparse`, over the full calendar, that has no activity of its own.
    pub fn densify(
        &self,
        sparse: &BTreeMap<(DimensionKey, Period), Movement>,
    ) -> Result<DenseHistory> {
        let calendar = self.calendar(sparse)?;
        if calendar.is_empty() {
            return Ok(BTreeMap::new());
        }

        let mut products = BTreeSet::new();
        let mut areas = BTreeSet::new();
        let mut accounts = BTreeSet::new();
        let mut companies = BTreeSet::new();
        for (key, _) in sparse.keys() {
            products.insert(key.product);
            areas.insert(key.valuation_area);
            accounts.insert(key.account);
            companies.insert(key.company);
        }

        let mut dense: DenseHistory = BTreeMap::new();
        let mut synthesized = 0usize;

        for &product in &products {
            for &area in &areas {
                for &account in &accounts {
                    for &company in &companies {
                        let key = DimensionKey::new(product, area, account, company);
                        let series = dense.entry(key).or_default();

                        for &period in &calendar {
                            let point = match sparse.get(&(key, period)) {
                                Some(movement) => MonthlyMovement {
                                    movement: *movement,
                                    origin: DataOrigin::Ledger,
                                },
                                None => {
                                    synthesized += 1;
                                    MonthlyMovement {
                                        movement: Movement::default(),
                                        origin: DataOrigin::GapFill,
                                    }
                                }
                            };
                            series.insert(period, point);
                        }
                    }
                }
            }
        }

        debug!(
            "Densified {} populated buckets into {} series over {} months ({} gap rows)",
            sparse.len(),
            dense.len(),
            calendar.len(),
            synthesized
        );

        Ok(dense)
    }
}

/// One row per dimension key with its all-time movement.
pub fn process_current(entries: &[NormalizedEntry]) -> Vec<NewCurrentValuation> {
    aggregate_totals(entries)
        .into_iter()
        .map(|(key, movement)| NewCurrentValuation { key, movement })
        .collect()
}

/// Aggregate, densify and accumulate `entries` into history rows, then
/// check the running-balance law within `tolerance`.
pub fn process_history(
    entries: &[NormalizedEntry],
    tolerance: f64,
) -> Result<Vec<NewHistoricalValuation>> {
    let sparse = aggregate_monthly(entries);
    let dense = Densifier::new().densify(&sparse)?;
    let rows = RunningBalancer::new().accumulate(&dense);

    verify_running_balances(&rows, tolerance)?;

    Ok(rows)
}
