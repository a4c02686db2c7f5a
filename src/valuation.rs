use crate::aggregator::{aggregate_monthly, aggregate_totals};
use crate::engine::{process_current, process_history};
use crate::error::{Result, ValuationError};
use crate::ledger::{LedgerQuery, LedgerReader, LedgerSource};
use crate::model::{CurrentValuation, HistoricalValuation};
use crate::schema::{
    AccountId, DimensionKey, Period, ProductId, ValuationAreaId, ValuationAreaScope,
    ValuationConfig,
};
use chrono::NaiveDate;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::store::{ValuationAreaRegistryTrait, ValuationStore};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RebuildSummary {
    pub entries_read: usize,
    pub current_rows: usize,
    pub history_rows: usize,
}

/// Entry points for keeping the valuation tables in line with the ledger.
pub struct ValuationEngine {
    config: ValuationConfig,
    ledger: Arc<dyn LedgerSource>,
    store: Arc<dyn ValuationStore>,
    areas: Arc<dyn ValuationAreaRegistryTrait>,
}

impl ValuationEngine {
    pub fn new(
        config: ValuationConfig,
        ledger: Arc<dyn LedgerSource>,
        store: Arc<dyn ValuationStore>,
        areas: Arc<dyn ValuationAreaRegistryTrait>,
    ) -> Self {
        Self {
            config,
            ledger,
            store,
            areas,
        }
    }

    pub fn config(&self) -> &ValuationConfig {
        &self.config
    }

    /// Dimension key in the configured company.
    pub fn key_for(
        &self,
        product: ProductId,
        valuation_area: Option<ValuationAreaId>,
        account: AccountId,
    ) -> DimensionKey {
        DimensionKey::new(product, valuation_area, account, self.config.company)
    }

    pub fn get_or_create_current(&self, key: &DimensionKey) -> Result<CurrentValuation> {
        if let Some(row) = self.store.find_current(key)? {
            return Ok(row);
        }

        match self.store.insert_current(key) {
            Ok(row) => Ok(row),
            Err(ValuationError::UniqueViolation(what)) => {
                warn!("Lost creation race for {}, re-reading", what);
                self.store.find_current(key)?.ok_or_else(|| {
                    ValuationError::Storage(format!("valuation for {} missing after conflict", key))
                })
            }
            Err(e) => Err(e),
        }
    }

    pub fn get_or_create_history(
        &self,
        key: &DimensionKey,
        date: NaiveDate,
    ) -> Result<HistoricalValuation> {
        let period = Period::from_date(date)?;
        if let Some(row) = self.store.find_history(key, period)? {
            return Ok(row);
        }

        match self.store.insert_history(key, period) {
            Ok(row) => Ok(row),
            Err(ValuationError::UniqueViolation(what)) => {
                warn!("Lost creation race for {}, re-reading", what);
                self.store.find_history(key, period)?.ok_or_else(|| {
                    ValuationError::Storage(format!(
                        "valuation history for {} {} missing after conflict",
                        key, period
                    ))
                })
            }
            Err(e) => Err(e),
        }
    }

    /// Refreshes the movement columns of `rows` from the ledger and writes
    /// them back. Rows without matching ledger activity are reset to zero.
    pub fn recompute_current(&self, rows: &[CurrentValuation]) -> Result<Vec<CurrentValuation>> {
        if rows.is_empty() {
            return Ok(Vec::new());
        }

        let query = self.scoped_query(rows.iter().map(|row| &row.key));
        let entries = self.reader()?.read(&query)?;
        let totals = aggregate_totals(&entries);

        let updated: Vec<CurrentValuation> = rows
            .iter()
            .map(|row| CurrentValuation {
                movement: totals.get(&row.key).copied().unwrap_or_default(),
                ..row.clone()
            })
            .collect();

        self.store.update_current_movements(&updated)?;
        debug!("Recomputed {} current valuations", updated.len());
        Ok(updated)
    }

    /// Refreshes the movement columns of `rows` for their own periods.
    ///
    /// Opening and closing balances are not touched, so they go stale
    /// whenever the movement changes; run [`rebuild_history`] to bring
    /// them back in line.
    ///
    /// [`rebuild_history`]: ValuationEngine::rebuild_history
    pub fn recompute_history(
        &self,
        rows: &[HistoricalValuation],
    ) -> Result<Vec<HistoricalValuation>> {
        if rows.is_empty() {
            return Ok(Vec::new());
        }

        let query = self
            .scoped_query(rows.iter().map(|row| &row.key))
            .with_periods(rows.iter().map(|row| row.period));
        let entries = self.reader()?.read(&query)?;
        let monthly = aggregate_monthly(&entries);

        let updated: Vec<HistoricalValuation> = rows
            .iter()
            .map(|row| HistoricalValuation {
                movement: monthly
                    .get(&(row.key, row.period))
                    .copied()
                    .unwrap_or_default(),
                date: row.period.end_date(),
                ..row.clone()
            })
            .collect();

        self.store.update_history_movements(&updated)?;
        debug!("Recomputed {} historical valuations", updated.len());
        Ok(updated)
    }

    pub fn rebuild_current(&self) -> Result<RebuildSummary> {
        self.config.validate()?;
        self.ensure_default_area()?;
        info!("Rebuilding current valuations");

        let entries = self
            .reader()?
            .read(&LedgerQuery::for_accounts(&self.config.value_bearing_accounts))?;
        let rows = process_current(&entries);
        let current_rows = self
            .store
            .replace_current(&self.config.value_bearing_accounts, &rows)?;

        info!("Current valuations rebuilt: {} rows", current_rows);
        Ok(RebuildSummary {
            entries_read: entries.len(),
            current_rows,
            history_rows: 0,
        })
    }

    pub fn rebuild_history(&self) -> Result<RebuildSummary> {
        self.config.validate()?;
        self.ensure_default_area()?;
        info!("Rebuilding valuation history");

        let entries = self
            .reader()?
            .read(&LedgerQuery::for_accounts(&self.config.value_bearing_accounts))?;
        let rows = process_history(&entries, self.config.balance_tolerance)?;
        let history_rows = self
            .store
            .replace_history(&self.config.value_bearing_accounts, &rows)?;

        info!("Valuation history rebuilt: {} rows", history_rows);
        Ok(RebuildSummary {
            entries_read: entries.len(),
            current_rows: 0,
            history_rows,
        })
    }

    /// Rebuilds both tables from one ledger read in a single transaction.
    pub fn rebuild_all(&self) -> Result<RebuildSummary> {
        self.config.validate()?;
        self.ensure_default_area()?;
        info!("Rebuilding current valuations and valuation history");

        let entries = self
            .reader()?
            .read(&LedgerQuery::for_accounts(&self.config.value_bearing_accounts))?;
        let current = process_current(&entries);
        let history = process_history(&entries, self.config.balance_tolerance)?;

        let (current_rows, history_rows) =
            self.store
                .replace_all(&self.config.value_bearing_accounts, &current, &history)?;

        info!(
            "Valuations rebuilt: {} current rows, {} history rows",
            current_rows, history_rows
        );
        Ok(RebuildSummary {
            entries_read: entries.len(),
            current_rows,
            history_rows,
        })
    }

    fn ensure_default_area(&self) -> Result<Option<ValuationAreaId>> {
        if self.config.valuation_area_scope != ValuationAreaScope::Company {
            return Ok(None);
        }

        let company = self.config.company;
        if let Some(area) = self.areas.default_area(company)? {
            return Ok(Some(area));
        }

        info!(
            "Creating company-wide valuation area for {} ({})",
            self.config.company_name, company
        );
        let area = self
            .areas
            .create_default_area(company, &self.config.company_name)
            .map_err(|e| ValuationError::DefaultValuationArea {
                company: company.0,
                details: e.to_string(),
            })?;
        Ok(Some(area))
    }

    /// Ledger query for the given keys, limited to value-bearing accounts.
    fn scoped_query<'a>(&self, keys: impl IntoIterator<Item = &'a DimensionKey>) -> LedgerQuery {
        LedgerQuery::scoped_to(keys).within_accounts(&self.config.value_bearing_accounts)
    }

    fn reader(&self) -> Result<LedgerReader<'_>> {
        let reader = LedgerReader::new(self.ledger.as_ref());
        if self.config.valuation_area_scope != ValuationAreaScope::Company {
            return Ok(reader);
        }

        Ok(match self.areas.default_area(self.config.company)? {
            Some(area) => reader.with_default_area(self.config.company, area),
            None => reader,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::InMemoryLedger;
    use crate::schema::{CompanyId, LedgerEntry, MoveType, PostingStatus};
    use crate::store::sqlite::SqliteValuationStore;
    use crate::store::{CurrentValuationRepositoryTrait, HistoricalValuationRepositoryTrait};

    fn entry(product: i64, date: (i32, u32, u32), debit: f64, quantity: f64) -> LedgerEntry {
        LedgerEntry {
            product: ProductId(product),
            valuation_area: None,
            account: AccountId(371),
            company: CompanyId(1),
            move_type: MoveType::InboundInvoice,
            debit,
            credit: 0.0,
            quantity,
            uom_factor: 1.0,
            template_uom_factor: 1.0,
            date: NaiveDate::from_ymd_opt(date.0, date.1, date.2).unwrap(),
            status: PostingStatus::Posted,
        }
    }

    fn engine_with(
        config: ValuationConfig,
        entries: Vec<LedgerEntry>,
    ) -> (ValuationEngine, Arc<InMemoryLedger>, Arc<SqliteValuationStore>) {
        let ledger = Arc::new(InMemoryLedger::new(entries));
        let store = Arc::new(SqliteValuationStore::open_in_memory().unwrap());
        let engine = ValuationEngine::new(config, ledger.clone(), store.clone(), store.clone());
        (engine, ledger, store)
    }

    fn config() -> ValuationConfig {
        ValuationConfig::new(CompanyId(1), "Main", [AccountId(371)])
    }

    #[test]
    fn test_get_or_create_is_idempotent() {
        let (engine, _, store) = engine_with(config(), vec![]);
        let key = engine.key_for(ProductId(1), None, AccountId(371));

        let first = engine.get_or_create_current(&key).unwrap();
        let second = engine.get_or_create_current(&key).unwrap();
        assert_eq!(first.id, second.id);
        assert!(first.movement.is_zero());
        assert_eq!(store.list_current().unwrap().len(), 1);

        let date = NaiveDate::from_ymd_opt(2023, 3, 14).unwrap();
        let h1 = engine.get_or_create_history(&key, date).unwrap();
        let h2 = engine.get_or_create_history(&key, date).unwrap();
        assert_eq!(h1.id, h2.id);
        assert_eq!(h1.date, NaiveDate::from_ymd_opt(2023, 3, 31).unwrap());
    }

    #[test]
    fn test_recompute_current_resets_rows_without_activity() {
        let (engine, _, _) = engine_with(config(), vec![entry(1, (2023, 1, 5), 100.0, 10.0)]);
        let active = engine
            .get_or_create_current(&engine.key_for(ProductId(1), None, AccountId(371)))
            .unwrap();
        let idle = engine
            .get_or_create_current(&engine.key_for(ProductId(2), None, AccountId(371)))
            .unwrap();

        let updated = engine.recompute_current(&[active, idle]).unwrap();
        assert_eq!(updated[0].movement.quantity, 10.0);
        assert_eq!(updated[0].movement.amount, 100.0);
        assert!(updated[1].movement.is_zero());
    }

    #[test]
    fn test_recompute_ignores_accounts_that_are_not_value_bearing() {
        let mut off_books = entry(1, (2023, 1, 5), 100.0, 10.0);
        off_books.account = AccountId(607);
        let (engine, _, _) = engine_with(
            config(),
            vec![off_books, entry(1, (2023, 1, 6), 30.0, 3.0)],
        );

        let foreign_key = engine.key_for(ProductId(1), None, AccountId(607));
        let stock_key = engine.key_for(ProductId(1), None, AccountId(371));
        let foreign = engine.get_or_create_current(&foreign_key).unwrap();
        let stock = engine.get_or_create_current(&stock_key).unwrap();

        let updated = engine.recompute_current(&[foreign, stock]).unwrap();
        assert!(updated[0].movement.is_zero());
        assert_eq!(updated[1].movement.quantity, 3.0);

        let date = NaiveDate::from_ymd_opt(2023, 1, 5).unwrap();
        let history = engine.get_or_create_history(&foreign_key, date).unwrap();
        let updated = engine.recompute_history(&[history]).unwrap();
        assert!(updated[0].movement.is_zero());
    }

    #[test]
    fn test_rebuild_rejects_empty_accounts_before_mutation() {
        let empty = ValuationConfig::new(CompanyId(1), "Main", []);
        let (engine, _, store) = engine_with(empty, vec![entry(1, (2023, 1, 5), 100.0, 10.0)]);
        store.insert_current(&engine.key_for(ProductId(9), None, AccountId(371))).unwrap();

        assert!(matches!(
            engine.rebuild_all(),
            Err(ValuationError::NoValueBearingAccounts)
        ));
        assert_eq!(store.list_current().unwrap().len(), 1);
        assert!(store.list_history().unwrap().is_empty());
    }

    #[test]
    fn test_company_scope_creates_default_area_and_attributes_entries() {
        let cfg = config().with_scope(ValuationAreaScope::Company);
        let (engine, _, store) = engine_with(cfg, vec![entry(1, (2023, 1, 5), 100.0, 10.0)]);

        engine.rebuild_history().unwrap();

        let area = store.default_area(CompanyId(1)).unwrap().unwrap();
        let rows = store.list_history().unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].key.valuation_area, Some(area));
    }

    #[test]
    fn test_rebuild_summary_counts() {
        let (engine, _, _) = engine_with(
            config(),
            vec![
                entry(1, (2023, 1, 5), 100.0, 10.0),
                entry(1, (2023, 3, 5), 100.0, 10.0),
            ],
        );
        let summary = engine.rebuild_all().unwrap();
        assert_eq!(summary.entries_read, 2);
        assert_eq!(summary.current_rows, 1);
        assert_eq!(summary.history_rows, 3);
    }
}
