pub mod sqlite;

use crate::error::Result;
use crate::model::{
    CurrentValuation, HistoricalValuation, NewCurrentValuation, NewHistoricalValuation,
};
use crate::schema::{AccountId, CompanyId, DimensionKey, Period, ValuationAreaId};
use std::collections::BTreeSet;

/// Contract for the current valuation table (one row per dimension key).
pub trait CurrentValuationRepositoryTrait: Send + Sync {
    fn find_current(&self, key: &DimensionKey) -> Result<Option<CurrentValuation>>;
    /// Inserts a zero-valued row. Fails with
    /// [`ValuationError::UniqueViolation`](crate::ValuationError::UniqueViolation)
    /// when the key already exists.
    fn insert_current(&self, key: &DimensionKey) -> Result<CurrentValuation>;
    fn list_current(&self) -> Result<Vec<CurrentValuation>>;
    /// Overwrites the movement columns of existing rows, matched by id.
    fn update_current_movements(&self, rows: &[CurrentValuation]) -> Result<()>;
    /// Atomically deletes every row on `accounts` and inserts `rows`.
    fn replace_current(
        &self,
        accounts: &BTreeSet<AccountId>,
        rows: &[NewCurrentValuation],
    ) -> Result<usize>;
}

/// Contract for the monthly valuation history table.
pub trait HistoricalValuationRepositoryTrait: Send + Sync {
    fn find_history(&self, key: &DimensionKey, period: Period)
        -> Result<Option<HistoricalValuation>>;
    fn insert_history(&self, key: &DimensionKey, period: Period) -> Result<HistoricalValuation>;
    fn list_history(&self) -> Result<Vec<HistoricalValuation>>;
    /// Overwrites movement columns and the period date. Running balances
    /// are left as stored.
    fn update_history_movements(&self, rows: &[HistoricalValuation]) -> Result<()>;
    fn replace_history(
        &self,
        accounts: &BTreeSet<AccountId>,
        rows: &[NewHistoricalValuation],
    ) -> Result<usize>;
}

pub trait ValuationStore: CurrentValuationRepositoryTrait + HistoricalValuationRepositoryTrait {
    /// Rewrites both tables for `accounts` in a single transaction.
    fn replace_all(
        &self,
        accounts: &BTreeSet<AccountId>,
        current: &[NewCurrentValuation],
        history: &[NewHistoricalValuation],
    ) -> Result<(usize, usize)>;
}

/// Company-wide valuation areas.
pub trait ValuationAreaRegistryTrait: Send + Sync {
    fn default_area(&self, company: CompanyId) -> Result<Option<ValuationAreaId>>;
    fn create_default_area(&self, company: CompanyId, name: &str) -> Result<ValuationAreaId>;
}
