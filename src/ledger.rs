use crate::error::Result;
use crate::schema::{
    AccountId, CompanyId, DimensionKey, LedgerEntry, MoveType, Period, ProductId,
    ValuationAreaId,
};
use log::debug;
use parking_lot::RwLock;
use std::collections::{BTreeMap, BTreeSet};

/// Set-membership filter over posted ledger entries.
///
/// `accounts` is always applied; every other set is applied only when
/// present. A valuation-area set may contain `None` to match entries
/// posted without an area.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LedgerQuery {
    pub accounts: BTreeSet<AccountId>,
    pub products: Option<BTreeSet<ProductId>>,
    pub companies: Option<BTreeSet<CompanyId>>,
    pub valuation_areas: Option<BTreeSet<Option<ValuationAreaId>>>,
    pub periods: Option<BTreeSet<Period>>,
}

impl LedgerQuery {
    pub fn for_accounts(accounts: &BTreeSet<AccountId>) -> Self {
        Self {
            accounts: accounts.clone(),
            ..Self::default()
        }
    }

    /// Restricts the query to the products, areas, accounts and companies
    /// referenced by `keys`.
    pub fn scoped_to<'a>(keys: impl IntoIterator<Item = &'a DimensionKey>) -> Self {
        let mut query = Self {
            products: Some(BTreeSet::new()),
            companies: Some(BTreeSet::new()),
            valuation_areas: Some(BTreeSet::new()),
            ..Self::default()
        };

        for key in keys {
            query.accounts.insert(key.account);
            if let Some(products) = query.products.as_mut() {
                products.insert(key.product);
            }
            if let Some(companies) = query.companies.as_mut() {
                companies.insert(key.company);
            }
            if let Some(areas) = query.valuation_areas.as_mut() {
                areas.insert(key.valuation_area);
            }
        }

        query
    }

    /// Drops every account outside `allowed`.
    pub fn within_accounts(mut self, allowed: &BTreeSet<AccountId>) -> Self {
        self.accounts.retain(|account| allowed.contains(account));
        self
    }

    pub fn with_periods(mut self, periods: impl IntoIterator<Item = Period>) -> Self {
        self.periods = Some(periods.into_iter().collect());
        self
    }

    pub fn without_valuation_areas(&self) -> Self {
        Self {
            valuation_areas: None,
            ..self.clone()
        }
    }

    pub fn matches(&self, entry: &LedgerEntry) -> bool {
        if !entry.is_posted() || !self.accounts.contains(&entry.account) {
            return false;
        }
        if let Some(products) = &self.products {
            if !products.contains(&entry.product) {
                return false;
            }
        }
        if let Some(companies) = &self.companies {
            if !companies.contains(&entry.company) {
                return false;
            }
        }
        if let Some(areas) = &self.valuation_areas {
            if !areas.contains(&entry.valuation_area) {
                return false;
            }
        }
        if let Some(periods) = &self.periods {
            match Period::from_date(entry.date) {
                Ok(period) if periods.contains(&period) => {}
                _ => return false,
            }
        }
        true
    }
}

/// Read access to the posted journal. Implementations may return a superset
/// of the requested entries; [`LedgerReader`] re-applies the query.
pub trait LedgerSource: Send + Sync {
    fn fetch_entries(&self, query: &LedgerQuery) -> Result<Vec<LedgerEntry>>;
}

/// Appendable in-process journal.
#[derive(Debug, Default)]
pub struct InMemoryLedger {
    entries: RwLock<Vec<LedgerEntry>>,
}

impl InMemoryLedger {
    pub fn new(entries: Vec<LedgerEntry>) -> Self {
        Self {
            entries: RwLock::new(entries),
        }
    }

    pub fn push(&self, entry: LedgerEntry) {
        self.entries.write().push(entry);
    }

    pub fn extend(&self, entries: impl IntoIterator<Item = LedgerEntry>) {
        self.entries.write().extend(entries);
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

impl LedgerSource for InMemoryLedger {
    fn fetch_entries(&self, query: &LedgerQuery) -> Result<Vec<LedgerEntry>> {
        Ok(self
            .entries
            .read()
            .iter()
            .filter(|entry| query.matches(entry))
            .cloned()
            .collect())
    }
}

/// A ledger line reduced to what the aggregator needs.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedEntry {
    pub key: DimensionKey,
    pub period: Period,
    pub move_type: MoveType,
    pub debit: f64,
    pub credit: f64,
    /// Quantity expressed in the product's reference unit of measure.
    pub quantity: f64,
}

/// Converts a booked quantity into the reference unit of measure.
///
/// A zero or non-finite unit ratio yields zero instead of an error.
pub fn normalize_quantity(quantity: f64, uom_factor: f64, template_uom_factor: f64) -> f64 {
    if template_uom_factor == 0.0 {
        return 0.0;
    }
    let ratio = uom_factor / template_uom_factor;
    if ratio == 0.0 || !ratio.is_finite() {
        return 0.0;
    }
    quantity / ratio
}

pub struct LedgerReader<'a> {
    source: &'a dyn LedgerSource,
    default_areas: BTreeMap<CompanyId, ValuationAreaId>,
}

impl<'a> LedgerReader<'a> {
    pub fn new(source: &'a dyn LedgerSource) -> Self {
        Self {
            source,
            default_areas: BTreeMap::new(),
        }
    }

    /// Attributes every entry of `company` to `area`, as companies valuing
    /// stock company-wide do.
    pub fn with_default_area(mut self, company: CompanyId, area: ValuationAreaId) -> Self {
        self.default_areas.insert(company, area);
        self
    }

    pub fn read(&self, query: &LedgerQuery) -> Result<Vec<NormalizedEntry>> {
        // Area filtering has to see the reassigned areas, so the source is
        // asked without it.
        let fetch_query = if self.default_areas.is_empty() {
            query.clone()
        } else {
            query.without_valuation_areas()
        };

        let fetched = self.source.fetch_entries(&fetch_query)?;
        let fetched_count = fetched.len();

        let mut normalized = Vec::with_capacity(fetched_count);
        for mut entry in fetched {
            if let Some(area) = self.default_areas.get(&entry.company) {
                entry.valuation_area = Some(*area);
            }
            if !query.matches(&entry) {
                continue;
            }

            normalized.push(NormalizedEntry {
                key: entry.key(),
                period: Period::from_date(entry.date)?,
                move_type: entry.move_type,
                debit: entry.debit,
                credit: entry.credit,
                quantity: normalize_quantity(
                    entry.quantity,
                    entry.uom_factor,
                    entry.template_uom_factor,
                ),
            });
        }

        debug!(
            "Ledger reader kept {} of {} fetched entries",
            normalized.len(),
            fetched_count
        );

        Ok(normalized)
    }
}
