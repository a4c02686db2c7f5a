use crate::error::{Result, ValuationError};
use crate::utils::{last_day_of_month, month_end_for};
use chrono::{Datelike, NaiveDate};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

macro_rules! master_data_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, JsonSchema,
        )]
        #[serde(transparent)]
        pub struct $name(pub i64);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

master_data_id!(
    /// Product master record owned by the catalog.
    ProductId
);
master_data_id!(
    /// Valuation area (plant or warehouse scope). Optional on entries.
    ValuationAreaId
);
master_data_id!(
    /// General ledger account.
    AccountId
);
master_data_id!(CompanyId);

/// Identifies one independent balance series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct DimensionKey {
    pub product: ProductId,
    pub valuation_area: Option<ValuationAreaId>,
    pub account: AccountId,
    pub company: CompanyId,
}

impl DimensionKey {
    pub fn new(
        product: ProductId,
        valuation_area: Option<ValuationAreaId>,
        account: AccountId,
        company: CompanyId,
    ) -> Self {
        Self {
            product,
            valuation_area,
            account,
            company,
        }
    }
}

impl fmt::Display for DimensionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.valuation_area {
            Some(area) => write!(
                f,
                "product {}/area {}/account {}/company {}",
                self.product, area, self.account, self.company
            ),
            None => write!(
                f,
                "product {}/no area/account {}/company {}",
                self.product, self.account, self.company
            ),
        }
    }
}

/// A calendar month. Orders chronologically.
///
/// Only constructed through [`Period::new`] or [`Period::from_date`], so
/// every value has a representable month end. Deserialization goes through
/// the same check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawPeriod")]
pub struct Period {
    year: i32,
    month: u32,
}

#[derive(Deserialize)]
struct RawPeriod {
    year: i32,
    month: u32,
}

impl TryFrom<RawPeriod> for Period {
    type Error = ValuationError;

    fn try_from(raw: RawPeriod) -> Result<Self> {
        Period::new(raw.year, raw.month)
    }
}

impl Period {
    pub fn new(year: i32, month: u32) -> Result<Self> {
        if last_day_of_month(year, month).is_none() {
            return Err(ValuationError::InvalidPeriod { year, month });
        }
        Ok(Self { year, month })
    }

    pub fn from_date(date: NaiveDate) -> Result<Self> {
        let end = month_end_for(date)?;
        Ok(Self {
            year: end.year(),
            month: end.month(),
        })
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn month(&self) -> u32 {
        self.month
    }

    /// Last calendar day of the month.
    pub fn end_date(&self) -> NaiveDate {
        // Constructors reject months without a representable end date.
        last_day_of_month(self.year, self.month).unwrap_or(NaiveDate::MAX)
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MoveType {
    #[serde(rename = "in_invoice", alias = "inbound_invoice")]
    InboundInvoice,
    #[serde(rename = "in_refund", alias = "inbound_refund")]
    InboundRefund,
    #[serde(rename = "out_invoice", alias = "outbound_invoice")]
    OutboundInvoice,
    #[serde(rename = "out_refund", alias = "outbound_refund")]
    OutboundRefund,
    /// Journal entries, receipts and anything not linked to an invoice.
    #[serde(other, rename = "entry")]
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PostingStatus {
    Draft,
    Posted,
    #[serde(rename = "cancel", alias = "cancelled")]
    Cancelled,
}

fn unit_factor() -> f64 {
    1.0
}

/// A journal line as the ledger exposes it. Read-only to this crate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub product: ProductId,
    #[serde(default)]
    pub valuation_area: Option<ValuationAreaId>,
    pub account: AccountId,
    pub company: CompanyId,
    pub move_type: MoveType,
    #[serde(default)]
    pub debit: f64,
    #[serde(default)]
    pub credit: f64,
    #[serde(default)]
    pub quantity: f64,
    /// Factor of the unit of measure the line was booked in.
    #[serde(default = "unit_factor")]
    pub uom_factor: f64,
    /// Factor of the product's reference unit of measure.
    #[serde(default = "unit_factor")]
    pub template_uom_factor: f64,
    pub date: NaiveDate,
    pub status: PostingStatus,
}

impl LedgerEntry {
    pub fn key(&self) -> DimensionKey {
        DimensionKey::new(self.product, self.valuation_area, self.account, self.company)
    }

    pub fn is_posted(&self) -> bool {
        self.status == PostingStatus::Posted
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ValuationAreaScope {
    #[schemars(
        description = "Stock is valued in a single company-wide area. A default area named after the company is created before the first history rebuild and every ledger entry of the company is attributed to it."
    )]
    Company,

    #[default]
    #[schemars(
        description = "Stock is valued per valuation area exactly as posted on each ledger entry. Entries without an area form their own series."
    )]
    Area,
}

fn default_tolerance() -> f64 {
    1e-6
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ValuationConfig {
    #[schemars(
        description = "Company the engine runs for. Used for new dimension keys and for the company-wide default valuation area."
    )]
    pub company: CompanyId,

    #[schemars(description = "Display name of the company, used to name its default valuation area")]
    pub company_name: String,

    #[schemars(
        description = "Accounts flagged as stock valuation accounts. Only posted ledger entries on these accounts participate in valuation. Must not be empty."
    )]
    pub value_bearing_accounts: BTreeSet<AccountId>,

    #[serde(default)]
    #[schemars(description = "Whether stock is valued company-wide or per valuation area. Defaults to per area.")]
    pub valuation_area_scope: ValuationAreaScope,

    #[serde(default = "default_tolerance")]
    #[schemars(
        description = "Absolute tolerance used when verifying running balances after a history rebuild. Defaults to 1e-6."
    )]
    pub balance_tolerance: f64,
}

impl ValuationConfig {
    pub fn new(
        company: CompanyId,
        company_name: impl Into<String>,
        value_bearing_accounts: impl IntoIterator<Item = AccountId>,
    ) -> Self {
        Self {
            company,
            company_name: company_name.into(),
            value_bearing_accounts: value_bearing_accounts.into_iter().collect(),
            valuation_area_scope: ValuationAreaScope::default(),
            balance_tolerance: default_tolerance(),
        }
    }

    pub fn with_scope(mut self, scope: ValuationAreaScope) -> Self {
        self.valuation_area_scope = scope;
        self
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.value_bearing_accounts.is_empty() {
            return Err(ValuationError::NoValueBearingAccounts);
        }

        if !self.balance_tolerance.is_finite() || self.balance_tolerance < 0.0 {
            return Err(ValuationError::Configuration(format!(
                "balance_tolerance must be a non-negative number, got {}",
                self.balance_tolerance
            )));
        }

        if self.valuation_area_scope == ValuationAreaScope::Company
            && self.company_name.trim().is_empty()
        {
            return Err(ValuationError::Configuration(
                "company_name is required when valuing stock company-wide".to_string(),
            ));
        }

        Ok(())
    }

    pub fn generate_json_schema() -> schemars::schema::RootSchema {
        schemars::schema_for!(ValuationConfig)
    }

    pub fn schema_as_json() -> std::result::Result<String, serde_json::Error> {
        let schema = Self::generate_json_schema();
        serde_json::to_string_pretty(&schema)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_generation() {
        let schema_json = ValuationConfig::schema_as_json().unwrap();
        assert!(schema_json.contains("value_bearing_accounts"));
        assert!(schema_json.contains("valuation_area_scope"));
        assert!(schema_json.contains("balance_tolerance"));
    }

    #[test]
    fn test_config_from_json_applies_defaults() {
        let config = ValuationConfig::from_json(
            r#"{"company": 1, "company_name": "Main", "value_bearing_accounts": [301, 371]}"#,
        )
        .unwrap();
        assert_eq!(config.valuation_area_scope, ValuationAreaScope::Area);
        assert_eq!(config.value_bearing_accounts.len(), 2);
        assert!(config.balance_tolerance > 0.0);
    }

    #[test]
    fn test_config_rejects_empty_accounts() {
        let err = ValuationConfig::from_json(
            r#"{"company": 1, "company_name": "Main", "value_bearing_accounts": []}"#,
        )
        .unwrap_err();
        assert!(matches!(err, ValuationError::NoValueBearingAccounts));
    }

    #[test]
    fn test_company_scope_requires_name() {
        let config = ValuationConfig::new(CompanyId(1), " ", [AccountId(371)])
            .with_scope(ValuationAreaScope::Company);
        assert!(matches!(
            config.validate(),
            Err(ValuationError::Configuration(_))
        ));
    }

    #[test]
    fn test_period_ordering_and_end_date() {
        let dec = Period::new(2022, 12).unwrap();
        let jan = Period::new(2023, 1).unwrap();
        let feb = Period::from_date(NaiveDate::from_ymd_opt(2024, 2, 3).unwrap()).unwrap();
        assert!(dec < jan);
        assert!(jan < feb);
        assert_eq!(feb.end_date(), NaiveDate::from_ymd_opt(2024, 2, 29).unwrap());
        assert_eq!(jan.to_string(), "2023-01");
        assert!(matches!(
            Period::new(2023, 13),
            Err(ValuationError::InvalidPeriod { month: 13, .. })
        ));
    }

    #[test]
    fn test_period_deserialization_is_validated() {
        let period: Period = serde_json::from_str(r#"{"year": 2023, "month": 4}"#).unwrap();
        assert_eq!(period, Period::new(2023, 4).unwrap());
        assert_eq!(period.end_date(), NaiveDate::from_ymd_opt(2023, 4, 30).unwrap());

        assert!(serde_json::from_str::<Period>(r#"{"year": 2023, "month": 13}"#).is_err());
        assert!(serde_json::from_str::<Period>(r#"{"year": 2023, "month": 0}"#).is_err());
    }

    #[test]
    fn test_move_type_serde_names() {
        let parsed: Vec<MoveType> =
            serde_json::from_str(r#"["in_invoice", "out_refund", "entry", "in_receipt"]"#)
                .unwrap();
        assert_eq!(
            parsed,
            vec![
                MoveType::InboundInvoice,
                MoveType::OutboundRefund,
                MoveType::Other,
                MoveType::Other
            ]
        );
    }

    #[test]
    fn test_ledger_entry_defaults_uom_factors() {
        let entry: LedgerEntry = serde_json::from_str(
            r#"{"product": 7, "account": 371, "company": 1, "move_type": "in_invoice",
                "debit": 10.0, "quantity": 2.0, "date": "2023-05-14", "status": "posted"}"#,
        )
        .unwrap();
        assert_eq!(entry.uom_factor, 1.0);
        assert_eq!(entry.template_uom_factor, 1.0);
        assert_eq!(entry.valuation_area, None);
        assert!(entry.is_posted());
    }
}
