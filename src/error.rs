use thiserror::Error;

#[derive(Error, Debug)]
pub enum ValuationError {
    #[error("No value-bearing accounts configured: at least one stock valuation account is required")]
    NoValueBearingAccounts,

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Could not establish default valuation area for company {company}: {details}")]
    DefaultValuationArea { company: i64, details: String },

    #[error("Invalid period {year}-{month}: month must be between 1 and 12")]
    InvalidPeriod { year: i32, month: u32 },

    #[error("Ledger read failed: {0}")]
    Ledger(String),

    #[error("Unique constraint violated for {0}")]
    UniqueViolation(String),

    #[error("Running balance violation for {key} in {period}: {details}")]
    RunningBalanceViolation {
        key: String,
        period: String,
        details: String,
    },

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Date calculation error: {0}")]
    DateError(String),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ValuationError>;
