use crate::aggregator::Movement;
use crate::schema::{DimensionKey, Period};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Cumulative position of a series at the start and end of a period.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct RunningBalance {
    pub quantity_initial: f64,
    pub quantity_final: f64,
    pub amount_initial: f64,
    pub amount_final: f64,
}

/// Current stock valuation for one dimension key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurrentValuation {
    pub id: i64,
    pub key: DimensionKey,
    pub movement: Movement,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewCurrentValuation {
    pub key: DimensionKey,
    pub movement: Movement,
}

/// Monthly valuation snapshot for one dimension key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoricalValuation {
    pub id: i64,
    pub key: DimensionKey,
    pub period: Period,
    /// Last day of `period`.
    pub date: NaiveDate,
    pub movement: Movement,
    pub balance: RunningBalance,
}

impl HistoricalValuation {
    pub fn year(&self) -> i32 {
        self.period.year()
    }

    pub fn month(&self) -> u32 {
        self.period.month()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewHistoricalValuation {
    pub key: DimensionKey,
    pub period: Period,
    pub movement: Movement,
    pub balance: RunningBalance,
}

impl NewHistoricalValuation {
    pub fn date(&self) -> NaiveDate {
        self.period.end_date()
    }
}

/// Borrowed view shared by stored and freshly computed history rows.
pub trait PeriodBalance {
    fn key(&self) -> &DimensionKey;
    fn period(&self) -> Period;
    fn movement(&self) -> &Movement;
    fn balance(&self) -> &RunningBalance;
}

impl PeriodBalance for HistoricalValuation {
    fn key(&self) -> &DimensionKey {
        &self.key
    }
    fn period(&self) -> Period {
        self.period
    }
    fn movement(&self) -> &Movement {
        &self.movement
    }
    fn balance(&self) -> &RunningBalance {
        &self.balance
    }
}

impl PeriodBalance for NewHistoricalValuation {
    fn key(&self) -> &DimensionKey {
        &self.key
    }
    fn period(&self) -> Period {
        self.period
    }
    fn movement(&self) -> &Movement {
        &self.movement
    }
    fn balance(&self) -> &RunningBalance {
        &self.balance
    }
}
