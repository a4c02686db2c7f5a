use crate::error::{Result, ValuationError};
use chrono::{Datelike, NaiveDate};

pub fn next_month_end(date: NaiveDate) -> Option<NaiveDate> {
    let (year, month) = if date.month() == 12 {
        (date.year() + 1, 1)
    } else {
        (date.year(), date.month() + 1)
    };

    last_day_of_month(year, month)
}

/// Last calendar day of `month`, or `None` when the month is out of range
/// or the date falls outside chrono's representable span.
pub fn last_day_of_month(year: i32, month: u32) -> Option<NaiveDate> {
    if !(1..=12).contains(&month) {
        return None;
    }
    let (next_year, next_month) = if month == 12 {
        (year + 1, 1)
    } else {
        (year, month + 1)
    };

    NaiveDate::from_ymd_opt(next_year, next_month, 1).and_then(|d| d.pred_opt())
}

pub fn month_end_for(date: NaiveDate) -> Result<NaiveDate> {
    last_day_of_month(date.year(), date.month()).ok_or_else(|| {
        ValuationError::DateError(format!("No month end representable for {}", date))
    })
}

/// Month ends falling inside `[start, end]`, ascending.
pub fn get_month_ends_in_period(start: NaiveDate, end: NaiveDate) -> Vec<NaiveDate> {
    let mut dates = Vec::new();

    let mut current = last_day_of_month(start.year(), start.month());
    while let Some(date) = current {
        if date > end {
            break;
        }
        if date >= start {
            dates.push(date);
        }
        current = next_month_end(date);
    }

    dates
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_next_month_end() {
        let date = NaiveDate::from_ymd_opt(2023, 1, 31).unwrap();
        let next = next_month_end(date).unwrap();
        assert_eq!(next, NaiveDate::from_ymd_opt(2023, 2, 28).unwrap());

        let date = NaiveDate::from_ymd_opt(2023, 12, 31).unwrap();
        let next = next_month_end(date).unwrap();
        assert_eq!(next, NaiveDate::from_ymd_opt(2024, 1, 31).unwrap());
    }

    #[test]
    fn test_last_day_of_month() {
        assert_eq!(
            last_day_of_month(2023, 2),
            NaiveDate::from_ymd_opt(2023, 2, 28)
        );
        assert_eq!(
            last_day_of_month(2024, 2),
            NaiveDate::from_ymd_opt(2024, 2, 29)
        );
        assert_eq!(
            last_day_of_month(2023, 4),
            NaiveDate::from_ymd_opt(2023, 4, 30)
        );
        assert_eq!(last_day_of_month(2023, 13), None);
        assert_eq!(last_day_of_month(2023, 0), None);
    }

    #[test]
    fn test_month_ends_in_period_spans_year_boundary() {
        let start = NaiveDate::from_ymd_opt(2022, 11, 15).unwrap();
        let end = NaiveDate::from_ymd_opt(2023, 2, 28).unwrap();
        let dates = get_month_ends_in_period(start, end);
        assert_eq!(
            dates,
            vec![
                NaiveDate::from_ymd_opt(2022, 11, 30).unwrap(),
                NaiveDate::from_ymd_opt(2022, 12, 31).unwrap(),
                NaiveDate::from_ymd_opt(2023, 1, 31).unwrap(),
                NaiveDate::from_ymd_opt(2023, 2, 28).unwrap(),
            ]
        );
    }

    #[test]
    fn test_month_ends_in_period_excludes_partial_last_month() {
        let start = NaiveDate::from_ymd_opt(2023, 1, 31).unwrap();
        let end = NaiveDate::from_ymd_opt(2023, 3, 15).unwrap();
        assert_eq!(get_month_ends_in_period(start, end).len(), 2);
    }
}
