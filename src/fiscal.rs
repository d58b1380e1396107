use crate::error::{ReconcileError, Result};
use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

/// First month of the reporting fiscal year (September).
pub const FISCAL_START_MONTH: u32 = 9;

/// Day of September on/after which a run reports the entire just-closed
/// fiscal year instead of Q4.
pub const FULL_YEAR_CUTOFF_DAY: u32 = 20;

/// Returns the fiscal year a calendar date belongs to.
///
/// The fiscal year rolls over on September 1: a date in September or later
/// belongs to `calendar_year + 1`.
pub fn fiscal_year_of(date: NaiveDate) -> i32 {
    if date.month() >= FISCAL_START_MONTH {
        date.year() + 1
    } else {
        date.year()
    }
}

/// A reporting period: a fiscal quarter, or a whole fiscal year when
/// `quarter` is `None` (the September catch-up run).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FiscalPeriod {
    pub fiscal_year: i32,
    pub quarter: Option<u32>,
}

impl FiscalPeriod {
    /// Determines the reporting period for a run date.
    ///
    /// - Dec, Jan, Feb -> Q1 of the current fiscal year
    /// - Mar, Apr, May -> Q2
    /// - Jun, Jul, Aug -> Q3
    /// - Sep (before the 20th), Oct, Nov -> Q4 of the *previous* fiscal year
    /// - Sep on/after the 20th -> the entire previous fiscal year
    pub fn from_run_date(run_date: NaiveDate) -> Self {
        let current_fy = fiscal_year_of(run_date);
        let month = run_date.month();

        if month == FISCAL_START_MONTH && run_date.day() >= FULL_YEAR_CUTOFF_DAY {
            return Self {
                fiscal_year: current_fy - 1,
                quarter: None,
            };
        }

        let quarter = match month {
            12 | 1 | 2 => 1,
            3 | 4 | 5 => 2,
            6 | 7 | 8 => 3,
            _ => 4,
        };
        // Sep/Oct/Nov runs report Q4 of the year that just closed; the new
        // fiscal year has not accumulated a full quarter of data yet.
        let fiscal_year = if (9..=11).contains(&month) {
            current_fy - 1
        } else {
            current_fy
        };

        Self {
            fiscal_year,
            quarter: Some(quarter),
        }
    }

    /// Period label used in filenames and notifications, e.g. `FY2025_Q1`
    /// or `FY2025` for a full-year run.
    pub fn label(&self) -> String {
        match self.quarter {
            Some(q) => format!("FY{}_Q{}", self.fiscal_year, q),
            None => format!("FY{}", self.fiscal_year),
        }
    }

    /// Start and end dates of the period: the quarter bounds, or the whole
    /// fiscal year for a catch-up run.
    pub fn reporting_window(&self) -> Result<(NaiveDate, NaiveDate)> {
        match self.quarter {
            Some(q) => quarter_bounds(self.fiscal_year, q),
            None => Ok(fiscal_year_bounds(self.fiscal_year)),
        }
    }
}

/// Start and end dates of a fiscal year.
///
/// FY2025 runs from 2024-09-01 through 2025-08-31.
pub fn fiscal_year_bounds(fiscal_year: i32) -> (NaiveDate, NaiveDate) {
    let start = NaiveDate::from_ymd_opt(fiscal_year - 1, 9, 1).unwrap();
    let end = NaiveDate::from_ymd_opt(fiscal_year, 8, 31).unwrap();
    (start, end)
}

/// Start and end dates of a fiscal quarter.
///
/// Q2 ends on February 28 regardless of leap year; Q4 covers the whole
/// fiscal year so that cases carried over from earlier quarters are
/// captured in the final report of the year.
pub fn quarter_bounds(fiscal_year: i32, quarter: u32) -> Result<(NaiveDate, NaiveDate)> {
    let prior_year = fiscal_year - 1;
    match quarter {
        1 => Ok((
            NaiveDate::from_ymd_opt(prior_year, 9, 1).unwrap(),
            NaiveDate::from_ymd_opt(prior_year, 11, 30).unwrap(),
        )),
        2 => Ok((
            NaiveDate::from_ymd_opt(prior_year, 12, 1).unwrap(),
            NaiveDate::from_ymd_opt(fiscal_year, 2, 28).unwrap(),
        )),
        3 => Ok((
            NaiveDate::from_ymd_opt(fiscal_year, 3, 1).unwrap(),
            NaiveDate::from_ymd_opt(fiscal_year, 5, 31).unwrap(),
        )),
        4 => Ok(fiscal_year_bounds(fiscal_year)),
        other => Err(ReconcileError::InvalidQuarter(other)),
    }
}
