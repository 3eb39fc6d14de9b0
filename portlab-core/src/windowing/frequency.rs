//! Calendar rebalance frequencies and period boundaries.

use chrono::{Datelike, Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Calendar period that partitions the price history into rebalance windows.
///
/// Each period is the half-open range `[period_start, next_boundary)`. Weeks
/// start on Monday.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RebalanceFrequency {
    Weekly,
    Monthly,
    Quarterly,
    Annual,
}

impl Default for RebalanceFrequency {
    fn default() -> Self {
        Self::Monthly
    }
}

impl RebalanceFrequency {
    pub fn all() -> &'static [RebalanceFrequency] {
        &[Self::Weekly, Self::Monthly, Self::Quarterly, Self::Annual]
    }

    /// First calendar day of the period containing `date`.
    pub fn period_start(&self, date: NaiveDate) -> NaiveDate {
        match self {
            Self::Weekly => date - Duration::days(date.weekday().num_days_from_monday() as i64),
            Self::Monthly => first_of_month(date.year(), date.month()),
            Self::Quarterly => {
                let quarter_month = ((date.month() - 1) / 3) * 3 + 1;
                first_of_month(date.year(), quarter_month)
            }
            Self::Annual => first_of_month(date.year(), 1),
        }
    }

    /// First calendar day of the period after the one containing `date`.
    pub fn next_boundary(&self, date: NaiveDate) -> NaiveDate {
        let start = self.period_start(date);
        match self {
            Self::Weekly => start + Duration::days(7),
            Self::Monthly => add_months(start, 1),
            Self::Quarterly => add_months(start, 3),
            Self::Annual => add_months(start, 12),
        }
    }

    /// Short label, matching the aliases accepted by `FromStr`.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Weekly => "W",
            Self::Monthly => "M",
            Self::Quarterly => "Q",
            Self::Annual => "A",
        }
    }
}

fn first_of_month(year: i32, month: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, 1).unwrap_or(NaiveDate::MIN)
}

fn add_months(first: NaiveDate, months: u32) -> NaiveDate {
    let total = first.month0() + months;
    let year = first.year() + (total / 12) as i32;
    let month = total % 12 + 1;
    first_of_month(year, month)
}

impl fmt::Display for RebalanceFrequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Weekly => "weekly",
            Self::Monthly => "monthly",
            Self::Quarterly => "quarterly",
            Self::Annual => "annual",
        };
        f.write_str(name)
    }
}

impl FromStr for RebalanceFrequency {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "w" | "week" | "weekly" | "week-end" | "week_end" => Ok(Self::Weekly),
            "m" | "me" | "month" | "monthly" | "month-end" | "month_end" => Ok(Self::Monthly),
            "q" | "qe" | "quarter" | "quarterly" | "quarter-end" | "quarter_end" => {
                Ok(Self::Quarterly)
            }
            "a" | "y" | "ye" | "year" | "annual" | "yearly" | "year-end" | "year_end" => {
                Ok(Self::Annual)
            }
            other => Err(format!("unknown rebalance frequency '{other}'")),
        }
    }
}
