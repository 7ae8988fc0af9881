use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::datetime::{add_days, shift_months, shift_years};
use crate::error::CalendarError;

/// How many cells a calendar view shows and how wide each one is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViewGranularity {
    Day,
    FiveDays,
    Week,
    Month,
    Year,
    Schedule,
}

/// Distance covered by one previous/next step in a view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Period {
    Days(i64),
    Months(i32),
    Years(i32),
}

impl Period {
    pub fn apply(self, date: NaiveDate, steps: i64) -> NaiveDate {
        match self {
            Period::Days(n) => add_days(date, n * steps),
            Period::Months(n) => shift_months(date, n.saturating_mul(steps as i32)),
            Period::Years(n) => shift_years(date, n.saturating_mul(steps as i32)),
        }
    }
}

impl ViewGranularity {
    pub const ALL: [ViewGranularity; 6] = [
        ViewGranularity::Day,
        ViewGranularity::FiveDays,
        ViewGranularity::Week,
        ViewGranularity::Month,
        ViewGranularity::Year,
        ViewGranularity::Schedule,
    ];

    pub fn bucket_count(self) -> usize {
        match self {
            ViewGranularity::Day => 1,
            ViewGranularity::FiveDays => 5,
            ViewGranularity::Week => 7,
            ViewGranularity::Month => 42,
            ViewGranularity::Year => 12,
            ViewGranularity::Schedule => 4,
        }
    }

    /// Year buckets are whole months; every other view buckets by day.
    pub fn buckets_by_month(self) -> bool {
        matches!(self, ViewGranularity::Year)
    }

    pub fn period(self) -> Period {
        match self {
            ViewGranularity::Day => Period::Days(1),
            ViewGranularity::FiveDays => Period::Days(5),
            ViewGranularity::Week => Period::Days(7),
            ViewGranularity::Month => Period::Months(1),
            ViewGranularity::Year => Period::Years(1),
            ViewGranularity::Schedule => Period::Days(4),
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            ViewGranularity::Day => "Day",
            ViewGranularity::FiveDays => "5 days",
            ViewGranularity::Week => "Week",
            ViewGranularity::Month => "Month",
            ViewGranularity::Year => "Year",
            ViewGranularity::Schedule => "Schedule",
        }
    }
}

impl fmt::Display for ViewGranularity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for ViewGranularity {
    type Err = CalendarError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace(['-', '_'], " ");
        match normalized.as_str() {
            "day" => Ok(ViewGranularity::Day),
            "5 days" | "five days" | "fivedays" | "5days" => Ok(ViewGranularity::FiveDays),
            "week" => Ok(ViewGranularity::Week),
            "month" => Ok(ViewGranularity::Month),
            "year" => Ok(ViewGranularity::Year),
            "schedule" => Ok(ViewGranularity::Schedule),
            _ => Err(CalendarError::InvalidView(s.to_string())),
        }
    }
}
