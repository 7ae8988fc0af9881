//! Six-week month grid.

use chrono::{DateTime, Datelike, NaiveDate};
use chrono_tz::Tz;
use serde::Serialize;

use crate::datetime::{local_midnight, normalize_day};

pub const WEEKS: usize = 6;
pub const DAYS_PER_WEEK: usize = 7;

/// Six rows of seven local midnights, Sunday first, covering a month plus
/// the neighbouring days needed to fill whole weeks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WeekMatrix {
    rows: [[DateTime<Tz>; DAYS_PER_WEEK]; WEEKS],
}

impl WeekMatrix {
    pub fn rows(&self) -> &[[DateTime<Tz>; DAYS_PER_WEEK]; WEEKS] {
        &self.rows
    }

    /// Row-major iteration over all 42 cells.
    pub fn iter(&self) -> impl Iterator<Item = &DateTime<Tz>> + '_ {
        self.rows.iter().flat_map(|row| row.iter())
    }

    pub fn days(&self) -> impl Iterator<Item = NaiveDate> + '_ {
        self.iter().map(|cell| cell.date_naive())
    }

    pub fn first(&self) -> &DateTime<Tz> {
        &self.rows[0][0]
    }

    pub fn last(&self) -> &DateTime<Tz> {
        &self.rows[WEEKS - 1][DAYS_PER_WEEK - 1]
    }

    /// Day 1 of the displayed month. Always in the first row.
    pub fn first_of_month(&self) -> NaiveDate {
        self.rows[0]
            .iter()
            .map(|cell| cell.date_naive())
            .find(|day| day.day() == 1)
            .unwrap_or_else(|| self.first().date_naive())
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.first().date_naive() <= date && date <= self.last().date_naive()
    }

    pub fn position(&self, date: NaiveDate) -> Option<(usize, usize)> {
        if !self.contains(date) {
            return None;
        }
        let offset = (date - self.first().date_naive()).num_days() as usize;
        Some((offset / DAYS_PER_WEEK, offset % DAYS_PER_WEEK))
    }

    pub fn timezone(&self) -> Tz {
        self.first().timezone()
    }
}

/// Builds the grid for the month containing `reference`.
///
/// Only the year, month and timezone of `reference` matter.
#[tracing::instrument(skip_all, fields(reference = %reference.date_naive()))]
pub fn build_week_matrix(reference: &DateTime<Tz>) -> WeekMatrix {
    build_for_month(&reference.timezone(), reference.year(), reference.month())
}

pub fn build_for_month(tz: &Tz, year: i32, month: u32) -> WeekMatrix {
    let offset = normalize_day(year, month, 1).weekday().num_days_from_sunday() as i64;
    let mut counter = -offset;

    let rows = std::array::from_fn(|_| {
        std::array::from_fn(|_| {
            counter += 1;
            local_midnight(tz, normalize_day(year, month, counter))
        })
    });

    WeekMatrix { rows }
}
