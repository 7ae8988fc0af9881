//! Calendar controller: current view, reference date and grouped events.

use chrono::{DateTime, NaiveDate};
use chrono_tz::Tz;
use tracing::{debug, instrument};

use crate::datetime::local_midnight;
use crate::error::CalendarResult;
use crate::event::{Event, RawEvent, validate_events};
use crate::grouping::{Bucket, GroupingSummary, group_events, summarize};
use crate::view::ViewGranularity;

/// Buckets are regrouped eagerly on every state change, so reads are cheap.
#[derive(Debug, Clone)]
pub struct Calendar {
    tz: Tz,
    reference: NaiveDate,
    picker_date: NaiveDate,
    view: ViewGranularity,
    events: Vec<Event>,
    buckets: Vec<Bucket>,
}

impl Calendar {
    pub fn new(events: Vec<Event>, view: ViewGranularity, now: &DateTime<Tz>) -> Self {
        let today = now.date_naive();
        let mut calendar = Self {
            tz: now.timezone(),
            reference: today,
            picker_date: today,
            view,
            events,
            buckets: Vec::new(),
        };
        calendar.regroup();
        calendar
    }

    /// Builds a calendar from host-shaped events, rejecting the batch if
    /// any entry is malformed.
    pub fn from_raw(raw: &[RawEvent], view: ViewGranularity, now: &DateTime<Tz>) -> CalendarResult<Self> {
        Ok(Self::new(validate_events(raw)?, view, now))
    }

    pub fn view(&self) -> ViewGranularity {
        self.view
    }

    /// Local midnight of the reference day.
    pub fn reference(&self) -> DateTime<Tz> {
        local_midnight(&self.tz, self.reference)
    }

    pub fn picker_date(&self) -> NaiveDate {
        self.picker_date
    }

    pub fn events(&self) -> &[Event] {
        &self.events
    }

    pub fn buckets(&self) -> &[Bucket] {
        &self.buckets
    }

    pub fn summary(&self) -> GroupingSummary {
        summarize(&self.buckets, self.events.len())
    }

    pub fn set_view(&mut self, view: ViewGranularity) {
        if self.view != view {
            self.view = view;
            self.regroup();
        }
    }

    pub fn set_events(&mut self, events: Vec<Event>) {
        self.events = events;
        self.regroup();
    }

    /// On error the current events are kept.
    pub fn set_raw_events(&mut self, raw: &[RawEvent]) -> CalendarResult<()> {
        let events = validate_events(raw)?;
        self.set_events(events);
        Ok(())
    }

    pub fn next_period(&mut self) {
        self.step(1);
    }

    pub fn previous_period(&mut self) {
        self.step(-1);
    }

    /// Moves the reference and picker date back to the day of `now`.
    pub fn reset_to_today(&mut self, now: &DateTime<Tz>) {
        let today = now.with_timezone(&self.tz).date_naive();
        self.reference = today;
        self.picker_date = today;
        self.regroup();
    }

    /// Reference follows a date picked in the side date picker.
    pub fn select_date(&mut self, date: NaiveDate) {
        self.reference = date;
        self.picker_date = date;
        self.regroup();
    }

    #[instrument(skip(self), fields(view = %self.view))]
    fn step(&mut self, steps: i64) {
        let period = self.view.period();
        self.reference = period.apply(self.reference, steps);
        self.picker_date = period.apply(self.picker_date, steps);
        self.regroup();
    }

    fn regroup(&mut self) {
        self.buckets = group_events(&self.events, self.view, &self.reference());
        debug!(reference = %self.reference, buckets = self.buckets.len(), "calendar regrouped");
    }
}
