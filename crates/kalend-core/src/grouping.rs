//! Buckets events into the cells of a calendar view.

use std::collections::HashMap;

use chrono::{DateTime, Datelike, NaiveDate};
use chrono_tz::Tz;
use serde::Serialize;
use tracing::{debug, instrument};

use crate::datetime::{add_days, first_day_of_month, local_midnight, shift_months, start_of_week};
use crate::error::CalendarResult;
use crate::event::{Event, RawEvent, validate_events};
use crate::matrix::build_week_matrix;
use crate::view::ViewGranularity;

/// One displayed unit of a view and the events that fall on it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Bucket {
    pub anchor: DateTime<Tz>,
    pub all_day_events: Vec<Event>,
    pub timed_events: Vec<Event>,
}

impl Bucket {
    fn empty(anchor: DateTime<Tz>) -> Self {
        Self {
            anchor,
            all_day_events: Vec::new(),
            timed_events: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.all_day_events.len() + self.timed_events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// All-day events first, then timed events.
    pub fn events(&self) -> impl Iterator<Item = &Event> {
        self.all_day_events.iter().chain(self.timed_events.iter())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum BucketKey {
    Day(NaiveDate),
    Month(i32, u32),
}

impl BucketKey {
    fn of(day: NaiveDate, view: ViewGranularity) -> Self {
        if view.buckets_by_month() {
            BucketKey::Month(day.year(), day.month())
        } else {
            BucketKey::Day(day)
        }
    }
}

/// Anchor instants for `view`, in display order, independent of events.
pub fn bucket_anchors(view: ViewGranularity, reference: &DateTime<Tz>) -> Vec<DateTime<Tz>> {
    let tz = reference.timezone();
    let day = reference.date_naive();
    let count = view.bucket_count();

    match view {
        ViewGranularity::Month => build_week_matrix(reference).iter().cloned().collect(),
        ViewGranularity::Year => {
            let first = first_day_of_month(day);
            (0..count)
                .map(|i| local_midnight(&tz, shift_months(first, i as i32)))
                .collect()
        }
        ViewGranularity::Week => {
            let sunday = start_of_week(day);
            (0..count)
                .map(|i| local_midnight(&tz, add_days(sunday, i as i64)))
                .collect()
        }
        ViewGranularity::Day | ViewGranularity::FiveDays | ViewGranularity::Schedule => (0..count)
            .map(|i| local_midnight(&tz, add_days(day, i as i64)))
            .collect(),
    }
}

/// Groups `events` into the buckets of `view` around `reference`.
///
/// Events are ordered by calendar day (stable, so same-day events keep
/// their input order). Events outside the displayed range are dropped.
#[instrument(skip(events, reference), fields(events = events.len(), reference = %reference.date_naive()))]
pub fn group_events(events: &[Event], view: ViewGranularity, reference: &DateTime<Tz>) -> Vec<Bucket> {
    let tz = reference.timezone();
    let mut buckets: Vec<Bucket> = bucket_anchors(view, reference)
        .into_iter()
        .map(Bucket::empty)
        .collect();

    let index: HashMap<BucketKey, usize> = buckets
        .iter()
        .enumerate()
        .map(|(idx, bucket)| (BucketKey::of(bucket.anchor.date_naive(), view), idx))
        .collect();

    let mut sorted: Vec<(NaiveDate, &Event)> =
        events.iter().map(|event| (event.effective_day(&tz), event)).collect();
    sorted.sort_by_key(|(day, _)| *day);

    let mut excluded = 0usize;
    for (day, event) in sorted {
        let Some(&idx) = index.get(&BucketKey::of(day, view)) else {
            excluded += 1;
            continue;
        };
        let bucket = &mut buckets[idx];
        if event.is_all_day() {
            bucket.all_day_events.push(event.clone());
        } else {
            bucket.timed_events.push(event.clone());
        }
    }

    debug!(
        %view,
        buckets = buckets.len(),
        placed = events.len() - excluded,
        excluded,
        "grouped events"
    );
    buckets
}

/// Validates host-shaped events, then groups them. A single malformed
/// event rejects the whole batch.
pub fn group_raw_events(
    raw: &[RawEvent],
    view: ViewGranularity,
    reference: &DateTime<Tz>,
) -> CalendarResult<Vec<Bucket>> {
    let events = validate_events(raw)?;
    Ok(group_events(&events, view, reference))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct GroupingSummary {
    pub buckets: usize,
    pub placed: usize,
    pub excluded: usize,
}

pub fn summarize(buckets: &[Bucket], input_len: usize) -> GroupingSummary {
    let placed = buckets.iter().map(Bucket::len).sum();
    GroupingSummary {
        buckets: buckets.len(),
        placed,
        excluded: input_len.saturating_sub(placed),
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;

    fn utc(raw: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(raw)
            .expect("valid rfc3339")
            .with_timezone(&Utc)
    }

    fn ny_midnight(y: i32, m: u32, d: u32) -> DateTime<Tz> {
        local_midnight(
            &chrono_tz::America::New_York,
            NaiveDate::from_ymd_opt(y, m, d).expect("date"),
        )
    }

    fn titles(events: &[Event]) -> Vec<&str> {
        events.iter().map(Event::title).collect()
    }

    fn sample_events() -> Vec<Event> {
        vec![
            Event::all_day("Fast", utc("2024-01-15T05:00:00Z")),
            Event::timed("Dentist appointment", utc("2024-01-15T05:00:00Z"), utc("2024-01-15T06:00:00Z")),
            Event::timed("Team meeting", utc("2024-01-17T05:00:00Z"), utc("2024-01-17T05:15:00Z")),
            Event::timed("Lunch with Sarah", utc("2024-01-17T08:00:00Z"), utc("2024-01-17T08:45:00Z")),
            Event::timed("Presentation rehearsal", utc("2024-01-18T05:00:00Z"), utc("2024-01-18T06:45:00Z")),
            Event::timed("Call with client", utc("2024-01-19T05:00:00Z"), utc("2024-01-19T05:30:00Z")),
            Event::timed("Yoga class", utc("2024-01-20T05:00:00Z"), utc("2024-01-20T05:00:00Z")),
            Event::timed("Grocery shopping", utc("2024-01-21T05:00:00Z"), utc("2024-01-21T05:30:00Z")),
            Event::timed("Some stuff", utc("2024-02-20T05:00:00Z"), utc("2024-02-20T05:45:00Z")),
        ]
    }

    #[test]
    fn day_view_keeps_only_reference_day() {
        let buckets = group_events(&sample_events(), ViewGranularity::Day, &ny_midnight(2024, 1, 17));

        assert_eq!(buckets.len(), 1);
        assert_eq!(
            buckets[0].anchor.with_timezone(&Utc).to_rfc3339(),
            "2024-01-17T05:00:00+00:00"
        );
        assert!(buckets[0].all_day_events.is_empty());
        assert_eq!(titles(&buckets[0].timed_events), vec!["Team meeting", "Lunch with Sarah"]);
    }

    #[test]
    fn week_view_starts_on_sunday_and_splits_all_day() {
        let buckets = group_events(&sample_events(), ViewGranularity::Week, &ny_midnight(2024, 1, 17));

        assert_eq!(buckets.len(), 7);
        assert_eq!(buckets[0].anchor.date_naive(), NaiveDate::from_ymd_opt(2024, 1, 14).expect("date"));
        assert_eq!(titles(&buckets[1].all_day_events), vec!["Fast"]);
        assert_eq!(titles(&buckets[1].timed_events), vec!["Dentist appointment"]);
        assert_eq!(titles(&buckets[6].timed_events), vec!["Yoga class"]);
    }

    #[test]
    fn five_day_and_schedule_views_start_at_reference() {
        let reference = ny_midnight(2024, 1, 17);
        let five = group_events(&sample_events(), ViewGranularity::FiveDays, &reference);
        assert_eq!(five.len(), 5);
        assert_eq!(five[0].anchor, reference);
        assert_eq!(titles(&five[4].timed_events), vec!["Grocery shopping"]);

        let schedule = group_events(&sample_events(), ViewGranularity::Schedule, &reference);
        assert_eq!(schedule.len(), 4);
        assert_eq!(titles(&schedule[3].timed_events), vec!["Yoga class"]);
    }

    #[test]
    fn month_view_reuses_matrix_anchors() {
        let reference = ny_midnight(2024, 1, 17);
        let buckets = group_events(&sample_events(), ViewGranularity::Month, &reference);
        let matrix = build_week_matrix(&reference);

        assert_eq!(buckets.len(), 42);
        for (bucket, cell) in buckets.iter().zip(matrix.iter()) {
            assert_eq!(&bucket.anchor, cell);
        }
        // 2024-02-20 is past the last cell (2024-02-10).
        let placed: usize = buckets.iter().map(Bucket::len).sum();
        assert_eq!(placed, sample_events().len() - 1);
    }

    #[test]
    fn year_view_buckets_by_month() {
        let reference = ny_midnight(2024, 1, 17);
        let buckets = group_events(&sample_events(), ViewGranularity::Year, &reference);

        assert_eq!(buckets.len(), 12);
        assert_eq!(buckets[0].anchor.date_naive(), NaiveDate::from_ymd_opt(2024, 1, 1).expect("date"));
        assert_eq!(buckets[3].anchor.with_timezone(&Utc).to_rfc3339(), "2024-04-01T04:00:00+00:00");
        assert_eq!(buckets[0].len(), 8);
        assert_eq!(titles(&buckets[1].timed_events), vec!["Some stuff"]);
    }

    #[test]
    fn empty_input_still_yields_every_bucket() {
        let reference = ny_midnight(2024, 6, 2);
        for view in ViewGranularity::ALL {
            let buckets = group_events(&[], view, &reference);
            assert_eq!(buckets.len(), view.bucket_count());
            assert!(buckets.iter().all(Bucket::is_empty));
        }
    }

    #[test]
    fn same_day_events_keep_input_order() {
        let events = vec![
            Event::timed("late", utc("2024-01-17T20:00:00Z"), utc("2024-01-17T21:00:00Z")),
            Event::timed("early", utc("2024-01-17T06:00:00Z"), utc("2024-01-17T07:00:00Z")),
            Event::timed("before", utc("2024-01-16T06:00:00Z"), utc("2024-01-16T07:00:00Z")),
        ];
        let buckets = group_events(&events, ViewGranularity::FiveDays, &ny_midnight(2024, 1, 16));
        assert_eq!(titles(&buckets[0].timed_events), vec!["before"]);
        assert_eq!(titles(&buckets[1].timed_events), vec!["late", "early"]);
    }

    #[test]
    fn raw_batch_with_malformed_event_is_rejected() {
        let raw = vec![
            RawEvent::from(&Event::all_day("ok", utc("2024-01-15T05:00:00Z"))),
            RawEvent {
                title: "broken".to_string(),
                ..RawEvent::default()
            },
        ];
        let err = group_raw_events(&raw, ViewGranularity::Week, &ny_midnight(2024, 1, 17))
            .expect_err("batch must be rejected");
        assert!(err.to_string().contains("broken"));
    }

    #[test]
    fn summary_counts_excluded_events() {
        let events = sample_events();
        let buckets = group_events(&events, ViewGranularity::Day, &ny_midnight(2024, 1, 17));
        let summary = summarize(&buckets, events.len());
        assert_eq!(summary.placed, 2);
        assert_eq!(summary.excluded, events.len() - 2);
    }
}
