use chrono::{DateTime, Duration, NaiveDate, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::datetime::date_in;
use crate::error::{CalendarError, CalendarResult};

/// A calendar entry. All-day events occupy one calendar day; timed events
/// carry a start and an end and may cross day boundaries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Event {
    AllDay {
        title: String,
        date: DateTime<Utc>,
    },
    Timed {
        title: String,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },
}

impl Event {
    pub fn all_day(title: impl Into<String>, date: DateTime<Utc>) -> Self {
        Self::AllDay {
            title: title.into(),
            date,
        }
    }

    pub fn timed(title: impl Into<String>, start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self::Timed {
            title: title.into(),
            start,
            end,
        }
    }

    pub fn title(&self) -> &str {
        match self {
            Self::AllDay { title, .. } | Self::Timed { title, .. } => title,
        }
    }

    pub fn is_all_day(&self) -> bool {
        matches!(self, Self::AllDay { .. })
    }

    /// The instant used for ordering and bucket matching.
    pub fn effective_date(&self) -> DateTime<Utc> {
        match self {
            Self::AllDay { date, .. } => *date,
            Self::Timed { start, .. } => *start,
        }
    }

    /// Calendar day of the effective date in `tz`.
    pub fn effective_day(&self, tz: &Tz) -> NaiveDate {
        date_in(tz, &self.effective_date())
    }

    /// Zero for all-day events. Not clamped to any bucket boundary, and
    /// negative when a timed event ends before it starts.
    pub fn duration(&self) -> Duration {
        match self {
            Self::AllDay { .. } => Duration::zero(),
            Self::Timed { start, end, .. } => *end - *start,
        }
    }
}

/// Event as supplied by a host application, before validation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawEvent {
    #[serde(default)]
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_all_day: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_date: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_date: Option<DateTime<Utc>>,
}

impl TryFrom<RawEvent> for Event {
    type Error = CalendarError;

    fn try_from(raw: RawEvent) -> CalendarResult<Self> {
        let RawEvent {
            title,
            is_all_day,
            date,
            start_date,
            end_date,
        } = raw;
        let has_range = start_date.is_some() || end_date.is_some();

        match (date, start_date, end_date) {
            (Some(date), None, None) => {
                if is_all_day == Some(false) {
                    return Err(CalendarError::invalid_event(
                        &title,
                        "isAllDay is false but only `date` is present",
                    ));
                }
                Ok(Self::AllDay { title, date })
            }
            (None, Some(start), Some(end)) => {
                if is_all_day == Some(true) {
                    return Err(CalendarError::invalid_event(
                        &title,
                        "isAllDay is true but `startDate`/`endDate` are present",
                    ));
                }
                Ok(Self::Timed { title, start, end })
            }
            (Some(_), _, _) if has_range => Err(CalendarError::invalid_event(
                &title,
                "both `date` and `startDate`/`endDate` are present",
            )),
            (None, None, None) => Err(CalendarError::invalid_event(
                &title,
                "neither `date` nor `startDate`/`endDate` is present",
            )),
            _ => Err(CalendarError::invalid_event(
                &title,
                "`startDate` and `endDate` must be given together",
            )),
        }
    }
}

impl From<&Event> for RawEvent {
    fn from(event: &Event) -> Self {
        match event {
            Event::AllDay { title, date } => Self {
                title: title.clone(),
                is_all_day: Some(true),
                date: Some(*date),
                ..Self::default()
            },
            Event::Timed { title, start, end } => Self {
                title: title.clone(),
                start_date: Some(*start),
                end_date: Some(*end),
                ..Self::default()
            },
        }
    }
}

/// Validates a whole batch. The first malformed entry rejects the batch.
pub fn validate_events(raw: &[RawEvent]) -> CalendarResult<Vec<Event>> {
    raw.iter().cloned().map(Event::try_from).collect()
}
