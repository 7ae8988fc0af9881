use std::fs;
use std::path::PathBuf;

use anyhow::{
  Context,
  anyhow
};
use chrono::{
  DateTime,
  Datelike,
  LocalResult,
  NaiveDate,
  NaiveDateTime,
  NaiveTime,
  TimeDelta,
  TimeZone,
  Utc
};
use chrono_tz::Tz;
use regex::Regex;
use serde::Deserialize;

const TIMEZONE_CONFIG_FILE: &str =
  "kalend-time.toml";
const TIMEZONE_ENV_VAR: &str =
  "KALEND_TIMEZONE";
const TIMEZONE_CONFIG_ENV_VAR: &str =
  "KALEND_TIME_CONFIG";
const DEFAULT_TIMEZONE: &str = "UTC";

#[derive(Debug, Deserialize)]
struct TimezoneConfig {
  timezone: Option<String>,
  time:     Option<TimezoneSection>
}

#[derive(Debug, Deserialize)]
struct TimezoneSection {
  timezone: Option<String>
}

/// Resolves the display timezone.
///
/// Precedence: the explicit value (command line or rc file), then
/// `KALEND_TIMEZONE`, then `kalend-time.toml`, then UTC. Invalid ids
/// are logged and skipped.
pub fn resolve_timezone(
  explicit: Option<&str>
) -> Tz {
  if let Some(raw) = explicit
    && let Some(tz) =
      parse_timezone(raw, "explicit")
  {
    return tz;
  }

  if let Ok(raw) =
    std::env::var(TIMEZONE_ENV_VAR)
    && let Some(tz) = parse_timezone(
      &raw,
      TIMEZONE_ENV_VAR
    )
  {
    return tz;
  }

  if let Some(path) =
    timezone_config_path()
    && let Some(tz) =
      load_timezone_from_file(&path)
  {
    return tz;
  }

  parse_timezone(
    DEFAULT_TIMEZONE,
    "DEFAULT_TIMEZONE"
  )
  .unwrap_or(chrono_tz::UTC)
}

fn timezone_config_path()
-> Option<PathBuf> {
  if let Ok(raw) = std::env::var(
    TIMEZONE_CONFIG_ENV_VAR
  ) {
    let trimmed = raw.trim();
    if !trimmed.is_empty() {
      return Some(PathBuf::from(
        trimmed
      ));
    }
  }

  std::env::current_dir().ok().map(
    |dir| {
      dir.join(TIMEZONE_CONFIG_FILE)
    }
  )
}

fn load_timezone_from_file(
  path: &PathBuf
) -> Option<Tz> {
  if !path.exists() {
    tracing::debug!(
      file = %path.display(),
      "timezone config file not found"
    );
    return None;
  }

  let raw = match fs::read_to_string(
    path
  ) {
    | Ok(raw) => raw,
    | Err(err) => {
      tracing::error!(
        file = %path.display(),
        error = %err,
        "failed reading timezone config file"
      );
      return None;
    }
  };

  let parsed = match toml::from_str::<
    TimezoneConfig
  >(&raw)
  {
    | Ok(parsed) => parsed,
    | Err(err) => {
      tracing::error!(
        file = %path.display(),
        error = %err,
        "failed parsing timezone config file"
      );
      return None;
    }
  };

  let timezone =
    parsed.timezone.or_else(|| {
      parsed.time.and_then(|section| {
        section.timezone
      })
    });
  let Some(timezone) = timezone else {
    tracing::warn!(
      file = %path.display(),
      "timezone config had no timezone field"
    );
    return None;
  };

  parse_timezone(
    timezone.as_str(),
    &format!("file:{}", path.display())
  )
}

fn parse_timezone(
  raw: &str,
  source: &str
) -> Option<Tz> {
  let trimmed = raw.trim();
  if trimmed.is_empty() {
    tracing::warn!(
      source,
      "timezone source was empty"
    );
    return None;
  }

  match trimmed.parse::<Tz>() {
    | Ok(tz) => {
      tracing::debug!(
        source,
        timezone = %trimmed,
        "configured display timezone"
      );
      Some(tz)
    }
    | Err(err) => {
      tracing::error!(
        source,
        timezone = %trimmed,
        error = %err,
        "failed to parse timezone id"
      );
      None
    }
  }
}

/// Midnight of `date` in `tz`.
///
/// An ambiguous midnight resolves to the earlier instant. A midnight
/// skipped by a DST gap resolves to the first valid hour of the day.
#[must_use]
pub fn local_midnight(
  tz: &Tz,
  date: NaiveDate
) -> DateTime<Tz> {
  for hour in 0..=3 {
    let Some(naive) =
      date.and_hms_opt(hour, 0, 0)
    else {
      continue;
    };
    match tz.from_local_datetime(&naive)
    {
      | LocalResult::Single(dt) => {
        return dt;
      }
      | LocalResult::Ambiguous(
        first,
        second
      ) => {
        return if first <= second {
          first
        } else {
          second
        };
      }
      | LocalResult::None => {
        tracing::trace!(
          %date,
          hour,
          "local time skipped by timezone transition"
        );
      }
    }
  }

  tz.from_utc_datetime(
    &date.and_time(NaiveTime::default())
  )
}

/// Calendar day of a UTC instant as seen from `tz`.
#[must_use]
pub fn date_in(
  tz: &Tz,
  instant: &DateTime<Utc>
) -> NaiveDate {
  instant.with_timezone(tz).date_naive()
}

/// `date` shifted by `days`, or `date`
/// itself when the result is out of
/// range.
pub fn add_days(
  date: NaiveDate,
  days: i64
) -> NaiveDate {
  checked_add_days(date, days)
    .unwrap_or(date)
}

pub fn checked_add_days(
  date: NaiveDate,
  days: i64
) -> Option<NaiveDate> {
  TimeDelta::try_days(days).and_then(
    |delta| {
      date.checked_add_signed(delta)
    }
  )
}

pub fn first_day_of_month(
  date: NaiveDate
) -> NaiveDate {
  date.with_day(1).unwrap_or(date)
}

pub fn days_in_month(
  year: i32,
  month: u32
) -> u32 {
  let (next_year, next_month) =
    if month >= 12 {
      (year.saturating_add(1), 1_u32)
    } else {
      (year, month + 1)
    };
  NaiveDate::from_ymd_opt(
    next_year, next_month, 1
  )
  .and_then(|first| first.pred_opt())
  .map(|last| last.day())
  .unwrap_or(31)
}

/// Moves `date` by whole months, clamping the day to the target month
/// length (Jan 31 + 1 month is Feb 29 in a leap year).
pub fn shift_months(
  date: NaiveDate,
  months: i32
) -> NaiveDate {
  let total = date.year() as i64 * 12
    + (date.month0() as i64)
    + months as i64;
  let year = total.div_euclid(12) as i32;
  let month =
    total.rem_euclid(12) as u32 + 1;
  let day = date
    .day()
    .min(days_in_month(year, month));
  NaiveDate::from_ymd_opt(
    year, month, day
  )
  .unwrap_or(date)
}

pub fn shift_years(
  date: NaiveDate,
  years: i32
) -> NaiveDate {
  shift_months(
    date,
    years.saturating_mul(12)
  )
}

/// Sunday on or before `date`.
pub fn start_of_week(
  date: NaiveDate
) -> NaiveDate {
  let offset = date
    .weekday()
    .num_days_from_sunday()
    as i64;
  add_days(date, -offset)
}

/// Converts a possibly out-of-range day-of-month counter into a real
/// date. Counter 0 is the last day of the previous month, negative
/// values keep walking back, and values past the month length roll
/// forward into the following months.
pub fn normalize_day(
  year: i32,
  month: u32,
  counter: i64
) -> NaiveDate {
  let first = NaiveDate::from_ymd_opt(
    year, month, 1
  )
  .unwrap_or(NaiveDate::MIN);
  add_days(first, counter - 1)
}

/// Stable string key of a day, as rendered in `data-cell-date`.
pub fn date_key(
  date: NaiveDate
) -> String {
  date.format("%Y-%m-%d").to_string()
}

#[tracing::instrument(skip(now, tz), fields(input = input))]
pub fn parse_date_expr(
  input: &str,
  now: DateTime<Utc>,
  tz: &Tz
) -> anyhow::Result<NaiveDate> {
  let token = input.trim();
  let lower =
    token.to_ascii_lowercase();
  let today = date_in(tz, &now);

  match lower.as_str() {
    | "today" | "now" => {
      return Ok(today);
    }
    | "tomorrow" => {
      return Ok(add_days(today, 1));
    }
    | "yesterday" => {
      return Ok(add_days(today, -1));
    }
    | _ => {}
  }

  if let Some(target_month) =
    parse_month_name(&lower)
  {
    let mut year = today.year();
    if target_month <= today.month() {
      year = year.saturating_add(1);
    }
    return NaiveDate::from_ymd_opt(
      year,
      target_month,
      1
    )
    .ok_or_else(|| {
      anyhow!(
        "invalid month/year \
         candidate"
      )
    });
  }

  let rel_re = Regex::new(
    r"^(?P<sign>[+-])(?P<num>\d+)(?P<unit>[dwm])$"
  )
  .map_err(|e| {
    anyhow!(
      "internal regex compile \
       failure: {e}"
    )
  })?;

  if let Some(caps) =
    rel_re.captures(&lower)
  {
    let negative = caps
      .name("sign")
      .is_some_and(|m| m.as_str() == "-");
    let num: i64 = caps
      .name("num")
      .map(|m| m.as_str())
      .ok_or_else(|| {
        anyhow!(
          "missing relative amount"
        )
      })?
      .parse()
      .context(
        "invalid relative number"
      )?;
    let num =
      if negative { -num } else { num };

    return match caps
      .name("unit")
      .map(|m| m.as_str())
    {
      | Some("d") => {
        checked_add_days(today, num)
          .ok_or_else(|| {
            anyhow!(
              "relative offset out of \
               range"
            )
          })
      }
      | Some("w") => {
        num
          .checked_mul(7)
          .and_then(|days| {
            checked_add_days(
              today, days
            )
          })
          .ok_or_else(|| {
            anyhow!(
              "relative offset out of \
               range"
            )
          })
      }
      | Some("m") => {
        let months = i32::try_from(num)
          .context(
            "relative month offset \
             out of range"
          )?;
        Ok(shift_months(today, months))
      }
      | other => {
        Err(anyhow!(
          "unknown relative unit: \
           {other:?}"
        ))
      }
    };
  }

  if let Ok(dt) =
    DateTime::parse_from_rfc3339(token)
  {
    return Ok(date_in(
      tz,
      &dt.with_timezone(&Utc)
    ));
  }

  if let Ok(date) =
    NaiveDate::parse_from_str(
      token, "%Y-%m-%d"
    )
  {
    return Ok(date);
  }

  if let Ok(ndt) =
    NaiveDateTime::parse_from_str(
      token,
      "%Y-%m-%dT%H:%M"
    )
  {
    return Ok(ndt.date());
  }

  Err(anyhow!(
    "unrecognized date expression: \
     {input}"
  ))
  .with_context(|| {
    "supported formats: \
     today/tomorrow/yesterday, month \
     names (e.g. march), +Nd/+Nw/+Nm, \
     RFC3339, YYYY-MM-DD, \
     YYYY-MM-DDTHH:MM"
  })
}

fn parse_month_name(
  token: &str
) -> Option<u32> {
  match token.trim() {
    | "january" | "jan" => Some(1),
    | "february" | "feb" => Some(2),
    | "march" | "mar" => Some(3),
    | "april" | "apr" => Some(4),
    | "may" => Some(5),
    | "june" | "jun" => Some(6),
    | "july" | "jul" => Some(7),
    | "august" | "aug" => Some(8),
    | "september" | "sep" | "sept" => {
      Some(9)
    }
    | "october" | "oct" => Some(10),
    | "november" | "nov" => Some(11),
    | "december" | "dec" => Some(12),
    | _ => None
  }
}
