use std::io::{self, IsTerminal, Write};

use chrono_tz::Tz;
use unicode_width::UnicodeWidthStr;

use crate::cell_props::CellAttributes;
use crate::config::Config;
use crate::event::Event;
use crate::grouping::{Bucket, GroupingSummary};
use crate::navigator::{FocusResolution, KeyOutcome, NavKey};
use crate::view::ViewGranularity;

const WEEKDAY_HEADERS: [&str; 7] = ["Su", "Mo", "Tu", "We", "Th", "Fr", "Sa"];

#[derive(Debug, Clone)]
pub struct Renderer {
    color: bool,
}

impl Renderer {
    pub fn new(cfg: &Config) -> Self {
        Self {
            color: cfg.color_enabled() && io::stdout().is_terminal(),
        }
    }

    /// Renderer that never emits escape codes.
    pub fn plain() -> Self {
        Self { color: false }
    }

    #[tracing::instrument(skip(self, grid))]
    pub fn print_month(&self, label: &str, grid: &[Vec<CellAttributes>]) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();
        self.write_month(&mut out, label, grid)
    }

    pub fn write_month<W: Write>(&self, mut out: W, label: &str, grid: &[Vec<CellAttributes>]) -> anyhow::Result<()> {
        let row_width = WEEKDAY_HEADERS.len() * 3 - 1;
        let pad = row_width.saturating_sub(UnicodeWidthStr::width(label)) / 2;
        writeln!(out, "{}{}", " ".repeat(pad), label)?;
        writeln!(out, "{}", WEEKDAY_HEADERS.join(" "))?;

        for row in grid {
            let cells: Vec<String> = row.iter().map(|cell| self.day_cell(cell)).collect();
            writeln!(out, "{}", cells.join(" ").trim_end())?;
        }
        Ok(())
    }

    fn day_cell(&self, cell: &CellAttributes) -> String {
        if cell.hidden {
            return "  ".to_string();
        }
        let text = format!("{:>2}", cell.date_label);
        if cell.is_today {
            self.paint(&text, "7")
        } else if cell.is_selected {
            self.paint(&text, "1;4")
        } else if cell.is_outside_month {
            self.paint(&text, "2")
        } else {
            text
        }
    }

    #[tracing::instrument(skip(self, buckets, tz))]
    pub fn print_buckets(&self, view: ViewGranularity, buckets: &[Bucket], tz: &Tz) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();
        self.write_buckets(&mut out, view, buckets, tz)
    }

    pub fn write_buckets<W: Write>(
        &self,
        mut out: W,
        view: ViewGranularity,
        buckets: &[Bucket],
        tz: &Tz,
    ) -> anyhow::Result<()> {
        let anchor_format = if view.buckets_by_month() { "%B %Y" } else { "%a %Y-%m-%d" };
        let headers = vec![
            "Bucket".to_string(),
            "Time".to_string(),
            "Title".to_string(),
        ];

        let mut rows = Vec::new();
        for bucket in buckets {
            let anchor = self.paint(&bucket.anchor.format(anchor_format).to_string(), "33");
            if bucket.is_empty() {
                rows.push(vec![anchor, String::new(), self.paint("-", "2")]);
                continue;
            }
            for (idx, event) in bucket.events().enumerate() {
                let label = if idx == 0 { anchor.clone() } else { String::new() };
                rows.push(vec![label, event_time(event, tz), event.title().to_string()]);
            }
        }

        write_table(&mut out, headers, rows)
    }

    pub fn print_summary(&self, summary: &GroupingSummary) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();
        writeln!(
            out,
            "{} buckets, {} events placed, {} outside the view",
            summary.buckets, summary.placed, summary.excluded
        )?;
        Ok(())
    }

    pub fn print_nav_step(
        &self,
        key: NavKey,
        outcome: &KeyOutcome,
        resolution: FocusResolution,
        label: &str,
    ) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();
        writeln!(out, "{}", nav_step_line(key, outcome, resolution, label))?;
        Ok(())
    }

    fn paint(&self, text: &str, code: &str) -> String {
        if !self.color {
            return text.to_string();
        }
        format!("\x1b[{code}m{text}\x1b[0m")
    }
}

fn event_time(event: &Event, tz: &Tz) -> String {
    match event {
        Event::AllDay { .. } => "all day".to_string(),
        Event::Timed { start, end, .. } => format!(
            "{}-{}",
            start.with_timezone(tz).format("%H:%M"),
            end.with_timezone(tz).format("%H:%M")
        ),
    }
}

fn nav_step_line(key: NavKey, outcome: &KeyOutcome, resolution: FocusResolution, label: &str) -> String {
    let month = match outcome.month_request {
        Some(step) => format!(" [{step:?} month: {label}]"),
        None => String::new(),
    };
    let result = match resolution {
        FocusResolution::Applied(date) => format!("focus {date}"),
        FocusResolution::Abandoned(date) => format!("abandoned {date}"),
        FocusResolution::Idle => "idle".to_string(),
    };
    format!("{key:?}{month} -> {result}")
}

fn write_table<W: Write>(mut writer: W, headers: Vec<String>, rows: Vec<Vec<String>>) -> anyhow::Result<()> {
    let column_count = headers.len();
    let mut widths = vec![0usize; column_count];

    for (idx, header) in headers.iter().enumerate() {
        widths[idx] = widths[idx].max(UnicodeWidthStr::width(header.as_str()));
    }

    for row in &rows {
        for (idx, cell) in row.iter().enumerate() {
            widths[idx] = widths[idx].max(UnicodeWidthStr::width(strip_ansi(cell).as_str()));
        }
    }

    for idx in 0..column_count {
        write!(writer, "{:width$} ", headers[idx], width = widths[idx])?;
    }
    writeln!(writer)?;

    for width in &widths {
        write!(writer, "{:-<width$} ", "", width = *width)?;
    }
    writeln!(writer)?;

    for row in rows {
        for (idx, cell) in row.iter().enumerate() {
            let visible_width = UnicodeWidthStr::width(strip_ansi(cell).as_str());
            let padding = widths[idx].saturating_sub(visible_width);
            write!(writer, "{}{} ", cell, " ".repeat(padding))?;
        }
        writeln!(writer)?;
    }

    Ok(())
}

fn strip_ansi(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut escaped = false;

    for ch in s.chars() {
        if escaped {
            if ch == 'm' {
                escaped = false;
            }
            continue;
        }

        if ch == '\x1b' {
            escaped = true;
            continue;
        }

        out.push(ch);
    }

    out
}

#[cfg(test)]
mod tests {
    use chrono::{DateTime, NaiveDate, Utc};

    use super::*;
    use crate::datetime::local_midnight;
    use crate::grouping::group_events;
    use crate::navigator::{MemoryGrid, MonthStep};
    use crate::picker::DatePicker;

    fn utc(raw: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(raw)
            .expect("valid rfc3339")
            .with_timezone(&Utc)
    }

    #[test]
    fn month_grid_lines_up_under_weekday_headers() {
        let tz = chrono_tz::UTC;
        let day = local_midnight(&tz, NaiveDate::from_ymd_opt(2024, 1, 17).expect("date"));
        let picker: DatePicker<MemoryGrid> = DatePicker::new(&day, &day);

        let mut out = Vec::new();
        Renderer::plain()
            .write_month(&mut out, &picker.month_year_label(), &picker.grid_props(true))
            .expect("write");
        let text = String::from_utf8(out).expect("utf8");
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(lines[0].trim(), "January 2024");
        assert_eq!(lines[1], "Su Mo Tu We Th Fr Sa");
        assert_eq!(lines[2], "    1  2  3  4  5  6");
        assert_eq!(lines.len(), 8);
    }

    #[test]
    fn bucket_table_lists_events_under_their_anchor() {
        let tz = chrono_tz::America::New_York;
        let reference = local_midnight(&tz, NaiveDate::from_ymd_opt(2024, 1, 17).expect("date"));
        let events = vec![
            Event::all_day("Fast", utc("2024-01-17T05:00:00Z")),
            Event::timed("Team meeting", utc("2024-01-17T14:00:00Z"), utc("2024-01-17T14:15:00Z")),
        ];
        let buckets = group_events(&events, ViewGranularity::Day, &reference);

        let mut out = Vec::new();
        Renderer::plain()
            .write_buckets(&mut out, ViewGranularity::Day, &buckets, &tz)
            .expect("write");
        let text = String::from_utf8(out).expect("utf8");

        assert!(text.contains("Wed 2024-01-17"));
        assert!(text.contains("all day"));
        assert!(text.contains("09:00-09:15"));
        assert!(text.contains("Team meeting"));
    }

    #[test]
    fn strip_ansi_removes_color_codes() {
        assert_eq!(strip_ansi("\x1b[33mhello\x1b[0m"), "hello");
    }

    #[test]
    fn nav_step_mentions_month_change() {
        let outcome = KeyOutcome {
            target: NaiveDate::from_ymd_opt(2024, 2, 1),
            month_request: Some(MonthStep::Next),
        };
        let line = nav_step_line(
            NavKey::ArrowRight,
            &outcome,
            FocusResolution::Applied(NaiveDate::from_ymd_opt(2024, 2, 1).expect("date")),
            "February 2024",
        );
        assert_eq!(line, "ArrowRight [Next month: February 2024] -> focus 2024-02-01");
    }
}
