use std::fs;
use std::io::{self, Read};
use std::path::Path;

use anyhow::{Context, anyhow};
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use tracing::{debug, info, instrument};

use crate::calendar::Calendar;
use crate::cli::Command;
use crate::config::{Config, expand_tilde};
use crate::datetime::{local_midnight, parse_date_expr};
use crate::event::RawEvent;
use crate::navigator::{MemoryGrid, NavKey};
use crate::picker::DatePicker;
use crate::render::Renderer;
use crate::view::ViewGranularity;

/// Everything a command needs besides its own arguments.
pub struct Session {
    pub cfg: Config,
    pub tz: Tz,
    pub now: DateTime<Utc>,
}

#[instrument(skip(ctx, renderer, command))]
pub fn dispatch(ctx: &Session, renderer: &Renderer, command: Option<Command>) -> anyhow::Result<()> {
    let command = command.unwrap_or(Command::Month {
        date: "today".to_string(),
    });
    debug!(?command, tz = %ctx.tz, "dispatching command");

    match command {
        Command::Month { date } => cmd_month(ctx, renderer, &date),
        Command::Agenda { view, date, events } => cmd_agenda(ctx, renderer, view.as_deref(), &date, &events),
        Command::Navigate { date, keys } => cmd_navigate(ctx, renderer, &date, &keys),
    }
}

fn resolve_day(ctx: &Session, expr: &str) -> anyhow::Result<DateTime<Tz>> {
    let date = parse_date_expr(expr, ctx.now, &ctx.tz).with_context(|| format!("invalid --date: {expr}"))?;
    Ok(local_midnight(&ctx.tz, date))
}

#[instrument(skip(ctx, renderer))]
fn cmd_month(ctx: &Session, renderer: &Renderer, date: &str) -> anyhow::Result<()> {
    info!("command month");
    let day = resolve_day(ctx, date)?;
    let today = ctx.now.with_timezone(&ctx.tz);
    let picker: DatePicker<MemoryGrid> = DatePicker::new(&day, &today);

    renderer.print_month(
        &picker.month_year_label(),
        &picker.grid_props(ctx.cfg.hide_outside_month()),
    )
}

#[instrument(skip(ctx, renderer))]
fn cmd_agenda(
    ctx: &Session,
    renderer: &Renderer,
    view: Option<&str>,
    date: &str,
    events_path: &Path,
) -> anyhow::Result<()> {
    info!("command agenda");
    let view = match view {
        Some(raw) => raw.parse::<ViewGranularity>()?,
        None => ctx.cfg.default_view()?,
    };
    let day = resolve_day(ctx, date)?;

    let raw = load_raw_events(events_path)?;
    let calendar = Calendar::from_raw(&raw, view, &day)
        .with_context(|| format!("rejected events from {}", events_path.display()))?;

    renderer.print_buckets(calendar.view(), calendar.buckets(), &ctx.tz)?;
    renderer.print_summary(&calendar.summary())
}

#[instrument(skip(ctx, renderer, keys), fields(keys = keys.len()))]
fn cmd_navigate(ctx: &Session, renderer: &Renderer, date: &str, keys: &[NavKey]) -> anyhow::Result<()> {
    info!("command navigate");
    let day = resolve_day(ctx, date)?;
    let today = ctx.now.with_timezone(&ctx.tz);
    let hide = ctx.cfg.hide_outside_month();

    let mut picker = DatePicker::new(&day, &today);
    picker.register_container(MemoryGrid::default());
    picker.render(hide);
    picker.click_cell(day.date_naive())?;

    for key in keys {
        let current = picker
            .navigator()
            .tab_stop_in(picker.weeks())
            .ok_or_else(|| anyhow!("date picker has no tab stop"))?;
        let outcome = picker.key_down_cell(current, Some(*key))?;
        picker.render(hide);
        let resolution = picker.after_render()?;
        renderer.print_nav_step(*key, &outcome, resolution, &picker.month_year_label())?;
    }

    renderer.print_month(&picker.month_year_label(), &picker.grid_props(hide))?;
    if let Some(stop) = picker.navigator().tab_stop_in(picker.weeks()) {
        println!("tab stop: {stop}");
    }
    Ok(())
}

/// Reads events from a file, or stdin when `path` is `-`.
fn load_raw_events(path: &Path) -> anyhow::Result<Vec<RawEvent>> {
    let text = if path.as_os_str() == "-" {
        let mut stdin = String::new();
        io::stdin()
            .read_to_string(&mut stdin)
            .context("failed reading stdin")?;
        stdin
    } else {
        let path = expand_tilde(path);
        fs::read_to_string(&path).with_context(|| format!("failed to read {}", path.display()))?
    };

    parse_event_items(text.trim())
}

/// Accepts a JSON array, a single object, or one object per line.
pub fn parse_event_items(trimmed: &str) -> anyhow::Result<Vec<RawEvent>> {
    if trimmed.is_empty() {
        return Ok(Vec::new());
    }

    if trimmed.starts_with('[') {
        return serde_json::from_str(trimmed).context("failed parsing JSON array");
    }

    if trimmed.starts_with('{')
        && let Ok(item) = serde_json::from_str::<RawEvent>(trimmed)
    {
        return Ok(vec![item]);
    }

    let mut out = Vec::new();
    for (idx, line) in trimmed.lines().enumerate() {
        let token = line.trim();
        if token.is_empty() {
            continue;
        }
        let item: RawEvent =
            serde_json::from_str(token).with_context(|| format!("failed parsing event line {}", idx + 1))?;
        out.push(item);
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_array_object_and_lines() {
        let array = parse_event_items(r#"[{"title": "A", "date": "2024-01-15T05:00:00Z"}]"#).expect("array");
        assert_eq!(array.len(), 1);

        let single = parse_event_items(r#"{"title": "B", "isAllDay": true, "date": "2024-01-15T05:00:00Z"}"#)
            .expect("object");
        assert_eq!(single[0].title, "B");

        let lines = parse_event_items(
            "{\"title\": \"C\", \"date\": \"2024-01-15T05:00:00Z\"}\n\n{\"title\": \"D\", \"date\": \"2024-01-16T05:00:00Z\"}",
        )
        .expect("lines");
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[1].title, "D");

        assert!(parse_event_items("").expect("empty").is_empty());
    }

    #[test]
    fn bad_line_is_reported_by_number() {
        let err = parse_event_items("{\"title\": \"C\", \"date\": \"2024-01-15T05:00:00Z\"}\nnot json")
            .expect_err("must fail");
        assert!(err.to_string().contains("line 2"));
    }
}
