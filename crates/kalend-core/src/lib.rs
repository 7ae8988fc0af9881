pub mod calendar;
pub mod cell_props;
pub mod cli;
pub mod commands;
pub mod config;
pub mod datetime;
pub mod error;
pub mod event;
pub mod grouping;
pub mod matrix;
pub mod navigator;
pub mod picker;
pub mod render;
pub mod view;

use std::ffi::OsString;

use clap::Parser;
use tracing::{
  debug,
  info
};

pub use calendar::Calendar;
pub use cell_props::CellAttributes;
pub use error::{
  CalendarError,
  CalendarResult
};
pub use event::{
  Event,
  RawEvent
};
pub use grouping::{
  Bucket,
  group_events,
  group_raw_events
};
pub use matrix::{
  WeekMatrix,
  build_week_matrix
};
pub use navigator::{
  GridFocusNavigator,
  GridSurface,
  MemoryGrid,
  NavKey,
  TabIndex
};
pub use picker::DatePicker;
pub use view::ViewGranularity;

#[tracing::instrument(skip_all)]
pub fn run(
  raw_args: Vec<OsString>
) -> anyhow::Result<()> {
  let pre =
    cli::preprocess_args(&raw_args)?;
  let cli = cli::GlobalCli::parse_from(
    pre.cleaned_args
  );

  cli::init_tracing(
    cli.verbose,
    cli.quiet
  )?;

  info!(
    verbose = cli.verbose,
    quiet = cli.quiet,
    "starting kalend CLI"
  );
  debug!(?pre.rc_overrides, "preprocessed rc overrides");

  let mut cfg = config::Config::load(
    cli.kalendrc.as_deref()
  )?;
  cfg.apply_overrides(
    pre.rc_overrides.into_iter().chain(
      cli
        .rc_overrides
        .into_iter()
        .map(|kv| (kv.key, kv.value))
    )
  );

  let explicit_tz = cli
    .timezone
    .clone()
    .or_else(|| cfg.timezone());
  let tz = datetime::resolve_timezone(
    explicit_tz.as_deref()
  );
  debug!(%tz, "resolved timezone");

  let renderer =
    render::Renderer::new(&cfg);
  let session = commands::Session {
    cfg,
    tz,
    now: chrono::Utc::now()
  };

  commands::dispatch(
    &session,
    &renderer,
    cli.command
  )?;

  info!("done");
  Ok(())
}
