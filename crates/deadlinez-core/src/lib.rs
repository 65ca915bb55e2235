//! Task records and the views derived from them: a persisted task
//! collection, read-time urgency, sorted/filtered lists, and monthly
//! completion statistics, plus the front end that drives them.

pub mod cli;
pub mod commands;
pub mod config;
pub mod datastore;
pub mod datetime;
pub mod error;
pub mod flows;
pub mod kv;
pub mod notify;
pub mod progress;
pub mod render;
pub mod task;
pub mod urgency;
pub mod views;

use std::ffi::OsString;

use anyhow::Context;
use chrono::Utc;
use clap::Parser;
use tracing::{
  debug,
  info
};

pub use datastore::TaskStore;
pub use error::{
  DispatchError,
  StorageError,
  TaskError
};
pub use progress::{
  MonthProgress,
  aggregate
};
pub use task::{
  Color,
  Completion,
  Task,
  TaskDraft,
  TaskId
};
pub use urgency::{
  Urgency,
  urgency
};
pub use views::{
  TaskRow,
  ViewProjector
};

#[tracing::instrument(skip_all)]
pub fn run(
  raw_args: Vec<OsString>
) -> anyhow::Result<()> {
  let cli =
    cli::GlobalCli::parse_from(raw_args);

  cli::init_tracing(
    cli.verbose,
    cli.quiet
  )?;

  info!(
    verbose = cli.verbose,
    quiet = cli.quiet,
    "starting deadlinez"
  );
  debug!(overrides = ?cli.overrides, "cli overrides");

  let mut cfg = config::Config::load(
    cli.rc_file.as_deref()
  )?;
  cfg.apply_overrides(
    cli
      .overrides
      .into_iter()
      .map(|kv| (kv.key, kv.value))
  );

  let data_dir =
    config::resolve_data_dir(
      &cfg,
      cli.data.as_deref()
    )
    .context(
      "failed to resolve data \
       directory"
    )?;

  let backend =
    kv::FileStore::open(&data_dir)
      .with_context(|| {
        format!(
          "failed to open data \
           directory {}",
          data_dir.display()
        )
      })?;
  let mut store = TaskStore::with_key(
    backend,
    cfg.store_key()
  );

  let mut renderer =
    render::Renderer::new(&cfg)?;

  commands::dispatch(
    &mut store,
    &cfg,
    &mut renderer,
    cli.command,
    Utc::now()
  )?;

  info!("done");
  Ok(())
}
