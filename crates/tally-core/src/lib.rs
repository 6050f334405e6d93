pub mod cli;
pub mod commands;
pub mod config;
pub mod datetime;
pub mod error;
pub mod export;
pub mod filter;
pub mod history;
pub mod notify;
pub mod persist;
pub mod render;
pub mod session;
pub mod store;
pub mod task;
pub mod theme;

use std::ffi::OsString;

use anyhow::Context;
use chrono::Utc;
use clap::Parser;
use tracing::{
  debug,
  info
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
    "starting tally"
  );

  let mut cfg = config::Config::load(
    cli.config.as_deref()
  )?;
  cfg.apply_overrides(
    cli
      .rc_overrides
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

  let kv =
    persist::FileStore::open(&data_dir)
      .with_context(|| {
        format!(
          "failed to open data store at \
           {}",
          data_dir.display()
        )
      })?;
  let notifier =
    notify::TerminalNotifier::new(
      cfg
        .get_bool("notify.enabled")
        .unwrap_or(true)
    );
  let options = cfg.session_options()?;
  debug!(?options, "session options");

  let mut session =
    session::Session::open(
      Box::new(kv),
      Box::new(notifier),
      options,
      Utc::now()
    );

  let mut renderer =
    render::Renderer::new(
      &cfg,
      session.theme()
    )?;
  let command = cli.command.unwrap_or(
    cli::Command::List(cli::ListArgs {
      filter: None
    })
  );

  commands::dispatch(
    &mut session,
    &cfg,
    &mut renderer,
    command
  )?;

  info!("done");
  Ok(())
}
