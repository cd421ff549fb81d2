pub mod api;
pub mod cli;
pub mod commands;
pub mod config;
pub mod envelope;
pub mod error;
pub mod filter;
pub mod form;
pub mod notify;
pub mod render;
pub mod resource;
pub mod scheduler;
pub mod screens;
#[cfg(any(test, feature = "testing"))]
pub mod testing;

use std::ffi::OsString;
use std::io;

use anyhow::{
  Context,
  bail
};
use clap::Parser;
use tracing::{
  debug,
  info
};

use crate::screens::ActionOutcome;

#[tracing::instrument(skip_all)]
pub fn run(
  raw_args: Vec<OsString>
) -> anyhow::Result<()> {
  let cli = cli::GlobalCli::parse_from(raw_args);

  cli::init_tracing(
    cli.verbose,
    cli.quiet
  )?;

  info!(
    verbose = cli.verbose,
    quiet = cli.quiet,
    "starting tavola CLI"
  );
  debug!(
    overrides = cli.overrides.len(),
    "collected config overrides"
  );

  let mut cfg = config::Config::load(
    cli.config.as_deref()
  )?;
  cfg.apply_overrides(
    cli
      .overrides
      .into_iter()
      .map(|kv| (kv.key, kv.value))
  )?;

  let runtime =
    tokio::runtime::Builder::new_multi_thread()
      .enable_all()
      .build()
      .context(
        "failed to start async \
         runtime"
      )?;

  let session =
    commands::Session::connect(
      &cfg, cli.yes
    )?;

  let outcome = runtime.block_on(async {
    let mut out = io::stdout().lock();
    commands::dispatch(
      &session,
      &mut out,
      cli.command
    )
    .await
  });

  let mut err = io::stderr().lock();
  session.flush_notices(&mut err)?;

  match outcome? {
    | ActionOutcome::Done => {
      info!("done");
      Ok(())
    }
    | ActionOutcome::Declined => {
      info!("cancelled at prompt");
      Ok(())
    }
    | ActionOutcome::Blocked
    | ActionOutcome::Failed => {
      bail!("command did not complete")
    }
  }
}
