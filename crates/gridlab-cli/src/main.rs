mod cli;
mod commands;
mod experiment_file;

use clap::Parser;
use gridlab_observe::{LoggerTimeZone, init_local_offset, init_logger};
use tracing::debug;

use cli::{Cli, Command};

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Must happen before the runtime spawns its worker threads.
    if cli.log.log_tz == LoggerTimeZone::Local {
        init_local_offset();
    }
    init_logger(&cli.log.to_config())?;
    debug!(command = ?cli.command, "starting");

    let runtime = tokio::runtime::Builder::new_multi_thread().enable_all().build()?;
    let code = runtime.block_on(async move {
        match cli.command {
            Command::Build(args) => commands::build(&args).await.map(|()| 0),
            Command::Launch(args) => commands::launch(args).await,
            Command::Parse(args) => commands::parse(&args).map(|()| 0),
            Command::Fetch(args) => commands::fetch(&args).await.map(|()| 0),
        }
    })?;

    if code != 0 {
        std::process::exit(code);
    }
    Ok(())
}
