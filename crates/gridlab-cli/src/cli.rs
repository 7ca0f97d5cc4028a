use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use gridlab_model::ReadinessStrategy;
use gridlab_observe::{LoggerConfig, LoggerFormat, LoggerLevel, LoggerTimeZone};

#[derive(Parser, Debug)]
#[command(name = "gridlab", version, about = "Planner benchmark experiments on batch clusters")]
pub struct Cli {
    #[command(flatten)]
    pub log: LogArgs,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Args, Debug)]
pub struct LogArgs {
    /// text, json or journald
    #[arg(long, global = true, env = "GRIDLAB_LOG_FORMAT", default_value = "text")]
    pub log_format: LoggerFormat,

    /// Filter expression, e.g. `info` or `gridlab_exec=debug,info`
    #[arg(long, global = true, env = "GRIDLAB_LOG_LEVEL", default_value = "info")]
    pub log_level: LoggerLevel,

    /// utc or local
    #[arg(long, global = true, env = "GRIDLAB_LOG_TZ", default_value = "utc")]
    pub log_tz: LoggerTimeZone,

    #[arg(long, global = true, env = "GRIDLAB_LOG_NO_COLOR")]
    pub no_color: bool,
}

impl LogArgs {
    pub fn to_config(&self) -> LoggerConfig {
        LoggerConfig {
            format: self.log_format,
            level: self.log_level.clone(),
            tz: self.log_tz,
            use_color: !self.no_color,
            ..LoggerConfig::default()
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Build every revision, expand the grid and write the experiment with its job script.
    Build(BuildArgs),
    /// Execute one run: start the server, wait until it listens, then run the planner.
    Launch(LaunchArgs),
    /// Parse the logs of single run directories into their `properties`.
    Parse(ParseArgs),
    /// Collect and score every run of an experiment into `<experiment>-eval`.
    Fetch(FetchArgs),
}

#[derive(Args, Debug)]
pub struct BuildArgs {
    /// Experiment description (JSON).
    pub experiment: PathBuf,

    /// Replace an existing experiment directory.
    #[arg(long)]
    pub force: bool,
}

/// Positional arguments follow the wrapper contract so a job script can call either.
#[derive(Args, Debug)]
pub struct LaunchArgs {
    #[arg(long, default_value = "probe")]
    pub readiness: ReadinessStrategy,

    /// Directory for logs and `launch-properties`.
    #[arg(long, default_value = ".")]
    pub workdir: PathBuf,

    pub server: PathBuf,
    pub benchmark_dir: PathBuf,
    pub port: u16,
    pub num_runs: u32,
    pub server_seed: u64,
    /// Seconds for all rounds; 0 disables the server timeout.
    pub run_time: u64,
    pub planner: PathBuf,
    pub problem: String,
    /// 1 to enable the planner's 2018 parser.
    #[arg(value_parser = clap::value_parser!(u8).range(0..=1))]
    pub ipc2018: u8,
    pub planner_seed: u64,
    pub memory_limit_kb: u64,
    #[arg(allow_hyphen_values = true)]
    pub descriptor: String,
}

#[derive(Args, Debug)]
pub struct ParseArgs {
    /// Run directories containing `static-properties`.
    #[arg(required = true)]
    pub run_dirs: Vec<PathBuf>,

    /// Take extraction rules from this experiment description instead of the planner defaults.
    #[arg(long)]
    pub experiment: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct FetchArgs {
    /// Experiment description (JSON) the experiment was built from.
    pub experiment: PathBuf,
}
