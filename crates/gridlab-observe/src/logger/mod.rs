mod config;
mod error;
mod logger;
mod object;

pub use config::LoggerConfig;
pub use error::LoggerError;
pub use object::{LoggerFormat, LoggerLevel, LoggerOutput, LoggerRfc3339};
pub use object::{LoggerTimeZone, init_local_offset};

/// Installs the global tracing subscriber described by `cfg`.
///
/// Fails with [`LoggerError::AlreadyInitialized`] when called twice in one process.
///
/// # Local timezone
/// [`LoggerTimeZone::Local`] needs [`init_local_offset`] to run in `main()` before the tokio
/// runtime starts; otherwise timestamps fall back to UTC.
///
/// # Examples
/// ```rust
/// use gridlab_observe::{LoggerConfig, LoggerOutput, init_logger};
///
/// let config = LoggerConfig {
///     output: LoggerOutput::Stderr,
///     ..LoggerConfig::default()
/// };
/// init_logger(&config).expect("first initialization succeeds");
/// tracing::info!(experiment = "ipc14-vs-ipc11", "logger ready");
/// ```
pub fn init_logger(cfg: &LoggerConfig) -> Result<(), LoggerError> {
    match cfg.format {
        LoggerFormat::Text => logger::logger_text(cfg),
        LoggerFormat::Json => logger::logger_json(cfg),
        LoggerFormat::Journald => logger::logger_journald(cfg),
    }
}
