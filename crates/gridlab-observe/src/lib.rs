//! Logging for the `gridlab` binary.
//!
//! Every subcommand runs either interactively or inside a scheduler job, where stdout is the
//! job log. Logs therefore go to stderr by default and the format is picked at startup.
mod logger;
pub use logger::*;
