use std::{
    fmt,
    io::{self, IsTerminal},
    str::FromStr,
};

use serde::{Deserialize, Serialize};
use tracing_subscriber::fmt::writer::BoxMakeWriter;

use crate::logger::LoggerError;

/// Stream the text and json loggers write to.
///
/// `build` prints the job script path on stdout, so logs default to stderr.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum LoggerOutput {
    #[default]
    Stderr,
    Stdout,
}

impl LoggerOutput {
    pub fn is_terminal(&self) -> bool {
        match self {
            LoggerOutput::Stderr => io::stderr().is_terminal(),
            LoggerOutput::Stdout => io::stdout().is_terminal(),
        }
    }

    pub(crate) fn make_writer(&self) -> BoxMakeWriter {
        match self {
            LoggerOutput::Stderr => BoxMakeWriter::new(io::stderr),
            LoggerOutput::Stdout => BoxMakeWriter::new(io::stdout),
        }
    }
}

impl FromStr for LoggerOutput {
    type Err = LoggerError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "stderr" => Ok(Self::Stderr),
            "stdout" => Ok(Self::Stdout),
            _ => Err(LoggerError::InvalidOutput(s.to_string())),
        }
    }
}

impl TryFrom<String> for LoggerOutput {
    type Error = LoggerError;
    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<LoggerOutput> for String {
    fn from(o: LoggerOutput) -> Self {
        o.to_string()
    }
}

impl fmt::Display for LoggerOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            LoggerOutput::Stderr => "stderr",
            LoggerOutput::Stdout => "stdout",
        })
    }
}
