use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExecError {
    #[error("invalid launch: {0}")]
    InvalidSpec(String),

    #[error("failed to spawn '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("'{program}' exited with {}", describe_exit(*.code))]
    NonZeroExit { program: String, code: Option<i32> },

    #[error("server on port {port} not ready after {waited_ms} ms")]
    NotReady { port: u16, waited_ms: u64 },

    #[error("io error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("internal error: {0}")]
    Internal(String),
}

pub(crate) fn describe_exit(code: Option<i32>) -> String {
    match code {
        Some(c) => format!("code {c}"),
        None => "a signal".to_string(),
    }
}

impl ExecError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        ExecError::Io {
            path: path.into(),
            source,
        }
    }
}

/// An external process failed while a run was executing.
///
/// Recorded in the run's launch properties instead of aborting the job array.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuntimeFailure {
    /// `server` or `planner`.
    pub process: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i32>,
    pub reason: String,
}

impl RuntimeFailure {
    pub fn new(process: impl Into<String>, exit_code: Option<i32>, reason: impl Into<String>) -> Self {
        Self {
            process: process.into(),
            exit_code,
            reason: reason.into(),
        }
    }
}
