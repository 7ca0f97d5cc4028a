use std::path::PathBuf;

use gridlab_model::{ModelError, ValueType};
use thiserror::Error;

/// Invalid experiment setup. Always fatal: raised before any job is submitted.
#[derive(Debug, Error)]
pub enum ConfigurationError {
    #[error("invalid memory limit: {0}")]
    MemoryLimit(#[source] ModelError),

    #[error("invalid task: {0}")]
    InvalidTask(#[source] ModelError),

    #[error("invalid setting: {0}")]
    InvalidSetting(String),

    #[error("config name must not be empty")]
    EmptyName,

    #[error("config names must be unique: {0}")]
    DuplicateName(String),

    #[error("configs {existing} and {added} are identical")]
    EqualConfigs { existing: String, added: String },

    #[error("task {0} is listed more than once")]
    DuplicateTask(String),

    #[error("at least one config is required")]
    NoConfigs,

    #[error("at least one task is required")]
    NoTasks,

    #[error("cannot emit a job array without runs")]
    NoRuns,

    #[error("{count} runs starting at port {start} exceed the port range")]
    PortRange { start: u16, count: usize },

    #[error("unresolved placeholder {{{0}}} in command template")]
    UnresolvedPlaceholder(String),

    #[error("no cached build for config '{config}' ({key})")]
    MissingBuild { config: String, key: String },

    #[error("invalid rule '{name}': {reason}")]
    InvalidRule { name: String, reason: String },

    #[error("experiment directory already exists: {0}")]
    ExperimentExists(PathBuf),
}

/// Checkout or compilation of a revision failed. Fatal for that build key; never retried.
#[derive(Debug, Error)]
pub enum BuildError {
    #[error("{step} for {key} exited with {}", exit_label(*.code))]
    NonZeroExit {
        key: String,
        step: String,
        code: Option<i32>,
    },

    #[error("{step} for {key} failed: {reason}")]
    StepFailed {
        key: String,
        step: String,
        reason: String,
    },

    #[error("io error while caching {key} at {path}: {source}")]
    Io {
        key: String,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

fn exit_label(code: Option<i32>) -> String {
    match code {
        Some(c) => format!("code {c}"),
        None => "a signal".to_string(),
    }
}

/// One attribute of one run could not be coerced. Local: the run keeps its other attributes.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ParseError {
    #[error("attribute '{attribute}': cannot read {raw:?} as {ty}")]
    Coercion {
        attribute: String,
        raw: String,
        ty: ValueType,
    },
}

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("configuration error: {0}")]
    Configuration(#[from] ConfigurationError),

    #[error("build error: {0}")]
    Build(#[from] BuildError),

    #[error("io error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid json in {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

impl CoreError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        CoreError::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn json(path: impl Into<PathBuf>, source: serde_json::Error) -> Self {
        CoreError::Json {
            path: path.into(),
            source,
        }
    }
}
