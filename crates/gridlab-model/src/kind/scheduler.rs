use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

#[cfg(feature = "schema")]
use schemars::JsonSchema;

use crate::error::{ModelError, ModelResult};

/// Batch scheduler dialect a job array script is generated for.
///
/// Only the script header and the task-id variable differ between dialects;
/// the per-run branches are identical.
#[derive(Default, Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "schema", derive(JsonSchema))]
#[serde(rename_all = "camelCase")]
pub enum SchedulerKind {
    /// Slurm job arrays (`sbatch --array`).
    #[default]
    Slurm,
    /// Sun Grid Engine array jobs (`qsub -t`).
    Sge,
}

impl SchedulerKind {
    /// Environment variable holding the 1-based array task id.
    pub fn task_id_var(&self) -> &'static str {
        match self {
            SchedulerKind::Slurm => "SLURM_ARRAY_TASK_ID",
            SchedulerKind::Sge => "SGE_TASK_ID",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SchedulerKind::Slurm => "slurm",
            SchedulerKind::Sge => "sge",
        }
    }
}

impl fmt::Display for SchedulerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SchedulerKind {
    type Err = ModelError;
    fn from_str(s: &str) -> ModelResult<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "slurm" | "sbatch" => Ok(SchedulerKind::Slurm),
            "sge" | "grid-engine" | "qsub" => Ok(SchedulerKind::Sge),
            other => Err(ModelError::UnknownScheduler(other.to_string())),
        }
    }
}
