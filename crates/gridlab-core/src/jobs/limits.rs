use std::path::PathBuf;

use gridlab_model::{Env, MemoryLimit};
use serde::{Deserialize, Serialize};

/// When the scheduler sends mail about the job array.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MailPolicy {
    Never,
    End,
    Fail,
    #[default]
    EndOrFail,
    All,
}

/// Resource limits and bookkeeping shared by every task of a job array.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct JobLimits {
    pub job_name: String,
    pub stdout: String,
    pub stderr: String,
    /// Slurm partition or SGE queue.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub partition: Option<String>,
    pub memory_per_cpu: MemoryLimit,
    /// Scheduler-native wall-clock limit, e.g. `"0-08:25:00"`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_limit: Option<String>,
    /// Positive values lower the priority.
    pub nice: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    pub mail: MailPolicy,
    /// Exported before any run starts.
    pub env: Env,
    /// Raw shell lines executed before any run starts.
    pub setup: Vec<String>,
    /// Raw header lines appended verbatim.
    pub extra_options: Vec<String>,
    /// Directory that relative run directories are resolved against.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub workdir: Option<PathBuf>,
}

impl Default for JobLimits {
    fn default() -> Self {
        Self {
            job_name: "gridlab".to_string(),
            stdout: "slurm.log".to_string(),
            stderr: "slurm.err".to_string(),
            partition: None,
            memory_per_cpu: MemoryLimit::from_kb(3872 * 1024),
            time_limit: None,
            nice: 5000,
            email: None,
            mail: MailPolicy::default(),
            env: Env::new(),
            setup: Vec::new(),
            extra_options: Vec::new(),
            workdir: None,
        }
    }
}
