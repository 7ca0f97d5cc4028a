use std::{cmp::Ordering, fmt};

use serde::{Deserialize, Serialize};

#[cfg(feature = "schema")]
use schemars::JsonSchema;

use crate::error::{ModelError, ModelResult};

/// One benchmark problem instance together with its reward bounds.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "schema", derive(JsonSchema))]
#[serde(rename_all = "camelCase")]
pub struct Task {
    /// Domain name, e.g. `"elevators-2011"`.
    pub domain: String,
    /// 1-based instance index inside the domain; determines the order of tasks in a grid.
    pub instance: u32,
    /// Problem identifier passed to the planner, e.g. `"elevators_inst_mdp__1"`.
    pub problem: String,
    /// Directory of the domain relative to the benchmarks artifact.
    pub benchmark_dir: String,
    /// Number of steps per round.
    pub horizon: u32,
    /// Reward at or below which a run scores zero.
    pub min_score: f64,
    /// Reference reward for a score of one; inferred from the observed rewards when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_score: Option<f64>,
}

impl Task {
    /// Identity of the task across all configs of an experiment.
    pub fn key(&self) -> TaskKey {
        TaskKey::new(&self.domain, &self.problem)
    }

    /// Benchmarks from the 2018 competition need the planner's alternate parser.
    pub fn uses_ipc2018_parser(&self) -> bool {
        self.benchmark_dir.trim_end_matches('/').ends_with("2018")
    }

    /// Grid order: by domain, then by instance index.
    pub fn grid_order(&self, other: &Task) -> Ordering {
        self.domain
            .cmp(&other.domain)
            .then(self.instance.cmp(&other.instance))
            .then_with(|| self.problem.cmp(&other.problem))
    }

    pub fn validate(&self) -> ModelResult<()> {
        if self.domain.trim().is_empty() {
            return Err(ModelError::Invalid("task domain is empty".into()));
        }
        if self.problem.trim().is_empty() {
            return Err(ModelError::Invalid(format!(
                "task problem is empty (domain {})",
                self.domain
            )));
        }
        if self.horizon == 0 {
            return Err(ModelError::Invalid(format!("task {} has zero horizon", self.key())));
        }
        if !self.min_score.is_finite() {
            return Err(ModelError::Invalid(format!(
                "task {} has non-finite min score",
                self.key()
            )));
        }
        if let Some(max) = self.max_score {
            if !max.is_finite() {
                return Err(ModelError::Invalid(format!(
                    "task {} has non-finite max score",
                    self.key()
                )));
            }
        }
        Ok(())
    }
}

/// `(domain, problem)`: groups runs of different configs on the same task.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TaskKey {
    pub domain: String,
    pub problem: String,
}

impl TaskKey {
    pub fn new(domain: impl Into<String>, problem: impl Into<String>) -> Self {
        Self {
            domain: domain.into(),
            problem: problem.into(),
        }
    }
}

impl fmt::Display for TaskKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.domain, self.problem)
    }
}
