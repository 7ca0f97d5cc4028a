use std::path::{Path, PathBuf};

use gridlab_model::{Properties, Task, constants::*};
use serde::Serialize;

use crate::cache::CachedBuild;

/// Runs per bucket directory (`runs-00001-00100`, `runs-00101-00200`, ...).
pub const RUNS_PER_BUCKET: usize = 100;

/// Relative directory of run `id` (1-based) inside the experiment.
pub fn run_dir_for(id: usize) -> PathBuf {
    let lo = (id.saturating_sub(1) / RUNS_PER_BUCKET) * RUNS_PER_BUCKET + 1;
    let hi = lo + RUNS_PER_BUCKET - 1;
    PathBuf::from(format!("runs-{lo:05}-{hi:05}")).join(format!("{id:05}"))
}

/// One (config, task) cell of the grid. Immutable once built.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Run {
    pub(super) id: usize,
    pub(super) algorithm: String,
    pub(super) descriptor: String,
    pub(super) build: CachedBuild,
    pub(super) task: Task,
    pub(super) port: u16,
    pub(super) run_dir: PathBuf,
    pub(super) run_time: u64,
    pub(super) memory_limit_kb: u64,
    pub(super) num_runs: u32,
    pub(super) command: Vec<String>,
}

impl Run {
    /// 1-based position in grid order; also the job-array task id.
    pub fn id(&self) -> usize {
        self.id
    }

    /// Config name.
    pub fn algorithm(&self) -> &str {
        &self.algorithm
    }

    pub fn descriptor(&self) -> &str {
        &self.descriptor
    }

    pub fn build(&self) -> &CachedBuild {
        &self.build
    }

    pub fn task(&self) -> &Task {
        &self.task
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Directory relative to the experiment root.
    pub fn run_dir(&self) -> &Path {
        &self.run_dir
    }

    /// Wall-clock limit for all rounds in seconds; `0` means unlimited.
    pub fn run_time(&self) -> u64 {
        self.run_time
    }

    pub fn memory_limit_kb(&self) -> u64 {
        self.memory_limit_kb
    }

    pub fn num_runs(&self) -> u32 {
        self.num_runs
    }

    /// Fully resolved command line.
    pub fn command(&self) -> &[String] {
        &self.command
    }

    /// Properties known before the run starts.
    pub fn static_properties(&self) -> Properties {
        let mut p = Properties::new();
        p.insert(PROP_DOMAIN, self.task.domain.as_str());
        p.insert(PROP_PROBLEM, self.task.problem.as_str());
        p.insert(PROP_ALGORITHM, self.algorithm.as_str());
        p.insert(
            PROP_ID,
            vec![
                self.algorithm.clone(),
                self.task.domain.clone(),
                self.task.problem.clone(),
            ],
        );
        p.insert(PROP_HORIZON, self.task.horizon);
        p.insert(PROP_MIN_SCORE, self.task.min_score);
        p.insert(
            PROP_MAX_SCORE,
            self.task
                .max_score
                .map_or(serde_json::Value::Null, serde_json::Value::from),
        );
        p.insert(PROP_NUM_RUNS, self.num_runs);
        p.insert(PROP_MEMORY_LIMIT, self.memory_limit_kb);
        p.insert(PROP_TIME_LIMIT, self.run_time);
        p.insert(PROP_RUN_DIR, self.run_dir.to_string_lossy().into_owned());
        p.insert(PROP_PORT, self.port);
        p.insert(PROP_BUILD_KEY, self.build.key().dir_name());
        p
    }
}

#[cfg(test)]
mod tests {
    use super::run_dir_for;
    use std::path::PathBuf;

    #[test]
    fn run_dirs_are_bucketed_by_hundreds() {
        assert_eq!(run_dir_for(1), PathBuf::from("runs-00001-00100/00001"));
        assert_eq!(run_dir_for(100), PathBuf::from("runs-00001-00100/00100"));
        assert_eq!(run_dir_for(101), PathBuf::from("runs-00101-00200/00101"));
        assert_eq!(run_dir_for(1234), PathBuf::from("runs-01201-01300/01234"));
    }
}
