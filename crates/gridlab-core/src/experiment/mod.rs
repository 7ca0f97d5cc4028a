//! On-disk experiment layout.
//!
//! ```text
//! <exp>/properties                     global properties
//! <exp>/job-array.sh                   scheduler script
//! <exp>/runs-00001-00100/00001/
//!     static-properties                written before dispatch
//!     launch-properties                written by `gridlab launch`
//!     run.log, server.log              process output
//!     properties                       merged record, written by fetch
//! <exp>-eval/properties                all runs keyed by algorithm-domain-problem
//! ```
mod fetch;
pub use fetch::{FetchSummary, collect_run, eval_dir_for, fetch, run_dirs};

use std::{
    fs, io,
    path::{Path, PathBuf},
};

use gridlab_model::{Properties, SchedulerKind, constants::*};
use serde_json::{Map, Value};
use tracing::info;

use crate::{
    error::{ConfigurationError, CoreError},
    grid::{GridSettings, Run},
    jobs::{self, JobLimits},
};

pub const PROPERTIES_FILE: &str = "properties";
pub const STATIC_PROPERTIES_FILE: &str = "static-properties";
pub const LAUNCH_PROPERTIES_FILE: &str = "launch-properties";
pub const RUN_LOG_FILE: &str = "run.log";
pub const SERVER_LOG_FILE: &str = "server.log";
pub const JOB_SCRIPT_FILE: &str = "job-array.sh";

/// Write `props` as pretty JSON.
pub fn write_properties(path: &Path, props: &Properties) -> Result<(), CoreError> {
    let body = serde_json::to_vec_pretty(props).map_err(|e| CoreError::json(path, e))?;
    fs::write(path, body).map_err(|e| CoreError::io(path, e))
}

/// Read a properties file; a missing file yields `None`.
pub fn read_properties(path: &Path) -> Result<Option<Properties>, CoreError> {
    let raw = match fs::read(path) {
        Ok(raw) => raw,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(CoreError::io(path, e)),
    };
    serde_json::from_slice(&raw)
        .map(Some)
        .map_err(|e| CoreError::json(path, e))
}

/// Experiment-wide properties derived from the built grid.
pub fn global_properties(runs: &[Run], settings: &GridSettings) -> Properties {
    let mut domains: Vec<&str> = runs.iter().map(|r| r.task().domain.as_str()).collect();
    domains.sort_unstable();
    domains.dedup();

    let mut algorithms: Vec<&str> = Vec::new();
    let mut revisions = Map::new();
    for run in runs {
        if algorithms.contains(&run.algorithm()) {
            continue;
        }
        algorithms.push(run.algorithm());
        let build = run.build();
        let mut rev = Map::new();
        rev.insert("rev".into(), build.key().rev().into());
        if let Some(global) = build.global_rev() {
            rev.insert("globalRev".into(), global.into());
        }
        rev.insert("buildKey".into(), build.key().dir_name().into());
        revisions.insert(run.algorithm().to_string(), Value::Object(rev));
    }

    let mut p = Properties::new();
    p.insert(PROP_DOMAINS, domains)
        .insert(PROP_ALGORITHMS, algorithms)
        .insert(PROP_NUM_RUNS, settings.num_runs)
        .insert(PROP_TIME_LIMIT_PER_STEP, settings.step_time)
        .insert(PROP_REVISIONS, Value::Object(revisions));
    if let Some(first) = runs.first() {
        p.insert(PROP_MEMORY_LIMIT, first.memory_limit_kb());
    }
    p
}

/// Materializes an experiment directory from a built grid.
#[derive(Clone, Debug)]
pub struct ExperimentWriter {
    dir: PathBuf,
    overwrite: bool,
}

impl ExperimentWriter {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            overwrite: false,
        }
    }

    /// Replace an existing experiment directory instead of failing.
    pub fn overwrite(mut self, overwrite: bool) -> Self {
        self.overwrite = overwrite;
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Write global and static properties plus the job script; returns the script path.
    pub fn write(
        &self,
        runs: &[Run],
        global: &Properties,
        kind: SchedulerKind,
        limits: &JobLimits,
    ) -> Result<PathBuf, CoreError> {
        let dir = &self.dir;
        if dir.exists() && !self.overwrite {
            return Err(ConfigurationError::ExperimentExists(dir.clone()).into());
        }
        let abs = std::path::absolute(dir).map_err(|e| CoreError::io(dir, e))?;

        let mut limits = limits.clone();
        if limits.workdir.is_none() {
            limits.workdir = Some(abs.clone());
        }
        let script = jobs::emit(runs, kind, &limits)?;

        if abs.exists() {
            info!(path = %abs.display(), "removing existing experiment directory");
            fs::remove_dir_all(&abs).map_err(|e| CoreError::io(&abs, e))?;
        }
        fs::create_dir_all(&abs).map_err(|e| CoreError::io(&abs, e))?;

        write_properties(&abs.join(PROPERTIES_FILE), global)?;
        for run in runs {
            let run_dir = abs.join(run.run_dir());
            fs::create_dir_all(&run_dir).map_err(|e| CoreError::io(&run_dir, e))?;
            write_properties(&run_dir.join(STATIC_PROPERTIES_FILE), &run.static_properties())?;
        }

        let script_path = abs.join(JOB_SCRIPT_FILE);
        fs::write(&script_path, script).map_err(|e| CoreError::io(&script_path, e))?;
        make_executable(&script_path)?;

        info!(path = %abs.display(), runs = runs.len(), scheduler = %kind, "experiment written");
        Ok(script_path)
    }
}

#[cfg(unix)]
fn make_executable(path: &Path) -> Result<(), CoreError> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o755)).map_err(|e| CoreError::io(path, e))
}

#[cfg(not(unix))]
fn make_executable(_path: &Path) -> Result<(), CoreError> {
    Ok(())
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::{
        cache::{BuildIndex, CachedBuild},
        grid::GridBuilder,
    };
    use gridlab_model::{ConfigSpec, Task};

    pub(crate) fn small_grid() -> (Vec<Run>, GridSettings) {
        let settings = GridSettings::default();
        let mut b = GridBuilder::new(settings.clone());
        b.add_config(ConfigSpec::new("ipc11", "/src/prost", "master", "IPC2011"))
            .unwrap();
        b.add_config(ConfigSpec::new("ipc14", "/src/prost", "v2", "IPC2014"))
            .unwrap();
        let index: BuildIndex = b
            .build_keys()
            .into_iter()
            .map(|k| {
                let path = format!("/cache/{}", k.dir_name());
                (k.clone(), CachedBuild::new(k, path, Some("f00d".into())))
            })
            .collect();
        let tasks: Vec<Task> = (1..=2)
            .map(|i| Task {
                domain: "wildfire-2014".into(),
                instance: i,
                problem: format!("wildfire_inst_mdp__{i}"),
                benchmark_dir: "wildfire-2014".into(),
                horizon: 40,
                min_score: -100.0,
                max_score: None,
            })
            .collect();
        (b.build(&tasks, &index).unwrap(), settings)
    }

    #[test]
    fn global_properties_list_domains_and_algorithms() {
        let (runs, settings) = small_grid();
        let p = global_properties(&runs, &settings);

        assert_eq!(p.get(PROP_DOMAINS), Some(&serde_json::json!(["wildfire-2014"])));
        assert_eq!(p.get(PROP_ALGORITHMS), Some(&serde_json::json!(["ipc11", "ipc14"])));
        assert_eq!(p.get(PROP_REVISIONS).and_then(|r| r["ipc14"]["rev"].as_str()), Some("v2"));
        assert!(p.get("time_limit_per_step").is_some_and(serde_json::Value::is_number));
    }

    #[test]
    fn writes_layout_and_refuses_to_clobber() {
        let tmp = tempfile::tempdir().unwrap();
        let exp = tmp.path().join("exp");
        let (runs, settings) = small_grid();
        let global = global_properties(&runs, &settings);
        let writer = ExperimentWriter::new(&exp);

        let script = writer
            .write(&runs, &global, SchedulerKind::Slurm, &JobLimits::default())
            .unwrap();
        assert!(script.is_file());
        assert!(exp.join(PROPERTIES_FILE).is_file());
        for run in &runs {
            let stat = read_properties(&exp.join(run.run_dir()).join(STATIC_PROPERTIES_FILE))
                .unwrap()
                .unwrap();
            assert_eq!(stat.get_str(PROP_ALGORITHM), Some(run.algorithm()));
        }

        let again = writer.write(&runs, &global, SchedulerKind::Slurm, &JobLimits::default());
        assert!(matches!(
            again,
            Err(CoreError::Configuration(ConfigurationError::ExperimentExists(_)))
        ));
        assert!(
            writer
                .clone()
                .overwrite(true)
                .write(&runs, &global, SchedulerKind::Sge, &JobLimits::default())
                .is_ok()
        );
    }
}
