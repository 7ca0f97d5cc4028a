use std::{
    collections::BTreeMap,
    fs, io,
    path::{Path, PathBuf},
};

use gridlab_model::{Properties, constants::*};
use serde_json::Value;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use super::{
    LAUNCH_PROPERTIES_FILE, PROPERTIES_FILE, RUN_LOG_FILE, STATIC_PROPERTIES_FILE, read_properties,
    write_properties,
};
use crate::{error::CoreError, extract::MetricExtractor, score};

/// Result of evaluating one experiment.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FetchSummary {
    pub eval_dir: PathBuf,
    pub runs: usize,
    pub missing_logs: usize,
    pub runtime_failures: usize,
}

/// `<exp>-eval` next to the experiment directory.
pub fn eval_dir_for(exp: &Path) -> PathBuf {
    let name = exp
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "experiment".to_string());
    exp.with_file_name(format!("{name}-eval"))
}

/// Run directories of an experiment in id order.
pub fn run_dirs(exp: &Path) -> Result<Vec<PathBuf>, CoreError> {
    let mut dirs = Vec::new();
    for entry in WalkDir::new(exp)
        .min_depth(2)
        .max_depth(2)
        .sort_by_file_name()
    {
        let entry = entry.map_err(|e| {
            let path = e.path().unwrap_or(exp).to_path_buf();
            CoreError::io(path, io::Error::from(e))
        })?;
        if entry.file_type().is_dir() && entry.path().join(STATIC_PROPERTIES_FILE).is_file() {
            dirs.push(entry.into_path());
        }
    }
    Ok(dirs)
}

/// Merge static properties, launch properties and metrics parsed from `run.log`, and store the
/// record as `properties` in the run directory.
pub fn collect_run(dir: &Path, extractor: &MetricExtractor) -> Result<Properties, CoreError> {
    let static_path = dir.join(STATIC_PROPERTIES_FILE);
    let mut props = read_properties(&static_path)?.ok_or_else(|| {
        CoreError::io(
            &static_path,
            io::Error::new(io::ErrorKind::NotFound, "static properties missing"),
        )
    })?;
    if let Some(launch) = read_properties(&dir.join(LAUNCH_PROPERTIES_FILE))? {
        props.merge(launch);
    }

    let log_path = dir.join(RUN_LOG_FILE);
    match fs::read_to_string(&log_path) {
        Ok(text) => {
            let report = extractor.parse_report(&text);
            if !report.errors.is_empty() {
                let errors: Vec<String> = report.errors.iter().map(ToString::to_string).collect();
                warn!(run = %dir.display(), errors = ?errors, "some attributes could not be parsed");
                props.insert(PROP_PARSE_ERRORS, errors);
            }
            props.merge(report.properties);
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            debug!(run = %dir.display(), "no run log");
        }
        Err(e) => return Err(CoreError::io(&log_path, e)),
    }

    write_properties(&dir.join(PROPERTIES_FILE), &props)?;
    Ok(props)
}

fn record_key(props: &Properties) -> String {
    match props.get(PROP_ID) {
        Some(Value::Array(parts)) => parts
            .iter()
            .map(|p| p.as_str().map_or_else(|| p.to_string(), str::to_string))
            .collect::<Vec<_>>()
            .join("-"),
        _ => [PROP_ALGORITHM, PROP_DOMAIN, PROP_PROBLEM]
            .iter()
            .map(|k| props.get_str(k).unwrap_or("?"))
            .collect::<Vec<_>>()
            .join("-"),
    }
}

fn is_runtime_failure(props: &Properties) -> bool {
    props.contains_key(PROP_RUNTIME_FAILURE)
        || props
            .get(PROP_PLANNER_EXIT_CODE)
            .and_then(Value::as_i64)
            .is_some_and(|c| c != 0)
}

/// Collect every run, score them in two passes and write `<exp>-eval/properties`.
pub fn fetch(exp: &Path, extractor: &MetricExtractor) -> Result<FetchSummary, CoreError> {
    let dirs = run_dirs(exp)?;
    let mut missing_logs = 0;
    let mut records = Vec::with_capacity(dirs.len());
    for dir in &dirs {
        if !dir.join(RUN_LOG_FILE).is_file() {
            missing_logs += 1;
        }
        records.push(collect_run(dir, extractor)?);
    }

    score::score_all(&mut records);
    let runtime_failures = records.iter().filter(|r| is_runtime_failure(r)).count();

    let combined: BTreeMap<String, Properties> = records
        .into_iter()
        .map(|r| (record_key(&r), r))
        .collect();

    let eval_dir = eval_dir_for(exp);
    fs::create_dir_all(&eval_dir).map_err(|e| CoreError::io(&eval_dir, e))?;
    let out = eval_dir.join(PROPERTIES_FILE);
    let body = serde_json::to_vec_pretty(&combined).map_err(|e| CoreError::json(&out, e))?;
    fs::write(&out, body).map_err(|e| CoreError::io(&out, e))?;

    info!(
        experiment = %exp.display(),
        runs = dirs.len(),
        missing_logs,
        runtime_failures,
        "experiment fetched"
    );
    Ok(FetchSummary {
        eval_dir,
        runs: dirs.len(),
        missing_logs,
        runtime_failures,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        experiment::{ExperimentWriter, global_properties, tests::small_grid},
        jobs::JobLimits,
    };
    use gridlab_model::SchedulerKind;

    fn log(reward: f64) -> String {
        format!(
            ">>> END OF ROUND 1 -- REWARD RECEIVED: {reward:.1}\n\
             >>> END OF SESSION  -- AVERAGE REWARD: {reward:.1}\n\
             PROST complete running time: 3.5s\n"
        )
    }

    #[test]
    fn fetch_merges_parses_and_scores() {
        let tmp = tempfile::tempdir().unwrap();
        let exp = tmp.path().join("exp");
        let (runs, settings) = small_grid();
        ExperimentWriter::new(&exp)
            .write(
                &runs,
                &global_properties(&runs, &settings),
                SchedulerKind::Slurm,
                &JobLimits::default(),
            )
            .unwrap();

        // ipc11 on both tasks, ipc14 on task 1 only; ipc14 task 2 crashed before logging.
        let rewards = [Some(-50.0), Some(-20.0), Some(0.0), None];
        for (run, reward) in runs.iter().zip(rewards) {
            let dir = exp.join(run.run_dir());
            if let Some(r) = reward {
                fs::write(dir.join(RUN_LOG_FILE), log(r)).unwrap();
            }
        }
        let mut launch = Properties::new();
        launch.insert(PROP_PLANNER_EXIT_CODE, 137);
        write_properties(&exp.join(runs[3].run_dir()).join(LAUNCH_PROPERTIES_FILE), &launch).unwrap();

        let summary = fetch(&exp, &MetricExtractor::planner_defaults()).unwrap();
        assert_eq!(summary.runs, 4);
        assert_eq!(summary.missing_logs, 1);
        assert_eq!(summary.runtime_failures, 1);
        assert_eq!(summary.eval_dir, tmp.path().join("exp-eval"));

        let raw = fs::read(summary.eval_dir.join(PROPERTIES_FILE)).unwrap();
        let combined: BTreeMap<String, Properties> = serde_json::from_slice(&raw).unwrap();
        let score = |key: &str| combined[key].get_f64(PROP_QUALITY_SCORE).unwrap();

        // Task 1: best observed is 0.0, min is -100.
        assert_eq!(score("ipc11-wildfire-2014-wildfire_inst_mdp__1"), 0.5);
        assert_eq!(score("ipc14-wildfire-2014-wildfire_inst_mdp__1"), 1.0);
        // Task 2: only ipc11 has a reward, so it defines the bound.
        assert_eq!(score("ipc11-wildfire-2014-wildfire_inst_mdp__2"), 1.0);
        assert_eq!(score("ipc14-wildfire-2014-wildfire_inst_mdp__2"), 0.0);

        let run_props = read_properties(&exp.join(runs[0].run_dir()).join(PROPERTIES_FILE))
            .unwrap()
            .unwrap();
        assert_eq!(run_props.get_f64(PROP_TOTAL_TIME), Some(3.5));
    }

    #[test]
    fn eval_dir_is_a_sibling() {
        assert_eq!(
            eval_dir_for(Path::new("/data/exp-2026")),
            PathBuf::from("/data/exp-2026-eval")
        );
    }
}
