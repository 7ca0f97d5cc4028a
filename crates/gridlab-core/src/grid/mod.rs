//! Expansion of configs × tasks into concrete runs.
//!
//! Runs are laid out config-major: every task of the first config, then every task of the next.
//! Tasks are sorted by domain and instance before expansion, so ids and ports are stable for a
//! given input regardless of the order in which tasks were listed.
mod run;
pub use run::{RUNS_PER_BUCKET, Run, run_dir_for};

use std::collections::HashSet;

use gridlab_model::{BuildKey, ConfigSpec, MemoryLimit, Task};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{
    cache::{ArtifactLayout, BuildIndex},
    command::{CommandContext, CommandTemplate},
    error::ConfigurationError,
};

/// Experiment-wide run parameters.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GridSettings {
    /// Port of the first run; each subsequent run uses the next port.
    pub start_port: u16,
    /// Rounds per run.
    pub num_runs: u32,
    /// Seconds granted per step when `enforce_runtime` is set.
    pub step_time: f64,
    /// Derive a wall-clock limit from horizon, rounds and step time; otherwise unlimited.
    pub enforce_runtime: bool,
    /// `<int>M` or `<int>G`.
    pub memory_limit: String,
    pub server_seed: u64,
    pub planner_seed: u64,
}

impl Default for GridSettings {
    fn default() -> Self {
        Self {
            start_port: 2000,
            num_runs: 30,
            step_time: 1.0,
            enforce_runtime: false,
            memory_limit: "3584M".to_string(),
            server_seed: 0,
            planner_seed: 0,
        }
    }
}

impl GridSettings {
    pub fn parsed_memory_limit(&self) -> Result<MemoryLimit, ConfigurationError> {
        self.memory_limit
            .parse()
            .map_err(ConfigurationError::MemoryLimit)
    }

    /// Seconds for all rounds of a task, or `0` when runtime is not enforced.
    pub fn run_time_for(&self, task: &Task) -> u64 {
        if !self.enforce_runtime {
            return 0;
        }
        let secs = f64::from(task.horizon) * f64::from(self.num_runs) * self.step_time;
        secs.ceil() as u64
    }

    fn validate(&self) -> Result<(), ConfigurationError> {
        if self.num_runs == 0 {
            return Err(ConfigurationError::InvalidSetting(
                "numRuns must be at least 1".into(),
            ));
        }
        if !self.step_time.is_finite() || self.step_time < 0.0 {
            return Err(ConfigurationError::InvalidSetting(format!(
                "stepTime must be a non-negative number, got {}",
                self.step_time
            )));
        }
        if self.start_port == 0 {
            return Err(ConfigurationError::InvalidSetting(
                "startPort must be positive".into(),
            ));
        }
        Ok(())
    }
}

#[derive(Clone, Debug, Default)]
pub struct GridBuilder {
    settings: GridSettings,
    template: CommandTemplate,
    layout: ArtifactLayout,
    configs: Vec<ConfigSpec>,
}

impl GridBuilder {
    pub fn new(settings: GridSettings) -> Self {
        Self {
            settings,
            ..Self::default()
        }
    }

    pub fn with_template(mut self, template: CommandTemplate) -> Self {
        self.template = template;
        self
    }

    pub fn with_layout(mut self, layout: ArtifactLayout) -> Self {
        self.layout = layout;
        self
    }

    pub fn settings(&self) -> &GridSettings {
        &self.settings
    }

    pub fn configs(&self) -> &[ConfigSpec] {
        &self.configs
    }

    /// Register a config. Names must be unique and non-empty; two configs may not run the
    /// same build with the same descriptor.
    pub fn add_config(&mut self, config: ConfigSpec) -> Result<&mut Self, ConfigurationError> {
        if config.name.trim().is_empty() {
            return Err(ConfigurationError::EmptyName);
        }
        if self.configs.iter().any(|c| c.name == config.name) {
            return Err(ConfigurationError::DuplicateName(config.name));
        }
        if let Some(existing) = self.configs.iter().find(|c| **c == config) {
            return Err(ConfigurationError::EqualConfigs {
                existing: existing.name.clone(),
                added: config.name,
            });
        }
        debug!(name = %config.name, key = %config.build_key(), "config added");
        self.configs.push(config);
        Ok(self)
    }

    /// Distinct build keys in config order.
    pub fn build_keys(&self) -> Vec<BuildKey> {
        let mut seen = HashSet::new();
        self.configs
            .iter()
            .map(ConfigSpec::build_key)
            .filter(|k| seen.insert(k.clone()))
            .collect()
    }

    /// Expand into `configs × tasks` runs with sequential ids and ports.
    pub fn build(&self, tasks: &[Task], builds: &BuildIndex) -> Result<Vec<Run>, ConfigurationError> {
        self.settings.validate()?;
        let memory = self.settings.parsed_memory_limit()?;
        if self.configs.is_empty() {
            return Err(ConfigurationError::NoConfigs);
        }
        if tasks.is_empty() {
            return Err(ConfigurationError::NoTasks);
        }

        let mut ordered = tasks.to_vec();
        ordered.sort_by(Task::grid_order);
        let mut keys = HashSet::new();
        for task in &ordered {
            task.validate().map_err(ConfigurationError::InvalidTask)?;
            if !keys.insert(task.key()) {
                return Err(ConfigurationError::DuplicateTask(task.key().to_string()));
            }
        }

        let count = self.configs.len() * ordered.len();
        let start = self.settings.start_port;
        if usize::from(start) + count - 1 > usize::from(u16::MAX) {
            return Err(ConfigurationError::PortRange { start, count });
        }

        let mut runs = Vec::with_capacity(count);
        for config in &self.configs {
            let key = config.build_key();
            let build = builds
                .get(&key)
                .ok_or_else(|| ConfigurationError::MissingBuild {
                    config: config.name.clone(),
                    key: key.to_string(),
                })?;

            for task in &ordered {
                let id = runs.len() + 1;
                let port = start + (id - 1) as u16;
                let run_dir = run_dir_for(id);
                let run_time = self.settings.run_time_for(task);

                let mut ctx = CommandContext::new();
                ctx.set("wrapper", build.artifact(&self.layout.wrapper).display())
                    .set("server", build.artifact(&self.layout.server).display())
                    .set("planner", build.artifact(&self.layout.planner).display())
                    .set("benchmarks", build.artifact(&self.layout.benchmarks).display())
                    .set(
                        "benchmark_dir",
                        build
                            .artifact(&self.layout.benchmarks)
                            .join(&task.benchmark_dir)
                            .display(),
                    )
                    .set("port", port)
                    .set("num_runs", self.settings.num_runs)
                    .set("server_seed", self.settings.server_seed)
                    .set("planner_seed", self.settings.planner_seed)
                    .set("run_time", run_time)
                    .set("problem", &task.problem)
                    .set("domain", &task.domain)
                    .set("ipc2018", u8::from(task.uses_ipc2018_parser()))
                    .set("memory_limit_kb", memory.kb())
                    .set("memory_limit", memory)
                    .set("descriptor", &config.descriptor)
                    .set("algorithm", &config.name)
                    .set("run_dir", run_dir.display());
                let command = self.template.resolve(&ctx)?;

                runs.push(Run {
                    id,
                    algorithm: config.name.clone(),
                    descriptor: config.descriptor.clone(),
                    build: build.clone(),
                    task: task.clone(),
                    port,
                    run_dir,
                    run_time,
                    memory_limit_kb: memory.kb(),
                    num_runs: self.settings.num_runs,
                    command,
                });
            }
        }
        debug!(runs = runs.len(), configs = self.configs.len(), tasks = ordered.len(), "grid built");
        Ok(runs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::CachedBuild;

    fn task(domain: &str, instance: u32, horizon: u32) -> Task {
        Task {
            domain: domain.into(),
            instance,
            problem: format!("{}_inst_mdp__{instance}", domain.split('-').next().unwrap()),
            benchmark_dir: domain.into(),
            horizon,
            min_score: 0.0,
            max_score: None,
        }
    }

    fn builder(settings: GridSettings, configs: &[ConfigSpec]) -> (GridBuilder, BuildIndex) {
        let mut b = GridBuilder::new(settings);
        for c in configs {
            b.add_config(c.clone()).unwrap();
        }
        let index = b
            .build_keys()
            .into_iter()
            .map(|k| {
                let path = format!("/cache/{}", k.dir_name());
                (k.clone(), CachedBuild::new(k, path, None))
            })
            .collect();
        (b, index)
    }

    fn two_configs() -> Vec<ConfigSpec> {
        vec![
            ConfigSpec::new("ipc11", "/src/prost", "master", "IPC2011"),
            ConfigSpec::new("ipc14", "/src/prost", "master", "IPC2014"),
        ]
    }

    #[test]
    fn add_config_rejects_bad_configs() {
        let mut b = GridBuilder::default();
        b.add_config(ConfigSpec::new("a", "/src/prost", "master", "X")).unwrap();

        let empty = b.add_config(ConfigSpec::new(" ", "/src/prost", "master", "Y"));
        assert!(matches!(empty, Err(ConfigurationError::EmptyName)));

        let dup = b.add_config(ConfigSpec::new("a", "/src/prost", "v2", "Y"));
        assert!(matches!(dup, Err(ConfigurationError::DuplicateName(_))));

        let equal = b.add_config(ConfigSpec::new("b", "/src/prost", "master", "X"));
        assert!(matches!(equal, Err(ConfigurationError::EqualConfigs { .. })));
        assert_eq!(b.configs().len(), 1);
    }

    #[test]
    fn grid_is_config_major_with_sequential_ports() {
        let settings = GridSettings {
            start_port: 2000,
            ..GridSettings::default()
        };
        let (b, index) = builder(settings, &two_configs());
        let tasks = vec![task("wildfire-2014", 2, 40), task("wildfire-2014", 1, 40)];

        let runs = b.build(&tasks, &index).unwrap();
        let cells: Vec<_> = runs
            .iter()
            .map(|r| (r.id(), r.algorithm(), r.task().instance, r.port()))
            .collect();
        assert_eq!(
            cells,
            vec![
                (1, "ipc11", 1, 2000),
                (2, "ipc11", 2, 2001),
                (3, "ipc14", 1, 2002),
                (4, "ipc14", 2, 2003),
            ]
        );
    }

    #[test]
    fn build_keys_are_deduplicated() {
        let (b, _) = builder(GridSettings::default(), &two_configs());
        assert_eq!(b.build_keys().len(), 1);
    }

    #[test]
    fn command_follows_wrapper_contract() {
        let settings = GridSettings {
            start_port: 2100,
            num_runs: 30,
            step_time: 1.0,
            enforce_runtime: true,
            memory_limit: "3872M".into(),
            server_seed: 7,
            planner_seed: 9,
        };
        let configs = [ConfigSpec::new("ipc14", "/src/prost", "master", "IPC2014")];
        let (b, index) = builder(settings, &configs);
        let runs = b.build(&[task("academic-advising-2018", 1, 20)], &index).unwrap();

        let run = &runs[0];
        let root = run.build().path().display().to_string();
        assert_eq!(
            run.command(),
            &[
                format!("{root}/testbed/wrapper.sh"),
                format!("{root}/testbed/run-server.py"),
                format!("{root}/testbed/benchmarks/academic-advising-2018"),
                "2100".into(),
                "30".into(),
                "7".into(),
                "600".into(),
                format!("{root}/prost.py"),
                "academic_inst_mdp__1".into(),
                "1".into(),
                "9".into(),
                (3872 * 1024).to_string(),
                "IPC2014".into(),
            ]
        );
    }

    #[test]
    fn runtime_is_zero_unless_enforced() {
        let (b, index) = builder(GridSettings::default(), &two_configs()[..1]);
        let runs = b.build(&[task("wildfire-2014", 1, 40)], &index).unwrap();
        assert_eq!(runs[0].run_time(), 0);

        let settings = GridSettings {
            enforce_runtime: true,
            num_runs: 3,
            step_time: 0.5,
            ..GridSettings::default()
        };
        assert_eq!(settings.run_time_for(&task("wildfire-2014", 1, 41)), 62);
    }

    #[test]
    fn port_overflow_is_a_configuration_error() {
        let settings = GridSettings {
            start_port: 65535,
            ..GridSettings::default()
        };
        let (b, index) = builder(settings, &two_configs()[..1]);

        assert!(b.build(&[task("wildfire-2014", 1, 40)], &index).is_ok());
        let err = b
            .build(&[task("wildfire-2014", 1, 40), task("wildfire-2014", 2, 40)], &index)
            .unwrap_err();
        assert!(matches!(err, ConfigurationError::PortRange { start: 65535, count: 2 }));
    }

    #[test]
    fn invalid_memory_limit_is_rejected_before_expansion() {
        let settings = GridSettings {
            memory_limit: "4096".into(),
            ..GridSettings::default()
        };
        let (b, index) = builder(settings, &two_configs());
        let err = b.build(&[task("wildfire-2014", 1, 40)], &index).unwrap_err();
        assert!(matches!(err, ConfigurationError::MemoryLimit(_)));
    }

    #[test]
    fn missing_build_and_duplicate_tasks_are_rejected() {
        let mut b = GridBuilder::default();
        b.add_config(ConfigSpec::new("a", "/src/prost", "master", "X")).unwrap();
        let t = task("wildfire-2014", 1, 40);

        assert!(matches!(
            b.build(&[t.clone()], &BuildIndex::new()),
            Err(ConfigurationError::MissingBuild { .. })
        ));

        let (b, index) = builder(GridSettings::default(), &two_configs()[..1]);
        assert!(matches!(
            b.build(&[t.clone(), t], &index),
            Err(ConfigurationError::DuplicateTask(_))
        ));
    }

    #[test]
    fn static_properties_describe_the_run() {
        let (b, index) = builder(GridSettings::default(), &two_configs()[..1]);
        let runs = b.build(&[task("wildfire-2014", 3, 40)], &index).unwrap();
        let props = runs[0].static_properties();

        assert_eq!(props.get_str("algorithm"), Some("ipc11"));
        assert_eq!(props.get_str("run_dir"), Some("runs-00001-00100/00001"));
        assert_eq!(props.get_f64("min_score"), Some(0.0));
        assert_eq!(props.get("max_score"), Some(&serde_json::Value::Null));
        assert_eq!(props.get_f64("memory_limit"), Some((3584 * 1024) as f64));
    }
}
