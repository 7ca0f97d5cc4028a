//! The JSON document `build` and `fetch` read an experiment from.
use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, bail};
use gridlab_core::{
    ArtifactLayout, CommandTemplate, GridBuilder, GridSettings, JobLimits, MetricExtractor, RuleSpec, Token,
};
use gridlab_exec::BuildRecipe;
use gridlab_model::{ConfigSpec, ReadinessStrategy, SchedulerKind, Task};
use serde::{Deserialize, Serialize};

const DEFAULT_REVISION_CACHE: &str = "revision-cache";

/// Program each job array branch runs.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", rename_all_fields = "camelCase", tag = "kind")]
pub enum Launcher {
    /// The build's own `testbed/wrapper.sh`.
    #[default]
    Wrapper,
    /// `gridlab launch` with a readiness probe in place of the wrapper's fixed sleep.
    Builtin {
        #[serde(default)]
        readiness: ReadinessStrategy,
    },
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchedulerSection {
    #[serde(default)]
    pub kind: SchedulerKind,
    #[serde(flatten)]
    pub limits: JobLimits,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExperimentFile {
    pub name: String,
    /// Experiment directory; `<name>` next to this file when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub revision_cache: Option<PathBuf>,
    #[serde(flatten)]
    pub settings: GridSettings,
    pub configs: Vec<ConfigSpec>,
    pub tasks: Vec<Task>,
    #[serde(default)]
    pub scheduler: SchedulerSection,
    #[serde(default)]
    pub artifacts: ArtifactLayout,
    #[serde(default)]
    pub launcher: Launcher,
    /// Replaces the launcher's command entirely.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command_template: Option<CommandTemplate>,
    #[serde(default)]
    pub build: BuildRecipe,
    /// Extraction rules; the planner defaults when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rules: Option<Vec<RuleSpec>>,
    /// `<base>-all` list attributes expanded into `<base>_<i>`.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub splits: Vec<String>,

    /// Directory relative paths are resolved against.
    #[serde(skip)]
    base_dir: PathBuf,
}

impl ExperimentFile {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let raw = fs::read_to_string(path).with_context(|| format!("cannot read {}", path.display()))?;
        let mut file: ExperimentFile =
            serde_json::from_str(&raw).with_context(|| format!("invalid experiment file {}", path.display()))?;
        let base = path.parent().unwrap_or(Path::new("."));
        file.base_dir = std::path::absolute(base).with_context(|| format!("cannot resolve {}", base.display()))?;
        file.validate()?;
        Ok(file)
    }

    fn validate(&self) -> anyhow::Result<()> {
        if self.name.trim().is_empty() {
            bail!("experiment name is empty");
        }
        if self.name.contains(std::path::MAIN_SEPARATOR) {
            bail!("experiment name {:?} must not contain a path separator", self.name);
        }
        Ok(())
    }

    pub fn experiment_dir(&self) -> PathBuf {
        match &self.path {
            Some(p) => self.base_dir.join(p),
            None => self.base_dir.join(&self.name),
        }
    }

    pub fn revision_cache_dir(&self) -> PathBuf {
        self.base_dir
            .join(self.revision_cache.as_deref().unwrap_or(Path::new(DEFAULT_REVISION_CACHE)))
    }

    /// Command template of every run.
    pub fn template(&self) -> anyhow::Result<CommandTemplate> {
        if let Some(t) = &self.command_template {
            return Ok(t.clone());
        }
        let chain = CommandTemplate::planner_chain();
        match &self.launcher {
            Launcher::Wrapper => Ok(chain),
            Launcher::Builtin { readiness } => {
                let exe = std::env::current_exe().context("cannot locate the gridlab executable")?;
                let mut tokens = vec![
                    Token::Literal(exe.display().to_string()),
                    Token::Literal("launch".into()),
                    Token::Literal("--readiness".into()),
                    Token::Literal(readiness.to_string()),
                    Token::Literal("--".into()),
                ];
                // Everything after `{wrapper}`.
                tokens.extend(chain.tokens().iter().skip(1).cloned());
                Ok(CommandTemplate::new(tokens))
            }
        }
    }

    /// Grid builder with every config registered; repositories resolve against the file's directory.
    pub fn grid_builder(&self) -> anyhow::Result<GridBuilder> {
        let mut builder = GridBuilder::new(self.settings.clone())
            .with_template(self.template()?)
            .with_layout(self.artifacts.clone());
        for config in &self.configs {
            let mut config = config.clone();
            config.repo = self.base_dir.join(&config.repo);
            builder.add_config(config)?;
        }
        Ok(builder)
    }

    pub fn extractor(&self) -> anyhow::Result<MetricExtractor> {
        let mut extractor = match &self.rules {
            Some(specs) => MetricExtractor::from_specs(specs.iter().cloned())?,
            None => MetricExtractor::planner_defaults(),
        };
        for split in &self.splits {
            extractor = extractor.with_split(split.clone());
        }
        Ok(extractor)
    }
}
