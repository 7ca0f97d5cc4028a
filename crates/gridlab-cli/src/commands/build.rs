use std::sync::Arc;

use anyhow::Context;
use gridlab_core::{ExperimentWriter, RevisionCache, experiment::global_properties};
use gridlab_exec::GitBuildBackend;
use tracing::info;

use crate::{cli::BuildArgs, experiment_file::ExperimentFile};

/// Builds every distinct revision before anything is written, so the job script never refers
/// to a missing build.
pub async fn build(args: &BuildArgs) -> anyhow::Result<()> {
    let file = ExperimentFile::load(&args.experiment)?;
    let builder = file.grid_builder()?;

    let backend = Arc::new(GitBuildBackend::new(file.build.clone()));
    let cache = RevisionCache::new(file.revision_cache_dir(), backend);
    let keys = builder.build_keys();
    info!(builds = keys.len(), cache = %cache.root().display(), "resolving builds");
    let builds = cache.resolve_all(&keys).await?;

    let runs = builder.build(&file.tasks, &builds)?;
    let global = global_properties(&runs, builder.settings());
    let script = ExperimentWriter::new(file.experiment_dir())
        .overwrite(args.force)
        .write(&runs, &global, file.scheduler.kind, &file.scheduler.limits)
        .with_context(|| format!("cannot write experiment {}", file.name))?;

    println!("{}", script.display());
    Ok(())
}
