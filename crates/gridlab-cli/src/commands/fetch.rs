use anyhow::bail;
use tracing::warn;

use crate::{cli::FetchArgs, experiment_file::ExperimentFile};

pub async fn fetch(args: &FetchArgs) -> anyhow::Result<()> {
    let file = ExperimentFile::load(&args.experiment)?;
    let dir = file.experiment_dir();
    if !dir.is_dir() {
        bail!("experiment directory {} does not exist; run `gridlab build` first", dir.display());
    }
    let extractor = file.extractor()?;

    let summary = tokio::task::spawn_blocking(move || gridlab_core::experiment::fetch(&dir, &extractor)).await??;
    if summary.missing_logs > 0 {
        warn!(missing = summary.missing_logs, "some runs have no run.log; did they run?");
    }
    if summary.runtime_failures > 0 {
        warn!(failed = summary.runtime_failures, "some runs failed at runtime");
    }

    println!("{}", summary.eval_dir.display());
    Ok(())
}
