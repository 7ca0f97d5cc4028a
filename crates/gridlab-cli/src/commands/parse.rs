use gridlab_core::{MetricExtractor, experiment::collect_run};
use tracing::info;

use crate::{cli::ParseArgs, experiment_file::ExperimentFile};

pub fn parse(args: &ParseArgs) -> anyhow::Result<()> {
    let extractor = match &args.experiment {
        Some(path) => ExperimentFile::load(path)?.extractor()?,
        None => MetricExtractor::planner_defaults(),
    };
    for dir in &args.run_dirs {
        let props = collect_run(dir, &extractor)?;
        info!(run = %dir.display(), attributes = props.len(), "run parsed");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use gridlab_core::experiment::{
        PROPERTIES_FILE, RUN_LOG_FILE, STATIC_PROPERTIES_FILE, read_properties, write_properties,
    };
    use gridlab_model::Properties;

    #[test]
    fn writes_merged_properties_per_run() {
        let dir = tempfile::tempdir().unwrap();
        let run = dir.path().join("runs-00001-00100/00001");
        std::fs::create_dir_all(&run).unwrap();

        let mut stat = Properties::new();
        stat.insert("algorithm", "ipc14").insert("domain", "wildfire-2014");
        write_properties(&run.join(STATIC_PROPERTIES_FILE), &stat).unwrap();
        std::fs::write(
            run.join(RUN_LOG_FILE),
            ">>> END OF SESSION  -- TOTAL REWARD: -12.5\nPROST complete running time: 3.5s\n",
        )
        .unwrap();

        parse(&ParseArgs {
            run_dirs: vec![run.clone()],
            experiment: None,
        })
        .unwrap();

        let props = read_properties(&run.join(PROPERTIES_FILE)).unwrap().unwrap();
        assert_eq!(props.get_str("algorithm"), Some("ipc14"));
        assert_eq!(props.get_f64("total_reward"), Some(-12.5));
        assert_eq!(props.get_f64("total_time"), Some(3.5));
    }
}
