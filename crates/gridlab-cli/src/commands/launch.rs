use gridlab_exec::{LaunchSpec, RunLauncher};
use gridlab_model::Env;
use tracing::{error, warn};

use crate::cli::LaunchArgs;

/// Exit status after an interrupt, as a shell would report SIGINT.
const INTERRUPTED: i32 = 130;

/// Returns the exit status for the process: the planner's exit code.
pub async fn launch(args: LaunchArgs) -> anyhow::Result<i32> {
    let spec = LaunchSpec {
        server: args.server,
        benchmark_dir: args.benchmark_dir,
        port: args.port,
        num_runs: args.num_runs,
        server_seed: args.server_seed,
        run_time: args.run_time,
        planner: args.planner,
        problem: args.problem,
        ipc2018: args.ipc2018 == 1,
        planner_seed: args.planner_seed,
        memory_limit_kb: args.memory_limit_kb,
        descriptor: args.descriptor,
        workdir: args.workdir,
        readiness: args.readiness,
        env: Env::new(),
    };
    let launcher = RunLauncher::new(spec);

    // Dropping the run future kills both children.
    let outcome = tokio::select! {
        outcome = launcher.run() => outcome?,
        _ = super::shutdown_signal() => {
            warn!(port = launcher.spec().port, "interrupted; server and planner killed");
            return Ok(INTERRUPTED);
        }
    };

    if let Err(e) = launcher.write_properties(&outcome) {
        error!(error = %e, "cannot write launch properties");
    }
    Ok(outcome.exit_code())
}
