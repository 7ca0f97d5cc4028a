//! Job-array scripts for cluster schedulers.
//!
//! The emitted script maps every array task id `1..=N` to exactly one run: the branch for id `i`
//! changes into the directory of the `i`-th run and executes its command. Unknown ids fail.
mod dialect;
mod limits;
pub use limits::{JobLimits, MailPolicy};

use std::path::Path;

use gridlab_model::SchedulerKind;

use crate::{error::ConfigurationError, grid::Run};

fn quote_path(p: &Path) -> String {
    shell_words::quote(&p.to_string_lossy()).into_owned()
}

/// Render the job-array script for `runs` in the dialect of `kind`.
pub fn emit(runs: &[Run], kind: SchedulerKind, limits: &JobLimits) -> Result<String, ConfigurationError> {
    if runs.is_empty() {
        return Err(ConfigurationError::NoRuns);
    }
    let var = kind.task_id_var();

    let mut lines = dialect::dialect(kind).header(runs.len(), limits);
    lines.extend(limits.extra_options.iter().cloned());
    lines.push(String::new());

    if let Some(dir) = &limits.workdir {
        lines.push(format!("cd {} || exit 1", quote_path(dir)));
    }
    lines.extend(limits.env.export_lines());
    lines.extend(limits.setup.iter().cloned());
    lines.push(String::new());

    for (idx, run) in runs.iter().enumerate() {
        lines.push(format!("if [ \"${var}\" -eq {} ]; then", idx + 1));
        lines.push(format!("    cd {} || exit 1", quote_path(run.run_dir())));
        lines.push(format!("    {}", shell_words::join(run.command())));
        lines.push("    exit $?".to_string());
        lines.push("fi".to_string());
    }
    lines.push(String::new());
    lines.push(format!("echo \"unknown task id: ${var}\" >&2"));
    lines.push("exit 1".to_string());
    lines.push(String::new());

    Ok(lines.join("\n"))
}
