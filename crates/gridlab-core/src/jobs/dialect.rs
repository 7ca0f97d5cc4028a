use gridlab_model::SchedulerKind;

use super::{JobLimits, MailPolicy};

/// Scheduler-specific header of a job-array script.
pub(super) trait Dialect {
    fn header(&self, tasks: usize, limits: &JobLimits) -> Vec<String>;
}

pub(super) fn dialect(kind: SchedulerKind) -> &'static dyn Dialect {
    match kind {
        SchedulerKind::Slurm => &Slurm,
        SchedulerKind::Sge => &Sge,
    }
}

struct Slurm;

impl Dialect for Slurm {
    fn header(&self, tasks: usize, limits: &JobLimits) -> Vec<String> {
        let mut lines = vec![
            "#! /bin/bash -l".to_string(),
            format!("#SBATCH --job-name={}", limits.job_name),
            format!("#SBATCH --output={}", limits.stdout),
            format!("#SBATCH --error={}", limits.stderr),
        ];
        if let Some(p) = &limits.partition {
            lines.push(format!("#SBATCH --partition={p}"));
        }
        if let Some(t) = &limits.time_limit {
            lines.push(format!("#SBATCH --time={t}"));
        }
        lines.push(format!("#SBATCH --mem-per-cpu={}", limits.memory_per_cpu));
        lines.push(format!("#SBATCH --array=1-{tasks}"));
        lines.push(format!("#SBATCH --nice={}", limits.nice));
        match &limits.email {
            Some(email) => {
                let kind = match limits.mail {
                    MailPolicy::Never => "NONE",
                    MailPolicy::End => "END",
                    MailPolicy::Fail => "FAIL",
                    MailPolicy::EndOrFail => "END,FAIL",
                    MailPolicy::All => "ALL",
                };
                lines.push(format!("#SBATCH --mail-type={kind}"));
                lines.push(format!("#SBATCH --mail-user={email}"));
            }
            None => lines.push("#SBATCH --mail-type=NONE".to_string()),
        }
        lines
    }
}

struct Sge;

/// SGE accepts priorities in `-1023..=1024`; higher runs earlier.
fn sge_priority(nice: i32) -> i32 {
    nice.saturating_neg().clamp(-1023, 1024)
}

impl Dialect for Sge {
    fn header(&self, tasks: usize, limits: &JobLimits) -> Vec<String> {
        let mut lines = vec![
            "#! /bin/bash".to_string(),
            "#$ -S /bin/bash".to_string(),
            format!("#$ -N {}", limits.job_name),
            format!("#$ -o {}", limits.stdout),
            format!("#$ -e {}", limits.stderr),
        ];
        if let Some(q) = &limits.partition {
            lines.push(format!("#$ -q {q}"));
        }
        if let Some(t) = &limits.time_limit {
            lines.push(format!("#$ -l h_rt={t}"));
        }
        lines.push(format!("#$ -l h_vmem={}", limits.memory_per_cpu));
        lines.push(format!("#$ -t 1-{tasks}"));
        lines.push(format!("#$ -p {}", sge_priority(limits.nice)));
        match &limits.email {
            Some(email) => {
                let kind = match limits.mail {
                    MailPolicy::Never => "n",
                    MailPolicy::End => "e",
                    MailPolicy::Fail => "a",
                    MailPolicy::EndOrFail => "ea",
                    MailPolicy::All => "bea",
                };
                lines.push(format!("#$ -m {kind}"));
                lines.push(format!("#$ -M {email}"));
            }
            None => lines.push("#$ -m n".to_string()),
        }
        lines
    }
}

#[cfg(test)]
mod tests {
    use super::sge_priority;

    #[test]
    fn sge_priority_inverts_and_clamps_nice() {
        assert_eq!(sge_priority(0), 0);
        assert_eq!(sge_priority(100), -100);
        assert_eq!(sge_priority(5000), -1023);
        assert_eq!(sge_priority(-5000), 1024);
        assert_eq!(sge_priority(i32::MIN), 1024);
    }
}
