use std::{fmt, path::PathBuf, process::Stdio};

use gridlab_model::Env;
use tokio::process::Command;
use tracing::{debug, trace, warn};

use super::logger::{LogConfig, forward_lines};
use crate::ExecError;

/// One external command of a build or launch.
#[derive(Debug, Clone)]
pub struct StepCommand {
    /// Short name used in logs and errors (`checkout`, `build`, ...).
    pub(crate) label: String,
    pub(crate) program: String,
    pub(crate) args: Vec<String>,
    /// Added on top of the inherited environment.
    pub(crate) env: Env,
    /// Inherits the parent's working directory when `None`.
    pub(crate) cwd: Option<PathBuf>,
}

impl StepCommand {
    pub fn new(label: impl Into<String>, program: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            program: program.into(),
            args: Vec::new(),
            env: Env::new(),
            cwd: None,
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn env(mut self, env: Env) -> Self {
        self.env = env;
        self
    }

    pub fn cwd(mut self, cwd: impl Into<PathBuf>) -> Self {
        self.cwd = Some(cwd.into());
        self
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn validate(&self) -> Result<(), ExecError> {
        if self.program.trim().is_empty() {
            return Err(ExecError::InvalidSpec(format!(
                "step '{}' has an empty program",
                self.label
            )));
        }
        Ok(())
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args).stdin(Stdio::null()).kill_on_drop(true);
        if let Some(cwd) = &self.cwd {
            cmd.current_dir(cwd);
        }
        for (k, v) in self.env.iter() {
            cmd.env(k, v);
        }
        cmd
    }

    fn spawn_error(&self, source: std::io::Error) -> ExecError {
        ExecError::Spawn {
            program: self.program.clone(),
            source,
        }
    }

    fn check(&self, status: std::process::ExitStatus) -> Result<(), ExecError> {
        if status.success() {
            return Ok(());
        }
        Err(ExecError::NonZeroExit {
            program: self.program.clone(),
            code: status.code(),
        })
    }

    /// Run to completion, forwarding output into the log. Non-zero exit is an error.
    pub async fn run(&self, log: LogConfig) -> Result<(), ExecError> {
        self.validate()?;
        trace!(step = %self.label, program = %self.program, args = ?self.args, cwd = ?self.cwd, "running step");

        let mut child = self
            .command()
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| self.spawn_error(e))?;

        let stdout = forward_lines(child.stdout.take(), &self.label, "stdout", log.stdout, log.max_line_length);
        let stderr = forward_lines(child.stderr.take(), &self.label, "stderr", log.stderr, log.max_line_length);
        let (status, (), ()) = tokio::join!(child.wait(), stdout, stderr);
        let status = status.map_err(|e| self.spawn_error(e))?;

        debug!(step = %self.label, code = ?status.code(), "step finished");
        self.check(status)
    }

    /// Run to completion and return stdout. Stderr is logged when the step fails.
    pub async fn capture(&self) -> Result<Vec<u8>, ExecError> {
        self.validate()?;
        trace!(step = %self.label, program = %self.program, args = ?self.args, "capturing step output");

        let out = self
            .command()
            .output()
            .await
            .map_err(|e| self.spawn_error(e))?;
        if !out.status.success() {
            warn!(
                step = %self.label,
                stderr = %String::from_utf8_lossy(&out.stderr).trim(),
                "step failed"
            );
        }
        self.check(out.status)?;
        Ok(out.stdout)
    }
}

impl fmt::Display for StepCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.label, self.program)?;
        for a in &self.args {
            write!(f, " {a}")?;
        }
        Ok(())
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[tokio::test]
    async fn capture_returns_stdout() {
        let out = StepCommand::new("echo", "sh")
            .args(["-c", "printf hello"])
            .capture()
            .await
            .unwrap();
        assert_eq!(out, b"hello");
    }

    #[tokio::test]
    async fn non_zero_exit_is_an_error() {
        let err = StepCommand::new("fail", "sh")
            .args(["-c", "echo oops >&2; exit 3"])
            .run(LogConfig::default())
            .await
            .unwrap_err();
        assert!(matches!(err, ExecError::NonZeroExit { code: Some(3), .. }));
    }

    #[tokio::test]
    async fn env_and_cwd_are_applied() {
        let tmp = tempfile::tempdir().unwrap();
        let mut env = Env::new();
        env.insert("GRIDLAB_TEST", "42");
        StepCommand::new("write", "sh")
            .args(["-c", "echo $GRIDLAB_TEST > out"])
            .env(env)
            .cwd(tmp.path())
            .run(LogConfig::default())
            .await
            .unwrap();
        assert_eq!(std::fs::read_to_string(tmp.path().join("out")).unwrap(), "42\n");
    }

    #[tokio::test]
    async fn missing_program_fails_to_spawn() {
        let err = StepCommand::new("nope", "/definitely/not/here").capture().await.unwrap_err();
        assert!(matches!(err, ExecError::Spawn { .. }));
        assert!(StepCommand::new("empty", " ").validate().is_err());
    }
}
