//! Execution of one run: background server, readiness wait, foreground planner.
mod readiness;
pub use readiness::wait_ready;

use std::{
    fs,
    path::{Path, PathBuf},
    process::{ExitStatus, Stdio},
    time::{Duration, Instant},
};

use gridlab_model::{Env, MemoryLimit, Properties, ReadinessStrategy, constants::*};
use tokio::process::{Child, Command};
use tracing::{debug, info, warn};

use crate::{
    ExecError, RuntimeFailure,
    utils::{RlimitConfig, attach_rlimits},
};

pub const SERVER_LOG: &str = "server.log";
pub const SERVER_ERR: &str = "server.err";
pub const PLANNER_LOG: &str = "run.log";
pub const PLANNER_ERR: &str = "run.err";

/// Everything needed to execute one run, in the order of the wrapper's positional arguments.
#[derive(Clone, Debug)]
pub struct LaunchSpec {
    pub server: PathBuf,
    pub benchmark_dir: PathBuf,
    pub port: u16,
    pub num_runs: u32,
    pub server_seed: u64,
    /// Seconds for all rounds; `0` disables the server's timeout.
    pub run_time: u64,
    pub planner: PathBuf,
    pub problem: String,
    pub ipc2018: bool,
    pub planner_seed: u64,
    pub memory_limit_kb: u64,
    pub descriptor: String,
    /// Where logs and launch properties are written.
    pub workdir: PathBuf,
    pub readiness: ReadinessStrategy,
    pub env: Env,
}

impl LaunchSpec {
    pub fn server_args(&self) -> Vec<String> {
        vec![
            "-b".into(),
            self.benchmark_dir.to_string_lossy().into_owned(),
            "-p".into(),
            self.port.to_string(),
            "-r".into(),
            self.num_runs.to_string(),
            "-s".into(),
            self.server_seed.to_string(),
            "-ss".into(),
            "1".into(),
            "-t".into(),
            self.run_time.to_string(),
            "-l".into(),
            "./".into(),
        ]
    }

    pub fn planner_args(&self) -> Vec<String> {
        vec![
            self.problem.clone(),
            "-p".into(),
            self.port.to_string(),
            "--parser-options".into(),
            format!("-ipc2018 {}", u8::from(self.ipc2018)),
            format!(
                "[PROST -s {} -ram {} -se [{}]]",
                self.planner_seed, self.memory_limit_kb, self.descriptor
            ),
        ]
    }

    fn validate(&self) -> Result<(), ExecError> {
        if self.port == 0 {
            return Err(ExecError::InvalidSpec("port must be positive".into()));
        }
        if self.memory_limit_kb == 0 {
            return Err(ExecError::InvalidSpec("memory limit must be positive".into()));
        }
        if self.problem.trim().is_empty() {
            return Err(ExecError::InvalidSpec("problem is empty".into()));
        }
        Ok(())
    }
}

/// What happened during one launch.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct LaunchOutcome {
    pub planner_exit_code: Option<i32>,
    pub server_exit_code: Option<i32>,
    pub server_ready: Option<Duration>,
    pub wall_time: Duration,
    pub failure: Option<RuntimeFailure>,
}

impl LaunchOutcome {
    /// Exit status for the wrapper: the planner's, or `1` when it did not exit normally.
    pub fn exit_code(&self) -> i32 {
        self.planner_exit_code.unwrap_or(1)
    }

    pub fn properties(&self) -> Properties {
        let mut p = Properties::new();
        let code = |c: Option<i32>| c.map_or(serde_json::Value::Null, serde_json::Value::from);
        p.insert(PROP_PLANNER_EXIT_CODE, code(self.planner_exit_code))
            .insert(PROP_SERVER_EXIT_CODE, code(self.server_exit_code))
            .insert(PROP_WALL_TIME, self.wall_time.as_secs_f64());
        if let Some(ready) = self.server_ready {
            p.insert(PROP_SERVER_READY_MS, ready.as_millis() as u64);
        }
        if let Some(f) = &self.failure {
            if let Ok(v) = serde_json::to_value(f) {
                p.insert(PROP_RUNTIME_FAILURE, v);
            }
        }
        p
    }
}

fn log_file(dir: &Path, name: &str) -> Result<Stdio, ExecError> {
    let path = dir.join(name);
    fs::File::create(&path)
        .map(Stdio::from)
        .map_err(|e| ExecError::io(path, e))
}

fn describe(status: &ExitStatus) -> String {
    match status.code() {
        Some(c) => format!("exited with code {c}"),
        None => "terminated by a signal".to_string(),
    }
}

pub struct RunLauncher {
    spec: LaunchSpec,
}

impl RunLauncher {
    pub fn new(spec: LaunchSpec) -> Self {
        Self { spec }
    }

    pub fn spec(&self) -> &LaunchSpec {
        &self.spec
    }

    fn spawn_server(&self) -> Result<Child, ExecError> {
        let s = &self.spec;
        let mut cmd = Command::new(&s.server);
        cmd.args(s.server_args())
            .current_dir(&s.workdir)
            .envs(s.env.iter())
            .stdin(Stdio::null())
            .stdout(log_file(&s.workdir, SERVER_LOG)?)
            .stderr(log_file(&s.workdir, SERVER_ERR)?)
            .kill_on_drop(true);
        cmd.spawn().map_err(|source| ExecError::Spawn {
            program: s.server.display().to_string(),
            source,
        })
    }

    fn spawn_planner(&self) -> Result<Child, ExecError> {
        let s = &self.spec;
        let mut cmd = Command::new(&s.planner);
        cmd.args(s.planner_args())
            .current_dir(&s.workdir)
            .envs(s.env.iter())
            .stdin(Stdio::null())
            .stdout(log_file(&s.workdir, PLANNER_LOG)?)
            .stderr(log_file(&s.workdir, PLANNER_ERR)?)
            .kill_on_drop(true);
        attach_rlimits(&mut cmd, &RlimitConfig::for_memory(MemoryLimit::from_kb(s.memory_limit_kb)));
        cmd.spawn().map_err(|source| ExecError::Spawn {
            program: s.planner.display().to_string(),
            source,
        })
    }

    /// Run server and planner. Process failures are recorded in the outcome; only setup
    /// problems (invalid spec, unwritable logs, failed spawn) are returned as errors.
    pub async fn run(&self) -> Result<LaunchOutcome, ExecError> {
        self.spec.validate()?;
        let start = Instant::now();
        let port = self.spec.port;
        let mut outcome = LaunchOutcome::default();

        let mut server = self.spawn_server()?;
        info!(port, server = %self.spec.server.display(), "server started");

        let ready = tokio::select! {
            ready = wait_ready(&self.spec.readiness, port) => ready.map_err(|e| e.to_string()),
            status = server.wait() => Err(match status {
                Ok(s) => {
                    outcome.server_exit_code = s.code();
                    format!("server {} before accepting connections", describe(&s))
                }
                Err(e) => format!("cannot wait for server: {e}"),
            }),
        };

        match ready {
            Ok(waited) => {
                outcome.server_ready = Some(waited);
                let mut planner = self.spawn_planner()?;
                info!(port, problem = %self.spec.problem, "planner started");
                match planner.wait().await {
                    Ok(status) => {
                        outcome.planner_exit_code = status.code();
                        if !status.success() {
                            outcome.failure = Some(RuntimeFailure::new("planner", status.code(), describe(&status)));
                        }
                    }
                    Err(e) => {
                        outcome.failure = Some(RuntimeFailure::new("planner", None, format!("cannot wait for planner: {e}")));
                    }
                }
            }
            Err(reason) => {
                warn!(port, %reason, "server not ready; planner not started");
                outcome.failure = Some(RuntimeFailure::new("server", outcome.server_exit_code, reason));
            }
        }

        self.stop_server(&mut server, &mut outcome).await;
        outcome.wall_time = start.elapsed();
        info!(
            port,
            planner_exit_code = ?outcome.planner_exit_code,
            server_exit_code = ?outcome.server_exit_code,
            wall_time_s = outcome.wall_time.as_secs_f64(),
            "run finished"
        );
        Ok(outcome)
    }

    async fn stop_server(&self, server: &mut Child, outcome: &mut LaunchOutcome) {
        match server.try_wait() {
            Ok(Some(status)) => {
                outcome.server_exit_code = status.code();
                return;
            }
            Ok(None) => {}
            Err(e) => debug!(error = %e, "cannot poll server"),
        }
        if let Err(e) = server.start_kill() {
            debug!(error = %e, "cannot kill server");
        }
        match server.wait().await {
            Ok(status) => outcome.server_exit_code = status.code(),
            Err(e) => debug!(error = %e, "cannot reap server"),
        }
    }

    /// Write `launch-properties` next to the logs.
    pub fn write_properties(&self, outcome: &LaunchOutcome) -> Result<PathBuf, ExecError> {
        let path = self.spec.workdir.join(gridlab_core::experiment::LAUNCH_PROPERTIES_FILE);
        let body = serde_json::to_vec_pretty(&outcome.properties())
            .map_err(|e| ExecError::Internal(e.to_string()))?;
        fs::write(&path, body).map_err(|e| ExecError::io(&path, e))?;
        Ok(path)
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::os::unix::fs::PermissionsExt;

    fn script(dir: &Path, name: &str, body: &str) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    fn spec(dir: &Path, server: PathBuf, planner: PathBuf) -> LaunchSpec {
        LaunchSpec {
            server,
            benchmark_dir: dir.join("benchmarks/wildfire-2014"),
            port: 2000,
            num_runs: 3,
            server_seed: 0,
            run_time: 0,
            planner,
            problem: "wildfire_inst_mdp__1".into(),
            ipc2018: false,
            planner_seed: 4,
            memory_limit_kb: 4 * 1024 * 1024,
            descriptor: "IPC2014".into(),
            workdir: dir.to_path_buf(),
            readiness: ReadinessStrategy::FixedDelay { delay_ms: 10 },
            env: Env::new(),
        }
    }

    #[test]
    fn argument_contract() {
        let s = spec(Path::new("/exp"), "run-server.py".into(), "prost.py".into());
        assert_eq!(
            s.server_args().join(" "),
            "-b /exp/benchmarks/wildfire-2014 -p 2000 -r 3 -s 0 -ss 1 -t 0 -l ./"
        );
        assert_eq!(
            s.planner_args(),
            vec![
                "wildfire_inst_mdp__1",
                "-p",
                "2000",
                "--parser-options",
                "-ipc2018 0",
                "[PROST -s 4 -ram 4194304 -se [IPC2014]]",
            ]
        );
    }

    #[test]
    fn descriptor_is_wrapped_once() {
        let mut s = spec(Path::new("/exp"), "run-server.py".into(), "prost.py".into());
        s.descriptor = "THTS -act [UCB1] -out [UMC]".into();
        assert_eq!(
            s.planner_args().last().map(String::as_str),
            Some("[PROST -s 4 -ram 4194304 -se [THTS -act [UCB1] -out [UMC]]]")
        );
    }

    #[tokio::test]
    async fn planner_runs_and_server_is_stopped() {
        let tmp = tempfile::tempdir().unwrap();
        let server = script(tmp.path(), "server", "echo serving; exec sleep 30");
        let planner = script(tmp.path(), "planner", "echo \"args: $*\"; exit 0");
        let launcher = RunLauncher::new(spec(tmp.path(), server, planner));

        let outcome = launcher.run().await.unwrap();
        assert_eq!(outcome.planner_exit_code, Some(0));
        assert!(outcome.failure.is_none());
        assert_eq!(outcome.exit_code(), 0);

        let log = fs::read_to_string(tmp.path().join(PLANNER_LOG)).unwrap();
        assert!(log.contains("-p 2000"));
        assert!(fs::read_to_string(tmp.path().join(SERVER_LOG)).unwrap().contains("serving"));

        let path = launcher.write_properties(&outcome).unwrap();
        let props: Properties = serde_json::from_slice(&fs::read(path).unwrap()).unwrap();
        assert_eq!(props.get_f64(PROP_PLANNER_EXIT_CODE), Some(0.0));
    }

    #[tokio::test]
    async fn planner_failure_is_recorded() {
        let tmp = tempfile::tempdir().unwrap();
        let server = script(tmp.path(), "server", "exec sleep 30");
        let planner = script(tmp.path(), "planner", "exit 7");
        let outcome = RunLauncher::new(spec(tmp.path(), server, planner)).run().await.unwrap();

        assert_eq!(outcome.exit_code(), 7);
        let failure = outcome.failure.clone().unwrap();
        assert_eq!(failure.process, "planner");
        assert_eq!(failure.exit_code, Some(7));
        assert!(outcome.properties().contains_key(PROP_RUNTIME_FAILURE));
    }

    #[tokio::test]
    async fn early_server_exit_skips_planner() {
        let tmp = tempfile::tempdir().unwrap();
        let server = script(tmp.path(), "server", "exit 2");
        let planner = script(tmp.path(), "planner", "touch planner-ran");
        let mut s = spec(tmp.path(), server, planner);
        s.readiness = ReadinessStrategy::FixedDelay { delay_ms: 2_000 };

        let outcome = RunLauncher::new(s).run().await.unwrap();
        assert_eq!(outcome.planner_exit_code, None);
        assert_eq!(outcome.server_exit_code, Some(2));
        assert_eq!(outcome.failure.as_ref().map(|f| f.process.as_str()), Some("server"));
        assert_eq!(outcome.exit_code(), 1);
        assert!(!tmp.path().join("planner-ran").exists());
    }
}
