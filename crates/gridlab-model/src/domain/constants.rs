//! Well-known attribute names used in run and experiment properties.
//!
//! Static attributes are written before dispatch, dynamic ones are merged in after a run's
//! log has been parsed. Reports and the score normalizer look attributes up by these names,
//! so they form part of the properties-file contract.

pub const PROP_DOMAIN: &str = "domain";
pub const PROP_PROBLEM: &str = "problem";
pub const PROP_ALGORITHM: &str = "algorithm";
/// `[algorithm, domain, problem]`, unique per run within one experiment.
pub const PROP_ID: &str = "id";
pub const PROP_HORIZON: &str = "horizon";
pub const PROP_MIN_SCORE: &str = "min_score";
pub const PROP_MAX_SCORE: &str = "max_score";
pub const PROP_NUM_RUNS: &str = "num_runs";
/// Memory budget in KB.
pub const PROP_MEMORY_LIMIT: &str = "memory_limit";
/// Server-enforced run time in seconds (`0` = not enforced).
pub const PROP_TIME_LIMIT: &str = "time_limit";
pub const PROP_RUN_DIR: &str = "run_dir";
pub const PROP_PORT: &str = "port";
pub const PROP_BUILD_KEY: &str = "build_key";

pub const PROP_DOMAINS: &str = "domains";
pub const PROP_ALGORITHMS: &str = "algorithms";
pub const PROP_REVISIONS: &str = "revisions";
pub const PROP_TIME_LIMIT_PER_STEP: &str = "time_limit_per_step";

pub const PROP_TOTAL_TIME: &str = "total_time";
pub const PROP_TOTAL_REWARD: &str = "total_reward";
pub const PROP_AVERAGE_REWARD: &str = "average_reward";
pub const PROP_ROUND_REWARDS: &str = "round_reward-all";
pub const PROP_STEP_REWARDS: &str = "reward_step-all";

/// Normalized quality score in `[0, 1]` for runs within known bounds.
pub const PROP_QUALITY_SCORE: &str = "ipc_score";

pub const PROP_PLANNER_EXIT_CODE: &str = "planner_exit_code";
pub const PROP_SERVER_EXIT_CODE: &str = "server_exit_code";
pub const PROP_RUNTIME_FAILURE: &str = "runtime_failure";
pub const PROP_PARSE_ERRORS: &str = "parse_errors";
pub const PROP_SERVER_READY_MS: &str = "server_ready_ms";
pub const PROP_WALL_TIME: &str = "wall_time";
