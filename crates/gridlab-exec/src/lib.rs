//! Process-level execution: build steps, revision builds and run launches.
mod error;
pub use error::{ExecError, RuntimeFailure};

mod utils;
pub use utils::{RlimitConfig, attach_rlimits};

pub mod build;
pub use build::{BuildRecipe, GitBuildBackend};

pub mod launch;
pub use launch::{LaunchOutcome, LaunchSpec, RunLauncher};

pub mod subprocess;
