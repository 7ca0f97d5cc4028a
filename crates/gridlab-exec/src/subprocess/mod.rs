//! Child processes for build steps.
//!
//! Each step runs to completion; output is forwarded line by line into the log and a non-zero
//! exit status becomes [`ExecError::NonZeroExit`](crate::ExecError::NonZeroExit).
mod logger;
pub use logger::{LogConfig, OutputLevel};

mod step;
pub use step::StepCommand;
