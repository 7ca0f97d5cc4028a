mod limits;
pub use limits::{RlimitConfig, attach_rlimits};

mod log;
