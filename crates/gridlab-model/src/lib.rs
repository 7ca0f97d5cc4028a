mod domain;
pub use domain::constants;
pub use domain::{Env, Properties};

mod error;
pub use error::{ModelError, ModelResult};

mod kind;
pub use kind::{SchedulerKind, ValueType};

mod spec;
pub use spec::{BuildKey, ConfigSpec, MemoryLimit, Task, TaskKey};

mod strategy;
pub use strategy::{BackoffStrategy, ReadinessStrategy};
