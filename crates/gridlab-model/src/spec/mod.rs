mod build_key;
pub use build_key::BuildKey;

mod config;
pub use config::ConfigSpec;

mod memory;
pub use memory::MemoryLimit;

mod task;
pub use task::{Task, TaskKey};
