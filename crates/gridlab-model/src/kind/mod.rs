mod scheduler;
pub use scheduler::SchedulerKind;

mod value;
pub use value::ValueType;
