mod backoff;
pub use backoff::BackoffStrategy;

mod readiness;
pub use readiness::ReadinessStrategy;
