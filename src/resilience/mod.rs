//! Resilience layer: timeouts, idle watchdogs, circuit breaker, and the
//! delegated-task supervisor with multi-path cleanup.

pub mod breaker;
pub mod idle;
pub mod supervisor;
pub mod timeout;

pub use breaker::TaskBreaker;
pub use idle::{IdleAlert, IdleTimeout, IdleTimeoutHandle};
pub use supervisor::{TaskDecision, TaskSupervisor};
pub use timeout::with_timeout;
