//! Serialized task execution.
//!
//! Operations that read, modify and write shared state are not atomic on
//! their own. Every mutating operation of a logical domain is pushed to that
//! domain's [`SerialTaskQueue`], which linearizes them. Different domains
//! run independently of each other.

mod domain;
mod serial;

pub use domain::{DomainQueues, QueueDomain};
pub use serial::{SerialTaskQueue, TaskError, TaskHandle};

/// Tracing target for serial queue operations.
pub const TRACING_TARGET: &str = "flare_core::queue";
