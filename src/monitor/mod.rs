//! Runtime instrumentation.
//!
//! Diagnostics only: operation timings and component memory probes feed
//! health reports, but no correctness decision depends on them.

mod memory;
mod performance;

pub use memory::{ComponentUsage, MemoryManager, MemoryReport};
pub use performance::{OperationStats, PerformanceMonitor, PerformanceReport};
