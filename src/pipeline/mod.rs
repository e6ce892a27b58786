//! Monitoring pipeline.
//!
//! - `decision`: notification gates (budget, novelty, recency)
//! - `monitor`: one cycle over all sources
//! - `schedule`: the long-running loop around cycles

pub mod decision;
pub mod monitor;
pub mod schedule;

pub use decision::{Decision, MonitorPolicy, decide};
pub use monitor::Monitor;
pub use schedule::{ScheduleConfig, Scheduler, shutdown_signal};
