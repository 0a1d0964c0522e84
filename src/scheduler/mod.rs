//! Process table and SRTF scheduling core.
//!
//! - [`table`]: fixed-capacity slots and the allocation policy
//! - [`accountant`]: wall-clock charging of the running job
//! - [`engine`]: the [`Scheduler`] state and its preempt-then-dispatch step
//! - [`ops`]: run/stop/resume/kill/list/exit operations
//! - [`observer`]: reconciliation of jobs that exited on their own

pub mod accountant;
pub mod engine;
pub mod job;
pub mod observer;
pub mod ops;
pub mod table;

pub use accountant::{Accountant, Clock, ManualClock, SystemClock};
pub use engine::Scheduler;
pub use job::{JobRecord, JobSnapshot, JobStatus};
pub use ops::Outcome;
pub use table::ProcessTable;
