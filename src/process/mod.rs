//! OS boundary for managed jobs.
//!
//! The scheduler never touches processes directly. Everything it needs from
//! the operating system goes through [`ProcessControl`]:
//! - **Spawning**: start a program with its arguments, returning its pid
//! - **Signalling**: stop, continue and terminate a job
//! - **Reaping**: collect an exited job without blocking
//!
//! [`UnixProcessControl`] is the real backend. Tests substitute a scripted
//! implementation so the scheduling logic can be driven deterministically.

pub mod control;

pub use control::{JobExit, JobSignal, ProcessControl, UnixProcessControl};
