use nix::errno::Errno;
use nix::unistd::Pid;
use thiserror::Error;

use crate::process::JobSignal;

#[derive(Error, Debug)]
pub enum ManagerError {
    #[error("Invalid arguments: {0}")]
    Validation(String),

    #[error("Process {0} not found")]
    NotFound(Pid),

    #[error("Process {pid} {reason}")]
    NotApplicable { pid: Pid, reason: &'static str },

    #[error("Maximum number of processes reached ({0})")]
    Capacity(usize),

    #[error("Failed to start {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to send {signal} to process {pid}: {source}")]
    Signal {
        pid: Pid,
        signal: JobSignal,
        #[source]
        source: Errno,
    },

    #[error("Unknown command: {0}")]
    UnknownCommand(String),

    #[error("Startup failed: {0}")]
    Startup(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ManagerError {
    pub fn signal(pid: Pid, signal: JobSignal, source: Errno) -> Self {
        ManagerError::Signal {
            pid,
            signal,
            source,
        }
    }

    /// True when a signal failed because the target no longer exists.
    pub fn is_gone(&self) -> bool {
        matches!(
            self,
            ManagerError::Signal {
                source: Errno::ESRCH,
                ..
            }
        )
    }
}

pub type Result<T> = std::result::Result<T, ManagerError>;
