use nix::unistd::Pid;
use serde::Serialize;

/// Lifecycle state of a table slot.
///
/// The numeric codes are what `list` prints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Running,
    Ready,
    Stopped,
    Terminated,
    Unused,
}

impl JobStatus {
    pub fn code(self) -> u8 {
        match self {
            JobStatus::Running => 0,
            JobStatus::Ready => 1,
            JobStatus::Stopped => 2,
            JobStatus::Terminated => 3,
            JobStatus::Unused => 4,
        }
    }

    /// Live jobs still hold an OS process the manager may signal.
    pub fn is_live(self) -> bool {
        !matches!(self, JobStatus::Terminated | JobStatus::Unused)
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobStatus::Running => write!(f, "running"),
            JobStatus::Ready => write!(f, "ready"),
            JobStatus::Stopped => write!(f, "stopped"),
            JobStatus::Terminated => write!(f, "terminated"),
            JobStatus::Unused => write!(f, "unused"),
        }
    }
}

/// One slot of the process table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobRecord {
    pub pid: Option<Pid>,
    pub status: JobStatus,
    /// Seconds of budget left. A priority hint only; may go negative.
    pub remaining_runtime: i64,
    /// Set once the exited process has been collected.
    pub reaped: bool,
}

impl Default for JobRecord {
    fn default() -> Self {
        Self::unused()
    }
}

impl JobRecord {
    pub fn unused() -> Self {
        Self {
            pid: None,
            status: JobStatus::Unused,
            remaining_runtime: 0,
            reaped: false,
        }
    }

    /// A freshly spawned job waiting for the scheduler.
    pub fn admitted(pid: Pid, remaining_runtime: i64) -> Self {
        Self {
            pid: Some(pid),
            status: JobStatus::Ready,
            remaining_runtime,
            reaped: false,
        }
    }

    pub fn snapshot(&self) -> Option<JobSnapshot> {
        if self.status == JobStatus::Unused {
            return None;
        }
        Some(JobSnapshot {
            pid: self.pid.map(Pid::as_raw).unwrap_or_default(),
            status: self.status,
            remaining_runtime: self.remaining_runtime,
        })
    }
}

/// Read-only view of a slot, as reported by `list`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct JobSnapshot {
    pub pid: i32,
    pub status: JobStatus,
    pub remaining_runtime: i64,
}
