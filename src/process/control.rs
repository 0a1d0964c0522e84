use std::process::{Command, Stdio};

use nix::errno::Errno;
use nix::sys::signal::{kill, Signal};
use nix::sys::wait::{waitpid, WaitPidFlag, WaitStatus};
use nix::unistd::Pid;

/// Signals the scheduler sends to a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JobSignal {
    Suspend,
    Continue,
    Terminate,
}

impl JobSignal {
    pub fn as_signal(self) -> Signal {
        match self {
            JobSignal::Suspend => Signal::SIGSTOP,
            JobSignal::Continue => Signal::SIGCONT,
            JobSignal::Terminate => Signal::SIGTERM,
        }
    }
}

impl std::fmt::Display for JobSignal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_signal().as_str())
    }
}

/// How a reaped job ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobExit {
    Code(i32),
    Signaled(Signal),
    /// The process was already collected elsewhere.
    Unknown,
}

impl std::fmt::Display for JobExit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobExit::Code(code) => write!(f, "exit code {}", code),
            JobExit::Signaled(sig) => write!(f, "signal {}", sig.as_str()),
            JobExit::Unknown => write!(f, "unknown"),
        }
    }
}

pub trait ProcessControl: Send {
    /// Start `program` with `args`. The job runs immediately.
    fn spawn(&mut self, program: &str, args: &[String]) -> std::io::Result<Pid>;

    fn signal(&mut self, pid: Pid, signal: JobSignal) -> nix::Result<()>;

    /// Collect `pid` if it has exited. Never blocks; `Ok(None)` means still alive.
    fn try_reap(&mut self, pid: Pid) -> nix::Result<Option<JobExit>>;
}

/// Runs jobs as direct children of the manager process.
#[derive(Debug, Clone, Default)]
pub struct UnixProcessControl;

impl UnixProcessControl {
    pub fn new() -> Self {
        Self
    }
}

impl ProcessControl for UnixProcessControl {
    fn spawn(&mut self, program: &str, args: &[String]) -> std::io::Result<Pid> {
        // stdin belongs to the front end; jobs keep stdout/stderr
        let child = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .spawn()?;

        let pid = Pid::from_raw(child.id() as i32);
        tracing::debug!(%pid, program, ?args, "Spawned job");

        // Dropping the handle neither kills nor waits; reaping goes through try_reap
        drop(child);
        Ok(pid)
    }

    fn signal(&mut self, pid: Pid, signal: JobSignal) -> nix::Result<()> {
        kill(pid, signal.as_signal())
    }

    fn try_reap(&mut self, pid: Pid) -> nix::Result<Option<JobExit>> {
        match waitpid(pid, Some(WaitPidFlag::WNOHANG)) {
            Ok(WaitStatus::Exited(_, code)) => Ok(Some(JobExit::Code(code))),
            Ok(WaitStatus::Signaled(_, sig, _)) => Ok(Some(JobExit::Signaled(sig))),
            Ok(_) => Ok(None),
            Err(Errno::ECHILD) => Ok(Some(JobExit::Unknown)),
            Err(e) => Err(e),
        }
    }
}
