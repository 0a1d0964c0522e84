use nix::unistd::Pid;

use crate::config::RuntimeArgMode;
use crate::error::{ManagerError, Result};
use crate::process::JobSignal;
use crate::scheduler::engine::Scheduler;
use crate::scheduler::job::{JobRecord, JobSnapshot, JobStatus};

/// Successful result of a command operation.
#[derive(Debug)]
pub enum Outcome {
    Started { pid: Pid, slot: usize },
    Stopped(Pid),
    Resumed(Pid),
    Killed(Pid),
    Listed(Vec<JobSnapshot>),
    ShutDown {
        terminated: usize,
        failures: Vec<ManagerError>,
    },
}

impl Scheduler {
    /// Spawn `program` and admit it with a runtime hint of `runtime` seconds.
    pub fn admit(&mut self, program: &str, args: &[String], runtime: i64) -> Result<Outcome> {
        if program.is_empty() {
            return Err(ManagerError::Validation("missing program".to_string()));
        }
        if runtime <= 0 {
            return Err(ManagerError::Validation(
                "runtime must be a number > 0".to_string(),
            ));
        }

        let slot = self
            .table
            .allocate()
            .ok_or(ManagerError::Capacity(self.table.capacity()))?;
        self.collect_before_reuse(slot);

        let mut argv = args.to_vec();
        if self.runtime_arg == RuntimeArgMode::Forward {
            argv.push(runtime.to_string());
        }
        let pid = self
            .procs
            .spawn(program, &argv)
            .map_err(|source| ManagerError::Spawn {
                program: program.to_string(),
                source,
            })?;

        let mut record = JobRecord::admitted(pid, runtime);
        if self.running.is_none() {
            record.status = JobStatus::Running;
            self.table.put(slot, record);
            self.running = Some(slot);
            self.accountant.start(self.clock.now());
        } else {
            self.table.put(slot, record);
            // Keep it off the CPU until the engine picks it
            if let Err(errno) = self.procs.signal(pid, JobSignal::Suspend) {
                tracing::warn!(%pid, slot, error = %errno, "Failed to suspend admitted job");
            }
        }
        tracing::info!(%pid, slot, program, runtime, "Job admitted");

        self.reschedule_logged("admission");
        Ok(Outcome::Started { pid, slot })
    }

    /// Suspend a running or ready job.
    pub fn stop(&mut self, pid: Pid) -> Result<Outcome> {
        let slot = self.lookup(pid)?;
        let status = self.status_at(slot);
        if !matches!(status, JobStatus::Running | JobStatus::Ready) {
            return Err(ManagerError::NotApplicable {
                pid,
                reason: "is not running",
            });
        }

        if let Err(errno) = self.procs.signal(pid, JobSignal::Suspend) {
            let err = ManagerError::signal(pid, JobSignal::Suspend, errno);
            if err.is_gone() {
                self.mark_gone(slot);
            }
            return Err(err);
        }

        let was_running = self.running == Some(slot);
        if was_running {
            self.charge_running();
            self.running = None;
        }
        if let Some(record) = self.table.get_mut(slot) {
            record.status = JobStatus::Stopped;
        }
        tracing::info!(%pid, slot, was_running, "Job stopped");

        if was_running {
            self.reschedule_logged("stop");
        }
        Ok(Outcome::Stopped(pid))
    }

    /// Make a stopped job eligible again; the engine decides whether it runs.
    pub fn resume(&mut self, pid: Pid) -> Result<Outcome> {
        let slot = self.lookup(pid)?;
        if self.status_at(slot) != JobStatus::Stopped {
            return Err(ManagerError::NotApplicable {
                pid,
                reason: "was not in STOPPED status",
            });
        }

        if let Some(record) = self.table.get_mut(slot) {
            record.status = JobStatus::Ready;
        }
        tracing::info!(%pid, slot, "Job resumed");

        self.reschedule_logged("resume");
        Ok(Outcome::Resumed(pid))
    }

    /// Terminate a job in any state except already terminated.
    pub fn terminate(&mut self, pid: Pid) -> Result<Outcome> {
        let slot = self.lookup(pid)?;
        if self.status_at(slot) == JobStatus::Terminated {
            return Err(ManagerError::NotApplicable {
                pid,
                reason: "is already terminated",
            });
        }

        if let Err(err) = self.hard_terminate(pid) {
            if err.is_gone() {
                self.mark_gone(slot);
            }
            return Err(err);
        }

        let was_running = self.running == Some(slot);
        if was_running {
            self.charge_running();
            self.running = None;
        }
        if let Some(record) = self.table.get_mut(slot) {
            record.status = JobStatus::Terminated;
        }
        tracing::info!(%pid, slot, was_running, "Job terminated");

        self.reschedule_logged("kill");
        Ok(Outcome::Killed(pid))
    }

    /// Terminate every live job. Individual failures are collected, never fatal.
    pub fn shutdown(&mut self) -> Outcome {
        self.charge_running();
        self.running = None;

        let live: Vec<(usize, Pid)> = self
            .table
            .iter()
            .filter(|(_, r)| r.status.is_live())
            .filter_map(|(slot, r)| r.pid.map(|pid| (slot, pid)))
            .collect();

        let mut failures = Vec::new();
        for (slot, pid) in &live {
            if let Err(err) = self.hard_terminate(*pid) {
                tracing::warn!(%pid, slot, error = %err, "Failed to terminate job during shutdown");
                failures.push(err);
            }
            if let Some(record) = self.table.get_mut(*slot) {
                record.status = JobStatus::Terminated;
            }
        }
        tracing::info!(
            terminated = live.len(),
            failures = failures.len(),
            "Shutdown complete"
        );

        Outcome::ShutDown {
            terminated: live.len(),
            failures,
        }
    }

    pub fn list(&self) -> Outcome {
        Outcome::Listed(self.table.list_all())
    }

    fn lookup(&self, pid: Pid) -> Result<usize> {
        if pid.as_raw() <= 0 {
            return Err(ManagerError::Validation(
                "the process ID must be a positive integer".to_string(),
            ));
        }
        self.table
            .find_by_pid(pid)
            .ok_or(ManagerError::NotFound(pid))
    }

    fn status_at(&self, slot: usize) -> JobStatus {
        self.table
            .get(slot)
            .map(|r| r.status)
            .unwrap_or(JobStatus::Unused)
    }

    /// Reap the previous occupant of a terminated slot. If it is still alive
    /// its pid moves to `pending_reap` for the observer to collect later.
    fn collect_before_reuse(&mut self, slot: usize) {
        let Some(record) = self.table.get(slot) else {
            return;
        };
        if record.status != JobStatus::Terminated || record.reaped {
            return;
        }
        if let Some(pid) = record.pid {
            match self.procs.try_reap(pid) {
                Ok(Some(exit)) => {
                    tracing::debug!(%pid, %exit, "Reaped job before slot reuse");
                    if let Some(record) = self.table.get_mut(slot) {
                        record.reaped = true;
                    }
                }
                Ok(None) => {
                    tracing::warn!(%pid, slot, "Reusing slot of a job that has not exited");
                    self.pending_reap.push(pid);
                }
                Err(e) => {
                    tracing::warn!(%pid, error = %e, "Failed to reap job before slot reuse");
                    self.pending_reap.push(pid);
                }
            }
        }
    }

    fn reschedule_logged(&mut self, trigger: &'static str) {
        if let Err(e) = self.reschedule() {
            tracing::warn!(trigger, error = %e, "Reschedule failed");
        }
    }
}
