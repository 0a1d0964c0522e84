use nix::unistd::Pid;

use crate::config::{ManagerConfig, RuntimeArgMode};
use crate::error::{ManagerError, Result};
use crate::process::{JobSignal, ProcessControl};
use crate::scheduler::accountant::{Accountant, Clock};
use crate::scheduler::job::JobStatus;
use crate::scheduler::table::ProcessTable;

/// Process table plus the state of the single CPU it schedules onto.
///
/// Invariant: at most one record is `Running`, and `running` points at it.
/// The only transitions between `Ready` and `Running` happen in
/// [`Scheduler::reschedule`] and in admission to an idle table.
pub struct Scheduler {
    pub(crate) table: ProcessTable,
    pub(crate) running: Option<usize>,
    pub(crate) accountant: Accountant,
    pub(crate) clock: Box<dyn Clock>,
    pub(crate) procs: Box<dyn ProcessControl>,
    pub(crate) runtime_arg: RuntimeArgMode,
    /// Pids of overwritten slots whose process had not exited yet
    pub(crate) pending_reap: Vec<Pid>,
}

impl Scheduler {
    pub fn new(
        config: &ManagerConfig,
        procs: Box<dyn ProcessControl>,
        clock: Box<dyn Clock>,
    ) -> Self {
        let epoch = clock.now();
        Self {
            table: ProcessTable::with_capacity(config.max_slots),
            running: None,
            accountant: Accountant::new(epoch),
            clock,
            procs,
            runtime_arg: config.runtime_arg,
            pending_reap: Vec::new(),
        }
    }

    pub fn table(&self) -> &ProcessTable {
        &self.table
    }

    pub fn running_slot(&self) -> Option<usize> {
        self.running
    }

    pub fn running_pid(&self) -> Option<Pid> {
        self.running
            .and_then(|slot| self.table.get(slot))
            .and_then(|r| r.pid)
    }

    /// Processes no longer in the table that still have to be collected
    pub fn pending_reap(&self) -> &[Pid] {
        &self.pending_reap
    }

    pub fn accounting_epoch(&self) -> i64 {
        self.accountant.epoch()
    }

    /// Periodic accounting for the running job, if any
    pub fn refresh(&mut self) {
        self.charge_running();
    }

    /// One SRTF decision: preempt the running job, then dispatch the ready
    /// job with the least remaining runtime.
    ///
    /// Returns the slot now running, or `None` when nothing is ready. A
    /// failed signal leaves no record marked `Running` that was not
    /// actually continued. When a continue is refused the next-shortest
    /// ready job is tried; the error is returned only if none could run.
    pub fn reschedule(&mut self) -> Result<Option<usize>> {
        if let Some(slot) = self.running {
            let pid = self.pid_at(slot)?;
            if let Err(errno) = self.procs.signal(pid, JobSignal::Suspend) {
                let err = ManagerError::signal(pid, JobSignal::Suspend, errno);
                if err.is_gone() {
                    self.mark_gone(slot);
                }
                tracing::warn!(%pid, slot, error = %err, "Preemption failed");
                return Err(err);
            }
            self.charge_running();
            if let Some(record) = self.table.get_mut(slot) {
                record.status = JobStatus::Ready;
            }
            self.running = None;
            tracing::debug!(%pid, slot, "Preempted job");
        }

        // A slot whose continue was refused sits out the rest of this pass
        let mut refused: Vec<usize> = Vec::new();
        let mut last_err = None;
        loop {
            let Some(slot) = self.shortest_ready(&refused) else {
                return match last_err {
                    Some(err) => Err(err),
                    None => Ok(None),
                };
            };
            match self.dispatch(slot) {
                Ok(()) => return Ok(Some(slot)),
                Err(err) => {
                    if !err.is_gone() {
                        refused.push(slot);
                    }
                    last_err = Some(err);
                }
            }
        }
    }

    /// Continue the job in `slot` and open its accounting window.
    ///
    /// On failure the record is rolled back to `Ready`, or marked
    /// `Terminated` when the process no longer exists.
    fn dispatch(&mut self, slot: usize) -> Result<()> {
        let pid = self.pid_at(slot)?;

        if let Some(record) = self.table.get_mut(slot) {
            record.status = JobStatus::Running;
        }
        self.running = Some(slot);

        if let Err(errno) = self.procs.signal(pid, JobSignal::Continue) {
            let err = ManagerError::signal(pid, JobSignal::Continue, errno);
            self.running = None;
            if err.is_gone() {
                self.mark_gone(slot);
            } else if let Some(record) = self.table.get_mut(slot) {
                record.status = JobStatus::Ready;
            }
            tracing::warn!(%pid, slot, error = %err, "Dispatch failed");
            return Err(err);
        }

        self.accountant.start(self.clock.now());
        tracing::debug!(
            %pid,
            slot,
            remaining = ?self.table.get(slot).map(|r| r.remaining_runtime),
            "Dispatched job"
        );
        Ok(())
    }

    /// Ready slot with the least remaining runtime; ties go to the lowest slot.
    fn shortest_ready(&self, skip: &[usize]) -> Option<usize> {
        let mut best: Option<(usize, i64)> = None;
        for (slot, record) in self.table.iter() {
            if record.status != JobStatus::Ready || skip.contains(&slot) {
                continue;
            }
            match best {
                Some((_, min)) if record.remaining_runtime >= min => {}
                _ => best = Some((slot, record.remaining_runtime)),
            }
        }
        best.map(|(slot, _)| slot)
    }

    /// Charge the running job for time since the epoch.
    pub(crate) fn charge_running(&mut self) {
        let Some(slot) = self.running else {
            return;
        };
        let now = self.clock.now();
        if let Some(record) = self.table.get_mut(slot) {
            self.accountant.charge(record, now);
        }
    }

    /// The OS reports the process no longer exists: record it as terminated.
    pub(crate) fn mark_gone(&mut self, slot: usize) {
        if self.running == Some(slot) {
            self.charge_running();
            self.running = None;
        }
        if let Some(record) = self.table.get_mut(slot) {
            record.status = JobStatus::Terminated;
        }
    }

    /// SIGTERM, then SIGCONT so a suspended job actually receives it.
    pub(crate) fn hard_terminate(&mut self, pid: Pid) -> Result<()> {
        self.procs
            .signal(pid, JobSignal::Terminate)
            .map_err(|errno| ManagerError::signal(pid, JobSignal::Terminate, errno))?;
        if let Err(errno) = self.procs.signal(pid, JobSignal::Continue) {
            tracing::debug!(%pid, error = %errno, "Continue after terminate failed");
        }
        Ok(())
    }

    pub(crate) fn pid_at(&self, slot: usize) -> Result<Pid> {
        self.table
            .get(slot)
            .and_then(|r| r.pid)
            .ok_or_else(|| ManagerError::Validation(format!("slot {} holds no process", slot)))
    }
}
