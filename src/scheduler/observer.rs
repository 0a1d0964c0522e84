use nix::unistd::Pid;

use crate::process::JobExit;
use crate::scheduler::engine::Scheduler;
use crate::scheduler::job::JobStatus;

impl Scheduler {
    /// Reconcile the table with jobs that have exited on their own.
    ///
    /// Collects every tracked process that has exited, without blocking, and
    /// marks its slot terminated. Processes evicted from reused slots are
    /// collected too. A running job that exited is charged and
    /// `running` is cleared, but nothing is rescheduled here: the control
    /// loop does that on its next iteration.
    pub fn observe_exits(&mut self) -> Vec<(Pid, JobExit)> {
        let pending: Vec<(usize, Pid)> = self
            .table
            .iter()
            .filter(|(_, r)| r.status != JobStatus::Unused && !r.reaped)
            .filter_map(|(slot, r)| r.pid.map(|pid| (slot, pid)))
            .collect();

        let mut exited = self.collect_pending();
        for (slot, pid) in pending {
            let exit = match self.procs.try_reap(pid) {
                Ok(Some(exit)) => exit,
                Ok(None) => continue,
                Err(e) => {
                    tracing::warn!(%pid, slot, error = %e, "Failed to reap job");
                    continue;
                }
            };

            if self.running == Some(slot) {
                self.charge_running();
                self.running = None;
            }
            if let Some(record) = self.table.get_mut(slot) {
                record.reaped = true;
                record.status = JobStatus::Terminated;
            }
            tracing::info!(%pid, slot, %exit, "Job exited");
            exited.push((pid, exit));
        }
        exited
    }

    /// Reap processes whose slot has already been reused.
    fn collect_pending(&mut self) -> Vec<(Pid, JobExit)> {
        let mut exited = Vec::new();
        let mut still_alive = Vec::new();
        for pid in std::mem::take(&mut self.pending_reap) {
            match self.procs.try_reap(pid) {
                Ok(Some(exit)) => {
                    tracing::info!(%pid, %exit, "Collected job from a reused slot");
                    exited.push((pid, exit));
                }
                Ok(None) => still_alive.push(pid),
                Err(e) => {
                    tracing::warn!(%pid, error = %e, "Failed to reap job");
                    still_alive.push(pid);
                }
            }
        }
        self.pending_reap = still_alive;
        exited
    }
}
