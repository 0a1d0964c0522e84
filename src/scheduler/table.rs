use nix::unistd::Pid;

use crate::config::DEFAULT_MAX_SLOTS;
use crate::scheduler::job::{JobRecord, JobSnapshot, JobStatus};

/// Fixed-capacity registry of job records, keyed by slot index.
///
/// Lookups are linear scans in slot order. That is O(capacity) per call,
/// which is fine for a table of a few dozen slots.
#[derive(Debug, Clone)]
pub struct ProcessTable {
    slots: Vec<JobRecord>,
}

impl Default for ProcessTable {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcessTable {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_MAX_SLOTS)
    }

    pub fn with_capacity(max_slots: usize) -> Self {
        Self {
            slots: vec![JobRecord::unused(); max_slots],
        }
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// First slot never used since startup
    pub fn find_unused(&self) -> Option<usize> {
        self.position(|r| r.status == JobStatus::Unused)
    }

    /// First slot whose job has terminated
    pub fn find_terminated(&self) -> Option<usize> {
        self.position(|r| r.status == JobStatus::Terminated)
    }

    /// Slot holding `pid`.
    ///
    /// Once a job is reaped the OS may hand its pid to a new job, so a record
    /// that has not been reaped wins over an older reaped one.
    pub fn find_by_pid(&self, pid: Pid) -> Option<usize> {
        let holds = |r: &JobRecord| r.status != JobStatus::Unused && r.pid == Some(pid);
        self.position(|r| holds(r) && !r.reaped)
            .or_else(|| self.position(holds))
    }

    /// Slot for a new admission: an unused slot first, then a terminated one.
    /// Live jobs are never evicted.
    pub fn allocate(&self) -> Option<usize> {
        self.find_unused().or_else(|| self.find_terminated())
    }

    pub fn get(&self, slot: usize) -> Option<&JobRecord> {
        self.slots.get(slot)
    }

    pub fn get_mut(&mut self, slot: usize) -> Option<&mut JobRecord> {
        self.slots.get_mut(slot)
    }

    /// Overwrite a slot. Out-of-range slots are ignored.
    pub fn put(&mut self, slot: usize, record: JobRecord) {
        if let Some(existing) = self.slots.get_mut(slot) {
            *existing = record;
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, &JobRecord)> {
        self.slots.iter().enumerate()
    }

    /// Snapshot of every slot in use, in slot order
    pub fn list_all(&self) -> Vec<JobSnapshot> {
        self.slots.iter().filter_map(JobRecord::snapshot).collect()
    }

    pub fn count(&self, status: JobStatus) -> usize {
        self.slots.iter().filter(|r| r.status == status).count()
    }

    fn position(&self, pred: impl Fn(&JobRecord) -> bool) -> Option<usize> {
        self.slots.iter().position(pred)
    }
}
