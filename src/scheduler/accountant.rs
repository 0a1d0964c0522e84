use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use chrono::Utc;

use crate::scheduler::job::JobRecord;

/// Wall-clock source with one-second resolution.
pub trait Clock: Send + Sync {
    /// Seconds since the Unix epoch
    fn now(&self) -> i64;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> i64 {
        Utc::now().timestamp()
    }
}

/// Clock that only moves when told to. Clones share the same time.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    secs: Arc<AtomicI64>,
}

impl ManualClock {
    pub fn new(start: i64) -> Self {
        Self {
            secs: Arc::new(AtomicI64::new(start)),
        }
    }

    pub fn advance(&self, secs: i64) {
        self.secs.fetch_add(secs, Ordering::SeqCst);
    }

    pub fn set(&self, secs: i64) {
        self.secs.store(secs, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> i64 {
        self.secs.load(Ordering::SeqCst)
    }
}

/// Charges elapsed wall-clock time against the running job.
///
/// The epoch marks the start of the current uncharged window. Every charge
/// closes the window, so each boundary must be charged exactly once.
#[derive(Debug, Clone, Default)]
pub struct Accountant {
    epoch: i64,
}

impl Accountant {
    pub fn new(epoch: i64) -> Self {
        Self { epoch }
    }

    pub fn epoch(&self) -> i64 {
        self.epoch
    }

    /// Open a new window for a job that just started running
    pub fn start(&mut self, now: i64) {
        self.epoch = now;
    }

    /// Subtract whole seconds since the epoch from `record`. Returns the amount charged.
    pub fn charge(&mut self, record: &mut JobRecord, now: i64) -> i64 {
        let elapsed = now - self.epoch;
        if elapsed <= 0 {
            return 0;
        }
        record.remaining_runtime -= elapsed;
        self.epoch = now;
        elapsed
    }
}
