use std::time::Duration;

/// Number of slots in the process table.
pub const DEFAULT_MAX_SLOTS: usize = 64;

/// How the trailing runtime token of a `run` command reaches the spawned program.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RuntimeArgMode {
    /// The runtime hint is consumed by the manager and not passed to the program.
    #[default]
    Strip,
    /// The runtime hint is also appended to the program's arguments.
    Forward,
}

/// Rendering used for the `list` command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ListFormat {
    /// One `<pid>, <statusCode>` line per slot.
    #[default]
    Table,
    /// A single JSON array line.
    Json,
}

#[derive(Debug, Clone)]
pub struct ManagerConfig {
    /// Capacity of the process table
    pub max_slots: usize,
    /// Sleep between control loop polls
    pub poll_interval_ms: u64,
    /// Longest accepted command line in bytes; the remainder is ignored
    pub max_line_len: usize,
    /// Most tokens a single command may contain, command name included
    pub max_args: usize,
    pub runtime_arg: RuntimeArgMode,
    pub list_format: ListFormat,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            max_slots: DEFAULT_MAX_SLOTS,
            poll_interval_ms: 100,
            max_line_len: 80,
            max_args: 10,
            runtime_arg: RuntimeArgMode::default(),
            list_format: ListFormat::default(),
        }
    }
}

impl ManagerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_slots(mut self, max_slots: usize) -> Self {
        self.max_slots = max_slots;
        self
    }

    pub fn with_poll_interval_ms(mut self, poll_interval_ms: u64) -> Self {
        self.poll_interval_ms = poll_interval_ms;
        self
    }

    pub fn with_runtime_arg(mut self, mode: RuntimeArgMode) -> Self {
        self.runtime_arg = mode;
        self
    }

    pub fn with_list_format(mut self, format: ListFormat) -> Self {
        self.list_format = format;
        self
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}
