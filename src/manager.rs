use std::io::Write;

use tokio::signal::unix::{signal, SignalKind};
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::config::{ListFormat, ManagerConfig};
use crate::error::{ManagerError, Result};
use crate::process::ProcessControl;
use crate::request::{self, Request};
use crate::scheduler::{Clock, JobSnapshot, Outcome, Scheduler};

/// Something the control loop reacts to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// One raw command line from the front end
    Line(String),
    /// The OS reported that one or more children exited
    ChildExited,
    /// Poll interval elapsed with nothing else to do
    Tick,
    /// SIGINT/SIGTERM received
    Shutdown,
    /// The front end closed the command channel
    Closed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Exit,
}

/// Owns the scheduler and serializes every event that touches it.
///
/// Exits reported by the OS arrive as [`Event::ChildExited`] in the same
/// loop as commands, so the table only ever has one writer.
pub struct Manager {
    config: ManagerConfig,
    scheduler: Scheduler,
}

impl Manager {
    pub fn new(
        config: ManagerConfig,
        procs: Box<dyn ProcessControl>,
        clock: Box<dyn Clock>,
    ) -> Self {
        let scheduler = Scheduler::new(&config, procs, clock);
        Self { config, scheduler }
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    /// Run the control loop, writing operator output to stdout.
    pub async fn run(
        self,
        commands: mpsc::Receiver<String>,
        shutdown: CancellationToken,
    ) -> Result<()> {
        self.run_with_output(commands, shutdown, std::io::stdout())
            .await
    }

    /// Run the control loop until `exit`, a shutdown signal, or the
    /// command channel closing.
    ///
    /// Each iteration handles one event and then either charges the running
    /// job or, if nothing is running, asks the engine for a decision.
    ///
    /// # Errors
    ///
    /// Fails if the child-exit notification cannot be registered or the
    /// output cannot be written. Rejected commands are reported, not returned.
    pub async fn run_with_output<W: Write>(
        mut self,
        mut commands: mpsc::Receiver<String>,
        shutdown: CancellationToken,
        mut out: W,
    ) -> Result<()> {
        let mut child_exits = signal(SignalKind::child()).map_err(|e| {
            ManagerError::Startup(format!("failed to install SIGCHLD handler: {}", e))
        })?;

        let mut poll = tokio::time::interval(self.config.poll_interval());
        poll.set_missed_tick_behavior(MissedTickBehavior::Delay);

        tracing::info!(
            max_slots = self.config.max_slots,
            poll_interval_ms = self.config.poll_interval_ms,
            "Process manager started"
        );

        loop {
            let event = tokio::select! {
                biased;
                _ = shutdown.cancelled() => Event::Shutdown,
                Some(()) = child_exits.recv() => Event::ChildExited,
                line = commands.recv() => match line {
                    Some(line) => Event::Line(line),
                    None => Event::Closed,
                },
                _ = poll.tick() => Event::Tick,
            };

            let flow = self.step(event, &mut out)?;
            out.flush()?;
            if flow == Flow::Exit {
                break;
            }
        }
        Ok(())
    }

    /// Handle one event, then settle the scheduler.
    pub fn step<W: Write>(&mut self, event: Event, out: &mut W) -> Result<Flow> {
        let flow = match event {
            Event::Line(line) => self.handle_line(&line, out)?,
            Event::ChildExited => {
                self.scheduler.observe_exits();
                Flow::Continue
            }
            Event::Tick => Flow::Continue,
            Event::Shutdown | Event::Closed => {
                tracing::info!("Shutting down");
                self.shutdown(out)?;
                Flow::Exit
            }
        };

        if flow == Flow::Continue {
            self.settle();
        }
        Ok(flow)
    }

    fn settle(&mut self) {
        if self.scheduler.running_slot().is_some() {
            self.scheduler.refresh();
        } else if let Err(e) = self.scheduler.reschedule() {
            tracing::warn!(error = %e, "Scheduling failed");
        }
    }

    fn handle_line<W: Write>(&mut self, line: &str, out: &mut W) -> Result<Flow> {
        let request = match request::parse(line, &self.config) {
            Ok(Some(request)) => request,
            Ok(None) => return Ok(Flow::Continue),
            Err(e) => {
                tracing::debug!(line, error = %e, "Rejected command");
                writeln!(out, "error: {}", e)?;
                return Ok(Flow::Continue);
            }
        };

        let result = match request {
            Request::Run {
                program,
                args,
                runtime,
            } => self.scheduler.admit(&program, &args, runtime),
            Request::Stop(pid) => self.scheduler.stop(pid),
            Request::Resume(pid) => self.scheduler.resume(pid),
            Request::Kill(pid) => self.scheduler.terminate(pid),
            Request::List => Ok(self.scheduler.list()),
            Request::Exit => {
                self.shutdown(out)?;
                return Ok(Flow::Exit);
            }
        };

        match result {
            Ok(outcome) => self.render(&outcome, out)?,
            Err(e) => {
                tracing::debug!(line, error = %e, "Command failed");
                writeln!(out, "error: {}", e)?;
            }
        }
        Ok(Flow::Continue)
    }

    fn shutdown<W: Write>(&mut self, out: &mut W) -> Result<()> {
        let outcome = self.scheduler.shutdown();
        self.render(&outcome, out)
    }

    fn render<W: Write>(&self, outcome: &Outcome, out: &mut W) -> Result<()> {
        match outcome {
            Outcome::Started { pid, slot } => {
                writeln!(out, "Process {} started in slot {}", pid, slot)?
            }
            Outcome::Stopped(pid) => writeln!(out, "Process {} stopped", pid)?,
            Outcome::Resumed(pid) => writeln!(out, "Process {} resumed", pid)?,
            Outcome::Killed(pid) => writeln!(out, "Process {} terminated", pid)?,
            Outcome::Listed(entries) => self.render_list(entries, out)?,
            Outcome::ShutDown { failures, .. } => {
                for failure in failures {
                    writeln!(out, "error: {}", failure)?;
                }
                writeln!(out, "Exiting the process manager!")?;
            }
        }
        Ok(())
    }

    fn render_list<W: Write>(&self, entries: &[JobSnapshot], out: &mut W) -> Result<()> {
        match self.config.list_format {
            ListFormat::Json => {
                let json = serde_json::to_string(entries).map_err(std::io::Error::from)?;
                writeln!(out, "{}", json)?;
            }
            ListFormat::Table => {
                if entries.is_empty() {
                    writeln!(out, "No processes to list.")?;
                }
                for entry in entries {
                    writeln!(out, "{}, {}", entry.pid, entry.status.code())?;
                }
            }
        }
        Ok(())
    }
}
