//! Integration tests for the control loop.
//!
//! These drive a `Manager` over the scripted process backend, either one
//! event at a time through `step` or end to end through the async loop.


use std::time::Duration;

use nix::errno::Errno;
use nix::unistd::Pid;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use srtf_manager::config::{ListFormat, ManagerConfig};
use srtf_manager::manager::{Event, Flow, Manager};
use srtf_manager::process::JobSignal;
use srtf_manager::scheduler::JobStatus;
use test_harness::{assert_single_runner, remaining_of, status_of, test_manager, FIRST_PID};

/// Feed one command line and return what the manager printed for it.
fn send(manager: &mut Manager, line: &str) -> (Flow, String) {
    let mut out = Vec::new();
    let flow = manager
        .step(Event::Line(line.to_string()), &mut out)
        .expect("step should succeed");
    (flow, String::from_utf8(out).expect("utf-8 output"))
}

fn pid(n: i32) -> Pid {
    Pid::from_raw(FIRST_PID + n)
}

// ==================== Tests for Command output ====================

#[test]
fn test_run_reports_pid_and_slot() {
    let (mut manager, _procs, _clock) = test_manager(ManagerConfig::default());

    let (flow, out) = send(&mut manager, "run ./a 5");
    assert_eq!(flow, Flow::Continue);
    assert_eq!(out, format!("Process {} started in slot 0\n", pid(0)));

    let (_, out) = send(&mut manager, "run ./b x y 7");
    assert_eq!(out, format!("Process {} started in slot 1\n", pid(1)));
}

#[test]
fn test_stop_resume_kill_confirmations() {
    let (mut manager, _procs, _clock) = test_manager(ManagerConfig::default());
    send(&mut manager, "run ./a 5");

    let (_, out) = send(&mut manager, &format!("stop {}", pid(0)));
    assert_eq!(out, format!("Process {} stopped\n", pid(0)));

    let (_, out) = send(&mut manager, &format!("resume {}", pid(0)));
    assert_eq!(out, format!("Process {} resumed\n", pid(0)));
    assert_eq!(manager.scheduler().running_pid(), Some(pid(0)));

    let (_, out) = send(&mut manager, &format!("kill {}", pid(0)));
    assert_eq!(out, format!("Process {} terminated\n", pid(0)));
    assert_eq!(manager.scheduler().running_slot(), None);
}

#[test]
fn test_list_table_format() {
    let (mut manager, _procs, _clock) = test_manager(ManagerConfig::default());

    let (_, out) = send(&mut manager, "list");
    assert_eq!(out, "No processes to list.\n");

    send(&mut manager, "run ./a 5");
    send(&mut manager, "run ./b 9");
    send(&mut manager, "run ./c 7");
    send(&mut manager, &format!("stop {}", pid(2)));
    send(&mut manager, &format!("kill {}", pid(1)));

    let (_, out) = send(&mut manager, "list");
    assert_eq!(
        out,
        format!("{}, 0\n{}, 3\n{}, 2\n", pid(0), pid(1), pid(2))
    );
}

#[test]
fn test_list_json_format() {
    let config = ManagerConfig::default().with_list_format(ListFormat::Json);
    let (mut manager, _procs, _clock) = test_manager(config);

    let (_, out) = send(&mut manager, "list");
    assert_eq!(out, "[]\n");

    send(&mut manager, "run ./a 5");
    let (_, out) = send(&mut manager, "list");
    assert_eq!(
        out,
        format!(
            "[{{\"pid\":{},\"status\":\"running\",\"remaining_runtime\":5}}]\n",
            pid(0)
        )
    );
}

#[test]
fn test_rejected_commands_are_reported() {
    let (mut manager, _procs, _clock) = test_manager(ManagerConfig::default());

    let (flow, out) = send(&mut manager, "launch rocket");
    assert_eq!(flow, Flow::Continue);
    assert_eq!(out, "error: Unknown command: launch\n");

    let (_, out) = send(&mut manager, "kill 4242");
    assert_eq!(out, "error: Process 4242 not found\n");

    let (_, out) = send(&mut manager, "stop 0");
    assert!(out.starts_with("error: Invalid arguments"));

    let (_, out) = send(&mut manager, "run ./a 0");
    assert!(out.contains("runtime must be a number > 0"));

    let (_, out) = send(&mut manager, "run ./a soon");
    assert!(out.contains("runtime must be a number > 0"));

    assert!(manager.scheduler().table().list_all().is_empty());
}

#[test]
fn test_blank_line_prints_nothing() {
    let (mut manager, procs, _clock) = test_manager(ManagerConfig::default());

    let (flow, out) = send(&mut manager, "   ");
    assert_eq!(flow, Flow::Continue);
    assert!(out.is_empty());
    assert!(procs.spawned().is_empty());
}

#[test]
fn test_spawn_failure_is_reported() {
    let (mut manager, procs, _clock) = test_manager(ManagerConfig::default());
    procs.fail_spawn(true);

    let (_, out) = send(&mut manager, "run ./missing 5");
    assert!(out.starts_with("error: Failed to start ./missing"));
    assert!(manager.scheduler().table().list_all().is_empty());
}

#[test]
fn test_full_table_is_reported() {
    let config = ManagerConfig::default().with_max_slots(1);
    let (mut manager, _procs, _clock) = test_manager(config);

    send(&mut manager, "run ./a 5");
    let (_, out) = send(&mut manager, "run ./b 1");
    assert_eq!(out, "error: Maximum number of processes reached (1)\n");
}

// ==================== Tests for Exit paths ====================

#[test]
fn test_exit_terminates_everything() {
    let (mut manager, procs, _clock) = test_manager(ManagerConfig::default());
    send(&mut manager, "run ./a 5");
    send(&mut manager, "run ./b 9");
    send(&mut manager, &format!("stop {}", pid(1)));

    let (flow, out) = send(&mut manager, "exit");
    assert_eq!(flow, Flow::Exit);
    assert_eq!(out, "Exiting the process manager!\n");

    let sched = manager.scheduler();
    assert_eq!(status_of(sched, pid(0)), JobStatus::Terminated);
    assert_eq!(status_of(sched, pid(1)), JobStatus::Terminated);
    assert!(procs.signals_to(pid(1)).ends_with(&[JobSignal::Terminate, JobSignal::Continue]));
}

#[test]
fn test_exit_reports_termination_failures() {
    let (mut manager, procs, _clock) = test_manager(ManagerConfig::default());
    send(&mut manager, "run ./a 5");
    procs.fail_signal(pid(0), JobSignal::Terminate, Errno::EPERM);

    let (flow, out) = send(&mut manager, "exit");
    assert_eq!(flow, Flow::Exit);
    let lines: Vec<&str> = out.lines().collect();
    assert_eq!(lines.len(), 2);
    assert!(lines[0].starts_with(&format!("error: Failed to send SIGTERM to process {}", pid(0))));
    assert_eq!(lines[1], "Exiting the process manager!");
}

#[test]
fn test_shutdown_and_closed_events_exit() {
    for event in [Event::Shutdown, Event::Closed] {
        let (mut manager, _procs, _clock) = test_manager(ManagerConfig::default());
        send(&mut manager, "run ./a 5");

        let mut out = Vec::new();
        let flow = manager.step(event, &mut out).unwrap();

        assert_eq!(flow, Flow::Exit);
        assert_eq!(String::from_utf8(out).unwrap(), "Exiting the process manager!\n");
        assert_eq!(status_of(manager.scheduler(), pid(0)), JobStatus::Terminated);
    }
}

// ==================== Tests for Settling between events ====================

#[test]
fn test_tick_charges_running_job() {
    let (mut manager, _procs, clock) = test_manager(ManagerConfig::default());
    send(&mut manager, "run ./a 10");
    send(&mut manager, "run ./b 20");

    clock.advance(3);
    let flow = manager.step(Event::Tick, &mut Vec::new()).unwrap();

    assert_eq!(flow, Flow::Continue);
    assert_eq!(remaining_of(manager.scheduler(), pid(0)), 7);
    assert_eq!(remaining_of(manager.scheduler(), pid(1)), 20);
}

#[test]
fn test_tick_retries_dispatch_when_idle() {
    let (mut manager, procs, _clock) = test_manager(ManagerConfig::default());
    procs.fail_signal(pid(0), JobSignal::Continue, Errno::EPERM);

    let (_, out) = send(&mut manager, "run ./a 5");
    assert!(out.contains("started"));
    assert_eq!(manager.scheduler().running_slot(), None);
    assert_eq!(status_of(manager.scheduler(), pid(0)), JobStatus::Ready);

    procs.clear_failures();
    manager.step(Event::Tick, &mut Vec::new()).unwrap();
    assert_eq!(manager.scheduler().running_pid(), Some(pid(0)));
    assert_single_runner(manager.scheduler());
}

#[test]
fn test_tick_keeps_other_jobs_running_past_a_stuck_one() {
    let (mut manager, procs, _clock) = test_manager(ManagerConfig::default());
    procs.fail_signal(pid(0), JobSignal::Continue, Errno::EPERM);

    send(&mut manager, "run ./a 5");
    send(&mut manager, "run ./b 9");
    for _ in 0..50 {
        manager.step(Event::Tick, &mut Vec::new()).unwrap();
    }

    let sched = manager.scheduler();
    assert_eq!(status_of(sched, pid(0)), JobStatus::Ready);
    assert_eq!(status_of(sched, pid(1)), JobStatus::Running);
    assert_single_runner(sched);
}

#[test]
fn test_srtf_session() {
    let (mut manager, _procs, clock) = test_manager(ManagerConfig::default());

    send(&mut manager, "run ./long 10");
    clock.advance(2);
    send(&mut manager, "run ./mid 6");
    assert_eq!(manager.scheduler().running_pid(), Some(pid(1)));
    assert_eq!(remaining_of(manager.scheduler(), pid(0)), 8);

    clock.advance(1);
    send(&mut manager, "run ./short 2");
    assert_eq!(manager.scheduler().running_pid(), Some(pid(2)));
    assert_eq!(remaining_of(manager.scheduler(), pid(1)), 5);

    clock.advance(2);
    send(&mut manager, &format!("kill {}", pid(2)));
    assert_eq!(remaining_of(manager.scheduler(), pid(2)), 0);
    assert_eq!(manager.scheduler().running_pid(), Some(pid(1)));
    assert_single_runner(manager.scheduler());
}

// ==================== Tests for Async control loop ====================

#[tokio::test]
async fn test_run_loop_processes_commands_until_exit() {
    let (manager, procs, _clock) = test_manager(ManagerConfig::default());
    let (tx, rx) = mpsc::channel(8);
    for line in ["run ./a 5", "list", "exit", "run ./never 1"] {
        tx.send(line.to_string()).await.unwrap();
    }

    let mut out = Vec::new();
    tokio::time::timeout(
        Duration::from_secs(5),
        manager.run_with_output(rx, CancellationToken::new(), &mut out),
    )
    .await
    .expect("loop should exit")
    .expect("loop should succeed");

    let out = String::from_utf8(out).unwrap();
    assert_eq!(
        out,
        format!(
            "Process {p} started in slot 0\n{p}, 0\nExiting the process manager!\n",
            p = pid(0)
        )
    );
    // Commands after exit are never handled
    assert_eq!(procs.spawned().len(), 1);
}

#[tokio::test]
async fn test_run_loop_exits_when_channel_closes() {
    let (manager, procs, _clock) = test_manager(ManagerConfig::default());
    let (tx, rx) = mpsc::channel(8);
    tx.send("run ./a 5".to_string()).await.unwrap();
    drop(tx);

    let mut out = Vec::new();
    tokio::time::timeout(
        Duration::from_secs(5),
        manager.run_with_output(rx, CancellationToken::new(), &mut out),
    )
    .await
    .expect("loop should exit")
    .expect("loop should succeed");

    let out = String::from_utf8(out).unwrap();
    assert!(out.ends_with("Exiting the process manager!\n"));
    assert!(procs.signals_to(pid(0)).contains(&JobSignal::Terminate));
}

#[tokio::test]
async fn test_run_loop_exits_on_shutdown_signal() {
    let (manager, procs, _clock) = test_manager(ManagerConfig::default());
    let (tx, rx) = mpsc::channel(8);
    tx.send("run ./a 5".to_string()).await.unwrap();

    let token = CancellationToken::new();
    let trigger = token.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(200)).await;
        trigger.cancel();
    });

    let mut out = Vec::new();
    tokio::time::timeout(
        Duration::from_secs(5),
        manager.run_with_output(rx, token, &mut out),
    )
    .await
    .expect("loop should exit")
    .expect("loop should succeed");

    let out = String::from_utf8(out).unwrap();
    assert!(out.starts_with(&format!("Process {} started", pid(0))));
    assert!(out.ends_with("Exiting the process manager!\n"));
    assert!(procs.signals_to(pid(0)).contains(&JobSignal::Terminate));
    // The sender is still open; only the token ended the loop
    drop(tx);
}
