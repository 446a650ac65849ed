use super::{SignalOutcome, StopSignal};
use crate::core::models::ProcessRecord;
use crate::error::SnapshotError;
use crate::logging::debug;
use std::process::{Command, Stdio};
use sysinfo::{Pid, ProcessRefreshKind, ProcessesToUpdate, System};

/// Windows has no process groups to join; helpers are found by ancestry.
pub fn prepare_command(_cmd: &mut tokio::process::Command) {}

pub fn process_alive(pid: u32) -> bool {
    if pid == 0 {
        return false;
    }
    let sys_pid = Pid::from_u32(pid);
    let mut system = System::new();
    system.refresh_processes_specifics(
        ProcessesToUpdate::Some(&[sys_pid]),
        true,
        ProcessRefreshKind::new(),
    );
    system.process(sys_pid).is_some()
}

/// Graceful stop asks the window to close through `taskkill`; forceful stop
/// terminates the process outright.
pub fn send_signal(pid: u32, signal: StopSignal) -> SignalOutcome {
    if pid == 0 || pid == 4 {
        return SignalOutcome::Failed(format!("refusing to signal pid {pid}"));
    }
    if !process_alive(pid) {
        return SignalOutcome::AlreadyExited;
    }

    match signal {
        StopSignal::Graceful => {
            let status = Command::new("taskkill")
                .args(["/PID", &pid.to_string()])
                .stdout(Stdio::null())
                .stderr(Stdio::null())
                .status();
            match status {
                Ok(status) if status.success() => {
                    debug(format!("pid={} sent taskkill", pid));
                    SignalOutcome::Delivered
                }
                Ok(_) if !process_alive(pid) => SignalOutcome::AlreadyExited,
                Ok(status) => SignalOutcome::Failed(format!("taskkill exited with {status}")),
                Err(err) => SignalOutcome::Failed(err.to_string()),
            }
        }
        StopSignal::Forceful => {
            let sys_pid = Pid::from_u32(pid);
            let mut system = System::new();
            system.refresh_processes(ProcessesToUpdate::Some(&[sys_pid]), true);
            match system.process(sys_pid) {
                Some(process) if process.kill() => {
                    debug(format!("pid={} terminated", pid));
                    SignalOutcome::Delivered
                }
                Some(_) => SignalOutcome::PermissionDenied,
                None => SignalOutcome::AlreadyExited,
            }
        }
    }
}

pub fn list_processes() -> Result<Vec<ProcessRecord>, SnapshotError> {
    let mut system = System::new();
    system.refresh_processes_specifics(
        ProcessesToUpdate::All,
        true,
        ProcessRefreshKind::everything(),
    );

    let records = system
        .processes()
        .values()
        .map(|process| {
            let args: Vec<String> = process
                .cmd()
                .iter()
                .map(|arg| arg.to_string_lossy().into_owned())
                .collect();
            ProcessRecord::new(
                process.pid().as_u32(),
                process.name().to_string_lossy().into_owned(),
            )
            .with_args(args)
            .with_parent(process.parent().map(|parent| parent.as_u32()))
        })
        .collect();
    Ok(records)
}
