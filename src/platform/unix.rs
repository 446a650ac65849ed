use super::{SignalOutcome, StopSignal};
use crate::core::models::ProcessRecord;
use crate::error::SnapshotError;
use crate::logging::debug;
use nix::errno::Errno;
use nix::sys::signal::{kill, Signal};
use nix::unistd::{getpgid, Pid};
use psutil::process::{processes, Process, Status};
use std::io;

/// Put the child in its own process group and tie its life to ours.
///
/// The group lets ownership classification find helpers that were reparented
/// after their parent exited. On Linux the browser also receives SIGTERM if
/// this process dies without cleaning up.
pub fn prepare_command(cmd: &mut tokio::process::Command) {
    unsafe {
        cmd.pre_exec(|| {
            if set_process_group() != 0 {
                return Err(io::Error::last_os_error());
            }

            #[cfg(target_os = "linux")]
            {
                if set_parent_death_signal() != 0 {
                    return Err(io::Error::last_os_error());
                }
            }

            Ok(())
        });
    }
}

/// Check if process is alive
///
/// A zombie has exited; it only waits for its parent to reap it.
pub fn process_alive(pid: u32) -> bool {
    let Some(target) = to_pid(pid) else {
        return false;
    };
    match kill(target, None) {
        Ok(()) | Err(Errno::EPERM) => !is_zombie(pid),
        Err(_) => false,
    }
}

/// Send `signal` to a single process.
pub fn send_signal(pid: u32, signal: StopSignal) -> SignalOutcome {
    let Some(target) = to_pid(pid) else {
        return SignalOutcome::Failed(format!("refusing to signal pid {pid}"));
    };
    let sig = match signal {
        StopSignal::Graceful => Signal::SIGTERM,
        StopSignal::Forceful => Signal::SIGKILL,
    };
    match kill(target, sig) {
        Ok(()) => {
            debug(format!("pid={} sent {}", pid, sig.as_str()));
            SignalOutcome::Delivered
        }
        Err(Errno::ESRCH) => SignalOutcome::AlreadyExited,
        Err(Errno::EPERM) => SignalOutcome::PermissionDenied,
        Err(errno) => SignalOutcome::Failed(errno.desc().to_string()),
    }
}

/// Read the process table with psutil.
///
/// Entries that disappear or deny access while being read are skipped.
pub fn list_processes() -> Result<Vec<ProcessRecord>, SnapshotError> {
    let entries = processes().map_err(|err| SnapshotError::Enumerate(err.to_string()))?;

    let mut records = Vec::with_capacity(entries.len());
    for entry in entries {
        let Ok(process) = entry else {
            continue;
        };
        if let Some(record) = read_record(&process) {
            records.push(record);
        }
    }
    Ok(records)
}

fn read_record(process: &Process) -> Option<ProcessRecord> {
    let pid = process.pid();
    let name = process.name().ok()?;
    let args = process.cmdline_vec().ok().flatten().unwrap_or_default();
    let parent = process.ppid().ok().flatten();
    let group = to_pid(pid)
        .and_then(|target| getpgid(Some(target)).ok())
        .map(|group| group.as_raw() as u32);

    Some(
        ProcessRecord::new(pid, name)
            .with_args(args)
            .with_parent(parent)
            .with_process_group(group),
    )
}

fn is_zombie(pid: u32) -> bool {
    Process::new(pid)
        .and_then(|process| process.status())
        .map(|status| matches!(status, Status::Zombie))
        .unwrap_or(false)
}

/// Pids 0 and anything beyond `i32::MAX` address whole groups in kill(2).
fn to_pid(pid: u32) -> Option<Pid> {
    if pid == 0 || pid > i32::MAX as u32 {
        return None;
    }
    Some(Pid::from_raw(pid as i32))
}

/// Safely set process group ID
///
/// Encapsulates unsafe setpgid call
unsafe fn set_process_group() -> libc::c_int {
    unsafe { libc::setpgid(0, 0) }
}

/// Safely set parent death signal
///
/// Encapsulates unsafe prctl call
#[cfg(target_os = "linux")]
unsafe fn set_parent_death_signal() -> libc::c_int {
    unsafe { libc::prctl(libc::PR_SET_PDEATHSIG, libc::SIGTERM) }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::process::Command;
    use std::time::{Duration, Instant};

    fn wait_until_gone(child: &mut std::process::Child) -> bool {
        let deadline = Instant::now() + Duration::from_secs(3);
        while Instant::now() < deadline {
            if let Ok(Some(_)) = child.try_wait() {
                return true;
            }
            std::thread::sleep(Duration::from_millis(20));
        }
        false
    }

    #[test]
    fn test_current_process_is_alive() {
        assert!(process_alive(std::process::id()));
    }

    #[test]
    fn test_pid_zero_is_never_signalled() {
        assert!(!process_alive(0));
        assert!(matches!(
            send_signal(0, StopSignal::Forceful),
            SignalOutcome::Failed(_)
        ));
        assert!(matches!(
            send_signal(u32::MAX, StopSignal::Forceful),
            SignalOutcome::Failed(_)
        ));
    }

    #[test]
    fn test_graceful_signal_stops_sleep() {
        let mut child = Command::new("sleep").arg("30").spawn().unwrap();
        let pid = child.id();
        assert!(process_alive(pid));
        assert_eq!(send_signal(pid, StopSignal::Graceful), SignalOutcome::Delivered);
        assert!(wait_until_gone(&mut child));
        assert!(!process_alive(pid));
        assert_eq!(
            send_signal(pid, StopSignal::Graceful),
            SignalOutcome::AlreadyExited
        );
    }

    #[test]
    fn test_unreaped_child_counts_as_exited() {
        let child = Command::new("sh").args(["-c", "exit 0"]).spawn().unwrap();
        let pid = child.id();
        let deadline = Instant::now() + Duration::from_secs(3);
        while process_alive(pid) && Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(20));
        }
        assert!(!process_alive(pid), "zombie should not count as alive");
        drop(child);
    }

    #[test]
    fn test_list_processes_includes_self() {
        let records = list_processes().unwrap();
        let me = records
            .iter()
            .find(|record| record.id == std::process::id())
            .expect("self in process list");
        assert!(!me.executable_name.is_empty());
    }
}
