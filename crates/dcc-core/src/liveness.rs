use crate::record::StatusRecord;
#[cfg(target_os = "linux")]
use std::path::PathBuf;

/// Answers whether the process that wrote a status record still exists.
pub trait LivenessProbe: Send + Sync {
    fn is_pid_live(&self, pid: i64) -> bool;

    fn is_live(&self, record: &StatusRecord) -> bool {
        self.is_pid_live(record.process_id)
    }
}

impl<F> LivenessProbe for F
where
    F: Fn(i64) -> bool + Send + Sync,
{
    fn is_pid_live(&self, pid: i64) -> bool {
        self(pid)
    }
}

/// Local process table lookup. Read-only; never signals the target.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessTable;

impl LivenessProbe for ProcessTable {
    fn is_pid_live(&self, pid: i64) -> bool {
        match u32::try_from(pid) {
            Ok(pid) if pid > 0 && i32::try_from(pid).is_ok() => process_exists(pid),
            _ => false,
        }
    }
}

#[cfg(target_os = "linux")]
fn process_exists(pid: u32) -> bool {
    PathBuf::from("/proc").join(pid.to_string()).exists()
}

#[cfg(all(unix, not(target_os = "linux")))]
fn process_exists(pid: u32) -> bool {
    signal_probe(pid)
}

/// Null signal: permission and existence are checked, nothing is delivered.
#[cfg(unix)]
#[cfg_attr(target_os = "linux", allow(dead_code))]
fn signal_probe(pid: u32) -> bool {
    use nix::errno::Errno;
    use nix::sys::signal::kill;
    use nix::unistd::Pid;

    let Ok(raw) = i32::try_from(pid) else {
        return false;
    };
    match kill(Pid::from_raw(raw), None) {
        Ok(()) => true,
        // exists, owned by another user
        Err(Errno::EPERM) => true,
        Err(_) => false,
    }
}

#[cfg(not(unix))]
fn process_exists(pid: u32) -> bool {
    use std::process::{Command, Stdio};

    let filter = format!("PID eq {pid}");
    Command::new("tasklist")
        .args(["/FI", filter.as_str(), "/NH", "/FO", "CSV"])
        .stderr(Stdio::null())
        .output()
        .map(|out| String::from_utf8_lossy(&out.stdout).contains(&format!("\"{pid}\"")))
        .unwrap_or(false)
}
