//! Signal-based handle to a running collector subprocess.

use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid;

/// Cross-flow handle to the collector subprocess.
///
/// The execution pipeline owns the `tokio::process::Child` and is the only
/// code that waits on (and reaps) it. The cancellation flow never touches the
/// child directly; it operates on this pid-based handle stored in the task
/// registry, so the two control flows cannot fight over a single mutable
/// process object.
#[derive(Debug, Clone, Copy)]
pub struct ProcessHandle {
    pid: Pid,
}

impl ProcessHandle {
    /// Wrap the pid of a freshly spawned subprocess.
    pub fn new(pid: u32) -> Self {
        Self {
            pid: Pid::from_raw(i32::try_from(pid).unwrap_or(i32::MAX)),
        }
    }

    /// Raw pid, for logging.
    pub fn pid(&self) -> i32 {
        self.pid.as_raw()
    }

    /// Request graceful termination (SIGTERM).
    pub fn terminate(&self) -> nix::Result<()> {
        kill(self.pid, Signal::SIGTERM)
    }

    /// Force-kill (SIGKILL).
    pub fn kill(&self) -> nix::Result<()> {
        kill(self.pid, Signal::SIGKILL)
    }

    /// Whether the process still exists (including as an unreaped zombie).
    pub fn is_alive(&self) -> bool {
        kill(self.pid, None).is_ok()
    }
}
