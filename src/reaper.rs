//! Last-resort cleanup of browser processes.
//!
//! Only used when graceful shutdown overruns its deadline. Processes are
//! matched by name and must descend from this process or from a browser the
//! pool launched itself, so unrelated browsers on the host are left alone.

use std::collections::HashSet;

use sysinfo::{Pid, ProcessRefreshKind, ProcessesToUpdate, System};

fn snapshot() -> System {
    let mut sys = System::new();
    sys.refresh_processes_specifics(ProcessesToUpdate::All, true, ProcessRefreshKind::nothing());
    sys
}

/// Kills one process by id. Returns whether a signal was delivered.
pub(crate) fn kill_pid(pid: u32) -> bool {
    let sys = snapshot();
    match sys.process(Pid::from_u32(pid)) {
        Some(process) => {
            let killed = process.kill();
            log::warn!("🔪 Killed browser process {} (delivered: {})", pid, killed);
            killed
        }
        None => false,
    }
}

/// Kills every process whose name contains `name` and whose ancestry
/// includes the current process or one of `roots`.
///
/// Returns the number of processes signalled.
pub(crate) fn kill_orphans(name: &str, roots: &[u32]) -> usize {
    let sys = snapshot();
    let mut ancestors: HashSet<Pid> = roots.iter().copied().map(Pid::from_u32).collect();
    let me = sysinfo::get_current_pid().ok();
    if let Some(me) = me {
        ancestors.insert(me);
    }

    let needle = name.to_ascii_lowercase();
    let mut killed = 0;
    for (pid, process) in sys.processes() {
        let matches_name = process
            .name()
            .to_string_lossy()
            .to_ascii_lowercase()
            .contains(&needle);
        if Some(*pid) == me || !matches_name || !descends_from(&sys, *pid, &ancestors) {
            continue;
        }
        if process.kill() {
            killed += 1;
            log::warn!("🔪 Killed orphaned '{}' process {}", name, pid);
        }
    }
    killed
}

fn descends_from(sys: &System, pid: Pid, ancestors: &HashSet<Pid>) -> bool {
    if ancestors.contains(&pid) {
        return true;
    }
    let mut current = sys.process(pid).and_then(|p| p.parent());
    // Bounded walk; pid reuse can in theory create cycles.
    for _ in 0..64 {
        match current {
            Some(parent) if ancestors.contains(&parent) => return true,
            Some(parent) => current = sys.process(parent).and_then(|p| p.parent()),
            None => return false,
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Verifies that a name no process carries kills nothing.
    #[test]
    fn test_kill_orphans_without_matches() {
        assert_eq!(kill_orphans("html2pdf-no-such-process-name", &[]), 0);
    }

    /// Verifies that an unknown pid is reported as not killed.
    #[test]
    fn test_kill_unknown_pid() {
        assert!(!kill_pid(u32::MAX - 1));
    }
}
