//! Process memory probe backed by `sysinfo`

use crate::domain::host::{MemoryProbe, MemorySample};
use parking_lot::Mutex;
use sysinfo::{Pid, ProcessesToUpdate, System};

/// Reads the resident memory of the current process
pub struct SysinfoMemoryProbe {
    system: Mutex<System>,
    pid: Option<Pid>,
    /// Explicit limit; total system memory when `None`
    limit_bytes: Option<u64>,
}

impl SysinfoMemoryProbe {
    pub fn new(limit_bytes: Option<u64>) -> Self {
        let pid = match sysinfo::get_current_pid() {
            Ok(pid) => Some(pid),
            Err(e) => {
                tracing::debug!(error = e, "Current process id unavailable; memory probe disabled");
                None
            }
        };
        Self {
            system: Mutex::new(System::new()),
            pid,
            limit_bytes,
        }
    }
}

impl MemoryProbe for SysinfoMemoryProbe {
    fn sample(&self) -> Option<MemorySample> {
        let pid = self.pid?;
        let mut system = self.system.lock();
        system.refresh_processes(ProcessesToUpdate::Some(&[pid]), true);
        let used_bytes = system.process(pid)?.memory();

        let limit_bytes = match self.limit_bytes {
            Some(limit) => limit,
            None => {
                system.refresh_memory();
                system.total_memory()
            }
        };
        if limit_bytes == 0 {
            return None;
        }
        Some(MemorySample {
            used_bytes,
            limit_bytes,
        })
    }
}
