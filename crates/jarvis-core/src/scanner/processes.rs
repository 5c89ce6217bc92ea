use std::thread;
use std::time::Instant;
use sysinfo::{ProcessRefreshKind, ProcessStatus, ProcessesToUpdate, System};
use tracing::debug;

use super::{Skip, SkipLog, SkipReason};
use crate::model::{bytes_to_mb, ProcessRecord, ScanThreshold};

/// Processes at or above this CPU usage are doing work and are never flagged.
pub const IDLE_CPU_PERCENT: f32 = 5.0;

/// Raw per-process reading taken from the OS.
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessSample {
    pub pid: u32,
    pub name: String,
    pub resident_bytes: u64,
    pub cpu_percent: f32,
}

/// Source of process readings. The real implementation walks the live
/// process table; tests substitute a fixed snapshot.
pub trait ProcessSource: Send + Sync {
    fn sample(&self) -> Vec<Result<ProcessSample, Skip>>;
}

/// Reads the process table through `sysinfo`.
///
/// CPU usage is a delta between two refreshes, so sampling sleeps for
/// `sysinfo::MINIMUM_CPU_UPDATE_INTERVAL` between them.
#[derive(Debug, Default)]
pub struct SysinfoProcessSource;

impl ProcessSource for SysinfoProcessSource {
    fn sample(&self) -> Vec<Result<ProcessSample, Skip>> {
        let refresh = ProcessRefreshKind::nothing().with_memory().with_cpu();
        let mut system = System::new();

        system.refresh_processes_specifics(ProcessesToUpdate::All, true, refresh);
        thread::sleep(sysinfo::MINIMUM_CPU_UPDATE_INTERVAL);
        system.refresh_processes_specifics(ProcessesToUpdate::All, true, refresh);

        system
            .processes()
            .iter()
            .map(|(pid, process)| {
                let pid = pid.as_u32();
                let name = process.name().to_string_lossy().into_owned();

                if process.status() == ProcessStatus::Zombie {
                    return Err(Skip::new(format!("{} ({})", name, pid), SkipReason::Zombie));
                }
                if name.is_empty() && process.memory() == 0 {
                    return Err(Skip::new(pid.to_string(), SkipReason::AccessDenied));
                }

                Ok(ProcessSample {
                    pid,
                    name,
                    resident_bytes: process.memory(),
                    cpu_percent: process.cpu_usage(),
                })
            })
            .collect()
    }
}

/// Idle memory hogs on this machine: resident memory above the limit while
/// using less than [`IDLE_CPU_PERCENT`] CPU. Output is in enumeration order.
pub fn scan_processes(threshold: &ScanThreshold) -> Vec<ProcessRecord> {
    scan_processes_with(&SysinfoProcessSource, threshold)
}

pub fn scan_processes_with(source: &dyn ProcessSource, threshold: &ScanThreshold) -> Vec<ProcessRecord> {
    let start = Instant::now();
    let limit_mb = threshold.limit_mb();
    let mut skips = SkipLog::new(threshold.kind());

    let samples = source.sample();
    let seen = samples.len();

    let suspicious: Vec<ProcessRecord> = samples
        .into_iter()
        .filter_map(|item| skips.keep(item))
        .filter_map(|sample| {
            let resident_memory_mb = bytes_to_mb(sample.resident_bytes);
            if resident_memory_mb > limit_mb && sample.cpu_percent < IDLE_CPU_PERCENT {
                Some(ProcessRecord {
                    name: sample.name,
                    resident_memory_mb,
                    pid: sample.pid,
                })
            } else {
                None
            }
        })
        .collect();

    let skipped = skips.finish();
    debug!(
        "Process scan checked {} processes ({} skipped) in {:.2}s, {} above {}MB and idle",
        seen,
        skipped,
        start.elapsed().as_secs_f64(),
        suspicious.len(),
        limit_mb,
    );

    suspicious
}
