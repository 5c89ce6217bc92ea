use serde::Serialize;
use std::path::Path;
use std::thread;
use sysinfo::{Disks, System};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum DiskUsage {
    Percent(f64),
    Unavailable(String),
}

/// Machine-wide load: CPU, RAM and root filesystem usage.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SystemStatus {
    pub cpu_usage_percent: f64,
    pub ram_usage_percent: f64,
    pub disk_usage_percent: DiskUsage,
}

/// Blocks for `sysinfo::MINIMUM_CPU_UPDATE_INTERVAL` to measure CPU usage.
pub fn system_status() -> SystemStatus {
    let mut system = System::new();
    system.refresh_cpu_usage();
    thread::sleep(sysinfo::MINIMUM_CPU_UPDATE_INTERVAL);
    system.refresh_cpu_usage();
    system.refresh_memory();

    let ram_usage_percent = percent(system.used_memory(), system.total_memory());

    SystemStatus {
        cpu_usage_percent: round1(f64::from(system.global_cpu_usage())),
        ram_usage_percent,
        disk_usage_percent: root_disk_usage(),
    }
}

fn root_disk_usage() -> DiskUsage {
    let disks = Disks::new_with_refreshed_list();
    let root = disks
        .list()
        .iter()
        .find(|disk| disk.mount_point() == Path::new("/"))
        .or_else(|| disks.list().first());

    match root {
        Some(disk) if disk.total_space() > 0 => DiskUsage::Percent(percent(
            disk.total_space() - disk.available_space().min(disk.total_space()),
            disk.total_space(),
        )),
        Some(disk) => DiskUsage::Unavailable(format!(
            "Could not read disk usage: {} reports no capacity",
            disk.mount_point().display()
        )),
        None => DiskUsage::Unavailable("Could not read disk usage: no disks found".to_string()),
    }
}

fn percent(used: u64, total: u64) -> f64 {
    if total == 0 {
        return 0.0;
    }
    round1(used as f64 * 100.0 / total as f64)
}

fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_percent_rounding_and_zero_total() {
        assert_eq!(percent(1, 3), 33.3);
        assert_eq!(percent(5, 0), 0.0);
    }

    #[test]
    fn test_disk_usage_serializes_untagged() {
        let ok = serde_json::to_string(&DiskUsage::Percent(41.5)).unwrap();
        let err = serde_json::to_string(&DiskUsage::Unavailable("no disk".into())).unwrap();
        assert_eq!(ok, "41.5");
        assert_eq!(err, "\"no disk\"");
    }
}
