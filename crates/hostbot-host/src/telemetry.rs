//! `sysinfo`-backed telemetry source.

use async_trait::async_trait;
use hostbot_core::{
    telemetry::{
        bytes_to_gb, is_pseudo_filesystem, percent, round2, CpuSnapshot, DiskSnapshot,
        MemorySnapshot, TelemetrySource,
    },
    Error, Result,
};
use sysinfo::{Disks, System, MINIMUM_CPU_UPDATE_INTERVAL};

/// Samples on demand; nothing is cached between calls.
#[derive(Clone, Copy, Debug, Default)]
pub struct SysinfoTelemetry;

impl SysinfoTelemetry {
    pub fn new() -> Self {
        Self
    }
}

/// sysinfo reads procfs synchronously; keep it off the runtime threads.
async fn blocking<T, F>(f: F) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T> + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| Error::Telemetry(format!("sampler task failed: {e}")))?
}

fn sample_cpu() -> Result<CpuSnapshot> {
    let mut sys = System::new();
    // Usage is a delta between two refreshes.
    sys.refresh_cpu_all();
    std::thread::sleep(MINIMUM_CPU_UPDATE_INTERVAL);
    sys.refresh_cpu_all();

    let first = sys
        .cpus()
        .first()
        .ok_or_else(|| Error::Telemetry("no CPU information available".to_string()))?;

    Ok(CpuSnapshot {
        model: first.brand().trim().to_string(),
        cores: sys.physical_core_count().unwrap_or(sys.cpus().len()),
        frequency_mhz: first.frequency() as f64,
        load_percent: f64::from(sys.global_cpu_usage()),
    })
}

fn sample_memory() -> Result<MemorySnapshot> {
    let mut sys = System::new();
    sys.refresh_memory();

    let total = sys.total_memory();
    if total == 0 {
        return Err(Error::Telemetry("memory information unavailable".to_string()));
    }
    let used = sys.used_memory();
    let swap_total = sys.total_swap();
    let swap_used = sys.used_swap();

    Ok(MemorySnapshot {
        total_gb: bytes_to_gb(total),
        used_gb: bytes_to_gb(used),
        free_gb: bytes_to_gb(sys.free_memory()),
        used_percent: round2(percent(used, total)),
        swap_total_gb: bytes_to_gb(swap_total),
        swap_used_gb: bytes_to_gb(swap_used),
        swap_percent: round2(percent(swap_used, swap_total)),
    })
}

fn sample_disks() -> Result<Vec<DiskSnapshot>> {
    let disks = Disks::new_with_refreshed_list();
    let snapshots: Vec<DiskSnapshot> = disks
        .list()
        .iter()
        .filter_map(|d| {
            let fs = d.file_system().to_string_lossy().into_owned();
            if is_pseudo_filesystem(&fs) {
                return None;
            }
            let total = d.total_space();
            if total == 0 {
                return None;
            }
            let free = d.available_space();
            let used = total.saturating_sub(free);
            Some(DiskSnapshot {
                mount_point: d.mount_point().display().to_string(),
                file_system: fs,
                total_gb: bytes_to_gb(total),
                used_gb: bytes_to_gb(used),
                free_gb: bytes_to_gb(free),
                used_percent: round2(percent(used, total)),
            })
        })
        .collect();

    if snapshots.is_empty() {
        return Err(Error::Telemetry("no disk information available".to_string()));
    }
    Ok(snapshots)
}

#[async_trait]
impl TelemetrySource for SysinfoTelemetry {
    async fn cpu_snapshot(&self) -> Result<CpuSnapshot> {
        blocking(sample_cpu).await
    }

    async fn memory_snapshot(&self) -> Result<MemorySnapshot> {
        blocking(sample_memory).await
    }

    async fn disk_snapshots(&self) -> Result<Vec<DiskSnapshot>> {
        blocking(sample_disks).await
    }
}
