//! Telemetry Source port and snapshot types.
//!
//! Byte-valued quantities are converted to gigabytes (2 decimals) by the
//! adapter; nothing downstream sees raw byte counts.

use async_trait::async_trait;

use crate::Result;

/// Instantaneous CPU sample. `load_percent` is a point-in-time reading, not
/// an averaged window.
#[derive(Clone, Debug, PartialEq)]
pub struct CpuSnapshot {
    pub model: String,
    pub cores: usize,
    pub frequency_mhz: f64,
    pub load_percent: f64,
}

#[derive(Clone, Debug, PartialEq)]
pub struct MemorySnapshot {
    pub total_gb: f64,
    pub used_gb: f64,
    pub free_gb: f64,
    pub used_percent: f64,
    pub swap_total_gb: f64,
    pub swap_used_gb: f64,
    pub swap_percent: f64,
}

#[derive(Clone, Debug, PartialEq)]
pub struct DiskSnapshot {
    pub mount_point: String,
    pub file_system: String,
    pub total_gb: f64,
    pub used_gb: f64,
    pub free_gb: f64,
    pub used_percent: f64,
}

impl DiskSnapshot {
    pub fn free_percent(&self) -> f64 {
        100.0 - self.used_percent
    }
}

/// Stateless metric sampler; safe to call from several tasks at once.
#[async_trait]
pub trait TelemetrySource: Send + Sync {
    async fn cpu_snapshot(&self) -> Result<CpuSnapshot>;
    async fn memory_snapshot(&self) -> Result<MemorySnapshot>;
    async fn disk_snapshots(&self) -> Result<Vec<DiskSnapshot>>;
}

const PSEUDO_FILESYSTEMS: &[&str] = &[
    "tmpfs", "devtmpfs", "ramfs", "squashfs", "overlay", "proc", "sysfs", "devpts", "cgroup",
    "cgroup2", "efivarfs",
];

/// Virtual/pseudo filesystems excluded from disk snapshots.
pub fn is_pseudo_filesystem(fs_type: &str) -> bool {
    PSEUDO_FILESYSTEMS.contains(&fs_type)
}

pub fn bytes_to_gb(bytes: u64) -> f64 {
    round2(bytes as f64 / 1024.0 / 1024.0 / 1024.0)
}

pub fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

/// Used share of `total`, in percent. Zero when `total` is zero.
pub fn percent(used: u64, total: u64) -> f64 {
    if total == 0 {
        return 0.0;
    }
    used as f64 / total as f64 * 100.0
}
