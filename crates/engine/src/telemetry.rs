// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Host and process telemetry sampling.

use chrono::Utc;
use resolvix_core::{ProcessSample, TelemetrySnapshot};
use sysinfo::{Disks, ProcessesToUpdate, System};

/// Samples host CPU/memory/disk plus the top processes by CPU.
///
/// CPU percentages are deltas since the previous refresh, so the first
/// sample after startup reads low; the collector cadence (60 s) makes every
/// later sample meaningful.
pub struct TelemetryCollector {
    sys: System,
    disks: Disks,
    node_id: String,
    node_ip: String,
    hostname: String,
    top_n: usize,
}

impl TelemetryCollector {
    /// `node_id` defaults to the hostname when not supplied.
    pub fn new(node_id: Option<String>, node_ip: String, top_n: usize) -> Self {
        let mut sys = System::new_all();
        sys.refresh_all();
        let disks = Disks::new_with_refreshed_list();
        let hostname = System::host_name().unwrap_or_else(|| "unknown".to_string());
        Self {
            sys,
            disks,
            node_id: node_id.unwrap_or_else(|| hostname.clone()),
            node_ip,
            hostname,
            top_n,
        }
    }

    /// Produce one snapshot.
    pub fn sample(&mut self) -> TelemetrySnapshot {
        self.sys.refresh_cpu_usage();
        self.sys.refresh_memory();
        self.sys.refresh_processes(ProcessesToUpdate::All, true);
        self.disks.refresh(true);

        let cpu_percent = self.sys.global_cpu_usage();

        let total_mem = self.sys.total_memory();
        let memory_percent = if total_mem > 0 {
            (self.sys.used_memory() as f64 / total_mem as f64 * 100.0) as f32
        } else {
            0.0
        };

        let disk_percent = self.root_disk_percent();
        let load = System::load_average();

        let mut processes: Vec<ProcessSample> = self
            .sys
            .processes()
            .values()
            .map(|p| ProcessSample {
                pid: p.pid().as_u32(),
                name: p.name().to_string_lossy().into_owned(),
                cpu_percent: p.cpu_usage(),
                memory_percent: if total_mem > 0 {
                    (p.memory() as f64 / total_mem as f64 * 100.0) as f32
                } else {
                    0.0
                },
            })
            .collect();
        processes.sort_by(|a, b| {
            b.cpu_percent
                .partial_cmp(&a.cpu_percent)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        processes.truncate(self.top_n);

        TelemetrySnapshot {
            ts: Utc::now(),
            node_id: self.node_id.clone(),
            node_ip: self.node_ip.clone(),
            hostname: self.hostname.clone(),
            cpu_percent,
            memory_percent,
            disk_percent,
            uptime_secs: System::uptime(),
            load_avg_one: load.one,
            load_avg_five: load.five,
            load_avg_fifteen: load.fifteen,
            processes,
        }
    }

    /// Usage of the volume mounted at `/`. Falls back to the fullest disk
    /// when no root mount is visible (containers).
    fn root_disk_percent(&self) -> f32 {
        let percent = |total: u64, avail: u64| {
            if total == 0 {
                0.0
            } else {
                ((total - avail) as f64 / total as f64 * 100.0) as f32
            }
        };

        for disk in self.disks.list() {
            if disk.mount_point() == std::path::Path::new("/") {
                return percent(disk.total_space(), disk.available_space());
            }
        }
        self.disks
            .list()
            .iter()
            .map(|d| percent(d.total_space(), d.available_space()))
            .fold(0.0, f32::max)
    }
}

#[cfg(test)]
#[path = "telemetry_tests.rs"]
mod tests;
