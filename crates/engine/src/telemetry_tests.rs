// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::TelemetryCollector;

#[test]
fn sample_produces_plausible_snapshot() {
    let mut collector =
        TelemetryCollector::new(Some("node-1".to_string()), "10.0.0.7".to_string(), 5);
    let snapshot = collector.sample();

    assert_eq!(snapshot.node_id, "node-1");
    assert_eq!(snapshot.node_ip, "10.0.0.7");
    assert!((0.0..=100.0).contains(&snapshot.memory_percent));
    assert!((0.0..=100.0).contains(&snapshot.disk_percent));
    assert!(snapshot.processes.len() <= 5);
}

#[test]
fn processes_are_sorted_by_cpu_descending() {
    let mut collector =
        TelemetryCollector::new(Some("node-1".to_string()), "10.0.0.7".to_string(), 10);
    let snapshot = collector.sample();

    for pair in snapshot.processes.windows(2) {
        assert!(pair[0].cpu_percent >= pair[1].cpu_percent);
    }
}
