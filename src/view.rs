// view.rs
// Consumers of the merged snapshot.

use crate::reconcile::MergeReport;
use crate::snapshot::TelemetrySnapshot;
use tokio::sync::watch;
use tracing::{debug, info};

/// Receives the full snapshot after every merged frame. The same snapshot
/// may be delivered several times in a row.
pub trait ViewSink {
    fn render(&mut self, snapshot: &TelemetrySnapshot, report: &MergeReport);
}

/// Prints the readouts through `tracing` whenever something changed.
#[derive(Debug, Default)]
pub struct LogView {
    renders: u64,
}

impl LogView {
    pub fn renders(&self) -> u64 {
        self.renders
    }
}

impl ViewSink for LogView {
    fn render(&mut self, snapshot: &TelemetrySnapshot, report: &MergeReport) {
        if !report.changed() {
            debug!("telemetry unchanged");
            return;
        }
        self.renders += 1;

        let c = &snapshot.counters;
        info!(
            changed = ?report.changed,
            status_on = snapshot.status_on_value,
            anti_sway = %snapshot.anti_sway_value,
            braking_on = snapshot.braking_on_value,
            total_on_time = snapshot.total_on_time,
            hoist_time = snapshot.hoist_time,
            trolley_time = snapshot.trolley_time,
            long_travel_time = snapshot.long_travel_time,
            hoist_overload = snapshot.hoist_overload,
            trolley_overload = snapshot.trolley_overload,
            long_travel_overload = snapshot.long_travel_overload,
            "crane readout"
        );
        info!(
            running_time_total = c.running_time_total,
            alarm_count = c.alarm_count,
            current = c.current,
            overcurrent = c.overcurrent,
            overvoltage = c.overvoltage,
            inverter_overload_error = c.inverter_overload_error,
            maintenance_due = %c.maintenance_due_date,
            "dashboard counters"
        );
    }
}

/// Publishes each distinct snapshot on a `watch` channel.
pub struct WatchView {
    tx: watch::Sender<TelemetrySnapshot>,
}

impl WatchView {
    pub fn channel() -> (Self, watch::Receiver<TelemetrySnapshot>) {
        let (tx, rx) = watch::channel(TelemetrySnapshot::default());
        (Self { tx }, rx)
    }

    pub fn subscribe(&self) -> watch::Receiver<TelemetrySnapshot> {
        self.tx.subscribe()
    }
}

impl ViewSink for WatchView {
    fn render(&mut self, snapshot: &TelemetrySnapshot, _report: &MergeReport) {
        self.tx.send_if_modified(|current| {
            if *current == *snapshot {
                return false;
            }
            current.clone_from(snapshot);
            true
        });
    }
}

/// Data for one pie chart, handed as-is to whatever draws it.
#[derive(Debug, Clone, PartialEq)]
pub struct PieSeries {
    pub labels: Vec<String>,
    pub values: Vec<f64>,
    pub colors: Vec<String>,
}

impl PieSeries {
    pub fn new<const N: usize>(labels: [&str; N], values: [f64; N], colors: [&str; N]) -> Self {
        Self {
            labels: labels.iter().map(|s| s.to_string()).collect(),
            values: values.to_vec(),
            colors: colors.iter().map(|s| s.to_string()).collect(),
        }
    }

    pub fn hoist_loading() -> Self {
        Self::new(
            ["Light Load", "Medium Load", "Heavy Load"],
            [660.0, 370.0, 103.0],
            ["#2ecc71", "#2980b9", "#e67e22"],
        )
    }

    pub fn crane_operation() -> Self {
        Self::new(
            ["No Load", "Load", "Overload"],
            [1200.0, 560.0, 100.0],
            ["#2ecc71", "#2980b9", "#e74c3c"],
        )
    }

    /// Share of each slice in percent, one decimal place.
    pub fn percentages(&self) -> Vec<f64> {
        let total: f64 = self.values.iter().sum();
        if total == 0.0 {
            return vec![0.0; self.values.len()];
        }
        self.values
            .iter()
            .map(|v| (v / total * 1000.0).round() / 10.0)
            .collect()
    }
}
