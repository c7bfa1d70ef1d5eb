// reconcile.rs
use crate::codec::{coerce, Decoded};
use crate::snapshot::{bindings_for, Metric, TelemetrySnapshot};

/// What a merge did to the snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergeReport {
    /// Fields that received a valid value, changed or not.
    pub applied: usize,
    /// Fields whose value is now different.
    pub changed: Vec<Metric>,
    /// Wire keys with no field bound to them.
    pub ignored: Vec<String>,
}

impl MergeReport {
    pub fn changed(&self) -> bool {
        !self.changed.is_empty()
    }
}

/// Applies a decoded frame to `snapshot` in place.
///
/// Only fields bound to a key present in `decoded` are touched, and only when
/// the value coerces for that field. Everything else keeps its last value.
pub fn merge(snapshot: &mut TelemetrySnapshot, decoded: &Decoded) -> MergeReport {
    let mut report = MergeReport::default();

    for (key, raw) in decoded {
        let mut bound = false;
        for metric in bindings_for(key) {
            bound = true;
            let Some(value) = coerce(raw, metric.kind()) else {
                continue;
            };
            report.applied += 1;
            if snapshot.set(metric, value) {
                report.changed.push(metric);
            }
        }
        if !bound {
            report.ignored.push(key.clone());
        }
    }

    report
}
