// processor.rs
use crate::codec::{self, DecodeError};
use crate::reconcile::{self, MergeReport};
use crate::snapshot::TelemetrySnapshot;
use crate::stats::SessionStats;
use crate::view::ViewSink;
use hdrhistogram::CreationError;
use std::io::BufRead;
use std::time::Instant;
use tracing::{debug, warn};

#[derive(Debug)]
pub enum FrameOutcome {
    Merged(MergeReport),
    Dropped(DecodeError),
}

/// Decode → merge → render, one frame at a time. Owns the snapshot, so the
/// only way to mutate it is through [`FrameProcessor::process`].
pub struct FrameProcessor<V> {
    snapshot: TelemetrySnapshot,
    view: V,
    stats: SessionStats,
}

impl<V: ViewSink> FrameProcessor<V> {
    pub fn new(view: V) -> Result<Self, CreationError> {
        Self::with_snapshot(TelemetrySnapshot::default(), view)
    }

    pub fn with_snapshot(snapshot: TelemetrySnapshot, view: V) -> Result<Self, CreationError> {
        Ok(Self {
            snapshot,
            view,
            stats: SessionStats::new()?,
        })
    }

    pub fn process(&mut self, raw: &str) -> FrameOutcome {
        let started = Instant::now();
        self.stats.frames_received += 1;

        let frame = match codec::decode_frame(raw) {
            Ok(frame) => frame,
            Err(err) => {
                self.stats.frames_dropped += 1;
                warn!(error = %err, len = raw.len(), "dropping telemetry frame");
                return FrameOutcome::Dropped(err);
            }
        };

        if let Some(server) = &frame.error {
            self.stats.server_errors += 1;
            warn!(
                code = server.code,
                message = server.message.as_deref().unwrap_or(""),
                subscription = ?frame.subscription_id,
                "feed reported an error"
            );
        }
        if frame.is_heartbeat() {
            self.stats.heartbeats += 1;
        }
        self.stats.fields_dropped += frame.dropped.len() as u64;

        let report = reconcile::merge(&mut self.snapshot, &frame.values);
        self.view.render(&self.snapshot, &report);
        self.stats.frames_merged += 1;
        self.stats.record_handling(started.elapsed());

        debug!(
            applied = report.applied,
            changed = report.changed.len(),
            ignored = report.ignored.len(),
            "frame merged"
        );
        FrameOutcome::Merged(report)
    }

    /// Feeds newline-delimited frames through [`process`](Self::process).
    /// Blank lines are skipped. Returns the number of frames processed.
    pub fn replay<R: BufRead>(&mut self, reader: R) -> std::io::Result<usize> {
        let mut count = 0;
        for line in reader.lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            self.process(&line);
            count += 1;
        }
        Ok(count)
    }

    pub fn snapshot(&self) -> &TelemetrySnapshot {
        &self.snapshot
    }

    pub fn stats(&self) -> &SessionStats {
        &self.stats
    }

    pub fn view(&self) -> &V {
        &self.view
    }
}
