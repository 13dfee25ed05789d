//! Dispatch instrumentation
//!
//! Counters and histograms for collector traffic, recorded through the
//! `metrics` facade so the embedder chooses the exporter.
//!
//! # Metrics
//!
//! - `cryptique_sends_total`: counter of send attempts by kind and outcome
//! - `cryptique_send_retries_total`: counter of reduced-payload retries
//! - `cryptique_send_duration_seconds`: histogram of request duration

use metrics::{histogram, increment_counter};
use std::time::Instant;

/// What was being sent, used as a metric label
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendKind {
    Event,
    Snapshot,
    FinalFlush,
    Recovery,
}

impl SendKind {
    fn as_str(&self) -> &'static str {
        match self {
            SendKind::Event => "event",
            SendKind::Snapshot => "snapshot",
            SendKind::FinalFlush => "final_flush",
            SendKind::Recovery => "recovery",
        }
    }
}

/// Timer for a single send attempt
///
/// Created when the request starts; recording consumes it with the
/// observed outcome.
#[derive(Debug)]
pub struct SendTimer {
    kind: SendKind,
    started: Instant,
}

impl SendTimer {
    pub fn start(kind: SendKind) -> Self {
        Self {
            kind,
            started: Instant::now(),
        }
    }

    /// Record a completed attempt
    pub fn record(self, outcome: &'static str) {
        let elapsed = self.started.elapsed().as_secs_f64();
        histogram!(
            "cryptique_send_duration_seconds",
            elapsed,
            "kind" => self.kind.as_str()
        );
        increment_counter!(
            "cryptique_sends_total",
            "kind" => self.kind.as_str(),
            "outcome" => outcome
        );
    }
}

/// Record a reduced-payload retry after a timeout
pub fn record_retry(kind: SendKind) {
    increment_counter!("cryptique_send_retries_total", "kind" => kind.as_str());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_send_kind_labels() {
        assert_eq!(SendKind::Event.as_str(), "event");
        assert_eq!(SendKind::Snapshot.as_str(), "snapshot");
        assert_eq!(SendKind::FinalFlush.as_str(), "final_flush");
        assert_eq!(SendKind::Recovery.as_str(), "recovery");
    }

    #[test]
    fn test_timer_records_without_recorder_installed() {
        // The metrics facade is a no-op without a recorder; recording
        // must not panic in that configuration.
        let timer = SendTimer::start(SendKind::Event);
        timer.record("ok");
        record_retry(SendKind::Event);
    }
}
