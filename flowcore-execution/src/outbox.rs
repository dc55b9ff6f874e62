use crate::order::ExecLogEvent;
use flowcore_integration::{DualSink, IoError, RotationPolicy};
use std::path::Path;

/// Size cap past which the outbox force-publishes its current spool file
/// even if the rotation policy's row/time thresholds haven't tripped (§4.6
/// "10MB size-cap early-publish").
const EARLY_PUBLISH_BYTES: u64 = 10 * 1024 * 1024;

/// Durable sink for [`ExecLogEvent`]s — the same spool→ready dual-sink
/// discipline the Harvester and Signal Generator use for their own record
/// streams (§4.6), reused here rather than re-derived so the outbox gets
/// parity accounting (§8 P4) for free.
pub struct Outbox {
    sink: DualSink<ExecLogEvent>,
}

impl Outbox {
    pub fn open(root: impl Into<std::path::PathBuf>, sqlite_path: impl AsRef<Path>) -> Result<Self, IoError> {
        let policy = RotationPolicy { max_bytes: EARLY_PUBLISH_BYTES, ..Default::default() };
        Ok(Self {
            sink: DualSink::open(root, "exec", "exec", sqlite_path, policy, 50, 1_000)?,
        })
    }

    pub fn record(&mut self, event: &ExecLogEvent, now_ms: i64) -> Result<(), IoError> {
        self.sink.write_at(event, now_ms)
    }

    pub fn parity_diff(&mut self) -> Vec<flowcore_integration::ParityDiff> {
        self.sink.parity_diff()
    }

    pub fn flush(&mut self, now_ms: i64) -> Result<(), IoError> {
        self.sink.flush_at(now_ms)
    }

    pub fn close(&mut self) -> Result<(), IoError> {
        self.sink.close()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::order::{ClientOrderId, EventKind, ExecStatus};
    use rust_decimal_macros::dec;

    fn event(i: u64) -> ExecLogEvent {
        ExecLogEvent {
            ts_ms: 1_000,
            symbol: "BTCUSDT".into(),
            event: EventKind::Filled,
            status: ExecStatus::Filled,
            client_order_id: ClientOrderId(smol_str::SmolStr::new(format!("id-{i}"))),
            exchange_order_id: Some(format!("ex-{i}")),
            px_intent: Some(dec!(100)),
            px_sent: Some(dec!(100)),
            px_fill: Some(dec!(100.1)),
            qty: dec!(1),
            reject_reason: None,
            latency_ms: 12,
        }
    }

    #[test]
    fn records_stay_in_parity_across_both_sinks() {
        let dir = tempfile::tempdir().unwrap();
        let mut outbox = Outbox::open(dir.path(), dir.path().join("exec.db")).unwrap();
        for i in 0..10 {
            outbox.record(&event(i), 1_000).unwrap();
        }
        let diffs = outbox.parity_diff();
        assert!(diffs.iter().all(|d| d.passed));
    }
}
