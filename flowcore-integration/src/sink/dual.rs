use crate::error::IoError;
use crate::rotation::RotationPolicy;
use crate::sink::jsonl::JsonlSink;
use crate::sink::sqlite::{SqlRecord, SqliteSink};
use crate::sink::{compute_parity_diff, ParityDiff, ParityTags, RecordSink, RollingCounters};
use serde::Serialize;
use std::path::Path;
use std::time::Duration;
use tracing::warn;

/// Fans every record out to both the JSONL and SQLite sinks and tracks
/// per-minute category counters on each side independently, so a partial
/// failure on one sink (rather than both always agreeing by construction)
/// is what the parity report in §4.6/§8-P4 is meant to catch.
pub struct DualSink<R> {
    jsonl: JsonlSink,
    sqlite: SqliteSink<R>,
    jsonl_counters: RollingCounters,
    sqlite_counters: RollingCounters,
    window_start_ms: i64,
}

impl<R> DualSink<R>
where
    R: Serialize + Clone + SqlRecord + ParityTags,
{
    pub fn open(
        root: impl Into<std::path::PathBuf>,
        subdir: &str,
        record_type: &str,
        sqlite_path: impl AsRef<Path>,
        rotation: RotationPolicy,
        sqlite_batch_n: usize,
        sqlite_flush_ms: u64,
    ) -> Result<Self, IoError> {
        Ok(Self {
            jsonl: JsonlSink::new(root, subdir, record_type, rotation),
            sqlite: SqliteSink::open(sqlite_path, sqlite_batch_n, Duration::from_millis(sqlite_flush_ms))?,
            jsonl_counters: RollingCounters::default(),
            sqlite_counters: RollingCounters::default(),
            window_start_ms: 0,
        })
    }

    pub fn write_at(&mut self, record: &R, now_ms: i64) -> Result<(), IoError> {
        if self.window_start_ms == 0 {
            self.window_start_ms = now_ms;
        }

        match self.jsonl.write_at(record, now_ms) {
            Ok(()) => self.jsonl_counters.record(record),
            Err(err) => warn!(error = %err, "jsonl sink write failed"),
        }

        match RecordSink::write(&mut self.sqlite, record) {
            Ok(()) => self.sqlite_counters.record(record),
            Err(err) => warn!(error = %err, "sqlite sink write failed"),
        }

        Ok(())
    }

    /// Compute and reset the rolling-minute parity diff (§4.6).
    pub fn parity_diff(&mut self) -> Vec<ParityDiff> {
        let diff = compute_parity_diff(&self.jsonl_counters, &self.sqlite_counters);
        self.jsonl_counters = RollingCounters::default();
        self.sqlite_counters = RollingCounters::default();
        self.window_start_ms = 0;
        diff
    }

    pub fn flush_at(&mut self, now_ms: i64) -> Result<(), IoError> {
        self.jsonl.flush_at(now_ms)?;
        RecordSink::flush(&mut self.sqlite)
    }

    pub fn close(&mut self) -> Result<(), IoError> {
        self.jsonl.close()?;
        self.sqlite.close()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::types::Value;
    use serde::Deserialize;

    #[derive(Debug, Clone, Serialize, Deserialize)]
    struct Rec {
        id: u64,
        side: String,
    }

    impl SqlRecord for Rec {
        const TABLE: &'static str = "rec";
        const CREATE_SQL: &'static str = "CREATE TABLE IF NOT EXISTS rec (id INTEGER PRIMARY KEY, side TEXT)";
        const INSERT_SQL: &'static str = "INSERT OR REPLACE INTO rec (id, side) VALUES (?1, ?2)";

        fn to_params(&self) -> Vec<Value> {
            vec![Value::Integer(self.id as i64), Value::Text(self.side.clone())]
        }
    }

    impl ParityTags for Rec {
        fn parity_tags(&self) -> Vec<&'static str> {
            vec!["total"]
        }
    }

    #[test]
    fn dual_sink_counters_agree_when_both_writes_succeed() {
        let dir = tempfile::tempdir().unwrap();
        let rotation = RotationPolicy { rotate_on_minute_boundary: false, ..Default::default() };
        let mut sink: DualSink<Rec> = DualSink::open(
            dir.path(),
            "signal",
            "signal",
            dir.path().join("signals.db"),
            rotation,
            1,
            1_000,
        )
        .unwrap();

        for i in 0..10 {
            sink.write_at(&Rec { id: i, side: "buy".into() }, 1_000).unwrap();
        }
        let diffs = sink.parity_diff();
        assert!(diffs.iter().all(|d| d.passed));
        assert_eq!(diffs.iter().find(|d| d.metric == "total").unwrap().jsonl_count, 10);
        assert_eq!(diffs.iter().find(|d| d.metric == "total").unwrap().sqlite_count, 10);
    }
}
