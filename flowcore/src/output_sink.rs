use crate::sink_arg::SinkKind;
use flowcore_integration::{DualSink, IoError, JsonlSink, ParityTags, RecordSink, RotationPolicy, SqlRecord, SqliteSink};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Picks the concrete record sink a `--sink` flag selects (§6, §9): every
/// worker writes through one of these three, never constructing a
/// `JsonlSink`/`SqliteSink`/`DualSink` directly.
pub enum OutputSink<R> {
    Jsonl(JsonlSink),
    Sqlite(SqliteSink<R>),
    Dual(DualSink<R>),
}

impl<R> OutputSink<R>
where
    R: Serialize + Clone + SqlRecord + ParityTags,
{
    pub fn open(
        kind: SinkKind,
        root: impl Into<PathBuf>,
        subdir: &str,
        record_type: &str,
        sqlite_batch_n: usize,
        sqlite_flush_ms: u64,
    ) -> Result<Self, IoError> {
        let root = root.into();
        Ok(match kind {
            SinkKind::Jsonl => OutputSink::Jsonl(JsonlSink::new(root, subdir, record_type, RotationPolicy::default())),
            SinkKind::Sqlite => {
                let path = sqlite_path(&root, record_type);
                OutputSink::Sqlite(SqliteSink::open(path, sqlite_batch_n, Duration::from_millis(sqlite_flush_ms))?)
            }
            SinkKind::Dual => {
                let path = sqlite_path(&root, record_type);
                OutputSink::Dual(DualSink::open(
                    root,
                    subdir,
                    record_type,
                    path,
                    RotationPolicy::default(),
                    sqlite_batch_n,
                    sqlite_flush_ms,
                )?)
            }
        })
    }

    pub fn write_at(&mut self, record: &R, now_ms: i64) -> Result<(), IoError> {
        match self {
            OutputSink::Jsonl(sink) => sink.write_at(record, now_ms),
            OutputSink::Sqlite(sink) => RecordSink::write(sink, record),
            OutputSink::Dual(sink) => sink.write_at(record, now_ms),
        }
    }

    pub fn flush_at(&mut self, now_ms: i64) -> Result<(), IoError> {
        match self {
            OutputSink::Jsonl(sink) => sink.flush_at(now_ms),
            OutputSink::Sqlite(sink) => RecordSink::flush(sink),
            OutputSink::Dual(sink) => sink.flush_at(now_ms),
        }
    }

    pub fn close(&mut self) -> Result<(), IoError> {
        match self {
            OutputSink::Jsonl(sink) => RecordSink::close(sink),
            OutputSink::Sqlite(sink) => RecordSink::close(sink),
            OutputSink::Dual(sink) => sink.close(),
        }
    }
}

fn sqlite_path(root: &Path, record_type: &str) -> PathBuf {
    root.join("artifacts").join(format!("{record_type}.db"))
}
