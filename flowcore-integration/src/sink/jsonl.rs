use crate::error::IoError;
use crate::rotation::{publish_spool_file, RotationPolicy, RotationState};
use crate::sink::RecordSink;
use serde::Serialize;
use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

/// Append-only JSONL sink with spool→ready atomic rotation (§4.6).
///
/// Each record is serialised as one JSON object per line. Writes accumulate
/// in `<root>/spool/<subdir>/<record_type>_<seq>.jsonl.part`; once the
/// rotation policy trips, the spool file is `fsync`ed and atomically
/// published to `<root>/ready/<subdir>/<record_type>_<YYYYMMDD>_<HHMM>_<seq>.jsonl`.
pub struct JsonlSink {
    root: PathBuf,
    subdir: String,
    record_type: String,
    policy: RotationPolicy,
    state: RotationState,
    writer: Option<BufWriter<File>>,
    spool_path: Option<PathBuf>,
    seq: u64,
    writes_since_fsync: usize,
}

impl JsonlSink {
    pub fn new(root: impl Into<PathBuf>, subdir: impl Into<String>, record_type: impl Into<String>, policy: RotationPolicy) -> Self {
        Self {
            root: root.into(),
            subdir: subdir.into(),
            record_type: record_type.into(),
            policy,
            state: RotationState::default(),
            writer: None,
            spool_path: None,
            seq: 0,
            writes_since_fsync: 0,
        }
    }

    fn ensure_open(&mut self) -> Result<(), IoError> {
        if self.writer.is_some() {
            return Ok(());
        }
        let spool_dir = self.root.join("spool").join(&self.subdir);
        fs::create_dir_all(&spool_dir)?;
        let spool_path = spool_dir.join(format!("{}_{}.jsonl.part", self.record_type, self.seq));
        let file = OpenOptions::new().create(true).append(true).open(&spool_path)?;
        self.writer = Some(BufWriter::new(file));
        self.spool_path = Some(spool_path);
        Ok(())
    }

    fn ready_path(&self, now_ms: i64) -> PathBuf {
        let datetime = chrono::DateTime::from_timestamp_millis(now_ms).unwrap_or_default();
        let file_name = format!(
            "{}_{}_{}.jsonl",
            self.record_type,
            datetime.format("%Y%m%d"),
            format!("{}_{}", datetime.format("%H%M"), self.seq),
        );
        self.root.join("ready").join(&self.subdir).join(file_name)
    }

    fn rotate(&mut self, now_ms: i64) -> Result<(), IoError> {
        let Some(writer) = self.writer.take() else { return Ok(()) };
        let spool_path = self.spool_path.take().expect("spool path set alongside writer");
        let file = writer.into_inner().map_err(|e| e.into_error())?;
        let ready_path = self.ready_path(now_ms);
        publish_spool_file(&file, &spool_path, &ready_path)?;
        self.seq += 1;
        self.state.reset();
        Ok(())
    }

    pub fn write_at(&mut self, record: &impl Serialize, now_ms: i64) -> Result<(), IoError> {
        if self.state.should_rotate(&self.policy, now_ms) {
            self.rotate(now_ms)?;
        }
        self.ensure_open()?;

        let mut line = serde_json::to_vec(record)?;
        line.push(b'\n');
        let len = line.len() as u64;
        self.writer.as_mut().expect("ensure_open set writer").write_all(&line)?;

        self.writes_since_fsync += 1;
        if self.writes_since_fsync >= self.policy.fsync_every_n {
            self.writer.as_mut().expect("writer open").flush()?;
            self.writer.as_ref().expect("writer open").get_ref().sync_data()?;
            self.writes_since_fsync = 0;
        }

        self.state.record_write(len, now_ms);
        Ok(())
    }

    pub fn flush_at(&mut self, now_ms: i64) -> Result<(), IoError> {
        if let Some(writer) = self.writer.as_mut() {
            writer.flush()?;
        }
        self.rotate(now_ms)
    }
}

impl<R: Serialize> RecordSink<R> for JsonlSink {
    fn write(&mut self, record: &R) -> Result<(), IoError> {
        let now_ms = chrono::Utc::now().timestamp_millis();
        self.write_at(record, now_ms)
    }

    fn flush(&mut self) -> Result<(), IoError> {
        let now_ms = chrono::Utc::now().timestamp_millis();
        self.flush_at(now_ms)
    }

    fn close(&mut self) -> Result<(), IoError> {
        self.flush()
    }
}

/// Read back every record published under `<root>/ready/<subdir>/` matching
/// `record_type`, in file order then line order — used by readers (Strategy
/// consuming signals) and by the round-trip tests in §8.
pub fn read_ready_records<R: for<'de> serde::Deserialize<'de>>(
    root: &Path,
    subdir: &str,
    record_type: &str,
) -> Result<Vec<R>, IoError> {
    let ready_dir = root.join("ready").join(subdir);
    if !ready_dir.exists() {
        return Ok(Vec::new());
    }
    let mut files: Vec<PathBuf> = fs::read_dir(&ready_dir)?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| {
            path.file_name()
                .and_then(|n| n.to_str())
                .map(|n| n.starts_with(record_type))
                .unwrap_or(false)
        })
        .collect();
    files.sort();

    let mut records = Vec::new();
    for path in files {
        let contents = fs::read_to_string(&path)?;
        for line in contents.lines() {
            if line.trim().is_empty() {
                continue;
            }
            records.push(serde_json::from_str(line)?);
        }
    }
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct Rec {
        id: u64,
        value: String,
    }

    #[test]
    fn writing_n_records_and_reading_back_yields_n_identical_records() {
        let dir = tempfile::tempdir().unwrap();
        let policy = RotationPolicy { max_rows: 1_000, max_bytes: u64::MAX, rotate_on_minute_boundary: false, fsync_every_n: 1 };
        let mut sink = JsonlSink::new(dir.path(), "signal", "signal", policy);

        for i in 0..50 {
            sink.write_at(&Rec { id: i, value: format!("v{i}") }, 1_000).unwrap();
        }
        sink.flush_at(1_000).unwrap();

        let records: Vec<Rec> = read_ready_records(dir.path(), "signal", "signal").unwrap();
        assert_eq!(records.len(), 50);
        for (i, record) in records.iter().enumerate() {
            assert_eq!(record.id, i as u64);
        }
    }

    #[test]
    fn rotates_when_row_cap_reached() {
        let dir = tempfile::tempdir().unwrap();
        let policy = RotationPolicy { max_rows: 2, max_bytes: u64::MAX, rotate_on_minute_boundary: false, fsync_every_n: 1 };
        let mut sink = JsonlSink::new(dir.path(), "signal", "signal", policy);
        for i in 0..5 {
            sink.write_at(&Rec { id: i, value: "x".into() }, 1_000).unwrap();
        }
        sink.flush_at(1_000).unwrap();
        let ready_dir = dir.path().join("ready").join("signal");
        let file_count = fs::read_dir(&ready_dir).unwrap().count();
        assert!(file_count >= 2, "expected multiple rotated files, got {file_count}");
    }
}
