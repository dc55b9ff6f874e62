use crate::error::IoError;
use crate::sink::RecordSink;
use rusqlite::{types::Value, Connection};
use std::path::Path;
use std::time::{Duration, Instant};

/// Implemented by every record type with a fixed SQLite schema (§6): turns a
/// record into the positional parameter list for `INSERT_SQL`.
pub trait SqlRecord {
    const TABLE: &'static str;
    const CREATE_SQL: &'static str;
    const INSERT_SQL: &'static str;

    fn to_params(&self) -> Vec<Value>;
}

/// Batched SQLite sink: one database file per logical record type, WAL
/// journal mode, a configured `busy_timeout`, writes flushed either once the
/// batch reaches `batch_size` rows or `flush_interval` elapses (§4.6).
pub struct SqliteSink<R> {
    conn: Connection,
    buffer: Vec<R>,
    batch_size: usize,
    flush_interval: Duration,
    last_flush: Instant,
}

impl<R: SqlRecord> SqliteSink<R> {
    pub fn open(path: impl AsRef<Path>, batch_size: usize, flush_interval: Duration) -> Result<Self, IoError> {
        if let Some(parent) = path.as_ref().parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.busy_timeout(Duration::from_millis(5_000))?;
        // `execute_batch` (not `execute`) since `CREATE_SQL` may be more than
        // one statement (a table plus its secondary indexes).
        conn.execute_batch(R::CREATE_SQL)?;

        Ok(Self {
            conn,
            buffer: Vec::new(),
            batch_size,
            flush_interval,
            last_flush: Instant::now(),
        })
    }

    fn due_for_flush(&self) -> bool {
        self.buffer.len() >= self.batch_size || self.last_flush.elapsed() >= self.flush_interval
    }

    fn flush_buffer(&mut self) -> Result<(), IoError> {
        if self.buffer.is_empty() {
            self.last_flush = Instant::now();
            return Ok(());
        }
        let tx = self.conn.transaction()?;
        for record in self.buffer.drain(..) {
            let params = record.to_params();
            let refs: Vec<&dyn rusqlite::ToSql> = params.iter().map(|v| v as &dyn rusqlite::ToSql).collect();
            tx.execute(R::INSERT_SQL, refs.as_slice())?;
        }
        tx.commit()?;
        self.last_flush = Instant::now();
        Ok(())
    }
}

impl<R: SqlRecord> RecordSink<R> for SqliteSink<R>
where
    R: Clone,
{
    fn write(&mut self, record: &R) -> Result<(), IoError> {
        self.buffer.push(record.clone());
        if self.due_for_flush() {
            self.flush_buffer()?;
        }
        Ok(())
    }

    fn flush(&mut self) -> Result<(), IoError> {
        self.flush_buffer()
    }

    fn close(&mut self) -> Result<(), IoError> {
        self.flush_buffer()
    }
}
