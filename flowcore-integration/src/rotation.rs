use crate::error::IoError;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Threshold policy that decides when a spool file must be rotated into
/// `ready/` (§4.1, §4.6).
#[derive(Debug, Clone, Copy)]
pub struct RotationPolicy {
    pub max_rows: usize,
    pub max_bytes: u64,
    /// Rotate on every wall-clock minute boundary crossed, regardless of
    /// row/byte thresholds.
    pub rotate_on_minute_boundary: bool,
    pub fsync_every_n: usize,
}

impl Default for RotationPolicy {
    fn default() -> Self {
        Self {
            max_rows: 200_000,
            max_bytes: 10 * 1024 * 1024,
            rotate_on_minute_boundary: true,
            fsync_every_n: 100,
        }
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct RotationState {
    pub rows: usize,
    pub bytes: u64,
    pub last_minute_bucket: i64,
}

impl RotationState {
    /// Whether the current spool file must be rotated before accepting the
    /// next write, given the row just about to be appended.
    pub fn should_rotate(&self, policy: &RotationPolicy, now_ms: i64) -> bool {
        if self.rows >= policy.max_rows || self.bytes >= policy.max_bytes {
            return true;
        }
        if policy.rotate_on_minute_boundary {
            let minute_bucket = now_ms / 60_000;
            if self.last_minute_bucket != 0 && minute_bucket != self.last_minute_bucket {
                return true;
            }
        }
        false
    }

    pub fn record_write(&mut self, bytes_written: u64, now_ms: i64) {
        self.rows += 1;
        self.bytes += bytes_written;
        self.last_minute_bucket = now_ms / 60_000;
    }

    pub fn reset(&mut self) {
        self.rows = 0;
        self.bytes = 0;
    }
}

/// `fsync` the file, then atomically publish `spool_path` to `ready_path`.
///
/// On platforms where rename-over-an-existing-file is disallowed (§4.1, §9
/// "Atomic file rename on Windows"), this falls back to remove-then-rename
/// with bounded, capped-exponential-backoff retry, since a bare `fs::rename`
/// failure there is expected, not exceptional.
pub fn publish_spool_file(file: &File, spool_path: &Path, ready_path: &Path) -> Result<(), IoError> {
    file.sync_all().map_err(|source| IoError::Rotate {
        path: spool_path.display().to_string(),
        source,
    })?;

    if let Some(parent) = ready_path.parent() {
        fs::create_dir_all(parent)?;
    }

    match fs::rename(spool_path, ready_path) {
        Ok(()) => return Ok(()),
        Err(_) => { /* fall through to remove-then-rename retry below */ }
    }

    const MAX_ATTEMPTS: u32 = 5;
    let mut attempt = 0u32;
    loop {
        if ready_path.exists() {
            let _ = fs::remove_file(ready_path);
        }
        match fs::rename(spool_path, ready_path) {
            Ok(()) => return Ok(()),
            Err(source) => {
                attempt += 1;
                if attempt >= MAX_ATTEMPTS {
                    return Err(IoError::Rotate {
                        path: spool_path.display().to_string(),
                        source,
                    });
                }
                std::thread::sleep(backoff_delay(attempt));
            }
        }
    }
}

fn backoff_delay(attempt: u32) -> Duration {
    Duration::from_millis(10u64.saturating_mul(1 << attempt.min(6)))
}

/// Build the `<root>/spool/<file>.part` and `<root>/ready/<file>` paths for a
/// given record type and rotation sequence, per the §6 file layout.
pub fn spool_and_ready_paths(root: &Path, subdir: &str, file_stem: &str, ext: &str) -> (PathBuf, PathBuf) {
    let spool = root.join("spool").join(subdir).join(format!("{file_stem}.{ext}.part"));
    let ready = root.join("ready").join(subdir).join(format!("{file_stem}.{ext}"));
    (spool, ready)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rotates_once_row_cap_is_reached() {
        let policy = RotationPolicy { max_rows: 2, rotate_on_minute_boundary: false, ..Default::default() };
        let mut state = RotationState::default();
        assert!(!state.should_rotate(&policy, 0));
        state.record_write(10, 0);
        assert!(!state.should_rotate(&policy, 0));
        state.record_write(10, 0);
        assert!(state.should_rotate(&policy, 0));
    }

    #[test]
    fn rotates_on_minute_boundary() {
        let policy = RotationPolicy { max_rows: 1_000_000, max_bytes: u64::MAX, rotate_on_minute_boundary: true, ..Default::default() };
        let mut state = RotationState::default();
        state.record_write(10, 0);
        assert!(!state.should_rotate(&policy, 30_000));
        assert!(state.should_rotate(&policy, 61_000));
    }

    #[test]
    fn publish_moves_spool_file_into_ready() {
        let dir = tempfile::tempdir().unwrap();
        let spool_path = dir.path().join("signal_20260101_0000.jsonl.part");
        let ready_path = dir.path().join("ready").join("signal_20260101_0000.jsonl");
        let file = File::create(&spool_path).unwrap();
        publish_spool_file(&file, &spool_path, &ready_path).unwrap();
        assert!(!spool_path.exists());
        assert!(ready_path.exists());
    }
}
