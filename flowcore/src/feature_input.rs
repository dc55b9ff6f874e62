use flowcore_backtest::loader::TimestampedRow;
use std::path::{Path, PathBuf};

fn read_feature_rows_from_file(path: &Path) -> anyhow::Result<Vec<TimestampedRow>> {
    let contents = std::fs::read_to_string(path)?;
    let mut rows = Vec::new();
    for line in contents.lines() {
        if line.trim().is_empty() {
            continue;
        }
        rows.push(serde_json::from_str(line)?);
    }
    Ok(rows)
}

/// Reads the feature rows the Harvester published, from either a single
/// JSON-lines file or a directory of them (§6 `--input <dir|file>`),
/// sorted by event time the way [`flowcore_backtest::loader::JsonLinesLoader`]
/// sorts a single file.
pub fn load_feature_rows(input: &Path) -> anyhow::Result<Vec<TimestampedRow>> {
    let mut rows = if input.is_dir() {
        let mut files: Vec<PathBuf> = std::fs::read_dir(input)?
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|p| p.extension().is_some_and(|ext| ext == "jsonl"))
            .collect();
        files.sort();
        let mut rows = Vec::new();
        for file in files {
            rows.extend(read_feature_rows_from_file(&file)?);
        }
        rows
    } else {
        read_feature_rows_from_file(input)?
    };
    rows.sort_by_key(|r| r.ts_ms);
    Ok(rows)
}
